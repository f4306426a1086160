//! Status helper enums mapping to SMALLSERIAL/SMALLINT lookup tables.
//!
//! Each enum variant's discriminant matches the seed data order (1-based)
//! in the corresponding lookup table.

/// Status ID type matching SMALLINT/SMALLSERIAL in the database.
pub type StatusId = i16;

macro_rules! define_status_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $val:expr ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[repr(i16)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $val ),+
        }

        impl $name {
            /// Return the database status ID.
            pub fn id(self) -> StatusId {
                self as StatusId
            }
        }

        impl From<$name> for StatusId {
            fn from(value: $name) -> Self {
                value as StatusId
            }
        }
    };
}

define_status_enum! {
    /// Task lifecycle status.
    TaskStatus {
        Queued = 1,
        InProgress = 2,
        Complete = 3,
        Failed = 4,
        Cancelled = 5,
    }
}

define_status_enum! {
    /// Worker node lifecycle status.
    WorkerStatus {
        Inactive = 1,
        Spawning = 2,
        Active = 3,
        Error = 4,
        /// Blocks new claims; in-flight work is unaffected.
        Terminating = 5,
        Terminated = 6,
    }
}

define_status_enum! {
    /// Credit ledger entry type.
    CreditEntryType {
        Purchase = 1,
        ManualAdjustment = 2,
        Spend = 3,
        Refund = 4,
    }
}
