//! Completion pipeline: turn a completed task's result into a generation
//! record, exactly once.
//!
//! Invoked after a task transitions to Complete. Runs in a single
//! transaction: the task row is locked `FOR UPDATE`, the
//! `generation_created` flag is re-checked under the lock, the artifact
//! record is inserted and optionally attached to a shot, and the flag is
//! flipped before commit. A crash anywhere rolls the whole step back and
//! leaves the flag false, so the next trigger retries (at-least-once, with
//! the flag guaranteeing at-most-one record).

use sqlx::PgPool;
use vireo_core::payload;
use vireo_core::types::DbId;
use vireo_db::models::generation::CreateGeneration;
use vireo_db::models::status::TaskStatus;
use vireo_db::repositories::{GenerationRepo, ShotRepo, TaskRepo};

/// Task types whose results describe a media artifact.
///
/// Other task types (analysis, validation, housekeeping) complete without
/// producing a generation record.
pub const GENERATION_TASK_TYPES: &[&str] = &["text_to_video", "image_to_video", "text_to_image"];

/// Whether a task type produces a generation on completion.
pub fn is_generation_type(task_type: &str) -> bool {
    GENERATION_TASK_TYPES.contains(&task_type)
}

/// What one pipeline run did.
#[derive(Debug, PartialEq, Eq)]
pub enum CompletionOutcome {
    /// A generation record was created (and possibly attached to a shot).
    Recorded {
        generation_id: DbId,
        attached_shot: Option<DbId>,
    },
    /// The task type does not produce artifacts.
    NotGenerationType,
    /// The flag was already set; an earlier run recorded the artifact.
    AlreadyRecorded,
    /// The task is not in Complete status (raced a requeue or cancel).
    NotComplete,
    /// No usable output location; the flag is set anyway so the pipeline
    /// does not retry a result that will never parse.
    MissingLocation,
    /// The task row no longer exists.
    TaskMissing,
}

/// Run the completion pipeline for one task.
pub async fn run(pool: &PgPool, task_id: DbId) -> Result<CompletionOutcome, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let Some(task) = TaskRepo::lock_for_completion(&mut tx, task_id).await? else {
        return Ok(CompletionOutcome::TaskMissing);
    };

    if task.status_id != TaskStatus::Complete.id() {
        return Ok(CompletionOutcome::NotComplete);
    }
    if task.generation_created {
        return Ok(CompletionOutcome::AlreadyRecorded);
    }
    if !is_generation_type(&task.task_type) {
        return Ok(CompletionOutcome::NotGenerationType);
    }

    let result = task.result.clone().unwrap_or(serde_json::Value::Null);

    let Some(raw_location) = payload::output_location(&result, &task.params) else {
        // A result with no location will never become parseable; setting the
        // flag keeps the next completion report from re-running this path.
        tracing::warn!(
            task_id,
            task_type = %task.task_type,
            "Completed task has no output location; no generation recorded"
        );
        TaskRepo::set_generation_created(&mut tx, task_id).await?;
        tx.commit().await?;
        return Ok(CompletionOutcome::MissingLocation);
    };

    let location = payload::normalize_location(&raw_location);
    let generation = GenerationRepo::insert(
        &mut tx,
        &CreateGeneration {
            task_id,
            project_id: task.project_id,
            location,
            generation_type: task.task_type.clone(),
            thumbnail_url: payload::thumbnail_url(&result),
            metadata: result.clone(),
        },
    )
    .await?;

    // Shot attachment is a hint: a dangling, malformed, or cross-project
    // shot reference is logged and dropped, never a pipeline failure.
    let mut attached_shot = None;
    if let Some(shot_id) = payload::shot_link(&result, &task.params) {
        if ShotRepo::exists_in(&mut tx, shot_id, task.project_id).await? {
            let link = GenerationRepo::attach_to_shot(&mut tx, shot_id, generation.id).await?;
            tracing::info!(
                task_id,
                shot_id,
                position = link.position,
                "Generation attached to shot"
            );
            attached_shot = Some(shot_id);
        } else {
            tracing::warn!(
                task_id,
                shot_id,
                "Shot link points outside the task's project or at a missing shot; dropped"
            );
        }
    }

    TaskRepo::set_generation_created(&mut tx, task_id).await?;
    tx.commit().await?;

    tracing::info!(
        task_id,
        generation_id = generation.id,
        "Generation recorded for completed task"
    );

    Ok(CompletionOutcome::Recorded {
        generation_id: generation.id,
        attached_shot,
    })
}
