//! Lifecycle tests: submissions, redundancy changes and cache signals.

use super::helpers::{BoxError, Platform, platform, runtime};
use crowdtally::task::adapters::memory::CacheSignal;
use crowdtally::task::domain::{CompletionOutcome, TaskFilter, TaskState};
use crowdtally::task::services::CreateTaskRequest;
use rstest::rstest;
use serde_json::json;
use std::io;
use tokio::runtime::Runtime;

#[rstest]
fn redundancy_changes_follow_the_run_count(
    runtime: io::Result<Runtime>,
    platform: Platform,
) -> Result<(), BoxError> {
    let rt = runtime?;
    rt.block_on(async {
        let birds = platform.project("birds", 7).await?;
        let mut task_ids = Vec::new();
        for image in ["a.png", "b.png", "c.png"] {
            let request = CreateTaskRequest::new(birds.id(), json!({"image": image}))
                .with_redundancy(3);
            task_ids.push(platform.catalog.create_task(request).await?.id());
        }
        for (answers, task_id) in task_ids.iter().enumerate() {
            for user in 1..=answers + 1 {
                let user = i64::try_from(user)?;
                platform.answer(birds.id(), *task_id, user).await?;
            }
        }

        let lowered = platform
            .engine
            .reevaluate_completion(birds.id(), 2, &TaskFilter::all())
            .await?;
        assert_eq!(lowered.matched, 3);
        assert_eq!(lowered.completed, 1);
        assert_eq!(lowered.already_completed, 1);
        assert_eq!(lowered.still_ongoing, 1);

        let raised = platform
            .engine
            .reevaluate_completion(birds.id(), 3, &TaskFilter::all())
            .await?;
        assert_eq!(raised.reopened, 1);
        assert_eq!(raised.already_completed, 1);

        let mut states = Vec::new();
        for task_id in &task_ids {
            let task = platform.catalog.get_task(*task_id).await?.ok_or("task vanished")?;
            states.push(task.state());
        }
        assert_eq!(
            states,
            [TaskState::Ongoing, TaskState::Ongoing, TaskState::Completed]
        );
        Ok::<_, BoxError>(())
    })
}

#[rstest]
fn cache_signals_follow_writes_only(
    runtime: io::Result<Runtime>,
    platform: Platform,
) -> Result<(), BoxError> {
    let rt = runtime?;
    rt.block_on(async {
        let birds = platform.project("birds", 7).await?;
        let task = platform
            .catalog
            .create_task(CreateTaskRequest::new(birds.id(), json!({"image": "d.png"})).with_redundancy(1))
            .await?;
        assert_eq!(platform.cache.signals(), [CacheSignal::Project(birds.id())]);

        let outcome = platform.answer(birds.id(), task.id(), 1).await?;
        assert!(matches!(outcome, CompletionOutcome::Completed(_)));
        let after_completion = platform.cache.signals().len();

        let late = platform.answer(birds.id(), task.id(), 2).await?;
        assert_eq!(late, CompletionOutcome::AlreadyCompleted);
        platform.catalog.progress(birds.id()).await?;

        let deleted = platform.cleanup.delete_task(birds.id(), task.id()).await?;
        assert!(deleted.is_some());
        let signals = platform.cache.signals();
        assert_eq!(
            signals.get(signals.len().saturating_sub(2)..),
            Some([CacheSignal::Project(birds.id()), CacheSignal::Reset].as_slice())
        );
        assert!(signals.len() >= after_completion + 2);
        Ok::<_, BoxError>(())
    })
}
