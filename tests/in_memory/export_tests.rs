//! Export tests: batched row streams and artifact purges after deletions.

use super::helpers::{BoxError, Platform, platform, runtime};
use crowdtally::project::domain::UserId;
use crowdtally::task::domain::{TaskFilter, TaskId};
use crowdtally::task::ports::StorageContainer;
use crowdtally::task::services::{
    CreateTaskRequest, ExportArtifacts, ExportFormat, ExportRowSource, ExportTable,
};
use futures::TryStreamExt;
use rstest::rstest;
use serde_json::json;
use std::io;
use std::sync::Arc;
use tokio::runtime::Runtime;

#[rstest]
fn export_streams_only_pending_completed_runs(
    runtime: io::Result<Runtime>,
    platform: Platform,
) -> Result<(), BoxError> {
    let rt = runtime?;
    rt.block_on(async {
        let birds = platform.project("birds", 7).await?;
        let mut task_ids: Vec<TaskId> = Vec::new();
        for image in ["a.png", "b.png", "c.png"] {
            let request =
                CreateTaskRequest::new(birds.id(), json!({"image": image})).with_redundancy(2);
            task_ids.push(platform.catalog.create_task(request).await?.id());
        }
        for task_id in &task_ids {
            platform.answer(birds.id(), *task_id, 1).await?;
            platform.answer(birds.id(), *task_id, 2).await?;
        }
        let first = *task_ids.first().ok_or("no tasks")?;
        platform.catalog.set_exported(first, true).await?;

        let source = ExportRowSource::new(Arc::clone(&platform.store), 4)?;
        let pending: Vec<_> = source
            .completed_task_runs(birds.id(), Some(false))
            .try_concat()
            .await?;
        let everything: Vec<_> = source.task_runs(birds.id()).try_concat().await?;
        let results: Vec<_> = source.current_results(birds.id()).try_concat().await?;

        assert_eq!(pending.len(), 4);
        assert!(pending.iter().all(|run| run.task_id() != first));
        assert_eq!(everything.len(), 6);
        assert_eq!(results.len(), 3);
        Ok::<_, BoxError>(())
    })
}

#[rstest]
fn deletions_purge_published_artifacts(
    runtime: io::Result<Runtime>,
    platform: Platform,
) -> Result<(), BoxError> {
    let rt = runtime?;
    rt.block_on(async {
        let birds = platform.project("birds", 7).await?;
        let artifacts = ExportArtifacts::new(Arc::clone(&platform.storage));
        let published = artifacts
            .publish(&birds, ExportTable::Result, ExportFormat::Csv, b"id\n1\n".to_vec())
            .await?;
        assert_eq!(published, format!("{}_birds_result_csv.zip", birds.id()));
        let container = StorageContainer::for_owner(UserId::new(7));
        assert_eq!(platform.storage.file_names(&container), [published]);

        let request = CreateTaskRequest::new(birds.id(), json!({"image": "z.png"}));
        platform.catalog.create_task(request).await?;
        let counts = platform
            .cleanup
            .force_reset(birds.id(), &TaskFilter::all())
            .await?;

        assert_eq!(counts.tasks, 1);
        assert!(platform.storage.file_names(&container).is_empty());
        Ok::<_, BoxError>(())
    })
}
