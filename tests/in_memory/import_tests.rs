//! Import tests: duplicate detection across projects and states.

use super::helpers::{BoxError, Platform, platform, runtime};
use crowdtally::task::domain::{Page, TaskFilter};
use crowdtally::task::services::{CreateTaskRequest, DuplicateDetector, ImportOutcome};
use rstest::rstest;
use serde_json::json;
use std::io;
use std::sync::Arc;
use tokio::runtime::Runtime;

#[rstest]
fn import_skips_payloads_already_pending(
    runtime: io::Result<Runtime>,
    platform: Platform,
) -> Result<(), BoxError> {
    let rt = runtime?;
    rt.block_on(async {
        let birds = platform.project("birds", 7).await?;
        let payloads = [
            json!({"image": "a.png", "zone": 1}),
            json!({"zone": 1, "image": "a.png"}),
            json!({"image": "b.png", "zone": 1}),
        ];

        let mut outcomes = Vec::new();
        for payload in payloads {
            let request = CreateTaskRequest::new(birds.id(), payload);
            outcomes.push(platform.catalog.import_task(request).await?);
        }

        let [ImportOutcome::Created(first), ImportOutcome::Duplicate(skipped), ImportOutcome::Created(_)] =
            outcomes.as_slice()
        else {
            return Err(format!("unexpected outcomes: {outcomes:?}").into());
        };
        assert_eq!(*skipped, first.id());
        assert_eq!(
            platform.catalog.count_tasks(birds.id(), &TaskFilter::all()).await?,
            2
        );
        Ok::<_, BoxError>(())
    })
}

#[rstest]
fn completed_and_foreign_tasks_are_not_duplicates(
    runtime: io::Result<Runtime>,
    platform: Platform,
) -> Result<(), BoxError> {
    let rt = runtime?;
    rt.block_on(async {
        let birds = platform.project("birds", 7).await?;
        let bugs = platform.project("bugs", 7).await?;
        let payload = json!({"image": "c.png"});
        let detector = DuplicateDetector::new(Arc::clone(&platform.store));

        let task = platform
            .catalog
            .create_task(CreateTaskRequest::new(birds.id(), payload.clone()).with_redundancy(1))
            .await?;
        assert_eq!(
            detector.find_duplicate(birds.id(), &payload).await?,
            Some(task.id())
        );
        assert_eq!(detector.find_duplicate(bugs.id(), &payload).await?, None);

        platform.answer(birds.id(), task.id(), 1).await?;
        assert_eq!(detector.find_duplicate(birds.id(), &payload).await?, None);

        let reimported = platform
            .catalog
            .import_task(CreateTaskRequest::new(birds.id(), payload))
            .await?;
        assert!(matches!(reimported, ImportOutcome::Created(_)));
        let listed = platform
            .catalog
            .find_tasks(birds.id(), &TaskFilter::all(), Page::all())
            .await?;
        assert_eq!(listed.len(), 2);
        Ok::<_, BoxError>(())
    })
}
