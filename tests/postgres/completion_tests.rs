//! Completion engine transactions against `PostgreSQL`.

use super::cluster::{BoxError, PostgresCluster, postgres_cluster};
use super::helpers::StoreWorld;
use crowdtally::project::domain::UserId;
use crowdtally::task::domain::{
    CompletionOutcome, Contributor, NewTaskResult, NewTaskRun, TaskFilter, TaskState,
};
use crowdtally::task::ports::{TaskStore, TaskStoreError};
use crowdtally::task::services::{CompletionError, SubmitTaskRunRequest};
use mockable::{Clock, DefaultClock};
use rstest::rstest;
use serde_json::json;
use std::sync::Arc;

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn redundancy_changes_round_trip_through_the_database(
    postgres_cluster: Result<PostgresCluster, BoxError>,
) -> Result<(), BoxError> {
    let world = StoreWorld::setup(postgres_cluster?).await?;
    let project_id = world.project.id();
    let task = world.task(json!({"image": "wren.png"}), 2).await?;

    assert!(matches!(
        world.submit(task.id(), 1).await?,
        CompletionOutcome::StillOngoing { runs: 1, .. }
    ));
    let CompletionOutcome::Completed(first) = world.submit(task.id(), 2).await? else {
        return Err("second run should complete the task".into());
    };
    assert_eq!(first.task_run_ids().len(), 2);
    assert_eq!(world.reload(task.id()).await?.state(), TaskState::Completed);

    world.catalog.set_exported(task.id(), true).await?;
    let raised = world
        .engine
        .reevaluate_completion(project_id, 3, &TaskFilter::all())
        .await?;
    assert_eq!(raised.reopened, 1);
    assert_eq!(raised.exports_reset, 1);
    let reopened = world.reload(task.id()).await?;
    assert_eq!(reopened.state(), TaskState::Ongoing);
    assert!(!reopened.exported());
    assert!(world.store.find_current_result(task.id()).await?.is_none());

    let lowered = world
        .engine
        .reevaluate_completion(project_id, 2, &TaskFilter::all())
        .await?;
    assert_eq!(lowered.completed, 1);
    let results = world.store.find_results(task.id()).await?;
    assert_eq!(results.len(), 1);
    let fresh = results.first().ok_or("missing result")?;
    assert!(fresh.last_version());
    assert_ne!(fresh.id(), first.id());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn superseded_results_stay_for_audit(
    postgres_cluster: Result<PostgresCluster, BoxError>,
) -> Result<(), BoxError> {
    let world = StoreWorld::setup(postgres_cluster?).await?;
    let project_id = world.project.id();
    let task = world.task(json!({"image": "robin.png"}), 1).await?;
    world.submit(task.id(), 1).await?;

    let run = NewTaskRun::new(
        project_id,
        task.id(),
        Contributor::User(UserId::new(2)),
        json!({"answer": "robin"}),
        &DefaultClock,
    )?;
    world.store.create_task_run(&run).await?;
    let summary = world
        .engine
        .reevaluate_completion(project_id, 1, &TaskFilter::all())
        .await?;

    assert_eq!(summary.superseded, 1);
    let results = world.store.find_results(task.id()).await?;
    assert_eq!(results.len(), 2);
    assert_eq!(results.iter().filter(|result| result.last_version()).count(), 1);
    let current = world
        .store
        .find_current_result(task.id())
        .await?
        .ok_or("missing current result")?;
    assert_eq!(current.task_run_ids().len(), 2);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn partial_unique_index_rejects_a_second_current_result(
    postgres_cluster: Result<PostgresCluster, BoxError>,
) -> Result<(), BoxError> {
    let world = StoreWorld::setup(postgres_cluster?).await?;
    let task = world.task(json!({"image": "tit.png"}), 5).await?;
    let result = NewTaskResult {
        project_id: world.project.id(),
        task_id: task.id(),
        task_run_ids: Vec::new(),
        created_at: DefaultClock.utc(),
    };
    let first = result.clone();
    world
        .store
        .transaction(move |unit| unit.insert_result(&first).map(|_| ()))
        .await?;

    let second = world
        .store
        .transaction(move |unit| unit.insert_result(&result).map(|_| ()))
        .await;

    assert!(matches!(
        second,
        Err(TaskStoreError::DuplicateCurrentResult(id)) if id == task.id()
    ));
    assert_eq!(world.store.find_results(task.id()).await?.len(), 1);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn runs_must_reference_a_task_of_their_project(
    postgres_cluster: Result<PostgresCluster, BoxError>,
) -> Result<(), BoxError> {
    let world = StoreWorld::setup(postgres_cluster?).await?;
    let other = world.other_project().await?;
    let task = world.task(json!({"image": "jay.png"}), 1).await?;

    let outcome = world
        .engine
        .submit_task_run(SubmitTaskRunRequest::new(
            other.id(),
            task.id(),
            Contributor::User(UserId::new(1)),
            json!({"answer": "jay"}),
        ))
        .await;

    assert!(matches!(
        outcome,
        Err(CompletionError::Store(TaskStoreError::TaskNotInProject { task_id, project_id }))
            if task_id == task.id() && project_id == other.id()
    ));
    assert_eq!(world.store.count_task_runs(world.project.id(), None).await?, 0);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn concurrent_final_runs_store_one_result(
    postgres_cluster: Result<PostgresCluster, BoxError>,
) -> Result<(), BoxError> {
    let world = Arc::new(StoreWorld::setup(postgres_cluster?).await?);
    let task = world.task(json!({"image": "finch.png"}), 1).await?;

    let handles: Vec<_> = (1..=6)
        .map(|user| {
            let world = Arc::clone(&world);
            let task_id = task.id();
            tokio::spawn(async move { world.submit(task_id, user).await.map_err(|err| err.to_string()) })
        })
        .collect();
    let mut completed = 0;
    for handle in handles {
        if matches!(handle.await??, CompletionOutcome::Completed(_)) {
            completed += 1;
        }
    }

    assert_eq!(completed, 1);
    assert_eq!(world.store.find_results(task.id()).await?.len(), 1);
    assert_eq!(world.store.count_task_runs(world.project.id(), Some(task.id())).await?, 6);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn payload_edits_leave_engine_columns_alone(
    postgres_cluster: Result<PostgresCluster, BoxError>,
) -> Result<(), BoxError> {
    let world = StoreWorld::setup(postgres_cluster?).await?;
    let project_id = world.project.id();
    let task = world.task(json!({"image": "gull.png"}), 1).await?;
    world.submit(task.id(), 1).await?;
    world.catalog.set_exported(task.id(), true).await?;

    world
        .engine
        .reevaluate_completion(project_id, 2, &TaskFilter::all())
        .await?;
    let edited = world
        .catalog
        .update_task_info(task.id(), json!({"image": "tern.png"}))
        .await?;

    assert_eq!(edited.info(), &json!({"image": "tern.png"}));
    assert_eq!(edited.state(), TaskState::Ongoing);
    assert!(!edited.exported());
    assert_eq!(world.reload(task.id()).await?, edited);
    Ok(())
}
