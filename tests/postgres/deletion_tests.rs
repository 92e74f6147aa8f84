//! Cascading deletes scoped to their project.

use super::cluster::{BoxError, PostgresCluster, postgres_cluster};
use super::helpers::StoreWorld;
use crowdtally::task::adapters::memory::CacheSignal;
use crowdtally::task::domain::{CompiledFilter, TaskFilter, TaskState};
use crowdtally::task::ports::{CompletionUnit, DeletionCounts, TaskStore};
use rstest::rstest;
use serde_json::json;

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn deleting_a_task_removes_its_runs_and_results(
    postgres_cluster: Result<PostgresCluster, BoxError>,
) -> Result<(), BoxError> {
    let world = StoreWorld::setup(postgres_cluster?).await?;
    let project_id = world.project.id();
    let task = world.task(json!({"image": "kite.png"}), 2).await?;
    world.submit(task.id(), 1).await?;
    world.submit(task.id(), 2).await?;

    let counts = world.store.delete_task(project_id, task.id()).await?;

    assert_eq!(
        counts,
        Some(DeletionCounts {
            tasks: 1,
            task_runs: 2,
            results: 1,
        })
    );
    assert!(world.store.find_task(task.id()).await?.is_none());
    assert_eq!(world.store.count_task_runs(project_id, None).await?, 0);
    assert!(world.store.find_results(task.id()).await?.is_empty());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn deletes_ignore_tasks_of_other_projects(
    postgres_cluster: Result<PostgresCluster, BoxError>,
) -> Result<(), BoxError> {
    let world = StoreWorld::setup(postgres_cluster?).await?;
    let other = world.other_project().await?;
    let other_id = other.id();
    let task = world.task(json!({"image": "heron.png"}), 1).await?;

    assert!(world.store.delete_task(other_id, task.id()).await?.is_none());
    let counts = world
        .store
        .transaction(move |unit: &mut dyn CompletionUnit| {
            unit.delete_tasks(other_id, &CompiledFilter::all(), true)
        })
        .await?;

    assert_eq!(counts, DeletionCounts::default());
    assert!(world.store.find_task(task.id()).await?.is_some());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn bulk_deletion_keeps_answered_tasks_unless_forced(
    postgres_cluster: Result<PostgresCluster, BoxError>,
) -> Result<(), BoxError> {
    let world = StoreWorld::setup(postgres_cluster?).await?;
    let project_id = world.project.id();
    let done = world.task(json!({"image": "owl.png"}), 1).await?;
    let fresh = world.task(json!({"image": "lark.png"}), 1).await?;
    world.submit(done.id(), 1).await?;

    let soft = world
        .store
        .transaction(move |unit: &mut dyn CompletionUnit| {
            unit.delete_tasks(project_id, &CompiledFilter::all(), false)
        })
        .await?;
    assert_eq!(soft.tasks, 1);
    assert!(world.store.find_task(fresh.id()).await?.is_none());
    let kept = world.store.find_task(done.id()).await?.ok_or("answered task deleted")?;
    assert_eq!(kept.state(), TaskState::Completed);

    let filter = TaskFilter::all().state(TaskState::Completed).compile()?;
    let forced = world
        .store
        .transaction(move |unit: &mut dyn CompletionUnit| unit.delete_tasks(project_id, &filter, true))
        .await?;
    assert_eq!(
        forced,
        DeletionCounts {
            tasks: 1,
            task_runs: 1,
            results: 1,
        }
    );
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn deleting_project_runs_keeps_tasks_and_results(
    postgres_cluster: Result<PostgresCluster, BoxError>,
) -> Result<(), BoxError> {
    let world = StoreWorld::setup(postgres_cluster?).await?;
    let project_id = world.project.id();
    let task = world.task(json!({"image": "swift.png"}), 1).await?;
    world.submit(task.id(), 1).await?;
    let signals_before = world.cache.signals().len();

    let deleted = world.store.delete_project_task_runs(project_id).await?;

    assert_eq!(deleted, 1);
    assert!(world.store.find_task(task.id()).await?.is_some());
    assert_eq!(world.store.find_results(task.id()).await?.len(), 1);
    assert_eq!(world.cache.signals().len(), signals_before);
    assert!(
        world
            .cache
            .signals()
            .iter()
            .all(|signal| matches!(signal, CacheSignal::Project(id) if *id == project_id))
    );
    Ok(())
}
