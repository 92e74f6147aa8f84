//! Filter rendering, pagination and progress statistics in SQL.

use super::cluster::{BoxError, PostgresCluster, postgres_cluster};
use super::helpers::StoreWorld;
use crowdtally::project::domain::UserId;
use crowdtally::task::domain::{
    Contributor, FilterOperator, Order, Page, Task, TaskFilter, TaskId, TaskState,
};
use crowdtally::task::ports::{TaskRunQuery, TaskStore};
use crowdtally::task::services::{CreateTaskRequest, SubmitTaskRunRequest};
use rstest::rstest;
use serde_json::json;

/// Seeds three tasks: a completed sparrow, an answered robin and an
/// untouched wren.
async fn seed(world: &StoreWorld) -> Result<Vec<Task>, BoxError> {
    let project_id = world.project.id();
    let mut tasks = Vec::new();
    for (species, priority, n_answers) in [("sparrow", 0.2, 1), ("robin", 0.5, 2), ("wren", 0.9, 2)] {
        let request = CreateTaskRequest::new(project_id, json!({"species": species}))
            .with_priority(priority)
            .with_redundancy(n_answers);
        tasks.push(world.catalog.create_task(request).await?);
    }
    let ids: Vec<TaskId> = tasks.iter().map(Task::id).collect();
    if let [sparrow, robin, _] = ids.as_slice() {
        world.submit(*sparrow, 1).await?;
        world.submit(*robin, 2).await?;
    }
    Ok(tasks)
}

fn ids(tasks: &[Task]) -> Vec<TaskId> {
    tasks.iter().map(Task::id).collect()
}

#[rstest]
#[case::priority(TaskFilter::all().priority_between(0.4, 0.8), vec![1])]
#[case::answered(TaskFilter::all().run_count(FilterOperator::Ge, 1), vec![0, 1])]
#[case::unanswered(TaskFilter::all().run_count(FilterOperator::Eq, 0), vec![2])]
#[case::finished(TaskFilter::all().has_finish_time(true), vec![0, 1])]
#[case::never_finished(TaskFilter::all().has_finish_time(false), vec![2])]
#[case::completed(TaskFilter::all().state(TaskState::Completed), vec![0])]
#[case::ongoing(TaskFilter::all().state(TaskState::Ongoing), vec![1, 2])]
#[case::text(TaskFilter::all().text("sparrow"), vec![0])]
#[case::combined(
    TaskFilter::all().state(TaskState::Ongoing).run_count(FilterOperator::Gt, 0),
    vec![1]
)]
#[tokio::test(flavor = "multi_thread")]
async fn filters_select_matching_tasks(
    postgres_cluster: Result<PostgresCluster, BoxError>,
    #[case] filter: TaskFilter,
    #[case] expected: Vec<usize>,
) -> Result<(), BoxError> {
    let world = StoreWorld::setup(postgres_cluster?).await?;
    let tasks = seed(&world).await?;
    let project_id = world.project.id();
    let wanted: Vec<TaskId> = expected
        .iter()
        .filter_map(|index| tasks.get(*index).map(Task::id))
        .collect();

    let found = world.catalog.find_tasks(project_id, &filter, Page::all()).await?;
    let counted = world.catalog.count_tasks(project_id, &filter).await?;

    assert_eq!(ids(&found), wanted);
    assert_eq!(counted, u64::try_from(wanted.len())?);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn pages_walk_keysets_and_newest_first(
    postgres_cluster: Result<PostgresCluster, BoxError>,
) -> Result<(), BoxError> {
    let world = StoreWorld::setup(postgres_cluster?).await?;
    let tasks = seed(&world).await?;
    let project_id = world.project.id();
    let all = ids(&tasks);
    let filter = TaskFilter::all();

    let first_id = all.first().ok_or("no tasks")?.value();
    let after = world
        .catalog
        .find_tasks(project_id, &filter, Page::first(5)?.after(first_id))
        .await?;
    assert_eq!(ids(&after), all.get(1..).ok_or("short seed")?.to_vec());

    let newest = world
        .catalog
        .find_tasks(
            project_id,
            &filter,
            Page::first(2)?.ordered_by(Order::CreatedDescending).with_offset(1),
        )
        .await?;
    let expected: Vec<TaskId> = all.iter().rev().skip(1).take(2).copied().collect();
    assert_eq!(ids(&newest), expected);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn progress_counts_distinct_contributors(
    postgres_cluster: Result<PostgresCluster, BoxError>,
) -> Result<(), BoxError> {
    let world = StoreWorld::setup(postgres_cluster?).await?;
    let tasks = seed(&world).await?;
    let project_id = world.project.id();
    let wren = tasks.get(2).ok_or("no wren task")?.id();
    world.submit(wren, 1).await?;
    world
        .engine
        .submit_task_run(SubmitTaskRunRequest::new(
            project_id,
            wren,
            Contributor::anonymous("203.0.113.9")?,
            json!({"answer": "wren"}),
        ))
        .await?;

    let progress = world.catalog.progress(project_id).await?;

    assert_eq!(progress.n_tasks, 3);
    assert_eq!(progress.n_completed_tasks, 2);
    assert_eq!(progress.n_task_runs, 4);
    assert_eq!(progress.n_contributors, 3);
    assert!(progress.last_activity.is_some());

    let by_user = world
        .catalog
        .find_task_runs(
            project_id,
            &TaskRunQuery::all().by(Contributor::User(UserId::new(1))),
        )
        .await?;
    assert_eq!(by_user.len(), 2);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn completed_run_listing_respects_the_export_flag(
    postgres_cluster: Result<PostgresCluster, BoxError>,
) -> Result<(), BoxError> {
    let world = StoreWorld::setup(postgres_cluster?).await?;
    let tasks = seed(&world).await?;
    let project_id = world.project.id();
    let sparrow = tasks.first().ok_or("no sparrow task")?.id();

    let pending = world
        .store
        .find_completed_task_runs(project_id, Some(false), Page::all())
        .await?;
    assert_eq!(pending.len(), 1);

    world.catalog.set_exported(sparrow, true).await?;
    let pending = world
        .store
        .find_completed_task_runs(project_id, Some(false), Page::all())
        .await?;
    let exported = world
        .store
        .find_completed_task_runs(project_id, Some(true), Page::all())
        .await?;
    assert!(pending.is_empty());
    assert_eq!(exported.len(), 1);
    assert_eq!(
        world.store.find_project_results(project_id, true, Page::all()).await?.len(),
        1
    );
    Ok(())
}
