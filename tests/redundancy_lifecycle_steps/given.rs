//! Given steps for redundancy lifecycle BDD scenarios.

use super::world::{RedundancyWorld, run_async};
use crowdtally::task::{domain::TaskFilter, services::CreateTaskRequest};
use eyre::WrapErr;
use rstest_bdd_macros::given;
use serde_json::json;

#[given("a project with a task requiring {n_answers:u32} answers")]
fn project_with_task(world: &mut RedundancyWorld, n_answers: u32) -> Result<(), eyre::Report> {
    let request = CreateTaskRequest::new(world.project_id, json!({"image": "heron.jpg"}))
        .with_redundancy(n_answers);
    let task = run_async(world.catalog.create_task(request)).wrap_err("create scenario task")?;
    world.task = Some(task);
    Ok(())
}

#[given("the task has received {count:usize} runs")]
fn task_has_runs(world: &mut RedundancyWorld, count: usize) -> Result<(), eyre::Report> {
    for _ in 0..count {
        world.submit_run()?;
    }
    Ok(())
}

#[given("the project redundancy was raised to {n_answers:u32}")]
fn redundancy_was_raised(world: &mut RedundancyWorld, n_answers: u32) -> Result<(), eyre::Report> {
    run_async(
        world
            .engine
            .reevaluate_completion(world.project_id, n_answers, &TaskFilter::all()),
    )
    .wrap_err("raise redundancy in scenario setup")?;
    Ok(())
}
