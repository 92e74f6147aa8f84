//! When steps for redundancy lifecycle BDD scenarios.

use super::world::{RedundancyWorld, run_async};
use crowdtally::task::domain::TaskFilter;
use eyre::WrapErr;
use rstest_bdd_macros::when;

#[when("a contributor submits a run")]
fn contributor_submits(world: &mut RedundancyWorld) -> Result<(), eyre::Report> {
    world.submit_run()
}

#[when("the project redundancy is set to {n_answers:u32}")]
fn set_redundancy(world: &mut RedundancyWorld, n_answers: u32) -> Result<(), eyre::Report> {
    run_async(
        world
            .engine
            .reevaluate_completion(world.project_id, n_answers, &TaskFilter::all()),
    )
    .wrap_err("re-evaluate completion")?;
    Ok(())
}

#[when("the project priority is set to {priority:f64}")]
fn set_priority(world: &mut RedundancyWorld, priority: f64) -> Result<(), eyre::Report> {
    run_async(
        world
            .engine
            .update_priority(world.project_id, priority, &TaskFilter::all()),
    )
    .wrap_err("update priority")?;
    Ok(())
}
