//! Then steps for redundancy lifecycle BDD scenarios.

use super::world::{RedundancyWorld, run_async};
use crowdtally::task::domain::TaskState;
use eyre::WrapErr;
use rstest_bdd_macros::then;

#[then(r#"the task state is "{state}""#)]
fn task_state_is(world: &RedundancyWorld, state: String) -> Result<(), eyre::Report> {
    let expected = TaskState::try_from(state.as_str())
        .map_err(|err| eyre::eyre!("invalid expected state in scenario: {err}"))?;
    let task = world.reload_task()?;
    if task.state() != expected {
        return Err(eyre::eyre!(
            "expected state {expected}, found {}",
            task.state()
        ));
    }
    Ok(())
}

#[then("the task has no current result")]
fn no_current_result(world: &RedundancyWorld) -> Result<(), eyre::Report> {
    let task = world.reload_task()?;
    let current =
        run_async(world.catalog.current_result(task.id())).wrap_err("load current result")?;
    if let Some(result) = current {
        return Err(eyre::eyre!("expected no current result, found {result:?}"));
    }
    Ok(())
}

#[then("the current result references every run")]
fn current_result_references_runs(world: &RedundancyWorld) -> Result<(), eyre::Report> {
    let task = world.reload_task()?;
    let current = run_async(world.catalog.current_result(task.id()))
        .wrap_err("load current result")?
        .ok_or_else(|| eyre::eyre!("expected a current result"))?;
    if !current.last_version() {
        return Err(eyre::eyre!("current result is not the last version"));
    }
    if current.task_run_ids() != world.submitted_runs.as_slice() {
        return Err(eyre::eyre!(
            "result references {:?}, expected {:?}",
            current.task_run_ids(),
            world.submitted_runs
        ));
    }
    Ok(())
}

#[then("the task requires {n_answers:u32} answers")]
fn task_requires(world: &RedundancyWorld, n_answers: u32) -> Result<(), eyre::Report> {
    let task = world.reload_task()?;
    if task.n_answers().value() != n_answers {
        return Err(eyre::eyre!(
            "expected {n_answers} answers, found {}",
            task.n_answers().value()
        ));
    }
    Ok(())
}

#[then("the task has {count:usize} result row")]
fn result_rows(world: &RedundancyWorld, count: usize) -> Result<(), eyre::Report> {
    let task = world.reload_task()?;
    let results = run_async(world.catalog.results(task.id())).wrap_err("load results")?;
    if results.len() != count {
        return Err(eyre::eyre!(
            "expected {count} result rows, found {}",
            results.len()
        ));
    }
    Ok(())
}

#[then("the task priority is {priority:f64}")]
fn task_priority_is(world: &RedundancyWorld, priority: f64) -> Result<(), eyre::Report> {
    let task = world.reload_task()?;
    if (task.priority().value() - priority).abs() > f64::EPSILON {
        return Err(eyre::eyre!(
            "expected priority {priority}, found {}",
            task.priority().value()
        ));
    }
    Ok(())
}
