//! Renders compiled task filters into `PostgreSQL` conditions.
//!
//! Run counts and the latest finish time come from a per-task aggregate over
//! `task_run`, joined as `log_counts`. They exist only to evaluate
//! predicates.

use chrono::{DateTime, Utc};
use diesel::pg::Pg;
use diesel::query_builder::{BoxedSqlQuery, SqlQuery};
use diesel::sql_types::{BigInt, Double, Text, Timestamptz};

use crate::task::domain::{CompiledFilter, Condition};

/// A positional parameter value.
#[derive(Debug, Clone, PartialEq)]
pub(super) enum SqlBind {
    BigInt(i64),
    Double(f64),
    Timestamptz(DateTime<Utc>),
    Text(String),
}

/// SQL text plus the parameters it references, in order.
#[derive(Debug, Clone, Default, PartialEq)]
pub(super) struct RenderedSql {
    pub sql: String,
    pub binds: Vec<SqlBind>,
}

impl RenderedSql {
    /// Number of the next free positional parameter.
    pub(super) fn next_param(&self) -> usize {
        self.binds.len() + 1
    }

    fn push(&mut self, fragment: &str, bind: SqlBind) {
        let param = self.next_param();
        self.sql.push_str(&fragment.replace("{}", &format!("${param}")));
        self.binds.push(bind);
    }

    /// Adds a parameter without emitting SQL and returns its placeholder.
    pub(super) fn param(&mut self, bind: SqlBind) -> String {
        let placeholder = format!("${}", self.next_param());
        self.binds.push(bind);
        placeholder
    }

    /// Appends literal SQL.
    pub(super) fn sql(&mut self, fragment: &str) {
        self.sql.push_str(fragment);
    }

    /// Builds a boxed query with every parameter bound.
    pub(super) fn into_query(self) -> BoxedSqlQuery<'static, Pg, SqlQuery> {
        self.binds
            .into_iter()
            .fold(diesel::sql_query(self.sql).into_boxed::<Pg>(), |query, bind| {
                match bind {
                    SqlBind::BigInt(value) => query.bind::<BigInt, _>(value),
                    SqlBind::Double(value) => query.bind::<Double, _>(value),
                    SqlBind::Timestamptz(value) => query.bind::<Timestamptz, _>(value),
                    SqlBind::Text(value) => query.bind::<Text, _>(value),
                }
            })
    }
}

/// Starts a statement with the `filtered` CTE holding the ids of the
/// project's tasks that match `filter`. Parameter `$1` is the project id.
pub(super) fn filtered_cte(project_id: i64, filter: &CompiledFilter) -> RenderedSql {
    let mut rendered = RenderedSql::default();
    let project = rendered.param(SqlBind::BigInt(project_id));
    rendered.sql(&format!(
        "WITH filtered AS (SELECT task.id FROM task LEFT OUTER JOIN \
         (SELECT task_id, COUNT(id) AS ct, MAX(finish_time) AS ft FROM task_run \
         WHERE project_id = {project} GROUP BY task_id) AS log_counts \
         ON task.id = log_counts.task_id WHERE task.project_id = {project}"
    ));
    for condition in filter.conditions() {
        render_condition(&mut rendered, condition);
    }
    rendered.sql(") ");
    rendered
}

fn render_condition(rendered: &mut RenderedSql, condition: &Condition) {
    match condition {
        Condition::TaskId(op, value) => {
            rendered.push(&format!(" AND task.id {} {{}}", op.sql()), SqlBind::BigInt(*value));
        }
        Condition::Priority(op, value) => rendered.push(
            &format!(" AND task.priority_0 {} {{}}", op.sql()),
            SqlBind::Double(*value),
        ),
        Condition::Created(op, value) => rendered.push(
            &format!(" AND task.created {} {{}}", op.sql()),
            SqlBind::Timestamptz(*value),
        ),
        Condition::RunCount(op, value) => rendered.push(
            &format!(" AND COALESCE(log_counts.ct, 0) {} {{}}", op.sql()),
            SqlBind::BigInt(*value),
        ),
        Condition::FinishTime(op, value) => rendered.push(
            &format!(" AND log_counts.ft {} {{}}", op.sql()),
            SqlBind::Timestamptz(*value),
        ),
        Condition::FinishTimePresent(true) => rendered.sql(" AND log_counts.ft IS NOT NULL"),
        Condition::FinishTimePresent(false) => rendered.sql(" AND log_counts.ft IS NULL"),
        Condition::State(state) => rendered.push(
            " AND task.state = {}",
            SqlBind::Text(state.as_str().to_owned()),
        ),
        Condition::Text(query) => rendered.push(
            " AND to_tsvector('english', task.info::text) @@ plainto_tsquery('english', {})",
            SqlBind::Text(query.raw().to_owned()),
        ),
    }
}
