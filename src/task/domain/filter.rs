//! Typed task filters.
//!
//! A [`TaskFilter`] is a conjunction of `(field, operator, value)`
//! predicates. [`TaskFilter::compile`] validates every predicate once and
//! yields a [`CompiledFilter`] that adapters either evaluate directly or
//! render into their native query language. Every engine operation goes
//! through the same compiled form, so filters mean the same thing
//! everywhere.

use super::{Priority, TaskDomainError, TaskId, TaskState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;

/// Task attribute a predicate can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterField {
    /// Task identifier.
    TaskId,
    /// Scheduling priority.
    Priority,
    /// Task creation timestamp.
    Created,
    /// Number of task runs stored for the task.
    RunCount,
    /// Latest finish time among the task's runs, absent without runs.
    FinishTime,
    /// Completion state.
    State,
    /// Full-text search over the task payload.
    Text,
}

impl FilterField {
    /// Returns the field name used in messages and parameters.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TaskId => "task_id",
            Self::Priority => "priority",
            Self::Created => "created",
            Self::RunCount => "n_task_runs",
            Self::FinishTime => "finish_time",
            Self::State => "state",
            Self::Text => "text",
        }
    }
}

impl fmt::Display for FilterField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Predicate operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    /// Equal to the value.
    Eq,
    /// Strictly less than the value.
    Lt,
    /// Less than or equal to the value.
    Le,
    /// Strictly greater than the value.
    Gt,
    /// Greater than or equal to the value.
    Ge,
    /// The attribute is absent.
    IsNull,
    /// The attribute is present.
    IsNotNull,
    /// The payload matches every search term.
    Matches,
}

impl FilterOperator {
    /// Returns the operator symbol.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::IsNull => "is null",
            Self::IsNotNull => "is not null",
            Self::Matches => "matches",
        }
    }

    const fn comparison(self) -> Option<Comparison> {
        match self {
            Self::Eq => Some(Comparison::Eq),
            Self::Lt => Some(Comparison::Lt),
            Self::Le => Some(Comparison::Le),
            Self::Gt => Some(Comparison::Gt),
            Self::Ge => Some(Comparison::Ge),
            Self::IsNull | Self::IsNotNull | Self::Matches => None,
        }
    }
}

/// Value carried by a predicate.
///
/// Serialised externally tagged (`{"text": "completed"}`) so a search term
/// that reads like a state or a timestamp keeps its kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterValue {
    /// Integer value.
    Integer(i64),
    /// Floating-point value.
    Float(f64),
    /// Timestamp value.
    Timestamp(DateTime<Utc>),
    /// Task state value.
    State(TaskState),
    /// Text value.
    Text(String),
}

/// A single `(field, operator, value)` node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
    /// Targeted attribute.
    pub field: FilterField,
    /// Operator.
    pub operator: FilterOperator,
    /// Operand; absent for presence checks.
    #[serde(default)]
    pub value: Option<FilterValue>,
}

impl Predicate {
    /// Creates a predicate.
    #[must_use]
    pub const fn new(
        field: FilterField,
        operator: FilterOperator,
        value: Option<FilterValue>,
    ) -> Self {
        Self {
            field,
            operator,
            value,
        }
    }
}

/// Unvalidated conjunction of predicates. Empty means "all tasks".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskFilter {
    predicates: Vec<Predicate>,
}

impl TaskFilter {
    /// Creates a filter that matches every task.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            predicates: Vec::new(),
        }
    }

    /// Adds an arbitrary predicate.
    #[must_use]
    pub fn with(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    /// Restricts the task identifier.
    #[must_use]
    pub fn task_id(self, operator: FilterOperator, id: TaskId) -> Self {
        self.with(Predicate::new(
            FilterField::TaskId,
            operator,
            Some(FilterValue::Integer(id.value())),
        ))
    }

    /// Restricts priority to the inclusive range `[min, max]`.
    #[must_use]
    pub fn priority_between(self, min: f64, max: f64) -> Self {
        self.with(Predicate::new(
            FilterField::Priority,
            FilterOperator::Ge,
            Some(FilterValue::Float(min)),
        ))
        .with(Predicate::new(
            FilterField::Priority,
            FilterOperator::Le,
            Some(FilterValue::Float(max)),
        ))
    }

    /// Keeps tasks created at or after `from`.
    #[must_use]
    pub fn created_from(self, from: DateTime<Utc>) -> Self {
        self.with(Predicate::new(
            FilterField::Created,
            FilterOperator::Ge,
            Some(FilterValue::Timestamp(from)),
        ))
    }

    /// Keeps tasks created strictly before `to`.
    #[must_use]
    pub fn created_before(self, to: DateTime<Utc>) -> Self {
        self.with(Predicate::new(
            FilterField::Created,
            FilterOperator::Lt,
            Some(FilterValue::Timestamp(to)),
        ))
    }

    /// Restricts the number of stored task runs.
    #[must_use]
    pub fn run_count(self, operator: FilterOperator, count: i64) -> Self {
        self.with(Predicate::new(
            FilterField::RunCount,
            operator,
            Some(FilterValue::Integer(count)),
        ))
    }

    /// Restricts the latest run finish time.
    #[must_use]
    pub fn finish_time(self, operator: FilterOperator, at: DateTime<Utc>) -> Self {
        self.with(Predicate::new(
            FilterField::FinishTime,
            operator,
            Some(FilterValue::Timestamp(at)),
        ))
    }

    /// Keeps tasks with (`true`) or without (`false`) any finished run.
    #[must_use]
    pub fn has_finish_time(self, present: bool) -> Self {
        let operator = if present {
            FilterOperator::IsNotNull
        } else {
            FilterOperator::IsNull
        };
        self.with(Predicate::new(FilterField::FinishTime, operator, None))
    }

    /// Keeps tasks in `state`.
    #[must_use]
    pub fn state(self, state: TaskState) -> Self {
        self.with(Predicate::new(
            FilterField::State,
            FilterOperator::Eq,
            Some(FilterValue::State(state)),
        ))
    }

    /// Keeps tasks whose payload contains every term of `query`.
    #[must_use]
    pub fn text(self, query: impl Into<String>) -> Self {
        self.with(Predicate::new(
            FilterField::Text,
            FilterOperator::Matches,
            Some(FilterValue::Text(query.into())),
        ))
    }

    /// Returns the predicates.
    #[must_use]
    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    /// Returns `true` when the filter matches every task.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Validates the predicates and compiles them.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError`] when a predicate uses an operator its
    /// field does not support, carries a value of the wrong type, has a
    /// non-finite bound, or is an empty text search.
    pub fn compile(&self) -> Result<CompiledFilter, TaskDomainError> {
        let conditions = self
            .predicates
            .iter()
            .map(compile_predicate)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(CompiledFilter { conditions })
    }
}

/// Comparison applied by a compiled condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparison {
    /// `=`
    Eq,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

impl Comparison {
    /// Returns the SQL operator.
    #[must_use]
    pub const fn sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }

    /// Evaluates `left <op> right`.
    #[must_use]
    pub fn holds<T: PartialOrd>(self, left: &T, right: &T) -> bool {
        match self {
            Self::Eq => left == right,
            Self::Lt => left < right,
            Self::Le => left <= right,
            Self::Gt => left > right,
            Self::Ge => left >= right,
        }
    }
}

/// A validated, typed condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Compare the task identifier.
    TaskId(Comparison, i64),
    /// Compare the priority.
    Priority(Comparison, f64),
    /// Compare the creation timestamp.
    Created(Comparison, DateTime<Utc>),
    /// Compare the number of stored runs.
    RunCount(Comparison, i64),
    /// Compare the latest run finish time; tasks without runs never match.
    FinishTime(Comparison, DateTime<Utc>),
    /// Require presence (`true`) or absence (`false`) of a finish time.
    FinishTimePresent(bool),
    /// Require a completion state.
    State(TaskState),
    /// Require every search term in the payload.
    Text(TextQuery),
}

/// Normalised full-text query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextQuery {
    raw: String,
    terms: Vec<String>,
}

impl TextQuery {
    fn parse(raw: &str) -> Result<Self, TaskDomainError> {
        let terms = tokenize(raw);
        if terms.is_empty() {
            return Err(TaskDomainError::EmptyTextSearch);
        }
        Ok(Self {
            raw: raw.trim().to_owned(),
            terms,
        })
    }

    /// Returns the query as entered, trimmed.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Returns the lowercase search terms.
    #[must_use]
    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    fn matches(&self, info: &Value) -> bool {
        let words: HashSet<String> = tokenize(&info.to_string()).into_iter().collect();
        self.terms.iter().all(|term| words.contains(term))
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|ch: char| !ch.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Attributes a compiled filter is evaluated against.
#[derive(Debug, Clone, Copy)]
pub struct TaskFacts<'a> {
    /// Task identifier.
    pub id: TaskId,
    /// Scheduling priority.
    pub priority: Priority,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Number of stored runs.
    pub run_count: usize,
    /// Latest run finish time.
    pub finish_time: Option<DateTime<Utc>>,
    /// Completion state.
    pub state: TaskState,
    /// Task payload.
    pub info: &'a Value,
}

/// Validated filter ready for evaluation or rendering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledFilter {
    conditions: Vec<Condition>,
}

impl CompiledFilter {
    /// Returns a filter that matches every task.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            conditions: Vec::new(),
        }
    }

    /// Returns the conditions in declaration order.
    #[must_use]
    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// Returns `true` when the filter matches every task.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Returns `true` when the task satisfies every condition.
    #[must_use]
    pub fn matches(&self, facts: &TaskFacts<'_>) -> bool {
        self.conditions.iter().all(|condition| match condition {
            Condition::TaskId(op, value) => op.holds(&facts.id.value(), value),
            Condition::Priority(op, value) => op.holds(&facts.priority.value(), value),
            Condition::Created(op, value) => op.holds(&facts.created_at, value),
            Condition::RunCount(op, value) => {
                let count = i64::try_from(facts.run_count).unwrap_or(i64::MAX);
                op.holds(&count, value)
            }
            Condition::FinishTime(op, value) => facts
                .finish_time
                .is_some_and(|finish_time| op.holds(&finish_time, value)),
            Condition::FinishTimePresent(present) => facts.finish_time.is_some() == *present,
            Condition::State(state) => facts.state == *state,
            Condition::Text(query) => query.matches(facts.info),
        })
    }
}

fn compile_predicate(predicate: &Predicate) -> Result<Condition, TaskDomainError> {
    let field = predicate.field;
    let unsupported = || TaskDomainError::UnsupportedOperator {
        field,
        operator: predicate.operator.symbol(),
    };
    let mismatch = |expected: &'static str| TaskDomainError::FilterValueMismatch { field, expected };

    match (field, predicate.operator) {
        (FilterField::FinishTime, FilterOperator::IsNull | FilterOperator::IsNotNull) => {
            if predicate.value.is_some() {
                return Err(mismatch("no value for a presence check"));
            }
            Ok(Condition::FinishTimePresent(
                predicate.operator == FilterOperator::IsNotNull,
            ))
        }
        (FilterField::State, FilterOperator::Eq) => match &predicate.value {
            Some(FilterValue::State(state)) => Ok(Condition::State(*state)),
            Some(FilterValue::Text(raw)) => TaskState::try_from(raw.as_str())
                .map(Condition::State)
                .map_err(|_| mismatch("'ongoing' or 'completed'")),
            _ => Err(mismatch("'ongoing' or 'completed'")),
        },
        (FilterField::Text, FilterOperator::Matches) => match &predicate.value {
            Some(FilterValue::Text(raw)) => TextQuery::parse(raw).map(Condition::Text),
            _ => Err(mismatch("a search string")),
        },
        (FilterField::State | FilterField::Text, _) => Err(unsupported()),
        (_, operator) => {
            let comparison = operator.comparison().ok_or_else(unsupported)?;
            compile_comparison(field, comparison, predicate.value.as_ref())
        }
    }
}

fn compile_comparison(
    field: FilterField,
    comparison: Comparison,
    value: Option<&FilterValue>,
) -> Result<Condition, TaskDomainError> {
    let mismatch = |expected: &'static str| TaskDomainError::FilterValueMismatch { field, expected };
    match field {
        FilterField::TaskId | FilterField::RunCount => {
            let Some(FilterValue::Integer(number)) = value else {
                return Err(mismatch("an integer"));
            };
            Ok(if field == FilterField::TaskId {
                Condition::TaskId(comparison, *number)
            } else {
                Condition::RunCount(comparison, *number)
            })
        }
        FilterField::Priority => {
            let bound = match value {
                Some(FilterValue::Float(number)) => *number,
                Some(FilterValue::Integer(number)) => number_as_f64(*number),
                _ => return Err(mismatch("a number")),
            };
            if !bound.is_finite() {
                return Err(TaskDomainError::NonFiniteFilterBound(field));
            }
            Ok(Condition::Priority(comparison, bound))
        }
        FilterField::Created | FilterField::FinishTime => {
            let Some(FilterValue::Timestamp(at)) = value else {
                return Err(mismatch("a timestamp"));
            };
            Ok(if field == FilterField::Created {
                Condition::Created(comparison, *at)
            } else {
                Condition::FinishTime(comparison, *at)
            })
        }
        FilterField::State | FilterField::Text => Err(TaskDomainError::UnsupportedOperator {
            field,
            operator: "comparison",
        }),
    }
}

#[expect(
    clippy::cast_precision_loss,
    reason = "priority bounds given as integers are 0 or 1 in practice"
)]
const fn number_as_f64(number: i64) -> f64 {
    number as f64
}

/// Attribute-to-range mapping accepted from request parameters and the
/// admin CLI.
///
/// Every populated field adds one predicate; ranges are inclusive at the
/// lower end and exclusive at the upper end for timestamps, inclusive at
/// both ends for numbers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FilterParams {
    /// Exact task identifier.
    pub task_id: Option<i64>,
    /// Lowest priority.
    pub priority_from: Option<f64>,
    /// Highest priority.
    pub priority_to: Option<f64>,
    /// Earliest creation timestamp.
    pub created_from: Option<DateTime<Utc>>,
    /// Creation timestamp upper bound.
    pub created_to: Option<DateTime<Utc>>,
    /// Fewest stored runs.
    pub n_task_runs_from: Option<i64>,
    /// Most stored runs.
    pub n_task_runs_to: Option<i64>,
    /// Earliest latest-finish time.
    pub finish_time_from: Option<DateTime<Utc>>,
    /// Latest-finish time upper bound.
    pub finish_time_to: Option<DateTime<Utc>>,
    /// Presence of a finish time.
    pub has_finish_time: Option<bool>,
    /// Completion state.
    pub state: Option<TaskState>,
    /// Full-text search string.
    pub text: Option<String>,
}

impl From<FilterParams> for TaskFilter {
    fn from(params: FilterParams) -> Self {
        let mut filter = Self::all();
        let mut push = |field, operator, value| {
            filter.predicates.push(Predicate::new(field, operator, value));
        };
        if let Some(id) = params.task_id {
            push(FilterField::TaskId, FilterOperator::Eq, Some(FilterValue::Integer(id)));
        }
        if let Some(min) = params.priority_from {
            push(FilterField::Priority, FilterOperator::Ge, Some(FilterValue::Float(min)));
        }
        if let Some(max) = params.priority_to {
            push(FilterField::Priority, FilterOperator::Le, Some(FilterValue::Float(max)));
        }
        if let Some(from) = params.created_from {
            push(FilterField::Created, FilterOperator::Ge, Some(FilterValue::Timestamp(from)));
        }
        if let Some(to) = params.created_to {
            push(FilterField::Created, FilterOperator::Lt, Some(FilterValue::Timestamp(to)));
        }
        if let Some(min) = params.n_task_runs_from {
            push(FilterField::RunCount, FilterOperator::Ge, Some(FilterValue::Integer(min)));
        }
        if let Some(max) = params.n_task_runs_to {
            push(FilterField::RunCount, FilterOperator::Le, Some(FilterValue::Integer(max)));
        }
        if let Some(from) = params.finish_time_from {
            push(FilterField::FinishTime, FilterOperator::Ge, Some(FilterValue::Timestamp(from)));
        }
        if let Some(to) = params.finish_time_to {
            push(FilterField::FinishTime, FilterOperator::Lt, Some(FilterValue::Timestamp(to)));
        }
        if let Some(present) = params.has_finish_time {
            let operator = if present {
                FilterOperator::IsNotNull
            } else {
                FilterOperator::IsNull
            };
            push(FilterField::FinishTime, operator, None);
        }
        if let Some(state) = params.state {
            push(FilterField::State, FilterOperator::Eq, Some(FilterValue::State(state)));
        }
        if let Some(text) = params.text {
            push(FilterField::Text, FilterOperator::Matches, Some(FilterValue::Text(text)));
        }
        filter
    }
}
