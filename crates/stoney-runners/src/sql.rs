// crates/stoney-runners/src/sql.rs
// ============================================================================
// Module: Database Step Runner
// Description: Executes SQL steps against PostgreSQL.
// Purpose: Assert database state with row counts and first-row patterns.
// Dependencies: serde_json, stoney-core, tokio, tokio-postgres
// ============================================================================

//! ## Overview
//! The connection string is read from the environment variable the step
//! names; an unset variable fails the step before any connection attempt.
//! Each attempt opens its own session, runs the statement, and releases the
//! session on every exit path. Connect, timeout, and cancellation abort the
//! session (and ask the server to cancel a running query); an error reported
//! by the server for the statement itself is permanent.
//!
//! Statements run through the simple query protocol, so query text may hold
//! several statements; the last one decides the row count and first row.
//! Statements with result columns count returned rows; statements without
//! them count affected rows. Values arrive in PostgreSQL text form. When the
//! text is a single statement its column types are described first, and
//! booleans, integers, floats and JSON map to typed JSON values; every other
//! type (numeric, uuid, dates and times, arrays) keeps its text form.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use serde_json::Map;
use serde_json::Value;
use stoney_core::EnvLookup;
use stoney_core::SqlExpectation;
use stoney_core::SqlStep;
use stoney_core::StepKind;
use stoney_core::StepResult;
use stoney_core::deep_subset_match;
use tokio::time::Instant;
use tokio_postgres::Client;
use tokio_postgres::NoTls;
use tokio_postgres::SimpleQueryMessage;
use tokio_postgres::SimpleQueryRow;
use tokio_postgres::types::Type;

use crate::cancel::CancelSignal;
use crate::cancel::Interrupt;
use crate::cancel::race;
use crate::executor::StepContext;
use crate::policy::AttemptError;
use crate::policy::run_with_retry;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Upper bound on the server-side cancel request after a timeout.
const CANCEL_GRACE: Duration = Duration::from_secs(2);

// ============================================================================
// SECTION: Runner
// ============================================================================

/// Database step runner.
#[derive(Clone)]
pub struct SqlRunner {
    /// Environment used to resolve `url_env`.
    env: Arc<dyn EnvLookup>,
}

/// Completed statement outcome.
#[derive(Debug, Default)]
struct QueryOutcome {
    /// Rows returned or affected by the last statement.
    rows: u64,
    /// First row returned by the last statement as a JSON object.
    first_row: Option<Value>,
    /// First row of the statement still in progress.
    pending_row: Option<Value>,
}

impl QueryOutcome {
    /// Records a returned row; only the first row of a statement is kept.
    fn row(&mut self, convert: impl FnOnce() -> Value) {
        if self.pending_row.is_none() {
            self.pending_row = Some(convert());
        }
    }

    /// Closes the current statement with its row count.
    fn complete(&mut self, rows: u64) {
        self.rows = rows;
        self.first_row = self.pending_row.take();
    }
}

impl SqlRunner {
    /// Creates a runner resolving connection strings through `env`.
    #[must_use]
    pub fn new(env: Arc<dyn EnvLookup>) -> Self {
        Self {
            env,
        }
    }

    /// Executes one SQL step.
    pub async fn execute(
        &self,
        step: &SqlStep,
        expect: Option<&SqlExpectation>,
        ctx: &StepContext<'_>,
    ) -> StepResult {
        let title = format!("sql {} ({})", step.driver, step.url_env);
        let result = StepResult::new(StepKind::Sql, title.clone());
        let Some(url) = self.env.var(&step.url_env).filter(|url| !url.trim().is_empty()) else {
            return result.with_failure(format!(
                "Missing env var {}. Set it to the database connection string.",
                step.url_env
            ));
        };

        let policy = ctx.defaults.policy_for(StepKind::Sql, step.timeout_ms, step.retries);
        let url = url.as_str();
        let cancel = ctx.cancel;
        let attempted = run_with_retry(&policy, cancel, ctx.events, &title, move |_| {
            run_once(url, &step.query, policy.timeout, cancel)
        })
        .await;

        let result = result.with_attempts(attempted.attempts);
        match attempted.outcome {
            Ok(outcome) => evaluate(result, outcome, expect),
            Err(AttemptError::Cancelled) => result.with_failure("cancelled"),
            Err(err) => result.with_failure(format!("SQL error: {err}")),
        }
    }
}

/// Opens a session, runs the statement, and closes the session.
async fn run_once(
    url: &str,
    query: &str,
    timeout: Duration,
    cancel: &CancelSignal,
) -> Result<QueryOutcome, AttemptError> {
    let deadline = Instant::now() + timeout;
    let (client, connection) = match race(tokio_postgres::connect(url, NoTls), timeout, cancel).await {
        Ok(Ok(session)) => session,
        Ok(Err(err)) => return Err(AttemptError::Transient(format!("connection failed: {err}"))),
        Err(Interrupt::TimedOut) => {
            return Err(AttemptError::Transient(format!(
                "connection timeout after {}ms",
                timeout.as_millis()
            )));
        }
        Err(Interrupt::Cancelled) => return Err(AttemptError::Cancelled),
    };
    let driver = tokio::spawn(connection);

    let remaining = deadline.saturating_duration_since(Instant::now());
    let outcome = match race(execute_statement(&client, query), remaining, cancel).await {
        Ok(Ok(outcome)) => Ok(outcome),
        Ok(Err(err)) => Err(AttemptError::Permanent(server_error(&err))),
        Err(interrupt) => {
            let _ = tokio::time::timeout(CANCEL_GRACE, client.cancel_token().cancel_query(NoTls))
                .await;
            Err(match interrupt {
                Interrupt::TimedOut => {
                    AttemptError::Transient(format!("SQL timeout after {}ms", timeout.as_millis()))
                }
                Interrupt::Cancelled => AttemptError::Cancelled,
            })
        }
    };

    drop(client);
    driver.abort();
    outcome
}

/// Runs the query text and collects the last statement's outcome.
async fn execute_statement(client: &Client, query: &str) -> Result<QueryOutcome, tokio_postgres::Error> {
    // Describing fails for multi-statement text; those values stay untyped.
    let types: Option<Vec<Type>> = client
        .prepare(query)
        .await
        .ok()
        .map(|statement| statement.columns().iter().map(|column| column.type_().clone()).collect());
    let messages = client.simple_query(query).await?;
    let mut outcome = QueryOutcome::default();
    for message in &messages {
        match message {
            SimpleQueryMessage::Row(row) => outcome.row(|| row_to_json(row, types.as_deref())),
            SimpleQueryMessage::CommandComplete(rows) => outcome.complete(*rows),
            _ => {}
        }
    }
    Ok(outcome)
}

/// Formats a server error with its database message when present.
fn server_error(err: &tokio_postgres::Error) -> String {
    err.as_db_error().map_or_else(|| err.to_string(), |db| db.message().to_string())
}

// ============================================================================
// SECTION: Row Conversion
// ============================================================================

/// Converts a row to a JSON object keyed by column name.
fn row_to_json(row: &SimpleQueryRow, types: Option<&[Type]>) -> Value {
    let columns = row.columns();
    let types = types.filter(|types| types.len() == columns.len());
    let mut object = Map::new();
    for (index, column) in columns.iter().enumerate() {
        let text = row.try_get(index).ok().flatten();
        let column_type = types.and_then(|types| types.get(index));
        object.insert(column.name().to_string(), text_value(text, column_type));
    }
    Value::Object(object)
}

/// Maps one text-form value to JSON according to its column type.
fn text_value(text: Option<&str>, column_type: Option<&Type>) -> Value {
    let Some(text) = text else {
        return Value::Null;
    };
    let typed = match column_type {
        Some(column_type) if *column_type == Type::BOOL => match text {
            "t" => Some(Value::Bool(true)),
            "f" => Some(Value::Bool(false)),
            _ => None,
        },
        Some(column_type) if [Type::INT2, Type::INT4, Type::INT8].contains(column_type) => {
            text.parse::<i64>().ok().map(Value::from)
        }
        Some(column_type) if [Type::FLOAT4, Type::FLOAT8].contains(column_type) => {
            text.parse::<f64>().ok().and_then(serde_json::Number::from_f64).map(Value::Number)
        }
        Some(column_type) if [Type::JSON, Type::JSONB].contains(column_type) => {
            serde_json::from_str(text).ok()
        }
        _ => None,
    };
    typed.unwrap_or_else(|| Value::String(text.to_string()))
}

// ============================================================================
// SECTION: Evaluation
// ============================================================================

/// Checks a completed statement against the expectation.
fn evaluate(mut result: StepResult, outcome: QueryOutcome, expect: Option<&SqlExpectation>) -> StepResult {
    result.rows = Some(outcome.rows);
    let Some(expect) = expect else {
        return result;
    };
    if let Some(rows) = expect.rows
        && rows != outcome.rows
    {
        result = result.with_failure(format!("Expected rows {rows} but got {}.", outcome.rows));
    }
    if let Some(pattern) = &expect.equals {
        match &outcome.first_row {
            None => {
                result = result.with_failure(
                    "Expected equals match against first row, but query returned no rows.",
                );
            }
            Some(first) if !deep_subset_match(first, pattern) => {
                result = result.with_failure("Expected SQL first-row subset did not match.");
            }
            Some(_) => {}
        }
    }
    result
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::use_debug,
        reason = "Test assertions use expect/unwrap and debug output for clarity."
    )]

    use serde_json::json;
    use stoney_core::SqlExpectation;
    use stoney_core::StepKind;
    use stoney_core::StepResult;
    use tokio_postgres::types::Type;

    use super::QueryOutcome;
    use super::evaluate;
    use super::text_value;

    fn outcome(rows: u64, first_row: Option<serde_json::Value>) -> QueryOutcome {
        let mut outcome = QueryOutcome::default();
        if let Some(first_row) = first_row {
            outcome.row(|| first_row);
        }
        outcome.complete(rows);
        outcome
    }

    fn expectation(rows: Option<u64>, equals: Option<serde_json::Value>) -> SqlExpectation {
        SqlExpectation {
            rows,
            equals,
        }
    }

    fn step() -> StepResult {
        StepResult::new(StepKind::Sql, "sql postgres (DB_URL)")
    }

    #[test]
    fn typed_columns_map_to_json_values() {
        assert_eq!(text_value(Some("t"), Some(&Type::BOOL)), json!(true));
        assert_eq!(text_value(Some("f"), Some(&Type::BOOL)), json!(false));
        assert_eq!(text_value(Some("42"), Some(&Type::INT4)), json!(42));
        assert_eq!(text_value(Some("-7"), Some(&Type::INT8)), json!(-7));
        assert_eq!(text_value(Some("1.5"), Some(&Type::FLOAT8)), json!(1.5));
        assert_eq!(text_value(Some("{\"a\":[1,2]}"), Some(&Type::JSONB)), json!({"a": [1, 2]}));
        assert_eq!(text_value(Some("hello"), Some(&Type::TEXT)), json!("hello"));
        assert_eq!(text_value(None, Some(&Type::INT4)), serde_json::Value::Null);
    }

    #[test]
    fn other_types_keep_their_text_form() {
        let id = "4f9c2d3e-8b1a-4c5d-9e7f-0a1b2c3d4e5f";
        assert_eq!(text_value(Some(id), Some(&Type::UUID)), json!(id));
        assert_eq!(text_value(Some("10.50"), Some(&Type::NUMERIC)), json!("10.50"));
        assert_eq!(text_value(Some("2024-03-01"), Some(&Type::DATE)), json!("2024-03-01"));
        assert_eq!(
            text_value(Some("2024-03-01 10:00:00+00"), Some(&Type::TIMESTAMPTZ)),
            json!("2024-03-01 10:00:00+00")
        );
        assert_eq!(text_value(Some("{1,2}"), Some(&Type::INT4_ARRAY)), json!("{1,2}"));
        assert_eq!(text_value(Some("NaN"), Some(&Type::FLOAT8)), json!("NaN"));
        assert_eq!(text_value(Some("3"), None), json!("3"));
    }

    #[test]
    fn last_statement_decides_rows_and_first_row() {
        let mut outcome = QueryOutcome::default();
        outcome.row(|| json!({"id": 1}));
        outcome.row(|| json!({"id": 2}));
        outcome.complete(2);
        outcome.complete(5);

        assert_eq!(outcome.rows, 5);
        assert!(outcome.first_row.is_none());

        outcome.row(|| json!({"id": 9}));
        outcome.row(|| json!({"id": 10}));
        outcome.complete(2);
        assert_eq!(outcome.first_row, Some(json!({"id": 9})));
    }

    #[test]
    fn matching_rows_and_first_row_pass() {
        let result = evaluate(
            step(),
            outcome(2, Some(json!({"id": 1, "name": "ada", "total": "10"}))),
            Some(&expectation(Some(2), Some(json!({"name": "ada", "total": "10"})))),
        );

        assert!(result.ok, "{:?}", result.notes);
        assert_eq!(result.rows, Some(2));
    }

    #[test]
    fn row_count_mismatch_is_reported() {
        let result = evaluate(step(), outcome(3, None), Some(&expectation(Some(1), None)));

        assert!(!result.ok);
        assert_eq!(result.rows, Some(3));
        assert_eq!(result.notes, vec!["Expected rows 1 but got 3.".to_string()]);
    }

    #[test]
    fn equals_against_no_rows_fails() {
        let result =
            evaluate(step(), outcome(0, None), Some(&expectation(None, Some(json!({"id": 1})))));

        assert!(!result.ok);
        assert_eq!(
            result.notes,
            vec!["Expected equals match against first row, but query returned no rows.".to_string()]
        );
    }

    #[test]
    fn first_row_subset_mismatch_fails() {
        let result = evaluate(
            step(),
            outcome(1, Some(json!({"id": 1, "name": "ada"}))),
            Some(&expectation(None, Some(json!({"name": "grace"})))),
        );

        assert!(!result.ok);
        assert_eq!(result.notes, vec!["Expected SQL first-row subset did not match.".to_string()]);
    }

    #[test]
    fn affected_rows_count_for_statements_without_columns() {
        let result = evaluate(step(), outcome(4, None), Some(&expectation(Some(4), None)));

        assert!(result.ok, "{:?}", result.notes);
        assert_eq!(result.rows, Some(4));
    }

    #[test]
    fn no_expectation_records_rows_only() {
        let result = evaluate(step(), outcome(7, None), None);

        assert!(result.ok);
        assert_eq!(result.rows, Some(7));
        assert!(result.notes.is_empty());
    }
}
