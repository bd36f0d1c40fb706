// crates/stoney-core/src/loader.rs
// ============================================================================
// Module: Suite Loader
// Description: Validating loader for YAML/JSON suite documents.
// Purpose: Convert untrusted documents into immutable typed suites.
// Dependencies: serde_json, serde_yaml, thiserror
// ============================================================================

//! ## Overview
//! The loader is the boundary between untrusted input and the typed model.
//! Validation is fail-fast: the first violation aborts with a
//! [`SchemaError`] naming its location. Checks run in document order:
//! document shape, version, suite name, contracts, then each contract's
//! scenarios and steps. Duplicate scenario ids are rejected after a
//! contract's scenarios are built.
//!
//! Legacy scenarios carrying a single `http`/`exec`/`sql` field next to their
//! `expect` are normalized into a one-element `steps` list here.
//!
//! String fields in steps and expectations are interpolated after their
//! presence is checked and before their format is checked.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use serde_json::Map;
use serde_json::Value;
use thiserror::Error;

use crate::env::EnvLookup;
use crate::interpolate::interpolate;
use crate::interpolate::interpolate_str;
use crate::model::Contract;
use crate::model::ExecExpectation;
use crate::model::ExecStep;
use crate::model::HttpExpectation;
use crate::model::HttpStep;
use crate::model::Scenario;
use crate::model::SqlDriver;
use crate::model::SqlExpectation;
use crate::model::SqlStep;
use crate::model::Step;
use crate::model::SuiteDocument;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// The only suite schema version accepted.
pub const SUPPORTED_VERSION: u64 = 1;
/// Maximum suite file size in bytes.
const MAX_SUITE_FILE_BYTES: u64 = 4 * 1024 * 1024;
/// Step kind keys, in precedence order for diagnostics.
const STEP_KEYS: [&str; 3] = ["http", "exec", "sql"];

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Suite loading errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// Suite source could not be read.
    #[error("suite io error: {0}")]
    Io(String),
    /// Suite source is not valid YAML/JSON.
    #[error("suite parse error: {0}")]
    Parse(String),
    /// Suite document violates the schema.
    #[error("invalid suite: {0}")]
    Invalid(String),
}

/// Builds an [`SchemaError::Invalid`].
fn invalid(message: impl Into<String>) -> SchemaError {
    SchemaError::Invalid(message.into())
}

// ============================================================================
// SECTION: Source Formats
// ============================================================================

/// Suite source encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuiteFormat {
    /// YAML (also accepts JSON, which is a YAML subset).
    Yaml,
    /// Strict JSON.
    Json,
}

impl SuiteFormat {
    /// Selects the format from a file extension.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yml" | "yaml") => Some(Self::Yaml),
            Some("json") => Some(Self::Json),
            _ => None,
        }
    }
}

/// Parses raw text into an untyped document.
///
/// # Errors
///
/// Returns [`SchemaError::Parse`] when the text is not valid in `format`.
pub fn parse_document(text: &str, format: SuiteFormat) -> Result<Value, SchemaError> {
    match format {
        SuiteFormat::Yaml => {
            serde_yaml::from_str(text).map_err(|err| SchemaError::Parse(err.to_string()))
        }
        SuiteFormat::Json => {
            serde_json::from_str(text).map_err(|err| SchemaError::Parse(err.to_string()))
        }
    }
}

// ============================================================================
// SECTION: Entry Points
// ============================================================================

/// Loads and validates a suite file.
///
/// # Errors
///
/// Returns [`SchemaError`] when the file is missing, unreadable, of an
/// unsupported type, or invalid.
pub fn load_suite_file(path: &Path, env: &dyn EnvLookup) -> Result<SuiteDocument, SchemaError> {
    let format = SuiteFormat::from_path(path).ok_or_else(|| {
        SchemaError::Io(format!("unsupported file type: {}", path.display()))
    })?;
    let metadata = fs::metadata(path)
        .map_err(|err| SchemaError::Io(format!("suite file not found: {} ({err})", path.display())))?;
    if metadata.len() > MAX_SUITE_FILE_BYTES {
        return Err(SchemaError::Io(format!("suite file exceeds size limit: {}", path.display())));
    }
    let text = fs::read_to_string(path)
        .map_err(|err| SchemaError::Io(format!("failed to read {}: {err}", path.display())))?;
    load_suite_str(&text, format, env)
}

/// Loads and validates a suite from text.
///
/// # Errors
///
/// Returns [`SchemaError`] when the text fails to parse or validate.
pub fn load_suite_str(
    text: &str,
    format: SuiteFormat,
    env: &dyn EnvLookup,
) -> Result<SuiteDocument, SchemaError> {
    let document = parse_document(text, format)?;
    load_suite_value(&document, env)
}

/// Validates an already-parsed document.
///
/// # Errors
///
/// Returns [`SchemaError::Invalid`] on the first schema violation.
pub fn load_suite_value(document: &Value, env: &dyn EnvLookup) -> Result<SuiteDocument, SchemaError> {
    let Value::Object(root) = document else {
        return Err(invalid("suite document must be an object"));
    };

    let version = root.get("version");
    if version.and_then(Value::as_u64) != Some(SUPPORTED_VERSION) {
        return Err(invalid(format!(
            "unsupported version: {} (expected {SUPPORTED_VERSION})",
            describe(version)
        )));
    }

    let suite_name =
        non_empty_str(root.get("suite")).ok_or_else(|| invalid("suite must be a non-empty string"))?;

    let contracts = non_empty_array(root.get("contracts"))
        .ok_or_else(|| invalid("contracts must be a non-empty array"))?;

    let contracts = contracts
        .iter()
        .enumerate()
        .map(|(index, contract)| load_contract(index, contract, env))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(SuiteDocument {
        version: SUPPORTED_VERSION,
        suite_name: suite_name.to_string(),
        contracts,
    })
}

// ============================================================================
// SECTION: Contracts and Scenarios
// ============================================================================

/// Validates one contract and its scenarios.
fn load_contract(index: usize, value: &Value, env: &dyn EnvLookup) -> Result<Contract, SchemaError> {
    let Value::Object(map) = value else {
        return Err(invalid(format!("contracts[{index}] must be an object")));
    };
    let name = non_empty_str(map.get("name"))
        .ok_or_else(|| invalid(format!("contracts[{index}].name must be a non-empty string")))?;
    let scenarios = non_empty_array(map.get("scenarios"))
        .ok_or_else(|| invalid(format!("contracts[{index}].scenarios must be a non-empty array")))?;

    let scenarios = scenarios
        .iter()
        .enumerate()
        .map(|(scenario_index, scenario)| load_scenario(index, scenario_index, scenario, env))
        .collect::<Result<Vec<_>, _>>()?;

    let mut seen = BTreeSet::new();
    for scenario in &scenarios {
        if !seen.insert(scenario.id.as_str()) {
            return Err(invalid(format!(
                "duplicate scenario id in contract \"{name}\": {}",
                scenario.id
            )));
        }
    }

    Ok(Contract {
        name: name.to_string(),
        scenarios,
    })
}

/// Validates one scenario, normalizing the legacy single-step shape.
fn load_scenario(
    contract_index: usize,
    index: usize,
    value: &Value,
    env: &dyn EnvLookup,
) -> Result<Scenario, SchemaError> {
    let Value::Object(map) = value else {
        return Err(invalid(format!(
            "contracts[{contract_index}].scenarios[{index}] must be an object"
        )));
    };
    let id = non_empty_str(map.get("id")).ok_or_else(|| {
        invalid(format!("contracts[{contract_index}].scenarios[{index}].id is required"))
    })?;

    let legacy_keys = present_step_keys(map);
    let steps = match (map.get("steps"), legacy_keys.as_slice()) {
        (Some(_), [_, ..]) => {
            return Err(invalid(format!(
                "scenario {id}: use either steps or a single {} step, not both",
                legacy_keys.join("/")
            )));
        }
        (Some(steps), []) => {
            let steps = non_empty_array(Some(steps))
                .ok_or_else(|| invalid(format!("scenario {id}: steps must be a non-empty array")))?;
            steps
                .iter()
                .enumerate()
                .map(|(step_index, step)| {
                    let location = format!("scenario {id} steps[{step_index}]");
                    let Value::Object(step_map) = step else {
                        return Err(invalid(format!("{location} must be an object")));
                    };
                    load_step(&location, step_map, env)
                })
                .collect::<Result<Vec<_>, _>>()?
        }
        (None, [_]) => vec![load_step(&format!("scenario {id}"), map, env)?],
        (None, []) => {
            return Err(invalid(format!(
                "scenario {id}: steps must be a non-empty array (or provide one of http, exec, sql)"
            )));
        }
        (None, _) => {
            return Err(invalid(format!(
                "scenario {id}: exactly one of http, exec, sql is allowed (found {})",
                legacy_keys.join(", ")
            )));
        }
    };

    Ok(Scenario {
        id: id.to_string(),
        steps,
    })
}

/// Returns the step-kind keys present in a map.
fn present_step_keys(map: &Map<String, Value>) -> Vec<&'static str> {
    STEP_KEYS.into_iter().filter(|key| map.contains_key(*key)).collect()
}

// ============================================================================
// SECTION: Steps
// ============================================================================

/// Validates one step map (canonical step entry or legacy scenario body).
fn load_step(
    location: &str,
    map: &Map<String, Value>,
    env: &dyn EnvLookup,
) -> Result<Step, SchemaError> {
    let keys = present_step_keys(map);
    let [kind] = keys.as_slice() else {
        return Err(invalid(format!(
            "{location}: exactly one of http, exec, sql is required (found {})",
            if keys.is_empty() { "none".to_string() } else { keys.join(", ") }
        )));
    };

    let expect = match map.get("expect") {
        None | Some(Value::Null) => None,
        Some(Value::Object(expect)) => Some(expect),
        Some(_) => return Err(invalid(format!("{location}: expect must be an object"))),
    };

    let body = map.get(*kind).unwrap_or(&Value::Null);
    let Value::Object(body) = body else {
        return Err(invalid(format!("{location}: {kind} must be an object")));
    };

    match *kind {
        "http" => Ok(Step::Http {
            http: load_http(location, body, env)?,
            expect: expect.map(|expect| load_http_expectation(location, expect, env)).transpose()?,
        }),
        "exec" => Ok(Step::Exec {
            exec: load_exec(location, body, env)?,
            expect: expect.map(|expect| load_exec_expectation(location, expect, env)).transpose()?,
        }),
        _ => Ok(Step::Sql {
            sql: load_sql(location, body, env)?,
            expect: expect.map(|expect| load_sql_expectation(location, expect, env)).transpose()?,
        }),
    }
}

/// Validates an HTTP step body.
fn load_http(
    location: &str,
    map: &Map<String, Value>,
    env: &dyn EnvLookup,
) -> Result<HttpStep, SchemaError> {
    let method = non_empty_str(map.get("method"))
        .ok_or_else(|| invalid(format!("{location}: http.method is required")))?
        .to_ascii_uppercase();
    if !method.bytes().all(|byte| byte.is_ascii_alphabetic()) {
        return Err(invalid(format!("{location}: http.method must be an HTTP token: {method}")));
    }

    let raw_path = non_empty_str(map.get("path"))
        .ok_or_else(|| invalid(format!("{location}: http.path is required")))?;
    let path = interpolate_str(raw_path, env);
    if !path.starts_with('/') {
        return Err(invalid(format!("{location}: http.path must start with \"/\"")));
    }

    let body = match map.get("body") {
        None | Some(Value::Null) => None,
        Some(body) => Some(interpolate(body, env)),
    };

    Ok(HttpStep {
        method,
        path,
        headers: scalar_map(location, "http.headers", map.get("headers"), env)?,
        query: scalar_map(location, "http.query", map.get("query"), env)?,
        body,
        timeout_ms: optional_u64(location, "http.timeout_ms", map.get("timeout_ms"))?,
        retries: optional_u32(location, "http.retries", map.get("retries"))?,
    })
}

/// Validates an exec step body.
fn load_exec(
    location: &str,
    map: &Map<String, Value>,
    env: &dyn EnvLookup,
) -> Result<ExecStep, SchemaError> {
    let run = non_empty_str(map.get("run"))
        .ok_or_else(|| invalid(format!("{location}: exec.run must be a non-empty string")))?;
    Ok(ExecStep {
        run: interpolate_str(run, env),
        cwd: optional_str(location, "exec.cwd", map.get("cwd"))?
            .map(|cwd| interpolate_str(cwd, env)),
        env: scalar_map(location, "exec.env", map.get("env"), env)?,
        timeout_ms: optional_u64(location, "exec.timeout_ms", map.get("timeout_ms"))?,
        retries: optional_u32(location, "exec.retries", map.get("retries"))?,
    })
}

/// Validates a SQL step body.
fn load_sql(
    location: &str,
    map: &Map<String, Value>,
    env: &dyn EnvLookup,
) -> Result<SqlStep, SchemaError> {
    let driver = match optional_str(location, "sql.driver", map.get("driver"))? {
        None => SqlDriver::Postgres,
        Some(label) => SqlDriver::parse(label).ok_or_else(|| {
            invalid(format!("{location}: unsupported sql.driver: {label} (expected postgres)"))
        })?,
    };
    let url_env = non_empty_str(map.get("url_env"))
        .ok_or_else(|| invalid(format!("{location}: sql.url_env must be a non-empty string")))?;
    let query = non_empty_str(map.get("query"))
        .ok_or_else(|| invalid(format!("{location}: sql.query must be a non-empty string")))?;
    Ok(SqlStep {
        driver,
        url_env: url_env.to_string(),
        query: interpolate_str(query, env),
        timeout_ms: optional_u64(location, "sql.timeout_ms", map.get("timeout_ms"))?,
        retries: optional_u32(location, "sql.retries", map.get("retries"))?,
    })
}

// ============================================================================
// SECTION: Expectations
// ============================================================================

/// Validates an HTTP expectation.
fn load_http_expectation(
    location: &str,
    map: &Map<String, Value>,
    env: &dyn EnvLookup,
) -> Result<HttpExpectation, SchemaError> {
    let status = optional_u64(location, "expect.status", map.get("status"))?
        .map(|status| {
            u16::try_from(status)
                .ok()
                .filter(|status| (100..=999).contains(status))
                .ok_or_else(|| invalid(format!("{location}: expect.status out of range: {status}")))
        })
        .transpose()?;
    Ok(HttpExpectation {
        status,
        json: map.get("json").map(|pattern| interpolate(pattern, env)),
        body_contains: optional_str(location, "expect.bodyContains", map.get("bodyContains"))?
            .map(|needle| interpolate_str(needle, env)),
    })
}

/// Validates an exec expectation.
fn load_exec_expectation(
    location: &str,
    map: &Map<String, Value>,
    env: &dyn EnvLookup,
) -> Result<ExecExpectation, SchemaError> {
    let exit_code = match map.get("exit_code") {
        None | Some(Value::Null) => None,
        Some(value) => Some(
            value.as_i64().and_then(|code| i32::try_from(code).ok()).ok_or_else(|| {
                invalid(format!("{location}: expect.exit_code must be an integer"))
            })?,
        ),
    };
    Ok(ExecExpectation {
        exit_code,
        stdout_contains: optional_str(location, "expect.stdout_contains", map.get("stdout_contains"))?
            .map(|needle| interpolate_str(needle, env)),
        stderr_contains: optional_str(location, "expect.stderr_contains", map.get("stderr_contains"))?
            .map(|needle| interpolate_str(needle, env)),
    })
}

/// Validates a SQL expectation.
fn load_sql_expectation(
    location: &str,
    map: &Map<String, Value>,
    env: &dyn EnvLookup,
) -> Result<SqlExpectation, SchemaError> {
    Ok(SqlExpectation {
        rows: optional_u64(location, "expect.rows", map.get("rows"))?,
        equals: map.get("equals").map(|pattern| interpolate(pattern, env)),
    })
}

// ============================================================================
// SECTION: Field Helpers
// ============================================================================

/// Returns the string when present, a string, and not blank.
fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str).filter(|text| !text.trim().is_empty())
}

/// Returns the array when present, an array, and non-empty.
fn non_empty_array(value: Option<&Value>) -> Option<&Vec<Value>> {
    value.and_then(Value::as_array).filter(|items| !items.is_empty())
}

/// Reads an optional string field (null is treated as absent).
fn optional_str<'a>(
    location: &str,
    field: &str,
    value: Option<&'a Value>,
) -> Result<Option<&'a str>, SchemaError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) => Ok(Some(text)),
        Some(_) => Err(invalid(format!("{location}: {field} must be a string"))),
    }
}

/// Reads an optional non-negative integer field.
fn optional_u64(
    location: &str,
    field: &str,
    value: Option<&Value>,
) -> Result<Option<u64>, SchemaError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_u64()
            .map(Some)
            .ok_or_else(|| invalid(format!("{location}: {field} must be a non-negative integer"))),
    }
}

/// Reads an optional non-negative integer field bounded to `u32`.
fn optional_u32(
    location: &str,
    field: &str,
    value: Option<&Value>,
) -> Result<Option<u32>, SchemaError> {
    optional_u64(location, field, value)?
        .map(|raw| {
            u32::try_from(raw).map_err(|_| invalid(format!("{location}: {field} is too large")))
        })
        .transpose()
}

/// Reads an optional map of scalar values, interpolating string values.
fn scalar_map(
    location: &str,
    field: &str,
    value: Option<&Value>,
    env: &dyn EnvLookup,
) -> Result<BTreeMap<String, String>, SchemaError> {
    let map = match value {
        None | Some(Value::Null) => return Ok(BTreeMap::new()),
        Some(Value::Object(map)) => map,
        Some(_) => return Err(invalid(format!("{location}: {field} must be an object"))),
    };
    let mut out = BTreeMap::new();
    for (key, item) in map {
        let text = match item {
            Value::String(text) => interpolate_str(text, env),
            Value::Number(number) => number.to_string(),
            Value::Bool(flag) => flag.to_string(),
            _ => return Err(invalid(format!("{location}: {field}.{key} must be a scalar"))),
        };
        out.insert(key.clone(), text);
    }
    Ok(out)
}

/// Renders an optional value for diagnostics.
fn describe(value: Option<&Value>) -> String {
    match value {
        None => "undefined".to_string(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}
