#![forbid(unsafe_code)]

//! Equivalence assertion engine.
//!
//! Compares the two captured responses field-by-field, and the direct
//! response against ground-truth values in the property store. Evaluation
//! is a pure function over (assertions, captured responses, store): every
//! unmet assertion is reported, nothing short-circuits, and re-evaluating
//! the same captured pair yields the same verdict.
//!
//! Paths are dotted, with numeric segments indexing into arrays
//! (`invoice.line_items.0.item_id`). Both ends of a comparison must land
//! on a scalar; scalars compare in canonical string form, so a JSON number
//! and its string rendering are equal the way the upstream API's loosely
//! typed bodies require.

use std::fmt;

use serde::Serialize;
use serde_json::Value;

use crate::executor::DualResponse;
use crate::store::PropertyStore;
use zb_wire::{TransportError, WireResponse};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assertion {
    /// Mediated body field equals the direct body field at the same path.
    FieldParity { path: String },
    /// Direct body field equals a stored (seeded or captured) property.
    DirectMatchesProperty { path: String, key: String },
    /// Arrays at the path have the same length on both legs.
    LengthParity { path: String },
    /// Arrays at the path have exactly the expected length on both legs.
    LengthIs { path: String, expected: usize },
    /// HTTP status codes are equal.
    StatusParity,
    /// Status code, body `code`, and body `message` all equal between
    /// legs: the proxy must surface upstream errors unchanged.
    ErrorParity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssertionFailure {
    /// What was checked, including the source path(s).
    pub check: String,
    /// Observed mediated-side value, or the error that prevented reading it.
    pub mediated: String,
    /// Direct-side or stored counterpart, or the error that prevented
    /// reading it.
    pub expected: String,
}

impl fmt::Display for AssertionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: mediated=`{}` expected=`{}`",
            self.check, self.mediated, self.expected
        )
    }
}

/// Evaluates every assertion and returns the full failure list.
#[must_use]
pub fn evaluate(
    assertions: &[Assertion],
    dual: &DualResponse,
    store: &PropertyStore,
) -> Vec<AssertionFailure> {
    let mut failures = Vec::new();
    for assertion in assertions {
        match assertion {
            Assertion::FieldParity { path } => compare(
                format!("field parity at {path}"),
                leg_scalar(&dual.mediated, "mediated", path),
                leg_scalar(&dual.direct, "direct", path),
                &mut failures,
            ),
            Assertion::DirectMatchesProperty { path, key } => compare(
                format!("direct {path} matches property `{key}`"),
                store
                    .get(key)
                    .map(str::to_string)
                    .map_err(|err| err.to_string()),
                leg_scalar(&dual.direct, "direct", path),
                &mut failures,
            ),
            Assertion::LengthParity { path } => compare(
                format!("length parity at {path}"),
                leg_length(&dual.mediated, "mediated", path),
                leg_length(&dual.direct, "direct", path),
                &mut failures,
            ),
            Assertion::LengthIs { path, expected } => {
                compare(
                    format!("mediated length {expected} at {path}"),
                    leg_length(&dual.mediated, "mediated", path),
                    Ok(expected.to_string()),
                    &mut failures,
                );
                compare(
                    format!("direct length {expected} at {path}"),
                    leg_length(&dual.direct, "direct", path),
                    Ok(expected.to_string()),
                    &mut failures,
                );
            }
            Assertion::StatusParity => compare(
                "status parity".to_string(),
                leg_status(&dual.mediated, "mediated"),
                leg_status(&dual.direct, "direct"),
                &mut failures,
            ),
            Assertion::ErrorParity => {
                compare(
                    "error status parity".to_string(),
                    leg_status(&dual.mediated, "mediated"),
                    leg_status(&dual.direct, "direct"),
                    &mut failures,
                );
                compare(
                    "error code parity".to_string(),
                    leg_scalar(&dual.mediated, "mediated", "code"),
                    leg_scalar(&dual.direct, "direct", "code"),
                    &mut failures,
                );
                compare(
                    "error message parity".to_string(),
                    leg_scalar(&dual.mediated, "mediated", "message"),
                    leg_scalar(&dual.direct, "direct", "message"),
                    &mut failures,
                );
            }
        }
    }
    failures
}

fn compare(
    check: String,
    mediated: Result<String, String>,
    expected: Result<String, String>,
    failures: &mut Vec<AssertionFailure>,
) {
    match (&mediated, &expected) {
        (Ok(left), Ok(right)) if left == right => {}
        _ => failures.push(AssertionFailure {
            check,
            mediated: render(mediated),
            expected: render(expected),
        }),
    }
}

fn render(side: Result<String, String>) -> String {
    match side {
        Ok(value) => value,
        Err(detail) => format!("<{detail}>"),
    }
}

fn leg<'a>(
    leg: &'a Result<WireResponse, TransportError>,
    name: &str,
) -> Result<&'a WireResponse, String> {
    leg.as_ref().map_err(|err| format!("{name} leg failed: {err}"))
}

fn leg_status(
    side: &Result<WireResponse, TransportError>,
    name: &str,
) -> Result<String, String> {
    leg(side, name).map(|response| response.status.to_string())
}

fn leg_scalar(
    side: &Result<WireResponse, TransportError>,
    name: &str,
    path: &str,
) -> Result<String, String> {
    leg(side, name).and_then(|response| scalar_at(&response.body, path))
}

fn leg_length(
    side: &Result<WireResponse, TransportError>,
    name: &str,
    path: &str,
) -> Result<String, String> {
    leg(side, name).and_then(|response| {
        match value_at(&response.body, path)? {
            Value::Array(items) => Ok(items.len().to_string()),
            _ => Err(format!("value at {path} is not an array")),
        }
    })
}

fn value_at<'a>(body: &'a Value, path: &str) -> Result<&'a Value, String> {
    let mut current = body;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map
                .get(segment)
                .ok_or_else(|| format!("`{segment}` missing at {path}"))?,
            Value::Array(items) => {
                let index: usize = segment
                    .parse()
                    .map_err(|_| format!("`{segment}` is not an array index at {path}"))?;
                items
                    .get(index)
                    .ok_or_else(|| format!("index {index} out of bounds at {path}"))?
            }
            _ => return Err(format!("cannot descend into scalar at {path}")),
        };
    }
    Ok(current)
}

/// Canonical scalar rendering; structural values refuse to compare.
pub fn scalar_at(body: &Value, path: &str) -> Result<String, String> {
    match value_at(body, path)? {
        Value::String(text) => Ok(text.clone()),
        Value::Number(number) => Ok(number.to_string()),
        Value::Bool(flag) => Ok(flag.to_string()),
        Value::Null => Err(format!("value at {path} is null")),
        Value::Array(_) | Value::Object(_) => {
            Err(format!("value at {path} is not a scalar"))
        }
    }
}
