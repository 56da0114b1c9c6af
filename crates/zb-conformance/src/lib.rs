#![forbid(unsafe_code)]

//! Differential parity harness for the Books mediation proxy.
//!
//! Every test case performs one logical accounting-API operation twice,
//! once through the proxy's action-header envelope and once against the
//! upstream REST API, then asserts the two responses agree field by field
//! (and agree with the values the harness submitted or captured earlier).
//! Cases are ordered by their declared dependencies; a case whose
//! dependency did not pass is skipped rather than run meaninglessly.

pub mod assertions;
pub mod executor;
pub mod fixtures;
pub mod registry;
pub mod schedule;
pub mod store;

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::assertions::AssertionFailure;
use crate::executor::{DualExecutor, DualResponse};
use crate::fixtures::FixtureSet;
use crate::registry::{Capture, Category, DirectCall, Operation, QueryValue, TestCase};
use crate::store::{PropertyStore, StoreError};
use zb_wire::{DirectRequest, Endpoints, MediatedRequest, Transport};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration errors: all fatal, all surfaced before the first network
/// call of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetupError {
    FixtureRootMissing { path: String, detail: String },
    FixtureNotFound(String),
    UnresolvedPlaceholder { fixture: String, token: String },
    FixtureParse { fixture: String, detail: String },
    UnknownDependency { case: String, dependency: String },
    DependencyCycle(Vec<String>),
    DuplicateCase(String),
    DuplicateProperty(String),
    Config(String),
    Io { path: String, detail: String },
}

impl SetupError {
    #[must_use]
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::FixtureRootMissing { .. } => "setup_fixture_root_missing",
            Self::FixtureNotFound(_) => "setup_fixture_not_found",
            Self::UnresolvedPlaceholder { .. } => "setup_unresolved_placeholder",
            Self::FixtureParse { .. } => "setup_fixture_parse",
            Self::UnknownDependency { .. } => "setup_unknown_dependency",
            Self::DependencyCycle(_) => "setup_dependency_cycle",
            Self::DuplicateCase(_) => "setup_duplicate_case",
            Self::DuplicateProperty(_) => "setup_duplicate_property",
            Self::Config(_) => "setup_config",
            Self::Io { .. } => "setup_io",
        }
    }
}

impl fmt::Display for SetupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FixtureRootMissing { path, detail } => {
                write!(f, "fixture root `{path}` is unreadable: {detail}")
            }
            Self::FixtureNotFound(name) => write!(f, "fixture `{name}` is not registered"),
            Self::UnresolvedPlaceholder { fixture, token } => {
                write!(f, "fixture `{fixture}` references unknown token `{token}`")
            }
            Self::FixtureParse { fixture, detail } => {
                write!(f, "fixture `{fixture}` is not valid JSON after substitution: {detail}")
            }
            Self::UnknownDependency { case, dependency } => {
                write!(f, "case `{case}` depends on unknown case `{dependency}`")
            }
            Self::DependencyCycle(names) => {
                write!(f, "dependency cycle involving: {}", names.join(", "))
            }
            Self::DuplicateCase(name) => write!(f, "case `{name}` is declared twice"),
            Self::DuplicateProperty(key) => {
                write!(f, "seeded property `{key}` collides with an existing key")
            }
            Self::Config(detail) => write!(f, "invalid configuration: {detail}"),
            Self::Io { path, detail } => write!(f, "io error at `{path}`: {detail}"),
        }
    }
}

impl std::error::Error for SetupError {}

#[derive(Debug, Clone)]
pub struct HarnessConfig {
    pub endpoints: Endpoints,
    pub fixture_root: PathBuf,
    pub timeout: Duration,
    /// Seeded properties: the literals the fixtures submit, double-checked
    /// later against what the upstream API stored.
    pub properties: BTreeMap<String, String>,
}

impl HarnessConfig {
    /// Fixture root relative to this crate; endpoints point at a local
    /// test environment and are expected to be overridden via
    /// [`HarnessConfig::from_json_file`] for real runs.
    #[must_use]
    pub fn default_paths() -> Self {
        Self {
            endpoints: Endpoints {
                proxy_url: "http://localhost:8280/services/zohobooks".to_string(),
                api_base_url: "https://books.zoho.com".to_string(),
                auth_token: String::new(),
                organization_id: String::new(),
            },
            fixture_root: PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures"),
            timeout: DEFAULT_TIMEOUT,
            properties: default_properties(),
        }
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, SetupError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|err| SetupError::Io {
            path: path.display().to_string(),
            detail: err.to_string(),
        })?;
        let file: ConfigFile = serde_json::from_slice(&bytes)
            .map_err(|err| SetupError::Config(err.to_string()))?;

        let mut properties = default_properties();
        properties.extend(file.properties);

        Ok(Self {
            endpoints: Endpoints {
                proxy_url: file.proxy_url,
                api_base_url: file.api_base_url,
                auth_token: file.auth_token,
                organization_id: file.organization_id,
            },
            fixture_root: file
                .fixture_root
                .unwrap_or_else(|| PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")),
            timeout: Duration::from_secs(file.timeout_secs.unwrap_or(30)),
            properties,
        })
    }

    /// Fixed environment-level tokens available to every fixture template.
    #[must_use]
    pub fn environment_tokens(&self) -> Vec<(String, String)> {
        vec![
            ("authToken".to_string(), self.endpoints.auth_token.clone()),
            (
                "organizationId".to_string(),
                self.endpoints.organization_id.clone(),
            ),
            ("apiUrl".to_string(), self.endpoints.api_base_url.clone()),
            ("proxyUrl".to_string(), self.endpoints.proxy_url.clone()),
        ]
    }
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    proxy_url: String,
    api_base_url: String,
    auth_token: String,
    organization_id: String,
    #[serde(default)]
    fixture_root: Option<PathBuf>,
    #[serde(default)]
    timeout_secs: Option<u64>,
    #[serde(default)]
    properties: BTreeMap<String, String>,
}

/// The submitted literals for the standard catalogue.
#[must_use]
pub fn default_properties() -> BTreeMap<String, String> {
    let entries = [
        ("itemNameMandatory", "Pen"),
        ("itemNameOptional", "Marker"),
        ("rate", "25.0"),
        ("description", "Ballpoint pen"),
        ("taxPercentage", "12.5"),
        ("contactNameMandatory", "AcmeSupplies"),
        ("contactNameOptional", "ZetaTraders"),
        ("website", "https://acme.example.com"),
        ("companyName", "Acme Supplies Ltd"),
        ("notes", "Preferred supplier"),
        ("invoiceNumber", "INV-000123"),
        ("invoiceDueDate", "2026-09-30"),
    ];
    entries
        .iter()
        .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
        .collect()
}

/// One recorded case problem: a setup-stage diagnostic or an unmet
/// assertion with both observed values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseFailure {
    Setup(String),
    Assertion(AssertionFailure),
}

impl fmt::Display for CaseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Setup(detail) => write!(f, "setup: {detail}"),
            Self::Assertion(failure) => write!(f, "{failure}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Passed,
    Failed { failures: Vec<CaseFailure> },
    Skipped { unmet: Vec<String> },
}

impl Outcome {
    #[must_use]
    pub fn passed(&self) -> bool {
        matches!(self, Self::Passed)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CaseReport {
    pub name: String,
    pub operation: Operation,
    pub category: Category,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: String,
    pub fixture_fingerprint: String,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub cases: Vec<CaseReport>,
}

impl RunReport {
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.failed == 0 && self.skipped == 0 && self.passed == self.total
    }
}

pub fn write_report_json(path: impl AsRef<Path>, report: &RunReport) -> Result<(), SetupError> {
    let path = path.as_ref();
    let rendered = serde_json::to_vec_pretty(report)
        .map_err(|err| SetupError::Config(err.to_string()))?;
    fs::write(path, rendered).map_err(|err| SetupError::Io {
        path: path.display().to_string(),
        detail: err.to_string(),
    })
}

/// Runs the full registry against the given transport.
///
/// Planning happens first: the dependency order is computed, and every
/// case's fixture is verified to exist, before any network call. A fatal
/// setup error therefore aborts the run with zero requests issued.
pub fn run_registry<T: Transport + ?Sized>(
    config: &HarnessConfig,
    transport: &T,
    cases: &[TestCase],
) -> Result<RunReport, SetupError> {
    let order = schedule::execution_order(cases)?;
    let fixtures = FixtureSet::open(&config.fixture_root)?;
    for case in cases {
        if !fixtures.contains(&case.fixture) {
            return Err(SetupError::FixtureNotFound(case.fixture.clone()));
        }
    }
    let fixture_fingerprint = fixtures.fingerprint()?;

    let mut store = PropertyStore::new();
    seed_store(&mut store, config.environment_tokens())?;
    seed_store(
        &mut store,
        config
            .properties
            .iter()
            .map(|(key, value)| (key.clone(), value.clone())),
    )?;

    let executor = DualExecutor::new(transport);
    let started_at = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
    let mut passed_names: Vec<String> = Vec::new();
    let mut reports = Vec::with_capacity(cases.len());
    let (mut passed, mut failed, mut skipped) = (0usize, 0usize, 0usize);

    for &index in &order {
        let case = &cases[index];
        let unmet: Vec<String> = case
            .depends_on
            .iter()
            .filter(|dep| !passed_names.contains(*dep))
            .cloned()
            .collect();

        let outcome = if unmet.is_empty() {
            run_case(config, &executor, &fixtures, &mut store, case)
        } else {
            Outcome::Skipped { unmet }
        };

        match &outcome {
            Outcome::Passed => {
                passed += 1;
                passed_names.push(case.name.clone());
                log::info!("case {}: passed", case.name);
            }
            Outcome::Failed { failures } => {
                failed += 1;
                log::warn!("case {}: {} failure(s)", case.name, failures.len());
                for failure in failures {
                    log::warn!("  {failure}");
                }
            }
            Outcome::Skipped { unmet } => {
                skipped += 1;
                log::info!("case {}: skipped, unmet: {}", case.name, unmet.join(", "));
            }
        }

        reports.push(CaseReport {
            name: case.name.clone(),
            operation: case.operation,
            category: case.category,
            outcome,
        });
    }

    Ok(RunReport {
        started_at,
        fixture_fingerprint,
        total: cases.len(),
        passed,
        failed,
        skipped,
        cases: reports,
    })
}

fn seed_store<I>(store: &mut PropertyStore, entries: I) -> Result<(), SetupError>
where
    I: IntoIterator<Item = (String, String)>,
{
    store.seed(entries).map_err(|err| match err {
        StoreError::DuplicateKey(key) => SetupError::DuplicateProperty(key),
        StoreError::MissingKey(key) => SetupError::Config(format!("missing property `{key}`")),
    })
}

fn run_case<T: Transport + ?Sized>(
    config: &HarnessConfig,
    executor: &DualExecutor<'_, T>,
    fixtures: &FixtureSet,
    store: &mut PropertyStore,
    case: &TestCase,
) -> Outcome {
    let mut failures: Vec<CaseFailure> = Vec::new();

    // A fixture that cannot resolve here (a token only a dependency could
    // have captured) is contained at the case boundary.
    let payload = match fixtures.resolve(&case.fixture, store) {
        Ok(payload) => payload,
        Err(err) => {
            return Outcome::Failed {
                failures: vec![CaseFailure::Setup(err.to_string())],
            }
        }
    };

    let mediated_request =
        MediatedRequest::new(&config.endpoints, case.operation.name(), payload);
    let mediated = executor.send_mediated(&mediated_request);

    if let Ok(response) = &mediated {
        apply_captures(&case.captures, &response.body, store, &mut failures);
    }

    match build_direct_request(config, case, store) {
        Ok(direct_request) => {
            let direct = executor.send_direct(&direct_request);
            let dual = DualResponse { mediated, direct };
            failures.extend(
                assertions::evaluate(&case.assertions, &dual, store)
                    .into_iter()
                    .map(CaseFailure::Assertion),
            );
        }
        Err(detail) => {
            failures.push(CaseFailure::Setup(detail));
            if let Err(err) = &mediated {
                failures.push(CaseFailure::Setup(format!("mediated leg failed: {err}")));
            }
        }
    }

    if failures.is_empty() {
        Outcome::Passed
    } else {
        Outcome::Failed { failures }
    }
}

fn apply_captures(
    captures: &[Capture],
    body: &serde_json::Value,
    store: &mut PropertyStore,
    failures: &mut Vec<CaseFailure>,
) {
    for capture in captures {
        match assertions::scalar_at(body, &capture.path) {
            Ok(value) => {
                if let Err(err) = store.put(&capture.key, &value) {
                    failures.push(CaseFailure::Setup(format!(
                        "capture {} -> `{}`: {err}",
                        capture.path, capture.key
                    )));
                }
            }
            Err(detail) => failures.push(CaseFailure::Setup(format!(
                "capture {} -> `{}`: {detail}",
                capture.path, capture.key
            ))),
        }
    }
}

fn build_direct_request(
    config: &HarnessConfig,
    case: &TestCase,
    store: &PropertyStore,
) -> Result<DirectRequest, String> {
    let DirectCall {
        method,
        id_property,
        query,
    } = &case.direct;

    let resource_path = match id_property {
        Some(key) => {
            let id = store
                .get(key)
                .map_err(|err| format!("direct request for {}: {err}", case.name))?;
            format!("{}/{id}", case.operation.resource())
        }
        None => case.operation.resource().to_string(),
    };

    let mut extra = Vec::with_capacity(query.len());
    for (key, value) in query {
        let resolved = match value {
            QueryValue::Literal(text) => text.clone(),
            QueryValue::Property(property) => store
                .get(property)
                .map_err(|err| format!("direct request for {}: {err}", case.name))?
                .to_string(),
        };
        extra.push((key.clone(), resolved));
    }

    Ok(DirectRequest::new(
        &config.endpoints,
        *method,
        &resource_path,
        extra,
    ))
}
