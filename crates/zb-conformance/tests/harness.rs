//! End-to-end harness runs against an in-memory double that serves both
//! envelopes from one consistent state, the way a healthy proxy/upstream
//! pair would.

use std::cell::{Cell, RefCell};

use serde_json::{json, Map, Value};

use zb_conformance::registry::{standard_registry, Category, DirectCall, Operation, TestCase};
use zb_conformance::{run_registry, HarnessConfig, Outcome, SetupError};
use zb_wire::{Endpoints, Transport, TransportError, WireRequest, WireResponse};

const ENV_KEYS: &[&str] = &["authToken", "organizationId", "apiUrl"];

#[derive(Default)]
struct State {
    items: Vec<Value>,
    contacts: Vec<Value>,
    invoices: Vec<Value>,
    next_id: u64,
}

/// Serves the mediated envelope and the direct envelope from the same
/// entity store. `skew_item_rate` makes direct item reads disagree with
/// what was created, to exercise drift reporting.
struct BooksDouble {
    state: RefCell<State>,
    sends: Cell<usize>,
    skew_item_rate: bool,
}

impl BooksDouble {
    fn new() -> Self {
        Self {
            state: RefCell::new(State::default()),
            sends: Cell::new(0),
            skew_item_rate: false,
        }
    }

    fn skewed() -> Self {
        Self {
            skew_item_rate: true,
            ..Self::new()
        }
    }

    fn respond(status: u16, body: Value) -> Result<WireResponse, TransportError> {
        Ok(WireResponse { status, body })
    }

    fn error(status: u16, code: u64, message: &str) -> Result<WireResponse, TransportError> {
        Self::respond(status, json!({"code": code, "message": message}))
    }

    fn next_id(&self) -> String {
        let mut state = self.state.borrow_mut();
        state.next_id += 1;
        format!("4600000000{:05}", state.next_id)
    }

    fn create(&self, resource: &str, payload: &Map<String, Value>) -> Result<WireResponse, TransportError> {
        match resource {
            "items" => {
                if !payload.contains_key("name") {
                    return Self::error(400, 4002, "Name is required.");
                }
                let mut entity = payload.clone();
                entity.insert("item_id".into(), Value::String(self.next_id()));
                entity.insert("status".into(), "active".into());
                entity.insert("account_id".into(), "460000000000388".into());
                entity.insert("item_name".into(), payload["name"].clone());
                entity.insert("item_type".into(), "sales_and_purchases".into());
                self.state.borrow_mut().items.push(Value::Object(entity.clone()));
                Self::respond(201, json!({"item": entity}))
            }
            "contacts" => {
                if !payload.contains_key("contact_name") {
                    return Self::error(400, 4, "Contact Name is required.");
                }
                let mut entity = payload.clone();
                entity.insert("contact_id".into(), Value::String(self.next_id()));
                entity.insert("created_time".into(), "2026-08-25T10:00:00+0530".into());
                entity.insert("last_modified_time".into(), "2026-08-25T10:00:00+0530".into());
                entity.insert("first_name".into(), "".into());
                entity.insert("status".into(), "active".into());
                self.state
                    .borrow_mut()
                    .contacts
                    .push(Value::Object(entity.clone()));
                Self::respond(201, json!({"contact": entity}))
            }
            "invoices" => {
                let customer = payload.get("customer_id").and_then(Value::as_str);
                let known = customer.is_some_and(|id| {
                    self.state
                        .borrow()
                        .contacts
                        .iter()
                        .any(|contact| contact["contact_id"] == id)
                });
                if !known {
                    return Self::error(400, 4032, "Invalid value passed for Customer ID.");
                }
                let mut entity = payload.clone();
                entity.insert("invoice_id".into(), Value::String(self.next_id()));
                entity.insert("currency_id".into(), "460000000000097".into());
                entity
                    .entry("invoice_number".to_string())
                    .or_insert_with(|| "INV-9999".into());
                entity
                    .entry("due_date".to_string())
                    .or_insert_with(|| "2026-12-31".into());
                entity.entry("notes".to_string()).or_insert_with(|| "".into());
                self.state
                    .borrow_mut()
                    .invoices
                    .push(Value::Object(entity.clone()));
                Self::respond(201, json!({"invoice": entity}))
            }
            other => Self::error(404, 1000, &format!("unknown resource {other}")),
        }
    }

    fn list(&self, resource: &str, filters: &[(String, String)]) -> Result<WireResponse, TransportError> {
        for (key, value) in filters {
            let invalid = matches!(
                (resource, key.as_str()),
                ("items", "tax_id") | ("contacts", "sort_column") | ("invoices", "item_id")
            ) && value == "INVALID";
            if invalid {
                return Self::error(400, 2, &format!("Invalid value passed for {key}"));
            }
        }

        let state = self.state.borrow();
        let entities = match resource {
            "items" => &state.items,
            "contacts" => &state.contacts,
            "invoices" => &state.invoices,
            other => return Self::error(404, 1000, &format!("unknown resource {other}")),
        };

        let mut selected: Vec<Value> = entities
            .iter()
            .filter(|entity| {
                filters.iter().all(|(key, value)| match key.as_str() {
                    "description" => entity["description"] == value.as_str(),
                    "contact_name_startswith" => entity["contact_name"]
                        .as_str()
                        .is_some_and(|name| name.starts_with(value)),
                    _ => true,
                })
            })
            .cloned()
            .collect();

        if let Some((_, limit)) = filters.iter().find(|(key, _)| key == "per_page") {
            if let Ok(limit) = limit.parse::<usize>() {
                selected.truncate(limit);
            }
        }
        let mut body = Map::new();
        body.insert(resource.to_string(), Value::Array(selected));
        Self::respond(200, Value::Object(body))
    }

    fn get(&self, resource: &str, id: &str, direct: bool) -> Result<WireResponse, TransportError> {
        let state = self.state.borrow();
        let (entities, singular, id_field) = match resource {
            "items" => (&state.items, "item", "item_id"),
            "contacts" => (&state.contacts, "contact", "contact_id"),
            "invoices" => (&state.invoices, "invoice", "invoice_id"),
            other => return Self::error(404, 1000, &format!("unknown resource {other}")),
        };
        match entities.iter().find(|entity| entity[id_field] == id) {
            Some(entity) => {
                let mut entity = entity.clone();
                if direct && self.skew_item_rate && resource == "items" {
                    entity["rate"] = "30.0".into();
                }
                let mut body = Map::new();
                body.insert(singular.to_string(), entity);
                Self::respond(200, Value::Object(body))
            }
            None => Self::error(404, 1002, &format!("{singular} not found")),
        }
    }

    fn handle_mediated(&self, action: &str, body: &Value) -> Result<WireResponse, TransportError> {
        let operation = action.strip_prefix("urn:").unwrap_or(action);
        let fields: Map<String, Value> = body
            .as_object()
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter(|(key, _)| !ENV_KEYS.contains(&key.as_str()))
            .collect();

        let resource = match operation {
            op if op.ends_with("Item") || op.ends_with("Items") => "items",
            op if op.ends_with("Contact") || op.ends_with("Contacts") => "contacts",
            _ => "invoices",
        };

        if operation.starts_with("create") {
            self.create(resource, &fields)
        } else if operation.starts_with("list") {
            let filters: Vec<(String, String)> = fields
                .iter()
                .filter_map(|(key, value)| {
                    value.as_str().map(|text| (key.clone(), text.to_string()))
                })
                .collect();
            self.list(resource, &filters)
        } else {
            let id_key = match resource {
                "items" => "itemId",
                "contacts" => "contactId",
                _ => "invoiceId",
            };
            let id = fields
                .get(id_key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            self.get(resource, &id, false)
        }
    }

    fn handle_direct(
        &self,
        method: &str,
        url: &str,
        query: &[(String, String)],
    ) -> Result<WireResponse, TransportError> {
        let path = url
            .split("/api/v3/")
            .nth(1)
            .unwrap_or_default()
            .to_string();
        let mut segments = path.split('/');
        let resource = segments.next().unwrap_or_default().to_string();
        let id = segments.next().map(str::to_string);

        let filters: Vec<(String, String)> = query
            .iter()
            .filter(|(key, _)| key != "authtoken" && key != "organizer_id")
            .cloned()
            .collect();

        if method == "POST" {
            let raw = filters
                .iter()
                .find(|(key, _)| key == "JSONString")
                .map(|(_, value)| value.clone())
                .unwrap_or_else(|| "{}".to_string());
            let payload: Value = serde_json::from_str(&raw).unwrap_or(Value::Null);
            let payload = payload.as_object().cloned().unwrap_or_default();
            self.create(&resource, &payload)
        } else if let Some(id) = id {
            self.get(&resource, &id, true)
        } else {
            self.list(&resource, &filters)
        }
    }
}

impl Transport for BooksDouble {
    fn send(&self, request: &WireRequest) -> Result<WireResponse, TransportError> {
        self.sends.set(self.sends.get() + 1);
        match request {
            WireRequest::Mediated(req) => self.handle_mediated(&req.action, &req.body),
            WireRequest::Direct(req) => {
                self.handle_direct(req.method.as_str(), &req.url, &req.query)
            }
        }
    }
}

fn test_config() -> HarnessConfig {
    let mut config = HarnessConfig::default_paths();
    config.endpoints = Endpoints {
        proxy_url: "http://esb.test/services/books".to_string(),
        api_base_url: "http://api.test".to_string(),
        auth_token: "test-token".to_string(),
        organization_id: "test-org".to_string(),
    };
    config
}

#[test]
fn full_catalogue_passes_against_a_consistent_pair() {
    let transport = BooksDouble::new();
    let report = run_registry(&test_config(), &transport, &standard_registry()).unwrap();

    for case in &report.cases {
        assert!(
            case.outcome.passed(),
            "case {} did not pass: {:?}",
            case.name,
            case.outcome
        );
    }
    assert!(report.all_passed());
    assert_eq!(report.total, 21);
    assert_eq!(report.passed, 21);
    assert_eq!(report.fixture_fingerprint.len(), 64);
}

#[test]
fn drifted_direct_responses_fail_and_dependents_skip() {
    let transport = BooksDouble::skewed();
    let report = run_registry(&test_config(), &transport, &standard_registry()).unwrap();

    let create_item = report
        .cases
        .iter()
        .find(|case| case.name == "create_item_mandatory")
        .unwrap();
    match &create_item.outcome {
        Outcome::Failed { failures } => {
            assert!(
                failures.iter().any(|f| f.to_string().contains("item.rate")),
                "expected an item.rate diagnostic, got {failures:?}"
            );
        }
        other => panic!("expected failure, got {other:?}"),
    }

    let get_item = report
        .cases
        .iter()
        .find(|case| case.name == "get_item_mandatory")
        .unwrap();
    match &get_item.outcome {
        Outcome::Skipped { unmet } => {
            assert_eq!(unmet, &vec!["create_item_mandatory".to_string()]);
        }
        other => panic!("expected skip, got {other:?}"),
    }

    // Independent siblings keep running: item drift never touches contacts,
    // and the optional item create never asserts on rate.
    let create_contact = report
        .cases
        .iter()
        .find(|case| case.name == "create_contact_mandatory")
        .unwrap();
    assert!(create_contact.outcome.passed());
    let create_item_optional = report
        .cases
        .iter()
        .find(|case| case.name == "create_item_optional")
        .unwrap();
    assert!(create_item_optional.outcome.passed());

    // One failed create; everything downstream of it skips.
    assert_eq!(report.failed, 1);
    assert_eq!(report.skipped, 8);
    assert_eq!(report.passed, 12);
}

#[test]
fn negative_cases_assert_identical_error_shapes() {
    let transport = BooksDouble::new();
    let report = run_registry(&test_config(), &transport, &standard_registry()).unwrap();
    for case in &report.cases {
        if case.category == Category::Negative {
            assert!(
                case.outcome.passed(),
                "negative case {} did not pass: {:?}",
                case.name,
                case.outcome
            );
        }
    }
}

#[test]
fn missing_fixture_aborts_before_any_network_call() {
    let transport = BooksDouble::new();
    let mut cases = standard_registry();
    cases.push(TestCase {
        name: "get_estimate_mandatory".to_string(),
        category: Category::Mandatory,
        operation: Operation::GetItem,
        depends_on: Vec::new(),
        fixture: "esb_getEstimate_mandatory".to_string(),
        direct: DirectCall::get_collection(),
        captures: Vec::new(),
        assertions: Vec::new(),
    });

    let err = run_registry(&test_config(), &transport, &cases).unwrap_err();
    assert_eq!(
        err,
        SetupError::FixtureNotFound("esb_getEstimate_mandatory".to_string())
    );
    assert_eq!(transport.sends.get(), 0);
}

#[test]
fn dependency_cycle_aborts_before_any_network_call() {
    let transport = BooksDouble::new();
    let mut cases = standard_registry();
    // Wire the first two cases into a loop.
    cases[0].depends_on = vec![cases[1].name.clone()];
    cases[1].depends_on = vec![cases[0].name.clone()];

    let err = run_registry(&test_config(), &transport, &cases).unwrap_err();
    assert_eq!(err.reason_code(), "setup_dependency_cycle");
    assert_eq!(transport.sends.get(), 0);
}
