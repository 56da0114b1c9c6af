#![forbid(unsafe_code)]

//! Test case model and the built-in case catalogue.
//!
//! Items, contacts and invoices share one case shape (create with mandatory
//! fields, create with optional fields, negative create, list, filtered
//! list, negative list, get), so the catalogue is generated from a single
//! per-resource template instead of hand-duplicated blocks. The per-resource
//! differences (field lists, filters, negative triggers) are data.

use zb_wire::HttpMethod;

use crate::assertions::Assertion;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Mandatory,
    Optional,
    Negative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Operation {
    CreateItem,
    ListItems,
    GetItem,
    CreateContact,
    ListContacts,
    GetContact,
    CreateInvoice,
    ListInvoices,
    GetInvoice,
}

impl Operation {
    /// Operation name as it appears in the mediated `Action: urn:<name>`
    /// header.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateItem => "createItem",
            Self::ListItems => "listItems",
            Self::GetItem => "getItem",
            Self::CreateContact => "createContact",
            Self::ListContacts => "listContacts",
            Self::GetContact => "getContact",
            Self::CreateInvoice => "createInvoice",
            Self::ListInvoices => "listInvoices",
            Self::GetInvoice => "getInvoice",
        }
    }

    /// Upstream REST collection for the direct envelope.
    #[must_use]
    pub fn resource(&self) -> &'static str {
        match self {
            Self::CreateItem | Self::ListItems | Self::GetItem => "items",
            Self::CreateContact | Self::ListContacts | Self::GetContact => "contacts",
            Self::CreateInvoice | Self::ListInvoices | Self::GetInvoice => "invoices",
        }
    }
}

/// Value for a direct-call query parameter: fixed text, or read from the
/// property store at execution time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryValue {
    Literal(String),
    Property(String),
}

/// How to address the direct (upstream REST) leg of a case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectCall {
    pub method: HttpMethod,
    /// Property holding the resource id to append to the path, if any.
    pub id_property: Option<String>,
    pub query: Vec<(String, QueryValue)>,
}

impl DirectCall {
    #[must_use]
    pub fn get_collection() -> Self {
        Self {
            method: HttpMethod::Get,
            id_property: None,
            query: Vec::new(),
        }
    }

    #[must_use]
    pub fn get_by_id(id_property: &str) -> Self {
        Self {
            method: HttpMethod::Get,
            id_property: Some(id_property.to_string()),
            query: Vec::new(),
        }
    }
}

/// Value captured from the mediated response body into the property store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capture {
    pub path: String,
    pub key: String,
}

#[derive(Debug, Clone)]
pub struct TestCase {
    pub name: String,
    pub category: Category,
    pub operation: Operation,
    pub depends_on: Vec<String>,
    pub fixture: String,
    pub direct: DirectCall,
    pub captures: Vec<Capture>,
    pub assertions: Vec<Assertion>,
}

/// One resource's worth of case data. `cases` expands this into the seven
/// concrete cases the resource contributes to the catalogue.
struct ResourceSpec {
    singular: &'static str,
    plural: &'static str,
    create_op: Operation,
    list_op: Operation,
    get_op: Operation,
    id_field: &'static str,
    id_property: &'static str,
    optional_id_property: &'static str,
    /// Dependencies the create cases carry beyond their own resource
    /// (invoices need an item and a contact to exist first).
    create_deps: &'static [&'static str],
    /// (field, expected property) pairs double-checked against ground truth.
    create_mandatory_parity: &'static [&'static str],
    create_mandatory_truth: &'static [(&'static str, &'static str)],
    create_optional_parity: &'static [&'static str],
    create_optional_truth: &'static [(&'static str, &'static str)],
    /// Raw JSON the negative create submits directly via `JSONString`.
    create_negative_payload: &'static str,
    list_mandatory_parity: &'static [&'static str],
    list_optional_filter: (&'static str, QueryValueSpec),
    list_optional_parity: &'static [&'static str],
    list_negative_filter: (&'static str, &'static str),
    get_parity: &'static [&'static str],
}

enum QueryValueSpec {
    Literal(&'static str),
    Property(&'static str),
}

impl QueryValueSpec {
    fn to_value(&self) -> QueryValue {
        match self {
            Self::Literal(text) => QueryValue::Literal((*text).to_string()),
            Self::Property(key) => QueryValue::Property((*key).to_string()),
        }
    }
}

impl ResourceSpec {
    fn case_name(&self, kind: &str, category: Category) -> String {
        let suffix = match category {
            Category::Mandatory => "mandatory",
            Category::Optional => "optional",
            Category::Negative => "negative",
        };
        format!("{kind}_{}_{suffix}", self.singular)
    }

    fn fixture_name(&self, op: Operation, category: Category) -> String {
        let suffix = match category {
            Category::Mandatory => "mandatory",
            Category::Optional => "optional",
            Category::Negative => "negative",
        };
        format!("esb_{}_{suffix}", op.name())
    }

    fn field_path(&self, field: &str) -> String {
        format!("{}.{field}", self.singular)
    }

    fn first_element_path(&self, field: &str) -> String {
        format!("{}.0.{field}", self.plural)
    }

    fn create_case(
        &self,
        category: Category,
        id_property: &str,
        parity: &[&str],
        truth: &[(&str, &str)],
    ) -> TestCase {
        let mut assertions = vec![Assertion::DirectMatchesProperty {
            path: self.field_path(self.id_field),
            key: id_property.to_string(),
        }];
        assertions.extend(parity.iter().map(|field| Assertion::FieldParity {
            path: self.field_path(field),
        }));
        assertions.extend(
            truth
                .iter()
                .map(|(field, key)| Assertion::DirectMatchesProperty {
                    path: self.field_path(field),
                    key: (*key).to_string(),
                }),
        );
        TestCase {
            name: self.case_name("create", category),
            category,
            operation: self.create_op,
            depends_on: self.create_deps.iter().map(|s| (*s).to_string()).collect(),
            fixture: self.fixture_name(self.create_op, category),
            direct: DirectCall::get_by_id(id_property),
            captures: vec![Capture {
                path: self.field_path(self.id_field),
                key: id_property.to_string(),
            }],
            assertions,
        }
    }

    fn create_negative_case(&self) -> TestCase {
        TestCase {
            name: self.case_name("create", Category::Negative),
            category: Category::Negative,
            operation: self.create_op,
            depends_on: Vec::new(),
            fixture: self.fixture_name(self.create_op, Category::Negative),
            direct: DirectCall {
                method: HttpMethod::Post,
                id_property: None,
                query: vec![(
                    "JSONString".to_string(),
                    QueryValue::Literal(self.create_negative_payload.to_string()),
                )],
            },
            captures: Vec::new(),
            assertions: vec![Assertion::ErrorParity],
        }
    }

    fn list_mandatory_case(&self) -> TestCase {
        let mut assertions = vec![Assertion::LengthParity {
            path: self.plural.to_string(),
        }];
        assertions.extend(
            self.list_mandatory_parity
                .iter()
                .map(|field| Assertion::FieldParity {
                    path: self.first_element_path(field),
                }),
        );
        TestCase {
            name: self.case_name("list", Category::Mandatory),
            category: Category::Mandatory,
            operation: self.list_op,
            depends_on: vec![
                self.case_name("create", Category::Mandatory),
                self.case_name("create", Category::Optional),
            ],
            fixture: self.fixture_name(self.list_op, Category::Mandatory),
            direct: DirectCall::get_collection(),
            captures: Vec::new(),
            assertions,
        }
    }

    fn list_optional_case(&self) -> TestCase {
        let (filter_key, filter_value) = &self.list_optional_filter;
        let mut assertions = vec![Assertion::LengthIs {
            path: self.plural.to_string(),
            expected: 1,
        }];
        assertions.extend(
            self.list_optional_parity
                .iter()
                .map(|field| Assertion::FieldParity {
                    path: self.first_element_path(field),
                }),
        );
        TestCase {
            name: self.case_name("list", Category::Optional),
            category: Category::Optional,
            operation: self.list_op,
            depends_on: vec![
                self.case_name("create", Category::Mandatory),
                self.case_name("create", Category::Optional),
            ],
            fixture: self.fixture_name(self.list_op, Category::Optional),
            direct: DirectCall {
                method: HttpMethod::Get,
                id_property: None,
                query: vec![((*filter_key).to_string(), filter_value.to_value())],
            },
            captures: Vec::new(),
            assertions,
        }
    }

    fn list_negative_case(&self) -> TestCase {
        let (filter_key, filter_value) = self.list_negative_filter;
        TestCase {
            name: self.case_name("list", Category::Negative),
            category: Category::Negative,
            operation: self.list_op,
            depends_on: Vec::new(),
            fixture: self.fixture_name(self.list_op, Category::Negative),
            direct: DirectCall {
                method: HttpMethod::Get,
                id_property: None,
                query: vec![(
                    filter_key.to_string(),
                    QueryValue::Literal(filter_value.to_string()),
                )],
            },
            captures: Vec::new(),
            assertions: vec![Assertion::ErrorParity],
        }
    }

    fn get_case(&self) -> TestCase {
        TestCase {
            name: self.case_name("get", Category::Mandatory),
            category: Category::Mandatory,
            operation: self.get_op,
            depends_on: vec![self.case_name("create", Category::Mandatory)],
            fixture: self.fixture_name(self.get_op, Category::Mandatory),
            direct: DirectCall::get_by_id(self.id_property),
            captures: Vec::new(),
            assertions: self
                .get_parity
                .iter()
                .map(|field| Assertion::FieldParity {
                    path: self.field_path(field),
                })
                .collect(),
        }
    }

    fn cases(&self) -> Vec<TestCase> {
        vec![
            self.create_case(
                Category::Mandatory,
                self.id_property,
                self.create_mandatory_parity,
                self.create_mandatory_truth,
            ),
            self.create_case(
                Category::Optional,
                self.optional_id_property,
                self.create_optional_parity,
                self.create_optional_truth,
            ),
            self.create_negative_case(),
            self.list_mandatory_case(),
            self.list_optional_case(),
            self.list_negative_case(),
            self.get_case(),
        ]
    }
}

/// The full 21-case catalogue over items, contacts and invoices.
#[must_use]
pub fn standard_registry() -> Vec<TestCase> {
    let items = ResourceSpec {
        singular: "item",
        plural: "items",
        create_op: Operation::CreateItem,
        list_op: Operation::ListItems,
        get_op: Operation::GetItem,
        id_field: "item_id",
        id_property: "itemIdMandatory",
        optional_id_property: "itemIdOptional",
        create_deps: &[],
        create_mandatory_parity: &["name", "rate"],
        create_mandatory_truth: &[("name", "itemNameMandatory"), ("rate", "rate")],
        create_optional_parity: &["description", "tax_percentage"],
        create_optional_truth: &[
            ("description", "description"),
            ("tax_percentage", "taxPercentage"),
        ],
        create_negative_payload: r#"{"rate" : 25.0}"#,
        list_mandatory_parity: &["item_id", "item_name", "item_type"],
        list_optional_filter: ("description", QueryValueSpec::Property("description")),
        list_optional_parity: &["description", "name"],
        list_negative_filter: ("tax_id", "INVALID"),
        get_parity: &["name", "status", "rate", "account_id"],
    };

    let contacts = ResourceSpec {
        singular: "contact",
        plural: "contacts",
        create_op: Operation::CreateContact,
        list_op: Operation::ListContacts,
        get_op: Operation::GetContact,
        id_field: "contact_id",
        id_property: "contactIdMandatory",
        optional_id_property: "contactIdOptional",
        create_deps: &[],
        create_mandatory_parity: &["contact_name", "created_time", "last_modified_time"],
        create_mandatory_truth: &[("contact_name", "contactNameMandatory")],
        create_optional_parity: &["notes", "website", "company_name"],
        create_optional_truth: &[
            ("website", "website"),
            ("company_name", "companyName"),
            ("notes", "notes"),
        ],
        create_negative_payload: "{}",
        list_mandatory_parity: &["contact_id", "contact_name", "created_time"],
        list_optional_filter: (
            "contact_name_startswith",
            QueryValueSpec::Property("contactNameMandatory"),
        ),
        list_optional_parity: &["first_name", "status"],
        list_negative_filter: ("sort_column", "INVALID"),
        get_parity: &["contact_name", "created_time", "last_modified_time"],
    };

    let invoices = ResourceSpec {
        singular: "invoice",
        plural: "invoices",
        create_op: Operation::CreateInvoice,
        list_op: Operation::ListInvoices,
        get_op: Operation::GetInvoice,
        id_field: "invoice_id",
        id_property: "invoiceId",
        optional_id_property: "invoiceIdOptional",
        create_deps: &["create_item_mandatory", "create_contact_mandatory"],
        create_mandatory_parity: &["customer_id", "line_items.0.item_id"],
        create_mandatory_truth: &[
            ("customer_id", "contactIdMandatory"),
            ("line_items.0.item_id", "itemIdMandatory"),
        ],
        create_optional_parity: &["invoice_number", "due_date", "notes"],
        create_optional_truth: &[
            ("invoice_number", "invoiceNumber"),
            ("due_date", "invoiceDueDate"),
            ("notes", "notes"),
        ],
        create_negative_payload: r#"{"customer_id":"INVALID"}"#,
        list_mandatory_parity: &["invoice_id", "customer_id", "currency_id"],
        list_optional_filter: ("per_page", QueryValueSpec::Literal("1")),
        list_optional_parity: &["customer_id", "invoice_number"],
        list_negative_filter: ("item_id", "INVALID"),
        get_parity: &["invoice_number", "customer_id", "line_items.0.item_id", "currency_id"],
    };

    let mut cases = Vec::with_capacity(21);
    cases.extend(items.cases());
    cases.extend(contacts.cases());
    cases.extend(invoices.cases());
    cases
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn registry_has_the_full_catalogue() {
        let cases = standard_registry();
        assert_eq!(cases.len(), 21);
        let names: BTreeSet<&str> = cases.iter().map(|case| case.name.as_str()).collect();
        assert_eq!(names.len(), 21, "case names must be unique");
        assert!(names.contains("create_item_mandatory"));
        assert!(names.contains("list_invoice_negative"));
        assert!(names.contains("get_contact_mandatory"));
    }

    #[test]
    fn invoice_creates_depend_on_item_and_contact() {
        let cases = standard_registry();
        let invoice = cases
            .iter()
            .find(|case| case.name == "create_invoice_mandatory")
            .unwrap();
        assert_eq!(
            invoice.depends_on,
            vec!["create_item_mandatory", "create_contact_mandatory"]
        );
    }

    #[test]
    fn every_negative_case_asserts_cross_path_error_parity() {
        for case in standard_registry() {
            if case.category == Category::Negative {
                assert_eq!(
                    case.assertions,
                    vec![Assertion::ErrorParity],
                    "negative case {} must compare mediated vs direct",
                    case.name
                );
            }
        }
    }

    #[test]
    fn create_cases_capture_their_identifier() {
        let cases = standard_registry();
        let create = cases
            .iter()
            .find(|case| case.name == "create_contact_mandatory")
            .unwrap();
        assert_eq!(create.captures.len(), 1);
        assert_eq!(create.captures[0].path, "contact.contact_id");
        assert_eq!(create.captures[0].key, "contactIdMandatory");
    }

    #[test]
    fn operations_expose_action_names_and_resources() {
        assert_eq!(Operation::CreateInvoice.name(), "createInvoice");
        assert_eq!(Operation::ListContacts.resource(), "contacts");
    }
}
