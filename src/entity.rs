//! The generic "shareable entity" capability.
//!
//! Credentials, leads, projects, expenses and earnings share one storage shape
//! (a JSON body plus an `accesibles` ACL) and one set of controllers. Each kind
//! plugs in through [`Shareable`], which names its collection and declares the
//! fields listing may search, filter and sort on.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::{
    error::ApiError,
    models::{Credential, Earning, Expense, Lead, Project},
    stats,
};

/// EntityKind
///
/// One variant per document collection. The collection name doubles as the
/// Postgres table name and the URL segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Credential,
    Lead,
    Project,
    Expense,
    Earning,
}

impl EntityKind {
    pub const ALL: [EntityKind; 5] = [
        EntityKind::Credential,
        EntityKind::Lead,
        EntityKind::Project,
        EntityKind::Expense,
        EntityKind::Earning,
    ];

    pub const fn collection(self) -> &'static str {
        match self {
            Self::Credential => "credentials",
            Self::Lead => "leads",
            Self::Project => "projects",
            Self::Expense => "expenses",
            Self::Earning => "earnings",
        }
    }

    /// Human label used in response messages ("Lead not found").
    pub const fn label(self) -> &'static str {
        match self {
            Self::Credential => "Credential",
            Self::Lead => "Lead",
            Self::Project => "Project",
            Self::Expense => "Expense",
            Self::Earning => "Earning",
        }
    }

    /// JSON key under which a single record is returned next to other data.
    pub const fn singular(self) -> &'static str {
        match self {
            Self::Credential => "credential",
            Self::Lead => "lead",
            Self::Project => "project",
            Self::Expense => "expense",
            Self::Earning => "earning",
        }
    }

    pub fn not_found(self) -> ApiError {
        ApiError::not_found(format!("{} not found", self.label()))
    }
}

/// Shareable
///
/// Implemented by every entity body that lives in an ACL-scoped collection.
/// The field lists use wire (camelCase) names and are the only body keys the
/// listing layer will ever read, so they are safe to place in queries.
pub trait Shareable:
    Serialize + DeserializeOwned + Default + Clone + Send + Sync + 'static
{
    const KIND: EntityKind;
    const SEARCH_FIELDS: &'static [&'static str];
    const FILTER_FIELDS: &'static [&'static str] = &[];
    const SORT_FIELDS: &'static [&'static str] = &[];

    /// Checks a create payload. Defaults to the patch rules.
    fn validate_new(&self) -> Result<(), ApiError> {
        self.validate_patch()
    }

    /// Checks the fields present in a create or update payload.
    fn validate_patch(&self) -> Result<(), ApiError> {
        Ok(())
    }
}

fn require(field: &str, value: &Option<String>) -> Result<(), ApiError> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(()),
        _ => Err(ApiError::validation(format!("{field} is required"))),
    }
}

fn check_amount(value: &Option<String>) -> Result<(), ApiError> {
    match value {
        Some(raw) if stats::parse_amount(raw).is_none() => Err(ApiError::validation(
            "amount must be a numeric value",
        )),
        _ => Ok(()),
    }
}

impl Shareable for Credential {
    const KIND: EntityKind = EntityKind::Credential;
    const SEARCH_FIELDS: &'static [&'static str] = &["platform", "username", "email"];
    const SORT_FIELDS: &'static [&'static str] = &["platform", "username"];

    fn validate_new(&self) -> Result<(), ApiError> {
        require("platform", &self.platform)
    }
}

impl Shareable for Lead {
    const KIND: EntityKind = EntityKind::Lead;
    const SEARCH_FIELDS: &'static [&'static str] = &["name", "email"];
    const FILTER_FIELDS: &'static [&'static str] = &["status", "source", "type"];
    const SORT_FIELDS: &'static [&'static str] = &["name", "email", "status", "company"];

    fn validate_new(&self) -> Result<(), ApiError> {
        require("name", &self.name)
    }
}

impl Shareable for Project {
    const KIND: EntityKind = EntityKind::Project;
    const SEARCH_FIELDS: &'static [&'static str] = &["name", "client"];
    const FILTER_FIELDS: &'static [&'static str] = &["status"];
    const SORT_FIELDS: &'static [&'static str] = &["name", "status", "startDate", "endDate"];

    fn validate_new(&self) -> Result<(), ApiError> {
        require("name", &self.name)
    }
}

impl Shareable for Expense {
    const KIND: EntityKind = EntityKind::Expense;
    const SEARCH_FIELDS: &'static [&'static str] = &["title", "category"];
    const FILTER_FIELDS: &'static [&'static str] = &["category"];
    const SORT_FIELDS: &'static [&'static str] = &["title", "date", "category"];

    fn validate_patch(&self) -> Result<(), ApiError> {
        check_amount(&self.amount)
    }
}

impl Shareable for Earning {
    const KIND: EntityKind = EntityKind::Earning;
    const SEARCH_FIELDS: &'static [&'static str] = &["title", "source", "client"];
    const FILTER_FIELDS: &'static [&'static str] = &["source"];
    const SORT_FIELDS: &'static [&'static str] = &["title", "date", "source"];

    fn validate_patch(&self) -> Result<(), ApiError> {
        check_amount(&self.amount)
    }
}

// --- Storage shape ---

/// Document
///
/// The untyped row every repository stores for a shareable record.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: Uuid,
    pub body: Map<String, Value>,
    pub accessibles: Vec<Uuid>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    pub fn new(body: Map<String, Value>, accessibles: Vec<Uuid>, created_by: Option<Uuid>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            body,
            accessibles,
            created_by,
            created_at: now,
            updated_at: now,
        }
    }

    /// Serializes a typed body into a document body, dropping absent fields.
    pub fn body_from<T: Shareable>(body: &T) -> Result<Map<String, Value>, serde_json::Error> {
        match serde_json::to_value(body)? {
            Value::Object(map) => Ok(map),
            _ => Ok(Map::new()),
        }
    }

    pub fn is_visible_to(&self, user_id: Uuid) -> bool {
        self.accessibles.contains(&user_id)
    }

    /// Text of a body field, if it holds a string.
    pub fn text(&self, field: &str) -> Option<&str> {
        self.body.get(field).and_then(Value::as_str)
    }
}

/// Record
///
/// The wire envelope of a shareable record: the typed body flattened next to the
/// ACL and bookkeeping fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Record<T> {
    pub id: Uuid,
    #[serde(flatten)]
    pub body: T,
    #[serde(rename = "accesibles")]
    pub accessibles: Vec<Uuid>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<T: Shareable> TryFrom<Document> for Record<T> {
    type Error = serde_json::Error;

    fn try_from(doc: Document) -> Result<Self, Self::Error> {
        Ok(Self {
            id: doc.id,
            body: serde_json::from_value(Value::Object(doc.body))?,
            accessibles: doc.accessibles,
            created_by: doc.created_by,
            created_at: doc.created_at,
            updated_at: doc.updated_at,
        })
    }
}

/// CreateRecordRequest
///
/// Create payload: the entity body plus an optional initial ACL.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateRecordRequest<T> {
    #[serde(flatten)]
    pub body: T,
    #[serde(default, rename = "accesibles")]
    pub accessibles: Vec<Uuid>,
}

// --- Listing ---

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    CreatedAt,
    UpdatedAt,
    /// A whitelisted body field.
    Body(&'static str),
}

/// DocumentQuery
///
/// A fully validated listing request. Only built through [`DocumentQuery::parse`],
/// so every field name it carries comes from a `Shareable` whitelist.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentQuery {
    /// `Some(id)` restricts results to documents whose ACL contains `id`.
    pub viewer: Option<Uuid>,
    pub search: Option<String>,
    pub search_fields: &'static [&'static str],
    pub filters: Vec<(&'static str, String)>,
    pub sort: SortField,
    pub descending: bool,
    pub page: u32,
    pub limit: u32,
}

impl DocumentQuery {
    /// Builds a query for kind `T` from raw query-string parameters.
    ///
    /// Unknown parameters are ignored and unknown sort fields fall back to
    /// `createdAt`; blank values are treated as absent.
    pub fn parse<T: Shareable>(params: &HashMap<String, String>, viewer: Option<Uuid>) -> Self {
        let value = |key: &str| {
            params
                .get(key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
        };

        let page = value("page")
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(1)
            .max(1);
        let limit = value("limit")
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);

        let sort = match value("sortBy") {
            Some("updatedAt") => SortField::UpdatedAt,
            Some(field) => T::SORT_FIELDS
                .iter()
                .copied()
                .find(|allowed| *allowed == field)
                .map(SortField::Body)
                .unwrap_or(SortField::CreatedAt),
            None => SortField::CreatedAt,
        };
        let descending = !matches!(value("sortOrder"), Some(order) if order.eq_ignore_ascii_case("asc"));

        let filters = T::FILTER_FIELDS
            .iter()
            .filter_map(|field| value(field).map(|v| (*field, v.to_string())))
            .collect();

        Self {
            viewer,
            search: value("search").map(str::to_string),
            search_fields: T::SEARCH_FIELDS,
            filters,
            sort,
            descending,
            page,
            limit,
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }

    /// Evaluates the ACL, search and filter predicates against one document.
    pub fn matches(&self, doc: &Document) -> bool {
        if let Some(viewer) = self.viewer {
            if !doc.is_visible_to(viewer) {
                return false;
            }
        }

        if let Some(needle) = &self.search {
            let needle = needle.to_lowercase();
            let hit = self.search_fields.iter().any(|field| {
                doc.text(field)
                    .is_some_and(|text| text.to_lowercase().contains(&needle))
            });
            if !hit {
                return false;
            }
        }

        self.filters
            .iter()
            .all(|(field, expected)| doc.text(field) == Some(expected.as_str()))
    }
}
