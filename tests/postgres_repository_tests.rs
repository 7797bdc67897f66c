//! `PostgresRepository` against a live database.
//!
//! Needs `DATABASE_URL` (a `.env` file works too); without it every test returns
//! early. Tests are `#[serial]` because the stats totals span whole tables, and
//! each test scopes its rows by a fresh ACL viewer or marker and deletes them.

use std::collections::HashMap;

use erp_panel::{
    entity::{Document, DocumentQuery, EntityKind},
    models::{Lead, NewUser},
    repository::{PostgresRepository, Repository, RepositoryError},
};
use rust_decimal::Decimal;
use serde_json::{Map, Value, json};
use serial_test::serial;
use sqlx::PgPool;
use uuid::Uuid;

// --- Test Context and Setup ---

struct DbTestContext {
    pool: PgPool,
}

impl DbTestContext {
    async fn setup() -> Option<Self> {
        dotenv::dotenv().ok();

        let Ok(db_url) = std::env::var("DATABASE_URL") else {
            eprintln!("DATABASE_URL not set; skipping Postgres repository test");
            return None;
        };

        let pool = PgPool::connect(&db_url)
            .await
            .expect("Failed to connect to database for integration tests.");

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("Failed to run database migrations.");

        Some(DbTestContext { pool })
    }

    fn repository(&self) -> PostgresRepository {
        PostgresRepository::new(self.pool.clone())
    }
}

// --- Test Data Helpers ---

fn body(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => panic!("body must be a JSON object"),
    }
}

fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

async fn insert(repo: &PostgresRepository, kind: EntityKind, value: Value, acl: Vec<Uuid>) -> Uuid {
    repo.insert_document(kind, Document::new(body(value), acl, None))
        .await
        .expect("Failed to insert document")
        .id
}

async fn cleanup(repo: &PostgresRepository, kind: EntityKind, ids: &[Uuid]) {
    for id in ids {
        repo.delete_document(kind, *id).await.expect("Failed to delete document");
    }
}

// --- Listing ---

#[tokio::test]
#[serial]
async fn test_leads_second_page_of_three() {
    let Some(ctx) = DbTestContext::setup().await else { return };
    let repo = ctx.repository();
    let viewer = Uuid::new_v4();

    let mut ids = Vec::new();
    for i in 0..25 {
        ids.push(insert(&repo, EntityKind::Lead, json!({ "name": format!("Lead {i:02}") }), vec![viewer]).await);
    }

    let query = DocumentQuery::parse::<Lead>(&params(&[("limit", "10"), ("page", "2")]), Some(viewer));
    let page = repo.list_documents(EntityKind::Lead, &query).await.unwrap();

    assert_eq!(page.items.len(), 10);
    assert_eq!(page.pagination.total_items, 25);
    assert_eq!(page.pagination.total_pages, 3);
    assert_eq!(page.pagination.current_page, 2);

    let query = DocumentQuery::parse::<Lead>(&params(&[("limit", "10"), ("page", "3")]), Some(viewer));
    let last = repo.list_documents(EntityKind::Lead, &query).await.unwrap();
    assert_eq!(last.items.len(), 5);

    cleanup(&repo, EntityKind::Lead, &ids).await;
}

#[tokio::test]
#[serial]
async fn test_search_and_filter_on_jsonb_fields() {
    let Some(ctx) = DbTestContext::setup().await else { return };
    let repo = ctx.repository();
    let marker = Uuid::new_v4().simple().to_string();

    let mut ids = Vec::new();
    for (name, status) in [("Ada", "Won"), ("Grace", "New"), ("Alan", "Won")] {
        let lead = json!({ "name": format!("{name} {marker}"), "status": status });
        ids.push(insert(&repo, EntityKind::Lead, lead, vec![]).await);
    }

    let upper = marker.to_uppercase();
    let query = DocumentQuery::parse::<Lead>(&params(&[("search", upper.as_str())]), None);
    let page = repo.list_documents(EntityKind::Lead, &query).await.unwrap();
    assert_eq!(page.pagination.total_items, 3);

    let query = DocumentQuery::parse::<Lead>(
        &params(&[("search", marker.as_str()), ("status", "Won"), ("sortBy", "name"), ("sortOrder", "asc")]),
        None,
    );
    let page = repo.list_documents(EntityKind::Lead, &query).await.unwrap();
    let names: Vec<String> = page
        .items
        .iter()
        .filter_map(|doc| doc.text("name").map(str::to_string))
        .collect();
    assert_eq!(names, vec![format!("Ada {marker}"), format!("Alan {marker}")]);

    cleanup(&repo, EntityKind::Lead, &ids).await;
}

#[tokio::test]
#[serial]
async fn test_body_sort_is_byte_order_with_missing_last() {
    let Some(ctx) = DbTestContext::setup().await else { return };
    let repo = ctx.repository();
    let viewer = Uuid::new_v4();

    let mut ids = Vec::new();
    for name in [Some("b"), Some("B"), None, Some("a"), Some("A")] {
        let lead = match name {
            Some(name) => json!({ "name": name }),
            None => json!({ "email": "nameless@acme.io" }),
        };
        ids.push(insert(&repo, EntityKind::Lead, lead, vec![viewer]).await);
    }

    let sorted = |order: &'static str| {
        let repo = &repo;
        async move {
            let query = DocumentQuery::parse::<Lead>(
                &params(&[("sortBy", "name"), ("sortOrder", order)]),
                Some(viewer),
            );
            repo.list_documents(EntityKind::Lead, &query)
                .await
                .unwrap()
                .items
                .iter()
                .map(|doc| doc.text("name").map(str::to_string))
                .collect::<Vec<_>>()
        }
    };

    let name = |s: &str| Some(s.to_string());
    assert_eq!(sorted("asc").await, vec![name("A"), name("B"), name("a"), name("b"), None]);
    assert_eq!(sorted("desc").await, vec![name("b"), name("a"), name("B"), name("A"), None]);

    cleanup(&repo, EntityKind::Lead, &ids).await;
}

#[tokio::test]
#[serial]
async fn test_listing_scopes_to_viewer_acl() {
    let Some(ctx) = DbTestContext::setup().await else { return };
    let repo = ctx.repository();
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();

    let ids = vec![
        insert(&repo, EntityKind::Project, json!({ "name": "Alpha" }), vec![alice]).await,
        insert(&repo, EntityKind::Project, json!({ "name": "Beta" }), vec![alice, bob]).await,
    ];

    let count = |viewer: Uuid| {
        let repo = &repo;
        async move {
            let query = DocumentQuery::parse::<erp_panel::models::Project>(&HashMap::new(), Some(viewer));
            repo.list_documents(EntityKind::Project, &query)
                .await
                .unwrap()
                .pagination
                .total_items
        }
    };
    assert_eq!(count(alice).await, 2);
    assert_eq!(count(bob).await, 1);
    assert_eq!(count(Uuid::new_v4()).await, 0);

    cleanup(&repo, EntityKind::Project, &ids).await;
}

// --- Documents ---

#[tokio::test]
#[serial]
async fn test_update_merges_and_delete_removes() {
    let Some(ctx) = DbTestContext::setup().await else { return };
    let repo = ctx.repository();
    let id = insert(&repo, EntityKind::Lead, json!({ "name": "Ada", "status": "New" }), vec![]).await;

    let updated = repo
        .update_document(EntityKind::Lead, id, body(json!({ "status": "Won" })))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.text("name"), Some("Ada"));
    assert_eq!(updated.text("status"), Some("Won"));

    assert!(repo.get_document(EntityKind::Expense, id).await.unwrap().is_none());
    assert!(repo.delete_document(EntityKind::Lead, id).await.unwrap());
    assert!(!repo.delete_document(EntityKind::Lead, id).await.unwrap());
    assert!(repo
        .update_document(EntityKind::Lead, id, Map::new())
        .await
        .unwrap()
        .is_none());
}

// --- Access toggle ---

#[tokio::test]
#[serial]
async fn test_toggle_twice_restores_membership() {
    let Some(ctx) = DbTestContext::setup().await else { return };
    let repo = ctx.repository();
    let owner = Uuid::new_v4();
    let id = insert(&repo, EntityKind::Credential, json!({ "platform": "github" }), vec![owner]).await;
    let admin = Uuid::new_v4();

    let (doc, changes) = repo
        .toggle_access(EntityKind::Credential, id, &[admin])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(doc.accessibles, vec![owner, admin]);
    assert!(changes[0].granted);

    let (doc, changes) = repo
        .toggle_access(EntityKind::Credential, id, &[admin])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(doc.accessibles, vec![owner]);
    assert!(!changes[0].granted);

    assert!(repo
        .toggle_access(EntityKind::Credential, Uuid::new_v4(), &[admin])
        .await
        .unwrap()
        .is_none());

    cleanup(&repo, EntityKind::Credential, &[id]).await;
}

// --- Stats ---

#[tokio::test]
#[serial]
async fn test_stats_skip_non_numeric_amounts() {
    let Some(ctx) = DbTestContext::setup().await else { return };
    let repo = ctx.repository();
    let before = repo.get_stats().await.unwrap();

    let mut ids = Vec::new();
    for amount in [json!("100"), json!("abc"), Value::Null] {
        let mut earning = json!({ "title": "Invoice" });
        if !amount.is_null() {
            earning["amount"] = amount;
        }
        ids.push(insert(&repo, EntityKind::Earning, earning, vec![]).await);
    }
    let lead = insert(&repo, EntityKind::Lead, json!({ "name": "x", "status": "Won" }), vec![]).await;

    let after = repo.get_stats().await.unwrap();
    assert_eq!(after.total_earning_entries - before.total_earning_entries, 3);
    assert_eq!(after.total_earnings - before.total_earnings, Decimal::from(100));
    assert_eq!(after.lead_status_counts.len(), 7);

    let won = |stats: &erp_panel::models::DashboardStats| {
        stats
            .lead_status_counts
            .iter()
            .find(|bucket| bucket.status == "Won")
            .map(|bucket| bucket.count)
            .unwrap_or_default()
    };
    assert_eq!(won(&after) - won(&before), 1);

    cleanup(&repo, EntityKind::Earning, &ids).await;
    cleanup(&repo, EntityKind::Lead, &[lead]).await;
}

#[tokio::test]
#[serial]
async fn test_stats_survive_extreme_amounts() {
    let Some(ctx) = DbTestContext::setup().await else { return };
    let repo = ctx.repository();

    let max = Decimal::MAX.to_string();
    let earning = insert(&repo, EntityKind::Earning, json!({ "title": "wire", "amount": max }), vec![]).await;
    let expense = insert(&repo, EntityKind::Expense, json!({ "title": "refund", "amount": "-1" }), vec![]).await;

    let stats = repo.get_stats().await;

    cleanup(&repo, EntityKind::Earning, &[earning]).await;
    cleanup(&repo, EntityKind::Expense, &[expense]).await;

    assert!(stats.is_ok(), "stats failed: {:?}", stats.err());
}

// --- Users ---

#[tokio::test]
#[serial]
async fn test_duplicate_email_conflicts() {
    let Some(ctx) = DbTestContext::setup().await else { return };
    let repo = ctx.repository();
    let email = format!("{}@example.com", Uuid::new_v4().simple());

    let user = repo
        .create_user(NewUser {
            email: email.clone(),
            full_name: "Ops".into(),
            is_admin: true,
            ..NewUser::default()
        })
        .await
        .unwrap();
    assert_eq!(repo.find_user_by_email(&email).await.unwrap().map(|u| u.id), Some(user.id));

    let duplicate = repo
        .create_user(NewUser {
            email,
            ..NewUser::default()
        })
        .await;
    assert!(matches!(duplicate, Err(RepositoryError::Conflict)));

    assert!(repo.delete_user(user.id).await.unwrap());
    assert!(repo.get_user(user.id).await.unwrap().is_none());
}
