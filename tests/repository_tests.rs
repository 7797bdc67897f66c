use std::collections::HashMap;

use erp_panel::{
    InMemoryRepository,
    entity::{Document, DocumentQuery, EntityKind},
    models::{Credential, Lead, NewUser},
    repository::Repository,
};
use rust_decimal::Decimal;
use serde_json::{Map, Value, json};
use uuid::Uuid;

// --- Helpers ---

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

async fn seed_leads(repo: &InMemoryRepository, count: usize, acl: Vec<Uuid>) {
    for i in 0..count {
        let status = if i % 2 == 0 { "New" } else { "Won" };
        let doc = Document::new(
            body(json!({ "name": format!("Lead {i:02}"), "email": format!("lead{i}@acme.io"), "status": status })),
            acl.clone(),
            None,
        );
        repo.insert_document(EntityKind::Lead, doc).await.unwrap();
    }
}

// --- Listing ---

#[tokio::test]
async fn test_leads_second_page_of_three() {
    let repo = InMemoryRepository::new();
    seed_leads(&repo, 25, vec![]).await;

    let query = DocumentQuery::parse::<Lead>(&params(&[("limit", "10"), ("page", "2")]), None);
    let page = repo.list_documents(EntityKind::Lead, &query).await.unwrap();

    assert_eq!(page.items.len(), 10);
    assert_eq!(page.pagination.total_pages, 3);
    assert_eq!(page.pagination.total_items, 25);
    assert_eq!(page.pagination.current_page, 2);
    assert_eq!(page.pagination.items_per_page, 10);

    let query = DocumentQuery::parse::<Lead>(&params(&[("limit", "10"), ("page", "3")]), None);
    let last = repo.list_documents(EntityKind::Lead, &query).await.unwrap();
    assert_eq!(last.items.len(), 5);
}

#[tokio::test]
async fn test_pages_do_not_overlap() {
    let repo = InMemoryRepository::new();
    seed_leads(&repo, 12, vec![]).await;

    let mut seen = Vec::new();
    for page in ["1", "2", "3"] {
        let query = DocumentQuery::parse::<Lead>(
            &params(&[("limit", "5"), ("page", page), ("sortBy", "name"), ("sortOrder", "asc")]),
            None,
        );
        let result = repo.list_documents(EntityKind::Lead, &query).await.unwrap();
        seen.extend(result.items.into_iter().map(|doc| doc.id));
    }

    let mut unique = seen.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(seen.len(), 12);
    assert_eq!(unique.len(), 12);
}

#[tokio::test]
async fn test_search_and_filter_combine() {
    let repo = InMemoryRepository::new();
    seed_leads(&repo, 10, vec![]).await;

    let query = DocumentQuery::parse::<Lead>(&params(&[("search", "LEAD 0")]), None);
    let page = repo.list_documents(EntityKind::Lead, &query).await.unwrap();
    assert_eq!(page.pagination.total_items, 10);

    let query = DocumentQuery::parse::<Lead>(&params(&[("search", "lead3@"), ("status", "Won")]), None);
    let page = repo.list_documents(EntityKind::Lead, &query).await.unwrap();
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].text("name"), Some("Lead 03"));

    let query = DocumentQuery::parse::<Lead>(&params(&[("status", "Lost")]), None);
    let page = repo.list_documents(EntityKind::Lead, &query).await.unwrap();
    assert!(page.items.is_empty());
    assert_eq!(page.pagination.total_pages, 0);
}

#[tokio::test]
async fn test_listing_scopes_to_viewer_acl() {
    let repo = InMemoryRepository::new();
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    seed_leads(&repo, 3, vec![alice]).await;
    seed_leads(&repo, 2, vec![alice, bob]).await;

    let count = |viewer: Option<Uuid>| {
        let repo = &repo;
        async move {
            let query = DocumentQuery::parse::<Lead>(&HashMap::new(), viewer);
            repo.list_documents(EntityKind::Lead, &query)
                .await
                .unwrap()
                .pagination
                .total_items
        }
    };

    assert_eq!(count(Some(alice)).await, 5);
    assert_eq!(count(Some(bob)).await, 2);
    assert_eq!(count(Some(Uuid::new_v4())).await, 0);
    assert_eq!(count(None).await, 5);
}

// --- Access toggle ---

#[tokio::test]
async fn test_toggle_grants_then_revokes() {
    let repo = InMemoryRepository::new();
    let body = Document::body_from(&Credential {
        platform: Some("github".into()),
        ..Credential::default()
    })
    .unwrap();
    let doc = Document::new(body, vec![], None);
    let id = doc.id;
    repo.insert_document(EntityKind::Credential, doc).await.unwrap();

    let admin = Uuid::new_v4();
    let (doc, changes) = repo
        .toggle_access(EntityKind::Credential, id, &[admin])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(doc.accessibles, vec![admin]);
    assert!(changes[0].granted);
    assert_eq!(changes[0].message, "Access granted to admin");

    let (doc, changes) = repo
        .toggle_access(EntityKind::Credential, id, &[admin])
        .await
        .unwrap()
        .unwrap();
    assert!(doc.accessibles.is_empty());
    assert!(!changes[0].granted);
    assert_eq!(changes[0].message, "Access removed");
}

#[tokio::test]
async fn test_toggle_on_missing_record_is_none() {
    let repo = InMemoryRepository::new();
    let result = repo
        .toggle_access(EntityKind::Project, Uuid::new_v4(), &[Uuid::new_v4()])
        .await
        .unwrap();
    assert!(result.is_none());
}

// --- Stats ---

#[tokio::test]
async fn test_stats_ignore_non_numeric_amounts() {
    let repo = InMemoryRepository::new();
    for amount in [Some("100"), Some("abc"), None] {
        let mut map = Map::new();
        map.insert("title".into(), json!("invoice"));
        if let Some(amount) = amount {
            map.insert("amount".into(), json!(amount));
        }
        repo.insert_document(EntityKind::Earning, Document::new(map, vec![], None))
            .await
            .unwrap();
    }
    repo.insert_document(
        EntityKind::Expense,
        Document::new(body(json!({ "amount": "12.50" })), vec![], None),
    )
    .await
    .unwrap();

    let stats = repo.get_stats().await.unwrap();
    assert_eq!(stats.total_earning_entries, 3);
    assert_eq!(stats.total_earnings, Decimal::from(100));
    assert_eq!(stats.total_expenses, Decimal::new(1250, 2));
    assert_eq!(stats.net_income, Decimal::new(8750, 2));
}

#[tokio::test]
async fn test_stats_saturate_on_extreme_amounts() {
    let repo = InMemoryRepository::new();
    let max = Decimal::MAX.to_string();
    for amount in [max.as_str(), "1"] {
        repo.insert_document(
            EntityKind::Earning,
            Document::new(body(json!({ "title": "wire", "amount": amount })), vec![], None),
        )
        .await
        .unwrap();
    }
    repo.insert_document(
        EntityKind::Expense,
        Document::new(body(json!({ "title": "refund", "amount": "-1" })), vec![], None),
    )
    .await
    .unwrap();

    let stats = repo.get_stats().await.unwrap();
    assert_eq!(stats.total_earnings, Decimal::MAX);
    assert_eq!(stats.total_expenses, Decimal::NEGATIVE_ONE);
    assert_eq!(stats.net_income, Decimal::MAX);
}

#[tokio::test]
async fn test_stats_bucket_statuses_and_roles() {
    let repo = InMemoryRepository::new();
    for status in ["New", "New", "Won", "Archived"] {
        repo.insert_document(
            EntityKind::Lead,
            Document::new(body(json!({ "name": "x", "status": status })), vec![], None),
        )
        .await
        .unwrap();
    }
    for (email, is_admin, is_super_admin) in [
        ("a@x.io", true, false),
        ("b@x.io", true, true),
        ("c@x.io", false, false),
    ] {
        repo.create_user(NewUser {
            email: email.into(),
            is_admin,
            is_super_admin,
            ..NewUser::default()
        })
        .await
        .unwrap();
    }

    let stats = repo.get_stats().await.unwrap();
    assert_eq!(stats.total_leads, 4);
    assert_eq!(stats.lead_status_counts.len(), 7);
    let count_of = |status: &str| {
        stats
            .lead_status_counts
            .iter()
            .find(|bucket| bucket.status == status)
            .map(|bucket| bucket.count)
    };
    assert_eq!(count_of("New"), Some(2));
    assert_eq!(count_of("Won"), Some(1));
    assert_eq!(count_of("Lost"), Some(0));
    assert_eq!(count_of("Archived"), None);

    assert_eq!(stats.project_status_counts.len(), 5);
    assert!(stats.project_status_counts.iter().all(|bucket| bucket.count == 0));

    assert_eq!(stats.total_users, 3);
    assert_eq!(stats.total_admins, 1);
    assert_eq!(stats.total_super_admins, 1);
}
