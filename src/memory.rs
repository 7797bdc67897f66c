use std::{cmp::Ordering, collections::HashMap};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::{
    acl,
    entity::{Document, DocumentQuery, EntityKind, SortField},
    models::{AccessChange, DashboardStats, NewUser, Page, Pagination, User, UserPatch},
    repository::{RepoResult, Repository, RepositoryError},
    stats::{self, LEAD_STATUSES, PROJECT_STATUSES},
};

#[derive(Default)]
struct Store {
    users: HashMap<Uuid, User>,
    documents: HashMap<EntityKind, Vec<Document>>,
}

/// InMemoryRepository
///
/// A `Repository` kept entirely in process memory. Used by the test suite and by
/// local runs without `DATABASE_URL`. Semantics mirror `PostgresRepository`,
/// including the ordering rules of listing (text sorts by byte order).
#[derive(Default)]
pub struct InMemoryRepository {
    store: RwLock<Store>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Orders two documents by the requested sort field; missing body values sort
/// last regardless of direction, ties break on id.
fn compare(a: &Document, b: &Document, sort: SortField, descending: bool) -> Ordering {
    let directed = |ordering: Ordering| if descending { ordering.reverse() } else { ordering };

    let primary = match sort {
        SortField::CreatedAt => directed(a.created_at.cmp(&b.created_at)),
        SortField::UpdatedAt => directed(a.updated_at.cmp(&b.updated_at)),
        SortField::Body(field) => match (a.text(field), b.text(field)) {
            (Some(x), Some(y)) => directed(x.cmp(y)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        },
    };
    primary.then_with(|| a.id.cmp(&b.id))
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>> {
        Ok(self.store.read().users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        Ok(self
            .store
            .read()
            .users
            .values()
            .find(|user| user.email == email)
            .cloned())
    }

    async fn list_users(&self) -> RepoResult<Vec<User>> {
        let mut users: Vec<User> = self.store.read().users.values().cloned().collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(users)
    }

    async fn create_user(&self, user: NewUser) -> RepoResult<User> {
        let mut store = self.store.write();
        if store.users.values().any(|existing| existing.email == user.email) {
            return Err(RepositoryError::Conflict);
        }

        let now = Utc::now();
        let created = User {
            id: Uuid::new_v4(),
            email: user.email,
            password_hash: user.password_hash,
            full_name: user.full_name,
            phone: user.phone,
            address: user.address,
            designation: user.designation,
            avatar: None,
            is_admin: user.is_admin,
            is_super_admin: user.is_super_admin,
            bank_details: Vec::new(),
            personal_details: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        store.users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_user(&self, id: Uuid, patch: UserPatch) -> RepoResult<Option<User>> {
        let mut store = self.store.write();
        let Some(user) = store.users.get_mut(&id) else {
            return Ok(None);
        };

        if let Some(v) = patch.full_name {
            user.full_name = v;
        }
        if let Some(v) = patch.phone {
            user.phone = Some(v);
        }
        if let Some(v) = patch.address {
            user.address = Some(v);
        }
        if let Some(v) = patch.designation {
            user.designation = Some(v);
        }
        if let Some(v) = patch.avatar {
            user.avatar = Some(v);
        }
        if let Some(v) = patch.bank_details {
            user.bank_details = v;
        }
        if let Some(v) = patch.personal_details {
            user.personal_details = v;
        }
        if let Some(v) = patch.password_hash {
            user.password_hash = v;
        }
        if let Some(v) = patch.is_admin {
            user.is_admin = v;
        }
        if let Some(v) = patch.is_super_admin {
            user.is_super_admin = v;
        }
        user.updated_at = Utc::now();

        Ok(Some(user.clone()))
    }

    async fn delete_user(&self, id: Uuid) -> RepoResult<bool> {
        Ok(self.store.write().users.remove(&id).is_some())
    }

    async fn insert_document(&self, kind: EntityKind, doc: Document) -> RepoResult<Document> {
        self.store
            .write()
            .documents
            .entry(kind)
            .or_default()
            .push(doc.clone());
        Ok(doc)
    }

    async fn get_document(&self, kind: EntityKind, id: Uuid) -> RepoResult<Option<Document>> {
        Ok(self
            .store
            .read()
            .documents
            .get(&kind)
            .and_then(|docs| docs.iter().find(|doc| doc.id == id))
            .cloned())
    }

    async fn list_documents(
        &self,
        kind: EntityKind,
        query: &DocumentQuery,
    ) -> RepoResult<Page<Document>> {
        let store = self.store.read();
        let mut matching: Vec<&Document> = store
            .documents
            .get(&kind)
            .map(|docs| docs.iter().filter(|doc| query.matches(doc)).collect())
            .unwrap_or_default();
        matching.sort_by(|a, b| compare(a, b, query.sort, query.descending));

        let total = matching.len() as u64;
        let offset = usize::try_from(query.offset()).unwrap_or(usize::MAX);
        let items = matching
            .into_iter()
            .skip(offset)
            .take(query.limit as usize)
            .cloned()
            .collect();

        Ok(Page {
            items,
            pagination: Pagination::new(query.page, query.limit, total),
        })
    }

    async fn update_document(
        &self,
        kind: EntityKind,
        id: Uuid,
        patch: Map<String, Value>,
    ) -> RepoResult<Option<Document>> {
        let mut store = self.store.write();
        let Some(doc) = store
            .documents
            .get_mut(&kind)
            .and_then(|docs| docs.iter_mut().find(|doc| doc.id == id))
        else {
            return Ok(None);
        };

        doc.body.extend(patch);
        doc.updated_at = Utc::now();
        Ok(Some(doc.clone()))
    }

    async fn delete_document(&self, kind: EntityKind, id: Uuid) -> RepoResult<bool> {
        let mut store = self.store.write();
        let Some(docs) = store.documents.get_mut(&kind) else {
            return Ok(false);
        };
        let before = docs.len();
        docs.retain(|doc| doc.id != id);
        Ok(docs.len() < before)
    }

    async fn toggle_access(
        &self,
        kind: EntityKind,
        id: Uuid,
        targets: &[Uuid],
    ) -> RepoResult<Option<(Document, Vec<AccessChange>)>> {
        // The write guard spans the read-modify-write.
        let mut store = self.store.write();
        let Some(doc) = store
            .documents
            .get_mut(&kind)
            .and_then(|docs| docs.iter_mut().find(|doc| doc.id == id))
        else {
            return Ok(None);
        };

        let changes = acl::toggle(&mut doc.accessibles, targets);
        doc.updated_at = Utc::now();
        Ok(Some((doc.clone(), changes)))
    }

    async fn get_stats(&self) -> RepoResult<DashboardStats> {
        let store = self.store.read();
        let docs = |kind: EntityKind| store.documents.get(&kind).map(Vec::as_slice).unwrap_or(&[]);
        let count = |kind: EntityKind| docs(kind).len() as i64;
        let amounts = |kind: EntityKind| stats::sum_amounts(docs(kind).iter().map(|doc| doc.text("amount")));
        let statuses = |kind: EntityKind| {
            let mut counts: HashMap<String, i64> = HashMap::new();
            for status in docs(kind).iter().filter_map(|doc| doc.text("status")) {
                *counts.entry(status.to_string()).or_default() += 1;
            }
            counts
        };

        let total_earnings = amounts(EntityKind::Earning);
        let total_expenses = amounts(EntityKind::Expense);
        let users = store.users.values();

        Ok(DashboardStats {
            total_credentials: count(EntityKind::Credential),
            total_leads: count(EntityKind::Lead),
            total_projects: count(EntityKind::Project),
            total_expense_entries: count(EntityKind::Expense),
            total_earning_entries: count(EntityKind::Earning),
            total_users: store.users.len() as i64,
            total_admins: users
                .clone()
                .filter(|u| u.is_admin && !u.is_super_admin)
                .count() as i64,
            total_super_admins: users.filter(|u| u.is_super_admin).count() as i64,
            total_earnings,
            total_expenses,
            net_income: stats::net_income(total_earnings, total_expenses),
            lead_status_counts: stats::bucket_statuses(&LEAD_STATUSES, &statuses(EntityKind::Lead)),
            project_status_counts: stats::bucket_statuses(
                &PROJECT_STATUSES,
                &statuses(EntityKind::Project),
            ),
        })
    }
}
