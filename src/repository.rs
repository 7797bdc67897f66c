use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use sqlx::{FromRow, PgPool, Postgres, query_builder::QueryBuilder, types::Json};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    acl,
    entity::{Document, DocumentQuery, EntityKind, SortField},
    models::{
        AccessChange, BankDetail, DashboardStats, NewUser, Page, Pagination, PersonalDetail,
        User, UserPatch,
    },
    stats::{self, LEAD_STATUSES, PROJECT_STATUSES},
};

/// RepositoryError
///
/// Persistence faults. Handlers turn these into 500s, except `Conflict`, which
/// surfaces a unique-key race on account email.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("document serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("unique constraint violated")]
    Conflict,
}

pub type RepoResult<T> = Result<T, RepositoryError>;

/// Repository Trait
///
/// The persistence contract shared by the Postgres backend and the in-memory
/// backend used by tests and database-less local runs. Shareable records are
/// addressed by `EntityKind`, so one set of methods serves every collection.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Accounts ---
    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>>;
    // `email` is expected already normalized (trimmed, lowercased).
    async fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>>;
    async fn list_users(&self) -> RepoResult<Vec<User>>;
    async fn create_user(&self, user: NewUser) -> RepoResult<User>;
    async fn update_user(&self, id: Uuid, patch: UserPatch) -> RepoResult<Option<User>>;
    async fn delete_user(&self, id: Uuid) -> RepoResult<bool>;

    // --- Shareable documents ---
    async fn insert_document(&self, kind: EntityKind, doc: Document) -> RepoResult<Document>;
    async fn get_document(&self, kind: EntityKind, id: Uuid) -> RepoResult<Option<Document>>;
    async fn list_documents(
        &self,
        kind: EntityKind,
        query: &DocumentQuery,
    ) -> RepoResult<Page<Document>>;
    // Shallow merge: top-level keys in `patch` replace the stored ones.
    async fn update_document(
        &self,
        kind: EntityKind,
        id: Uuid,
        patch: Map<String, Value>,
    ) -> RepoResult<Option<Document>>;
    async fn delete_document(&self, kind: EntityKind, id: Uuid) -> RepoResult<bool>;
    // Applies `acl::toggle` atomically. `None` when the record does not exist.
    async fn toggle_access(
        &self,
        kind: EntityKind,
        id: Uuid,
        targets: &[Uuid],
    ) -> RepoResult<Option<(Document, Vec<AccessChange>)>>;

    // --- Dashboard ---
    async fn get_stats(&self) -> RepoResult<DashboardStats>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

// --- Postgres rows ---

const USER_COLUMNS: &str = "id, email, password_hash, full_name, phone, address, designation, \
     avatar, is_admin, is_super_admin, bank_details, personal_details, created_at, updated_at";

const DOCUMENT_COLUMNS: &str = "id, data, accesibles, created_by, created_at, updated_at";

#[derive(FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    password_hash: String,
    full_name: String,
    phone: Option<String>,
    address: Option<String>,
    designation: Option<String>,
    avatar: Option<String>,
    is_admin: bool,
    is_super_admin: bool,
    bank_details: Json<Vec<BankDetail>>,
    personal_details: Json<Vec<PersonalDetail>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            email: row.email,
            password_hash: row.password_hash,
            full_name: row.full_name,
            phone: row.phone,
            address: row.address,
            designation: row.designation,
            avatar: row.avatar,
            is_admin: row.is_admin,
            is_super_admin: row.is_super_admin,
            bank_details: row.bank_details.0,
            personal_details: row.personal_details.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
struct DocumentRow {
    id: Uuid,
    data: Json<Map<String, Value>>,
    accesibles: Vec<Uuid>,
    created_by: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<DocumentRow> for Document {
    fn from(row: DocumentRow) -> Self {
        Self {
            id: row.id,
            body: row.data.0,
            accessibles: row.accesibles,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

fn map_unique_violation(err: sqlx::Error) -> RepositoryError {
    match err.as_database_error() {
        Some(db) if db.is_unique_violation() => RepositoryError::Conflict,
        _ => RepositoryError::Database(err),
    }
}

/// PostgresRepository
///
/// The production implementation. Accounts live in a typed `users` table; each
/// shareable collection is a table of JSONB documents with a `UUID[]` ACL.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn count(&self, sql: &str) -> RepoResult<i64> {
        Ok(sqlx::query_scalar::<_, i64>(sql).fetch_one(&self.pool).await?)
    }

    /// Summed in Rust so the total saturates at the `Decimal` bounds, same as
    /// the in-memory backend.
    async fn sum_amounts(&self, kind: EntityKind) -> RepoResult<Decimal> {
        let sql = format!(
            "SELECT data ->> 'amount' FROM {} WHERE data ->> 'amount' ~ $1",
            kind.collection()
        );
        let amounts = sqlx::query_scalar::<_, String>(&sql)
            .bind(stats::AMOUNT_PATTERN_SQL)
            .fetch_all(&self.pool)
            .await?;
        Ok(stats::sum_amounts(amounts.iter().map(|raw| Some(raw.as_str()))))
    }

    async fn status_counts(&self, kind: EntityKind) -> RepoResult<HashMap<String, i64>> {
        let sql = format!(
            "SELECT data ->> 'status' AS status, COUNT(*) AS count FROM {} \
             WHERE data ? 'status' GROUP BY 1",
            kind.collection()
        );
        let rows = sqlx::query_as::<_, (Option<String>, i64)>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .filter_map(|(status, count)| status.map(|s| (s, count)))
            .collect())
    }
}

/// Appends the WHERE clause for a listing query. Field names are bound as
/// parameters; only the table name is interpolated.
fn push_conditions(builder: &mut QueryBuilder<'_, Postgres>, query: &DocumentQuery) {
    builder.push(" WHERE TRUE");

    if let Some(viewer) = query.viewer {
        builder.push(" AND ");
        builder.push_bind(viewer);
        builder.push(" = ANY(accesibles)");
    }

    if let Some(search) = &query.search {
        builder.push(" AND (FALSE");
        for field in query.search_fields {
            builder.push(" OR strpos(lower(data ->> ");
            builder.push_bind(*field);
            builder.push("), lower(");
            builder.push_bind(search.clone());
            builder.push(")) > 0");
        }
        builder.push(")");
    }

    for (field, value) in &query.filters {
        builder.push(" AND data ->> ");
        builder.push_bind(*field);
        builder.push(" = ");
        builder.push_bind(value.clone());
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(User::from))
    }

    async fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(User::from))
    }

    async fn list_users(&self) -> RepoResult<Vec<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC");
        let rows = sqlx::query_as::<_, UserRow>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(User::from).collect())
    }

    /// create_user
    ///
    /// Inserts an account. A concurrent insert of the same email surfaces as
    /// `RepositoryError::Conflict` through the unique index.
    async fn create_user(&self, user: NewUser) -> RepoResult<User> {
        let sql = format!(
            "INSERT INTO users (id, email, password_hash, full_name, phone, address, designation, \
             is_admin, is_super_admin, bank_details, personal_details, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, '[]', '[]', NOW(), NOW()) \
             RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(user.email)
            .bind(user.password_hash)
            .bind(user.full_name)
            .bind(user.phone)
            .bind(user.address)
            .bind(user.designation)
            .bind(user.is_admin)
            .bind(user.is_super_admin)
            .fetch_one(&self.pool)
            .await
            .map_err(map_unique_violation)?;
        Ok(row.into())
    }

    /// update_user
    ///
    /// Uses `COALESCE` so that only the `Some` fields of the patch are written.
    async fn update_user(&self, id: Uuid, patch: UserPatch) -> RepoResult<Option<User>> {
        let sql = format!(
            "UPDATE users SET \
                full_name = COALESCE($2, full_name), \
                phone = COALESCE($3, phone), \
                address = COALESCE($4, address), \
                designation = COALESCE($5, designation), \
                avatar = COALESCE($6, avatar), \
                bank_details = COALESCE($7, bank_details), \
                personal_details = COALESCE($8, personal_details), \
                password_hash = COALESCE($9, password_hash), \
                is_admin = COALESCE($10, is_admin), \
                is_super_admin = COALESCE($11, is_super_admin), \
                updated_at = NOW() \
             WHERE id = $1 RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .bind(patch.full_name)
            .bind(patch.phone)
            .bind(patch.address)
            .bind(patch.designation)
            .bind(patch.avatar)
            .bind(patch.bank_details.map(Json))
            .bind(patch.personal_details.map(Json))
            .bind(patch.password_hash)
            .bind(patch.is_admin)
            .bind(patch.is_super_admin)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(User::from))
    }

    async fn delete_user(&self, id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_document(&self, kind: EntityKind, doc: Document) -> RepoResult<Document> {
        let sql = format!(
            "INSERT INTO {} (id, data, accesibles, created_by, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {DOCUMENT_COLUMNS}",
            kind.collection()
        );
        let row = sqlx::query_as::<_, DocumentRow>(&sql)
            .bind(doc.id)
            .bind(Json(doc.body))
            .bind(doc.accessibles)
            .bind(doc.created_by)
            .bind(doc.created_at)
            .bind(doc.updated_at)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.into())
    }

    async fn get_document(&self, kind: EntityKind, id: Uuid) -> RepoResult<Option<Document>> {
        let sql = format!(
            "SELECT {DOCUMENT_COLUMNS} FROM {} WHERE id = $1",
            kind.collection()
        );
        let row = sqlx::query_as::<_, DocumentRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Document::from))
    }

    /// list_documents
    ///
    /// Builds the count and page queries with `QueryBuilder` for safe
    /// parameterization. Missing sort values order last in both directions.
    async fn list_documents(
        &self,
        kind: EntityKind,
        query: &DocumentQuery,
    ) -> RepoResult<Page<Document>> {
        let table = kind.collection();

        let mut count: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT COUNT(*) FROM {table}"));
        push_conditions(&mut count, query);
        let total = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        let mut select: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {DOCUMENT_COLUMNS} FROM {table}"));
        push_conditions(&mut select, query);

        select.push(" ORDER BY ");
        match query.sort {
            SortField::CreatedAt => {
                select.push("created_at");
            }
            SortField::UpdatedAt => {
                select.push("updated_at");
            }
            SortField::Body(field) => {
                // Byte order, matching `InMemoryRepository` regardless of the database locale.
                select.push("(data ->> ");
                select.push_bind(field);
                select.push(") COLLATE \"C\"");
            }
        }
        select.push(if query.descending {
            " DESC NULLS LAST, id"
        } else {
            " ASC NULLS LAST, id"
        });
        select.push(" LIMIT ");
        select.push_bind(i64::from(query.limit));
        select.push(" OFFSET ");
        select.push_bind(i64::try_from(query.offset()).unwrap_or(i64::MAX));

        let rows = select
            .build_query_as::<DocumentRow>()
            .fetch_all(&self.pool)
            .await?;

        Ok(Page {
            items: rows.into_iter().map(Document::from).collect(),
            pagination: Pagination::new(
                query.page,
                query.limit,
                u64::try_from(total).unwrap_or(0),
            ),
        })
    }

    async fn update_document(
        &self,
        kind: EntityKind,
        id: Uuid,
        patch: Map<String, Value>,
    ) -> RepoResult<Option<Document>> {
        let sql = format!(
            "UPDATE {} SET data = data || $2, updated_at = NOW() \
             WHERE id = $1 RETURNING {DOCUMENT_COLUMNS}",
            kind.collection()
        );
        let row = sqlx::query_as::<_, DocumentRow>(&sql)
            .bind(id)
            .bind(Json(patch))
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Document::from))
    }

    async fn delete_document(&self, kind: EntityKind, id: Uuid) -> RepoResult<bool> {
        let sql = format!("DELETE FROM {} WHERE id = $1", kind.collection());
        let result = sqlx::query(&sql).bind(id).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    /// toggle_access
    ///
    /// Locks the row for the read-modify-write so concurrent toggles on the same
    /// record serialize instead of overwriting each other's ACL.
    async fn toggle_access(
        &self,
        kind: EntityKind,
        id: Uuid,
        targets: &[Uuid],
    ) -> RepoResult<Option<(Document, Vec<AccessChange>)>> {
        let table = kind.collection();
        let mut tx = self.pool.begin().await?;

        let select = format!("SELECT {DOCUMENT_COLUMNS} FROM {table} WHERE id = $1 FOR UPDATE");
        let Some(row) = sqlx::query_as::<_, DocumentRow>(&select)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
        else {
            return Ok(None);
        };

        let mut accessibles = row.accesibles;
        let changes = acl::toggle(&mut accessibles, targets);

        let update = format!(
            "UPDATE {table} SET accesibles = $2, updated_at = NOW() \
             WHERE id = $1 RETURNING {DOCUMENT_COLUMNS}"
        );
        let updated = sqlx::query_as::<_, DocumentRow>(&update)
            .bind(id)
            .bind(accessibles)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some((updated.into(), changes)))
    }

    /// get_stats
    ///
    /// Compiles every dashboard counter and total, fresh per call.
    async fn get_stats(&self) -> RepoResult<DashboardStats> {
        let total_earnings = self.sum_amounts(EntityKind::Earning).await?;
        let total_expenses = self.sum_amounts(EntityKind::Expense).await?;
        let lead_counts = self.status_counts(EntityKind::Lead).await?;
        let project_counts = self.status_counts(EntityKind::Project).await?;

        Ok(DashboardStats {
            total_credentials: self.count("SELECT COUNT(*) FROM credentials").await?,
            total_leads: self.count("SELECT COUNT(*) FROM leads").await?,
            total_projects: self.count("SELECT COUNT(*) FROM projects").await?,
            total_expense_entries: self.count("SELECT COUNT(*) FROM expenses").await?,
            total_earning_entries: self.count("SELECT COUNT(*) FROM earnings").await?,
            total_users: self.count("SELECT COUNT(*) FROM users").await?,
            total_admins: self
                .count("SELECT COUNT(*) FROM users WHERE is_admin AND NOT is_super_admin")
                .await?,
            total_super_admins: self
                .count("SELECT COUNT(*) FROM users WHERE is_super_admin")
                .await?,
            total_earnings,
            total_expenses,
            net_income: stats::net_income(total_earnings, total_expenses),
            lead_status_counts: stats::bucket_statuses(&LEAD_STATUSES, &lead_counts),
            project_status_counts: stats::bucket_statuses(&PROJECT_STATUSES, &project_counts),
        })
    }
}
