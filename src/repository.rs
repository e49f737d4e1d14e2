use crate::models::{Admin, AdminId, Item, ItemDraft, ItemId};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard},
};

/// RepositoryError
///
/// Failures of the persistence layer. Only `Duplicate` is meaningful to callers;
/// everything else is an infrastructure fault.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("unique constraint violated")]
    Duplicate,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Repository Trait
///
/// The contract the credential and item stores expect from the backing store:
/// unique-username lookup, create/read/update/delete by id, ordering, and
/// pagination. Each mutation is a single atomic statement.
///
/// **Send + Sync + async_trait** make `Arc<dyn Repository>` shareable across
/// Axum's task boundaries.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Admins ---
    async fn find_admin_by_username(&self, username: &str) -> Result<Option<Admin>, RepositoryError>;
    async fn get_admin(&self, id: AdminId) -> Result<Option<Admin>, RepositoryError>;
    // Fails with `Duplicate` when the username is taken; nothing is written then.
    async fn insert_admin(&self, username: &str, password_hash: &str) -> Result<Admin, RepositoryError>;
    // Checked at startup to point operators at registration.
    async fn count_admins(&self) -> Result<i64, RepositoryError>;

    // --- Items ---
    async fn insert_item(&self, draft: &ItemDraft) -> Result<Item, RepositoryError>;
    async fn get_item(&self, id: ItemId) -> Result<Option<Item>, RepositoryError>;
    // `None` when no row has this id. `created_at` is left untouched.
    async fn update_item(&self, id: ItemId, draft: &ItemDraft) -> Result<Option<Item>, RepositoryError>;
    // `false` when no row has this id.
    async fn delete_item(&self, id: ItemId) -> Result<bool, RepositoryError>;
    async fn count_items(&self) -> Result<i64, RepositoryError>;
    // Newest first: `created_at DESC, id DESC`.
    async fn list_items(&self, limit: i64, offset: i64) -> Result<Vec<Item>, RepositoryError>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

fn map_insert_error(err: sqlx::Error) -> RepositoryError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => RepositoryError::Duplicate,
        _ => RepositoryError::Database(err),
    }
}

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by PostgreSQL.
/// Queries are checked at runtime so the crate builds without a live database.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn find_admin_by_username(&self, username: &str) -> Result<Option<Admin>, RepositoryError> {
        let admin = sqlx::query_as::<_, Admin>(
            "SELECT id, username, password_hash FROM admins WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(admin)
    }

    async fn get_admin(&self, id: AdminId) -> Result<Option<Admin>, RepositoryError> {
        let admin = sqlx::query_as::<_, Admin>(
            "SELECT id, username, password_hash FROM admins WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(admin)
    }

    /// insert_admin
    ///
    /// Relies on the UNIQUE constraint on `admins.username` so two concurrent
    /// registrations for the same name cannot both succeed.
    async fn insert_admin(&self, username: &str, password_hash: &str) -> Result<Admin, RepositoryError> {
        sqlx::query_as::<_, Admin>(
            r#"INSERT INTO admins (username, password_hash)
               VALUES ($1, $2)
               RETURNING id, username, password_hash"#,
        )
        .bind(username)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(map_insert_error)
    }

    async fn count_admins(&self) -> Result<i64, RepositoryError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM admins")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn insert_item(&self, draft: &ItemDraft) -> Result<Item, RepositoryError> {
        let item = sqlx::query_as::<_, Item>(
            r#"INSERT INTO items (title, description, created_at)
               VALUES ($1, $2, NOW())
               RETURNING id, title, description, created_at"#,
        )
        .bind(&draft.title)
        .bind(draft.description.as_deref())
        .fetch_one(&self.pool)
        .await?;
        Ok(item)
    }

    async fn get_item(&self, id: ItemId) -> Result<Option<Item>, RepositoryError> {
        let item = sqlx::query_as::<_, Item>(
            "SELECT id, title, description, created_at FROM items WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(item)
    }

    async fn update_item(&self, id: ItemId, draft: &ItemDraft) -> Result<Option<Item>, RepositoryError> {
        let item = sqlx::query_as::<_, Item>(
            r#"UPDATE items SET title = $1, description = $2
               WHERE id = $3
               RETURNING id, title, description, created_at"#,
        )
        .bind(&draft.title)
        .bind(draft.description.as_deref())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(item)
    }

    async fn delete_item(&self, id: ItemId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM items WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_items(&self) -> Result<i64, RepositoryError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM items")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn list_items(&self, limit: i64, offset: i64) -> Result<Vec<Item>, RepositoryError> {
        let items = sqlx::query_as::<_, Item>(
            r#"SELECT id, title, description, created_at
               FROM items
               ORDER BY created_at DESC, id DESC
               LIMIT $1 OFFSET $2"#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }
}

// --- In-Memory Implementation ---

#[derive(Default)]
struct MemoryTables {
    admins: BTreeMap<AdminId, Admin>,
    items: BTreeMap<ItemId, Item>,
    last_admin_id: AdminId,
    last_item_id: ItemId,
}

/// MemoryRepository
///
/// Process-local implementation of `Repository` with the same uniqueness and
/// ordering rules as the Postgres schema. Used by the test-suite and handy for
/// running the router without a database.
#[derive(Default)]
pub struct MemoryRepository {
    tables: Mutex<MemoryTables>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, MemoryTables> {
        // A panic while holding the lock cannot leave the maps half-written.
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn find_admin_by_username(&self, username: &str) -> Result<Option<Admin>, RepositoryError> {
        Ok(self
            .tables()
            .admins
            .values()
            .find(|admin| admin.username == username)
            .cloned())
    }

    async fn get_admin(&self, id: AdminId) -> Result<Option<Admin>, RepositoryError> {
        Ok(self.tables().admins.get(&id).cloned())
    }

    async fn insert_admin(&self, username: &str, password_hash: &str) -> Result<Admin, RepositoryError> {
        let mut tables = self.tables();
        if tables.admins.values().any(|admin| admin.username == username) {
            return Err(RepositoryError::Duplicate);
        }
        tables.last_admin_id += 1;
        let admin = Admin {
            id: tables.last_admin_id,
            username: username.to_string(),
            password_hash: password_hash.to_string(),
        };
        tables.admins.insert(admin.id, admin.clone());
        Ok(admin)
    }

    async fn count_admins(&self) -> Result<i64, RepositoryError> {
        Ok(self.tables().admins.len() as i64)
    }

    async fn insert_item(&self, draft: &ItemDraft) -> Result<Item, RepositoryError> {
        let mut tables = self.tables();
        tables.last_item_id += 1;
        let item = Item {
            id: tables.last_item_id,
            title: draft.title.clone(),
            description: draft.description.clone(),
            created_at: Utc::now(),
        };
        tables.items.insert(item.id, item.clone());
        Ok(item)
    }

    async fn get_item(&self, id: ItemId) -> Result<Option<Item>, RepositoryError> {
        Ok(self.tables().items.get(&id).cloned())
    }

    async fn update_item(&self, id: ItemId, draft: &ItemDraft) -> Result<Option<Item>, RepositoryError> {
        let mut tables = self.tables();
        Ok(tables.items.get_mut(&id).map(|item| {
            item.title = draft.title.clone();
            item.description = draft.description.clone();
            item.clone()
        }))
    }

    async fn delete_item(&self, id: ItemId) -> Result<bool, RepositoryError> {
        Ok(self.tables().items.remove(&id).is_some())
    }

    async fn count_items(&self) -> Result<i64, RepositoryError> {
        Ok(self.tables().items.len() as i64)
    }

    async fn list_items(&self, limit: i64, offset: i64) -> Result<Vec<Item>, RepositoryError> {
        let mut items: Vec<Item> = self.tables().items.values().cloned().collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(items
            .into_iter()
            .skip(usize::try_from(offset).unwrap_or(usize::MAX))
            .take(usize::try_from(limit).unwrap_or(0))
            .collect())
    }
}
