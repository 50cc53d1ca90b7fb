//! Checklist catalog and version repository.
//!
//! Version maps are guarded by locking the version row `FOR UPDATE`.
//! Transfer request creation takes `FOR SHARE` on the same row, so a version
//! cannot gain or lose a mapping, or be deleted, while a request is pinning
//! it.

use async_trait::async_trait;
use domain::models::{
    ChecklistItem, ChecklistVersion, ItemCycle, NewChecklistItem, VersionItem,
};
use domain::store::ChecklistStore;
use domain::DomainError;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::entities::{
    ChecklistItemEntity, ChecklistVersionEntity, InspectionCycleDb, ItemCycleEntity,
    VersionItemEntity,
};
use crate::metrics::QueryTimer;

/// Locks a version for modification, failing when a request references it.
async fn lock_mutable_version(conn: &mut PgConnection, version_id: i64) -> Result<(), DomainError> {
    let locked: Option<i64> =
        sqlx::query_scalar("SELECT id FROM checklist_versions WHERE id = $1 FOR UPDATE")
            .bind(version_id)
            .fetch_optional(&mut *conn)
            .await?;
    if locked.is_none() {
        return Err(DomainError::not_found("Checklist version", version_id));
    }

    let referenced: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM transfer_requests WHERE checklist_version_id = $1)",
    )
    .bind(version_id)
    .fetch_one(&mut *conn)
    .await?;
    if referenced {
        return Err(DomainError::ImmutableVersion { version_id });
    }
    Ok(())
}

async fn insert_version(
    conn: &mut PgConnection,
    label: &str,
    created_by: Option<Uuid>,
) -> Result<ChecklistVersionEntity, DomainError> {
    Ok(sqlx::query_as::<_, ChecklistVersionEntity>(
        r#"
        INSERT INTO checklist_versions (label, created_by)
        VALUES ($1, $2)
        RETURNING id, label, created_by, created_at
        "#,
    )
    .bind(label)
    .bind(created_by)
    .fetch_one(&mut *conn)
    .await?)
}

/// Repository for checklist items and versions.
#[derive(Clone)]
pub struct ChecklistRepository {
    pool: PgPool,
}

impl ChecklistRepository {
    /// Creates a new ChecklistRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl ChecklistStore for ChecklistRepository {
    async fn create_item(&self, item: NewChecklistItem) -> Result<ChecklistItem, DomainError> {
        let timer = QueryTimer::new("create_checklist_item");
        let result = sqlx::query_as::<_, ChecklistItemEntity>(
            r#"
            INSERT INTO checklist_items (category, name, description, requires_photo, sort_order)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(&item.category)
        .bind(&item.name)
        .bind(&item.description)
        .bind(item.requires_photo)
        .bind(item.sort_order)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        Ok(result?.into())
    }

    async fn find_item(&self, id: i64) -> Result<Option<ChecklistItem>, DomainError> {
        let timer = QueryTimer::new("find_checklist_item");
        let result =
            sqlx::query_as::<_, ChecklistItemEntity>("SELECT * FROM checklist_items WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await;
        timer.record();
        Ok(result?.map(Into::into))
    }

    async fn list_items(&self, active_only: bool) -> Result<Vec<ChecklistItem>, DomainError> {
        let timer = QueryTimer::new("list_checklist_items");
        let result = sqlx::query_as::<_, ChecklistItemEntity>(
            r#"
            SELECT *
            FROM checklist_items
            WHERE ($1 = FALSE OR is_active)
            ORDER BY category, sort_order, id
            "#,
        )
        .bind(active_only)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        Ok(result?.into_iter().map(Into::into).collect())
    }

    async fn items_for_version(&self, version_id: i64) -> Result<Vec<ChecklistItem>, DomainError> {
        let timer = QueryTimer::new("list_checklist_items_for_version");
        let result = sqlx::query_as::<_, ChecklistItemEntity>(
            r#"
            SELECT i.*
            FROM checklist_items i
            JOIN version_items vi ON vi.item_id = i.id
            WHERE vi.version_id = $1
            "#,
        )
        .bind(version_id)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        Ok(result?.into_iter().map(Into::into).collect())
    }

    async fn set_item_active(
        &self,
        id: i64,
        active: bool,
    ) -> Result<Option<ChecklistItem>, DomainError> {
        let timer = QueryTimer::new("set_checklist_item_active");
        let result = sqlx::query_as::<_, ChecklistItemEntity>(
            "UPDATE checklist_items SET is_active = $2 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(active)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        Ok(result?.map(Into::into))
    }

    async fn create_version(
        &self,
        label: &str,
        created_by: Option<Uuid>,
    ) -> Result<ChecklistVersion, DomainError> {
        let timer = QueryTimer::new("create_checklist_version");
        let mut conn = self.pool.acquire().await?;
        let result = insert_version(&mut *conn, label, created_by).await;
        timer.record();
        Ok(result?.into())
    }

    async fn find_version(&self, id: i64) -> Result<Option<ChecklistVersion>, DomainError> {
        let timer = QueryTimer::new("find_checklist_version");
        let result = sqlx::query_as::<_, ChecklistVersionEntity>(
            "SELECT id, label, created_by, created_at FROM checklist_versions WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        Ok(result?.map(Into::into))
    }

    async fn latest_version(&self) -> Result<Option<ChecklistVersion>, DomainError> {
        let timer = QueryTimer::new("latest_checklist_version");
        let result = sqlx::query_as::<_, ChecklistVersionEntity>(
            r#"
            SELECT id, label, created_by, created_at
            FROM checklist_versions
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        Ok(result?.map(Into::into))
    }

    async fn list_versions(&self) -> Result<Vec<ChecklistVersion>, DomainError> {
        let timer = QueryTimer::new("list_checklist_versions");
        let result = sqlx::query_as::<_, ChecklistVersionEntity>(
            r#"
            SELECT id, label, created_by, created_at
            FROM checklist_versions
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await;
        timer.record();
        Ok(result?.into_iter().map(Into::into).collect())
    }

    async fn version_items(&self, version_id: i64) -> Result<Vec<VersionItem>, DomainError> {
        let timer = QueryTimer::new("list_version_items");
        let result = sqlx::query_as::<_, VersionItemEntity>(
            r#"
            SELECT version_id, item_id, required, sort_order
            FROM version_items
            WHERE version_id = $1
            ORDER BY sort_order, item_id
            "#,
        )
        .bind(version_id)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        Ok(result?.into_iter().map(Into::into).collect())
    }

    async fn item_cycles(&self, version_id: i64) -> Result<Vec<ItemCycle>, DomainError> {
        let timer = QueryTimer::new("list_item_cycles");
        let result = sqlx::query_as::<_, ItemCycleEntity>(
            r#"
            SELECT version_id, item_id, cycle, enabled
            FROM item_cycles
            WHERE version_id = $1
            ORDER BY item_id, cycle
            "#,
        )
        .bind(version_id)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        Ok(result?.into_iter().map(Into::into).collect())
    }

    async fn is_version_referenced(&self, version_id: i64) -> Result<bool, DomainError> {
        let timer = QueryTimer::new("is_checklist_version_referenced");
        let result = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM transfer_requests WHERE checklist_version_id = $1)",
        )
        .bind(version_id)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        Ok(result?)
    }

    async fn add_version_item(&self, mapping: VersionItem) -> Result<VersionItem, DomainError> {
        let timer = QueryTimer::new("add_version_item");
        let mut tx = self.pool.begin().await?;
        lock_mutable_version(&mut *tx, mapping.version_id).await?;

        let inserted = sqlx::query_as::<_, VersionItemEntity>(
            r#"
            INSERT INTO version_items (version_id, item_id, required, sort_order)
            VALUES ($1, $2, $3, $4)
            RETURNING version_id, item_id, required, sort_order
            "#,
        )
        .bind(mapping.version_id)
        .bind(mapping.item_id)
        .bind(mapping.required)
        .bind(mapping.sort_order)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        timer.record();
        Ok(inserted.into())
    }

    async fn upsert_item_cycle(&self, cell: ItemCycle) -> Result<ItemCycle, DomainError> {
        let timer = QueryTimer::new("upsert_item_cycle");
        let mut tx = self.pool.begin().await?;
        lock_mutable_version(&mut *tx, cell.version_id).await?;

        let stored = sqlx::query_as::<_, ItemCycleEntity>(
            r#"
            INSERT INTO item_cycles (version_id, item_id, cycle, enabled)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (version_id, item_id, cycle)
            DO UPDATE SET enabled = EXCLUDED.enabled
            RETURNING version_id, item_id, cycle, enabled
            "#,
        )
        .bind(cell.version_id)
        .bind(cell.item_id)
        .bind(InspectionCycleDb::from(cell.cycle))
        .bind(cell.enabled)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        timer.record();
        Ok(stored.into())
    }

    async fn remove_version_item(&self, version_id: i64, item_id: i64) -> Result<(), DomainError> {
        let timer = QueryTimer::new("remove_version_item");
        let mut tx = self.pool.begin().await?;
        lock_mutable_version(&mut *tx, version_id).await?;

        let removed = sqlx::query("DELETE FROM version_items WHERE version_id = $1 AND item_id = $2")
            .bind(version_id)
            .bind(item_id)
            .execute(&mut *tx)
            .await?;
        if removed.rows_affected() == 0 {
            return Err(DomainError::not_found(
                "Version item",
                format!("{}/{}", version_id, item_id),
            ));
        }
        sqlx::query("DELETE FROM item_cycles WHERE version_id = $1 AND item_id = $2")
            .bind(version_id)
            .bind(item_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        timer.record();
        Ok(())
    }

    async fn delete_version(&self, version_id: i64) -> Result<(), DomainError> {
        let timer = QueryTimer::new("delete_checklist_version");
        let mut tx = self.pool.begin().await?;
        lock_mutable_version(&mut *tx, version_id).await?;

        // version_items and item_cycles follow through ON DELETE CASCADE.
        sqlx::query("DELETE FROM checklist_versions WHERE id = $1")
            .bind(version_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        timer.record();
        Ok(())
    }

    async fn copy_version(
        &self,
        source_id: i64,
        label: &str,
        created_by: Option<Uuid>,
    ) -> Result<ChecklistVersion, DomainError> {
        let timer = QueryTimer::new("copy_checklist_version");
        let mut tx = self.pool.begin().await?;

        let source: Option<i64> =
            sqlx::query_scalar("SELECT id FROM checklist_versions WHERE id = $1 FOR SHARE")
                .bind(source_id)
                .fetch_optional(&mut *tx)
                .await?;
        if source.is_none() {
            return Err(DomainError::not_found("Checklist version", source_id));
        }

        let version = insert_version(&mut *tx, label, created_by).await?;

        sqlx::query(
            r#"
            INSERT INTO version_items (version_id, item_id, required, sort_order)
            SELECT $1, item_id, required, sort_order
            FROM version_items
            WHERE version_id = $2
            "#,
        )
        .bind(version.id)
        .bind(source_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO item_cycles (version_id, item_id, cycle, enabled)
            SELECT $1, item_id, cycle, enabled
            FROM item_cycles
            WHERE version_id = $2
            "#,
        )
        .bind(version.id)
        .bind(source_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        timer.record();
        Ok(version.into())
    }
}
