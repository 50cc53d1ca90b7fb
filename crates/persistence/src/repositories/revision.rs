//! Revision ledger repository.
//!
//! Revision numbers come from `revision_counters`, one row per entity locked
//! `FOR UPDATE` while the next record is written. Numbers never repeat even
//! when two writers race on the same entity, and the counter also carries the
//! last record hash the next record chains onto.

use async_trait::async_trait;
use domain::models::{EntityRef, NewRevision, RevisionRecord};
use domain::services::revision::record_hash;
use domain::store::RevisionStore;
use domain::DomainError;
use sqlx::{PgConnection, PgPool};

use crate::entities::{RevisionEntity, RevisionEntityTypeDb};
use crate::metrics::QueryTimer;

const REVISION_COLUMNS: &str = r#"
    id, entity_type, entity_id, revision_number, actor_id, reason, changed_fields,
    before_values, after_values, previous_hash, record_hash, created_at
"#;

/// Numbers, chains and inserts a revision on an open transaction.
///
/// Any repository mutating revisioned master data calls this on its own
/// transaction so the change and its revision commit together.
pub async fn append_revision_tx(
    conn: &mut PgConnection,
    revision: NewRevision,
) -> Result<RevisionRecord, DomainError> {
    let entity_type = RevisionEntityTypeDb::from(revision.entity.entity_type);

    sqlx::query(
        r#"
        INSERT INTO revision_counters (entity_type, entity_id, last_revision)
        VALUES ($1, $2, 0)
        ON CONFLICT (entity_type, entity_id) DO NOTHING
        "#,
    )
    .bind(entity_type)
    .bind(&revision.entity.entity_id)
    .execute(&mut *conn)
    .await?;

    let (last_revision, last_hash): (i32, Option<String>) = sqlx::query_as(
        r#"
        SELECT last_revision, last_hash
        FROM revision_counters
        WHERE entity_type = $1 AND entity_id = $2
        FOR UPDATE
        "#,
    )
    .bind(entity_type)
    .bind(&revision.entity.entity_id)
    .fetch_one(&mut *conn)
    .await?;

    let revision_number = last_revision + 1;
    let hash = record_hash(last_hash.as_deref(), revision_number, &revision);

    let entity = sqlx::query_as::<_, RevisionEntity>(&format!(
        r#"
        INSERT INTO revisions (
            entity_type, entity_id, revision_number, actor_id, reason, changed_fields,
            before_values, after_values, previous_hash, record_hash
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING {}
        "#,
        REVISION_COLUMNS
    ))
    .bind(entity_type)
    .bind(&revision.entity.entity_id)
    .bind(revision_number)
    .bind(revision.actor_id)
    .bind(&revision.reason)
    .bind(&revision.changed_fields)
    .bind(&revision.before)
    .bind(&revision.after)
    .bind(&last_hash)
    .bind(&hash)
    .fetch_one(&mut *conn)
    .await?;

    sqlx::query(
        r#"
        UPDATE revision_counters
        SET last_revision = $3, last_hash = $4
        WHERE entity_type = $1 AND entity_id = $2
        "#,
    )
    .bind(entity_type)
    .bind(&revision.entity.entity_id)
    .bind(revision_number)
    .bind(&hash)
    .execute(&mut *conn)
    .await?;

    Ok(entity.into())
}

/// Repository for revision records.
#[derive(Clone)]
pub struct RevisionRepository {
    pool: PgPool,
}

impl RevisionRepository {
    /// Creates a new RevisionRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl RevisionStore for RevisionRepository {
    async fn append_revision(
        &self,
        revision: NewRevision,
    ) -> Result<RevisionRecord, DomainError> {
        let timer = QueryTimer::new("append_revision");
        let mut tx = self.pool.begin().await?;
        let record = append_revision_tx(&mut *tx, revision).await?;
        tx.commit().await?;
        timer.record();
        Ok(record)
    }

    async fn list_revisions(&self, entity: &EntityRef) -> Result<Vec<RevisionRecord>, DomainError> {
        let timer = QueryTimer::new("list_revisions");
        let rows = sqlx::query_as::<_, RevisionEntity>(&format!(
            r#"
            SELECT {}
            FROM revisions
            WHERE entity_type = $1 AND entity_id = $2
            ORDER BY revision_number ASC
            "#,
            REVISION_COLUMNS
        ))
        .bind(RevisionEntityTypeDb::from(entity.entity_type))
        .bind(&entity.entity_id)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        Ok(rows?.into_iter().map(Into::into).collect())
    }
}
