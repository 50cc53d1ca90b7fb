//! Mold repository for database operations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::models::{Mold, NewMold, NewRevision, RevisionRecord};
use domain::store::MoldStore;
use domain::DomainError;
use sqlx::PgPool;
use uuid::Uuid;

use super::revision::append_revision_tx;
use crate::entities::{MoldEntity, MoldStageDb};
use crate::metrics::QueryTimer;

/// Repository for mold master data.
#[derive(Clone)]
pub struct MoldRepository {
    pool: PgPool,
}

impl MoldRepository {
    /// Creates a new MoldRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl MoldStore for MoldRepository {
    async fn create_mold(&self, mold: NewMold) -> Result<Mold, DomainError> {
        let timer = QueryTimer::new("create_mold");
        let result = sqlx::query_as::<_, MoldEntity>(
            r#"
            INSERT INTO molds (
                code, name, company_id, stage,
                reference_latitude, reference_longitude, drift_threshold_m
            )
            VALUES ($1, $2, $3, 'development', $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(&mold.code)
        .bind(&mold.name)
        .bind(mold.company_id)
        .bind(mold.reference.map(|c| c.latitude))
        .bind(mold.reference.map(|c| c.longitude))
        .bind(mold.drift_threshold_m)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        Ok(result?.into())
    }

    async fn find_mold(&self, id: Uuid) -> Result<Option<Mold>, DomainError> {
        let timer = QueryTimer::new("find_mold_by_id");
        let result = sqlx::query_as::<_, MoldEntity>("SELECT * FROM molds WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await;
        timer.record();
        Ok(result?.map(Into::into))
    }

    async fn update_mold(
        &self,
        mold: Mold,
        expected_updated_at: DateTime<Utc>,
        revision: NewRevision,
    ) -> Result<(Mold, RevisionRecord), DomainError> {
        let timer = QueryTimer::new("update_mold");
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query_as::<_, MoldEntity>(
            r#"
            UPDATE molds
            SET name = $2,
                company_id = $3,
                stage = $4,
                reference_latitude = $5,
                reference_longitude = $6,
                drift_threshold_m = $7,
                updated_at = NOW()
            WHERE id = $1 AND updated_at = $8
            RETURNING *
            "#,
        )
        .bind(mold.id)
        .bind(&mold.name)
        .bind(mold.company_id)
        .bind(MoldStageDb::from(mold.stage))
        .bind(mold.reference_latitude)
        .bind(mold.reference_longitude)
        .bind(mold.drift_threshold_m)
        .bind(expected_updated_at)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(updated) = updated else {
            let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM molds WHERE id = $1)")
                .bind(mold.id)
                .fetch_one(&mut *tx)
                .await?;
            return Err(if exists {
                DomainError::conflict("molds_updated_at")
            } else {
                DomainError::not_found("Mold", mold.id)
            });
        };

        let record = append_revision_tx(&mut *tx, revision).await?;
        tx.commit().await?;
        timer.record();
        Ok((updated.into(), record))
    }
}
