//! Location log repository for database operations.
//!
//! Rows are only ever inserted. History is read newest first with keyset
//! pagination on `(reported_at, id)`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::models::{HistoryWindow, LocationLog, LocationStatus, NewLocationLog};
use domain::store::LocationStore;
use domain::DomainError;
use shared::pagination::Cursor;
use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::{LocationLogEntity, LocationStatusDb, ScanSourceDb};
use crate::metrics::QueryTimer;

/// Repository for location log operations.
#[derive(Clone)]
pub struct LocationLogRepository {
    pool: PgPool,
}

impl LocationLogRepository {
    /// Creates a new LocationLogRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl LocationStore for LocationLogRepository {
    async fn append_log(&self, log: NewLocationLog) -> Result<LocationLog, DomainError> {
        let timer = QueryTimer::new("insert_location_log");
        let result = sqlx::query_as::<_, LocationLogEntity>(
            r#"
            INSERT INTO location_logs (
                mold_id, reporter_id, latitude, longitude, distance_m, threshold_m,
                status, source, reported_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(log.mold_id)
        .bind(log.reporter_id)
        .bind(log.position.latitude)
        .bind(log.position.longitude)
        .bind(log.distance_m)
        .bind(log.threshold_m)
        .bind(LocationStatusDb::from(log.status))
        .bind(ScanSourceDb::from(log.source))
        .bind(log.reported_at)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        Ok(result?.into())
    }

    async fn page_logs(
        &self,
        mold_id: Uuid,
        window: HistoryWindow,
        after: Option<Cursor>,
        limit: i64,
    ) -> Result<Vec<LocationLog>, DomainError> {
        let timer = QueryTimer::new("page_location_logs");
        let result = sqlx::query_as::<_, LocationLogEntity>(
            r#"
            SELECT *
            FROM location_logs
            WHERE mold_id = $1
              AND reported_at BETWEEN $2 AND $3
              AND ($4::timestamptz IS NULL OR (reported_at, id) < ($4::timestamptz, $5::bigint))
            ORDER BY reported_at DESC, id DESC
            LIMIT $6
            "#,
        )
        .bind(mold_id)
        .bind(window.from)
        .bind(window.to)
        .bind(after.map(|c| c.timestamp))
        .bind(after.map(|c| c.id))
        .bind(limit)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        Ok(result?.into_iter().map(Into::into).collect())
    }

    async fn latest_with_status(
        &self,
        mold_id: Uuid,
        status: LocationStatus,
        since: DateTime<Utc>,
    ) -> Result<Option<LocationLog>, DomainError> {
        let timer = QueryTimer::new("latest_location_log_with_status");
        let result = sqlx::query_as::<_, LocationLogEntity>(
            r#"
            SELECT *
            FROM location_logs
            WHERE mold_id = $1 AND status = $2 AND reported_at >= $3
            ORDER BY reported_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(mold_id)
        .bind(LocationStatusDb::from(status))
        .bind(since)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        Ok(result?.map(Into::into))
    }
}
