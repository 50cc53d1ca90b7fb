//! Mold entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::{Mold, MoldStage};
use sqlx::FromRow;
use uuid::Uuid;

/// Database enum for mold production stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "mold_stage", rename_all = "snake_case")]
pub enum MoldStageDb {
    Development,
    MassProduction,
}

impl From<MoldStageDb> for MoldStage {
    fn from(stage: MoldStageDb) -> Self {
        match stage {
            MoldStageDb::Development => MoldStage::Development,
            MoldStageDb::MassProduction => MoldStage::MassProduction,
        }
    }
}

impl From<MoldStage> for MoldStageDb {
    fn from(stage: MoldStage) -> Self {
        match stage {
            MoldStage::Development => MoldStageDb::Development,
            MoldStage::MassProduction => MoldStageDb::MassProduction,
        }
    }
}

/// Database row mapping for the molds table.
#[derive(Debug, Clone, FromRow)]
pub struct MoldEntity {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub company_id: Option<Uuid>,
    pub stage: MoldStageDb,
    pub reference_latitude: Option<f64>,
    pub reference_longitude: Option<f64>,
    pub drift_threshold_m: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<MoldEntity> for Mold {
    fn from(entity: MoldEntity) -> Self {
        Self {
            id: entity.id,
            code: entity.code,
            name: entity.name,
            company_id: entity.company_id,
            stage: entity.stage.into(),
            reference_latitude: entity.reference_latitude,
            reference_longitude: entity.reference_longitude,
            drift_threshold_m: entity.drift_threshold_m,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}
