use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use domain::services::{
    ChecklistService, LocationTracker, MoldService, RevisionLog, WorkflowEngine,
};
use domain::store::{
    ChecklistStore, InMemoryStore, LocationStore, MoldStore, RevisionStore, TransferStore,
};
use persistence::{
    ChecklistRepository, LocationLogRepository, MoldRepository, RevisionRepository,
    TransferRepository,
};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::Config;
use crate::middleware::{metrics_handler, metrics_middleware, trace_id};
use crate::routes::{checklists, health, molds, revisions, transfers};

/// Shared handler state: configuration plus one service per component.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// `None` when running on the in-memory backend.
    pub pool: Option<PgPool>,
    pub checklists: ChecklistService,
    pub workflow: WorkflowEngine,
    pub tracker: LocationTracker,
    pub molds: MoldService,
    pub revisions: RevisionLog,
}

struct Stores {
    checklists: Arc<dyn ChecklistStore>,
    transfers: Arc<dyn TransferStore>,
    locations: Arc<dyn LocationStore>,
    molds: Arc<dyn MoldStore>,
    revisions: Arc<dyn RevisionStore>,
}

impl AppState {
    /// Services backed by PostgreSQL repositories.
    pub fn with_postgres(config: Config, pool: PgPool) -> Self {
        let stores = Stores {
            checklists: Arc::new(ChecklistRepository::new(pool.clone())),
            transfers: Arc::new(TransferRepository::new(pool.clone())),
            locations: Arc::new(LocationLogRepository::new(pool.clone())),
            molds: Arc::new(MoldRepository::new(pool.clone())),
            revisions: Arc::new(RevisionRepository::new(pool.clone())),
        };
        Self::build(config, Some(pool), stores)
    }

    /// Services backed by a single process-local store.
    pub fn in_memory(config: Config) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let stores = Stores {
            checklists: store.clone(),
            transfers: store.clone(),
            locations: store.clone(),
            molds: store.clone(),
            revisions: store,
        };
        Self::build(config, None, stores)
    }

    fn build(config: Config, pool: Option<PgPool>, stores: Stores) -> Self {
        let checklists = ChecklistService::new(stores.checklists);
        let tracker = LocationTracker::new(
            stores.locations,
            stores.molds.clone(),
            (&config.tracking).into(),
        );
        let workflow = WorkflowEngine::new(
            stores.transfers,
            stores.molds.clone(),
            checklists.clone(),
            tracker.clone(),
            (&config.workflow).into(),
        );

        Self {
            config: Arc::new(config),
            pool,
            checklists,
            workflow,
            tracker,
            molds: MoldService::new(stores.molds),
            revisions: RevisionLog::new(stores.revisions),
        }
    }
}

pub fn create_app(config: Config, pool: PgPool) -> Router {
    router(AppState::with_postgres(config, pool))
}

pub fn router(state: AppState) -> Router {
    let config = state.config.clone();

    let cors = if config.server.cors_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = config
            .server
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    };

    let checklist_routes = Router::new()
        .route(
            "/api/v1/checklist/items",
            get(checklists::list_items).post(checklists::create_item),
        )
        .route(
            "/api/v1/checklist/items/:item_id/deactivate",
            post(checklists::deactivate_item),
        )
        .route(
            "/api/v1/checklist/versions",
            get(checklists::list_versions).post(checklists::create_version),
        )
        .route(
            "/api/v1/checklist/versions/latest",
            get(checklists::latest_version),
        )
        .route(
            "/api/v1/checklist/versions/:version_id",
            get(checklists::get_version).delete(checklists::delete_version),
        )
        .route(
            "/api/v1/checklist/versions/:version_id/items",
            post(checklists::add_version_item),
        )
        .route(
            "/api/v1/checklist/versions/:version_id/items/:item_id",
            delete(checklists::remove_version_item),
        )
        .route(
            "/api/v1/checklist/versions/:version_id/cycles",
            put(checklists::set_cycle),
        )
        .route(
            "/api/v1/checklist/versions/:version_id/derive",
            post(checklists::derive_version),
        )
        .route(
            "/api/v1/checklist/versions/:version_id/materialize",
            get(checklists::materialize),
        );

    let transfer_routes = Router::new()
        .route("/api/v1/transfers", post(transfers::create_request))
        .route("/api/v1/transfers/:request_id", get(transfers::get_request))
        .route(
            "/api/v1/transfers/:request_id/answers/:item_id",
            put(transfers::record_answer),
        )
        .route(
            "/api/v1/transfers/:request_id/submit",
            post(transfers::submit),
        )
        .route(
            "/api/v1/transfers/:request_id/approvals",
            post(transfers::advance_approval),
        )
        .route(
            "/api/v1/transfers/:request_id/cancel",
            post(transfers::cancel),
        )
        .route(
            "/api/v1/transfers/:request_id/reopen",
            post(transfers::reopen),
        )
        .route(
            "/api/v1/transfers/:request_id/verify",
            get(transfers::verify),
        );

    let mold_routes = Router::new()
        .route("/api/v1/molds", post(molds::create_mold))
        .route(
            "/api/v1/molds/:mold_id",
            get(molds::get_mold).patch(molds::update_mold),
        )
        .route("/api/v1/molds/:mold_id/scans", post(molds::record_scan))
        .route(
            "/api/v1/molds/:mold_id/locations",
            get(molds::location_history),
        )
        .route(
            "/api/v1/molds/:mold_id/transfers",
            get(transfers::list_for_mold),
        );

    let revision_routes = Router::new()
        .route(
            "/api/v1/revisions/:entity_type/:entity_id",
            get(revisions::history),
        )
        .route(
            "/api/v1/revisions/:entity_type/:entity_id/verify",
            get(revisions::verify_chain),
        );

    let public_routes = Router::new()
        .route("/api/health", get(health::health_check))
        .route("/api/health/live", get(health::live))
        .route("/metrics", get(metrics_handler));

    Router::new()
        .merge(public_routes)
        .merge(checklist_routes)
        .merge(transfer_routes)
        .merge(mold_routes)
        .merge(revision_routes)
        // Global middleware (order matters: bottom layers run first)
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(trace_id))
        .layer(cors)
        .with_state(state)
}
