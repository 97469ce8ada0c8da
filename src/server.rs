//! HTTP server assembly: shared state, routing, middleware, startup.

use anyhow::Result;
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post},
    Router,
};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    SqlitePool,
};
use std::{net::SocketAddr, str::FromStr, sync::Arc};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

use crate::{
    config::Config,
    events::EventLog,
    handlers, logging,
    models::persona::Persona,
    nlq::NlqService,
    vector::VectorStore,
};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: SqlitePool,
    pub http_client: reqwest::Client,
    pub event_log: Arc<EventLog>,
    pub nlq: Arc<NlqService>,
    /// Present only when vector search is enabled in the config.
    pub vector: Option<Arc<VectorStore>>,
}

/// Start the server.
///
/// Opens the database (creating it and running migrations if needed), builds
/// the shared state, optionally prepares the vector collection, and serves
/// until Ctrl-C.
pub async fn start_server(config: Config) -> Result<()> {
    let db = open_database(&config).await?;

    tokio::fs::create_dir_all(&config.storage.photo_dir).await?;

    let config = Arc::new(config);
    let http_client = reqwest::Client::new();
    let event_log = Arc::new(EventLog::with_capacity(config.event_log.capacity));

    let nlq = Arc::new(NlqService::new(
        http_client.clone(),
        config.gemini.clone(),
        db.clone(),
        event_log.clone(),
    ));

    let vector = if config.vector.enabled {
        Some(Arc::new(VectorStore::new(
            http_client.clone(),
            config.vector.clone(),
        )))
    } else {
        None
    };

    let state = AppState {
        config: config.clone(),
        db,
        http_client,
        event_log: event_log.clone(),
        nlq,
        vector,
    };

    // Index existing records in the background; the API works without the
    // vector store, so a failure here only degrades /query.
    if state.vector.is_some() {
        tokio::spawn({
            let state = state.clone();
            async move {
                if let Err(err) = sync_vector_store(&state).await {
                    warn!(error = %err, "Vector store startup sync failed");
                }
            }
        });
    }

    let app = create_router(state, event_log);

    let addr = SocketAddr::from((
        config.server.host.parse::<std::net::IpAddr>()?,
        config.server.port,
    ));

    info!("Starting {} on {}", env!("CARGO_PKG_NAME"), addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        let _ = tokio::signal::ctrl_c().await;
        info!("Shutdown signal received, draining connections...");
    })
    .await?;

    info!("Server stopped gracefully");
    Ok(())
}

/// Build the Axum router with all routes and middleware.
pub fn create_router(state: AppState, event_log: Arc<EventLog>) -> Router {
    let api_routes = Router::new()
        .route(
            "/personas/",
            post(handlers::personas::create_persona).get(handlers::personas::list_personas),
        )
        .route(
            "/personas/:id",
            get(handlers::personas::get_persona)
                .put(handlers::personas::update_persona)
                .delete(handlers::personas::delete_persona),
        )
        .route(
            "/photos/upload/:person_id",
            post(handlers::photos::upload_photo),
        )
        .route(
            "/photos/person/:person_id",
            get(handlers::photos::list_person_photos),
        )
        .route(
            "/photos/person/:person_id/:filename",
            get(handlers::photos::get_person_photo).delete(handlers::photos::delete_person_photo),
        )
        .route(
            "/photos/:filename",
            get(handlers::photos::get_photo_legacy).delete(handlers::photos::delete_photo_legacy),
        )
        .route("/execute-sql", post(handlers::sql_executor::execute_sql))
        .route("/sql-query", post(handlers::sql_query::sql_query))
        .route("/query", post(handlers::rag::rag_query))
        .route("/logs", get(handlers::logs::get_logs))
        .route("/logs/stats", get(handlers::logs::get_log_stats))
        .route("/logs/clear", delete(handlers::logs::clear_logs))
        .layer(middleware::from_fn_with_state(
            event_log,
            logging::logging_middleware,
        ));

    Router::new()
        // Probes and the welcome route stay outside the event log middleware
        .route("/", get(handlers::health::root))
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .nest("/api/v1", api_routes)
        .with_state(state)
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn open_database(config: &Config) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&config.database.url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect_with(options)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Database ready at {}", config.database.url);

    Ok(pool)
}

/// Re-embed and upsert every stored persona so similarity search reflects
/// the current table contents.
async fn sync_vector_store(state: &AppState) -> Result<(), crate::error::AppError> {
    let vector = match &state.vector {
        Some(vector) => vector,
        None => return Ok(()),
    };

    vector.ensure_collection().await?;

    let personas = sqlx::query_as::<_, Persona>("SELECT * FROM personas ORDER BY id")
        .fetch_all(&state.db)
        .await?;
    let indexed = vector
        .upsert_personas(&state.config.gemini, &personas)
        .await?;

    info!(indexed, collection = vector.collection(), "Vector store synced");
    Ok(())
}
