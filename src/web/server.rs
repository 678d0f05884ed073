use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderName, HeaderValue, StatusCode},
    routing::{delete, get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::limit::ConcurrencyLimitLayer;
use tower::ServiceBuilder;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::cli::ServeArgs;
use crate::core::rank::RankSchema;
use crate::taxonomy::observer::TracingObserver;
use crate::taxonomy::snapshot::TaxonomySnapshot;
use crate::taxonomy::store::TaxonStore;
use crate::web::handlers;

/// Security configuration constants to prevent `DoS` attacks
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const MAX_CONCURRENT_REQUESTS: usize = 100;
pub const MAX_BODY_SIZE: usize = 16 * 1024 * 1024; // 16MB, enough for large batches
pub const RATE_LIMIT_PER_SECOND: u64 = 10;
pub const RATE_LIMIT_BURST: u32 = 50;

/// Shared application state
pub struct AppState {
    pub store: TaxonStore,
}

impl AppState {
    #[must_use]
    pub fn new(store: TaxonStore) -> Self {
        Self { store }
    }
}

/// Run the web server
///
/// # Errors
///
/// Returns an error if the store cannot be loaded, the tokio runtime cannot be
/// created, or the server fails to start.
pub fn run(args: ServeArgs) -> anyhow::Result<()> {
    let store = load_store(&args)?;

    // Build tokio runtime
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move { run_server(args, store).await })
}

/// Build the store from the configured rank schema and optional snapshot.
///
/// A snapshot carries its own rank schema; combining it with a different
/// `--ranks` file is an error.
///
/// # Errors
///
/// Returns an error if the rank schema or snapshot cannot be loaded.
pub fn load_store(args: &ServeArgs) -> anyhow::Result<TaxonStore> {
    let schema = match &args.ranks {
        Some(path) => Some((path, RankSchema::load_from_file(path)?)),
        None => None,
    };

    let Some(path) = &args.snapshot else {
        let schema = match schema {
            Some((_, schema)) => schema,
            None => RankSchema::load_embedded()?,
        };
        return Ok(TaxonStore::new(schema));
    };

    let snapshot = TaxonomySnapshot::load_from_file(path)?;
    let store = TaxonStore::from_snapshot(&snapshot, Arc::new(TracingObserver))?;
    if let Some((ranks_path, schema)) = schema {
        if &schema != store.schema() {
            anyhow::bail!(
                "rank schema in {} differs from the schema recorded in snapshot {}",
                ranks_path.display(),
                path.display()
            );
        }
    }
    Ok(store)
}

/// Create the application router with all routes and middleware configured.
///
/// Rate limiting needs the peer address and is added by the server itself,
/// so the returned router can be driven directly in tests.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(handlers::health))
        .route("/api/ranks", get(handlers::ranks))
        .route("/api/stats", get(handlers::stats))
        .route(
            "/api/taxa",
            get(handlers::list_roots).post(handlers::create_taxon),
        )
        .route("/api/taxa/batch", post(handlers::create_batch))
        .route(
            "/api/taxa/{id}",
            get(handlers::get_taxon)
                .patch(handlers::update_taxon)
                .delete(handlers::delete_taxon),
        )
        .route("/api/taxa/{id}/children", get(handlers::children))
        .route("/api/taxa/{id}/ancestors", get(handlers::ancestors))
        .route("/api/taxa/{id}/descendants", get(handlers::descendants))
        .route("/api/taxa/{id}/siblings", get(handlers::siblings))
        .route("/api/taxa/{id}/synonyms", post(handlers::add_synonym))
        .route(
            "/api/taxa/{id}/synonyms/{name}",
            delete(handlers::remove_synonym),
        )
        .route("/api/names/{name}", get(handlers::get_by_name))
        .route("/api/search", get(handlers::search))
        .route("/api/query", post(handlers::query))
        .route("/api/export", get(handlers::export))
        .fallback(handlers::not_found)
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                // Security headers for browser protection
                .layer(SetResponseHeaderLayer::if_not_present(
                    HeaderName::from_static("x-content-type-options"),
                    HeaderValue::from_static("nosniff"),
                ))
                .layer(SetResponseHeaderLayer::if_not_present(
                    HeaderName::from_static("x-frame-options"),
                    HeaderValue::from_static("DENY"),
                ))
                .layer(SetResponseHeaderLayer::if_not_present(
                    HeaderName::from_static("referrer-policy"),
                    HeaderValue::from_static("no-referrer"),
                ))
                .layer(SetResponseHeaderLayer::if_not_present(
                    HeaderName::from_static("cache-control"),
                    HeaderValue::from_static("no-store"),
                ))
                // Request timeout to prevent slow client attacks
                .layer(TimeoutLayer::with_status_code(
                    StatusCode::REQUEST_TIMEOUT,
                    REQUEST_TIMEOUT,
                ))
                // Limit concurrent requests to prevent DOS
                .layer(ConcurrencyLimitLayer::new(MAX_CONCURRENT_REQUESTS))
                .layer(DefaultBodyLimit::max(MAX_BODY_SIZE)),
        )
}

async fn run_server(args: ServeArgs, store: TaxonStore) -> anyhow::Result<()> {
    let taxa = store.len();
    let state = Arc::new(AppState::new(store));

    // Configure IP-based rate limiting
    let governor_conf = GovernorConfigBuilder::default()
        .per_second(RATE_LIMIT_PER_SECOND)
        .burst_size(RATE_LIMIT_BURST)
        .finish()
        .ok_or_else(|| anyhow::anyhow!("invalid rate limit configuration"))?;

    let app = build_router(state).layer(GovernorLayer {
        config: Arc::new(governor_conf),
    });

    let addr = format!("{}:{}", args.address, args.port);
    println!("Starting taxon-db server at http://{addr}");
    tracing::info!(%addr, taxa, "Server listening");

    if args.open {
        let _ = open::that(format!("http://{addr}/api/health"));
    }

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(%error, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
