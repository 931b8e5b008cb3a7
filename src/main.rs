use actix_cors::Cors;
use actix_web::{error, http::StatusCode, middleware, web, App, HttpResponse, HttpServer};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use tablesetter::auth::Authenticator;
use tablesetter::config::{LoggingSettings, Settings};
use tablesetter::core::{EligibilityRules, Matcher, TraitSimilarityScorer};
use tablesetter::models::ScoringWeights;
use tablesetter::routes::{self, AppState};
use tablesetter::services::{
    AppwriteClient, AppwriteCollections, AttemptLedger, CacheManager, InMemoryLedger, LockRetryPolicy,
    MatchingService, PostgresLedger,
};

/// JSON error response for JSON payload errors
#[derive(Debug, serde::Serialize)]
pub struct JsonError {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}

impl std::fmt::Display for JsonError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error, self.message)
    }
}

impl std::error::Error for JsonError {}

impl error::ResponseError for JsonError {
    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::BAD_REQUEST))
            .content_type("application/json")
            .body(serde_json::to_string(self).unwrap_or_else(|_| self.to_string()))
    }
}

/// Handle JSON payload errors
pub fn handle_json_payload_error(err: error::JsonPayloadError, req: &actix_web::HttpRequest) -> actix_web::Error {
    tracing::info!("JSON payload error on {}: {}", req.path(), err);
    JsonError {
        error: "invalid_json".to_string(),
        message: format!("Invalid JSON: {}", err),
        status_code: 400,
    }
    .into()
}

/// Handle query payload errors
pub fn handle_query_payload_error(err: error::QueryPayloadError, _req: &actix_web::HttpRequest) -> actix_web::Error {
    JsonError {
        error: "invalid_query".to_string(),
        message: format!("Invalid query: {}", err),
        status_code: 400,
    }
    .into()
}

fn init_logging(logging: &LoggingSettings) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true);

    if logging.format == "pretty" {
        subscriber.pretty().init();
    } else {
        subscriber.init();
    }
}

fn startup_error(context: &str, e: impl std::fmt::Display) -> std::io::Error {
    error!("{}: {}", context, e);
    std::io::Error::new(std::io::ErrorKind::Other, format!("{}: {}", context, e))
}

async fn build_ledger(settings: &Settings) -> std::io::Result<Arc<dyn AttemptLedger>> {
    if settings.ledger.backend == "memory" {
        warn!("Using the in-memory ledger; attempts are lost on restart");
        return Ok(Arc::new(InMemoryLedger::new()));
    }

    let lock_retry = LockRetryPolicy {
        retries: settings.ledger.lock_retries,
        delay: Duration::from_millis(settings.ledger.lock_retry_delay_ms),
    };

    let ledger = PostgresLedger::from_settings(
        &settings.database.url,
        settings.database.max_connections,
        settings.database.min_connections,
        settings.database.acquire_timeout_secs,
        settings.database.idle_timeout_secs,
    )
    .await
    .map_err(|e| startup_error("Failed to connect to PostgreSQL", e))?
    .with_lock_retry(lock_retry);

    info!(
        "PostgreSQL ledger initialized (max: {} connections)",
        settings.database.max_connections.unwrap_or(10)
    );

    Ok(Arc::new(ledger))
}

async fn build_cache(settings: &Settings) -> Arc<CacheManager> {
    let cache_ttl = settings.cache.ttl_secs.unwrap_or(300);
    let l1_cache_size = settings.cache.l1_cache_size.unwrap_or(1000);

    let Some(redis_url) = &settings.cache.redis_url else {
        info!("Cache manager initialized without Redis (L1: {} entries)", l1_cache_size);
        return Arc::new(CacheManager::in_memory(l1_cache_size, cache_ttl));
    };

    match CacheManager::new(redis_url, l1_cache_size, cache_ttl).await {
        Ok(cache) => {
            info!("Cache manager initialized (L1: {} entries, TTL: {}s)", l1_cache_size, cache_ttl);
            Arc::new(cache)
        }
        Err(e) => {
            warn!("Failed to connect to Redis ({}), caching attempts in-process only", e);
            Arc::new(CacheManager::in_memory(l1_cache_size, cache_ttl))
        }
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenv::dotenv().ok();

    let settings = Settings::load();
    init_logging(
        settings
            .as_ref()
            .map(|s| &s.logging)
            .unwrap_or(&LoggingSettings::default()),
    );

    info!("Starting Tablesetter matching service...");

    let settings = settings.map_err(|e| startup_error("Failed to load configuration", e))?;

    info!("Configuration loaded successfully");

    let collections = AppwriteCollections {
        events: settings.collection.events.clone(),
        participants: settings.collection.participants.clone(),
    };

    let mut appwrite = AppwriteClient::new(
        settings.appwrite.endpoint.clone(),
        settings.appwrite.api_key.clone(),
        settings.appwrite.project_id.clone(),
        settings.appwrite.database_id.clone(),
        collections,
    )
    .map_err(|e| startup_error("Failed to build Appwrite client", e))?;
    if let Some(page_size) = settings.appwrite.page_size {
        appwrite = appwrite.with_page_size(page_size);
    }

    info!("Appwrite roster client initialized");

    let ledger = build_ledger(&settings).await?;
    let cache = build_cache(&settings).await;

    let weights = ScoringWeights::from(&settings.scoring.weights);
    let scorer = TraitSimilarityScorer::new(weights, settings.scoring.dimension_weights.clone());
    let rules = EligibilityRules::new(settings.scoring.exclusive_intent_pairs());
    let policy = settings.matching.policy();

    let matcher = Matcher::new(Arc::new(scorer), rules, policy, settings.scoring.trait_dimensions)
        .map_err(|e| startup_error("Invalid matching policy", e))?;

    info!("Matcher initialized with policy {:?} and weights {:?}", policy, weights);

    let service = MatchingService::new(Arc::new(appwrite), ledger, matcher)
        .with_cache(cache)
        .with_preview_audit(settings.matching.audit_previews);

    let app_state = AppState {
        service: Arc::new(service),
        auth: Arc::new(Authenticator::new(&settings.auth.jwt_secret, &settings.auth.admin_role)),
    };

    // Configure HTTP server
    let host = settings.server.host.clone();
    let port = settings.server.port;
    let workers = settings.server.workers.unwrap_or(4);

    info!("Starting HTTP server on {}:{}", host, port);

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(web::JsonConfig::default().error_handler(handle_json_payload_error))
            .app_data(web::QueryConfig::default().error_handler(handle_query_payload_error))
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .configure(routes::configure_routes)
    })
    .workers(workers)
    .bind((host, port))?
    .run()
    .await
}
