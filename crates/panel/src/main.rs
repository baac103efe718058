//! Crypted Panel - internal admin dashboard for the Crypted messaging app.
//!
//! This binary serves the panel on port 3100.
//!
//! # Security
//!
//! **This binary must only run on trusted, operator-access infrastructure.**
//!
//! - Authenticates operators against Firebase Authentication
//! - Authorizes every session against the Firestore admin registry
//! - An identity without a registry entry is signed out immediately
//!
//! # Architecture
//!
//! - Axum web framework serving a JSON API
//! - Session guard owning the single authorization state machine
//! - Firebase Authentication for identity, Firestore for the registry

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Router, routing::get};
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crypted_panel::config::PanelConfig;
use crypted_panel::firebase::{FirebaseAuthClient, FirestoreClient};
use crypted_panel::routes;
use crypted_panel::services::guard::SessionGuard;
use crypted_panel::state::AppState;

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &PanelConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            sample_rate: config.sentry_sample_rate,
            traces_sample_rate: config.sentry_traces_sample_rate,
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    // Load configuration from environment (needed for Sentry init)
    let config = PanelConfig::from_env().expect("Failed to load configuration");

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&config);

    // Initialize tracing with EnvFilter and Sentry integration
    // Defaults to info level for our crate if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "crypted_panel=info,tower_http=debug".into());

    // JSON format for structured log collection, text format locally
    let is_json = std::env::var("LOG_FORMAT").is_ok_and(|v| v == "json");
    let json_layer = is_json.then(|| tracing_subscriber::fmt::layer().json().flatten_event(true));
    let text_layer = (!is_json).then(tracing_subscriber::fmt::layer);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    // Wire the Firebase clients and the session guard
    let http = reqwest::Client::new();
    let auth = Arc::new(FirebaseAuthClient::new(
        http.clone(),
        config.firebase.api_key.clone(),
        config.firebase.auth_url.clone(),
        config.firebase.token_url.clone(),
    ));
    let store = Arc::new(FirestoreClient::new(
        http,
        Arc::clone(&auth),
        &config.firebase.firestore_url,
        &config.firebase.project_id,
    ));
    let guard = Arc::new(SessionGuard::new(auth, store, config.guard_config()));

    // Service provider session notifications for the process lifetime
    tokio::spawn(Arc::clone(&guard).run());
    tracing::info!("Session guard started");

    // Build application state
    let state = AppState::new(config.clone(), guard);

    // Build router
    let mut app = Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .merge(routes::routes())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record("latency_ms", latency.as_millis() as u64);
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        );

    // Allow the panel SPA's origin when it is served from another host
    if let Some(origin) = &config.allowed_origin {
        let origin = origin
            .parse::<axum::http::HeaderValue>()
            .expect("Invalid PANEL_ALLOWED_ORIGIN");
        app = app.layer(
            CorsLayer::new()
                .allow_origin(origin)
                .allow_methods(tower_http::cors::AllowMethods::mirror_request())
                .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
                .allow_credentials(true),
        );
    }

    let app = app
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction());

    // Start server
    // NOTE: Binding to 127.0.0.1 by default - front with a VPN or proxy
    let addr = config.socket_addr();
    tracing::info!("panel listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable while the guard is still resolving the
/// startup session, so load balancers hold traffic until auth state is known.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    if state.guard().current_state().is_resolving() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
