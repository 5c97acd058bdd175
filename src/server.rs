//! HTTP boundary for the aggregated feed.
//!
//! | Method | Path | Response |
//! |--------|------|----------|
//! | `POST` | `/`, `/news` | `200` JSON array of items, `500` `{error, stack}` |
//! | `OPTIONS` | `/`, `/news` | `204` with CORS headers |
//! | `GET` | `/health` | `200 ok` |
//!
//! The request body is optional. A body that is not valid JSON is logged and
//! treated as "exclude nothing" rather than rejected.

use crate::aggregator::{Aggregator, panic_message};
use crate::feeds::fetcher::NewsFetcher;
use crate::models::{ExcludeRequest, NewsItem};
use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use futures::FutureExt;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Once};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, instrument, warn};

const ALLOW_HEADERS: &str = "authorization, x-client-info, apikey, content-type";
const ALLOW_METHODS: &str = "POST, OPTIONS";

/// The aggregate step served by the router.
pub trait AggregateNews: Send + Sync + 'static {
    fn aggregate(&self, exclude_sources: Vec<String>) -> impl Future<Output = Vec<NewsItem>> + Send;
}

impl<F> AggregateNews for Aggregator<F>
where
    F: NewsFetcher + Send + Sync + 'static,
{
    fn aggregate(&self, exclude_sources: Vec<String>) -> impl Future<Output = Vec<NewsItem>> + Send {
        Aggregator::aggregate(self, exclude_sources)
    }
}

/// Shared handler state.
pub struct AppState<A> {
    pub aggregator: Arc<A>,
}

impl<A> Clone for AppState<A> {
    fn clone(&self) -> Self {
        Self {
            aggregator: Arc::clone(&self.aggregator),
        }
    }
}

thread_local! {
    static PANIC_STACK: RefCell<Option<String>> = const { RefCell::new(None) };
}

static PANIC_HOOK: Once = Once::new();

/// Chain a panic hook that keeps the backtrace of the latest panic on each thread.
fn install_panic_hook() {
    PANIC_HOOK.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let stack = Backtrace::force_capture().to_string();
            PANIC_STACK.with(|slot| *slot.borrow_mut() = Some(stack));
            previous(info);
        }));
    });
}

/// Backtrace recorded for the panic just caught on this thread.
fn take_panic_stack() -> String {
    PANIC_STACK
        .with(|slot| slot.borrow_mut().take())
        .unwrap_or_else(|| Backtrace::force_capture().to_string())
}

/// Build the router with CORS headers on every response.
pub fn router<A>(state: AppState<A>) -> Router
where
    A: AggregateNews,
{
    install_panic_hook();
    Router::new()
        .route("/", post(aggregate_handler::<A>).options(preflight))
        .route("/news", post(aggregate_handler::<A>).options(preflight))
        .route("/health", get(health))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOW_HEADERS),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOW_METHODS),
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `addr` and serve until the process is stopped.
#[instrument(level = "info", skip(state))]
pub async fn serve<A>(addr: &str, state: AppState<A>) -> Result<(), Box<dyn std::error::Error>>
where
    A: AggregateNews,
{
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "Server listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to install Ctrl-C handler");
        std::future::pending::<()>().await;
    }
}

async fn preflight() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn health() -> &'static str {
    "ok"
}

/// Read the exclusion list, tolerating a missing or malformed body.
fn exclusions_from_body(body: &[u8]) -> Vec<String> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Vec::new();
    }
    match serde_json::from_slice::<ExcludeRequest>(body) {
        Ok(req) => req.exclude_sources,
        Err(e) => {
            warn!(error = %e, "Unreadable request body; excluding no sources");
            Vec::new()
        }
    }
}

async fn aggregate_handler<A>(State(state): State<AppState<A>>, body: Bytes) -> Response
where
    A: AggregateNews,
{
    let exclude_sources = exclusions_from_body(&body);
    info!(excluded = ?exclude_sources, "Aggregation requested");

    match AssertUnwindSafe(state.aggregator.aggregate(exclude_sources))
        .catch_unwind()
        .await
    {
        Ok(items) => (StatusCode::OK, Json(items)).into_response(),
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            let stack = take_panic_stack();
            error!(error = %message, "Aggregation failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": message, "stack": stack })),
            )
                .into_response()
        }
    }
}
