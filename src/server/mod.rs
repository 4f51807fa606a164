//! HTTP surface.
//!
//! | method    | path             | handler                          |
//! |-----------|------------------|----------------------------------|
//! | GET, POST | `/auth`          | [`handlers::auth`]               |
//! | GET       | `/auth/callback` | [`handlers::auth_callback`]      |
//! | POST      | `/products/sync` | [`handlers::sync_products`]      |
//! | GET       | `/products`      | [`handlers::list_products`]      |
//! | GET       | `/health`        | [`handlers::health`]             |

pub mod handlers;

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

use crate::config::CALLBACK_PATH;
use crate::install::Installer;
use crate::products::ProductSync;

/// State shared by all handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

#[derive(Debug)]
struct AppStateInner {
    installer: Installer,
    products: ProductSync,
}

impl AppState {
    /// Bundles the services behind the routes.
    #[must_use]
    pub fn new(installer: Installer, products: ProductSync) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                installer,
                products,
            }),
        }
    }

    /// Install flow.
    #[must_use]
    pub fn installer(&self) -> &Installer {
        &self.inner.installer
    }

    /// Product mirror.
    #[must_use]
    pub fn products(&self) -> &ProductSync {
        &self.inner.products
    }
}

/// Builds the router with request tracing and permissive CORS.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/auth", get(handlers::auth).post(handlers::auth))
        .route(CALLBACK_PATH, get(handlers::auth_callback))
        .route("/products/sync", post(handlers::sync_products))
        .route("/products", get(handlers::list_products))
        .layer(CorsLayer::very_permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        path = %request.uri().path(),
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>, latency: Duration, span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
}

/// Serves `app` on `listener` until Ctrl+C or SIGTERM.
///
/// # Errors
///
/// Returns the I/O error that stopped the server.
pub async fn serve(listener: TcpListener, app: Router) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "snapify listening");
    }
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
