use std::net::SocketAddr;
use std::time::Duration;

use axum::{extract::State, middleware, routing::get, Json, Router};
use serde::Serialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::AppConfig;
use crate::rate_limit::{rate_limit_layer, RateLimiter};
use crate::state::AppState;
use crate::{auth, gallery, upload};

/// Buckets older than this are dead weight; dropped by the maintenance sweep.
const BUCKET_MAX_IDLE: Duration = Duration::from_secs(2 * 60 * 60);

#[derive(Clone)]
pub struct Limiters {
    pub api: RateLimiter,
    pub login: RateLimiter,
    pub upload: RateLimiter,
}

impl Limiters {
    pub fn from_config(config: &AppConfig) -> Self {
        let rl = &config.rate_limit;
        Self {
            api: RateLimiter::new(rl.api_max, Duration::from_secs(rl.api_window_secs)),
            login: RateLimiter::new(rl.login_max, Duration::from_secs(rl.login_window_secs)),
            upload: RateLimiter::new(rl.upload_max, Duration::from_secs(rl.upload_window_secs)),
        }
    }

    pub async fn cleanup(&self) {
        self.api.cleanup(BUCKET_MAX_IDLE).await;
        self.login.cleanup(BUCKET_MAX_IDLE).await;
        self.upload.cleanup(BUCKET_MAX_IDLE).await;
    }
}

pub fn build_app(state: AppState, limiters: Limiters) -> Router {
    let api = Router::new()
        .merge(auth::router(limiters.login.clone()))
        .merge(gallery::router())
        .merge(upload::router(limiters.upload.clone()))
        .route("/health", get(health))
        .layer(middleware::from_fn(rate_limit_layer(limiters.api.clone())));

    Router::new()
        .nest("/api", api)
        .with_state(state.clone())
        .layer(cors_layer(&state.config))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     _latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        if status.is_server_error() {
                            tracing::error!(%status, "response");
                        } else {
                            tracing::info!(%status, "response");
                        }
                    },
                ),
        )
}

pub async fn serve(app: Router, config: &AppConfig) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}

/// Credentials-carrying CORS for the configured frontend origin.
fn cors_layer(config: &AppConfig) -> CorsLayer {
    use axum::http::{header, HeaderValue, Method};

    match config.client_url.parse::<HeaderValue>() {
        Ok(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_credentials(true)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]),
        Err(_) => CorsLayer::permissive(),
    }
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
    uptime_secs: u64,
    env: &'static str,
}

async fn health(State(state): State<AppState>) -> Json<Health> {
    Json(Health {
        status: "ok",
        uptime_secs: state.started_at.elapsed().as_secs(),
        env: if state.config.production {
            "production"
        } else {
            "development"
        },
    })
}
