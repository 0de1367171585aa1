use std::time::Duration;

use axum::{
    Router,
    routing::{get, post},
};
use http::{HeaderName, HeaderValue, Method, Request, Response, header};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};
use tracing::Span;

use crate::handlers;
use crate::state::AppState;

/// 全レスポンスに付与するセキュリティヘッダー
const SECURITY_HEADERS: [(HeaderName, &str); 5] = [
    (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
    (header::X_FRAME_OPTIONS, "DENY"),
    (header::X_XSS_PROTECTION, "1; mode=block"),
    (
        header::STRICT_TRANSPORT_SECURITY,
        "max-age=31536000; includeSubDomains",
    ),
    (header::CONTENT_SECURITY_POLICY, "default-src 'self'"),
];

/// Router の構築
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.allowed_origin_list());

    let mut router = Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health_check))
        // 認証
        .route("/api/auth/signup", post(handlers::signup))
        .route("/api/auth/login", post(handlers::login))
        .route("/api/auth/forgot-password", post(handlers::forgot_password))
        .route("/api/auth/reset-password", post(handlers::reset_password))
        .route("/api/auth/me", get(handlers::me))
        // アイテム
        .route(
            "/api/items",
            get(handlers::list_items).post(handlers::create_item),
        )
        .route("/api/items/stats", get(handlers::item_stats))
        .route(
            "/api/items/{id}",
            get(handlers::get_item)
                .put(handlers::replace_item)
                .patch(handlers::update_item)
                .delete(handlers::delete_item),
        )
        .with_state(state)
        .layer(cors);

    for (name, value) in SECURITY_HEADERS {
        router = router.layer(SetResponseHeaderLayer::overriding(
            name,
            HeaderValue::from_static(value),
        ));
    }

    router.layer(
        TraceLayer::new_for_http()
            .make_span_with(|req: &Request<_>| {
                let method = req.method().clone();
                let uri = req.uri().clone();
                tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
            })
            .on_response(|res: &Response<_>, latency: Duration, span: &Span| {
                let status = res.status();
                let latency_ms = latency.as_millis() as u64;
                span.record("status", tracing::field::display(status));
                if status.is_server_error() {
                    tracing::error!(%status, latency_ms, "response");
                } else {
                    tracing::info!(%status, latency_ms, "response");
                }
            }),
    )
}

/// CORS 設定（許可オリジンのみ、認証情報付き）
fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(origin = %origin, error = ?e, "不正な CORS オリジンを無視");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
}
