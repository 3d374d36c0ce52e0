//! HTTP 路由与服务器启动

use std::path::Path;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get};
use axum::Router;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::services::ServeDir;

use crate::conversation::{handle_a2a, health, AppState};

pub const A2A_PATH: &str = "/a2a/agent/eunoia";
pub const HEALTH_PATH: &str = "/agent/health";

fn allows_any_origin(allowed_origins: &[String]) -> bool {
    allowed_origins.is_empty() || allowed_origins.iter().any(|o| o == "*")
}

/// 含 "*" 时放开所有来源，否则只允许列出的来源
fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origin = if allows_any_origin(allowed_origins) {
        AllowOrigin::any()
    } else {
        let origins: Vec<HeaderValue> = allowed_origins
            .iter()
            .filter_map(|o| match HeaderValue::from_str(o) {
                Ok(v) => Some(v),
                Err(_) => {
                    tracing::warn!("Ignoring invalid CORS origin: {}", o);
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
}

/// 带 Origin 头且不在允许列表中的请求直接返回 403；不带 Origin 的请求放行
async fn reject_unknown_origin(
    State(allowed): State<Arc<[String]>>,
    request: axum::extract::Request,
    next: Next,
) -> Response {
    if let Some(origin) = request.headers().get(header::ORIGIN) {
        let known = origin
            .to_str()
            .map(|o| allowed.iter().any(|a| a == o))
            .unwrap_or(false);
        if !known {
            tracing::warn!(
                origin = ?origin,
                path = %request.uri().path(),
                "blocked request from unauthorized origin"
            );
            return (StatusCode::FORBIDDEN, "Unauthorized origin").into_response();
        }
    }
    next.run(request).await
}

pub fn build_router(state: AppState, allowed_origins: &[String], well_known_dir: &Path) -> Router {
    let mut router = Router::new()
        .route(A2A_PATH, any(handle_a2a))
        .route(HEALTH_PATH, get(health))
        .nest_service("/.well-known", ServeDir::new(well_known_dir))
        .layer(cors_layer(allowed_origins));

    if !allows_any_origin(allowed_origins) {
        let allowed: Arc<[String]> = Arc::from(allowed_origins);
        router = router.layer(middleware::from_fn_with_state(allowed, reject_unknown_origin));
    }

    router.with_state(state)
}

/// 监听并服务，直到 shutdown 被取消
pub async fn serve(app: Router, bind_addr: &str, shutdown: CancellationToken) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!("Eunoia listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use super::*;
    use crate::config::ConversationSettings;
    use crate::conversation::ConversationService;
    use crate::llm::MockProvider;
    use crate::platforms::TelexPlatform;
    use crate::store::Stores;

    fn state() -> AppState {
        let conversation = ConversationService::new(
            Stores::in_memory(),
            Arc::new(MockProvider::new()),
            ConversationSettings::default(),
        );
        AppState::new(Arc::new(TelexPlatform::new()), Arc::new(conversation))
    }

    #[tokio::test]
    async fn test_serves_well_known_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("agent.json"), r#"{"name":"eunoia"}"#).unwrap();
        let app = build_router(state(), &["*".to_string()], dir.path());

        let req = Request::builder()
            .uri("/.well-known/agent.json")
            .body(Body::empty())
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], br#"{"name":"eunoia"}"#);
    }

    #[tokio::test]
    async fn test_cors_allows_configured_origin() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_router(state(), &["https://telex.im".to_string()], dir.path());

        let req = Request::builder()
            .uri(HEALTH_PATH)
            .header("origin", "https://telex.im")
            .body(Body::empty())
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(
            res.headers().get("access-control-allow-origin").unwrap(),
            "https://telex.im"
        );
    }

    #[tokio::test]
    async fn test_unknown_origin_is_forbidden() {
        let dir = tempfile::tempdir().unwrap();
        let allowed = ["https://telex.im".to_string()];

        let req = Request::builder()
            .uri(HEALTH_PATH)
            .header("origin", "https://evil.example")
            .body(Body::empty())
            .unwrap();
        let res = build_router(state(), &allowed, dir.path()).oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"Unauthorized origin");

        // 不带 Origin 的服务端调用不受影响
        let req = Request::builder().uri(HEALTH_PATH).body(Body::empty()).unwrap();
        let res = build_router(state(), &allowed, dir.path()).oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_wildcard_accepts_any_origin() {
        let dir = tempfile::tempdir().unwrap();
        let req = Request::builder()
            .uri(HEALTH_PATH)
            .header("origin", "https://anywhere.example")
            .body(Body::empty())
            .unwrap();
        let res = build_router(state(), &["*".to_string()], dir.path())
            .oneshot(req)
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }
}
