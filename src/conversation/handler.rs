//! A2A 入口处理器
//!
//! 线性流水线，任何一步失败都以 HTTP 200 + 协议内错误返回：
//! 方法 → 解码 → 版本 → 正文非空 → 适配器方法校验 → 用户标识 → 编排。
//! 正文检查放在方法校验之前：空正文无论方法是否合法都返回 -32602。

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::Method;
use axum::Json;
use serde_json::{json, Value};

use super::ConversationService;
use crate::a2a::{RequestEnvelope, ResponseEnvelope, RpcError, JSONRPC_VERSION};
use crate::platforms::{Platform, AGENT_NAME};

/// 路由共享状态
#[derive(Clone)]
pub struct AppState {
    pub platform: Arc<dyn Platform>,
    pub conversation: Arc<ConversationService>,
}

impl AppState {
    pub fn new(platform: Arc<dyn Platform>, conversation: Arc<ConversationService>) -> Self {
        Self {
            platform,
            conversation,
        }
    }
}

/// POST /a2a/agent/eunoia（其他方法返回 InvalidRequest）
pub async fn handle_a2a(
    State(state): State<AppState>,
    method: Method,
    body: Bytes,
) -> Json<ResponseEnvelope> {
    Json(dispatch(&state, &method, &body).await)
}

#[tracing::instrument(skip_all)]
async fn dispatch(state: &AppState, method: &Method, body: &[u8]) -> ResponseEnvelope {
    if method != Method::POST {
        tracing::warn!(%method, "rejected non-POST request");
        return ResponseEnvelope::failure("", RpcError::invalid_request("method not allowed"));
    }

    let request: RequestEnvelope = match serde_json::from_slice(body) {
        Ok(req) => req,
        Err(e) => {
            tracing::warn!(error = %e, "failed to decode request");
            return ResponseEnvelope::failure("", RpcError::parse_error("invalid JSON"));
        }
    };

    handle_envelope(state, request).await
}

#[tracing::instrument(
    skip_all,
    fields(
        request_id = %request.id,
        message_id = %request.params.message.message_id,
        platform = %state.platform.name(),
    )
)]
async fn handle_envelope(state: &AppState, request: RequestEnvelope) -> ResponseEnvelope {
    let id = request.id.as_str();

    if request.jsonrpc != JSONRPC_VERSION {
        return ResponseEnvelope::failure(
            id,
            RpcError::invalid_request(format!("jsonrpc must be \"{JSONRPC_VERSION}\"")),
        );
    }

    let message = &request.params.message;
    let text = state.platform.extract_message(&message.parts);
    if text.is_empty() {
        return ResponseEnvelope::failure(
            id,
            RpcError::invalid_params("message content is required"),
        );
    }

    if let Err(e) = state.platform.validate_request(&request) {
        return ResponseEnvelope::failure(id, RpcError::method_not_found(e.to_string()));
    }

    let platform_user_id = match state.platform.extract_user_id(&message.metadata) {
        Ok(user_id) => user_id,
        Err(e) => return ResponseEnvelope::failure(id, RpcError::invalid_params(e.to_string())),
    };

    let channel_id = state.platform.extract_channel_id(&message.metadata);
    tracing::info!(%platform_user_id, %channel_id, "processing message");

    let reply = match state
        .conversation
        .process_message(&platform_user_id, &text, &message.message_id)
        .await
    {
        Ok(reply) => reply,
        Err(e) => {
            tracing::error!(error = %e, "failed to process message");
            return ResponseEnvelope::failure(id, RpcError::internal("failed to process message"));
        }
    };

    let history = state
        .platform
        .extract_history(&message.parts, &message.message_id);
    state
        .platform
        .build_response(id, &message.message_id, &history, &reply)
}

/// GET /agent/health
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "agent": AGENT_NAME,
        "service": "mental wellbeing assistant",
    }))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::routing::{any, get};
    use axum::Router;
    use tower::ServiceExt;

    use super::*;
    use crate::config::ConversationSettings;
    use crate::llm::{GenerativeProvider, LlmError, MockProvider};
    use crate::platforms::TelexPlatform;
    use crate::store::{Failures, FlakyStore, Stores};

    fn app(provider: Arc<dyn GenerativeProvider>) -> Router {
        app_with(Stores::in_memory(), provider)
    }

    fn app_with(stores: Stores, provider: Arc<dyn GenerativeProvider>) -> Router {
        let conversation =
            ConversationService::new(stores, provider, ConversationSettings::default());
        let state = AppState::new(Arc::new(TelexPlatform::new()), Arc::new(conversation));
        Router::new()
            .route("/a2a/agent/eunoia", any(handle_a2a))
            .route("/agent/health", get(health))
            .with_state(state)
    }

    async fn call(app: Router, method: &str, body: impl Into<Body>) -> (StatusCode, Value) {
        let req = Request::builder()
            .method(method)
            .uri("/a2a/agent/eunoia")
            .header("content-type", "application/json")
            .body(body.into())
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn envelope(method: &str, text: &str, metadata: Value) -> String {
        json!({
            "jsonrpc": "2.0",
            "id": "req-1",
            "method": method,
            "params": {
                "message": {
                    "kind": "message",
                    "role": "user",
                    "parts": [{ "kind": "text", "text": text }],
                    "metadata": metadata,
                    "messageId": "msg-1"
                }
            }
        })
        .to_string()
    }

    fn echo() -> Arc<dyn GenerativeProvider> {
        Arc::new(MockProvider::with_reply("I'm glad you reached out."))
    }

    #[tokio::test]
    async fn test_happy_path() {
        let (status, json) = call(
            app(echo()),
            "POST",
            envelope("message/send", "hello", json!({ "telex_user_id": "u-1" })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["jsonrpc"], "2.0");
        assert_eq!(json["id"], "req-1");
        assert!(json.get("error").is_none());

        let result = &json["result"];
        assert_eq!(result["kind"], "task");
        assert_eq!(result["status"]["state"], "completed");
        assert_eq!(result["artifacts"], json!([]));
        let last = &result["history"][0];
        assert_eq!(last["role"], "agent");
        assert_eq!(last["messageId"], "msg-1");
        assert_eq!(last["parts"][0]["text"], "I'm glad you reached out.");
        assert_eq!(last["metadata"]["agent"], "eunoia");
    }

    #[tokio::test]
    async fn test_non_post_is_invalid_request() {
        let (status, json) = call(app(echo()), "GET", Body::empty()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["error"]["code"], -32600);
        assert_eq!(json["error"]["message"], "Invalid Request");
    }

    #[tokio::test]
    async fn test_malformed_json_is_parse_error() {
        let (status, json) = call(app(echo()), "POST", "{not json").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["error"]["code"], -32700);
        assert_eq!(json["error"]["data"], "invalid JSON");
    }

    #[tokio::test]
    async fn test_wrong_version() {
        let body = envelope("message/send", "hi", json!({ "user_id": "u" }))
            .replace("\"2.0\"", "\"1.0\"");
        let (_, json) = call(app(echo()), "POST", body).await;
        assert_eq!(json["error"]["code"], -32600);
        assert_eq!(json["id"], "req-1");
    }

    #[tokio::test]
    async fn test_empty_content_beats_bad_method() {
        for method in ["message/send", "tasks/get"] {
            let (_, json) = call(
                app(echo()),
                "POST",
                envelope(method, "   ", json!({ "user_id": "u" })),
            )
            .await;
            assert_eq!(json["error"]["code"], -32602, "method {method}");
            assert_eq!(json["error"]["data"], "message content is required");
        }
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let (_, json) = call(
            app(echo()),
            "POST",
            envelope("tasks/get", "hello", json!({ "user_id": "u" })),
        )
        .await;
        assert_eq!(json["error"]["code"], -32601);
    }

    #[tokio::test]
    async fn test_missing_user_id() {
        let (_, json) = call(app(echo()), "POST", envelope("message/send", "hello", json!({}))).await;
        assert_eq!(json["error"]["code"], -32602);
        assert_eq!(json["error"]["data"], "user_id is required in metadata");
    }

    #[tokio::test]
    async fn test_generation_failure_is_internal_error() {
        let provider = Arc::new(MockProvider::failing(LlmError::Api("down".into())));
        let (status, json) = call(
            app(provider),
            "POST",
            envelope("message/send", "hello", json!({ "user_id": "u" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["error"]["code"], -32603);
        assert_eq!(json["error"]["data"], "failed to process message");
        assert!(json.get("result").is_none());
    }

    #[tokio::test]
    async fn test_store_failures_still_complete_task() {
        let stores = Stores::from_backend(Arc::new(FlakyStore::new(Failures {
            save_message: true,
            recent_messages: true,
            list_check_ins: true,
            check_in_stats: true,
            list_reflections: true,
        })));
        let (status, json) = call(
            app_with(stores, echo()),
            "POST",
            envelope("message/send", "hello", json!({ "user_id": "u" })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert!(json.get("error").is_none());
        assert_eq!(json["result"]["status"]["state"], "completed");
        assert_eq!(
            json["result"]["history"][0]["parts"][0]["text"],
            "I'm glad you reached out."
        );
    }

    #[tokio::test]
    async fn test_health() {
        let req = Request::builder()
            .method("GET")
            .uri("/agent/health")
            .body(Body::empty())
            .unwrap();
        let res = app(echo()).oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let json: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(
            json,
            json!({ "status": "healthy", "agent": "eunoia", "service": "mental wellbeing assistant" })
        );
    }
}
