//! Serve command handler.
//!
//! HTTP surface over the application context: `POST /chat` answers a question
//! and `GET /health` reports collection state.

use anyhow::Context;
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use clap::Args;
use medrag_core::config::AppConfig;
use medrag_knowledge::{AppContext, CollectionState};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;

/// Run the chat HTTP server
#[derive(Args, Debug)]
pub struct ServeCommand {
    /// Address to listen on (default: server.bind from config)
    #[arg(long, env = "MEDRAG_BIND")]
    pub bind: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub question: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ChatResponse {
    pub answer: String,
}

#[derive(Debug, Serialize)]
struct HealthResponse<'a> {
    status: &'static str,
    collections: &'a [CollectionState],
}

impl ServeCommand {
    pub async fn execute(&self, config: &AppConfig) -> anyhow::Result<()> {
        tracing::info!("Executing serve command");

        let bind = self
            .bind
            .clone()
            .unwrap_or_else(|| config.server.bind.clone());

        let context = Arc::new(
            AppContext::initialize(config.clone())
                .await
                .context("failed to initialize application")?,
        );

        let listener = TcpListener::bind(&bind)
            .await
            .with_context(|| format!("failed to bind {}", bind))?;
        let addr = listener.local_addr()?;

        tracing::info!("MedRAG server listening on http://{}", addr);

        axum::serve(listener, router(context))
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("server error")?;

        tracing::info!("MedRAG server stopped");
        Ok(())
    }
}

pub(crate) fn router(context: Arc<AppContext>) -> Router {
    Router::new()
        .route("/chat", post(chat))
        .route("/health", get(health))
        .with_state(context)
}

/// Bodies are read as JSON whatever their content type. A body that does not
/// parse is treated as a blank question and gets the fallback answer.
async fn chat(State(context): State<Arc<AppContext>>, body: Bytes) -> Json<ChatResponse> {
    let question = match serde_json::from_slice::<ChatRequest>(&body) {
        Ok(request) => request.question,
        Err(e) => {
            tracing::warn!("Ignoring malformed chat request: {}", e);
            String::new()
        }
    };

    let answer = context.answer_text(&question).await;
    Json(ChatResponse { answer })
}

async fn health(State(context): State<Arc<AppContext>>) -> Response {
    let collections = context.collections();
    let status = if collections.iter().any(|c| c.is_ready()) {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let body = HealthResponse {
        status: if status == StatusCode::OK { "ok" } else { "unavailable" },
        collections,
    };
    (status, Json(body)).into_response()
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use medrag_core::config::CollectionConfig;
    use medrag_core::AppResult;
    use medrag_knowledge::embeddings::providers::TrigramProvider;
    use medrag_llm::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
    use tempfile::TempDir;
    use tower::ServiceExt;

    struct Canned;

    #[async_trait]
    impl LlmClient for Canned {
        fn provider_name(&self) -> &str {
            "canned"
        }

        async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
            Ok(LlmResponse {
                content: "Tamoxifen treats hormone receptor positive breast cancer.".to_string(),
                model: request.model.clone(),
                usage: LlmUsage::default(),
            })
        }
    }

    async fn app(temp: &TempDir) -> Router {
        std::fs::write(
            temp.path().join("oncology.txt"),
            "Tamoxifen is used for hormone receptor positive breast cancer.",
        )
        .unwrap();

        let mut config = AppConfig {
            workspace: temp.path().to_path_buf(),
            ..AppConfig::default()
        };
        config.llm.provider = "ollama".to_string();
        config.embedding.provider = "trigram".to_string();
        config.embedding.dimensions = 64;
        config.collections = vec![
            CollectionConfig::new("oncology", "oncology.txt", "oncology_index"),
            CollectionConfig::new("neurology", "neurology.txt", "neurology_index"),
        ];

        let context = AppContext::with_clients(
            config,
            Arc::new(TrigramProvider::new(64)),
            Arc::new(Canned),
        )
        .await
        .unwrap();
        router(Arc::new(context))
    }

    async fn chat_request(app: Router, body: &str) -> (StatusCode, Vec<u8>) {
        post_chat(app, Some("application/json"), body).await
    }

    async fn post_chat(
        app: Router,
        content_type: Option<&str>,
        body: &str,
    ) -> (StatusCode, Vec<u8>) {
        let mut request = Request::post("/chat");
        if let Some(content_type) = content_type {
            request = request.header(header::CONTENT_TYPE, content_type);
        }
        let response = app
            .oneshot(request.body(Body::from(body.to_string())).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, bytes.to_vec())
    }

    #[tokio::test]
    async fn test_chat_returns_selected_answer() {
        let temp = TempDir::new().unwrap();
        let (status, body) =
            chat_request(app(&temp).await, r#"{"question": "What is tamoxifen for?"}"#).await;

        assert_eq!(status, StatusCode::OK);
        let response: ChatResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            response.answer,
            "Tamoxifen treats hormone receptor positive breast cancer."
        );
    }

    #[tokio::test]
    async fn test_chat_blank_question_returns_fallback() {
        let temp = TempDir::new().unwrap();
        let (status, body) = chat_request(app(&temp).await, r#"{"question": "  "}"#).await;

        assert_eq!(status, StatusCode::OK);
        let response: ChatResponse = serde_json::from_slice(&body).unwrap();
        assert!(response.answer.starts_with("Sorry, I couldn't find relevant information"));
    }

    #[tokio::test]
    async fn test_chat_accepts_json_without_content_type() {
        let temp = TempDir::new().unwrap();
        let (status, body) = post_chat(
            app(&temp).await,
            None,
            r#"{"question": "What is tamoxifen for?"}"#,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let response: ChatResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            response.answer,
            "Tamoxifen treats hormone receptor positive breast cancer."
        );
    }

    #[tokio::test]
    async fn test_chat_malformed_body_returns_fallback() {
        let temp = TempDir::new().unwrap();
        let (status, body) = post_chat(app(&temp).await, Some("text/plain"), "what is tamoxifen").await;

        assert_eq!(status, StatusCode::OK);
        let response: ChatResponse = serde_json::from_slice(&body).unwrap();
        assert!(response.answer.starts_with("Sorry, I couldn't find relevant information"));
    }

    #[tokio::test]
    async fn test_health_reports_collections() {
        let temp = TempDir::new().unwrap();
        let response = app(&temp)
            .await
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["collections"][0]["status"]["state"], "ready");
        assert_eq!(json["collections"][1]["status"]["state"], "unavailable");
    }
}
