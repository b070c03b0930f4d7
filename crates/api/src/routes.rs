use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, Query, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use std::any::Any;
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any as AnyOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use callsignal_core::analysis::{self, validate, AnalysisMode};
use callsignal_core::config::Settings;
use callsignal_core::domain::signal::AnalysisResponse;
use callsignal_core::error::AnalysisError;
use callsignal_core::llm::LlmGateway;

/// Shared across requests. The gateway is built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<dyn LlmGateway>,
    pub settings: Arc<Settings>,
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AnyOrigin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/healthz", get(healthz))
        .route("/", post(analyze).fallback(method_not_allowed))
        .route("/analyze", post(analyze).fallback(method_not_allowed))
        .with_state(state)
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Debug, Deserialize)]
struct AnalyzeParams {
    mode: Option<String>,
}

async fn analyze(
    State(state): State<AppState>,
    params: Result<Query<AnalyzeParams>, QueryRejection>,
    body: Bytes,
) -> Result<Json<AnalysisResponse>, ApiError> {
    let Query(params) = params.map_err(|e| AnalysisError::invalid(e.body_text()))?;
    let mode = match params.mode.as_deref() {
        Some(raw) => raw
            .parse::<AnalysisMode>()
            .map_err(|e| AnalysisError::invalid(e.to_string()))?,
        None => state.settings.analysis_mode,
    };

    let request = validate::validate_body(&body)?;
    let as_of = Utc::now().date_naive();

    let response = analysis::analyze(
        state.gateway.as_ref(),
        &state.settings,
        &request,
        mode,
        as_of,
    )
    .await?;

    Ok(Json(response))
}

async fn method_not_allowed() -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(json!({"error": "Method not allowed"})),
    )
        .into_response()
}

#[derive(Debug)]
struct ApiError(AnalysisError);

impl From<AnalysisError> for ApiError {
    fn from(err: AnalysisError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self.0 {
            AnalysisError::InvalidRequest(message) => {
                tracing::info!(%message, "rejected invalid request");
                (
                    StatusCode::BAD_REQUEST,
                    Json(json!({"error": "Invalid request", "message": message})),
                )
                    .into_response()
            }
            AnalysisError::Internal(err) => {
                sentry_anyhow::capture_anyhow(&err);
                tracing::error!(error = %format!("{err:#}"), "analysis failed");
                analysis_failed(format!("{err:#}"))
            }
            other => {
                sentry::capture_error(&other);
                tracing::error!(error = %other, "analysis failed");
                analysis_failed(other.to_string())
            }
        }
    }
}

fn analysis_failed(message: String) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "error": "Analysis failed",
            "message": message,
            "timestamp": Utc::now(),
        })),
    )
        .into_response()
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    tracing::error!(%message, "handler panicked");
    analysis_failed(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use callsignal_core::llm::error::GatewayError;
    use callsignal_core::llm::{Completion, TokenUsage};
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;

    /// Answers every prompt with the same reply and counts calls.
    struct CountingGateway {
        reply: Option<String>,
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl LlmGateway for CountingGateway {
        fn model(&self) -> &str {
            "test-model"
        }

        async fn complete(&self, _prompt: &str) -> Result<Completion, GatewayError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.reply {
                Some(text) => Ok(Completion {
                    text: text.clone(),
                    usage: TokenUsage::default(),
                    stop_reason: None,
                }),
                None => Err(GatewayError::Authentication("ANTHROPIC_API_KEY is not set".into())),
            }
        }
    }

    fn app(reply: Option<&str>) -> (Router, Arc<CountingGateway>) {
        let gateway = Arc::new(CountingGateway {
            reply: reply.map(str::to_string),
            calls: AtomicUsize::new(0),
        });
        let state = AppState {
            gateway: gateway.clone(),
            settings: Arc::new(Settings::default()),
        };
        (router(state), gateway)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::ORIGIN, "https://example.com")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn read_json(res: Response) -> Value {
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn aapl_request() -> Value {
        json!({
            "tickers": ["AAPL"],
            "technical_data": [{"current_price": 200, "technical_score": 80, "rsi": 55, "macd": 0.5}],
        })
    }

    fn aapl_reply() -> String {
        json!({
            "ticker": "AAPL",
            "score": 8,
            "signal": "BUY",
            "callOption": {"strikePrice": "220.00", "expiration": "January 18, 2027", "reasoning": "Liquid"},
            "recommendation": "Trend intact.",
            "risks": ["Earnings"],
        })
        .to_string()
    }

    #[tokio::test]
    async fn analyzes_single_ticker() {
        let reply = aapl_reply();
        let (app, gateway) = app(Some(&reply));

        let res = app.oneshot(post_json("/analyze", aapl_request())).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(
            res.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "*"
        );

        let body = read_json(res).await;
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["model"], json!("test-model"));
        assert_eq!(body["signals"].as_array().unwrap().len(), 1);
        assert_eq!(body["signals"][0]["ticker"], json!("AAPL"));
        assert_eq!(body["signals"][0]["callOption"]["strikePrice"], json!("220.00"));
        let label = body["signals"][0]["signal"].as_str().unwrap();
        assert!(["STRONG BUY", "BUY", "HOLD", "AVOID"].contains(&label));
        assert_eq!(body["summary"]["total"], json!(1));
        assert_eq!(body["cost_estimate"], json!("$0.00"));
        assert!(body["timestamp"].is_string());
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_tickers_is_rejected_before_any_call() {
        let (app, gateway) = app(Some("{}"));

        let res = app
            .oneshot(post_json("/analyze", json!({"technical_data": []})))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        let body = read_json(res).await;
        assert_eq!(body["error"], json!("Invalid request"));
        assert_eq!(body["message"], json!("tickers is required"));
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn non_json_body_is_rejected() {
        let (app, gateway) = app(Some("{}"));
        let req = Request::builder()
            .method(Method::POST)
            .uri("/")
            .body(Body::from("tickers=AAPL"))
            .unwrap();

        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn preflight_returns_empty_ok_with_cors_headers() {
        let (app, gateway) = app(None);
        let req = Request::builder()
            .method(Method::OPTIONS)
            .uri("/analyze")
            .header(header::ORIGIN, "https://example.com")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .body(Body::empty())
            .unwrap();

        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let headers = res.headers().clone();
        assert_eq!(headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(), "*");
        let methods = headers
            .get(header::ACCESS_CONTROL_ALLOW_METHODS)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(methods.contains("POST") && methods.contains("OPTIONS"));
        assert!(headers.get(header::ACCESS_CONTROL_ALLOW_HEADERS).is_some());

        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        assert!(bytes.is_empty());
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn other_methods_are_not_allowed() {
        let (app, _) = app(None);
        let req = Request::builder()
            .method(Method::GET)
            .uri("/analyze")
            .body(Body::empty())
            .unwrap();

        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(read_json(res).await, json!({"error": "Method not allowed"}));
    }

    #[tokio::test]
    async fn per_ticker_gateway_failure_still_returns_ok() {
        let (app, gateway) = app(None);

        let res = app.oneshot(post_json("/analyze", aapl_request())).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        let body = read_json(res).await;
        assert_eq!(body["signals"][0]["signal"], json!("ERROR"));
        assert_eq!(body["signals"][0]["score"], json!(0));
        assert_eq!(body["summary"]["errors"], json!(1));
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn batch_gateway_failure_is_a_server_error() {
        let (app, _) = app(None);

        let res = app
            .oneshot(post_json("/analyze?mode=batch", aapl_request()))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = read_json(res).await;
        assert_eq!(body["error"], json!("Analysis failed"));
        assert!(body["message"].as_str().unwrap().contains("authentication failed"));
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    async fn batch_mode_uses_batch_shape() {
        let reply = json!({"signals": [{"ticker": "AAPL", "score": 7, "signal": "BUY"}]}).to_string();
        let (app, _) = app(Some(&reply));

        let res = app
            .oneshot(post_json("/analyze?mode=batch", aapl_request()))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        let body = read_json(res).await;
        assert_eq!(body["model_used"], json!("test-model"));
        assert!(body["analysis_timestamp"].is_string());
        assert_eq!(body["signals"][0]["signal"], json!("BUY"));
        assert!(body.get("summary").is_none());
    }

    #[tokio::test]
    async fn unknown_mode_is_rejected() {
        let (app, gateway) = app(Some("{}"));

        let res = app
            .oneshot(post_json("/analyze?mode=parallel", aapl_request()))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn malformed_query_is_a_json_bad_request() {
        let (app, gateway) = app(Some("{}"));

        let res = app
            .oneshot(post_json("/analyze?mode=batch&mode=per_ticker", aapl_request()))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        let body = read_json(res).await;
        assert_eq!(body["error"], json!("Invalid request"));
        assert!(body["message"].is_string());
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 0);
    }

    /// Panics inside the handler, standing in for any unexpected bug.
    struct PanickingGateway;

    #[async_trait::async_trait]
    impl LlmGateway for PanickingGateway {
        fn model(&self) -> &str {
            "test-model"
        }

        async fn complete(&self, _prompt: &str) -> Result<Completion, GatewayError> {
            panic!("gateway exploded")
        }
    }

    #[tokio::test]
    async fn panic_becomes_json_500_with_cors_headers() {
        let app = router(AppState {
            gateway: Arc::new(PanickingGateway),
            settings: Arc::new(Settings::default()),
        });

        let res = app.oneshot(post_json("/analyze", aapl_request())).await.unwrap();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            res.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "*"
        );

        let body = read_json(res).await;
        assert_eq!(body["error"], json!("Analysis failed"));
        assert_eq!(body["message"], json!("gateway exploded"));
    }

    #[tokio::test]
    async fn healthz_is_ok() {
        let (app, _) = app(None);
        let req = Request::builder().uri("/healthz").body(Body::empty()).unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }
}
