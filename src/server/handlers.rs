use anyhow::{Context, Result};
use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, Method, Request, Response, StatusCode};
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Arc;
use tracing::info;

use super::models::{
    AnalyzeRequest, ErrorResponse, LanguageInfo, LanguageRequest, LanguageResponse,
    LanguagesResponse,
};
use super::state::ServerState;
use crate::analysis::AnalysisResult;
use crate::languages::Language;
use crate::providers::{Gemini, Provider};
use crate::settings;

pub async fn run_server(
    settings: settings::Settings,
    key: Option<String>,
    addr: Option<String>,
) -> Result<()> {
    let addr = addr.unwrap_or_else(|| settings.server_addr.clone());
    let store = crate::prepare_store(&settings, None).await;
    let analyzer: crate::Analyzer<Gemini> =
        crate::build_analyzer(&settings, key.as_deref(), None, store);
    let app = router(Arc::new(ServerState::new(settings, analyzer)));
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind server address {}", addr))?;
    info!("listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

pub fn router<P: Provider + 'static>(state: Arc<ServerState<P>>) -> Router {
    Router::new()
        .route("/health", get(health::<P>))
        .route("/languages", get(languages::<P>))
        .route("/language", post(select_language::<P>))
        .route("/analyze", post(analyze::<P>))
        .with_state(state)
        .layer(axum::middleware::from_fn(cors_middleware))
}

async fn health<P: Provider + 'static>(
    State(state): State<Arc<ServerState<P>>>,
) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "ok",
            "configured": state.analyzer.is_configured(),
        })),
    )
}

async fn cors_middleware(req: Request<Body>, next: Next) -> Result<Response<Body>, StatusCode> {
    if req.method() == Method::OPTIONS {
        let mut response = Response::new(Body::empty());
        *response.status_mut() = StatusCode::NO_CONTENT;
        apply_cors_headers(response.headers_mut());
        return Ok(response);
    }
    let mut response = next.run(req).await;
    apply_cors_headers(response.headers_mut());
    Ok(response)
}

fn apply_cors_headers(headers: &mut HeaderMap) {
    headers.insert("access-control-allow-origin", HeaderValue::from_static("*"));
    headers.insert(
        "access-control-allow-methods",
        HeaderValue::from_static("GET,POST,OPTIONS"),
    );
    headers.insert(
        "access-control-allow-headers",
        HeaderValue::from_static("content-type"),
    );
}

async fn languages<P: Provider + 'static>(
    State(state): State<Arc<ServerState<P>>>,
) -> Json<LanguagesResponse> {
    let store = state.analyzer.store();
    Json(LanguagesResponse {
        active: store.language(),
        status: store.status(),
        languages: Language::ALL.into_iter().map(LanguageInfo::from).collect(),
    })
}

async fn select_language<P: Provider + 'static>(
    State(state): State<Arc<ServerState<P>>>,
    Json(payload): Json<LanguageRequest>,
) -> Result<Json<LanguageResponse>, (StatusCode, Json<ErrorResponse>)> {
    let language = payload.lang.parse::<Language>().map_err(|err| {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: err.to_string(),
            }),
        )
    })?;
    let store = state.analyzer.store();
    store.select(language).await;
    Ok(Json(LanguageResponse {
        language,
        status: store.status(),
    }))
}

async fn analyze<P: Provider + 'static>(
    State(state): State<Arc<ServerState<P>>>,
    Json(payload): Json<AnalyzeRequest>,
) -> Json<AnalysisResult> {
    let language = state
        .analyzer
        .store()
        .language()
        .unwrap_or(state.settings.language);
    Json(state.analyzer.analyze(&payload.image, language).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::Analyzer;
    use crate::i18n::{EmbeddedLocales, TranslationStore};
    use serde_json::{json, Value};

    async fn spawn_unconfigured() -> String {
        let store = TranslationStore::new(EmbeddedLocales);
        store.load(Language::En).await;
        let analyzer: Analyzer<Gemini> = Analyzer::new(None, Arc::new(store));
        let app = router(Arc::new(ServerState::new(
            settings::Settings::default(),
            analyzer,
        )));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn analyze_answers_with_failure_result_and_cors() {
        let base = spawn_unconfigured().await;
        let response = reqwest::Client::new()
            .post(format!("{}/analyze", base))
            .json(&json!({ "image": "data:image/png;base64,aGVsbG8=" }))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), reqwest::StatusCode::OK);
        assert_eq!(
            response.headers()["access-control-allow-origin"],
            "*"
        );
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["identifiedSuccessfully"], false);
        assert_eq!(body["failureKind"], "configuration");
        assert_eq!(body["rawIdentifiedText"], "API key is missing.");
    }

    #[tokio::test]
    async fn health_reports_missing_credential() {
        let base = spawn_unconfigured().await;
        let body: Value = reqwest::get(format!("{}/health", base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body, json!({ "status": "ok", "configured": false }));
    }

    #[tokio::test]
    async fn language_listing_and_selection() {
        let base = spawn_unconfigured().await;
        let client = reqwest::Client::new();

        let listing: Value = client
            .get(format!("{}/languages", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(listing["active"], "en");
        assert_eq!(listing["status"], "ready");
        assert_eq!(listing["languages"][1]["code"], "ko");
        assert_eq!(listing["languages"][1]["englishName"], "Korean");

        let selected: Value = client
            .post(format!("{}/language", base))
            .json(&json!({ "lang": "JA" }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(selected, json!({ "language": "ja", "status": "ready" }));

        let rejected = client
            .post(format!("{}/language", base))
            .json(&json!({ "lang": "fr" }))
            .send()
            .await
            .unwrap();
        assert_eq!(rejected.status(), reqwest::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn preflight_is_answered_without_routing() {
        let base = spawn_unconfigured().await;
        let response = reqwest::Client::new()
            .request(reqwest::Method::OPTIONS, format!("{}/analyze", base))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::NO_CONTENT);
        assert_eq!(
            response.headers()["access-control-allow-methods"],
            "GET,POST,OPTIONS"
        );
    }
}
