use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderValue, Method, StatusCode, header},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{debug, error, warn};
use url::Url;

use crate::items::IntegrationItem;
use crate::oauth::AuthorizationTicket;
use crate::{Credential, Gateway, GatewayConfig, GatewayError, Provider};

pub fn router(gateway: Gateway) -> Router {
    let cors = cors_layer(gateway.config());

    Router::new()
        .route("/", get(service_info))
        .route("/health", get(health))
        .route("/integrations/{provider}/authorize", get(authorize))
        .route("/integrations/{provider}/oauth2callback", get(oauth2callback))
        // legacy path some provider apps are still registered with
        .route("/integrations/{provider}/callback", get(oauth2callback))
        .route(
            "/integrations/{provider}/credentials/{state}",
            get(credentials),
        )
        .route("/integrations/{provider}/items", post(items))
        .layer(cors)
        .with_state(gateway)
}

pub async fn serve(gateway: Gateway, listener: TcpListener) -> Result<(), GatewayError> {
    let app = router(gateway);
    axum::serve(listener, app).await?;
    Ok(())
}

/// Browser calls come from the frontend origin; everything else is
/// server-to-server or the provider redirecting the user's browser to the
/// callback, neither of which CORS applies to.
fn cors_layer(config: &GatewayConfig) -> CorsLayer {
    let mut origins: Vec<HeaderValue> = Vec::new();
    for origin in [config.frontend_url.as_str(), "http://localhost:3000"] {
        if let Ok(value) = origin.parse::<HeaderValue>() {
            if !origins.contains(&value) {
                origins.push(value);
            }
        }
    }

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true)
}

async fn service_info() -> Json<serde_json::Value> {
    Json(json!({
        "message": "SaaS Connect Integrations API",
        "version": env!("CARGO_PKG_VERSION"),
        "integrations": Provider::ALL.map(Provider::id),
    }))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy" }))
}

async fn authorize(
    State(gateway): State<Gateway>,
    Path(provider): Path<String>,
) -> Result<Json<AuthorizationTicket>, GatewayError> {
    let provider: Provider = provider.parse()?;
    let ticket = gateway.begin_authorization(provider).await?;
    Ok(Json(ticket))
}

#[derive(Debug, Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// The provider redirects the user's browser here. Whatever happens, the
/// user ends up back on the frontend; failures become an error page with a
/// short message while the full story goes to the logs.
async fn oauth2callback(
    State(gateway): State<Gateway>,
    Path(provider): Path<String>,
    Query(params): Query<CallbackParams>,
) -> Redirect {
    let frontend = gateway.config().frontend_url.clone();

    match run_callback(&gateway, &provider, params).await {
        Ok(state) => frontend_redirect(&frontend, &provider, "success", "state", &state),
        Err(message) => frontend_redirect(&frontend, &provider, "error", "message", &message),
    }
}

async fn run_callback(
    gateway: &Gateway,
    provider_id: &str,
    params: CallbackParams,
) -> Result<String, String> {
    let provider: Provider = provider_id
        .parse()
        .map_err(|_| format!("Unknown provider: {provider_id}"))?;

    if let Some(code) = params.error {
        warn!(%provider, error = %code, "provider reported an authorization error");
        return Err(params.error_description.unwrap_or(code));
    }

    let (code, state) = match (params.code, params.state) {
        (Some(code), Some(state)) => (code, state),
        _ => return Err("Missing code or state in callback".to_string()),
    };

    match gateway.complete_authorization(provider, &code, &state).await {
        Ok(_) => Ok(state),
        Err(err) => {
            warn!(%provider, error = %err, "authorization callback failed");
            Err(callback_message(&err))
        }
    }
}

/// User-facing message for the error redirect. Never includes upstream
/// response bodies or anything secret-bearing.
fn callback_message(err: &GatewayError) -> String {
    match err {
        GatewayError::VerifierNotFound => "Code verifier not found or expired".to_string(),
        GatewayError::Exchange { status, .. } => {
            format!("Token exchange failed with status {status}")
        }
        GatewayError::InvalidResponse { .. } => {
            "Provider returned an invalid response".to_string()
        }
        GatewayError::Http(_) => "Could not reach the provider".to_string(),
        _ => "Authorization failed".to_string(),
    }
}

fn frontend_redirect(frontend: &str, provider: &str, page: &str, key: &str, value: &str) -> Redirect {
    let base = format!("{frontend}/{provider}/{page}");
    match Url::parse(&base) {
        Ok(mut url) => {
            url.query_pairs_mut().append_pair(key, value);
            Redirect::to(url.as_str())
        }
        Err(_) => Redirect::to(frontend),
    }
}

async fn credentials(
    State(gateway): State<Gateway>,
    Path((provider, state)): Path<(String, String)>,
) -> Result<Json<Credential>, GatewayError> {
    let provider: Provider = provider.parse()?;
    let credential = gateway.load_credentials(provider, &state).await?;
    Ok(Json(credential))
}

#[derive(Debug, Serialize)]
struct ItemsResponse {
    items: Vec<IntegrationItem>,
    count: usize,
}

async fn items(
    State(gateway): State<Gateway>,
    Path(provider): Path<String>,
    Json(credential): Json<Credential>,
) -> Result<Json<ItemsResponse>, GatewayError> {
    let provider: Provider = provider.parse()?;
    let items = gateway.list_items(provider, &credential).await?;
    let count = items.len();
    Ok(Json(ItemsResponse { items, count }))
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, detail) = match &self {
            GatewayError::UnknownProvider(name) => {
                (StatusCode::NOT_FOUND, format!("Unknown provider: {name}"))
            }
            GatewayError::CredentialsNotFound => {
                (StatusCode::NOT_FOUND, "Credentials not found".to_string())
            }
            GatewayError::VerifierNotFound => (
                StatusCode::BAD_REQUEST,
                "Code verifier not found or expired".to_string(),
            ),
            GatewayError::Exchange { .. } => (
                StatusCode::BAD_REQUEST,
                "Failed to obtain access token".to_string(),
            ),
            GatewayError::Upstream { detail, .. } => {
                (StatusCode::BAD_REQUEST, detail.clone())
            }
            GatewayError::Configuration(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Service is not configured for this provider".to_string(),
            ),
            GatewayError::Http(_) => (
                StatusCode::BAD_GATEWAY,
                "Upstream request failed".to_string(),
            ),
            GatewayError::InvalidResponse { .. } => (
                StatusCode::BAD_GATEWAY,
                "Provider returned an invalid response".to_string(),
            ),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        if status.is_server_error() {
            error!(error = %self, "request failed");
        } else {
            debug!(error = %self, "request rejected");
        }

        (status, Json(json!({ "detail": detail }))).into_response()
    }
}
