use std::path::Path;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::error::AppError;
use crate::model::{
    InitialSearchResponse, SearchRequest, ShopDetailRequest, ShopDetailSearchResponse,
};
use crate::service::SearchService;

const ALLOWED_ORIGINS: [&str; 2] = ["http://localhost:8000", "http://127.0.0.1:8000"];

pub fn build_router(service: SearchService, static_dir: &Path) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(ALLOWED_ORIGINS.map(HeaderValue::from_static))
        .allow_methods(Any)
        .allow_headers(Any);

    let mut router = Router::new()
        .route("/api/search", post(initial_search))
        .route("/api/search/detail", post(detail_search))
        .route("/health", get(health));

    if static_dir.is_dir() {
        info!(static_dir = %static_dir.display(), "serving static assets");
        router = router
            .route_service("/", ServeFile::new(static_dir.join("index.html")))
            .nest_service("/static", ServeDir::new(static_dir));
    }

    router
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    model: String,
}

async fn health(State(service): State<SearchService>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "restaurant-search-api",
        model: service.model_name().to_string(),
    })
}

async fn initial_search(
    State(service): State<SearchService>,
    payload: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<InitialSearchResponse>, ApiError> {
    let Json(request) = payload?;
    info!(input_text = %request.input_text, "POST /api/search");
    let response = service
        .initial_search(&request.input_text)
        .await
        .map_err(|e| ApiError::from_app("Search failed", e))?;
    info!(shops = response.shop_list.shops.len(), "POST /api/search returning");
    Ok(Json(response))
}

async fn detail_search(
    State(service): State<SearchService>,
    payload: Result<Json<ShopDetailRequest>, JsonRejection>,
) -> Result<Json<ShopDetailSearchResponse>, ApiError> {
    let Json(request) = payload?;
    info!(shops = request.shop_names.len(), "POST /api/search/detail");
    let response = service
        .detail_search(&request.input_text, request.shop_names)
        .await
        .map_err(|e| ApiError::from_app("Detail search failed", e))?;
    info!(summaries = response.summaries.len(), "POST /api/search/detail returning");
    Ok(Json(response))
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    fn from_app(context: &str, err: AppError) -> Self {
        match err {
            AppError::InvalidRequest(message) => Self {
                status: StatusCode::UNPROCESSABLE_ENTITY,
                detail: message,
            },
            other => {
                error!(error = %other, "{context}");
                Self {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    detail: format!("{context}: {other}"),
                }
            }
        }
    }
}

/// Body rejections keep axum's status (400, 415, 422) but use the `{"detail"}` shape.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        warn!(status = %rejection.status(), error = %rejection.body_text(), "rejected request body");
        Self {
            status: rejection.status(),
            detail: rejection.body_text(),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { detail: self.detail })).into_response()
    }
}
