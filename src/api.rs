//! HTTP routes for the directory API
//!
//! Handlers only extract parameters and map [`Error`] onto status codes; all
//! validation and upstream traffic lives in [`Directory`].

use crate::directory::{Directory, SearchFilters};
use crate::error::Error;
use crate::models::{ClickResult, CountryList, LanguageList, Station, StationList, TagList};
use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

#[derive(Clone)]
pub struct AppState {
    pub directory: Arc<Directory>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LimitParams {
    pub limit: Option<u32>,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::UpstreamUnavailable { .. } => StatusCode::BAD_GATEWAY,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        };
        let body = Json(serde_json::json!({
            "error": self.to_string()
        }));
        (status, body).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, Error>;

pub fn create_router(state: AppState, cors_origins: &[String]) -> Router {
    Router::new()
        .route("/api", get(root))
        .route("/api/", get(root))
        .route("/api/stations/search", get(search_stations))
        .route("/api/stations/topvote", get(top_voted))
        .route("/api/stations/topclick", get(top_clicked))
        .route("/api/stations/bytag/{tag}", get(stations_by_tag))
        .route("/api/stations/bycountry/{country}", get(stations_by_country))
        .route("/api/stations/bylanguage/{language}", get(stations_by_language))
        .route("/api/stations/{id}", get(station))
        .route("/api/stations/{id}/click", post(record_click))
        .route("/api/tags", get(tags))
        .route("/api/countries", get(countries))
        .route("/api/languages", get(languages))
        .layer(cors_layer(cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}

fn query<T>(params: Result<Query<T>, QueryRejection>) -> Result<T, Error> {
    params
        .map(|Query(p)| p)
        .map_err(|e| Error::invalid_request(e.body_text()))
}

async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": "Radio Directory API" }))
}

async fn search_stations(
    State(state): State<AppState>,
    params: Result<Query<SearchFilters>, QueryRejection>,
) -> ApiResult<StationList> {
    let filters = query(params)?;
    Ok(Json(state.directory.search(&filters).await?))
}

async fn top_voted(
    State(state): State<AppState>,
    params: Result<Query<LimitParams>, QueryRejection>,
) -> ApiResult<StationList> {
    let params = query(params)?;
    Ok(Json(state.directory.top_voted(params.limit).await?))
}

async fn top_clicked(
    State(state): State<AppState>,
    params: Result<Query<LimitParams>, QueryRejection>,
) -> ApiResult<StationList> {
    let params = query(params)?;
    Ok(Json(state.directory.top_clicked(params.limit).await?))
}

async fn stations_by_tag(
    State(state): State<AppState>,
    Path(tag): Path<String>,
    params: Result<Query<LimitParams>, QueryRejection>,
) -> ApiResult<StationList> {
    let params = query(params)?;
    Ok(Json(state.directory.by_tag(&tag, params.limit).await?))
}

async fn stations_by_country(
    State(state): State<AppState>,
    Path(country): Path<String>,
    params: Result<Query<LimitParams>, QueryRejection>,
) -> ApiResult<StationList> {
    let params = query(params)?;
    Ok(Json(state.directory.by_country(&country, params.limit).await?))
}

async fn stations_by_language(
    State(state): State<AppState>,
    Path(language): Path<String>,
    params: Result<Query<LimitParams>, QueryRejection>,
) -> ApiResult<StationList> {
    let params = query(params)?;
    Ok(Json(state.directory.by_language(&language, params.limit).await?))
}

async fn station(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Station> {
    Ok(Json(state.directory.station(&id).await?))
}

async fn record_click(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<ClickResult> {
    Ok(Json(state.directory.record_click(&id).await?))
}

async fn tags(
    State(state): State<AppState>,
    params: Result<Query<LimitParams>, QueryRejection>,
) -> ApiResult<TagList> {
    let params = query(params)?;
    Ok(Json(state.directory.tags(params.limit).await?))
}

async fn countries(
    State(state): State<AppState>,
    params: Result<Query<LimitParams>, QueryRejection>,
) -> ApiResult<CountryList> {
    let params = query(params)?;
    Ok(Json(state.directory.countries(params.limit).await?))
}

async fn languages(
    State(state): State<AppState>,
    params: Result<Query<LimitParams>, QueryRejection>,
) -> ApiResult<LanguageList> {
    let params = query(params)?;
    Ok(Json(state.directory.languages(params.limit).await?))
}
