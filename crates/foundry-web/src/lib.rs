//! Axum JSON surface for marketplace search.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use foundry_core::{ProviderTier, SearchParams, SearchResponse, UnknownVariant};
use foundry_search::{build_service_from_env, SearchService};
use serde::Deserialize;
use tokio::net::TcpListener;
use tracing::info;
use uuid::Uuid;

pub const CRATE_NAME: &str = "foundry-web";

#[derive(Clone)]
pub struct AppState {
    pub search: Arc<SearchService>,
}

impl AppState {
    pub fn new(search: SearchService) -> Self {
        Self {
            search: Arc::new(search),
        }
    }
}

/// Query-string form of [`SearchParams`]; list fields are comma-separated.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct SearchQuery {
    query: Option<String>,
    category: Option<String>,
    subcategories: Option<String>,
    min_price: Option<f64>,
    max_price: Option<f64>,
    min_rating: Option<f64>,
    location: Option<String>,
    tiers: Option<String>,
    available_from: Option<NaiveDate>,
    available_to: Option<NaiveDate>,
    skills: Option<String>,
    skill_match: Option<String>,
    certifications: Option<String>,
    sort_by: Option<String>,
    sort_order: Option<String>,
    page: Option<u32>,
    limit: Option<u32>,
    user_id: Option<Uuid>,
}

fn split_list(raw: Option<&str>) -> Vec<String> {
    raw.map(|r| {
        r.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ToString::to_string)
            .collect()
    })
    .unwrap_or_default()
}

fn parse_opt<T: std::str::FromStr<Err = UnknownVariant>>(raw: Option<&str>) -> Result<Option<T>, UnknownVariant> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::parse)
        .transpose()
}

impl SearchQuery {
    fn into_params(self) -> Result<SearchParams, UnknownVariant> {
        let tiers = split_list(self.tiers.as_deref())
            .iter()
            .map(|t| t.parse::<ProviderTier>())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(SearchParams {
            category: parse_opt(self.category.as_deref())?,
            subcategories: split_list(self.subcategories.as_deref()),
            tiers,
            skills: split_list(self.skills.as_deref()),
            skill_match: parse_opt(self.skill_match.as_deref())?,
            certifications: split_list(self.certifications.as_deref()),
            sort_by: parse_opt(self.sort_by.as_deref())?,
            sort_order: parse_opt(self.sort_order.as_deref())?,
            query: self.query,
            min_price: self.min_price,
            max_price: self.max_price,
            min_rating: self.min_rating,
            location: self.location,
            available_from: self.available_from,
            available_to: self.available_to,
            page: self.page,
            limit: self.limit,
            user_id: self.user_id,
        })
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz_handler))
        .route(
            "/api/marketplace/search",
            get(search_get_handler).post(search_post_handler),
        )
        .with_state(Arc::new(state))
}

pub async fn serve_from_env() -> anyhow::Result<()> {
    let port: u16 = std::env::var("FOUNDRY_WEB_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8000);
    let state = AppState::new(build_service_from_env().await?);
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    info!(port, "marketplace search listening");
    axum::serve(listener, app(state)).await?;
    Ok(())
}

async fn healthz_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn search_get_handler(State(state): State<Arc<AppState>>, Query(query): Query<SearchQuery>) -> Response {
    match query.into_params() {
        Ok(params) => Json(state.search.search(params).await).into_response(),
        Err(err) => bad_request(err),
    }
}

async fn search_post_handler(
    State(state): State<Arc<AppState>>,
    Json(params): Json<SearchParams>,
) -> Json<SearchResponse> {
    Json(state.search.search(params).await)
}

fn bad_request(err: UnknownVariant) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({ "error": err.to_string() })),
    )
        .into_response()
}
