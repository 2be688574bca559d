use crate::error::{AppError, Result};
use crate::model::{ApiResponse, ShortenRequest, ShortenResponse};
use crate::state::AppState;
use crate::validation::validate_shorten_request;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::header::LOCATION;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use rotator_core::{ShortCode, ShortenParams};
use tracing::{debug, info};

pub async fn shorten_handler(
    State(state): State<AppState>,
    payload: std::result::Result<Json<ShortenRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<ShortenResponse>>> {
    let Json(request) = payload?;
    validate_shorten_request(&request, state.max_urls())?;

    let params = ShortenParams {
        urls: request.urls,
        strategy: request.strategy.unwrap_or_default(),
    };
    let record = state.shortener().shorten(params).await?;
    let url = record.code.to_url(state.base_url());
    info!(code = %record.code, url = %url, "short link created");

    Ok(Json(ApiResponse::ok(ShortenResponse {
        url,
        strategy: record.strategy,
        created_at: record.created_at,
    })))
}

pub async fn redirect_handler(
    Path(code): Path<String>,
    State(state): State<AppState>,
) -> Result<Response> {
    // A code that cannot exist is answered like any unknown code.
    let code = ShortCode::new(code.as_str()).map_err(|_| AppError::NotFound(code.clone()))?;

    let destination = state.redirector().resolve(&code).await?;
    debug!(code = %code, destination = %destination, "redirecting");

    Ok((StatusCode::FOUND, [(LOCATION, destination)]).into_response())
}
