//! Request handlers for the bot admin endpoints.

use super::error::ApiError;
use super::{ApiState, csv, dto};
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub(super) struct ListBotsQuery {
    author: Option<i64>,
}

pub(super) async fn list_bots(
    State(state): State<ApiState>,
    Query(query): Query<ListBotsQuery>,
) -> Result<Json<Vec<dto::BotDto>>, ApiError> {
    let bots = state
        .app
        .get_user_bots
        .handle(query.author.unwrap_or(1))
        .await?;
    Ok(Json(bots.iter().map(dto::bot_to_dto).collect()))
}

pub(super) async fn create_bot(
    State(state): State<ApiState>,
    Json(request): Json<dto::PutBotRequest>,
) -> Result<Response, ApiError> {
    let script = dto::script_from_dto(&request.script).map_err(crate::Error::from)?;
    state
        .app
        .create_bot
        .handle(request.id.clone(), request.token, request.author, script)
        .await?;

    let location = format!("/v1/bots/{}", request.id);
    Ok((StatusCode::CREATED, [(header::LOCATION, location)]).into_response())
}

pub(super) async fn get_bot(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<dto::BotDto>, ApiError> {
    let bot = state.app.get_bot.handle(&id).await?;
    Ok(Json(dto::bot_to_dto(&bot)))
}

pub(super) async fn update_bot(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(request): Json<dto::UpdateBotRequest>,
) -> Result<StatusCode, ApiError> {
    let script = dto::script_from_dto(&request.script).map_err(crate::Error::from)?;
    state
        .app
        .update_bot
        .handle(id, request.token, request.author, script)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(super) async fn delete_bot(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.app.delete_bot.handle(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(super) async fn list_threads(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<dto::ThreadDto>>, ApiError> {
    // Resolve the bot first so unknown ids report 404 instead of an empty
    // list.
    state.app.get_bot.handle(&id).await?;
    let threads = state.app.get_threads.handle(&id).await?;
    Ok(Json(threads.iter().map(dto::thread_to_dto).collect()))
}

pub(super) async fn export_answers(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let bot = state.app.get_bot.handle(&id).await?;
    let threads = state.app.get_threads.handle(&id).await?;
    let body = csv::render_answers(bot.script(), &threads)?;
    Ok(([(header::CONTENT_TYPE, csv::CONTENT_TYPE)], body).into_response())
}

pub(super) async fn start_bot(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.app.start.handle(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(super) async fn stop_bot(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.app.stop.handle(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(super) async fn enable_bot(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.app.enable_bot.handle(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(super) async fn disable_bot(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.app.disable_bot.handle(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(super) async fn bot_status(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Json<dto::StatusResponse> {
    let status = state.app.get_status.handle(&id).await;
    Json(dto::StatusResponse {
        status: status.as_str(),
    })
}

pub(super) async fn mailing(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(request): Json<dto::MailingRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .app
        .mailing
        .handle(&id, &request.key, &request.users)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
