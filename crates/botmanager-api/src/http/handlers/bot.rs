//! Bot handlers for the REST API.
//!
//! Every successful call answers 201 with the bot (or bot list) in the
//! envelope's `data`.

use std::time::Instant;

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use serde::Serialize;

use botmanager_types::bot::{Bot, BotId, BotUpdate, NewBot, ProjectId};
use botmanager_types::error::BotError;

use crate::http::error::AppError;
use crate::http::extractors::context::Caller;
use crate::http::extractors::query::{BotIdQuery, BotQuery};
use crate::http::response::ApiResponse;
use crate::state::AppState;

/// `GET /v1/bot` answers either one bot or a project's bots.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum BotLookup {
    One(Bot),
    Many(Vec<Bot>),
}

fn bot_link(bot: &Bot) -> String {
    format!("/v1/bot?botId={}", bot.id)
}

fn parse_bot_id(raw: &str) -> Result<BotId, AppError> {
    raw.parse()
        .map_err(|_| BotError::InvalidInput(format!("invalid botId '{raw}'")).into())
}

fn parse_project_id(raw: &str) -> Result<ProjectId, AppError> {
    raw.parse()
        .map_err(|_| BotError::InvalidInput(format!("invalid projectId '{raw}'")).into())
}

/// POST /v1/bot - Create a bot owned by the caller.
pub async fn create_bot(
    State(state): State<AppState>,
    Caller(ctx): Caller,
    body: Result<Json<NewBot>, JsonRejection>,
) -> Result<ApiResponse<Bot>, AppError> {
    let start = Instant::now();
    let Json(draft) = body.map_err(|e| AppError::Validation(e.body_text()))?;

    let bot = state.bot_service.create_bot(&ctx, draft).await?;
    let elapsed = start.elapsed().as_millis() as u64;

    let link = bot_link(&bot);
    Ok(ApiResponse::created(bot, ctx.request_id.to_string(), elapsed).with_link("self", &link))
}

/// GET /v1/bot - Look up by `botId`, `name`, or `projectId`.
pub async fn get_bot(
    State(state): State<AppState>,
    Caller(ctx): Caller,
    query: Result<Query<BotQuery>, QueryRejection>,
) -> Result<ApiResponse<BotLookup>, AppError> {
    let start = Instant::now();
    let Query(query) = query.map_err(|e| AppError::Validation(e.body_text()))?;

    let found = if let Some(raw) = query.bot_id.as_deref() {
        let id = parse_bot_id(raw)?;
        BotLookup::One(state.bot_service.get_bot_by_id(&ctx, id).await?)
    } else if let Some(name) = query.name.as_deref() {
        BotLookup::One(state.bot_service.get_bot_by_name(&ctx, name).await?)
    } else if let Some(raw) = query.project_id.as_deref() {
        let project_id = parse_project_id(raw)?;
        BotLookup::Many(
            state
                .bot_service
                .get_bots_by_project_id(&ctx, project_id)
                .await?,
        )
    } else {
        return Err(BotError::InvalidInput(
            "one of botId, name, or projectId is required".to_string(),
        )
        .into());
    };
    let elapsed = start.elapsed().as_millis() as u64;

    let link = match &found {
        BotLookup::One(bot) => Some(bot_link(bot)),
        BotLookup::Many(_) => None,
    };
    let resp = ApiResponse::created(found, ctx.request_id.to_string(), elapsed);
    Ok(match link {
        Some(link) => resp.with_link("self", &link),
        None => resp,
    })
}

/// PATCH /v1/bot - Replace a bot's mutable fields.
pub async fn update_bot(
    State(state): State<AppState>,
    Caller(ctx): Caller,
    body: Result<Json<BotUpdate>, JsonRejection>,
) -> Result<ApiResponse<Bot>, AppError> {
    let start = Instant::now();
    let Json(update) = body.map_err(|e| AppError::Validation(e.body_text()))?;

    let bot = state.bot_service.update_bot(&ctx, update).await?;
    let elapsed = start.elapsed().as_millis() as u64;

    let link = bot_link(&bot);
    Ok(ApiResponse::created(bot, ctx.request_id.to_string(), elapsed).with_link("self", &link))
}

/// DELETE /v1/bot?botId= - Delete a bot and return it.
pub async fn delete_bot(
    State(state): State<AppState>,
    Caller(ctx): Caller,
    query: Result<Query<BotIdQuery>, QueryRejection>,
) -> Result<ApiResponse<Bot>, AppError> {
    let start = Instant::now();
    let Query(query) = query.map_err(|e| AppError::Validation(e.body_text()))?;

    let raw = query
        .bot_id
        .ok_or_else(|| AppError::from(BotError::InvalidInput("botId is required".to_string())))?;
    let id = parse_bot_id(&raw)?;

    let bot = state.bot_service.delete_bot(&ctx, id).await?;
    let elapsed = start.elapsed().as_millis() as u64;

    Ok(ApiResponse::created(bot, ctx.request_id.to_string(), elapsed))
}
