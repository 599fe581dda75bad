//! Query parameter extractors for the bot endpoints.

use serde::Deserialize;

/// Query parameters for `GET /v1/bot`.
///
/// At most one is used: `botId` wins, then `name`, then `projectId`.
#[derive(Debug, Deserialize, Default)]
pub struct BotQuery {
    #[serde(rename = "botId")]
    pub bot_id: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "projectId")]
    pub project_id: Option<String>,
}

/// Query parameters for `DELETE /v1/bot`.
#[derive(Debug, Deserialize, Default)]
pub struct BotIdQuery {
    #[serde(rename = "botId")]
    pub bot_id: Option<String>,
}
