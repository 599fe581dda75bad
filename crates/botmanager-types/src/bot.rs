use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

use crate::error::BotError;
use crate::identity::OwnerId;

/// Maximum length of a bot name, in characters.
pub const MAX_NAME_LEN: usize = 100;

/// Unique identifier for a bot, wrapping a UUID v7 (time-sortable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BotId(pub Uuid);

impl BotId {
    /// Create a new BotId using UUID v7 (time-sortable, guaranteed ordering).
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Create a BotId from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for BotId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for BotId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Identifier of the project a bot is grouped under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectId(pub Uuid);

impl ProjectId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for ProjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ProjectId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// A bot resource.
///
/// Pure metadata: the manager never executes a bot. `id`, `owner`, and the
/// timestamps are server-managed and never taken from a caller payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bot {
    pub id: BotId,
    /// Unique among the bots of one owner.
    pub name: String,
    /// Principal that created the bot. Immutable after creation.
    pub owner: OwnerId,
    #[serde(rename = "projectId")]
    pub project_id: ProjectId,
    pub description: String,
    /// Opaque configuration, stored as-is.
    pub config: serde_json::Value,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

/// Payload for creating a bot.
///
/// Carries no `id` or `owner`: unknown keys in the JSON body are ignored, so a
/// caller cannot smuggle either in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBot {
    pub name: String,
    #[serde(rename = "projectId")]
    pub project_id: ProjectId,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub config: Option<serde_json::Value>,
}

impl NewBot {
    /// Validate and normalize the payload (trims the name).
    pub fn validate(mut self) -> Result<Self, BotError> {
        self.name = validate_name(&self.name)?;
        validate_config(self.config.as_ref())?;
        Ok(self)
    }
}

/// Full-replacement payload for updating a bot.
///
/// Optional fields left out of the payload reset to their defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotUpdate {
    pub id: BotId,
    pub name: String,
    #[serde(rename = "projectId")]
    pub project_id: ProjectId,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub config: Option<serde_json::Value>,
}

impl BotUpdate {
    pub fn validate(mut self) -> Result<Self, BotError> {
        self.name = validate_name(&self.name)?;
        validate_config(self.config.as_ref())?;
        Ok(self)
    }
}

fn validate_name(name: &str) -> Result<String, BotError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(BotError::InvalidInput("name cannot be empty".to_string()));
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(BotError::InvalidInput(format!(
            "name must be at most {MAX_NAME_LEN} characters"
        )));
    }
    Ok(trimmed.to_string())
}

fn validate_config(config: Option<&serde_json::Value>) -> Result<(), BotError> {
    match config {
        None | Some(serde_json::Value::Object(_)) => Ok(()),
        Some(_) => Err(BotError::InvalidInput(
            "config must be a JSON object".to_string(),
        )),
    }
}

/// Empty configuration object used when a payload omits `config`.
pub fn empty_config() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bot_id_display() {
        let id = BotId::new();
        let s = id.to_string();
        let parsed: BotId = s.parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_bot_id_rejects_garbage() {
        assert!("not-a-uuid".parse::<BotId>().is_err());
        assert!("".parse::<ProjectId>().is_err());
    }

    #[test]
    fn test_new_bot_trims_name() {
        let draft = NewBot {
            name: "  alpha  ".to_string(),
            project_id: ProjectId::new(),
            description: None,
            config: None,
        };
        let draft = draft.validate().unwrap();
        assert_eq!(draft.name, "alpha");
    }

    #[test]
    fn test_new_bot_rejects_blank_name() {
        let draft = NewBot {
            name: "   ".to_string(),
            project_id: ProjectId::new(),
            description: None,
            config: None,
        };
        assert!(matches!(draft.validate(), Err(BotError::InvalidInput(_))));
    }

    #[test]
    fn test_update_rejects_long_name() {
        let update = BotUpdate {
            id: BotId::new(),
            name: "x".repeat(MAX_NAME_LEN + 1),
            project_id: ProjectId::new(),
            description: None,
            config: None,
        };
        assert!(matches!(update.validate(), Err(BotError::InvalidInput(_))));
    }

    #[test]
    fn test_config_must_be_object() {
        let draft = NewBot {
            name: "alpha".to_string(),
            project_id: ProjectId::new(),
            description: None,
            config: Some(json!([1, 2, 3])),
        };
        assert!(matches!(draft.validate(), Err(BotError::InvalidInput(_))));
    }

    #[test]
    fn test_new_bot_ignores_owner_and_id_keys() {
        let project = ProjectId::new();
        let body = json!({
            "id": BotId::new(),
            "owner": "mallory",
            "name": "alpha",
            "projectId": project,
        });
        let draft: NewBot = serde_json::from_value(body).unwrap();
        assert_eq!(draft.name, "alpha");
        assert_eq!(draft.project_id, project);
    }

    #[test]
    fn test_bot_serializes_camel_case_project() {
        let now = Utc::now();
        let bot = Bot {
            id: BotId::new(),
            name: "alpha".to_string(),
            owner: "owner-a".parse().unwrap(),
            project_id: ProjectId::new(),
            description: String::new(),
            config: empty_config(),
            created_at: now,
            updated_at: now,
        };
        let value = serde_json::to_value(&bot).unwrap();
        assert!(value.get("projectId").is_some());
        assert_eq!(value["owner"], "owner-a");
    }
}
