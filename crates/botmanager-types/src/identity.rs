//! Caller identity types.
//!
//! The identity provider resolves a [`Principal`] (raw owner string plus
//! scopes). The core turns the raw owner into an [`OwnerId`] through a
//! checked parse before any store filter is built from it.

use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

use crate::error::IdentityError;

/// Maximum length of an owner identifier.
pub const MAX_OWNER_LEN: usize = 128;

/// Validated identifier of the principal owning a bot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OwnerId(String);

impl OwnerId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for OwnerId {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(IdentityError::Malformed("owner id is empty".to_string()));
        }
        if s.len() > MAX_OWNER_LEN {
            return Err(IdentityError::Malformed(format!(
                "owner id exceeds {MAX_OWNER_LEN} bytes"
            )));
        }
        if let Some(c) = s
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':' | '@')))
        {
            return Err(IdentityError::Malformed(format!(
                "owner id contains invalid character '{c}'"
            )));
        }
        Ok(Self(s.to_string()))
    }
}

impl TryFrom<String> for OwnerId {
    type Error = IdentityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<OwnerId> for String {
    fn from(value: OwnerId) -> Self {
        value.0
    }
}

/// Permission scope granted to an API key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Read,
    Write,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Read => write!(f, "read"),
            Scope::Write => write!(f, "write"),
        }
    }
}

impl FromStr for Scope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "read" => Ok(Scope::Read),
            "write" => Ok(Scope::Write),
            other => Err(format!("invalid scope: '{other}'")),
        }
    }
}

/// Identity resolved by the authentication layer for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    /// Owner identifier as stored by the identity provider. Unchecked.
    pub owner: String,
    pub scopes: Vec<Scope>,
}

impl Principal {
    pub fn new(owner: impl Into<String>, scopes: Vec<Scope>) -> Self {
        Self {
            owner: owner.into(),
            scopes,
        }
    }

    pub fn allows(&self, scope: Scope) -> bool {
        self.scopes.contains(&scope)
    }
}

/// Parse a comma-separated scope list as stored in the `api_keys` table.
pub fn parse_scopes(raw: &str) -> Result<Vec<Scope>, String> {
    let mut scopes = Vec::new();
    for part in raw.split(',').filter(|p| !p.trim().is_empty()) {
        let scope: Scope = part.parse()?;
        if !scopes.contains(&scope) {
            scopes.push(scope);
        }
    }
    Ok(scopes)
}

/// Inverse of [`parse_scopes`].
pub fn format_scopes(scopes: &[Scope]) -> String {
    scopes
        .iter()
        .map(Scope::to_string)
        .collect::<Vec<_>>()
        .join(",")
}
