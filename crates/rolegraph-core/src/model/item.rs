use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// The two kinds of authorization item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    Role,
    Permission,
}

impl ItemType {
    /// Value stored in the `type` column.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Role => "role",
            Self::Permission => "permission",
        }
    }
}

/// A role or permission node in the authorization graph.
///
/// Items are keyed by `name` everywhere; timestamps are seconds since the
/// Unix epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub name: String,
    #[serde(rename = "type")]
    pub item_type: ItemType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Item {
    /// Create an item stamped with the current time.
    #[must_use]
    pub fn new(item_type: ItemType, name: impl Into<String>) -> Self {
        let now = Utc::now().timestamp();
        Self {
            name: name.into(),
            item_type,
            description: None,
            rule_name: None,
            data: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[must_use]
    pub fn role(name: impl Into<String>) -> Self {
        Self::new(ItemType::Role, name)
    }

    #[must_use]
    pub fn permission(name: impl Into<String>) -> Self {
        Self::new(ItemType::Permission, name)
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn with_rule_name(mut self, rule_name: impl Into<String>) -> Self {
        self.rule_name = Some(rule_name.into());
        self
    }

    #[must_use]
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    #[must_use]
    pub const fn with_created_at(mut self, created_at: i64) -> Self {
        self.created_at = created_at;
        self
    }

    #[must_use]
    pub const fn with_updated_at(mut self, updated_at: i64) -> Self {
        self.updated_at = updated_at;
        self
    }

    #[must_use]
    pub fn is_role(&self) -> bool {
        self.item_type == ItemType::Role
    }

    #[must_use]
    pub fn is_permission(&self) -> bool {
        self.item_type == ItemType::Permission
    }
}

/// Error returned when parsing an item type from text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseItemTypeError {
    pub got: String,
}

impl fmt::Display for ParseItemTypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid item type: '{}'", self.got)
    }
}

impl std::error::Error for ParseItemTypeError {}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemType {
    type Err = ParseItemTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "role" => Ok(Self::Role),
            "permission" => Ok(Self::Permission),
            _ => Err(ParseItemTypeError { got: s.to_string() }),
        }
    }
}
