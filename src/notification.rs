//! Per-user notification preferences attached to projects and groups.
//!
//! Decides who would hear about a pipeline status change; delivering the
//! message is left to whatever consumes [`crate::events`].

use std::fmt;
use std::str::FromStr;

use log::debug;
use serde::{de, Deserialize, Deserializer, Serialize};

use crate::error::{CIStatusError, Result};

pub type UserId = u64;

/// Accepted on input as a lowercase name or as the stored numeric code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Disabled,
    Participating,
    Watch,
    Global,
    Mention,
}

impl NotificationLevel {
    /// Stable numeric code used when the level is stored.
    pub fn code(self) -> u8 {
        match self {
            NotificationLevel::Disabled => 0,
            NotificationLevel::Participating => 1,
            NotificationLevel::Watch => 2,
            NotificationLevel::Global => 3,
            NotificationLevel::Mention => 4,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(NotificationLevel::Disabled),
            1 => Some(NotificationLevel::Participating),
            2 => Some(NotificationLevel::Watch),
            3 => Some(NotificationLevel::Global),
            4 => Some(NotificationLevel::Mention),
            _ => None,
        }
    }
}

impl FromStr for NotificationLevel {
    type Err = CIStatusError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "disabled" => Ok(NotificationLevel::Disabled),
            "participating" => Ok(NotificationLevel::Participating),
            "watch" => Ok(NotificationLevel::Watch),
            "global" => Ok(NotificationLevel::Global),
            "mention" => Ok(NotificationLevel::Mention),
            _ => Err(CIStatusError::Validation(format!(
                "unknown notification level: {s}"
            ))),
        }
    }
}

impl<'de> Deserialize<'de> for NotificationLevel {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Stored {
            Code(u8),
            Name(String),
        }

        match Stored::deserialize(deserializer)? {
            Stored::Code(code) => Self::from_code(code).ok_or_else(|| {
                de::Error::custom(format!("unknown notification level code: {code}"))
            }),
            Stored::Name(name) => name.parse().map_err(de::Error::custom),
        }
    }
}

/// The kinds of entity a notification setting can be attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "lowercase")]
pub enum NotificationSource {
    Project(u64),
    Group(u64),
}

impl fmt::Display for NotificationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationSource::Project(id) => write!(f, "project {id}"),
            NotificationSource::Group(id) => write!(f, "group {id}"),
        }
    }
}

/// Implemented by anything users can subscribe to.
pub trait HasNotificationSettings {
    fn notification_source(&self) -> NotificationSource;
}

impl HasNotificationSettings for crate::pipeline::Pipeline {
    fn notification_source(&self) -> NotificationSource {
        NotificationSource::Project(self.project_id())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationSetting {
    pub user_id: UserId,
    pub source: NotificationSource,
    pub level: NotificationLevel,
}

/// In-memory registry, unique per (user, source).
#[derive(Debug)]
pub struct NotificationSettings {
    default_level: NotificationLevel,
    settings: Vec<NotificationSetting>,
}

impl NotificationSettings {
    /// `default_level` is assigned to settings created on demand.
    pub fn new(default_level: NotificationLevel) -> Self {
        Self {
            default_level,
            settings: Vec::new(),
        }
    }

    /// Adds a setting.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the user already has a setting for the
    /// same source.
    pub fn insert(&mut self, setting: NotificationSetting) -> Result<()> {
        if self.get(setting.user_id, setting.source).is_some() {
            return Err(CIStatusError::Validation(format!(
                "user {} already exists in {}",
                setting.user_id, setting.source
            )));
        }
        self.settings.push(setting);
        Ok(())
    }

    pub fn get(&self, user_id: UserId, source: NotificationSource) -> Option<&NotificationSetting> {
        self.settings
            .iter()
            .find(|s| s.user_id == user_id && s.source == source)
    }

    /// Returns the user's setting for `owner`, creating it at the default
    /// level when missing.
    pub fn find_or_create_for(
        &mut self,
        user_id: UserId,
        owner: &impl HasNotificationSettings,
    ) -> &NotificationSetting {
        let source = owner.notification_source();
        let index = match self
            .settings
            .iter()
            .position(|s| s.user_id == user_id && s.source == source)
        {
            Some(index) => index,
            None => {
                debug!(
                    "Creating {:?} notification setting for user {user_id} in {source}",
                    self.default_level
                );
                self.settings.push(NotificationSetting {
                    user_id,
                    source,
                    level: self.default_level,
                });
                self.settings.len() - 1
            }
        };
        &self.settings[index]
    }

    pub fn for_projects(&self) -> impl Iterator<Item = &NotificationSetting> {
        self.settings
            .iter()
            .filter(|s| matches!(s.source, NotificationSource::Project(_)))
    }

    pub fn for_groups(&self) -> impl Iterator<Item = &NotificationSetting> {
        self.settings
            .iter()
            .filter(|s| matches!(s.source, NotificationSource::Group(_)))
    }

    /// Users subscribed to `owner` whose level is not disabled, sorted by id.
    pub fn recipients(&self, owner: &impl HasNotificationSettings) -> Vec<UserId> {
        let source = owner.notification_source();
        let mut users: Vec<UserId> = self
            .settings
            .iter()
            .filter(|s| s.source == source && s.level != NotificationLevel::Disabled)
            .map(|s| s.user_id)
            .collect();
        users.sort_unstable();
        users
    }
}
