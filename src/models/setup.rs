//! Bot configuration request sent by the setup flow.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Where alerts are delivered.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryTarget {
    #[default]
    Personal,
    Group,
    Channel,
}

impl DeliveryTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryTarget::Personal => "personal",
            DeliveryTarget::Group => "group",
            DeliveryTarget::Channel => "channel",
        }
    }

    /// Human label shown in selectors and dashboards.
    pub fn label(&self) -> &'static str {
        match self {
            DeliveryTarget::Personal => "Personal Messages",
            DeliveryTarget::Group => "Group Chat",
            DeliveryTarget::Channel => "Channel",
        }
    }
}

impl fmt::Display for DeliveryTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeliveryTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "personal" => Ok(DeliveryTarget::Personal),
            "group" => Ok(DeliveryTarget::Group),
            "channel" => Ok(DeliveryTarget::Channel),
            other => Err(format!(
                "unknown delivery target '{}' (expected personal, group or channel)",
                other
            )),
        }
    }
}

/// Request body for `POST /setup`. Immutable once built.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct BotConfigRequest {
    #[serde(rename = "bot_token")]
    credential: String,
    #[serde(rename = "alert_type")]
    delivery_target: DeliveryTarget,
}

impl BotConfigRequest {
    pub fn new(credential: impl Into<String>, delivery_target: DeliveryTarget) -> Self {
        Self {
            credential: credential.into(),
            delivery_target,
        }
    }

    pub fn credential(&self) -> &str {
        &self.credential
    }

    pub fn delivery_target(&self) -> DeliveryTarget {
        self.delivery_target
    }
}
