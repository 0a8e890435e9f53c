//! # Runtime Module
//!
//! One cooperative loop per role.
//!
//! - [`glove`]: samples sensors and transmits frames
//! - [`hand`]: receives frames and drives the actuators

pub mod glove;
pub mod hand;

use std::fmt;
use std::str::FromStr;

use crate::config::Config;
use crate::error::{GloveLinkError, Result};

/// Which end of the link this process plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Sensor glove, transmits frames
    Glove,
    /// Robotic hand, receives frames
    Hand,
}

impl FromStr for Role {
    type Err = GloveLinkError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "glove" => Ok(Role::Glove),
            "hand" => Ok(Role::Hand),
            other => Err(GloveLinkError::Link(format!(
                "unknown role '{}', expected 'glove' or 'hand'",
                other
            ))),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Glove => f.write_str("glove"),
            Role::Hand => f.write_str("hand"),
        }
    }
}

/// Run the given role until shutdown
pub async fn run(role: Role, config: Config) -> Result<()> {
    match role {
        Role::Glove => glove::run(config).await,
        Role::Hand => hand::run(config).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_role() {
        assert_eq!("glove".parse::<Role>().unwrap(), Role::Glove);
        assert_eq!("HAND".parse::<Role>().unwrap(), Role::Hand);
        assert!("wrist".parse::<Role>().is_err());
    }

    #[test]
    fn test_role_display() {
        assert_eq!(Role::Glove.to_string(), "glove");
        assert_eq!(Role::Hand.to_string(), "hand");
    }
}
