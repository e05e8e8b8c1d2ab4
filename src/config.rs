//! Engine configuration
//!
//! Every field has a default, so an empty TOML document is a valid config:
//!
//! ```toml
//! request_excluded_actions = ["auth", "allocate"]
//! forbidden_threshold = 2
//! manage_primary_action = "read"
//! request_primary_action = "read"
//! app_default_action = "read"
//! default_position = "prefix"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants::{FORBIDDEN_PERMISSION_THRESHOLD, REQUEST_EXCLUDED_ACTIONS};
use crate::error::{GrantError, Result};
use crate::store::Position;
use crate::subject::Action;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Actions a requester can neither see nor stage
    pub request_excluded_actions: Vec<Action>,
    /// Permission count at which an Origin subject is locked during a request
    pub forbidden_threshold: usize,
    pub manage_primary_action: Action,
    pub request_primary_action: Action,
    /// Default action for application-type subjects, in either workflow
    pub app_default_action: Action,
    pub default_position: Position,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            request_excluded_actions: REQUEST_EXCLUDED_ACTIONS.iter().map(|a| Action::new(a)).collect(),
            forbidden_threshold: FORBIDDEN_PERMISSION_THRESHOLD,
            manage_primary_action: Action::Read,
            request_primary_action: Action::Read,
            app_default_action: Action::Read,
            default_position: Position::Prefix,
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(s).map_err(|e| GrantError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        if self.forbidden_threshold == 0 {
            return Err(GrantError::Config("forbidden_threshold must be at least 1".into()));
        }
        for (name, action) in [
            ("request_primary_action", &self.request_primary_action),
            ("app_default_action", &self.app_default_action),
        ] {
            if self.request_excluded_actions.contains(action) {
                return Err(GrantError::Config(format!(
                    "{} '{}' is excluded from the request workflow",
                    name, action
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        assert_eq!(EngineConfig::from_toml_str("").unwrap(), EngineConfig::default());
    }

    #[test]
    fn overrides_are_applied() {
        let c = EngineConfig::from_toml_str(
            "forbidden_threshold = 3\nrequest_excluded_actions = [\"auth\", \"export\"]\ndefault_position = \"suffix\"\n",
        )
        .unwrap();
        assert_eq!(c.forbidden_threshold, 3);
        assert_eq!(c.request_excluded_actions, vec![Action::Auth, Action::Custom("export".into())]);
        assert_eq!(c.default_position, Position::Suffix);
        assert_eq!(c.manage_primary_action, Action::Read);
    }

    #[test]
    fn rejects_zero_threshold() {
        assert!(matches!(
            EngineConfig::from_toml_str("forbidden_threshold = 0"),
            Err(GrantError::Config(_))
        ));
    }

    #[test]
    fn rejects_excluded_primary_action() {
        assert!(EngineConfig::from_toml_str("request_primary_action = \"auth\"").is_err());
    }

    #[test]
    fn rejects_malformed_toml() {
        assert!(matches!(EngineConfig::from_toml_str("forbidden_threshold = ["), Err(GrantError::Config(_))));
    }
}
