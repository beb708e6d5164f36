//! # Config Loader
//!
//! Loads a relay route from TOML or JSON and checks it before anything
//! connects to a broker.
//!
//! Rules enforced on top of field validation:
//! - broker URL uses `amqp://` or `amqps://`
//! - queue names are non-empty and at most 255 bytes
//! - at least one destination, no duplicates
//! - the source queue is never one of its own destinations
//!
//! # Example
//!
//! ```
//! use config_loader::{ConfigFormat, ConfigLoader};
//!
//! let route = ConfigLoader::load_from_str(
//!     "[route]\nsource = \"orders.in\"\ndestinations = [\"orders.audit\"]",
//!     ConfigFormat::Toml,
//! )?;
//! assert_eq!(route.route.destinations.len(), 1);
//!
//! // A queue cannot feed itself
//! let looped = ConfigLoader::load_from_str(
//!     "[route]\nsource = \"a\"\ndestinations = [\"a\"]",
//!     ConfigFormat::Toml,
//! );
//! assert!(looped.is_err());
//! # Ok::<(), contracts::ContractError>(())
//! ```

mod parser;
mod validator;

pub use contracts::RelayBlueprint;
pub use parser::ConfigFormat;

use contracts::ContractError;
use std::path::Path;

/// Configuration loader
///
/// Provides static methods to load configuration from files or strings.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from file path
    ///
    /// Automatically detects format from file extension (.toml / .json).
    ///
    /// # Errors
    /// - File read failure
    /// - Unsupported format
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_path(path: &Path) -> Result<RelayBlueprint, ContractError> {
        let format = Self::detect_format(path)?;
        let content = Self::read_file(path)?;
        Self::load_from_str(&content, format)
    }

    /// Load configuration from string
    ///
    /// # Errors
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<RelayBlueprint, ContractError> {
        Self::parse_and_validate(content, format)
    }

    /// Load from `path` when given, otherwise validate and return the defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<RelayBlueprint, ContractError> {
        match path {
            Some(path) => Self::load_from_path(path),
            None => {
                let blueprint = RelayBlueprint::default();
                Self::validate(&blueprint)?;
                Ok(blueprint)
            }
        }
    }

    /// Validate an already built blueprint (e.g. after CLI overrides)
    pub fn validate(blueprint: &RelayBlueprint) -> Result<(), ContractError> {
        validator::validate(blueprint)
    }

    /// Serialize RelayBlueprint to TOML string
    pub fn to_toml(blueprint: &RelayBlueprint) -> Result<String, ContractError> {
        toml::to_string_pretty(blueprint)
            .map_err(|e| ContractError::config_parse(format!("TOML serialize error: {e}")))
    }

    /// Serialize RelayBlueprint to JSON string
    pub fn to_json(blueprint: &RelayBlueprint) -> Result<String, ContractError> {
        serde_json::to_string_pretty(blueprint)
            .map_err(|e| ContractError::config_parse(format!("JSON serialize error: {e}")))
    }
}

impl ConfigLoader {
    /// Infer configuration format from file extension
    fn detect_format(path: &Path) -> Result<ConfigFormat, ContractError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            ContractError::config_parse("cannot determine file format from extension")
        })?;

        ConfigFormat::from_extension(ext).ok_or_else(|| {
            ContractError::config_parse(format!("unsupported config format: .{ext}"))
        })
    }

    /// Read configuration file content
    fn read_file(path: &Path) -> Result<String, ContractError> {
        Ok(std::fs::read_to_string(path)?)
    }

    /// Parse and validate configuration content
    fn parse_and_validate(
        content: &str,
        format: ConfigFormat,
    ) -> Result<RelayBlueprint, ContractError> {
        let blueprint = parser::parse(content, format)?;
        validator::validate(&blueprint)?;
        Ok(blueprint)
    }
}
