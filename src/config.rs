//! Generation settings, loadable from a YAML file.
//!
//! ```yaml
//! locations:
//!   - src/controllers
//!   - crate::api
//! outputName: accounts-api
//! tagNaming:
//!   strategy: path-segments
//! operationNaming:
//!   overrides:
//!     list_accounts: listAccounts
//! defaultProduceConsumeGuessing: true
//! defaultStatus:
//!   DELETE: 200
//! info:
//!   title: Accounts
//!   version: 2.0.0
//! servers:
//!   - url: https://api.example.com
//! ```

use crate::error::{Error, Result};
use crate::extractor::{BuilderOptions, StatusTable};
use crate::naming::NamingConfig;
use crate::openapi_builder::{Info, NamingOptions, Server};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const DEFAULT_OUTPUT_NAME: &str = "openapi";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ApiConfiguration {
    /// Files, directories (relative to the project root) or module paths.
    pub locations: Vec<String>,
    /// Output file stem.
    pub output_name: String,
    pub tag_naming: NamingConfig,
    pub operation_naming: NamingConfig,
    /// Only meaningful to build tool integrations; read and ignored here.
    pub attach_artifact: bool,
    pub default_produce_consume_guessing: bool,
    pub default_status: StatusTable,
    pub info: Info,
    /// Emitted as the document's `servers` section when not empty.
    pub servers: Vec<Server>,
}

impl Default for ApiConfiguration {
    fn default() -> Self {
        Self {
            locations: Vec::new(),
            output_name: DEFAULT_OUTPUT_NAME.to_string(),
            tag_naming: NamingConfig::default(),
            operation_naming: NamingConfig::default(),
            attach_artifact: false,
            default_produce_consume_guessing: false,
            default_status: StatusTable::default(),
            info: Info::default(),
            servers: Vec::new(),
        }
    }
}

impl ApiConfiguration {
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading configuration from {}", path.display());
        let content = fs::read_to_string(path).map_err(|e| Error::Unreadable {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).map_err(|e| Error::ConfigError(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.locations.is_empty() {
            return Err(Error::NoLocations);
        }
        if let Some(location) = self.locations.iter().find(|l| l.trim().is_empty()) {
            return Err(Error::InvalidLocation(location.clone()));
        }
        if self.output_name.trim().is_empty() {
            return Err(Error::ConfigError("outputName must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn naming(&self) -> NamingOptions {
        NamingOptions {
            tag: self.tag_naming.clone(),
            operation: self.operation_naming.clone(),
        }
    }

    pub fn builder_options(&self) -> BuilderOptions {
        BuilderOptions {
            guess_formats: self.default_produce_consume_guessing,
            statuses: self.default_status.clone(),
        }
    }
}
