//! Configuration module for the fitplan sync tool.
//!
//! This module handles all configuration-related functionality:
//! - Parsing and deserializing `fitplan.yaml`
//! - Environment and `.env` overrides
//! - Validation of configuration values

mod parser;
mod settings;
mod validator;

pub use parser::{
    find_config_file, ConfigParser, API_KEY_VAR, BACKEND_URL_VAR, DEFAULT_CONFIG_FILES,
    STATE_PATH_VAR,
};
pub use settings::{
    BackendConfig, GuardrailsConfig, StateConfig, SyncConfig, SyncOptions, CONFIG_TEMPLATE,
    DEFAULT_STATE_DIR,
};
pub use validator::{ConfigValidator, ConfigWarnings};
