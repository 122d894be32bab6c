//! Configuration module.
//!
//! Provides `AppConfig` (top-level settings), sub-configs for the backend,
//! voice capture and session policies, `AppPaths` for the platform config
//! directory, and TOML persistence via `AppConfig::load` / `AppConfig::save`.

pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{
    AppConfig, AudioConfig, BackendConfig, ResetPolicy, SessionConfig, API_URL_ENV,
};
