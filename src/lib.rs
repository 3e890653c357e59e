//! Fashion Studio
//!
//! Web studio that sends an uploaded photo and a fashion scene to a
//! generation webhook, normalizes whatever the webhook answers into a list of
//! displayable images, and serves them back to a single-page UI.

pub mod api;
pub mod config;
pub mod data_uri;
pub mod download;
pub mod error;
pub mod generation;
pub mod http_body;
pub mod normalizer;
pub mod styles;
pub mod telemetry;
pub mod ui;

pub use api::{router, AppState};
pub use config::Settings;
