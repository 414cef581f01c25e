pub mod app;
pub mod config;
pub mod error;
pub mod services;
pub mod startup;

pub use app::AppState;
pub use config::AppConfig;
pub use error::{AppError, Result};
pub use services::{AnalyticsService, AppServices, IngestService};
pub use startup::{AppPaths, ensure_app_data_dir};
