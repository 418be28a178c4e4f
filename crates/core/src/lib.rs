pub mod catalog;
pub mod config;
pub mod error;
pub mod locale;
pub mod telemetry;

pub use config::Settings;
pub use error::AppError;
pub use locale::{Language, Preferences};
