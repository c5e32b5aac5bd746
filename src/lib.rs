//! Query and aggregation core for French election results: participation,
//! political tendencies and the second-round qualification threshold.

pub mod analytics;
pub mod config;
pub mod database;

pub use analytics::{Dashboard, ElectionType, Round};
pub use config::AppConfig;
pub use database::{DatabaseError, ResultsDatabase};
