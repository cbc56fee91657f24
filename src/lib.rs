pub mod api;
pub mod chat;
pub mod config;
pub mod error;
pub mod models;
pub mod service;
pub mod storage;
pub mod telemetry;

pub use config::AppConfig;
pub use error::{FiscalError, Result};
pub use service::QuestionGateway;
