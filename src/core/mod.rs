//! Core functionality: configuration, errors, logging, subscription gate.

pub mod config;
pub mod error;
pub mod logging;
pub mod subscription;

pub use error::{AppError, AppResult};
pub use logging::{init_logger, log_startup_configuration};
pub use subscription::{is_subscribed, join_channel_keyboard};
