//! Middleware module
//!
//! Update-level concerns applied before the handler tree: logging and
//! per-user rate limiting.

pub mod logging;
pub mod rate_limit;

pub use logging::LoggingMiddleware;
pub use rate_limit::RateLimitMiddleware;
