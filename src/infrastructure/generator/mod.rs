//! Answer-generation adapters.

pub mod http;
pub mod retry;

pub use http::HttpGenerator;
pub use retry::RetryPolicy;
