//! REST access: rate limiter, HTTP seam and the typed client

pub mod client;
pub mod http;
pub mod rate_limiter;

pub use client::RestClient;
pub use http::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
pub use rate_limiter::RateLimiter;
