mod admission;
mod rate_limiter;

pub use admission::{decide, AdmissionDecision};
pub use rate_limiter::{RateLimiter, RateLimiterConfig};
