pub mod rate_limit;
pub mod validation;

pub use rate_limit::{LimitKind, LimitPolicy, RateLimitConfig, RateLimiter};
pub use validation::{InputType, InputValidator, ValidationResult};
