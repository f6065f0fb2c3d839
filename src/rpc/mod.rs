mod rate_limit;
mod rotator;

pub use rate_limit::RateLimitedCaller;
pub use rotator::EndpointRotator;
