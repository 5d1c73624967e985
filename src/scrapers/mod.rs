pub mod nspd;
pub mod throttle;
pub mod torgi;
pub mod traits;
pub mod types;

pub use nspd::NspdClient;
pub use throttle::RateLimiter;
pub use torgi::TorgiClient;
