pub mod auth;
pub mod throttle;

pub use auth::{authenticate, RequestIdentity};
pub use throttle::throttle;
