//! Public types for the Muninn API.

mod profile;
mod request;
mod result;

pub use profile::{LatencyClass, ModelProfile, ModelProfiles};
pub use request::{DEFAULT_GROUP, GatewayRequest};
pub use result::NormalizedResult;
