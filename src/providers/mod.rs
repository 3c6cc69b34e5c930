//! Provider adapters: the seam between the gateway and AI vendors.

mod cancel;
mod registry;
mod traits;

pub use cancel::{UntilCancelled, until_cancelled};
pub use registry::{ProviderEntry, ProviderRegistry, ProviderSettings};
pub use traits::{FragmentStream, ProviderAdapter};
