pub mod candidates;
pub mod policy;
pub mod resolver;

pub use policy::RetryPolicy;
pub use resolver::{resolve_catalog, AttemptFailure, ResolveError, ResolveStatus, ResolvedEndpoint};
