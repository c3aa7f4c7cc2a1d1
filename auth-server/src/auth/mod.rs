//! Per-request identity: principal resolution and the authorization gate

mod middleware;
mod principal;

pub use middleware::{resolve_principal, PrincipalResolver};
pub use principal::{AuthError, Facet, Principal};

/// Resource owner authenticated by the sign-in layer in front of the authorize endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceOwner(pub String);
