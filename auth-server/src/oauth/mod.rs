//! OAuth 2.0 core: grant flows, PKCE and bearer token validation

pub mod bearer;
mod error;
pub mod pkce;
mod server;

pub use bearer::{BearerOutcome, BearerValidator};
pub use error::GrantError;
pub use server::{expires_in, AuthorizeRequest, CodeExchange, OAuthServer};
