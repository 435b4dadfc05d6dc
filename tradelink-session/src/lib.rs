//! Tradelink Session - Authenticated session core for marketplace clients
//!
//! This crate provides everything a client needs to talk to the marketplace
//! backend on behalf of a signed-in user:
//!
//! - A request executor with retry and response classification
//! - Token storage (in memory or on disk)
//! - The role authorization policy guarding seller and wholesaler pages
//! - The session manager driving authentication, refresh and redirects
//!
//! ## Architecture
//!
//! The HTTP transport and the navigator are traits so the session manager can
//! run against `reqwest` in production and scripted collaborators in tests.

pub mod executor;
pub mod manager;
pub mod navigator;
pub mod normalize;
pub mod policy;
pub mod token_store;
pub mod transport;

#[cfg(test)]
mod test_support;

pub use executor::{RequestExecutor, RequestOptions, INVALID_JSON_MESSAGE};
pub use manager::{SessionManager, SessionSnapshot};
pub use navigator::{Navigator, NoopNavigator, TracingNavigator};
pub use normalize::{
    extract_token_pair, extract_user_id, normalize_role_status, RoleStatusInfo, TokenPair,
};
pub use policy::RoleAuthorizationPolicy;
pub use token_store::{FileTokenStore, MemoryTokenStore, TokenStore};
pub use transport::{
    HttpRequest, HttpResponse, HttpTransport, MultipartBody, MultipartPart, ReqwestTransport,
    RequestBody,
};
pub use reqwest::Method;
