//! Domo platform access: the API seam, its HTTP client and the token cache.

mod api;
mod client;
mod token;

pub use api::{DomoApi, TokenSet, UpstreamFailure};
pub use client::DomoClient;
pub use token::TokenManager;
