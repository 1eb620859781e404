//! Bearer credentials for calendar requests.

mod cache;
mod source;
mod token;

pub use cache::{AccessToken, CredentialCache};
pub use source::{StaticTokenSource, TokenSource};
pub use token::{TokenInfo, TokenStorage};
