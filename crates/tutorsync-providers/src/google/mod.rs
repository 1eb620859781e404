//! Google Calendar backend.
//!
//! [`GoogleCalendar`] talks to the v3 REST API with a bearer token from a
//! [`CredentialCache`](crate::auth::CredentialCache). The token comes either
//! from the host as a fixed string ([`StaticTokenSource`](crate::auth::StaticTokenSource))
//! or from a stored refresh token ([`RefreshTokenSource`]).

mod client;
mod config;
mod oauth;

pub use client::GoogleCalendar;
pub use config::{GOOGLE_API_BASE, GOOGLE_TOKEN_URL, GoogleConfig, OAuthCredentials};
pub use oauth::RefreshTokenSource;
