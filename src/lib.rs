//! OAuth2 gateway for third-party SaaS integrations.
//!
//! Handles the authorization-code flow (with PKCE where the provider
//! requires it) for Airtable, HubSpot and Notion, caches the resulting
//! credentials under the flow's state token, and normalizes each
//! provider's records into a single item shape for the frontend.

mod cache;
mod config;
mod credentials;
mod error;
mod items;
mod oauth;
mod pkce;
mod provider;
mod server;
mod state;

pub use cache::{MemoryCache, TokenCache, credentials_key, spawn_sweeper, verifier_key};
pub use config::{GatewayConfig, ProviderSettings};
pub use credentials::Credential;
pub use error::GatewayError;
pub use items::IntegrationItem;
pub use oauth::{AuthorizationTicket, Gateway};
pub use pkce::PkcePair;
pub use provider::{Provider, ProviderProfile, TokenAuthScheme, TokenRequestFormat};
pub use server::{router, serve};
