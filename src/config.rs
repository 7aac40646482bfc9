use std::env;
use std::time::Duration;

use crate::{GatewayError, Provider};

pub const DEFAULT_VERIFIER_TTL: Duration = Duration::from_secs(600);
pub const DEFAULT_CREDENTIALS_TTL: Duration = Duration::from_secs(3600);
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Cap for env-sourced durations. Expiry arithmetic in the cache would
/// overflow `Instant` far past this.
const MAX_DURATION_SECS: u64 = 60 * 60 * 24 * 365;

const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";
const DEFAULT_FRONTEND_URL: &str = "http://localhost:3000";

/// Registered OAuth app for one provider, plus optional endpoint overrides
/// so staging or stub servers can stand in for the real provider.
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub authorize_url: Option<String>,
    pub token_url: Option<String>,
    pub api_base_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub frontend_url: String,
    pub backend_url: String,
    pub airtable: ProviderSettings,
    pub hubspot: ProviderSettings,
    pub notion: ProviderSettings,
    pub verifier_ttl: Duration,
    pub credentials_ttl: Duration,
    pub http_timeout: Duration,
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self, GatewayError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the config from an arbitrary variable source. Tests feed a map
    /// here instead of mutating the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, GatewayError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let backend_url =
            lookup("BACKEND_URL").unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string());
        let frontend_url =
            lookup("FRONTEND_URL").unwrap_or_else(|| DEFAULT_FRONTEND_URL.to_string());

        let airtable = provider_settings(&lookup, Provider::Airtable, &backend_url)?;
        let hubspot = provider_settings(&lookup, Provider::HubSpot, &backend_url)?;
        let notion = provider_settings(&lookup, Provider::Notion, &backend_url)?;

        Ok(Self {
            frontend_url,
            backend_url,
            airtable,
            hubspot,
            notion,
            verifier_ttl: duration_var(&lookup, "VERIFIER_TTL_SECS", DEFAULT_VERIFIER_TTL)?,
            credentials_ttl: duration_var(
                &lookup,
                "CREDENTIALS_TTL_SECS",
                DEFAULT_CREDENTIALS_TTL,
            )?,
            http_timeout: duration_var(&lookup, "HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT)?,
        })
    }

    pub fn provider(&self, provider: Provider) -> &ProviderSettings {
        match provider {
            Provider::Airtable => &self.airtable,
            Provider::HubSpot => &self.hubspot,
            Provider::Notion => &self.notion,
        }
    }
}

fn provider_settings<F>(
    lookup: &F,
    provider: Provider,
    backend_url: &str,
) -> Result<ProviderSettings, GatewayError>
where
    F: Fn(&str) -> Option<String>,
{
    let prefix = provider.id().to_uppercase();
    let client_id = require(lookup, &format!("{prefix}_CLIENT_ID"))?;
    let client_secret = require(lookup, &format!("{prefix}_CLIENT_SECRET"))?;
    let redirect_uri = lookup(&format!("{prefix}_REDIRECT_URI"))
        .unwrap_or_else(|| format!("{backend_url}/integrations/{provider}/oauth2callback"));

    Ok(ProviderSettings {
        client_id,
        client_secret,
        redirect_uri,
        authorize_url: lookup(&format!("{prefix}_AUTHORIZE_URL")),
        token_url: lookup(&format!("{prefix}_TOKEN_URL")),
        api_base_url: lookup(&format!("{prefix}_API_BASE_URL")),
    })
}

fn require<F>(lookup: &F, name: &str) -> Result<String, GatewayError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(GatewayError::Configuration(format!("{name} is not set"))),
    }
}

fn duration_var<F>(lookup: &F, name: &str, default: Duration) -> Result<Duration, GatewayError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(raw) => {
            let secs: u64 = raw.parse().map_err(|_| {
                GatewayError::Configuration(format!(
                    "{name} must be a whole number of seconds, got {raw:?}"
                ))
            })?;
            if secs > MAX_DURATION_SECS {
                return Err(GatewayError::Configuration(format!(
                    "{name} must be at most {MAX_DURATION_SECS} seconds, got {secs}"
                )));
            }
            Ok(Duration::from_secs(secs))
        }
        None => Ok(default),
    }
}
