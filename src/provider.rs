use std::fmt;
use std::str::FromStr;

use crate::GatewayError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenRequestFormat {
    Json,
    Form,
}

/// How the token endpoint expects client credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenAuthScheme {
    /// `client_id:client_secret` in an `Authorization: Basic` header.
    Basic,
    /// `client_id` and `client_secret` as body fields.
    SecretInBody,
}

/// Everything that varies between providers during the OAuth dance.
#[derive(Debug)]
pub struct ProviderProfile {
    pub authorize_url: &'static str,
    pub token_url: &'static str,
    pub api_base_url: &'static str,
    pub scope: Option<&'static str>,
    pub send_response_type: bool,
    pub authorize_params: &'static [(&'static str, &'static str)],
    pub requires_pkce: bool,
    pub token_auth: TokenAuthScheme,
    pub token_format: TokenRequestFormat,
    /// Some providers want `client_id` in the body even when it is already
    /// carried by the Basic header.
    pub client_id_in_token_body: bool,
}

static AIRTABLE: ProviderProfile = ProviderProfile {
    authorize_url: "https://airtable.com/oauth2/v1/authorize",
    token_url: "https://airtable.com/oauth2/v1/token",
    api_base_url: "https://api.airtable.com",
    scope: Some("data.records:read data.records:write schema.bases:read"),
    send_response_type: true,
    authorize_params: &[],
    requires_pkce: true,
    token_auth: TokenAuthScheme::Basic,
    token_format: TokenRequestFormat::Form,
    client_id_in_token_body: true,
};

static HUBSPOT: ProviderProfile = ProviderProfile {
    authorize_url: "https://app.hubspot.com/oauth/authorize",
    token_url: "https://api.hubapi.com/oauth/v1/token",
    api_base_url: "https://api.hubapi.com",
    scope: Some(
        "crm.objects.contacts.read crm.objects.companies.read crm.objects.deals.read \
         crm.schemas.contacts.read crm.schemas.companies.read crm.schemas.deals.read",
    ),
    send_response_type: false,
    authorize_params: &[],
    requires_pkce: false,
    token_auth: TokenAuthScheme::SecretInBody,
    token_format: TokenRequestFormat::Form,
    client_id_in_token_body: true,
};

static NOTION: ProviderProfile = ProviderProfile {
    authorize_url: "https://api.notion.com/v1/oauth/authorize",
    token_url: "https://api.notion.com/v1/oauth/token",
    api_base_url: "https://api.notion.com",
    scope: None,
    send_response_type: true,
    authorize_params: &[("owner", "user")],
    requires_pkce: false,
    token_auth: TokenAuthScheme::Basic,
    token_format: TokenRequestFormat::Json,
    client_id_in_token_body: false,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    Airtable,
    HubSpot,
    Notion,
}

impl Provider {
    pub const ALL: [Provider; 3] = [Provider::Airtable, Provider::HubSpot, Provider::Notion];

    /// Lowercase identifier used in routes, cache keys, and env var prefixes.
    pub fn id(self) -> &'static str {
        match self {
            Provider::Airtable => "airtable",
            Provider::HubSpot => "hubspot",
            Provider::Notion => "notion",
        }
    }

    pub fn profile(self) -> &'static ProviderProfile {
        match self {
            Provider::Airtable => &AIRTABLE,
            Provider::HubSpot => &HUBSPOT,
            Provider::Notion => &NOTION,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Provider {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "airtable" => Ok(Provider::Airtable),
            "hubspot" => Ok(Provider::HubSpot),
            "notion" => Ok(Provider::Notion),
            other => Err(GatewayError::UnknownProvider(other.to_string())),
        }
    }
}
