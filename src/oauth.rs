use std::collections::HashMap;
use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use reqwest::{Client, header};
use serde::Serialize;
use tracing::{debug, info, warn};
use url::Url;

use crate::cache::{TokenCache, credentials_key, verifier_key};
use crate::items::{self, IntegrationItem};
use crate::pkce::{CODE_CHALLENGE_METHOD, PkcePair};
use crate::provider::{TokenAuthScheme, TokenRequestFormat};
use crate::{Credential, GatewayConfig, GatewayError, Provider, state};

/// What the frontend needs to hand the user off to a provider.
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationTicket {
    pub auth_url: String,
    pub state: String,
}

/// The flow engine. Owns the shared HTTP client, the credential cache, and
/// the per-provider settings; one instance serves every request.
#[derive(Clone)]
pub struct Gateway {
    config: Arc<GatewayConfig>,
    cache: Arc<dyn TokenCache>,
    http: Client,
}

impl Gateway {
    pub fn new(config: GatewayConfig, cache: Arc<dyn TokenCache>) -> Result<Self, GatewayError> {
        let http = Client::builder().timeout(config.http_timeout).build()?;
        Ok(Self {
            config: Arc::new(config),
            cache,
            http,
        })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Mints a fresh state token (and PKCE pair where the provider requires
    /// one) and assembles the authorization URL. The verifier is cached
    /// under the state before the URL is handed out, so the eventual
    /// callback can always find it within the TTL window.
    pub async fn begin_authorization(
        &self,
        provider: Provider,
    ) -> Result<AuthorizationTicket, GatewayError> {
        let profile = provider.profile();
        let settings = self.config.provider(provider);
        let state = state::generate()?;

        let mut params: Vec<(String, String)> = Vec::new();
        params.push(("client_id".to_string(), settings.client_id.clone()));
        params.push(("redirect_uri".to_string(), settings.redirect_uri.clone()));
        if profile.send_response_type {
            params.push(("response_type".to_string(), "code".to_string()));
        }
        if let Some(scope) = profile.scope {
            params.push(("scope".to_string(), scope.to_string()));
        }
        for (key, value) in profile.authorize_params {
            params.push(((*key).to_string(), (*value).to_string()));
        }
        params.push(("state".to_string(), state.clone()));

        if profile.requires_pkce {
            let pkce = PkcePair::generate()?;
            self.cache
                .put(
                    verifier_key(provider, &state),
                    pkce.code_verifier,
                    self.config.verifier_ttl,
                )
                .await;
            params.push(("code_challenge".to_string(), pkce.code_challenge));
            params.push((
                "code_challenge_method".to_string(),
                CODE_CHALLENGE_METHOD.to_string(),
            ));
        }

        let authorize_url = settings
            .authorize_url
            .as_deref()
            .unwrap_or(profile.authorize_url);
        let mut url = Url::parse(authorize_url)?;
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &params {
                pairs.append_pair(key, value);
            }
        }

        debug!(%provider, %state, "built authorization url");

        Ok(AuthorizationTicket {
            auth_url: url.to_string(),
            state,
        })
    }

    /// Exchanges an authorization code for tokens and caches the result
    /// under the state. For PKCE providers the cached verifier must still
    /// exist; it is deleted only after a successful exchange, so a rejected
    /// code can be retried within the verifier TTL while a consumed state
    /// cannot be replayed.
    pub async fn complete_authorization(
        &self,
        provider: Provider,
        code: &str,
        state: &str,
    ) -> Result<Credential, GatewayError> {
        let profile = provider.profile();
        let settings = self.config.provider(provider);

        let code_verifier = if profile.requires_pkce {
            match self.cache.get(&verifier_key(provider, state)).await {
                Some(verifier) => Some(verifier),
                None => return Err(GatewayError::VerifierNotFound),
            }
        } else {
            None
        };

        let mut payload = HashMap::new();
        payload.insert("grant_type".to_string(), "authorization_code".to_string());
        payload.insert("code".to_string(), code.to_string());
        payload.insert("redirect_uri".to_string(), settings.redirect_uri.clone());

        match profile.token_auth {
            TokenAuthScheme::Basic => {
                if profile.client_id_in_token_body {
                    payload.insert("client_id".to_string(), settings.client_id.clone());
                }
            }
            TokenAuthScheme::SecretInBody => {
                payload.insert("client_id".to_string(), settings.client_id.clone());
                payload.insert("client_secret".to_string(), settings.client_secret.clone());
            }
        }

        if let Some(verifier) = &code_verifier {
            payload.insert("code_verifier".to_string(), verifier.clone());
        }

        let token_url = settings.token_url.as_deref().unwrap_or(profile.token_url);
        let mut builder = self.http.post(token_url);

        if profile.token_auth == TokenAuthScheme::Basic {
            let encoded =
                STANDARD.encode(format!("{}:{}", settings.client_id, settings.client_secret));
            builder = builder.header(header::AUTHORIZATION, format!("Basic {encoded}"));
        }

        let response = match profile.token_format {
            TokenRequestFormat::Json => builder.json(&payload).send().await?,
            TokenRequestFormat::Form => builder.form(&payload).send().await?,
        };

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            warn!(%provider, status = status.as_u16(), "token endpoint rejected the exchange");
            return Err(GatewayError::Exchange {
                status: status.as_u16(),
                body,
            });
        }

        let credential: Credential = match serde_json::from_str(&body) {
            Ok(credential) => credential,
            Err(err) => {
                return Err(GatewayError::InvalidResponse {
                    message: err.to_string(),
                    body,
                });
            }
        };

        // Cache the raw upstream payload so provider-specific fields survive.
        self.cache
            .put(
                credentials_key(provider, state),
                body,
                self.config.credentials_ttl,
            )
            .await;

        if profile.requires_pkce {
            self.cache.delete(&verifier_key(provider, state)).await;
        }

        info!(%provider, "token exchange complete");
        Ok(credential)
    }

    pub async fn load_credentials(
        &self,
        provider: Provider,
        state: &str,
    ) -> Result<Credential, GatewayError> {
        let payload = self
            .cache
            .get(&credentials_key(provider, state))
            .await
            .ok_or(GatewayError::CredentialsNotFound)?;

        serde_json::from_str(&payload).map_err(|err| GatewayError::InvalidResponse {
            message: err.to_string(),
            body: payload,
        })
    }

    pub async fn list_items(
        &self,
        provider: Provider,
        credential: &Credential,
    ) -> Result<Vec<IntegrationItem>, GatewayError> {
        items::fetch(
            &self.http,
            provider,
            self.config.provider(provider),
            credential,
        )
        .await
    }
}
