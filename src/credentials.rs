use std::collections::HashMap;

use serde::{Deserialize, Serialize};

fn default_token_type() -> String {
    "Bearer".to_string()
}

/// Token payload issued by a provider, cached under the state token and
/// served back to the frontend. Provider-specific fields (Notion workspace
/// metadata, HubSpot hub ids) ride along in `extra`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<u64>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}
