use reqwest::Client;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::config::ProviderSettings;
use crate::{Credential, GatewayError, Provider};

const NOTION_VERSION: &str = "2022-06-28";
const PAGE_LIMIT: u32 = 100;

/// (api path segment, item kind, property list requested from the listing)
const HUBSPOT_OBJECTS: &[(&str, &str, &str)] = &[
    (
        "contacts",
        "contact",
        "firstname,lastname,email,createdate,lastmodifieddate",
    ),
    ("companies", "company", "name,domain,createdate,hs_lastmodifieddate"),
    (
        "deals",
        "deal",
        "dealname,amount,dealstage,createdate,hs_lastmodifieddate,closedate",
    ),
];

/// Workspace object normalized across providers.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IntegrationItem {
    pub id: String,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub parent_id: Option<String>,
    pub parent_name: Option<String>,
    pub created_time: Option<String>,
    pub updated_time: Option<String>,
    pub url: Option<String>,
    pub properties: Option<Value>,
}

pub(crate) async fn fetch(
    http: &Client,
    provider: Provider,
    settings: &ProviderSettings,
    credential: &Credential,
) -> Result<Vec<IntegrationItem>, GatewayError> {
    let api_base = settings
        .api_base_url
        .as_deref()
        .unwrap_or(provider.profile().api_base_url);

    match provider {
        Provider::Airtable => airtable_items(http, api_base, credential).await,
        Provider::HubSpot => hubspot_items(http, api_base, credential).await,
        Provider::Notion => notion_items(http, api_base, credential).await,
    }
}

/// Lists bases, then the tables of each base. A failed base listing aborts
/// the whole call; a failed table listing only skips that base's tables.
async fn airtable_items(
    http: &Client,
    api_base: &str,
    credential: &Credential,
) -> Result<Vec<IntegrationItem>, GatewayError> {
    let response = http
        .get(format!("{api_base}/v0/meta/bases"))
        .bearer_auth(&credential.access_token)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        warn!(status = status.as_u16(), body = %body, "airtable base listing failed");
        return Err(GatewayError::Upstream {
            status: status.as_u16(),
            detail: "Failed to fetch Airtable bases".to_string(),
        });
    }

    let data: Value = response.json().await?;
    let bases = data
        .get("bases")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let mut items = Vec::new();
    for base in &bases {
        let Some(base_id) = base.get("id").and_then(Value::as_str) else {
            continue;
        };
        let base_name = base.get("name").and_then(Value::as_str);

        items.push(IntegrationItem {
            id: base_id.to_string(),
            name: base_name.map(str::to_string),
            kind: Some("base".to_string()),
            url: Some(format!("https://airtable.com/{base_id}")),
            ..Default::default()
        });

        let tables_response = http
            .get(format!("{api_base}/v0/meta/bases/{base_id}/tables"))
            .bearer_auth(&credential.access_token)
            .send()
            .await;

        let tables: Value = match tables_response {
            Ok(response) if response.status().is_success() => response.json().await?,
            Ok(response) => {
                debug!(
                    base = base_id,
                    status = response.status().as_u16(),
                    "skipping tables for base"
                );
                continue;
            }
            Err(err) => {
                warn!(base = base_id, error = %err, "skipping tables for base");
                continue;
            }
        };

        let table_list = tables
            .get("tables")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        for table in &table_list {
            let Some(table_id) = table.get("id").and_then(Value::as_str) else {
                continue;
            };
            items.push(IntegrationItem {
                id: table_id.to_string(),
                name: table.get("name").and_then(Value::as_str).map(str::to_string),
                kind: Some("table".to_string()),
                parent_id: Some(base_id.to_string()),
                parent_name: base_name.map(str::to_string),
                url: Some(format!("https://airtable.com/{base_id}/{table_id}")),
                properties: Some(json!({
                    "fields": table.get("fields").cloned().unwrap_or_else(|| json!([]))
                })),
                ..Default::default()
            });
        }
    }

    Ok(items)
}

/// Contacts, companies, and deals. Each listing fails soft so one revoked
/// scope does not empty the whole response.
async fn hubspot_items(
    http: &Client,
    api_base: &str,
    credential: &Credential,
) -> Result<Vec<IntegrationItem>, GatewayError> {
    let mut items = Vec::new();

    for &(object, kind, properties) in HUBSPOT_OBJECTS {
        let response = http
            .get(format!("{api_base}/crm/v3/objects/{object}"))
            .bearer_auth(&credential.access_token)
            .query(&[("limit", &PAGE_LIMIT.to_string()), ("properties", &properties.to_string())])
            .send()
            .await;

        let data: Value = match response {
            Ok(response) if response.status().is_success() => match response.json().await {
                Ok(data) => data,
                Err(err) => {
                    warn!(object, error = %err, "skipping hubspot listing");
                    continue;
                }
            },
            Ok(response) => {
                warn!(
                    object,
                    status = response.status().as_u16(),
                    "skipping hubspot listing"
                );
                continue;
            }
            Err(err) => {
                warn!(object, error = %err, "skipping hubspot listing");
                continue;
            }
        };

        let results = data
            .get("results")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        for result in &results {
            if let Some(item) = hubspot_item(kind, result) {
                items.push(item);
            }
        }
    }

    Ok(items)
}

fn hubspot_item(kind: &str, result: &Value) -> Option<IntegrationItem> {
    let id = result.get("id").and_then(Value::as_str)?.to_string();
    let properties = result
        .get("properties")
        .cloned()
        .unwrap_or_else(|| json!({}));

    let text = |field: &str| -> Option<String> {
        properties
            .get(field)
            .and_then(Value::as_str)
            .map(str::to_string)
    };

    let name = match kind {
        "contact" => {
            let full = format!(
                "{} {}",
                text("firstname").unwrap_or_default(),
                text("lastname").unwrap_or_default()
            );
            let full = full.trim().to_string();
            if !full.is_empty() {
                full
            } else if let Some(email) = text("email").filter(|email| !email.is_empty()) {
                email
            } else {
                format!("Contact {id}")
            }
        }
        "company" => text("name").unwrap_or_else(|| format!("Company {id}")),
        _ => text("dealname").unwrap_or_else(|| format!("Deal {id}")),
    };

    let updated_field = if kind == "contact" {
        "lastmodifieddate"
    } else {
        "hs_lastmodifieddate"
    };
    let url = match kind {
        "contact" => format!("https://app.hubspot.com/contacts/{id}"),
        "company" => format!("https://app.hubspot.com/contacts/{id}/company/{id}"),
        _ => format!("https://app.hubspot.com/contacts/{id}/deal/{id}"),
    };

    Some(IntegrationItem {
        id: id.clone(),
        name: Some(name),
        kind: Some(kind.to_string()),
        created_time: text("createdate"),
        updated_time: text(updated_field),
        url: Some(url),
        properties: Some(properties),
        ..Default::default()
    })
}

/// One workspace-wide search. Notion reports pages and databases through
/// the same endpoint, so this is a single hard-failing call.
async fn notion_items(
    http: &Client,
    api_base: &str,
    credential: &Credential,
) -> Result<Vec<IntegrationItem>, GatewayError> {
    let response = http
        .post(format!("{api_base}/v1/search"))
        .bearer_auth(&credential.access_token)
        .header("Notion-Version", NOTION_VERSION)
        .json(&json!({ "page_size": PAGE_LIMIT }))
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        warn!(status = status.as_u16(), body = %body, "notion search failed");
        return Err(GatewayError::Upstream {
            status: status.as_u16(),
            detail: "Failed to search Notion".to_string(),
        });
    }

    let data: Value = response.json().await?;
    let results = data
        .get("results")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let mut items = Vec::new();
    for result in &results {
        if let Some(item) = notion_item(result) {
            items.push(item);
        }
    }

    Ok(items)
}

fn notion_item(result: &Value) -> Option<IntegrationItem> {
    let id = result.get("id").and_then(Value::as_str)?.to_string();
    let object = result.get("object").and_then(Value::as_str).unwrap_or("page");

    // Databases carry their title at the top level, pages bury it inside
    // the title property.
    let title = match object {
        "database" => result
            .get("title")
            .and_then(Value::as_array)
            .and_then(|list| list.first())
            .and_then(|first| first.get("plain_text"))
            .and_then(Value::as_str),
        "page" => result
            .get("properties")
            .and_then(|properties| properties.get("title"))
            .and_then(|title_prop| title_prop.get("title"))
            .and_then(Value::as_array)
            .and_then(|list| list.first())
            .and_then(|first| first.get("plain_text"))
            .and_then(Value::as_str),
        _ => None,
    };
    let name = title
        .filter(|title| !title.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("Untitled {object}"));

    let parent_type = result
        .get("parent")
        .and_then(|parent| parent.get("type"))
        .cloned()
        .unwrap_or(Value::Null);

    Some(IntegrationItem {
        id,
        name: Some(name),
        kind: Some(object.to_string()),
        created_time: result
            .get("created_time")
            .and_then(Value::as_str)
            .map(str::to_string),
        updated_time: result
            .get("last_edited_time")
            .and_then(Value::as_str)
            .map(str::to_string),
        url: result.get("url").and_then(Value::as_str).map(str::to_string),
        properties: Some(json!({ "parent_type": parent_type })),
        ..Default::default()
    })
}
