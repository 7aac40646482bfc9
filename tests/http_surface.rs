//! HTTP surface tests against a real listener.
//!
//! Each test binds the router to an ephemeral port and drives it with a
//! plain HTTP client, with redirects disabled so the callback contract
//! (status, Location, query parameters) can be asserted directly.

use std::collections::HashMap;
use std::sync::Arc;

use reqwest::StatusCode;
use tokio::net::TcpListener;
use url::Url;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use saas_connect::{Gateway, GatewayConfig, MemoryCache, Provider, serve};

fn gateway_with(vars: &[(&str, &str)]) -> Gateway {
    let mut map: HashMap<String, String> = HashMap::new();
    for provider in Provider::ALL {
        let prefix = provider.id().to_uppercase();
        map.insert(format!("{prefix}_CLIENT_ID"), format!("{provider}-client"));
        map.insert(format!("{prefix}_CLIENT_SECRET"), format!("{provider}-secret"));
    }
    for (name, value) in vars {
        map.insert(name.to_string(), value.to_string());
    }

    let config = GatewayConfig::from_lookup(|name| map.get(name).cloned()).unwrap();
    Gateway::new(config, Arc::new(MemoryCache::new())).unwrap()
}

async fn spawn_app(gateway: Gateway) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(serve(gateway, listener));
    format!("http://{addr}")
}

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

fn location_of(response: &reqwest::Response) -> Url {
    let location = response
        .headers()
        .get("location")
        .expect("redirect should carry a Location header")
        .to_str()
        .unwrap();
    Url::parse(location).unwrap()
}

fn query_pairs(url: &Url) -> HashMap<String, String> {
    url.query_pairs().into_owned().collect()
}

#[tokio::test]
async fn service_info_names_the_integrations() {
    let base = spawn_app(gateway_with(&[])).await;

    let response = client().get(&base).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["integrations"], serde_json::json!(["airtable", "hubspot", "notion"]));
    assert!(body["message"].as_str().unwrap().contains("Integrations"));
}

#[tokio::test]
async fn health_endpoint_reports_healthy() {
    let base = spawn_app(gateway_with(&[])).await;

    let response = client()
        .get(format!("{base}/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn authorize_returns_a_ticket_for_the_browser() {
    let base = spawn_app(gateway_with(&[])).await;

    let response = client()
        .get(format!("{base}/integrations/airtable/authorize"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value = response.json().await.unwrap();
    let auth_url = body["auth_url"].as_str().unwrap();
    assert!(auth_url.starts_with("https://airtable.com/oauth2/v1/authorize"));

    let pairs = query_pairs(&Url::parse(auth_url).unwrap());
    assert_eq!(pairs["client_id"], "airtable-client");
    assert_eq!(pairs["response_type"], "code");
    assert_eq!(pairs["code_challenge_method"], "S256");
    assert_eq!(pairs["state"], body["state"].as_str().unwrap());
}

#[tokio::test]
async fn unknown_providers_get_a_404() {
    let base = spawn_app(gateway_with(&[])).await;

    let response = client()
        .get(format!("{base}/integrations/salesforce/authorize"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["detail"], "Unknown provider: salesforce");
}

#[tokio::test]
async fn callback_success_redirects_to_the_frontend() {
    let token_server = MockServer::start().await;
    let token_url = format!("{}/oauth2/v1/token", token_server.uri());
    let base = spawn_app(gateway_with(&[("AIRTABLE_TOKEN_URL", token_url.as_str())])).await;

    Mock::given(method("POST"))
        .and(path("/oauth2/v1/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "cb-tok",
            "token_type": "Bearer",
        })))
        .mount(&token_server)
        .await;

    let ticket: serde_json::Value = client()
        .get(format!("{base}/integrations/airtable/authorize"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let state = ticket["state"].as_str().unwrap();

    let response = client()
        .get(format!(
            "{base}/integrations/airtable/oauth2callback?code=ok-code&state={state}"
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let location = location_of(&response);
    assert_eq!(
        location.as_str(),
        format!("http://localhost:3000/airtable/success?state={state}")
    );

    let credentials = client()
        .get(format!("{base}/integrations/airtable/credentials/{state}"))
        .send()
        .await
        .unwrap();
    assert_eq!(credentials.status(), StatusCode::OK);

    let body: serde_json::Value = credentials.json().await.unwrap();
    assert_eq!(body["access_token"], "cb-tok");
}

#[tokio::test]
async fn callback_failure_redirects_with_a_sanitized_message() {
    let token_server = MockServer::start().await;
    let token_url = format!("{}/oauth2/v1/token", token_server.uri());
    let base = spawn_app(gateway_with(&[("AIRTABLE_TOKEN_URL", token_url.as_str())])).await;

    Mock::given(method("POST"))
        .and(path("/oauth2/v1/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": "invalid_grant",
            "hint": "do-not-leak",
        })))
        .mount(&token_server)
        .await;

    let ticket: serde_json::Value = client()
        .get(format!("{base}/integrations/airtable/authorize"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let state = ticket["state"].as_str().unwrap();

    let response = client()
        .get(format!(
            "{base}/integrations/airtable/oauth2callback?code=bad-code&state={state}"
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let location = location_of(&response);
    assert_eq!(location.path(), "/airtable/error");
    assert_eq!(
        query_pairs(&location)["message"],
        "Token exchange failed with status 400"
    );
    assert!(!location.as_str().contains("do-not-leak"));
}

#[tokio::test]
async fn callback_provider_error_redirects_with_the_description() {
    let base = spawn_app(gateway_with(&[])).await;

    let response = client()
        .get(format!(
            "{base}/integrations/airtable/oauth2callback?error=access_denied&error_description=User%20denied%20access"
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let location = location_of(&response);
    assert_eq!(location.path(), "/airtable/error");
    assert_eq!(query_pairs(&location)["message"], "User denied access");
}

#[tokio::test]
async fn callback_provider_error_falls_back_to_the_error_code() {
    let base = spawn_app(gateway_with(&[])).await;

    let response = client()
        .get(format!(
            "{base}/integrations/hubspot/oauth2callback?error=access_denied"
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let location = location_of(&response);
    assert_eq!(location.path(), "/hubspot/error");
    assert_eq!(query_pairs(&location)["message"], "access_denied");
}

#[tokio::test]
async fn legacy_callback_path_reports_missing_parameters() {
    let base = spawn_app(gateway_with(&[])).await;

    let response = client()
        .get(format!("{base}/integrations/airtable/callback"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let location = location_of(&response);
    assert_eq!(location.path(), "/airtable/error");
    assert_eq!(
        query_pairs(&location)["message"],
        "Missing code or state in callback"
    );
}

#[tokio::test]
async fn missing_credentials_are_a_404() {
    let base = spawn_app(gateway_with(&[])).await;

    let response = client()
        .get(format!("{base}/integrations/hubspot/credentials/never-issued"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["detail"], "Credentials not found");
}

#[tokio::test]
async fn items_endpoint_lists_normalized_objects() {
    let api_server = MockServer::start().await;
    let base = spawn_app(gateway_with(&[(
        "NOTION_API_BASE_URL",
        api_server.uri().as_str(),
    )]))
    .await;

    Mock::given(method("POST"))
        .and(path("/v1/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "results": [
                {
                    "id": "db-1",
                    "object": "database",
                    "title": [{"plain_text": "Tasks"}],
                    "parent": {"type": "workspace"}
                },
                {
                    "id": "pg-1",
                    "object": "page",
                    "properties": {"title": {"title": [{"plain_text": "Roadmap"}]}},
                    "url": "https://notion.so/pg-1",
                    "parent": {"type": "page_id"}
                }
            ]
        })))
        .mount(&api_server)
        .await;

    let response = client()
        .post(format!("{base}/integrations/notion/items"))
        .json(&serde_json::json!({ "access_token": "notion-items-tok" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["count"], 2);

    let items = body["items"].as_array().unwrap();
    assert_eq!(items[0]["id"], "db-1");
    assert_eq!(items[0]["name"], "Tasks");
    assert_eq!(items[0]["type"], "database");
    assert_eq!(items[1]["name"], "Roadmap");
    assert_eq!(items[1]["url"], "https://notion.so/pg-1");

    let requests = api_server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let headers = &requests[0].headers;
    assert_eq!(headers.get("notion-version").unwrap(), "2022-06-28");
    assert_eq!(
        headers.get("authorization").unwrap(),
        "Bearer notion-items-tok"
    );
}

#[tokio::test]
async fn items_requests_to_hubspot_carry_limit_and_properties() {
    let api_server = MockServer::start().await;
    let base = spawn_app(gateway_with(&[(
        "HUBSPOT_API_BASE_URL",
        api_server.uri().as_str(),
    )]))
    .await;

    Mock::given(method("GET"))
        .and(path("/crm/v3/objects/contacts"))
        .and(header("authorization", "Bearer hs-items-tok"))
        .and(query_param("limit", "100"))
        .and(query_param(
            "properties",
            "firstname,lastname,email,createdate,lastmodifieddate",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "results": [
                {
                    "id": "201",
                    "properties": {
                        "firstname": "Ada",
                        "lastname": "Lovelace",
                        "email": "ada@example.com",
                        "createdate": "2024-01-05T09:00:00Z",
                        "lastmodifieddate": "2024-02-01T10:00:00Z"
                    }
                }
            ]
        })))
        .mount(&api_server)
        .await;

    let response = client()
        .post(format!("{base}/integrations/hubspot/items"))
        .json(&serde_json::json!({ "access_token": "hs-items-tok" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["count"], 1);
    assert_eq!(body["items"][0]["id"], "201");
    assert_eq!(body["items"][0]["name"], "Ada Lovelace");
    assert_eq!(body["items"][0]["type"], "contact");

    // companies and deals have no stub and fail soft
    let requests = api_server.received_requests().await.unwrap();
    let paths: Vec<&str> = requests.iter().map(|req| req.url.path()).collect();
    assert_eq!(
        paths,
        [
            "/crm/v3/objects/contacts",
            "/crm/v3/objects/companies",
            "/crm/v3/objects/deals",
        ]
    );
}

#[tokio::test]
async fn items_upstream_failure_maps_to_a_bad_request() {
    let api_server = MockServer::start().await;
    let base = spawn_app(gateway_with(&[(
        "NOTION_API_BASE_URL",
        api_server.uri().as_str(),
    )]))
    .await;

    Mock::given(method("POST"))
        .and(path("/v1/search"))
        .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
            "message": "boom",
        })))
        .mount(&api_server)
        .await;

    let response = client()
        .post(format!("{base}/integrations/notion/items"))
        .json(&serde_json::json!({ "access_token": "tok" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["detail"], "Failed to search Notion");
}
