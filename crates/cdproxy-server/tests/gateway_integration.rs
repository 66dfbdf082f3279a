//! End-to-end tests: a real gateway between mock authorization and partner servers.

mod common;

use anyhow::Result;
use reqwest::{Method, StatusCode};
use serde_json::{Value, json};
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use cdproxy_server::CUSTOMER_CREATION_DISABLED_MESSAGE;
use common::{TOKEN_PATH, TestServer};

#[tokio::test]
async fn test_credit_score_round_trip() -> Result<()> {
    let server = TestServer::start().await?;
    server.issue_token("tok1", 300).await;
    Mock::given(method("GET"))
        .and(path("/v1/customers/abc/credit-scores"))
        .and(header("authorization", "Bearer tok1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"score": 700})))
        .expect(1)
        .mount(&server.partner)
        .await;

    let resp = server
        .post("/get-credit-score")
        .json(&json!({"customerToken": "abc"}))
        .send()
        .await?;

    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await?;
    assert_eq!(body, json!({"score": 700}));
    Ok(())
}

#[tokio::test]
async fn test_missing_secret_contacts_nobody() -> Result<()> {
    let server = TestServer::start().await?;
    server.issue_token("tok1", 300).await;

    let resp = server
        .anonymous(Method::POST, "/get-credit-score")
        .json(&json!({"customerToken": "abc"}))
        .send()
        .await?;

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = resp.json().await?;
    assert_eq!(body, json!({"error": "unauthorized"}));
    assert_eq!(server.auth_calls().await, 0);
    assert_eq!(server.partner_calls().await, 0);
    Ok(())
}

#[tokio::test]
async fn test_token_exchange_failure_is_bad_gateway() -> Result<()> {
    let server = TestServer::start().await?;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(json!({"error": "invalid_client", "detail": "client unknown"})),
        )
        .mount(&server.auth)
        .await;

    let resp = server
        .post("/get-credit-score")
        .json(&json!({"customerToken": "abc"}))
        .send()
        .await?;

    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    let body: Value = resp.json().await?;
    assert_eq!(body["error"], "token_exchange_failed");
    assert!(!body.to_string().contains("client unknown"));
    assert_eq!(server.partner_calls().await, 0);
    Ok(())
}

#[tokio::test]
async fn test_create_customer_disabled() -> Result<()> {
    let server = TestServer::start().await?;
    server.issue_token("tok1", 300).await;

    for payload in [json!({}), json!({"firstName": "Ada", "lastName": "Lovelace"})] {
        let resp = server.post("/create-customer").json(&payload).send().await?;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = resp.json().await?;
        assert_eq!(body["error"], "customer_creation_disabled");
        assert_eq!(body["message"], CUSTOMER_CREATION_DISABLED_MESSAGE);
    }

    assert_eq!(server.auth_calls().await, 0);
    assert_eq!(server.partner_calls().await, 0);
    Ok(())
}

#[tokio::test]
async fn test_create_customer_enabled_forwards_verbatim() -> Result<()> {
    let server = TestServer::start_with(|c| c.with_customer_creation(true)).await?;
    server.issue_token("tok1", 300).await;
    Mock::given(method("POST"))
        .and(path("/v1/customers"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({"firstName": "Ada"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"customerToken": "new"})))
        .expect(1)
        .mount(&server.partner)
        .await;

    let resp = server
        .post("/create-customer")
        .json(&json!({"firstName": "Ada"}))
        .send()
        .await?;

    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = resp.json().await?;
    assert_eq!(body["customerToken"], "new");
    Ok(())
}

#[tokio::test]
async fn test_forwarding_twice_calls_partner_twice() -> Result<()> {
    let server = TestServer::start().await?;
    server.issue_token("tok1", 300).await;
    Mock::given(method("GET"))
        .and(path("/v1/customers/abc/credit-scores"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"score": 700})))
        .expect(2)
        .mount(&server.partner)
        .await;

    for _ in 0..2 {
        let resp = server
            .post("/get-credit-score")
            .json(&json!({"customerToken": "abc"}))
            .send()
            .await?;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    // One exchange serves both calls.
    assert_eq!(server.auth_calls().await, 1);
    Ok(())
}

#[tokio::test]
async fn test_missing_fields_make_no_network_calls() -> Result<()> {
    let server = TestServer::start().await?;
    server.issue_token("tok1", 300).await;

    let resp = server.post("/get-credit-score").json(&json!({})).send().await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await?;
    assert_eq!(body["error"], "missing_field");
    assert_eq!(body["field"], "customerToken");

    let resp = server
        .post("/login-as")
        .json(&json!({"customerToken": "abc"}))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await?;
    assert_eq!(body["field"], "agentId");

    assert_eq!(server.auth_calls().await, 0);
    assert_eq!(server.partner_calls().await, 0);
    Ok(())
}

#[tokio::test]
async fn test_credit_score_token_from_query() -> Result<()> {
    let server = TestServer::start().await?;
    server.issue_token("tok1", 300).await;
    Mock::given(method("GET"))
        .and(path("/v1/customers/q1/credit-scores"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"score": 650})))
        .expect(1)
        .mount(&server.partner)
        .await;

    let resp = server
        .post("/get-credit-score?customerToken=q1")
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn test_partner_errors_are_relayed() -> Result<()> {
    let server = TestServer::start().await?;
    server.issue_token("tok1", 300).await;
    Mock::given(method("GET"))
        .and(path("/v1/customers/gone/credit-scores"))
        .respond_with(
            ResponseTemplate::new(404)
                .insert_header("content-type", "application/problem+json")
                .set_body_string(r#"{"title":"Customer not found"}"#),
        )
        .mount(&server.partner)
        .await;

    let resp = server
        .post("/get-credit-score")
        .json(&json!({"customerToken": "gone"}))
        .send()
        .await?;

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        resp.headers().get("content-type").unwrap(),
        "application/problem+json"
    );
    assert_eq!(resp.text().await?, r#"{"title":"Customer not found"}"#);
    Ok(())
}

#[tokio::test]
async fn test_login_as_forwards_body_without_customer_token() -> Result<()> {
    let server = TestServer::start().await?;
    server.issue_token("tok1", 300).await;
    Mock::given(method("POST"))
        .and(path("/v1/customers/abc/otcs/login-as"))
        .and(body_json(json!({"agentId": "agent-7", "note": "support"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": "123456",
            "expirationDateTime": "2026-10-17T12:00:00Z",
            "type": "LOGIN_AS",
        })))
        .expect(1)
        .mount(&server.partner)
        .await;

    let resp = server
        .post("/login-as")
        .json(&json!({"customerToken": "abc", "agentId": "agent-7", "note": "support"}))
        .send()
        .await?;

    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await?;
    assert_eq!(body["type"], "LOGIN_AS");
    Ok(())
}

#[tokio::test]
async fn test_customers_get_forwards_query() -> Result<()> {
    let server = TestServer::start().await?;
    server.issue_token("tok1", 300).await;
    Mock::given(method("GET"))
        .and(path("/v1/customers"))
        .and(query_param("email", "ada@example.com"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
        .expect(1)
        .mount(&server.partner)
        .await;

    let resp = server
        .get("/customers?email=ada%40example.com&page=1")
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn test_customers_post_turns_body_into_query() -> Result<()> {
    let server = TestServer::start().await?;
    server.issue_token("tok1", 300).await;
    Mock::given(method("GET"))
        .and(path("/v1/customers"))
        .and(query_param("email", "ada@example.com"))
        .and(query_param("limit", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
        .expect(1)
        .mount(&server.partner)
        .await;

    let resp = server
        .post("/customers")
        .json(&json!({"email": "ada@example.com", "limit": 10}))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn test_partner_401_forces_new_exchange() -> Result<()> {
    let server = TestServer::start().await?;
    server.issue_token("tok1", 300).await;
    Mock::given(method("GET"))
        .and(path("/v1/customers"))
        .respond_with(ResponseTemplate::new(401))
        .up_to_n_times(1)
        .mount(&server.partner)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/customers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
        .mount(&server.partner)
        .await;

    let resp = server.get("/customers").send().await?;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = server.get("/customers").send().await?;
    assert_eq!(resp.status(), StatusCode::OK);

    assert_eq!(server.auth_calls().await, 2);
    assert_eq!(server.tokens.exchange_count(), 2);
    Ok(())
}

#[tokio::test]
async fn test_internal_headers_are_not_forwarded() -> Result<()> {
    let server = TestServer::start_with(|c| c.with_passthrough(true)).await?;
    server.issue_token("tok1", 300).await;
    Mock::given(method("GET"))
        .and(path("/v1/customers/abc"))
        .and(header("authorization", "Bearer tok1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server.partner)
        .await;

    let resp = server
        .get("/papi/v1/customers/abc")
        .header("authorization", "Bearer caller-token")
        .header("x-correlation-id", "corr-1")
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);

    let requests = server.partner.received_requests().await.unwrap_or_default();
    assert_eq!(requests.len(), 1);
    let forwarded = &requests[0];
    assert!(forwarded.headers.get("x-internal-secret").is_none());
    assert_eq!(forwarded.headers.get("x-correlation-id").unwrap(), "corr-1");
    assert_eq!(forwarded.headers.get("authorization").unwrap(), "Bearer tok1");
    Ok(())
}

#[tokio::test]
async fn test_passthrough_forwards_method_and_query() -> Result<()> {
    let server = TestServer::start_with(|c| c.with_passthrough(true)).await?;
    server.issue_token("tok1", 300).await;
    Mock::given(method("PUT"))
        .and(path("/v1/customers/abc/preferences"))
        .and(query_param("dryRun", "true"))
        .and(body_json(json!({"emailOptIn": false})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server.partner)
        .await;

    let resp = server
        .client
        .put(format!(
            "{}/papi/v1/customers/abc/preferences?dryRun=true",
            server.base_url()
        ))
        .header("x-internal-secret", common::SECRET)
        .json(&json!({"emailOptIn": false}))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    Ok(())
}

#[tokio::test]
async fn test_upstream_timeout_is_bad_gateway() -> Result<()> {
    let server = TestServer::start_with(|c| {
        c.with_upstream_timeout(std::time::Duration::from_millis(100))
    })
    .await?;
    server.issue_token("tok1", 300).await;
    Mock::given(method("GET"))
        .and(path("/v1/customers"))
        .respond_with(
            ResponseTemplate::new(200).set_delay(std::time::Duration::from_millis(1_000)),
        )
        .mount(&server.partner)
        .await;

    let resp = server.get("/customers").send().await?;
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    let body: Value = resp.json().await?;
    assert_eq!(body["error"], "upstream_timeout");
    Ok(())
}

#[tokio::test]
async fn test_health_does_not_require_secret() -> Result<()> {
    let server = TestServer::start().await?;
    let resp = server.anonymous(Method::GET, "/health").send().await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await?;
    assert_eq!(body["status"], "ok");
    assert_eq!(body.as_object().map(|o| o.len()), Some(3));
    Ok(())
}

#[tokio::test]
async fn test_dot_segment_customer_token_never_reaches_partner() -> Result<()> {
    let server = TestServer::start().await?;
    server.issue_token("tok1", 300).await;
    Mock::given(wiremock::matchers::any())
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(0)
        .mount(&server.partner)
        .await;

    let attempts = [
        ("/get-credit-score", json!({"customerToken": ".."})),
        ("/get-credit-score", json!({"customerToken": "."})),
        ("/get-credit-score?customerToken=..", json!({})),
        ("/login-as", json!({"customerToken": "..", "agentId": "a"})),
        ("/login-as", json!({"customerToken": ".", "agentId": "a"})),
    ];

    for (route, payload) in attempts {
        let resp = server.post(route).json(&payload).send().await?;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{} {}", route, payload);
        let body: Value = resp.json().await?;
        assert_eq!(body["error"], "invalid_field");
        assert_eq!(body["field"], "customerToken");
    }

    assert_eq!(server.partner_calls().await, 0);
    assert_eq!(server.auth_calls().await, 0);
    Ok(())
}
