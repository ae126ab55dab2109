//! Wire-level tests for the GraphQL client against a mock endpoint.

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use magpie::{ClientOptions, CrawlGateway, GithubError, GraphqlClient, PageFetch,
    PersonalAccessToken};

fn quick_options(endpoint: String) -> ClientOptions {
    ClientOptions {
        endpoint,
        base_retry_delay: Duration::from_millis(1),
        retry_delay_cap: Duration::from_millis(4),
        max_attempts: 3,
        secondary_cooldown: Duration::from_millis(1),
        primary_cooldown: Duration::from_millis(1),
        ..ClientOptions::default()
    }
}

fn client_for(server: &MockServer) -> GraphqlClient {
    let token = PersonalAccessToken::new("ghp_test").expect("token parses");
    GraphqlClient::new(token, quick_options(server.uri())).expect("client builds")
}

fn repositories_body(nodes: serde_json::Value, rate_limit: serde_json::Value) -> serde_json::Value {
    json!({
        "data": {
            "rateLimit": rate_limit,
            "organization": {
                "repositories": {
                    "pageInfo": { "hasNextPage": false, "endCursor": null },
                    "nodes": nodes,
                }
            }
        }
    })
}

fn sample_repository() -> serde_json::Value {
    json!({
        "id": "R_1",
        "name": "next.js",
        "url": "https://github.com/acme/next.js",
        "isPrivate": false,
        "isArchived": false,
        "updatedAt": "2026-08-28T12:00:00Z",
    })
}

#[tokio::test]
async fn successful_page_updates_the_tracked_budget() {
    let server = MockServer::start().await;
    let body = repositories_body(
        json!([sample_repository()]),
        json!({ "cost": 7, "remaining": 4321, "resetAt": "2026-08-29T12:00:00Z" }),
    );
    Mock::given(method("POST"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let fetched = client
        .organization_repositories_page("acme", None)
        .await
        .expect("request succeeds");

    let PageFetch::Page(page) = fetched else {
        panic!("expected a page, got {fetched:?}");
    };
    assert_eq!(page.nodes.len(), 1);
    assert!(!page.page_info.has_next_page);

    let budget = client.budget_snapshot().await;
    assert_eq!(budget.remaining(), 4321);
    assert_eq!(budget.last_cost(), 7);
}

#[tokio::test]
async fn persistent_server_errors_exhaust_the_retry_ladder() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let outcome = client.organization_repositories_page("acme", None).await;

    match outcome {
        Err(GithubError::ServerRetriesExhausted { status, attempts }) => {
            assert_eq!(status, 500);
            assert_eq!(attempts, 3);
        }
        other => panic!("expected exhausted server retries, got {other:?}"),
    }
}

#[tokio::test]
async fn transient_server_error_recovers_on_a_later_attempt() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(repositories_body(
            json!([sample_repository()]),
            json!({ "cost": 1, "remaining": 5000, "resetAt": "2026-08-29T12:00:00Z" }),
        )))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let fetched = client
        .organization_repositories_page("acme", None)
        .await
        .expect("retry recovers");
    assert!(matches!(fetched, PageFetch::Page(_)));
}

#[tokio::test]
async fn connection_refused_is_not_reported_as_a_timeout() {
    // Bind then drop a listener so the port is free and refuses connections.
    let endpoint = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().expect("local addr").port();
        format!("http://127.0.0.1:{port}/")
    };

    let token = PersonalAccessToken::new("ghp_test").expect("token parses");
    let client =
        GraphqlClient::new(token, quick_options(endpoint)).expect("client builds");

    let outcome = client.organization_repositories_page("acme", None).await;
    match outcome {
        Err(GithubError::TransportRetriesExhausted { attempts, .. }) => {
            assert_eq!(attempts, 3);
        }
        other => panic!("expected an unexpected-transport failure, got {other:?}"),
    }
}

#[tokio::test]
async fn unparseable_body_degrades_to_no_data() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>varnish error</html>"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let fetched = client
        .organization_repositories_page("acme", None)
        .await
        .expect("malformed bodies are not fatal");
    assert!(matches!(fetched, PageFetch::NoData));
}

#[tokio::test]
async fn secondary_rate_limit_cools_down_and_asks_for_a_retry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "errors": [
                { "message": "You have triggered an abuse detection mechanism." }
            ]
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(repositories_body(
            json!([sample_repository()]),
            json!({ "cost": 1, "remaining": 5000, "resetAt": "2026-08-29T12:00:00Z" }),
        )))
        .mount(&server)
        .await;

    let client = client_for(&server);

    let first = client
        .organization_repositories_page("acme", None)
        .await
        .expect("secondary limit is not fatal");
    assert!(matches!(first, PageFetch::RetryLater));

    // The identical request is re-issued after the cooldown.
    let second = client
        .organization_repositories_page("acme", None)
        .await
        .expect("re-issue succeeds");
    assert!(matches!(second, PageFetch::Page(_)));
}

#[tokio::test]
async fn primary_rate_limit_type_yields_retry_later() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "errors": [
                { "type": "RATE_LIMITED", "message": "API rate limit exceeded for user." }
            ]
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let fetched = client
        .organization_repositories_page("acme", None)
        .await
        .expect("primary limit is not fatal");
    assert!(matches!(fetched, PageFetch::RetryLater));
}

#[tokio::test]
async fn other_graphql_errors_are_fatal_with_the_payload_attached() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "errors": [
                { "type": "NOT_FOUND", "message": "Could not resolve to an Organization." }
            ]
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let outcome = client.organization_repositories_page("missing", None).await;

    match outcome {
        Err(GithubError::GraphQl { payload }) => {
            assert!(payload.contains("NOT_FOUND"));
        }
        other => panic!("expected a fatal GraphQL error, got {other:?}"),
    }
}

#[tokio::test]
async fn rate_limit_status_parses_the_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "rateLimit": {
                    "cost": 1,
                    "remaining": 4999,
                    "resetAt": "2026-08-29T12:00:00Z",
                    "limit": 5000,
                }
            }
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let status = client.rate_limit_status().await.expect("status parses");
    assert_eq!(status.remaining, 4999);
    assert_eq!(status.limit, 5000);
}
