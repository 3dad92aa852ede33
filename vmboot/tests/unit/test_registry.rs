//! Registry server tests

use reqwest::StatusCode;
use serde_json::Value;

use vmboot::registry::{HttpRegistryServerManager, Server, ServerManager};

#[tokio::test]
async fn test_registry_round_trips_settings() {
    let server = HttpRegistryServerManager::new()
        .start("fake-username", "fake-password", "127.0.0.1", 0)
        .await
        .unwrap();
    let url = format!(
        "http://{}/instances/fake-instance-id/settings",
        server.local_addr()
    );
    let client = reqwest::Client::new();

    let resp = client
        .put(&url)
        .basic_auth("fake-username", Some("fake-password"))
        .body(r#"{"agent_id":"fake-agent-id"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = client
        .get(&url)
        .basic_auth("fake-username", Some("fake-password"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["settings"], r#"{"agent_id":"fake-agent-id"}"#);

    let resp = client
        .delete(&url)
        .basic_auth("fake-username", Some("fake-password"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = client
        .get(&url)
        .basic_auth("fake-username", Some("fake-password"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_registry_requires_credentials() {
    let server = HttpRegistryServerManager::new()
        .start("fake-username", "fake-password", "127.0.0.1", 0)
        .await
        .unwrap();
    let url = format!(
        "http://{}/instances/fake-instance-id/settings",
        server.local_addr()
    );
    let client = reqwest::Client::new();

    let resp = client.get(&url).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(resp.headers().contains_key("www-authenticate"));

    let resp = client
        .put(&url)
        .basic_auth("fake-username", Some("wrong-password"))
        .body("{}")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_registry_stops_listening() {
    let server = HttpRegistryServerManager::new()
        .start("fake-username", "fake-password", "127.0.0.1", 0)
        .await
        .unwrap();
    let addr = server.local_addr();

    server.stop().await.unwrap();

    assert!(tokio::net::TcpStream::connect(addr).await.is_err());
}

#[tokio::test]
async fn test_registry_bind_failure() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let err = HttpRegistryServerManager::new()
        .start("fake-username", "fake-password", "127.0.0.1", port)
        .await
        .err()
        .unwrap();
    assert!(err.to_string().contains("Binding"));
}
