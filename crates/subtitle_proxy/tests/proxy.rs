use std::net::SocketAddr;
use std::sync::Once;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use subtitle_engine::{
    ClientSettings, ConvertOptions, FailureKind, SubtitleConverter, ZhConvertClient,
};
use subtitle_proxy::{router, ProxyError, ProxyServer, ProxySettings};
use tokio::net::TcpListener;
use tower::ServiceExt;
use wiremock::matchers::{body_string, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(subtitle_logging::initialize_for_tests);
}

fn proxy_to(upstream: &str) -> Router {
    router(ProxySettings {
        upstream_base: upstream.to_string(),
        ..ProxySettings::default()
    })
    .unwrap()
}

fn header_value<'a>(response: &'a axum::response::Response, name: &str) -> Option<&'a str> {
    response
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
}

#[tokio::test]
async fn preflight_is_answered_locally() {
    init_logging();
    let upstream = MockServer::start().await;
    Mock::given(wiremock::matchers::any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&upstream)
        .await;

    let response = proxy_to(&upstream.uri())
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/api/convert")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(header_value(&response, "access-control-allow-origin"), Some("*"));
    assert_eq!(
        header_value(&response, "access-control-allow-methods"),
        Some("GET, POST, OPTIONS")
    );
    assert_eq!(
        header_value(&response, "access-control-allow-headers"),
        Some("Content-Type")
    );
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(body.is_empty());
}

#[tokio::test]
async fn post_is_forwarded_with_body_query_and_forced_headers() {
    init_logging();
    let upstream = MockServer::start().await;
    let payload = r#"{"text":"后","converter":"Taiwan"}"#;
    Mock::given(method("POST"))
        .and(path("/convert"))
        .and(query_param("trace", "1"))
        .and(header("content-type", "application/json"))
        .and(header("accept", "application/json"))
        .and(body_string(payload))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(r#"{"code":0,"msg":"","data":{"text":"後"}}"#, "text/plain"),
        )
        .expect(1)
        .mount(&upstream)
        .await;

    let response = proxy_to(&upstream.uri())
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/convert?trace=1")
                .header("content-type", "text/plain")
                .body(Body::from(payload))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header_value(&response, "content-type"), Some("application/json"));
    assert_eq!(header_value(&response, "access-control-allow-origin"), Some("*"));
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], r#"{"code":0,"msg":"","data":{"text":"後"}}"#.as_bytes());
}

#[tokio::test]
async fn get_is_forwarded_without_body() {
    init_logging();
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/service-info"))
        .and(body_string(""))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "code": 0 })))
        .expect(1)
        .mount(&upstream)
        .await;

    let response = proxy_to(&format!("{}/", upstream.uri()))
        .oneshot(
            Request::builder()
                .uri("/api/service-info")
                .body(Body::from("ignored"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn upstream_status_and_body_pass_through_unparsed() {
    init_logging();
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/convert"))
        .respond_with(ResponseTemplate::new(502).set_body_string("<html>bad gateway</html>"))
        .mount(&upstream)
        .await;

    let response = proxy_to(&upstream.uri())
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/convert")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(header_value(&response, "access-control-allow-origin"), Some("*"));
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"<html>bad gateway</html>");
}

#[tokio::test]
async fn unreachable_upstream_yields_json_error() {
    init_logging();
    let response = router(ProxySettings {
        upstream_base: "http://127.0.0.1:1".to_string(),
        connect_timeout: Duration::from_millis(500),
        ..ProxySettings::default()
    })
    .unwrap()
    .oneshot(
        Request::builder()
            .method("POST")
            .uri("/api/convert")
            .body(Body::from("{}"))
            .unwrap(),
    )
    .await
    .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(header_value(&response, "content-type"), Some("application/json"));
    assert_eq!(header_value(&response, "access-control-allow-origin"), Some("*"));
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert!(json["error"].as_str().is_some_and(|message| !message.is_empty()));
}

#[tokio::test]
async fn slow_upstream_is_reported_as_failure() {
    init_logging();
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(300)))
        .mount(&upstream)
        .await;

    let response = router(ProxySettings {
        upstream_base: upstream.uri(),
        request_timeout: Duration::from_millis(50),
        ..ProxySettings::default()
    })
    .unwrap()
    .oneshot(
        Request::builder()
            .uri("/api/service-info")
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[test]
fn invalid_upstream_is_rejected() {
    let err = router(ProxySettings {
        upstream_base: "not a url".to_string(),
        ..ProxySettings::default()
    })
    .unwrap_err();
    assert!(matches!(err, ProxyError::InvalidUpstream { .. }));
}

#[tokio::test]
async fn client_converts_through_running_proxy() {
    init_logging();
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/convert"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0, "msg": "", "data": { "text": "軟體" }
        })))
        .mount(&upstream)
        .await;

    let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();
    let server = ProxyServer::new(ProxySettings {
        upstream_base: upstream.uri(),
        ..ProxySettings::default()
    })
    .unwrap();
    let (stop, stopped) = tokio::sync::oneshot::channel::<()>();
    let handle = tokio::spawn(server.serve_listener(listener, async {
        let _ = stopped.await;
    }));

    let client = ZhConvertClient::new(ClientSettings {
        base_url: format!("http://{addr}/api"),
        ..ClientSettings::default()
    })
    .unwrap();
    let text = client
        .convert_subtitle("软件", &ConvertOptions::default())
        .await
        .unwrap();
    assert_eq!(text, "軟體");

    stop.send(()).unwrap();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn client_sees_proxy_failure_as_transport_error() {
    init_logging();
    let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();
    let server = ProxyServer::new(ProxySettings {
        upstream_base: "http://127.0.0.1:1".to_string(),
        connect_timeout: Duration::from_millis(500),
        ..ProxySettings::default()
    })
    .unwrap();
    let (stop, stopped) = tokio::sync::oneshot::channel::<()>();
    let handle = tokio::spawn(server.serve_listener(listener, async {
        let _ = stopped.await;
    }));

    let client = ZhConvertClient::new(ClientSettings {
        base_url: format!("http://{addr}/api"),
        ..ClientSettings::default()
    })
    .unwrap();
    let err = client
        .convert_subtitle("软件", &ConvertOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind, FailureKind::HttpStatus(500));
    assert_eq!(err.message, "Network error during conversion");

    let state = client.check_connection().await;
    assert!(!state.is_connected);
    assert!(state.error.is_some());

    stop.send(()).unwrap();
    handle.await.unwrap().unwrap();
}
