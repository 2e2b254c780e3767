use std::collections::BTreeMap;
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use subtitle_engine::{
    ClientSettings, ConversionOutput, ConversionRequest, ConvertOptions, FailureKind,
    SubtitleConverter, ZhConvertClient,
};
use wiremock::matchers::{body_json, body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// Answers `/convert` with the submitted text reversed.
struct ReverseResponder;

impl Respond for ReverseResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: Value = request.body_json().unwrap();
        let text: String = body["text"].as_str().unwrap().chars().rev().collect();
        ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "msg": "",
            "data": { "text": text }
        }))
    }
}

fn client_for(server: &MockServer) -> ZhConvertClient {
    ZhConvertClient::new(ClientSettings {
        base_url: server.uri(),
        ..ClientSettings::default()
    })
    .unwrap()
}

#[tokio::test]
async fn convert_returns_service_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/convert"))
        .and(header("content-type", "application/json"))
        .respond_with(ReverseResponder)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let text = client
        .convert_subtitle("abc", &ConvertOptions::default())
        .await
        .unwrap();
    assert_eq!(text, "cba");
}

#[tokio::test]
async fn default_request_omits_modules_and_diff_fields() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/convert"))
        .and(body_json(json!({
            "text": "字幕",
            "converter": "Taiwan",
            "jpTextStyles": "protect"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0, "msg": "", "data": { "text": "字幕" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let text = client
        .convert_subtitle("字幕", &ConvertOptions::default())
        .await
        .unwrap();
    assert_eq!(text, "字幕");
}

#[tokio::test]
async fn modules_are_sent_as_a_json_string() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/convert"))
        .and(body_partial_json(json!({
            "converter": "China",
            "modules": "{\"ChineseVariant\":0,\"Typo\":1}"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0, "msg": "", "data": { "text": "ok" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let options = ConvertOptions {
        converter: "China".to_string(),
        modules: BTreeMap::from([("Typo".to_string(), 1), ("ChineseVariant".to_string(), 0)]),
        ..ConvertOptions::default()
    };
    let client = client_for(&server);
    assert_eq!(client.convert_subtitle("x", &options).await.unwrap(), "ok");
}

#[tokio::test]
async fn diff_request_sets_diff_flags() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/convert"))
        .and(body_partial_json(json!({
            "diffEnable": true,
            "diffTemplate": "SideBySide"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0, "msg": "", "data": { "text": "後", "diff": "<table>diff</table>" }
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let diff = client
        .get_diff("后", &ConvertOptions::default())
        .await
        .unwrap();
    assert_eq!(diff, "<table>diff</table>");

    let request = ConversionRequest::diff("后", &ConvertOptions::default()).unwrap();
    let result = client.convert(&request).await.unwrap();
    assert_eq!(result.code, 0);
    assert_eq!(result.output, ConversionOutput::Diff("<table>diff</table>".into()));
}

#[tokio::test]
async fn rejected_conversion_surfaces_service_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/convert"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 1, "msg": "bad converter", "data": null
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client
        .convert_subtitle("x", &ConvertOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.message, "bad converter");
    assert_eq!(err.kind, FailureKind::Rejected { code: 1 });
}

#[tokio::test]
async fn rejection_without_message_uses_fallbacks() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/convert"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "code": 3, "msg": "" })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let options = ConvertOptions::default();
    let err = client.convert_subtitle("x", &options).await.unwrap_err();
    assert_eq!(err.message, "Conversion failed");
    let err = client.get_diff("x", &options).await.unwrap_err();
    assert_eq!(err.message, "Diff generation failed");
}

#[tokio::test]
async fn error_status_with_envelope_is_treated_as_rejection() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/convert"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "code": 5, "msg": "text too long"
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client
        .convert_subtitle("x", &ConvertOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.message, "text too long");
    assert_eq!(err.kind, FailureKind::Rejected { code: 5 });
}

#[tokio::test]
async fn error_status_without_envelope_is_a_transport_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/convert"))
        .respond_with(ResponseTemplate::new(502).set_body_string("<html>bad gateway</html>"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let options = ConvertOptions::default();
    let err = client.convert_subtitle("x", &options).await.unwrap_err();
    assert_eq!(err.kind, FailureKind::HttpStatus(502));
    assert_eq!(err.message, "Network error during conversion");

    let err = client.get_diff("x", &options).await.unwrap_err();
    assert_eq!(err.kind, FailureKind::HttpStatus(502));
    assert_eq!(err.message, "Network error during diff generation");
}

#[tokio::test]
async fn unreachable_service_yields_generic_network_message() {
    let client = ZhConvertClient::new(ClientSettings {
        base_url: "http://127.0.0.1:1".to_string(),
        connect_timeout: Duration::from_millis(500),
        ..ClientSettings::default()
    })
    .unwrap();

    let options = ConvertOptions::default();
    let err = client.convert_subtitle("x", &options).await.unwrap_err();
    assert_eq!(err.message, "Network error during conversion");
    let err = client.get_diff("x", &options).await.unwrap_err();
    assert_eq!(err.message, "Network error during diff generation");
}

#[tokio::test]
async fn slow_service_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/convert"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(250))
                .set_body_json(json!({ "code": 0, "msg": "", "data": { "text": "late" } })),
        )
        .mount(&server)
        .await;

    let client = ZhConvertClient::new(ClientSettings {
        base_url: server.uri(),
        request_timeout: Duration::from_millis(50),
        ..ClientSettings::default()
    })
    .unwrap();
    let err = client
        .convert_subtitle("x", &ConvertOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind, FailureKind::Timeout);
}

#[tokio::test]
async fn base_url_with_path_prefix_is_preserved() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/convert"))
        .respond_with(ReverseResponder)
        .mount(&server)
        .await;

    let client = ZhConvertClient::new(ClientSettings {
        base_url: format!("{}/api", server.uri()),
        ..ClientSettings::default()
    })
    .unwrap();
    let text = client
        .convert_subtitle("12", &ConvertOptions::default())
        .await
        .unwrap();
    assert_eq!(text, "21");
}

#[tokio::test]
async fn check_connection_records_service_info() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/service-info"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "msg": "",
            "data": {
                "converters": { "Taiwan": { "name": "台灣化" } },
                "modules": { "Typo": { "isManual": false } },
                "version": "1.2.3"
            }
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let state = client.check_connection().await;
    assert!(state.is_connected);
    assert!(!state.is_checking);
    assert_eq!(state.error, None);
    let info = state.service_info.unwrap();
    assert_eq!(info.version, "1.2.3");
    assert!(info.converters.contains_key("Taiwan"));
    assert!(info.modules.contains_key("Typo"));
    assert!(client.connection().is_connected);
}

#[tokio::test]
async fn failed_check_keeps_previous_service_info() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/service-info"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0, "msg": "", "data": { "version": "9" }
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/service-info"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 2, "msg": "maintenance"
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    assert!(client.check_connection().await.is_connected);

    let state = client.check_connection().await;
    assert!(!state.is_connected);
    assert_eq!(state.error.as_deref(), Some("maintenance"));
    assert_eq!(state.service_info.map(|info| info.version), Some("9".to_string()));
}

#[tokio::test]
async fn check_against_unreachable_service_reports_error() {
    let client = ZhConvertClient::new(ClientSettings {
        base_url: "http://127.0.0.1:1".to_string(),
        connect_timeout: Duration::from_millis(500),
        ..ClientSettings::default()
    })
    .unwrap();

    let state = client.check_connection().await;
    assert!(!state.is_connected);
    assert!(!state.is_checking);
    assert!(state.error.is_some_and(|message| !message.is_empty()));
    assert_eq!(state.service_info, None);
}
