use std::time::Duration;

use ablesync_core::{FileAccess, StorageClient, StorageError};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn get_access_link_requests_write_link_for_key() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/objects/access"))
        .and(header("authorization", "Bearer test-token"))
        .and(body_json(json!({
            "key": "projects/p1/audiofiles/a1",
            "access": "write",
            "expires_in": 3600
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "href": "https://blobs.example/projects/p1/audiofiles/a1?sig=abc",
            "method": "PUT",
            "expires_at": 1_700_003_600
        })))
        .mount(&server)
        .await;

    let client = StorageClient::new(&server.uri(), Some("test-token".into())).unwrap();
    let link = client
        .get_access_link(
            "projects/p1/audiofiles",
            "a1",
            Duration::from_secs(3600),
            FileAccess::Write,
        )
        .await
        .unwrap();

    assert_eq!(
        link.href.as_str(),
        "https://blobs.example/projects/p1/audiofiles/a1?sig=abc"
    );
    assert_eq!(link.method, "PUT");
    assert_eq!(link.expires_at, Some(1_700_003_600));
}

#[tokio::test]
async fn get_access_link_surfaces_gateway_errors() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/objects/access"))
        .respond_with(ResponseTemplate::new(403).set_body_string("denied"))
        .mount(&server)
        .await;

    let client = StorageClient::new(&server.uri(), None).unwrap();
    let err = client
        .get_access_link("projects/p1", "a1", Duration::from_secs(60), FileAccess::Read)
        .await
        .unwrap_err();

    match err {
        StorageError::Api { status, body } => {
            assert_eq!(status.as_u16(), 403);
            assert_eq!(body, "denied");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn file_exists_maps_status_codes() {
    let server = MockServer::start().await;

    Mock::given(method("HEAD"))
        .and(path("/v1/objects/projects/p1/audiofiles/present"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/v1/objects/projects/p1/audiofiles/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = StorageClient::new(&server.uri(), None).unwrap();
    assert!(
        client
            .file_exists("projects/p1/audiofiles", "present")
            .await
            .unwrap()
    );
    assert!(
        !client
            .file_exists("projects/p1/audiofiles", "missing")
            .await
            .unwrap()
    );
}
