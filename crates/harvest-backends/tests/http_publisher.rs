//! Publisher against a one-shot local HTTP server

use harvest_backends::HttpPublisher;
use harvest_core::{PublishError, PublishRequest, Publisher};
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Accept one connection, answer with `status` and `body`, return the raw request
async fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut raw = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            raw.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&raw);
            if let Some(split) = text.find("\r\n\r\n") {
                let length = text[..split]
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())?
                    })
                    .unwrap_or(0);
                if raw.len() >= split + 4 + length {
                    break;
                }
            }
            if n == 0 {
                break;
            }
        }
        let response = format!(
            "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        String::from_utf8_lossy(&raw).into_owned()
    });
    (base, handle)
}

fn request(base_url: String) -> PublishRequest {
    PublishRequest {
        domain: "example.com".into(),
        document: "# Example".into(),
        base_url: format!("{base_url}/"),
        secret: "s3cret".into(),
    }
}

#[tokio::test]
async fn accepted_submission() {
    let (base, server) = serve_once("200 OK", r#"{"stored":true}"#).await;
    let outcome = HttpPublisher::new()
        .unwrap()
        .publish(&request(base))
        .await
        .unwrap();

    assert!(outcome.success);
    assert_eq!(outcome.response, Some(json!({"stored": true})));

    let raw = server.await.unwrap();
    assert!(raw.starts_with("POST /api/submit-llms-txt "));
    assert!(raw.to_ascii_lowercase().contains("x-actor-secret: s3cret"));
    assert!(raw.contains(r##"{"domain":"example.com","llms_txt":"# Example"}"##));
}

#[tokio::test]
async fn rejected_submission_keeps_status() {
    let (base, server) = serve_once("403 Forbidden", r#"{"error":"bad secret"}"#).await;
    let outcome = HttpPublisher::new()
        .unwrap()
        .publish(&request(base))
        .await
        .unwrap();

    assert!(!outcome.success);
    assert_eq!(outcome.status, Some(403));
    assert_eq!(outcome.error, Some(json!({"error": "bad secret"})));
    server.await.unwrap();
}

#[tokio::test]
async fn unreachable_endpoint_is_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let err = HttpPublisher::new()
        .unwrap()
        .publish(&request(base))
        .await
        .unwrap_err();
    assert!(matches!(err, PublishError::Transport(_)));
}
