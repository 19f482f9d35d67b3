/// Integration test: drive the API client against a canned HTTP responder
/// on loopback and verify the request shape and the JSON passthrough.
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use spektr_api::ApiClient;

/// Accepts one connection, reads the full request (headers + body), replies
/// with the given JSON and closes. Returns the raw request text.
async fn canned_responder(listener: TcpListener, reply: &'static str) -> String {
    let (mut socket, _) = listener.accept().await.unwrap();

    let mut buf = vec![0u8; 16 * 1024];
    let mut read = 0;
    loop {
        let n = socket.read(&mut buf[read..]).await.unwrap();
        if n == 0 {
            break;
        }
        read += n;
        let text = String::from_utf8_lossy(&buf[..read]);
        if let Some(header_end) = text.find("\r\n\r\n") {
            let content_length = text
                .lines()
                .find_map(|l| l.to_ascii_lowercase().strip_prefix("content-length:").map(str::trim).map(String::from))
                .and_then(|v| v.parse::<usize>().ok())
                .unwrap_or(0);
            if read >= header_end + 4 + content_length {
                break;
            }
        }
    }

    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        reply.len(),
        reply
    );
    socket.write_all(response.as_bytes()).await.unwrap();
    socket.shutdown().await.unwrap();

    String::from_utf8_lossy(&buf[..read]).into_owned()
}

#[tokio::test]
async fn login_posts_action_and_passes_response_through() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server =
        tokio::spawn(canned_responder(listener, r#"{"success":true,"userId":"u-1"}"#));

    let client = ApiClient::new(format!("http://{addr}"));
    let value = client.login("alice", "pw").await.unwrap();

    assert_eq!(value["success"], serde_json::json!(true));
    assert_eq!(value["userId"], "u-1");

    let request = server.await.unwrap();
    assert!(request.starts_with("POST /?action=login HTTP/1.1"));
    assert!(request.contains(r#""username":"alice""#));
    assert!(request.contains(r#""password":"pw""#));
}

#[tokio::test]
async fn search_users_sends_query_and_user_id() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(canned_responder(listener, "[]"));

    let client = ApiClient::new(format!("http://{addr}"));
    let value = client.search_users("bob", "u-1").await.unwrap();
    assert!(value.as_array().unwrap().is_empty());

    let request = server.await.unwrap();
    assert!(request.starts_with("POST /?action=search_users HTTP/1.1"));
    assert!(request.contains(r#""query":"bob""#));
    assert!(request.contains(r#""userId":"u-1""#));
}
