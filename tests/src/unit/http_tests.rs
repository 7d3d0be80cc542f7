use docent_core::files::PDF_MEDIA_TYPE;
use docent_core::{ApiError, ClientSettings, CredentialStore, DocentClient, UploadFile};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

struct Captured {
    head: String,
    body: Vec<u8>,
}

impl Captured {
    fn header_block(&self) -> String {
        self.head.to_ascii_lowercase()
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

async fn read_request(stream: &mut TcpStream) -> Captured {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let head_end = loop {
        if let Some(pos) = find(&buf, b"\r\n\r\n") {
            break pos + 4;
        }
        let n = stream.read(&mut chunk).await.expect("read head");
        assert!(n > 0, "connection closed before headers");
        buf.extend_from_slice(&chunk[..n]);
    };
    let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
    let lower = head.to_ascii_lowercase();
    let content_length = lower
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|value| value.trim().parse::<usize>().ok());
    let chunked = lower.contains("transfer-encoding: chunked");

    let mut body = buf[head_end..].to_vec();
    loop {
        let complete = match content_length {
            Some(len) => body.len() >= len,
            None if chunked => find(&body, b"0\r\n\r\n").is_some(),
            None => true,
        };
        if complete {
            break;
        }
        let n = stream.read(&mut chunk).await.expect("read body");
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }
    Captured { head, body }
}

fn response(status: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    )
}

/// Serves one canned response per connection, in order.
async fn serve(responses: Vec<String>) -> (String, JoinHandle<Vec<Captured>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let base_url = format!("http://{}", listener.local_addr().expect("addr"));
    let handle = tokio::spawn(async move {
        let mut captured = Vec::new();
        for reply in responses {
            let (mut stream, _) = listener.accept().await.expect("accept");
            captured.push(read_request(&mut stream).await);
            stream.write_all(reply.as_bytes()).await.expect("write");
            stream.shutdown().await.ok();
        }
        captured
    });
    (base_url, handle)
}

fn client(base_url: &str, timeout: Duration) -> DocentClient {
    let settings = ClientSettings::default()
        .with_base_url(base_url)
        .with_timeout(timeout)
        .with_data_dir(None);
    DocentClient::from_settings(&settings)
}

#[tokio::test]
async fn login_then_list_sends_json_and_bearer_token() {
    let (base_url, server) = serve(vec![
        response(
            "200 OK",
            r#"{"user":{"id":"u-1","email":"ada@example.com","name":"Ada"}}"#,
        ),
        response("200 OK", r#"{"documents":[]}"#),
    ])
    .await;
    let client = client(&base_url, Duration::from_secs(5));

    let profile = client
        .session
        .login("ada@example.com", "pw")
        .await
        .expect("login");
    let documents = client.files.list_user_documents(&profile.id).await.expect("list");
    assert!(documents.is_empty());

    let captured = server.await.expect("server");
    let login = &captured[0];
    assert!(login.head.starts_with("POST /auth/login HTTP/1.1"));
    assert!(login.header_block().contains("content-type: application/json"));
    assert!(!login.header_block().contains("authorization:"));
    let sent: Value = serde_json::from_slice(&login.body).expect("json body");
    assert_eq!(sent, json!({"email": "ada@example.com", "password": "pw"}));

    let list = &captured[1];
    assert!(list.head.starts_with("GET /documents/user/u-1 HTTP/1.1"));
    assert!(list.header_block().contains("authorization: bearer token_u-1"));
    assert!(list.body.is_empty());
}

#[tokio::test]
async fn upload_goes_out_as_multipart() {
    let (base_url, server) = serve(vec![response(
        "200 OK",
        r#"{"doc_id":"d-1","meta":{"filename":"contract.pdf"},"summary":["x"]}"#,
    )])
    .await;
    let client = client(&base_url, Duration::from_secs(5));
    let file = UploadFile::new("contract.pdf", PDF_MEDIA_TYPE, b"%PDF-1.7 test".to_vec());

    let record = client
        .files
        .upload_document(Some(&file), "u-1")
        .await
        .expect("upload");
    assert_eq!(record.id, "d-1");

    let captured = server.await.expect("server");
    let upload = &captured[0];
    assert!(upload.head.starts_with("POST /documents/upload HTTP/1.1"));
    assert!(upload
        .header_block()
        .contains("content-type: multipart/form-data; boundary="));
    let body = String::from_utf8_lossy(&upload.body);
    assert!(body.contains(r#"name="file"; filename="contract.pdf""#));
    assert!(body.contains("%PDF-1.7 test"));
    assert!(body.contains(r#"name="user_id""#));
}

#[tokio::test]
async fn no_content_and_error_bodies_are_normalized() {
    let (base_url, server) = serve(vec![
        "HTTP/1.1 204 No Content\r\nConnection: close\r\n\r\n".to_string(),
        "HTTP/1.1 422 Unprocessable Entity\r\nContent-Type: text/plain\r\nContent-Length: 15\r\nConnection: close\r\n\r\nquery too long!"
            .to_string(),
    ])
    .await;
    let client = client(&base_url, Duration::from_secs(5));

    let summary = client.documents.get_summary("doc-1").await.expect("summary");
    assert_eq!(summary.content, Value::Null);
    assert_eq!(summary.word_count, 0);

    let err = client
        .documents
        .chat_with_document("u-1", "hi")
        .await
        .unwrap_err();
    assert_eq!(
        err,
        ApiError::Http {
            status: 422,
            message: "query too long!".into()
        }
    );
    server.await.expect("server");
}

#[tokio::test]
async fn unanswered_request_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let base_url = format!("http://{}", listener.local_addr().expect("addr"));
    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.expect("accept");
        let _ = read_request(&mut stream).await;
        tokio::time::sleep(Duration::from_secs(5)).await;
    });
    let client = client(&base_url, Duration::from_millis(200));

    let err = client.documents.get_summary("doc-1").await.unwrap_err();

    assert_eq!(err, ApiError::Timeout);
    assert_eq!(err.to_string(), "Request timed out. Please try again.");
    server.abort();
}

#[tokio::test]
async fn unreachable_server_is_a_network_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let base_url = format!("http://{}", listener.local_addr().expect("addr"));
    drop(listener);
    let client = client(&base_url, Duration::from_secs(5));
    client.credentials().set("token_1");

    let err = client.files.list_user_documents("u-1").await.unwrap_err();

    assert!(matches!(err, ApiError::Network { .. }));
    assert_eq!(err.to_string(), "An unexpected network error occurred.");
    assert!(client.credentials().is_authenticated());
}

#[tokio::test]
async fn persistent_credentials_follow_the_data_dir() {
    let dir = tempfile::TempDir::new().expect("temp dir");
    let settings = ClientSettings::default().with_data_dir(Some(dir.path().to_path_buf()));

    DocentClient::from_settings(&settings).credentials().set("token_9");
    let restored = DocentClient::from_settings(&settings);
    assert_eq!(restored.credentials().get().as_deref(), Some("token_9"));

    restored.session.logout();
    let after_logout = CredentialStore::persistent(dir.path());
    assert_eq!(after_logout.get(), None);
}
