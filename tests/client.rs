//! The completion client against a local HTTP server serving canned responses.

use futures::StreamExt;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use chatgpt_cli::{
    ApiCredentials, CompletionRequest, CompletionResult, Completions, Error, GenerationSettings,
    ModelTier, OpenAi,
};

/// Accepts one connection, answers with `response`, and yields the raw request.
async fn serve_once(response: String) -> (OpenAi, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind local test server");
    let addr = listener.local_addr().expect("local addr");

    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.expect("accept connection");
        let request = read_request(&mut socket).await;
        socket
            .write_all(response.as_bytes())
            .await
            .expect("write response");
        let _ = socket.shutdown().await;
        request
    });

    let credentials = ApiCredentials::new("test-key")
        .unwrap()
        .with_base_url(&format!("http://{addr}/v1"))
        .unwrap();
    (OpenAi::new(credentials).unwrap(), server)
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
    let mut raw = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        let n = socket.read(&mut buf).await.expect("read request");
        if n == 0 {
            break;
        }
        raw.extend_from_slice(&buf[..n]);
        let text = String::from_utf8_lossy(&raw);
        if let Some(end) = text.find("\r\n\r\n") {
            let length = text[..end]
                .lines()
                .filter_map(|line| line.split_once(':'))
                .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
                .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if raw.len() >= end + 4 + length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&raw).into_owned()
}

fn json_response(status: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    )
}

fn request() -> CompletionRequest {
    CompletionRequest::for_tier(ModelTier::Gpt4, "Say hi", GenerationSettings::default())
}

#[tokio::test]
async fn buffered_completion_returns_the_text() {
    let body = r#"{"id":"chatcmpl-1","choices":[{"index":0,"message":{"role":"assistant","content":"Hi!"},"finish_reason":"stop"}]}"#;
    let (client, server) = serve_once(json_response("200 OK", body)).await;

    let result = client.complete(&request()).await.unwrap();
    assert_eq!(result, CompletionResult::Full("Hi!".to_string()));

    let raw = server.await.unwrap();
    assert!(raw.starts_with("POST /v1/chat/completions"));
    assert!(raw.to_ascii_lowercase().contains("authorization: bearer test-key"));
    assert!(raw.contains(r#""model":"gpt-4""#));
    assert!(raw.contains(r#""stream":false"#));
    assert!(raw.contains(r#""content":"Say hi""#));
}

#[tokio::test]
async fn error_payload_is_returned_as_text() {
    let body = r#"{"error":{"message":"That model is currently overloaded with other requests.","type":"server_error","param":null,"code":null}}"#;
    let (client, server) = serve_once(json_response("200 OK", body)).await;

    let result = client.complete(&request()).await.unwrap();
    assert_eq!(
        result.text(),
        "That model is currently overloaded with other requests."
    );
    assert!(result.is_service_message());
    server.await.unwrap();
}

#[tokio::test]
async fn empty_response_is_no_response() {
    let (client, server) = serve_once(json_response("200 OK", "")).await;

    let err = client.complete(&request()).await.unwrap_err();
    assert!(err.is_no_response(), "unexpected error: {err}");
    server.await.unwrap();
}

#[tokio::test]
async fn rejected_credentials_are_authentication_errors() {
    let body = r#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error","code":"invalid_api_key"}}"#;
    let (client, server) = serve_once(json_response("401 Unauthorized", body)).await;

    let err = client.complete(&request()).await.unwrap_err();
    assert!(err.is_authentication());
    assert!(err.to_string().contains("Incorrect API key provided"));
    server.await.unwrap();
}

#[tokio::test]
async fn streamed_completion_yields_fragments() {
    let events = [
        r#"data: {"choices":[{"index":0,"delta":{"role":"assistant"},"finish_reason":null}]}"#,
        r#"data: {"choices":[{"index":0,"delta":{"content":"Hel"},"finish_reason":null}]}"#,
        r#"data: {"choices":[{"index":0,"delta":{"content":"lo"},"finish_reason":null}]}"#,
        r#"data: {"choices":[{"index":0,"delta":{},"finish_reason":"stop"}]}"#,
        "data: [DONE]",
    ];
    let body: String = events.iter().map(|e| format!("{e}\n\n")).collect();
    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nConnection: close\r\n\r\n{body}"
    );
    let (client, server) = serve_once(response).await;

    let stream = client.complete_stream(&request()).await.unwrap();
    let fragments: Vec<_> = stream.map(|f| f.unwrap()).collect().await;

    let text: String = fragments.iter().map(|f| f.text.as_str()).collect();
    assert_eq!(text, "Hello");
    assert!(fragments.last().unwrap().is_final);
    assert_eq!(fragments.iter().filter(|f| f.is_final).count(), 1);

    let raw = server.await.unwrap();
    assert!(raw.contains(r#""stream":true"#));
    assert!(raw.to_ascii_lowercase().contains("accept: text/event-stream"));
}

#[tokio::test]
async fn rate_limited_stream_ends_without_fragments() {
    let body = r#"{"error":{"message":"Rate limit reached for requests","type":"requests","code":"rate_limit_exceeded"}}"#;
    let response = format!(
        "HTTP/1.1 429 Too Many Requests\r\nContent-Type: application/json\r\nRetry-After: 7\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    let (client, server) = serve_once(response).await;

    let mut stream = client.complete_stream(&request()).await.unwrap();
    assert!(stream.next().await.is_none());
    assert!(stream.is_rate_limited());
    assert!(matches!(
        stream.rate_limit(),
        Some(Error::RateLimit {
            retry_after: Some(7),
            ..
        })
    ));
    server.await.unwrap();
}

#[tokio::test]
async fn unreachable_service_is_a_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let credentials = ApiCredentials::new("test-key")
        .unwrap()
        .with_base_url(&format!("http://{addr}/v1"))
        .unwrap();
    let client = OpenAi::new(credentials).unwrap();

    let err = client.complete(&request()).await.unwrap_err();
    assert!(err.is_transport(), "unexpected error: {err:?}");
}
