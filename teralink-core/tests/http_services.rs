use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use teralink_core::{
    ChatRef, ChatTransport, HttpResolver, LinkResolver, MemberStatus, OutgoingMessage,
    ResolutionOutcome, ResolverSection, TelegramSection, TelegramTransport, TransportError,
};

/// Serves a single canned HTTP response and hands back the raw request.
async fn serve_once(status: &'static str, body: &'static str, delay: Duration) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = format!("http://{}", listener.local_addr().unwrap());
    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let request = read_request(&mut socket).await;
        tokio::time::sleep(delay).await;
        let response = format!(
            "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        let _ = socket.write_all(response.as_bytes()).await;
        let _ = socket.shutdown().await;
        request
    });
    (address, handle)
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let read = socket.read(&mut chunk).await.unwrap();
        if read == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..read]);
        let text = String::from_utf8_lossy(&buffer);
        if let Some(head_end) = text.find("\r\n\r\n") {
            let length = text[..head_end]
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if buffer.len() >= head_end + 4 + length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

fn resolver_section(endpoint: String, timeout_seconds: u64) -> ResolverSection {
    ResolverSection {
        endpoint,
        api_key: "secret-key".into(),
        api_key_header: "xAPIverse-Key".into(),
        timeout_seconds,
        domain_markers: vec!["terabox".into()],
    }
}

fn telegram_section(api_base: String) -> TelegramSection {
    TelegramSection {
        bot_token: "123:abc".into(),
        api_base,
        poll_timeout_seconds: 1,
        request_timeout_seconds: 5,
    }
}

#[tokio::test]
async fn resolver_posts_link_with_key_header_and_normalizes() {
    let body = r#"{"list":[{"name":"Movie.mkv","size":"2048","fast_stream_url":{"720p":"https://x/720.m3u8"},"download_link":"https://x/dl"}]}"#;
    let (address, server) = serve_once("200 OK", body, Duration::ZERO).await;
    let resolver = HttpResolver::new(&resolver_section(format!("{address}/api/terabox"), 5));

    let outcome = resolver.resolve("https://terabox.com/s/abc").await;
    let ResolutionOutcome::Success(record) = outcome else {
        panic!("expected success, got {outcome:?}");
    };
    assert_eq!(record.name, "Movie.mkv");
    assert_eq!(record.size_bytes, Some(2048));
    assert_eq!(record.download_url.as_deref(), Some("https://x/dl"));

    let request = server.await.unwrap();
    assert!(request.starts_with("POST /api/terabox "));
    assert!(request.to_ascii_lowercase().contains("xapiverse-key: secret-key"));
    assert!(request.contains(r#"{"url":"https://terabox.com/s/abc"}"#));
}

#[tokio::test]
async fn resolver_reports_upstream_status() {
    let (address, _server) =
        serve_once("503 Service Unavailable", r#"{"error":"busy"}"#, Duration::ZERO).await;
    let resolver = HttpResolver::new(&resolver_section(address, 5));
    assert_eq!(
        resolver.resolve("https://terabox.com/s/abc").await,
        ResolutionOutcome::UpstreamError(503)
    );
}

#[tokio::test]
async fn resolver_treats_undecodable_body_as_transport_failure() {
    let (address, _server) = serve_once("200 OK", "<html>oops</html>", Duration::ZERO).await;
    let resolver = HttpResolver::new(&resolver_section(address, 5));
    assert!(matches!(
        resolver.resolve("https://terabox.com/s/abc").await,
        ResolutionOutcome::TransportFailure(_)
    ));
}

#[tokio::test]
async fn resolver_without_links_is_not_found() {
    let (address, _server) = serve_once("200 OK", r#"{"list":[]}"#, Duration::ZERO).await;
    let resolver = HttpResolver::new(&resolver_section(address, 5));
    assert_eq!(
        resolver.resolve("https://terabox.com/s/abc").await,
        ResolutionOutcome::NotFound
    );
}

#[tokio::test]
async fn resolver_timeout_is_transport_failure() {
    let (address, _server) = serve_once("200 OK", "{}", Duration::from_secs(5)).await;
    let resolver = HttpResolver::new(&resolver_section(address, 1));
    assert!(matches!(
        resolver.resolve("https://terabox.com/s/abc").await,
        ResolutionOutcome::TransportFailure(_)
    ));
}

#[tokio::test]
async fn telegram_member_status_is_decoded() {
    let body = r#"{"ok":true,"result":{"status":"administrator","user":{"id":42}}}"#;
    let (address, server) = serve_once("200 OK", body, Duration::ZERO).await;
    let transport = TelegramTransport::new(&telegram_section(address));

    let status = transport
        .member_status(&ChatRef::parse("@terabox_directlinks"), 42)
        .await
        .unwrap();
    assert_eq!(status, MemberStatus::Administrator);

    let request = server.await.unwrap();
    assert!(request.starts_with("POST /bot123:abc/getChatMember "));
    assert!(request.contains(r#""chat_id":"@terabox_directlinks""#));
    assert!(request.contains(r#""user_id":42"#));
}

#[tokio::test]
async fn telegram_error_envelope_becomes_api_error() {
    let body = r#"{"ok":false,"error_code":400,"description":"Bad Request: chat not found"}"#;
    let (address, _server) = serve_once("400 Bad Request", body, Duration::ZERO).await;
    let transport = TelegramTransport::new(&telegram_section(address));

    let err = transport
        .send(&ChatRef::parse("@missing"), &OutgoingMessage::text("hi"))
        .await
        .unwrap_err();
    match err {
        TransportError::Api {
            method,
            code,
            description,
        } => {
            assert_eq!(method, "sendMessage");
            assert_eq!(code, Some(400));
            assert!(description.contains("chat not found"));
        }
        other => panic!("expected api error, got {other:?}"),
    }
}

#[tokio::test]
async fn telegram_send_returns_message_reference() {
    let body = r#"{"ok":true,"result":{"message_id":77,"chat":{"id":-100123,"type":"channel"},"text":"hi"}}"#;
    let (address, server) = serve_once("200 OK", body, Duration::ZERO).await;
    let transport = TelegramTransport::new(&telegram_section(address));

    let message = OutgoingMessage::text("hi").with_action("Download", "https://x/dl");
    let sent = transport
        .send(&ChatRef::parse("@terabox_directlinks"), &message)
        .await
        .unwrap();
    assert_eq!(sent.chat_id, -100123);
    assert_eq!(sent.message_id, 77);

    let request = server.await.unwrap();
    assert!(request.contains(r#""inline_keyboard":[[{"text":"Download","url":"https://x/dl"}]]"#));
}
