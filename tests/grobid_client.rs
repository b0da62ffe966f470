//! HTTP-level tests for `GrobidClient` against a one-shot local server.

use pdf2tei::{GrobidClient, MarkupService, Pdf2TeiError, ServiceConfig};
use std::path::Path;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Accept one connection, capture the raw request, answer with `status`.
async fn one_shot_server(status: &'static str, body: &'static str) -> (u16, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let request = read_request(&mut socket).await;
        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/xml\r\n\
             Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();
        request
    });

    (port, handle)
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);

        let text = String::from_utf8_lossy(&buf);
        if let Some(header_end) = text.find("\r\n\r\n") {
            let headers = text[..header_end].to_ascii_lowercase();
            let content_length = headers
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok());
            let body_len = buf.len() - (header_end + 4);
            match content_length {
                Some(len) if body_len >= len => break,
                None if text.ends_with("--\r\n") || text.ends_with("\r\n0\r\n\r\n") => break,
                _ => {}
            }
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

fn client(port: u16, timeout_secs: u64) -> GrobidClient {
    GrobidClient::new(&ServiceConfig {
        host: "127.0.0.1".into(),
        port,
        timeout_secs,
    })
    .unwrap()
}

#[tokio::test]
async fn ok_response_body_is_returned_verbatim() {
    let (port, server) = one_shot_server("200 OK", "<TEI>...</TEI>").await;

    let tei = client(port, 10)
        .process_fulltext(Path::new("papers/2301.00001.pdf"), b"%PDF-1.4 body".to_vec())
        .await
        .unwrap();
    assert_eq!(tei, "<TEI>...</TEI>");

    let request = server.await.unwrap();
    let lower = request.to_ascii_lowercase();
    assert!(request.starts_with("POST /api/processFulltextDocument HTTP/1.1"), "{request}");
    assert!(lower.contains("accept: application/xml"), "{request}");
    assert!(lower.contains("content-type: multipart/form-data"), "{request}");
    assert!(request.contains(r#"name="input""#), "{request}");
    assert!(request.contains(r#"filename="2301.00001.pdf""#), "{request}");
    assert!(request.contains("%PDF-1.4 body"), "{request}");
}

#[tokio::test]
async fn error_status_is_service_failure() {
    let (port, server) =
        one_shot_server("500 Internal Server Error", "[GENERAL] An exception occurred").await;

    let err = client(port, 10)
        .process_fulltext(Path::new("2301.00001.pdf"), b"%PDF-1.4".to_vec())
        .await
        .unwrap_err();
    server.await.unwrap();

    match &err {
        Pdf2TeiError::ServiceFailure { status, detail, .. } => {
            assert_eq!(*status, 500);
            assert!(detail.contains("An exception occurred"));
        }
        other => panic!("unexpected error: {other}"),
    }
    let msg = err.to_string();
    assert!(msg.contains("HTTP 500"), "{msg}");
    assert!(msg.contains("2301.00001.pdf"), "{msg}");
}

#[tokio::test]
async fn non_200_success_is_still_a_failure() {
    let (port, server) = one_shot_server("202 Accepted", "queued").await;

    let err = client(port, 10)
        .process_fulltext(Path::new("x.pdf"), b"%PDF-1.4".to_vec())
        .await
        .unwrap_err();
    server.await.unwrap();

    assert!(
        matches!(err, Pdf2TeiError::ServiceFailure { status: 202, .. }),
        "{err}"
    );
}

#[tokio::test]
async fn silent_server_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let server = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
        drop(socket);
    });

    let err = client(port, 1)
        .process_fulltext(Path::new("slow.pdf"), b"%PDF-1.4".to_vec())
        .await
        .unwrap_err();
    server.abort();

    match err {
        Pdf2TeiError::ServiceTimeout { secs, .. } => assert_eq!(secs, 1),
        other => panic!("unexpected error: {other}"),
    }
}
