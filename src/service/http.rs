//! Shared HTTP plumbing for the backend clients.

use std::time::Duration;

use super::error::ServiceError;
use crate::config::BackendConfig;

/// Build the `reqwest` client both backend clients share.
///
/// The client carries the per-request timeout from `config.timeout_secs`.
/// A default (no-timeout) client is used if the builder fails.
pub fn build_client(config: &BackendConfig) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .unwrap_or_else(|e| {
            log::warn!("http: client builder failed ({e}); using defaults");
            reqwest::Client::new()
        })
}

/// Read a response body as a JSON envelope.
///
/// Non-2xx responses are still accepted when the body is JSON, because the
/// backend reports its own failures inside the envelope.
pub(crate) async fn read_envelope(
    response: reqwest::Response,
) -> Result<serde_json::Value, ServiceError> {
    let status = response.status();
    let body = response.text().await?;

    match serde_json::from_str::<serde_json::Value>(&body) {
        Ok(value) => {
            if !status.is_success() {
                log::warn!("http: backend answered HTTP {status}");
            }
            Ok(value)
        }
        Err(e) if status.is_success() => Err(ServiceError::Parse(e.to_string())),
        Err(_) => Err(ServiceError::Parse(format!(
            "HTTP {status}: {}",
            body.chars().take(200).collect::<String>()
        ))),
    }
}

/// A one-request HTTP server on `127.0.0.1` for exercising the clients
/// over a real socket.
#[cfg(test)]
pub(crate) mod test_server {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::task::JoinHandle;

    /// Serve one canned response. Returns the base URL and a handle that
    /// yields the raw request the server received.
    pub(crate) async fn serve_once(
        status: &str,
        content_type: &str,
        body: &str,
    ) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: {content_type}\r\n\
             Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.expect("accept");
            let request = read_request(&mut socket).await;
            socket.write_all(response.as_bytes()).await.expect("write");
            let _ = socket.shutdown().await;
            request
        });

        (format!("http://{addr}"), handle)
    }

    pub(crate) fn client() -> reqwest::Client {
        reqwest::Client::builder()
            .no_proxy()
            .timeout(std::time::Duration::from_secs(5))
            .build()
            .expect("client")
    }

    async fn read_request(socket: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.expect("read");
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            if request_complete(&buf) {
                break;
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    fn request_complete(buf: &[u8]) -> bool {
        let Some(header_end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
            return false;
        };
        let body_start = header_end + 4;
        let headers = String::from_utf8_lossy(&buf[..header_end]).to_ascii_lowercase();

        if headers.contains("transfer-encoding: chunked") {
            return buf[body_start..].ends_with(b"0\r\n\r\n");
        }
        let content_length = headers
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .and_then(|value| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        buf.len() >= body_start + content_length
    }
}

#[cfg(test)]
mod tests {
    use super::test_server::{client, serve_once};
    use super::*;

    async fn fetch(
        status: &str,
        content_type: &str,
        body: &str,
    ) -> Result<serde_json::Value, ServiceError> {
        let (url, server) = serve_once(status, content_type, body).await;
        let response = client().get(&url).send().await.expect("send");
        let result = read_envelope(response).await;
        server.await.expect("server task");
        result
    }

    #[tokio::test]
    async fn success_body_is_returned_as_json() {
        let value = fetch("200 OK", "application/json", r#"{"status":"success","n":1}"#)
            .await
            .expect("envelope");
        assert_eq!(value["status"], "success");
        assert_eq!(value["n"], 1);
    }

    #[tokio::test]
    async fn error_status_with_json_body_is_still_an_envelope() {
        let value = fetch(
            "500 Internal Server Error",
            "application/json",
            r#"{"status":"error","message":"model offline"}"#,
        )
        .await
        .expect("envelope");
        assert_eq!(value["message"], "model offline");
    }

    #[tokio::test]
    async fn error_status_with_html_body_is_a_parse_error() {
        let err = fetch("502 Bad Gateway", "text/html", "<html>bad gateway</html>")
            .await
            .unwrap_err();
        match err {
            ServiceError::Parse(message) => {
                assert!(message.starts_with("HTTP 502"), "got {message}");
                assert!(message.contains("<html>bad gateway</html>"));
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn success_status_with_garbage_body_is_a_parse_error() {
        let err = fetch("200 OK", "text/plain", "not json").await.unwrap_err();
        assert!(matches!(err, ServiceError::Parse(ref m) if !m.starts_with("HTTP")));
        assert!(!err.is_connectivity());
    }
}
