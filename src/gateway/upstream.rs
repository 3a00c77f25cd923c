use std::time::Duration;

use axum::http::HeaderMap;
use bytes::Bytes;
use futures_util::StreamExt;
use reqwest::Body as ReqwestBody;

use super::GatewayError;

const MAX_REDIRECTS: usize = 10;

/// Headers that only make sense for a single hop, plus ones the client
/// recomputes for the outgoing request.
const HOP_BY_HOP_HEADERS: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-connection",
    "proxy-authorization",
    "proxy-authenticate",
    "te",
    "trailer",
    "upgrade",
];

/// Issues the single upstream call for a request. Holds no per-request state.
#[derive(Clone, Debug)]
pub struct UpstreamClient {
    client: reqwest::Client,
}

impl UpstreamClient {
    pub fn new(request_timeout: Duration) -> crate::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()?;
        Ok(Self { client })
    }

    pub async fn send(
        &self,
        method: reqwest::Method,
        url: &str,
        headers: HeaderMap,
        body: Option<ReqwestBody>,
    ) -> Result<reqwest::Response, GatewayError> {
        let mut req = self.client.request(method, url).headers(headers);
        if let Some(body) = body {
            req = req.body(body);
        }
        req.send().await.map_err(|err| GatewayError::Upstream {
            message: format!("upstream request failed: {err}"),
        })
    }
}

/// Prepares client headers for forwarding upstream.
pub fn sanitize_request_headers(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP_HEADERS {
        headers.remove(name);
    }
    headers.remove("host");
    headers.remove("content-length");
    headers.remove("transfer-encoding");
}

/// Prepares upstream headers for relaying back to the client.
pub fn sanitize_response_headers(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP_HEADERS {
        headers.remove(name);
    }
    headers.remove("transfer-encoding");
}

pub async fn read_body_bounded(
    response: reqwest::Response,
    max_bytes: usize,
) -> Result<Bytes, GatewayError> {
    let max_bytes = max_bytes.max(1);
    let content_length = response.content_length();
    if content_length.is_some_and(|len| len > max_bytes as u64) {
        return Err(GatewayError::Upstream {
            message: format!("upstream content-length={content_length:?} exceeds {max_bytes} bytes"),
        });
    }

    let mut stream = response.bytes_stream();
    let mut buffered = bytes::BytesMut::new();
    while let Some(next) = stream.next().await {
        let chunk = next.map_err(|err| GatewayError::Upstream {
            message: format!("upstream body read failed: {err}"),
        })?;
        if buffered.len().saturating_add(chunk.len()) > max_bytes {
            return Err(GatewayError::Upstream {
                message: format!("upstream body exceeded {max_bytes} bytes"),
            });
        }
        buffered.extend_from_slice(chunk.as_ref());
    }
    Ok(buffered.freeze())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn client_builds_with_timeout() {
        assert!(UpstreamClient::new(Duration::from_secs(5)).is_ok());
    }

    #[test]
    fn request_headers_drop_hop_by_hop_host_and_length() {
        let mut headers = HeaderMap::new();
        headers.insert("host", HeaderValue::from_static("relay.example"));
        headers.insert("content-length", HeaderValue::from_static("12"));
        headers.insert("connection", HeaderValue::from_static("keep-alive"));
        headers.insert("keep-alive", HeaderValue::from_static("timeout=5"));
        headers.insert("transfer-encoding", HeaderValue::from_static("chunked"));
        headers.insert("upgrade", HeaderValue::from_static("websocket"));
        headers.insert("proxy-authorization", HeaderValue::from_static("secret"));
        headers.insert("authorization", HeaderValue::from_static("Bearer sk-test"));
        headers.insert("x-test", HeaderValue::from_static("ok"));

        sanitize_request_headers(&mut headers);

        for name in [
            "host",
            "content-length",
            "connection",
            "keep-alive",
            "transfer-encoding",
            "upgrade",
            "proxy-authorization",
        ] {
            assert!(headers.get(name).is_none(), "{name} should be removed");
        }
        assert_eq!(headers.get("authorization").unwrap(), "Bearer sk-test");
        assert_eq!(headers.get("x-test").unwrap(), "ok");
    }

    #[test]
    fn response_headers_keep_content_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static("application/json"));
        headers.insert("content-length", HeaderValue::from_static("2"));
        headers.insert("connection", HeaderValue::from_static("close"));
        headers.insert("transfer-encoding", HeaderValue::from_static("chunked"));

        sanitize_response_headers(&mut headers);

        assert!(headers.get("connection").is_none());
        assert!(headers.get("transfer-encoding").is_none());
        assert_eq!(headers.get("content-type").unwrap(), "application/json");
        assert_eq!(headers.get("content-length").unwrap(), "2");
    }
}
