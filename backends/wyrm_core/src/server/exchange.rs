//! Per request response lifecycle.
//!
//! An [`Exchange`] is created for every dispatched request and walks it
//! through `prepare -> process -> finish`. Responses start out buffered
//! (with a running SHA-1 that becomes the `Etag`) unless the handler asks
//! to [`Exchange::stream`] them, in which case headers go out right away
//! and every content write becomes a chunk. A buffered response that grows
//! too large is promoted to streaming on the fly.

use crate::fuzz::{CompressType, FuzzSession};
use crate::server::errors::ServerResult;
use crate::server::restart::RestartPolicy;
use crate::server::router::RouteMatch;
use crate::wire::compress::Compressor;
use crate::wire::simple_http::{Request, Response, HTTP_1_1};
use crate::wire::Wire;
use sha1::{Digest, Sha1};

/// Buffered responses larger than this are switched to chunked streaming.
pub const MAX_BUFFERED_BYTES: usize = 10_000;

pub const NO_HEADERS: [(&str, &str); 0] = [];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

pub struct Exchange<'a> {
    wire: &'a mut dyn Wire,
    request: &'a Request,
    route: RouteMatch,
    session: FuzzSession,
    response: Option<Response>,
    streaming: bool,
    buffer: Vec<u8>,
    hasher: Option<Sha1>,
    closed: bool,
    compress_type: Option<CompressType>,
    compressor: Option<Compressor>,
}

impl<'a> Exchange<'a> {
    pub fn new(
        wire: &'a mut dyn Wire,
        request: &'a Request,
        route: RouteMatch,
        session: FuzzSession,
    ) -> Self {
        let accept_encoding = request.fields.get_str("Accept-Encoding").unwrap_or_default();
        let compress_type = session.compress_type(&accept_encoding);
        let compressor = compress_type.and_then(Compressor::for_type);

        Self {
            wire,
            request,
            route,
            session,
            response: None,
            streaming: false,
            buffer: Vec::new(),
            hasher: None,
            closed: false,
            compress_type,
            compressor,
        }
    }

    #[must_use]
    pub fn request(&self) -> &Request {
        self.request
    }

    #[must_use]
    pub fn route(&self) -> &RouteMatch {
        &self.route
    }

    #[must_use]
    pub fn session(&self) -> &FuzzSession {
        &self.session
    }

    #[must_use]
    pub fn response(&self) -> Option<&Response> {
        self.response.as_ref()
    }

    #[must_use]
    pub fn compress_type(&self) -> Option<CompressType> {
        self.compress_type
    }

    #[must_use]
    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed || self.wire.is_closed()
    }

    /// Restart and method checks that run before the handler.
    pub async fn prepare(
        &mut self,
        allowed_methods: &[&str],
        restart: &RestartPolicy,
    ) -> ServerResult<Flow> {
        if restart.on_dispatch() {
            tracing::info!("Server close");
            self.close().await?;
            return Ok(Flow::Stop);
        }

        tracing::info!(
            "Request: {} {}",
            self.wire
                .peer_addr()
                .map_or_else(|| "-".to_owned(), |addr| addr.to_string()),
            self.route.path
        );

        if !allowed_methods.contains(&self.request.method.as_str()) {
            self.write_header(405, "Method not allow", NO_HEADERS).await?;
            self.finish().await?;
            return Ok(Flow::Stop);
        }

        Ok(Flow::Continue)
    }

    /// Switches to chunked streaming; call before [`Exchange::write_header`].
    pub fn stream(&mut self) {
        self.streaming = true;
    }

    pub async fn write_header<I, K, V>(
        &mut self,
        status: u16,
        reason: &str,
        headers: I,
    ) -> ServerResult<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<[u8]>,
        V: Into<Vec<u8>>,
    {
        let mut response = Response::new(status, reason);
        for (name, value) in headers {
            response.fields.set(name, value);
        }
        self.response = Some(response);

        self.begin_content().await
    }

    async fn begin_content(&mut self) -> ServerResult<()> {
        let Some(response) = self.response.as_mut() else {
            return Ok(());
        };

        if let Some(compress_type) = self.compress_type {
            if !response.fields.contains("Content-Encoding") {
                response
                    .fields
                    .set("Content-Encoding", compress_type.content_encoding());
            }
        }

        if self.streaming {
            if !response.fields.contains("Transfer-Encoding") {
                response.fields.set("Transfer-Encoding", "chunked");
            }
            let head = response.head_bytes();
            self.write(&head).await
        } else {
            self.buffer.clear();
            self.hasher = Some(Sha1::new());
            Ok(())
        }
    }

    /// Body bytes, compressed when the session picked a compressor.
    pub async fn write_content(&mut self, data: &[u8]) -> ServerResult<()> {
        if let Some(compressor) = self.compressor.as_mut() {
            let compressed = compressor.write(data)?;
            if compressed.is_empty() {
                return Ok(());
            }
            return self.write_raw_content(&compressed).await;
        }

        self.write_raw_content(data).await
    }

    async fn write_raw_content(&mut self, data: &[u8]) -> ServerResult<()> {
        if self.streaming {
            return self.write_chunk(data).await;
        }

        self.buffer.extend_from_slice(data);
        if let Some(hasher) = self.hasher.as_mut() {
            hasher.update(data);
        }

        if self.buffer.len() > MAX_BUFFERED_BYTES {
            self.stream();
            self.begin_content().await?;
            let buffered = std::mem::take(&mut self.buffer);
            self.write_chunk(&buffered).await?;
        }

        Ok(())
    }

    /// Writes one chunk of a chunked body. Empty chunks are skipped since
    /// they would terminate the body.
    pub async fn write_chunk(&mut self, data: &[u8]) -> ServerResult<()> {
        if data.is_empty() {
            return Ok(());
        }

        let mut chunk = format!("{:x}\r\n", data.len()).into_bytes();
        chunk.extend_from_slice(data);
        chunk.extend_from_slice(b"\r\n");
        self.write(&chunk).await
    }

    /// Raw bytes straight to the wire, bypassing framing and compression.
    pub async fn write(&mut self, data: &[u8]) -> ServerResult<()> {
        self.wire.write(data).await?;
        Ok(())
    }

    pub async fn finish(&mut self) -> ServerResult<()> {
        if let Some(compressor) = self.compressor.take() {
            let tail = compressor.close()?;
            if !tail.is_empty() {
                self.write_raw_content(&tail).await?;
            }
        }

        if self.streaming {
            self.write(b"0\r\n\r\n").await?;
        } else if let Some(mut response) = self.response.take() {
            if !response.fields.contains("Content-Length") {
                response
                    .fields
                    .set("Content-Length", self.buffer.len().to_string());
            }

            if !response.fields.contains("Etag") {
                if let Some(hasher) = self.hasher.take() {
                    response
                        .fields
                        .set("Etag", format!("{:x}", hasher.finalize()));
                }
            }

            let not_modified = response.status == 200
                && self.request.fields.get("If-None-Match").is_some()
                && self.request.fields.get("If-None-Match") == response.fields.get("Etag");

            if not_modified {
                response.status = 304;
                self.write(&response.head_bytes()).await?;
            } else {
                self.write(&response.head_bytes()).await?;
                if !self.request.method.eq_ignore_ascii_case("HEAD") {
                    let body = std::mem::take(&mut self.buffer);
                    self.write(&body).await?;
                }
            }

            self.response = Some(response);
        }

        if !self.is_closed() && self.wants_close() {
            self.close().await?;
        }

        Ok(())
    }

    fn wants_close(&self) -> bool {
        let is_close = |value: Option<&[u8]>| value.is_some_and(|v| v.eq_ignore_ascii_case(b"close"));

        is_close(self.request.fields.get("Connection"))
            || self
                .response
                .as_ref()
                .is_some_and(|response| is_close(response.fields.get("Connection")))
            || self.request.version != HTTP_1_1
    }

    pub async fn close(&mut self) -> ServerResult<()> {
        self.closed = true;
        self.wire.close().await?;
        Ok(())
    }

    /// Ends the connection with a TCP reset.
    pub async fn reset(&mut self) -> ServerResult<()> {
        self.closed = true;
        self.wire.reset().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fuzz::Fuzzer;
    use crate::wire::fuzz_stream::FuzzStream;
    use crate::wire::simple_http::Fields;
    use tokio::io::{AsyncReadExt, DuplexStream};

    fn calm_session() -> FuzzSession {
        Fuzzer::new(1, 1000).session()
    }

    fn request(method: &str, version: &str, headers: &[(&str, &str)]) -> Request {
        let mut request = Request::new(method, "/");
        request.version = version.into();
        let mut fields = Fields::new();
        for (name, value) in headers {
            fields.set(name, *value);
        }
        request.fields = fields;
        request
    }

    fn route() -> RouteMatch {
        RouteMatch {
            path: "/".into(),
            groups: Vec::new(),
        }
    }

    async fn drain(mut client: DuplexStream) -> Vec<u8> {
        let mut out = Vec::new();
        client.read_to_end(&mut out).await.expect("read");
        out
    }

    fn sha1_hex(data: &[u8]) -> String {
        format!("{:x}", Sha1::digest(data))
    }

    #[tokio::test]
    async fn buffered_response_gets_length_and_etag() {
        let (server, client) = tokio::io::duplex(64 * 1024);
        let mut wire = FuzzStream::new(server, calm_session());
        let request = request("GET", "HTTP/1.0", &[]);

        let mut exchange = Exchange::new(&mut wire, &request, route(), calm_session());
        exchange.write_header(200, "OK", NO_HEADERS).await.expect("header");
        exchange.write_content(b"It looks ok!").await.expect("content");
        exchange.finish().await.expect("finish");
        assert!(exchange.is_closed());

        let expected = format!(
            "HTTP/1.1 200 OK\r\nContent-Length: 12\r\nEtag: {}\r\n\r\nIt looks ok!",
            sha1_hex(b"It looks ok!")
        );
        assert_eq!(String::from_utf8(drain(client).await).expect("utf8"), expected);
    }

    #[tokio::test]
    async fn matching_if_none_match_rewrites_to_304() {
        let etag = sha1_hex(b"body");
        let (server, client) = tokio::io::duplex(64 * 1024);
        let mut wire = FuzzStream::new(server, calm_session());
        let request = request(
            "GET",
            "HTTP/1.1",
            &[("If-None-Match", etag.as_str()), ("Connection", "close")],
        );

        let mut exchange = Exchange::new(&mut wire, &request, route(), calm_session());
        exchange.write_header(200, "OK", NO_HEADERS).await.expect("header");
        exchange.write_content(b"body").await.expect("content");
        exchange.finish().await.expect("finish");

        let expected = format!("HTTP/1.1 304 OK\r\nContent-Length: 4\r\nEtag: {etag}\r\n\r\n");
        assert_eq!(String::from_utf8(drain(client).await).expect("utf8"), expected);
    }

    #[tokio::test]
    async fn head_requests_get_no_body() {
        let (server, client) = tokio::io::duplex(64 * 1024);
        let mut wire = FuzzStream::new(server, calm_session());
        let request = request("HEAD", "HTTP/1.0", &[]);

        let mut exchange = Exchange::new(&mut wire, &request, route(), calm_session());
        exchange
            .write_header(200, "OK", [("Content-Type", "text/plain")])
            .await
            .expect("header");
        exchange.write_content(b"hidden").await.expect("content");
        exchange.finish().await.expect("finish");

        let out = String::from_utf8(drain(client).await).expect("utf8");
        assert!(out.starts_with("HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\n"));
        assert!(out.ends_with("\r\n\r\n"));
        assert!(!out.contains("hidden"));
    }

    #[tokio::test]
    async fn streaming_writes_chunks_and_terminator() {
        let (server, client) = tokio::io::duplex(64 * 1024);
        let mut wire = FuzzStream::new(server, calm_session());
        let request = request("GET", "HTTP/1.0", &[]);

        let mut exchange = Exchange::new(&mut wire, &request, route(), calm_session());
        exchange.stream();
        exchange.write_header(200, "OK", NO_HEADERS).await.expect("header");
        exchange.write_content(b"hello").await.expect("content");
        exchange.write_content(b"").await.expect("content");
        exchange.write_content(b" world!").await.expect("content");
        exchange.finish().await.expect("finish");

        let out = drain(client).await;
        assert_eq!(
            out,
            b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhello\r\n7\r\n world!\r\n0\r\n\r\n"
        );
    }

    #[tokio::test]
    async fn large_buffer_is_promoted_to_streaming() {
        let (server, client) = tokio::io::duplex(256 * 1024);
        let mut wire = FuzzStream::new(server, calm_session());
        let request = request("GET", "HTTP/1.0", &[]);
        let piece = vec![b'x'; 6000];

        let mut exchange = Exchange::new(&mut wire, &request, route(), calm_session());
        exchange.write_header(200, "OK", NO_HEADERS).await.expect("header");
        exchange.write_content(&piece).await.expect("content");
        assert!(!exchange.is_streaming());
        exchange.write_content(&piece).await.expect("content");
        assert!(exchange.is_streaming());
        exchange.write_content(b"tail").await.expect("content");
        exchange.finish().await.expect("finish");

        let out = drain(client).await;
        let mut expected = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n2ee0\r\n".to_vec();
        expected.extend(vec![b'x'; 12000]);
        expected.extend_from_slice(b"\r\n4\r\ntail\r\n0\r\n\r\n");
        assert_eq!(out, expected);
    }

    #[tokio::test]
    async fn disallowed_method_is_answered_with_405() {
        let (server, client) = tokio::io::duplex(64 * 1024);
        let mut wire = FuzzStream::new(server, calm_session());
        let request = request("DELETE", "HTTP/1.0", &[]);
        let restart = RestartPolicy::new(100);

        let mut exchange = Exchange::new(&mut wire, &request, route(), calm_session());
        let flow = exchange
            .prepare(&["GET", "HEAD"], &restart)
            .await
            .expect("prepare");
        assert_eq!(flow, Flow::Stop);

        let out = String::from_utf8(drain(client).await).expect("utf8");
        assert!(out.starts_with("HTTP/1.1 405 Method not allow\r\nContent-Length: 0\r\n"));
    }

    #[tokio::test]
    async fn keep_alive_on_http_1_1() {
        let (server, _client) = tokio::io::duplex(64 * 1024);
        let mut wire = FuzzStream::new(server, calm_session());
        let request = request("GET", "HTTP/1.1", &[]);

        let mut exchange = Exchange::new(&mut wire, &request, route(), calm_session());
        exchange.write_header(204, "No Content", NO_HEADERS).await.expect("header");
        exchange.finish().await.expect("finish");
        assert!(!exchange.is_closed());
    }
}
