//! Reads requests off a connection and dispatches them, one at a time,
//! until the connection ends.

use crate::fuzz::FuzzSession;
use crate::server::errors::{ServerError, ServerResult};
use crate::server::exchange::{Exchange, Flow};
use crate::server::restart::RestartPolicy;
use crate::server::router::Router;
use crate::wire::simple_http::{ProtocolError, Request};
use crate::wire::Wire;

/// Longest single line accepted before the line is treated as truncated.
pub const LINE_LIMIT: usize = 65_536;
pub const MAX_HEADER_BYTES: usize = 4096;
pub const MAX_CONTENT_LENGTH: i64 = 10_000;
pub const READ_CHUNK: usize = 4096;

pub const NOT_FOUND_STATUS_LINE: &[u8] = b"HTTP/1.1 404 Not found\r\n";

/// Reads one request head plus its `Content-Length` payload.
pub async fn read_request(wire: &mut dyn Wire) -> ServerResult<Request> {
    let mut lines = Vec::new();
    let mut header_bytes = 0;

    loop {
        let line = wire.read_line(LINE_LIMIT).await?;
        if !line.ends_with(b"\n") {
            return Err(ServerError::CloseConnection);
        }

        if line.trim_ascii().is_empty() {
            break;
        }

        header_bytes += line.len();
        lines.push(line);

        if header_bytes > MAX_HEADER_BYTES {
            return Err(ProtocolError::HeaderTooLong.into());
        }
    }

    if lines.is_empty() {
        return Err(ProtocolError::NoHeader.into());
    }

    let mut request = Request::parse(&lines)?;

    if let Some(value) = request.fields.get("Content-Length") {
        let length = content_length(value)?;
        tracing::debug!("Reading payload len={}", length);

        let mut payload = Vec::with_capacity(length);
        while payload.len() < length {
            let data = wire.read((length - payload.len()).min(READ_CHUNK)).await?;
            if data.is_empty() {
                return Err(ServerError::CloseConnection);
            }
            payload.extend_from_slice(&data);
        }
        request.payload = Some(payload);
    }

    Ok(request)
}

fn content_length(value: &[u8]) -> Result<usize, ProtocolError> {
    let length: i64 = std::str::from_utf8(value)
        .ok()
        .and_then(|value| value.trim().parse().ok())
        .ok_or(ProtocolError::BadContentLength)?;

    if length < 0 {
        return Err(ProtocolError::NegativeContentLength);
    }
    if length > MAX_CONTENT_LENGTH {
        return Err(ProtocolError::ContentLengthTooBig);
    }

    usize::try_from(length).map_err(|_| ProtocolError::BadContentLength)
}

/// Path portion of an origin-form or absolute-form request target.
pub fn request_path(uri: &str) -> Result<String, ProtocolError> {
    let path = if uri.starts_with('/') {
        uri.split(['?', '#']).next().unwrap_or_default().to_owned()
    } else {
        url::Url::parse(uri)
            .map(|parsed| parsed.path().to_owned())
            .unwrap_or_default()
    };

    if !path.starts_with('/') {
        return Err(ProtocolError::BadPath);
    }
    Ok(path)
}

/// Routes one request and runs its handler through the lifecycle.
pub async fn dispatch(
    wire: &mut dyn Wire,
    request: &Request,
    router: &Router,
    session: &FuzzSession,
    restart: &RestartPolicy,
) -> ServerResult<()> {
    let path = request_path(&request.uri)?;

    let Some((handler, route)) = router.resolve(&path) else {
        tracing::debug!("Handler not found for path {}", path);
        wire.write(NOT_FOUND_STATUS_LINE).await?;
        wire.write(b"Content-Length: 3\r\n").await?;
        wire.write(b"\r\n").await?;
        wire.write(b"404").await?;
        return Ok(());
    };

    let mut exchange = Exchange::new(wire, request, route, session.clone());
    if exchange.prepare(handler.allowed_methods(), restart).await? == Flow::Stop {
        return Ok(());
    }

    handler.process(&mut exchange).await?;
    exchange.finish().await
}

/// Serves requests on `wire` until it is closed or something goes wrong.
pub async fn serve_connection(
    wire: &mut dyn Wire,
    session: &FuzzSession,
    router: &Router,
    restart: &RestartPolicy,
) {
    while !wire.is_closed() {
        let outcome = match read_request(wire).await {
            Ok(request) => dispatch(wire, &request, router, session, restart).await,
            Err(err) => Err(err),
        };

        if let Err(err) = outcome {
            report_failure(wire, err).await;
            return;
        }
    }
}

async fn report_failure(wire: &mut dyn Wire, err: ServerError) {
    match err {
        ServerError::Protocol(err) => {
            tracing::info!("Client error {}", err);
            let message = err.message().as_bytes();

            let mut answer = b"HTTP/1.1 400 ".to_vec();
            answer.extend_from_slice(message);
            answer.extend_from_slice(b"\r\n\r\n");
            answer.extend_from_slice(message);

            if let Err(err) = wire.write(&answer).await {
                tracing::debug!("Failed to send client error: {}", err);
            }
        }
        err if err.is_disconnect() => {
            tracing::debug!("Connection ended: {}", err);
        }
        err => {
            tracing::error!("Server error: {}", err);
        }
    }

    if let Err(err) = wire.close().await {
        tracing::debug!("Failed to close connection: {}", err);
    }
}
