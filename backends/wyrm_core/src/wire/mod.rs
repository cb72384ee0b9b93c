//! Everything that touches bytes on the connection: the http message
//! model, body compressors and the fault injecting stream wrapper.

pub mod compress;
pub mod fuzz_stream;
pub mod simple_http;

use async_trait::async_trait;
use std::io;
use std::net::SocketAddr;

/// Byte level view of a client connection.
///
/// Reads that come back empty mean the peer went away or the connection
/// was cut on purpose; callers treat both as end of stream.
#[async_trait]
pub trait Wire: Send {
    /// Reads up to and including the next `\n`, never more than `limit`
    /// bytes. A line missing its `\n` means the limit or end of stream was
    /// hit first.
    async fn read_line(&mut self, limit: usize) -> io::Result<Vec<u8>>;

    /// Reads at most `max` bytes.
    async fn read(&mut self, max: usize) -> io::Result<Vec<u8>>;

    async fn write(&mut self, data: &[u8]) -> io::Result<()>;

    /// Graceful shutdown of the outbound half.
    async fn close(&mut self) -> io::Result<()>;

    /// Abortive close, the peer sees a reset.
    async fn reset(&mut self) -> io::Result<()>;

    fn is_closed(&self) -> bool;

    fn peer_addr(&self) -> Option<SocketAddr>;
}
