use crate::fuzz::{ConnectionAction, FuzzSession};
use crate::wire::Wire;
use async_trait::async_trait;
use socket2::SockRef;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader, DuplexStream,
};
use tokio::net::TcpStream;

/// Transport the fault wrapper can sit on.
pub trait Socket: AsyncRead + AsyncWrite + Unpin + Send {
    /// Arranges for the connection to end in a reset once it is dropped.
    fn abort(&self) -> io::Result<()>;

    fn peer_addr(&self) -> Option<SocketAddr>;
}

impl Socket for TcpStream {
    fn abort(&self) -> io::Result<()> {
        SockRef::from(self).set_linger(Some(Duration::ZERO))
    }

    fn peer_addr(&self) -> Option<SocketAddr> {
        TcpStream::peer_addr(self).ok()
    }
}

impl Socket for DuplexStream {
    fn abort(&self) -> io::Result<()> {
        Ok(())
    }

    fn peer_addr(&self) -> Option<SocketAddr> {
        None
    }
}

/// Wraps a connection so every read and write first rolls the session's
/// dice: it may stall, close or reset the connection, and outbound bytes
/// go through the mangler.
pub struct FuzzStream<S: Socket> {
    inner: BufReader<S>,
    session: FuzzSession,
    closed: bool,
}

impl<S: Socket> FuzzStream<S> {
    pub fn new(stream: S, session: FuzzSession) -> Self {
        Self {
            inner: BufReader::new(stream),
            session,
            closed: false,
        }
    }

    pub fn session(&self) -> &FuzzSession {
        &self.session
    }

    /// Returns true when the operation about to happen was cut off.
    async fn intercept(&mut self) -> io::Result<bool> {
        let hang = self.session.hang_time();
        let action = self.session.connection_action();

        if let Some(duration) = hang {
            tracing::debug!("Stalling connection for {:?}", duration);
            tokio::time::sleep(duration).await;
        }

        match action {
            Some(ConnectionAction::Close) => {
                tracing::debug!("Closing connection on purpose");
                self.close().await?;
                Ok(true)
            }
            Some(ConnectionAction::Reset) => {
                tracing::debug!("Resetting connection on purpose");
                self.reset().await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl<S: Socket> Wire for FuzzStream<S> {
    async fn read_line(&mut self, limit: usize) -> io::Result<Vec<u8>> {
        if self.closed || self.intercept().await? {
            return Ok(Vec::new());
        }

        let mut line = Vec::new();
        (&mut self.inner)
            .take(limit as u64)
            .read_until(b'\n', &mut line)
            .await?;
        Ok(line)
    }

    async fn read(&mut self, max: usize) -> io::Result<Vec<u8>> {
        if self.closed || self.intercept().await? {
            return Ok(Vec::new());
        }

        let mut buffer = vec![0; max];
        let read = self.inner.read(&mut buffer).await?;
        buffer.truncate(read);
        Ok(buffer)
    }

    async fn write(&mut self, data: &[u8]) -> io::Result<()> {
        if self.closed || self.intercept().await? {
            return Ok(());
        }

        let data = self.session.mangle(data.to_vec()).map_err(io::Error::other)?;
        let stream = self.inner.get_mut();
        stream.write_all(&data).await?;
        stream.flush().await
    }

    async fn close(&mut self) -> io::Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        match self.inner.get_mut().shutdown().await {
            Err(err) if err.kind() != io::ErrorKind::NotConnected => Err(err),
            _ => Ok(()),
        }
    }

    async fn reset(&mut self) -> io::Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.inner.get_ref().abort()
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn peer_addr(&self) -> Option<SocketAddr> {
        self.inner.get_ref().peer_addr()
    }
}
