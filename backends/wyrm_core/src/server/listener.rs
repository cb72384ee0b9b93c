use crate::fuzz::Fuzzer;
use crate::server::pipeline::serve_connection;
use crate::server::restart::RestartPolicy;
use crate::server::router::Router;
use crate::wire::fuzz_stream::FuzzStream;
use std::io;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinSet;

/// Accept loop for one listener generation. Every accepted connection gets
/// its own fuzz session and task; the loop ends when the restart policy
/// fires, taking the remaining connections down with it.
#[derive(Debug, Clone)]
pub struct Server {
    fuzzer: Arc<Fuzzer>,
    router: Arc<Router>,
    restart_interval: u64,
}

impl Server {
    #[must_use]
    pub fn new(fuzzer: Arc<Fuzzer>, router: Arc<Router>, restart_interval: u64) -> Self {
        Self {
            fuzzer,
            router,
            restart_interval,
        }
    }

    #[must_use]
    pub fn fuzzer(&self) -> &Arc<Fuzzer> {
        &self.fuzzer
    }

    /// Serves `listener` until a restart is requested.
    pub async fn serve(&self, listener: TcpListener) -> io::Result<()> {
        let restart = Arc::new(RestartPolicy::new(self.restart_interval));
        let mut connections = JoinSet::new();

        if let Ok(addr) = listener.local_addr() {
            tracing::info!("Listening on {}", addr);
        }

        loop {
            tokio::select! {
                () = restart.requested() => break,
                accepted = listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(accepted) => accepted,
                        Err(err) => {
                            tracing::error!("Failed to accept connection: {}", err);
                            continue;
                        }
                    };

                    let session = self.fuzzer.session();
                    tracing::info!(
                        "Fuzz session: counter={} threshold={:.4}",
                        session.counter(),
                        session.threshold()
                    );
                    tracing::debug!("Accepted connection from {}", peer);

                    let router = self.router.clone();
                    let restart = restart.clone();
                    connections.spawn(async move {
                        let mut wire = FuzzStream::new(stream, session.clone());
                        serve_connection(&mut wire, &session, &router, &restart).await;
                    });
                }
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
            }
        }

        tracing::info!("Shutting down listener, {} connections dropped", connections.len());
        connections.shutdown().await;
        Ok(())
    }
}
