use crate::{
    framing::{self, TransportError},
    model_service::ModelService,
    service,
};
use thiserror::Error;
use tokio::{
    net::{TcpListener, TcpStream},
    signal,
};

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// The reply-socket endpoint. Connections are served one at a time and each
/// request gets exactly one reply before the next request is read, so a
/// second client's requests wait until the current client disconnects.
pub struct ReplyServer<M: ModelService> {
    listener: TcpListener,
    model: M,
    max_frame_bytes: u32,
}

impl<M: ModelService> ReplyServer<M> {
    pub async fn bind(addr: &str, model: M, max_frame_bytes: u32) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.to_string(),
                source,
            })?;

        Ok(Self {
            listener,
            model,
            max_frame_bytes,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    pub async fn run(self) -> Result<(), ServerError> {
        tracing::info!(
            "Detection service listening on {}",
            self.listener.local_addr()?
        );

        let shutdown = async {
            shutdown_signal().await;
            tracing::info!("Shutdown signal received, starting graceful shutdown");
        };

        tokio::select! {
            result = self.serve() => result,
            _ = shutdown => Ok(()),
        }
    }

    async fn serve(&self) -> Result<(), ServerError> {
        loop {
            let (stream, peer) = self.listener.accept().await?;
            tracing::info!(%peer, "client connected");

            match self.serve_connection(stream).await {
                Ok(cycles) => tracing::info!(%peer, cycles, "client disconnected"),
                Err(err) => tracing::warn!(%peer, error = %err, "connection dropped"),
            }
        }
    }

    async fn serve_connection(&self, mut stream: TcpStream) -> Result<u64, TransportError> {
        let (mut reader, mut writer) = stream.split();
        let mut cycles = 0u64;

        loop {
            let frame = match framing::read_frame(&mut reader, self.max_frame_bytes).await {
                Ok(frame) => frame,
                Err(TransportError::ConnectionClosed) => return Ok(cycles),
                Err(err) => return Err(err),
            };

            let result = service::handle_frame(&self.model, &frame);
            match &result {
                Ok(detections) => {
                    tracing::debug!(detections = detections.len(), "cycle complete");
                }
                Err(err) => {
                    tracing::warn!(error = %err, "cycle failed, replying with error payload");
                }
            }

            let reply = service::encode_reply(&result);
            framing::write_frame(&mut writer, &reply).await?;
            cycles += 1;
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
