//! Scan rig control gateway.
//!
//! Multiplexes many remote UI connections onto one physical scanning rig
//! (rotor, turntable, camera, lights), allows at most one scan session at a
//! time, and keeps every connected UI in sync with rig state.
//!
//! # Architecture
//!
//! The [`ServerDriver`] follows the Sans-IO pattern: it consumes
//! [`ServerEvent`]s and returns [`ServerAction`]s without touching the network
//! or the hardware. The [`Executor`] runs those actions against the
//! [`Notifier`] and the device [`Rig`], and [`Server`] wires it to Quinn QUIC
//! and Tokio.
//!
//! # Components
//!
//! - [`ServerDriver`]: connection handling, command routing, scan session
//! - [`Executor`]: action execution, background work, completion events
//! - [`Notifier`]: best-effort per-session outbound queues
//! - [`catalog`]: project catalog backends
//! - [`config`]: persisted rig settings
//! - [`devices`]: hardware collaborator traits and simulated devices
//! - [`Server`]: production runtime over [`QuinnTransport`]

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod catalog;
pub mod config;
pub mod devices;
mod driver;
mod env;
mod error;
mod executor;
mod notifier;
mod registry;
mod server_error;
mod session;
pub mod slider;
mod transport;

use bytes::BytesMut;
pub use driver::{DriverConfig, LogLevel, ServerAction, ServerDriver, ServerEvent};
pub use env::{Environment, SystemEnv};
pub use error::ServerError;
pub use executor::Executor;
pub use notifier::{DEFAULT_OUTBOUND_QUEUE, Notifier};
pub use registry::{ConnectionRegistry, SessionInfo};
use scanrig_proto::{ClientMessage, Frame, FrameHeader, ServerMessage};
pub use server_error::{ExecutorError, ServerError as DriverError};
pub use session::{ScanTicket, SessionController, SessionError, SessionPhase};
use tokio::sync::mpsc;
pub use transport::{QuinnConnection, QuinnTransport};

use crate::{
    catalog::Catalog,
    config::ConfigStore,
    devices::{Rig, RigEvent},
};

/// Server configuration for the production runtime.
#[derive(Debug, Clone)]
pub struct ServerRuntimeConfig {
    /// Address to bind to (e.g., "0.0.0.0:4433")
    pub bind_address: String,
    /// Path to TLS certificate (PEM format)
    pub cert_path: Option<std::path::PathBuf>,
    /// Path to TLS private key (PEM format)
    pub key_path: Option<std::path::PathBuf>,
    /// Per-session outbound queue depth
    pub outbound_queue: usize,
    /// Driver configuration (limits)
    pub driver: DriverConfig,
}

impl Default for ServerRuntimeConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:4433".to_string(),
            cert_path: None,
            key_path: None,
            outbound_queue: DEFAULT_OUTBOUND_QUEUE,
            driver: DriverConfig::default(),
        }
    }
}

/// Production gateway.
///
/// Wraps the [`Executor`] with Quinn QUIC transport and the device event
/// pump.
pub struct Server<C, G>
where
    C: Catalog,
    G: ConfigStore,
{
    executor: Executor<C, G>,
    transport: QuinnTransport,
    rig_events: mpsc::Receiver<RigEvent>,
    env: SystemEnv,
}

impl<C, G> Server<C, G>
where
    C: Catalog,
    G: ConfigStore,
{
    /// Build the driver and executor and bind the transport.
    ///
    /// `rig_events` is the receiving end of the channel the rig's devices
    /// report on.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Config` or `ServerError::Transport` if the
    /// transport cannot be bound.
    pub fn bind(
        config: ServerRuntimeConfig,
        catalog: C,
        settings: G,
        rig: Rig,
        rig_events: mpsc::Receiver<RigEvent>,
    ) -> Result<Self, ServerError> {
        let transport = QuinnTransport::bind(
            &config.bind_address,
            config.cert_path.as_deref(),
            config.key_path.as_deref(),
        )?;

        let driver = ServerDriver::new(catalog, settings, config.driver);
        let executor = Executor::new(driver, rig, Notifier::new(config.outbound_queue));

        Ok(Self { executor, transport, rig_events, env: SystemEnv::new() })
    }

    /// Local address the server is bound to.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Transport` if the address is unavailable.
    pub fn local_addr(&self) -> Result<std::net::SocketAddr, ServerError> {
        self.transport.local_addr()
    }

    /// Executor driving this server.
    pub fn executor(&self) -> &Executor<C, G> {
        &self.executor
    }

    /// Serve connections until `shutdown` resolves.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Transport` if the local address is unavailable.
    pub async fn run(self, shutdown: impl std::future::Future<Output = ()>) -> Result<(), ServerError> {
        tracing::info!("Server starting on {}", self.transport.local_addr()?);

        let Self { executor, transport, rig_events, env } = self;

        tokio::spawn({
            let executor = executor.clone();
            async move { executor.pump(rig_events).await }
        });

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => break,
                accepted = transport.accept() => match accepted {
                    Ok(conn) => {
                        let executor = executor.clone();
                        let env = env.clone();

                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(conn, executor, env).await {
                                tracing::error!("Connection error: {}", e);
                            }
                        });
                    },
                    Err(e) => {
                        tracing::error!("Accept error: {}", e);
                    },
                },
            }
        }

        tracing::info!("Server shutting down");
        transport.close();

        Ok(())
    }
}

/// Handle a single QUIC connection.
async fn handle_connection<C, G>(
    conn: QuinnConnection,
    executor: Executor<C, G>,
    env: SystemEnv,
) -> Result<(), ServerError>
where
    C: Catalog,
    G: ConfigStore,
{
    let session_id = env.random_u64();
    let remote_addr = conn.remote_addr();

    tracing::debug!("New connection: {} from {}", session_id, remote_addr);

    let outbound = conn.open_uni().await?;
    let queue = executor.notifier().attach(session_id);

    tokio::spawn({
        let conn = conn.clone();
        async move {
            if let Err(e) = write_outbound(session_id, queue, outbound).await {
                tracing::debug!("{}", e);
            }
            conn.close(0u32.into(), b"closed");
        }
    });

    if let Err(e) =
        executor.submit(ServerEvent::ConnectionAccepted { session_id, remote_addr }).await
    {
        executor.notifier().detach(session_id);
        return Err(e.into());
    }

    loop {
        match conn.accept_bi().await {
            Ok((send, recv)) => {
                let executor = executor.clone();

                tokio::spawn(async move {
                    handle_stream(session_id, send, recv, executor).await;
                });
            },
            Err(e) => {
                tracing::debug!("Connection closed: {}", e);
                break;
            },
        }
    }

    executor.notifier().detach(session_id);
    executor
        .submit(ServerEvent::ConnectionClosed { session_id, reason: "connection closed".to_string() })
        .await?;

    Ok(())
}

/// Read commands from one client-opened stream until it ends.
///
/// Replies go out on the session's outbound stream, not on this stream's
/// send half.
async fn handle_stream<C, G>(
    session_id: u64,
    send: quinn::SendStream,
    mut recv: quinn::RecvStream,
    executor: Executor<C, G>,
) where
    C: Catalog,
    G: ConfigStore,
{
    drop(send);

    let mut buf = BytesMut::with_capacity(4096);

    loop {
        buf.clear();
        buf.resize(FrameHeader::SIZE, 0);

        if let Err(e) = recv.read_exact(&mut buf[..FrameHeader::SIZE]).await {
            tracing::debug!("Read error: {}", e);
            break;
        }

        let payload_size = match FrameHeader::from_bytes(&buf[..FrameHeader::SIZE]) {
            Ok(header) => header.payload_size() as usize,
            Err(e) => {
                tracing::warn!("Invalid frame header from {}: {}", session_id, e);
                break;
            },
        };

        if payload_size > 0 {
            buf.resize(FrameHeader::SIZE + payload_size, 0);
            if let Err(e) = recv.read_exact(&mut buf[FrameHeader::SIZE..]).await {
                tracing::debug!("Payload read error: {}", e);
                break;
            }
        }

        let message = match Frame::decode(&buf).and_then(|frame| ClientMessage::from_frame(&frame))
        {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!("Frame decode error from {}: {}", session_id, e);
                break;
            },
        };

        tracing::trace!(session_id, request_id = message.request_id, "{} received", message.command.name());

        let event = ServerEvent::CommandReceived {
            session_id,
            request_id: message.request_id,
            command: message.command,
        };
        if let Err(e) = executor.submit(event).await {
            tracing::warn!("Command processing error: {}", e);
            break;
        }
    }
}

/// Drain a session's outbound queue into its stream, in order.
///
/// Ends when the queue is detached or the stream breaks.
async fn write_outbound(
    session_id: u64,
    mut queue: mpsc::Receiver<ServerMessage>,
    mut stream: quinn::SendStream,
) -> Result<(), ExecutorError> {
    while let Some(message) = queue.recv().await {
        let bytes = match message.into_frame().and_then(|frame| frame.to_vec()) {
            Ok(bytes) => bytes,
            Err(e) => {
                let err = ExecutorError::Encode { session_id, reason: e.to_string() };
                tracing::warn!("{}", err);
                continue;
            },
        };

        stream
            .write_all(&bytes)
            .await
            .map_err(|e| ExecutorError::SendFailed { session_id, reason: e.to_string() })?;
    }

    let _ = stream.finish();
    Ok(())
}
