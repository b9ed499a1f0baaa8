//! Quinn-based QUIC transport.
//!
//! Rig UIs connect over QUIC: one TLS 1.3 connection per client, commands on
//! client-opened bidirectional streams, and all server-to-client traffic on a
//! single server-opened unidirectional stream so notifications and replies
//! arrive in order.
//!
//! ALPN is set to [`ALPN_PROTOCOL`]. Without a certificate pair the transport
//! generates a self-signed certificate, which is only fit for a bench setup
//! on a trusted network.

use std::{net::SocketAddr, path::Path, sync::Arc};

use quinn::{Endpoint, RecvStream, SendStream, ServerConfig, crypto::rustls::QuicServerConfig};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use scanrig_proto::ALPN_PROTOCOL;

use crate::error::ServerError;

/// QUIC endpoint accepting rig UI connections.
pub struct QuinnTransport {
    endpoint: Endpoint,
}

impl QuinnTransport {
    /// Create and bind a new QUIC transport.
    ///
    /// If `cert_path` and `key_path` are both provided they are used for TLS,
    /// otherwise a self-signed certificate is generated.
    ///
    /// # Errors
    ///
    /// `ServerError::Config` for a bad address or unusable certificate,
    /// `ServerError::Transport` if the socket cannot be bound.
    pub fn bind(
        address: &str,
        cert_path: Option<&Path>,
        key_path: Option<&Path>,
    ) -> Result<Self, ServerError> {
        let addr: SocketAddr = address
            .parse()
            .map_err(|e| ServerError::Config(format!("bind address {address:?}: {e}")))?;

        let server_config = match (cert_path, key_path) {
            (Some(cert), Some(key)) => pem_identity(cert, key)?,
            _ => self_signed_identity()?,
        };

        let endpoint = Endpoint::server(server_config, addr)
            .map_err(|e| ServerError::Transport(format!("cannot listen on {addr}: {e}")))?;

        tracing::info!(%addr, "rig gateway listening");

        Ok(Self { endpoint })
    }

    /// Accept the next QUIC connection.
    ///
    /// # Errors
    ///
    /// `ServerError::Transport` if the endpoint closed or the handshake
    /// failed.
    pub async fn accept(&self) -> Result<QuinnConnection, ServerError> {
        let incoming = self
            .endpoint
            .accept()
            .await
            .ok_or_else(|| ServerError::Transport("endpoint no longer accepting".to_string()))?;

        let conn = incoming
            .await
            .map_err(|e| ServerError::Transport(format!("handshake: {e}")))?;

        Ok(QuinnConnection { connection: conn })
    }

    /// Local address the transport is bound to.
    ///
    /// # Errors
    ///
    /// `ServerError::Transport` if the socket address is unavailable.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.endpoint
            .local_addr()
            .map_err(|e| ServerError::Transport(format!("local address: {e}")))
    }

    /// Stop accepting and close every connection.
    pub fn close(&self) {
        self.endpoint.close(0u32.into(), b"server shutting down");
    }
}

/// One client's QUIC connection.
///
/// Clones are cheap and share the same underlying connection.
#[derive(Clone)]
pub struct QuinnConnection {
    connection: quinn::Connection,
}

impl QuinnConnection {
    /// Accept the next client-opened command stream.
    ///
    /// # Errors
    ///
    /// `ServerError::Transport` once the connection is closed.
    pub async fn accept_bi(&self) -> Result<(SendStream, RecvStream), ServerError> {
        self.connection
            .accept_bi()
            .await
            .map_err(|e| ServerError::Transport(format!("command stream: {e}")))
    }

    /// Open the outbound stream.
    ///
    /// # Errors
    ///
    /// `ServerError::Transport` if the connection is closed.
    pub async fn open_uni(&self) -> Result<SendStream, ServerError> {
        self.connection
            .open_uni()
            .await
            .map_err(|e| ServerError::Transport(format!("outbound stream: {e}")))
    }

    /// Remote peer address.
    pub fn remote_addr(&self) -> SocketAddr {
        self.connection.remote_address()
    }

    /// Close the connection with an error code and reason.
    pub fn close(&self, error_code: quinn::VarInt, reason: &[u8]) {
        self.connection.close(error_code, reason);
    }
}

/// TLS identity from PEM certificate chain and private key files.
fn pem_identity(cert_path: &Path, key_path: &Path) -> Result<ServerConfig, ServerError> {
    let read = |path: &Path, what: &str| {
        std::fs::read(path)
            .map_err(|e| ServerError::Config(format!("cannot read {what} {}: {e}", path.display())))
    };
    let cert_pem = read(cert_path, "certificate")?;
    let key_pem = read(key_path, "private key")?;

    let chain = rustls_pemfile::certs(&mut cert_pem.as_slice())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ServerError::Config(format!("malformed certificate PEM: {e}")))?;
    let key = rustls_pemfile::private_key(&mut key_pem.as_slice())
        .map_err(|e| ServerError::Config(format!("malformed private key PEM: {e}")))?
        .ok_or_else(|| {
            ServerError::Config(format!("{} holds no private key", key_path.display()))
        })?;

    rig_server_config(chain, key)
}

/// Throwaway identity for `localhost`.
fn self_signed_identity() -> Result<ServerConfig, ServerError> {
    let generated = rcgen::generate_simple_self_signed(vec!["localhost".to_string()])
        .map_err(|e| ServerError::Config(format!("self-signed certificate: {e}")))?;

    let chain = vec![generated.cert.der().clone()];
    let key = PrivatePkcs8KeyDer::from(generated.key_pair.serialize_der());

    tracing::warn!("serving a self-signed certificate; clients must pin or skip verification");

    rig_server_config(chain, key.into())
}

/// QUIC server config speaking [`ALPN_PROTOCOL`].
fn rig_server_config(
    chain: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
) -> Result<ServerConfig, ServerError> {
    let mut tls = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(chain, key)
        .map_err(|e| ServerError::Config(format!("certificate rejected: {e}")))?;
    tls.alpn_protocols = vec![ALPN_PROTOCOL.to_vec()];

    let crypto = QuicServerConfig::try_from(tls)
        .map_err(|e| ServerError::Config(format!("TLS config unusable for QUIC: {e}")))?;

    Ok(ServerConfig::with_crypto(Arc::new(crypto)))
}
