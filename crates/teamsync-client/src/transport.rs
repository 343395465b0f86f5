//! QUIC transport for the client.
//!
//! Provides [`ConnectedTransport`] which handles QUIC I/O for the wire
//! protocol. This is a thin layer that just sends commands and receives
//! events; all protocol logic stays in the sans-IO [`SyncClient`].
//!
//! Executes the `Dial` action: the handshake authenticates by sending
//! an `Auth` command with the dialed token before anything else.
//!
//! [`SyncClient`]: crate::SyncClient

use std::{net::SocketAddr, sync::Arc};

use bytes::BytesMut;
use quinn::{ClientConfig, Endpoint, RecvStream, SendStream};
use teamsync_proto::{ClientCommand, ServerEvent, wire};
use thiserror::Error;
use tokio::sync::mpsc;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection failed.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Stream error.
    #[error("stream error: {0}")]
    Stream(String),

    /// Protocol error.
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Handle to a live QUIC connection.
///
/// Commands and events flow through the channels; an internal task
/// handles the QUIC I/O.
pub struct ConnectedTransport {
    /// Send commands to the server.
    pub to_server: mpsc::Sender<ClientCommand>,
    /// Receive events from the server.
    pub from_server: mpsc::Receiver<ServerEvent>,
    /// Abort handle to stop the connection task.
    abort_handle: tokio::task::AbortHandle,
}

impl ConnectedTransport {
    /// Stop the connection.
    pub fn stop(&self) {
        self.abort_handle.abort();
    }
}

/// Connect to a teamsync server via QUIC and authenticate.
pub async fn connect(server_addr: &str, token: String) -> Result<ConnectedTransport, TransportError> {
    let addr: SocketAddr = server_addr
        .parse()
        .map_err(|e| TransportError::Connection(format!("invalid address: {e}")))?;

    let client_config = insecure_client_config()?;
    let bind: SocketAddr = "0.0.0.0:0"
        .parse()
        .map_err(|e| TransportError::Connection(format!("invalid bind address: {e}")))?;
    let mut endpoint = Endpoint::client(bind)
        .map_err(|e| TransportError::Connection(format!("endpoint creation failed: {e}")))?;
    endpoint.set_default_client_config(client_config);

    let connection = endpoint
        .connect(addr, "localhost")
        .map_err(|e| TransportError::Connection(format!("connect failed: {e}")))?
        .await
        .map_err(|e| TransportError::Connection(format!("connection failed: {e}")))?;

    let (to_server_tx, to_server_rx) = mpsc::channel::<ClientCommand>(32);
    let (from_server_tx, from_server_rx) = mpsc::channel::<ServerEvent>(32);

    // Authenticate before exposing the channels
    send_command(&connection, &ClientCommand::Auth { token }).await?;

    let handle = tokio::spawn(run_connection(connection, to_server_rx, from_server_tx));

    Ok(ConnectedTransport {
        to_server: to_server_tx,
        from_server: from_server_rx,
        abort_handle: handle.abort_handle(),
    })
}

/// Run the connection, bridging between channels and QUIC.
async fn run_connection(
    connection: quinn::Connection,
    mut to_server: mpsc::Receiver<ClientCommand>,
    from_server: mpsc::Sender<ServerEvent>,
) {
    // Receiver task for incoming unidirectional streams
    let conn_recv = connection.clone();
    let from_server_clone = from_server.clone();
    let recv_handle = tokio::spawn(async move {
        loop {
            match conn_recv.accept_uni().await {
                Ok(recv) => {
                    let tx = from_server_clone.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_incoming_stream(recv, tx).await {
                            tracing::warn!(error = %e, "incoming stream failed");
                        }
                    });
                },
                Err(e) => {
                    tracing::debug!(error = %e, "accept_uni ended");
                    break;
                },
            }
        }
    });

    // Main loop: send outgoing commands
    while let Some(command) = to_server.recv().await {
        if let Err(e) = send_command(&connection, &command).await {
            tracing::warn!(error = %e, "send failed");
        }
    }

    recv_handle.abort();
}

/// Handle an incoming unidirectional stream (server -> client).
async fn handle_incoming_stream(
    mut recv: RecvStream,
    tx: mpsc::Sender<ServerEvent>,
) -> Result<(), TransportError> {
    let mut buf = BytesMut::with_capacity(65536);

    // Read length prefix
    buf.resize(wire::LEN_PREFIX_SIZE, 0);
    recv.read_exact(&mut buf[..wire::LEN_PREFIX_SIZE])
        .await
        .map_err(|e| TransportError::Stream(format!("prefix read failed: {e}")))?;

    let body_len = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
    if body_len > wire::MAX_FRAME_SIZE {
        return Err(TransportError::Protocol(format!("frame too large: {body_len} bytes")));
    }

    buf.resize(wire::LEN_PREFIX_SIZE + body_len, 0);
    recv.read_exact(&mut buf[wire::LEN_PREFIX_SIZE..])
        .await
        .map_err(|e| TransportError::Stream(format!("body read failed: {e}")))?;

    let event = wire::decode_event(&buf)
        .map_err(|e| TransportError::Protocol(format!("event decode failed: {e}")))?;

    tx.send(event)
        .await
        .map_err(|e| TransportError::Stream(format!("channel send failed: {e}")))?;

    Ok(())
}

/// Send a command on a fresh stream.
async fn send_command(
    connection: &quinn::Connection,
    command: &ClientCommand,
) -> Result<(), TransportError> {
    let (send, _recv) = connection
        .open_bi()
        .await
        .map_err(|e| TransportError::Stream(format!("open stream failed: {e}")))?;
    write_command(send, command).await
}

async fn write_command(mut send: SendStream, command: &ClientCommand) -> Result<(), TransportError> {
    let mut buf = Vec::new();
    wire::encode_command(command, &mut buf)
        .map_err(|e| TransportError::Protocol(format!("encode failed: {e}")))?;

    send.write_all(&buf).await.map_err(|e| TransportError::Stream(format!("write failed: {e}")))?;

    send.finish().map_err(|e| TransportError::Stream(format!("finish failed: {e}")))?;

    Ok(())
}

/// Create an insecure client config that accepts any certificate.
///
/// WARNING: Development only. Production should verify certificates.
fn insecure_client_config() -> Result<ClientConfig, TransportError> {
    let mut crypto = rustls::ClientConfig::builder()
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(InsecureCertVerifier))
        .with_no_client_auth();

    // Must match server's ALPN protocol
    crypto.alpn_protocols = vec![b"teamsync".to_vec()];

    let quic_crypto = quinn::crypto::rustls::QuicClientConfig::try_from(crypto)
        .map_err(|e| TransportError::Connection(format!("tls config invalid: {e}")))?;
    let mut config = ClientConfig::new(Arc::new(quic_crypto));

    let mut transport = quinn::TransportConfig::default();
    let idle = quinn::IdleTimeout::try_from(std::time::Duration::from_secs(30))
        .map_err(|e| TransportError::Connection(format!("idle timeout invalid: {e}")))?;
    transport.max_idle_timeout(Some(idle));
    config.transport_config(Arc::new(transport));

    Ok(config)
}

/// Certificate verifier that accepts any certificate (insecure, for
/// development).
#[derive(Debug)]
struct InsecureCertVerifier;

impl rustls::client::danger::ServerCertVerifier for InsecureCertVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        vec![
            rustls::SignatureScheme::RSA_PKCS1_SHA256,
            rustls::SignatureScheme::RSA_PKCS1_SHA384,
            rustls::SignatureScheme::RSA_PKCS1_SHA512,
            rustls::SignatureScheme::ECDSA_NISTP256_SHA256,
            rustls::SignatureScheme::ECDSA_NISTP384_SHA384,
            rustls::SignatureScheme::ECDSA_NISTP521_SHA512,
            rustls::SignatureScheme::RSA_PSS_SHA256,
            rustls::SignatureScheme::RSA_PSS_SHA384,
            rustls::SignatureScheme::RSA_PSS_SHA512,
            rustls::SignatureScheme::ED25519,
        ]
    }
}
