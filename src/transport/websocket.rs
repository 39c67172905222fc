//! WebSocket transport implementation for the Mapepire daemon.
//!
//! The daemon listens on `wss://{host}:{port}/db/` and authenticates the
//! upgrade request with Basic-Auth. Application payloads are text frames.
//! Pings are answered and peer-initiated closes are completed while a
//! receive is pending; nothing runs in the background.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpSocket, TcpStream};
use tokio::time::{timeout, timeout_at, Instant};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::{header, HeaderValue, StatusCode};
use tokio_tungstenite::tungstenite::protocol::frame::coding::{Data, OpCode};
use tokio_tungstenite::tungstenite::protocol::frame::Frame;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{client_async_tls_with_config, Connector, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, trace, warn};

use crate::connection::DaemonServer;
use crate::error::{ConnectionError, TransportError};

use super::protocol::TransportProtocol;
use super::tls::TlsPolicy;

type DaemonStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket transport implementation.
pub struct WebSocketTransport {
    /// WebSocket connection (None if not connected)
    ws_stream: Option<DaemonStream>,
    /// Connection state
    state: ConnectionState,
    /// Read timeout for responses
    timeout: Duration,
    /// Largest outbound frame payload
    frame_size: usize,
}

/// Connection state tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionState {
    /// Not connected
    Disconnected,
    /// Handshake completed
    Connected,
    /// Connection closed
    Closed,
}

impl WebSocketTransport {
    /// Create a new WebSocket transport.
    pub fn new() -> Self {
        Self {
            ws_stream: None,
            state: ConnectionState::Disconnected,
            timeout: Duration::from_secs(crate::connection::params::DEFAULT_TIMEOUT_SECS),
            frame_size: crate::connection::params::DEFAULT_FRAME_SIZE,
        }
    }

    fn stream_mut(&mut self) -> Result<&mut DaemonStream, TransportError> {
        if self.state != ConnectionState::Connected {
            return Err(TransportError::NotConnected);
        }
        self.ws_stream.as_mut().ok_or(TransportError::NotConnected)
    }

    /// Drop the stream after an error that leaves it out of step with the daemon.
    ///
    /// A late reply to a timed-out request would otherwise be read as the
    /// answer to the next one.
    fn abandon_on_fatal(&mut self, err: TransportError) -> TransportError {
        if err.is_fatal() && self.ws_stream.take().is_some() {
            warn!(error = %err, "Dropping daemon connection");
            self.state = ConnectionState::Closed;
        }
        err
    }
}

impl Default for WebSocketTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TransportProtocol for WebSocketTransport {
    async fn connect(
        &mut self,
        profile: &DaemonServer,
        policy: TlsPolicy,
    ) -> Result<(), ConnectionError> {
        if self.state == ConnectionState::Connected {
            return Err(ConnectionError::AlreadyConnected);
        }

        // Dropping the handshake future on timeout drops the socket with it
        let ws_stream = timeout(profile.timeout(), open_session(profile, policy))
            .await
            .map_err(|_| ConnectionError::Timeout {
                timeout_secs: profile.timeout_secs(),
            })??;

        info!(
            host = profile.host(),
            port = profile.port(),
            user = profile.user(),
            verify_peer = policy.verify_peer,
            verify_peer_name = policy.verify_peer_name,
            "Connected to Mapepire daemon"
        );

        self.ws_stream = Some(ws_stream);
        self.state = ConnectionState::Connected;
        self.timeout = profile.timeout();
        self.frame_size = profile.frame_size();

        Ok(())
    }

    async fn send_text(&mut self, message: &str) -> Result<(), TransportError> {
        let frame_size = self.frame_size;
        let ws_stream = self.stream_mut()?;

        match send_fragmented(ws_stream, message, frame_size).await {
            Ok(frames) => {
                trace!(bytes = message.len(), frames, "Request sent");
                Ok(())
            }
            Err(e) => Err(self.abandon_on_fatal(e)),
        }
    }

    async fn receive_text(&mut self) -> Result<String, TransportError> {
        let limit = self.timeout;
        let ws_stream = self.stream_mut()?;

        match receive_text(ws_stream, limit).await {
            Ok(text) => {
                trace!(bytes = text.len(), "Response received");
                Ok(text)
            }
            Err(e) => Err(self.abandon_on_fatal(e)),
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        let Some(mut ws_stream) = self.ws_stream.take() else {
            if self.state == ConnectionState::Connected {
                self.state = ConnectionState::Closed;
            }
            return Ok(());
        };
        self.state = ConnectionState::Closed;

        // Close errors leave nothing to recover; the socket is released either way
        match timeout(self.timeout, close_handshake(&mut ws_stream)).await {
            Ok(Ok(())) => info!("Mapepire session closed"),
            Ok(Err(e)) => warn!(error = %e, "Closing handshake failed"),
            Err(_) => warn!(
                timeout_secs = self.timeout.as_secs(),
                "Closing handshake timed out"
            ),
        }

        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }
}

/// Build the upgrade request: target URI plus the Basic-Auth header.
///
/// The standard `Upgrade`, `Connection`, `Sec-WebSocket-Version` and
/// `Sec-WebSocket-Key` headers are filled in by tungstenite.
pub(crate) fn handshake_request(profile: &DaemonServer) -> Result<Request, ConnectionError> {
    let mut request = profile
        .uri()
        .into_client_request()
        .map_err(|e| ConnectionError::InvalidRequest(e.to_string()))?;

    let mut authorization = HeaderValue::from_str(&profile.credentials().authorization_header())
        .map_err(|e| ConnectionError::InvalidRequest(e.to_string()))?;
    authorization.set_sensitive(true);
    request
        .headers_mut()
        .insert(header::AUTHORIZATION, authorization);

    Ok(request)
}

async fn open_session(
    profile: &DaemonServer,
    policy: TlsPolicy,
) -> Result<DaemonStream, ConnectionError> {
    let request = handshake_request(profile)?;
    let connector = Connector::Rustls(policy.client_config()?);
    let tcp_stream = open_tcp(profile).await?;

    debug!(uri = %request.uri(), "Starting WebSocket handshake");

    let (ws_stream, response) =
        client_async_tls_with_config(request, tcp_stream, None, Some(connector))
            .await
            .map_err(|e| handshake_error(profile, e))?;

    debug!(status = %response.status(), "WebSocket upgrade accepted");
    Ok(ws_stream)
}

/// Resolve the host and connect to the first reachable address.
async fn open_tcp(profile: &DaemonServer) -> Result<TcpStream, ConnectionError> {
    let failed = |message: String| ConnectionError::ConnectionFailed {
        host: profile.host().to_string(),
        port: profile.port(),
        message,
    };

    let addrs = tokio::net::lookup_host((resolvable_host(profile.host()), profile.port()))
        .await
        .map_err(|e| failed(e.to_string()))?;

    let mut last_error = None;
    for addr in addrs {
        match connect_addr(addr, profile.persistent()).await {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                debug!(%addr, error = %e, "TCP connect attempt failed");
                last_error = Some(e);
            }
        }
    }

    Err(failed(
        last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "host resolved to no addresses".to_string()),
    ))
}

/// Host as the resolver expects it: IPv6 literals without URI brackets.
fn resolvable_host(host: &str) -> &str {
    host.strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host)
}

async fn connect_addr(addr: SocketAddr, keepalive: bool) -> std::io::Result<TcpStream> {
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    socket.set_keepalive(keepalive)?;

    let stream = socket.connect(addr).await?;
    stream.set_nodelay(true)?;
    Ok(stream)
}

fn handshake_error(profile: &DaemonServer, err: WsError) -> ConnectionError {
    match err {
        WsError::Http(response) => {
            let status = response.status();
            if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                ConnectionError::AuthenticationFailed(format!(
                    "daemon rejected credentials for user '{}' ({})",
                    profile.user(),
                    status
                ))
            } else {
                ConnectionError::UpgradeRejected {
                    status: status.as_u16(),
                }
            }
        }
        WsError::Tls(e) => ConnectionError::TlsError(e.to_string()),
        WsError::Url(e) => ConnectionError::InvalidRequest(e.to_string()),
        WsError::Io(e) => {
            // tokio-rustls reports certificate failures as io::Error
            match e
                .get_ref()
                .and_then(|inner| inner.downcast_ref::<rustls::Error>())
            {
                Some(tls) => ConnectionError::TlsError(tls.to_string()),
                None => ConnectionError::ConnectionFailed {
                    host: profile.host().to_string(),
                    port: profile.port(),
                    message: e.to_string(),
                },
            }
        }
        other => ConnectionError::ConnectionFailed {
            host: profile.host().to_string(),
            port: profile.port(),
            message: other.to_string(),
        },
    }
}

/// Send `message` as one text message, split into frames of at most
/// `frame_size` bytes. Returns the number of frames written.
pub(crate) async fn send_fragmented<S>(
    ws_stream: &mut WebSocketStream<S>,
    message: &str,
    frame_size: usize,
) -> Result<usize, TransportError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let send_error = |e: WsError| TransportError::SendError(e.to_string());
    let bytes = message.as_bytes();
    let frame_size = frame_size.max(1);

    if bytes.len() <= frame_size {
        ws_stream
            .send(Message::Text(message.to_string()))
            .await
            .map_err(send_error)?;
        return Ok(1);
    }

    let chunks: Vec<&[u8]> = bytes.chunks(frame_size).collect();
    let last = chunks.len() - 1;
    for (index, chunk) in chunks.iter().enumerate() {
        let opcode = if index == 0 {
            OpCode::Data(Data::Text)
        } else {
            OpCode::Data(Data::Continue)
        };
        let frame = Frame::message(chunk.to_vec(), opcode, index == last);
        ws_stream
            .feed(Message::Frame(frame))
            .await
            .map_err(send_error)?;
    }
    ws_stream.flush().await.map_err(send_error)?;

    debug!(frames = chunks.len(), frame_size, "Fragmented request");
    Ok(chunks.len())
}

/// Wait up to `limit` for the next data message and return it as text.
///
/// Pings are answered and pongs skipped while waiting. A close from the peer
/// is acknowledged and reported as `ConnectionClosed`.
pub(crate) async fn receive_text<S>(
    ws_stream: &mut WebSocketStream<S>,
    limit: Duration,
) -> Result<String, TransportError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    // No deadline if the limit does not fit on the clock
    let deadline = Instant::now().checked_add(limit);

    loop {
        let next = match deadline {
            Some(deadline) => timeout_at(deadline, ws_stream.next())
                .await
                .map_err(|_| TransportError::Timeout {
                    timeout_secs: limit.as_secs(),
                })?,
            None => ws_stream.next().await,
        };

        let message = match next {
            Some(Ok(message)) => message,
            Some(Err(e)) => return Err(e.into()),
            None => {
                return Err(TransportError::ConnectionClosed(
                    "stream ended".to_string(),
                ))
            }
        };

        match message {
            Message::Text(text) => return Ok(text),
            Message::Binary(data) => {
                return String::from_utf8(data)
                    .map_err(|e| TransportError::InvalidPayload(e.to_string()));
            }
            Message::Ping(_) => {
                // tungstenite queues the pong; flushing puts it on the wire
                trace!("Ping received");
                ws_stream
                    .flush()
                    .await
                    .map_err(|e| TransportError::SendError(e.to_string()))?;
            }
            Message::Pong(_) => trace!("Pong received"),
            Message::Close(frame) => {
                let reason = frame
                    .map(|f| format!("{} {}", u16::from(f.code), f.reason))
                    .unwrap_or_else(|| "no close frame".to_string());
                debug!(%reason, "WebSocket closed by remote");
                // Completes the closing handshake; the peer may already be gone
                let _ = ws_stream.flush().await;
                return Err(TransportError::ConnectionClosed(reason));
            }
            Message::Frame(_) => {}
        }
    }
}

/// Send a close frame and drain until the peer acknowledges it.
pub(crate) async fn close_handshake<S>(ws_stream: &mut WebSocketStream<S>) -> Result<(), WsError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    ws_stream.close(None).await?;

    while let Some(message) = ws_stream.next().await {
        match message {
            Ok(_) => {}
            Err(WsError::ConnectionClosed) | Err(WsError::AlreadyClosed) => break,
            Err(e) => return Err(e),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::DuplexStream;
    use tokio::net::TcpListener;
    use tokio_tungstenite::tungstenite::protocol::{Role, WebSocketConfig};

    async fn ws_pair(
        server_config: Option<WebSocketConfig>,
    ) -> (WebSocketStream<DuplexStream>, WebSocketStream<DuplexStream>) {
        let (client_io, server_io) = tokio::io::duplex(64 * 1024);
        let client = WebSocketStream::from_raw_socket(client_io, Role::Client, None).await;
        let server = WebSocketStream::from_raw_socket(server_io, Role::Server, server_config).await;
        (client, server)
    }

    /// A transport marked connected over plain loopback TCP, plus the peer end.
    async fn connected_transport(
        limit: Duration,
    ) -> (WebSocketTransport, WebSocketStream<TcpStream>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (client, accepted) = tokio::join!(TcpStream::connect(addr), listener.accept());

        let client = WebSocketStream::from_raw_socket(
            MaybeTlsStream::Plain(client.unwrap()),
            Role::Client,
            None,
        )
        .await;
        let server =
            WebSocketStream::from_raw_socket(accepted.unwrap().0, Role::Server, None).await;

        let mut transport = WebSocketTransport::new();
        transport.ws_stream = Some(client);
        transport.state = ConnectionState::Connected;
        transport.timeout = limit;
        (transport, server)
    }

    fn test_profile() -> DaemonServer {
        DaemonServer::builder()
            .host("localhost")
            .port(8076)
            .user("meMyself")
            .password("secret")
            .ignore_unauthorized(true)
            .timeout_secs(1)
            .build()
            .unwrap()
    }

    #[test]
    fn test_websocket_transport_new() {
        let transport = WebSocketTransport::new();
        assert!(!transport.is_connected());
        assert_eq!(transport.state, ConnectionState::Disconnected);
    }

    #[test]
    fn test_handshake_request_headers() {
        let request = handshake_request(&test_profile()).unwrap();

        assert_eq!(request.uri().scheme_str(), Some("wss"));
        assert_eq!(request.uri().host(), Some("localhost"));
        assert_eq!(request.uri().port_u16(), Some(8076));
        assert_eq!(request.uri().path(), "/db/");

        let headers = request.headers();
        assert_eq!(
            headers.get(header::AUTHORIZATION).unwrap(),
            "Basic bWVNeXNlbGY6c2VjcmV0"
        );
        assert!(headers.get(header::AUTHORIZATION).unwrap().is_sensitive());
        assert_eq!(headers.get(header::UPGRADE).unwrap(), "websocket");
        assert_eq!(headers.get(header::SEC_WEBSOCKET_VERSION).unwrap(), "13");
        assert!(headers.contains_key(header::SEC_WEBSOCKET_KEY));
    }

    #[tokio::test]
    async fn test_send_requires_connection() {
        let mut transport = WebSocketTransport::new();

        let result = transport.send_text("{}").await;
        assert!(matches!(result, Err(TransportError::NotConnected)));

        let result = transport.receive_text().await;
        assert!(matches!(result, Err(TransportError::NotConnected)));
    }

    #[tokio::test]
    async fn test_close_idempotent() {
        let mut transport = WebSocketTransport::new();

        assert!(transport.close().await.is_ok());
        assert_eq!(transport.state, ConnectionState::Disconnected);

        transport.state = ConnectionState::Closed;
        assert!(transport.close().await.is_ok());
        assert!(transport.close().await.is_ok());
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let profile = DaemonServer::builder()
            .host("127.0.0.1")
            .port(port)
            .user("u")
            .password("p")
            .build()
            .unwrap();

        let mut transport = WebSocketTransport::new();
        let result = transport
            .connect(&profile, TlsPolicy::from_profile(&profile))
            .await;

        assert!(matches!(
            result,
            Err(ConnectionError::ConnectionFailed { port: p, .. }) if p == port
        ));
        assert!(!transport.is_connected());
        assert!(matches!(
            transport.send_text("{}").await,
            Err(TransportError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_connect_times_out_on_silent_peer() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(socket);
        });

        let profile = DaemonServer::builder()
            .host("127.0.0.1")
            .port(port)
            .user("u")
            .password("p")
            .timeout_secs(1)
            .build()
            .unwrap();

        let mut transport = WebSocketTransport::new();
        let result = transport
            .connect(&profile, TlsPolicy::from_profile(&profile))
            .await;

        assert!(matches!(
            result,
            Err(ConnectionError::Timeout { timeout_secs: 1 })
        ));
        assert!(!transport.is_connected());
        server.abort();
    }

    #[tokio::test]
    async fn test_connect_to_non_tls_peer_fails() {
        use tokio::io::AsyncWriteExt;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let _ = socket
                .write_all(b"HTTP/1.1 400 Bad Request\r\n\r\nthis is not tls\r\n")
                .await;
            tokio::time::sleep(Duration::from_millis(200)).await;
        });

        let profile = DaemonServer::builder()
            .host("127.0.0.1")
            .port(port)
            .user("u")
            .password("p")
            .ignore_unauthorized(true)
            .verify_host_name(false)
            .timeout_secs(5)
            .build()
            .unwrap();

        let mut transport = WebSocketTransport::new();
        let result = transport
            .connect(&profile, TlsPolicy::from_profile(&profile))
            .await;

        assert!(matches!(
            result,
            Err(ConnectionError::TlsError(_)) | Err(ConnectionError::ConnectionFailed { .. })
        ));
        assert!(!transport.is_connected());
        let _ = server.await;
    }

    #[tokio::test]
    async fn test_small_message_is_one_frame() {
        let (mut client, mut server) = ws_pair(None).await;

        let frames = send_fragmented(&mut client, "{\"id\":\"t1\"}", 4096)
            .await
            .unwrap();
        assert_eq!(frames, 1);

        let received = server.next().await.unwrap().unwrap();
        assert_eq!(received, Message::Text("{\"id\":\"t1\"}".to_string()));
    }

    #[tokio::test]
    async fn test_large_message_is_fragmented() {
        let mut config = WebSocketConfig::default();
        config.max_frame_size = Some(16);
        let (mut client, mut server) = ws_pair(Some(config)).await;

        let message = format!("{{\"sql\":\"{}\"}}", "x".repeat(90));
        let frames = send_fragmented(&mut client, &message, 16).await.unwrap();
        assert_eq!(frames, message.len().div_ceil(16));

        let received = server.next().await.unwrap().unwrap();
        assert_eq!(received, Message::Text(message));
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected_by_strict_peer() {
        let mut config = WebSocketConfig::default();
        config.max_frame_size = Some(16);
        let (mut client, mut server) = ws_pair(Some(config)).await;

        let message = "y".repeat(64);
        send_fragmented(&mut client, &message, 4096).await.unwrap();

        assert!(server.next().await.unwrap().is_err());
    }

    #[tokio::test]
    async fn test_fragmentation_splits_multibyte_text() {
        let (mut client, mut server) = ws_pair(None).await;

        let message = "äöü€".repeat(10);
        let frames = send_fragmented(&mut client, &message, 5).await.unwrap();
        assert!(frames > 1);

        let received = server.next().await.unwrap().unwrap();
        assert_eq!(received.into_text().unwrap(), message);
    }

    #[tokio::test]
    async fn test_receive_answers_ping() {
        let (mut client, mut server) = ws_pair(None).await;

        server.send(Message::Ping(vec![1, 2, 3])).await.unwrap();
        server
            .send(Message::Text("{\"success\":true}".to_string()))
            .await
            .unwrap();

        let text = receive_text(&mut client, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(text, "{\"success\":true}");

        let pong = server.next().await.unwrap().unwrap();
        assert_eq!(pong, Message::Pong(vec![1, 2, 3]));
    }

    #[tokio::test]
    async fn test_receive_binary_as_text() {
        let (mut client, mut server) = ws_pair(None).await;

        server
            .send(Message::Binary(b"{\"id\":\"b\"}".to_vec()))
            .await
            .unwrap();
        let text = receive_text(&mut client, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(text, "{\"id\":\"b\"}");

        server.send(Message::Binary(vec![0xff, 0xfe])).await.unwrap();
        let result = receive_text(&mut client, Duration::from_secs(5)).await;
        assert!(matches!(result, Err(TransportError::InvalidPayload(_))));
    }

    #[tokio::test]
    async fn test_receive_reports_peer_close() {
        let (mut client, mut server) = ws_pair(None).await;

        server.close(None).await.unwrap();

        let result = receive_text(&mut client, Duration::from_secs(5)).await;
        assert!(matches!(result, Err(TransportError::ConnectionClosed(_))));

        // The client acknowledged the close
        let ack = server.next().await.unwrap().unwrap();
        assert!(ack.is_close());
    }

    #[tokio::test(start_paused = true)]
    async fn test_receive_times_out() {
        let (mut client, _server) = ws_pair(None).await;

        let result = receive_text(&mut client, Duration::from_secs(60)).await;
        assert!(matches!(
            result,
            Err(TransportError::Timeout { timeout_secs: 60 })
        ));
    }

    #[tokio::test]
    async fn test_close_handshake_completes() {
        let (mut client, mut server) = ws_pair(None).await;

        let peer = tokio::spawn(async move {
            let mut saw_close = false;
            while let Some(Ok(message)) = server.next().await {
                saw_close |= message.is_close();
            }
            saw_close
        });

        timeout(Duration::from_secs(5), close_handshake(&mut client))
            .await
            .expect("closing handshake should finish")
            .unwrap();
        assert!(peer.await.unwrap());
    }

    #[tokio::test]
    async fn test_receive_without_deadline_for_huge_timeout() {
        let (mut client, mut server) = ws_pair(None).await;
        server
            .send(Message::Text("{\"id\":\"t1\"}".to_string()))
            .await
            .unwrap();

        let text = receive_text(&mut client, Duration::from_secs(u64::MAX))
            .await
            .unwrap();
        assert_eq!(text, "{\"id\":\"t1\"}");
    }

    #[tokio::test]
    async fn test_transport_with_max_profile_timeout_receives() {
        let profile = DaemonServer::builder()
            .user("u")
            .password("p")
            .timeout_secs(u64::MAX)
            .build()
            .unwrap();
        let (mut transport, mut server) = connected_transport(profile.timeout()).await;

        server.send(Message::Text("pong".to_string())).await.unwrap();
        assert_eq!(transport.receive_text().await.unwrap(), "pong");
        assert!(transport.is_connected());
    }

    #[tokio::test]
    async fn test_timed_out_exchange_drops_connection() {
        let (mut transport, mut server) = connected_transport(Duration::from_secs(1)).await;
        let peer = tokio::spawn(async move {
            let request = server.next().await.unwrap().unwrap();
            tokio::time::sleep(Duration::from_millis(1500)).await;
            // The client is gone by now; the late reply goes nowhere
            let _ = server
                .send(Message::Text(format!("reply to {}", request.into_text().unwrap())))
                .await;
        });

        transport.send_text("q1").await.unwrap();
        let result = transport.receive_text().await;
        assert!(matches!(
            result,
            Err(TransportError::Timeout { timeout_secs: 1 })
        ));
        assert!(!transport.is_connected());

        assert!(matches!(
            transport.send_text("q2").await,
            Err(TransportError::NotConnected)
        ));
        assert!(matches!(
            transport.receive_text().await,
            Err(TransportError::NotConnected)
        ));
        let _ = peer.await;
    }

    #[tokio::test]
    async fn test_invalid_payload_keeps_connection() {
        let (mut transport, mut server) = connected_transport(Duration::from_secs(5)).await;
        server.send(Message::Binary(vec![0xff, 0xfe])).await.unwrap();
        server.send(Message::Text("next".to_string())).await.unwrap();

        let result = transport.receive_text().await;
        assert!(matches!(result, Err(TransportError::InvalidPayload(_))));
        assert!(transport.is_connected());
        assert_eq!(transport.receive_text().await.unwrap(), "next");
    }

    #[tokio::test]
    async fn test_peer_close_drops_connection() {
        let (mut transport, mut server) = connected_transport(Duration::from_secs(5)).await;
        server.close(None).await.unwrap();

        let result = transport.receive_text().await;
        assert!(matches!(result, Err(TransportError::ConnectionClosed(_))));
        assert!(!transport.is_connected());
        assert!(transport.close().await.is_ok());
    }

    #[tokio::test]
    async fn test_bracketed_ipv6_host_resolves() {
        assert_eq!(resolvable_host("[::1]"), "::1");
        assert_eq!(resolvable_host("::1"), "::1");
        assert_eq!(resolvable_host("ibmi.example.com"), "ibmi.example.com");

        let profile = DaemonServer::builder()
            .host("[::1]")
            .user("u")
            .password("p")
            .build()
            .unwrap();
        assert_eq!(profile.uri(), "wss://[::1]:8076/db/");

        let addrs: Vec<SocketAddr> =
            tokio::net::lookup_host((resolvable_host(profile.host()), profile.port()))
                .await
                .unwrap()
                .collect();
        assert_eq!(addrs, vec!["[::1]:8076".parse::<SocketAddr>().unwrap()]);
    }
}
