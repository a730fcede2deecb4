#![allow(missing_docs, clippy::unwrap_used)]
//! End-to-end tests of the accept loop over real sockets.

use std::net::SocketAddr;
use std::time::Duration;

use otp_core::framing;
use otp_core::{Message, Role, Session, SessionError};
use otp_server::{ServerConfig, run_server};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::timeout;

const PATIENCE: Duration = Duration::from_secs(10);

struct TestServer {
    addr: SocketAddr,
    stop: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl TestServer {
    async fn start(config: ServerConfig) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (stop, stopped) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            run_server(listener, config, async {
                let _ = stopped.await;
            })
            .await
            .unwrap();
        });
        Self { addr, stop, handle }
    }

    async fn stop(self) {
        self.stop.send(()).unwrap();
        timeout(PATIENCE, self.handle).await.unwrap().unwrap();
    }
}

fn msg(s: &str) -> Message {
    s.parse().unwrap()
}

async fn request(addr: SocketAddr, role: Role, text: &str, key: &str) -> Result<Message, SessionError> {
    let stream = TcpStream::connect(addr).await.unwrap();
    Session::new(stream, role).request(&msg(text), &msg(key)).await
}

/// Connects and completes the handshake, then holds the session open.
async fn stalled_session(addr: SocketAddr) -> TcpStream {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(b"ENC").await.unwrap();
    let mut status = [0u8; 2];
    stream.read_exact(&mut status).await.unwrap();
    assert_eq!(&status, b"OK");
    stream
}

#[tokio::test]
async fn encrypts_and_decrypts_hello() {
    let enc = TestServer::start(ServerConfig::new(Role::Encrypt)).await;
    let dec = TestServer::start(ServerConfig::new(Role::Decrypt)).await;

    let ciphertext = request(enc.addr, Role::Encrypt, "HELLO", "ABCDE").await.unwrap();
    assert_eq!(ciphertext.to_string(), "HFNOS");
    let plaintext = request(dec.addr, Role::Decrypt, "HFNOS", "ABCDE").await.unwrap();
    assert_eq!(plaintext.to_string(), "HELLO");

    enc.stop().await;
    dec.stop().await;
}

#[tokio::test]
async fn serves_more_clients_than_slots() {
    let config = ServerConfig {
        max_sessions: 2,
        ..ServerConfig::new(Role::Encrypt)
    };
    let server = TestServer::start(config).await;

    let clients: Vec<_> = (0..7)
        .map(|_| tokio::spawn(request(server.addr, Role::Encrypt, "HELLO WORLD", "ABCDEFGHIJKLMN")))
        .collect();
    for client in clients {
        let result = timeout(PATIENCE, client).await.unwrap().unwrap().unwrap();
        assert_eq!(result.len(), 11);
    }

    server.stop().await;
}

#[tokio::test]
async fn client_beyond_the_cap_waits_for_a_free_slot() {
    let config = ServerConfig {
        max_sessions: 2,
        ..ServerConfig::new(Role::Encrypt)
    };
    let server = TestServer::start(config).await;

    let first = stalled_session(server.addr).await;
    let _second = stalled_session(server.addr).await;

    let mut third = tokio::spawn(request(server.addr, Role::Encrypt, "HELLO", "ABCDE"));
    assert!(
        timeout(Duration::from_millis(300), &mut third).await.is_err(),
        "third client must wait while both slots are taken"
    );

    drop(first);
    let result = timeout(PATIENCE, third).await.unwrap().unwrap().unwrap();
    assert_eq!(result.to_string(), "HFNOS");
}

#[tokio::test]
async fn wrong_role_gets_an_explicit_rejection() {
    let server = TestServer::start(ServerConfig::new(Role::Encrypt)).await;

    let err = timeout(PATIENCE, request(server.addr, Role::Decrypt, "HFNOS", "ABCDE"))
        .await
        .unwrap()
        .unwrap_err();
    assert!(matches!(err, SessionError::Rejected { role: Role::Decrypt }));

    let mut raw = TcpStream::connect(server.addr).await.unwrap();
    raw.write_all(b"XYZ").await.unwrap();
    let mut reply = Vec::new();
    timeout(PATIENCE, raw.read_to_end(&mut reply)).await.unwrap().unwrap();
    assert_eq!(reply, b"NO");

    server.stop().await;
}

#[tokio::test]
async fn failed_sessions_leave_the_server_running() {
    let server = TestServer::start(ServerConfig::new(Role::Encrypt)).await;

    // Invalid symbols: the server closes without replying.
    let mut raw = stalled_session(server.addr).await;
    framing::send_message(&mut raw, b"hello").await.unwrap();
    framing::send_message(&mut raw, b"ABCDE").await.unwrap();
    let mut reply = Vec::new();
    timeout(PATIENCE, raw.read_to_end(&mut reply)).await.unwrap().unwrap();
    assert!(reply.is_empty());

    // Key shorter than the text.
    let mut raw = stalled_session(server.addr).await;
    framing::send_message(&mut raw, b"HELLO").await.unwrap();
    framing::send_message(&mut raw, b"AB").await.unwrap();
    let mut reply = Vec::new();
    timeout(PATIENCE, raw.read_to_end(&mut reply)).await.unwrap().unwrap();
    assert!(reply.is_empty());

    // Client vanishing mid-handshake.
    let mut raw = TcpStream::connect(server.addr).await.unwrap();
    raw.write_all(b"E").await.unwrap();
    drop(raw);

    // A session left open does not block a concurrent one.
    let _open = stalled_session(server.addr).await;
    let result = request(server.addr, Role::Encrypt, "HELLO", "ABCDE").await.unwrap();
    assert_eq!(result.to_string(), "HFNOS");
}

#[tokio::test]
async fn session_timeout_closes_a_hung_peer() {
    let config = ServerConfig {
        session_timeout_secs: Some(1),
        ..ServerConfig::new(Role::Encrypt)
    };
    let server = TestServer::start(config).await;

    let mut hung = stalled_session(server.addr).await;
    let mut rest = Vec::new();
    timeout(PATIENCE, hung.read_to_end(&mut rest)).await.unwrap().unwrap();
    assert!(rest.is_empty());

    server.stop().await;
}

#[tokio::test]
async fn shutdown_aborts_sessions_that_outlast_the_grace_period() {
    let config = ServerConfig {
        shutdown_grace_secs: 1,
        ..ServerConfig::new(Role::Encrypt)
    };
    let server = TestServer::start(config).await;

    let mut hung = stalled_session(server.addr).await;
    server.stop().await;

    let mut rest = Vec::new();
    timeout(PATIENCE, hung.read_to_end(&mut rest)).await.unwrap().unwrap();
    assert!(rest.is_empty());
}

#[tokio::test]
async fn shutdown_lets_a_running_session_finish() {
    let server = TestServer::start(ServerConfig::new(Role::Encrypt)).await;

    let mut raw = stalled_session(server.addr).await;
    let TestServer { stop, handle, .. } = server;
    stop.send(()).unwrap();

    framing::send_message(&mut raw, b"HELLO").await.unwrap();
    framing::send_message(&mut raw, b"ABCDE").await.unwrap();
    let reply = timeout(PATIENCE, framing::receive_message(&mut raw, 64))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reply, b"HFNOS");
    timeout(PATIENCE, handle).await.unwrap().unwrap();
}

#[tokio::test]
async fn oversized_frame_ends_only_that_session() {
    let config = ServerConfig {
        max_frame_len: 8,
        ..ServerConfig::new(Role::Encrypt)
    };
    let server = TestServer::start(config).await;

    let mut raw = stalled_session(server.addr).await;
    raw.write_all(&u32::MAX.to_be_bytes()).await.unwrap();
    let mut reply = Vec::new();
    timeout(PATIENCE, raw.read_to_end(&mut reply)).await.unwrap().unwrap();
    assert!(reply.is_empty());

    let result = request(server.addr, Role::Encrypt, "SMALL", "KEYSS").await.unwrap();
    assert_eq!(result.len(), 5);

    server.stop().await;
}

#[tokio::test]
async fn zero_session_cap_is_refused() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let config = ServerConfig {
        max_sessions: 0,
        ..ServerConfig::default()
    };
    assert!(run_server(listener, config, std::future::pending()).await.is_err());
}
