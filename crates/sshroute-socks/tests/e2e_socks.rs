#![allow(clippy::tests_outside_test_module)]
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use sshroute_config::{RelayConfig, TcpConfig};
use sshroute_rules::{PatternMode, RoutingTable};
use sshroute_socks::{ProxyState, run};
use sshroute_tunnel::{
    BoxedStream, CredentialSource, EndpointSpec, Registry, Router, TcpDialer, Transport,
    TunnelError,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .with_test_writer()
        .try_init();
}

struct TcpEchoServer {
    addr: SocketAddr,
    shutdown: CancellationToken,
    handle: JoinHandle<()>,
}

impl TcpEchoServer {
    async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = CancellationToken::new();
        let shutdown_task = shutdown.clone();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    res = listener.accept() => {
                        if let Ok((mut stream, _)) = res {
                            tokio::spawn(async move {
                                let mut buf = [0u8; 4096];
                                loop {
                                    match stream.read(&mut buf).await {
                                        Ok(0) => break,
                                        Ok(n) => {
                                            if stream.write_all(&buf[..n]).await.is_err() {
                                                break;
                                            }
                                        }
                                        Err(_) => break,
                                    }
                                }
                            });
                        }
                    }
                    _ = shutdown_task.cancelled() => break,
                }
            }
        });
        Self {
            addr,
            shutdown,
            handle,
        }
    }

    async fn stop(self) {
        self.shutdown.cancel();
        let _ = self.handle.await;
    }
}

/// Stands in for an SSH session: every channel goes to the echo server,
/// and the requested destination is recorded.
struct EchoTransport {
    echo: SocketAddr,
    opened: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Transport for EchoTransport {
    async fn open_channel(&self, host: &str, port: u16) -> Result<BoxedStream, TunnelError> {
        self.opened.lock().unwrap().push(format!("{host}:{port}"));
        let stream = TcpStream::connect(self.echo).await?;
        Ok(Box::new(stream))
    }
}

struct Proxy {
    addr: SocketAddr,
    shutdown: CancellationToken,
    handle: JoinHandle<()>,
}

impl Proxy {
    async fn start(registry: Registry, filters: &[(&str, &str)]) -> Self {
        let table = RoutingTable::compile(filters.iter().copied(), PatternMode::Lenient).unwrap();
        let router = Router::new(
            Arc::new(registry),
            table,
            Arc::new(TcpDialer::new(TcpConfig::default())),
        );
        let state = Arc::new(ProxyState::new(
            Arc::new(router),
            RelayConfig {
                idle_timeout_secs: 5,
                ..Default::default()
            },
        ));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = CancellationToken::new();
        let token = shutdown.clone();
        let handle = tokio::spawn(async move {
            run(listener, state, token).await.unwrap();
        });
        Self {
            addr,
            shutdown,
            handle,
        }
    }

    async fn stop(self) {
        self.shutdown.cancel();
        let _ = self.handle.await;
    }
}

fn endpoint(name: &str) -> EndpointSpec {
    EndpointSpec {
        name: name.into(),
        host: format!("{name}.example"),
        port: 22,
        user: "ops".into(),
        parent: None,
        credential: CredentialSource::Password("pw".into()),
    }
}

/// Greet with NO AUTH and send a CONNECT for a domain name. Returns the
/// reply code.
async fn socks_connect_domain(stream: &mut TcpStream, domain: &str, port: u16) -> u8 {
    stream.write_all(&[0x05, 0x01, 0x00]).await.unwrap();
    let mut method = [0u8; 2];
    stream.read_exact(&mut method).await.unwrap();
    assert_eq!(method, [0x05, 0x00]);

    let mut req = vec![0x05, 0x01, 0x00, 0x03, domain.len() as u8];
    req.extend_from_slice(domain.as_bytes());
    req.extend_from_slice(&port.to_be_bytes());
    stream.write_all(&req).await.unwrap();

    let mut reply = [0u8; 10];
    stream.read_exact(&mut reply).await.unwrap();
    reply[1]
}

async fn socks_connect_ipv4(stream: &mut TcpStream, addr: SocketAddr) -> u8 {
    let SocketAddr::V4(v4) = addr else {
        panic!("expected IPv4 address");
    };
    stream.write_all(&[0x05, 0x01, 0x00]).await.unwrap();
    let mut method = [0u8; 2];
    stream.read_exact(&mut method).await.unwrap();

    let mut req = vec![0x05, 0x01, 0x00, 0x01];
    req.extend_from_slice(&v4.ip().octets());
    req.extend_from_slice(&v4.port().to_be_bytes());
    stream.write_all(&req).await.unwrap();

    let mut reply = [0u8; 10];
    stream.read_exact(&mut reply).await.unwrap();
    reply[1]
}

async fn assert_echo(stream: &mut TcpStream, payload: &[u8]) {
    stream.write_all(payload).await.unwrap();
    let mut buf = vec![0u8; payload.len()];
    tokio::time::timeout(Duration::from_secs(5), stream.read_exact(&mut buf))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(buf, payload);
}

#[tokio::test]
async fn unmatched_destination_connects_directly() {
    init_tracing();
    let echo = TcpEchoServer::start().await;
    let proxy = Proxy::start(Registry::default(), &[(".corp.", "bastion")]).await;

    let mut client = TcpStream::connect(proxy.addr).await.unwrap();
    assert_eq!(socks_connect_ipv4(&mut client, echo.addr).await, 0x00);
    assert_echo(&mut client, b"direct hello").await;

    drop(client);
    proxy.stop().await;
    echo.stop().await;
}

#[tokio::test]
async fn matched_destination_goes_through_tunnel_unresolved() {
    init_tracing();
    let echo = TcpEchoServer::start().await;
    let opened = Arc::new(Mutex::new(Vec::new()));

    let registry = Registry::load([endpoint("bastion"), endpoint("internal")]);
    registry
        .get("internal")
        .unwrap()
        .set_transport(Arc::new(EchoTransport {
            echo: echo.addr,
            opened: Arc::clone(&opened),
        }))
        .unwrap();

    // "bastion" is registered but never connected, so its rule is skipped.
    let proxy = Proxy::start(registry, &[(".corp.", "bastion"), (".corp.", "internal")]).await;

    let mut client = TcpStream::connect(proxy.addr).await.unwrap();
    assert_eq!(
        socks_connect_domain(&mut client, "db.corp.internal", 5432).await,
        0x00
    );
    assert_echo(&mut client, b"through the tunnel").await;
    assert_eq!(opened.lock().unwrap().as_slice(), ["db.corp.internal:5432"]);

    drop(client);
    proxy.stop().await;
    echo.stop().await;
}

#[tokio::test]
async fn refused_direct_dial_is_reported() {
    init_tracing();
    let closed = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };
    let proxy = Proxy::start(Registry::default(), &[]).await;

    let mut client = TcpStream::connect(proxy.addr).await.unwrap();
    assert_eq!(socks_connect_ipv4(&mut client, closed).await, 0x05);

    proxy.stop().await;
}

#[tokio::test]
async fn concurrent_sessions_share_one_router() {
    init_tracing();
    let echo = TcpEchoServer::start().await;
    let proxy = Proxy::start(Registry::default(), &[]).await;

    let mut tasks = Vec::new();
    for i in 0..8u8 {
        let proxy_addr = proxy.addr;
        let echo_addr = echo.addr;
        tasks.push(tokio::spawn(async move {
            let mut client = TcpStream::connect(proxy_addr).await.unwrap();
            assert_eq!(socks_connect_ipv4(&mut client, echo_addr).await, 0x00);
            assert_echo(&mut client, &[i; 32]).await;
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    proxy.stop().await;
    echo.stop().await;
}
