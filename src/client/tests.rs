use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::time::{sleep, timeout};

use super::{ClientOptions, run_with_io};
use crate::broker::Registry;
use crate::session::{Role, SessionOptions};
use crate::transport::serve;
use crate::utils::RelayError;

async fn start_relay() -> (SocketAddr, Arc<Registry>, oneshot::Sender<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind relay");
    let addr = listener.local_addr().expect("local addr");
    let registry = Arc::new(Registry::new());
    let (tx, rx) = oneshot::channel::<()>();
    tokio::spawn(serve(
        listener,
        Arc::clone(&registry),
        SessionOptions::default(),
        async {
            let _ = rx.await;
        },
    ));
    (addr, registry, tx)
}

fn options(addr: SocketAddr, role: Role, topic: &str) -> ClientOptions {
    ClientOptions {
        host: addr.ip().to_string(),
        port: addr.port(),
        role,
        topic: Some(topic.to_string()),
    }
}

async fn wait_until(mut cond: impl FnMut() -> bool) {
    timeout(Duration::from_secs(2), async {
        while !cond() {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not met in time");
}

#[tokio::test]
async fn publisher_client_sends_lines_until_terminate() {
    let (addr, registry, _shutdown) = start_relay().await;

    let stream = TcpStream::connect(addr).await.unwrap();
    let (reader, mut writer) = stream.into_split();
    writer.write_all(b"SUBSCRIBER\nquotes\n").await.unwrap();
    let mut subscriber = BufReader::new(reader).lines();
    subscriber.next_line().await.unwrap().expect("acknowledgment");
    wait_until(|| registry.subscriber_count("quotes") == 1).await;

    let input: &[u8] = b"first quote\nsecond quote\nterminate\nnever sent\n";
    let result = timeout(
        Duration::from_secs(2),
        run_with_io(options(addr, Role::Publisher, "quotes"), input, tokio::io::sink()),
    )
    .await
    .expect("client did not finish");
    assert!(result.is_ok());

    let first = subscriber.next_line().await.unwrap().unwrap();
    let second = subscriber.next_line().await.unwrap().unwrap();
    assert!(first.ends_with("]: first quote"), "got {first}");
    assert!(second.ends_with("]: second quote"), "got {second}");

    wait_until(|| registry.publisher_count("quotes") == 0).await;
    let extra = timeout(Duration::from_millis(200), subscriber.next_line()).await;
    assert!(extra.is_err(), "nothing after terminate should be relayed");
}

#[tokio::test]
async fn subscriber_client_prints_deliveries() {
    let (addr, registry, _shutdown) = start_relay().await;

    let (mut user, input) = tokio::io::duplex(256);
    let (output, printed) = tokio::io::duplex(1024);
    let client = tokio::spawn(run_with_io(
        options(addr, Role::Subscriber, "alerts"),
        BufReader::new(input),
        output,
    ));
    wait_until(|| registry.subscriber_count("alerts") == 1).await;

    let mut publisher = TcpStream::connect(addr).await.unwrap();
    publisher
        .write_all(b"PUBLISHER\nalerts\nfire drill\n")
        .await
        .unwrap();

    let mut printed = BufReader::new(printed).lines();
    let line = timeout(Duration::from_secs(2), printed.next_line())
        .await
        .expect("timed out")
        .unwrap()
        .unwrap();
    assert!(line.starts_with("Received: [Publisher "), "got {line}");
    assert!(line.ends_with("]: fire drill"));

    // Anything but terminate is ignored.
    user.write_all(b"hello?\nterminate\n").await.unwrap();
    let result = timeout(Duration::from_secs(2), client)
        .await
        .expect("client did not finish")
        .unwrap();
    assert!(result.is_ok());
    wait_until(|| registry.subscriber_count("alerts") == 0).await;
}

#[tokio::test]
async fn handshake_fails_when_server_hangs_up() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        if let Ok((stream, _)) = listener.accept().await {
            drop(stream);
        }
    });

    let input: &[u8] = b"";
    let result = run_with_io(
        options(addr, Role::Subscriber, "t"),
        input,
        tokio::io::sink(),
    )
    .await;
    assert!(matches!(result, Err(RelayError::HandshakeRejected(_)) | Err(RelayError::Io(_))));
}

#[tokio::test]
async fn handshake_fails_on_rejection_notice() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        if let Ok((stream, _)) = listener.accept().await {
            let (reader, mut writer) = stream.into_split();
            let mut handshake = BufReader::new(reader).lines();
            // role, then topic
            let _ = handshake.next_line().await;
            let _ = handshake.next_line().await;
            let _ = writer
                .write_all(b"Invalid role. Use PUBLISHER or SUBSCRIBER\n")
                .await;
            // hold the socket open until the client hangs up
            while let Ok(Some(_)) = handshake.next_line().await {}
        }
    });

    let input: &[u8] = b"";
    let result = run_with_io(
        options(addr, Role::Publisher, "t"),
        input,
        tokio::io::sink(),
    )
    .await;
    assert!(matches!(result, Err(RelayError::HandshakeRejected(_))));
}
