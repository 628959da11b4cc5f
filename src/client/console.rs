use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Lines};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::time::{Duration, timeout};
use tracing::debug;

use crate::session::Role;
use crate::session::state::{INVALID_ROLE_NOTICE, TERMINATE};
use crate::utils::RelayError;

/// How long to let the receiver drain after we stop sending.
const DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub host: String,
    pub port: u16,
    pub role: Role,
    /// Omitted when the relay runs without topics.
    pub topic: Option<String>,
}

/// Run an interactive client on stdin/stdout.
pub async fn run(options: ClientOptions) -> Result<(), RelayError> {
    let input = BufReader::new(tokio::io::stdin());
    run_with_io(options, input, tokio::io::stdout()).await
}

/// Run a client reading user lines from `input` and printing deliveries to
/// `output`.
pub async fn run_with_io<R, W>(
    options: ClientOptions,
    input: R,
    output: W,
) -> Result<(), RelayError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (server_lines, mut writer, ack) = connect(&options).await?;

    println!("Connected to server: {}:{}", options.host, options.port);
    println!("Client Role: {}", options.role);
    if let Some(topic) = &options.topic {
        println!("Topic: {topic}");
    }
    println!("[Server]: {ack}");

    let receiver = tokio::spawn(receive_loop(server_lines, output));

    let mut user_lines = input.lines();
    match options.role {
        Role::Publisher => {
            println!("Type messages to publish, 'terminate' to disconnect");
            publish_lines(&mut user_lines, &mut writer).await?;
        }
        Role::Subscriber => {
            println!("Listening for published messages, 'terminate' to disconnect");
            wait_for_terminate(&mut user_lines, &mut writer).await?;
        }
    }

    let _ = writer.shutdown().await;
    if timeout(DRAIN_TIMEOUT, receiver).await.is_err() {
        debug!("Receiver still running after disconnect");
    }
    println!("Client disconnected successfully");
    Ok(())
}

/// Connect and handshake. Returns the server's line reader, our write half and
/// the acknowledgment text.
async fn connect(
    options: &ClientOptions,
) -> Result<(Lines<BufReader<OwnedReadHalf>>, OwnedWriteHalf, String), RelayError> {
    let stream = TcpStream::connect((options.host.as_str(), options.port)).await?;
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    send_line(&mut writer, options.role.as_str()).await?;
    if let Some(topic) = &options.topic {
        send_line(&mut writer, topic).await?;
    }

    match lines.next_line().await? {
        Some(ack) if ack == INVALID_ROLE_NOTICE => Err(RelayError::HandshakeRejected(ack)),
        Some(ack) => Ok((lines, writer, ack)),
        None => Err(RelayError::HandshakeRejected(
            "connection closed before acknowledgment".to_string(),
        )),
    }
}

async fn publish_lines<R>(
    user_lines: &mut Lines<R>,
    writer: &mut OwnedWriteHalf,
) -> Result<(), RelayError>
where
    R: AsyncBufRead + Unpin,
{
    while let Some(line) = user_lines.next_line().await? {
        send_line(writer, &line).await?;
        if is_terminate(&line) {
            println!("Disconnecting from server...");
            return Ok(());
        }
    }
    // End of input ends the session like terminate does.
    send_line(writer, TERMINATE).await
}

async fn wait_for_terminate<R>(
    user_lines: &mut Lines<R>,
    writer: &mut OwnedWriteHalf,
) -> Result<(), RelayError>
where
    R: AsyncBufRead + Unpin,
{
    while let Some(line) = user_lines.next_line().await? {
        if is_terminate(&line) {
            println!("Disconnecting from server...");
            return send_line(writer, &line).await;
        }
    }
    send_line(writer, TERMINATE).await
}

async fn receive_loop<W>(mut server_lines: Lines<BufReader<OwnedReadHalf>>, mut output: W)
where
    W: AsyncWrite + Unpin,
{
    loop {
        match server_lines.next_line().await {
            Ok(Some(line)) => {
                let printed = format!("Received: {line}\n");
                if output.write_all(printed.as_bytes()).await.is_err() {
                    break;
                }
                let _ = output.flush().await;
            }
            Ok(None) => break,
            Err(e) => {
                debug!("Connection closed: {e}");
                break;
            }
        }
    }
}

async fn send_line(writer: &mut OwnedWriteHalf, line: &str) -> Result<(), RelayError> {
    writer.write_all(format!("{line}\n").as_bytes()).await?;
    Ok(())
}

fn is_terminate(line: &str) -> bool {
    line.trim().eq_ignore_ascii_case(TERMINATE)
}
