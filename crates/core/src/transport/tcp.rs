use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

use crate::error::Result;

/// Open the RTSP control connection.
///
/// Nagle is disabled: requests are small and every one of them waits for
/// an answer.
pub async fn connect(host: &str, port: u16) -> Result<TcpStream> {
    let stream = TcpStream::connect((host, port)).await?;
    stream.set_nodelay(true)?;
    tracing::info!(peer = %stream.peer_addr()?, "connected");
    Ok(stream)
}

/// Split into the demultiplexer's read half and the session's write half.
pub fn split(stream: TcpStream) -> (OwnedReadHalf, OwnedWriteHalf) {
    stream.into_split()
}
