//! Line-oriented control connection.

use std::net::SocketAddr;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

/// Longest accepted line, excluding the terminator.
pub const MAX_LINE_LEN: usize = 1024;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("control connection I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("peer closed the control connection")]
    Closed,
    #[error("too many invalid attempts ({0})")]
    TooManyInvalid(u32),
    #[error("line longer than {MAX_LINE_LEN} bytes")]
    LineTooLong,
    #[error("line is not valid UTF-8")]
    NotUtf8,
}

impl ProtocolError {
    /// The line was unreadable but the connection is still usable.
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::LineTooLong | Self::NotUtf8)
    }
}

/// One newline-delimited text connection to a client.
pub struct ControlChannel {
    peer: SocketAddr,
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl ControlChannel {
    pub fn new(stream: TcpStream) -> Result<Self, ProtocolError> {
        let peer = stream.peer_addr()?;
        let (read, writer) = stream.into_split();
        Ok(Self {
            peer,
            reader: BufReader::new(read),
            writer,
        })
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub async fn send_line(&mut self, line: &str) -> Result<(), ProtocolError> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Next line without its terminator.  EOF is [`ProtocolError::Closed`].
    ///
    /// An over-long line is consumed through its newline and reported as
    /// [`ProtocolError::LineTooLong`]; the next call reads the line after it.
    pub async fn recv_line(&mut self) -> Result<String, ProtocolError> {
        // Room for the line, "\r" and "\n".
        let cap = MAX_LINE_LEN as u64 + 2;
        let mut buf = Vec::new();
        let n = (&mut self.reader)
            .take(cap)
            .read_until(b'\n', &mut buf)
            .await?;
        if n == 0 {
            return Err(ProtocolError::Closed);
        }
        if buf.last() != Some(&b'\n') {
            if n as u64 == cap {
                self.discard_line().await?;
                return Err(ProtocolError::LineTooLong);
            }
            // Final line without a terminator.
        }
        while matches!(buf.last(), Some(b'\n' | b'\r')) {
            buf.pop();
        }
        if buf.len() > MAX_LINE_LEN {
            return Err(ProtocolError::LineTooLong);
        }
        String::from_utf8(buf).map_err(|_| ProtocolError::NotUtf8)
    }

    async fn discard_line(&mut self) -> Result<(), ProtocolError> {
        loop {
            let buf = self.reader.fill_buf().await?;
            if buf.is_empty() {
                return Err(ProtocolError::Closed);
            }
            match buf.iter().position(|&b| b == b'\n') {
                Some(end) => {
                    self.reader.consume(end + 1);
                    return Ok(());
                }
                None => {
                    let len = buf.len();
                    self.reader.consume(len);
                }
            }
        }
    }

    /// Send `line` and close the write side.
    pub async fn finish(mut self, line: &str) -> Result<(), ProtocolError> {
        self.send_line(line).await?;
        self.writer.shutdown().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn lines_cross_the_wire() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = tokio::spawn(async move {
            let mut ch = ControlChannel::new(TcpStream::connect(addr).await.unwrap()).unwrap();
            ch.send_line("1 10 2 lamp").await.unwrap();
            ch.recv_line().await.unwrap()
        });

        let (stream, _) = listener.accept().await.unwrap();
        let mut server = ControlChannel::new(stream).unwrap();
        assert_eq!(server.recv_line().await.unwrap(), "1 10 2 lamp");
        server.finish("bye").await.unwrap();
        assert_eq!(client.await.unwrap(), "bye");
    }

    #[tokio::test]
    async fn malformed_lines_leave_the_channel_usable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = tokio::spawn(async move {
            let mut raw = TcpStream::connect(addr).await.unwrap();
            raw.write_all(b"\xff\xfe\n").await.unwrap();
            raw.write_all(&vec![b'9'; 10 * MAX_LINE_LEN]).await.unwrap();
            raw.write_all(b"\n").await.unwrap();
            raw.write_all(&vec![b'7'; MAX_LINE_LEN]).await.unwrap();
            raw.write_all(b"\r\n12\n").await.unwrap();
            raw
        });

        let (stream, _) = listener.accept().await.unwrap();
        let mut server = ControlChannel::new(stream).unwrap();
        let err = server.recv_line().await.unwrap_err();
        assert!(matches!(err, ProtocolError::NotUtf8));
        assert!(err.is_malformed());
        assert!(matches!(
            server.recv_line().await,
            Err(ProtocolError::LineTooLong)
        ));
        assert_eq!(server.recv_line().await.unwrap().len(), MAX_LINE_LEN);
        assert_eq!(server.recv_line().await.unwrap(), "12");

        drop(client.await.unwrap());
        let err = server.recv_line().await.unwrap_err();
        assert!(matches!(err, ProtocolError::Closed));
        assert!(!err.is_malformed());
    }

    #[tokio::test]
    async fn eof_is_closed() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = tokio::spawn(async move { TcpStream::connect(addr).await.unwrap() });
        let (stream, _) = listener.accept().await.unwrap();
        drop(client.await.unwrap());
        let mut server = ControlChannel::new(stream).unwrap();
        assert!(matches!(server.recv_line().await, Err(ProtocolError::Closed)));
    }
}
