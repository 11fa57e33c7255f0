//! 行分帧传输
//!
//! 每条记录为一行 JSON。读取方带每次调用的截止时间：缓冲区中
//! 没有整行时继续从连接补读，超过截止时间即报超时；缓冲区满时
//! 倍增扩容；任何读取失败都会复位缓冲区。写入方不设截止时间，
//! 依赖操作系统发送缓冲（已知限制）。

use serde::Serialize;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::{timeout, timeout_at, Instant};

use crate::constants::{CONNECT_TIMEOUT, READ_BUF_SIZE};
use crate::error::{ProtocolError, Result};

/// 行读取器
pub struct LineReader<R> {
    reader: R,
    buf: Vec<u8>,
    /// 缓冲区中有效字节数
    len: usize,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    /// 创建行读取器
    pub fn new(reader: R) -> Self {
        Self::with_capacity(reader, READ_BUF_SIZE)
    }

    /// 指定初始缓冲区大小创建
    pub fn with_capacity(reader: R, bufsize: usize) -> Self {
        Self {
            reader,
            buf: vec![0; bufsize.max(1)],
            len: 0,
        }
    }

    /// 读取下一条以 `\n` 结尾的记录（含分隔符）
    ///
    /// 截止时间从本次调用起算；期间的多次补读共用同一截止时间。
    /// 超时、对端关闭与其他 IO 故障作为不同错误返回，且都会复位
    /// 缓冲区。
    pub async fn read_line(&mut self, deadline: Duration) -> Result<Vec<u8>> {
        let deadline = Instant::now() + deadline;
        loop {
            if let Some(i) = self.buf[..self.len].iter().position(|&b| b == b'\n') {
                let line = self.buf[..=i].to_vec();
                self.buf.copy_within(i + 1..self.len, 0);
                self.len -= i + 1;
                return Ok(line);
            }
            if self.len == self.buf.len() {
                let grown = self.buf.len() * 2;
                self.buf.resize(grown, 0);
            }
            let read = timeout_at(deadline, self.reader.read(&mut self.buf[self.len..])).await;
            let count = match read {
                Err(_) => {
                    self.reset();
                    return Err(ProtocolError::Timeout);
                }
                Ok(Err(e)) => {
                    self.reset();
                    return Err(ProtocolError::Io(e));
                }
                Ok(Ok(0)) => {
                    self.reset();
                    return Err(ProtocolError::ConnectionClosed);
                }
                Ok(Ok(count)) => count,
            };
            self.len += count;
        }
    }

    fn reset(&mut self) {
        self.len = 0;
    }
}

/// 行写入器
pub struct LineWriter<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin> LineWriter<W> {
    /// 创建行写入器
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// 序列化记录为一行 JSON 并写出
    pub async fn write_record<M: Serialize>(&mut self, msg: &M) -> Result<()> {
        let mut payload = serde_json::to_vec(msg)?;
        payload.push(b'\n');
        self.writer.write_all(&payload).await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// 关闭写端
    pub async fn shutdown(&mut self) -> Result<()> {
        self.writer.shutdown().await?;
        Ok(())
    }
}

/// TCP 连接：读写分离的行分帧
pub struct Connection {
    reader: LineReader<OwnedReadHalf>,
    writer: LineWriter<OwnedWriteHalf>,
    peer_addr: Option<String>,
}

impl Connection {
    /// 从已建立的 TcpStream 创建（服务端使用）
    pub fn from_stream(stream: TcpStream) -> Result<Self> {
        stream.set_nodelay(true)?;
        let peer_addr = stream.peer_addr().ok().map(|a| a.to_string());
        let (read_half, write_half) = stream.into_split();
        Ok(Self {
            reader: LineReader::new(read_half),
            writer: LineWriter::new(write_half),
            peer_addr,
        })
    }

    /// 连接到服务端（客户端与测试使用）
    pub async fn connect(addr: &str) -> Result<Self> {
        let stream = timeout(CONNECT_TIMEOUT, TcpStream::connect(addr))
            .await
            .map_err(|_| ProtocolError::ConnectionTimeout)??;
        Self::from_stream(stream)
    }

    /// 读取一行记录
    pub async fn read_line(&mut self, deadline: Duration) -> Result<Vec<u8>> {
        self.reader.read_line(deadline).await
    }

    /// 发送一条记录
    pub async fn send<M: Serialize>(&mut self, msg: &M) -> Result<()> {
        self.writer.write_record(msg).await
    }

    /// 关闭写端（尽力而为）
    pub async fn shutdown(&mut self) {
        let _ = self.writer.shutdown().await;
    }

    /// 远端地址
    pub fn peer_addr(&self) -> Option<&str> {
        self.peer_addr.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{LoginMessage, UserMessage};

    #[tokio::test]
    async fn test_read_line_splits_records() {
        let (mut tx, rx) = tokio::io::duplex(256);
        let mut reader = LineReader::new(rx);

        tx.write_all(b"{\"Message\":\"READY\"}\n{\"Message\":\"f5\"}\n")
            .await
            .unwrap();

        let line = reader.read_line(Duration::from_secs(1)).await.unwrap();
        assert_eq!(line, b"{\"Message\":\"READY\"}\n");
        let line = reader.read_line(Duration::from_secs(1)).await.unwrap();
        assert_eq!(line, b"{\"Message\":\"f5\"}\n");
    }

    #[tokio::test]
    async fn test_read_line_waits_for_completion() {
        let (mut tx, rx) = tokio::io::duplex(256);
        let mut reader = LineReader::new(rx);

        let writer = tokio::spawn(async move {
            tx.write_all(b"{\"Message\":").await.unwrap();
            tokio::time::sleep(Duration::from_millis(20)).await;
            tx.write_all(b"\"READY\"}\n").await.unwrap();
            tx
        });

        let line = reader.read_line(Duration::from_secs(1)).await.unwrap();
        assert_eq!(line, b"{\"Message\":\"READY\"}\n");
        writer.await.unwrap();
    }

    #[tokio::test]
    async fn test_read_line_timeout() {
        let (tx, rx) = tokio::io::duplex(256);
        let mut reader = LineReader::new(rx);

        let err = reader.read_line(Duration::from_millis(50)).await.unwrap_err();
        assert!(err.is_timeout());
        drop(tx);
    }

    #[tokio::test]
    async fn test_buffer_reset_after_timeout() {
        // 超时后缓冲区复位，残缺的半行被丢弃
        let (mut tx, rx) = tokio::io::duplex(256);
        let mut reader = LineReader::new(rx);

        tx.write_all(b"half-a-record").await.unwrap();
        let err = reader.read_line(Duration::from_millis(50)).await.unwrap_err();
        assert!(err.is_timeout());

        tx.write_all(b"{\"Message\":\"READY\"}\n").await.unwrap();
        let line = reader.read_line(Duration::from_secs(1)).await.unwrap();
        assert_eq!(line, b"{\"Message\":\"READY\"}\n");
    }

    #[tokio::test]
    async fn test_read_line_closed() {
        let (tx, rx) = tokio::io::duplex(256);
        let mut reader = LineReader::new(rx);
        drop(tx);

        let err = reader.read_line(Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, ProtocolError::ConnectionClosed));
    }

    #[tokio::test]
    async fn test_buffer_growth() {
        // 初始缓冲远小于记录长度，读取时倍增扩容
        let (mut tx, rx) = tokio::io::duplex(1024);
        let mut reader = LineReader::with_capacity(rx, 8);

        let long = format!("{}\n", "x".repeat(300));
        tx.write_all(long.as_bytes()).await.unwrap();

        let line = reader.read_line(Duration::from_secs(1)).await.unwrap();
        assert_eq!(line.len(), 301);
    }

    #[tokio::test]
    async fn test_connection_roundtrip() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let client = tokio::spawn(async move {
            let mut conn = Connection::connect(&addr).await.unwrap();
            conn.send(&LoginMessage::new("alice", "pw")).await.unwrap();
            let line = conn.read_line(Duration::from_secs(5)).await.unwrap();
            let msg: UserMessage = serde_json::from_slice(&line).unwrap();
            assert_eq!(msg.message, "RESULTOK");
        });

        let (stream, _) = listener.accept().await.unwrap();
        let mut conn = Connection::from_stream(stream).unwrap();
        let line = conn.read_line(Duration::from_secs(5)).await.unwrap();
        let login: LoginMessage = serde_json::from_slice(&line).unwrap();
        assert_eq!(login.message, "LOGIN");
        assert_eq!(login.userid, "alice");

        conn.send(&UserMessage::new("RESULTOK")).await.unwrap();
        client.await.unwrap();
    }
}
