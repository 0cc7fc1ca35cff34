use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use crate::core::keyring::MemoryCredentialStore;
use crate::core::session::{Session, SessionInit};

/// One request as the mock server saw it.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub request_line: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl CapturedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct MockResponse {
    status: u16,
    content_type: &'static str,
    pieces: Vec<Vec<u8>>,
    chunked: bool,
    piece_delay: Duration,
    hold_open: Option<Duration>,
}

impl MockResponse {
    pub fn json(status: u16, body: &str) -> Self {
        Self {
            status,
            content_type: "application/json",
            pieces: vec![body.as_bytes().to_vec()],
            chunked: false,
            piece_delay: Duration::ZERO,
            hold_open: None,
        }
    }

    /// A `text/event-stream` body sent with chunked encoding, one HTTP chunk
    /// per piece, so the client sees the bytes arrive incrementally.
    pub fn event_stream<I, P>(pieces: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<[u8]>,
    {
        Self {
            status: 200,
            content_type: "text/event-stream",
            pieces: pieces
                .into_iter()
                .map(|piece| piece.as_ref().to_vec())
                .collect(),
            chunked: true,
            piece_delay: Duration::from_millis(5),
            hold_open: None,
        }
    }

    /// Keep the connection open after the last piece instead of ending the body.
    pub fn hold_open(mut self, duration: Duration) -> Self {
        self.hold_open = Some(duration);
        self
    }

    async fn write_to(&self, stream: &mut TcpStream) -> Result<(), String> {
        let reason = if (200..300).contains(&self.status) {
            "OK"
        } else {
            "Error"
        };
        let mut head = format!(
            "HTTP/1.1 {} {}\r\ncontent-type: {}\r\nconnection: close\r\n",
            self.status, reason, self.content_type
        );
        if self.chunked {
            head.push_str("transfer-encoding: chunked\r\n\r\n");
        } else {
            let length: usize = self.pieces.iter().map(Vec::len).sum();
            head.push_str(&format!("content-length: {length}\r\n\r\n"));
        }
        stream
            .write_all(head.as_bytes())
            .await
            .map_err(|err| err.to_string())?;

        for piece in &self.pieces {
            if self.chunked {
                if piece.is_empty() {
                    continue;
                }
                let mut framed = format!("{:x}\r\n", piece.len()).into_bytes();
                framed.extend_from_slice(piece);
                framed.extend_from_slice(b"\r\n");
                stream
                    .write_all(&framed)
                    .await
                    .map_err(|err| err.to_string())?;
            } else {
                stream
                    .write_all(piece)
                    .await
                    .map_err(|err| err.to_string())?;
            }
            stream.flush().await.map_err(|err| err.to_string())?;
            if !self.piece_delay.is_zero() {
                tokio::time::sleep(self.piece_delay).await;
            }
        }

        if let Some(duration) = self.hold_open {
            tokio::time::sleep(duration).await;
            return Ok(());
        }

        if self.chunked {
            stream
                .write_all(b"0\r\n\r\n")
                .await
                .map_err(|err| err.to_string())?;
        }
        stream.flush().await.map_err(|err| err.to_string())?;
        let _ = stream.shutdown().await;
        Ok(())
    }
}

/// Serves `responses` in order, one connection each, and returns what was
/// received once every response has been written.
pub async fn spawn_mock_server(
    responses: Vec<MockResponse>,
) -> (SocketAddr, JoinHandle<Result<Vec<CapturedRequest>, String>>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("listener should bind");
    let addr = listener.local_addr().expect("local addr should resolve");

    let handle = tokio::spawn(async move {
        let mut captured = Vec::with_capacity(responses.len());
        for response in responses {
            let (mut stream, _) = listener.accept().await.map_err(|err| err.to_string())?;
            let request = read_http_request(&mut stream).await?;
            captured.push(request);
            // The client may hang up once it has read what it needs.
            let _ = response.write_to(&mut stream).await;
        }
        Ok(captured)
    });

    (addr, handle)
}

pub fn test_http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .build()
        .expect("test client should build")
}

pub fn session_with_token(token: Option<&str>) -> Session {
    let store = MemoryCredentialStore::default();
    Session::init(
        SessionInit {
            token: token.map(str::to_string),
            skip_store: true,
            ..SessionInit::default()
        },
        &store,
    )
    .expect("session should initialize")
}

pub async fn read_http_request(stream: &mut TcpStream) -> Result<CapturedRequest, String> {
    let mut buffer = Vec::new();
    let mut header_end = None;
    while header_end.is_none() {
        let mut chunk = [0_u8; 1024];
        let read = stream
            .read(&mut chunk)
            .await
            .map_err(|err| err.to_string())?;
        if read == 0 {
            return Err("Unexpected EOF while reading HTTP headers".to_string());
        }
        buffer.extend_from_slice(&chunk[..read]);
        header_end = buffer
            .windows(4)
            .position(|window| window == b"\r\n\r\n")
            .map(|index| index + 4);
    }

    let header_end = header_end.expect("header end should exist");
    let header_text =
        std::str::from_utf8(&buffer[..header_end]).map_err(|err| err.to_string())?;
    let mut lines = header_text.split("\r\n").filter(|line| !line.is_empty());
    let request_line = lines
        .next()
        .ok_or_else(|| "Missing HTTP request line".to_string())?
        .to_string();

    let mut headers = Vec::new();
    let mut content_length = 0_usize;
    for line in lines {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim().to_string();
        if name.eq_ignore_ascii_case("content-length") {
            content_length = value.parse::<usize>().map_err(|err| err.to_string())?;
        }
        headers.push((name.to_string(), value));
    }

    let mut body = buffer[header_end..].to_vec();
    while body.len() < content_length {
        let mut chunk = vec![0_u8; content_length - body.len()];
        let read = stream
            .read(&mut chunk)
            .await
            .map_err(|err| err.to_string())?;
        if read == 0 {
            return Err("Unexpected EOF while reading HTTP body".to_string());
        }
        body.extend_from_slice(&chunk[..read]);
    }
    body.truncate(content_length);

    Ok(CapturedRequest {
        request_line,
        headers,
        body,
    })
}
