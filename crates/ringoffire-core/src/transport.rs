//! Native WebSocket connection to the relay server.
//!
//! The socket lives on a background thread; the caller polls for events
//! from its own loop, so table state is only ever touched on one thread.

use std::sync::mpsc::{Receiver, Sender, TryRecvError, channel};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;
use tungstenite::{Message, connect};
use url::Url;

/// How long a read blocks before the thread checks for outgoing messages.
const READ_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Frames are logged up to this many characters.
const LOG_PREVIEW_CHARS: usize = 100;

/// Leading part of a frame for debug logs, cut on a char boundary.
fn preview(text: &str) -> &str {
    text.char_indices()
        .nth(LOG_PREVIEW_CHARS)
        .map_or(text, |(end, _)| &text[..end])
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("Invalid WebSocket URL scheme: {0}")]
    UnsupportedScheme(String),
    #[error("Already connected")]
    AlreadyConnected,
    #[error("Not connected")]
    NotConnected,
}

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

/// Events surfaced by [`TableSocket::poll_events`].
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Connected,
    Disconnected,
    /// A text frame from the server.
    Message(String),
    Error { message: String },
}

enum Command {
    Send(String),
    Close,
}

/// WebSocket client driven from a background thread.
pub struct TableSocket {
    state: ConnectionState,
    cmd_tx: Option<Sender<Command>>,
    event_rx: Option<Receiver<TransportEvent>>,
    _thread: Option<JoinHandle<()>>,
}

impl TableSocket {
    /// Create a new disconnected client.
    pub fn new() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            cmd_tx: None,
            event_rx: None,
            _thread: None,
        }
    }

    /// Start connecting to a plain `ws://` url. Completion is reported as
    /// [`TransportEvent::Connected`].
    ///
    /// `wss://` is refused: the socket is built without TLS support.
    pub fn connect(&mut self, url: &str) -> Result<(), TransportError> {
        if self.cmd_tx.is_some() {
            return Err(TransportError::AlreadyConnected);
        }
        let url = Url::parse(url)?;
        if url.scheme() != "ws" {
            return Err(TransportError::UnsupportedScheme(url.scheme().to_string()));
        }

        let (cmd_tx, cmd_rx) = channel();
        let (event_tx, event_rx) = channel();
        let handle = thread::spawn(move || run_socket(url, cmd_rx, event_tx));

        self.state = ConnectionState::Connecting;
        self.cmd_tx = Some(cmd_tx);
        self.event_rx = Some(event_rx);
        self._thread = Some(handle);
        Ok(())
    }

    /// Close the connection. The thread exits on its next loop.
    pub fn disconnect(&mut self) {
        if let Some(tx) = self.cmd_tx.take() {
            let _ = tx.send(Command::Close);
        }
        self.event_rx = None;
        self._thread = None;
        self.state = ConnectionState::Disconnected;
    }

    /// Queue a text frame.
    pub fn send(&self, text: &str) -> Result<(), TransportError> {
        let tx = self.cmd_tx.as_ref().ok_or(TransportError::NotConnected)?;
        tx.send(Command::Send(text.to_string()))
            .map_err(|_| TransportError::NotConnected)
    }

    /// Drain pending events without blocking.
    pub fn poll_events(&mut self) -> Vec<TransportEvent> {
        let Some(rx) = &self.event_rx else {
            return Vec::new();
        };
        let events: Vec<TransportEvent> = rx.try_iter().collect();
        for event in &events {
            match event {
                TransportEvent::Connected => self.state = ConnectionState::Connected,
                TransportEvent::Disconnected => self.state = ConnectionState::Disconnected,
                TransportEvent::Error { .. } => self.state = ConnectionState::Error,
                TransportEvent::Message(_) => {}
            }
        }
        events
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }
}

impl Default for TableSocket {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TableSocket {
    fn drop(&mut self) {
        self.disconnect();
    }
}

fn run_socket(url: Url, cmd_rx: Receiver<Command>, event_tx: Sender<TransportEvent>) {
    log::info!("Connecting to {}", url);
    let (mut socket, response) = match connect(url.as_str()) {
        Ok(pair) => pair,
        Err(e) => {
            log::error!("WebSocket connection failed: {}", e);
            let _ = event_tx.send(TransportEvent::Error {
                message: format!("Connection failed: {}", e),
            });
            return;
        }
    };
    log::info!("WebSocket connected, status: {}", response.status());
    let _ = event_tx.send(TransportEvent::Connected);

    // Short read timeouts let the loop interleave reads with sends.
    if let tungstenite::stream::MaybeTlsStream::Plain(tcp) = socket.get_mut() {
        let _ = tcp.set_read_timeout(Some(READ_POLL_INTERVAL));
        let _ = tcp.set_write_timeout(Some(Duration::from_secs(5)));
    }

    loop {
        match cmd_rx.try_recv() {
            Ok(Command::Send(text)) => {
                log::debug!("Sending: {}", preview(&text));
                if let Err(e) = socket.send(Message::text(text)) {
                    log::error!("WebSocket send error: {}", e);
                    break;
                }
            }
            Ok(Command::Close) | Err(TryRecvError::Disconnected) => {
                let _ = socket.close(None);
                break;
            }
            Err(TryRecvError::Empty) => {}
        }

        match socket.read() {
            Ok(Message::Text(text)) => {
                let text = text.to_string();
                log::debug!("Received: {}", preview(&text));
                if event_tx.send(TransportEvent::Message(text)).is_err() {
                    break;
                }
            }
            Ok(Message::Close(_)) => {
                log::info!("Server closed the connection");
                break;
            }
            Ok(_) => {}
            Err(tungstenite::Error::Io(ref e))
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                ) => {}
            Err(e) => {
                log::error!("WebSocket read error: {}", e);
                break;
            }
        }
    }

    log::info!("WebSocket thread exiting");
    let _ = event_tx.send(TransportEvent::Disconnected);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_websocket_scheme() {
        let mut socket = TableSocket::new();
        let err = socket.connect("http://localhost:3030/ws").unwrap_err();
        assert!(matches!(err, TransportError::UnsupportedScheme(s) if s == "http"));
        assert_eq!(socket.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_rejects_tls_scheme() {
        let mut socket = TableSocket::new();
        let err = socket.connect("wss://example.com/ws").unwrap_err();
        assert!(matches!(err, TransportError::UnsupportedScheme(s) if s == "wss"));
        assert!(matches!(socket.send("{}"), Err(TransportError::NotConnected)));
    }

    #[test]
    fn test_preview_cuts_on_char_boundary() {
        let name = format!("{}é", "a".repeat(99));
        assert_eq!(preview(&name), name);
        let long = format!("{}é{}", "a".repeat(99), "b".repeat(10));
        assert_eq!(preview(&long), format!("{}é", "a".repeat(99)));
        assert_eq!(preview("short"), "short");
    }

    /// Serve one connection that sends `frames` and then closes.
    fn serve_once(frames: Vec<String>) -> (String, thread::JoinHandle<()>) {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("ws://{}/ws", listener.local_addr().unwrap());
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut ws = tungstenite::accept(stream).unwrap();
            for frame in frames {
                ws.send(Message::text(frame)).unwrap();
            }
            let _ = ws.close(None);
            // Drain until the client goes away so the close completes.
            while ws.read().is_ok() {}
        });
        (url, handle)
    }

    fn poll_until_disconnected(socket: &mut TableSocket) -> Vec<TransportEvent> {
        let mut events = Vec::new();
        for _ in 0..250 {
            events.extend(socket.poll_events());
            if events.contains(&TransportEvent::Disconnected) {
                break;
            }
            thread::sleep(Duration::from_millis(20));
        }
        events
    }

    #[test]
    fn test_multibyte_frames_survive_debug_logging() {
        log::set_max_level(log::LevelFilter::Debug);
        let name = format!("{}é", "x".repeat(59));
        let frames = vec![
            format!(r#"{{"type":"server_cursor_update","name":"{name}","x":1,"y":2}}"#),
            format!(r#"{{"type":"deregister","name":"{name}"}}"#),
        ];
        let (url, server) = serve_once(frames.clone());

        let mut socket = TableSocket::new();
        socket.connect(&url).unwrap();
        let events = poll_until_disconnected(&mut socket);
        server.join().unwrap();

        assert_eq!(
            events,
            vec![
                TransportEvent::Connected,
                TransportEvent::Message(frames[0].clone()),
                TransportEvent::Message(frames[1].clone()),
                TransportEvent::Disconnected,
            ]
        );
        assert_eq!(socket.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_rejects_garbage_url() {
        let mut socket = TableSocket::new();
        assert!(matches!(socket.connect("not a url"), Err(TransportError::InvalidUrl(_))));
    }

    #[test]
    fn test_send_requires_connection() {
        let socket = TableSocket::new();
        assert!(matches!(socket.send("{}"), Err(TransportError::NotConnected)));
    }

    #[test]
    fn test_poll_when_disconnected_is_empty() {
        let mut socket = TableSocket::new();
        assert!(socket.poll_events().is_empty());
        assert!(!socket.is_connected());
    }
}
