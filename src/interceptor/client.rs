//! Real WebSocket client behind the interceptor (tokio-tungstenite).

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use super::{Connector, Frame, Socket, SocketError, SocketEvent, NO_STATUS_RECEIVED};

/// Connects `ws://` and `wss://` URLs.
#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteConnector;

pub struct TungsteniteSocket {
    url: String,
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Connector for TungsteniteConnector {
    type Socket = TungsteniteSocket;

    async fn connect(&self, url: &str) -> Result<TungsteniteSocket, SocketError> {
        let (stream, _response) = connect_async(url)
            .await
            .map_err(|e| SocketError::Connect(e.to_string()))?;
        Ok(TungsteniteSocket {
            url: url.to_string(),
            stream,
        })
    }
}

#[async_trait]
impl Socket for TungsteniteSocket {
    fn url(&self) -> &str {
        &self.url
    }

    async fn send(&mut self, frame: Frame) -> Result<(), SocketError> {
        let msg = match frame {
            Frame::Text(text) => Message::Text(text),
            Frame::Binary(bytes) => Message::Binary(bytes),
        };
        self.stream
            .send(msg)
            .await
            .map_err(|e| SocketError::Send(e.to_string()))
    }

    async fn recv(&mut self) -> Option<SocketEvent> {
        loop {
            let msg = match self.stream.next().await? {
                Ok(msg) => msg,
                Err(e) => return Some(SocketEvent::Error(e.to_string())),
            };
            match msg {
                Message::Text(text) => return Some(SocketEvent::Message(Frame::Text(text))),
                Message::Binary(bytes) => {
                    return Some(SocketEvent::Message(Frame::Binary(bytes)))
                }
                Message::Close(frame) => {
                    let (code, reason) = frame
                        .map(|f| (u16::from(f.code), f.reason.into_owned()))
                        .unwrap_or((NO_STATUS_RECEIVED, String::new()));
                    return Some(SocketEvent::Closed { code, reason });
                }
                // Control frames are answered by tungstenite itself.
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
            }
        }
    }

    async fn close(
        &mut self,
        code: Option<u16>,
        reason: Option<String>,
    ) -> Result<(), SocketError> {
        let frame = code.map(|code| CloseFrame {
            code: CloseCode::from(code),
            reason: reason.unwrap_or_default().into(),
        });
        self.stream
            .close(frame)
            .await
            .map_err(|e| SocketError::Close(e.to_string()))
    }
}
