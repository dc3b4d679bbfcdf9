//! WebSocket adapter for the chat service.

use futures_util::{future, SinkExt, StreamExt};
use reqwest::Url;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::error::ProtocolError;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

use courier_core::chat::{BoxFrameSink, BoxFrameStream};
use courier_core::client::ChatService;
use courier_types::chat::ChatFrame;
use courier_types::error::{ChatError, ClientError};
use courier_types::token::SessionToken;

use super::rest::endpoint;
use crate::http::error::code_for_status;

/// Opens chat sessions on `{server}/ws/chat`.
#[derive(Debug, Clone)]
pub struct WsChatService {
    url: Url,
}

impl WsChatService {
    /// Derive the `ws://`/`wss://` endpoint from the server's base URL.
    pub fn new(base: &Url) -> Result<Self, ClientError> {
        let mut url = endpoint(base, &["ws", "chat"])?;
        let scheme = match url.scheme() {
            "https" | "wss" => "wss",
            _ => "ws",
        };
        url.set_scheme(scheme)
            .map_err(|()| ClientError::Transport(format!("cannot derive a WebSocket URL from '{base}'")))?;
        Ok(Self { url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl ChatService for WsChatService {
    async fn open(
        &self,
        token: Option<&SessionToken>,
    ) -> Result<(BoxFrameSink, BoxFrameStream), ClientError> {
        let mut request = self
            .url()
            .as_str()
            .into_client_request()
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        if let Some(token) = token {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| ClientError::Transport(format!("unusable token: {e}")))?;
            request.headers_mut().insert("authorization", value);
        }

        let (socket, _response) = match tokio_tungstenite::connect_async(request).await {
            Ok(connected) => connected,
            Err(WsError::Http(response)) => {
                let status = response.status();
                return Err(ClientError::status(
                    code_for_status(status.as_u16()),
                    format!("chat upgrade refused: {status}"),
                ));
            }
            Err(e) => return Err(ClientError::Transport(e.to_string())),
        };
        tracing::debug!(url = %self.url, "chat connected");

        let (ws_sender, ws_receiver) = socket.split();

        let sink = ws_sender
            .sink_map_err(ChatError::transport)
            .with(|frame: ChatFrame| future::ready(frame.encode().map(Message::text)));

        // A close frame or a dropped connection both end the stream; the
        // reader tells them apart from a half-close by the missing `end`.
        let stream = ws_receiver
            .take_while(|msg| future::ready(!is_closed(msg)))
            .filter_map(|msg| {
                future::ready(match msg {
                    Ok(Message::Text(text)) => Some(ChatFrame::decode(text.as_str())),
                    Ok(_) => None,
                    Err(e) => Some(Err(ChatError::transport(e))),
                })
            });

        let sink: BoxFrameSink = Box::pin(sink);
        let stream: BoxFrameStream = Box::pin(stream);
        Ok((sink, stream))
    }
}

fn is_closed(msg: &Result<Message, WsError>) -> bool {
    matches!(
        msg,
        Ok(Message::Close(_))
            | Err(WsError::ConnectionClosed | WsError::AlreadyClosed)
            | Err(WsError::Protocol(ProtocolError::ResetWithoutClosingHandshake))
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn websocket_url_follows_base_scheme() {
        let plain = WsChatService::new(&Url::parse("http://127.0.0.1:50051").unwrap()).unwrap();
        assert_eq!(plain.url().as_str(), "ws://127.0.0.1:50051/ws/chat");

        let tls = WsChatService::new(&Url::parse("https://chat.example.test/base/").unwrap()).unwrap();
        assert_eq!(tls.url().as_str(), "wss://chat.example.test/base/ws/chat");
    }

    #[test]
    fn close_and_reset_end_the_stream() {
        assert!(is_closed(&Ok(Message::Close(None))));
        assert!(is_closed(&Err(WsError::ConnectionClosed)));
        assert!(is_closed(&Err(WsError::Protocol(
            ProtocolError::ResetWithoutClosingHandshake
        ))));
        assert!(!is_closed(&Ok(Message::text("{\"type\":\"end\"}"))));
    }
}
