//! Frame transports for the push channel.

use crate::TransportError;
use futures_util::stream::BoxStream;
use futures_util::{Sink, SinkExt, StreamExt, future};
use std::future::Future;
use std::pin::Pin;
use tokio_tungstenite::tungstenite::Message;

/// Outbound half of an open channel, carrying text frames.
pub type FrameSink = Pin<Box<dyn Sink<String, Error = TransportError> + Send>>;
/// Inbound half of an open channel, yielding text frames.
pub type FrameStream = BoxStream<'static, Result<String, TransportError>>;

/// Something that can open a push channel.
pub trait Transport: Send {
    fn connect(
        &mut self,
    ) -> impl Future<Output = Result<(FrameSink, FrameStream), TransportError>> + Send;
}

/// WebSocket transport to the pilot server's `/ws` endpoint.
#[derive(Debug, Clone)]
pub struct WsTransport {
    url: String,
}

impl WsTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Transport for WsTransport {
    async fn connect(&mut self) -> Result<(FrameSink, FrameStream), TransportError> {
        let (ws, _response) = tokio_tungstenite::connect_async(self.url.as_str()).await?;
        let (sink, stream) = ws.split();

        let sink = sink.with(|frame: String| {
            future::ready(Ok::<_, TransportError>(Message::Text(frame.into())))
        });
        let stream = stream.filter_map(|frame| async move {
            match frame {
                Ok(Message::Text(text)) => Some(Ok(text.as_str().to_owned())),
                Ok(Message::Close(_)) => Some(Err(TransportError::Closed)),
                // Binary frames are not part of the protocol; tungstenite answers pings itself.
                Ok(_) => None,
                Err(e) => Some(Err(e.into())),
            }
        });

        Ok((Box::pin(sink), stream.boxed()))
    }
}
