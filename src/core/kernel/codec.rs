use crate::core::errors::ExchangeError;
use tokio_tungstenite::tungstenite::Message;

/// Subscription change carried by a control frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamControl {
    Subscribe,
    Unsubscribe,
}

/// Wire framing for one venue's market streams.
///
/// The market data channel owns the subscription set and the control frame
/// ids; a codec only knows what the frames look like.
pub trait WsCodec: Send + Sync + 'static {
    /// Decoded inbound frame
    type Message: Send + Sync;

    /// Build the control frame for `streams`. `id` is echoed back in the
    /// acknowledgement.
    fn encode_control(
        &self,
        control: StreamControl,
        streams: &[impl AsRef<str> + Send + Sync],
        id: u64,
    ) -> Result<Message, ExchangeError>;

    fn encode_subscription(
        &self,
        streams: &[impl AsRef<str> + Send + Sync],
        id: u64,
    ) -> Result<Message, ExchangeError> {
        self.encode_control(StreamControl::Subscribe, streams, id)
    }

    fn encode_unsubscription(
        &self,
        streams: &[impl AsRef<str> + Send + Sync],
        id: u64,
    ) -> Result<Message, ExchangeError> {
        self.encode_control(StreamControl::Unsubscribe, streams, id)
    }

    /// `Ok(None)` for frames the venue sends that callers do not care about.
    /// Ping, pong and close never get here.
    fn decode_message(&self, message: Message) -> Result<Option<Self::Message>, ExchangeError>;
}
