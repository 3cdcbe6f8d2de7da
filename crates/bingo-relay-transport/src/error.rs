use std::time::Duration;

/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The connection was closed.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Sending a frame failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving a frame failed, or the frame was not valid UTF-8 text.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// Binding the listener or accepting a TCP connection failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// The client's WebSocket upgrade request was missing or invalid.
    #[error("handshake failed: {0}")]
    HandshakeFailed(#[source] std::io::Error),

    /// The client did not finish its upgrade in time.
    #[error("handshake not completed within {0:?}")]
    HandshakeTimedOut(Duration),
}
