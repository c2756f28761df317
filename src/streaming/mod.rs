//! Streaming transcription
//!
//! One duplex WebSocket connection per question turn: binary 16-bit LE
//! mono PCM frames out, loosely-typed JSON messages in. Connection
//! failures never block recording.

mod client;
mod messages;

pub use client::{
    TranscriberConnector, TranscriberTurn, TurnContext, TurnTranscript, WsTranscriberConnector,
};
pub use messages::{parse_server_message, ServerMessage, END_OF_TURN};
