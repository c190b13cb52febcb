//! Wire protocol spoken between the bridge and the controller server.
//!
//! One message per websocket text frame, encoded as a self-describing JSON
//! object with a `type` discriminator. See [`messages`] for the variant set
//! and the codec rules.

pub mod messages;

pub use messages::{
    ErrorCode, Message, PlaybackAction, PlaybackState, PlayerState, ProtocolError, ProtocolResult,
    RepeatMode, Track,
};
