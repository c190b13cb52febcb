//! Message types for the controller protocol.
//!
//! Every frame on the wire is a single JSON object carrying a `type`
//! discriminator plus variant-specific fields:
//!
//! ```json
//! {"type": "SeekCommand", "position": 153000.0}
//! ```
//!
//! Messages fall into two directions:
//! * App → Controller: [`AppConnect`](Message::AppConnect) and the state
//!   update variants.
//! * Controller → App: [`AppConnectResponse`](Message::AppConnectResponse)
//!   and the command variants.
//!
//! Decoding is lenient towards unknown fields so newer servers can attach
//! data older clients do not understand. A missing or unrecognized
//! discriminator, or a missing required field, is a [`ProtocolError`].
//!
//! Time and position fields are floating-point milliseconds throughout. No
//! unit conversion happens at this layer; callers supply normalized values.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while encoding or decoding protocol frames.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
}

pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// A track as it appears on the wire.
///
/// This is an immutable snapshot projected from the host's track model; see
/// [`crate::track`] for the projection and its fallback rules.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub album: String,
    /// Duration in milliseconds.
    pub duration: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artwork_url: Option<String>,
}

/// Whether the host is currently playing or paused.
#[derive(Copy, Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlaybackState {
    Playing,
    #[default]
    Paused,
}

/// Repeat mode of the host playlist.
#[derive(Copy, Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RepeatMode {
    #[default]
    Off,
    All,
    One,
}

/// Transport action carried by a [`Message::PlaybackCommand`].
#[derive(Copy, Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlaybackAction {
    Play,
    Pause,
    Next,
    Previous,
}

/// Error categories carried by a [`Message::ErrorMessage`].
#[derive(Copy, Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidCommand,
    InvalidState,
    InvalidTrack,
    InvalidIndex,
    InvalidPosition,
    ServerError,
}

/// Aggregate snapshot of the host player, built on demand in response to a
/// [`Message::RequestCurrentState`]. Not persisted anywhere.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlayerState {
    pub state: PlaybackState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_track: Option<Track>,
    /// Position in milliseconds.
    pub current_position: f64,
    pub playlist: Vec<Track>,
    /// May point past the end of `playlist` when the snapshot is stale.
    pub current_index: usize,
    pub shuffle: bool,
    pub repeat_mode: RepeatMode,
    pub volume: f64,
}

impl Default for PlayerState {
    fn default() -> Self {
        Self {
            state: PlaybackState::default(),
            current_track: None,
            current_position: 0.0,
            playlist: Vec::new(),
            current_index: 0,
            shuffle: false,
            repeat_mode: RepeatMode::default(),
            volume: 1.0,
        }
    }
}

/// The closed set of protocol messages.
///
/// The single dispatch point in [`crate::dispatch`] matches exhaustively on
/// this enum, so adding a variant here surfaces every unhandled site as a
/// compile error.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Message {
    /// Opens or resumes a logical channel with the server.
    #[serde(rename_all = "camelCase")]
    AppConnect {
        /// Previously issued session key, if any.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        existing_key: Option<String>,
    },

    /// Server reply to [`AppConnect`](Self::AppConnect).
    #[serde(rename_all = "camelCase")]
    AppConnectResponse {
        key: String,
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    #[serde(rename_all = "camelCase")]
    PlaybackStateUpdate {
        state: PlaybackState,
        current_position: f64,
        track: Track,
    },

    #[serde(rename_all = "camelCase")]
    PlaylistUpdate {
        tracks: Vec<Track>,
        current_index: usize,
    },

    #[serde(rename_all = "camelCase")]
    PlaybackModeUpdate {
        shuffle: bool,
        repeat_mode: RepeatMode,
    },

    #[serde(rename_all = "camelCase")]
    PositionUpdate {
        position: f64,
    },

    #[serde(rename_all = "camelCase")]
    VolumeUpdate {
        volume: f64,
    },

    /// Full player snapshot, sent in reply to
    /// [`RequestCurrentState`](Self::RequestCurrentState).
    PlayerStateSnapshot(PlayerState),

    #[serde(rename_all = "camelCase")]
    ErrorMessage {
        code: ErrorCode,
        message: String,
    },

    #[serde(rename_all = "camelCase")]
    PlaybackCommand {
        action: PlaybackAction,
    },

    #[serde(rename_all = "camelCase")]
    SeekCommand {
        position: f64,
    },

    #[serde(rename_all = "camelCase")]
    PlaylistMoveCommand {
        from_index: usize,
        to_index: usize,
    },

    #[serde(rename_all = "camelCase")]
    PlaylistRemoveCommand {
        index: usize,
    },

    #[serde(rename_all = "camelCase")]
    ShuffleCommand {
        enabled: bool,
    },

    #[serde(rename_all = "camelCase")]
    RepeatCommand {
        mode: RepeatMode,
    },

    #[serde(rename_all = "camelCase")]
    VolumeCommand {
        volume: f64,
    },

    RequestCurrentState,
}

impl Message {
    /// Encodes this message into a single text frame.
    pub fn encode(&self) -> ProtocolResult<String> {
        serde_json::to_string(self).map_err(Into::into)
    }

    /// Decodes a text frame into a message.
    ///
    /// Unknown fields are dropped. A missing or unrecognized `type`, or a
    /// missing required field, yields [`ProtocolError::Malformed`].
    pub fn decode(frame: &str) -> ProtocolResult<Self> {
        serde_json::from_str(frame).map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_track() -> Track {
        Track {
            id: "42".to_string(),
            title: "Lonesome Tears".to_string(),
            artist: "Beck ".to_string(),
            album: "Sea Change".to_string(),
            duration: 337_000.0,
            artwork_url: Some("https://example.com/cover.jpg".to_string()),
        }
    }

    fn all_variants() -> Vec<Message> {
        vec![
            Message::AppConnect { existing_key: None },
            Message::AppConnect {
                existing_key: Some("abc123".to_string()),
            },
            Message::AppConnectResponse {
                key: "abc123".to_string(),
                success: true,
                error: None,
            },
            Message::AppConnectResponse {
                key: String::new(),
                success: false,
                error: Some("channel full".to_string()),
            },
            Message::PlaybackStateUpdate {
                state: PlaybackState::Playing,
                current_position: 1_500.0,
                track: sample_track(),
            },
            Message::PlaylistUpdate {
                tracks: vec![sample_track()],
                current_index: 3,
            },
            Message::PlaybackModeUpdate {
                shuffle: true,
                repeat_mode: RepeatMode::All,
            },
            Message::PositionUpdate { position: 0.0 },
            Message::VolumeUpdate { volume: 0.25 },
            Message::PlayerStateSnapshot(PlayerState {
                state: PlaybackState::Playing,
                current_track: Some(sample_track()),
                current_position: 12_345.0,
                playlist: vec![sample_track(), Track::default()],
                current_index: 1,
                shuffle: false,
                repeat_mode: RepeatMode::One,
                volume: 0.8,
            }),
            Message::ErrorMessage {
                code: ErrorCode::InvalidIndex,
                message: "index out of range".to_string(),
            },
            Message::PlaybackCommand {
                action: PlaybackAction::Previous,
            },
            Message::SeekCommand { position: 98_765.0 },
            Message::PlaylistMoveCommand {
                from_index: 2,
                to_index: 0,
            },
            Message::PlaylistRemoveCommand { index: 7 },
            Message::ShuffleCommand { enabled: false },
            Message::RepeatCommand {
                mode: RepeatMode::Off,
            },
            Message::VolumeCommand { volume: 0.75 },
            Message::RequestCurrentState,
        ]
    }

    #[test]
    fn round_trips_every_variant() {
        for message in all_variants() {
            let frame = message.encode().expect("encode");
            let decoded = Message::decode(&frame).expect("decode");
            assert_eq!(decoded, message, "{frame}");
        }
    }

    #[test]
    fn every_frame_carries_the_discriminator() {
        for message in all_variants() {
            let frame = message.encode().expect("encode");
            let value: serde_json::Value = serde_json::from_str(&frame).expect("json");
            assert!(
                value.get("type").is_some_and(serde_json::Value::is_string),
                "no discriminator in {frame}"
            );
        }
    }

    #[test]
    fn ignores_unknown_fields() {
        let frame = r#"{"type":"SeekCommand","position":1000.0,"requestId":"9f2","origin":{"device":"phone"}}"#;
        let decoded = Message::decode(frame).expect("decode");
        assert_eq!(decoded, Message::SeekCommand { position: 1000.0 });
    }

    #[test]
    fn missing_discriminator_is_an_error() {
        assert!(Message::decode(r#"{"position":1000.0}"#).is_err());
    }

    #[test]
    fn unknown_discriminator_is_an_error() {
        assert!(Message::decode(r#"{"type":"WarpCommand","factor":9}"#).is_err());
    }

    #[test]
    fn missing_required_field_is_an_error() {
        assert!(Message::decode(r#"{"type":"PlaylistMoveCommand","fromIndex":2}"#).is_err());
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(Message::decode("{\"type\":").is_err());
    }

    #[test]
    fn enum_values_match_the_wire_spelling() {
        let frame = Message::PlaybackModeUpdate {
            shuffle: false,
            repeat_mode: RepeatMode::One,
        }
        .encode()
        .expect("encode");
        assert!(frame.contains(r#""repeatMode":"ONE""#), "{frame}");

        let frame = Message::PlaybackCommand {
            action: PlaybackAction::Play,
        }
        .encode()
        .expect("encode");
        assert!(frame.contains(r#""action":"PLAY""#), "{frame}");

        let state = serde_json::to_string(&PlaybackState::Paused).expect("encode");
        assert_eq!(state, r#""PAUSED""#);
    }

    #[test]
    fn integer_positions_decode_as_milliseconds() {
        let decoded =
            Message::decode(r#"{"type":"PositionUpdate","position":120000}"#).expect("decode");
        assert_eq!(
            decoded,
            Message::PositionUpdate {
                position: 120_000.0
            }
        );
    }

    #[test]
    fn absent_optional_fields_are_omitted() {
        let frame = Message::AppConnect { existing_key: None }
            .encode()
            .expect("encode");
        assert_eq!(frame, r#"{"type":"AppConnect"}"#);
    }

    #[test]
    fn snapshot_fields_are_inlined_with_the_discriminator() {
        let frame = Message::PlayerStateSnapshot(PlayerState::default())
            .encode()
            .expect("encode");
        let value: serde_json::Value = serde_json::from_str(&frame).expect("json");
        assert_eq!(value["type"], "PlayerStateSnapshot");
        assert_eq!(value["state"], "PAUSED");
        assert_eq!(value["currentIndex"], 0);
        assert_eq!(value["volume"], 1.0);
    }
}
