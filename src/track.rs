//! Host-side track model and its projection onto the wire format.
//!
//! The host playback engine exposes a richer track shape than the protocol
//! carries: multiple artists, an optional album, an optional duration and
//! one of two artwork reference shapes. [`project`] flattens that into the
//! wire [`Track`] snapshot. The snapshot is created fresh on every call and
//! keeps no reference to the host track.

use std::fmt::Write;
use std::time::Duration;

use crate::protocol::Track;

/// Album title used when the host track has no album.
const UNKNOWN_ALBUM: &str = "Unknown";

/// A performing artist as known to the host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Artist {
    pub name: String,
}

/// An album as known to the host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Album {
    pub title: String,
}

/// Artwork reference, in whichever shape the host track exposes.
///
/// Hosts either hand out a fetchable URL request or a direct URI. The
/// projection prefers the URL form.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArtworkRef {
    /// A fetchable URL request.
    UrlRequest { url: String },
    /// A direct URI, e.g. a local content reference.
    Uri { uri: String },
}

/// A track as the host playback engine models it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HostTrack {
    pub id: String,
    pub title: String,
    pub artists: Vec<Artist>,
    pub album: Option<Album>,
    pub duration: Option<Duration>,
    pub artwork: Option<ArtworkRef>,
}

/// Projects an optional host track onto the wire format.
///
/// An absent track maps to empty strings and a zero duration so the remote
/// end always receives a complete object. Artist names are joined into one
/// display string, each name followed by a space. Duration becomes
/// floating-point milliseconds.
#[must_use]
pub fn project(track: Option<&HostTrack>) -> Track {
    let Some(track) = track else {
        return Track {
            artwork_url: Some(String::new()),
            ..Track::default()
        };
    };

    let artist = track.artists.iter().fold(String::new(), |mut joined, a| {
        let _ = write!(joined, "{} ", a.name);
        joined
    });

    let artwork_url = match &track.artwork {
        Some(ArtworkRef::UrlRequest { url }) => url.clone(),
        Some(ArtworkRef::Uri { uri }) => uri.clone(),
        None => String::new(),
    };

    Track {
        id: track.id.clone(),
        title: track.title.clone(),
        artist,
        album: track
            .album
            .as_ref()
            .map_or_else(|| UNKNOWN_ALBUM.to_string(), |album| album.title.clone()),
        duration: track
            .duration
            .map_or(0.0, |duration| duration.as_secs_f64() * 1_000.0),
        artwork_url: Some(artwork_url),
    }
}
