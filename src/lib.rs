//! Bridge between a local media player and a remote controller server.
//!
//! The bridge keeps one persistent websocket session to the server,
//! translates host playback events into protocol messages and routes remote
//! commands back into host callbacks. See [`session`] for the connection
//! lifecycle, [`protocol`] for the wire format and [`dispatch`] for the
//! command routing.
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

#[macro_use]
extern crate log;

pub mod config;
pub mod dispatch;
pub mod notify;
pub mod protocol;
pub mod session;
pub mod track;
