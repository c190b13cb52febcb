//! Routing of inbound controller messages to host-facing hooks.
//!
//! Each decoded message is handled on its own spawned task so a slow or
//! suspending host callback never stalls the transport's receive path. All
//! tasks run under the session's cancellation token; `close()` aborts them.
//!
//! A command whose hook is unset is dropped without surfacing an error to
//! the remote peer.

use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::protocol::{Message, PlaybackAction, PlayerState, RepeatMode};
use crate::session::Session;

/// Zero-argument host callback (play, pause, next, previous).
pub type Hook = Box<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;
/// Seek callback, position in milliseconds.
pub type SeekHook = Box<dyn Fn(f64) -> BoxFuture<'static, ()> + Send + Sync>;
/// Playlist move callback (from, to).
pub type MoveHook = Box<dyn Fn(usize, usize) -> BoxFuture<'static, ()> + Send + Sync>;
/// Playlist remove callback.
pub type RemoveHook = Box<dyn Fn(usize) -> BoxFuture<'static, ()> + Send + Sync>;
/// Shuffle toggle callback.
pub type ShuffleHook = Box<dyn Fn(bool) -> BoxFuture<'static, ()> + Send + Sync>;
/// Repeat mode callback.
pub type RepeatHook = Box<dyn Fn(RepeatMode) -> BoxFuture<'static, ()> + Send + Sync>;
/// Volume callback, 0.0 to 1.0.
pub type VolumeHook = Box<dyn Fn(f64) -> BoxFuture<'static, ()> + Send + Sync>;
/// Snapshot query answering a state request.
pub type StateHook = Box<dyn Fn() -> BoxFuture<'static, PlayerState> + Send + Sync>;

/// Host-facing callback surface consumed by the dispatcher.
///
/// Every hook is optional; unset hooks silently drop their commands.
#[derive(Default)]
pub struct Hooks {
    pub play: Option<Hook>,
    pub pause: Option<Hook>,
    pub next: Option<Hook>,
    pub previous: Option<Hook>,
    pub seek: Option<SeekHook>,
    pub move_item: Option<MoveHook>,
    pub remove_item: Option<RemoveHook>,
    pub shuffle: Option<ShuffleHook>,
    pub repeat: Option<RepeatHook>,
    pub volume: Option<VolumeHook>,
    pub request_state: Option<StateHook>,
}

/// Hands an inbound message to the host on an independent unit of work.
pub(crate) fn dispatch(session: &Arc<Session>, message: Message) {
    let session = Arc::clone(session);
    let cancel = session.cancel_token();
    tokio::spawn(async move {
        tokio::select! {
            () = cancel.cancelled() => {}
            () = route(&session, message) => {}
        }
    });
}

async fn route(session: &Arc<Session>, message: Message) {
    let hooks = session.hooks();
    match message {
        Message::PlaybackCommand { action } => {
            let hook = match action {
                PlaybackAction::Play => &hooks.play,
                PlaybackAction::Pause => &hooks.pause,
                PlaybackAction::Next => &hooks.next,
                PlaybackAction::Previous => &hooks.previous,
            };
            if let Some(hook) = hook {
                hook().await;
            }
        }

        Message::SeekCommand { position } => {
            if let Some(hook) = &hooks.seek {
                hook(position).await;
            }
        }

        Message::PlaylistMoveCommand {
            from_index,
            to_index,
        } => {
            if let Some(hook) = &hooks.move_item {
                hook(from_index, to_index).await;
            }
        }

        Message::PlaylistRemoveCommand { index } => {
            if let Some(hook) = &hooks.remove_item {
                hook(index).await;
            }
        }

        Message::ShuffleCommand { enabled } => {
            if let Some(hook) = &hooks.shuffle {
                hook(enabled).await;
            }
        }

        Message::RepeatCommand { mode } => {
            if let Some(hook) = &hooks.repeat {
                hook(mode).await;
            }
        }

        Message::VolumeCommand { volume } => {
            if let Some(hook) = &hooks.volume {
                hook(volume).await;
            }
        }

        Message::RequestCurrentState => {
            if let Some(hook) = &hooks.request_state {
                let state = hook().await;
                session.send(Message::PlayerStateSnapshot(state)).await;
            }
        }

        // Handshake replies are consumed by the session before dispatch;
        // the update variants only ever travel the other way.
        Message::AppConnect { .. }
        | Message::AppConnectResponse { .. }
        | Message::PlaybackStateUpdate { .. }
        | Message::PlaylistUpdate { .. }
        | Message::PlaybackModeUpdate { .. }
        | Message::PositionUpdate { .. }
        | Message::VolumeUpdate { .. }
        | Message::PlayerStateSnapshot(_)
        | Message::ErrorMessage { .. } => {
            debug!("ignoring message not addressed to the player");
        }
    }
}
