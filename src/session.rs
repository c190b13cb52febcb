//! Connection lifecycle and handshake with the controller server.
//!
//! A [`Session`] owns the single websocket handle. Its lifecycle is
//! `Disconnected → Connecting → Connected` and back, with a terminal
//! `Stopped` reached through [`close`](Session::close). A compare-and-set
//! guard ensures at most one connect attempt is in flight even when
//! triggered concurrently from several paths (explicit selection, a
//! configuration change, or a send while disconnected).
//!
//! There is no automatic retry or backoff: after a transport failure the
//! session stays disconnected until an external trigger reconnects it.

use std::future::Future;
use std::ops::ControlFlow;
use std::pin::Pin;
use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc, RwLock,
};

use futures_util::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    tungstenite::{
        protocol::{frame::coding::CloseCode, CloseFrame},
        Message as WsMessage,
    },
    MaybeTlsStream, WebSocketStream,
};
use tokio_util::sync::CancellationToken;

use crate::{
    config::{Config, SessionKeyStore},
    dispatch::{self, Hooks},
    notify::Notifier,
    protocol::{Message, PlaybackState, RepeatMode},
    track::{self, HostTrack},
};

/// Frames larger than this are discarded without parsing.
const MAX_FRAME_SIZE: usize = 8_192;

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, WsMessage>;
type WsSource = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

pub type SessionResult<T> = Result<T, SessionError>;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("parsing url failed: {0}")]
    UrlParse(#[from] url::ParseError),
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

/// The single logical connection to the controller server.
pub struct Session {
    config: RwLock<Config>,
    keys: Arc<dyn SessionKeyStore>,
    hooks: Arc<Hooks>,
    notifier: Notifier,

    /// Guard against overlapping connect attempts.
    connecting: AtomicBool,
    /// Terminal flag; no connects or sends once set.
    stopped: AtomicBool,

    /// Writer half of the websocket. At most one live handle at a time;
    /// the mutex serializes writes to it.
    ws_tx: tokio::sync::Mutex<Option<WsSink>>,
    /// Bumped for every opened transport so a superseded reader does not
    /// tear down its successor's handle.
    generation: AtomicU64,
    cancel: CancellationToken,
}

impl Session {
    #[must_use]
    pub fn new(
        config: Config,
        keys: Arc<dyn SessionKeyStore>,
        hooks: Hooks,
        notifier: Notifier,
    ) -> Arc<Self> {
        Arc::new(Self {
            config: RwLock::new(config),
            keys,
            hooks: Arc::new(hooks),
            notifier,
            connecting: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            ws_tx: tokio::sync::Mutex::new(None),
            generation: AtomicU64::new(0),
            cancel: CancellationToken::new(),
        })
    }

    pub(crate) fn hooks(&self) -> Arc<Hooks> {
        Arc::clone(&self.hooks)
    }

    pub(crate) fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Opens a connection to the configured server.
    ///
    /// A no-op when a connect attempt is already in flight, when already
    /// connected and `reconnect` is false, or after [`close`](Self::close).
    /// With `reconnect` set, any existing handle is closed first. Failures
    /// are logged and surfaced as a throttled status notification, never
    /// returned: reconnection is event-driven, not time-driven.
    pub async fn connect(self: &Arc<Self>, reconnect: bool) {
        if self
            .connecting
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }
        if self.stopped.load(Ordering::SeqCst) {
            self.connecting.store(false, Ordering::SeqCst);
            return;
        }

        {
            let mut ws_tx = self.ws_tx.lock().await;
            if ws_tx.is_some() && !reconnect {
                self.connecting.store(false, Ordering::SeqCst);
                return;
            }
            if let Some(mut old) = ws_tx.take() {
                let frame = CloseFrame {
                    code: CloseCode::Normal,
                    reason: "reconnecting".into(),
                };
                if let Err(e) = old.send(WsMessage::Close(Some(frame))).await {
                    debug!("error closing previous connection: {e}");
                }
            }
        }

        let url = {
            let config = match self.config.read() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            config.ws_url()
        };
        info!("connecting to {url}");

        if let Err(e) = self.open(&url).await {
            error!("failed to connect: {e}");
            self.connecting.store(false, Ordering::SeqCst);
            self.notifier.post("Failed to connect to server");
        }
    }

    /// Opens the transport, stores the writer half and starts the reader.
    ///
    /// Boxed to break the `connect` → `open` → `send` → `connect` cycle
    /// that otherwise defeats auto-trait (`Send`) inference.
    fn open<'a>(
        self: &'a Arc<Self>,
        url: &'a str,
    ) -> Pin<Box<dyn Future<Output = SessionResult<()>> + Send + 'a>> {
        Box::pin(async move {
            url::Url::parse(url)?;
            let (stream, _response) = tokio_tungstenite::connect_async(url).await?;
            if self.stopped.load(Ordering::SeqCst) {
                // Closed while the transport was opening.
                return Ok(());
            }

            let (ws_tx, ws_rx) = stream.split();
            let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            *self.ws_tx.lock().await = Some(ws_tx);
            self.connecting.store(false, Ordering::SeqCst);

            self.send(Message::AppConnect {
                existing_key: self.keys.load(),
            })
            .await;

            let session = Arc::clone(self);
            tokio::spawn(async move { session.read_loop(ws_rx, generation).await });

            Ok(())
        })
    }

    /// Replaces the configuration and forces a reconnect.
    pub async fn apply_config(self: &Arc<Self>, config: Config) {
        {
            let mut guard = match self.config.write() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            *guard = config;
        }
        self.connect(true).await;
    }

    /// Shuts the session down. Terminal and idempotent.
    ///
    /// Cancels the reader and all in-flight dispatch work, closes the
    /// handle with a normal-closure code and suppresses further sends.
    pub async fn close(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("closing session");
        self.cancel.cancel();

        let mut ws_tx = self.ws_tx.lock().await;
        if let Some(mut sink) = ws_tx.take() {
            let frame = CloseFrame {
                code: CloseCode::Normal,
                reason: "client closed".into(),
            };
            if let Err(e) = sink.send(WsMessage::Close(Some(frame))).await {
                debug!("error closing connection: {e}");
            }
        }
        self.connecting.store(false, Ordering::SeqCst);
    }

    /// Sends a protocol message over the socket.
    ///
    /// A no-op after [`close`](Self::close). When disconnected, the message
    /// is dropped and a reconnect attempt is spawned as a side effect; the
    /// message is not queued for later delivery. Protocol sends are never
    /// throttled.
    pub async fn send(self: &Arc<Self>, message: Message) {
        if self.stopped.load(Ordering::SeqCst) {
            return;
        }

        let mut ws_tx = self.ws_tx.lock().await;
        let Some(sink) = ws_tx.as_mut() else {
            drop(ws_tx);
            debug!("not connected, reconnecting");
            let session = Arc::clone(self);
            tokio::spawn(async move { session.connect(true).await });
            return;
        };

        match message.encode() {
            Ok(frame) => {
                if let Err(e) = sink.send(WsMessage::text(frame)).await {
                    error!("error sending message: {e}");
                }
            }
            Err(e) => error!("error encoding message: {e}"),
        }
    }

    async fn read_loop(self: Arc<Self>, mut ws_rx: WsSource, generation: u64) {
        loop {
            tokio::select! {
                () = self.cancel.cancelled() => return,
                frame = ws_rx.next() => {
                    let Some(frame) = frame else { break };
                    match frame {
                        Ok(frame) => {
                            if self.handle_frame(frame).await.is_break() {
                                break;
                            }
                        }
                        Err(e) => {
                            error!("error receiving frame: {e}");
                            break;
                        }
                    }
                }
            }
        }

        // Transport gone: back to disconnected, unless a newer connection
        // has already replaced this one. Recovery is caller-driven.
        let mut ws_tx = self.ws_tx.lock().await;
        if self.generation.load(Ordering::SeqCst) != generation {
            return;
        }
        *ws_tx = None;
        drop(ws_tx);
        self.connecting.store(false, Ordering::SeqCst);
        if !self.stopped.load(Ordering::SeqCst) {
            self.notifier.post("Disconnected from server");
        }
    }

    async fn handle_frame(self: &Arc<Self>, frame: WsMessage) -> ControlFlow<()> {
        match frame {
            WsMessage::Text(frame) => {
                // Do not parse exceedingly large frames to prevent out of
                // memory conditions.
                let frame_size = frame.len();
                if frame_size > MAX_FRAME_SIZE {
                    error!("ignoring oversized frame with {frame_size} bytes");
                    return ControlFlow::Continue(());
                }

                match Message::decode(frame.as_str()) {
                    Ok(Message::AppConnectResponse {
                        key,
                        success,
                        error,
                    }) => self.handle_connect_response(key, success, error.as_deref()),
                    Ok(message) => dispatch::dispatch(self, message),
                    // Decode failures discard the frame; the connection
                    // stays open.
                    Err(e) => error!("error parsing frame: {e}"),
                }
                ControlFlow::Continue(())
            }
            WsMessage::Ping(payload) => {
                trace!("ping -> pong");
                let mut ws_tx = self.ws_tx.lock().await;
                if let Some(sink) = ws_tx.as_mut() {
                    if let Err(e) = sink.send(WsMessage::Pong(payload)).await {
                        warn!("error sending pong: {e}");
                    }
                }
                ControlFlow::Continue(())
            }
            WsMessage::Close(payload) => {
                debug!("connection closed by server: {payload:?}");
                ControlFlow::Break(())
            }
            _ => {
                trace!("frame type unimplemented");
                ControlFlow::Continue(())
            }
        }
    }

    /// Completes the handshake.
    ///
    /// A refused handshake is logged and left alone: the connection stays
    /// open and no retry is attempted. A new key is persisted only when it
    /// differs from the stored one, with a one-time prioritized
    /// notification to the operator.
    fn handle_connect_response(&self, key: String, success: bool, error: Option<&str>) {
        if !success {
            error!(
                "server refused connection: {}",
                error.unwrap_or("unknown error")
            );
            return;
        }

        debug!("connected to server");
        if self.keys.load().as_deref() != Some(key.as_str()) {
            info!("saving new session key");
            self.keys.store(&key);
            self.notifier
                .post_prioritized(&format!("Received new key: {key}"));
        }
    }
}

/// Host event surface: each playback event is projected and sent
/// immediately, bypassing notification throttling, since the remote peer
/// depends on these for correctness.
impl Session {
    pub async fn playback_state_changed(
        self: &Arc<Self>,
        state: PlaybackState,
        position: f64,
        current: Option<&HostTrack>,
    ) {
        self.send(Message::PlaybackStateUpdate {
            state,
            current_position: position,
            track: track::project(current),
        })
        .await;
    }

    /// `current_index` must be the host's true current index; it is sent
    /// through verbatim.
    pub async fn playlist_changed(self: &Arc<Self>, playlist: &[HostTrack], current_index: usize) {
        let tracks = playlist.iter().map(|t| track::project(Some(t))).collect();
        self.send(Message::PlaylistUpdate {
            tracks,
            current_index,
        })
        .await;
    }

    pub async fn playback_mode_changed(self: &Arc<Self>, shuffle: bool, repeat_mode: RepeatMode) {
        self.send(Message::PlaybackModeUpdate {
            shuffle,
            repeat_mode,
        })
        .await;
    }

    pub async fn position_changed(self: &Arc<Self>, position: f64) {
        self.send(Message::PositionUpdate { position }).await;
    }

    pub async fn volume_changed(self: &Arc<Self>, volume: f64) {
        self.send(Message::VolumeUpdate { volume }).await;
    }
}
