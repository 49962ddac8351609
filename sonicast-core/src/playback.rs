//! Playback session: plays one encoded transmission `repeat_count` times through a
//! host playback resource, then fires the completion callback once.
//!
//! Host-driven: the host forwards each "playback finished" event from its audio
//! element to [`PlaybackSession::on_playback_finished`]; the session decides whether to
//! replay or complete.

use tracing::{info, warn};

use crate::error::PlaybackError;

/// Host audio output (media element, player process, sound device...).
pub trait PlaybackResource {
    fn is_paused(&self) -> bool;
    fn pause(&mut self);
    /// Replace the current source with an encoded container.
    fn set_source(&mut self, bytes: Vec<u8>, mime_type: &'static str) -> Result<(), PlaybackError>;
    /// Start playing the current source from the beginning.
    fn start(&mut self) -> Result<(), PlaybackError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Encoding,
    Playing,
    Completed,
    Cancelled,
}

impl PlaybackState {
    pub fn is_terminal(self) -> bool {
        matches!(self, PlaybackState::Completed | PlaybackState::Cancelled)
    }
}

pub type CompletionCallback = Box<dyn FnOnce() + Send>;

pub struct PlaybackSession {
    state: PlaybackState,
    repeat_count: u32,
    play_count: u32,
    on_complete: Option<CompletionCallback>,
}

impl PlaybackSession {
    pub fn new(repeat_count: u32) -> Self {
        Self {
            state: PlaybackState::Idle,
            repeat_count: repeat_count.max(1),
            play_count: 0,
            on_complete: None,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn play_count(&self) -> u32 {
        self.play_count
    }

    pub fn repeat_count(&self) -> u32 {
        self.repeat_count
    }

    /// Start a transmission. `encode` produces the container bytes and mime type; if it
    /// fails the session returns to Idle and nothing reaches the resource.
    pub fn play<R, F, E>(
        &mut self,
        resource: &mut R,
        encode: F,
        on_complete: CompletionCallback,
    ) -> Result<(), E>
    where
        R: PlaybackResource + ?Sized,
        F: FnOnce() -> Result<(Vec<u8>, &'static str), E>,
        E: From<PlaybackError>,
    {
        if self.state == PlaybackState::Playing || self.state == PlaybackState::Encoding {
            return Err(PlaybackError::AlreadyActive.into());
        }
        self.state = PlaybackState::Encoding;
        self.play_count = 0;
        self.on_complete = None;
        if !resource.is_paused() {
            resource.pause();
        }
        let (bytes, mime) = match encode() {
            Ok(x) => x,
            Err(e) => {
                self.state = PlaybackState::Idle;
                return Err(e);
            }
        };
        if let Err(e) = resource.set_source(bytes, mime).and_then(|_| resource.start()) {
            self.state = PlaybackState::Idle;
            return Err(e.into());
        }
        self.on_complete = Some(on_complete);
        self.state = PlaybackState::Playing;
        info!(repeat = self.repeat_count, mime, "playback started");
        Ok(())
    }

    /// One playback of the source has finished. Replays until `repeat_count` plays, then
    /// completes. Returns the state after handling the event.
    ///
    /// If the resource fails to restart, the session is cancelled before the error is
    /// returned, so a new `play` can follow.
    pub fn on_playback_finished<R>(
        &mut self,
        resource: &mut R,
    ) -> Result<PlaybackState, PlaybackError>
    where
        R: PlaybackResource + ?Sized,
    {
        if self.state != PlaybackState::Playing {
            warn!(state = ?self.state, "ignoring playback-finished event");
            return Ok(self.state);
        }
        self.play_count += 1;
        if self.play_count < self.repeat_count {
            info!(play = self.play_count, of = self.repeat_count, "replaying transmission");
            if let Err(e) = resource.start() {
                warn!(error = %e, play = self.play_count, "replay failed to start");
                self.cancel(resource);
                return Err(e);
            }
            return Ok(self.state);
        }
        self.state = PlaybackState::Completed;
        info!(plays = self.play_count, "playback completed");
        if let Some(cb) = self.on_complete.take() {
            cb();
        }
        Ok(self.state)
    }

    /// Abort: pause the resource and drop the completion callback without firing it.
    pub fn cancel<R>(&mut self, resource: &mut R)
    where
        R: PlaybackResource + ?Sized,
    {
        if self.state.is_terminal() {
            return;
        }
        if !resource.is_paused() {
            resource.pause();
        }
        self.on_complete = None;
        self.state = PlaybackState::Cancelled;
        info!(plays = self.play_count, "playback cancelled");
    }
}

impl Default for PlaybackSession {
    fn default() -> Self {
        Self::new(crate::session::DEFAULT_REPEAT_COUNT)
    }
}
