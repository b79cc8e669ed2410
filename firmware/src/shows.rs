//! Show request queue between the bus task and the show player.

#![cfg_attr(not(target_os = "none"), allow(dead_code))]

#[cfg(not(target_os = "none"))]
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
#[cfg(target_os = "none")]
use embassy_sync::blocking_mutex::raw::ThreadModeRawMutex;
use embassy_sync::channel::{Channel, Receiver, Sender, TrySendError};
use pcm_core::shows::{SequenceTrigger, ShowKind};

/// Shows that may wait behind the one currently playing.
pub const SHOW_QUEUE_DEPTH: usize = 2;

#[cfg(target_os = "none")]
type ShowMutex = ThreadModeRawMutex;
#[cfg(not(target_os = "none"))]
type ShowMutex = NoopRawMutex;

pub type ShowQueue = Channel<ShowMutex, ShowKind, SHOW_QUEUE_DEPTH>;
pub type ShowSender<'a> = Sender<'a, ShowMutex, ShowKind, SHOW_QUEUE_DEPTH>;
pub type ShowReceiver<'a> = Receiver<'a, ShowMutex, ShowKind, SHOW_QUEUE_DEPTH>;

/// Sequence trigger that hands shows to the player without waiting.
pub struct ShowRequests<'a> {
    sender: ShowSender<'a>,
}

impl<'a> ShowRequests<'a> {
    pub fn new(sender: ShowSender<'a>) -> Self {
        Self { sender }
    }
}

impl SequenceTrigger for ShowRequests<'_> {
    fn trigger(&mut self, show: ShowKind) -> bool {
        match self.sender.try_send(show) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => false,
        }
    }
}
