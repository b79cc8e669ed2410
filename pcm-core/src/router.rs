//! Inbound frame dispatch and the controller that owns every piece of state.
//!
//! [`Controller`] is the single entry point for bus traffic. Each frame is
//! classified by identifier into a [`MessageKind`], checked against that
//! kind's minimum payload length, and handed to exactly one handler. The
//! result is reported as a [`Dispatch`] so platforms can log what happened
//! without the core depending on a logger.

use core::fmt;

use crate::config::ControllerConfig;
use crate::credentials::{CredentialStore, Credentials};
use crate::frame::BusFrame;
use crate::lights::{
    CHANNEL_COUNT, LightBank, LightCommand, LightUpdate, OutputSink, SET_BRIGHTNESS_FRAME_ID,
    TOGGLE_FRAME_ID,
};
use crate::ota::{
    OtaTriggerMatcher, TRIGGER_SUFFIX_LEN, UPDATE_TRIGGER_FRAME_ID, UpdateAgent, UpdateOutcome,
};
use crate::provisioning::{
    AbortReason, PROVISIONING_FRAME_ID, ProvisioningError, ProvisioningSession,
    ProvisioningUpdate, TransferProgress,
};
use crate::shows::{SEQUENCE_TRIGGER_FRAME_ID, SequenceTrigger, ShowKind};
use crate::status::{PublishCounters, PublishOutcome, StatusPublisher};
use crate::telemetry::{TelemetryEventKind, TelemetryInstant, TelemetryRecorder};

/// Handler selected by a frame identifier.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MessageKind {
    UpdateTrigger,
    Provisioning,
    SetBrightness,
    Toggle,
    SequenceTrigger,
}

impl MessageKind {
    const TABLE: [(u32, MessageKind, usize); 5] = [
        (UPDATE_TRIGGER_FRAME_ID, MessageKind::UpdateTrigger, TRIGGER_SUFFIX_LEN),
        (PROVISIONING_FRAME_ID, MessageKind::Provisioning, 1),
        (SET_BRIGHTNESS_FRAME_ID, MessageKind::SetBrightness, 2),
        (TOGGLE_FRAME_ID, MessageKind::Toggle, 1),
        (SEQUENCE_TRIGGER_FRAME_ID, MessageKind::SequenceTrigger, 1),
    ];

    /// Maps a bus identifier to its handler, if any.
    #[must_use]
    pub const fn from_identifier(id: u32) -> Option<Self> {
        let mut index = 0;
        while index < Self::TABLE.len() {
            let (entry_id, kind, _) = Self::TABLE[index];
            if entry_id == id {
                return Some(kind);
            }
            index += 1;
        }
        None
    }

    #[must_use]
    pub const fn identifier(self) -> u32 {
        Self::TABLE[self.slot()].0
    }

    /// Shortest payload the handler accepts.
    #[must_use]
    pub const fn min_len(self) -> usize {
        Self::TABLE[self.slot()].2
    }

    const fn slot(self) -> usize {
        match self {
            MessageKind::UpdateTrigger => 0,
            MessageKind::Provisioning => 1,
            MessageKind::SetBrightness => 2,
            MessageKind::Toggle => 3,
            MessageKind::SequenceTrigger => 4,
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MessageKind::UpdateTrigger => "update-trigger",
            MessageKind::Provisioning => "provisioning",
            MessageKind::SetBrightness => "set-brightness",
            MessageKind::Toggle => "toggle",
            MessageKind::SequenceTrigger => "sequence-trigger",
        })
    }
}

/// Why a frame never reached a handler.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DropReason {
    RemoteRequest,
    TooShort,
    UnknownIdentifier,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DropReason::RemoteRequest => "remote-request",
            DropReason::TooShort => "too-short",
            DropReason::UnknownIdentifier => "unknown-identifier",
        })
    }
}

/// Persisting committed credentials failed; the live copy was still updated.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CommitError<E> {
    Store(E),
}

impl<E: fmt::Display> fmt::Display for CommitError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommitError::Store(error) => write!(f, "credential store write failed: {error}"),
        }
    }
}

/// What a single frame did.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Dispatch<E> {
    Lights(LightUpdate),
    /// Light command addressed a channel or selector outside the valid range.
    LightsIgnored,
    Provisioning(ProvisioningUpdate),
    ProvisioningRejected(ProvisioningError),
    /// Credentials validated and published to the live reference.
    Committed {
        credentials: Credentials,
        persisted: Result<(), CommitError<E>>,
    },
    UpdateWindow(UpdateOutcome),
    TriggerMismatch,
    ShowTriggered(ShowKind),
    ShowRefused(ShowKind),
    /// Sequence id is not addressable over the bus.
    ShowUnknown(u8),
    Dropped(DropReason),
}

/// Owns the light bank, the provisioning slot, the live credentials and the
/// status publisher, and routes inbound frames between them.
pub struct Controller<Sink, Store, Agent, Trigger, TInstant>
where
    TInstant: Copy,
{
    sink: Sink,
    store: Store,
    agent: Agent,
    trigger: Trigger,
    lights: LightBank,
    session: ProvisioningSession<TInstant>,
    live: Option<Credentials>,
    matcher: OtaTriggerMatcher,
    config: ControllerConfig,
    status: StatusPublisher<TInstant>,
    telemetry: TelemetryRecorder<TInstant>,
}

impl<Sink, Store, Agent, Trigger, TInstant> Controller<Sink, Store, Agent, Trigger, TInstant>
where
    Sink: OutputSink,
    Store: CredentialStore,
    Agent: UpdateAgent,
    Trigger: SequenceTrigger,
    TInstant: TelemetryInstant,
{
    /// Creates a controller with every channel off and no live credentials.
    pub fn new(
        config: ControllerConfig,
        sink: Sink,
        store: Store,
        agent: Agent,
        trigger: Trigger,
    ) -> Self {
        Self {
            sink,
            store,
            agent,
            trigger,
            lights: LightBank::new(),
            session: ProvisioningSession::with_timeout(config.provisioning_timeout),
            live: None,
            matcher: OtaTriggerMatcher::new(config.hostname_prefix),
            config,
            status: StatusPublisher::from_config(&config),
            telemetry: TelemetryRecorder::new(),
        }
    }

    /// Reads persisted credentials into the live reference.
    ///
    /// A record with an empty SSID counts as not provisioned.
    pub fn load_credentials(&mut self) -> Result<Option<&Credentials>, Store::Error> {
        self.live = self.store.load()?.filter(|credentials| !credentials.is_empty());
        Ok(self.live.as_ref())
    }

    /// Routes one inbound frame to its handler.
    pub fn handle_frame(&mut self, frame: &BusFrame, now: TInstant) -> Dispatch<Store::Error> {
        if frame.is_remote_request() {
            return self.drop_frame(DropReason::RemoteRequest, now);
        }
        let Some(kind) = MessageKind::from_identifier(frame.id()) else {
            return self.drop_frame(DropReason::UnknownIdentifier, now);
        };
        let payload = frame.payload();
        if payload.len() < kind.min_len() {
            return self.drop_frame(DropReason::TooShort, now);
        }

        match kind {
            MessageKind::UpdateTrigger => self.update_trigger(payload, now),
            MessageKind::Provisioning => self.provisioning(payload, now),
            MessageKind::SetBrightness => self.lights(LightCommand::decode_brightness(payload)),
            MessageKind::Toggle => self.lights(LightCommand::decode_toggle(payload)),
            MessageKind::SequenceTrigger => self.sequence_trigger(payload[0], now),
        }
    }

    /// Discards a provisioning transfer that has been idle past the timeout.
    pub fn sweep(&mut self, now: TInstant) -> Option<AbortReason> {
        let reason = self.session.sweep(now)?;
        self.telemetry
            .record(TelemetryEventKind::ProvisioningAborted(reason), now);
        Some(reason)
    }

    /// Returns the status frame to transmit when one is due.
    pub fn poll_status(&mut self, now: TInstant) -> Option<BusFrame> {
        let levels = self.lights.snapshot();
        self.status.poll(now, levels)
    }

    /// Records whether the last status frame left the transmitter.
    pub fn record_status(&mut self, outcome: PublishOutcome, now: TInstant) {
        self.status.record(outcome);
        if outcome == PublishOutcome::Dropped {
            self.telemetry.record(TelemetryEventKind::StatusDropped, now);
        }
    }

    /// Re-sends every stored level to the sink.
    pub fn restore_outputs(&mut self) {
        self.lights.restore(&mut self.sink);
    }

    #[must_use]
    pub const fn levels(&self) -> [u8; CHANNEL_COUNT] {
        self.lights.snapshot()
    }

    #[must_use]
    pub const fn live_credentials(&self) -> Option<&Credentials> {
        self.live.as_ref()
    }

    #[must_use]
    pub fn provisioning_progress(&self) -> Option<TransferProgress> {
        self.session.progress()
    }

    #[must_use]
    pub const fn config(&self) -> &ControllerConfig {
        &self.config
    }

    #[must_use]
    pub const fn status_counters(&self) -> PublishCounters {
        self.status.counters()
    }

    #[must_use]
    pub const fn telemetry(&self) -> &TelemetryRecorder<TInstant> {
        &self.telemetry
    }

    pub fn sink(&self) -> &Sink {
        &self.sink
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn agent(&self) -> &Agent {
        &self.agent
    }

    pub fn trigger(&self) -> &Trigger {
        &self.trigger
    }

    fn drop_frame(&mut self, reason: DropReason, now: TInstant) -> Dispatch<Store::Error> {
        self.telemetry
            .record(TelemetryEventKind::FrameDropped(reason), now);
        Dispatch::Dropped(reason)
    }

    fn lights(&mut self, command: Option<LightCommand>) -> Dispatch<Store::Error> {
        match command {
            Some(command) => Dispatch::Lights(self.lights.apply(command, &mut self.sink)),
            None => Dispatch::LightsIgnored,
        }
    }

    /// Serves the whole update window before returning; no other frame is
    /// handled until the agent reports an outcome.
    fn update_trigger(&mut self, fragment: &[u8], now: TInstant) -> Dispatch<Store::Error> {
        if !self.matcher.matches(fragment, self.agent.identity()) {
            return Dispatch::TriggerMismatch;
        }

        self.telemetry
            .record(TelemetryEventKind::UpdateWindowOpened, now);
        let outcome = self
            .agent
            .wait_for_update(self.live.as_ref(), self.config.update_window);
        self.telemetry
            .record(TelemetryEventKind::UpdateWindowClosed(outcome), now);

        Dispatch::UpdateWindow(outcome)
    }

    fn provisioning(&mut self, payload: &[u8], now: TInstant) -> Dispatch<Store::Error> {
        match self.session.on_frame(payload, now) {
            Ok(ProvisioningUpdate::Committed(credentials)) => self.commit(credentials, now),
            Ok(update) => {
                if matches!(update, ProvisioningUpdate::Started(_)) {
                    self.telemetry
                        .record(TelemetryEventKind::ProvisioningStarted, now);
                }
                Dispatch::Provisioning(update)
            }
            Err(error) => {
                let event = match error.abort_reason() {
                    Some(reason) => TelemetryEventKind::ProvisioningAborted(reason),
                    None => TelemetryEventKind::ProvisioningRejected,
                };
                self.telemetry.record(event, now);
                Dispatch::ProvisioningRejected(error)
            }
        }
    }

    fn commit(&mut self, credentials: Credentials, now: TInstant) -> Dispatch<Store::Error> {
        let persisted = self.store.store(&credentials).map_err(CommitError::Store);
        self.live = Some(credentials.clone());
        self.telemetry.record(
            TelemetryEventKind::ProvisioningCommitted {
                persisted: persisted.is_ok(),
            },
            now,
        );
        Dispatch::Committed {
            credentials,
            persisted,
        }
    }

    fn sequence_trigger(&mut self, sequence_id: u8, now: TInstant) -> Dispatch<Store::Error> {
        let Some(show) = ShowKind::from_sequence_id(sequence_id) else {
            return Dispatch::ShowUnknown(sequence_id);
        };
        if self.trigger.trigger(show) {
            self.telemetry
                .record(TelemetryEventKind::ShowTriggered(show), now);
            Dispatch::ShowTriggered(show)
        } else {
            self.telemetry
                .record(TelemetryEventKind::ShowRefused(show), now);
            Dispatch::ShowRefused(show)
        }
    }
}

#[cfg(test)]
mod tests {
    use core::time::Duration;

    use super::*;
    use crate::credentials::MemoryCredentialStore;
    use crate::lights::NoopOutputSink;
    use crate::shows::NoopSequenceTrigger;

    #[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
    struct MillisInstant(u64);

    impl TelemetryInstant for MillisInstant {
        fn saturating_duration_since(&self, earlier: Self) -> Duration {
            Duration::from_millis(self.0.saturating_sub(earlier.0))
        }
    }

    struct FixedAgent;

    impl UpdateAgent for FixedAgent {
        fn identity(&self) -> &str {
            "esp32-0A0B0C"
        }

        fn wait_for_update(&mut self, _: Option<&Credentials>, _: Duration) -> UpdateOutcome {
            UpdateOutcome::TimedOut
        }
    }

    type TestController = Controller<
        NoopOutputSink,
        MemoryCredentialStore,
        FixedAgent,
        NoopSequenceTrigger,
        MillisInstant,
    >;

    fn controller() -> TestController {
        Controller::new(
            ControllerConfig::default(),
            NoopOutputSink,
            MemoryCredentialStore::new(),
            FixedAgent,
            NoopSequenceTrigger,
        )
    }

    fn frame(id: u32, payload: &[u8]) -> BusFrame {
        BusFrame::new(id, payload).expect("valid frame")
    }

    #[test]
    fn identifier_table_is_fixed() {
        assert_eq!(MessageKind::from_identifier(0), Some(MessageKind::UpdateTrigger));
        assert_eq!(MessageKind::from_identifier(21), Some(MessageKind::SetBrightness));
        assert_eq!(MessageKind::from_identifier(0x1B), None);
        assert_eq!(MessageKind::UpdateTrigger.min_len(), 3);
        assert_eq!(MessageKind::SetBrightness.min_len(), 2);
        assert_eq!(MessageKind::Toggle.identifier(), 24);
    }

    #[test]
    fn identifier_table_follows_the_named_constants() {
        assert_eq!(
            [
                UPDATE_TRIGGER_FRAME_ID,
                PROVISIONING_FRAME_ID,
                SET_BRIGHTNESS_FRAME_ID,
                TOGGLE_FRAME_ID,
                SEQUENCE_TRIGGER_FRAME_ID,
            ],
            [0, 1, 21, 24, 30]
        );
        for (kind, id) in [
            (MessageKind::UpdateTrigger, UPDATE_TRIGGER_FRAME_ID),
            (MessageKind::Provisioning, PROVISIONING_FRAME_ID),
            (MessageKind::SetBrightness, SET_BRIGHTNESS_FRAME_ID),
            (MessageKind::Toggle, TOGGLE_FRAME_ID),
            (MessageKind::SequenceTrigger, SEQUENCE_TRIGGER_FRAME_ID),
        ] {
            assert_eq!(kind.identifier(), id);
            assert_eq!(MessageKind::from_identifier(id), Some(kind));
        }
    }

    #[test]
    fn remote_and_short_frames_are_dropped_before_handlers() {
        let mut controller = controller();
        let remote = frame(24, &[0]).with_remote_request(true);
        assert_eq!(
            controller.handle_frame(&remote, MillisInstant(0)),
            Dispatch::Dropped(DropReason::RemoteRequest)
        );
        assert_eq!(
            controller.handle_frame(&frame(21, &[0]), MillisInstant(0)),
            Dispatch::Dropped(DropReason::TooShort)
        );
        assert_eq!(controller.levels(), [0; CHANNEL_COUNT]);
        assert_eq!(controller.telemetry().len(), 2);
    }

    #[test]
    fn mismatched_trigger_opens_no_window() {
        let mut controller = controller();
        assert_eq!(
            controller.handle_frame(&frame(0, &[0x0A, 0x0B, 0x0D]), MillisInstant(0)),
            Dispatch::TriggerMismatch
        );
        assert!(controller.telemetry().is_empty());
    }

    #[test]
    fn refused_show_is_reported() {
        let mut controller = controller();
        assert_eq!(
            controller.handle_frame(&frame(30, &[1]), MillisInstant(0)),
            Dispatch::ShowRefused(ShowKind::Exterior)
        );
        assert_eq!(
            controller.handle_frame(&frame(30, &[7]), MillisInstant(0)),
            Dispatch::ShowUnknown(7)
        );
    }
}
