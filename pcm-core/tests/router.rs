use core::time::Duration;

use heapless::Vec;
use pcm_core::config::ControllerConfig;
use pcm_core::credentials::{Credentials, MemoryCredentialStore};
use pcm_core::frame::BusFrame;
use pcm_core::lights::{ChannelIndex, LightUpdate, OutputSink};
use pcm_core::ota::{UpdateAgent, UpdateOutcome};
use pcm_core::router::{Controller, Dispatch, DropReason};
use pcm_core::shows::{SequenceTrigger, ShowKind};
use pcm_core::status::PublishOutcome;
use pcm_core::telemetry::{TelemetryEventKind, TelemetryInstant};

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd)]
struct MockInstant(u64);

impl TelemetryInstant for MockInstant {
    fn saturating_duration_since(&self, earlier: Self) -> Duration {
        Duration::from_millis(self.0.saturating_sub(earlier.0))
    }
}

fn at(ms: u64) -> MockInstant {
    MockInstant(ms)
}

#[derive(Default)]
struct RecordingSink {
    writes: Vec<(u8, u8), 64>,
}

impl OutputSink for RecordingSink {
    fn set_intensity(&mut self, channel: ChannelIndex, level: u8) {
        self.writes
            .push((channel.get(), level))
            .expect("sink capacity exceeded");
    }
}

struct ScriptedUpdateAgent {
    identity: &'static str,
    outcome: UpdateOutcome,
    calls: Vec<(Option<Credentials>, Duration), 4>,
}

impl ScriptedUpdateAgent {
    fn new(identity: &'static str, outcome: UpdateOutcome) -> Self {
        Self {
            identity,
            outcome,
            calls: Vec::new(),
        }
    }
}

impl UpdateAgent for ScriptedUpdateAgent {
    fn identity(&self) -> &str {
        self.identity
    }

    fn wait_for_update(
        &mut self,
        credentials: Option<&Credentials>,
        window: Duration,
    ) -> UpdateOutcome {
        self.calls
            .push((credentials.cloned(), window))
            .expect("too many update windows");
        self.outcome
    }
}

struct RecordingShows {
    accept: bool,
    requested: Vec<ShowKind, 8>,
}

impl SequenceTrigger for RecordingShows {
    fn trigger(&mut self, show: ShowKind) -> bool {
        let _ = self.requested.push(show);
        self.accept
    }
}

type TestController = Controller<
    RecordingSink,
    MemoryCredentialStore,
    ScriptedUpdateAgent,
    RecordingShows,
    MockInstant,
>;

fn controller(agent: ScriptedUpdateAgent) -> TestController {
    Controller::new(
        ControllerConfig::default().with_update_window(Duration::from_secs(30)),
        RecordingSink::default(),
        MemoryCredentialStore::new(),
        agent,
        RecordingShows {
            accept: true,
            requested: Vec::new(),
        },
    )
}

fn default_controller() -> TestController {
    controller(ScriptedUpdateAgent::new("esp32-A1B2C3", UpdateOutcome::TimedOut))
}

fn frame(id: u32, payload: &[u8]) -> BusFrame {
    BusFrame::new(id, payload).expect("valid frame")
}

#[test]
fn toggle_twice_restores_and_channels_stay_independent() {
    let mut controller = default_controller();
    controller.handle_frame(&frame(21, &[5, 40]), at(0));

    assert_eq!(
        controller.handle_frame(&frame(24, &[2]), at(1)),
        Dispatch::Lights(LightUpdate::Channel {
            channel: ChannelIndex::new(2).expect("channel"),
            level: 255,
        })
    );
    controller.handle_frame(&frame(24, &[2]), at(2));

    assert_eq!(controller.levels(), [0, 0, 0, 0, 0, 40, 0, 0]);
    assert_eq!(controller.sink().writes.as_slice(), &[(5, 40), (2, 255), (2, 0)]);
}

#[test]
fn set_brightness_is_stored_verbatim_and_ignores_bad_channels() {
    let mut controller = default_controller();
    controller.handle_frame(&frame(21, &[7, 1]), at(0));
    assert_eq!(
        controller.handle_frame(&frame(21, &[8, 200]), at(1)),
        Dispatch::LightsIgnored
    );
    assert_eq!(
        controller.handle_frame(&frame(24, &[10]), at(2)),
        Dispatch::LightsIgnored
    );
    assert_eq!(controller.levels(), [0, 0, 0, 0, 0, 0, 0, 1]);
}

#[test]
fn group_commands_keep_their_asymmetry() {
    let mut controller = default_controller();

    controller.handle_frame(&frame(24, &[8, 3]), at(0));
    assert_eq!(controller.levels(), [255; 8]);

    controller.handle_frame(&frame(24, &[8, 0]), at(1));
    assert_eq!(controller.levels(), [0; 8]);

    controller.handle_frame(&frame(24, &[9, 1]), at(2));
    assert_eq!(controller.levels(), [255; 8]);

    assert_eq!(
        controller.handle_frame(&frame(24, &[9, 0]), at(3)),
        Dispatch::Lights(LightUpdate::Unchanged)
    );
    assert_eq!(controller.levels(), [255; 8]);

    controller.handle_frame(&frame(24, &[8]), at(4));
    assert_eq!(controller.levels(), [0; 8]);
}

#[test]
fn drop_policy_applies_per_identifier() {
    let mut controller = default_controller();

    let fixtures: [(BusFrame, Dispatch<_>); 5] = [
        (BusFrame::remote(24), Dispatch::Dropped(DropReason::RemoteRequest)),
        (frame(0, &[0xA1, 0xB2]), Dispatch::Dropped(DropReason::TooShort)),
        (frame(1, &[]), Dispatch::Dropped(DropReason::TooShort)),
        (frame(30, &[]), Dispatch::Dropped(DropReason::TooShort)),
        (frame(22, &[1, 2]), Dispatch::Dropped(DropReason::UnknownIdentifier)),
    ];
    for (index, (frame, expected)) in (0u64..).zip(fixtures) {
        assert_eq!(controller.handle_frame(&frame, at(index)), expected);
    }

    assert_eq!(controller.levels(), [0; 8]);
    assert!(controller.sink().writes.is_empty());
    assert!(controller.agent().calls.is_empty());
    assert_eq!(controller.telemetry().len(), 5);
}

#[test]
fn extended_frames_dispatch_by_numeric_identifier() {
    let mut controller = default_controller();
    let extended = BusFrame::new_extended(24, &[0]).expect("valid frame");
    controller.handle_frame(&extended, at(0));
    assert_eq!(controller.levels()[0], 255);
}

#[test]
fn matching_trigger_opens_update_window_with_live_credentials() {
    let mut controller = controller(ScriptedUpdateAgent::new(
        "esp32-A1B2C3",
        UpdateOutcome::Failed,
    ));
    let credentials = Credentials::new(b"Net", b"pw").expect("valid credentials");
    for frame in pcm_core::provisioning::ProvisioningEncoder::new(&credentials) {
        controller.handle_frame(&frame, at(0));
    }

    assert_eq!(
        controller.handle_frame(&frame(0, &[0xa1, 0xb2, 0xc3]), at(10)),
        Dispatch::UpdateWindow(UpdateOutcome::Failed)
    );
    assert_eq!(
        controller.agent().calls.as_slice(),
        &[(Some(credentials), Duration::from_secs(30))]
    );

    let events: Vec<TelemetryEventKind, 8> = controller
        .telemetry()
        .oldest_first()
        .map(|record| record.event)
        .filter(|event| {
            matches!(
                event,
                TelemetryEventKind::UpdateWindowOpened | TelemetryEventKind::UpdateWindowClosed(_)
            )
        })
        .collect();
    assert_eq!(
        events.as_slice(),
        &[
            TelemetryEventKind::UpdateWindowOpened,
            TelemetryEventKind::UpdateWindowClosed(UpdateOutcome::Failed),
        ]
    );
}

#[test]
fn trigger_comparison_is_case_sensitive() {
    let mut controller = controller(ScriptedUpdateAgent::new(
        "esp32-a1b2c3",
        UpdateOutcome::Applied,
    ));
    assert_eq!(
        controller.handle_frame(&frame(0, &[0xA1, 0xB2, 0xC3]), at(0)),
        Dispatch::TriggerMismatch
    );
    assert!(controller.agent().calls.is_empty());
}

#[test]
fn sequence_ids_reach_the_show_collaborator() {
    let mut controller = default_controller();
    assert_eq!(
        controller.handle_frame(&frame(30, &[0]), at(0)),
        Dispatch::ShowTriggered(ShowKind::Interior)
    );
    assert_eq!(
        controller.handle_frame(&frame(30, &[1, 99]), at(1)),
        Dispatch::ShowTriggered(ShowKind::Exterior)
    );
    assert_eq!(
        controller.handle_frame(&frame(30, &[2]), at(2)),
        Dispatch::ShowUnknown(2)
    );
    assert_eq!(
        controller.trigger().requested.as_slice(),
        &[ShowKind::Interior, ShowKind::Exterior]
    );
    assert_eq!(controller.levels(), [0; 8]);
}

#[test]
fn status_frames_follow_the_light_bank_and_count_drops() {
    let mut controller = default_controller();
    controller.handle_frame(&frame(21, &[0, 17]), at(0));

    let status = controller.poll_status(at(0)).expect("first frame is due");
    assert_eq!(status.id(), 0x1B);
    assert_eq!(status.payload(), &[17, 0, 0, 0, 0, 0, 0, 0]);
    controller.record_status(PublishOutcome::Dropped, at(10));

    assert!(controller.poll_status(at(32)).is_none());
    assert!(controller.poll_status(at(33)).is_some());
    controller.record_status(PublishOutcome::Sent, at(34));

    let counters = controller.status_counters();
    assert_eq!((counters.sent, counters.dropped), (1, 1));
    assert!(
        controller
            .telemetry()
            .oldest_first()
            .any(|record| record.event == TelemetryEventKind::StatusDropped)
    );
}

#[test]
fn empty_stored_ssid_counts_as_not_provisioned() {
    let store = MemoryCredentialStore::with_credentials(Credentials::default());
    let mut controller = Controller::<_, _, _, _, MockInstant>::new(
        ControllerConfig::default(),
        RecordingSink::default(),
        store,
        ScriptedUpdateAgent::new("esp32-000000", UpdateOutcome::NotProvisioned),
        RecordingShows {
            accept: false,
            requested: Vec::new(),
        },
    );
    assert_eq!(controller.load_credentials(), Ok(None));
    assert!(controller.live_credentials().is_none());
}
