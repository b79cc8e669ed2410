use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

use pcm_core::config::ControllerConfig;
use pcm_core::console::catalog;
use pcm_core::console::{self, Command};
use pcm_core::credentials::{Credentials, MemoryCredentialStore, WriteRejected};
use pcm_core::frame::{BusFrame, MAX_STANDARD_ID};
use pcm_core::lights::{CHANNEL_COUNT, ChannelIndex, OutputSink};
use pcm_core::ota::{Hostname, TRIGGER_SUFFIX_LEN, UpdateAgent, UpdateOutcome, format_hostname};
use pcm_core::provisioning::{ProvisioningEncoder, ProvisioningUpdate};
use pcm_core::router::{Controller, Dispatch};
use pcm_core::shows::{SequenceTrigger, ShowCursor, ShowKind};
use pcm_core::status::PublishOutcome;
use pcm_core::telemetry::TelemetryInstant;

/// Shows that may wait behind the one currently playing.
const SHOW_QUEUE_DEPTH: usize = 2;
/// Identity bytes reported by the emulated update agent.
pub const EMULATOR_IDENTITY_SUFFIX: [u8; TRIGGER_SUFFIX_LEN] = [0x4C, 0x49, 0x54];

const STEP: Duration = Duration::from_millis(1);

/// Virtual clock reading, advanced only by the `advance` command.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd)]
pub struct SimInstant(Duration);

impl SimInstant {
    pub const fn elapsed(self) -> Duration {
        self.0
    }
}

impl TelemetryInstant for SimInstant {
    fn saturating_duration_since(&self, earlier: Self) -> Duration {
        self.0.saturating_sub(earlier.0)
    }
}

#[derive(Clone, Default)]
struct HostOutputs {
    levels: Rc<RefCell<[u8; CHANNEL_COUNT]>>,
}

impl HostOutputs {
    fn levels(&self) -> [u8; CHANNEL_COUNT] {
        *self.levels.borrow()
    }
}

impl OutputSink for HostOutputs {
    fn set_intensity(&mut self, channel: ChannelIndex, level: u8) {
        self.levels.borrow_mut()[channel.as_usize()] = level;
    }
}

/// Update agent without a network: windows close immediately.
struct HostUpdateAgent {
    identity: Hostname,
    windows: u32,
}

impl UpdateAgent for HostUpdateAgent {
    fn identity(&self) -> &str {
        &self.identity
    }

    fn wait_for_update(
        &mut self,
        credentials: Option<&Credentials>,
        _window: Duration,
    ) -> UpdateOutcome {
        self.windows += 1;
        if credentials.is_none_or(Credentials::is_empty) {
            UpdateOutcome::NotProvisioned
        } else {
            UpdateOutcome::TimedOut
        }
    }
}

#[derive(Clone, Default)]
struct HostShowQueue {
    pending: Rc<RefCell<VecDeque<ShowKind>>>,
}

impl SequenceTrigger for HostShowQueue {
    fn trigger(&mut self, show: ShowKind) -> bool {
        let mut pending = self.pending.borrow_mut();
        if pending.len() >= SHOW_QUEUE_DEPTH {
            return false;
        }
        pending.push_back(show);
        true
    }
}

struct ActiveShow {
    kind: ShowKind,
    cursor: ShowCursor,
    next_frame_at: SimInstant,
}

type HostController =
    Controller<HostOutputs, MemoryCredentialStore, HostUpdateAgent, HostShowQueue, SimInstant>;

pub struct Session {
    controller: HostController,
    outputs: HostOutputs,
    shows: HostShowQueue,
    active_show: Option<ActiveShow>,
    now: SimInstant,
    transcript: Option<TranscriptLogger>,
}

impl Session {
    pub fn new(transcript: Option<&Path>) -> io::Result<Self> {
        let transcript = transcript.map(TranscriptLogger::new).transpose()?;
        let config = ControllerConfig::new();
        let identity = format_hostname(config.hostname_prefix, EMULATOR_IDENTITY_SUFFIX)
            .map_err(|_| io::Error::other("identity does not fit the hostname buffer"))?;
        let outputs = HostOutputs::default();
        let shows = HostShowQueue::default();
        let controller = Controller::new(
            config,
            outputs.clone(),
            MemoryCredentialStore::new(),
            HostUpdateAgent {
                identity,
                windows: 0,
            },
            shows.clone(),
        );

        Ok(Self {
            controller,
            outputs,
            shows,
            active_show: None,
            now: SimInstant::default(),
            transcript,
        })
    }

    pub fn identity(&self) -> &str {
        self.controller.agent().identity()
    }

    pub fn handle_command(&mut self, line: &str) -> io::Result<Vec<String>> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }
        self.record(TranscriptRole::Host, &[trimmed.to_string()])?;

        let lines = match console::parse(trimmed) {
            Ok(command) => self.execute(command),
            Err(error) => vec![format!("ERR syntax {error}")],
        };

        self.record(TranscriptRole::Emulator, &lines)?;
        Ok(lines)
    }

    fn execute(&mut self, command: Command<'_>) -> Vec<String> {
        match command {
            Command::Frame { id, payload } => {
                let frame = if id > MAX_STANDARD_ID {
                    BusFrame::new_extended(id, &payload)
                } else {
                    BusFrame::new(id, &payload)
                };
                match frame {
                    Ok(frame) => vec![self.inject(&frame)],
                    Err(error) => vec![format!("ERR frame {error}")],
                }
            }
            Command::Remote { id } => vec![self.inject(&BusFrame::remote(id))],
            Command::Advance(duration) => self.advance(duration),
            Command::Provision { ssid, password } => self.provision(ssid, password),
            Command::Show(show) => {
                if self.shows.trigger(show) {
                    vec![format!("OK show {show} queued")]
                } else {
                    vec![format!("ERR show {show} refused, queue full")]
                }
            }
            Command::Status => self.status(),
            Command::Events => self.events(),
            Command::Help { topic } => help(topic),
        }
    }

    fn inject(&mut self, frame: &BusFrame) -> String {
        let dispatch = self.controller.handle_frame(frame, self.now);
        format!("{} <- {frame}", describe(&dispatch))
    }

    fn provision(&mut self, ssid: &str, password: &str) -> Vec<String> {
        let credentials = match Credentials::new(ssid.as_bytes(), password.as_bytes()) {
            Ok(credentials) => credentials,
            Err(error) => return vec![format!("ERR provision {error}")],
        };

        let mut frames = 0usize;
        let mut last = None;
        for frame in ProvisioningEncoder::new(&credentials) {
            frames += 1;
            last = Some(self.controller.handle_frame(&frame, self.now));
        }

        let mut lines = vec![format!("provision: sent {frames} frames")];
        if let Some(dispatch) = last {
            lines.push(describe(&dispatch));
        }
        lines
    }

    fn advance(&mut self, duration: Duration) -> Vec<String> {
        let mut lines = Vec::new();
        let deadline = self.now.0.saturating_add(duration);
        let mut sent = 0u32;
        let mut last_status = None;

        while self.now.0 < deadline {
            self.now = SimInstant(self.now.0 + STEP);

            if let Some(reason) = self.controller.sweep(self.now) {
                lines.push(format!(
                    "+{}ms provisioning discarded ({reason})",
                    self.now.elapsed().as_millis()
                ));
            }

            if let Some(frame) = self.controller.poll_status(self.now) {
                self.controller.record_status(PublishOutcome::Sent, self.now);
                sent += 1;
                last_status = Some(frame);
            }

            self.step_shows(&mut lines);
        }

        let mut summary = format!(
            "OK advanced {}ms now=+{}ms status-sent={sent}",
            duration.as_millis(),
            self.now.elapsed().as_millis()
        );
        if let Some(frame) = last_status {
            summary.push_str(&format!(" last={frame}"));
        }
        lines.push(summary);
        lines
    }

    fn step_shows(&mut self, lines: &mut Vec<String>) {
        if self.active_show.is_none() {
            let Some(kind) = self.shows.pending.borrow_mut().pop_front() else {
                return;
            };
            lines.push(format!(
                "+{}ms show {kind} started",
                self.now.elapsed().as_millis()
            ));
            self.active_show = Some(ActiveShow {
                kind,
                cursor: kind.template().cursor(),
                next_frame_at: self.now,
            });
        }

        let Some(active) = self.active_show.as_mut() else {
            return;
        };
        if self.now < active.next_frame_at {
            return;
        }

        if let Some(frame) = active.cursor.next() {
            for (channel, level) in frame.writes() {
                self.outputs.set_intensity(channel, level);
            }
            active.next_frame_at = SimInstant(self.now.0 + frame.hold);
        } else {
            let kind = active.kind;
            self.active_show = None;
            self.controller.restore_outputs();
            lines.push(format!(
                "+{}ms show {kind} finished",
                self.now.elapsed().as_millis()
            ));
        }
    }

    fn status(&self) -> Vec<String> {
        let mut lines = vec![
            format!(
                "now=+{}ms identity={}",
                self.now.elapsed().as_millis(),
                self.identity()
            ),
            format!("lights={}", format_levels(self.controller.levels())),
            format!("outputs={}", format_levels(self.outputs.levels())),
        ];

        lines.push(match self.controller.provisioning_progress() {
            Some(progress) => format!(
                "provisioning: ssid {}/{} password {}/{}",
                progress.ssid_received,
                progress.header.ssid_chunks,
                progress.password_received,
                progress.header.password_chunks
            ),
            None => "provisioning: idle".to_string(),
        });

        lines.push(match self.controller.live_credentials() {
            Some(credentials) => format!(
                "credentials: ssid={:?} password-len={} writes={}",
                credentials.ssid().unwrap_or("<non-utf8>"),
                credentials.password_bytes().len(),
                self.controller.store().writes()
            ),
            None => "credentials: not provisioned".to_string(),
        });

        let counters = self.controller.status_counters();
        lines.push(format!(
            "status: sent={} dropped={} update-windows={}",
            counters.sent,
            counters.dropped,
            self.controller.agent().windows
        ));

        if let Some(active) = &self.active_show {
            lines.push(format!("show: {} playing", active.kind));
        }
        lines
    }

    fn events(&self) -> Vec<String> {
        let telemetry = self.controller.telemetry();
        if telemetry.is_empty() {
            return vec!["events: none".to_string()];
        }
        telemetry
            .oldest_first()
            .map(|record| {
                format!(
                    "#{:<4} +{}ms {}",
                    record.id,
                    record.timestamp.elapsed().as_millis(),
                    record.event
                )
            })
            .collect()
    }

    fn record(&mut self, role: TranscriptRole, lines: &[String]) -> io::Result<()> {
        let elapsed = self.now.elapsed();
        if let Some(transcript) = self.transcript.as_mut() {
            for line in lines {
                transcript.append_line(elapsed, role, line)?;
            }
        }
        Ok(())
    }
}

fn describe(dispatch: &Dispatch<WriteRejected>) -> String {
    match dispatch {
        Dispatch::Lights(update) => format!("OK lights {update}"),
        Dispatch::LightsIgnored => "OK lights ignored".to_string(),
        Dispatch::Provisioning(ProvisioningUpdate::Started(header)) => format!(
            "OK provisioning started ssid={}B/{} password={}B/{}",
            header.ssid_len, header.ssid_chunks, header.password_len, header.password_chunks
        ),
        Dispatch::Provisioning(ProvisioningUpdate::ChunkAccepted { field, index }) => {
            format!("OK provisioning chunk {field}[{index}]")
        }
        Dispatch::Provisioning(ProvisioningUpdate::Committed(credentials))
        | Dispatch::Committed {
            credentials,
            persisted: Ok(()),
        } => format!(
            "OK credentials committed ssid={:?}",
            credentials.ssid().unwrap_or("<non-utf8>")
        ),
        Dispatch::Committed {
            credentials,
            persisted: Err(error),
        } => format!(
            "WARN credentials live but not persisted ssid={:?}: {error}",
            credentials.ssid().unwrap_or("<non-utf8>")
        ),
        Dispatch::ProvisioningRejected(error) => format!("ERR provisioning {error}"),
        Dispatch::UpdateWindow(outcome) => format!("OK update window closed: {outcome}"),
        Dispatch::TriggerMismatch => "OK update trigger ignored (other device)".to_string(),
        Dispatch::ShowTriggered(show) => format!("OK show {show} queued"),
        Dispatch::ShowRefused(show) => format!("ERR show {show} refused, queue full"),
        Dispatch::ShowUnknown(id) => format!("ERR unknown sequence {id}"),
        Dispatch::Dropped(reason) => format!("DROP {reason}"),
    }
}

fn help(topic: Option<&str>) -> Vec<String> {
    if let Some(topic) = topic {
        return match catalog::find(topic) {
            Some(spec) => vec![format!("{} - {}", spec.usage, spec.summary)],
            None => vec![
                format!("No help available for `{topic}`."),
                format!("Available topics: {}", topic_list()),
            ],
        };
    }

    let mut lines = vec!["Available commands:".to_string()];
    for spec in catalog::commands() {
        lines.push(format!("  {:<40} {}", spec.usage, spec.summary));
    }
    lines.push("Type `help <topic>` for a specific command.".to_string());
    lines
}

fn topic_list() -> String {
    catalog::commands()
        .iter()
        .map(|spec| spec.name)
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_levels(levels: [u8; CHANNEL_COUNT]) -> String {
    let rendered: Vec<String> = levels.iter().map(|level| format!("{level:>3}")).collect();
    format!("[{}]", rendered.join(" "))
}

struct TranscriptLogger {
    writer: BufWriter<std::fs::File>,
}

impl TranscriptLogger {
    fn new(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut logger = Self {
            writer: BufWriter::new(file),
        };
        logger.write_header()?;
        Ok(logger)
    }

    fn write_header(&mut self) -> io::Result<()> {
        writeln!(self.writer, "# Lighting controller emulator transcript")?;
        writeln!(
            self.writer,
            "# Timestamps are virtual milliseconds since session start"
        )?;
        writeln!(self.writer)?;
        self.writer.flush()
    }

    fn append_line(
        &mut self,
        elapsed: Duration,
        role: TranscriptRole,
        line: &str,
    ) -> io::Result<()> {
        writeln!(
            self.writer,
            "[+{:>6} ms] {} {}",
            elapsed.as_millis(),
            role.prefix(),
            line
        )?;
        self.writer.flush()
    }
}

#[derive(Copy, Clone)]
enum TranscriptRole {
    Host,
    Emulator,
}

impl TranscriptRole {
    fn prefix(self) -> &'static str {
        match self {
            TranscriptRole::Host => "HOST>",
            TranscriptRole::Emulator => "EMU <",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::new(None).expect("session without transcript")
    }

    fn run(session: &mut Session, line: &str) -> Vec<String> {
        session.handle_command(line).expect("in-memory session")
    }

    #[test]
    fn toggle_frame_reports_new_level() {
        let mut session = session();
        let lines = run(&mut session, "frame 24 2");
        assert!(lines[0].starts_with("OK lights ch3=255"), "{lines:?}");
        assert_eq!(session.controller.levels()[2], 255);
        assert_eq!(session.outputs.levels()[2], 255);
    }

    #[test]
    fn advance_publishes_status_on_cadence() {
        let mut session = session();
        let lines = run(&mut session, "advance 100ms");
        let summary = lines.last().expect("summary line");
        assert!(summary.contains("status-sent=4"), "{summary}");
        assert_eq!(session.controller.status_counters().sent, 4);
    }

    #[test]
    fn provision_commits_and_reports_without_password() {
        let mut session = session();
        let lines = run(&mut session, "provision \"garage\" \"s3cret-pass\"");
        assert!(lines.iter().any(|line| line.contains("committed")), "{lines:?}");

        let status = run(&mut session, "status");
        let credentials = status
            .iter()
            .find(|line| line.starts_with("credentials:"))
            .expect("credentials line");
        assert!(credentials.contains("garage"));
        assert!(!credentials.contains("s3cret-pass"));
    }

    #[test]
    fn partial_transfer_is_discarded_after_timeout() {
        let mut session = session();
        run(&mut session, "frame 1 1 4 4 1 1");
        let lines = run(&mut session, "advance 6s");
        assert!(
            lines.iter().any(|line| line.contains("provisioning discarded (timed-out)")),
            "{lines:?}"
        );
    }

    #[test]
    fn show_playback_restores_light_bank() {
        let mut session = session();
        run(&mut session, "frame 21 7 40");
        assert!(run(&mut session, "show interior")[0].starts_with("OK show"));

        let lines = run(&mut session, "advance 60s");
        assert!(lines.iter().any(|line| line.contains("show interior finished")));
        assert_eq!(session.outputs.levels(), session.controller.levels());
        assert_eq!(session.outputs.levels()[7], 40);
    }

    #[test]
    fn update_trigger_without_credentials_reports_not_provisioned() {
        let mut session = session();
        let [a, b, c] = EMULATOR_IDENTITY_SUFFIX;
        let lines = run(&mut session, &format!("frame 0 {a} {b} {c}"));
        assert!(lines[0].contains("not-provisioned"), "{lines:?}");

        let lines = run(&mut session, "frame 0 1 2 3");
        assert!(lines[0].contains("other device"), "{lines:?}");
    }

    #[test]
    fn syntax_errors_are_reported() {
        let mut session = session();
        let lines = run(&mut session, "frame");
        assert!(lines[0].starts_with("ERR syntax"), "{lines:?}");
    }
}
