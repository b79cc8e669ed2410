//! Console command table shared by the parser and the help printer.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandTag {
    Frame,
    Remote,
    Advance,
    Provision,
    Show,
    Status,
    Events,
    Help,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CommandSpec {
    pub name: &'static str,
    pub tag: CommandTag,
    pub usage: &'static str,
    pub summary: &'static str,
}

const COMMANDS: [CommandSpec; 8] = [
    CommandSpec {
        name: "frame",
        tag: CommandTag::Frame,
        usage: "frame <id> [byte ...]",
        summary: "inject a data frame (decimal or 0x-prefixed values, up to 8 bytes)",
    },
    CommandSpec {
        name: "remote",
        tag: CommandTag::Remote,
        usage: "remote <id>",
        summary: "inject a remote-request frame",
    },
    CommandSpec {
        name: "advance",
        tag: CommandTag::Advance,
        usage: "advance <duration>",
        summary: "advance virtual time (e.g. 33ms, 6s), running sweeps and status frames",
    },
    CommandSpec {
        name: "provision",
        tag: CommandTag::Provision,
        usage: "provision \"<ssid>\" \"<password>\"",
        summary: "inject a complete provisioning exchange",
    },
    CommandSpec {
        name: "show",
        tag: CommandTag::Show,
        usage: "show <interior|exterior|startup|melody>",
        summary: "play a show on the outputs",
    },
    CommandSpec {
        name: "status",
        tag: CommandTag::Status,
        usage: "status",
        summary: "print channel levels, provisioning progress and credentials",
    },
    CommandSpec {
        name: "events",
        tag: CommandTag::Events,
        usage: "events",
        summary: "print the telemetry ring, oldest first",
    },
    CommandSpec {
        name: "help",
        tag: CommandTag::Help,
        usage: "help [command]",
        summary: "list commands or describe one",
    },
];

/// Returns the full command catalog.
#[must_use]
pub const fn commands() -> &'static [CommandSpec] {
    &COMMANDS
}

/// Finds a command by name (case insensitive).
#[must_use]
pub fn find(name: &str) -> Option<&'static CommandSpec> {
    COMMANDS
        .iter()
        .find(|command| command.name.eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_ignores_case() {
        assert_eq!(find("ADVANCE").map(|spec| spec.tag), Some(CommandTag::Advance));
        assert!(find("reboot").is_none());
    }

    #[test]
    fn every_usage_starts_with_its_name() {
        for spec in commands() {
            assert!(spec.usage.starts_with(spec.name), "{}", spec.name);
        }
    }
}
