//! Wire token vocabulary.
//!
//! Messages are short plain-ASCII tokens; the radio chip's packet CRC is
//! the only integrity layer. Every command has exactly one positive
//! acknowledgement family and there is no negative acknowledgement —
//! silence until the timeout *is* the failure signal.

/// A token of the fixed command/acknowledgement vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkMessage {
    /// Command: energise the relay.
    RelayOn,
    /// Command: de-energise the relay.
    RelayOff,
    /// Command: report the live relay state.
    GetStatus,
    /// Acknowledgement for [`RelayOn`](Self::RelayOn).
    AckOn,
    /// Acknowledgement for [`RelayOff`](Self::RelayOff).
    AckOff,
    /// Status reply: relay is energised.
    StatusOn,
    /// Status reply: relay is de-energised.
    StatusOff,
}

impl LinkMessage {
    /// The exact ASCII wire form of this token.
    pub const fn wire(self) -> &'static [u8] {
        match self {
            Self::RelayOn => b"RELAY_ON",
            Self::RelayOff => b"RELAY_OFF",
            Self::GetStatus => b"GET_STATUS",
            Self::AckOn => b"ACK_ON",
            Self::AckOff => b"ACK_OFF",
            Self::StatusOn => b"STATUS_ON",
            Self::StatusOff => b"STATUS_OFF",
        }
    }

    /// Human-readable token (same bytes as the wire form).
    pub const fn token(self) -> &'static str {
        match self {
            Self::RelayOn => "RELAY_ON",
            Self::RelayOff => "RELAY_OFF",
            Self::GetStatus => "GET_STATUS",
            Self::AckOn => "ACK_ON",
            Self::AckOff => "ACK_OFF",
            Self::StatusOn => "STATUS_ON",
            Self::StatusOff => "STATUS_OFF",
        }
    }

    /// Parse a received frame. Exact match only — anything else is
    /// unrecognized and must be dropped by the caller.
    pub fn parse(frame: &[u8]) -> Option<Self> {
        match frame {
            b"RELAY_ON" => Some(Self::RelayOn),
            b"RELAY_OFF" => Some(Self::RelayOff),
            b"GET_STATUS" => Some(Self::GetStatus),
            b"ACK_ON" => Some(Self::AckOn),
            b"ACK_OFF" => Some(Self::AckOff),
            b"STATUS_ON" => Some(Self::StatusOn),
            b"STATUS_OFF" => Some(Self::StatusOff),
            _ => None,
        }
    }

    /// True for the three command tokens.
    pub const fn is_command(self) -> bool {
        matches!(self, Self::RelayOn | Self::RelayOff | Self::GetStatus)
    }

    /// Whether this token acknowledges `cmd`.
    pub const fn acknowledges(self, cmd: Command) -> bool {
        matches!(
            (cmd, self),
            (Command::RelayOn, Self::AckOn)
                | (Command::RelayOff, Self::AckOff)
                | (Command::GetStatus, Self::StatusOn | Self::StatusOff)
        )
    }

    /// For acknowledgement/status tokens, the relay state they assert.
    pub const fn relay_level(self) -> Option<bool> {
        match self {
            Self::AckOn | Self::StatusOn => Some(true),
            Self::AckOff | Self::StatusOff => Some(false),
            _ => None,
        }
    }
}

/// The commands a transmitter may issue. A separate type so the protocol
/// engine's precondition ("cmd is a command token") holds by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    RelayOn,
    RelayOff,
    GetStatus,
}

impl Command {
    /// The wire token for this command.
    pub const fn message(self) -> LinkMessage {
        match self {
            Self::RelayOn => LinkMessage::RelayOn,
            Self::RelayOff => LinkMessage::RelayOff,
            Self::GetStatus => LinkMessage::GetStatus,
        }
    }

    /// The relay state this command requests, if it requests one.
    pub const fn requested_state(self) -> Option<bool> {
        match self {
            Self::RelayOn => Some(true),
            Self::RelayOff => Some(false),
            Self::GetStatus => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [LinkMessage; 7] = [
        LinkMessage::RelayOn,
        LinkMessage::RelayOff,
        LinkMessage::GetStatus,
        LinkMessage::AckOn,
        LinkMessage::AckOff,
        LinkMessage::StatusOn,
        LinkMessage::StatusOff,
    ];

    #[test]
    fn wire_roundtrip_for_every_token() {
        for msg in ALL {
            assert_eq!(LinkMessage::parse(msg.wire()), Some(msg));
        }
    }

    #[test]
    fn garbage_is_unrecognized() {
        assert_eq!(LinkMessage::parse(b""), None);
        assert_eq!(LinkMessage::parse(b"RELAY_ON "), None);
        assert_eq!(LinkMessage::parse(b"relay_on"), None);
        assert_eq!(LinkMessage::parse(b"ACK"), None);
        assert_eq!(LinkMessage::parse(&[0xFF, 0x00, 0x13]), None);
    }

    #[test]
    fn every_command_has_exactly_one_ack_family() {
        for cmd in [Command::RelayOn, Command::RelayOff, Command::GetStatus] {
            let acks = ALL.iter().filter(|m| m.acknowledges(cmd)).count();
            let expected = if cmd == Command::GetStatus { 2 } else { 1 };
            assert_eq!(acks, expected, "{cmd:?}");
        }
    }

    #[test]
    fn commands_never_acknowledge_anything() {
        for cmd in [Command::RelayOn, Command::RelayOff, Command::GetStatus] {
            assert!(!cmd.message().acknowledges(cmd));
        }
    }
}
