//! Per-ASE state machine.
//!
//! `next_state` is a pure function: given the ASE's current state, the
//! opcode a control point write asked for, and the ASE's direction, it
//! returns the state that write would reach, or `None` if the transition
//! is not in the table at all.

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Direction {
    #[default]
    Sink = 0,
    Source = 1,
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum AseState {
    #[default]
    Idle = 0,
    CodecConfigured = 1,
    QosConfigured = 2,
    Enabling = 3,
    Streaming = 4,
    Disabling = 5,
    Releasing = 6,
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AseOpcode {
    ConfigCodec = 0x01,
    ConfigQos = 0x02,
    Enable = 0x03,
    ReceiverStartReady = 0x04,
    Disable = 0x05,
    ReceiverStopReady = 0x06,
    UpdateMetadata = 0x07,
    Release = 0x08,
    Released = 0x09,
}

impl AseOpcode {
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0x01 => Self::ConfigCodec,
            0x02 => Self::ConfigQos,
            0x03 => Self::Enable,
            0x04 => Self::ReceiverStartReady,
            0x05 => Self::Disable,
            0x06 => Self::ReceiverStopReady,
            0x07 => Self::UpdateMetadata,
            0x08 => Self::Release,
            0x09 => Self::Released,
            _ => return None,
        })
    }

    /// Opcodes that are only meaningful for a Source ASE; a Sink ASE
    /// receiving one of these is rejected with `INVALID_ASE_DIRECTION`
    /// before the state table is even consulted.
    pub fn is_source_only(self) -> bool {
        matches!(self, Self::ReceiverStartReady | Self::ReceiverStopReady)
    }
}

/// Looks up the table entry for `(state, opcode, direction)`.
///
/// `RELEASED` always checks against `Idle`: both `Idle` and
/// `CodecConfigured` are reachable from `Releasing` on `RELEASED`, but
/// which one is the application's call (the `caching` flag passed to the
/// `released` apply entry point), not something the control-point
/// validator decides. Reporting against `Idle` here matches the
/// transition actually being possible; the apply entry point computes the
/// caching-dependent target itself once it knows the transition exists.
pub fn next_state(state: AseState, opcode: AseOpcode, direction: Direction) -> Option<AseState> {
    use AseOpcode::*;
    use AseState::*;
    use Direction::*;

    match (state, opcode) {
        (Idle, ConfigCodec) => Some(CodecConfigured),

        (CodecConfigured, ConfigCodec) => Some(CodecConfigured),
        (CodecConfigured, ConfigQos) => Some(QosConfigured),
        (CodecConfigured, Release) => Some(Releasing),

        (QosConfigured, ConfigCodec) => Some(CodecConfigured),
        (QosConfigured, ConfigQos) => Some(QosConfigured),
        (QosConfigured, Enable) => Some(Enabling),
        (QosConfigured, Release) => Some(Releasing),

        (Enabling, UpdateMetadata) => Some(Enabling),
        (Enabling, ReceiverStartReady) => Some(Streaming),
        (Enabling, Release) => Some(Releasing),
        (Enabling, Disable) => Some(match direction {
            Source => Disabling,
            Sink => QosConfigured,
        }),

        (Streaming, UpdateMetadata) => Some(Streaming),
        (Streaming, Release) => Some(Releasing),
        (Streaming, Disable) => Some(match direction {
            Source => Disabling,
            Sink => QosConfigured,
        }),

        (Disabling, ReceiverStopReady) if direction == Source => Some(QosConfigured),
        (Disabling, Release) if direction == Source => Some(Releasing),

        (Releasing, Released) => Some(Idle),

        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_sink() {
        assert_eq!(
            next_state(AseState::Idle, AseOpcode::ConfigCodec, Direction::Sink),
            Some(AseState::CodecConfigured)
        );
        assert_eq!(
            next_state(
                AseState::CodecConfigured,
                AseOpcode::ConfigQos,
                Direction::Sink
            ),
            Some(AseState::QosConfigured)
        );
        assert_eq!(
            next_state(AseState::QosConfigured, AseOpcode::Enable, Direction::Sink),
            Some(AseState::Enabling)
        );
    }

    #[test]
    fn disable_splits_by_direction() {
        assert_eq!(
            next_state(AseState::Streaming, AseOpcode::Disable, Direction::Sink),
            Some(AseState::QosConfigured)
        );
        assert_eq!(
            next_state(AseState::Streaming, AseOpcode::Disable, Direction::Source),
            Some(AseState::Disabling)
        );
    }

    #[test]
    fn start_ready_only_from_enabling() {
        assert_eq!(
            next_state(
                AseState::Streaming,
                AseOpcode::ReceiverStopReady,
                Direction::Source
            ),
            None
        );
        assert_eq!(
            next_state(
                AseState::Disabling,
                AseOpcode::ReceiverStopReady,
                Direction::Source
            ),
            Some(AseState::QosConfigured)
        );
    }

    #[test]
    fn invalid_transition_rejects_cleanly() {
        assert_eq!(
            next_state(AseState::Idle, AseOpcode::ConfigQos, Direction::Sink),
            None
        );
    }

    #[test]
    fn releasing_reports_against_idle() {
        assert_eq!(
            next_state(AseState::Releasing, AseOpcode::Released, Direction::Sink),
            Some(AseState::Idle)
        );
    }
}
