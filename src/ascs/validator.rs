//! Request validator (C4): parses an ACP write, length-checks it as a
//! whole, validates each sub-request's semantics, builds the response
//! vector, and (after the response is scheduled) raises upcalls for the
//! accepted sub-requests.
//!
//! The original source parses the write buffer twice — once to build the
//! response, once more to raise upcalls — specifically so the response
//! is scheduled before any upcall can synchronously trigger a value
//! notification. This implementation keeps that same two-stage shape:
//! a single forward walk measures and semantically validates every
//! sub-request into a local buffer (nothing is committed to the
//! connection until the whole walk succeeds, so a single oversized
//! sub-request still collapses the *entire* response to the
//! invalid-length form), and only after the response is armed does a
//! second loop over that buffer raise upcalls.

use super::codec::{
    CodecConfiguration, CodecId, Framing, Metadata, QosConfiguration, SpecificCodecConfiguration,
    CODING_FORMAT_LC3, CODING_FORMAT_VENDOR,
};
use super::connection::{Connection, ResponseEntry, CCCD_NOTIFICATION_ENABLED, RESPONSE_COUNT_MALFORMED};
use super::event::AscsUpcall;
use super::registry::AseRegistry;
use super::state::{self, AseOpcode, Direction};
use super::transport::ConnectionHandle;
use heapless::Vec;

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ResponseCode {
    Success = 0,
    UnsupportedOpcode = 1,
    InvalidLength = 2,
    InvalidAseId = 3,
    InsufficientResources = 4,
    InvalidAseStateMachineTransition = 5,
    InvalidAseDirection = 6,
    InvalidConfigurationParameterValue = 7,
    RejectedConfigurationParameterValue = 8,
    InvalidMetadata = 9,
    RejectedMetadata = 10,
    InsufficientMetadata = 11,
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ReasonCode {
    Unspecified = 0,
    CodecId = 1,
    CodecSpecificConfiguration = 2,
    SduInterval = 3,
    Framing = 4,
    Phy = 5,
    MaximumSduSize = 6,
    MaxTransportLatency = 7,
    PresentationDelay = 8,
    InvalidAseCisMapping = 9,
}

const PHY_CODED_MASK: u8 = 0x07;

enum ParsedPayload {
    CodecConfig {
        target_latency: u8,
        target_phy: u8,
        codec_id: CodecId,
        specific_configuration: SpecificCodecConfiguration,
    },
    Qos(QosConfiguration),
    Enable(Metadata),
    StartReady,
    Disable,
    StopReady,
    UpdateMetadata(Metadata),
    Release,
    Released,
    Unsupported,
}

struct ParsedEntry {
    ase_id: u8,
    code: ResponseCode,
    reason: ReasonCode,
    payload: ParsedPayload,
}

/// Arms `SEND_ACP_RESPONSE`, unless the peer has never enabled ACP
/// notifications — per spec.md §4.7/§4.9, an armed-but-CCCD-disabled
/// response is a silent no-op rather than a stuck scheduler bit, since
/// the peer gains nothing by being told and there is no one to tell.
fn arm_acp_response<const N: usize>(conn: &mut Connection<N>) {
    if conn.acp_cccd_value & CCCD_NOTIFICATION_ENABLED != 0 {
        super::scheduler::arm(&mut conn.scheduled_tasks, super::scheduler::ScheduledTasks::SEND_ACP_RESPONSE);
    }
}

/// Collapses the whole response to the invalid-length sentinel form.
fn mark_malformed<const N: usize>(conn: &mut Connection<N>, opcode_byte: u8) {
    conn.response_opcode = opcode_byte;
    conn.response_count = RESPONSE_COUNT_MALFORMED;
    conn.response.clear();
    arm_acp_response(conn);
}

fn u16_le(b: &[u8]) -> u16 {
    u16::from_le_bytes([b[0], b[1]])
}

fn u24_le(b: &[u8]) -> u32 {
    u32::from_le_bytes([b[0], b[1], b[2], 0])
}

/// Measures and semantically validates a single sub-request starting at
/// `body[0]`. Returns `(entry, consumed_bytes)`, or `None` if the
/// sub-request cannot even be measured (buffer underrun) — which the
/// caller treats as a whole-buffer framing failure.
fn parse_one<const N: usize>(
    opcode: Option<AseOpcode>,
    body: &[u8],
    registry: &AseRegistry<N>,
    conn: &Connection<N>,
    accepted_qos_this_write: &Vec<(Direction, u8, u8), N>,
) -> Option<(ParsedEntry, usize)> {
    let Some(opcode) = opcode else {
        if body.is_empty() {
            return None;
        }
        return Some((
            ParsedEntry {
                ase_id: body[0],
                code: ResponseCode::UnsupportedOpcode,
                reason: ReasonCode::Unspecified,
                payload: ParsedPayload::Unsupported,
            },
            1,
        ));
    };

    match opcode {
        AseOpcode::ConfigCodec => {
            if body.len() < 9 {
                return None;
            }
            let ase_id = body[0];
            let target_latency = body[1];
            let target_phy = body[2];
            let coding_format = body[3];
            let company_id = u16_le(&body[4..6]);
            let vendor_codec_id = u16_le(&body[6..8]);
            let cfg_len = body[8] as usize;
            if body.len() < 9 + cfg_len {
                return None;
            }
            let consumed = 9 + cfg_len;
            let codec_id = CodecId { coding_format, company_id, vendor_codec_id };

            let (code, reason) = validate_config_codec_fields(target_latency, target_phy, codec_id);
            let (code, reason, specific_configuration) = if code == ResponseCode::Success {
                match SpecificCodecConfiguration::parse(&body[9..9 + cfg_len]) {
                    Ok(cfg) => match validate_specific_codec_configuration(&cfg) {
                        Some((c, r)) => (c, r, cfg),
                        None => (ResponseCode::Success, ReasonCode::Unspecified, cfg),
                    },
                    Err(()) => (
                        ResponseCode::InvalidConfigurationParameterValue,
                        ReasonCode::CodecSpecificConfiguration,
                        SpecificCodecConfiguration::default(),
                    ),
                }
            } else {
                (code, reason, SpecificCodecConfiguration::default())
            };

            let (code, reason) = resolve_ase_and_transition(
                registry,
                conn,
                ase_id,
                AseOpcode::ConfigCodec,
                code,
                reason,
            );

            Some((
                ParsedEntry {
                    ase_id,
                    code,
                    reason,
                    payload: ParsedPayload::CodecConfig {
                        target_latency,
                        target_phy,
                        codec_id,
                        specific_configuration,
                    },
                },
                consumed,
            ))
        }

        AseOpcode::ConfigQos => {
            if body.len() < 16 {
                return None;
            }
            let ase_id = body[0];
            let cig_id = body[1];
            let cis_id = body[2];
            let sdu_interval = u24_le(&body[3..6]);
            let framing_raw = body[6];
            let phy = body[7];
            let max_sdu = u16_le(&body[8..10]);
            let retransmission_number = body[10];
            let max_transport_latency_ms = u16_le(&body[11..13]);
            let presentation_delay_us = u24_le(&body[13..16]);
            let consumed = 16;

            let direction = registry.get(ase_id).map(|a| a.direction);
            let idx = registry.index_of(ase_id);

            let (mut code, mut reason) = (ResponseCode::Success, ReasonCode::Unspecified);

            if let (Some(direction), Some(idx)) = (direction, idx) {
                let already_collides = conn
                    .ases
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i != idx)
                    .any(|(i, ase)| {
                        registry.iter().nth(i).map(|a| a.direction) == Some(direction)
                            && ase.qos_cfg.as_ref().map(|q| (q.cig_id, q.cis_id)) == Some((cig_id, cis_id))
                    })
                    || accepted_qos_this_write
                        .iter()
                        .any(|(d, c, s)| *d == direction && *c == cig_id && *s == cis_id);

                if already_collides {
                    code = ResponseCode::InvalidConfigurationParameterValue;
                    reason = ReasonCode::InvalidAseCisMapping;
                } else if !(0x0000FF..=0x0FFFFF).contains(&sdu_interval) {
                    code = ResponseCode::InvalidConfigurationParameterValue;
                    reason = ReasonCode::SduInterval;
                } else if Framing::from_u8(framing_raw).is_none()
                    || conn.ases[idx]
                        .codec_cfg
                        .as_ref()
                        .map(|c| c.framing as u8 != framing_raw)
                        .unwrap_or(false)
                {
                    code = ResponseCode::InvalidConfigurationParameterValue;
                    reason = ReasonCode::Framing;
                } else if phy > PHY_CODED_MASK {
                    code = ResponseCode::InvalidConfigurationParameterValue;
                    reason = ReasonCode::Phy;
                } else if max_sdu > 0x0FFF {
                    code = ResponseCode::InvalidConfigurationParameterValue;
                    reason = ReasonCode::MaximumSduSize;
                } else if conn.ases[idx]
                    .codec_cfg
                    .as_ref()
                    .map(|c| max_transport_latency_ms > c.max_transport_latency_ms)
                    .unwrap_or(false)
                {
                    code = ResponseCode::InvalidConfigurationParameterValue;
                    reason = ReasonCode::MaxTransportLatency;
                } else if let Some(c) = conn.ases[idx].codec_cfg.as_ref() {
                    if presentation_delay_us < c.presentation_delay_min_us
                        || presentation_delay_us > c.presentation_delay_max_us
                    {
                        code = ResponseCode::InvalidConfigurationParameterValue;
                        reason = ReasonCode::PresentationDelay;
                    }
                }
            }

            let (code, reason) =
                resolve_ase_and_transition(registry, conn, ase_id, AseOpcode::ConfigQos, code, reason);

            let qos = QosConfiguration {
                cig_id,
                cis_id,
                sdu_interval,
                framing: Framing::from_u8(framing_raw).unwrap_or_default(),
                phy,
                max_sdu,
                retransmission_number,
                max_transport_latency_ms,
                presentation_delay_us,
            };

            Some((
                ParsedEntry { ase_id, code, reason, payload: ParsedPayload::Qos(qos) },
                consumed,
            ))
        }

        AseOpcode::Enable | AseOpcode::UpdateMetadata => {
            if body.len() < 2 {
                return None;
            }
            let ase_id = body[0];
            let meta_len = body[1] as usize;
            if body.len() < 2 + meta_len {
                return None;
            }
            let consumed = 2 + meta_len;

            let metadata = Metadata::parse(&body[2..2 + meta_len]).unwrap_or_default();
            let (code, reason) = validate_metadata(&metadata);

            let (code, reason) =
                resolve_ase_and_transition(registry, conn, ase_id, opcode, code, reason);

            let payload = if opcode == AseOpcode::Enable {
                ParsedPayload::Enable(metadata)
            } else {
                ParsedPayload::UpdateMetadata(metadata)
            };

            Some((ParsedEntry { ase_id, code, reason, payload }, consumed))
        }

        AseOpcode::ReceiverStartReady | AseOpcode::ReceiverStopReady => {
            if body.is_empty() {
                return None;
            }
            let ase_id = body[0];
            let direction = registry.get(ase_id).map(|a| a.direction);

            let (code, reason) = match direction {
                None => (ResponseCode::InvalidAseId, ReasonCode::Unspecified),
                Some(Direction::Sink) => (ResponseCode::InvalidAseDirection, ReasonCode::Unspecified),
                Some(Direction::Source) => {
                    let idx = registry.index_of(ase_id).unwrap();
                    match state::next_state(conn.ases[idx].state, opcode, Direction::Source) {
                        Some(_) => (ResponseCode::Success, ReasonCode::Unspecified),
                        None => (
                            ResponseCode::InvalidAseStateMachineTransition,
                            ReasonCode::Unspecified,
                        ),
                    }
                }
            };

            let payload = if opcode == AseOpcode::ReceiverStartReady {
                ParsedPayload::StartReady
            } else {
                ParsedPayload::StopReady
            };

            Some((ParsedEntry { ase_id, code, reason, payload }, 1))
        }

        AseOpcode::Disable | AseOpcode::Release | AseOpcode::Released => {
            if body.is_empty() {
                return None;
            }
            let ase_id = body[0];
            let (code, reason) =
                resolve_ase_and_transition(registry, conn, ase_id, opcode, ResponseCode::Success, ReasonCode::Unspecified);

            let payload = match opcode {
                AseOpcode::Disable => ParsedPayload::Disable,
                AseOpcode::Release => ParsedPayload::Release,
                _ => ParsedPayload::Released,
            };

            Some((ParsedEntry { ase_id, code, reason, payload }, 1))
        }
    }
}

fn resolve_ase_and_transition<const N: usize>(
    registry: &AseRegistry<N>,
    conn: &Connection<N>,
    ase_id: u8,
    opcode: AseOpcode,
    code: ResponseCode,
    reason: ReasonCode,
) -> (ResponseCode, ReasonCode) {
    let Some(characteristic) = registry.get(ase_id) else {
        return (ResponseCode::InvalidAseId, ReasonCode::Unspecified);
    };
    let idx = registry.index_of(ase_id).unwrap();
    match state::next_state(conn.ases[idx].state, opcode, characteristic.direction) {
        None => (ResponseCode::InvalidAseStateMachineTransition, ReasonCode::Unspecified),
        Some(_) if code != ResponseCode::Success => (code, reason),
        Some(_) => (ResponseCode::Success, ReasonCode::Unspecified),
    }
}

fn validate_config_codec_fields(
    target_latency: u8,
    target_phy: u8,
    codec_id: CodecId,
) -> (ResponseCode, ReasonCode) {
    if !(1..=3).contains(&target_latency) {
        // No reason sub-code is named for target_latency; the original
        // reuses ASCS_REJECT_REASON_MAX_TRANSPORT_LATENCY for it.
        return (ResponseCode::InvalidConfigurationParameterValue, ReasonCode::MaxTransportLatency);
    }
    if !(1..=3).contains(&target_phy) {
        return (ResponseCode::InvalidConfigurationParameterValue, ReasonCode::Phy);
    }
    if codec_id.coding_format == CODING_FORMAT_VENDOR {
        return (ResponseCode::Success, ReasonCode::Unspecified);
    }
    if codec_id.coding_format == CODING_FORMAT_LC3 {
        return if codec_id.company_id == 0 && codec_id.vendor_codec_id == 0 {
            (ResponseCode::Success, ReasonCode::Unspecified)
        } else {
            (ResponseCode::InvalidConfigurationParameterValue, ReasonCode::CodecId)
        };
    }
    (
        ResponseCode::RejectedConfigurationParameterValue,
        ReasonCode::CodecSpecificConfiguration,
    )
}

fn validate_specific_codec_configuration(
    cfg: &SpecificCodecConfiguration,
) -> Option<(ResponseCode, ReasonCode)> {
    if let Some(v) = cfg.sampling_frequency {
        if v > 12 {
            return Some((
                ResponseCode::InvalidConfigurationParameterValue,
                ReasonCode::CodecSpecificConfiguration,
            ));
        }
    }
    if let Some(v) = cfg.frame_duration {
        if v > 1 {
            return Some((
                ResponseCode::InvalidConfigurationParameterValue,
                ReasonCode::CodecSpecificConfiguration,
            ));
        }
    }
    if let Some(v) = cfg.audio_channel_allocation {
        if v >= (1 << 28) {
            return Some((
                ResponseCode::InvalidConfigurationParameterValue,
                ReasonCode::CodecSpecificConfiguration,
            ));
        }
    }
    None
}

fn validate_metadata(metadata: &Metadata) -> (ResponseCode, ReasonCode) {
    if metadata.has_rfu_type() {
        return (ResponseCode::RejectedMetadata, ReasonCode::Unspecified);
    }
    if let Some(v) = metadata.preferred_audio_contexts {
        if v >= 0x0200 {
            return (ResponseCode::InvalidMetadata, ReasonCode::Unspecified);
        }
    }
    if let Some(v) = metadata.streaming_audio_contexts {
        if v >= 0x0200 {
            return (ResponseCode::InvalidMetadata, ReasonCode::Unspecified);
        }
    }
    if let Some(v) = metadata.parental_rating {
        if v > 9 {
            return (ResponseCode::InvalidMetadata, ReasonCode::Unspecified);
        }
    }
    (ResponseCode::Success, ReasonCode::Unspecified)
}

fn payload_to_upcall(
    con_handle: ConnectionHandle,
    entry: &ParsedEntry,
) -> Option<AscsUpcall> {
    let ase_id = entry.ase_id;
    Some(match &entry.payload {
        ParsedPayload::CodecConfig { target_latency, target_phy, codec_id, specific_configuration } => {
            AscsUpcall::CodecConfigurationRequest {
                con_handle,
                ase_id,
                request: super::codec::ClientCodecConfigurationRequest {
                    target_latency: *target_latency,
                    target_phy: *target_phy,
                    codec_id: *codec_id,
                    specific_configuration: *specific_configuration,
                },
            }
        }
        ParsedPayload::Qos(qos) => AscsUpcall::QosConfigurationRequest { con_handle, ase_id, request: *qos },
        ParsedPayload::Enable(metadata) => {
            AscsUpcall::EnableRequest { con_handle, ase_id, metadata: metadata.clone() }
        }
        ParsedPayload::UpdateMetadata(metadata) => {
            AscsUpcall::MetadataUpdateRequest { con_handle, ase_id, metadata: metadata.clone() }
        }
        ParsedPayload::StartReady => AscsUpcall::StartReady { con_handle, ase_id },
        ParsedPayload::Disable => AscsUpcall::Disable { con_handle, ase_id },
        ParsedPayload::StopReady => AscsUpcall::StopReady { con_handle, ase_id },
        ParsedPayload::Release => AscsUpcall::Release { con_handle, ase_id },
        ParsedPayload::Released => AscsUpcall::Released { con_handle, ase_id },
        ParsedPayload::Unsupported => return None,
    })
}

/// Processes one ACP write. Mutates `conn`'s response buffer and
/// scheduled-task bitmap, and returns the upcalls to raise for
/// successfully-validated sub-requests — always computed *after* the
/// response has already been armed.
pub fn process_acp_write<const N: usize>(
    registry: &AseRegistry<N>,
    conn: &mut Connection<N>,
    con_handle: ConnectionHandle,
    data: &[u8],
) -> Vec<AscsUpcall, N> {
    let mut upcalls = Vec::new();

    if data.len() < 2 {
        mark_malformed(conn, data.first().copied().unwrap_or(0));
        return upcalls;
    }

    let opcode_byte = data[0];
    let n = data[1];
    if n == 0 || n as usize > N {
        mark_malformed(conn, opcode_byte);
        return upcalls;
    }

    let opcode = AseOpcode::from_u8(opcode_byte);
    let mut body = &data[2..];
    let mut parsed: Vec<ParsedEntry, N> = Vec::new();
    let mut accepted_qos: Vec<(Direction, u8, u8), N> = Vec::new();

    for _ in 0..n {
        let Some((entry, consumed)) = parse_one(opcode, body, registry, conn, &accepted_qos) else {
            mark_malformed(conn, opcode_byte);
            return upcalls;
        };
        if let ParsedPayload::Qos(qos) = &entry.payload {
            if entry.code == ResponseCode::Success {
                if let Some(direction) = registry.get(entry.ase_id).map(|a| a.direction) {
                    let _ = accepted_qos.push((direction, qos.cig_id, qos.cis_id));
                }
            }
        }
        body = &body[consumed..];
        let _ = parsed.push(entry);
    }

    if !body.is_empty() {
        mark_malformed(conn, opcode_byte);
        return upcalls;
    }

    conn.response_opcode = opcode_byte;
    conn.response_count = parsed.len() as u8;
    conn.response.clear();
    for entry in parsed.iter() {
        let _ = conn.response.push(ResponseEntry {
            ase_id: entry.ase_id,
            code: entry.code as u8,
            reason: entry.reason as u8,
        });
    }
    arm_acp_response(conn);

    // Pass C: the response is armed above; only now do we raise upcalls.
    for entry in parsed.iter() {
        if entry.code != ResponseCode::Success {
            continue;
        }
        if let Some(idx) = registry.index_of(entry.ase_id) {
            conn.ases[idx].change_initiated_by_client = true;
        }
        if let Some(upcall) = payload_to_upcall(con_handle, entry) {
            let _ = upcalls.push(upcall);
        }
    }

    upcalls
}

/// Serializes the pending ACP response: `opcode:u8, n:u8,
/// (ase_id,code,reason){n}`, or `opcode:u8, 0xFF` on the invalid-length
/// path. Used by the scheduler (C7) when draining `SEND_ACP_RESPONSE`.
pub fn serialize_acp_response<const N: usize>(conn: &Connection<N>, buf: &mut Vec<u8, 256>) {
    let _ = buf.push(conn.response_opcode);
    let _ = buf.push(conn.response_count);
    if conn.response_count == RESPONSE_COUNT_MALFORMED {
        return;
    }
    for entry in conn.response.iter() {
        let _ = buf.push(entry.ase_id);
        let _ = buf.push(entry.code);
        let _ = buf.push(entry.reason);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ascs::connection::ConnectionTable;
    use crate::ascs::state::AseState;

    fn registry_one_sink() -> AseRegistry<4> {
        AseRegistry::build(&[Direction::Sink]).unwrap()
    }

    #[test]
    fn seed_1_happy_codec_config() {
        let registry = registry_one_sink();
        let mut table: ConnectionTable<1, 4> = ConnectionTable::new(registry.len());
        let handle = ConnectionHandle::new(1);
        table.on_connected(handle).unwrap();
        let conn = table.get_mut(handle).unwrap();

        // opcode=CONFIG_CODEC, n=1, ase=1, latency=3, phy=2, format=LC3(0x06),
        // company_id=0, vendor_codec_id=0, codec_cfg_len=0.
        let write = [0x01, 0x01, 0x01, 0x03, 0x02, 0x06, 0x00, 0x00, 0x00, 0x00, 0x00];
        let upcalls = process_acp_write(&registry, conn, handle, &write);

        assert_eq!(conn.response_opcode, 0x01);
        assert_eq!(conn.response_count, 1);
        assert_eq!(conn.response[0].ase_id, 1);
        assert_eq!(conn.response[0].code, ResponseCode::Success as u8);
        assert_eq!(conn.response[0].reason, 0);
        assert_eq!(upcalls.len(), 1);
        assert!(matches!(upcalls[0], AscsUpcall::CodecConfigurationRequest { ase_id: 1, .. }));
    }

    #[test]
    fn seed_2_invalid_state_transition() {
        let registry = registry_one_sink();
        let mut table: ConnectionTable<1, 4> = ConnectionTable::new(registry.len());
        let handle = ConnectionHandle::new(1);
        table.on_connected(handle).unwrap();
        let conn = table.get_mut(handle).unwrap();

        // opcode=CONFIG_QOS while ase=1 is still Idle.
        let write = [
            0x02, 0x01, 0x01, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
        ];
        let upcalls = process_acp_write(&registry, conn, handle, &write);

        assert_eq!(conn.response_opcode, 0x02);
        assert_eq!(conn.response_count, 1);
        assert_eq!(conn.response[0].ase_id, 1);
        assert_eq!(conn.response[0].code, ResponseCode::InvalidAseStateMachineTransition as u8);
        assert_eq!(conn.response[0].code, 5);
        assert_eq!(conn.response[0].reason, 0);
        assert!(upcalls.is_empty());
    }

    #[test]
    fn seed_3_invalid_length_collapses_to_0xff() {
        let registry = registry_one_sink();
        let mut table: ConnectionTable<1, 4> = ConnectionTable::new(registry.len());
        let handle = ConnectionHandle::new(1);
        table.on_connected(handle).unwrap();
        let conn = table.get_mut(handle).unwrap();

        // CONFIG_CODEC, n=1, truncated mid codec-id (only 5 bytes of body).
        let write = [0x01, 0x01, 0x01, 0x03, 0x02];
        let upcalls = process_acp_write(&registry, conn, handle, &write);

        assert_eq!(conn.response_opcode, 0x01);
        assert_eq!(conn.response_count, RESPONSE_COUNT_MALFORMED);
        assert!(conn.response.is_empty());
        assert!(upcalls.is_empty());
    }

    #[test]
    fn seed_4_cis_mapping_collision() {
        let registry: AseRegistry<4> = AseRegistry::build(&[Direction::Sink, Direction::Sink]).unwrap();
        let mut table: ConnectionTable<1, 4> = ConnectionTable::new(registry.len());
        let handle = ConnectionHandle::new(1);
        table.on_connected(handle).unwrap();
        let conn = table.get_mut(handle).unwrap();
        conn.ases[0].state = AseState::CodecConfigured;
        conn.ases[1].state = AseState::CodecConfigured;

        // opcode=CONFIG_QOS, n=2: ase=1 and ase=2, both cig_id=1 cis_id=1.
        let mut write = std::vec![0x02u8, 0x02];
        let sub = |ase_id: u8| -> std::vec::Vec<u8> {
            std::vec![ase_id, 1, 1, 0xFF, 0x00, 0x00, 0, 2, 0x64, 0x00, 5, 10, 0, 0x40, 0x9C, 0x00]
        };
        write.extend(sub(1));
        write.extend(sub(2));

        let upcalls = process_acp_write(&registry, conn, handle, &write);
        assert_eq!(conn.response_count, 2);
        assert_eq!(conn.response[0].code, ResponseCode::Success as u8);
        assert_eq!(conn.response[1].code, ResponseCode::InvalidConfigurationParameterValue as u8);
        assert_eq!(conn.response[1].reason, ReasonCode::InvalidAseCisMapping as u8);
        assert_eq!(upcalls.len(), 1);
    }

    #[test]
    fn response_is_built_but_not_armed_without_acp_cccd() {
        let registry = registry_one_sink();
        let mut table: ConnectionTable<1, 4> = ConnectionTable::new(registry.len());
        let handle = ConnectionHandle::new(1);
        table.on_connected(handle).unwrap();
        let conn = table.get_mut(handle).unwrap();

        let write = [0x01, 0x01, 0x01, 0x03, 0x02, 0x06, 0x00, 0x00, 0x00, 0x00, 0x00];
        process_acp_write(&registry, conn, handle, &write);

        assert_eq!(conn.response_count, 1);
        assert!(conn.scheduled_tasks.is_empty());
    }
}
