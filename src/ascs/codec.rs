//! Codec, QoS and metadata configuration types, and the ASE value
//! serializer (C6).
//!
//! Wire layouts here are resolved from the original btstack
//! implementation's fixed-size sub-request parsing, since the spec only
//! names fields and overall lengths.

use heapless::Vec;

pub const METADATA_MAX_LEN: usize = 64;
pub const CODEC_CFG_MAX_LEN: usize = 64;

/// A codec-specific-configuration or metadata TLV entry: `length` (which
/// includes the type byte), `type`, `value[length - 1]`.
fn for_each_tlv<'a>(mut bytes: &'a [u8], mut f: impl FnMut(u8, &'a [u8]) -> Result<(), ()>) -> Result<(), ()> {
    while !bytes.is_empty() {
        let len = bytes[0] as usize;
        if len == 0 || bytes.len() < 1 + len {
            return Err(());
        }
        let typ = bytes[1];
        let value = &bytes[2..1 + len];
        f(typ, value)?;
        bytes = &bytes[1 + len..];
    }
    Ok(())
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Framing {
    #[default]
    Unframed = 0,
    Framed = 1,
}

impl Framing {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Unframed),
            1 => Some(Self::Framed),
            _ => None,
        }
    }
}

/// `coding_format` / `company_id` / `vendor_codec_id` triple that
/// identifies a codec. `0x06` is LC3; `0xFF` means vendor-specific, in
/// which case `company_id`/`vendor_codec_id` carry the real identity.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CodecId {
    pub coding_format: u8,
    pub company_id: u16,
    pub vendor_codec_id: u16,
}

pub const CODING_FORMAT_LC3: u8 = 0x06;
pub const CODING_FORMAT_VENDOR: u8 = 0xFF;

impl CodecId {
    pub fn is_lc3(&self) -> bool {
        self.coding_format == CODING_FORMAT_LC3 && self.company_id == 0 && self.vendor_codec_id == 0
    }

    pub fn is_vendor(&self) -> bool {
        self.coding_format == CODING_FORMAT_VENDOR
    }
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SpecificCodecConfiguration {
    pub sampling_frequency: Option<u8>,
    pub frame_duration: Option<u8>,
    pub audio_channel_allocation: Option<u32>,
    pub octets_per_codec_frame: Option<u16>,
    pub codec_frames_per_sdu: Option<u8>,
}

const CFG_TYPE_SAMPLING_FREQUENCY: u8 = 1;
const CFG_TYPE_FRAME_DURATION: u8 = 2;
const CFG_TYPE_AUDIO_CHANNEL_ALLOCATION: u8 = 3;
const CFG_TYPE_OCTETS_PER_CODEC_FRAME: u8 = 4;
const CFG_TYPE_CODEC_FRAMES_PER_SDU: u8 = 5;

impl SpecificCodecConfiguration {
    pub fn parse(bytes: &[u8]) -> Result<Self, ()> {
        let mut out = Self::default();
        for_each_tlv(bytes, |typ, value| match typ {
            CFG_TYPE_SAMPLING_FREQUENCY if value.len() == 1 => {
                out.sampling_frequency = Some(value[0]);
                Ok(())
            }
            CFG_TYPE_FRAME_DURATION if value.len() == 1 => {
                out.frame_duration = Some(value[0]);
                Ok(())
            }
            CFG_TYPE_AUDIO_CHANNEL_ALLOCATION if value.len() == 4 => {
                out.audio_channel_allocation =
                    Some(u32::from_le_bytes([value[0], value[1], value[2], value[3]]));
                Ok(())
            }
            CFG_TYPE_OCTETS_PER_CODEC_FRAME if value.len() == 2 => {
                out.octets_per_codec_frame = Some(u16::from_le_bytes([value[0], value[1]]));
                Ok(())
            }
            CFG_TYPE_CODEC_FRAMES_PER_SDU if value.len() == 1 => {
                out.codec_frames_per_sdu = Some(value[0]);
                Ok(())
            }
            // Unknown or malformed-length entries are preserved as part of
            // the raw codec-specific configuration blob and are not a
            // parse failure: §1 puts "codec payload interpretation"
            // out of scope beyond the fields this server validates.
            _ => Ok(()),
        })
    }

    pub fn serialize_into(&self, buf: &mut Vec<u8, CODEC_CFG_MAX_LEN>) {
        if let Some(v) = self.sampling_frequency {
            let _ = buf.push(2);
            let _ = buf.push(CFG_TYPE_SAMPLING_FREQUENCY);
            let _ = buf.push(v);
        }
        if let Some(v) = self.frame_duration {
            let _ = buf.push(2);
            let _ = buf.push(CFG_TYPE_FRAME_DURATION);
            let _ = buf.push(v);
        }
        if let Some(v) = self.audio_channel_allocation {
            let bytes = v.to_le_bytes();
            let _ = buf.push(5);
            let _ = buf.push(CFG_TYPE_AUDIO_CHANNEL_ALLOCATION);
            let _ = buf.extend_from_slice(&bytes);
        }
        if let Some(v) = self.octets_per_codec_frame {
            let bytes = v.to_le_bytes();
            let _ = buf.push(3);
            let _ = buf.push(CFG_TYPE_OCTETS_PER_CODEC_FRAME);
            let _ = buf.extend_from_slice(&bytes);
        }
        if let Some(v) = self.codec_frames_per_sdu {
            let _ = buf.push(2);
            let _ = buf.push(CFG_TYPE_CODEC_FRAMES_PER_SDU);
            let _ = buf.push(v);
        }
    }
}

/// What the peer asked for in a `CONFIG_CODEC` sub-request.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, Default)]
pub struct ClientCodecConfigurationRequest {
    pub target_latency: u8,
    pub target_phy: u8,
    pub codec_id: CodecId,
    pub specific_configuration: SpecificCodecConfiguration,
}

/// The codec configuration as stored on the ASE once the application
/// accepts a request (via `configure_codec`). Distinct from
/// `ClientCodecConfigurationRequest`: it carries the server's accepted
/// QoS-relevant bounds (framing, preferred phy, latency ceiling,
/// presentation delay window) alongside the negotiated codec identity,
/// exactly as `audio_stream_control_service_server_streamendpoint_configure_codec`
/// takes a fully-formed struct in the original.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, Default)]
pub struct CodecConfiguration {
    pub framing: Framing,
    pub preferred_phy: u8,
    pub preferred_retransmission_number: u8,
    pub max_transport_latency_ms: u16,
    pub presentation_delay_min_us: u32,
    pub presentation_delay_max_us: u32,
    pub preferred_presentation_delay_min_us: u32,
    pub preferred_presentation_delay_max_us: u32,
    pub codec_id: CodecId,
    pub specific_configuration: SpecificCodecConfiguration,
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, Default)]
pub struct QosConfiguration {
    pub cig_id: u8,
    pub cis_id: u8,
    pub sdu_interval: u32,
    pub framing: Framing,
    pub phy: u8,
    pub max_sdu: u16,
    pub retransmission_number: u8,
    pub max_transport_latency_ms: u16,
    pub presentation_delay_us: u32,
}

impl QosConfiguration {
    /// Parses the fixed 16-byte `CONFIG_QOS` sub-request body (everything
    /// after the `ase_id` byte already consumed by the validator).
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != 15 {
            return None;
        }
        let sdu_interval = u32::from_le_bytes([bytes[2], bytes[3], bytes[4], 0]);
        let presentation_delay_us = u32::from_le_bytes([bytes[12], bytes[13], bytes[14], 0]);
        Some(Self {
            cig_id: bytes[0],
            cis_id: bytes[1],
            sdu_interval,
            framing: Framing::from_u8(bytes[5])?,
            phy: bytes[6],
            max_sdu: u16::from_le_bytes([bytes[7], bytes[8]]),
            retransmission_number: bytes[9],
            max_transport_latency_ms: u16::from_le_bytes([bytes[10], bytes[11]]),
            presentation_delay_us,
        })
    }

    pub fn serialize_into(&self, buf: &mut Vec<u8, 32>) {
        let _ = buf.push(self.cig_id);
        let _ = buf.push(self.cis_id);
        let sdu = self.sdu_interval.to_le_bytes();
        let _ = buf.extend_from_slice(&sdu[0..3]);
        let _ = buf.push(self.framing as u8);
        let _ = buf.push(self.phy);
        let _ = buf.extend_from_slice(&self.max_sdu.to_le_bytes());
        let _ = buf.push(self.retransmission_number);
        let _ = buf.extend_from_slice(&self.max_transport_latency_ms.to_le_bytes());
        let pd = self.presentation_delay_us.to_le_bytes();
        let _ = buf.extend_from_slice(&pd[0..3]);
    }
}

pub const METADATA_TYPE_PREFERRED_AUDIO_CONTEXTS: u8 = 1;
pub const METADATA_TYPE_STREAMING_AUDIO_CONTEXTS: u8 = 2;
pub const METADATA_TYPE_PARENTAL_RATING: u8 = 6;
pub const METADATA_TYPE_PROGRAM_INFO_URI: u8 = 7;
pub const METADATA_TYPE_AUDIO_ACTIVE_STATE: u8 = 8;
pub const METADATA_TYPE_BROADCAST_AUDIO_IMMEDIATE_RENDERING_FLAG: u8 = 9;
pub const METADATA_TYPE_EXTENDED_METADATA: u8 = 0xFE;
pub const METADATA_TYPE_VENDOR_SPECIFIC: u8 = 0xFF;
/// Types in this range carry no assigned meaning; a metadata entry whose
/// type falls in it is rejected outright. `0xFE`/`0xFF` sit above the
/// range (Extended Metadata / Vendor Specific), not inside it.
const METADATA_TYPE_RFU_RANGE: core::ops::RangeInclusive<u8> = 10..=0xFD;

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Default)]
pub struct Metadata {
    pub has_rfu_type: bool,
    pub preferred_audio_contexts: Option<u16>,
    pub streaming_audio_contexts: Option<u16>,
    pub parental_rating: Option<u8>,
    pub raw: Vec<u8, METADATA_MAX_LEN>,
}

impl Metadata {
    pub fn parse(bytes: &[u8]) -> Result<Self, ()> {
        let mut out = Self::default();
        out.raw = Vec::from_slice(bytes).map_err(|_| ())?;
        for_each_tlv(bytes, |typ, value| {
            out.has_rfu_type |= METADATA_TYPE_RFU_RANGE.contains(&typ);
            match typ {
                METADATA_TYPE_PREFERRED_AUDIO_CONTEXTS if value.len() == 2 => {
                    out.preferred_audio_contexts = Some(u16::from_le_bytes([value[0], value[1]]));
                }
                METADATA_TYPE_STREAMING_AUDIO_CONTEXTS if value.len() == 2 => {
                    out.streaming_audio_contexts = Some(u16::from_le_bytes([value[0], value[1]]));
                }
                METADATA_TYPE_PARENTAL_RATING if value.len() == 1 => {
                    out.parental_rating = Some(value[0]);
                }
                _ => {}
            }
            Ok(())
        })?;
        Ok(out)
    }

    /// `true` if any type in [`METADATA_TYPE_RFU_RANGE`] was present.
    pub fn has_rfu_type(&self) -> bool {
        self.has_rfu_type
    }
}

/// Serializes an ASE's GATT value: `ase_id:u8, state:u8`, then a
/// state-dependent body. Used both for GATT reads and for
/// SEND_ASE_VALUE_CHANGED notifications (C6, C7).
pub fn serialize_ase_value(
    ase_id: u8,
    state: super::state::AseState,
    codec_cfg: Option<&CodecConfiguration>,
    qos_cfg: Option<&QosConfiguration>,
    metadata: &Metadata,
    cig_id: u8,
    cis_id: u8,
    buf: &mut Vec<u8, 128>,
) {
    use super::state::AseState;

    let _ = buf.push(ase_id);
    let _ = buf.push(state as u8);

    match state {
        AseState::CodecConfigured => {
            if let Some(cfg) = codec_cfg {
                let _ = buf.push(cfg.framing as u8);
                let _ = buf.push(cfg.preferred_phy);
                let _ = buf.push(cfg.preferred_retransmission_number);
                let _ = buf.extend_from_slice(&cfg.max_transport_latency_ms.to_le_bytes());
                let _ = buf.extend_from_slice(&cfg.presentation_delay_min_us.to_le_bytes()[0..3]);
                let _ = buf.extend_from_slice(&cfg.presentation_delay_max_us.to_le_bytes()[0..3]);
                let _ =
                    buf.extend_from_slice(&cfg.preferred_presentation_delay_min_us.to_le_bytes()[0..3]);
                let _ =
                    buf.extend_from_slice(&cfg.preferred_presentation_delay_max_us.to_le_bytes()[0..3]);
                let _ = buf.push(cfg.codec_id.coding_format);
                let _ = buf.extend_from_slice(&cfg.codec_id.company_id.to_le_bytes());
                let _ = buf.extend_from_slice(&cfg.codec_id.vendor_codec_id.to_le_bytes());
                let mut cfg_bytes: Vec<u8, CODEC_CFG_MAX_LEN> = Vec::new();
                cfg.specific_configuration.serialize_into(&mut cfg_bytes);
                let _ = buf.push(cfg_bytes.len() as u8);
                let _ = buf.extend_from_slice(&cfg_bytes);
            }
        }
        AseState::QosConfigured => {
            if let Some(cfg) = qos_cfg {
                let mut qos_bytes: Vec<u8, 32> = Vec::new();
                cfg.serialize_into(&mut qos_bytes);
                let _ = buf.extend_from_slice(&qos_bytes);
            }
        }
        AseState::Enabling | AseState::Streaming | AseState::Disabling => {
            let _ = buf.push(cig_id);
            let _ = buf.push(cis_id);
            let _ = buf.push(metadata.raw.len() as u8);
            let _ = buf.extend_from_slice(&metadata.raw);
        }
        AseState::Idle | AseState::Releasing => {}
    }
}

/// Reproduces `att_read_callback_handle_blob`: clamp `offset` past the end
/// of `value` to an empty read, otherwise copy `min(remaining, out.len())`
/// bytes.
pub fn read_blob(value: &[u8], offset: usize, out: &mut [u8]) -> usize {
    if offset >= value.len() {
        return 0;
    }
    let remaining = &value[offset..];
    let n = remaining.len().min(out.len());
    out[..n].copy_from_slice(&remaining[..n]);
    n
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn specific_codec_configuration_round_trips() {
        let cfg = SpecificCodecConfiguration {
            sampling_frequency: Some(8),
            frame_duration: Some(1),
            audio_channel_allocation: Some(3),
            octets_per_codec_frame: Some(40),
            codec_frames_per_sdu: Some(1),
        };
        let mut buf: Vec<u8, CODEC_CFG_MAX_LEN> = Vec::new();
        cfg.serialize_into(&mut buf);
        let parsed = SpecificCodecConfiguration::parse(&buf).unwrap();
        assert_eq!(cfg, parsed);
    }

    #[test]
    fn qos_configuration_round_trips() {
        let cfg = QosConfiguration {
            cig_id: 1,
            cis_id: 2,
            sdu_interval: 10000,
            framing: Framing::Unframed,
            phy: 2,
            max_sdu: 100,
            retransmission_number: 5,
            max_transport_latency_ms: 20,
            presentation_delay_us: 40000,
        };
        let mut buf: Vec<u8, 32> = Vec::new();
        cfg.serialize_into(&mut buf);
        assert_eq!(buf.len(), 15);
        let parsed = QosConfiguration::parse(&buf).unwrap();
        assert_eq!(parsed.cig_id, cfg.cig_id);
        assert_eq!(parsed.sdu_interval, cfg.sdu_interval);
        assert_eq!(parsed.presentation_delay_us, cfg.presentation_delay_us);
    }

    #[test]
    fn metadata_rfu_bit_detected() {
        // type=10 (first RFU value), length=1 (type byte only), no value.
        let bytes = [1u8, 10];
        let meta = Metadata::parse(&bytes).unwrap();
        assert!(meta.has_rfu_type());
    }

    #[test]
    fn metadata_rfu_boundary_accepts_named_types_above_parental_rating() {
        for typ in [
            METADATA_TYPE_PROGRAM_INFO_URI,
            METADATA_TYPE_AUDIO_ACTIVE_STATE,
            METADATA_TYPE_BROADCAST_AUDIO_IMMEDIATE_RENDERING_FLAG,
            METADATA_TYPE_EXTENDED_METADATA,
            METADATA_TYPE_VENDOR_SPECIFIC,
        ] {
            let bytes = [1u8, typ];
            let meta = Metadata::parse(&bytes).unwrap();
            assert!(!meta.has_rfu_type(), "type {:#04x} should not be RFU", typ);
        }
    }

    #[test]
    fn metadata_rfu_boundary_rejects_reserved_range() {
        for typ in [10u8, 0xFD] {
            let bytes = [1u8, typ];
            let meta = Metadata::parse(&bytes).unwrap();
            assert!(meta.has_rfu_type(), "type {:#04x} should be RFU", typ);
        }
    }

    #[test]
    fn read_blob_clamps_past_end() {
        let value = [1, 2, 3, 4];
        let mut out = [0u8; 4];
        assert_eq!(read_blob(&value, 10, &mut out), 0);
        assert_eq!(read_blob(&value, 2, &mut out), 2);
        assert_eq!(&out[..2], &[3, 4]);
    }
}
