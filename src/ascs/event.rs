//! Upcall emitter (C5): one event per successfully-validated ACP
//! sub-request, plus connection lifecycle events, delivered to the
//! application's registered packet handler.
//!
//! Grounded in `ascs_server_emit_client_codec_configuration_request` and
//! siblings in the original, and in
//! `audio_stream_control_service_server_register_packet_handler`'s
//! function-pointer callback style.

use super::codec::{ClientCodecConfigurationRequest, Metadata, QosConfiguration};
use super::transport::ConnectionHandle;
use heapless::Vec;

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectedStatus {
    Success,
    ConnectionLimitExceeded,
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone)]
pub enum AscsUpcall {
    Connected { con_handle: ConnectionHandle, status: ConnectedStatus },
    Disconnected { con_handle: ConnectionHandle },
    CodecConfigurationRequest {
        con_handle: ConnectionHandle,
        ase_id: u8,
        request: ClientCodecConfigurationRequest,
    },
    QosConfigurationRequest {
        con_handle: ConnectionHandle,
        ase_id: u8,
        request: QosConfiguration,
    },
    EnableRequest { con_handle: ConnectionHandle, ase_id: u8, metadata: Metadata },
    StartReady { con_handle: ConnectionHandle, ase_id: u8 },
    Disable { con_handle: ConnectionHandle, ase_id: u8 },
    StopReady { con_handle: ConnectionHandle, ase_id: u8 },
    MetadataUpdateRequest { con_handle: ConnectionHandle, ase_id: u8, metadata: Metadata },
    Release { con_handle: ConnectionHandle, ase_id: u8 },
    Released { con_handle: ConnectionHandle, ase_id: u8 },
}

impl AscsUpcall {
    fn tag(&self) -> u8 {
        match self {
            Self::Connected { .. } => 0x01,
            Self::Disconnected { .. } => 0x02,
            Self::CodecConfigurationRequest { .. } => 0x03,
            Self::QosConfigurationRequest { .. } => 0x04,
            Self::EnableRequest { .. } => 0x05,
            Self::StartReady { .. } => 0x06,
            Self::Disable { .. } => 0x07,
            Self::StopReady { .. } => 0x08,
            Self::MetadataUpdateRequest { .. } => 0x09,
            Self::Release { .. } => 0x0A,
            Self::Released { .. } => 0x0B,
        }
    }

    fn con_handle(&self) -> ConnectionHandle {
        match self {
            Self::Connected { con_handle, .. }
            | Self::Disconnected { con_handle }
            | Self::CodecConfigurationRequest { con_handle, .. }
            | Self::QosConfigurationRequest { con_handle, .. }
            | Self::EnableRequest { con_handle, .. }
            | Self::StartReady { con_handle, .. }
            | Self::Disable { con_handle, .. }
            | Self::StopReady { con_handle, .. }
            | Self::MetadataUpdateRequest { con_handle, .. }
            | Self::Release { con_handle, .. }
            | Self::Released { con_handle, .. } => *con_handle,
        }
    }

    fn ase_id(&self) -> Option<u8> {
        match self {
            Self::Connected { .. } | Self::Disconnected { .. } => None,
            Self::CodecConfigurationRequest { ase_id, .. }
            | Self::QosConfigurationRequest { ase_id, .. }
            | Self::EnableRequest { ase_id, .. }
            | Self::StartReady { ase_id, .. }
            | Self::Disable { ase_id, .. }
            | Self::StopReady { ase_id, .. }
            | Self::MetadataUpdateRequest { ase_id, .. }
            | Self::Release { ase_id, .. }
            | Self::Released { ase_id, .. } => Some(*ase_id),
        }
    }

    /// Length-prefixed, opcode-tagged encoding for parity with the wire
    /// event format: `tag:u8, con_handle:u16 (LE), ase_id:u8 (0xFF if
    /// none)`, followed by event-specific fields.
    pub fn encode(&self, buf: &mut Vec<u8, 64>) {
        let _ = buf.push(self.tag());
        let _ = buf.extend_from_slice(&self.con_handle().raw().to_le_bytes());
        let _ = buf.push(self.ase_id().unwrap_or(0xFF));

        match self {
            Self::Connected { status, .. } => {
                let _ = buf.push(match status {
                    ConnectedStatus::Success => 0,
                    ConnectedStatus::ConnectionLimitExceeded => 1,
                });
            }
            Self::CodecConfigurationRequest { request, .. } => {
                let _ = buf.push(request.target_latency);
                let _ = buf.push(request.target_phy);
                let _ = buf.push(request.codec_id.coding_format);
            }
            Self::QosConfigurationRequest { request, .. } => {
                let _ = buf.push(request.cig_id);
                let _ = buf.push(request.cis_id);
            }
            Self::EnableRequest { metadata, .. } | Self::MetadataUpdateRequest { metadata, .. } => {
                let _ = buf.push(metadata.raw.len() as u8);
                let _ = buf.extend_from_slice(&metadata.raw);
            }
            _ => {}
        }
    }
}

/// The application's packet handler, mirroring
/// `audio_stream_control_service_server_register_packet_handler`'s
/// function-pointer style rather than a trait object, so the server
/// stays usable without an allocator or `'static` vtable.
pub type AscsEventCallback = fn(AscsUpcall);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ascs::codec::CodecId;

    #[test]
    fn encode_includes_tag_handle_and_ase_id() {
        let event = AscsUpcall::StartReady { con_handle: ConnectionHandle::new(5), ase_id: 3 };
        let mut buf: Vec<u8, 64> = Vec::new();
        event.encode(&mut buf);
        assert_eq!(buf[0], 0x06);
        assert_eq!(u16::from_le_bytes([buf[1], buf[2]]), 5);
        assert_eq!(buf[3], 3);
    }

    #[test]
    fn codec_configuration_request_carries_codec_id() {
        let event = AscsUpcall::CodecConfigurationRequest {
            con_handle: ConnectionHandle::new(1),
            ase_id: 1,
            request: ClientCodecConfigurationRequest {
                target_latency: 2,
                target_phy: 2,
                codec_id: CodecId { coding_format: 0x02, company_id: 0, vendor_codec_id: 0 },
                specific_configuration: Default::default(),
            },
        };
        let mut buf: Vec<u8, 64> = Vec::new();
        event.encode(&mut buf);
        assert_eq!(buf[6], 0x02);
    }
}
