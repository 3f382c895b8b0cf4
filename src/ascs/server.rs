//! GATT glue (C8): wires the registry, connection table, validator and
//! scheduler to a live `trouble-host` connection, and exposes the apply
//! entry points the application calls once it has decided how to answer
//! a client request.
//!
//! Mirrors the original's `audio_stream_control_service_server_init` /
//! `_register_packet_handler` / `_streamendpoint_configure_codec` family,
//! but keeps the transport itself behind [`GattTransport`] so C1-C7 stay
//! testable without a radio.

use super::codec::{self, CodecConfiguration, Metadata, QosConfiguration};
use super::connection::{ConnectionTable, CCCD_NOTIFICATION_ENABLED};
use super::event::{AscsEventCallback, AscsUpcall, ConnectedStatus};
use super::registry::AseRegistry;
use super::scheduler::ScheduledTasks;
use super::state::{self, AseOpcode, AseState, Direction};
use super::transport::{ConnectionHandle, GattTransport};
use super::validator;
use super::AscsInitError;
use heapless::Vec;
use static_cell::StaticCell;

/// Internal to the apply entry points below: every public one of them
/// treats both variants as a silent no-op rather than surfacing them, per
/// spec.md §7 (an application API misuse must not crash a shared audio
/// stack).
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ApplyError {
    UnknownAse,
    InvalidTransition,
}

/// `MAX_ASES` is this server's total ASE count (sinks + sources);
/// `MAX_CONNECTIONS` bounds how many peers can be attached at once.
pub struct AscsServer<const MAX_ASES: usize, const MAX_CONNECTIONS: usize> {
    registry: AseRegistry<MAX_ASES>,
    connections: ConnectionTable<MAX_CONNECTIONS, MAX_ASES>,
    event_callback: Option<AscsEventCallback>,
}

impl<const MAX_ASES: usize, const MAX_CONNECTIONS: usize> AscsServer<MAX_ASES, MAX_CONNECTIONS> {
    /// Builds the ASE registry from `directions` (one entry per ASE this
    /// server exposes). Mirrors `audio_stream_control_service_server_init`
    /// being given the sink/source counts up front and never revisiting
    /// them afterwards.
    pub fn init(directions: &[Direction]) -> Result<Self, AscsInitError> {
        let registry = AseRegistry::build(directions)?;
        let ase_count = registry.len();
        Ok(Self {
            registry,
            connections: ConnectionTable::new(ase_count),
            event_callback: None,
        })
    }

    /// Initializes the server into caller-provided `'static` storage,
    /// mirroring the teacher's `StaticCell`-backed GATT characteristic
    /// buffers (`ASE_STORE`/`CONTROL_STORE` in `ascs.rs`): the server
    /// itself is static storage discipline's other half, handed out of a
    /// static rather than boxed or stack-allocated by the caller.
    pub fn init_static(
        cell: &'static StaticCell<Self>,
        directions: &[Direction],
    ) -> Result<&'static mut Self, AscsInitError> {
        let server = Self::init(directions)?;
        Ok(cell.init(server))
    }

    pub fn register_packet_handler(&mut self, callback: AscsEventCallback) {
        self.event_callback = Some(callback);
    }

    /// Handles a GATT write to the ACP characteristic's CCCD. A peer that
    /// has not enabled notifications never receives an ACP response
    /// notification, per spec.md §4.7/§4.9 (it can still read the pending
    /// response directly via [`Self::handle_acp_read`]).
    pub fn on_acp_cccd_write(&mut self, handle: ConnectionHandle, value: u16) {
        if let Some(conn) = self.connections.get_or_attach(handle) {
            conn.acp_cccd_value = value;
        }
    }

    /// Handles a GATT write to an ASE value characteristic's CCCD. A
    /// misuse (unknown ASE id) is a silent no-op, per spec.md §7: an
    /// application API misuse must not be able to crash a shared audio
    /// stack.
    pub fn on_ase_cccd_write(&mut self, handle: ConnectionHandle, ase_id: u8, value: u16) {
        let Ok(idx) = self.ase_index(ase_id) else { return };
        let Some(conn) = self.connections.get_or_attach(handle) else { return };
        conn.ases[idx].cccd_value = value;
    }

    fn emit(&self, upcall: AscsUpcall) {
        if let Some(cb) = self.event_callback {
            cb(upcall);
        }
    }

    pub fn ase_count(&self) -> usize {
        self.registry.len()
    }

    /// Call on the link-layer connected event.
    pub fn on_connected(&mut self, handle: ConnectionHandle) {
        let status = match self.connections.on_connected(handle) {
            Ok(()) => ConnectedStatus::Success,
            Err(_) => ConnectedStatus::ConnectionLimitExceeded,
        };
        self.emit(AscsUpcall::Connected { con_handle: handle, status });
    }

    /// Call on disconnect. Drops the connection's pending response and
    /// scheduled tasks along with its ASE runtime state, matching the
    /// original's `ascs_server_remove_client` forgetting everything about
    /// a peer once the link is gone.
    pub fn on_disconnected(&mut self, handle: ConnectionHandle) {
        self.connections.on_disconnected(handle);
        self.emit(AscsUpcall::Disconnected { con_handle: handle });
    }

    /// Handles a GATT write to the ASE Control Point characteristic.
    pub fn handle_acp_write<T: GattTransport>(
        &mut self,
        transport: &mut T,
        handle: ConnectionHandle,
        data: &[u8],
    ) {
        let Some(conn) = self.connections.get_or_attach(handle) else {
            return;
        };
        let upcalls = validator::process_acp_write(&self.registry, conn, handle, data);
        if !conn.can_send_now_armed() && !conn.scheduled_tasks.is_empty() {
            conn.set_can_send_now_armed(true);
            transport.request_can_send_now(handle);
        }
        for upcall in upcalls {
            self.emit(upcall);
        }
    }

    /// Handles a GATT read of an ASE value characteristic at `ase_index`.
    pub fn handle_ase_value_read(
        &self,
        handle: ConnectionHandle,
        ase_index: usize,
        offset: usize,
        out: &mut [u8],
    ) -> usize {
        let Some(conn) = self.connections.get(handle) else {
            return 0;
        };
        let Some(characteristic) = self.registry.iter().nth(ase_index) else {
            return 0;
        };
        let Some(ase) = conn.ases.get(ase_index) else {
            return 0;
        };
        let mut buf: Vec<u8, 128> = Vec::new();
        codec::serialize_ase_value(
            characteristic.id,
            ase.state,
            ase.codec_cfg.as_ref(),
            ase.qos_cfg.as_ref(),
            &ase.metadata,
            ase.qos_cfg.as_ref().map(|q| q.cig_id).unwrap_or(0),
            ase.qos_cfg.as_ref().map(|q| q.cis_id).unwrap_or(0),
            &mut buf,
        );
        codec::read_blob(&buf, offset, out)
    }

    /// Handles a GATT read of the ACP characteristic's pending response.
    pub fn handle_acp_read(&self, handle: ConnectionHandle, offset: usize, out: &mut [u8]) -> usize {
        let Some(conn) = self.connections.get(handle) else {
            return 0;
        };
        let mut buf: Vec<u8, 256> = Vec::new();
        validator::serialize_acp_response(conn, &mut buf);
        codec::read_blob(&buf, offset, out)
    }

    /// Drains exactly one scheduled task for `handle`, sending the
    /// corresponding notification, and re-requests a can-send-now
    /// callback if tasks remain. Call from the transport's can-send-now
    /// callback (C7).
    pub fn on_can_send_now<T: GattTransport>(&mut self, transport: &mut T, handle: ConnectionHandle) {
        let Some(conn) = self.connections.get_mut(handle) else {
            return;
        };
        conn.set_can_send_now_armed(false);

        if conn.scheduled_tasks.contains(ScheduledTasks::SEND_ACP_RESPONSE) {
            let mut buf: Vec<u8, 256> = Vec::new();
            validator::serialize_acp_response(conn, &mut buf);
            transport.notify_acp(handle, &buf);
            conn.scheduled_tasks.remove(ScheduledTasks::SEND_ACP_RESPONSE);
        } else if conn.scheduled_tasks.contains(ScheduledTasks::SEND_ASE_VALUE_CHANGED) {
            if let Some((idx, ase)) = conn
                .ases
                .iter_mut()
                .enumerate()
                .find(|(_, ase)| ase.notify_pending)
            {
                ase.notify_pending = false;
                let characteristic = self.registry.iter().nth(idx).unwrap();
                let mut buf: Vec<u8, 128> = Vec::new();
                codec::serialize_ase_value(
                    characteristic.id,
                    ase.state,
                    ase.codec_cfg.as_ref(),
                    ase.qos_cfg.as_ref(),
                    &ase.metadata,
                    ase.qos_cfg.as_ref().map(|q| q.cig_id).unwrap_or(0),
                    ase.qos_cfg.as_ref().map(|q| q.cis_id).unwrap_or(0),
                    &mut buf,
                );
                transport.notify_ase_value(handle, idx, &buf);
            }
            if !conn.ases.iter().any(|a| a.notify_pending) {
                conn.scheduled_tasks.remove(ScheduledTasks::SEND_ASE_VALUE_CHANGED);
            }
        }

        if !conn.scheduled_tasks.is_empty() {
            conn.set_can_send_now_armed(true);
            transport.request_can_send_now(handle);
        }
    }

    fn ase_index(&self, ase_id: u8) -> Result<usize, ApplyError> {
        self.registry.index_of(ase_id).ok_or(ApplyError::UnknownAse)
    }

    /// Schedules an ASE-value-changed notification for `ase_index`,
    /// requesting a can-send-now callback if one is not already
    /// outstanding.
    fn schedule_value_changed<T: GattTransport>(
        &mut self,
        transport: &mut T,
        handle: ConnectionHandle,
        ase_index: usize,
    ) {
        if let Some(conn) = self.connections.get_mut(handle) {
            if conn.ases[ase_index].cccd_value & CCCD_NOTIFICATION_ENABLED == 0 {
                return;
            }
            conn.ases[ase_index].notify_pending = true;
            let became_armed =
                super::scheduler::arm(&mut conn.scheduled_tasks, ScheduledTasks::SEND_ASE_VALUE_CHANGED);
            if became_armed && !conn.can_send_now_armed() {
                conn.set_can_send_now_armed(true);
                transport.request_can_send_now(handle);
            }
        }
    }

    fn transition<T: GattTransport>(
        &mut self,
        transport: &mut T,
        handle: ConnectionHandle,
        ase_id: u8,
        opcode: AseOpcode,
    ) -> Result<usize, ApplyError> {
        let idx = self.ase_index(ase_id)?;
        let direction = self.registry.iter().nth(idx).unwrap().direction;
        let conn = self.connections.get_mut(handle).ok_or(ApplyError::UnknownAse)?;
        let next = state::next_state(conn.ases[idx].state, opcode, direction)
            .ok_or(ApplyError::InvalidTransition)?;
        conn.ases[idx].state = next;
        self.schedule_value_changed(transport, handle, idx);
        Ok(idx)
    }

    /// Accepts a client's codec configuration request, storing the
    /// server's chosen QoS-relevant bounds alongside the negotiated codec
    /// identity. Corresponds to
    /// `audio_stream_control_service_server_streamendpoint_configure_codec`.
    ///
    /// A misuse (unknown ASE id, or an ASE not in a state this opcode can
    /// leave) is a silent no-op, per spec.md §7: an application API
    /// misuse must not be able to crash a shared audio stack.
    pub fn configure_codec<T: GattTransport>(
        &mut self,
        transport: &mut T,
        handle: ConnectionHandle,
        ase_id: u8,
        config: CodecConfiguration,
    ) {
        let Ok(idx) = self.transition(transport, handle, ase_id, AseOpcode::ConfigCodec) else {
            return;
        };
        let Some(conn) = self.connections.get_mut(handle) else { return };
        conn.ases[idx].codec_cfg = Some(config);
    }

    pub fn configure_qos<T: GattTransport>(
        &mut self,
        transport: &mut T,
        handle: ConnectionHandle,
        ase_id: u8,
        config: QosConfiguration,
    ) {
        let Ok(idx) = self.transition(transport, handle, ase_id, AseOpcode::ConfigQos) else {
            return;
        };
        let Some(conn) = self.connections.get_mut(handle) else { return };
        conn.ases[idx].qos_cfg = Some(config);
    }

    pub fn enable<T: GattTransport>(
        &mut self,
        transport: &mut T,
        handle: ConnectionHandle,
        ase_id: u8,
        metadata: Metadata,
    ) {
        let Ok(idx) = self.transition(transport, handle, ase_id, AseOpcode::Enable) else {
            return;
        };
        let Some(conn) = self.connections.get_mut(handle) else { return };
        conn.ases[idx].metadata = metadata;
    }

    pub fn start_ready<T: GattTransport>(&mut self, transport: &mut T, handle: ConnectionHandle, ase_id: u8) {
        let _ = self.transition(transport, handle, ase_id, AseOpcode::ReceiverStartReady);
    }

    pub fn disable<T: GattTransport>(&mut self, transport: &mut T, handle: ConnectionHandle, ase_id: u8) {
        let _ = self.transition(transport, handle, ase_id, AseOpcode::Disable);
    }

    pub fn stop_ready<T: GattTransport>(&mut self, transport: &mut T, handle: ConnectionHandle, ase_id: u8) {
        let _ = self.transition(transport, handle, ase_id, AseOpcode::ReceiverStopReady);
    }

    pub fn metadata_update<T: GattTransport>(
        &mut self,
        transport: &mut T,
        handle: ConnectionHandle,
        ase_id: u8,
        metadata: Metadata,
    ) {
        let Ok(idx) = self.transition(transport, handle, ase_id, AseOpcode::UpdateMetadata) else {
            return;
        };
        let Some(conn) = self.connections.get_mut(handle) else { return };
        conn.ases[idx].metadata = metadata;
    }

    pub fn release<T: GattTransport>(&mut self, transport: &mut T, handle: ConnectionHandle, ase_id: u8) {
        let _ = self.transition(transport, handle, ase_id, AseOpcode::Release);
    }

    /// Completes a release. `caching` picks which of the two states
    /// `RELEASED` can legally reach from `Releasing`: `true` keeps the
    /// codec configuration around and returns to `CodecConfigured`,
    /// `false` clears it and returns to `Idle`. The control-point
    /// validator only ever checks the transition against `Idle` (see
    /// [`state::next_state`]); this is where the caching-dependent target
    /// is actually resolved, mirroring
    /// `audio_stream_control_service_server_streamendpoint_released`'s
    /// `caching` parameter.
    ///
    /// A misuse (unknown ASE id, or an ASE not in `Releasing`) is a
    /// silent no-op, per spec.md §7.
    pub fn released<T: GattTransport>(
        &mut self,
        transport: &mut T,
        handle: ConnectionHandle,
        ase_id: u8,
        caching: bool,
    ) {
        let Ok(idx) = self.ase_index(ase_id) else { return };
        let direction = self.registry.iter().nth(idx).unwrap().direction;
        let Some(conn) = self.connections.get_mut(handle) else { return };
        if state::next_state(conn.ases[idx].state, AseOpcode::Released, direction).is_none() {
            return;
        }

        let codec_cfg = conn.ases[idx].codec_cfg;
        conn.ases[idx] = Default::default();
        conn.ases[idx].state = if caching && codec_cfg.is_some() {
            conn.ases[idx].codec_cfg = codec_cfg;
            AseState::CodecConfigured
        } else {
            AseState::Idle
        };
        self.schedule_value_changed(transport, handle, idx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::vec::Vec as StdVec;

    #[derive(Default)]
    struct FakeTransport {
        notified_acp: StdVec<(ConnectionHandle, StdVec<u8>)>,
        notified_ase: StdVec<(ConnectionHandle, usize, StdVec<u8>)>,
        can_send_now_requests: StdVec<ConnectionHandle>,
    }

    impl GattTransport for FakeTransport {
        fn notify_acp(&mut self, handle: ConnectionHandle, value: &[u8]) {
            self.notified_acp.push((handle, value.to_vec()));
        }
        fn notify_ase_value(&mut self, handle: ConnectionHandle, ase_index: usize, value: &[u8]) {
            self.notified_ase.push((handle, ase_index, value.to_vec()));
        }
        fn request_can_send_now(&mut self, handle: ConnectionHandle) {
            self.can_send_now_requests.push(handle);
        }
    }

    #[test]
    fn acp_write_schedules_a_response_notification() {
        let mut server: AscsServer<4, 2> = AscsServer::init(&[Direction::Sink]).unwrap();
        let mut transport = FakeTransport::default();
        let handle = ConnectionHandle::new(1);
        server.on_connected(handle);
        server.on_acp_cccd_write(handle, CCCD_NOTIFICATION_ENABLED);

        let write = [0x01, 0x01, 0x01, 0x03, 0x02, 0x06, 0x00, 0x00, 0x00, 0x00, 0x00];
        server.handle_acp_write(&mut transport, handle, &write);
        assert_eq!(transport.can_send_now_requests, std::vec![handle]);

        server.on_can_send_now(&mut transport, handle);
        assert_eq!(transport.notified_acp.len(), 1);
        assert_eq!(transport.notified_acp[0].1[0], 0x01);
    }

    #[test]
    fn apply_entry_points_drive_the_state_machine_and_notify() {
        let mut server: AscsServer<4, 2> = AscsServer::init(&[Direction::Sink]).unwrap();
        let mut transport = FakeTransport::default();
        let handle = ConnectionHandle::new(1);
        server.on_connected(handle);
        server.on_ase_cccd_write(handle, 1, CCCD_NOTIFICATION_ENABLED);

        server.configure_codec(&mut transport, handle, 1, CodecConfiguration::default());
        server.on_can_send_now(&mut transport, handle);
        assert_eq!(transport.notified_ase.len(), 1);
        assert_eq!(transport.notified_ase[0].2[1], AseState::CodecConfigured as u8);

        server.configure_qos(&mut transport, handle, 1, QosConfiguration::default());
        server.enable(&mut transport, handle, 1, Metadata::default());
        server.start_ready(&mut transport, handle, 1);
        server.on_can_send_now(&mut transport, handle);
        let last = transport.notified_ase.last().unwrap();
        assert_eq!(last.2[1], AseState::Streaming as u8);
    }

    #[test]
    fn released_honors_caching() {
        let mut server: AscsServer<4, 2> = AscsServer::init(&[Direction::Sink]).unwrap();
        let mut transport = FakeTransport::default();
        let handle = ConnectionHandle::new(1);
        server.on_connected(handle);
        server.on_ase_cccd_write(handle, 1, CCCD_NOTIFICATION_ENABLED);

        server.configure_codec(&mut transport, handle, 1, CodecConfiguration::default());
        server.release(&mut transport, handle, 1);
        server.released(&mut transport, handle, 1, true);
        server.on_can_send_now(&mut transport, handle);
        let last = transport.notified_ase.last().unwrap();
        assert_eq!(last.2[1], AseState::CodecConfigured as u8);
    }

    #[test]
    fn disconnect_drops_pending_response() {
        let mut server: AscsServer<4, 2> = AscsServer::init(&[Direction::Sink]).unwrap();
        let mut transport = FakeTransport::default();
        let handle = ConnectionHandle::new(1);
        server.on_connected(handle);

        let write = [0x01, 0x01, 0x01, 0x03, 0x02, 0x06, 0x00, 0x00, 0x00, 0x00, 0x00];
        server.handle_acp_write(&mut transport, handle, &write);
        server.on_disconnected(handle);

        let mut out = [0u8; 8];
        assert_eq!(server.handle_acp_read(handle, 0, &mut out), 0);
    }

    #[test]
    fn cccd_disabled_drops_notifications_without_getting_stuck() {
        let mut server: AscsServer<4, 2> = AscsServer::init(&[Direction::Sink]).unwrap();
        let mut transport = FakeTransport::default();
        let handle = ConnectionHandle::new(1);
        server.on_connected(handle);

        // Neither the ACP nor the ASE CCCD has been enabled.
        let write = [0x01, 0x01, 0x01, 0x03, 0x02, 0x06, 0x00, 0x00, 0x00, 0x00, 0x00];
        server.handle_acp_write(&mut transport, handle, &write);
        assert!(transport.can_send_now_requests.is_empty());

        server.configure_codec(&mut transport, handle, 1, CodecConfiguration::default());
        assert!(transport.can_send_now_requests.is_empty());
        assert!(transport.notified_ase.is_empty());
        assert!(transport.notified_acp.is_empty());
    }
}
