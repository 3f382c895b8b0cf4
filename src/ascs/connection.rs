//! Connection table (C2): per-connection ASE runtime state, the pending
//! ACP response buffer, and the scheduled-task bitmap.

use super::codec::{CodecConfiguration, Metadata, QosConfiguration};
use super::scheduler::ScheduledTasks;
use super::state::AseState;
use super::transport::ConnectionHandle;
use heapless::Vec;

/// Malformed-request sentinel for `response_count`: the ACP response
/// collapses to `opcode:u8, 0xFF`, with no per-ASE entries.
pub const RESPONSE_COUNT_MALFORMED: u8 = 0xFF;

/// Standard CCCD "Notifications enabled" bit (the only one this server
/// consults; indications are not used by ASCS).
pub const CCCD_NOTIFICATION_ENABLED: u16 = 0x0001;

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy)]
pub struct ResponseEntry {
    pub ase_id: u8,
    pub code: u8,
    pub reason: u8,
}

/// Per-ASE, per-connection mutable state. Distinct from
/// [`super::registry::AseCharacteristic`], which is the static, shared
/// (id, direction) pair assigned once at init.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Default)]
pub struct AseRuntime {
    pub state: AseState,
    pub codec_cfg: Option<CodecConfiguration>,
    pub qos_cfg: Option<QosConfiguration>,
    pub metadata: Metadata,
    pub cccd_value: u16,
    pub change_initiated_by_client: bool,
    pub notify_pending: bool,
}

pub struct Connection<const N: usize> {
    pub handle: ConnectionHandle,
    pub acp_cccd_value: u16,
    pub response_opcode: u8,
    pub response_count: u8,
    pub response: Vec<ResponseEntry, N>,
    pub scheduled_tasks: ScheduledTasks,
    pub ases: Vec<AseRuntime, N>,
    can_send_now_armed: bool,
}

impl<const N: usize> Connection<N> {
    fn new(handle: ConnectionHandle, ase_count: usize) -> Self {
        let mut ases = Vec::new();
        for _ in 0..ase_count {
            let _ = ases.push(AseRuntime::default());
        }
        Self {
            handle,
            acp_cccd_value: 0,
            response_opcode: 0,
            response_count: 0,
            response: Vec::new(),
            scheduled_tasks: ScheduledTasks::empty(),
            ases,
            can_send_now_armed: false,
        }
    }

    fn reset(&mut self) {
        self.handle = ConnectionHandle::INVALID;
        self.acp_cccd_value = 0;
        self.response_opcode = 0;
        self.response_count = 0;
        self.response.clear();
        self.scheduled_tasks = ScheduledTasks::empty();
        self.can_send_now_armed = false;
        for ase in self.ases.iter_mut() {
            *ase = AseRuntime::default();
        }
    }

    /// Whether a can-send-now callback is already outstanding for this
    /// connection (at most one slot per connection, per spec.md §5).
    pub fn can_send_now_armed(&self) -> bool {
        self.can_send_now_armed
    }

    pub fn set_can_send_now_armed(&mut self, armed: bool) {
        self.can_send_now_armed = armed;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectError {
    LimitExceeded,
}

pub struct ConnectionTable<const C: usize, const N: usize> {
    slots: Vec<Connection<N>, C>,
    ase_count: usize,
}

impl<const C: usize, const N: usize> ConnectionTable<C, N> {
    pub fn new(ase_count: usize) -> Self {
        let mut slots = Vec::new();
        for _ in 0..C {
            let _ = slots.push(Connection::new(ConnectionHandle::INVALID, ase_count));
        }
        Self { slots, ase_count }
    }

    /// Called on the link-layer connected event. Finds a free slot and
    /// attaches `handle` to it, or reports `CONNECTION_LIMIT_EXCEEDED` if
    /// every slot is already in use.
    pub fn on_connected(&mut self, handle: ConnectionHandle) -> Result<(), ConnectError> {
        if let Some(slot) = self.slots.iter_mut().find(|c| !c.handle.is_valid()) {
            *slot = Connection::new(handle, self.ase_count);
            Ok(())
        } else {
            Err(ConnectError::LimitExceeded)
        }
    }

    pub fn on_disconnected(&mut self, handle: ConnectionHandle) {
        if let Some(slot) = self.slots.iter_mut().find(|c| c.handle == handle) {
            slot.reset();
        }
    }

    pub fn get_mut(&mut self, handle: ConnectionHandle) -> Option<&mut Connection<N>> {
        self.slots.iter_mut().find(|c| c.handle == handle)
    }

    pub fn get(&self, handle: ConnectionHandle) -> Option<&Connection<N>> {
        self.slots.iter().find(|c| c.handle == handle)
    }

    /// Auto-attaches `handle` if it is not already tracked, mirroring
    /// `ascs_server_read_callback`'s call into `ascs_server_add_client`:
    /// a GATT read can arrive before any ACP write, and the connection
    /// table must not have missed the connected event in that case.
    pub fn get_or_attach(&mut self, handle: ConnectionHandle) -> Option<&mut Connection<N>> {
        if self.get(handle).is_none() {
            self.on_connected(handle).ok()?;
        }
        self.get_mut(handle)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Connection<N>> {
        self.slots.iter_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connects_and_disconnects() {
        let mut table: ConnectionTable<2, 4> = ConnectionTable::new(4);
        let h1 = ConnectionHandle::new(1);
        assert!(table.on_connected(h1).is_ok());
        assert!(table.get(h1).is_some());

        table.on_disconnected(h1);
        assert!(!table.get(h1).unwrap().handle.is_valid());
    }

    #[test]
    fn reports_limit_exceeded_when_full() {
        let mut table: ConnectionTable<1, 4> = ConnectionTable::new(4);
        assert!(table.on_connected(ConnectionHandle::new(1)).is_ok());
        assert_eq!(
            table.on_connected(ConnectionHandle::new(2)),
            Err(ConnectError::LimitExceeded)
        );
    }

    #[test]
    fn get_or_attach_allocates_lazily() {
        let mut table: ConnectionTable<2, 4> = ConnectionTable::new(4);
        let h1 = ConnectionHandle::new(7);
        assert!(table.get(h1).is_none());
        assert!(table.get_or_attach(h1).is_some());
        assert!(table.get(h1).is_some());
    }
}
