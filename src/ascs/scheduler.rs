//! Notification scheduler (C7): a per-connection bitmap of pending
//! send-on-next-can-send-now tasks, drained one task per send slot.
//!
//! Grounded in the original's `#define ASCS_TASK_SEND_*` bit constants
//! and `ascs_server_schedule_task`/`ascs_server_can_send_now`.

use bitflags::bitflags;

bitflags! {
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ScheduledTasks: u8 {
        const SEND_ACP_RESPONSE = 0b01;
        const SEND_ASE_VALUE_CHANGED = 0b10;
    }
}

/// Arms `task` on `tasks`, returning `true` if the bitmap was empty
/// beforehand (the caller must then call
/// [`GattTransport::request_can_send_now`](super::transport::GattTransport::request_can_send_now);
/// a callback is already outstanding otherwise).
pub fn arm(tasks: &mut ScheduledTasks, task: ScheduledTasks) -> bool {
    let was_empty = tasks.is_empty();
    tasks.insert(task);
    was_empty
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arming_from_empty_requests_a_callback() {
        let mut tasks = ScheduledTasks::empty();
        assert!(arm(&mut tasks, ScheduledTasks::SEND_ACP_RESPONSE));
        assert!(tasks.contains(ScheduledTasks::SEND_ACP_RESPONSE));
    }

    #[test]
    fn arming_an_already_armed_bitmap_does_not_re_request() {
        let mut tasks = ScheduledTasks::SEND_ACP_RESPONSE;
        assert!(!arm(&mut tasks, ScheduledTasks::SEND_ASE_VALUE_CHANGED));
        assert_eq!(tasks, ScheduledTasks::all());
    }
}
