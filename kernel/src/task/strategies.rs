//! Scheduling strategies.
//!
//! Both strategies take the process table and the identifier of the
//! just-preempted process and return the next process to run, or `None`
//! when only the idle process is runnable. They are plain functions over
//! the table so that they can be exercised directly, decision by
//! decision, without touching an execution.

use crate::config::{MAX_PROCESSES, PRIORITY_COUNT};
use crate::task::process::{Pid, Priority, ProcessSlot, ProcessState};
use crate::task::queue::ReadyQueue;

/// Selectable scheduling strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    /// Every ready process gets one slice per rotation.
    #[default]
    RoundRobin,
    /// Per-priority ready queues with aging: one waiting process per
    /// level is promoted on every decision.
    DynamicPriorityRoundRobin,
}

/// Auxiliary strategy state: one ready queue per priority level, used
/// only by the dynamic-priority strategy.
pub(crate) struct SchedulingInfo {
    pub queues: [ReadyQueue; PRIORITY_COUNT],
}

impl SchedulingInfo {
    pub const fn new() -> Self {
        Self {
            queues: [ReadyQueue::new(), ReadyQueue::new(), ReadyQueue::new()],
        }
    }

    fn queue(&mut self, priority: Priority) -> &mut ReadyQueue {
        &mut self.queues[priority.queue_index()]
    }
}

/// Whether any process besides idle is ready.
fn any_ready(slots: &[ProcessSlot]) -> bool {
    slots[1..MAX_PROCESSES]
        .iter()
        .any(|slot| slot.state == ProcessState::Ready)
}

/// Flat round-robin: cyclic scan for the next ready non-idle slot,
/// starting right after the current one. Falls back to the current slot
/// if it is the only ready one left.
pub(crate) fn round_robin(slots: &[ProcessSlot], current: Pid) -> Option<Pid> {
    if !any_ready(slots) {
        return None;
    }

    let mut candidate = current.index();
    loop {
        candidate = (candidate + 1) % MAX_PROCESSES;
        if candidate == current.index() {
            break;
        }
        let slot = &slots[candidate];
        if slot.state == ProcessState::Ready && !slot.program.is_idle() {
            return Some(Pid(candidate as u8));
        }
    }

    let slot = &slots[current.index()];
    if slot.state == ProcessState::Ready && !slot.program.is_idle() {
        return Some(current);
    }
    None
}

/// Dynamic-priority round-robin with aging.
///
/// Order matters: the aging step runs before the preempted process is
/// requeued, so a process that just ran cannot be promoted by the very
/// decision that descheduled it.
pub(crate) fn dynamic_priority_round_robin(
    info: &mut SchedulingInfo,
    slots: &[ProcessSlot],
    current: Pid,
) -> Option<Pid> {
    // Aging: promote the head of each lower queue one level up.
    if !info.queue(Priority::Normal).is_empty() {
        let pid = info.queue(Priority::Normal).pop();
        info.queue(Priority::High).push(pid);
    }
    if !info.queue(Priority::Low).is_empty() {
        let pid = info.queue(Priority::Low).pop();
        info.queue(Priority::Normal).push(pid);
    }

    // Requeue the just-preempted process at its own priority.
    if !current.is_idle() && slots[current.index()].state == ProcessState::Ready {
        let priority = slots[current.index()].priority;
        info.queue(priority).push(current);
    }

    // Highest non-empty queue wins; FIFO inside a queue.
    for priority in [Priority::High, Priority::Normal, Priority::Low] {
        if !info.queue(priority).is_empty() {
            return Some(info.queue(priority).pop());
        }
    }
    None
}

/// Rebuild the strategy state for one process slot: drop stale queue
/// entries and requeue the slot if it is ready. Called from `exec` and
/// `kill`.
pub(crate) fn reset_for_process(
    strategy: Strategy,
    info: &mut SchedulingInfo,
    slots: &[ProcessSlot],
    pid: Pid,
) {
    if strategy != Strategy::DynamicPriorityRoundRobin {
        return;
    }
    for queue in info.queues.iter_mut() {
        queue.remove(pid);
    }
    let slot = &slots[pid.index()];
    if slot.state == ProcessState::Ready {
        info.queue(slot.priority).push(pid);
    }
}

/// Rebuild the strategy state from scratch: clear every queue and
/// enqueue every ready non-idle slot at its priority. Called when the
/// strategy changes and at scheduler initialization.
pub(crate) fn reset_all(strategy: Strategy, info: &mut SchedulingInfo, slots: &[ProcessSlot]) {
    if strategy != Strategy::DynamicPriorityRoundRobin {
        return;
    }
    for queue in info.queues.iter_mut() {
        queue.clear();
    }
    for index in 1..MAX_PROCESSES {
        let slot = &slots[index];
        if slot.state == ProcessState::Ready {
            info.queue(slot.priority).push(Pid(index as u8));
        }
    }
}
