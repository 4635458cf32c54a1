//! Frozen executions and the hosted context-switch backend.
//!
//! The scheduler never manipulates registers directly; it freezes and
//! thaws opaque execution values. Freezing pushes a synthetic return
//! address and a zeroed register-save area onto the process's simulated
//! stack (the same bytes, in the same order, that the target part's
//! context-save macro emits); thawing pops them. The popped return
//! address tells the backend whether the execution is entering the
//! dispatcher for the first time or resuming where it stopped.
//!
//! On the hosted platform the actual machine state lives in a parked OS
//! thread per process; the gate under each execution is the handoff
//! point. Only one execution is ever awake outside the handoff window.

use std::sync::Arc;

use crate::config::{CONTEXT_SIZE, RETURN_ADDR_SIZE};
use crate::fatal;
use crate::sync::gate::Gate;
use crate::task::process::Pid;
use crate::task::stack::Sram;

/// Synthetic return address installed by `exec`: the first thaw of this
/// execution enters the dispatcher wrapper. A board port would push the
/// dispatcher's real address here.
pub(crate) const DISPATCHER_ENTRY: [u8; RETURN_ADDR_SIZE] = [0x00, 0x2A, 0xD0];

/// Synthetic return address pushed by a freeze: the next thaw resumes
/// the execution at the point it was interrupted.
pub(crate) const RESUME_ENTRY: [u8; RETURN_ADDR_SIZE] = [0x00, 0x2A, 0xD4];

/// The execution occupying a process slot.
pub(crate) enum Execution {
    /// No execution; the slot is free.
    None,
    /// Seeded by `exec` but never run. The synthetic initial frame is on
    /// the stack; no thread exists yet.
    Seeded,
    /// A live, currently-parked (or running) execution.
    Live(Arc<Gate>),
}

/// What the scheduler must do after thawing a slot.
pub(crate) struct ThawAction {
    pub pid: Pid,
    pub gate: Arc<Gate>,
    /// True when the execution enters the dispatcher for the first time
    /// (a thread must be spawned before opening the gate).
    pub start: bool,
}

/// Seed the initial frame for a fresh process: the dispatcher entry as a
/// pending return, then a zeroed register-save area.
pub(crate) fn seed_initial_frame(sram: &mut Sram, sp: &mut usize) {
    sram.push(sp, &DISPATCHER_ENTRY);
    sram.push(sp, &[0u8; CONTEXT_SIZE]);
}

/// Push the frozen context of the interrupted execution.
pub(crate) fn push_frame(sram: &mut Sram, sp: &mut usize) {
    sram.push(sp, &RESUME_ENTRY);
    sram.push(sp, &[0u8; CONTEXT_SIZE]);
}

/// Pop a frozen context and report how the execution continues.
pub(crate) fn pop_frame(sram: &mut Sram, sp: &mut usize, pid: Pid) -> bool {
    let mut context = [0u8; CONTEXT_SIZE];
    sram.pop(sp, &mut context);

    let mut entry = [0u8; RETURN_ADDR_SIZE];
    sram.pop(sp, &mut entry);
    match entry {
        DISPATCHER_ENTRY => true,
        RESUME_ENTRY => false,
        _ => fatal!("stack corruption detected on process {pid}: bad return address"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FRAME_SIZE, process_stack_bottom};

    #[test]
    fn seeded_frame_thaws_into_the_dispatcher() {
        let mut sram = Sram::new();
        let bottom = process_stack_bottom(1);
        let mut sp = bottom;
        seed_initial_frame(&mut sram, &mut sp);
        assert_eq!(sp, bottom - FRAME_SIZE);

        assert!(pop_frame(&mut sram, &mut sp, Pid(1)));
        assert_eq!(sp, bottom);
    }

    #[test]
    fn frozen_frame_thaws_into_a_resume() {
        let mut sram = Sram::new();
        let bottom = process_stack_bottom(1);
        let mut sp = bottom - FRAME_SIZE; // resting position after exec
        push_frame(&mut sram, &mut sp);
        assert_eq!(sp, bottom - 2 * FRAME_SIZE);

        assert!(!pop_frame(&mut sram, &mut sp, Pid(1)));
        assert_eq!(sp, bottom - FRAME_SIZE);
    }

    #[test]
    #[should_panic(expected = "bad return address")]
    fn garbage_return_address_faults() {
        let mut sram = Sram::new();
        let bottom = process_stack_bottom(1);
        let mut sp = bottom;
        sram.push(&mut sp, &[0xBE, 0xEF, 0x00]);
        sram.push(&mut sp, &[0u8; CONTEXT_SIZE]);
        pop_frame(&mut sram, &mut sp, Pid(1));
    }
}
