//! RFOS — a cooperative multitasking kernel with a framed radio
//! messaging stack.
//!
//! The kernel multiplexes up to eight programs over one CPU: a scheduling
//! decision runs at every explicit yield point, picks the next runnable
//! process under the active strategy, and hands the CPU over by freezing
//! the current execution and thawing the next one. Process stacks live in
//! a simulated SRAM image with the target 8-bit board's layout, so the
//! stack bounds and fingerprint checks guard the same bytes they would on
//! hardware.
//!
//! The messaging stack turns commands into checksummed frames on a
//! byte-oriented radio link and reassembles them on the far side, one
//! frame per worker invocation.

pub mod comm;
pub mod config;
pub mod sync;
pub mod task;
pub mod util;

pub use task::process::{OnStart, Pid, Priority, ProcessState, ProgramFn, ProgramId};
pub use task::scheduler::{ExecError, Kernel, global, install_global};
pub use task::strategies::Strategy;
