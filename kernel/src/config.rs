//! Compile-time kernel configuration.
//!
//! All values derive from the target board: 8 KiB of SRAM carved into a
//! main stack, a dedicated scheduler stack, and eight equal process stack
//! slots, with the low region reserved for globals. A port to another CPU
//! adjusts only the SRAM geometry and the context save width.

use crate::task::process::Priority;

// ── System limits ───────────────────────────────────────────────

/// Maximum number of processes running at the same time (must be <= 8).
/// Includes the idle process, which always occupies slot 0.
pub const MAX_PROCESSES: usize = 8;

/// Maximum number of programs the kernel can know about (must be <= 16).
/// Index 0 is the idle program.
pub const MAX_PROGRAMS: usize = 16;

/// Number of priority levels (and of per-priority ready queues).
pub const PRIORITY_COUNT: usize = 3;

/// Priority given to autostarted processes.
pub const DEFAULT_PRIORITY: Priority = Priority::Low;

/// Nominal scheduler quantum in milliseconds. The hosted port has no
/// timer interrupt (every yield point is a tick), but callers that
/// reason about a quantum get this value.
pub const SCHEDULER_TICK_MS: u32 = 4;

// ── SRAM geometry ───────────────────────────────────────────────

/// Size of the simulated SRAM image.
pub const SRAM_SIZE: usize = 8192;

/// Low SRAM reserved for globals; stacks must stay above it.
pub const GLOBALS_RESERVED: usize = 1000;

/// The boot stack, at the very top of SRAM.
pub const MAIN_STACK_SIZE: usize = 32;

/// The scheduler's own stack, directly below the main stack.
pub const ISR_STACK_SIZE: usize = 192;

/// Stack slot size for one process.
pub const PROC_STACK_SIZE: usize =
    (SRAM_SIZE - GLOBALS_RESERVED - MAIN_STACK_SIZE - ISR_STACK_SIZE) / MAX_PROCESSES;

/// Bottom of the main stack (stacks grow downward, so this is the
/// highest address).
pub const BOTTOM_OF_MAIN_STACK: usize = SRAM_SIZE - 1;

/// Bottom of the scheduler stack.
pub const BOTTOM_OF_ISR_STACK: usize = BOTTOM_OF_MAIN_STACK - MAIN_STACK_SIZE;

/// Bottom of the process stack region.
pub const BOTTOM_OF_PROC_STACKS: usize = BOTTOM_OF_ISR_STACK - ISR_STACK_SIZE;

/// Bottom of the stack slot belonging to process `pid`.
pub const fn process_stack_bottom(pid: usize) -> usize {
    BOTTOM_OF_PROC_STACKS - pid * PROC_STACK_SIZE
}

// ── Context geometry ────────────────────────────────────────────

/// Width of the register-save area a context switch pushes: the full
/// register file plus the status register on the target part.
pub const CONTEXT_SIZE: usize = 33;

/// Width of a return address on the target part.
pub const RETURN_ADDR_SIZE: usize = 3;

/// Total bytes a freeze pushes onto the process stack.
pub const FRAME_SIZE: usize = CONTEXT_SIZE + RETURN_ADDR_SIZE;

// The stack carving must fit the SRAM.
const _: () = assert!(
    GLOBALS_RESERVED + MAIN_STACK_SIZE + ISR_STACK_SIZE + PROC_STACK_SIZE * MAX_PROCESSES
        <= SRAM_SIZE,
    "stack sizes exceed available SRAM"
);

// A stack slot must at least hold the initial frame.
const _: () = assert!(PROC_STACK_SIZE > FRAME_SIZE);
