//! Process identities, states and the program registry.
//!
//! A *program* is a registered entry-point function; a *process* is one of
//! the eight fixed slots a program can run in. The slot stores everything
//! the scheduler needs: the program id, the state, the saved stack top,
//! the priority and the stack fingerprint taken at the last deschedule.

use core::fmt;

use crate::config::{MAX_PROCESSES, MAX_PROGRAMS, process_stack_bottom};
use crate::task::context::Execution;

// ── Identifiers ─────────────────────────────────────────────────

/// Identifier of a process slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pid(pub u8);

impl Pid {
    /// The idle process always occupies slot 0.
    pub const IDLE: Pid = Pid(0);

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn is_idle(self) -> bool {
        self.0 == 0
    }

    /// Bottom of this process's stack slot (its highest address).
    pub(crate) fn stack_bottom(self) -> usize {
        process_stack_bottom(self.index())
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a registered program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramId(pub u8);

impl ProgramId {
    /// The idle program is pre-installed at index 0.
    pub const IDLE: ProgramId = ProgramId(0);

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn is_idle(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for ProgramId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A program entry point. Plain main-style functions: the dispatcher
/// wrapper supplies termination semantics when they return.
pub type ProgramFn = fn(&crate::task::scheduler::Kernel);

// ── Process state ───────────────────────────────────────────────

/// Scheduling state of a process slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessState {
    /// Slot is free.
    #[default]
    Unused,
    /// Ready to be scheduled.
    Ready,
    /// Currently holding the CPU.
    Running,
}

/// Process priority. The discriminant doubles as the ready-queue index,
/// so promotion moves a process to the numerically lower queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Priority {
    High = 0,
    Normal = 1,
    #[default]
    Low = 2,
}

impl Priority {
    pub(crate) fn queue_index(self) -> usize {
        self as usize
    }
}

/// Whether a program should be executed automatically at boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnStart {
    DontStart,
    Autostart,
}

// ── Process slot ────────────────────────────────────────────────

/// One entry of the process table.
pub(crate) struct ProcessSlot {
    /// The program this slot runs.
    pub program: ProgramId,
    /// Scheduling state.
    pub state: ProcessState,
    /// Saved stack top, an index into the SRAM image. Only meaningful
    /// while the slot is descheduled.
    pub sp: usize,
    /// Scheduling priority.
    pub priority: Priority,
    /// Stack fingerprint stored at the last deschedule.
    pub checksum: u8,
    /// The frozen execution occupying this slot.
    pub execution: Execution,
}

impl Default for ProcessSlot {
    fn default() -> Self {
        Self {
            program: ProgramId::IDLE,
            state: ProcessState::Unused,
            sp: 0,
            priority: Priority::default(),
            checksum: 0,
            execution: Execution::None,
        }
    }
}

// ── Program registry ────────────────────────────────────────────

/// The bounded, append-once table of program entry points.
///
/// Index 0 is the idle program, installed at kernel construction. Once a
/// program is written at an index that slot is never cleared, which is
/// what makes [`ProgramRegistry::registered_count`] meaningful.
pub(crate) struct ProgramRegistry {
    programs: [Option<ProgramFn>; MAX_PROGRAMS],
    autostart: u16,
}

impl ProgramRegistry {
    /// A registry with `idle` pre-installed (and autostarted) at index 0.
    pub fn new(idle: ProgramFn) -> Self {
        let mut programs = [None; MAX_PROGRAMS];
        programs[0] = Some(idle);
        Self {
            programs,
            autostart: 1,
        }
    }

    /// Register a program. Idempotent: re-registering a known function
    /// returns its existing id. Returns `None` when the registry is full.
    pub fn register(&mut self, program: ProgramFn, on_start: OnStart) -> Option<ProgramId> {
        let id = match self.lookup_id(program) {
            Some(existing) => existing,
            None => self.first_free_slot(program)?,
        };
        if on_start == OnStart::Autostart {
            self.autostart |= 1 << id.0;
        }
        Some(id)
    }

    /// Id under which `program` is registered, if any.
    pub fn lookup_id(&self, program: ProgramFn) -> Option<ProgramId> {
        self.programs
            .iter()
            .position(|p| matches!(p, Some(f) if core::ptr::fn_addr_eq(*f, program)))
            .map(|i| ProgramId(i as u8))
    }

    fn first_free_slot(&mut self, program: ProgramFn) -> Option<ProgramId> {
        // Index 0 is reserved for idle.
        let index = (1..MAX_PROGRAMS).find(|&i| self.programs[i].is_none())?;
        self.programs[index] = Some(program);
        Some(ProgramId(index as u8))
    }

    /// Entry point of program `id`, or `None` for unknown ids.
    pub fn lookup(&self, id: ProgramId) -> Option<ProgramFn> {
        self.programs.get(id.index()).copied().flatten()
    }

    /// Whether program `id` is flagged for automatic execution at boot.
    pub fn is_autostart(&self, id: ProgramId) -> bool {
        self.autostart & (1 << id.0) != 0
    }

    /// Number of registered programs. Works because programs cannot be
    /// unregistered, so the occupied prefix is contiguous.
    pub fn registered_count(&self) -> usize {
        self.programs.iter().take_while(|p| p.is_some()).count()
    }
}

// Slot identifiers must fit the table.
const _: () = assert!(MAX_PROCESSES <= 8);
const _: () = assert!(MAX_PROGRAMS <= 16);
