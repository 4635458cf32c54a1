//! The scheduler: process lifecycle, critical sections and the context
//! switch.
//!
//! Everything here revolves around one state block behind an
//! interrupt-style lock: the process table, the program registry, the
//! current process id, the critical section depth, the strategy state and
//! the SRAM image. A scheduling pass freezes the current execution onto
//! its own stack, runs the stack sanity checks, asks the active strategy
//! for a successor and thaws it. The cooperative `yield_now` entry and
//! the timer tick of a board port share this exact sequence.
//!
//! Locking discipline: the state lock is never held across a handoff.
//! Every pass computes under the lock, extracts the gates it needs, drops
//! the lock, and only then wakes the successor and parks itself.

use std::panic::{AssertUnwindSafe, catch_unwind, panic_any, resume_unwind};
use std::sync::{Arc, Weak};

use rhal::Clock;
use spin::{Mutex, Once};

use crate::config::{DEFAULT_PRIORITY, MAX_PROCESSES, MAX_PROGRAMS};
use crate::fatal;
use crate::sync::gate::{Gate, Signal};
use crate::task::context::{self, Execution, ThawAction};
use crate::task::process::{
    OnStart, Pid, Priority, ProcessSlot, ProcessState, ProgramFn, ProgramId, ProgramRegistry,
};
use crate::task::stack::{self, Sram};
use crate::task::strategies::{self, SchedulingInfo, Strategy};

// ── Errors ──────────────────────────────────────────────────────

/// Recoverable `exec` failures. Kernel invariant violations never get an
/// error value; they go to the fatal sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ExecError {
    /// Every process slot is occupied.
    #[error("process table is full")]
    TableFull,
    /// The program id is not registered.
    #[error("program is not registered")]
    UnknownProgram,
}

/// Unwind payload that terminates a process thread without taking the
/// system down. Only ever thrown at a point where the CPU has already
/// been handed to another execution.
struct ProcessExit;

// ── Kernel state ────────────────────────────────────────────────

struct KernelState {
    slots: [ProcessSlot; MAX_PROCESSES],
    programs: ProgramRegistry,
    current: Pid,
    strategy: Strategy,
    info: SchedulingInfo,
    critical_depth: u8,
    started: bool,
    sram: Sram,
}

impl KernelState {
    fn new(idle: ProgramFn) -> Self {
        Self {
            slots: core::array::from_fn(|_| ProcessSlot::default()),
            programs: ProgramRegistry::new(idle),
            current: Pid::IDLE,
            strategy: Strategy::default(),
            info: SchedulingInfo::new(),
            critical_depth: 0,
            started: false,
            sram: Sram::new(),
        }
    }

    /// Create a process for `program`: find a free slot, seed its stack
    /// with the synthetic initial frame and hand it to the strategy.
    fn exec(&mut self, program: ProgramId, priority: Priority) -> Result<Pid, ExecError> {
        let index = (0..MAX_PROCESSES)
            .find(|&i| self.slots[i].state == ProcessState::Unused)
            .ok_or(ExecError::TableFull)?;
        let pid = Pid(index as u8);

        if self.programs.lookup(program).is_none() {
            return Err(ExecError::UnknownProgram);
        }

        let slot = &mut self.slots[index];
        slot.program = program;
        slot.state = ProcessState::Ready;
        slot.priority = priority;
        slot.execution = Execution::Seeded;

        // Seed the stack so that the first restore returns into the
        // dispatcher wrapper.
        let mut sp = pid.stack_bottom();
        context::seed_initial_frame(&mut self.sram, &mut sp);
        slot.sp = sp;
        slot.checksum = self.sram.fingerprint(pid, sp);

        strategies::reset_for_process(self.strategy, &mut self.info, &self.slots, pid);

        log::info!("exec: program {program} -> process {pid} ({priority:?})");
        Ok(pid)
    }

    /// Save the current execution onto its own stack and validate it.
    fn freeze_current(&mut self) {
        let pid = self.current;
        let mut sp = self.slots[pid.index()].sp;
        context::push_frame(&mut self.sram, &mut sp);
        self.slots[pid.index()].sp = sp;

        // From here the scheduler conceptually runs on its own stack.
        if !stack::in_bounds(pid, sp) {
            fatal!("stack overflow detected on process {pid}");
        }
        self.slots[pid.index()].checksum = self.sram.fingerprint(pid, sp);

        if self.slots[pid.index()].state == ProcessState::Running {
            self.slots[pid.index()].state = ProcessState::Ready;
        }
    }

    /// Ask the active strategy for the next process; idle when none.
    fn select_next(&mut self) -> Pid {
        let next = match self.strategy {
            Strategy::RoundRobin => strategies::round_robin(&self.slots, self.current),
            Strategy::DynamicPriorityRoundRobin => {
                strategies::dynamic_priority_round_robin(&mut self.info, &self.slots, self.current)
            }
        };
        next.unwrap_or(Pid::IDLE)
    }

    /// Validate the incoming slot, restore its stack pointer and return
    /// what the backend must do to resume it.
    fn thaw(&mut self, pid: Pid) -> ThawAction {
        self.slots[pid.index()].state = ProcessState::Running;

        let sp = self.slots[pid.index()].sp;
        if self.sram.fingerprint(pid, sp) != self.slots[pid.index()].checksum {
            fatal!("stack corruption detected on process {pid}");
        }
        if !stack::in_bounds(pid, sp) {
            fatal!("stack overflow detected on process {pid}");
        }

        let mut sp = sp;
        let start = context::pop_frame(&mut self.sram, &mut sp, pid);
        self.slots[pid.index()].sp = sp;

        let gate = if start {
            let gate = Arc::new(Gate::new());
            self.slots[pid.index()].execution = Execution::Live(gate.clone());
            gate
        } else {
            match &self.slots[pid.index()].execution {
                Execution::Live(gate) => gate.clone(),
                _ => fatal!("resume of process {pid} without a live execution"),
            }
        };
        ThawAction { pid, gate, start }
    }

    fn current_gate(&self) -> Arc<Gate> {
        match &self.slots[self.current.index()].execution {
            Execution::Live(gate) => gate.clone(),
            _ => fatal!("current process {} has no live execution", self.current),
        }
    }
}

// ── The kernel ──────────────────────────────────────────────────

/// The RFOS kernel: one instance owns the whole scheduler and is shared
/// by every process of the system.
pub struct Kernel {
    state: Mutex<KernelState>,
    clock: Arc<dyn Clock>,
    self_ref: Weak<Kernel>,
}

impl Kernel {
    /// Build a kernel over the given clock. The idle program is
    /// installed in the registry before anything else can register.
    pub fn new(clock: Arc<dyn Clock>) -> Arc<Kernel> {
        Arc::new_cyclic(|self_ref| Kernel {
            state: Mutex::new(KernelState::new(idle_program)),
            clock,
            self_ref: self_ref.clone(),
        })
    }

    /// The clock this kernel was built over.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    // ── Program registry ────────────────────────────────────────

    /// Register a program entry point. Idempotent on the function;
    /// `None` when the registry is full.
    pub fn register_program(&self, program: ProgramFn, on_start: OnStart) -> Option<ProgramId> {
        self.state.lock().programs.register(program, on_start)
    }

    /// Entry point of `program`, or `None` for unknown ids.
    pub fn lookup_program(&self, program: ProgramId) -> Option<ProgramFn> {
        self.state.lock().programs.lookup(program)
    }

    /// Id under which `program` is registered, or `None`.
    pub fn lookup_program_id(&self, program: ProgramFn) -> Option<ProgramId> {
        self.state.lock().programs.lookup_id(program)
    }

    /// Number of registered programs.
    pub fn registered_program_count(&self) -> usize {
        self.state.lock().programs.registered_count()
    }

    // ── Critical sections ───────────────────────────────────────

    /// Enter a critical section: the scheduler will not run until the
    /// matching `leave_critical`. Nests up to 255 deep.
    pub fn enter_critical(&self) {
        let mut st = self.state.lock();
        if st.critical_depth == u8::MAX {
            fatal!("critical section overflow");
        }
        st.critical_depth += 1;
        // The tick source stays masked for as long as the depth is
        // non-zero; on this port the depth check in yield_now is the
        // mask.
    }

    /// Leave a critical section, re-enabling the scheduler when the
    /// outermost one closes.
    pub fn leave_critical(&self) {
        let mut st = self.state.lock();
        if st.critical_depth == 0 {
            fatal!("critical section underflow");
        }
        st.critical_depth -= 1;
    }

    /// Current critical-section nesting depth.
    pub fn critical_depth(&self) -> u8 {
        self.state.lock().critical_depth
    }

    // ── Introspection ───────────────────────────────────────────

    /// Identifier of the currently running process.
    pub fn current_pid(&self) -> Pid {
        self.state.lock().current
    }

    /// Number of occupied process slots, idle included.
    pub fn active_count(&self) -> usize {
        self.state
            .lock()
            .slots
            .iter()
            .filter(|slot| slot.state != ProcessState::Unused)
            .count()
    }

    /// State of one process slot.
    pub fn process_state(&self, pid: Pid) -> Option<ProcessState> {
        if pid.index() >= MAX_PROCESSES {
            return None;
        }
        Some(self.state.lock().slots[pid.index()].state)
    }

    /// Switch the scheduling strategy. Takes effect at the next
    /// decision; the current process is not preempted.
    pub fn set_strategy(&self, strategy: Strategy) {
        let mut st = self.state.lock();
        let st = &mut *st;
        strategies::reset_all(strategy, &mut st.info, &st.slots);
        st.strategy = strategy;
        log::debug!("strategy -> {strategy:?}");
    }

    pub fn get_strategy(&self) -> Strategy {
        self.state.lock().strategy
    }

    // ── Process lifecycle ───────────────────────────────────────

    /// Start a process running `program` at `priority`.
    pub fn exec(&self, program: ProgramId, priority: Priority) -> Result<Pid, ExecError> {
        self.enter_critical();
        let result = self.state.lock().exec(program, priority);
        self.leave_critical();
        result
    }

    /// Destroy process `pid`. Refuses the idle process and invalid or
    /// unused slots. Killing the current process does not return.
    pub fn kill(&self, pid: Pid) -> bool {
        if pid.is_idle() || pid.index() >= MAX_PROCESSES {
            return false;
        }

        self.enter_critical();
        let (is_self, victim) = {
            let mut st = self.state.lock();
            if st.slots[pid.index()].state == ProcessState::Unused {
                drop(st);
                self.leave_critical();
                return false;
            }

            let st = &mut *st;
            let execution =
                core::mem::replace(&mut st.slots[pid.index()].execution, Execution::None);
            st.slots[pid.index()].state = ProcessState::Unused;
            strategies::reset_for_process(st.strategy, &mut st.info, &st.slots, pid);

            let is_self = pid == st.current;
            let victim = match execution {
                Execution::Live(gate) if !is_self => Some(gate),
                _ => None,
            };
            (is_self, victim)
        };
        log::info!("kill: process {pid}");

        if is_self {
            // Unwind every critical section the dying process still
            // holds (including the one opened above), then give the CPU
            // away for good.
            while self.critical_depth() > 0 {
                self.leave_critical();
            }
            self.exit_current();
        }

        if let Some(gate) = victim {
            // The parked thread unwinds itself; it never runs program
            // code again.
            gate.open(Signal::Exit);
        }
        self.leave_critical();
        true
    }

    /// Give up the CPU voluntarily. No-op inside a critical section and
    /// before the scheduler has been started.
    pub fn yield_now(&self) {
        {
            let st = self.state.lock();
            if !st.started || st.critical_depth > 0 {
                return;
            }
        }
        self.reschedule();
    }

    // ── Boot ────────────────────────────────────────────────────

    /// Initialize the scheduler: wipe the process table, start the idle
    /// process and every autostart-flagged program, and reset the
    /// strategy state.
    pub fn init(&self) {
        {
            let mut st = self.state.lock();
            if st.started {
                fatal!("scheduler already running");
            }
            for slot in st.slots.iter_mut() {
                *slot = ProcessSlot::default();
            }
            if st.programs.lookup(ProgramId::IDLE).is_none() {
                fatal!("idle program not registered");
            }
        }

        match self.exec(ProgramId::IDLE, Priority::Low) {
            Ok(pid) if pid == Pid::IDLE => {}
            _ => fatal!("failed to start the idle process"),
        }

        let autostart: Vec<ProgramId> = {
            let st = self.state.lock();
            (1..MAX_PROGRAMS as u8)
                .map(ProgramId)
                .filter(|&id| st.programs.lookup(id).is_some() && st.programs.is_autostart(id))
                .collect()
        };
        for id in autostart {
            if let Err(err) = self.exec(id, DEFAULT_PRIORITY) {
                log::warn!("autostart of program {id} failed: {err}");
            }
        }

        let mut st = self.state.lock();
        let st = &mut *st;
        strategies::reset_all(st.strategy, &mut st.info, &st.slots);
        log::info!(
            "scheduler initialized: {} programs registered",
            st.programs.registered_count()
        );
    }

    /// Hand the calling thread over to the scheduler forever. The caller
    /// becomes the idle execution; control only ever comes back here
    /// when no other process is ready.
    pub fn run(&self) -> ! {
        self.adopt_boot_thread();
        loop {
            self.yield_now();
            std::thread::yield_now();
        }
    }

    /// Like [`Kernel::run`], but returns once every non-idle slot is
    /// unused, the hosted equivalent of "all programs terminated".
    pub fn run_until_idle(&self) {
        self.adopt_boot_thread();
        loop {
            {
                let st = self.state.lock();
                let drained = st.slots[1..]
                    .iter()
                    .all(|slot| slot.state == ProcessState::Unused);
                if drained {
                    break;
                }
            }
            self.yield_now();
        }
    }

    /// Make the calling thread the idle execution (slot 0).
    fn adopt_boot_thread(&self) {
        install_exit_hook();
        let mut st = self.state.lock();
        if st.started {
            // Re-entry from the same boot thread after a previous
            // run_until_idle; nothing to do.
            return;
        }
        if st.slots[Pid::IDLE.index()].state == ProcessState::Unused {
            fatal!("scheduler started before init");
        }
        st.started = true;
        st.current = Pid::IDLE;
        st.slots[Pid::IDLE.index()].state = ProcessState::Running;
        st.slots[Pid::IDLE.index()].execution = Execution::Live(Arc::new(Gate::new()));
        log::info!("scheduler running ({:?})", st.strategy);
    }

    // ── Context switch ──────────────────────────────────────────

    /// One full scheduling pass, entered on the current execution's
    /// thread: freeze, select, thaw, hand over, park.
    fn reschedule(&self) {
        let (my_gate, action) = {
            let mut st = self.state.lock();
            if !st.started {
                return;
            }
            let my_gate = st.current_gate();
            st.freeze_current();
            let next = st.select_next();
            log::trace!("tick: {} -> {}", st.current, next);
            st.current = next;
            let action = st.thaw(next);
            (my_gate, action)
        };

        self.hand_over(action);
        match my_gate.wait() {
            Signal::Run => {}
            Signal::Exit => panic_any(ProcessExit),
        }
    }

    /// Give the CPU away without saving the current execution; its slot
    /// is already gone. Never returns.
    fn exit_current(&self) -> ! {
        let action = {
            let mut st = self.state.lock();
            let next = st.select_next();
            log::trace!("exit: -> {next}");
            st.current = next;
            st.thaw(next)
        };
        self.hand_over(action);
        panic_any(ProcessExit)
    }

    /// Wake the thawed execution, spawning its thread on first entry.
    fn hand_over(&self, action: ThawAction) {
        if action.start {
            self.spawn_dispatcher(action.pid, action.gate.clone());
        }
        action.gate.open(Signal::Run);
    }

    fn spawn_dispatcher(&self, pid: Pid, gate: Arc<Gate>) {
        let Some(kernel) = self.self_ref.upgrade() else {
            fatal!("kernel dropped while scheduling");
        };
        let spawned = std::thread::Builder::new()
            .name(format!("rfos-pid-{pid}"))
            .spawn(move || {
                match gate.wait() {
                    Signal::Run => {}
                    // Killed before it ever ran.
                    Signal::Exit => return,
                }
                dispatcher(&kernel, pid);
            });
        if spawned.is_err() {
            fatal!("failed to spawn execution for process {pid}");
        }
    }
}

// ── Dispatcher wrapper ──────────────────────────────────────────

/// Every process starts here: look up the slot's program, run it, and
/// clean up when it returns, so that plain main-style functions get
/// termination semantics for free.
fn dispatcher(kernel: &Kernel, pid: Pid) {
    let program = {
        let st = kernel.state.lock();
        let id = st.slots[pid.index()].program;
        st.programs.lookup(id)
    };

    let outcome = catch_unwind(AssertUnwindSafe(|| {
        if let Some(program) = program {
            program(kernel);
        }
    }));
    match outcome {
        // Killed (or finished killing itself) while running.
        Err(payload) if payload.is::<ProcessExit>() => return,
        // A real panic in program code takes the system down.
        Err(payload) => {
            log::error!("process {pid} panicked; system halted");
            resume_unwind(payload);
        }
        Ok(()) => {}
    }

    if pid.is_idle() {
        fatal!("unexpected return from idle");
    }
    kernel.kill(pid);
    // kill of the current process never returns.
    fatal!("kill of terminating process {pid} returned");
}

/// The idle program. On the hosted port the boot thread acts as the idle
/// execution itself, so this body only runs on a board port, where it
/// spins the CPU that no other process wants.
fn idle_program(kernel: &Kernel) {
    loop {
        kernel.yield_now();
        std::thread::yield_now();
    }
}

/// Silence the unwind used to terminate process threads; every other
/// panic keeps the default reporting.
fn install_exit_hook() {
    static HOOK: Once<()> = Once::new();
    HOOK.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            if info.payload().downcast_ref::<ProcessExit>().is_none() {
                previous(info);
            }
        }));
    });
}

// ── Global kernel ───────────────────────────────────────────────

static KERNEL: Once<Arc<Kernel>> = Once::new();

/// Install the kernel instance behind the global accessor. One-shot:
/// later calls are ignored.
pub fn install_global(kernel: Arc<Kernel>) {
    KERNEL.call_once(|| kernel);
}

/// The globally installed kernel. Faults if none was installed.
pub fn global() -> &'static Kernel {
    match KERNEL.get() {
        Some(kernel) => kernel,
        None => fatal!("no global kernel installed"),
    }
}
