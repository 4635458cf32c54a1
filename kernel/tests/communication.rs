//! Receive state machine edge cases: timeouts, resynchronisation and
//! transport errors.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use rfos_kernel::Kernel;
use rfos_kernel::comm::{Address, RfAdapter};
use rhal::{Display, Led, LineStatus, Pipe, SensorReading, SensorSink, SimClock, Transport};

const OUR_ADDRESS: Address = Address::new(2, 0); // 0x10

/// Counts LED toggles; every test frame here carries TOGGLE_LED, so the
/// counter equals the number of dispatched frames.
#[derive(Default)]
struct ToggleCounter {
    toggles: AtomicUsize,
}

impl ToggleCounter {
    fn count(&self) -> usize {
        self.toggles.load(Ordering::Relaxed)
    }
}

impl Led for ToggleCounter {
    fn set(&self, _: bool) {}
    fn toggle(&self) {
        self.toggles.fetch_add(1, Ordering::Relaxed);
    }
}
impl Display for ToggleCounter {
    fn clear(&self) {}
    fn goto(&self, _: u8, _: u8) {}
    fn print(&self, _: &[u8]) {}
}
impl SensorSink for ToggleCounter {
    fn deliver(&self, _: SensorReading) {}
}

struct Rig {
    peer: Pipe,
    adapter: RfAdapter,
    kernel: Arc<Kernel>,
    clock: Arc<SimClock>,
    counter: Arc<ToggleCounter>,
}

fn rig() -> Rig {
    let (peer, local) = Pipe::pair();
    let clock = Arc::new(SimClock::new());
    let counter = Arc::new(ToggleCounter::default());
    let adapter = RfAdapter::new(
        Box::new(local),
        clock.clone(),
        OUR_ADDRESS,
        counter.clone(),
        counter.clone(),
        counter.clone(),
    );
    adapter.init();
    Rig {
        peer,
        adapter,
        kernel: Kernel::new(clock.clone()),
        clock,
        counter,
    }
}

/// A well-formed TOGGLE_LED frame addressed to `dest`.
fn toggle_frame(dest: u8) -> Vec<u8> {
    let mut bytes = vec![0x46, 0x52, 0x08, dest, 0x01, 0x02];
    let checksum = bytes.iter().fold(0u8, |acc, b| acc ^ b);
    bytes.push(checksum);
    bytes
}

// ── Timeouts ────────────────────────────────────────────────────

#[test]
fn worker_times_out_short_of_a_start_flag() {
    let mut r = rig();
    r.clock.set_auto_step(50);

    // One lone byte is never enough for the start flag; the worker
    // gives up after 500 ms without consuming it.
    r.peer.tx_write(&[0x46]);
    r.adapter.worker(&r.kernel);
    assert_eq!(r.counter.count(), 0);

    // Completing the frame later still works: the buffered byte was
    // left in place.
    r.peer.tx_write(&toggle_frame(0x10)[1..]);
    r.adapter.worker(&r.kernel);
    assert_eq!(r.counter.count(), 1);
}

#[test]
fn worker_times_out_mid_frame_and_recovers() {
    let mut r = rig();
    r.clock.set_auto_step(50);

    // A header promising 4 inner bytes that never arrive.
    r.peer.tx_write(&[0x46, 0x52, 0x08, 0x10, 0x04]);
    r.adapter.worker(&r.kernel);
    assert_eq!(r.counter.count(), 0);

    // The stale header was consumed whole, so the next frame starts
    // clean.
    r.peer.tx_write(&toggle_frame(0x10));
    r.adapter.worker(&r.kernel);
    assert_eq!(r.counter.count(), 1);
}

// ── Resynchronisation ───────────────────────────────────────────

#[test]
fn garbage_bytes_before_a_frame_are_skipped() {
    let mut r = rig();

    r.peer.tx_write(&[0x00, 0x37]);
    r.peer.tx_write(&toggle_frame(0x10));

    // One abort per garbage byte, then the real frame.
    for _ in 0..3 {
        r.adapter.worker(&r.kernel);
    }
    assert_eq!(r.counter.count(), 1);
}

#[test]
fn wrong_second_flag_byte_aborts() {
    let mut r = rig();
    r.clock.set_auto_step(50);

    r.peer.tx_write(&[0x46, 0x99]);
    r.adapter.worker(&r.kernel);
    assert_eq!(r.counter.count(), 0);
}

// ── Malformed headers and line errors ───────────────────────────

#[test]
fn oversize_inner_length_is_rejected() {
    let mut r = rig();
    r.clock.set_auto_step(50);

    // Inner length 50 is over the 49-byte limit.
    r.peer.tx_write(&[0x46, 0x52, 0x08, 0x10, 50]);
    r.adapter.worker(&r.kernel);
    assert_eq!(r.counter.count(), 0);
}

#[test]
fn transport_error_mid_header_aborts() {
    let mut r = rig();
    r.clock.set_auto_step(50);

    r.peer.tx_write(&[0x46, 0x52]);
    r.peer.inject_tx_error(LineStatus::OVERRUN);
    r.peer.tx_write(&[0x08, 0x10, 0x01]);

    r.adapter.worker(&r.kernel);
    assert_eq!(r.counter.count(), 0);
}

// ── Happy paths through the counter rig ─────────────────────────

#[test]
fn a_buffered_frame_is_dispatched_without_waiting() {
    let mut r = rig();
    // Time never moves; a fully buffered frame needs no waiting.
    r.peer.tx_write(&toggle_frame(0x10));
    r.adapter.worker(&r.kernel);
    assert_eq!(r.counter.count(), 1);
}

#[test]
fn broadcast_is_dispatched_and_unicast_elsewhere_is_not() {
    let mut r = rig();
    r.peer.tx_write(&toggle_frame(0xFF));
    r.peer.tx_write(&toggle_frame(0x30));
    r.peer.tx_write(&toggle_frame(0x10));
    for _ in 0..3 {
        r.adapter.worker(&r.kernel);
    }
    assert_eq!(r.counter.count(), 2);
}
