//! The full messaging stack: typed sends on one node, reception and
//! dispatch on the other.

use std::sync::{Arc, Mutex};

use rfos_kernel::Kernel;
use rfos_kernel::comm::{Address, InnerFrame, RfAdapter};
use rhal::{
    Display, Led, Pipe, SensorKind, SensorParam, SensorReading, SensorSink, SimClock, Transport,
};

// ── Recording effectors ─────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Event {
    LedSet(bool),
    LedToggle,
    Clear,
    Goto(u8, u8),
    Print(Vec<u8>),
    Sensor(SensorReading),
}

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<Event>>,
}

impl Recorder {
    fn take(&self) -> Vec<Event> {
        std::mem::take(&mut self.events.lock().unwrap())
    }

    fn push(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

impl Led for Recorder {
    fn set(&self, on: bool) {
        self.push(Event::LedSet(on));
    }
    fn toggle(&self) {
        self.push(Event::LedToggle);
    }
}

impl Display for Recorder {
    fn clear(&self) {
        self.push(Event::Clear);
    }
    fn goto(&self, x: u8, y: u8) {
        self.push(Event::Goto(x, y));
    }
    fn print(&self, text: &[u8]) {
        self.push(Event::Print(text.to_vec()));
    }
}

impl SensorSink for Recorder {
    fn deliver(&self, reading: SensorReading) {
        self.push(Event::Sensor(reading));
    }
}

// ── Harness ─────────────────────────────────────────────────────

const SENDER: Address = Address::new(1, 0); // 0x08
const RECEIVER: Address = Address::new(1, 1); // 0x09

struct Node {
    adapter: RfAdapter,
    recorder: Arc<Recorder>,
    kernel: Arc<Kernel>,
}

impl Node {
    fn new(transport: Pipe, address: Address) -> Node {
        let clock = Arc::new(SimClock::new());
        clock.set_auto_step(1);
        let recorder = Arc::new(Recorder::default());
        let adapter = RfAdapter::new(
            Box::new(transport),
            clock.clone(),
            address,
            recorder.clone(),
            recorder.clone(),
            recorder.clone(),
        );
        adapter.init();
        Node {
            adapter,
            recorder,
            kernel: Kernel::new(clock),
        }
    }

    fn pump(&self, times: usize) {
        for _ in 0..times {
            self.adapter.worker(&self.kernel);
        }
    }
}

fn linked_nodes() -> (Node, Node) {
    let (a, b) = Pipe::pair();
    (Node::new(a, SENDER), Node::new(b, RECEIVER))
}

// ── Tests ───────────────────────────────────────────────────────

#[test]
fn emitted_bytes_match_the_reference_frame() {
    let (mut raw_peer, node) = {
        let (a, b) = Pipe::pair();
        (a, Node::new(b, SENDER))
    };

    node.adapter.send_lcd_print(Address::BROADCAST, b"OK");

    let mut bytes = [0u8; 10];
    raw_peer.rx_read(&mut bytes).unwrap();
    assert_eq!(
        bytes,
        [0x46, 0x52, 0x08, 0xFF, 0x04, 0x12, 0x02, 0x4F, 0x4B, 0xF3]
    );
    assert_eq!(raw_peer.rx_count(), 0);
}

#[test]
fn every_command_round_trips() {
    let (sender, receiver) = linked_nodes();

    sender.adapter.send_set_led(RECEIVER, true);
    sender.adapter.send_toggle_led(RECEIVER);
    sender.adapter.send_lcd_clear(RECEIVER);
    sender.adapter.send_lcd_goto(RECEIVER, 2, 14);
    sender.adapter.send_lcd_print(RECEIVER, b"OK");
    sender.adapter.send_sensor_data(
        RECEIVER,
        SensorKind::Am2320,
        SensorParam::HumidityPercent,
        55.25,
    );

    receiver.pump(6);
    assert_eq!(
        receiver.recorder.take(),
        [
            Event::LedSet(true),
            Event::LedToggle,
            Event::Clear,
            Event::Goto(2, 14),
            Event::Print(b"OK".to_vec()),
            Event::Sensor(SensorReading {
                sensor: SensorKind::Am2320,
                param: SensorParam::HumidityPercent,
                value: 55.25,
            }),
        ]
    );
}

#[test]
fn long_print_text_is_clamped_to_32_bytes() {
    let (sender, receiver) = linked_nodes();
    sender.adapter.send_lcd_print(RECEIVER, &[b'x'; 40]);
    receiver.pump(1);
    assert_eq!(
        receiver.recorder.take(),
        [Event::Print(vec![b'x'; 32])]
    );
}

#[test]
fn empty_print_text_is_delivered() {
    let (sender, receiver) = linked_nodes();
    sender.adapter.send_lcd_print(RECEIVER, b"");
    receiver.pump(1);
    assert_eq!(receiver.recorder.take(), [Event::Print(Vec::new())]);
}

#[test]
fn corrupted_checksum_is_dropped_silently() {
    let (mut raw_peer, node) = {
        let (a, b) = Pipe::pair();
        (a, Node::new(b, SENDER))
    };

    // The reference frame with one payload byte flipped (4F -> 4E).
    raw_peer.tx_write(&[0x46, 0x52, 0x08, 0xFF, 0x04, 0x12, 0x02, 0x4E, 0x4B, 0xF3]);
    node.pump(1);
    assert_eq!(node.recorder.take(), []);
}

#[test]
fn frames_for_other_nodes_are_ignored() {
    let (sender, receiver) = linked_nodes();

    sender.adapter.send_set_led(Address::new(7, 7), true);
    receiver.pump(1);
    assert_eq!(receiver.recorder.take(), []);

    sender.adapter.send_set_led(RECEIVER, true);
    receiver.pump(1);
    assert_eq!(receiver.recorder.take(), [Event::LedSet(true)]);
}

#[test]
fn broadcast_frames_are_accepted_by_any_node() {
    let (sender, receiver) = linked_nodes();
    sender.adapter.send_toggle_led(Address::BROADCAST);
    receiver.pump(1);
    assert_eq!(receiver.recorder.take(), [Event::LedToggle]);
}

#[test]
fn unknown_commands_are_dropped_after_validation() {
    let (sender, receiver) = linked_nodes();
    sender
        .adapter
        .send(RECEIVER, &InnerFrame::new(0x7F, &[1, 2, 3]));
    receiver.pump(1);
    assert_eq!(receiver.recorder.take(), []);
}

#[test]
fn zero_length_inner_frame_is_dropped() {
    let (mut raw_peer, node) = {
        let (a, b) = Pipe::pair();
        (a, Node::new(b, RECEIVER))
    };

    // Hand-built frame with inner length 0; the checksum covers the
    // header only. There is no command byte, so nothing may dispatch.
    let header = [0x46u8, 0x52, 0x09, 0xFF, 0x00];
    let checksum = header.iter().fold(0u8, |acc, b| acc ^ b);
    raw_peer.tx_write(&header);
    raw_peer.tx_write(&[checksum]);

    node.pump(1);
    assert_eq!(node.recorder.take(), []);
}

#[test]
fn adapter_reports_initialization() {
    let node = Node::new(Pipe::loopback(), SENDER);
    assert!(node.adapter.is_initialized());
    assert_eq!(node.adapter.address(), SENDER);
}
