//! The command adapter on top of the framed link.
//!
//! Binds every received command to its effector and offers one typed
//! send per command. Malformed or unknown commands die here, silently;
//! a frame drop is not an event.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rhal::{Clock, Display, Led, SensorKind, SensorParam, SensorReading, SensorSink, Transport};

use crate::comm::command::{Command, LcdText};
use crate::comm::frame::{Address, Frame, InnerFrame};
use crate::comm::link::SerialLink;
use crate::task::scheduler::Kernel;

/// The radio adapter: one per node.
pub struct RfAdapter {
    link: SerialLink,
    led: Arc<dyn Led>,
    display: Arc<dyn Display>,
    sensors: Arc<dyn SensorSink>,
    initialized: AtomicBool,
}

impl RfAdapter {
    pub fn new(
        transport: Box<dyn Transport>,
        clock: Arc<dyn Clock>,
        address: Address,
        led: Arc<dyn Led>,
        display: Arc<dyn Display>,
        sensors: Arc<dyn SensorSink>,
    ) -> RfAdapter {
        RfAdapter {
            link: SerialLink::new(transport, clock, address),
            led,
            display,
            sensors,
            initialized: AtomicBool::new(false),
        }
    }

    /// Bring the adapter up. The hosted transport needs no setup beyond
    /// what construction already did.
    pub fn init(&self) {
        self.initialized.store(true, Ordering::Relaxed);
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Relaxed)
    }

    /// This node's address.
    pub fn address(&self) -> Address {
        self.link.address()
    }

    /// Main task of the adapter: assemble and dispatch at most one
    /// received frame. Call periodically.
    pub fn worker(&self, kernel: &Kernel) {
        self.link
            .worker(kernel, &mut |frame| self.process_frame(frame));
    }

    /// Dispatch one validated frame to its effector.
    fn process_frame(&self, frame: &Frame) {
        match Command::parse(&frame.inner) {
            Some(Command::SetLed { enable }) => self.led.set(enable),
            Some(Command::ToggleLed) => self.led.toggle(),
            Some(Command::LcdClear) => self.display.clear(),
            Some(Command::LcdGoto { x, y }) => self.display.goto(x, y),
            Some(Command::LcdPrint(text)) => self.display.print(text.as_bytes()),
            Some(Command::SensorData(reading)) => self.sensors.deliver(reading),
            None => {
                log::trace!("rx drop: unknown or malformed command from {}", frame.src);
            }
        }
    }

    // ── Typed send per command ──────────────────────────────────

    /// Send a raw inner frame.
    pub fn send(&self, dest: Address, inner: &InnerFrame) {
        self.link.write_frame(dest, inner);
    }

    pub fn send_set_led(&self, dest: Address, enable: bool) {
        self.send(dest, &Command::SetLed { enable }.encode());
    }

    pub fn send_toggle_led(&self, dest: Address) {
        self.send(dest, &Command::ToggleLed.encode());
    }

    pub fn send_lcd_clear(&self, dest: Address) {
        self.send(dest, &Command::LcdClear.encode());
    }

    pub fn send_lcd_goto(&self, dest: Address, x: u8, y: u8) {
        self.send(dest, &Command::LcdGoto { x, y }.encode());
    }

    /// Print `text` on the destination's display; clamped to 32 bytes.
    pub fn send_lcd_print(&self, dest: Address, text: &[u8]) {
        self.send(dest, &Command::LcdPrint(LcdText::clamped(text)).encode());
    }

    pub fn send_sensor_data(
        &self,
        dest: Address,
        sensor: SensorKind,
        param: SensorParam,
        value: f32,
    ) {
        let reading = SensorReading {
            sensor,
            param,
            value,
        };
        self.send(dest, &Command::SensorData(reading).encode());
    }
}
