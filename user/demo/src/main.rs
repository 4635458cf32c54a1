//! RFOS hosted demonstration.
//!
//! Boots the kernel over a loopback radio: one program sends the whole
//! command set to the broadcast address, one drains the radio and
//! dispatches what comes back, one just counts scheduling rounds. When
//! every program has terminated the kernel hands control back and the
//! demo reports what the effectors saw.
//!
//! Run with `RUST_LOG=debug` (or `trace`) for the full picture.

use std::sync::Arc;

use rfos_kernel::comm::{Address, RfAdapter};
use rfos_kernel::{Kernel, OnStart, global, install_global};
use rhal::{Clock, LogDisplay, LogLed, LogSensorSink, Pipe, SensorKind, SensorParam, SimClock};
use spin::Once;

/// Node address of this demo board: team 1, sub-id 0.
const NODE_ADDRESS: Address = Address::new(1, 0);

/// The radio adapter shared by every program, kernel-style global state.
static ADAPTER: Once<RfAdapter> = Once::new();

fn adapter() -> &'static RfAdapter {
    ADAPTER.get().expect("adapter not installed")
}

// ── Programs ────────────────────────────────────────────────────

/// Emits one frame per command to the broadcast address. On a loopback
/// link every frame comes right back at us.
fn sender(kernel: &Kernel) {
    let rf = adapter();
    rf.send_set_led(Address::BROADCAST, true);
    rf.send_toggle_led(Address::BROADCAST);
    rf.send_lcd_clear(Address::BROADCAST);
    rf.send_lcd_goto(Address::BROADCAST, 0, 1);
    rf.send_lcd_print(Address::BROADCAST, b"RFOS up");
    rf.send_sensor_data(
        Address::BROADCAST,
        SensorKind::Scd30,
        SensorParam::Co2Ppm,
        421.0,
    );
    log::info!("sender: 6 frames on the air");
    kernel.yield_now();
}

/// Drains the radio: one frame per worker call.
fn pump(kernel: &Kernel) {
    for _ in 0..6 {
        adapter().worker(kernel);
        kernel.yield_now();
    }
    log::info!("pump: done");
}

/// Counts a few scheduling rounds, then terminates.
fn counter(kernel: &Kernel) {
    for round in 1..=4 {
        log::debug!("counter: round {round} as process {}", kernel.current_pid());
        kernel.yield_now();
    }
}

// ── Boot ────────────────────────────────────────────────────────

fn main() {
    env_logger::init();

    let clock: Arc<SimClock> = Arc::new(SimClock::new());
    // Let polls move time, so a worker waiting on a silent link always
    // reaches its timeout.
    clock.set_auto_step(1);

    let led = Arc::new(LogLed::new());
    ADAPTER.call_once(|| {
        RfAdapter::new(
            Box::new(Pipe::loopback()),
            clock.clone() as Arc<dyn Clock>,
            NODE_ADDRESS,
            led.clone(),
            Arc::new(LogDisplay),
            Arc::new(LogSensorSink),
        )
    });
    adapter().init();

    let kernel = Kernel::new(clock);
    install_global(kernel.clone());

    let kernel = global();
    kernel
        .register_program(sender, OnStart::Autostart)
        .expect("program registry full");
    kernel
        .register_program(pump, OnStart::Autostart)
        .expect("program registry full");
    kernel
        .register_program(counter, OnStart::Autostart)
        .expect("program registry full");

    kernel.init();
    kernel.run_until_idle();

    log::info!(
        "all programs terminated; led is {}",
        if led.is_on() { "on" } else { "off" }
    );
    println!("rfos demo: ok");
}
