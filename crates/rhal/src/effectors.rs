//! Per-command effectors.
//!
//! Each received command ultimately drives one of these devices. The
//! kernel's dispatch table only ever sees the traits; what sits behind
//! them (a port pin, a character LCD, a telemetry store) is the board's
//! business.

use core::sync::atomic::{AtomicBool, Ordering};

// ── Sensor vocabulary ───────────────────────────────────────────

/// Sensors known to the network, by their part number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SensorKind {
    Mpl3115a2 = 1,
    Am2320 = 2,
    Scd30 = 3,
    Mcp9808 = 4,
    Bmp388 = 5,
    Lps331ap = 6,
    AlsPt19 = 7,
    Sgp30 = 8,
}

impl SensorKind {
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            1 => Self::Mpl3115a2,
            2 => Self::Am2320,
            3 => Self::Scd30,
            4 => Self::Mcp9808,
            5 => Self::Bmp388,
            6 => Self::Lps331ap,
            7 => Self::AlsPt19,
            8 => Self::Sgp30,
            _ => return None,
        })
    }
}

/// Physical quantity carried by a sensor reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SensorParam {
    TemperatureCelsius = 1,
    HumidityPercent = 2,
    LightIntensityPercent = 3,
    AltitudeMeters = 4,
    PressurePascal = 5,
    ECo2Ppm = 6,
    TvocPpb = 7,
    Co2Ppm = 8,
}

impl SensorParam {
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            1 => Self::TemperatureCelsius,
            2 => Self::HumidityPercent,
            3 => Self::LightIntensityPercent,
            4 => Self::AltitudeMeters,
            5 => Self::PressurePascal,
            6 => Self::ECo2Ppm,
            7 => Self::TvocPpb,
            8 => Self::Co2Ppm,
            _ => return None,
        })
    }
}

/// One measurement as it travels over the air.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorReading {
    pub sensor: SensorKind,
    pub param: SensorParam,
    pub value: f32,
}

// ── Effector contracts ──────────────────────────────────────────

/// The board indicator LED.
pub trait Led: Send + Sync {
    fn set(&self, on: bool);
    fn toggle(&self);
}

/// The character display.
pub trait Display: Send + Sync {
    fn clear(&self);
    /// Move the cursor to `(column, row)`.
    fn goto(&self, x: u8, y: u8);
    fn print(&self, text: &[u8]);
}

/// Consumer for sensor readings received from other nodes.
pub trait SensorSink: Send + Sync {
    fn deliver(&self, reading: SensorReading);
}

// ── Logging implementations ─────────────────────────────────────

/// LED that keeps its state in a flag and reports through `log`.
#[derive(Default)]
pub struct LogLed {
    on: AtomicBool,
}

impl LogLed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_on(&self) -> bool {
        self.on.load(Ordering::Relaxed)
    }
}

impl Led for LogLed {
    fn set(&self, on: bool) {
        self.on.store(on, Ordering::Relaxed);
        log::info!("led: {}", if on { "on" } else { "off" });
    }

    fn toggle(&self) {
        let was = self.on.fetch_xor(true, Ordering::Relaxed);
        log::info!("led: toggled {}", if was { "off" } else { "on" });
    }
}

/// Display that reports through `log`.
#[derive(Default)]
pub struct LogDisplay;

impl Display for LogDisplay {
    fn clear(&self) {
        log::info!("display: clear");
    }

    fn goto(&self, x: u8, y: u8) {
        log::info!("display: cursor to ({x}, {y})");
    }

    fn print(&self, text: &[u8]) {
        log::info!("display: {:?}", String::from_utf8_lossy(text));
    }
}

/// Sensor sink that reports through `log`.
#[derive(Default)]
pub struct LogSensorSink;

impl SensorSink for LogSensorSink {
    fn deliver(&self, reading: SensorReading) {
        log::info!(
            "sensor: {:?} {:?} = {}",
            reading.sensor,
            reading.param,
            reading.value
        );
    }
}
