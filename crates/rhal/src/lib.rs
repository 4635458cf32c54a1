//! Hardware Abstraction Layer for RFOS.
//!
//! The kernel core never talks to a device directly; it goes through the
//! contracts defined here. A board port implements them against real
//! peripherals, the hosted port implements them against simulated ones.

pub mod clock;
pub mod effectors;
pub mod radio;

pub use clock::{Clock, SimClock, WallClock};
pub use effectors::{
    Display, Led, LogDisplay, LogLed, LogSensorSink, SensorKind, SensorParam, SensorReading,
    SensorSink,
};
pub use radio::{LineStatus, Pipe, RxError, Transport};
