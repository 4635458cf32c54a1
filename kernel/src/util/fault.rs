//! The fatal error sink.
//!
//! Kernel invariants are never tolerated: a stack violation, a critical
//! section miscount or a broken boot assumption ends the system here.
//! The hosted port reports through `log` and panics with the fault
//! message; a board port would paint the display and halt instead.

use core::fmt;

/// Terminate the system with a fault message. Never returns.
pub fn die(args: fmt::Arguments) -> ! {
    log::error!("KERNEL FAULT: {args}");
    panic!("{args}");
}

/// Report a fatal kernel fault, `format!`-style.
#[macro_export]
macro_rules! fatal {
    ($($arg:tt)*) => {
        $crate::util::fault::die(format_args!($($arg)*))
    };
}
