//! The simulated SRAM image and per-process stack bookkeeping.
//!
//! Process stacks live in one contiguous SRAM region carved between fixed
//! boundaries (see `config`). Stacks grow downward; the stack pointer
//! indexes the first free byte below the occupied region, so the bytes
//! `[sp, bottom]` are what the fingerprint and bounds checks look at.

use crate::config::{PROC_STACK_SIZE, SRAM_SIZE};
use crate::fatal;
use crate::task::process::Pid;

/// Number of sample positions the fingerprint reads.
const FINGERPRINT_SAMPLES: usize = 16;

/// The SRAM image backing every process stack.
pub(crate) struct Sram {
    bytes: [u8; SRAM_SIZE],
}

impl Sram {
    pub fn new() -> Self {
        Self {
            bytes: [0; SRAM_SIZE],
        }
    }

    /// Push `data` starting at `*sp`, lowering `*sp` past the written
    /// bytes. Running out of SRAM below the stacks is unrecoverable.
    pub fn push(&mut self, sp: &mut usize, data: &[u8]) {
        if *sp < data.len() {
            fatal!("stack overflow detected: push below SRAM");
        }
        for &byte in data {
            self.bytes[*sp] = byte;
            *sp -= 1;
        }
    }

    /// Pop `out.len()` bytes, raising `*sp` past them. The bytes come
    /// back in the order they were pushed.
    pub fn pop(&mut self, sp: &mut usize, out: &mut [u8]) {
        let len = out.len();
        for i in 0..len {
            *sp += 1;
            out[len - 1 - i] = self.bytes[*sp];
        }
    }

    #[cfg(test)]
    pub(crate) fn byte_mut(&mut self, index: usize) -> &mut u8 {
        &mut self.bytes[index]
    }

    /// Spare fingerprint of the stack of process `pid`: XOR over at most
    /// 16 samples evenly spread across `[sp, bottom]`, first sample at
    /// the stack top. Deterministic for a given stack content.
    pub fn fingerprint(&self, pid: Pid, sp: usize) -> u8 {
        let bottom = pid.stack_bottom();
        if sp > bottom {
            return 0;
        }

        let size = bottom - sp + 1;
        let samples = FINGERPRINT_SAMPLES.min(size);
        let step = if samples > 1 {
            (size - 1) / (samples - 1)
        } else {
            0
        };

        let mut checksum = 0;
        let mut addr = sp;
        for _ in 0..samples {
            checksum ^= self.bytes[addr];
            addr += step;
            if addr > bottom {
                addr = bottom;
            }
        }
        checksum
    }
}

/// Whether `sp` lies within the stack slot of process `pid`.
pub(crate) fn in_bounds(pid: Pid, sp: usize) -> bool {
    let bottom = pid.stack_bottom();
    let limit = bottom - PROC_STACK_SIZE + 1;
    sp >= limit && sp <= bottom
}
