//! The inner command codec.
//!
//! Commands are a closed set of one-byte identifiers with fixed payload
//! schemas. Receiving goes through [`Command::parse`], which enforces
//! the exact expected length for every identifier; anything that does
//! not match comes back as `None` and is silently dropped by the
//! dispatcher.

use rhal::{SensorKind, SensorParam, SensorReading};

use crate::comm::frame::InnerFrame;

// ── Command identifiers ─────────────────────────────────────────

pub const CMD_SET_LED: u8 = 0x01;
pub const CMD_TOGGLE_LED: u8 = 0x02;
pub const CMD_LCD_CLEAR: u8 = 0x10;
pub const CMD_LCD_GOTO: u8 = 0x11;
pub const CMD_LCD_PRINT: u8 = 0x12;
pub const CMD_SENSOR_DATA: u8 = 0x20;

/// Longest text an `LcdPrint` can carry.
pub const MAX_LCD_TEXT_LEN: usize = 32;

// ── Display text ────────────────────────────────────────────────

/// Text payload of `LcdPrint`, clamped to 32 bytes.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct LcdText {
    buf: [u8; MAX_LCD_TEXT_LEN],
    len: u8,
}

impl LcdText {
    /// Take at most the first 32 bytes of `text`.
    pub fn clamped(text: &[u8]) -> LcdText {
        let len = text.len().min(MAX_LCD_TEXT_LEN);
        let mut buf = [0u8; MAX_LCD_TEXT_LEN];
        buf[..len].copy_from_slice(&text[..len]);
        LcdText {
            buf,
            len: len as u8,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len as usize]
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl core::fmt::Debug for LcdText {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "LcdText({:?})", String::from_utf8_lossy(self.as_bytes()))
    }
}

// ── Commands ────────────────────────────────────────────────────

/// Every command the dispatch table knows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    /// Drive the indicator LED on or off.
    SetLed { enable: bool },
    /// Flip the indicator LED.
    ToggleLed,
    /// Clear the display.
    LcdClear,
    /// Move the display cursor to (column, row).
    LcdGoto { x: u8, y: u8 },
    /// Print text on the display.
    LcdPrint(LcdText),
    /// Deliver a sensor reading to the local consumer.
    SensorData(SensorReading),
}

impl Command {
    pub fn id(&self) -> u8 {
        match self {
            Command::SetLed { .. } => CMD_SET_LED,
            Command::ToggleLed => CMD_TOGGLE_LED,
            Command::LcdClear => CMD_LCD_CLEAR,
            Command::LcdGoto { .. } => CMD_LCD_GOTO,
            Command::LcdPrint(_) => CMD_LCD_PRINT,
            Command::SensorData(_) => CMD_SENSOR_DATA,
        }
    }

    /// Encode into an inner frame: the command byte followed by the
    /// payload in its wire schema.
    pub fn encode(&self) -> InnerFrame {
        match self {
            Command::SetLed { enable } => InnerFrame::new(CMD_SET_LED, &[*enable as u8]),
            Command::ToggleLed => InnerFrame::new(CMD_TOGGLE_LED, &[]),
            Command::LcdClear => InnerFrame::new(CMD_LCD_CLEAR, &[]),
            Command::LcdGoto { x, y } => InnerFrame::new(CMD_LCD_GOTO, &[*x, *y]),
            Command::LcdPrint(text) => {
                let mut payload = [0u8; 1 + MAX_LCD_TEXT_LEN];
                payload[0] = text.len() as u8;
                payload[1..1 + text.len()].copy_from_slice(text.as_bytes());
                InnerFrame::new(CMD_LCD_PRINT, &payload[..1 + text.len()])
            }
            Command::SensorData(reading) => {
                let mut payload = [0u8; 6];
                payload[0] = reading.sensor as u8;
                payload[1] = reading.param as u8;
                payload[2..].copy_from_slice(&reading.value.to_le_bytes());
                InnerFrame::new(CMD_SENSOR_DATA, &payload)
            }
        }
    }

    /// Decode an inner frame. `None` for an empty frame, an unknown
    /// identifier, or a payload whose length does not match the
    /// identifier's schema exactly.
    pub fn parse(inner: &InnerFrame) -> Option<Command> {
        let [command, payload @ ..] = inner.as_bytes() else {
            // No command byte.
            return None;
        };

        match *command {
            CMD_SET_LED => {
                let [enable] = payload else { return None };
                Some(Command::SetLed {
                    enable: *enable != 0,
                })
            }
            CMD_TOGGLE_LED => payload.is_empty().then_some(Command::ToggleLed),
            CMD_LCD_CLEAR => payload.is_empty().then_some(Command::LcdClear),
            CMD_LCD_GOTO => {
                let [x, y] = payload else { return None };
                Some(Command::LcdGoto { x: *x, y: *y })
            }
            CMD_LCD_PRINT => {
                let [declared, text @ ..] = payload else {
                    return None;
                };
                let declared = *declared as usize;
                if declared > MAX_LCD_TEXT_LEN || text.len() != declared {
                    return None;
                }
                Some(Command::LcdPrint(LcdText::clamped(text)))
            }
            CMD_SENSOR_DATA => {
                let [sensor, param, value @ ..] = payload else {
                    return None;
                };
                let value: &[u8; 4] = value.try_into().ok()?;
                Some(Command::SensorData(SensorReading {
                    sensor: SensorKind::from_u8(*sensor)?,
                    param: SensorParam::from_u8(*param)?,
                    value: f32::from_le_bytes(*value),
                }))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_led_round_trips() {
        let inner = Command::SetLed { enable: true }.encode();
        assert_eq!(inner.as_bytes(), &[CMD_SET_LED, 1]);
        assert_eq!(
            Command::parse(&inner),
            Some(Command::SetLed { enable: true })
        );
    }

    #[test]
    fn empty_payload_commands_reject_extra_bytes() {
        let inner = InnerFrame::new(CMD_TOGGLE_LED, &[0x00]);
        assert_eq!(Command::parse(&inner), None);
        let inner = InnerFrame::new(CMD_LCD_CLEAR, &[1, 2]);
        assert_eq!(Command::parse(&inner), None);
    }

    #[test]
    fn lcd_goto_requires_exactly_two_bytes() {
        let ok = InnerFrame::new(CMD_LCD_GOTO, &[3, 14]);
        assert_eq!(Command::parse(&ok), Some(Command::LcdGoto { x: 3, y: 14 }));
        assert_eq!(Command::parse(&InnerFrame::new(CMD_LCD_GOTO, &[3])), None);
        assert_eq!(
            Command::parse(&InnerFrame::new(CMD_LCD_GOTO, &[3, 14, 0])),
            None
        );
    }

    #[test]
    fn lcd_print_accepts_the_reference_encoding() {
        let inner = Command::LcdPrint(LcdText::clamped(b"OK")).encode();
        assert_eq!(inner.as_bytes(), &[0x12, 0x02, 0x4F, 0x4B]);
        match Command::parse(&inner) {
            Some(Command::LcdPrint(text)) => assert_eq!(text.as_bytes(), b"OK"),
            other => panic!("unexpected parse: {other:?}"),
        }
    }

    #[test]
    fn lcd_print_accepts_empty_text() {
        let inner = InnerFrame::new(CMD_LCD_PRINT, &[0]);
        match Command::parse(&inner) {
            Some(Command::LcdPrint(text)) => assert!(text.is_empty()),
            other => panic!("unexpected parse: {other:?}"),
        }
    }

    #[test]
    fn lcd_print_rejects_bad_declared_lengths() {
        // Declared length disagrees with the actual text length.
        let inner = InnerFrame::new(CMD_LCD_PRINT, &[5, b'a', b'b']);
        assert_eq!(Command::parse(&inner), None);

        // Declared length of 33 is over the display limit, even when
        // the bytes are all present.
        let mut payload = [b'x'; 34];
        payload[0] = 33;
        let inner = InnerFrame::new(CMD_LCD_PRINT, &payload);
        assert_eq!(Command::parse(&inner), None);
    }

    #[test]
    fn lcd_print_clamps_long_text_when_sending() {
        let text = LcdText::clamped(&[b'z'; 40]);
        assert_eq!(text.len(), MAX_LCD_TEXT_LEN);
        let inner = Command::LcdPrint(text).encode();
        assert_eq!(inner.len(), 1 + 1 + MAX_LCD_TEXT_LEN);
    }

    #[test]
    fn sensor_data_round_trips_little_endian() {
        let reading = SensorReading {
            sensor: SensorKind::Scd30,
            param: SensorParam::Co2Ppm,
            value: 417.5,
        };
        let inner = Command::SensorData(reading).encode();
        assert_eq!(inner.len(), 7);
        assert_eq!(inner.as_bytes()[0], CMD_SENSOR_DATA);
        assert_eq!(inner.as_bytes()[1], 3);
        assert_eq!(inner.as_bytes()[2], 8);
        assert_eq!(&inner.as_bytes()[3..], &417.5f32.to_le_bytes());
        assert_eq!(Command::parse(&inner), Some(Command::SensorData(reading)));
    }

    #[test]
    fn sensor_data_rejects_unknown_kinds() {
        let mut payload = [0u8; 6];
        payload[0] = 99; // no such sensor
        payload[1] = 1;
        let inner = InnerFrame::new(CMD_SENSOR_DATA, &payload);
        assert_eq!(Command::parse(&inner), None);
    }

    #[test]
    fn unknown_command_ids_are_dropped() {
        let inner = InnerFrame::new(0x7F, &[1, 2, 3]);
        assert_eq!(Command::parse(&inner), None);
    }

    #[test]
    fn empty_inner_frame_is_rejected() {
        let inner = InnerFrame::from_bytes(&[]).unwrap();
        assert_eq!(Command::parse(&inner), None);
    }
}
