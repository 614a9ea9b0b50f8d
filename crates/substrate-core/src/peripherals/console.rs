//! Console device: byte stream in, bounded ring of text lines out.
//!
//! Register layout inside the console region:
//!
//! | Offset | Access | Meaning |
//! |---|---|---|
//! | 0 | write | output byte |
//! | 1 | read | next host-supplied input byte, 0 when empty |
//! | 2 | read | status bits (`OUTPUT_READY`, `INPUT_AVAILABLE`) |

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use super::DeviceBridge;

/// Offset of the output byte register.
pub const CONSOLE_OUTPUT_OFFSET: u64 = 0;
/// Offset of the input byte register.
pub const CONSOLE_INPUT_OFFSET: u64 = 1;
/// Offset of the status register.
pub const CONSOLE_STATUS_OFFSET: u64 = 2;
/// Status bit: the output register accepts bytes. Always set.
pub const CONSOLE_STATUS_OUTPUT_READY: u8 = 0x01;
/// Status bit: at least one input byte is pending.
pub const CONSOLE_STATUS_INPUT_AVAILABLE: u8 = 0x02;

/// Default number of retained lines.
pub const DEFAULT_CONSOLE_MAX_LINES: usize = 24;
/// Default wrap column.
pub const DEFAULT_CONSOLE_LINE_WIDTH: usize = 80;
/// Default input queue capacity in bytes.
pub const DEFAULT_CONSOLE_INPUT_CAPACITY: usize = 256;
/// Default capacity of the per-pass recent-output capture.
pub const DEFAULT_CONSOLE_RECENT_CAPACITY: usize = 256;

/// Console device tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Number of lines kept in the ring, including the current line.
    pub max_lines: usize,
    /// Column at which a line wraps. Zero disables wrapping.
    pub line_width: usize,
    /// Host input queue capacity in bytes.
    pub input_capacity: usize,
    /// Bytes captured for [`ConsoleDevice::take_recent_output`].
    pub recent_output_capacity: usize,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            max_lines: DEFAULT_CONSOLE_MAX_LINES,
            line_width: DEFAULT_CONSOLE_LINE_WIDTH,
            input_capacity: DEFAULT_CONSOLE_INPUT_CAPACITY,
            recent_output_capacity: DEFAULT_CONSOLE_RECENT_CAPACITY,
        }
    }
}

/// Serializable console contents.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConsoleImage {
    /// Retained lines, oldest first; the last entry is the current line.
    pub lines: Vec<String>,
    /// Pending input bytes in FIFO order.
    pub input: Vec<u8>,
    /// Total output bytes accepted since reset.
    pub bytes_written: u64,
}

/// Line-buffered console bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleDevice {
    config: ConsoleConfig,
    lines: VecDeque<String>,
    input: VecDeque<u8>,
    recent: Vec<u8>,
    bytes_written: u64,
}

impl Default for ConsoleDevice {
    fn default() -> Self {
        Self::new(ConsoleConfig::default())
    }
}

impl ConsoleDevice {
    /// Creates an empty console.
    #[must_use]
    pub fn new(config: ConsoleConfig) -> Self {
        let mut lines = VecDeque::with_capacity(config.max_lines.max(1));
        lines.push_back(String::new());
        Self {
            config,
            lines,
            input: VecDeque::new(),
            recent: Vec::new(),
            bytes_written: 0,
        }
    }

    /// Retained lines, oldest first. The last line is the one being written.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    /// The line currently being written (possibly empty).
    #[must_use]
    pub fn last_line(&self) -> &str {
        self.lines.back().map_or("", String::as_str)
    }

    /// Removes and returns every completed line, keeping the partial line.
    pub fn drain_completed(&mut self) -> Vec<String> {
        let completed = self.lines.len().saturating_sub(1);
        self.lines.drain(..completed).collect()
    }

    /// Queues host input bytes; returns how many fit in the input queue.
    pub fn push_input(&mut self, bytes: &[u8]) -> usize {
        let room = self.config.input_capacity.saturating_sub(self.input.len());
        let accepted = bytes.len().min(room);
        self.input.extend(&bytes[..accepted]);
        accepted
    }

    /// Number of pending input bytes.
    #[must_use]
    pub fn pending_input(&self) -> usize {
        self.input.len()
    }

    /// Takes the raw output bytes captured since the previous call.
    pub fn take_recent_output(&mut self) -> Option<Vec<u8>> {
        if self.recent.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.recent))
        }
    }

    /// Total output bytes accepted since reset.
    #[must_use]
    pub const fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Current status register value.
    #[must_use]
    pub fn status(&self) -> u8 {
        if self.input.is_empty() {
            CONSOLE_STATUS_OUTPUT_READY
        } else {
            CONSOLE_STATUS_OUTPUT_READY | CONSOLE_STATUS_INPUT_AVAILABLE
        }
    }

    /// Exports the persistent console contents.
    #[must_use]
    pub fn image(&self) -> ConsoleImage {
        ConsoleImage {
            lines: self.lines.iter().cloned().collect(),
            input: self.input.iter().copied().collect(),
            bytes_written: self.bytes_written,
        }
    }

    /// Replaces console contents with `image`, truncated to configured bounds.
    pub fn restore(&mut self, image: ConsoleImage) {
        let keep = self.config.max_lines.max(1);
        let skip = image.lines.len().saturating_sub(keep);
        self.lines = image.lines.into_iter().skip(skip).collect();
        if self.lines.is_empty() {
            self.lines.push_back(String::new());
        }
        self.input = image.input.into_iter().collect();
        self.input.truncate(self.config.input_capacity);
        self.recent.clear();
        self.bytes_written = image.bytes_written;
    }

    fn new_line(&mut self) {
        self.lines.push_back(String::new());
        while self.lines.len() > self.config.max_lines.max(1) {
            self.lines.pop_front();
        }
    }

    fn push_printable(&mut self, value: u8) {
        let width = self.config.line_width;
        if width > 0 && self.last_line().len() >= width {
            self.new_line();
        }
        if let Some(line) = self.lines.back_mut() {
            line.push(char::from(value));
        }
    }
}

impl DeviceBridge for ConsoleDevice {
    fn on_write(&mut self, offset: u64, value: u8) {
        if offset != CONSOLE_OUTPUT_OFFSET {
            return;
        }
        self.bytes_written = self.bytes_written.wrapping_add(1);
        if self.recent.len() < self.config.recent_output_capacity {
            self.recent.push(value);
        }
        match value {
            b'\n' => self.new_line(),
            32..=126 => self.push_printable(value),
            _ => {}
        }
    }

    fn on_read(&mut self, offset: u64, stored: u8) -> u8 {
        match offset {
            CONSOLE_INPUT_OFFSET => self.input.pop_front().unwrap_or(0),
            CONSOLE_STATUS_OFFSET => self.status(),
            _ => stored,
        }
    }

    fn reset(&mut self) {
        *self = Self::new(self.config);
    }
}

#[cfg(test)]
mod tests {
    use super::{
        ConsoleConfig, ConsoleDevice, CONSOLE_INPUT_OFFSET, CONSOLE_OUTPUT_OFFSET,
        CONSOLE_STATUS_INPUT_AVAILABLE, CONSOLE_STATUS_OFFSET, CONSOLE_STATUS_OUTPUT_READY,
    };
    use crate::DeviceBridge;

    fn write_str(console: &mut ConsoleDevice, text: &[u8]) {
        for byte in text {
            console.on_write(CONSOLE_OUTPUT_OFFSET, *byte);
        }
    }

    #[test]
    fn printable_byte_lands_at_end_of_last_line() {
        let mut console = ConsoleDevice::default();
        console.on_write(CONSOLE_OUTPUT_OFFSET, 0x41);
        assert!(console.last_line().ends_with('A'));
    }

    #[test]
    fn newline_starts_line_and_carriage_return_is_ignored() {
        let mut console = ConsoleDevice::default();
        write_str(&mut console, b"hi\r\nthere");
        let lines: Vec<&str> = console.lines().collect();
        assert_eq!(lines, vec!["hi", "there"]);
    }

    #[test]
    fn control_bytes_are_dropped_but_captured_raw() {
        let mut console = ConsoleDevice::default();
        write_str(&mut console, &[0x07, b'o', 0x7F, b'k']);
        assert_eq!(console.last_line(), "ok");
        assert_eq!(console.take_recent_output(), Some(vec![0x07, b'o', 0x7F, b'k']));
        assert_eq!(console.take_recent_output(), None);
        assert_eq!(console.bytes_written(), 4);
    }

    #[test]
    fn ring_keeps_only_the_last_n_lines() {
        let mut console = ConsoleDevice::new(ConsoleConfig {
            max_lines: 3,
            ..ConsoleConfig::default()
        });
        write_str(&mut console, b"1\n2\n3\n4\n5");
        let lines: Vec<&str> = console.lines().collect();
        assert_eq!(lines, vec!["3", "4", "5"]);
    }

    #[test]
    fn long_lines_wrap_at_configured_width() {
        let mut console = ConsoleDevice::new(ConsoleConfig {
            line_width: 4,
            ..ConsoleConfig::default()
        });
        write_str(&mut console, b"abcdefghij");
        let lines: Vec<&str> = console.lines().collect();
        assert_eq!(lines, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn drain_completed_keeps_partial_line() {
        let mut console = ConsoleDevice::default();
        write_str(&mut console, b"one\ntwo\nthr");
        assert_eq!(console.drain_completed(), vec!["one", "two"]);
        assert_eq!(console.lines().collect::<Vec<_>>(), vec!["thr"]);
        assert!(console.drain_completed().is_empty());
    }

    #[test]
    fn writes_to_non_output_offsets_are_ignored() {
        let mut console = ConsoleDevice::default();
        console.on_write(CONSOLE_STATUS_OFFSET, b'Z');
        console.on_write(CONSOLE_INPUT_OFFSET, b'Z');
        assert_eq!(console.last_line(), "");
        assert_eq!(console.bytes_written(), 0);
    }

    #[test]
    fn input_register_pops_host_bytes_and_status_tracks_availability() {
        let mut console = ConsoleDevice::new(ConsoleConfig {
            input_capacity: 2,
            ..ConsoleConfig::default()
        });
        assert_eq!(
            console.on_read(CONSOLE_STATUS_OFFSET, 0),
            CONSOLE_STATUS_OUTPUT_READY
        );
        assert_eq!(console.push_input(b"xyz"), 2);
        assert_eq!(
            console.on_read(CONSOLE_STATUS_OFFSET, 0),
            CONSOLE_STATUS_OUTPUT_READY | CONSOLE_STATUS_INPUT_AVAILABLE
        );
        assert_eq!(console.on_read(CONSOLE_INPUT_OFFSET, 0), b'x');
        assert_eq!(console.on_read(CONSOLE_INPUT_OFFSET, 0), b'y');
        assert_eq!(console.on_read(CONSOLE_INPUT_OFFSET, 0xEE), 0);
        assert_eq!(console.on_read(CONSOLE_OUTPUT_OFFSET, 0x41), 0x41);
    }

    #[test]
    fn image_restore_roundtrips_and_respects_bounds() {
        let mut console = ConsoleDevice::new(ConsoleConfig {
            max_lines: 2,
            ..ConsoleConfig::default()
        });
        write_str(&mut console, b"a\nb");
        console.push_input(b"q");
        let image = console.image();

        let mut restored = ConsoleDevice::new(ConsoleConfig {
            max_lines: 2,
            ..ConsoleConfig::default()
        });
        restored.restore(image.clone());
        assert_eq!(restored.image(), image);

        let mut tiny = ConsoleDevice::new(ConsoleConfig {
            max_lines: 1,
            ..ConsoleConfig::default()
        });
        tiny.restore(image);
        assert_eq!(tiny.lines().collect::<Vec<_>>(), vec!["b"]);
    }

    #[test]
    fn reset_clears_lines_and_input() {
        let mut console = ConsoleDevice::default();
        write_str(&mut console, b"x\ny");
        console.push_input(b"k");
        console.reset();
        assert_eq!(console.lines().collect::<Vec<_>>(), vec![""]);
        assert_eq!(console.pending_input(), 0);
    }
}
