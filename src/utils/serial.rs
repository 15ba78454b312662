use std::cell::Cell;

/// A serial type, whose comparison takes into account the wrapping-around behavior of the
/// underlying counter.
///
/// Serials identify grabs and ping requests. A request carrying a serial that does not
/// match the current one is a protocol-contract violation.
#[derive(Debug, Copy, Clone)]
pub struct Serial(pub(crate) u32);

impl PartialEq for Serial {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Serial {}

impl PartialOrd for Serial {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        let distance = self.0.abs_diff(other.0);
        if distance < u32::MAX / 2 {
            self.0.partial_cmp(&other.0)
        } else {
            // wrap-around occurred, invert comparison
            other.0.partial_cmp(&self.0)
        }
    }
}

impl From<u32> for Serial {
    fn from(n: u32) -> Self {
        Serial(n)
    }
}

impl From<Serial> for u32 {
    fn from(serial: Serial) -> u32 {
        serial.0
    }
}

impl std::fmt::Display for Serial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serial {
    /// Checks if a serial was generated after or is equal to another given serial
    pub fn is_no_older_than(&self, other: &Serial) -> bool {
        other <= self
    }
}

/// A counter for generating serials
///
/// Every [`Shell`](crate::shell::Shell) owns one. The counter skips `0` and wraps around
/// on overflow.
#[derive(Debug)]
pub struct SerialCounter {
    serial: Cell<u32>,
}

impl Default for SerialCounter {
    fn default() -> Self {
        SerialCounter { serial: Cell::new(1) }
    }
}

impl SerialCounter {
    /// Retrieve the next serial from the counter
    pub fn next_serial(&self) -> Serial {
        let mut current = self.serial.get();
        if current == 0 {
            current = 1;
        }
        self.serial.set(current.wrapping_add(1));
        Serial(current)
    }
}
