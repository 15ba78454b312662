//! Various utilities functions and types

mod clock;
mod geometry;
pub(crate) mod ids;
mod serial;

pub use self::clock::{Clock, Time};
pub use self::geometry::{Coordinate, Logical, Point, Rectangle, Size};
pub use self::serial::{Serial, SerialCounter};

/// Identifies a client connection of the protocol layer
///
/// The value is chosen by the embedder; the core only compares them, most notably
/// against the privileged client (see [`Shell::set_privileged_client`](crate::shell::Shell::set_privileged_client)).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(pub u32);

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "client@{}", self.0)
    }
}
