//! Domain Layer
//!
//! Capability traits at the boundary between a cache group and the outside
//! world: where values come from, and which peer owns a key.

pub mod ports;

pub use ports::{Getter, GetterFn, PeerGetter, PeerPicker};
