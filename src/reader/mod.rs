//! XML Reader Module
//!
//! Pull parsing over an in-memory byte slice:
//! - SliceReader: Zero-copy slice parser
//! - Events: XML event types for pull parsing

pub mod events;
pub mod slice;

pub use events::{EndElement, StartElement, XmlEvent};
pub use slice::{ParseError, SliceReader};
