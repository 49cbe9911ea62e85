//! # Reachability Model
//!
//! The values that cross every boundary: materializer ↔ propagator ↔
//! substrate ↔ driver ↔ caller.
//!
//! Design rule: this module is pure data plus its line codec. No I/O, no
//! state, no async.

pub mod node;
pub mod message;
pub mod record;

pub use node::NodeId;
pub use message::{AdjacencySet, HitRecord, HopMessage, Message, Record};
pub use record::{EdgeLine, decode_line, encode_line, parse_edge_line};
