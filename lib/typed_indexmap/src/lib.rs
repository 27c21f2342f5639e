//! Insertion ordered hash maps whose entries are addressed by a typed index.

mod map;

pub use map::{Iter, TiMap};
