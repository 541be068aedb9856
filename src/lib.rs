#![doc = include_str!("../README.md")]
#![deny(missing_docs)]

mod comparator;
pub use comparator::{Ascend, Comparator, Descend};

mod options;
pub use options::{IterOptions, Options};

mod node;

mod arena;
mod allocator;

mod list;
pub use list::{Entry, Iter, SkipList};

/// The maximum height of a node's tower.
///
/// A height of 32 is sufficient for roughly 2^32 entries with the 1/4
/// branching probability used by the level sampler.
pub const MAX_HEIGHT: usize = 32;
