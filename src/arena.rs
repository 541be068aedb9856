use core::mem;

use crate::node::{Node, NodePtr};

/// How the arena sizes the next chunk once the current one is exhausted.
#[derive(Debug, Clone, Copy)]
pub(crate) struct GrowthPolicy {
  /// Geometric growth: next capacity = previous capacity × `factor`.
  pub(crate) factor: f64,
  /// Fixed growth in bytes; takes precedence over `factor` when set.
  pub(crate) bytes: Option<usize>,
  /// Proactive growth: open a new chunk once an allocation would push the
  /// current chunk's usage past this fraction of its capacity.
  pub(crate) threshold: Option<f64>,
}

impl Default for GrowthPolicy {
  #[inline]
  fn default() -> Self {
    Self {
      factor: 2.0,
      bytes: None,
      threshold: None,
    }
  }
}

/// A contiguous block of node slots.
///
/// Slots are full `Node` objects rather than raw bytes: nodes carry owned
/// keys, values and tower vectors, and burying those inside an untyped byte
/// buffer would hide them from drop tracking.
struct Chunk<K, V> {
  slots: Box<[Node<K, V>]>,
  used: usize,
}

impl<K, V> Chunk<K, V> {
  fn new(capacity: usize) -> Self {
    let mut slots = Vec::with_capacity(capacity);
    slots.resize_with(capacity, Node::empty);
    Self {
      slots: slots.into_boxed_slice(),
      used: 0,
    }
  }

  #[inline]
  fn capacity(&self) -> usize {
    self.slots.len()
  }
}

/// A growable arena of typed node slots.
///
/// Allocation is a bump cursor over the current chunk; exhausted chunks are
/// never revisited, and individual slots are never handed out twice. All
/// memory is reclaimed at once by [`reset`](Arena::reset), which keeps the
/// first chunk around for reuse.
pub(crate) struct Arena<K, V> {
  chunks: Vec<Chunk<K, V>>,
  policy: GrowthPolicy,
}

impl<K, V> Arena<K, V> {
  pub(crate) const NODE_SIZE: usize = mem::size_of::<Node<K, V>>();

  /// Creates an arena whose first chunk holds `initial_bytes` worth of
  /// nodes, but never less than one node.
  pub(crate) fn new(initial_bytes: usize, policy: GrowthPolicy) -> Self {
    let capacity = (initial_bytes / Self::NODE_SIZE).max(1);
    Self {
      chunks: vec![Chunk::new(capacity)],
      policy,
    }
  }

  /// Hands out the next unused slot, growing first if the current chunk is
  /// exhausted or the growth threshold would be crossed. The slot is in the
  /// empty state; the caller initialises it before linking.
  pub(crate) fn allocate_slot(&mut self) -> NodePtr<K, V> {
    if self.must_grow() {
      self.grow();
    }

    let chunk = match self.chunks.last_mut() {
      Some(chunk) => chunk,
      None => unreachable!("the arena always holds at least one chunk"),
    };
    debug_assert!(chunk.used < chunk.capacity());
    let slot = unsafe { chunk.slots.as_mut_ptr().add(chunk.used) };
    chunk.used += 1;
    NodePtr::new(slot)
  }

  fn must_grow(&self) -> bool {
    let chunk = match self.chunks.last() {
      Some(chunk) => chunk,
      None => return true,
    };
    if chunk.used == chunk.capacity() {
      return true;
    }
    if let Some(threshold) = self.policy.threshold {
      return (chunk.used + 1) as f64 > threshold * chunk.capacity() as f64;
    }
    false
  }

  fn grow(&mut self) {
    let capacity = self.next_capacity();
    self.chunks.push(Chunk::new(capacity));

    #[cfg(feature = "tracing")]
    tracing::trace!(chunks = self.chunks.len(), capacity, "arena grew a chunk");
  }

  fn next_capacity(&self) -> usize {
    let computed = match self.policy.bytes {
      Some(bytes) => (bytes + Self::NODE_SIZE - 1) / Self::NODE_SIZE,
      None => {
        let prev = self.chunks.last().map_or(1, Chunk::capacity);
        (prev as f64 * self.policy.factor) as usize
      }
    };
    // A chunk must always fit at least one node, whatever the policy says.
    computed.max(1)
  }

  /// Reclaims everything: drops every chunk beyond the first, re-empties the
  /// first chunk's used slots and rewinds the cursor. Previously handed out
  /// slots are invalid afterwards.
  pub(crate) fn reset(&mut self) {
    self.chunks.truncate(1);
    if let Some(first) = self.chunks.first_mut() {
      for slot in &mut first.slots[..first.used] {
        *slot = Node::empty();
      }
      first.used = 0;
    }

    #[cfg(feature = "tracing")]
    tracing::trace!("arena reset to its first chunk");
  }

  #[cfg(test)]
  pub(crate) fn chunk_count(&self) -> usize {
    self.chunks.len()
  }

  #[cfg(test)]
  pub(crate) fn chunk_capacities(&self) -> Vec<usize> {
    self.chunks.iter().map(Chunk::capacity).collect()
  }
}
