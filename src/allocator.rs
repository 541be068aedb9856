use crate::arena::{Arena, GrowthPolicy};
use crate::node::{Node, NodePtr};

/// The allocation strategy behind a skip list's nodes.
///
/// Contracts, for any implementation:
///
/// - `allocate` returns a node in the empty state (no payload, no links,
///   empty tower); sizing the tower is the caller's job.
/// - `release` takes a node the caller no longer references and scrubs its
///   payload and links, so owned keys and values drop promptly. Whether the
///   node's storage is recycled is up to the strategy.
/// - `reset` is the bulk reclaim used by `clear`; afterwards every
///   previously released or still-outstanding node is invalid.
///
/// Every call is serialised by the owning list's write lock.
pub(crate) trait NodeAllocator<K, V> {
  fn allocate(&mut self) -> NodePtr<K, V>;
  fn release(&mut self, node: NodePtr<K, V>);
  fn reset(&mut self);
}

/// Recycles nodes through a free list.
///
/// Released nodes keep their tower vectors' backing storage, so a future
/// node of the same or smaller height allocates nothing at all.
pub(crate) struct PoolAllocator<K, V> {
  free: Vec<NodePtr<K, V>>,
}

impl<K, V> PoolAllocator<K, V> {
  #[inline]
  pub(crate) const fn new() -> Self {
    Self { free: Vec::new() }
  }
}

impl<K, V> NodeAllocator<K, V> for PoolAllocator<K, V> {
  #[inline]
  fn allocate(&mut self) -> NodePtr<K, V> {
    match self.free.pop() {
      Some(node) => node,
      None => NodePtr::from_boxed(Box::new(Node::empty())),
    }
  }

  fn release(&mut self, node: NodePtr<K, V>) {
    // Safety: the caller hands over its only reference, and free-listed
    // nodes are not freed until reset.
    unsafe { node.as_mut().scrub() };
    self.free.push(node);
  }

  fn reset(&mut self) {
    for node in self.free.drain(..) {
      // Safety: free-listed nodes were boxed by allocate and are referenced
      // only by the free list.
      drop(unsafe { node.into_boxed() });
    }
  }
}

impl<K, V> Drop for PoolAllocator<K, V> {
  fn drop(&mut self) {
    self.reset();
  }
}

/// Allocates nodes from a growable typed-chunk [`Arena`].
///
/// `release` only scrubs the node; the slot itself is reclaimed in bulk by
/// `reset`, which keeps the arena's first chunk for reuse.
pub(crate) struct ArenaAllocator<K, V> {
  arena: Arena<K, V>,
}

impl<K, V> ArenaAllocator<K, V> {
  #[inline]
  pub(crate) fn new(initial_bytes: usize, policy: GrowthPolicy) -> Self {
    Self {
      arena: Arena::new(initial_bytes, policy),
    }
  }

  #[cfg(test)]
  pub(crate) fn arena(&self) -> &Arena<K, V> {
    &self.arena
  }
}

impl<K, V> NodeAllocator<K, V> for ArenaAllocator<K, V> {
  #[inline]
  fn allocate(&mut self) -> NodePtr<K, V> {
    self.arena.allocate_slot()
  }

  fn release(&mut self, node: NodePtr<K, V>) {
    // Safety: the caller hands over its only reference; the slot stays
    // allocated (and untouched) until reset.
    unsafe { node.as_mut().scrub() };
  }

  fn reset(&mut self) {
    self.arena.reset();
  }
}

/// Static dispatch over the two strategies; a boxed trait object would
/// force `'static` bounds onto `K` and `V`.
pub(crate) enum Allocator<K, V> {
  Pool(PoolAllocator<K, V>),
  Arena(ArenaAllocator<K, V>),
}

impl<K, V> Allocator<K, V> {
  #[cfg(test)]
  pub(crate) fn as_arena(&self) -> Option<&Arena<K, V>> {
    match self {
      Self::Pool(_) => None,
      Self::Arena(a) => Some(a.arena()),
    }
  }

  #[cfg(test)]
  pub(crate) fn pooled_nodes(&self) -> usize {
    match self {
      Self::Pool(p) => p.free.len(),
      Self::Arena(_) => 0,
    }
  }
}

impl<K, V> NodeAllocator<K, V> for Allocator<K, V> {
  #[inline]
  fn allocate(&mut self) -> NodePtr<K, V> {
    match self {
      Self::Pool(p) => p.allocate(),
      Self::Arena(a) => a.allocate(),
    }
  }

  #[inline]
  fn release(&mut self, node: NodePtr<K, V>) {
    match self {
      Self::Pool(p) => p.release(node),
      Self::Arena(a) => a.release(node),
    }
  }

  #[inline]
  fn reset(&mut self) {
    match self {
      Self::Pool(p) => p.reset(),
      Self::Arena(a) => a.reset(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_pool_recycles_released_nodes() {
    let mut pool: PoolAllocator<u64, u64> = PoolAllocator::new();
    let node = pool.allocate();
    unsafe {
      let n = node.as_mut();
      n.init_tower(5);
      n.key = Some(1);
      n.value = Some(2);
    }
    pool.release(node);

    let again = pool.allocate();
    assert_eq!(again, node);
    let n = unsafe { again.as_ref() };
    assert!(n.key.is_none() && n.value.is_none());
    assert_eq!(n.height(), 0);
    assert!(n.forward.capacity() >= 5);
    pool.release(again);
  }

  #[test]
  fn test_pool_reset_frees_cached_nodes() {
    let mut pool: PoolAllocator<u64, u64> = PoolAllocator::new();
    let a = pool.allocate();
    let b = pool.allocate();
    pool.release(a);
    pool.release(b);
    assert_eq!(pool.free.len(), 2);
    pool.reset();
    assert!(pool.free.is_empty());
  }

  #[test]
  fn test_arena_release_scrubs_payload() {
    let mut alloc: ArenaAllocator<u64, String> =
      ArenaAllocator::new(1024, GrowthPolicy::default());
    let node = alloc.allocate();
    unsafe {
      let n = node.as_mut();
      n.init_tower(1);
      n.key = Some(9);
      n.value = Some("nine".to_string());
    }
    alloc.release(node);
    let n = unsafe { node.as_ref() };
    assert!(n.key.is_none() && n.value.is_none());
  }
}
