use core::ptr;

/// A copyable, possibly-null pointer to a [`Node`].
///
/// The skip list wires nodes together through raw pointers; ownership sits
/// with the allocator (pool nodes are boxed, arena nodes live in chunk
/// slots), and every dereference happens under the list's lock.
pub(crate) struct NodePtr<K, V> {
  ptr: *mut Node<K, V>,
}

impl<K, V> core::fmt::Debug for NodePtr<K, V> {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    f.debug_tuple("NodePtr").field(&self.ptr).finish()
  }
}

impl<K, V> Clone for NodePtr<K, V> {
  fn clone(&self) -> Self {
    *self
  }
}

impl<K, V> Copy for NodePtr<K, V> {}

impl<K, V> PartialEq for NodePtr<K, V> {
  #[inline]
  fn eq(&self, other: &Self) -> bool {
    ptr::eq(self.ptr, other.ptr)
  }
}

impl<K, V> Eq for NodePtr<K, V> {}

impl<K, V> NodePtr<K, V> {
  pub(crate) const NULL: Self = Self {
    ptr: ptr::null_mut(),
  };

  #[inline]
  pub(crate) const fn new(ptr: *mut Node<K, V>) -> Self {
    Self { ptr }
  }

  #[inline]
  pub(crate) fn from_boxed(node: Box<Node<K, V>>) -> Self {
    Self {
      ptr: Box::into_raw(node),
    }
  }

  /// ## Safety
  ///
  /// - The pointer must have been produced by [`NodePtr::from_boxed`] and
  ///   not freed since.
  #[inline]
  pub(crate) unsafe fn into_boxed(self) -> Box<Node<K, V>> {
    Box::from_raw(self.ptr)
  }

  #[inline]
  pub(crate) fn is_null(&self) -> bool {
    self.ptr.is_null()
  }

  /// ## Safety
  ///
  /// - The pointer must be non-null and point at a live node.
  #[inline]
  pub(crate) unsafe fn as_ref<'a>(&self) -> &'a Node<K, V> {
    &*self.ptr
  }

  /// ## Safety
  ///
  /// - The pointer must be non-null and point at a live node.
  /// - The caller must hold exclusive access to the list the node belongs to.
  #[inline]
  #[allow(clippy::mut_from_ref)]
  pub(crate) unsafe fn as_mut<'a>(&self) -> &'a mut Node<K, V> {
    &mut *self.ptr
  }
}

/// A node in the skip list.
///
/// `key` and `value` are `None` only on the header sentinel and on nodes
/// that have been released back to their allocator. The tower vectors are
/// sized to the node's sampled height when the node is linked and are not
/// resized while it stays linked; `span[i]` counts the base-level positions
/// covered by `forward[i]`, where a link to null covers everything after
/// this node.
pub(crate) struct Node<K, V> {
  pub(crate) key: Option<K>,
  pub(crate) value: Option<V>,
  /// Predecessor at the base level only; the header's `backward` is unused.
  pub(crate) backward: NodePtr<K, V>,
  pub(crate) forward: Vec<NodePtr<K, V>>,
  pub(crate) span: Vec<usize>,
}

impl<K, V> Node<K, V> {
  /// A node with no payload, no tower and no links.
  #[inline]
  pub(crate) const fn empty() -> Self {
    Self {
      key: None,
      value: None,
      backward: NodePtr::NULL,
      forward: Vec::new(),
      span: Vec::new(),
    }
  }

  /// The header sentinel: no payload, tower sized to `height` up front.
  #[inline]
  pub(crate) fn sentinel(height: usize) -> Self {
    Self {
      key: None,
      value: None,
      backward: NodePtr::NULL,
      forward: vec![NodePtr::NULL; height],
      span: vec![0; height],
    }
  }

  #[inline]
  pub(crate) fn height(&self) -> usize {
    self.forward.len()
  }

  /// Resizes the tower for a node about to be linked at `height`, reusing
  /// whatever backing storage the vectors already carry.
  #[inline]
  pub(crate) fn init_tower(&mut self, height: usize) {
    self.forward.clear();
    self.forward.resize(height, NodePtr::NULL);
    self.span.clear();
    self.span.resize(height, 0);
  }

  /// Drops the payload and unlinks the tower, leaving the node in the same
  /// state as [`Node::empty`] (modulo retained vector capacity).
  #[inline]
  pub(crate) fn scrub(&mut self) {
    self.key = None;
    self.value = None;
    self.backward = NodePtr::NULL;
    self.forward.clear();
    self.span.clear();
  }

  #[inline]
  pub(crate) fn key_ref(&self) -> &K {
    match self.key.as_ref() {
      Some(key) => key,
      None => unreachable!("linked nodes always carry a key"),
    }
  }

  #[inline]
  pub(crate) fn value_ref(&self) -> &V {
    match self.value.as_ref() {
      Some(value) => value,
      None => unreachable!("linked nodes always carry a value"),
    }
  }

  /// Moves the payload out, e.g. right before the node is unlinked.
  #[inline]
  pub(crate) fn take_payload(&mut self) -> (K, V) {
    match (self.key.take(), self.value.take()) {
      (Some(key), Some(value)) => (key, value),
      _ => unreachable!("linked nodes always carry a payload"),
    }
  }

  /// Base-level successor, treating a scrubbed tower as end-of-list so a
  /// stale iterator cursor degrades to exhausted instead of indexing an
  /// empty vector.
  #[inline]
  pub(crate) fn next0(&self) -> NodePtr<K, V> {
    self.forward.first().copied().unwrap_or(NodePtr::NULL)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_node_ptr_null() {
    let ptr = NodePtr::<u64, u64>::NULL;
    assert!(ptr.is_null());
    #[allow(clippy::clone_on_copy)]
    let other = ptr.clone();
    assert_eq!(ptr, other);
  }

  #[test]
  fn test_tower_reuse_keeps_capacity() {
    let mut node: Node<u64, u64> = Node::empty();
    node.init_tower(8);
    let cap = node.forward.capacity();
    node.scrub();
    node.init_tower(4);
    assert_eq!(node.forward.len(), 4);
    assert!(node.forward.capacity() >= cap);
  }
}
