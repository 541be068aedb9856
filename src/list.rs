use core::cmp::Ordering;
use core::fmt;

use parking_lot::RwLock;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::allocator::{Allocator, ArenaAllocator, NodeAllocator, PoolAllocator};
use crate::comparator::{Ascend, Comparator};
use crate::node::{Node, NodePtr};
use crate::options::{IterOptions, Options};
use crate::MAX_HEIGHT;

mod entry;
pub use entry::Entry;

mod iterator;
pub use iterator::Iter;


/// A thread-safe, generic skip list keyed in comparator order.
///
/// Every level-`i` link records the number of base-level positions it
/// covers, which is what makes [`rank`](SkipList::rank) and
/// [`get_by_rank`](SkipList::get_by_rank) O(log n) instead of O(n). The
/// base level is additionally doubly linked for reverse iteration.
///
/// All operations take `&self` and lock internally: lookups share a read
/// lock, mutations take the write lock, and each call is atomic with
/// respect to every other. Visitor callbacks and iterator code run under
/// the shared lock and must not call back into mutating operations, which
/// would deadlock.
///
/// ## Example
///
/// ```rust
/// use ranklist::SkipList;
///
/// let l = SkipList::new();
/// l.insert(10, "ten");
/// l.insert(5, "five");
/// l.insert(20, "twenty");
///
/// assert_eq!(l.len(), 3);
/// assert_eq!(l.rank(&20), 2);
/// assert_eq!(l.get(&10).map(|ent| *ent.value()), Some("ten"));
/// assert_eq!(l.pop_min().map(|ent| *ent.key()), Some(5));
/// ```
pub struct SkipList<K, V, C = Ascend> {
  inner: RwLock<ListInner<K, V, C>>,
}

// Safety: the inner raw pointers never leave the list, and every access to
// the structure they form is serialised by the lock.
unsafe impl<K: Send, V: Send, C: Send> Send for SkipList<K, V, C> {}
unsafe impl<K: Send + Sync, V: Send + Sync, C: Send + Sync> Sync for SkipList<K, V, C> {}

impl<K: Ord, V> SkipList<K, V> {
  /// Creates an empty list over the key type's natural order, recycling
  /// nodes through the default pool allocator.
  #[inline]
  pub fn new() -> Self {
    Self::with_options(Options::new())
  }

  /// Creates an empty list over the key type's natural order with the given
  /// [`Options`].
  ///
  /// ## Example
  ///
  /// ```rust
  /// use ranklist::{Options, SkipList};
  ///
  /// let l: SkipList<u64, u64> = SkipList::with_options(Options::new().with_arena(4096));
  /// assert!(l.is_empty());
  /// ```
  #[inline]
  pub fn with_options(opts: Options) -> Self {
    Self::with_options_and_comparator(opts, Ascend)
  }
}

impl<K: Ord, V> Default for SkipList<K, V> {
  #[inline]
  fn default() -> Self {
    Self::new()
  }
}

impl<K, V, C> SkipList<K, V, C>
where
  C: Comparator<K>,
{
  /// Creates an empty list ordered by a custom comparator.
  ///
  /// Any `Fn(&K, &K) -> Ordering` works, as do the [`Ascend`] and
  /// [`Descend`](crate::Descend) unit comparators.
  ///
  /// ## Example
  ///
  /// ```rust
  /// use ranklist::SkipList;
  ///
  /// // Order strings by length.
  /// let l = SkipList::with_comparator(|a: &&str, b: &&str| a.len().cmp(&b.len()));
  /// l.insert("apple", 1);
  /// l.insert("fig", 2);
  /// assert_eq!(l.min().map(|ent| *ent.key()), Some("fig"));
  /// ```
  #[inline]
  pub fn with_comparator(cmp: C) -> Self {
    Self::with_options_and_comparator(Options::new(), cmp)
  }

  /// Creates an empty list with both custom [`Options`] and a custom
  /// comparator.
  #[inline]
  pub fn with_options_and_comparator(opts: Options, cmp: C) -> Self {
    Self {
      inner: RwLock::new(ListInner::new(opts, cmp)),
    }
  }

  /// Returns the number of entries in the list.
  #[inline]
  pub fn len(&self) -> usize {
    self.inner.read().length
  }

  /// Returns `true` if the list holds no entries.
  #[inline]
  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Returns `true` if the list contains the given key.
  #[inline]
  pub fn contains_key(&self, key: &K) -> bool {
    !self.inner.read().search(key).is_null()
  }

  /// Returns a snapshot of the entry stored under `key`, or `None` if the
  /// key is absent.
  pub fn get(&self, key: &K) -> Option<Entry<K, V>>
  where
    K: Clone,
    V: Clone,
  {
    let inner = self.inner.read();
    let nd = inner.search(key);
    inner.entry_at(nd)
  }

  /// Inserts a key/value pair.
  ///
  /// If the key is already present its value is replaced and the previous
  /// value is returned; the length does not change. Otherwise a new node is
  /// linked and `None` is returned.
  ///
  /// ## Example
  ///
  /// ```rust
  /// use ranklist::SkipList;
  ///
  /// let l = SkipList::new();
  /// assert_eq!(l.insert(1, "one"), None);
  /// assert_eq!(l.insert(1, "uno"), Some("one"));
  /// assert_eq!(l.len(), 1);
  /// ```
  #[inline]
  pub fn insert(&self, key: K, value: V) -> Option<V> {
    self.inner.write().insert(key, value)
  }

  /// Removes the entry stored under `key`, returning its value, or `None`
  /// if the key is absent.
  #[inline]
  pub fn remove(&self, key: &K) -> Option<V> {
    self.inner.write().remove(key)
  }

  /// Removes and returns the entry with the smallest key, or `None` if the
  /// list is empty.
  #[inline]
  pub fn pop_min(&self) -> Option<Entry<K, V>> {
    self.inner.write().pop_min()
  }

  /// Removes and returns the entry with the largest key, or `None` if the
  /// list is empty.
  #[inline]
  pub fn pop_max(&self) -> Option<Entry<K, V>> {
    self.inner.write().pop_max()
  }

  /// Returns a snapshot of the entry with the smallest key, or `None` if
  /// the list is empty.
  pub fn min(&self) -> Option<Entry<K, V>>
  where
    K: Clone,
    V: Clone,
  {
    let inner = self.inner.read();
    let first = unsafe { inner.header.as_ref().forward[0] };
    inner.entry_at(first)
  }

  /// Returns a snapshot of the entry with the largest key, or `None` if the
  /// list is empty.
  pub fn max(&self) -> Option<Entry<K, V>>
  where
    K: Clone,
    V: Clone,
  {
    let inner = self.inner.read();
    let last = inner.find_last();
    inner.entry_at(last)
  }

  /// Returns the first entry whose key is greater than or equal to `key`
  /// (the ceiling), or `None` if every key is smaller.
  pub fn seek(&self, key: &K) -> Option<Entry<K, V>>
  where
    K: Clone,
    V: Clone,
  {
    let inner = self.inner.read();
    let nd = inner.find_ge(key);
    inner.entry_at(nd)
  }

  /// Returns the entry with the largest key strictly less than `key`, or
  /// `None` if every key is greater or equal.
  pub fn predecessor(&self, key: &K) -> Option<Entry<K, V>>
  where
    K: Clone,
    V: Clone,
  {
    let inner = self.inner.read();
    let nd = inner.find_lt(key);
    inner.entry_at(nd)
  }

  /// Returns the entry with the smallest key strictly greater than `key`,
  /// or `None` if every key is smaller or equal.
  pub fn successor(&self, key: &K) -> Option<Entry<K, V>>
  where
    K: Clone,
    V: Clone,
  {
    let inner = self.inner.read();
    let nd = inner.find_gt(key);
    inner.entry_at(nd)
  }

  /// Returns the 0-based rank of `key`: the number of entries with keys
  /// strictly smaller, which is also the position the key holds (or would
  /// hold) in sorted order.
  ///
  /// ## Example
  ///
  /// ```rust
  /// use ranklist::SkipList;
  ///
  /// let l = SkipList::new();
  /// for k in [10, 5, 20, 15] {
  ///   l.insert(k, ());
  /// }
  /// assert_eq!(l.rank(&15), 2);
  /// assert_eq!(l.rank(&16), 3); // absent keys rank where they would insert
  /// ```
  #[inline]
  pub fn rank(&self, key: &K) -> usize {
    self.inner.read().rank_of(key)
  }

  /// Returns a snapshot of the entry at the given 0-based rank, or `None`
  /// if `rank >= len()`.
  pub fn get_by_rank(&self, rank: usize) -> Option<Entry<K, V>>
  where
    K: Clone,
    V: Clone,
  {
    let inner = self.inner.read();
    let nd = inner.node_by_rank(rank);
    inner.entry_at(nd)
  }

  /// Visits every entry in ascending key order until the visitor returns
  /// `false`.
  ///
  /// The visitor runs under the shared lock and must not call back into
  /// mutating operations on the same list.
  pub fn range<F>(&self, mut f: F)
  where
    F: FnMut(&K, &V) -> bool,
  {
    let inner = self.inner.read();
    unsafe {
      let mut cur = inner.header.as_ref().forward[0];
      while !cur.is_null() {
        let node = cur.as_ref();
        if !f(node.key_ref(), node.value_ref()) {
          break;
        }
        cur = node.forward[0];
      }
    }
  }

  /// Visits every entry whose key lies in `[start, end]` (both inclusive)
  /// in ascending order, until the visitor returns `false`. An inverted
  /// range visits nothing.
  ///
  /// ## Example
  ///
  /// ```rust
  /// use ranklist::SkipList;
  ///
  /// let l = SkipList::new();
  /// for k in [10, 20, 30, 40, 50] {
  ///   l.insert(k, k * 10);
  /// }
  ///
  /// let mut seen = Vec::new();
  /// l.range_query(&15, &45, |k, _| {
  ///   seen.push(*k);
  ///   true
  /// });
  /// assert_eq!(seen, [20, 30, 40]);
  /// ```
  pub fn range_query<F>(&self, start: &K, end: &K, mut f: F)
  where
    F: FnMut(&K, &V) -> bool,
  {
    let inner = self.inner.read();
    unsafe {
      let mut cur = inner.find_ge(start);
      while !cur.is_null() {
        let node = cur.as_ref();
        if inner.cmp.compare(node.key_ref(), end) == Ordering::Greater {
          break;
        }
        if !f(node.key_ref(), node.value_ref()) {
          break;
        }
        cur = node.forward[0];
      }
    }
  }

  /// Counts the entries whose keys lie in `[start, end]` (both inclusive).
  /// An inverted range counts zero.
  pub fn count_range(&self, start: &K, end: &K) -> usize {
    let inner = self.inner.read();
    if inner.cmp.compare(start, end) == Ordering::Greater {
      return 0;
    }

    let mut count = 0;
    unsafe {
      let mut cur = inner.find_ge(start);
      while !cur.is_null() {
        let node = cur.as_ref();
        if inner.cmp.compare(node.key_ref(), end) == Ordering::Greater {
          break;
        }
        count += 1;
        cur = node.forward[0];
      }
    }
    count
  }

  /// Removes every entry, resetting the list to the empty state.
  ///
  /// The pool allocator releases all of its nodes back to the heap; the
  /// arena allocator keeps its first chunk and discards the rest, so the
  /// list can be refilled without reallocating. Any iterator created before
  /// `clear` must not be used afterwards.
  #[inline]
  pub fn clear(&self) {
    self.inner.write().clear();
  }

  /// Creates a forward iterator positioned before the first entry.
  ///
  /// Each iterator operation briefly takes the shared lock. The cursor is
  /// only guaranteed while no other thread removes the entry it rests on;
  /// see [`range_iter`](SkipList::range_iter) for an iterator that keeps
  /// the list read-locked instead.
  ///
  /// ## Example
  ///
  /// ```rust
  /// use ranklist::SkipList;
  ///
  /// let l = SkipList::new();
  /// for k in [3, 1, 2] {
  ///   l.insert(k, ());
  /// }
  ///
  /// let mut it = l.iter();
  /// let mut keys = Vec::new();
  /// while it.next() {
  ///   keys.push(it.key());
  /// }
  /// assert_eq!(keys, [1, 2, 3]);
  /// ```
  #[inline]
  pub fn iter(&self) -> Iter<'_, K, V, C> {
    self.iter_with(IterOptions::new())
  }

  /// Creates an iterator configured through [`IterOptions`]: reversed
  /// and/or bounded by an inclusive end key.
  pub fn iter_with(&self, opts: IterOptions<K>) -> Iter<'_, K, V, C> {
    let head = self.inner.read().header;
    let (reverse, end) = opts.into_parts();
    Iter::relocking(self, head, reverse, end)
  }

  /// Runs `f` with an iterator over the list while holding the shared lock
  /// once for the whole call, which is cheaper than a per-operation locking
  /// iterator for long traversals.
  ///
  /// The iterator handed to the callback must not escape it, and the
  /// callback must not call back into mutating operations on the same
  /// list.
  pub fn range_with_iter<F>(&self, f: F)
  where
    F: FnOnce(&mut Iter<'_, K, V, C>),
  {
    let guard = self.inner.read();
    let mut it = Iter::borrowed_lock(self, guard.header);
    f(&mut it);
    drop(guard);
  }

  /// Creates an iterator over `[start, end]` (both inclusive) that acquires
  /// the shared lock on construction and holds it until
  /// [`close`](Iter::close) is called or the iterator is dropped.
  ///
  /// Writers block for as long as the lock is held, so close the iterator
  /// as soon as the traversal is done.
  ///
  /// ## Example
  ///
  /// ```rust
  /// use ranklist::SkipList;
  ///
  /// let l = SkipList::new();
  /// for k in [10, 20, 30] {
  ///   l.insert(k, ());
  /// }
  ///
  /// let mut it = l.range_iter(15, 25);
  /// assert!(it.next());
  /// assert_eq!(it.key(), 20);
  /// assert!(!it.next());
  /// it.close();
  /// ```
  pub fn range_iter(&self, start: K, end: K) -> Iter<'_, K, V, C> {
    let guard = self.inner.read();
    let head = guard.header;
    Iter::lock_holding(self, guard, head, start, end)
  }
}

impl<K, V, C> fmt::Debug for SkipList<K, V, C> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let inner = self.inner.read();
    f.debug_struct("SkipList")
      .field("len", &inner.length)
      .field("level", &inner.level)
      .finish()
  }
}

/// The lock-protected structure. Every method assumes the caller holds the
/// appropriate side of the surrounding [`RwLock`].
pub(crate) struct ListInner<K, V, C> {
  pub(crate) header: NodePtr<K, V>,
  /// 0-based index of the highest occupied level.
  pub(crate) level: usize,
  pub(crate) length: usize,
  pub(crate) cmp: C,
  rng: SmallRng,
  allocator: Allocator<K, V>,
  /// Scratch: the last node visited per level during an update walk.
  update: [NodePtr<K, V>; MAX_HEIGHT],
  /// Scratch: base-level positions traversed up to `update[i]`.
  rank: [usize; MAX_HEIGHT],
}

impl<K, V, C> ListInner<K, V, C> {
  fn new(opts: Options, cmp: C) -> Self {
    let allocator = match opts.arena_capacity() {
      Some(bytes) => Allocator::Arena(ArenaAllocator::new(bytes, opts.growth_policy())),
      None => Allocator::Pool(PoolAllocator::new()),
    };

    Self {
      header: NodePtr::from_boxed(Box::new(Node::sentinel(MAX_HEIGHT))),
      level: 0,
      length: 0,
      cmp,
      rng: SmallRng::from_entropy(),
      allocator,
      update: [NodePtr::NULL; MAX_HEIGHT],
      rank: [0; MAX_HEIGHT],
    }
  }

  /// Samples the height of a new node: 2-bit windows of one random word,
  /// each zero window extending the tower with probability 1/4.
  fn random_level(&mut self) -> usize {
    let mut x = self.rng.gen::<u64>();
    let mut level = 1;
    while level < MAX_HEIGHT && x & 3 == 0 {
      level += 1;
      x >>= 2;
    }
    level
  }

  /// Clones the payload of `nd` into an owned [`Entry`]; null and the
  /// header sentinel map to `None`.
  fn entry_at(&self, nd: NodePtr<K, V>) -> Option<Entry<K, V>>
  where
    K: Clone,
    V: Clone,
  {
    if nd.is_null() || nd == self.header {
      return None;
    }
    let node = unsafe { nd.as_ref() };
    Some(Entry::new(node.key_ref().clone(), node.value_ref().clone()))
  }

  fn release_all(&mut self) {
    unsafe {
      let mut cur = self.header.as_ref().forward[0];
      while !cur.is_null() {
        let next = cur.as_ref().forward[0];
        self.allocator.release(cur);
        cur = next;
      }
    }
  }

  fn clear(&mut self) {
    self.release_all();
    unsafe {
      let header = self.header.as_mut();
      for p in header.forward.iter_mut() {
        *p = NodePtr::NULL;
      }
      for s in header.span.iter_mut() {
        *s = 0;
      }
    }
    self.level = 0;
    self.length = 0;
    self.allocator.reset();

    #[cfg(feature = "tracing")]
    tracing::debug!("skip list cleared");
  }

  #[cfg(test)]
  pub(crate) fn allocator(&self) -> &Allocator<K, V> {
    &self.allocator
  }
}

impl<K, V, C> Drop for ListInner<K, V, C> {
  fn drop(&mut self) {
    self.release_all();
    // Safety: the header was boxed in new and never touched the allocator.
    drop(unsafe { self.header.into_boxed() });
  }
}

impl<K, V, C> ListInner<K, V, C>
where
  C: Comparator<K>,
{
  /// The node holding exactly `key`, or null.
  pub(crate) fn search(&self, key: &K) -> NodePtr<K, V> {
    let nd = self.find_ge(key);
    if !nd.is_null()
      && self.cmp.compare(unsafe { nd.as_ref() }.key_ref(), key) == Ordering::Equal
    {
      nd
    } else {
      NodePtr::NULL
    }
  }

  /// The first node with key `>= key`, or null.
  pub(crate) fn find_ge(&self, key: &K) -> NodePtr<K, V> {
    unsafe {
      let mut cur = self.header;
      for i in (0..=self.level).rev() {
        loop {
          let next = cur.as_ref().forward[i];
          if next.is_null() {
            break;
          }
          if self.cmp.compare(next.as_ref().key_ref(), key) == Ordering::Less {
            cur = next;
          } else {
            break;
          }
        }
      }
      cur.as_ref().forward[0]
    }
  }

  /// The first node with key `> key`, or null.
  pub(crate) fn find_gt(&self, key: &K) -> NodePtr<K, V> {
    unsafe {
      let mut cur = self.header;
      for i in (0..=self.level).rev() {
        loop {
          let next = cur.as_ref().forward[i];
          if next.is_null() {
            break;
          }
          if self.cmp.compare(next.as_ref().key_ref(), key) != Ordering::Greater {
            cur = next;
          } else {
            break;
          }
        }
      }
      cur.as_ref().forward[0]
    }
  }

  /// The last node with key `< key`; the header if there is none.
  pub(crate) fn find_lt(&self, key: &K) -> NodePtr<K, V> {
    unsafe {
      let mut cur = self.header;
      for i in (0..=self.level).rev() {
        loop {
          let next = cur.as_ref().forward[i];
          if next.is_null() {
            break;
          }
          if self.cmp.compare(next.as_ref().key_ref(), key) == Ordering::Less {
            cur = next;
          } else {
            break;
          }
        }
      }
      cur
    }
  }

  /// The last node with key `<= key`; the header if there is none.
  pub(crate) fn find_le(&self, key: &K) -> NodePtr<K, V> {
    unsafe {
      let mut cur = self.header;
      for i in (0..=self.level).rev() {
        loop {
          let next = cur.as_ref().forward[i];
          if next.is_null() {
            break;
          }
          if self.cmp.compare(next.as_ref().key_ref(), key) != Ordering::Greater {
            cur = next;
          } else {
            break;
          }
        }
      }
      cur
    }
  }

  /// The rightmost node; the header if the list is empty.
  pub(crate) fn find_last(&self) -> NodePtr<K, V> {
    unsafe {
      let mut cur = self.header;
      for i in (0..=self.level).rev() {
        loop {
          let next = cur.as_ref().forward[i];
          if next.is_null() {
            break;
          }
          cur = next;
        }
      }
      cur
    }
  }

  fn insert(&mut self, key: K, value: V) -> Option<V> {
    unsafe {
      // Walk down, recording the rightmost node visited per level and the
      // number of base positions traversed to reach it.
      let mut cur = self.header;
      let mut i = self.level;
      loop {
        self.rank[i] = if i == self.level { 0 } else { self.rank[i + 1] };
        loop {
          let next = cur.as_ref().forward[i];
          if next.is_null() {
            break;
          }
          if self.cmp.compare(next.as_ref().key_ref(), &key) == Ordering::Less {
            self.rank[i] += cur.as_ref().span[i];
            cur = next;
          } else {
            break;
          }
        }
        self.update[i] = cur;
        if i == 0 {
          break;
        }
        i -= 1;
      }

      let candidate = cur.as_ref().forward[0];
      if !candidate.is_null()
        && self.cmp.compare(candidate.as_ref().key_ref(), &key) == Ordering::Equal
      {
        return candidate.as_mut().value.replace(value);
      }

      let height = self.random_level();

      // Allocate and fill the node before touching any chain or header
      // state, so an allocation abort cannot leave a half-spliced list.
      let nd = self.allocator.allocate();
      {
        let node = nd.as_mut();
        node.init_tower(height);
        node.key = Some(key);
        node.value = Some(value);
      }

      if height - 1 > self.level {
        let header = self.header.as_mut();
        for i in (self.level + 1)..height {
          self.update[i] = self.header;
          self.rank[i] = 0;
          // The header's link at a freshly occupied level still points to
          // null, so it covers every existing entry.
          header.span[i] = self.length;
        }
        self.level = height - 1;
      }

      for i in 0..height {
        let upd = self.update[i].as_mut();
        let node = nd.as_mut();
        node.forward[i] = upd.forward[i];
        upd.forward[i] = nd;

        // 1-based distance from update[i] to the new node.
        let reach = self.rank[0] - self.rank[i] + 1;
        // Grouped so the subtraction cannot underflow when update[i]'s link
        // was a trailing link to null.
        node.span[i] = upd.span[i] + 1 - reach;
        upd.span[i] = reach;
      }

      // The new node sits below the links of the taller path nodes.
      for i in height..=self.level {
        self.update[i].as_mut().span[i] += 1;
      }

      let node = nd.as_mut();
      node.backward = self.update[0];
      let next0 = node.forward[0];
      if !next0.is_null() {
        next0.as_mut().backward = nd;
      }

      self.length += 1;
      None
    }
  }

  /// Detaches `nd` from every chain and releases it.
  ///
  /// ## Safety
  ///
  /// `self.update` must hold the update path for `nd`'s key and `nd` must
  /// be `update[0].forward[0]`.
  unsafe fn unlink(&mut self, nd: NodePtr<K, V>) {
    for i in 0..=self.level {
      let upd = self.update[i].as_mut();
      if upd.forward[i] == nd {
        // Absorb the removed link's coverage, minus the node itself.
        upd.span[i] += nd.as_ref().span[i];
        upd.span[i] -= 1;
        upd.forward[i] = nd.as_ref().forward[i];
      } else {
        // The removed node lies somewhere below this link. This holds for
        // trailing links to null as well, which keeps span sums equal to
        // the length at every occupied level.
        upd.span[i] -= 1;
      }
    }

    while self.level > 0 && self.header.as_ref().forward[self.level].is_null() {
      self.level -= 1;
    }

    let next0 = nd.as_ref().forward[0];
    if !next0.is_null() {
      next0.as_mut().backward = nd.as_ref().backward;
    }

    self.allocator.release(nd);
    self.length -= 1;
  }

  /// Walks the list for `key`, filling `self.update`, and returns
  /// `update[0].forward[0]` (the only node that can match `key`).
  unsafe fn build_update_path(&mut self, key: &K) -> NodePtr<K, V> {
    let mut cur = self.header;
    let mut i = self.level;
    loop {
      loop {
        let next = cur.as_ref().forward[i];
        if next.is_null() {
          break;
        }
        if self.cmp.compare(next.as_ref().key_ref(), key) == Ordering::Less {
          cur = next;
        } else {
          break;
        }
      }
      self.update[i] = cur;
      if i == 0 {
        break;
      }
      i -= 1;
    }
    cur.as_ref().forward[0]
  }

  fn remove(&mut self, key: &K) -> Option<V> {
    unsafe {
      let target = self.build_update_path(key);
      if target.is_null() || self.cmp.compare(target.as_ref().key_ref(), key) != Ordering::Equal
      {
        return None;
      }
      let value = target.as_mut().value.take();
      self.unlink(target);
      value
    }
  }

  fn pop_min(&mut self) -> Option<Entry<K, V>> {
    if self.length == 0 {
      return None;
    }

    unsafe {
      let target = self.header.as_ref().forward[0];
      // Nothing sits left of the minimum, so the update path is the header
      // at every level.
      for i in 0..=self.level {
        self.update[i] = self.header;
      }
      let (key, value) = target.as_mut().take_payload();
      self.unlink(target);
      Some(Entry::new(key, value))
    }
  }

  fn pop_max(&mut self) -> Option<Entry<K, V>> {
    if self.length == 0 {
      return None;
    }

    unsafe {
      // Two passes: locate the tail, then rebuild the update path by its
      // key exactly as remove does, so the span bookkeeping stays on the
      // same code path.
      let tail = self.find_last();
      let target = {
        let tail_key = tail.as_ref().key_ref();
        self.build_update_path(tail_key)
      };
      debug_assert!(target == tail);

      let (key, value) = target.as_mut().take_payload();
      self.unlink(target);
      Some(Entry::new(key, value))
    }
  }

  fn rank_of(&self, key: &K) -> usize {
    unsafe {
      let mut rank = 0;
      let mut cur = self.header;
      for i in (0..=self.level).rev() {
        loop {
          let next = cur.as_ref().forward[i];
          if next.is_null() {
            break;
          }
          if self.cmp.compare(next.as_ref().key_ref(), key) == Ordering::Less {
            rank += cur.as_ref().span[i];
            cur = next;
          } else {
            break;
          }
        }
      }
      rank
    }
  }

  /// The node at the 0-based `rank`, or null when out of bounds.
  pub(crate) fn node_by_rank(&self, rank: usize) -> NodePtr<K, V> {
    if rank >= self.length {
      return NodePtr::NULL;
    }

    unsafe {
      // The header sits one position before the first entry, so the target
      // is expressed as a 1-based distance from it.
      let target = rank + 1;
      let mut traversed = 0usize;
      let mut cur = self.header;
      for i in (0..=self.level).rev() {
        loop {
          let next = cur.as_ref().forward[i];
          if next.is_null() || traversed + cur.as_ref().span[i] > target {
            break;
          }
          traversed += cur.as_ref().span[i];
          cur = next;
        }
      }
      debug_assert_eq!(traversed, target);
      cur
    }
  }
}
