use core::cmp::Ordering;

use parking_lot::RwLockReadGuard;

use crate::comparator::{Ascend, Comparator};
use crate::node::NodePtr;

use super::{ListInner, SkipList};

/// A cursor over a [`SkipList`].
///
/// The cursor rests in one of three states: before the first entry (the
/// initial state, also reached by [`reset`](Iter::reset)), on an entry
/// ([`key`](Iter::key) and [`value`](Iter::value) are defined), or
/// exhausted. Movement methods return `true` exactly when they land on an
/// entry.
///
/// Three locking flavours share this type:
///
/// - [`SkipList::iter`]/[`SkipList::iter_with`] produce an iterator that
///   briefly takes the list's shared lock for every operation. It may run
///   concurrently with writers, but its cursor is only guaranteed while no
///   other thread removes the entry it rests on; a cursor invalidated by a
///   concurrent removal degrades to exhausted. It must not be used at all
///   once the list has been cleared.
/// - [`SkipList::range_with_iter`] hands its callback an iterator that does
///   not lock; the callback as a whole runs under one shared lock.
/// - [`SkipList::range_iter`] produces an iterator that owns the shared
///   lock until [`close`](Iter::close) or drop, blocking writers for its
///   whole lifetime.
///
/// Reverse iterators walk from the largest key toward the smallest;
/// [`next`](Iter::next) and [`prev`](Iter::prev) swap directions while
/// [`first`](Iter::first) and [`last`](Iter::last) keep their meaning. An
/// inclusive end bound caps forward iteration and is the starting point of
/// reverse iteration.
pub struct Iter<'a, K, V, C = Ascend> {
  list: &'a SkipList<K, V, C>,
  head: NodePtr<K, V>,
  /// Held for the iterator's lifetime by the range-iterator flavour.
  guard: Option<RwLockReadGuard<'a, ListInner<K, V, C>>>,
  /// Whether operations acquire the shared lock themselves.
  relock: bool,
  /// The cursor: the header sentinel before the first entry, null when
  /// exhausted, an entry node otherwise.
  current: NodePtr<K, V>,
  reverse: bool,
  /// Inclusive start key, set by the range-iterator flavour.
  lower: Option<K>,
  /// Inclusive end key.
  upper: Option<K>,
}

impl<'a, K, V, C> Iter<'a, K, V, C>
where
  C: Comparator<K>,
{
  #[inline]
  pub(super) fn relocking(
    list: &'a SkipList<K, V, C>,
    head: NodePtr<K, V>,
    reverse: bool,
    end: Option<K>,
  ) -> Self {
    Self {
      list,
      head,
      guard: None,
      relock: true,
      current: head,
      reverse,
      lower: None,
      upper: end,
    }
  }

  #[inline]
  pub(super) fn borrowed_lock(list: &'a SkipList<K, V, C>, head: NodePtr<K, V>) -> Self {
    Self {
      list,
      head,
      guard: None,
      relock: false,
      current: head,
      reverse: false,
      lower: None,
      upper: None,
    }
  }

  #[inline]
  pub(super) fn lock_holding(
    list: &'a SkipList<K, V, C>,
    guard: RwLockReadGuard<'a, ListInner<K, V, C>>,
    head: NodePtr<K, V>,
    start: K,
    end: K,
  ) -> Self {
    Self {
      list,
      head,
      guard: Some(guard),
      relock: false,
      current: head,
      reverse: false,
      lower: Some(start),
      upper: Some(end),
    }
  }

  fn with_inner<R>(&self, f: impl FnOnce(&ListInner<K, V, C>) -> R) -> R {
    if let Some(guard) = &self.guard {
      f(guard)
    } else if self.relock {
      let guard = self.list.inner.read();
      f(&guard)
    } else {
      // Safety: iterators without a guard and without relocking are only
      // handed out by range_with_iter, whose enclosing scope holds the
      // shared lock for the duration of the callback.
      unsafe { f(&*self.list.inner.data_ptr()) }
    }
  }

  #[inline]
  fn on_entry(&self) -> bool {
    !self.current.is_null() && self.current != self.head
  }

  /// Null when `nd` carries a key past the inclusive end bound (or no key
  /// at all, which a stale cursor can produce); `nd` itself otherwise.
  fn clamp_upper(&self, inner: &ListInner<K, V, C>, nd: NodePtr<K, V>) -> NodePtr<K, V> {
    if nd.is_null() {
      return NodePtr::NULL;
    }
    if let Some(end) = &self.upper {
      let node = unsafe { nd.as_ref() };
      match node.key.as_ref() {
        Some(key) if inner.cmp.compare(key, end) == Ordering::Greater => return NodePtr::NULL,
        Some(_) => {}
        None => return NodePtr::NULL,
      }
    }
    nd
  }

  fn below_lower(&self, inner: &ListInner<K, V, C>, nd: NodePtr<K, V>) -> bool {
    match (&self.lower, unsafe { nd.as_ref() }.key.as_ref()) {
      (Some(start), Some(key)) => inner.cmp.compare(key, start) == Ordering::Less,
      (Some(_), None) => true,
      (None, _) => false,
    }
  }

  /// Advances the iterator: toward larger keys normally, toward smaller
  /// keys in reverse mode. Returns `true` if the cursor now rests on an
  /// entry.
  #[allow(clippy::should_implement_trait)]
  pub fn next(&mut self) -> bool {
    let cur = self.current;
    let head = self.head;
    let nd = self.with_inner(|inner| {
      if self.reverse {
        if cur.is_null() {
          NodePtr::NULL
        } else if cur == head {
          // Reverse iteration starts at the largest in-bound key.
          let start = match &self.upper {
            Some(end) => inner.find_le(end),
            None => inner.find_last(),
          };
          if start == head {
            NodePtr::NULL
          } else {
            start
          }
        } else {
          let back = unsafe { cur.as_ref() }.backward;
          if back.is_null() || back == head {
            NodePtr::NULL
          } else {
            back
          }
        }
      } else {
        let candidate = if cur == head {
          match &self.lower {
            Some(start) => inner.find_ge(start),
            None => unsafe { head.as_ref() }.forward[0],
          }
        } else if cur.is_null() {
          NodePtr::NULL
        } else {
          unsafe { cur.as_ref() }.next0()
        };
        self.clamp_upper(inner, candidate)
      }
    });
    self.current = nd;
    self.on_entry()
  }

  /// Steps the iterator the other way: toward smaller keys normally, toward
  /// larger keys in reverse mode. Stepping off the first in-bound entry
  /// parks the cursor before it; an exhausted cursor stays exhausted.
  /// Returns `true` if the cursor now rests on an entry.
  pub fn prev(&mut self) -> bool {
    let cur = self.current;
    let head = self.head;
    let nd = self.with_inner(|inner| {
      if cur.is_null() || cur == head {
        return NodePtr::NULL;
      }
      if self.reverse {
        let fwd = unsafe { cur.as_ref() }.next0();
        if fwd.is_null() || self.clamp_upper(inner, fwd).is_null() {
          head
        } else {
          fwd
        }
      } else {
        let back = unsafe { cur.as_ref() }.backward;
        if back.is_null() {
          NodePtr::NULL
        } else if back == head || self.below_lower(inner, back) {
          head
        } else {
          back
        }
      }
    });
    self.current = nd;
    self.on_entry()
  }

  /// Moves to the entry with the smallest in-bound key, whatever the
  /// iteration direction. Returns `true` if there is one.
  pub fn first(&mut self) -> bool {
    let head = self.head;
    let nd = self.with_inner(|inner| {
      let candidate = match &self.lower {
        Some(start) => inner.find_ge(start),
        None => unsafe { head.as_ref() }.forward[0],
      };
      self.clamp_upper(inner, candidate)
    });
    self.current = nd;
    self.on_entry()
  }

  /// Moves to the entry with the largest in-bound key, whatever the
  /// iteration direction. Returns `true` if there is one.
  pub fn last(&mut self) -> bool {
    let head = self.head;
    let nd = self.with_inner(|inner| {
      let candidate = match &self.upper {
        Some(end) => inner.find_le(end),
        None => inner.find_last(),
      };
      if candidate == head || self.below_lower(inner, candidate) {
        NodePtr::NULL
      } else {
        candidate
      }
    });
    self.current = nd;
    self.on_entry()
  }

  /// Moves to the first entry with a key greater than or equal to `key`
  /// that still lies within the iterator's bounds. Returns `true` if there
  /// is one; otherwise the cursor is exhausted.
  pub fn seek(&mut self, key: &K) -> bool {
    let nd = self.with_inner(|inner| {
      let candidate = inner.find_ge(key);
      if candidate.is_null() || self.below_lower(inner, candidate) {
        return NodePtr::NULL;
      }
      self.clamp_upper(inner, candidate)
    });
    self.current = nd;
    self.on_entry()
  }

  /// Parks the cursor before the first entry, so the following
  /// [`next`](Iter::next) lands on it. Returns `true` if the list is
  /// non-empty.
  pub fn seek_to_first(&mut self) -> bool {
    self.current = self.head;
    self.with_inner(|inner| inner.length > 0)
  }

  /// Parks the cursor just before the last in-bound entry, so the following
  /// [`next`](Iter::next) lands on it. Returns `true` if the list is
  /// non-empty.
  pub fn seek_to_last(&mut self) -> bool {
    let head = self.head;
    let (nd, non_empty) = self.with_inner(|inner| {
      let last = match &self.upper {
        Some(end) => inner.find_le(end),
        None => inner.find_last(),
      };
      let nd = if last == head {
        head
      } else {
        let back = unsafe { last.as_ref() }.backward;
        if back.is_null() {
          head
        } else {
          back
        }
      };
      (nd, inner.length > 0)
    });
    self.current = nd;
    non_empty
  }

  /// Rewinds the cursor to the before-first state, as if the iterator had
  /// just been created.
  #[inline]
  pub fn reset(&mut self) {
    self.current = self.head;
  }

  /// Returns `true` if the cursor rests on an entry.
  #[inline]
  pub fn valid(&self) -> bool {
    self.on_entry()
  }

  /// Returns the key under the cursor.
  ///
  /// # Panics
  ///
  /// Panics if the cursor is not resting on an entry; check
  /// [`valid`](Iter::valid) or the return value of the movement methods
  /// first.
  pub fn key(&self) -> K
  where
    K: Clone,
  {
    self.with_inner(|_| {
      if !self.on_entry() {
        panic!("iterator is not positioned at an entry");
      }
      match unsafe { self.current.as_ref() }.key.as_ref() {
        Some(key) => key.clone(),
        None => panic!("iterator is not positioned at an entry"),
      }
    })
  }

  /// Returns the value under the cursor.
  ///
  /// # Panics
  ///
  /// Panics if the cursor is not resting on an entry; check
  /// [`valid`](Iter::valid) or the return value of the movement methods
  /// first.
  pub fn value(&self) -> V
  where
    V: Clone,
  {
    self.with_inner(|_| {
      if !self.on_entry() {
        panic!("iterator is not positioned at an entry");
      }
      match unsafe { self.current.as_ref() }.value.as_ref() {
        Some(value) => value.clone(),
        None => panic!("iterator is not positioned at an entry"),
      }
    })
  }

  /// Releases the shared lock held by a [`range_iter`](SkipList::range_iter)
  /// iterator; a no-op for every other flavour and for repeated calls.
  /// Dropping the iterator releases the lock as well — `close` just makes
  /// the release explicit and early.
  #[inline]
  pub fn close(&mut self) {
    self.guard = None;
  }
}

impl<'a, K, V, C> Clone for Iter<'a, K, V, C>
where
  K: Clone,
{
  /// Clones the cursor: same position, direction and bounds. A lock-holding
  /// iterator's clone acquires its own shared lock (recursively, so a
  /// queued writer cannot wedge the clone behind itself).
  fn clone(&self) -> Self {
    Self {
      list: self.list,
      head: self.head,
      guard: self.guard.as_ref().map(|_| self.list.inner.read_recursive()),
      relock: self.relock,
      current: self.current,
      reverse: self.reverse,
      lower: self.lower.clone(),
      upper: self.upper.clone(),
    }
  }
}
