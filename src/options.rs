use crate::arena::GrowthPolicy;

/// Options for configuring a [`SkipList`](crate::SkipList) at construction.
///
/// The default configuration recycles nodes through a free-list pool. Calling
/// [`with_arena`](Options::with_arena) switches the list to a chunked arena
/// allocator; the remaining `with_arena_*` methods tune how that arena grows
/// and are ignored by the pool allocator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Options {
  arena: Option<usize>,
  growth_factor: f64,
  growth_bytes: Option<usize>,
  growth_threshold: Option<f64>,
}

impl Default for Options {
  #[inline]
  fn default() -> Self {
    Self::new()
  }
}

impl Options {
  /// Creates a new set of options with the default values.
  ///
  /// ## Example
  ///
  /// ```rust
  /// use ranklist::Options;
  ///
  /// let opts = Options::new();
  /// ```
  #[inline]
  pub const fn new() -> Self {
    Self {
      arena: None,
      growth_factor: 2.0,
      growth_bytes: None,
      growth_threshold: None,
    }
  }

  /// Backs the list with a memory arena whose first chunk holds
  /// `size_in_bytes` worth of nodes (at least one node).
  ///
  /// The arena grows automatically when a chunk is exhausted, doubling the
  /// chunk capacity unless reconfigured through
  /// [`with_arena_growth_factor`](Options::with_arena_growth_factor) or
  /// [`with_arena_growth_bytes`](Options::with_arena_growth_bytes). A zero
  /// size is ignored and leaves the pool allocator selected.
  ///
  /// ## Example
  ///
  /// ```rust
  /// use ranklist::Options;
  ///
  /// let opts = Options::new().with_arena(64 * 1024);
  /// ```
  #[inline]
  pub const fn with_arena(mut self, size_in_bytes: usize) -> Self {
    if size_in_bytes > 0 {
      self.arena = Some(size_in_bytes);
    }
    self
  }

  /// Sets the factor by which each new arena chunk grows over the previous
  /// one. A factor of `2.0` means each chunk is twice as large as the last.
  ///
  /// Values not greater than `1.0` are ignored. Only effective together with
  /// [`with_arena`](Options::with_arena), and overridden by
  /// [`with_arena_growth_bytes`](Options::with_arena_growth_bytes) when both
  /// are set.
  #[inline]
  pub fn with_arena_growth_factor(mut self, factor: f64) -> Self {
    if factor > 1.0 {
      self.growth_factor = factor;
    }
    self
  }

  /// Grows the arena by a fixed number of bytes per chunk instead of a
  /// factor of the previous chunk.
  ///
  /// A zero value is ignored. Only effective together with
  /// [`with_arena`](Options::with_arena).
  #[inline]
  pub const fn with_arena_growth_bytes(mut self, bytes: usize) -> Self {
    if bytes > 0 {
      self.growth_bytes = Some(bytes);
    }
    self
  }

  /// Sets the arena's proactive growth threshold (e.g. `0.9` for 90%).
  ///
  /// When an allocation would push the current chunk's usage past the
  /// threshold, the arena opens a new chunk instead of filling the current
  /// one to the brim. Values outside `(0, 1)` are ignored. Only effective
  /// together with [`with_arena`](Options::with_arena).
  #[inline]
  pub fn with_arena_growth_threshold(mut self, threshold: f64) -> Self {
    if threshold > 0.0 && threshold < 1.0 {
      self.growth_threshold = Some(threshold);
    }
    self
  }

  /// Initial arena capacity in bytes, if the arena allocator is selected.
  #[inline]
  pub(crate) const fn arena_capacity(&self) -> Option<usize> {
    self.arena
  }

  #[inline]
  pub(crate) const fn growth_policy(&self) -> GrowthPolicy {
    GrowthPolicy {
      factor: self.growth_factor,
      bytes: self.growth_bytes,
      threshold: self.growth_threshold,
    }
  }
}

/// Options for constructing an iterator through
/// [`SkipList::iter_with`](crate::SkipList::iter_with).
///
/// ## Example
///
/// ```rust
/// use ranklist::{IterOptions, SkipList};
///
/// let l = SkipList::new();
/// for k in [10, 20, 30, 40, 50] {
///   l.insert(k, k);
/// }
///
/// let mut it = l.iter_with(IterOptions::new().with_reverse(true).with_end(35));
/// let mut keys = Vec::new();
/// while it.next() {
///   keys.push(it.key());
/// }
/// assert_eq!(keys, [30, 20, 10]);
/// ```
#[derive(Debug, Clone)]
pub struct IterOptions<K> {
  reverse: bool,
  end: Option<K>,
}

impl<K> Default for IterOptions<K> {
  #[inline]
  fn default() -> Self {
    Self::new()
  }
}

impl<K> IterOptions<K> {
  /// Creates iterator options with the default values: forward iteration
  /// over the whole list.
  #[inline]
  pub const fn new() -> Self {
    Self {
      reverse: false,
      end: None,
    }
  }

  /// Iterates from the largest key toward the smallest instead of the other
  /// way around.
  #[inline]
  pub const fn with_reverse(mut self, reverse: bool) -> Self {
    self.reverse = reverse;
    self
  }

  /// Bounds the iteration by an inclusive end key.
  ///
  /// A forward iterator stops after the last key `<= end`; a reverse
  /// iterator starts at the largest key `<= end` and runs downward from
  /// there.
  #[inline]
  pub fn with_end(mut self, end: K) -> Self {
    self.end = Some(end);
    self
  }

  #[inline]
  pub(crate) fn into_parts(self) -> (bool, Option<K>) {
    (self.reverse, self.end)
  }
}
