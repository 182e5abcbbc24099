/// A restartable source of keys for [`FuseFilter::populate_from`](crate::FuseFilter::populate_from).
///
/// Construction walks the keys once per attempt, so a source must be able to
/// replay them: after [`next_key`](KeySource::next_key) returns `None` the
/// following call starts over from the first key. Every pass must yield exactly
/// [`len`](KeySource::len) keys.
pub trait KeySource {
    /// Next key of the current pass, or `None` at the end of the pass.
    fn next_key(&mut self) -> Option<u64>;

    /// Number of keys in a full pass.
    fn len(&self) -> usize;

    /// Whether a pass yields no keys.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Keys held in a slice.
#[derive(Debug, Clone)]
pub struct SliceKeys<'a> {
    keys: &'a [u64],
    pos: usize,
}

impl<'a> SliceKeys<'a> {
    /// Creates a source replaying `keys` in order.
    pub fn new(keys: &'a [u64]) -> Self {
        SliceKeys { keys, pos: 0 }
    }
}

impl KeySource for SliceKeys<'_> {
    #[inline]
    fn next_key(&mut self) -> Option<u64> {
        if let Some(&key) = self.keys.get(self.pos) {
            self.pos += 1;
            Some(key)
        } else {
            self.pos = 0;
            None
        }
    }

    #[inline]
    fn len(&self) -> usize {
        self.keys.len()
    }
}

/// Adapts an [`ExactSizeIterator`] into a [`KeySource`] by cloning the
/// original iterator at the start of each pass.
///
/// Useful when keys are generated on the fly and should not be materialized.
/// `Range<u64>` is not an [`ExactSizeIterator`], so `u64` keys from a range are
/// produced by mapping a `usize` range, e.g. `(0..n).map(|k| k as u64)`.
#[derive(Debug, Clone)]
pub struct RestartableIter<I> {
    origin: I,
    current: I,
    len: usize,
}

impl<I> RestartableIter<I>
where
    I: ExactSizeIterator<Item = u64> + Clone,
{
    /// Creates a source replaying `iter`, whose length is taken once up front.
    pub fn new(iter: I) -> Self {
        RestartableIter {
            len: iter.len(),
            current: iter.clone(),
            origin: iter,
        }
    }
}

impl<I> KeySource for RestartableIter<I>
where
    I: ExactSizeIterator<Item = u64> + Clone,
{
    #[inline]
    fn next_key(&mut self) -> Option<u64> {
        let key = self.current.next();
        if key.is_none() {
            self.current = self.origin.clone();
        }
        key
    }

    #[inline]
    fn len(&self) -> usize {
        self.len
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(source: &mut impl KeySource) -> Vec<u64> {
        let mut out = Vec::new();
        while let Some(k) = source.next_key() {
            out.push(k);
        }
        out
    }

    #[test]
    fn slice_keys_restart() {
        let keys = [3u64, 1, 4, 1, 5];
        let mut source = SliceKeys::new(&keys);
        assert_eq!(source.len(), 5);
        assert_eq!(drain(&mut source), keys);
        assert_eq!(drain(&mut source), keys);
    }

    #[test]
    fn slice_keys_empty() {
        let mut source = SliceKeys::new(&[]);
        assert!(source.is_empty());
        assert_eq!(source.next_key(), None);
        assert_eq!(source.next_key(), None);
    }

    #[test]
    fn restartable_iter_restart() {
        let mut source = RestartableIter::new((10..20usize).map(|k| k as u64 * 3));
        assert_eq!(source.len(), 10);
        let first = drain(&mut source);
        assert_eq!(first.len(), 10);
        assert_eq!(first[0], 30);
        assert_eq!(drain(&mut source), first);
    }

    #[test]
    fn restartable_iter_partial_pass() {
        let mut source = RestartableIter::new((0..3usize).map(|k| k as u64));
        assert_eq!(source.next_key(), Some(0));
        assert_eq!(source.next_key(), Some(1));
        assert_eq!(source.next_key(), Some(2));
        assert_eq!(source.next_key(), None);
        assert_eq!(source.next_key(), Some(0));
    }
}
