//! Time range encoding.

/// Wire form of a time range set: one `[start, end]` pair per contiguous range.
pub type RangePairs = Vec<[f64; 2]>;

/// Native time range set, read through indexed `start`/`end` accessors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeRanges {
    ranges: Vec<(f64, f64)>,
}

impl TimeRanges {
    /// An empty range list.
    #[must_use]
    pub const fn new() -> Self {
        Self { ranges: Vec::new() }
    }

    /// Append a contiguous range.
    pub fn push(&mut self, start: f64, end: f64) {
        self.ranges.push((start, end));
    }

    /// Number of ranges.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Start of the range at `index`, if any.
    #[must_use]
    pub fn start(&self, index: usize) -> Option<f64> {
        self.ranges.get(index).map(|r| r.0)
    }

    /// End of the range at `index`, if any.
    #[must_use]
    pub fn end(&self, index: usize) -> Option<f64> {
        self.ranges.get(index).map(|r| r.1)
    }

    /// Encode in native enumeration order.
    #[must_use]
    pub fn to_pairs(&self) -> RangePairs {
        (0..self.len())
            .filter_map(|i| Some([self.start(i)?, self.end(i)?]))
            .collect()
    }
}

impl FromIterator<(f64, f64)> for TimeRanges {
    fn from_iter<I: IntoIterator<Item = (f64, f64)>>(iter: I) -> Self {
        Self {
            ranges: iter.into_iter().collect(),
        }
    }
}
