//! Best-Fit Search Order - precomputed superset probes.
//!
//! Every interval map lookup walks the same sequence of candidate
//! supersets of the requested interval, tightest first. The sequence only
//! depends on the number of segments, so it is generated once at startup
//! and shared read-only by every train.

/// Slack added around a requested interval to form one candidate superset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SearchOffset {
    /// Extra segments before the requested start
    pub leading: i16,
    /// Extra segments after the requested stop
    pub trailing: i16,
}

impl SearchOffset {
    /// Total wasted segments if this candidate is booked.
    #[inline]
    pub const fn slack(&self) -> i16 {
        self.leading + self.trailing
    }
}

/// Immutable probe sequence ordered by increasing total slack, then by
/// increasing leading slack.
///
/// For `S` segments the sequence holds `S * (S + 1) / 2` offsets: one per
/// `(leading, trailing)` pair whose sum stays below `S`.
#[derive(Clone, Debug)]
pub struct BestFitSearchOrder {
    segments: i16,
    offsets: Box<[SearchOffset]>,
}

impl BestFitSearchOrder {
    /// Generate the probe sequence for routes of `segments` legs.
    pub fn new(segments: i16) -> Self {
        let mut offsets = Vec::new();
        for slack in 0..segments.max(0) {
            for leading in 0..=slack {
                offsets.push(SearchOffset {
                    leading,
                    trailing: slack - leading,
                });
            }
        }

        Self {
            segments,
            offsets: offsets.into_boxed_slice(),
        }
    }

    #[inline]
    pub fn segments(&self) -> i16 {
        self.segments
    }

    #[inline]
    pub fn offsets(&self) -> &[SearchOffset] {
        &self.offsets
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Iterate the in-range supersets of `[start, start + length)`, tightest
    /// first, as `(start, length)` pairs.
    #[inline]
    pub fn candidates(&self, start: i16, length: i16) -> impl Iterator<Item = (i16, i16)> + '_ {
        let segments = self.segments;
        self.offsets.iter().filter_map(move |offset| {
            let cand_start = start - offset.leading;
            let cand_length = length + offset.slack();
            if cand_start < 0 || cand_length > segments || cand_start + cand_length > segments {
                None
            } else {
                Some((cand_start, cand_length))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_length() {
        assert_eq!(BestFitSearchOrder::new(10).len(), 55);
        assert_eq!(BestFitSearchOrder::new(1).len(), 1);
        assert!(BestFitSearchOrder::new(0).is_empty());
    }

    #[test]
    fn test_exact_match_first() {
        let order = BestFitSearchOrder::new(10);
        assert_eq!(order.offsets()[0], SearchOffset { leading: 0, trailing: 0 });
    }

    #[test]
    fn test_prefers_trailing_leftover() {
        let order = BestFitSearchOrder::new(10);
        assert_eq!(order.offsets()[1], SearchOffset { leading: 0, trailing: 1 });
        assert_eq!(order.offsets()[2], SearchOffset { leading: 1, trailing: 0 });
        assert_eq!(order.offsets()[3], SearchOffset { leading: 0, trailing: 2 });
    }

    #[test]
    fn test_ordered_by_slack_then_leading() {
        let order = BestFitSearchOrder::new(12);
        for pair in order.offsets().windows(2) {
            let (a, b) = (pair[0], pair[1]);
            assert!(
                (a.slack(), a.leading) < (b.slack(), b.leading),
                "{:?} must precede {:?}",
                a,
                b
            );
        }
    }

    #[test]
    fn test_candidates_stay_in_range() {
        let order = BestFitSearchOrder::new(10);
        let candidates: Vec<_> = order.candidates(8, 1).collect();

        assert_eq!(candidates[0], (8, 1));
        assert_eq!(candidates[1], (8, 2));
        assert_eq!(candidates[2], (7, 2));
        for (start, length) in candidates {
            assert!(start >= 0);
            assert!(start + length <= 10);
        }
    }

    #[test]
    fn test_candidates_cover_every_superset_once() {
        let order = BestFitSearchOrder::new(10);
        let candidates: Vec<_> = order.candidates(3, 1).collect();
        // Supersets of [3, 4) within [0, 10): 4 possible starts x 7 possible ends
        assert_eq!(candidates.len(), 4 * 7);
        assert_eq!(*candidates.last().unwrap(), (0, 10));
    }
}
