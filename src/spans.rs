use serde::{Deserialize, Serialize};
use std::ops::Range;

/// A half-open `[start, end)` interval into a token sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    #[inline]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    #[inline]
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }
}

impl From<(usize, usize)> for Span {
    fn from((start, end): (usize, usize)) -> Self {
        Span { start, end }
    }
}

impl From<Span> for (usize, usize) {
    fn from(span: Span) -> Self {
        (span.start, span.end)
    }
}

/// Returns every span where `target` occurs in `haystack`, in ascending order.
///
/// The scan advances one position at a time, so occurrences that overlap
/// (e.g. `[1, 1]` in `[1, 1, 1]`) are all reported. A target longer than the
/// haystack, or an empty target, yields no spans.
///
/// # Example
///
/// ```rust
/// use staticvsm::spans::{find_spans, Span};
///
/// let spans = find_spans(&[1, 2], &[1, 2, 3, 0, 1, 2, 3]);
/// assert_eq!(spans, vec![Span::from((0, 2)), Span::from((4, 6))]);
/// ```
pub fn find_spans<T: PartialEq>(target: &[T], haystack: &[T]) -> Vec<Span> {
    if target.is_empty() || target.len() > haystack.len() {
        return Vec::new();
    }

    haystack
        .windows(target.len())
        .enumerate()
        .filter(|(_, window)| *window == target)
        .map(|(i, _)| Span {
            start: i,
            end: i + target.len(),
        })
        .collect()
}

/// Counts occurrences of `target` in `haystack` without materializing spans.
pub fn count_spans<T: PartialEq>(target: &[T], haystack: &[T]) -> usize {
    if target.is_empty() || target.len() > haystack.len() {
        return 0;
    }
    haystack
        .windows(target.len())
        .filter(|window| *window == target)
        .count()
}
