//! Slice arithmetic and hyperslab encoding
//!
//! A selection is one [`Slice`] per dimension. Indexing a proxy normalizes
//! the caller's [`Index`] list against the dimensions it currently exposes
//! and then composes the result with the selection already pending, so
//! repeated slicing always addresses the original variable directly.

use std::ops::{Range, RangeFrom, RangeFull, RangeTo};

use crate::constants::dap::UNBOUNDED_STOP;
use crate::errors::{DapError, DapResult};

/// Half-open `start..stop` range with a positive `step`
///
/// `stop = None` means "to the end of the dimension".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slice {
    pub start: u64,
    pub stop: Option<u64>,
    pub step: u64,
}

impl Slice {
    /// Whole dimension
    pub const FULL: Slice = Slice {
        start: 0,
        stop: None,
        step: 1,
    };

    pub fn new(start: u64, stop: Option<u64>, step: u64) -> Self {
        Self { start, stop, step }
    }

    /// Single element at `index`
    pub fn at(index: u64) -> Self {
        Self::new(index, Some(index.saturating_add(1)), 1)
    }

    pub fn is_full(&self) -> bool {
        *self == Self::FULL
    }

    /// Apply `inner`, expressed relative to this slice, on top of it
    pub fn compose(&self, inner: &Slice) -> Slice {
        let offset = |index: u64| self.start.saturating_add(index.saturating_mul(self.step));
        let stop = match (self.stop, inner.stop) {
            (None, None) => None,
            (None, Some(inner_stop)) => Some(offset(inner_stop)),
            (Some(outer_stop), None) => Some(outer_stop),
            (Some(outer_stop), Some(inner_stop)) => Some(outer_stop.min(offset(inner_stop))),
        };
        Slice {
            start: offset(inner.start),
            stop,
            step: self.step.saturating_mul(inner.step),
        }
    }

    /// Number of elements selected from a dimension of length `dim`
    ///
    /// `None` when both the slice and the dimension are unbounded.
    pub fn len_within(&self, dim: Option<u64>) -> Option<u64> {
        let stop = match (self.stop, dim) {
            (Some(stop), Some(dim)) => stop.min(dim),
            (Some(stop), None) => stop,
            (None, Some(dim)) => dim,
            (None, None) => return None,
        };
        Some(if stop <= self.start {
            0
        } else {
            (stop - self.start).div_ceil(self.step)
        })
    }

    /// `start:stop:step` in half-open form
    fn describe(&self) -> String {
        match self.stop {
            Some(stop) => format!("{}:{}:{}", self.start, stop, self.step),
            None => format!("{}::{}", self.start, self.step),
        }
    }

    /// `[start:step:last]` with an inclusive last index
    fn encode(&self) -> String {
        let stop = self.stop.unwrap_or(UNBOUNDED_STOP);
        format!("[{}:{}:{}]", self.start, self.step, stop.saturating_sub(1))
    }
}

/// One dimension of a caller's index expression
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Index {
    /// Single position, negative counts from the end
    At(i64),
    /// `start:stop:step`, each part optional
    Range {
        start: Option<i64>,
        stop: Option<i64>,
        step: Option<i64>,
    },
    /// `:`
    Full,
    /// `...`, expands to as many `Full` as needed
    Ellipsis,
}

impl Index {
    pub fn range(start: i64, stop: i64) -> Self {
        Index::Range {
            start: Some(start),
            stop: Some(stop),
            step: None,
        }
    }

    pub fn stepped(start: i64, stop: i64, step: i64) -> Self {
        Index::Range {
            start: Some(start),
            stop: Some(stop),
            step: Some(step),
        }
    }
}

impl From<i64> for Index {
    fn from(index: i64) -> Self {
        Index::At(index)
    }
}

impl From<i32> for Index {
    fn from(index: i32) -> Self {
        Index::At(i64::from(index))
    }
}

impl From<usize> for Index {
    fn from(index: usize) -> Self {
        Index::At(i64::try_from(index).unwrap_or(i64::MAX))
    }
}

impl From<Range<i64>> for Index {
    fn from(range: Range<i64>) -> Self {
        Index::range(range.start, range.end)
    }
}

impl From<RangeFrom<i64>> for Index {
    fn from(range: RangeFrom<i64>) -> Self {
        Index::Range {
            start: Some(range.start),
            stop: None,
            step: None,
        }
    }
}

impl From<RangeTo<i64>> for Index {
    fn from(range: RangeTo<i64>) -> Self {
        Index::Range {
            start: None,
            stop: Some(range.end),
            step: None,
        }
    }
}

impl From<RangeFull> for Index {
    fn from(_: RangeFull) -> Self {
        Index::Full
    }
}

/// Convert `index` into concrete slices, one per entry of `dims`
///
/// A dimension of `None` has unknown length: negative positions cannot be
/// resolved against it and ranges stay open-ended.
pub fn normalize(index: &[Index], dims: &[Option<u64>]) -> DapResult<Vec<Slice>> {
    let expanded = expand_ellipsis(index, dims.len())?;
    dims.iter()
        .enumerate()
        .map(|(axis, dim)| {
            let index = expanded.get(axis).copied().unwrap_or(Index::Full);
            normalize_one(index, *dim, axis)
        })
        .collect()
}

fn expand_ellipsis(index: &[Index], rank: usize) -> DapResult<Vec<Index>> {
    let ellipses = index.iter().filter(|i| **i == Index::Ellipsis).count();
    if ellipses > 1 {
        return Err(DapError::InvalidSlice {
            reason: "an index can only have a single ellipsis".to_string(),
        });
    }

    let explicit = index.len() - ellipses;
    if explicit > rank {
        return Err(DapError::InvalidSlice {
            reason: format!("too many indices ({explicit}) for {rank} dimensions"),
        });
    }

    let mut expanded = Vec::with_capacity(rank);
    for item in index {
        match item {
            Index::Ellipsis => {
                expanded.extend(std::iter::repeat(Index::Full).take(rank - explicit));
            }
            other => expanded.push(*other),
        }
    }
    Ok(expanded)
}

fn resolve(position: i64, dim: Option<u64>, axis: usize) -> DapResult<u64> {
    if position >= 0 {
        return Ok(position.unsigned_abs());
    }
    match dim {
        Some(dim) => Ok(dim.saturating_sub(position.unsigned_abs())),
        None => Err(DapError::InvalidSlice {
            reason: format!("negative index {position} on axis {axis} of unknown length"),
        }),
    }
}

fn normalize_one(index: Index, dim: Option<u64>, axis: usize) -> DapResult<Slice> {
    match index {
        Index::At(position) => {
            let resolved = resolve(position, dim, axis)?;
            let in_bounds = match dim {
                Some(dim) => (position >= 0 || position.unsigned_abs() <= dim) && resolved < dim,
                None => true,
            };
            if !in_bounds {
                return Err(DapError::InvalidSlice {
                    reason: format!("index {position} is out of bounds for axis {axis}"),
                });
            }
            Ok(Slice::at(resolved))
        }
        Index::Range { start, stop, step } => {
            let step = step.unwrap_or(1);
            if step <= 0 {
                return Err(DapError::InvalidSlice {
                    reason: format!("step {step} on axis {axis} must be positive"),
                });
            }
            let clamp = |value: u64| dim.map_or(value, |dim| value.min(dim));
            let start = clamp(resolve(start.unwrap_or(0), dim, axis)?);
            let stop = match stop {
                Some(stop) => Some(clamp(resolve(stop, dim, axis)?)),
                None => dim,
            };
            Ok(Slice::new(start, stop, step.unsigned_abs()))
        }
        Index::Full => Ok(Slice::new(0, dim, 1)),
        Index::Ellipsis => Err(DapError::InvalidSlice {
            reason: "unexpanded ellipsis".to_string(),
        }),
    }
}

/// Compose two selections dimension by dimension
pub fn compose(outer: &[Slice], inner: &[Slice]) -> Vec<Slice> {
    let rank = outer.len().max(inner.len());
    (0..rank)
        .map(|axis| {
            let outer = outer.get(axis).unwrap_or(&Slice::FULL);
            let inner = inner.get(axis).unwrap_or(&Slice::FULL);
            outer.compose(inner)
        })
        .collect()
}

/// Fail when `selection` picks no element on some axis of `dims`
///
/// A hyperslab has an inclusive last index and cannot express an empty
/// range, so such a selection must never reach the server.
pub fn ensure_non_empty(selection: &[Slice], dims: &[Option<u64>]) -> DapResult<()> {
    let empty_axis = selection
        .iter()
        .enumerate()
        .find(|(axis, slice)| slice.len_within(dims.get(*axis).copied().flatten()) == Some(0));
    match empty_axis {
        Some((axis, slice)) => Err(DapError::InvalidSlice {
            reason: format!("selection {} on axis {axis} is empty", slice.describe()),
        }),
        None => Ok(()),
    }
}

/// Hyperslab encoding of `selection`, trailing whole dimensions omitted
pub fn hyperslab(selection: &[Slice]) -> String {
    let significant = selection
        .iter()
        .rposition(|slice| !slice.is_full())
        .map_or(0, |last| last + 1);
    selection[..significant].iter().map(Slice::encode).collect()
}
