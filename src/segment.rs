//! Quartile segmentation of customers by predicted lifetime value

use std::fmt;

use crate::error::CltvError;
use crate::stats;

/// Value segment, ordered from the lowest quartile (D) to the highest (A)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Segment {
    D,
    C,
    B,
    A,
}

impl Segment {
    /// Segments in ascending order of value
    pub const ALL: [Segment; 4] = [Segment::D, Segment::C, Segment::B, Segment::A];

    pub fn label(self) -> &'static str {
        match self {
            Segment::D => "D",
            Segment::C => "C",
            Segment::B => "B",
            Segment::A => "A",
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.label())
    }
}

/// Quantile edges the segments were cut at
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentEdges {
    /// `Segment::ALL.len() + 1` strictly increasing edges
    pub edges: Vec<f64>,
}

impl SegmentEdges {
    /// Compute quartile edges, rejecting data that cannot fill four bins
    pub fn fit(values: &[f64]) -> crate::Result<Self> {
        let bins = Segment::ALL.len();
        let sorted = stats::sorted(values);

        let distinct = stats::distinct_count(&sorted);
        if distinct < bins {
            return Err(CltvError::InsufficientDistinctValues { distinct, bins }.into());
        }

        let edges: Vec<f64> = (0..=bins)
            .filter_map(|i| stats::quantile_sorted(&sorted, i as f64 / bins as f64))
            .collect();

        if edges.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(CltvError::DuplicateBinEdges { edges }.into());
        }

        Ok(Self { edges })
    }

    /// Segment of `value`; bins are right-closed, the lowest also includes
    /// its left edge, and values outside the fitted range clamp to D or A
    pub fn classify(&self, value: f64) -> Segment {
        let inner = &self.edges[1..self.edges.len() - 1];
        let index = inner.partition_point(|&edge| edge < value);
        Segment::ALL[index]
    }
}

/// Label every value with its quartile segment, in input order
pub fn segment_by_quartile(values: &[f64]) -> crate::Result<(Vec<Segment>, SegmentEdges)> {
    let edges = SegmentEdges::fit(values)?;
    let segments = values.iter().map(|&v| edges.classify(v)).collect();
    Ok((segments, edges))
}
