//! Amplicon scheme definitions and the interval index over them.
//!
//! An amplicon tiling scheme ([`AmpliconSet`]) is a named, ordered collection
//! of [`Amplicon`]s, each bounded by an outer primer-inclusive interval and an
//! inner primer-free interval. Scheme definitions are parsed elsewhere; this
//! module consumes the in-memory structures and answers overlap queries
//! against read template spans via a static interval tree.

use coitrees::{BasicCOITree, Interval, IntervalTree};
use std::fmt;

/// One amplicon: a targeted genomic region produced by a single primer pair.
///
/// Both intervals are half-open, 0-based: `[start, end)` includes the primer
/// sequences at either end, `[inner_start, inner_end)` excludes them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Amplicon {
    /// Short identifier unique within its scheme (e.g. `amp18`)
    pub shortname: String,
    /// Outer (primer-inclusive) interval start
    pub start: i64,
    /// Outer (primer-inclusive) interval end, exclusive
    pub end: i64,
    /// Inner (primer-free) interval start
    pub inner_start: i64,
    /// Inner (primer-free) interval end, exclusive
    pub inner_end: i64,
}

impl Amplicon {
    #[must_use]
    pub fn new(shortname: &str, start: i64, end: i64, inner_start: i64, inner_end: i64) -> Self {
        Self { shortname: shortname.to_string(), start, end, inner_start, inner_end }
    }

    /// Whether a genomic position falls inside one of this amplicon's primer
    /// regions: within the outer interval but outside the inner one.
    #[must_use]
    pub fn in_primer(&self, pos: i64) -> bool {
        pos >= self.start && pos < self.end && !(pos >= self.inner_start && pos < self.inner_end)
    }

    /// Whether a template span is fully contained in the outer interval.
    #[must_use]
    pub fn contains(&self, start: i64, end: i64) -> bool {
        start >= self.start && end <= self.end
    }

    /// Whether a template span overlaps the outer interval.
    #[must_use]
    pub fn overlaps(&self, start: i64, end: i64) -> bool {
        start < self.end && end > self.start
    }
}

/// A named amplicon tiling scheme with an interval index over its amplicons.
///
/// Immutable after construction; owned by the detection pass for the duration
/// of a run.
pub struct AmpliconSet {
    /// Full scheme name (e.g. `artic-v4.1`)
    pub name: String,
    /// Abbreviated scheme name used in read annotations
    pub shortname: String,
    amplicons: Vec<Amplicon>,
    tree: BasicCOITree<u32, u32>,
}

impl AmpliconSet {
    /// Index a parsed scheme. Amplicon order is preserved and determines the
    /// order of [`match_template`](Self::match_template) results.
    #[must_use]
    pub fn new(name: &str, shortname: &str, amplicons: Vec<Amplicon>) -> Self {
        let intervals: Vec<Interval<u32>> = amplicons
            .iter()
            .enumerate()
            .map(|(i, a)| Interval {
                first: a.start as i32,
                last: (a.end - 1) as i32,
                metadata: i as u32,
            })
            .collect();
        let tree = BasicCOITree::new(&intervals);
        Self { name: name.to_string(), shortname: shortname.to_string(), amplicons, tree }
    }

    /// The amplicons in definition order.
    #[must_use]
    pub fn amplicons(&self) -> &[Amplicon] {
        &self.amplicons
    }

    /// Look up an amplicon by its shortname.
    #[must_use]
    pub fn get(&self, shortname: &str) -> Option<&Amplicon> {
        self.amplicons.iter().find(|a| a.shortname == shortname)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.amplicons.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.amplicons.is_empty()
    }

    /// All amplicons whose outer interval overlaps the half-open template
    /// span `[start, end)`, in amplicon definition order.
    #[must_use]
    pub fn match_template(&self, start: i64, end: i64) -> Vec<&Amplicon> {
        if end <= start {
            return Vec::new();
        }
        let mut hits: Vec<u32> = Vec::new();
        // The tree uses inclusive coordinates; query [start, end - 1].
        self.tree.query(start as i32, (end - 1) as i32, |iv| hits.push(iv.metadata.clone()));
        hits.sort_unstable();
        hits.into_iter().map(|i| &self.amplicons[i as usize]).collect()
    }
}

impl fmt::Debug for AmpliconSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AmpliconSet")
            .field("name", &self.name)
            .field("shortname", &self.shortname)
            .field("amplicons", &self.amplicons.len())
            .finish()
    }
}
