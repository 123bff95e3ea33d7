//! Matching read templates to amplicon schemes and picking a winner.
//!
//! The detection pass streams reads once: each mapped read (or inferred
//! read-pair insert) is resolved to a template span, matched against every
//! candidate [`AmpliconSet`], and schemes with an unambiguous single-amplicon
//! match collect one vote. The winning scheme is the vote maximum, with a
//! deliberate, documented last-wins tie-break.

use ahash::AHashMap;

use crate::amplicon::AmpliconSet;
use crate::record::ReadRecord;

/// Genomic span of the sequenced template for a single read or a read pair.
///
/// For paired records the span always covers the full insert, derived from
/// the signed template length, so both mates of a pair resolve to the same
/// physical interval:
/// - forward-oriented record: `[reference_start, reference_start + tlen)`
/// - reverse-oriented record: `[mate_reference_start, mate_reference_start - tlen)`
///   (`tlen` is negative for the rightmost mate)
///
/// Unpaired records span their own aligned footprint.
#[must_use]
pub fn template_span(read: &ReadRecord) -> (i64, i64) {
    if read.is_paired() {
        if read.is_reverse() {
            (
                read.mate_reference_start,
                read.mate_reference_start - read.template_length,
            )
        } else {
            (read.reference_start, read.reference_start + read.template_length)
        }
    } else {
        (read.reference_start, read.reference_end())
    }
}

/// Per-scheme amplicon matches for one read template.
///
/// Schemes with no overlapping amplicon are absent from the map. A scheme's
/// match is *unambiguous* iff exactly one amplicon overlapped.
#[derive(Debug, Default)]
pub struct MatchResult<'a> {
    per_scheme: AHashMap<&'a str, Vec<&'a str>>,
}

impl<'a> MatchResult<'a> {
    /// True when no scheme matched at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.per_scheme.is_empty()
    }

    /// Names of the schemes with at least one matching amplicon, in no
    /// particular order.
    pub fn schemes(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.per_scheme.keys().copied()
    }

    /// The amplicons a scheme matched, if any.
    #[must_use]
    pub fn amplicons(&self, scheme: &str) -> Option<&[&'a str]> {
        self.per_scheme.get(scheme).map(Vec::as_slice)
    }

    /// The single matched amplicon for a scheme, or `None` when the match
    /// was empty or ambiguous.
    #[must_use]
    pub fn unambiguous(&self, scheme: &str) -> Option<&'a str> {
        match self.per_scheme.get(scheme).map(Vec::as_slice) {
            Some(&[single]) => Some(single),
            _ => None,
        }
    }
}

/// Match one read's template span against every candidate scheme.
///
/// Pure query; callers must exclude unmapped reads upstream.
#[must_use]
pub fn match_read<'a>(read: &ReadRecord, sets: &'a [AmpliconSet]) -> MatchResult<'a> {
    let (start, end) = template_span(read);
    let mut per_scheme = AHashMap::new();
    for set in sets {
        let hits = set.match_template(start, end);
        if !hits.is_empty() {
            per_scheme.insert(
                set.name.as_str(),
                hits.into_iter().map(|a| a.shortname.as_str()).collect(),
            );
        }
    }
    MatchResult { per_scheme }
}

/// Pick the winning scheme from `(name, tally)` pairs.
///
/// The comparison is `>=` on a maximum scanned in iteration order, so of two
/// equal tallies the one appearing **later** wins. The caller therefore fixes
/// the tie-break by fixing the iteration order; this matches the reference
/// behavior and is easy to get backwards — do not "simplify" to `>`.
/// Schemes with a zero tally never win: if nothing scored, there is no
/// winner and `None` is returned (a normal outcome, not an error).
#[must_use]
pub fn choose_scheme<'a, I>(tallies: I) -> Option<&'a str>
where
    I: IntoIterator<Item = (&'a str, u64)>,
{
    let mut best = 0u64;
    let mut winner = None;
    for (name, count) in tallies {
        if count > 0 && count >= best {
            best = count;
            winner = Some(name);
        }
    }
    winner
}

/// Streams reads past the candidate schemes and votes for the best fit.
///
/// One tally slot per scheme, zero-initialized, parallel to the caller's
/// scheme order. Tallies are monotonically non-decreasing and owned
/// exclusively by the single detection pass.
#[derive(Debug)]
pub struct SchemeDetector<'a> {
    sets: &'a [AmpliconSet],
    tallies: Vec<u64>,
}

impl<'a> SchemeDetector<'a> {
    #[must_use]
    pub fn new(sets: &'a [AmpliconSet]) -> Self {
        Self { sets, tallies: vec![0; sets.len()] }
    }

    /// Count one read: every scheme with an unambiguous match gains a vote.
    /// Unmapped reads and ambiguous or empty matches are not counted.
    pub fn process(&mut self, read: &ReadRecord) {
        if read.is_unmapped() {
            return;
        }
        let result = match_read(read, self.sets);
        for (tally, set) in self.tallies.iter_mut().zip(self.sets) {
            if result.unambiguous(&set.name).is_some() {
                *tally += 1;
            }
        }
    }

    /// Current `(scheme name, unambiguous-match count)` pairs in the
    /// caller-supplied scheme order.
    pub fn tallies(&self) -> impl Iterator<Item = (&'a str, u64)> + '_ {
        self.sets.iter().map(|s| s.name.as_str()).zip(self.tallies.iter().copied())
    }

    /// The winning scheme under the [`choose_scheme`] rule, or `None` when no
    /// scheme ever received an unambiguous match.
    #[must_use]
    pub fn winner(&self) -> Option<&'a str> {
        choose_scheme(self.tallies())
    }
}

/// Run scheme detection over an ordered read stream.
///
/// Convenience wrapper around [`SchemeDetector`]: feeds every read once and
/// returns the winner.
pub fn detect<'a, I>(sets: &'a [AmpliconSet], reads: I) -> Option<&'a str>
where
    I: IntoIterator<Item = ReadRecord>,
{
    let mut detector = SchemeDetector::new(sets);
    for read in reads {
        detector.process(&read);
    }
    detector.winner()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amplicon::Amplicon;
    use crate::record::{encode_op, RecordBuilder};

    fn schemes() -> Vec<AmpliconSet> {
        vec![
            AmpliconSet::new(
                "schemeX",
                "sx",
                vec![
                    Amplicon::new("amp1", 100, 300, 120, 280),
                    Amplicon::new("amp2", 260, 490, 280, 470),
                ],
            ),
            AmpliconSet::new(
                "schemeY",
                "sy",
                vec![Amplicon::new("ampA", 1000, 1400, 1030, 1370)],
            ),
        ]
    }

    // ========================================================================
    // template_span
    // ========================================================================

    #[test]
    fn test_template_span_unpaired() {
        let read = RecordBuilder::new().start(100).cigar(vec![encode_op(0, 50)]).build();
        assert_eq!(template_span(&read), (100, 150));
    }

    #[test]
    fn test_template_span_paired_forward() {
        let read = RecordBuilder::new().start(100).paired(250, 300).build();
        assert_eq!(template_span(&read), (100, 400));
    }

    #[test]
    fn test_template_span_paired_reverse_matches_mate() {
        // The reverse mate of the pair above: anchored on the forward mate's
        // start with a negative TLEN, it must resolve to the same insert.
        let read = RecordBuilder::new().start(300).paired(100, -300).reverse().build();
        assert_eq!(template_span(&read), (100, 400));
    }

    // ========================================================================
    // match_read / MatchResult
    // ========================================================================

    #[test]
    fn test_match_read_unambiguous() {
        let sets = schemes();
        let read = RecordBuilder::new().start(130).cigar(vec![encode_op(0, 100)]).build();
        let result = match_read(&read, &sets);
        assert!(!result.is_empty());
        assert_eq!(result.unambiguous("schemeX"), Some("amp1"));
        assert!(result.amplicons("schemeY").is_none());
    }

    #[test]
    fn test_match_read_ambiguous() {
        let sets = schemes();
        // Template in the amp1/amp2 overlap zone.
        let read = RecordBuilder::new().start(265).cigar(vec![encode_op(0, 10)]).build();
        let result = match_read(&read, &sets);
        assert_eq!(result.amplicons("schemeX").map(<[_]>::len), Some(2));
        assert_eq!(result.unambiguous("schemeX"), None);
    }

    #[test]
    fn test_match_read_empty() {
        let sets = schemes();
        let read = RecordBuilder::new().start(600).cigar(vec![encode_op(0, 50)]).build();
        assert!(match_read(&read, &sets).is_empty());
    }

    // ========================================================================
    // choose_scheme tie-break law
    // ========================================================================

    #[test]
    fn test_choose_scheme_tie_breaks_to_later_entry() {
        assert_eq!(choose_scheme(vec![("A", 5), ("B", 5)]), Some("B"));
        assert_eq!(choose_scheme(vec![("B", 5), ("A", 5)]), Some("A"));
    }

    #[test]
    fn test_choose_scheme_max_wins() {
        assert_eq!(choose_scheme(vec![("A", 7), ("B", 5)]), Some("A"));
        assert_eq!(choose_scheme(vec![("A", 5), ("B", 7)]), Some("B"));
    }

    #[test]
    fn test_choose_scheme_all_zero_is_none() {
        assert_eq!(choose_scheme(vec![("A", 0), ("B", 0)]), None);
        assert_eq!(choose_scheme(Vec::<(&str, u64)>::new()), None);
    }

    // ========================================================================
    // SchemeDetector
    // ========================================================================

    fn amp1_read(name: &str) -> ReadRecord {
        RecordBuilder::new().name(name).start(130).cigar(vec![encode_op(0, 100)]).build()
    }

    #[test]
    fn test_detector_counts_unambiguous_only() {
        let sets = schemes();
        let mut detector = SchemeDetector::new(&sets);
        detector.process(&amp1_read("r1"));
        // Ambiguous read: overlap zone, matches amp1 and amp2.
        detector.process(
            &RecordBuilder::new().name("r2").start(265).cigar(vec![encode_op(0, 10)]).build(),
        );
        // Unmapped read: never reaches the matcher.
        detector.process(&RecordBuilder::new().name("r3").start(130).unmapped().build());
        let tallies: Vec<_> = detector.tallies().collect();
        assert_eq!(tallies, vec![("schemeX", 1), ("schemeY", 0)]);
    }

    #[test]
    fn test_detector_tallies_monotonic() {
        let sets = schemes();
        let mut detector = SchemeDetector::new(&sets);
        let mut previous = 0;
        for i in 0..5 {
            detector.process(&amp1_read(&format!("r{i}")));
            let (_, count) = detector.tallies().next().unwrap();
            assert!(count >= previous);
            previous = count;
        }
        assert_eq!(previous, 5);
    }

    #[test]
    fn test_detect_end_to_end() {
        let sets = schemes();
        let reads = vec![amp1_read("r1"), amp1_read("r2"), amp1_read("r3")];
        assert_eq!(detect(&sets, reads), Some("schemeX"));
    }

    #[test]
    fn test_detect_no_signal_is_none() {
        let sets = schemes();
        let reads =
            vec![RecordBuilder::new().start(600).cigar(vec![encode_op(0, 50)]).build()];
        assert_eq!(detect(&sets, reads), None);
    }

    #[test]
    fn test_detect_idempotent() {
        let sets = schemes();
        let reads: Vec<ReadRecord> = (0..4).map(|i| amp1_read(&format!("r{i}"))).collect();
        let first = detect(&sets, reads.clone());
        let second = detect(&sets, reads);
        assert_eq!(first, second);
    }
}
