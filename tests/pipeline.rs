//! End-to-end scenarios: scheme detection, stream scanning and self-QC
//! masking over a synthetic amplicon tiling scheme.

use ampqc::{
    detect, mask_sequence, match_read, scan_stream, Amplicon, AmpliconSet, MaskOptions, Pileup,
    ReadRecord, ReadSink, RecordBuilder, Result, SchemeDetector,
};
use std::collections::BTreeMap;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

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
        AmpliconSet::new("schemeY", "sy", vec![Amplicon::new("ampA", 1000, 1400, 1030, 1370)]),
    ]
}

/// A forward/reverse pair whose template is `[start, start + tlen)`.
fn pair(name: &str, start: i64, tlen: i64, sequence1: &str) -> Vec<ReadRecord> {
    let r2_start = start + tlen - 100;
    vec![
        RecordBuilder::new()
            .name(name)
            .sequence(sequence1)
            .start(start)
            .first_of_pair()
            .paired(r2_start, tlen)
            .build(),
        RecordBuilder::new()
            .name(name)
            .start(r2_start)
            .second_of_pair()
            .paired(start, -tlen)
            .reverse()
            .build(),
    ]
}

/// First-mate sequence with a single `G` mismatch at the given offset.
fn mismatched_sequence(offset: usize) -> String {
    let mut bases = vec![b'A'; 100];
    bases[offset] = b'G';
    String::from_utf8(bases).unwrap()
}

#[derive(Default)]
struct CollectingSink {
    tags: BTreeMap<String, Vec<Option<String>>>,
}

impl ReadSink for CollectingSink {
    fn write(&mut self, read: &ReadRecord, tag: Option<&str>) -> Result<()> {
        self.tags.entry(read.name.clone()).or_default().push(tag.map(String::from));
        Ok(())
    }
}

#[test]
fn detects_scheme_from_unambiguous_reads() {
    init_logging();
    let sets = schemes();

    // Three templates fully inside amp1, nothing touching schemeY.
    let reads: Vec<ReadRecord> = (0..3)
        .map(|i| RecordBuilder::new().name(&format!("r{i}")).start(130).build())
        .collect();

    let mut detector = SchemeDetector::new(&sets);
    for read in &reads {
        detector.process(read);
    }
    let tallies: Vec<_> = detector.tallies().collect();
    assert_eq!(tallies, vec![("schemeX", 3), ("schemeY", 0)]);
    assert_eq!(detector.winner(), Some("schemeX"));

    // The convenience wrapper agrees.
    assert_eq!(detect(&sets, reads), Some("schemeX"));
}

#[test]
fn scan_and_qc_masks_primer_artifact() -> anyhow::Result<()> {
    init_logging();
    let sets = schemes();
    let reference = "A".repeat(500);

    // Six pairs with template [105, 255), unambiguously amp1. Every first
    // mate carries a G at reference position 110 — inside amp1's left
    // primer, always on the forward strand: a classic primer artifact.
    let mut reads: Vec<ReadRecord> = Vec::new();
    for i in 0..6 {
        reads.extend(pair(&format!("p{i}"), 105, 150, &mismatched_sequence(5)));
    }

    // Detection pass.
    let mut sink = CollectingSink::default();
    let stats = scan_stream(&sets, reads.iter().cloned(), Some(&mut sink))?;
    assert_eq!(stats.total_reads, 12);
    assert_eq!(stats.reads1, 6);
    assert_eq!(stats.reads2, 6);
    assert_eq!(stats.mapped, 12);
    assert_eq!(stats.match_any_amplicon, 6);
    assert_eq!(stats.chosen_scheme.as_deref(), Some("schemeX"));
    // Both mates of every pair carry the same resolved tag.
    for tags in sink.tags.values() {
        assert_eq!(tags, &vec![Some("sx:amp1".to_string()); 2]);
    }

    // QC pass: pile up every read against the reference under its resolved
    // amplicon, then mask the consensus.
    let scheme = &sets[0];
    let mut pileup = Pileup::new();
    for read in &reads {
        let amplicon = match_read(read, &sets)
            .unambiguous(&scheme.name)
            .and_then(|shortname| scheme.get(shortname));
        pileup.add_alignment(
            &reference,
            read.reference_start as usize,
            &read.sequence,
            &read.cigar,
            !read.is_reverse(),
            amplicon,
        )?;
    }

    // The artifact position saw six alts, all in primer, all forward.
    let artifact = pileup.get(110).expect("position 110 observed");
    assert_eq!(artifact.alts, 6);
    assert_eq!(artifact.alts_in_primer, 6);
    assert_eq!(artifact.alts_forward, 6);

    let consensus = "A".repeat(500);
    let result = mask_sequence("sample1", &consensus, pileup, &MaskOptions::default());
    assert_eq!(result.sequence.len(), consensus.len());
    assert_eq!(&result.sequence[110..111], "N");
    // Everything else is untouched.
    assert!(result.sequence[..110].bytes().all(|b| b == b'A'));
    assert!(result.sequence[111..].bytes().all(|b| b == b'A'));

    let reasons = result.failures.get(&110).expect("masked position logged");
    assert_eq!(
        reasons,
        &vec![
            "alternative alleles biased in primer region".to_string(),
            "strand bias in alternative alleles".to_string(),
            "amplicon bias in alternative allele calls, amplicon amp1".to_string(),
        ]
    );
    Ok(())
}

#[test]
fn sharded_pileups_merge_to_the_same_mask() -> anyhow::Result<()> {
    init_logging();
    let sets = schemes();
    let reference = "A".repeat(500);
    let scheme = &sets[0];

    let reads: Vec<ReadRecord> = (0..8)
        .map(|i| {
            RecordBuilder::new()
                .name(&format!("r{i}"))
                .sequence(&mismatched_sequence(30))
                .start(105)
                .build()
        })
        .collect();

    let fill = |subset: &[ReadRecord]| -> anyhow::Result<Pileup> {
        let mut pileup = Pileup::new();
        for read in subset {
            let amplicon = match_read(read, &sets)
                .unambiguous(&scheme.name)
                .and_then(|shortname| scheme.get(shortname));
            pileup.add_alignment(
                &reference,
                read.reference_start as usize,
                &read.sequence,
                &read.cigar,
                true,
                amplicon,
            )?;
        }
        Ok(pileup)
    };

    let whole = fill(&reads)?;
    let mut merged = fill(&reads[..3])?;
    merged.merge(fill(&reads[3..])?);

    let consensus = "A".repeat(500);
    let options = MaskOptions::default();
    let from_whole = mask_sequence("sample1", &consensus, whole, &options);
    let from_merged = mask_sequence("sample1", &consensus, merged, &options);
    assert_eq!(from_whole, from_merged);
    Ok(())
}
