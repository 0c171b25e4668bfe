//! End-to-end library exercise (no process spawn: this crate's binary is a
//! thin demonstration wrapper with no stable output contract worth
//! golden-testing; these drive the library API the way the binary does).

use std::io::Write;

use primal_scheme::config::Config;
use primal_scheme::digestion::digest;
use primal_scheme::fasta::read_msa;
use primal_scheme::matchdb::MatchDb;
use primal_scheme::pairs::generate_primer_pairs;
use primal_scheme::scheme::Scheme;

fn write_msa(rows: &[&str]) -> tempfile::NamedTempFile {
    let mut tmp = tempfile::NamedTempFile::new().unwrap();
    for (i, row) in rows.iter().enumerate() {
        writeln!(tmp, ">row{i}\n{row}").unwrap();
    }
    tmp
}

fn scheme_config() -> Config {
    let mut cfg = Config::default();
    cfg.amplicon_size = 100;
    cfg.amplicon_size_min = 90;
    cfg.amplicon_size_max = 110;
    cfg.min_overlap = 10;
    cfg.primer_size_min = 18;
    cfg.primer_tm_min = 40.0;
    cfg.n_pools = 2;
    cfg.finish().unwrap()
}

/// §8 end-to-end scenario 1: a two-row repeat-motif MSA tiled at
/// amplicon_size=100+-10, min_overlap=10 should yield several overlapping
/// amplicons alternating across both pools.
#[test]
fn tiles_two_row_msa_with_alternating_pools() {
    let cfg = scheme_config();
    let motif = "ACGT".repeat(60); // 240 columns
    let tmp = write_msa(&[&motif, &motif]);
    let msa = read_msa(tmp.path(), 0).unwrap();

    let report = digest(&msa, &cfg);
    assert!(!report.fkmers.is_empty(), "expected at least one FKmer");
    assert!(!report.rkmers.is_empty(), "expected at least one RKmer");

    let pairs = generate_primer_pairs(&report.fkmers, &report.rkmers, 0, &cfg);
    assert!(!pairs.is_empty(), "expected at least one candidate pair");

    let matchdb = MatchDb::new(cfg.mismatch_kmersize);
    let mut scheme = Scheme::new(cfg.n_pools);
    let placed = scheme.run_msa(&report.fkmers, &report.rkmers, &pairs, msa.ncols(), 0, &matchdb, &cfg);

    assert!(placed.len() >= 3, "expected >= 3 amplicons, got {}", placed.len());
    for window in placed.windows(2) {
        let (a, b) = (&window[0], &window[1]);
        assert!(b.end() > a.end(), "leading edge must advance");
        assert!(b.fprimer.end > a.fprimer.end, "each amplicon starts further right than the last");
    }
    for pp in &placed {
        assert!((0..cfg.n_pools as i64).contains(&pp.pool), "pool must be a valid index");
        let size = pp.amplicon_size().expect("non-circular amplicon");
        assert!(size >= cfg.amplicon_size_min && size <= cfg.amplicon_size_max);
    }
}

/// §8 scenario 3: a row truncated on the right should make the last
/// columns un-digestible (WALKS_OUT) while earlier columns still succeed.
#[test]
fn truncated_row_rejects_trailing_columns() {
    let cfg = scheme_config();
    let mut full = "ACGT".repeat(30); // 120 columns
    full.truncate(120);
    let mut truncated = full.clone();
    for _ in 0..20 {
        truncated.pop();
    }
    truncated.push_str(&"-".repeat(20));

    let tmp = write_msa(&[&full, &truncated]);
    let msa = read_msa(tmp.path(), 0).unwrap();
    let report = digest(&msa, &cfg);

    assert!(report.rkmers.iter().all(|rk| rk.start < 100));
    assert!(report.fkmers.iter().any(|fk| fk.end < 90));
}

/// §8 round-trip property: serializing a scheme to BED and re-parsing
/// yields the same multiset of primer pairs.
#[test]
fn bed_round_trip_preserves_primer_pairs() {
    use primal_scheme::bed::{read_bed_primer_pairs, write_primer_bed};

    let cfg = scheme_config();
    let motif = "ACGT".repeat(60);
    let tmp = write_msa(&[&motif, &motif]);
    let msa = read_msa(tmp.path(), 0).unwrap();
    let report = digest(&msa, &cfg);
    let pairs = generate_primer_pairs(&report.fkmers, &report.rkmers, 0, &cfg);
    let matchdb = MatchDb::new(cfg.mismatch_kmersize);
    let mut scheme = Scheme::new(cfg.n_pools);
    let mut placed = scheme.run_msa(&report.fkmers, &report.rkmers, &pairs, msa.ncols(), 0, &matchdb, &cfg);
    for (i, pp) in placed.iter_mut().enumerate() {
        pp.amplicon_number = i as i64 + 1;
        pp.chrom_name = Some("chrom".to_string());
        pp.amplicon_prefix = Some("scheme".to_string());
    }

    let bed_text = write_primer_bed(&placed);
    let bed_tmp = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(bed_tmp.path(), &bed_text).unwrap();
    let reparsed = read_bed_primer_pairs(bed_tmp.path()).unwrap();

    assert_eq!(reparsed.len(), placed.len());
    let mut original: Vec<(usize, usize, i64, i64)> =
        placed.iter().map(|p| (p.start(), p.end(), p.amplicon_number, p.pool)).collect();
    let mut round_tripped: Vec<(usize, usize, i64, i64)> =
        reparsed.iter().map(|p| (p.start(), p.end(), p.amplicon_number, p.pool)).collect();
    original.sort();
    round_tripped.sort();
    assert_eq!(original, round_tripped);
}
