//! MODULE D: digestion engine (§4.D). Builds FKmers/RKmers at every
//! alignment column via a bounded depth-first walk, grounded on
//! `primalscheme3/core/digestion.py` (`f_digest_index` / `r_digest_index` /
//! `walk_left` / `walk_right` / `reduce_kmers`). Design Notes §9 calls for
//! replacing the legacy recursive/exception-based walk with an explicit DFS
//! over a bounded work stack returning a tagged variant
//! (`Ok(Set<String>) | Err(DigestError)`) -- that is exactly what
//! `walk_row` below does.

use std::collections::{BTreeMap, BTreeSet};

use rayon::prelude::*;

use crate::config::Config;
use crate::errs::DigestError;
use crate::fasta::Msa;
use crate::kmer::{FKmer, RKmer};
use crate::seq::{expand_ambs, most_common_base, reverse_complement};
use crate::thermo::{calc_tm, dimer_interact, thermo_check_kmers, ThermoResult};

#[derive(Debug, Default)]
pub struct DigestReport {
    pub fkmers: Vec<FKmer>,
    pub rkmers: Vec<RKmer>,
    pub f_errors: Vec<(usize, DigestError)>,
    pub r_errors: Vec<(usize, DigestError)>,
}

struct WalkFrame {
    col: usize,
    seq: String,
}

enum Direction {
    Left,
    Right,
}

/// Bounded DFS for a single row, starting from `seed` anchored at `col`. For
/// `Direction::Left`, `col` decreases each step (FKmer construction); for
/// `Direction::Right` it increases (RKmer construction). Stops a branch
/// when its Tm reaches `primer_tm_min` (success), or raises the matching
/// `DigestError` when it runs off the array, exceeds `primer_max_walk`, or
/// picks up an `N`.
fn walk_row(
    msa: &Msa,
    cfg: &Config,
    row: usize,
    start_col: usize,
    anchor_col: usize,
    seeds: Vec<String>,
    dir: Direction,
) -> Result<BTreeSet<String>, DigestError> {
    let mut stack: Vec<WalkFrame> = seeds
        .into_iter()
        .map(|seq| WalkFrame { col: start_col, seq })
        .collect();
    let mut successes = BTreeSet::new();
    let mut worst_error: Option<DigestError> = None;

    let mut record = |e: DigestError, worst: &mut Option<DigestError>| {
        *worst = Some(match worst.take() {
            Some(prev) => prev.max(e),
            None => e,
        });
    };

    while let Some(frame) = stack.pop() {
        if calc_tm(&frame.seq, cfg) >= cfg.primer_tm_min {
            successes.insert(frame.seq);
            continue;
        }

        let walked = match dir {
            Direction::Left => anchor_col - frame.col,
            Direction::Right => frame.col - anchor_col,
        };
        if walked >= cfg.primer_max_walk {
            record(DigestError::WalkToFar, &mut worst_error);
            continue;
        }

        let (next_col, out_of_bounds) = match dir {
            Direction::Left => {
                if frame.col == 0 {
                    (0, true)
                } else {
                    (frame.col - 1, false)
                }
            }
            Direction::Right => {
                if frame.col + 1 >= msa.ncols() {
                    (frame.col, true)
                } else {
                    (frame.col + 1, false)
                }
            }
        };
        if out_of_bounds {
            record(DigestError::WalksOut, &mut worst_error);
            continue;
        }

        let raw_base = msa.rows[row][next_col];
        let new_base = if raw_base == '\0' {
            most_common_base(msa.column(next_col))
        } else {
            raw_base
        };

        let mut combined = match dir {
            Direction::Left => {
                let mut s = String::with_capacity(frame.seq.len() + 1);
                s.push(new_base);
                s.push_str(&frame.seq);
                s
            }
            Direction::Right => {
                let mut s = frame.seq.clone();
                s.push(new_base);
                s
            }
        };
        combined.retain(|c| c != '-');

        if combined.contains('N') {
            record(DigestError::ContainsInvalidBase, &mut worst_error);
            continue;
        }
        match expand_ambs(&[combined]) {
            None => record(DigestError::ContainsInvalidBase, &mut worst_error),
            Some(expansions) => {
                for exp in expansions {
                    stack.push(WalkFrame { col: next_col, seq: exp });
                }
            }
        }
    }

    if successes.is_empty() {
        Err(worst_error.unwrap_or(DigestError::NoSequences))
    } else {
        Ok(successes)
    }
}

/// Per-row FKmer construction at anchor column `end_col`: gap-on-set-base
/// check, gapped-suffix extraction, then `walk_row` left. `None` means the
/// row contributed nothing (an empty starting slice, skipped per the
/// original's `if not start_seq: continue`).
fn f_digest_row(
    msa: &Msa,
    cfg: &Config,
    row: usize,
    end_col: usize,
) -> Result<Option<BTreeSet<String>>, DigestError> {
    // `end_col == ncols` is the exclusive-end anchor at the alignment's
    // right edge: there is no column there to be gapped.
    if end_col < msa.ncols() && msa.rows[row][end_col] == '-' {
        return Err(DigestError::GapOnSetBase);
    }
    let start_col = end_col - cfg.primer_size_min;
    let stripped = msa.row_slice_ungapped(row, start_col, end_col);
    if stripped.contains('N') {
        return Err(DigestError::ContainsInvalidBase);
    }
    if stripped.is_empty() {
        return Ok(None);
    }
    let seeds = expand_ambs(&[stripped]).ok_or(DigestError::ContainsInvalidBase)?;
    walk_row(msa, cfg, row, start_col, end_col, seeds, Direction::Left).map(Some)
}

/// Per-row RKmer construction at anchor column `start_col`, symmetric to
/// `f_digest_row`: walks right, then stores the result in primer
/// (reverse-complement) orientation at the call site.
fn r_digest_row(
    msa: &Msa,
    cfg: &Config,
    row: usize,
    start_col: usize,
) -> Result<Option<BTreeSet<String>>, DigestError> {
    if msa.rows[row][start_col] == '-' {
        return Err(DigestError::GapOnSetBase);
    }
    let end_col = start_col + cfg.primer_size_min;
    let stripped = msa.row_slice_ungapped(row, start_col, end_col);
    if stripped.contains('N') {
        return Err(DigestError::ContainsInvalidBase);
    }
    if stripped.is_empty() {
        return Ok(None);
    }
    let seeds = expand_ambs(&[stripped]).ok_or(DigestError::ContainsInvalidBase)?;
    walk_row(msa, cfg, row, end_col, start_col, seeds, Direction::Right).map(Some)
}

enum Tally {
    Seq(String),
    Err(DigestError),
}

/// Aggregates one anchor column's per-row outcomes into either the
/// resolved error (strict hierarchy, or the single highest-priority error
/// surviving the frequency threshold) or the surviving sequence set (§4.D
/// "Aggregation across rows").
fn aggregate_column<F>(
    msa: &Msa,
    cfg: &Config,
    col: usize,
    per_row: F,
) -> Result<BTreeSet<String>, DigestError>
where
    F: Fn(usize) -> Result<Option<BTreeSet<String>>, DigestError>,
{
    let nrows = msa.nrows();
    // `col == ncols` is the FKmer exclusive-end anchor at the alignment's
    // right edge: there is no column there to be gapped.
    let gap_count = if col < msa.ncols() {
        (0..nrows).filter(|r| msa.rows[*r][col] == '-').count()
    } else {
        0
    };
    if gap_count as f64 / nrows as f64 > cfg.min_base_freq {
        return Err(DigestError::GapOnSetBase);
    }

    let mut tallies: Vec<Tally> = Vec::new();
    for row in 0..nrows {
        match per_row(row) {
            Ok(None) => {}
            Ok(Some(seqs)) => {
                tallies.extend(seqs.into_iter().map(Tally::Seq));
            }
            Err(e) => {
                tallies.push(Tally::Err(e));
            }
        }
    }

    if cfg.ignore_n {
        tallies.retain(|t| !matches!(t, Tally::Err(DigestError::ContainsInvalidBase)));
    }

    let mut seq_counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut err_counts: BTreeMap<DigestError, usize> = BTreeMap::new();
    for t in &tallies {
        match t {
            Tally::Seq(s) => *seq_counts.entry(s.clone()).or_insert(0) += 1,
            Tally::Err(e) => *err_counts.entry(*e).or_insert(0) += 1,
        }
    }
    let total: usize = seq_counts.values().sum::<usize>() + err_counts.values().sum::<usize>();
    if total == 0 {
        return Err(DigestError::NoSequences);
    }

    let kept_seqs: BTreeSet<String> = seq_counts
        .into_iter()
        .filter(|(_, n)| *n as f64 / total as f64 > cfg.min_base_freq)
        .map(|(s, _)| s)
        .collect();
    let kept_errors: Vec<DigestError> = err_counts
        .into_iter()
        .filter(|(_, n)| *n as f64 / total as f64 > cfg.min_base_freq)
        .map(|(e, _)| e)
        .collect();

    if let Some(worst) = kept_errors.into_iter().max() {
        return Err(worst);
    }
    if kept_seqs.is_empty() {
        return Err(DigestError::NoSequences);
    }
    Ok(kept_seqs)
}

fn thermo_gate(seqs: &BTreeSet<String>, cfg: &Config) -> Result<(), DigestError> {
    let refs: Vec<&str> = seqs.iter().map(|s| s.as_str()).collect();
    match thermo_check_kmers(refs.iter().copied(), cfg) {
        ThermoResult::Pass => {}
        ThermoResult::LowTm => return Err(DigestError::ThermoLowTm),
        ThermoResult::HighTm => return Err(DigestError::ThermoHighTm),
        ThermoResult::LowGc => return Err(DigestError::ThermoLowGc),
        ThermoResult::HighGc => return Err(DigestError::ThermoHighGc),
        ThermoResult::MaxHomopoly => return Err(DigestError::ThermoMaxHomopoly),
        ThermoResult::Hairpin => return Err(DigestError::ThermoHairpin),
    }
    if dimer_interact(refs.iter().copied(), refs.iter().copied(), cfg.dimer_score, cfg) {
        return Err(DigestError::DimerFail);
    }
    Ok(())
}

/// Attempts to build the FKmer ending at `end_col` (§4.D "Forward").
pub fn f_digest_index(msa: &Msa, cfg: &Config, end_col: usize) -> Result<FKmer, (usize, DigestError)> {
    if end_col < cfg.primer_size_min {
        return Err((end_col, DigestError::WalksOut));
    }
    let seqs = aggregate_column(msa, cfg, end_col, |row| f_digest_row(msa, cfg, row, end_col))
        .map_err(|e| (end_col, e))?;
    let seqs = if cfg.reduce_kmers {
        reduce_kmers(&seqs, cfg.editdist_max, cfg.editdist_end3p)
    } else {
        seqs
    };
    thermo_gate(&seqs, cfg).map_err(|e| (end_col, e))?;
    Ok(FKmer::new(end_col, seqs.into_iter().collect()))
}

/// Attempts to build the RKmer starting at `start_col` (§4.D "Reverse").
pub fn r_digest_index(msa: &Msa, cfg: &Config, start_col: usize) -> Result<RKmer, (usize, DigestError)> {
    if start_col + cfg.primer_size_min > msa.ncols() {
        return Err((start_col, DigestError::WalksOut));
    }
    let seqs = aggregate_column(msa, cfg, start_col, |row| r_digest_row(msa, cfg, row, start_col))
        .map_err(|e| (start_col, e))?;
    let seqs = if cfg.reduce_kmers {
        reduce_kmers(&seqs, cfg.editdist_max, cfg.editdist_end3p)
    } else {
        seqs
    };
    thermo_gate(&seqs, cfg).map_err(|e| (start_col, e))?;
    let rc_seqs: Vec<String> = seqs.into_iter().map(|s| reverse_complement(&s)).collect();
    Ok(RKmer::new(start_col, rc_seqs))
}

/// Runs digestion over every valid anchor column, fanning the per-column
/// work out over a rayon thread pool and re-sorting by column in the
/// aggregator (§5 concurrency region 1), using the common
/// `par_iter().map().collect()` fan-out/fold pattern.
pub fn digest(msa: &Msa, cfg: &Config) -> DigestReport {
    // Inclusive upper bounds: `end_col == ncols` is a valid (exclusive)
    // FKmer anchor, and `start_col == ncols - primer_size_min` is a valid
    // RKmer anchor (`r_digest_index` accepts `start + primer_size_min <=
    // ncols`) -- both are the last column `f_digest_index`/`r_digest_index`
    // will actually try.
    let fcols: Vec<usize> = (cfg.primer_size_min..=msa.ncols()).collect();
    let rcols: Vec<usize> = if msa.ncols() >= cfg.primer_size_min {
        (0..=(msa.ncols() - cfg.primer_size_min)).collect()
    } else {
        Vec::new()
    };

    let f_results: Vec<Result<FKmer, (usize, DigestError)>> =
        fcols.par_iter().map(|&c| f_digest_index(msa, cfg, c)).collect();
    let r_results: Vec<Result<RKmer, (usize, DigestError)>> =
        rcols.par_iter().map(|&c| r_digest_index(msa, cfg, c)).collect();

    let mut report = DigestReport::default();
    for (col, result) in fcols.into_iter().zip(f_results) {
        match result {
            Ok(fk) if !fk.seqs.is_empty() => report.fkmers.push(fk),
            Ok(_) => report.f_errors.push((col, DigestError::NoSequences)),
            Err((col, e)) => report.f_errors.push((col, e)),
        }
    }
    for (col, result) in rcols.into_iter().zip(r_results) {
        match result {
            Ok(rk) if !rk.seqs.is_empty() => report.rkmers.push(rk),
            Ok(_) => report.r_errors.push((col, DigestError::NoSequences)),
            Err((col, e)) => report.r_errors.push((col, e)),
        }
    }
    report.fkmers.sort_by_key(|fk| fk.end);
    report.rkmers.sort_by_key(|rk| rk.start);
    report.f_errors.sort_by_key(|(c, _)| *c);
    report.r_errors.sort_by_key(|(c, _)| *c);
    report
}

fn hamming_dist_3p(a: &str, b: &str) -> usize {
    a.chars().rev().zip(b.chars().rev()).filter(|(x, y)| x != y).count()
}

/// Clusters sequences sharing the last `end_3p` bases and keeps only a
/// dominating set under the Hamming-distance-`max_edit_dist` graph (greedy
/// maximum-degree node cover), per `reduce_kmers` in the original
/// implementation. Optional preprocessing switch (§9 Open Question: no
/// proven optimality claim, §8 invariants hold independent of it).
pub fn reduce_kmers(seqs: &BTreeSet<String>, max_edit_dist: usize, end_3p: usize) -> BTreeSet<String> {
    let mut clusters: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for seq in seqs {
        let split = seq.len().saturating_sub(end_3p);
        let (p5, p3) = seq.split_at(split);
        clusters.entry(p3.to_string()).or_default().insert(p5.to_string());
    }

    let mut out = BTreeSet::new();
    for (p3, tails) in clusters {
        if tails.len() <= 1 {
            for tail in tails {
                out.insert(format!("{tail}{p3}"));
            }
            continue;
        }

        let tails: Vec<String> = tails.into_iter().collect();
        let neighbors: Vec<BTreeSet<usize>> = tails
            .iter()
            .enumerate()
            .map(|(i, t1)| {
                (0..tails.len())
                    .filter(|&j| j != i && hamming_dist_3p(t1, &tails[j]) <= max_edit_dist)
                    .collect()
            })
            .collect();

        let mut order: Vec<usize> = (0..tails.len()).collect();
        order.sort_by(|&a, &b| {
            neighbors[b].len().cmp(&neighbors[a].len()).then(tails[a].cmp(&tails[b]))
        });

        let mut included = BTreeSet::new();
        let mut accounted = BTreeSet::new();
        for idx in order {
            if !accounted.contains(&idx) && !included.contains(&idx) {
                included.insert(idx);
                for &n in &neighbors[idx] {
                    accounted.insert(n);
                }
            }
        }
        for idx in included {
            out.insert(format!("{}{p3}", tails[idx]));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msa(rows: &[&str]) -> Msa {
        Msa {
            chrom_name: "test".to_string(),
            row_ids: rows.iter().map(|_| String::new()).collect(),
            rows: rows.iter().map(|r| r.chars().collect()).collect(),
            msa_index: 0,
        }
    }

    fn cfg() -> Config {
        let mut c = Config::default();
        c.primer_size_min = 18;
        c.primer_tm_min = 40.0; // short synthetic rows can't reach realistic Tm otherwise
        c.finish().unwrap()
    }

    #[test]
    fn fkmer_covers_every_row_allele_when_strict() {
        let cfg = cfg();
        let row = "ACGTACGTACGTACGTACGTACGT";
        let m = msa(&[row, row]);
        let fk = f_digest_index(&m, &cfg, 20).unwrap();
        assert!(fk.seqs.iter().any(|s| row[..20].ends_with(s.as_str()) || s == &row[..20]));
    }

    #[test]
    fn gap_on_anchor_base_is_rejected() {
        let cfg = cfg();
        let mut row1: Vec<char> = "ACGTACGTACGTACGTACGTACGT".chars().collect();
        row1[20] = '-';
        let m = Msa {
            chrom_name: "t".into(),
            row_ids: vec![String::new()],
            rows: vec![row1],
            msa_index: 0,
        };
        let err = f_digest_index(&m, &cfg, 20);
        assert!(matches!(err, Err((_, DigestError::GapOnSetBase))));
    }

    #[test]
    fn ambiguity_code_expands_into_multiple_3p_variants() {
        let cfg = cfg();
        let mut row1: Vec<char> = "ACGTACGTACGTACGTACGTACGT".chars().collect();
        row1[19] = 'Y'; // C or T, one column before the anchor
        let m = Msa {
            chrom_name: "t".into(),
            row_ids: vec![String::new()],
            rows: vec![row1],
            msa_index: 0,
        };
        let fk = f_digest_index(&m, &cfg, 20).unwrap();
        assert!(fk.seqs.iter().any(|s| s.ends_with('C')) || fk.seqs.iter().any(|s| s.ends_with('T')));
    }

    #[test]
    fn reduce_kmers_keeps_a_dominating_set() {
        let seqs: BTreeSet<String> = ["AAAAAACCCCCC", "AAAAAATCCCCC", "GGGGGGCCCCCC"]
            .into_iter()
            .map(String::from)
            .collect();
        let reduced = reduce_kmers(&seqs, 1, 6);
        assert!(reduced.len() <= seqs.len());
        assert!(!reduced.is_empty());
    }
}
