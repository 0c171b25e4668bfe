//! MODULE E: pair generator (§4.E), grounded on
//! `primal_digest/digestion.py::generate_valid_primerpairs`.

use crate::config::Config;
use crate::kmer::{FKmer, PrimerPair, RKmer};
use crate::thermo::dimer_interact;

/// For each FKmer, binary-searches the (start-sorted) RKmer list for a
/// window of `rprimer.start` candidates, dimer-prescreens each, and emits
/// surviving pairs sorted by `(fprimer.end asc, -rprimer.start)`.
///
/// The window is searched on `rprimer.start ∈ [min(f.starts) +
/// amplicon_size_min, min(f.starts) + amplicon_size_max]` as in
/// `generate_valid_primerpairs`, widened on the low end by
/// `primer_size_max` so a long degenerate reverse primer whose `start` sits
/// below that naive bound isn't missed; every candidate is then checked
/// exactly against `amplicon_size_min..=amplicon_size_max` on
/// `max(rprimer.ends) - min(fprimer.starts)` (§8 "Amplicon size law"),
/// since `rprimer.start` alone only approximates the true product size.
pub fn generate_primer_pairs(
    fkmers: &[FKmer],
    rkmers_sorted_by_start: &[RKmer],
    msa_index: usize,
    cfg: &Config,
) -> Vec<PrimerPair> {
    let mut pairs = Vec::new();
    for fkmer in fkmers {
        let fstart = fkmer.min_start();
        let lo = (fstart + cfg.amplicon_size_min).saturating_sub(cfg.primer_size_max);
        let hi = fstart + cfg.amplicon_size_max;

        let window = rkmer_window(rkmers_sorted_by_start, lo, hi);
        for rkmer in window {
            let size = rkmer.max_end().saturating_sub(fstart);
            if size < cfg.amplicon_size_min || size > cfg.amplicon_size_max {
                continue;
            }
            let f_seqs: Vec<&str> = fkmer.seqs.iter().map(|s| s.as_str()).collect();
            let r_seqs: Vec<&str> = rkmer.seqs.iter().map(|s| s.as_str()).collect();
            if !dimer_interact(f_seqs, r_seqs, cfg.dimer_score, cfg) {
                pairs.push(PrimerPair::new(fkmer.clone(), rkmer.clone(), msa_index));
            }
        }
    }

    pairs.sort_by(|a, b| {
        a.fprimer
            .end
            .cmp(&b.fprimer.end)
            .then(b.rprimer.start.cmp(&a.rprimer.start))
    });
    pairs
}

/// Binary-search window of RKmers with `start ∈ [lo, hi]`, assuming the
/// slice is sorted ascending by `start`.
fn rkmer_window(rkmers: &[RKmer], lo: usize, hi: usize) -> &[RKmer] {
    let start_idx = rkmers.partition_point(|rk| rk.start < lo);
    let end_idx = rkmers.partition_point(|rk| rk.start <= hi);
    if start_idx >= end_idx {
        &[]
    } else {
        &rkmers[start_idx..end_idx]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> Config {
        let mut c = Config::default();
        c.amplicon_size_min = 90;
        c.amplicon_size_max = 110;
        c.finish().unwrap()
    }

    #[test]
    fn pairs_within_amplicon_window_are_kept() {
        let cfg = cfg();
        let fk = FKmer::new(20, vec!["A".repeat(20)]);
        // fstart = 0; end = 80 + 20 = 100, size 100 fits [90, 110].
        let rk_in = RKmer::new(80, vec!["C".repeat(20)]);
        // end = 200 + 20 = 220, far outside the window.
        let rk_out = RKmer::new(200, vec!["C".repeat(20)]);
        let rkmers = vec![rk_in, rk_out];
        let pairs = generate_primer_pairs(&[fk], &rkmers, 0, &cfg);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].rprimer.start, 80);
    }

    #[test]
    fn sorted_by_fprimer_end_then_descending_rprimer_start() {
        let cfg = cfg();
        let fk1 = FKmer::new(20, vec!["A".repeat(20)]);
        let fk2 = FKmer::new(21, vec!["A".repeat(20)]);
        // ends 95/100, within [90, 110] of either fkmer's fstart (0 or 1).
        let rk_a = RKmer::new(75, vec!["C".repeat(20)]);
        let rk_b = RKmer::new(80, vec!["C".repeat(20)]);
        let rkmers = vec![rk_a, rk_b];
        let mut fkmers = vec![fk2, fk1];
        fkmers.sort_by_key(|f| f.end);
        let pairs = generate_primer_pairs(&fkmers, &rkmers, 0, &cfg);
        assert!(pairs.windows(2).all(|w| w[0].fprimer.end <= w[1].fprimer.end));
    }
}
