//! MODULE H: panel solver (§4.H). A coverage-maximizing variant of the
//! tiling solver in `scheme.rs`: no overlap-with-last constraint, instead a
//! per-MSA coverage bitmap and a greedy marginal-gain selection across every
//! MSA at once. Grounded on the scoring/placement-constraint pattern of
//! `scheme.rs`; the solver's exact internals are inferred from `panel_main.py`'s
//! call sites (`panel_classes.py` itself was not in the retrieval pack -- an
//! Open Question resolution recorded in DESIGN.md).

use rustc_hash::FxHashSet;

use crate::config::Config;
use crate::kmer::PrimerPair;
use crate::matchdb::{MatchDb, MatchEntry};
use crate::mismatch::detect_new_products;
use crate::seq::gc_fraction;

/// One MSA's coverage state: either the whole genome (`ALL` mode) or a
/// caller-supplied set of requested region columns.
#[derive(Debug, Clone)]
pub struct PanelMsa {
    pub msa_index: usize,
    pub len: usize,
    covered: Vec<bool>,
    region_cols: Option<FxHashSet<usize>>,
}

impl PanelMsa {
    /// `ALL` mode: every column of the MSA counts toward coverage.
    pub fn all(msa_index: usize, len: usize) -> Self {
        PanelMsa { msa_index, len, covered: vec![false; len], region_cols: None }
    }

    /// Region mode: only columns in `regions` (each `[start, end)`) count.
    pub fn regions(msa_index: usize, len: usize, regions: &[(usize, usize)]) -> Self {
        let mut cols = FxHashSet::default();
        for &(start, end) in regions {
            for c in start..end.min(len) {
                cols.insert(c);
            }
        }
        PanelMsa { msa_index, len, covered: vec![false; len], region_cols: Some(cols) }
    }

    fn in_scope(&self, col: usize) -> bool {
        match &self.region_cols {
            Some(cols) => cols.contains(&col),
            None => col < self.len,
        }
    }

    fn scope_size(&self) -> usize {
        match &self.region_cols {
            Some(cols) => cols.len(),
            None => self.len,
        }
    }

    fn covered_in_scope(&self) -> usize {
        match &self.region_cols {
            Some(cols) => cols.iter().filter(|&&c| self.covered[c]).count(),
            None => self.covered.iter().filter(|c| **c).count(),
        }
    }

    /// Coverage fraction over the scoped columns, `1.0` for an empty scope.
    pub fn coverage_fraction(&self) -> f64 {
        let scope = self.scope_size();
        if scope == 0 {
            1.0
        } else {
            self.covered_in_scope() as f64 / scope as f64
        }
    }

    /// New (previously-uncovered, in-scope) columns a pair's insert region
    /// would cover, without mutating state.
    fn marginal_gain(&self, insert_start: usize, insert_end: usize) -> usize {
        (insert_start..insert_end.min(self.len))
            .filter(|&c| self.in_scope(c) && !self.covered[c])
            .count()
    }

    fn mark_covered(&mut self, insert_start: usize, insert_end: usize) {
        for c in insert_start..insert_end.min(self.len) {
            if self.in_scope(c) {
                self.covered[c] = true;
            }
        }
    }
}

fn gc_deviation(pp: &PrimerPair) -> f64 {
    let seqs = pp.all_seqs();
    if seqs.is_empty() {
        return 0.0;
    }
    let mean_gc: f64 = seqs.iter().map(|s| gc_fraction(s)).sum::<f64>() / seqs.len() as f64;
    (mean_gc - 0.5).abs()
}

fn sorted_seqs(pp: &PrimerPair) -> Vec<String> {
    let mut v: Vec<String> = pp.all_seqs().into_iter().map(String::from).collect();
    v.sort();
    v
}

/// Pool bookkeeping shared with the tiling solver's placement constraints,
/// minus the amplicon-overlap rule (§4.H: "no amplicon overlap constraint").
#[derive(Debug, Clone)]
pub struct PanelScheme {
    pub pools: Vec<Vec<PrimerPair>>,
    pub pool_matches: Vec<FxHashSet<MatchEntry>>,
    pub amplicons_placed: usize,
}

impl PanelScheme {
    pub fn new(n_pools: usize) -> Self {
        PanelScheme {
            pools: vec![Vec::new(); n_pools.max(1)],
            pool_matches: vec![FxHashSet::default(); n_pools.max(1)],
            amplicons_placed: 0,
        }
    }

    fn n_pools(&self) -> usize {
        self.pools.len()
    }

    fn eligible_pool(
        &self,
        pool: usize,
        candidate: &PrimerPair,
        matchdb: &MatchDb,
        cfg: &Config,
    ) -> Option<FxHashSet<MatchEntry>> {
        for existing in &self.pools[pool] {
            if candidate.pairs_interact(existing, cfg) {
                return None;
            }
        }
        let new_matches = candidate.find_matches(matchdb, cfg.mismatch_fuzzy, true);
        if detect_new_products(&new_matches, &self.pool_matches[pool], cfg.mismatch_product_size) {
            return None;
        }
        Some(new_matches)
    }

    fn place(&mut self, pool: usize, mut pair: PrimerPair, new_matches: FxHashSet<MatchEntry>) -> PrimerPair {
        pair.pool = pool as i64;
        self.pool_matches[pool].extend(new_matches);
        self.pools[pool].push(pair.clone());
        self.amplicons_placed += 1;
        pair
    }

    /// Chooses, across all MSAs, the candidate pair with the highest
    /// marginal coverage gain over its region (ties broken by lower mean
    /// GC-deviation from 0.5, then by the sorted oligo strings per §9).
    /// Returns the placed pair, or `None` if no candidate yields positive
    /// gain or no pool accepts one.
    pub fn add_next_primer_pair(
        &mut self,
        candidates: &[PrimerPair],
        panels: &mut [PanelMsa],
        matchdb: &MatchDb,
        cfg: &Config,
    ) -> Option<PrimerPair> {
        let mut scored: Vec<(usize, f64, usize)> = Vec::new(); // (candidate_idx, gain, panel_idx)
        for (idx, pp) in candidates.iter().enumerate() {
            let Some(panel_idx) = panels.iter().position(|p| p.msa_index == pp.msa_index) else {
                continue;
            };
            let (insert_start, insert_end) = pp.primertrimmed_region();
            let gain = panels[panel_idx].marginal_gain(insert_start, insert_end);
            if gain > 0 {
                scored.push((idx, gain as f64, panel_idx));
            }
        }
        if scored.is_empty() {
            return None;
        }

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    gc_deviation(&candidates[a.0])
                        .partial_cmp(&gc_deviation(&candidates[b.0]))
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .then_with(|| sorted_seqs(&candidates[a.0]).cmp(&sorted_seqs(&candidates[b.0])))
        });

        for (idx, _, panel_idx) in scored {
            let candidate = &candidates[idx];
            for pool in 0..self.n_pools() {
                if let Some(nm) = self.eligible_pool(pool, candidate, matchdb, cfg) {
                    let placed = self.place(pool, candidate.clone(), nm);
                    let (start, end) = placed.primertrimmed_region();
                    panels[panel_idx].mark_covered(start, end);
                    return Some(placed);
                }
            }
        }
        None
    }

    /// Runs `add_next_primer_pair` until `max_amplicons` is reached or no
    /// candidate yields positive gain (§4.H "outer loop").
    pub fn run(
        &mut self,
        candidates: &[PrimerPair],
        panels: &mut [PanelMsa],
        max_amplicons: usize,
        matchdb: &MatchDb,
        cfg: &Config,
    ) -> Vec<PrimerPair> {
        let mut placed = Vec::new();
        while self.amplicons_placed < max_amplicons {
            match self.add_next_primer_pair(candidates, panels, matchdb, cfg) {
                Some(pp) => placed.push(pp),
                None => break,
            }
        }
        placed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kmer::{FKmer, RKmer};

    fn cfg() -> Config {
        Config::default().finish().unwrap()
    }

    fn pp(fend: usize, rstart: usize, msa_index: usize) -> PrimerPair {
        let fk = FKmer::new(fend, vec!["A".repeat(20)]);
        let rk = RKmer::new(rstart, vec!["C".repeat(20)]);
        PrimerPair::new(fk, rk, msa_index)
    }

    #[test]
    fn marginal_gain_counts_only_new_region_columns() {
        let mut panel = PanelMsa::regions(0, 1000, &[(100, 200)]);
        assert_eq!(panel.marginal_gain(50, 150), 50);
        panel.mark_covered(50, 150);
        assert_eq!(panel.marginal_gain(50, 150), 0);
        assert_eq!(panel.coverage_fraction(), 0.5);
    }

    #[test]
    fn add_next_primer_pair_picks_highest_gain_candidate() {
        let cfg = cfg();
        let db = MatchDb::new(cfg.mismatch_kmersize);
        let mut scheme = PanelScheme::new(1);
        let mut panels = vec![PanelMsa::regions(0, 1000, &[(100, 600)])];
        let small_gain = pp(120, 150, 0);
        let large_gain = pp(100, 500, 0);
        let candidates = vec![small_gain, large_gain];

        let placed = scheme.add_next_primer_pair(&candidates, &mut panels, &db, &cfg).unwrap();
        assert_eq!(placed.fprimer.end, 100);
        assert_eq!(placed.rprimer.start, 500);
    }

    #[test]
    fn run_stops_at_max_amplicons() {
        let cfg = cfg();
        let db = MatchDb::new(cfg.mismatch_kmersize);
        let mut scheme = PanelScheme::new(2);
        let mut panels = vec![PanelMsa::all(0, 1000)];
        let candidates = vec![pp(20, 300, 0), pp(350, 650, 0), pp(700, 950, 0)];
        let placed = scheme.run(&candidates, &mut panels, 2, &db, &cfg);
        assert_eq!(placed.len(), 2);
    }
}
