//! MODULE G: tiling scheme solver (§4.G). An incremental, backtracking
//! greedy placer: `add_first_pair` / `try_overlap` / `try_walk` /
//! `try_backtrack` / `try_circular`, driven per-MSA by `run_msa`'s state
//! machine. Grounded on `primalscheme3/core/classes.py::Scheme` (pool
//! bookkeeping) and `primal_digest/classes.py::try_ol_primerpairs` (overlap
//! scoring / window logic).

use std::collections::BTreeMap;

use rayon::prelude::*;
use rustc_hash::FxHashSet;

use crate::config::Config;
use crate::errs::SolverOutcome;
use crate::kmer::{FKmer, PrimerPair, RKmer};
use crate::matchdb::{MatchDb, MatchEntry};
use crate::mismatch::detect_new_products;
use crate::thermo::dimer_interact;

const CIRCULAR_ZONE: usize = 200;

fn same_pair(a: &PrimerPair, b: &PrimerPair) -> bool {
    a.msa_index == b.msa_index && a.fprimer.end == b.fprimer.end && a.rprimer.start == b.rprimer.start
}

/// Tie-break key required by §9 "hash-based ordering": the sorted sequence
/// of oligo strings, never hash-iteration order.
fn sorted_seqs(pp: &PrimerPair) -> Vec<String> {
    let mut v: Vec<String> = pp.all_seqs().into_iter().map(String::from).collect();
    v.sort();
    v
}

fn overlap_score(pp: &PrimerPair, cfg: &Config, leading_edge: usize) -> f64 {
    let n_seqs = pp.all_seqs().len() as f64;
    let term = pp.rprimer.start as f64 - cfg.min_overlap as f64 - leading_edge as f64;
    (term / cfg.amplicon_size_max as f64).powi(2) / n_seqs.sqrt()
}

fn walk_score(pp: &PrimerPair, last: &PrimerPair) -> f64 {
    let n_seqs = pp.all_seqs().len() as f64;
    (pp.fprimer.end as f64 - last.end() as f64) * n_seqs.sqrt()
}

fn rank_by_score(window: &mut [&PrimerPair], score: impl Fn(&PrimerPair) -> f64) {
    window.sort_by(|a, b| {
        score(b)
            .partial_cmp(&score(a))
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| sorted_seqs(a).cmp(&sorted_seqs(b)))
    });
}

/// Stateful pool assignment: `pools[p]` are the accepted pairs in insertion
/// order, `pool_matches[p]` is the union of their MatchDB hits, and
/// `last_added_stack` tracks the current MSA's tiling progress for
/// overlap/walk/backtrack to consult.
#[derive(Debug, Clone)]
pub struct Scheme {
    pub pools: Vec<Vec<PrimerPair>>,
    pub pool_matches: Vec<FxHashSet<MatchEntry>>,
    pub current_pool: usize,
    pub last_added_stack: Vec<PrimerPair>,
    first_pair_by_msa: BTreeMap<usize, PrimerPair>,
}

impl Scheme {
    pub fn new(n_pools: usize) -> Self {
        Scheme {
            pools: vec![Vec::new(); n_pools.max(1)],
            pool_matches: vec![FxHashSet::default(); n_pools.max(1)],
            current_pool: 0,
            last_added_stack: Vec::new(),
            first_pair_by_msa: BTreeMap::new(),
        }
    }

    fn n_pools(&self) -> usize {
        self.pools.len()
    }

    /// Checks all three placement constraints (§4.G / §8 "Pool
    /// dimer-free"/"Pool mispriming-free") for `candidate` in `pool`,
    /// returning the new match-tuples to union in on success.
    fn eligible_pool(
        &self,
        pool: usize,
        candidate: &PrimerPair,
        msa_index: usize,
        matchdb: &MatchDb,
        cfg: &Config,
    ) -> Option<FxHashSet<MatchEntry>> {
        for existing in &self.pools[pool] {
            if existing.msa_index == msa_index {
                let (cs, ce) = (candidate.start(), candidate.end());
                let (es, ee) = (existing.start(), existing.end());
                if cs < ee && es < ce {
                    return None;
                }
            }
        }
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

    fn recompute_pool_matches(&self, pool: usize, matchdb: &MatchDb, cfg: &Config) -> FxHashSet<MatchEntry> {
        let mut acc = FxHashSet::default();
        for pp in &self.pools[pool] {
            acc.extend(pp.find_matches(matchdb, cfg.mismatch_fuzzy, true));
        }
        acc
    }

    fn place(&mut self, pool: usize, mut pair: PrimerPair, new_matches: FxHashSet<MatchEntry>) {
        pair.pool = pool as i64;
        self.pool_matches[pool].extend(new_matches);
        self.first_pair_by_msa.entry(pair.msa_index).or_insert_with(|| pair.clone());
        self.pools[pool].push(pair.clone());
        self.last_added_stack.push(pair);
        self.current_pool = (pool + 1) % self.n_pools();
    }

    /// Leftmost-acceptable candidate for a fresh per-MSA start: any empty
    /// pool wins outright, otherwise the first pool (in order) that passes
    /// dimer/mispriming checks.
    pub fn add_first_pair(
        &mut self,
        candidates: &[PrimerPair],
        msa_index: usize,
        matchdb: &MatchDb,
        cfg: &Config,
    ) -> SolverOutcome {
        for candidate in candidates.iter().filter(|pp| pp.msa_index == msa_index) {
            for pool in 0..self.n_pools() {
                if self.pools[pool].is_empty() {
                    self.place(pool, candidate.clone(), FxHashSet::default());
                    return SolverOutcome::AddedFirst;
                }
            }
            for pool in 0..self.n_pools() {
                if let Some(nm) = self.eligible_pool(pool, candidate, msa_index, matchdb, cfg) {
                    self.place(pool, candidate.clone(), nm);
                    return SolverOutcome::AddedFirst;
                }
            }
        }
        SolverOutcome::NoFirst
    }

    /// Preferred placement: a pair overlapping the last amplicon's 3' end by
    /// at least `min_overlap`, ranked by overlap score, placed in a pool
    /// other than `last.pool`.
    pub fn try_overlap(
        &mut self,
        all_pairs: &[PrimerPair],
        msa_index: usize,
        matchdb: &MatchDb,
        cfg: &Config,
    ) -> SolverOutcome {
        let Some(last) = self.last_added_stack.last().cloned() else {
            return SolverOutcome::NoOverlap;
        };
        let leading_edge = last.end();
        let mut window: Vec<&PrimerPair> = all_pairs
            .iter()
            .filter(|pp| pp.msa_index == msa_index)
            .filter(|pp| pp.fprimer.end > last.fprimer.end)
            .filter(|pp| (pp.fprimer.end as i64) <= last.rprimer.start as i64 - cfg.min_overlap as i64)
            .filter(|pp| pp.end() >= leading_edge + cfg.min_overlap)
            .collect();
        rank_by_score(&mut window, |pp| overlap_score(pp, cfg, leading_edge));

        for candidate in window {
            for pool in (0..self.n_pools()).filter(|&p| p as i64 != last.pool) {
                if let Some(nm) = self.eligible_pool(pool, candidate, msa_index, matchdb, cfg) {
                    self.place(pool, candidate.clone(), nm);
                    return SolverOutcome::AddedOverlap;
                }
            }
        }
        SolverOutcome::NoOverlap
    }

    /// Fallback when no overlap candidate passes: permits a coverage gap,
    /// and may reuse `last.pool`.
    pub fn try_walk(
        &mut self,
        all_pairs: &[PrimerPair],
        msa_index: usize,
        matchdb: &MatchDb,
        cfg: &Config,
    ) -> SolverOutcome {
        let Some(last) = self.last_added_stack.last().cloned() else {
            return SolverOutcome::NoWalk;
        };
        let mut window: Vec<&PrimerPair> = all_pairs
            .iter()
            .filter(|pp| pp.msa_index == msa_index)
            .filter(|pp| (pp.fprimer.end as i64) > last.rprimer.start as i64 - cfg.min_overlap as i64)
            .collect();
        rank_by_score(&mut window, |pp| walk_score(pp, &last));

        for candidate in window {
            for pool in 0..self.n_pools() {
                if let Some(nm) = self.eligible_pool(pool, candidate, msa_index, matchdb, cfg) {
                    self.place(pool, candidate.clone(), nm);
                    return SolverOutcome::AddedWalk;
                }
            }
        }
        SolverOutcome::NoWalk
    }

    /// Pops the last-placed pair, tries a different replacement from the
    /// same (loosened) overlap window, and re-attempts `try_overlap`. On
    /// total failure the state is restored bitwise identical (§8 "Backtrack
    /// idempotence") and `NO_BACKTRACK` is returned.
    pub fn try_backtrack(
        &mut self,
        all_pairs: &[PrimerPair],
        msa_index: usize,
        matchdb: &MatchDb,
        cfg: &Config,
    ) -> SolverOutcome {
        let Some(original_last) = self.last_added_stack.pop() else {
            return SolverOutcome::NoBacktrack;
        };
        let pool = original_last.pool as usize;
        let snapshot_pool = self.pools[pool].clone();
        let snapshot_matches = self.pool_matches[pool].clone();
        self.pools[pool].pop();
        self.pool_matches[pool] = self.recompute_pool_matches(pool, matchdb, cfg);

        let prior_last = self.last_added_stack.last().cloned();
        let leading_edge = prior_last.as_ref().map(|p| p.end()).unwrap_or(0);
        let loosened_overlap = 1i64;

        let mut window: Vec<&PrimerPair> = all_pairs
            .iter()
            .filter(|pp| pp.msa_index == msa_index)
            .filter(|pp| !same_pair(pp, &original_last))
            .filter(|pp| match &prior_last {
                Some(pl) => {
                    pp.fprimer.end > pl.fprimer.end
                        && (pp.fprimer.end as i64) <= pl.rprimer.start as i64 - loosened_overlap
                }
                None => true,
            })
            .collect();
        rank_by_score(&mut window, |pp| overlap_score(pp, cfg, leading_edge));

        for replacement in window {
            let exclude_pool = prior_last.as_ref().map(|pl| pl.pool);
            for rpool in (0..self.n_pools()).filter(|&p| Some(p as i64) != exclude_pool) {
                if let Some(nm) = self.eligible_pool(rpool, replacement, msa_index, matchdb, cfg) {
                    self.place(rpool, replacement.clone(), nm);
                    if self.try_overlap(all_pairs, msa_index, matchdb, cfg).added() {
                        return SolverOutcome::AddedBacktrack;
                    }
                    self.last_added_stack.pop();
                    self.pools[rpool].pop();
                    self.pool_matches[rpool] = self.recompute_pool_matches(rpool, matchdb, cfg);
                }
            }
        }

        self.pools[pool] = snapshot_pool;
        self.pool_matches[pool] = snapshot_matches;
        self.last_added_stack.push(original_last);
        SolverOutcome::NoBacktrack
    }

    /// Wraps the genome end: forms FKmer x RKmer cross-pairs within
    /// `CIRCULAR_ZONE` bp of the last/first amplicons, dimer-prescreens them
    /// in parallel (§5 region 2), and places the smallest-degenerate
    /// survivor.
    pub fn try_circular(
        &mut self,
        fkmers: &[FKmer],
        rkmers: &[RKmer],
        msa_index: usize,
        matchdb: &MatchDb,
        cfg: &Config,
    ) -> SolverOutcome {
        let (Some(last), Some(first)) =
            (self.last_added_stack.last().cloned(), self.first_pair_by_msa.get(&msa_index).cloned())
        else {
            return SolverOutcome::NoCircular;
        };

        let near_last: Vec<&FKmer> =
            fkmers.iter().filter(|fk| fk.end + CIRCULAR_ZONE >= last.end()).collect();
        let near_first: Vec<&RKmer> =
            rkmers.iter().filter(|rk| rk.start <= first.start() + CIRCULAR_ZONE).collect();

        let mut candidates = Vec::new();
        for fk in &near_last {
            for rk in &near_first {
                if fk.end > rk.start {
                    candidates.push(PrimerPair::new((*fk).clone(), (*rk).clone(), msa_index));
                }
            }
        }

        let mut passing: Vec<PrimerPair> = candidates
            .into_par_iter()
            .filter(|pp| {
                !dimer_interact(
                    pp.fprimer.seqs.iter().map(|s| s.as_str()),
                    pp.rprimer.seqs.iter().map(|s| s.as_str()),
                    cfg.dimer_score,
                    cfg,
                )
            })
            .collect();
        passing.sort_by(|a, b| a.all_seqs().len().cmp(&b.all_seqs().len()).then_with(|| sorted_seqs(a).cmp(&sorted_seqs(b))));

        for mut candidate in passing {
            candidate.circular = true;
            if candidate.pairs_interact(&first, cfg) {
                continue;
            }
            for pool in 0..self.n_pools() {
                if let Some(nm) = self.eligible_pool(pool, &candidate, msa_index, matchdb, cfg) {
                    self.place(pool, candidate.clone(), nm);
                    return SolverOutcome::AddedCircular;
                }
            }
        }
        SolverOutcome::NoCircular
    }

    /// Drives the §4.G state machine for a single MSA until terminal,
    /// returning the pairs placed for it in insertion order.
    pub fn run_msa(
        &mut self,
        fkmers: &[FKmer],
        rkmers: &[RKmer],
        all_pairs: &[PrimerPair],
        msa_len: usize,
        msa_index: usize,
        matchdb: &MatchDb,
        cfg: &Config,
    ) -> Vec<PrimerPair> {
        let start_len = self.last_added_stack.len();
        let candidates: Vec<PrimerPair> =
            all_pairs.iter().filter(|pp| pp.msa_index == msa_index).cloned().collect();

        if !self.add_first_pair(&candidates, msa_index, matchdb, cfg).added() {
            return Vec::new();
        }

        loop {
            let leading_edge = self.last_added_stack.last().map(|p| p.end()).unwrap_or(0);
            if leading_edge >= msa_len {
                break;
            }
            if self.try_overlap(all_pairs, msa_index, matchdb, cfg).added() {
                continue;
            }
            if cfg.backtrack && self.try_backtrack(all_pairs, msa_index, matchdb, cfg).added() {
                continue;
            }
            if self.try_walk(all_pairs, msa_index, matchdb, cfg).added() {
                continue;
            }
            if cfg.circular {
                self.try_circular(fkmers, rkmers, msa_index, matchdb, cfg);
            }
            break;
        }

        self.last_added_stack[start_len..].to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> Config {
        let mut c = Config::default();
        c.amplicon_size_min = 90;
        c.amplicon_size_max = 110;
        c.min_overlap = 10;
        c.n_pools = 2;
        c.finish().unwrap()
    }

    fn pp(fend: usize, rstart: usize, msa_index: usize) -> PrimerPair {
        let fk = FKmer::new(fend, vec!["A".repeat(20)]);
        let rk = RKmer::new(rstart, vec!["C".repeat(20)]);
        PrimerPair::new(fk, rk, msa_index)
    }

    #[test]
    fn add_first_pair_uses_an_empty_pool() {
        let cfg = cfg();
        let db = MatchDb::new(cfg.mismatch_kmersize);
        let mut scheme = Scheme::new(2);
        let candidates = vec![pp(20, 100, 0)];
        let outcome = scheme.add_first_pair(&candidates, 0, &db, &cfg);
        assert_eq!(outcome, SolverOutcome::AddedFirst);
        assert_eq!(scheme.pools[0].len(), 1);
    }

    #[test]
    fn try_overlap_places_in_a_different_pool_than_last() {
        let cfg = cfg();
        let db = MatchDb::new(cfg.mismatch_kmersize);
        let mut scheme = Scheme::new(2);
        let first = pp(20, 100, 0);
        let second = pp(85, 150, 0);
        let all_pairs = vec![first.clone(), second.clone()];
        scheme.add_first_pair(&all_pairs, 0, &db, &cfg);
        let outcome = scheme.try_overlap(&all_pairs, 0, &db, &cfg);
        assert_eq!(outcome, SolverOutcome::AddedOverlap);
        assert_eq!(scheme.pools[1].len(), 1);
    }

    #[test]
    fn backtrack_with_no_replacement_restores_state_exactly() {
        let cfg = cfg();
        let db = MatchDb::new(cfg.mismatch_kmersize);
        let mut scheme = Scheme::new(2);
        let only = pp(20, 100, 0);
        let all_pairs = vec![only.clone()];
        scheme.add_first_pair(&all_pairs, 0, &db, &cfg);
        let before_pools = scheme.pools.clone();
        let before_stack_len = scheme.last_added_stack.len();

        let outcome = scheme.try_backtrack(&all_pairs, 0, &db, &cfg);
        assert_eq!(outcome, SolverOutcome::NoBacktrack);
        assert_eq!(scheme.pools[0].len(), before_pools[0].len());
        assert_eq!(scheme.last_added_stack.len(), before_stack_len);
    }
}
