//! Data model (§3): FKmer, RKmer, PrimerPair.

use std::collections::BTreeSet;

use crate::config::Config;
use crate::matchdb::{MatchDb, MatchEntry};
use crate::thermo::dimer_interact;

/// A terminal anchor column `end` (exclusive) and a non-empty set of
/// A/C/G/T strings, each ending at column `end`. Two FKmers are equal iff
/// `(end, sorted(seqs))` matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FKmer {
    pub end: usize,
    pub seqs: Vec<String>,
}

impl FKmer {
    pub fn new(end: usize, mut seqs: Vec<String>) -> Self {
        seqs.sort();
        seqs.dedup();
        FKmer { end, seqs }
    }

    pub fn starts(&self) -> BTreeSet<usize> {
        self.seqs.iter().map(|s| self.end - s.chars().count()).collect()
    }

    pub fn min_start(&self) -> usize {
        self.starts().into_iter().next().unwrap_or(self.end)
    }

    pub fn find_matches(
        &self,
        db: &MatchDb,
        msa_index: usize,
        fuzzy: bool,
        remove_expected: bool,
    ) -> rustc_hash::FxHashSet<MatchEntry> {
        db.find_fkmer(self, msa_index, fuzzy, remove_expected)
    }

    /// BED lines for this FKmer's primers, one row per sorted sequence,
    /// `name` following the `{ref}_{amplicon}_LEFT_{i}` convention (§6).
    pub fn to_bed_lines(&self, reference: &str, amplicon_name: &str, pool: usize) -> String {
        let mut seqs = self.seqs.clone();
        seqs.sort();
        let mut out = String::new();
        for (i, seq) in seqs.iter().enumerate() {
            out.push_str(&format!(
                "{reference}\t{}\t{}\t{amplicon_name}_LEFT_{}\t{}\t+\t{seq}\n",
                self.end - seq.chars().count(),
                self.end,
                i + 1,
                pool + 1,
            ));
        }
        out
    }
}

/// Symmetric to FKmer: anchor column `start` (inclusive), `seqs` held in
/// primer (reverse-complement) orientation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RKmer {
    pub start: usize,
    pub seqs: Vec<String>,
}

impl RKmer {
    pub fn new(start: usize, mut seqs: Vec<String>) -> Self {
        seqs.sort();
        seqs.dedup();
        RKmer { start, seqs }
    }

    pub fn ends(&self) -> BTreeSet<usize> {
        self.seqs.iter().map(|s| self.start + s.chars().count()).collect()
    }

    pub fn max_end(&self) -> usize {
        self.ends().into_iter().next_back().unwrap_or(self.start)
    }

    pub fn find_matches(
        &self,
        db: &MatchDb,
        msa_index: usize,
        fuzzy: bool,
        remove_expected: bool,
    ) -> rustc_hash::FxHashSet<MatchEntry> {
        db.find_rkmer(self, msa_index, fuzzy, remove_expected)
    }

    pub fn to_bed_lines(&self, reference: &str, amplicon_name: &str, pool: usize) -> String {
        let mut seqs = self.seqs.clone();
        seqs.sort();
        let mut out = String::new();
        for (i, seq) in seqs.iter().enumerate() {
            out.push_str(&format!(
                "{reference}\t{}\t{}\t{amplicon_name}_RIGHT_{}\t{}\t-\t{seq}\n",
                self.start,
                self.start + seq.chars().count(),
                i + 1,
                pool + 1,
            ));
        }
        out
    }
}

/// References one FKmer and one RKmer from the same MSA, plus pool/amplicon
/// bookkeeping assigned by the solver.
#[derive(Debug, Clone)]
pub struct PrimerPair {
    pub fprimer: FKmer,
    pub rprimer: RKmer,
    pub msa_index: usize,
    pub amplicon_number: i64,
    pub pool: i64,
    pub chrom_name: Option<String>,
    pub amplicon_prefix: Option<String>,
    pub circular: bool,
}

impl PrimerPair {
    pub fn new(fprimer: FKmer, rprimer: RKmer, msa_index: usize) -> Self {
        PrimerPair {
            fprimer,
            rprimer,
            msa_index,
            amplicon_number: -1,
            pool: -1,
            chrom_name: None,
            amplicon_prefix: None,
            circular: false,
        }
    }

    pub fn start(&self) -> usize {
        self.fprimer.min_start()
    }

    pub fn end(&self) -> usize {
        self.rprimer.max_end()
    }

    /// Product size, except for a circular pair (§3) where the definition
    /// of a simple `end - start` does not hold because the amplicon wraps
    /// the genome end.
    pub fn amplicon_size(&self) -> Option<usize> {
        if self.circular {
            None
        } else {
            Some(self.end() - self.start())
        }
    }

    pub fn all_seqs(&self) -> Vec<&str> {
        self.fprimer
            .seqs
            .iter()
            .chain(self.rprimer.seqs.iter())
            .map(|s| s.as_str())
            .collect()
    }

    /// True means interaction (§9 Open Question: never `inter_free`, always
    /// named by what it actually checks).
    pub fn pairs_interact(&self, other: &PrimerPair, cfg: &Config) -> bool {
        dimer_interact(
            self.all_seqs().into_iter(),
            other.all_seqs().into_iter(),
            cfg.dimer_score,
            cfg,
        )
    }

    pub fn find_matches(
        &self,
        db: &MatchDb,
        fuzzy: bool,
        remove_expected: bool,
    ) -> rustc_hash::FxHashSet<MatchEntry> {
        let mut matches = self.fprimer.find_matches(db, self.msa_index, fuzzy, remove_expected);
        matches.extend(self.rprimer.find_matches(db, self.msa_index, fuzzy, remove_expected));
        matches
    }

    /// The primer-trimmed (insert) region, exclusive of the primers
    /// themselves.
    pub fn primertrimmed_region(&self) -> (usize, usize) {
        (self.fprimer.end, self.rprimer.start.saturating_sub(1))
    }

    pub fn to_bed(&self) -> String {
        let chrom = self.chrom_name.as_deref().unwrap_or("");
        let prefix = self.amplicon_prefix.as_deref().unwrap_or("amplicon");
        let amplicon_name = format!("{prefix}_{}", self.amplicon_number);
        let pool = self.pool.max(0) as usize;
        format!(
            "{}{}",
            self.fprimer.to_bed_lines(chrom, &amplicon_name, pool),
            self.rprimer.to_bed_lines(chrom, &amplicon_name, pool),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fkmer_starts_derived_from_end_and_seqs() {
        let fk = FKmer::new(50, vec!["ACGTACGTACGTACGTACGT".to_string(), "CGTACGTACGTACGTACGT".to_string()]);
        let starts = fk.starts();
        assert!(starts.contains(&30));
        assert!(starts.contains(&31));
    }

    #[test]
    fn rkmer_ends_derived_from_start_and_seqs() {
        let rk = RKmer::new(100, vec!["ACGTACGTACGTACGTACGT".to_string()]);
        assert_eq!(rk.max_end(), 120);
    }

    #[test]
    fn primer_pair_size_excludes_circular() {
        let fk = FKmer::new(100, vec!["A".repeat(20)]);
        let rk = RKmer::new(500, vec!["A".repeat(20)]);
        let mut pp = PrimerPair::new(fk, rk, 0);
        assert_eq!(pp.amplicon_size(), Some(420));
        pp.circular = true;
        assert_eq!(pp.amplicon_size(), None);
    }
}
