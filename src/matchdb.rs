//! MODULE C: MatchDB (§4.C). A persistent k-mer -> `(msa_index, position,
//! strand)` index over every input sequence, used by the mispriming
//! detector to flag spurious cross-products.
//!
//! The distilled implementation backed this with `dbm.ndbm`, a file-backed
//! key/value store; here an `IndexMap` keyed on the canonical forward-strand
//! k-mer bytes stands in for it (§4.C: "a disk-backed or memory-mapped
//! key/value store is acceptable" -- in-memory is a strict subset of that
//! contract and the run-scoped lifetime never needs eviction).

use indexmap::IndexMap;
use rustc_hash::FxHashSet;

use crate::kmer::{FKmer, RKmer};
use crate::seq::reverse_complement;

pub type Strand = char; // '+' | '-'

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MatchEntry {
    pub msa_index: usize,
    pub position: usize,
    pub strand: char,
}

impl MatchEntry {
    pub fn new(msa_index: usize, position: usize, strand: char) -> Self {
        MatchEntry { msa_index, position, strand }
    }
}

const MUTATION_BASES: [(char, &str); 4] =
    [('A', "CGT"), ('C', "AGT"), ('G', "CAT"), ('T', "CGA")];

/// Every single-substitution neighbor of `seq`, including `seq` itself.
pub fn generate_single_mismatches(seq: &str) -> FxHashSet<String> {
    let mut out = FxHashSet::default();
    out.insert(seq.to_string());
    let chars: Vec<char> = seq.chars().collect();
    for (i, base) in chars.iter().enumerate() {
        if let Some((_, alts)) = MUTATION_BASES.iter().find(|(b, _)| b == base) {
            for alt in alts.chars() {
                let mut mutated = chars.clone();
                mutated[i] = alt;
                out.insert(mutated.into_iter().collect());
            }
        }
    }
    out
}

#[derive(Debug, Default)]
pub struct MatchDb {
    entries: IndexMap<Vec<u8>, FxHashSet<(usize, usize)>>,
    kmer_size: usize,
}

impl MatchDb {
    pub fn new(kmer_size: usize) -> Self {
        MatchDb { entries: IndexMap::new(), kmer_size }
    }

    pub fn kmer_size(&self) -> usize {
        self.kmer_size
    }

    /// Streams each row of an already-parsed MSA (or any FASTA record) and
    /// inserts every valid k-length window as `(msa_index, start_col, '+')`.
    /// Windows containing `N` are dropped; internal gaps are removed and the
    /// window is extended rightward to restore length k when possible.
    pub fn build(&mut self, sequences: &[&str], msa_index: usize) {
        for seq in sequences {
            self.digest_kmers_into_db(seq, msa_index);
        }
    }

    fn digest_kmers_into_db(&mut self, seq: &str, msa_index: usize) {
        let chars: Vec<char> = seq.chars().collect();
        let n = chars.len();
        if n < self.kmer_size {
            return;
        }
        for start in 0..=(n - self.kmer_size) {
            if chars[start] == '-' || chars[start] == '\0' {
                continue;
            }
            let mut kmer: Vec<char> =
                chars[start..start + self.kmer_size].iter().filter(|c| **c != '-').cloned().collect();

            if kmer.len() < self.kmer_size {
                let mut counter = 1usize;
                while counter + self.kmer_size + start < n && kmer.len() < self.kmer_size {
                    let new_base = chars[start + self.kmer_size + counter - 1];
                    if new_base != '-' && new_base != '\0' {
                        kmer.push(new_base);
                    }
                    counter += 1;
                }
            }

            if kmer.len() == self.kmer_size && !kmer.contains(&'N') {
                let kmer_str: String = kmer.into_iter().collect();
                self.write_unique(kmer_str.as_bytes(), msa_index, start);
            }
        }
    }

    fn write_unique(&mut self, kmer: &[u8], msa_index: usize, position: usize) {
        self.entries
            .entry(kmer.to_vec())
            .or_insert_with(FxHashSet::default)
            .insert((msa_index, position));
    }

    fn read_matches(&self, seq: &str) -> Vec<(usize, usize)> {
        self.entries
            .get(seq.as_bytes())
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn find_one(&self, seq: &str) -> Vec<MatchEntry> {
        let mut matches = Vec::new();
        for (msa_index, position) in self.read_matches(seq) {
            matches.push(MatchEntry::new(msa_index, position, '+'));
        }
        let rc = reverse_complement(seq);
        for (msa_index, position) in self.read_matches(&rc) {
            matches.push(MatchEntry::new(msa_index, position, '-'));
        }
        matches
    }

    /// Returns all stored matches for `seq` on `+`, plus all stored matches
    /// for `reverse_complement(seq)` relabeled `-`. If `fuzzy`, the query is
    /// expanded to the set of all single-substitution neighbors first.
    pub fn find(&self, seqs: impl IntoIterator<Item = String>, fuzzy: bool) -> FxHashSet<MatchEntry> {
        let mut out = FxHashSet::default();
        for seq in seqs {
            if fuzzy {
                for variant in generate_single_mismatches(&seq) {
                    out.extend(self.find_one(&variant));
                }
            } else {
                out.extend(self.find_one(&seq));
            }
        }
        out
    }

    /// Queries the 3'-end k-length suffix of each string in `fk.seqs`; with
    /// `remove_expected = true` it removes the trivially expected hit
    /// `(msa_index, fk.end - k, '+')`.
    pub fn find_fkmer(
        &self,
        fk: &FKmer,
        msa_index: usize,
        fuzzy: bool,
        remove_expected: bool,
    ) -> FxHashSet<MatchEntry> {
        let k = self.kmer_size;
        let suffixes = fk
            .seqs
            .iter()
            .filter_map(|s| suffix(s, k))
            .collect::<Vec<_>>();
        let mut matches = self.find(suffixes, fuzzy);
        if remove_expected {
            let expected = fk.end.saturating_sub(k);
            matches.retain(|m| !(m.msa_index == msa_index && m.position == expected));
        }
        matches
    }

    /// Symmetric for `find_rkmer` using the 5' k-length prefix and
    /// `(msa_index, rk.start, '-')`.
    pub fn find_rkmer(
        &self,
        rk: &RKmer,
        msa_index: usize,
        fuzzy: bool,
        remove_expected: bool,
    ) -> FxHashSet<MatchEntry> {
        let k = self.kmer_size;
        let prefixes = rk
            .seqs
            .iter()
            .filter_map(|s| prefix(s, k))
            .collect::<Vec<_>>();
        let mut matches = self.find(prefixes, fuzzy);
        if remove_expected {
            matches.retain(|m| !(m.msa_index == msa_index && m.position == rk.start));
        }
        matches
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn suffix(s: &str, k: usize) -> Option<String> {
    if s.len() < k {
        return None;
    }
    Some(s[s.len() - k..].to_string())
}

fn prefix(s: &str, k: usize) -> Option<String> {
    if s.len() < k {
        return None;
    }
    Some(s[..k].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_and_find_plus_strand() {
        let mut db = MatchDb::new(6);
        db.build(&["ACGTACGTAC"], 0);
        let matches = db.find(["ACGTAC".to_string()], false);
        assert!(matches.contains(&MatchEntry::new(0, 0, '+')));
    }

    #[test]
    fn find_matches_reverse_complement_strand() {
        let mut db = MatchDb::new(4);
        db.build(&["AACCGGTT"], 0);
        let rc_query = reverse_complement("AACC");
        let matches = db.find([rc_query], false);
        assert!(matches.iter().any(|m| m.strand == '-'));
    }

    #[test]
    fn fuzzy_find_matches_single_substitution() {
        let mut db = MatchDb::new(6);
        db.build(&["ACGTACGTAC"], 0);
        let matches = db.find(["ACGTAG".to_string()], true);
        assert!(matches.iter().any(|m| m.msa_index == 0));
    }

    #[test]
    fn gap_kmer_is_repaired_by_walking_right() {
        let mut db = MatchDb::new(4);
        db.build(&["AC-GT"], 0);
        // window at 0 is "AC-G" -> gap stripped -> "ACG", walk right adds T
        let matches = db.find(["ACGT".to_string()], false);
        assert!(!matches.is_empty());
    }
}
