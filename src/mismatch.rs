//! MODULE F: mispriming / cross-product detection (§4.F), grounded on
//! `mismatches.py::detect_new_products` / `detect_products`.

use rustc_hash::FxHashSet;

use crate::matchdb::MatchEntry;

/// True if any `+`-strand entry in `new_matches` and any `-`-strand entry in
/// `old_matches` (or vice versa) share an MSA and fall within
/// `0 < distance < product_size` of each other -- i.e. adding the new
/// primer would form a new cross-product against something already in the
/// pool.
pub fn detect_new_products(
    new_matches: &FxHashSet<MatchEntry>,
    old_matches: &FxHashSet<MatchEntry>,
    product_size: usize,
) -> bool {
    let (new_f, new_r) = split_by_strand(new_matches);
    let (old_f, old_r) = split_by_strand(old_matches);

    for f in &new_f {
        for r in &old_r {
            if forms_product(f, r, product_size) {
                return true;
            }
        }
    }
    for r in &new_r {
        for f in &old_f {
            if forms_product(f, r, product_size) {
                return true;
            }
        }
    }
    false
}

/// Self-contained variant: `matches` is the union of two primer pairs'
/// match sets; true if a forward/reverse pair within the same MSA and
/// `0 < distance < product_size` exists anywhere in the union.
pub fn detect_products(matches: &FxHashSet<MatchEntry>, product_size: usize) -> bool {
    let (fmatches, rmatches) = split_by_strand(matches);
    if fmatches.is_empty() || rmatches.is_empty() {
        return false;
    }
    for f in &fmatches {
        for r in &rmatches {
            if forms_product(f, r, product_size) {
                return true;
            }
        }
    }
    false
}

fn forms_product(f: &MatchEntry, r: &MatchEntry, product_size: usize) -> bool {
    f.msa_index == r.msa_index && {
        let distance = r.position as i64 - f.position as i64;
        distance > 0 && distance < product_size as i64
    }
}

fn split_by_strand(matches: &FxHashSet<MatchEntry>) -> (Vec<MatchEntry>, Vec<MatchEntry>) {
    let mut f = Vec::new();
    let mut r = Vec::new();
    for m in matches {
        match m.strand {
            '+' => f.push(*m),
            '-' => r.push(*m),
            _ => {}
        }
    }
    (f, r)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(msa: usize, pos: usize, strand: char) -> MatchEntry {
        MatchEntry::new(msa, pos, strand)
    }

    #[test]
    fn detects_forward_reverse_product_within_range() {
        let new_matches: FxHashSet<_> = [entry(0, 100, '+')].into_iter().collect();
        let old_matches: FxHashSet<_> = [entry(0, 300, '-')].into_iter().collect();
        assert!(detect_new_products(&new_matches, &old_matches, 500));
    }

    #[test]
    fn rejects_product_outside_size_window() {
        let new_matches: FxHashSet<_> = [entry(0, 100, '+')].into_iter().collect();
        let old_matches: FxHashSet<_> = [entry(0, 3000, '-')].into_iter().collect();
        assert!(!detect_new_products(&new_matches, &old_matches, 500));
    }

    #[test]
    fn rejects_different_msa() {
        let new_matches: FxHashSet<_> = [entry(0, 100, '+')].into_iter().collect();
        let old_matches: FxHashSet<_> = [entry(1, 300, '-')].into_iter().collect();
        assert!(!detect_new_products(&new_matches, &old_matches, 500));
    }

    #[test]
    fn detect_products_requires_both_strands_present() {
        let only_forward: FxHashSet<_> = [entry(0, 100, '+'), entry(0, 110, '+')].into_iter().collect();
        assert!(!detect_products(&only_forward, 500));
    }
}
