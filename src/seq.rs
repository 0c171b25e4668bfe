//! MODULE A: sequence utilities (§4.A). Ambiguity expansion, reverse
//! complement, majority-base voting over an MSA column.

use crate::config::{ambiguous_dna, complement_base};

/// Replaces every IUPAC ambiguity code in every input string with each of
/// its concrete bases (Cartesian product across positions). Returns `None`
/// if any string contains `N` or a symbol outside the IUPAC alphabet --
/// callers treat that as an "invalid base" error (§4.A, §4.D).
pub fn expand_ambs<S: AsRef<str>>(seqs: &[S]) -> Option<Vec<String>> {
    let mut out = Vec::new();
    for seq in seqs {
        out.extend(expand_one(seq.as_ref())?);
    }
    Some(out)
}

fn expand_one(seq: &str) -> Option<Vec<String>> {
    let mut acc = vec![String::new()];
    for base in seq.chars() {
        if base == 'N' {
            return None;
        }
        let options = ambiguous_dna(base)?;
        let mut next = Vec::with_capacity(acc.len() * options.len());
        for prefix in &acc {
            for opt in options {
                let mut s = prefix.clone();
                s.push(*opt);
                next.push(s);
            }
        }
        acc = next;
    }
    Some(acc)
}

/// Reverse-complements a sequence using the IUPAC complement table,
/// including self-complements for `W, S, N, -`.
pub fn reverse_complement(seq: &str) -> String {
    seq.chars().rev().map(complement_base).collect()
}

/// Majority non-gap, non-empty base at an MSA column; ties broken by the
/// fixed order A<C<G<T<other IUPAC codes.
pub fn most_common_base(column: impl IntoIterator<Item = char>) -> char {
    let mut counts: Vec<(char, usize)> = Vec::new();
    for base in column {
        if base == '-' || base == '\0' {
            continue;
        }
        if let Some(entry) = counts.iter_mut().find(|(b, _)| *b == base) {
            entry.1 += 1;
        } else {
            counts.push((base, 1));
        }
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1).then(order_key(a.0).cmp(&order_key(b.0))));
    counts.first().map(|(b, _)| *b).unwrap_or('N')
}

fn order_key(base: char) -> u8 {
    const ORDER: &str = "ACGT MRWSYKVHDBN";
    ORDER.find(base).map(|i| i as u8).unwrap_or(255)
}

pub fn gc_fraction(seq: &str) -> f64 {
    if seq.is_empty() {
        return 0.0;
    }
    let gc = seq.chars().filter(|c| *c == 'G' || *c == 'C').count();
    gc as f64 / seq.len() as f64
}

/// Length of the longest run of a single repeated base.
pub fn max_homopolymer(seq: &str) -> usize {
    let mut max_run = 0usize;
    let mut run = 0usize;
    let mut last: Option<char> = None;
    for c in seq.chars() {
        if Some(c) == last {
            run += 1;
        } else {
            run = 1;
            last = Some(c);
        }
        max_run = max_run.max(run);
    }
    max_run
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_ambs_cartesian_product() {
        let got = expand_ambs(&["ACY"]).unwrap();
        let mut got = got;
        got.sort();
        assert_eq!(got, vec!["ACC".to_string(), "ACT".to_string()]);
    }

    #[test]
    fn expand_ambs_rejects_n() {
        assert!(expand_ambs(&["ACN"]).is_none());
    }

    #[test]
    fn reverse_complement_self_complements() {
        assert_eq!(reverse_complement("ACGT"), "ACGT");
        assert_eq!(reverse_complement("GGATCC"), "GGATCC");
        assert_eq!(reverse_complement("N-W"), "W-N");
    }

    #[test]
    fn most_common_base_breaks_ties_in_fixed_order() {
        assert_eq!(most_common_base(['A', 'C']), 'A');
        assert_eq!(most_common_base(['C', 'G', 'G']), 'G');
        assert_eq!(most_common_base(['-', '-']), 'N');
    }

    #[test]
    fn homopolymer_run_length() {
        assert_eq!(max_homopolymer("AACCCGT"), 3);
        assert_eq!(max_homopolymer(""), 0);
    }
}
