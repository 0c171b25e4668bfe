//! MODULE B: thermo oracle (§4.B). Nearest-neighbor Tm with salt correction,
//! GC/homopolymer/hairpin gating, and the dimer-interaction primitive.
//!
//! The distilled spec treats `dimer_interact` as an externally-provided
//! thermodynamic primitive; a standalone crate has nothing to link against,
//! so this module supplies a concrete nearest-neighbor implementation
//! grounded on the SantaLucia 1998 unified parameters and the salt-corrected
//! ΔG/Tm formulas used for heterodimer scoring in
//! `USDA-ARS-GBRU-rust_search/src/bin/main_simplesalt.rs`.

use crate::config::Config;
use crate::seq::{gc_fraction, max_homopolymer};

const GAS_CONST: f64 = 1.9872; // cal / (K . mol)

struct NnParams {
    dh: f64,
    ds: f64,
}

/// SantaLucia (1998) unified nearest-neighbor parameters, keyed by the 5'->3'
/// dinucleotide on the top strand.
fn nn_params(a: u8, b: u8) -> NnParams {
    match (a, b) {
        (b'A', b'A') | (b'T', b'T') => NnParams { dh: -7.9, ds: -22.2 },
        (b'A', b'T') => NnParams { dh: -7.2, ds: -20.4 },
        (b'T', b'A') => NnParams { dh: -7.2, ds: -21.3 },
        (b'C', b'A') | (b'T', b'G') => NnParams { dh: -8.5, ds: -22.7 },
        (b'G', b'T') | (b'A', b'C') => NnParams { dh: -8.4, ds: -22.4 },
        (b'C', b'T') | (b'A', b'G') => NnParams { dh: -7.8, ds: -21.0 },
        (b'G', b'A') | (b'T', b'C') => NnParams { dh: -8.2, ds: -22.2 },
        (b'C', b'G') => NnParams { dh: -10.6, ds: -27.2 },
        (b'G', b'C') => NnParams { dh: -9.8, ds: -24.4 },
        (b'C', b'C') | (b'G', b'G') => NnParams { dh: -8.0, ds: -19.9 },
        _ => NnParams { dh: 0.0, ds: 0.0 },
    }
}

fn salt_corrected_ds(seq_len: usize, ds: f64, cfg: &Config) -> f64 {
    let na_eq = cfg.mv_conc + 120.0 * (cfg.dv_conc - cfg.dntp_conc).max(0.0).sqrt();
    ds + 0.368 * (seq_len as f64 - 1.0) * (na_eq / 1000.0).ln()
}

/// Salt-corrected nearest-neighbor melting temperature, in degrees Celsius.
pub fn calc_tm(seq: &str, cfg: &Config) -> f64 {
    let bytes = seq.as_bytes();
    if bytes.len() < 2 {
        return f64::NEG_INFINITY;
    }
    let mut dh = 0.2; // initiation term
    let mut ds = -5.7;
    for w in bytes.windows(2) {
        let p = nn_params(w[0], w[1]);
        dh += p.dh;
        ds += p.ds;
    }
    ds = salt_corrected_ds(bytes.len(), ds, cfg);

    let c = cfg.dna_conc / 1e9;
    (1000.0 * dh) / (ds + GAS_CONST * (c / 4.0).ln()) - 273.15
}

/// Predicted melting temperature (degrees Celsius) of the strongest
/// self-hairpin: scans all self-complementary offsets of a stem >= 4bp with
/// a loop >= 3 and scores the stem as a duplex. Returns `f64::NEG_INFINITY`
/// (no hairpin, never trips the `>= primer_hairpin_th_max` gate) when no
/// stem of minimum length is found. This is an approximation of a full
/// partition-function hairpin predictor -- acceptable for a bounded gating
/// check, documented in DESIGN.md.
pub fn hairpin_tm(seq: &str, cfg: &Config) -> f64 {
    let bytes = seq.as_bytes();
    let n = bytes.len();
    let min_stem = 4usize;
    let min_loop = 3usize;
    let mut best = f64::NEG_INFINITY;

    for stem_len in min_stem..=(n / 2) {
        for loop_len in min_loop..=(n.saturating_sub(2 * stem_len)) {
            let total = 2 * stem_len + loop_len;
            if total > n {
                continue;
            }
            for start in 0..=(n - total) {
                let left = &bytes[start..start + stem_len];
                let right_start = start + stem_len + loop_len;
                let right = &bytes[right_start..right_start + stem_len];
                if is_self_complementary(left, right) {
                    let stem_str: String =
                        left.iter().map(|b| *b as char).collect();
                    let tm = calc_tm(&stem_str, cfg);
                    if tm > best {
                        best = tm;
                    }
                }
            }
        }
    }
    best
}

fn is_self_complementary(left: &[u8], right: &[u8]) -> bool {
    if left.len() != right.len() {
        return false;
    }
    left.iter().zip(right.iter().rev()).all(|(a, b)| complements(*a, *b))
}

fn complements(a: u8, b: u8) -> bool {
    matches!(
        (a, b),
        (b'A', b'T') | (b'T', b'A') | (b'C', b'G') | (b'G', b'C')
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThermoResult {
    Pass,
    LowTm,
    HighTm,
    LowGc,
    HighGc,
    MaxHomopoly,
    Hairpin,
}

/// A set passes only if every member passes (§4.B).
pub fn thermo_check_kmers<'a, I: IntoIterator<Item = &'a str>>(
    seqs: I,
    cfg: &Config,
) -> ThermoResult {
    for seq in seqs {
        let result = thermo_check_one(seq, cfg);
        if result != ThermoResult::Pass {
            return result;
        }
    }
    ThermoResult::Pass
}

fn thermo_check_one(seq: &str, cfg: &Config) -> ThermoResult {
    let tm = calc_tm(seq, cfg);
    if tm < cfg.primer_tm_min {
        return ThermoResult::LowTm;
    }
    if tm > cfg.primer_tm_max {
        return ThermoResult::HighTm;
    }
    let gc = gc_fraction(seq) * 100.0;
    if gc < cfg.primer_gc_min {
        return ThermoResult::LowGc;
    }
    if gc > cfg.primer_gc_max {
        return ThermoResult::HighGc;
    }
    if max_homopolymer(seq) > cfg.primer_homopolymer_max {
        return ThermoResult::MaxHomopoly;
    }
    if hairpin_tm(seq, cfg) >= cfg.primer_hairpin_th_max {
        return ThermoResult::Hairpin;
    }
    ThermoResult::Pass
}

/// ΔG (kcal/mol) of the best ungapped alignment of `b` (or its reverse
/// complement orientation, scored directly since `b` is supplied already in
/// primer orientation by callers) against `a`, scanning every diagonal
/// offset the way a dimer-prediction tool slides two oligos past each
/// other.
fn best_duplex_dg(a: &str, b: &str, cfg: &Config) -> f64 {
    let a = a.as_bytes();
    let b = b.as_bytes();
    // b is reversed (not complemented) so that checking WC-complementarity
    // position-by-position against `a` models two oligos annealing
    // antiparallel, the way two primers meet 3'-to-3' when they interact.
    let rc_b: Vec<u8> = b.iter().rev().cloned().collect();

    let mut best = f64::INFINITY;
    let a_len = a.len() as isize;
    let b_len = rc_b.len() as isize;
    for offset in -(b_len - 1)..a_len {
        let mut dh = 0.0;
        let mut ds = 0.0;
        let mut matched_len = 0usize;
        let mut prev_pair: Option<(u8, u8)> = None;
        for i in 0..a.len() {
            let j = i as isize - offset;
            if j < 0 || j >= b_len {
                prev_pair = None;
                continue;
            }
            let a_base = a[i];
            let b_base = rc_b[j as usize];
            if complements(a_base, b_base) {
                matched_len += 1;
                if let Some((pa, _pb)) = prev_pair {
                    let p = nn_params(pa, a_base);
                    dh += p.dh;
                    ds += p.ds;
                }
                prev_pair = Some((a_base, b_base));
            } else {
                prev_pair = None;
            }
        }
        if matched_len < 4 {
            continue;
        }
        dh += 0.2;
        ds += -5.7;
        let ds_corr = salt_corrected_ds(matched_len.max(2), ds, cfg);
        let t_kelvin = 37.0 + 273.15;
        let dg = dh - (t_kelvin * ds_corr / 1000.0);
        if dg < best {
            best = dg;
        }
    }
    best
}

/// True iff any pair of oligos from the two sets is predicted to form a
/// duplex with ΔG <= `threshold` (more negative = stronger interaction).
/// `threshold` is expected to be a negative number (§4.B, §6).
pub fn dimer_interact<'a, A, B>(seqs_a: A, seqs_b: B, threshold: f64, cfg: &Config) -> bool
where
    A: IntoIterator<Item = &'a str> + Clone,
    B: IntoIterator<Item = &'a str> + Clone,
{
    for a in seqs_a.clone() {
        for b in seqs_b.clone() {
            if best_duplex_dg(a, b, cfg) <= threshold {
                return true;
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> Config {
        Config::default().finish().unwrap()
    }

    #[test]
    fn tm_increases_with_gc_content() {
        let cfg = cfg();
        let at_rich = calc_tm("ATATATATATATATATATAT", &cfg);
        let gc_rich = calc_tm("GCGCGCGCGCGCGCGCGCGC", &cfg);
        assert!(gc_rich > at_rich);
    }

    #[test]
    fn tm_is_stable_across_repeated_calls() {
        use assert_approx_eq::assert_approx_eq;
        let cfg = cfg();
        let seq = "ACGTACGTACGTACGTACGT";
        assert_approx_eq!(calc_tm(seq, &cfg), calc_tm(seq, &cfg), 1e-9);
    }

    #[test]
    fn thermo_check_rejects_short_low_tm_primer() {
        let cfg = cfg();
        let result = thermo_check_kmers(["ACGT"], &cfg);
        assert_eq!(result, ThermoResult::LowTm);
    }

    #[test]
    fn perfectly_complementary_oligos_interact() {
        let cfg = cfg();
        let a = "ACGTACGTACGTACGTACGT";
        let b = reverse_of_complement(a);
        assert!(dimer_interact([a], [b.as_str()], -26.0, &cfg));
    }

    #[test]
    fn unrelated_oligos_do_not_interact() {
        let cfg = cfg();
        assert!(!dimer_interact(
            ["AAAAAAAAAAAAAAAAAAAA"],
            ["AAAAAAAAAAAAAAAAAAAA"],
            -26.0,
            &cfg
        ));
    }

    fn reverse_of_complement(s: &str) -> String {
        crate::seq::reverse_complement(s)
    }
}
