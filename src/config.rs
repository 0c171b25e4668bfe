use serde::{Deserialize, Serialize};

use crate::errs::{SchemeError, SchemeResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MappingType {
    First,
    Consensus,
}

impl std::str::FromStr for MappingType {
    type Err = SchemeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "first" => Ok(MappingType::First),
            "consensus" => Ok(MappingType::Consensus),
            other => Err(SchemeError::UnknownMapping(other.to_string())),
        }
    }
}

/// Run configuration. Defaults mirror §6; `high_gc` swaps the primer
/// size/GC ranges for the tighter high-GC-genome profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub n_pools: usize,
    pub min_overlap: usize,
    pub mapping: MappingType,
    pub circular: bool,
    pub backtrack: bool,
    pub min_base_freq: f64,
    pub ignore_n: bool,
    pub high_gc: bool,

    pub amplicon_size: usize,
    pub amplicon_size_min: usize,
    pub amplicon_size_max: usize,

    pub primer_size_min: usize,
    pub primer_size_max: usize,
    pub primer_gc_min: f64,
    pub primer_gc_max: f64,
    pub primer_tm_min: f64,
    pub primer_tm_max: f64,
    pub primer_hairpin_th_max: f64,
    pub primer_homopolymer_max: usize,
    pub primer_max_walk: usize,

    pub mismatch_kmersize: usize,
    pub mismatch_fuzzy: bool,
    pub mismatch_product_size: usize,

    pub mv_conc: f64,
    pub dv_conc: f64,
    pub dntp_conc: f64,
    pub dna_conc: f64,
    pub dimer_score: f64,

    pub reduce_kmers: bool,
    pub editdist_max: usize,
    pub editdist_end3p: usize,
}

impl Default for Config {
    fn default() -> Self {
        let amplicon_size = 400usize;
        let primer_size_min = 19usize;
        Config {
            n_pools: 2,
            min_overlap: 10,
            mapping: MappingType::First,
            circular: false,
            backtrack: false,
            min_base_freq: 0.0,
            ignore_n: false,
            high_gc: false,
            amplicon_size,
            amplicon_size_min: (amplicon_size as f64 * 0.9) as usize,
            amplicon_size_max: (amplicon_size as f64 * 1.1) as usize,
            primer_size_min,
            primer_size_max: 34,
            primer_gc_min: 30.0,
            primer_gc_max: 55.0,
            primer_tm_min: 59.5,
            primer_tm_max: 62.5,
            primer_hairpin_th_max: 47.0,
            primer_homopolymer_max: 5,
            primer_max_walk: 80,
            mismatch_kmersize: primer_size_min,
            mismatch_fuzzy: true,
            mismatch_product_size: 0,
            mv_conc: 100.0,
            dv_conc: 2.0,
            dntp_conc: 0.8,
            dna_conc: 15.0,
            dimer_score: -26.0,
            reduce_kmers: false,
            editdist_max: 1,
            editdist_end3p: 6,
        }
    }
}

impl Config {
    /// Applies the amplicon-size derivation, high-GC profile swap, and
    /// mismatch-kmersize linkage, then validates invariants.
    pub fn finish(mut self) -> SchemeResult<Self> {
        if self.amplicon_size_min == 0 {
            self.amplicon_size_min = (self.amplicon_size as f64 * 0.9) as usize;
        }
        if self.amplicon_size_max == 0 {
            self.amplicon_size_max = (self.amplicon_size as f64 * 1.1) as usize;
        }
        if self.high_gc {
            self.primer_size_min = 17;
            self.primer_size_max = 30;
            self.primer_gc_min = 40.0;
            self.primer_gc_max = 65.0;
        }
        self.mismatch_kmersize = self.primer_size_min;
        if self.mismatch_product_size == 0 {
            self.mismatch_product_size = self.amplicon_size_max;
        }

        if self.amplicon_size_min >= self.amplicon_size_max {
            return Err(SchemeError::InvalidAmpliconRange {
                min: self.amplicon_size_min,
                max: self.amplicon_size_max,
            });
        }
        Ok(self)
    }
}

pub const IUPAC_ALL_ALLOWED_DNA: &[char] = &[
    'A', 'G', 'K', 'Y', 'B', 'S', 'N', 'H', 'C', 'W', 'D', 'R', 'M', 'T', 'V', '-',
];

pub const SIMPLE_BASES: &[char] = &['A', 'C', 'G', 'T'];

/// Degenerate base -> concrete bases it may resolve to.
pub fn ambiguous_dna(base: char) -> Option<&'static [char]> {
    Some(match base {
        'A' => &['A'],
        'C' => &['C'],
        'G' => &['G'],
        'T' => &['T'],
        'M' => &['A', 'C'],
        'R' => &['A', 'G'],
        'W' => &['A', 'T'],
        'S' => &['C', 'G'],
        'Y' => &['C', 'T'],
        'K' => &['G', 'T'],
        'V' => &['A', 'C', 'G'],
        'H' => &['A', 'C', 'T'],
        'D' => &['A', 'G', 'T'],
        'B' => &['C', 'G', 'T'],
        _ => return None,
    })
}

/// The IUPAC complement table, including self-complements for ambiguous
/// two/undetermined codes per §4.A.
pub fn complement_base(base: char) -> char {
    match base {
        'A' => 'T',
        'C' => 'G',
        'G' => 'C',
        'T' => 'A',
        'M' => 'K',
        'R' => 'Y',
        'W' => 'W',
        'S' => 'S',
        'Y' => 'R',
        'K' => 'M',
        'V' => 'B',
        'H' => 'D',
        'D' => 'H',
        'B' => 'V',
        'X' => 'X',
        'N' => 'N',
        '-' => '-',
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_finishes() {
        let cfg = Config::default().finish().unwrap();
        assert_eq!(cfg.amplicon_size_min, 360);
        assert_eq!(cfg.amplicon_size_max, 440);
        assert_eq!(cfg.mismatch_kmersize, cfg.primer_size_min);
    }

    #[test]
    fn high_gc_swaps_ranges() {
        let mut cfg = Config::default();
        cfg.high_gc = true;
        let cfg = cfg.finish().unwrap();
        assert_eq!(cfg.primer_size_min, 17);
        assert_eq!(cfg.primer_gc_min, 40.0);
    }

    #[test]
    fn invalid_range_rejected() {
        let mut cfg = Config::default();
        cfg.amplicon_size_min = 500;
        cfg.amplicon_size_max = 400;
        assert!(cfg.finish().is_err());
    }
}
