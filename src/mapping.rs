//! `mapping_array` construction (§3, §6 `mapping` option): re-expresses
//! alignment column positions in the coordinate system of a chosen row, so
//! the output BED can be referenced against a real sequence rather than
//! alignment columns. Grounded on `primalscheme3/core/mapping.py`'s
//! `generate_consensus` / `generate_reference` contract (not retrieved in
//! full, inferred from call sites in `panel_main.py`).

use crate::config::MappingType;
use crate::fasta::Msa;
use crate::seq::most_common_base;

/// `mapping_array[col] = Some(ref_col)` when the reference row has a real
/// base at `col`, `None` when it is a gap in the reference (§3).
pub fn build_mapping_array(msa: &Msa, mapping: MappingType) -> (Vec<Option<usize>>, String) {
    match mapping {
        MappingType::First => mapping_from_row(&msa.rows[0]),
        MappingType::Consensus => {
            let consensus: Vec<char> = (0..msa.ncols())
                .map(|c| most_common_base(msa.column(c)))
                .collect();
            mapping_from_row(&consensus)
        }
    }
}

fn mapping_from_row(row: &[char]) -> (Vec<Option<usize>>, String) {
    let mut mapping = Vec::with_capacity(row.len());
    let mut ref_seq = String::new();
    let mut ref_col = 0usize;
    for base in row {
        if *base == '-' || *base == '\0' {
            mapping.push(None);
        } else {
            mapping.push(Some(ref_col));
            ref_seq.push(*base);
            ref_col += 1;
        }
    }
    (mapping, ref_seq)
}

/// Remaps a column index through a `mapping_array`; `None` if the target
/// position is a gap in the reference.
pub fn remap_col(mapping_array: &[Option<usize>], col: usize) -> Option<usize> {
    mapping_array.get(col).copied().flatten()
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

    #[test]
    fn first_mapping_skips_gaps_in_first_row() {
        let m = msa(&["AC-GT", "ACGGT"]);
        let (mapping, ref_seq) = build_mapping_array(&m, MappingType::First);
        assert_eq!(ref_seq, "ACGT");
        assert_eq!(mapping, vec![Some(0), Some(1), None, Some(2), Some(3)]);
    }

    #[test]
    fn consensus_mapping_uses_majority_base_per_column() {
        let m = msa(&["ACGT", "ACGT", "ACGA"]);
        let (mapping, ref_seq) = build_mapping_array(&m, MappingType::Consensus);
        assert_eq!(ref_seq, "ACGT");
        assert_eq!(mapping.len(), 4);
    }
}
