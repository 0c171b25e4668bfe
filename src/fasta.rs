//! FASTA I/O: MSA reader (the §3 character matrix) and reference FASTA
//! writer, built on the `bio::io::fasta` usage pattern seen in
//! `David-OConnor-plascad/src/file_io/save.rs`.

use std::io::Write;
use std::path::Path;

use bio::io::fasta;

use crate::errs::{SchemeError, SchemeResult};

/// A parsed multiple sequence alignment: a rectangular matrix of characters
/// over the IUPAC-plus-gap alphabet (§3). `'\0'` marks a truncated row's
/// trailing positions where a shorter sequence has no aligned base.
#[derive(Debug, Clone)]
pub struct Msa {
    pub chrom_name: String,
    pub row_ids: Vec<String>,
    pub rows: Vec<Vec<char>>,
    pub msa_index: usize,
}

impl Msa {
    pub fn ncols(&self) -> usize {
        self.rows.first().map(|r| r.len()).unwrap_or(0)
    }

    pub fn nrows(&self) -> usize {
        self.rows.len()
    }

    pub fn column(&self, col: usize) -> impl Iterator<Item = char> + '_ {
        self.rows.iter().map(move |row| row[col])
    }

    /// Row `row_index`'s bases over `[start, end)`, with gaps and the
    /// truncation sentinel stripped.
    pub fn row_slice_ungapped(&self, row_index: usize, start: usize, end: usize) -> String {
        self.rows[row_index][start..end]
            .iter()
            .filter(|c| **c != '-' && **c != '\0')
            .collect()
    }
}

/// Reads an aligned FASTA file into an `Msa`. All records must have equal
/// length (§3 invariant); the chromosome name is taken from the file stem.
pub fn read_msa(path: &Path, msa_index: usize) -> SchemeResult<Msa> {
    let file = std::fs::File::open(path)?;
    let reader = fasta::Reader::new(file);

    let mut row_ids = Vec::new();
    let mut rows: Vec<Vec<char>> = Vec::new();
    let mut expected_len: Option<usize> = None;

    for (row_index, record) in reader.records().enumerate() {
        let record = record?;
        let seq: Vec<char> = record
            .seq()
            .iter()
            .map(|b| (*b as char).to_ascii_uppercase())
            .collect();
        match expected_len {
            None => expected_len = Some(seq.len()),
            Some(expected) if expected != seq.len() => {
                return Err(SchemeError::RaggedMsa {
                    row: row_index,
                    got: seq.len(),
                    expected,
                })
            }
            _ => {}
        }
        row_ids.push(record.id().to_string());
        rows.push(seq);
    }

    let chrom_name = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| format!("msa_{msa_index}"));

    Ok(Msa { chrom_name, row_ids, rows, msa_index })
}

/// Writes a single-record reference FASTA (§1 "a reference FASTA" output).
pub fn write_reference_fasta(path: &Path, name: &str, seq: &str) -> SchemeResult<()> {
    let file = std::fs::File::create(path)?;
    let mut writer = fasta::Writer::new(file);
    writer.write(name, None, seq.as_bytes())?;
    Ok(())
}

/// Writes several references to one FASTA file, in insertion order.
pub fn write_reference_fastas(path: &Path, refs: &[(String, String)]) -> SchemeResult<()> {
    let file = std::fs::File::create(path)?;
    let mut writer = std::io::BufWriter::new(file);
    for (name, seq) in refs {
        writeln!(writer, ">{name}\n{seq}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn reads_equal_length_msa() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        writeln!(tmp, ">row1\nACGTACGT\n>row2\nACGTACGG").unwrap();
        let msa = read_msa(tmp.path(), 0).unwrap();
        assert_eq!(msa.nrows(), 2);
        assert_eq!(msa.ncols(), 8);
    }

    #[test]
    fn rejects_ragged_rows() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        writeln!(tmp, ">row1\nACGTACGT\n>row2\nACGT").unwrap();
        let err = read_msa(tmp.path(), 0);
        assert!(matches!(err, Err(SchemeError::RaggedMsa { .. })));
    }
}
