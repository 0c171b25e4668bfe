//! BED I/O (§6 "External interfaces"): primer BED parsing/serialization,
//! grounded on `primalscheme3/core/bedfiles.py` (`BedLine`,
//! `read_in_bedprimerpairs`).

use std::collections::BTreeMap;
use std::path::Path;

use lazy_static::lazy_static;
use regex::Regex;

use crate::errs::{SchemeError, SchemeResult};
use crate::kmer::{FKmer, PrimerPair, RKmer};

lazy_static! {
    static ref PRIMER_NAME_RE: Regex =
        Regex::new(r"^([A-Za-z0-9]+)_(\d+)_(LEFT|RIGHT|L|R)(_\d+)?$").unwrap();
}

/// A single parsed row of an input/output primer BED file. `pool` is kept
/// 0-based internally (§6: "pool is 1-based on disk").
#[derive(Debug, Clone)]
pub struct BedLine {
    pub chrom: String,
    pub start: usize,
    pub end: usize,
    pub name: String,
    pub pool: usize,
    pub strand: char,
    pub sequence: String,
    pub amplicon_number: i64,
    pub direction_is_left: bool,
}

impl BedLine {
    pub fn parse(line: &str) -> SchemeResult<Self> {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 7 {
            return Err(SchemeError::MalformedPrimerName(line.to_string()));
        }
        let name = fields[3].to_string();
        let caps = PRIMER_NAME_RE
            .captures(&name)
            .ok_or_else(|| SchemeError::MalformedPrimerName(name.clone()))?;
        let amplicon_number: i64 = caps[2].parse().unwrap_or(-1);
        let direction_is_left = matches!(&caps[3], "LEFT" | "L");

        let strand: char = fields[5].chars().next().unwrap_or('+');
        let expected_strand = if direction_is_left { '+' } else { '-' };
        if strand != expected_strand {
            return Err(SchemeError::StrandDirectionMismatch {
                name,
                found: strand,
                direction: if direction_is_left { "LEFT" } else { "RIGHT" },
            });
        }

        Ok(BedLine {
            chrom: fields[0].to_string(),
            start: fields[1].parse().map_err(|_| SchemeError::MalformedPrimerName(name.clone()))?,
            end: fields[2].parse().map_err(|_| SchemeError::MalformedPrimerName(name.clone()))?,
            name,
            pool: fields[4].parse::<usize>().map_err(|_| SchemeError::MalformedPrimerName(fields[4].to_string()))?.saturating_sub(1),
            strand,
            sequence: fields[6].to_string(),
            amplicon_number,
            direction_is_left,
        })
    }

    pub fn to_line(&self) -> String {
        format!(
            "{}\t{}\t{}\t{}\t{}\t{}\t{}",
            self.chrom,
            self.start,
            self.end,
            self.name,
            self.pool + 1,
            self.strand,
            self.sequence,
        )
    }
}

pub fn read_bedlines(path: &Path) -> SchemeResult<Vec<BedLine>> {
    let contents = std::fs::read_to_string(path)?;
    contents
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(BedLine::parse)
        .collect()
}

/// Groups bedlines by `(chrom, amplicon_number)` into `PrimerPair`s, `msa_index`
/// left at `0` (unresolved until the caller matches chrom names to loaded
/// MSAs), per `read_in_bedprimerpairs`.
pub fn read_bed_primer_pairs(path: &Path) -> SchemeResult<Vec<PrimerPair>> {
    let lines = read_bedlines(path)?;
    let mut grouped: BTreeMap<(String, i64), Vec<BedLine>> = BTreeMap::new();
    for line in lines {
        grouped.entry((line.chrom.clone(), line.amplicon_number)).or_default().push(line);
    }

    let mut pairs = Vec::new();
    for ((chrom, amplicon_number), lines) in grouped {
        let pool = lines[0].pool;
        let prefix = PRIMER_NAME_RE
            .captures(&lines[0].name)
            .map(|caps| caps[1].to_string())
            .unwrap_or_else(|| "amplicon".to_string());

        let fwd: Vec<&BedLine> = lines.iter().filter(|l| l.direction_is_left).collect();
        let rev: Vec<&BedLine> = lines.iter().filter(|l| !l.direction_is_left).collect();
        if fwd.is_empty() || rev.is_empty() {
            return Err(SchemeError::MalformedPrimerName(format!(
                "{chrom}_{amplicon_number}"
            )));
        }
        let fend = fwd[0].end;
        let rstart = rev[0].start;
        let fkmer = FKmer::new(fend, fwd.iter().map(|l| l.sequence.clone()).collect());
        let rkmer = RKmer::new(rstart, rev.iter().map(|l| l.sequence.clone()).collect());

        let mut pp = PrimerPair::new(fkmer, rkmer, 0);
        pp.amplicon_number = amplicon_number;
        pp.pool = pool as i64;
        pp.chrom_name = Some(chrom);
        pp.amplicon_prefix = Some(prefix);
        pairs.push(pp);
    }

    pairs.sort_by(|a, b| {
        a.chrom_name
            .cmp(&b.chrom_name)
            .then(a.amplicon_number.cmp(&b.amplicon_number))
    });
    Ok(pairs)
}

/// Serializes primer pairs sorted by `(chrom, amplicon_number, strand)`
/// (§6 "Output BED").
pub fn write_primer_bed(pairs: &[PrimerPair]) -> String {
    let mut sorted: Vec<&PrimerPair> = pairs.iter().collect();
    sorted.sort_by(|a, b| {
        a.chrom_name
            .cmp(&b.chrom_name)
            .then(a.amplicon_number.cmp(&b.amplicon_number))
    });
    let mut out = String::new();
    for pp in sorted {
        out.push_str(&pp.to_bed());
    }
    out
}

/// Serializes one row per amplicon: `chrom start end name pool`.
pub fn write_amplicon_bed(pairs: &[PrimerPair]) -> String {
    let mut sorted: Vec<&PrimerPair> = pairs.iter().collect();
    sorted.sort_by(|a, b| {
        a.chrom_name
            .cmp(&b.chrom_name)
            .then(a.amplicon_number.cmp(&b.amplicon_number))
    });
    let mut out = String::new();
    for pp in sorted {
        let chrom = pp.chrom_name.as_deref().unwrap_or("");
        let prefix = pp.amplicon_prefix.as_deref().unwrap_or("amplicon");
        out.push_str(&format!(
            "{chrom}\t{}\t{}\t{prefix}_{}\t{}\n",
            pp.start(),
            pp.end(),
            pp.amplicon_number,
            pp.pool.max(0) + 1,
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_bedline() {
        let line = BedLine::parse("chr1\t100\t120\tscheme_1_LEFT_1\t1\t+\tACGT").unwrap();
        assert_eq!(line.pool, 0);
        assert_eq!(line.amplicon_number, 1);
        assert!(line.direction_is_left);
    }

    #[test]
    fn rejects_strand_direction_mismatch() {
        let err = BedLine::parse("chr1\t100\t120\tscheme_1_LEFT_1\t1\t-\tACGT");
        assert!(matches!(err, Err(SchemeError::StrandDirectionMismatch { .. })));
    }

    #[test]
    fn round_trips_primer_pairs_through_bed() {
        let fk = FKmer::new(100, vec!["A".repeat(20)]);
        let rk = RKmer::new(500, vec!["A".repeat(20)]);
        let mut pp = PrimerPair::new(fk, rk, 0);
        pp.chrom_name = Some("chr1".to_string());
        pp.amplicon_prefix = Some("scheme".to_string());
        pp.amplicon_number = 1;
        pp.pool = 0;

        let bed_text = write_primer_bed(&[pp]);
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), &bed_text).unwrap();
        let reparsed = read_bed_primer_pairs(tmp.path()).unwrap();
        assert_eq!(reparsed.len(), 1);
        assert_eq!(reparsed[0].chrom_name.as_deref(), Some("chr1"));
        assert_eq!(reparsed[0].start(), 100);
        assert_eq!(reparsed[0].end(), 520);
    }
}
