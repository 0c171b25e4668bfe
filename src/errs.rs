use thiserror::Error;

/// Errors that abort a run at the configuration/IO boundary (§7: "Configuration
/// errors ... abort the run with a one-line diagnostic. I/O failures propagate
/// to the CLI boundary.").
#[derive(Error, Debug)]
pub enum SchemeError {
    #[error("invalid amplicon size range: min {min} >= max {max}")]
    InvalidAmpliconRange { min: usize, max: usize },

    #[error("unknown mapping mode {0:?}")]
    UnknownMapping(String),

    #[error("region {name} ({start}-{end}) refers to absent chromosome {chrom}")]
    UnresolvableRegion { name: String, chrom: String, start: usize, end: usize },

    #[error("pool count mismatch: input bedfile has {bed_pools} pools, n_pools is {n_pools}")]
    PoolCountMismatch { bed_pools: usize, n_pools: usize },

    #[error("MSA rows have unequal length: row {row} is {got}, expected {expected}")]
    RaggedMsa { row: usize, got: usize, expected: usize },

    #[error("primer name {0:?} does not match the expected pattern")]
    MalformedPrimerName(String),

    #[error("strand {found:?} does not agree with primer direction {direction:?} for {name:?}")]
    StrandDirectionMismatch { name: String, found: char, direction: &'static str },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type SchemeResult<T> = Result<T, SchemeError>;

/// Digestion errors are non-fatal: they down-rank a column and are logged
/// with the column index and reason (§7). Ordered so `Ord` gives the
/// hierarchy used to resolve a strict (`min_base_freq == 0`) column: the
/// *largest* variant wins when multiple errors are present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DigestError {
    WalkToFar,
    CustomRecursionError,
    WalksOut,
    GapOnSetBase,
    ContainsInvalidBase,
    HairpinFail,
    DimerFail,
    ThermoHighGc,
    ThermoLowGc,
    ThermoHighTm,
    ThermoLowTm,
    ThermoMaxHomopoly,
    ThermoHairpin,
    NoSequences,
}

impl std::fmt::Display for DigestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DigestError::WalkToFar => "WALKS_TOO_FAR",
            DigestError::CustomRecursionError => "RECURSION",
            DigestError::WalksOut => "WALKS_OUT",
            DigestError::GapOnSetBase => "GAP_ON_SET_BASE",
            DigestError::ContainsInvalidBase => "CONTAINS_INVALID_BASE",
            DigestError::HairpinFail => "HAIRPIN_FAIL",
            DigestError::DimerFail => "DIMER_FAIL",
            DigestError::ThermoHighGc => "HIGH_GC",
            DigestError::ThermoLowGc => "LOW_GC",
            DigestError::ThermoHighTm => "HIGH_TM",
            DigestError::ThermoLowTm => "LOW_TM",
            DigestError::ThermoMaxHomopoly => "MAX_HOMOPOLY",
            DigestError::ThermoHairpin => "HAIRPIN",
            DigestError::NoSequences => "NO_SEQUENCES",
        };
        write!(f, "{s}")
    }
}

/// Solver return codes. The `NO_*` variants are expected control-flow
/// signals driving the state machine of §4.G, not failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverOutcome {
    AddedFirst,
    AddedOverlap,
    AddedWalk,
    AddedBacktrack,
    AddedCircular,
    NoFirst,
    NoOverlap,
    NoWalk,
    NoBacktrack,
    NoCircular,
}

impl SolverOutcome {
    pub fn added(&self) -> bool {
        matches!(
            self,
            SolverOutcome::AddedFirst
                | SolverOutcome::AddedOverlap
                | SolverOutcome::AddedWalk
                | SolverOutcome::AddedBacktrack
                | SolverOutcome::AddedCircular
        )
    }
}
