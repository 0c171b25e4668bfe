//! Thin demonstration CLI. §1 places full CLI argument parsing out of
//! scope for the core; this binary wires the library's public API
//! (digest -> pair -> solve -> serialize) into two subcommands so the
//! core can be exercised end to end without a separate driver project.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use md5::{Digest, Md5};

use primal_scheme::bed::{write_amplicon_bed, write_primer_bed};
use primal_scheme::config::Config;
use primal_scheme::digestion::digest;
use primal_scheme::fasta::{read_msa, write_reference_fastas, Msa};
use primal_scheme::logging::init_logging;
use primal_scheme::mapping::build_mapping_array;
use primal_scheme::matchdb::MatchDb;
use primal_scheme::pairs::generate_primer_pairs;
use primal_scheme::panel::PanelMsa;
use primal_scheme::scheme::Scheme;

#[derive(Parser)]
#[command(name = "primal-scheme", version, about = "Multiplex PCR primer scheme designer")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Tile one or more references end to end with overlapping amplicons.
    Scheme(SchemeArgs),
    /// Cover a requested set of reference regions with non-tiling amplicons.
    Panel(PanelArgs),
}

#[derive(Args)]
struct CommonArgs {
    /// One or more aligned FASTA files, each a separate MSA.
    #[arg(required = true)]
    msa: Vec<PathBuf>,
    /// Directory the primer/amplicon BED, reference FASTA, and config JSON
    /// are written into.
    #[arg(short, long, default_value = "scheme-output")]
    output: PathBuf,
    /// Prefix used in emitted amplicon names.
    #[arg(long, default_value = "scheme")]
    prefix: String,
    /// Config JSON overriding the defaults in primal_scheme::config::Config.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    log_filepath: Option<PathBuf>,
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Args)]
struct SchemeArgs {
    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Args)]
struct PanelArgs {
    #[command(flatten)]
    common: CommonArgs,
    /// BED file of regions to cover: `chrom  start  end`. Chrom names must
    /// match an MSA's file stem.
    #[arg(long)]
    regions: Option<PathBuf>,
    #[arg(long, default_value_t = 100)]
    max_amplicons: usize,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Scheme(args) => run_scheme(args),
        Commands::Panel(args) => run_panel(args),
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let cfg = match path {
        Some(p) => {
            let text = fs::read_to_string(p).with_context(|| format!("reading config {p:?}"))?;
            serde_json::from_str(&text)?
        }
        None => Config::default(),
    };
    Ok(cfg.finish()?)
}

fn level_for(verbose: u8) -> log::LevelFilter {
    match verbose {
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    }
}

struct LoadedMsa {
    msa: Msa,
    reference_seq: String,
}

fn load_msas(paths: &[PathBuf], mapping: primal_scheme::config::MappingType) -> Result<Vec<LoadedMsa>> {
    let mut out = Vec::new();
    for (i, path) in paths.iter().enumerate() {
        let msa = read_msa(path, i)?;
        let (_mapping_array, reference_seq) = build_mapping_array(&msa, mapping);
        info!("loaded {} ({} rows x {} cols)", msa.chrom_name, msa.nrows(), msa.ncols());
        out.push(LoadedMsa { msa, reference_seq });
    }
    Ok(out)
}

fn build_matchdb(loaded: &[LoadedMsa], cfg: &Config) -> MatchDb {
    let mut db = MatchDb::new(cfg.mismatch_kmersize);
    for (i, entry) in loaded.iter().enumerate() {
        let row_strings: Vec<String> = entry
            .msa
            .rows
            .iter()
            .map(|row| row.iter().collect::<String>())
            .collect();
        let row_refs: Vec<&str> = row_strings.iter().map(|s| s.as_str()).collect();
        db.build(&row_refs, i);
    }
    db
}

fn persist_run(output: &Path, cfg: &Config, primer_bed_path: &Path, reference_fasta_path: &Path) -> Result<()> {
    let primer_bed_bytes = fs::read(primer_bed_path)?;
    let reference_bytes = fs::read(reference_fasta_path)?;
    let mut primer_hasher = Md5::new();
    primer_hasher.update(&primer_bed_bytes);
    let mut ref_hasher = Md5::new();
    ref_hasher.update(&reference_bytes);

    let persisted = serde_json::json!({
        "config": cfg,
        "primer_bed_md5": format!("{:x}", primer_hasher.finalize()),
        "reference_fasta_md5": format!("{:x}", ref_hasher.finalize()),
    });
    fs::write(output.join("config.json"), serde_json::to_string_pretty(&persisted)?)?;
    Ok(())
}

fn run_scheme(args: SchemeArgs) -> Result<()> {
    let common = args.common;
    let _log_handle = init_logging(common.log_filepath.as_ref(), level_for(common.verbose));
    let cfg = load_config(common.config.as_deref())?;
    fs::create_dir_all(&common.output)?;

    let loaded = load_msas(&common.msa, cfg.mapping)?;
    let matchdb = build_matchdb(&loaded, &cfg);

    let digest_bar = msa_progress_bar(loaded.len());
    let mut all_pairs = Vec::new();
    let mut per_msa_kmers = Vec::new();
    for (i, entry) in loaded.iter().enumerate() {
        digest_bar.set_message(entry.msa.chrom_name.clone());
        let report = digest(&entry.msa, &cfg);
        digest_bar.inc(1);
        info!(
            "{}: {} fkmers, {} rkmers, {} column errors",
            entry.msa.chrom_name,
            report.fkmers.len(),
            report.rkmers.len(),
            report.f_errors.len() + report.r_errors.len()
        );
        let pairs = generate_primer_pairs(&report.fkmers, &report.rkmers, i, &cfg);
        all_pairs.extend(pairs);
        per_msa_kmers.push(report);
    }
    digest_bar.finish_and_clear();

    let mut scheme = Scheme::new(cfg.n_pools);
    let mut accepted = Vec::new();
    for (i, entry) in loaded.iter().enumerate() {
        let report = &per_msa_kmers[i];
        let mut placed = scheme.run_msa(
            &report.fkmers,
            &report.rkmers,
            &all_pairs,
            entry.msa.ncols(),
            i,
            &matchdb,
            &cfg,
        );
        if placed.is_empty() {
            warn!("{}: no amplicons could be placed", entry.msa.chrom_name);
            continue;
        }
        for (number, pp) in placed.iter_mut().enumerate() {
            pp.amplicon_number = number as i64 + 1;
            pp.chrom_name = Some(entry.msa.chrom_name.clone());
            pp.amplicon_prefix = Some(common.prefix.clone());
        }
        accepted.extend(placed);
    }

    if accepted.is_empty() {
        bail!("no amplicons were placed across any input MSA");
    }

    write_outputs(&common.output, &accepted, &loaded, &cfg)?;
    info!("wrote {} amplicons across {} pools", accepted.len(), cfg.n_pools);
    Ok(())
}

fn run_panel(args: PanelArgs) -> Result<()> {
    let common = args.common;
    let _log_handle = init_logging(common.log_filepath.as_ref(), level_for(common.verbose));
    let cfg = load_config(common.config.as_deref())?;
    fs::create_dir_all(&common.output)?;

    let loaded = load_msas(&common.msa, cfg.mapping)?;
    let matchdb = build_matchdb(&loaded, &cfg);

    let regions_by_chrom = match &args.regions {
        Some(path) => parse_regions_bed(path)?,
        None => Default::default(),
    };

    let digest_bar = msa_progress_bar(loaded.len());
    let mut all_pairs = Vec::new();
    let mut panels = Vec::new();
    for (i, entry) in loaded.iter().enumerate() {
        digest_bar.set_message(entry.msa.chrom_name.clone());
        let report = digest(&entry.msa, &cfg);
        digest_bar.inc(1);
        let pairs = generate_primer_pairs(&report.fkmers, &report.rkmers, i, &cfg);
        all_pairs.extend(pairs);

        let regions = regions_by_chrom.get(&entry.msa.chrom_name);
        let panel = match regions {
            Some(rs) if !rs.is_empty() => PanelMsa::regions(i, entry.msa.ncols(), rs),
            Some(_) => bail!(
                "region bed refers to chromosome {:?} with no usable regions",
                entry.msa.chrom_name
            ),
            None if args.regions.is_some() => {
                warn!("{}: no regions requested, covering ALL", entry.msa.chrom_name);
                PanelMsa::all(i, entry.msa.ncols())
            }
            None => PanelMsa::all(i, entry.msa.ncols()),
        };
        panels.push(panel);
    }
    digest_bar.finish_and_clear();

    let mut scheme = primal_scheme::panel::PanelScheme::new(cfg.n_pools);
    let mut placed = scheme.run(&all_pairs, &mut panels, args.max_amplicons, &matchdb, &cfg);
    for (number, pp) in placed.iter_mut().enumerate() {
        let chrom = loaded[pp.msa_index].msa.chrom_name.clone();
        pp.amplicon_number = number as i64 + 1;
        pp.chrom_name = Some(chrom);
        pp.amplicon_prefix = Some(common.prefix.clone());
    }

    if placed.is_empty() {
        bail!("no amplicons yielded positive coverage gain");
    }

    write_outputs(&common.output, &placed, &loaded, &cfg)?;
    info!("wrote {} panel amplicons", placed.len());
    Ok(())
}

/// Per-MSA digestion progress bar, styled after a typical `indicatif`
/// master-progress-bar helper.
fn msa_progress_bar(n: usize) -> ProgressBar {
    let bar = ProgressBar::new(n as u64);
    bar.set_style(
        ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} digesting {msg}")
            .expect("progress template is well-formed")
            .progress_chars("##-"),
    );
    bar
}

fn parse_regions_bed(path: &Path) -> Result<std::collections::HashMap<String, Vec<(usize, usize)>>> {
    let mut out: std::collections::HashMap<String, Vec<(usize, usize)>> = std::collections::HashMap::new();
    let text = fs::read_to_string(path).with_context(|| format!("reading region bed {path:?}"))?;
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 3 {
            bail!("malformed region bed line: {line:?}");
        }
        let start: usize = fields[1].parse().with_context(|| format!("region start in {line:?}"))?;
        let end: usize = fields[2].parse().with_context(|| format!("region end in {line:?}"))?;
        out.entry(fields[0].to_string()).or_default().push((start, end));
    }
    Ok(out)
}

fn write_outputs(
    output: &Path,
    pairs: &[primal_scheme::kmer::PrimerPair],
    loaded: &[LoadedMsa],
    cfg: &Config,
) -> Result<()> {
    let primer_bed_path = output.join("primer.bed");
    fs::write(&primer_bed_path, write_primer_bed(pairs))?;
    fs::write(output.join("amplicon.bed"), write_amplicon_bed(pairs))?;

    let reference_fasta_path = output.join("reference.fasta");
    let refs: Vec<(String, String)> =
        loaded.iter().map(|e| (e.msa.chrom_name.clone(), e.reference_seq.clone())).collect();
    write_reference_fastas(&reference_fasta_path, &refs)?;

    persist_run(output, cfg, &primer_bed_path, &reference_fasta_path)?;
    Ok(())
}
