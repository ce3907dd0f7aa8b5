use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use colored::Colorize;
use humansize::{format_size, BINARY};
use tracing_subscriber::EnvFilter;

use delta::compare::{
    CompareEngine, ComparisonOutcome, DigestStatus, Disallowed, FileBuffer, FileSlot,
};
use delta::config::DeltaConfig;
use delta::hash::{Algorithm, DigestResult, HashEngine, HashRegistry};
use delta::report;

#[derive(Parser)]
#[command(name = "delta", version, about = "File digests and byte-level file comparison")]
struct Cli {
    /// Config file (default: <config dir>/delta/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List supported digest algorithms
    List {
        /// Include variable-length (SHAKE) algorithms
        #[arg(long)]
        all: bool,
    },
    /// Compute digests of a file ("-" for stdin)
    Hash {
        file: PathBuf,
        /// Algorithm to compute (repeatable; default: all)
        #[arg(short, long = "algorithm")]
        algorithms: Vec<String>,
        #[arg(long)]
        json: bool,
    },
    /// Compare two files byte by byte
    Compare {
        first: PathBuf,
        second: PathBuf,
        /// Largest file size allowed for a byte comparison
        #[arg(long)]
        size_limit: Option<u64>,
        /// Compare bytes even when digests already match
        #[arg(long)]
        force: bool,
        #[arg(long)]
        json: bool,
    },
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{} {:#}", "Error:".red().bold(), err);
            ExitCode::from(2)
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = DeltaConfig::load(cli.config.as_deref()).context("loading configuration")?;

    match cli.command {
        Command::List { all } => {
            list_algorithms(all || !config.exclude_variable_length_algorithms);
            Ok(ExitCode::SUCCESS)
        }
        Command::Hash {
            file,
            algorithms,
            json,
        } => hash(&config, &file, algorithms, json).await,
        Command::Compare {
            first,
            second,
            size_limit,
            force,
            json,
        } => {
            let config = match size_limit {
                Some(limit) => config
                    .with_size_limit(limit)
                    .context("applying --size-limit")?,
                None => config,
            };
            compare(&config, &first, &second, force, json).await
        }
    }
}

fn list_algorithms(include_variable_length: bool) {
    println!("{:<12} {:>6}  {}", "ALGORITHM".bold(), "BITS".bold(), "KIND".bold());
    for info in HashRegistry::list_algorithms(!include_variable_length) {
        let kind = match (info.cryptographic, info.variable_length) {
            (_, true) => "cryptographic, extendable output",
            (true, false) => "cryptographic",
            (false, false) => "non-cryptographic",
        };
        println!("{:<12} {:>6}  {}", info.name, info.output_bits, kind);
    }
}

async fn hash(config: &DeltaConfig, file: &Path, algorithms: Vec<String>, json: bool) -> Result<ExitCode> {
    let mut engine = HashEngine::from_config(config);
    if !algorithms.is_empty() {
        let resolved = HashRegistry::resolve(&algorithms)?;
        engine = engine.with_algorithms(resolved);
    }

    let result = if file == Path::new("-") {
        tokio::task::spawn_blocking(move || engine.digest_reader(std::io::stdin().lock(), "-"))
            .await
            .context("stdin hash worker")??
    } else {
        engine.hash_file(file).await
    };

    if json {
        println!("{}", report::digest_to_json(&result)?);
    } else {
        print!("{}", report::digest_to_plain_text(&result));
    }

    Ok(if result.is_failed() {
        ExitCode::from(2)
    } else {
        ExitCode::SUCCESS
    })
}

async fn compare(
    config: &DeltaConfig,
    first: &Path,
    second: &Path,
    force: bool,
    json: bool,
) -> Result<ExitCode> {
    let (engine, mut results) = CompareEngine::from_config(config)?;
    let algorithm = engine.short_circuit_algorithm();
    let hasher = HashEngine::from_config(config).with_algorithms(vec![algorithm]);
    let limit = engine.size_limit();

    // Oversized files are hashed (streamed) but never read into memory
    let (buffer_a, buffer_b, digest_a, digest_b) = tokio::join!(
        FileBuffer::load_within(first, limit),
        FileBuffer::load_within(second, limit),
        hasher.hash_file(first),
        hasher.hash_file(second),
    );
    let buffer_a = buffer_a.with_context(|| format!("loading {}", first.display()))?;
    let buffer_b = buffer_b.with_context(|| format!("loading {}", second.display()))?;
    let len_a = loaded_len(buffer_a.as_ref(), first).await?;
    let len_b = loaded_len(buffer_b.as_ref(), second).await?;

    if !json {
        print_side(FileSlot::First, first, len_a, &digest_a, algorithm);
        print_side(FileSlot::Second, second, len_b, &digest_b, algorithm);
    }

    let declined = buffer_a.is_none() || buffer_b.is_none();
    if let Some(buffer) = buffer_a {
        engine.set_buffer(FileSlot::First, buffer);
    }
    if let Some(buffer) = buffer_b {
        engine.set_buffer(FileSlot::Second, buffer);
    }
    if !force {
        engine.set_digests(FileSlot::First, digest_a);
        engine.set_digests(FileSlot::Second, digest_b);
    }

    if !json {
        match engine.digest_status() {
            DigestStatus::Match => println!("{}", "Digests match".green()),
            DigestStatus::Mismatch => println!("{}", "Digests differ".yellow()),
            DigestStatus::Failed => println!("{}", "Digest computation failed".red()),
            DigestStatus::Pending => {}
        }
    }

    let generation = if declined {
        let reason = engine.check_lengths(len_a, len_b).err().unwrap_or_else(|| {
            // A file grew past the limit between the size check and the read
            Disallowed::TooLarge {
                slot: if len_a > limit { FileSlot::First } else { FileSlot::Second },
                len: limit.saturating_add(1),
                limit,
            }
        });
        engine.decline(reason)
    } else {
        engine.compare_loaded()
    };

    let outcome = loop {
        let delivered = results
            .recv()
            .await
            .context("comparison engine stopped without a result")?;
        if delivered.generation == generation {
            break delivered;
        }
    };

    if json {
        println!("{}", report::comparison_to_json(&outcome)?);
    } else {
        print!("{}", report::comparison_to_plain_text(&outcome));
    }

    Ok(match outcome.outcome {
        ComparisonOutcome::Compared { ref offsets } if !offsets.is_empty() => ExitCode::from(1),
        ComparisonOutcome::Compared { .. } | ComparisonOutcome::ShortCircuited { .. } => {
            ExitCode::SUCCESS
        }
        ComparisonOutcome::Disallowed { .. } | ComparisonOutcome::Failed { .. } => ExitCode::from(2),
    })
}

async fn loaded_len(buffer: Option<&FileBuffer>, path: &Path) -> Result<u64> {
    match buffer {
        Some(buffer) => Ok(buffer.len() as u64),
        None => FileBuffer::file_len(path)
            .await
            .with_context(|| format!("inspecting {}", path.display())),
    }
}

fn print_side(slot: FileSlot, path: &Path, len: u64, digests: &DigestResult, algorithm: Algorithm) {
    let digest = match (digests.hex(algorithm), digests.error()) {
        (Some(hex), _) => hex.to_string(),
        (None, Some(err)) => err.lines().next().unwrap_or_default().red().to_string(),
        (None, None) => "-".to_string(),
    };
    println!(
        "{}: {} ({})",
        slot.to_string().bold(),
        path.display(),
        format_size(len, BINARY)
    );
    println!("  {}: {}", algorithm, digest);
}
