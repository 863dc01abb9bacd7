use anyhow::{Context, Result, bail};
use clap::{CommandFactory, Parser};
use korspeech::aggregate::{aggregate_all, write_aggregated};
use korspeech::batching::{BatchPlanner, ConcatPlan, Split};
use korspeech::cli::{Cli, Commands, ConfigAction};
use korspeech::config::Config;
use korspeech::dialect::{Dialect, TranscriptFormat};
use korspeech::length_oracle::CorpusDataset;
use korspeech::normalizer::{NormalizeReport, Normalizer};
use owo_colors::OwoColorize;
use serde::Serialize;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.quiet, cli.verbose);
    tracing::debug!(version = %korspeech::version_string(), "korspeech starting");

    match cli.command {
        Commands::Normalize {
            dialect,
            input,
            raw,
            seed,
            stats,
        } => {
            let config = load_config(cli.config.as_deref())?;
            let dialect = resolve_dialect(&config, dialect.as_deref(), seed)?;
            handle_normalize(dialect, input.as_deref(), raw, stats && !cli.quiet)?;
        }
        Commands::Aggregate {
            dialect,
            output,
            seed,
            indexes,
        } => {
            let config = load_config(cli.config.as_deref())?;
            let dialect = resolve_dialect(&config, dialect.as_deref(), seed)?;
            let datasets = load_datasets(&dialect, &indexes)?;
            let transcripts = aggregate_all(&datasets)?;
            write_aggregated(&output, &transcripts)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            if !cli.quiet {
                println!(
                    "Wrote {} transcripts to {}",
                    transcripts.len().bold(),
                    output.display()
                );
            }
        }
        Commands::Batches {
            dialect,
            split,
            max_tokens,
            num_buckets,
            batch_size,
            shuffle,
            seed,
            json,
            indexes,
        } => {
            let mut config = load_config(cli.config.as_deref())?;
            if let Some(max_tokens) = max_tokens {
                config.batching.max_tokens = max_tokens;
            }
            if batch_size.is_some() {
                config.batching.batch_size = batch_size;
            }
            if seed.is_some() {
                config.batching.seed = seed;
            }

            let dialect = resolve_dialect(&config, dialect.as_deref(), config.batching.seed)?;
            let indexes = if indexes.is_empty() {
                split_indexes(&config, split)
            } else {
                indexes
            };
            if indexes.is_empty() {
                bail!("No index files given and none configured for the {split} split");
            }

            let mut options = config.batching.options(split);
            if let Some(num_buckets) = num_buckets {
                options.num_buckets = num_buckets;
            }
            options.shuffle = shuffle;

            let mut planner = BatchPlanner::new(config.batching.clone());
            for dataset in load_datasets(&dialect, &indexes)? {
                planner.add_dataset(split, dataset);
            }
            let plan = planner.plan_with(split, &options)?;
            let lengths = planner.lengths(split)?.to_vec();
            let order = plan.epoch_order(
                config.batching.shuffles_batches(split),
                &mut config.batching.rng(),
            );

            if json {
                print_batches_json(split, &plan, &order, &lengths)?;
            } else {
                print_batches(&plan, &order, &lengths, &indexes, cli.quiet);
            }
        }
        Commands::Dialects => {
            let config = load_config(cli.config.as_deref())?;
            list_dialects(&config)?;
        }
        Commands::Config { action } => {
            handle_config_command(action, cli.config.as_deref())?;
        }
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "korspeech", &mut std::io::stdout());
        }
    }

    Ok(())
}

/// Install the stderr log subscriber. `RUST_LOG` wins over the flags.
fn init_tracing(quiet: bool, verbose: u8) {
    let level = if quiet {
        "warn"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("korspeech={level}"))),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Load configuration from file or use defaults.
///
/// Priority order:
/// 1. Custom config path from CLI (--config)
/// 2. Default config path (~/.config/korspeech/config.toml)
/// 3. Built-in defaults with environment variable overrides
fn load_config(custom_path: Option<&Path>) -> Result<Config> {
    let config = if let Some(path) = custom_path {
        Config::load(path).with_context(|| format!("Failed to load config from {}", path.display()))?
    } else if let Some(default_path) = Config::default_path() {
        Config::load_or_default(&default_path)
            .with_context(|| format!("Failed to load config from {}", default_path.display()))?
    } else {
        Config::default()
    };

    Ok(config.with_env_overrides())
}

fn resolve_dialect(config: &Config, name: Option<&str>, seed: Option<u64>) -> Result<Dialect> {
    let name = name.unwrap_or(&config.corpus.dialect);
    let dialect = config.resolve_dialect(name)?;
    Ok(match seed {
        Some(seed) => dialect.with_seed(seed),
        None => dialect,
    })
}

fn split_indexes(config: &Config, split: Split) -> Vec<PathBuf> {
    match split {
        Split::Train => config.corpus.train_index.clone(),
        Split::Valid => config.corpus.valid_index.clone(),
    }
}

/// One dataset per index file, in argument order.
fn load_datasets(dialect: &Dialect, indexes: &[PathBuf]) -> Result<Vec<CorpusDataset>> {
    indexes
        .iter()
        .map(|path| {
            CorpusDataset::from_index_files(dialect.clone(), &[path])
                .with_context(|| format!("Failed to read transcript index {}", path.display()))
        })
        .collect()
}

fn handle_normalize(dialect: Dialect, input: Option<&Path>, raw: bool, stats: bool) -> Result<()> {
    let reader: Box<dyn BufRead> = match input {
        Some(path) => Box::new(BufReader::new(
            std::fs::File::open(path).with_context(|| format!("Failed to open {}", path.display()))?,
        )),
        None => Box::new(BufReader::new(std::io::stdin())),
    };

    let mut transcripts = Vec::new();
    let mut invalid = 0usize;
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if raw {
            transcripts.push(line);
            continue;
        }
        match dialect.format.split_record(&line) {
            Ok(Some((_, text))) => transcripts.push(text),
            Ok(None) => {}
            Err(message) => {
                invalid += 1;
                tracing::warn!(line = i + 1, %message, "skipping malformed record");
            }
        }
    }

    let mut normalizer = Normalizer::new(dialect);
    let report = normalizer.normalize_all(&transcripts);
    for text in &report.accepted {
        println!("{}", text);
    }

    if stats {
        print_report(&report, invalid);
    }
    Ok(())
}

fn print_report(report: &NormalizeReport, invalid: usize) {
    eprintln!(
        "{} accepted, {} rejected of {} transcripts",
        report.accepted.len().green(),
        report.rejected_total().yellow(),
        report.total()
    );
    for (reason, count) in &report.rejected {
        eprintln!("  {:<22} {}", reason, count);
    }
    if invalid > 0 {
        eprintln!("  {:<22} {}", "malformed-record".red(), invalid);
    }
}

#[derive(Serialize)]
struct BatchOutput<'a> {
    dataset: usize,
    tokens: usize,
    samples: &'a [usize],
}

#[derive(Serialize)]
struct PlanOutput<'a> {
    split: Split,
    batches: Vec<BatchOutput<'a>>,
}

fn batch_tokens(samples: &[usize], lengths: &[usize]) -> usize {
    samples.iter().filter_map(|&i| lengths.get(i)).sum()
}

fn ordered_batches<'a>(
    plan: &'a ConcatPlan,
    order: &[usize],
    lengths: &[Vec<usize>],
) -> Vec<BatchOutput<'a>> {
    order
        .iter()
        .filter_map(|&position| plan.get(position))
        .map(|batch| BatchOutput {
            dataset: batch.dataset,
            tokens: lengths
                .get(batch.dataset)
                .map_or(0, |l| batch_tokens(batch.samples, l)),
            samples: batch.samples,
        })
        .collect()
}

fn print_batches_json(
    split: Split,
    plan: &ConcatPlan,
    order: &[usize],
    lengths: &[Vec<usize>],
) -> Result<()> {
    let output = PlanOutput {
        split,
        batches: ordered_batches(plan, order, lengths),
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn print_batches(
    plan: &ConcatPlan,
    order: &[usize],
    lengths: &[Vec<usize>],
    indexes: &[PathBuf],
    quiet: bool,
) {
    let batches = ordered_batches(plan, order, lengths);
    for (position, batch) in batches.iter().enumerate() {
        println!(
            "{:>5}  {:>3}  {:>6}  {:?}",
            position,
            batch.dataset,
            batch.tokens,
            batch.samples
        );
    }

    if !quiet {
        let samples: usize = batches.iter().map(|b| b.samples.len()).sum();
        eprintln!(
            "{} batches, {} samples from {} index file(s)",
            batches.len().bold(),
            samples,
            indexes.len()
        );
    }
}

fn list_dialects(config: &Config) -> Result<()> {
    for name in config.dialect_names() {
        let dialect = config.resolve_dialect(&name)?;
        let layout = match &dialect.format {
            TranscriptFormat::Delimited { separator, .. } => format!("delimited {:?}", separator),
            TranscriptFormat::JsonLines { text_path, .. } => format!("json-lines .{}", text_path),
        };
        let origin = if config.dialects.contains_key(&name) {
            "configured".cyan().to_string()
        } else {
            "built-in".dimmed().to_string()
        };
        let lengths = if dialect.length_supported {
            "lengths".green().to_string()
        } else {
            "no lengths".yellow().to_string()
        };
        println!("{:<12} {:<24} {:<10} {}", name.bold(), layout, origin, lengths);
    }
    Ok(())
}

/// Handle configuration commands.
fn handle_config_command(action: ConfigAction, custom_path: Option<&Path>) -> Result<()> {
    match action {
        ConfigAction::Path => {
            let path = custom_path
                .map(Path::to_path_buf)
                .or_else(Config::default_path)
                .context("Could not determine config directory")?;
            println!("{}", path.display());
        }
        ConfigAction::Show => {
            let config = load_config(custom_path)?;
            print!("{}", toml::to_string_pretty(&config)?);
        }
    }
    Ok(())
}
