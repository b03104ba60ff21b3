//! Orthology inference CLI
//!
//! Loads a curated database snapshot, runs one species projection per target
//! config, writes the eligible/inferred report files, and optionally saves
//! the enriched snapshot back out.

use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use tracing::error;

use orthoinfer::species::{SpeciesConfig, SpeciesTag};
use orthoinfer::storage::{InMemoryStore, StoreDump};
use orthoinfer::{run_species, DbId};

/// CLI configuration
struct Config {
    /// Curated database snapshot (JSON)
    data: PathBuf,
    /// Target species config files, one run each
    targets: Vec<PathBuf>,
    /// Directory holding the homology mapping files
    homology_dir: PathBuf,
    /// Directory for the report files
    output_dir: PathBuf,
    /// Optional skip-list file, one reaction id per line
    skip_list: Option<PathBuf>,
    /// Source species display name
    source: String,
    /// Source species code used in homology file names
    source_code: String,
    /// Where to save the enriched snapshot, if anywhere
    save: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data: PathBuf::new(),
            targets: Vec::new(),
            homology_dir: PathBuf::from("homology"),
            output_dir: PathBuf::from("reports"),
            skip_list: None,
            source: "Homo sapiens".to_string(),
            source_code: "hsap".to_string(),
            save: None,
        }
    }
}

fn parse_args() -> Config {
    let args: Vec<String> = std::env::args().collect();
    let mut config = Config::default();

    let take_value = |args: &[String], i: usize, flag: &str| -> String {
        if i + 1 < args.len() {
            args[i + 1].clone()
        } else {
            eprintln!("error: {flag} requires a value");
            std::process::exit(1);
        }
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--data" | "-d" => {
                config.data = PathBuf::from(take_value(&args, i, "--data"));
                i += 2;
            }
            "--config" | "-c" => {
                config.targets.push(PathBuf::from(take_value(&args, i, "--config")));
                i += 2;
            }
            "--homology-dir" => {
                config.homology_dir = PathBuf::from(take_value(&args, i, "--homology-dir"));
                i += 2;
            }
            "--output" | "-o" => {
                config.output_dir = PathBuf::from(take_value(&args, i, "--output"));
                i += 2;
            }
            "--skip-list" => {
                config.skip_list = Some(PathBuf::from(take_value(&args, i, "--skip-list")));
                i += 2;
            }
            "--source" => {
                config.source = take_value(&args, i, "--source");
                i += 2;
            }
            "--source-code" => {
                config.source_code = take_value(&args, i, "--source-code");
                i += 2;
            }
            "--save" => {
                config.save = Some(PathBuf::from(take_value(&args, i, "--save")));
                i += 2;
            }
            "--help" | "-h" => {
                println!("orthoinfer - project curated reactions onto target species");
                println!();
                println!("USAGE:");
                println!("    orthoinfer --data <FILE> --config <FILE> [OPTIONS]");
                println!();
                println!("OPTIONS:");
                println!("    -d, --data <FILE>         Curated database snapshot (JSON)");
                println!("    -c, --config <FILE>       Target species config (repeatable)");
                println!("        --homology-dir <DIR>  Homology mapping files [default: homology]");
                println!("    -o, --output <DIR>        Report directory [default: reports]");
                println!("        --skip-list <FILE>    Reaction ids to skip, one per line");
                println!("        --source <NAME>       Source species [default: Homo sapiens]");
                println!("        --source-code <CODE>  Source species code [default: hsap]");
                println!("        --save <FILE>         Save the enriched snapshot as JSON");
                println!("    -h, --help                Print help information");
                std::process::exit(0);
            }
            arg => {
                eprintln!("error: unknown argument: {arg}");
                std::process::exit(1);
            }
        }
    }

    if config.data.as_os_str().is_empty() {
        eprintln!("error: --data is required");
        std::process::exit(1);
    }
    if config.targets.is_empty() {
        eprintln!("error: at least one --config is required");
        std::process::exit(1);
    }
    config
}

fn load_store(path: &PathBuf) -> Result<InMemoryStore, String> {
    let text = fs::read_to_string(path).map_err(|e| format!("read {}: {e}", path.display()))?;
    let dump: StoreDump =
        serde_json::from_str(&text).map_err(|e| format!("parse {}: {e}", path.display()))?;
    InMemoryStore::from_dump(dump).map_err(|e| format!("load {}: {e}", path.display()))
}

fn load_skip_list(path: &PathBuf) -> Result<HashSet<DbId>, String> {
    let text = fs::read_to_string(path).map_err(|e| format!("read {}: {e}", path.display()))?;
    let mut ids = HashSet::new();
    for (number, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let id: u64 = line.parse().map_err(|_| {
            format!("{}:{}: not a reaction id: {line}", path.display(), number + 1)
        })?;
        ids.insert(DbId(id));
    }
    Ok(ids)
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = parse_args();

    let store = match load_store(&config.data) {
        Ok(store) => store,
        Err(e) => {
            error!("{e}");
            return ExitCode::from(2);
        }
    };

    let skip_list = match &config.skip_list {
        None => HashSet::new(),
        Some(path) => match load_skip_list(path) {
            Ok(ids) => ids,
            Err(e) => {
                error!("{e}");
                return ExitCode::from(2);
            }
        },
    };

    if let Err(e) = fs::create_dir_all(&config.output_dir) {
        error!("create {}: {e}", config.output_dir.display());
        return ExitCode::from(2);
    }

    let source = SpeciesTag::new(config.source.clone());
    for target_path in &config.targets {
        let target = match SpeciesConfig::load(target_path) {
            Ok(target) => target,
            Err(e) => {
                error!("{e}");
                return ExitCode::from(2);
            }
        };
        let name = target.name.clone();

        match run_species(
            &store,
            source.clone(),
            &config.source_code,
            target,
            &config.homology_dir,
            skip_list.clone(),
            &config.output_dir,
        ) {
            Ok(outcome) => {
                let summary = outcome.report.summary();
                println!(
                    "{name}: {} of {} eligible reactions inferred ({}%)",
                    summary.inferred, summary.eligible, summary.percent
                );
            }
            Err(e) => {
                error!("{name}: {e}");
                return ExitCode::from(2);
            }
        }
    }

    if let Some(path) = &config.save {
        let dump = match store.to_dump() {
            Ok(dump) => dump,
            Err(e) => {
                error!("snapshot: {e}");
                return ExitCode::from(2);
            }
        };
        let json = match serde_json::to_string_pretty(&dump) {
            Ok(json) => json,
            Err(e) => {
                error!("serialize snapshot: {e}");
                return ExitCode::from(2);
            }
        };
        if let Err(e) = fs::write(path, json) {
            error!("write {}: {e}", path.display());
            return ExitCode::from(2);
        }
    }

    ExitCode::SUCCESS
}
