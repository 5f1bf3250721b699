use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, ValueEnum, error::ErrorKind};

use crate::builder::IncrementalBuilder;
use crate::config::BuilderConfig;
use crate::constants::fields;
use crate::constants::file_store::DEFAULT_STORE_DIR;
use crate::metrics::RunSummary;
use crate::properties::{OrbitalKind, PropertyKind, VibrationKind};
use crate::store::{FileStore, Store};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum PropertyArg {
    Orbitals,
    Vibrations,
}

#[derive(Debug, Parser)]
#[command(
    name = "build_properties",
    disable_help_subcommand = true,
    about = "Incrementally build derived molecule properties",
    long_about = "Select the best calculation per molecule and solvent, build the derived property document, and upsert it into the target store. Molecules already present in the target store are skipped.",
    after_help = "Store files default to <store-dir>/<name>.bin. Set RUST_LOG=info (or debug) for progress output."
)]
/// CLI for `build_properties`.
///
/// Common usage:
/// - Build orbitals with default store locations: `--property orbitals`
/// - Point at explicit files: `--tasks /data/tasks.bin --molecules /data/molecules.bin`
/// - Print 4 worker filters without building: `--prechunk 4 --dry-run`
/// - Build with 4 parallel chunks: `--prechunk 4`
struct PropertyBuildCli {
    #[arg(
        long,
        value_enum,
        default_value = "orbitals",
        help = "Derived property to build"
    )]
    property: PropertyArg,
    #[arg(
        long = "store-dir",
        value_name = "DIR",
        help = "Directory holding store files that are not given explicitly"
    )]
    store_dir: Option<PathBuf>,
    #[arg(long, value_name = "PATH", help = "Task store file")]
    tasks: Option<PathBuf>,
    #[arg(long, value_name = "PATH", help = "Molecule store file")]
    molecules: Option<PathBuf>,
    #[arg(
        long,
        value_name = "PATH",
        help = "Target property store file (defaults to <store-dir>/<property>.bin)"
    )]
    target: Option<PathBuf>,
    #[arg(long, value_name = "PATH", help = "Optional JSON builder configuration")]
    config: Option<PathBuf>,
    #[arg(
        long,
        value_name = "N",
        value_parser = parse_positive_usize,
        help = "Split pending formulas into N disjoint chunks"
    )]
    prechunk: Option<usize>,
    #[arg(
        long = "dry-run",
        requires = "prechunk",
        help = "Print the chunk filters as JSON and exit without building"
    )]
    dry_run: bool,
}

struct OpenedStores {
    tasks: Arc<dyn Store>,
    molecules: Arc<dyn Store>,
    target: Arc<dyn Store>,
}

/// Run the property builder CLI over file-backed stores.
///
/// `args_iter` excludes the program name.
pub fn run_property_build<I>(args_iter: I) -> Result<(), Box<dyn Error>>
where
    I: Iterator<Item = String>,
{
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let Some(cli) = parse_cli::<PropertyBuildCli, _>(
        std::iter::once("build_properties".to_string()).chain(args_iter),
    )?
    else {
        return Ok(());
    };

    let config = match &cli.config {
        Some(path) => BuilderConfig::from_json_path(path)?,
        None => BuilderConfig::default(),
    };

    match cli.property {
        PropertyArg::Orbitals => run_kind(OrbitalKind, &cli, config),
        PropertyArg::Vibrations => run_kind(VibrationKind, &cli, config),
    }
}

fn run_kind<K>(
    kind: K,
    cli: &PropertyBuildCli,
    config: BuilderConfig,
) -> Result<(), Box<dyn Error>>
where
    K: PropertyKind + Clone,
{
    let stores = open_stores(cli, kind.property_name())?;
    println!("Building {} into {}", kind.property_name(), stores.target.name());
    let builder = IncrementalBuilder::new(
        kind,
        stores.tasks,
        stores.molecules,
        stores.target,
        config,
    )?;

    let summary = match cli.prechunk {
        Some(splits) if cli.dry_run => {
            let chunks = builder.prechunk(splits)?;
            println!("=== {} chunk filters ===", chunks.len());
            for chunk in chunks {
                println!("{}", chunk.to_json());
            }
            return Ok(());
        }
        Some(splits) => builder.run_partitioned(splits)?,
        None => builder.run()?,
    };
    print_summary(&summary);
    Ok(())
}

fn open_stores(
    cli: &PropertyBuildCli,
    property_name: &str,
) -> Result<OpenedStores, Box<dyn Error>> {
    let dir = cli
        .store_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_DIR));
    let resolve = |explicit: &Option<PathBuf>, name: &str| -> PathBuf {
        explicit
            .clone()
            .unwrap_or_else(|| FileStore::default_path_in_dir(&dir, name))
    };
    let tasks = open_file_store(&resolve(&cli.tasks, "tasks"), "tasks", fields::TASK_ID)?;
    let molecules = open_file_store(
        &resolve(&cli.molecules, "molecules"),
        "molecules",
        fields::MOLECULE_ID,
    )?;
    let target = open_file_store(
        &resolve(&cli.target, property_name),
        property_name,
        fields::PROPERTY_ID,
    )?;
    Ok(OpenedStores {
        tasks,
        molecules,
        target,
    })
}

fn open_file_store(
    path: &Path,
    name: &str,
    key: &str,
) -> Result<Arc<dyn Store>, Box<dyn Error>> {
    let store = FileStore::open(path, name, key)?;
    println!("Opened {name} store at {}", store.path().display());
    Ok(Arc::new(store))
}

fn print_summary(summary: &RunSummary) {
    println!("=== build summary ===");
    if let Some(stamp) = summary.build_timestamp {
        println!("build timestamp   : {}", stamp.to_rfc3339());
    }
    println!("pending groups    : {}", summary.pending_groups);
    println!("processed groups  : {}", summary.processed_groups);
    println!("empty groups      : {}", summary.empty_groups);
    println!("failed groups     : {}", summary.failed_groups.len());
    println!("documents written : {}", summary.documents_written);
    for (solvent, count) in &summary.per_solvent {
        println!("  {solvent}: {count}");
    }
    for (group, reason) in &summary.failed_groups {
        println!("  failed {group}: {reason}");
    }
}

fn parse_positive_usize(raw: &str) -> Result<usize, String> {
    let parsed = raw
        .parse::<usize>()
        .map_err(|_| format!("Could not parse '{raw}' as a positive integer"))?;
    if parsed == 0 {
        return Err("value must be greater than zero".to_string());
    }
    Ok(parsed)
}

fn parse_cli<T, I>(args: I) -> Result<Option<T>, Box<dyn Error>>
where
    T: Parser,
    I: IntoIterator,
    I::Item: Into<std::ffi::OsString> + Clone,
{
    match T::try_parse_from(args) {
        Ok(cli) => Ok(Some(cli)),
        Err(err) => match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                err.print()?;
                Ok(None)
            }
            _ => Err(err.into()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Criteria;
    use serde_json::json;
    use tempfile::tempdir;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn cli_defaults_to_orbitals_and_rejects_zero_chunks() {
        let cli = parse_cli::<PropertyBuildCli, _>(args(&["build_properties"]))
            .unwrap()
            .unwrap();
        assert_eq!(cli.property, PropertyArg::Orbitals);
        assert!(cli.prechunk.is_none());

        assert!(
            parse_cli::<PropertyBuildCli, _>(args(&["build_properties", "--prechunk", "0"]))
                .is_err()
        );
        assert!(
            parse_cli::<PropertyBuildCli, _>(args(&["build_properties", "--dry-run"])).is_err()
        );
    }

    #[test]
    fn help_exits_cleanly() {
        assert!(run_property_build(args(&["--help"]).into_iter()).is_ok());
    }

    #[test]
    fn cli_builds_into_file_stores() {
        let dir = tempdir().unwrap();
        {
            let molecules = FileStore::open(dir.path(), "molecules", "molecule_id").unwrap();
            molecules
                .update(
                    vec![
                        json!({
                            "molecule_id": "m1",
                            "formula_alphabetical": "H2 O1",
                            "charge": 0,
                            "spin_multiplicity": 1,
                            "deprecated": false,
                            "entries": [{
                                "task_id": 3,
                                "charge": 0,
                                "spin_multiplicity": 1,
                                "level_of_theory": "wB97X-V/def2-TZVPPD/VACUUM",
                                "solvent": "NONE",
                                "energy": -76.4,
                                "output": { "frequencies": [-120.0, 1600.0, 3700.0] }
                            }]
                        })
                        .as_object()
                        .cloned()
                        .unwrap(),
                    ],
                    &["molecule_id"],
                )
                .unwrap();
            let tasks = FileStore::open(dir.path(), "tasks", "task_id").unwrap();
            tasks
                .update(
                    vec![
                        crate::properties::fixtures::task_json(json!(3), "NONE")
                            .as_object()
                            .cloned()
                            .unwrap(),
                    ],
                    &["task_id"],
                )
                .unwrap();
        }

        let store_dir = dir.path().to_string_lossy().to_string();
        run_property_build(
            args(&["--property", "vibrations", "--store-dir", &store_dir]).into_iter(),
        )
        .unwrap();
        run_property_build(
            args(&[
                "--property",
                "vibrations",
                "--store-dir",
                &store_dir,
                "--prechunk",
                "2",
                "--dry-run",
            ])
            .into_iter(),
        )
        .unwrap();

        let target = FileStore::open(dir.path(), "vibrations", "property_id").unwrap();
        let docs = target.query(&Criteria::new(), None).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0]["property_id"], json!("m1-vibrations-NONE"));
    }
}
