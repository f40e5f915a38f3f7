//! Schema Regen CLI
//!
//! Inspect schema graphs and keep consumer code in step with regenerated
//! identifiers.
//!
//! Usage:
//!   schema-regen diff --old .regen/build-state.json --new out/build-state.json
//!   schema-regen apply --old prev.json --new next.json --root src --write
//!   schema-regen deref --source parsed.json --schema pkg.Node
//!   schema-regen generics --source parsed.json
//!   schema-regen cycles --source parsed.json

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use ignore::WalkBuilder;
use schema_regen::graph::recursive_groups;
use schema_regen::{
    diff, BuildState, Codemod, GenericPropagator, RefResolver, RegenConfig, SchemaRegistry, TextTree,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "schema-regen")]
#[command(about = "Schema graph resolution and stable-identity regeneration")]
struct Cli {
    /// Configuration file layered over regen.toml and the environment
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the renames between two build states
    Diff {
        /// Previous build state
        #[arg(long)]
        old: PathBuf,
        /// New build state
        #[arg(long)]
        new: PathBuf,
        #[arg(short, long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },

    /// Rewrite consumer sources for the renames between two build states
    Apply {
        /// Previous build state
        #[arg(long)]
        old: PathBuf,
        /// New build state
        #[arg(long)]
        new: PathBuf,
        /// Consumer source roots (default: codemod.roots from config)
        #[arg(short, long)]
        root: Vec<PathBuf>,
        /// Write files and the pruned build state instead of printing a diff
        #[arg(long)]
        write: bool,
    },

    /// Print fully dereferenced schemas
    Deref {
        /// Parsed source (JSON)
        #[arg(short, long)]
        source: PathBuf,
        /// Only this schema
        #[arg(long)]
        schema: Option<String>,
    },

    /// List the generic parameters each schema requires
    Generics {
        #[arg(short, long)]
        source: PathBuf,
    },

    /// Report recursive schema groups
    Cycles {
        #[arg(short, long)]
        source: PathBuf,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = RegenConfig::load_from(cli.config.as_deref()).context("loading configuration")?;

    match cli.command {
        Commands::Diff { old, new, format } => {
            let plan = diff(&read_state(&old)?, &read_state(&new)?);

            match format {
                Format::Json => println!("{}", serde_json::to_string_pretty(&plan.ops)?),
                Format::Text => {
                    if plan.is_empty() {
                        println!("No renames");
                    }
                    for op in &plan.ops {
                        println!(
                            "{:<10} {}: {} -> {} ({})",
                            op.section.to_string(), op.canonical_key, op.old_name, op.new_name, op.structural_kind
                        );
                    }
                }
            }
            if !plan.diagnostics.is_empty() {
                eprint!("{}", plan.diagnostics.format_all());
            }
            Ok(())
        }

        Commands::Apply { old, new, root, write } => {
            let previous = read_state(&old)?;
            let mut state = read_state(&new)?;
            let roots = if root.is_empty() { config.codemod.roots.clone() } else { root };

            let baseline = load_tree(&roots, &config.codemod.extensions)?;
            let mut tree = baseline.clone();

            let plan = diff(&previous, &state);
            let renames = Codemod::apply_renames(&plan.ops, &mut tree);
            println!(
                "{} renames, {} occurrences in {} files",
                plan.len(),
                renames.total(),
                renames.units.len()
            );

            if config.codemod.remove_unused {
                let orphans = Codemod::remove_unused(&mut tree, &mut state);
                for removed in &orphans.removed {
                    println!("removed {} ({})", removed.identifier, removed.canonical_key);
                }
            }

            if write && !config.codemod.dry_run {
                for (unit, text) in tree.changed_units(&baseline) {
                    fs::write(unit, text).with_context(|| format!("writing {}", unit.display()))?;
                }
                let state_path = config.state_path(&std::env::current_dir()?);
                if let Some(parent) = state_path.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(&state_path, state.to_json()?)
                    .with_context(|| format!("writing {}", state_path.display()))?;
                println!("build state written to {} ({})", state_path.display(), state.fingerprint()?.short());
            } else {
                print!("{}", tree.unified_diff(&baseline));
            }

            if !plan.diagnostics.is_empty() {
                eprint!("{}", plan.diagnostics.format_all());
            }
            Ok(())
        }

        Commands::Deref { source, schema } => {
            let registry = read_registry(&source)?;
            let mut resolver = RefResolver::new(&registry);

            match schema {
                Some(name) => {
                    let node = resolver.dereference(&name)?;
                    println!("{}", serde_json::to_string_pretty(&node)?);
                }
                None => {
                    let all = resolver.dereference_all();
                    println!("{}", serde_json::to_string_pretty(&all)?);
                }
            }

            let diagnostics = resolver.into_diagnostics();
            if !diagnostics.is_empty() {
                eprint!("{}", diagnostics.format_all());
            }
            Ok(())
        }

        Commands::Generics { source } => {
            let registry = read_registry(&source)?;
            let overrides = GenericPropagator::new(&registry).populate_all();

            for name in registry.names() {
                let requirements = overrides.distinct_requirements(name);
                if requirements.is_empty() {
                    continue;
                }
                let params: Vec<String> = requirements.iter().map(|r| r.to_string()).collect();
                println!("{}<{}>", name, params.join(", "));
            }
            Ok(())
        }

        Commands::Cycles { source } => {
            let registry = read_registry(&source)?;
            let groups = recursive_groups(&registry);

            if groups.is_empty() {
                println!("No recursive schemas");
            }
            for group in groups {
                let marker = if group.is_self_referential { " (self)" } else { "" };
                println!("{}{}", group.members.join(" -> "), marker);
            }
            Ok(())
        }
    }
}

fn read_state(path: &Path) -> Result<BuildState> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    BuildState::from_json(&raw).with_context(|| format!("parsing {}", path.display()))
}

fn read_registry(path: &Path) -> Result<SchemaRegistry> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    SchemaRegistry::from_json(&raw).with_context(|| format!("loading {}", path.display()))
}

fn load_tree(roots: &[PathBuf], extensions: &[String]) -> Result<TextTree> {
    let mut tree = TextTree::new();

    for root in roots {
        let walker = WalkBuilder::new(root).hidden(false).build();

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    tracing::warn!(root = %root.display(), error = %err, "skipping unreadable entry");
                    continue;
                }
            };
            let path = entry.path();
            if !path.is_file() || !has_extension(path, extensions) {
                continue;
            }
            let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
            tree.insert(path.to_path_buf(), text);
        }
    }

    tracing::info!(files = tree.len(), "consumer sources loaded");
    Ok(tree)
}

/// Whether `path` has one of `extensions`
fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| extensions.iter().any(|x| x == e))
        .unwrap_or(false)
}
