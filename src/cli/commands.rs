//! Command dispatch: one handler per subcommand
//!
//! Handlers return the process exit code on success; failures are `CliError`s
//! whose exit code is chosen by `CliError::exit_code`.

use std::io;
use std::path::{Path, PathBuf};

use clap::CommandFactory;
use clap_complete::generate;
use itertools::Itertools;
use tracing::{debug, instrument};

use crate::application::services::PairVerdict;
use crate::application::{IoResultExt, TreeSet, TreeSource};
use crate::cli::args::{Cli, Commands, ConfigCommands, ExportFormat};
use crate::cli::output;
use crate::cli::{CliError, CliResult};
use crate::config::{global_config_path, local_config_path, Settings};
use crate::domain::MergeReport;
use crate::exitcode;
use crate::infrastructure::di::ServiceContainer;
use crate::infrastructure::document::DocumentFormat;
use crate::tree_traits::TreeNodeConvert;

/// Load settings from the working directory and apply CLI overrides.
pub fn load_settings(cli: &Cli) -> CliResult<Settings> {
    let cwd = std::env::current_dir().ok();
    let mut settings = Settings::load(cwd.as_deref())?;
    if let Some(resolution) = cli.resolution {
        settings.boundary_resolution = resolution;
    }
    if cli.no_validate {
        settings.validate_trees = false;
    }
    debug!(?settings, "effective settings");
    Ok(settings)
}

pub fn execute_command(cli: &Cli) -> CliResult<i32> {
    // Completion and config templates must work without a readable config
    match &cli.command {
        Commands::Completion { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(*shell, &mut cmd, name, &mut io::stdout());
            return Ok(exitcode::OK);
        }
        Commands::Config {
            command: ConfigCommands::Path,
        } => return config_path(),
        Commands::Config {
            command: ConfigCommands::Init { global },
        } => return config_init(*global),
        _ => {}
    }

    let container = ServiceContainer::new(load_settings(cli)?);
    match &cli.command {
        Commands::Check { p, q, explain } => check(&container, p, q, *explain),
        Commands::Pairs { set1, set2, all } => pairs(&container, set1, set2, *all),
        Commands::Show { source } => show(&container, source),
        Commands::Import { files, db } => import(&container, files, db.as_deref()),
        Commands::Export { source, format } => export(&container, source, *format),
        Commands::List { db } => list(&container, db.as_deref()),
        Commands::Rename { source, name } => rename(&container, source, name.as_deref()),
        Commands::Config {
            command: ConfigCommands::Show,
        } => config_show(&container.settings),
        Commands::Completion { .. } | Commands::Config { .. } => Ok(exitcode::OK),
    }
}

fn parse_source(container: &ServiceContainer, raw: &str) -> CliResult<TreeSource> {
    Ok(TreeSource::parse(raw, container.settings.database.as_deref())?)
}

fn database_or_default<'a>(container: &'a ServiceContainer, db: Option<&'a Path>) -> CliResult<&'a Path> {
    db.or(container.settings.database.as_deref()).ok_or_else(|| {
        CliError::Usage("no database given and none configured (set `database` in the config)".into())
    })
}

#[instrument(skip(container))]
fn check(container: &ServiceContainer, p: &str, q: &str, explain: bool) -> CliResult<i32> {
    let p_tree = container.loader.load(&parse_source(container, p)?)?;
    let q_tree = container.loader.load(&parse_source(container, q)?)?;

    let compatible = if explain {
        let report = container.compare.check_pair(&p_tree, &q_tree)?;
        print_report(&report);
        report.compatible
    } else {
        container.compare.is_compatible(&p_tree, &q_tree)?
    };

    if compatible {
        output::success(&format!("{q} is compatible with {p}"));
        Ok(exitcode::OK)
    } else {
        output::negative(&format!("{q} is not compatible with {p}"));
        Ok(exitcode::INCOMPATIBLE)
    }
}

fn print_report(report: &MergeReport) {
    output::header("Placement of each node");
    for verdict in &report.nodes {
        let target = verdict.placed_at.as_deref().unwrap_or("-");
        let line = format!(
            "{} ({} events) -> {}",
            verdict.name, verdict.implied_events, target
        );
        if verdict.placement.is_explained() {
            output::success_detail(&line);
        } else {
            output::failure(&line);
            if !verdict.placement.leftover.is_empty() {
                output::field(
                    "leftover",
                    &verdict.placement.leftover.iter().join(", "),
                );
            }
        }
        if verdict.placement.ambiguous {
            output::field(
                "ambiguous",
                &format!("{} child subclones accept it", verdict.placement.placeable_children),
            );
        }
    }
}

#[instrument(skip(container))]
fn pairs(container: &ServiceContainer, set1: &Path, set2: &Path, all: bool) -> CliResult<i32> {
    let p_set = container.loader.load_set(&TreeSet::from_path(set1)?)?;
    let q_set = container.loader.load_set(&TreeSet::from_path(set2)?)?;
    if p_set.is_empty() || q_set.is_empty() {
        output::warning("a tree set is empty, nothing to compare");
    }

    let verdicts = container.compare.compare_sets(&p_set, &q_set)?;
    for PairVerdict { p, q, compatible } in &verdicts {
        if *compatible {
            output::info(&format!("{p}\t{q}"));
        } else if all {
            output::info(&format!("{p}\t{q}\tincompatible"));
        }
    }
    Ok(exitcode::OK)
}

fn show(container: &ServiceContainer, source: &str) -> CliResult<i32> {
    let tree = container.loader.load(&parse_source(container, source)?)?;
    if let Some(name) = &tree.name {
        output::header(name);
    }
    output::info(&tree.to_tree_string());
    output::field("subclones", &tree.len());
    output::field("events", &tree.event_count());
    output::field("depth", &tree.depth());
    output::field("leaves", &tree.leaf_nodes().len());
    Ok(exitcode::OK)
}

fn import(container: &ServiceContainer, files: &[PathBuf], db: Option<&Path>) -> CliResult<i32> {
    let db = database_or_default(container, db)?;
    for (path, id) in container.archive.import(files, db)? {
        output::action("Imported", &format!("{} -> {}#{}", path.display(), db.display(), id));
    }
    Ok(exitcode::OK)
}

fn export(container: &ServiceContainer, source: &str, format: ExportFormat) -> CliResult<i32> {
    let format = match format {
        ExportFormat::Toml => DocumentFormat::Toml,
        ExportFormat::Json => DocumentFormat::Json,
    };
    let document = container
        .archive
        .export(&parse_source(container, source)?, format)?;
    output::info(document.trim_end());
    Ok(exitcode::OK)
}

fn list(container: &ServiceContainer, db: Option<&Path>) -> CliResult<i32> {
    let db = database_or_default(container, db)?;
    let store = container.loader.open_store(db)?;
    for id in store.tree_ids()? {
        let tree = store.load_tree(id)?;
        output::info(&format!(
            "{}\t{}\t{} subclones",
            id,
            tree.name.as_deref().unwrap_or("-"),
            tree.len()
        ));
    }
    Ok(exitcode::OK)
}

fn rename(container: &ServiceContainer, source: &str, name: Option<&str>) -> CliResult<i32> {
    let TreeSource::Database { path, id } = parse_source(container, source)? else {
        return Err(CliError::InvalidArgs(format!(
            "{source}: only database trees (<db>#<id>) can be renamed"
        )));
    };
    container.archive.rename(&path, id, name)?;
    output::action("Renamed", &format!("{}#{} -> {}", path.display(), id, name.unwrap_or("-")));
    Ok(exitcode::OK)
}

fn config_show(settings: &Settings) -> CliResult<i32> {
    output::info(settings.to_toml()?.trim_end());
    Ok(exitcode::OK)
}

fn config_path() -> CliResult<i32> {
    let describe = |path: &Path| {
        let state = if path.exists() { "exists" } else { "not found" };
        format!("{} ({state})", path.display())
    };
    match global_config_path() {
        Some(path) => output::field("global", &describe(&path)),
        None => output::field("global", "no config directory on this platform"),
    }
    let cwd = std::env::current_dir().with_path_context("resolve", Path::new("."))?;
    output::field("local", &describe(&local_config_path(&cwd)));
    Ok(exitcode::OK)
}

fn config_init(global: bool) -> CliResult<i32> {
    let path = if global {
        global_config_path()
            .ok_or_else(|| CliError::Usage("no config directory on this platform".into()))?
    } else {
        let cwd = std::env::current_dir().with_path_context("resolve", Path::new("."))?;
        local_config_path(&cwd)
    };
    if path.exists() {
        output::warning(&format!("{} already exists, left unchanged", path.display()));
        return Ok(exitcode::OK);
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).with_path_context("create directory", parent)?;
    }
    std::fs::write(&path, Settings::template()).with_path_context("write config", &path)?;
    output::action("Created", &path.display());
    Ok(exitcode::OK)
}
