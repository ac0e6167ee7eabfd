use actimate::cli::{Cli, Commands, ConfigAction, ExportTarget, init_logging};
use actimate::config::Config;
use actimate::defaults;
use actimate::pipeline::{self, ExportOutcome};
use anyhow::{Context, Result, bail};
use clap::{CommandFactory, Parser};
use owo_colors::OwoColorize;
use std::path::{Path, PathBuf};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.quiet, cli.verbose);

    match &cli.command {
        #[cfg(feature = "sequence")]
        Commands::TrainSequence => {
            let config = load_config(&cli)?;
            let data = pipeline::prepare(&config)?;
            let run = pipeline::train_sequence(&config, &data)?;
            println!(
                "{} test accuracy {:.4}, loss {:.4}",
                "Sequence model:".bold(),
                run.outcome.test_accuracy,
                run.outcome.test_loss
            );
            if let Some(epoch) = run.outcome.best_epoch {
                println!("  restored weights from epoch {}", epoch);
            }
            print_exports(std::slice::from_ref(&run.export));
        }
        Commands::TrainClassical => {
            let config = load_config(&cli)?;
            let data = pipeline::prepare(&config)?;
            let run = pipeline::train_classical(&config, &data)?;
            for result in &run.results {
                println!(
                    "{} accuracy {:.4}",
                    format!("{}:", result.kind).bold(),
                    result.accuracy
                );
                if !cli.quiet {
                    println!("{}", result.report);
                }
            }
            print_exports(&run.exports);
        }
        Commands::Export { target } => {
            let config = load_config(&cli)?;
            let outcomes = match target {
                #[cfg(feature = "sequence")]
                ExportTarget::Sequence => vec![pipeline::export_sequence(&config)?],
                ExportTarget::Classical => pipeline::export_classical(&config)?,
            };
            print_exports(&outcomes);
            if outcomes.iter().all(|o| !o.is_ok()) {
                bail!("no model could be exported");
            }
        }
        Commands::Scan => {
            let config = load_config(&cli)?;
            let dataset = pipeline::scan(&config)?;
            let manifest = &dataset.manifest;
            let per_label = manifest.windows_per_label(config.dataset.activities.len());
            println!("Dataset: {}", manifest.root.display());
            for (activity, count) in config.dataset.activities.iter().zip(&per_label) {
                let samples = manifest
                    .loaded
                    .iter()
                    .filter(|r| &r.activity == activity)
                    .count();
                println!(
                    "  {:<12} {:>4} samples {:>6} windows",
                    activity, samples, count
                );
            }
            println!(
                "{} samples loaded, {} windows",
                manifest.loaded.len().green(),
                manifest.total_windows().green()
            );
            if !manifest.skipped.is_empty() {
                println!("{} samples skipped:", manifest.skipped.len().yellow());
                for skipped in &manifest.skipped {
                    println!(
                        "  {} {}",
                        skipped.path.display().dimmed(),
                        skipped.reason
                    );
                }
            }
        }
        Commands::Config { action } => handle_config_command(action, &cli)?,
        Commands::Completions { shell } => {
            clap_complete::generate(
                *shell,
                &mut Cli::command(),
                "actimate",
                &mut std::io::stdout(),
            );
        }
    }

    Ok(())
}

/// File (or `./actimate.toml`, or defaults), then env, then flags.
fn load_config(cli: &Cli) -> Result<Config> {
    let config = Config::resolve(cli.config.as_deref())?.with_env_overrides();
    let config = cli.apply_overrides(config);
    config.validate()?;
    Ok(config)
}

fn handle_config_command(action: &ConfigAction, cli: &Cli) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(cli)?;
            print!("{}", config.to_toml_string()?);
        }
        ConfigAction::Init { path, force } => {
            let path = path
                .clone()
                .unwrap_or_else(|| PathBuf::from(defaults::CONFIG_FILE));
            write_default_config(&path, *force)?;
            println!("{} {}", "Wrote".green(), path.display());
        }
    }
    Ok(())
}

fn write_default_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }
    let content = Config::default().to_toml_string()?;
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

fn print_exports(outcomes: &[ExportOutcome]) {
    for outcome in outcomes {
        match &outcome.result {
            Ok(path) => println!(
                "  {} {} → {}",
                "✓".green(),
                outcome.model,
                path.display()
            ),
            Err(e) => println!("  {} {}: {}", "✗".red(), outcome.model, e),
        }
    }
}
