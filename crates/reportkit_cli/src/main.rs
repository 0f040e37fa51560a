//! reportkit CLI - build XLSX reports from action queues and decompile them back

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use polars::prelude::{DataFrame, IpcReader, SerReader};

use reportkit_blueprint::{BlueprintExtractor, SpecBlueprintHints, SpecBlueprintScript};
use reportkit_xlsx::{
    ActionQueue, ColumnDictionary, DatasetRegistry, SpecReportConfig, generate_report,
};

#[derive(Parser)]
#[command(name = "reportkit")]
#[command(author, version, about = "Declarative XLSX report builder and decompiler")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay an action queue into an XLSX report
    Build {
        /// Actions JSON: an array of actions or a decompiled script
        actions: PathBuf,

        /// Output workbook
        #[arg(short, long)]
        output: PathBuf,

        /// Config JSON (component -> key -> value); overrides a script's config
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Column dictionary as an Arrow IPC file
        #[arg(long)]
        dictionary: Option<PathBuf>,

        /// Dataset as NAME=PATH to an Arrow IPC file; repeatable
        #[arg(short, long = "dataset", value_name = "NAME=PATH")]
        datasets: Vec<String>,
    },

    /// Turn an existing workbook into a rebuild script
    Decompile {
        /// Input workbook
        input: PathBuf,

        /// Hints JSON
        #[arg(long)]
        hints: Option<PathBuf>,

        /// Emit JSON (config + actions) instead of the readable listing
        #[arg(long)]
        json: bool,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Build {
            actions,
            output,
            config,
            dictionary,
            datasets,
        } => build(&actions, &output, config.as_deref(), dictionary.as_deref(), &datasets),
        Commands::Decompile {
            input,
            hints,
            json,
            output,
        } => decompile(&input, hints.as_deref(), json, output.as_deref()),
    }
}

fn build(
    actions_path: &Path,
    output: &Path,
    config_path: Option<&Path>,
    dictionary_path: Option<&Path>,
    datasets: &[String],
) -> Result<()> {
    let c_actions = fs::read_to_string(actions_path)
        .with_context(|| format!("Failed to read '{}'", actions_path.display()))?;
    let (config_script, queue) = parse_actions(&c_actions)
        .with_context(|| format!("Failed to parse actions in '{}'", actions_path.display()))?;

    let config = match config_path {
        Some(path) => {
            let c_config = fs::read_to_string(path)
                .with_context(|| format!("Failed to read '{}'", path.display()))?;
            SpecReportConfig::from_json_str(&c_config)
                .with_context(|| format!("Failed to parse config '{}'", path.display()))?
        }
        None => config_script.unwrap_or_default(),
    };

    let dictionary = match dictionary_path {
        Some(path) => Some(
            ColumnDictionary::from_dataframe(&read_ipc(path)?)
                .with_context(|| format!("Invalid column dictionary '{}'", path.display()))?,
        ),
        None => None,
    };

    let mut registry = DatasetRegistry::new();
    for c_spec in datasets {
        let Some((c_name, c_path)) = c_spec.split_once('=') else {
            bail!("Dataset '{c_spec}' must be NAME=PATH");
        };
        registry.insert(c_name.to_string(), read_ipc(Path::new(c_path))?);
    }

    let report = generate_report(output, config, dictionary, &registry, queue.as_slice())
        .with_context(|| format!("Failed to build '{}'", output.display()))?;
    for c_warning in &report.warnings {
        eprintln!("Warning: {c_warning}");
    }
    eprintln!(
        "Wrote {} ({} sheets, {} actions)",
        output.display(),
        report.sheets.len(),
        queue.len()
    );
    Ok(())
}

/// Accept either a decompiled script or a bare action array.
fn parse_actions(text: &str) -> Result<(Option<SpecReportConfig>, ActionQueue)> {
    if let Ok(script) = SpecBlueprintScript::from_json_str(text) {
        return Ok((Some(script.config), script.actions));
    }
    Ok((None, ActionQueue::from_json_str(text)?))
}

fn read_ipc(path: &Path) -> Result<DataFrame> {
    let file = File::open(path).with_context(|| format!("Failed to open '{}'", path.display()))?;
    IpcReader::new(file)
        .finish()
        .with_context(|| format!("Failed to read IPC file '{}'", path.display()))
}

fn decompile(input: &Path, hints_path: Option<&Path>, json: bool, output: Option<&Path>) -> Result<()> {
    let hints = match hints_path {
        Some(path) => {
            let c_hints = fs::read_to_string(path)
                .with_context(|| format!("Failed to read '{}'", path.display()))?;
            SpecBlueprintHints::from_json_str(&c_hints)
                .with_context(|| format!("Failed to parse hints '{}'", path.display()))?
        }
        None => SpecBlueprintHints::default(),
    };

    let extractor = BlueprintExtractor::from_path(input, hints)
        .with_context(|| format!("Failed to open '{}'", input.display()))?;
    let script = extractor.generate_script().context("Failed to decompile workbook")?;
    let c_out = if json {
        script.to_json_string()?
    } else {
        script.render_script()
    };

    match output {
        Some(path) => {
            fs::write(path, c_out).with_context(|| format!("Failed to write '{}'", path.display()))?;
            eprintln!("Detected theme {}; wrote {}", script.theme, path.display());
        }
        None => print!("{c_out}"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_actions_accepts_array_and_script() {
        let (config, queue) =
            parse_actions(r#"[{"verb": "add_title", "params": {"text": "Hi"}}]"#).unwrap();
        assert!(config.is_none());
        assert_eq!(queue.len(), 1);

        let (config, queue) = parse_actions(
            r##"{"theme": "#123456", "config": {"Global": {"primary_colour": "#123456"}},
                "actions": [{"verb": "close"}]}"##,
        )
        .unwrap();
        assert_eq!(
            config.unwrap().get_str("Global", "primary_colour").as_deref(),
            Some("#123456")
        );
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn parse_actions_rejects_garbage() {
        assert!(parse_actions("{not json").is_err());
    }

    #[test]
    fn cli_parses_repeated_datasets() {
        let cli = Cli::try_parse_from([
            "reportkit", "build", "actions.json", "-o", "out.xlsx", "-d", "sales=s.ipc", "-d",
            "costs=c.ipc",
        ])
        .unwrap();
        match cli.command {
            Commands::Build { datasets, .. } => {
                assert_eq!(datasets, vec!["sales=s.ipc".to_string(), "costs=c.ipc".to_string()]);
            }
            Commands::Decompile { .. } => panic!("expected build"),
        }
    }
}
