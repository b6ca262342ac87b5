//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use pluqqy_core::{compose_pipeline, output_path_for, write_output};
use pluqqy_shared::{
    ComponentType, PipelineItem, format_tokens, init_settings, load_settings, sanitize_file_name,
};
use pluqqy_storage::Store;
use serde_json::json;
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Pluqqy: compose prompts, context, and rules into pipelines.
#[derive(Parser)]
#[command(
    name = "pluqqy",
    version,
    about = "Build LLM context files from reusable prompt, context, and rules components.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Project root (defaults to the current directory).
    #[arg(long, global = true, env = "PLUQQY_DIR")]
    pub dir: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Create the .pluqqy directory tree and default settings.
    Init,

    /// List pipelines and components.
    List {
        /// Show archived items instead of active ones.
        #[arg(long)]
        archived: bool,

        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Compose a pipeline and write its output file.
    Set {
        /// Pipeline name or path relative to .pluqqy.
        pipeline: String,
    },

    /// Launch the interactive TUI (the default).
    Tui,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
///
/// The TUI owns the terminal, so it installs its own file logger instead.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    if matches!(cli.command, None | Some(Command::Tui)) {
        return;
    }

    let filter = match cli.verbose {
        0 => "pluqqy=info",
        1 => "pluqqy=debug",
        _ => "pluqqy=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) fn run(cli: Cli) -> Result<()> {
    let root = match cli.dir {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };
    match cli.command.unwrap_or(Command::Tui) {
        Command::Init => cmd_init(&root),
        Command::List { archived, json } => cmd_list(&root, archived, json),
        Command::Set { pipeline } => cmd_set(&root, &pipeline),
        Command::Tui => pluqqy_tui::run(root),
    }
}

fn open_store(root: &Path) -> Result<Store> {
    let store = Store::new(root);
    if !store.is_initialized() {
        return Err(eyre!(
            "no .pluqqy directory in {}; run `pluqqy init` first",
            root.display()
        ));
    }
    Ok(store)
}

fn cmd_init(root: &Path) -> Result<()> {
    let store = Store::new(root);
    store.init()?;
    let settings = init_settings(root)?;
    info!(root = %root.display(), "project initialized");
    println!("Initialized {}", store.data_dir().display());
    println!("Settings:   {}", settings.display());
    Ok(())
}

fn cmd_list(root: &Path, archived: bool, as_json: bool) -> Result<()> {
    let store = open_store(root)?;
    let pipelines = if archived {
        store.list_archived_pipelines()?
    } else {
        store.list_pipelines()?
    };
    let usage = store.count_component_usage()?;

    let mut components = Vec::new();
    for t in ComponentType::ALL {
        let mut items = if archived {
            store.list_archived_components(t)?
        } else {
            store.list_components(t)?
        };
        for item in &mut items {
            item.usage_count = usage.get(&item.path).copied().unwrap_or(0);
        }
        components.extend(items);
    }

    if as_json {
        let out = json!({
            "pipelines": pipelines.iter().map(pipeline_json).collect::<Vec<_>>(),
            "components": components.iter().map(|c| json!({
                "name": c.name,
                "path": c.path,
                "type": c.component_type.label(),
                "tokens": c.token_count,
                "usage": c.usage_count,
                "tags": c.tags,
                "archived": c.is_archived,
                "modified": c.modified.to_rfc3339(),
            })).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("Pipelines ({})", pipelines.len());
    for p in &pipelines {
        let tags = if p.tags.is_empty() {
            String::new()
        } else {
            format!("  [{}]", p.tags.join(", "))
        };
        println!("  {:<32} {:>3} components{tags}", p.name, p.component_count);
    }
    println!();
    println!("Components ({})", components.len());
    for c in &components {
        println!(
            "  {:<32} {:<8} {:>7} tokens  used {:>2}",
            c.name,
            c.component_type.label(),
            format_tokens(c.token_count),
            c.usage_count
        );
    }
    Ok(())
}

fn pipeline_json(p: &PipelineItem) -> serde_json::Value {
    json!({
        "name": p.name,
        "path": p.path,
        "components": p.component_count,
        "tags": p.tags,
        "archived": p.is_archived,
        "modified": p.modified.to_rfc3339(),
    })
}

fn cmd_set(root: &Path, wanted: &str) -> Result<()> {
    let store = open_store(root)?;
    let settings = load_settings(root)?;
    let path = resolve_pipeline(&store.list_pipelines()?, wanted)
        .ok_or_else(|| eyre!("no pipeline named '{wanted}'"))?;
    let pipeline = store.read_pipeline(&path)?;
    let text = compose_pipeline(&store, &settings, &pipeline)?;
    let target = output_path_for(&store, &settings, &pipeline);
    write_output(&text, &target)?;
    info!(pipeline = %pipeline.name, output = %target.display(), "pipeline set");
    println!(
        "Wrote {} (~{} tokens)",
        target.display(),
        format_tokens(pluqqy_shared::estimate_tokens(&text))
    );
    Ok(())
}

/// Match by store path, file name, or display name (sanitized, ignoring case).
fn resolve_pipeline(pipelines: &[PipelineItem], wanted: &str) -> Option<String> {
    let wanted_stem = sanitize_file_name(wanted.trim_end_matches(".yaml"));
    pipelines
        .iter()
        .find(|p| {
            p.path == wanted
                || p.path.rsplit('/').next() == Some(wanted)
                || sanitize_file_name(&p.name).eq_ignore_ascii_case(&wanted_stem)
        })
        .map(|p| p.path.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(name: &str, path: &str) -> PipelineItem {
        PipelineItem {
            name: name.into(),
            path: path.into(),
            component_count: 0,
            tags: vec![],
            modified: Default::default(),
            is_archived: false,
        }
    }

    #[test]
    fn resolves_by_name_file_or_path() {
        let list = vec![
            item("My First Pipeline", "pipelines/my-first-pipeline.yaml"),
            item("Other", "pipelines/other.yaml"),
        ];
        let want = Some("pipelines/my-first-pipeline.yaml".to_string());
        assert_eq!(resolve_pipeline(&list, "My First Pipeline"), want);
        assert_eq!(resolve_pipeline(&list, "my-first-pipeline.yaml"), want);
        assert_eq!(resolve_pipeline(&list, "pipelines/my-first-pipeline.yaml"), want);
        assert_eq!(resolve_pipeline(&list, "missing"), None);
    }

    #[test]
    fn cli_defaults_to_tui() {
        let cli = Cli::parse_from(["pluqqy"]);
        assert!(cli.command.is_none());
        let cli = Cli::parse_from(["pluqqy", "--dir", "/tmp/x", "list", "--json"]);
        assert!(matches!(cli.command, Some(Command::List { json: true, archived: false })));
        assert_eq!(cli.dir, Some(PathBuf::from("/tmp/x")));
    }

    #[test]
    fn init_then_set_writes_output() {
        let tmp = tempfile::tempdir().unwrap();
        cmd_init(tmp.path()).unwrap();
        let store = Store::new(tmp.path());
        let path = store
            .create_component(ComponentType::Prompt, "Hello", "hello body", &[])
            .unwrap();
        let mut p = pluqqy_shared::Pipeline::new("Greet");
        p.components
            .push(pluqqy_shared::ComponentRef::new(ComponentType::Prompt, &path));
        store.write_pipeline(&mut p).unwrap();

        cmd_set(tmp.path(), "Greet").unwrap();
        let settings = load_settings(tmp.path()).unwrap();
        let out = output_path_for(&store, &settings, &p);
        assert!(std::fs::read_to_string(out).unwrap().contains("hello body"));
        assert!(cmd_set(tmp.path(), "nope").is_err());
    }
}
