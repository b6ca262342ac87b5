//! Messages, commands, and the command executor.
//!
//! Screens never touch the filesystem, clipboard, or subprocesses from a key
//! handler. They return a [`Command`]; the app runs it off the loop thread
//! through [`perform`] and feeds the resulting [`Msg`] back in.

use std::path::PathBuf;
use std::time::Duration;

use crossterm::event::KeyEvent;
use tracing::{debug, info, instrument, warn};

use pluqqy_core::diagram::{diagram_html, pipeline_diagram};
use pluqqy_core::{compose_pipeline, output_path_for, write_output};
use pluqqy_shared::{
    ComponentItem, ComponentType, Pipeline, PipelineItem, PluqqyError, Result, Settings,
    display_name_from_stem, estimate_tokens, sanitize_file_name,
};
use pluqqy_storage::{Store, TagRegistry, TagUsage};

/// How long success banners stay up.
pub const BANNER_TIMEOUT: Duration = Duration::from_millis(1500);

/// Store plus settings: everything a command needs to run.
#[derive(Debug, Clone)]
pub struct Project {
    pub store: Store,
    pub settings: Settings,
}

impl Project {
    pub fn new(store: Store, settings: Settings) -> Self {
        Self { store, settings }
    }
}

/// A component or a pipeline, by store-relative path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Component(String),
    Pipeline(String),
}

impl Target {
    pub fn path(&self) -> &str {
        match self {
            Self::Component(p) | Self::Pipeline(p) => p,
        }
    }

    pub fn noun(&self) -> &'static str {
        match self {
            Self::Component(_) => "component",
            Self::Pipeline(_) => "pipeline",
        }
    }
}

/// Which top-level view the app should show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum View {
    List,
    /// Builder on a saved pipeline, or on a new one when `None`.
    Builder(Option<String>),
}

/// Snapshot of the three component pools plus tag data.
#[derive(Debug, Clone, Default)]
pub struct Pools {
    pub prompts: Vec<ComponentItem>,
    pub contexts: Vec<ComponentItem>,
    pub rules: Vec<ComponentItem>,
    pub registry: TagRegistry,
    pub all_tags: Vec<String>,
    pub includes_archived: bool,
}

impl Pools {
    pub fn pool(&self, t: ComponentType) -> &[ComponentItem] {
        match t {
            ComponentType::Prompt => &self.prompts,
            ComponentType::Context => &self.contexts,
            ComponentType::Rules => &self.rules,
        }
    }
}

// ---------------------------------------------------------------------------
// Msg
// ---------------------------------------------------------------------------

/// Everything that can enter the loop. Results carry errors as display strings.
#[derive(Debug)]
pub enum Msg {
    Key(KeyEvent),
    Paste(String),
    Resize(u16, u16),
    /// Clear the banner with this id, if it is still showing.
    ClearBanner(u64),
    Status(String),
    PoolsLoaded(std::result::Result<Pools, String>),
    PipelinesLoaded(std::result::Result<Vec<PipelineItem>, String>),
    PipelineSaved {
        pipeline: std::result::Result<Pipeline, String>,
        /// Set when the save also composed and wrote the output file.
        output: Option<std::result::Result<PathBuf, String>>,
    },
    Copied(std::result::Result<usize, String>),
    ComponentSaved {
        path: String,
        content: String,
        result: std::result::Result<(), String>,
    },
    ComponentCreated(std::result::Result<String, String>),
    TagsSaved {
        target: Target,
        tags: Vec<String>,
        removed: Vec<String>,
        result: std::result::Result<(), String>,
    },
    TagsCleaned(std::result::Result<Vec<String>, String>),
    TagUsageLoaded {
        tag: String,
        result: std::result::Result<TagUsage, String>,
    },
    TagDeleted {
        tag: String,
        result: std::result::Result<TagUsage, String>,
    },
    Deleted {
        target: Target,
        result: std::result::Result<(), String>,
    },
    /// Archive (`archived == true`) or unarchive finished; `Ok` holds the new path.
    Moved {
        target: Target,
        archived: bool,
        result: std::result::Result<String, String>,
    },
    Cloned {
        target: Target,
        result: std::result::Result<String, String>,
    },
    Renamed {
        target: Target,
        name: String,
        result: std::result::Result<String, String>,
    },
    DiagramWritten(std::result::Result<PathBuf, String>),
    ExternalEditFinished(std::result::Result<(), String>),
}

// ---------------------------------------------------------------------------
// Command
// ---------------------------------------------------------------------------

/// A side effect requested by a screen.
#[derive(Debug)]
pub enum Command {
    Batch(Vec<Command>),
    /// Deliver `msg` after a delay.
    After(Duration, Box<Msg>),
    SwitchView(View),
    Quit,
    /// Hand the terminal to `$EDITOR` on this store-relative file.
    ExternalEdit(String),
    /// Open a file with the platform opener. Fire and forget.
    OpenExternal(PathBuf),
    LoadPools {
        include_archived: bool,
    },
    LoadPipelines,
    SavePipeline {
        pipeline: Pipeline,
        set_output: bool,
    },
    CopyRendered(Pipeline),
    WriteComponent {
        path: String,
        content: String,
    },
    CreateComponent {
        component_type: ComponentType,
        name: String,
        content: String,
    },
    SaveTags {
        target: Target,
        tags: Vec<String>,
        removed: Vec<String>,
    },
    CleanupTags(Vec<String>),
    LoadTagUsage(String),
    DeleteTag(String),
    Delete(Target),
    Archive(Target),
    Unarchive(Target),
    Clone {
        target: Target,
        name: String,
    },
    Rename {
        target: Target,
        name: String,
    },
    Diagram(Pipeline),
}

impl Command {
    /// Collapse a list of optional commands into one.
    pub fn batch(cmds: impl IntoIterator<Item = Option<Command>>) -> Option<Command> {
        let mut cmds: Vec<Command> = cmds.into_iter().flatten().collect();
        match cmds.len() {
            0 => None,
            1 => cmds.pop(),
            _ => Some(Command::Batch(cmds)),
        }
    }

    /// Show-then-clear timer for banner `id`.
    pub fn clear_banner_later(id: u64) -> Command {
        Command::After(BANNER_TIMEOUT, Box::new(Msg::ClearBanner(id)))
    }
}

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

/// Run one I/O command to completion and describe the outcome.
///
/// Returns `None` for commands the loop handles itself (batches, timers,
/// view switches, quitting, and the external editor).
#[instrument(skip_all)]
pub fn perform(cmd: Command, project: &Project) -> Option<Msg> {
    let store = &project.store;
    let settings = &project.settings;
    let msg = match cmd {
        Command::Batch(_)
        | Command::After(..)
        | Command::SwitchView(_)
        | Command::Quit
        | Command::ExternalEdit(_)
        | Command::OpenExternal(_) => return None,

        Command::LoadPools { include_archived } => {
            Msg::PoolsLoaded(load_pools(store, include_archived).map_err(|e| e.to_string()))
        }
        Command::LoadPipelines => {
            Msg::PipelinesLoaded(store.list_pipelines().map_err(|e| e.to_string()))
        }
        Command::SavePipeline {
            mut pipeline,
            set_output,
        } => {
            let saved = store.write_pipeline(&mut pipeline).map(|()| pipeline);
            let output = match (&saved, set_output) {
                (Ok(p), true) => Some(set_pipeline(store, settings, p).map_err(|e| e.to_string())),
                _ => None,
            };
            Msg::PipelineSaved {
                pipeline: saved.map_err(|e| e.to_string()),
                output,
            }
        }
        Command::CopyRendered(pipeline) => Msg::Copied(
            compose_pipeline(store, settings, &pipeline)
                .and_then(|text| copy_to_clipboard(&text).map(|()| estimate_tokens(&text)))
                .map_err(|e| e.to_string()),
        ),
        Command::WriteComponent { path, content } => {
            let result = store.write_component(&path, &content).map_err(|e| e.to_string());
            Msg::ComponentSaved {
                path,
                content,
                result,
            }
        }
        Command::CreateComponent {
            component_type,
            name,
            content,
        } => Msg::ComponentCreated(
            store
                .create_component(component_type, &name, &content, &[])
                .map_err(|e| e.to_string()),
        ),
        Command::SaveTags {
            target,
            tags,
            removed,
        } => {
            let result = save_tags(store, &target, &tags).map_err(|e| e.to_string());
            Msg::TagsSaved {
                target,
                tags,
                removed,
                result,
            }
        }
        Command::CleanupTags(candidates) => Msg::TagsCleaned(
            store
                .cleanup_orphaned_tags(&candidates)
                .map_err(|e| e.to_string()),
        ),
        Command::LoadTagUsage(tag) => {
            let result = store.tag_usage(&tag).map_err(|e| e.to_string());
            Msg::TagUsageLoaded { tag, result }
        }
        Command::DeleteTag(tag) => {
            let result = store.delete_tag_everywhere(&tag).map_err(|e| e.to_string());
            Msg::TagDeleted { tag, result }
        }
        Command::Delete(target) => {
            let result = match &target {
                Target::Component(p) => store.delete_component(p).map(|_| ()),
                Target::Pipeline(p) => store.delete_pipeline(p),
            };
            Msg::Deleted {
                target,
                result: result.map_err(|e| e.to_string()),
            }
        }
        Command::Archive(target) => {
            let result = match &target {
                Target::Component(p) => store.archive_component(p),
                Target::Pipeline(p) => store.archive_pipeline(p),
            };
            Msg::Moved {
                target,
                archived: true,
                result: result.map_err(|e| e.to_string()),
            }
        }
        Command::Unarchive(target) => {
            let result = match &target {
                Target::Component(p) => store.unarchive_component(p),
                Target::Pipeline(p) => store.unarchive_pipeline(p),
            };
            Msg::Moved {
                target,
                archived: false,
                result: result.map_err(|e| e.to_string()),
            }
        }
        Command::Clone { target, name } => {
            let result = match &target {
                Target::Component(p) => store.clone_component(p, &name),
                Target::Pipeline(p) => store.clone_pipeline(p, &name),
            };
            Msg::Cloned {
                target,
                result: result.map_err(|e| e.to_string()),
            }
        }
        Command::Rename { target, name } => {
            let result = match &target {
                Target::Component(p) => store.rename_component(p, &name),
                Target::Pipeline(p) => store.rename_pipeline(p, &name),
            };
            Msg::Renamed {
                target,
                name,
                result: result.map_err(|e| e.to_string()),
            }
        }
        Command::Diagram(pipeline) => {
            Msg::DiagramWritten(write_diagram(project, &pipeline).map_err(|e| e.to_string()))
        }
    };
    debug!(?msg, "command finished");
    Some(msg)
}

/// Load the three pools with usage counts, plus the tag registry.
pub fn load_pools(store: &Store, include_archived: bool) -> Result<Pools> {
    let usage = store.count_component_usage()?;
    let load = |t: ComponentType| -> Result<Vec<ComponentItem>> {
        let mut items = store.list_components(t)?;
        if include_archived {
            items.extend(store.list_archived_components(t)?);
        }
        for item in &mut items {
            item.usage_count = usage.get(&item.path).copied().unwrap_or(0);
        }
        Ok(items)
    };
    let pools = Pools {
        prompts: load(ComponentType::Prompt)?,
        contexts: load(ComponentType::Context)?,
        rules: load(ComponentType::Rules)?,
        registry: store.load_tag_registry()?,
        all_tags: store.all_tags()?,
        includes_archived: include_archived,
    };
    info!(
        prompts = pools.prompts.len(),
        contexts = pools.contexts.len(),
        rules = pools.rules.len(),
        include_archived,
        "pools loaded"
    );
    Ok(pools)
}

/// Compose a saved pipeline and write its output file.
pub fn set_pipeline(store: &Store, settings: &Settings, pipeline: &Pipeline) -> Result<PathBuf> {
    let text = compose_pipeline(store, settings, pipeline)?;
    let target = output_path_for(store, settings, pipeline);
    write_output(&text, &target)?;
    Ok(target)
}

fn save_tags(store: &Store, target: &Target, tags: &[String]) -> Result<()> {
    match target {
        Target::Component(p) => store.update_component_tags(p, tags)?,
        Target::Pipeline(p) => store.update_pipeline_tags(p, tags)?,
    }
    store.ensure_tags(tags)
}

fn copy_to_clipboard(text: &str) -> Result<()> {
    let mut clipboard =
        arboard::Clipboard::new().map_err(|e| PluqqyError::Clipboard(e.to_string()))?;
    clipboard
        .set_text(text.to_string())
        .map_err(|e| PluqqyError::Clipboard(e.to_string()))
}

fn write_diagram(project: &Project, pipeline: &Pipeline) -> Result<PathBuf> {
    let store = &project.store;
    let output = output_path_for(store, &project.settings, pipeline);
    let output_name = output
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| project.settings.output.default_filename.clone());
    let mermaid = pipeline_diagram(pipeline, &project.settings, &output_name, |path| {
        let file = path.rsplit('/').next().unwrap_or(path);
        display_name_from_stem(file.trim_end_matches(".md"))
    });
    let html = diagram_html(&pipeline.name, &mermaid);

    let dir = store.diagrams_dir();
    std::fs::create_dir_all(&dir).map_err(|e| PluqqyError::io(&dir, e))?;
    let file = dir.join(format!("{}.html", sanitize_file_name(&pipeline.name)));
    std::fs::write(&file, html).map_err(|e| PluqqyError::io(&file, e))?;
    info!(path = %file.display(), "diagram written");
    Ok(file)
}

/// Hand a file to `open` / `xdg-open` without waiting for it.
pub fn open_external(file: &std::path::Path) {
    let opener = if cfg!(target_os = "macos") {
        "open"
    } else {
        "xdg-open"
    };
    let spawned = std::process::Command::new(opener)
        .arg(file)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn();
    if let Err(e) = spawned {
        warn!(opener, error = %e, "could not open diagram");
    }
}

/// Run an already validated editor command on a store file, inheriting
/// stdio. Blocks until it exits.
pub fn launch_editor(store: &Store, path: &str, program: &str, args: &[String]) -> Result<()> {
    let file = store.abs(path);
    info!(%program, file = %file.display(), "launching external editor");
    let status = std::process::Command::new(program)
        .args(args)
        .arg(&file)
        .status()
        .map_err(|e| PluqqyError::Editor(format!("failed to start {program}: {e}")))?;
    if status.success() {
        Ok(())
    } else {
        Err(PluqqyError::Editor(format!("{program} exited with {status}")))
    }
}
