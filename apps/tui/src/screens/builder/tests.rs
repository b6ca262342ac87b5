//! Builder behaviour driven through a scripted message loop.

use std::collections::VecDeque;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{Terminal, backend::TestBackend};

use pluqqy_shared::{ComponentRef, ComponentType, Pipeline, Settings};
use pluqqy_storage::Store;

use super::*;
use crate::event::{load_pools, perform};

/// Runs commands synchronously and feeds results back, like the app loop.
struct Harness {
    _tmp: tempfile::TempDir,
    project: Project,
    builder: PipelineBuilder,
    views: Vec<View>,
    timers: Vec<Msg>,
    opened: Vec<std::path::PathBuf>,
    pool_loads: usize,
}

impl Harness {
    fn open(project: Project, tmp: tempfile::TempDir, pipeline: Pipeline) -> Self {
        let pools = load_pools(&project.store, false).unwrap();
        let builder = PipelineBuilder::new(project.clone(), pipeline, pools, 120, 40);
        Self {
            _tmp: tmp,
            project,
            builder,
            views: Vec::new(),
            timers: Vec::new(),
            opened: Vec::new(),
            pool_loads: 0,
        }
    }

    fn send(&mut self, msg: Msg) {
        let cmd = self.builder.update(msg);
        self.run(cmd);
    }

    fn run(&mut self, cmd: Option<Command>) {
        let mut queue: VecDeque<Command> = cmd.into_iter().collect();
        while let Some(cmd) = queue.pop_front() {
            match cmd {
                Command::Batch(cmds) => queue.extend(cmds),
                Command::After(_, msg) => self.timers.push(*msg),
                Command::SwitchView(view) => self.views.push(view),
                Command::OpenExternal(file) => self.opened.push(file),
                Command::Quit | Command::ExternalEdit(_) => {}
                other => {
                    if matches!(other, Command::LoadPools { .. }) {
                        self.pool_loads += 1;
                    }
                    if let Some(msg) = perform(other, &self.project) {
                        queue.extend(self.builder.update(msg));
                    }
                }
            }
        }
    }

    fn press(&mut self, code: KeyCode) {
        self.send(Msg::Key(KeyEvent::new(code, KeyModifiers::NONE)));
    }

    fn ctrl(&mut self, c: char) {
        self.send(Msg::Key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)));
    }

    fn type_text(&mut self, text: &str) {
        for c in text.chars() {
            self.press(KeyCode::Char(c));
        }
    }

    fn fire_timers(&mut self) {
        for msg in std::mem::take(&mut self.timers) {
            self.send(msg);
        }
    }

    fn selected_paths(&self) -> Vec<String> {
        self.builder
            .data
            .selected
            .iter()
            .map(|r| r.canonical_path().to_string())
            .collect()
    }

    fn usage(&self, path: &str) -> usize {
        self.builder
            .data
            .available()
            .iter()
            .find(|i| i.path == path)
            .map(|i| i.usage_count)
            .unwrap()
    }

    fn assert_cursors_visible(&self) {
        let b = &self.builder;
        let left_len = b.data.available().len();
        let right_len = b.data.selected.len();
        assert!(b.left_cursor < left_len.max(1));
        assert!(b.right_cursor < right_len.max(1));
        let rows = b.viewport.left_rows(b.show_preview);
        assert!(b.viewport.left_offset <= b.left_cursor);
        assert!(b.left_cursor < b.viewport.left_offset + rows);
        let line = b.right_line(b.right_cursor);
        let rows = b.viewport.right_rows(b.show_preview);
        assert!(b.viewport.right_offset <= line);
        assert!(line < b.viewport.right_offset + rows);
    }
}

fn project() -> (tempfile::TempDir, Project) {
    let tmp = tempfile::tempdir().unwrap();
    let store = Store::new(tmp.path());
    store.init().unwrap();
    (tmp, Project::new(store, Settings::default()))
}

fn create(store: &Store, t: ComponentType, name: &str, body: &str, tags: &[&str]) -> String {
    let tags: Vec<String> = tags.iter().map(|t| t.to_string()).collect();
    store.create_component(t, name, body, &tags).unwrap()
}

fn saved_pipeline(store: &Store, name: &str, paths: &[(ComponentType, &str)]) -> Pipeline {
    let mut p = Pipeline::new(name);
    p.components = paths
        .iter()
        .map(|(t, path)| ComponentRef::new(*t, path))
        .collect();
    store.write_pipeline(&mut p).unwrap();
    store.read_pipeline(&p.path).unwrap()
}

#[test]
fn new_pipeline_is_named_built_and_saved() {
    let (tmp, project) = project();
    let store = project.store.clone();
    let prompt = create(&store, ComponentType::Prompt, "Ask", "ask body", &[]);
    let context = create(&store, ComponentType::Context, "Repo", "repo body", &[]);
    let rules = create(&store, ComponentType::Rules, "Style", "style body", &[]);
    let mut h = Harness::open(project, tmp, Pipeline::default());
    assert!(matches!(h.builder.modal, Some(Modal::Name(_))));

    h.type_text("My First Pipeline");
    h.press(KeyCode::Enter);
    assert!(h.builder.modal.is_none());
    assert_eq!(h.builder.data.pipeline.name, "My First Pipeline");

    // Left column lists rules, contexts, prompts.
    h.press(KeyCode::Enter);
    h.press(KeyCode::Char('j'));
    h.press(KeyCode::Enter);
    h.press(KeyCode::Char('j'));
    h.press(KeyCode::Enter);
    assert_eq!(h.builder.data.selected.len(), 3);
    assert!(h.builder.is_dirty());

    h.ctrl('s');
    let written = store.read_pipeline("pipelines/my-first-pipeline.yaml").unwrap();
    let types: Vec<ComponentType> = written.components.iter().map(|r| r.component_type).collect();
    assert_eq!(types, h.project.settings.section_order());
    assert_eq!(h.builder.data.pipeline.path, "pipelines/my-first-pipeline.yaml");
    for path in [&prompt, &context, &rules] {
        assert!(h.usage(path) >= 1);
    }
    assert!(!h.builder.is_dirty());
    assert!(h.builder.status().unwrap().starts_with('✓'));
}

#[test]
fn reorder_up_marks_dirty_and_guards_exit() {
    let (tmp, project) = project();
    let store = project.store.clone();
    let p1 = create(&store, ComponentType::Prompt, "P1", "one", &[]);
    let p2 = create(&store, ComponentType::Prompt, "P2", "two", &[]);
    let p3 = create(&store, ComponentType::Prompt, "P3", "three", &[]);
    let t = ComponentType::Prompt;
    let pipeline = saved_pipeline(&store, "Trio", &[(t, &p1), (t, &p2), (t, &p3)]);
    let mut h = Harness::open(project, tmp, pipeline);
    assert!(!h.builder.is_dirty());

    h.press(KeyCode::Tab);
    assert_eq!(h.builder.active(), Column::Right);
    h.press(KeyCode::Down);
    h.press(KeyCode::Char('K'));
    assert_eq!(h.selected_paths(), vec![p2.clone(), p1.clone(), p3.clone()]);
    let orders: Vec<usize> = h.builder.data.selected.iter().map(|r| r.order).collect();
    assert_eq!(orders, vec![1, 2, 3]);
    assert_eq!(h.builder.right_cursor, 0);
    assert!(h.builder.is_dirty());

    h.press(KeyCode::Esc);
    assert!(matches!(h.builder.modal, Some(Modal::Confirm(_))));
    assert!(h.views.is_empty());
}

#[test]
fn reorder_at_type_boundary_is_a_noop() {
    let (tmp, project) = project();
    let store = project.store.clone();
    let r = create(&store, ComponentType::Rules, "R", "r", &[]);
    let p = create(&store, ComponentType::Prompt, "P", "p", &[]);
    let pipeline = saved_pipeline(
        &store,
        "Mixed",
        &[(ComponentType::Rules, &r), (ComponentType::Prompt, &p)],
    );
    let mut h = Harness::open(project, tmp, pipeline);
    h.press(KeyCode::Tab);
    h.press(KeyCode::Char('G'));
    assert_eq!(h.builder.right_cursor, 1);
    h.press(KeyCode::Char('K'));
    h.send(Msg::Key(KeyEvent::new(KeyCode::Up, KeyModifiers::SHIFT)));
    assert_eq!(h.selected_paths(), vec![r, p]);
    assert_eq!(h.builder.right_cursor, 1);
    assert!(!h.builder.is_dirty());
}

#[test]
fn activating_selected_item_removes_it() {
    let (tmp, project) = project();
    let store = project.store.clone();
    let a = create(&store, ComponentType::Prompt, "A", "alpha", &[]);
    let b = create(&store, ComponentType::Prompt, "B", "beta", &[]);
    let c = create(&store, ComponentType::Prompt, "C", "gamma", &[]);
    let t = ComponentType::Prompt;
    let pipeline = saved_pipeline(&store, "Abc", &[(t, &a), (t, &b), (t, &c)]);
    let mut h = Harness::open(project, tmp, pipeline);
    assert_eq!(h.usage(&c), 1);

    h.press(KeyCode::Char('G'));
    h.press(KeyCode::Enter);
    assert_eq!(h.selected_paths(), vec![a.clone(), b.clone()]);
    assert_eq!(h.builder.right_cursor, 1);
    assert_eq!(h.usage(&c), 0);
    assert!(h.builder.is_dirty());
    // Left cursor on a component shows its raw body.
    assert!(h.builder.preview_lines.iter().any(|l| l.contains("gamma")));

    h.press(KeyCode::Enter);
    assert_eq!(h.selected_paths(), vec![a, b, c.clone()]);
    assert_eq!(h.usage(&c), 1);
    assert!(!h.builder.is_dirty());
}

#[test]
fn toggling_twice_restores_the_selection() {
    let (tmp, project) = project();
    let store = project.store.clone();
    let r = create(&store, ComponentType::Rules, "R", "r", &[]);
    let p = create(&store, ComponentType::Prompt, "P", "p", &[]);
    let pipeline = saved_pipeline(&store, "One", &[(ComponentType::Prompt, &p)]);
    let mut h = Harness::open(project, tmp, pipeline);
    let before = h.selected_paths();

    h.press(KeyCode::Enter);
    assert_eq!(h.selected_paths(), vec![r, p]);
    h.press(KeyCode::Enter);
    assert_eq!(h.selected_paths(), before);
    assert!(!h.builder.is_dirty());
}

#[test]
fn archived_search_reloads_once_and_filters() {
    let (tmp, project) = project();
    let store = project.store.clone();
    let old_urgent = create(&store, ComponentType::Prompt, "Old Urgent", "x", &["urgent"]);
    let old_plain = create(&store, ComponentType::Prompt, "Old Plain", "x", &[]);
    let old_ctx = create(&store, ComponentType::Context, "Old Ctx", "x", &["urgent"]);
    for path in [&old_urgent, &old_plain, &old_ctx] {
        store.archive_component(path).unwrap();
    }
    create(&store, ComponentType::Prompt, "Live One", "x", &["urgent"]);
    create(&store, ComponentType::Prompt, "Live Two", "x", &[]);
    create(&store, ComponentType::Prompt, "Live Three", "x", &[]);
    let mut h = Harness::open(project, tmp, Pipeline::new("Search"));
    h.press(KeyCode::Char('G'));
    assert_eq!(h.builder.left_cursor, 2);

    h.press(KeyCode::Char('/'));
    assert_eq!(h.builder.active(), Column::Search);
    h.type_text("tag:urgent type:prompt status:archived");
    assert_eq!(h.pool_loads, 1);
    assert!(h.builder.data.includes_archived);
    let names: Vec<String> = h
        .builder
        .data
        .available()
        .iter()
        .map(|i| i.name.clone())
        .collect();
    assert_eq!(names, vec!["Old Urgent"]);
    assert_eq!(h.builder.left_cursor, 0);

    // Letters are query text while searching, not navigation.
    h.press(KeyCode::Enter);
    assert_eq!(h.builder.active(), Column::Left);

    h.press(KeyCode::Char('/'));
    h.ctrl('a');
    assert_eq!(h.pool_loads, 2);
    assert!(!h.builder.data.includes_archived);
    assert!(h.builder.data.available().iter().all(|i| !i.is_archived));
}

#[test]
fn editor_save_keeps_editor_open_and_clean() {
    let (tmp, project) = project();
    let store = project.store.clone();
    let path = create(&store, ComponentType::Prompt, "Greeting", "hello", &[]);
    let mut h = Harness::open(project, tmp, Pipeline::new("Edit"));

    h.press(KeyCode::Char('e'));
    assert!(matches!(h.builder.modal, Some(Modal::Editor(_))));
    h.type_text("world");
    h.ctrl('s');

    let Some(Modal::Editor(editor)) = &h.builder.modal else {
        panic!("editor closed on save");
    };
    assert!(!editor.is_dirty());
    assert!(store.read_component(&path).unwrap().content.contains("world"));
    assert!(h.builder.preview_lines.iter().any(|l| l.contains("world")));
    assert!(h.builder.status().unwrap().starts_with('✓'));
    assert!(h.pool_loads >= 1);

    h.fire_timers();
    assert!(h.builder.status().is_none());
}

#[test]
fn editing_a_vanished_component_reports_status() {
    let (tmp, project) = project();
    let store = project.store.clone();
    let gone = create(&store, ComponentType::Prompt, "Gone", "body", &[]);
    let mut h = Harness::open(project, tmp, Pipeline::new("Edits"));
    std::fs::remove_file(store.abs(&gone)).unwrap();

    h.press(KeyCode::Char('e'));
    assert!(h.builder.modal.is_none());
    assert!(h.builder.status().unwrap().starts_with("✗ Cannot open"));
}

#[test]
fn stale_banner_timer_keeps_newer_message() {
    let (tmp, project) = project();
    let mut h = Harness::open(project, tmp, Pipeline::new("Banners"));
    h.send(Msg::DiagramWritten(Ok("a.html".into())));
    let stale = std::mem::take(&mut h.timers);
    h.send(Msg::Copied(Err("no clipboard".into())));
    for msg in stale {
        h.send(msg);
    }
    assert_eq!(h.builder.status(), Some("✗ Copy failed: no clipboard"));
}

#[test]
fn exit_confirmation_cancel_and_confirm() {
    let (tmp, project) = project();
    let store = project.store.clone();
    create(&store, ComponentType::Prompt, "Only", "x", &[]);
    let mut h = Harness::open(project, tmp, Pipeline::new("Draft"));
    h.press(KeyCode::Enter);
    assert!(h.builder.is_dirty());

    h.press(KeyCode::Esc);
    assert!(matches!(h.builder.modal, Some(Modal::Confirm(_))));
    h.press(KeyCode::Char('n'));
    assert!(h.builder.modal.is_none());
    assert_eq!(h.builder.data.selected.len(), 1);
    assert!(h.views.is_empty());

    h.press(KeyCode::Esc);
    h.press(KeyCode::Char('y'));
    assert_eq!(h.views, vec![View::List]);
}

#[test]
fn clean_exit_skips_confirmation() {
    let (tmp, project) = project();
    let mut h = Harness::open(project, tmp, Pipeline::new("Clean"));
    h.press(KeyCode::Esc);
    assert_eq!(h.views, vec![View::List]);
}

#[test]
fn dirty_tracks_manual_revert() {
    let (tmp, project) = project();
    let store = project.store.clone();
    let a = create(&store, ComponentType::Prompt, "A", "a", &[]);
    let b = create(&store, ComponentType::Prompt, "B", "b", &[]);
    let t = ComponentType::Prompt;
    let pipeline = saved_pipeline(&store, "Pair", &[(t, &a), (t, &b)]);
    let mut h = Harness::open(project, tmp, pipeline);
    h.press(KeyCode::Tab);
    h.press(KeyCode::Char('J'));
    assert!(h.builder.is_dirty());
    h.press(KeyCode::Char('K'));
    assert!(!h.builder.is_dirty());
}

#[test]
fn save_failure_keeps_dirty_state() {
    let (tmp, project) = project();
    let store = project.store.clone();
    create(&store, ComponentType::Prompt, "A", "a", &[]);
    saved_pipeline(&store, "Taken", &[]);
    let mut h = Harness::open(project, tmp, Pipeline::new("Taken"));
    h.press(KeyCode::Enter);
    h.ctrl('s');
    assert!(h.builder.status().unwrap().starts_with('✗'));
    assert!(h.builder.is_dirty());
    assert!(!h.builder.data.pipeline.is_saved());
}

#[test]
fn new_component_lands_under_cursor() {
    let (tmp, project) = project();
    let store = project.store.clone();
    create(&store, ComponentType::Prompt, "Existing", "x", &[]);
    let mut h = Harness::open(project, tmp, Pipeline::new("Create"));

    h.press(KeyCode::Char('n'));
    h.press(KeyCode::Enter);
    h.type_text("Existing");
    h.press(KeyCode::Enter);
    let Some(Modal::Creator(creator)) = &h.builder.modal else {
        panic!("creator closed");
    };
    assert!(creator.warning.is_some());

    for _ in 0.."Existing".len() {
        h.press(KeyCode::Backspace);
    }
    h.type_text("Fresh");
    h.press(KeyCode::Enter);
    h.type_text("fresh body");
    h.ctrl('s');

    assert!(h.builder.modal.is_none());
    let item = h.builder.data.available()[h.builder.left_cursor].clone();
    assert_eq!(item.name, "Fresh");
    assert!(store.read_component(&item.path).unwrap().content.contains("fresh body"));
}

#[test]
fn deleting_component_drops_it_everywhere() {
    let (tmp, project) = project();
    let store = project.store.clone();
    let a = create(&store, ComponentType::Prompt, "A", "a", &[]);
    let b = create(&store, ComponentType::Prompt, "B", "b", &[]);
    let t = ComponentType::Prompt;
    let pipeline = saved_pipeline(&store, "Both", &[(t, &a), (t, &b)]);
    let mut h = Harness::open(project, tmp, pipeline);

    h.press(KeyCode::Char('d'));
    h.press(KeyCode::Char('y'));
    assert_eq!(h.selected_paths(), vec![b.clone()]);
    assert!(!h.builder.is_dirty());
    assert!(h.builder.data.find(&a).is_none());
    assert_eq!(store.read_pipeline("pipelines/both.yaml").unwrap().components.len(), 1);
}

#[test]
fn renaming_component_keeps_selection_pointing_at_it() {
    let (tmp, project) = project();
    let store = project.store.clone();
    let a = create(&store, ComponentType::Prompt, "Old Name", "a", &[]);
    let pipeline = saved_pipeline(&store, "Ren", &[(ComponentType::Prompt, &a)]);
    let mut h = Harness::open(project, tmp, pipeline);

    h.press(KeyCode::Char('R'));
    for _ in 0.."Old Name".len() {
        h.press(KeyCode::Backspace);
    }
    h.type_text("New Name");
    h.press(KeyCode::Enter);

    assert!(h.builder.modal.is_none());
    let selected = h.selected_paths();
    assert_eq!(selected.len(), 1);
    assert!(selected[0].ends_with("new-name.md"));
    assert_eq!(h.builder.data.available()[h.builder.left_cursor].name, "New Name");
}

#[test]
fn unsaved_pipeline_tags_stay_local() {
    let (tmp, project) = project();
    let mut h = Harness::open(project, tmp, Pipeline::new("Local"));
    h.press(KeyCode::Tab);
    h.press(KeyCode::Char('t'));
    assert!(matches!(h.builder.modal, Some(Modal::Tags(_))));
    h.type_text("draft");
    h.press(KeyCode::Enter);
    h.ctrl('s');
    assert_eq!(h.builder.data.pipeline.tags, vec!["draft"]);
    assert_eq!(h.pool_loads, 0);
}

#[test]
fn actions_needing_a_saved_pipeline_report_status() {
    let (tmp, project) = project();
    let mut h = Harness::open(project, tmp, Pipeline::new("Unsaved"));
    h.press(KeyCode::Tab);
    h.press(KeyCode::Char('d'));
    assert!(h.builder.modal.is_none());
    assert_eq!(h.builder.status(), Some("Pipeline has not been saved yet"));
}

#[test]
fn diagram_is_written_then_handed_to_the_opener() {
    let (tmp, project) = project();
    let store = project.store.clone();
    let ask = create(&store, ComponentType::Prompt, "Ask", "ask body", &[]);
    let pipeline = saved_pipeline(&store, "Flow", &[(ComponentType::Prompt, &ask)]);
    let mut h = Harness::open(project, tmp, pipeline);

    h.press(KeyCode::Char('M'));
    assert_eq!(h.opened.len(), 1);
    assert!(h.opened[0].ends_with("tmp/diagrams/flow.html"));
    assert!(h.opened[0].exists());
    assert!(h.builder.status().unwrap().starts_with("✓ Diagram written"));
}

#[test]
fn tab_cycle_skips_hidden_preview() {
    let (tmp, project) = project();
    let mut h = Harness::open(project, tmp, Pipeline::new("Cycle"));
    h.press(KeyCode::Tab);
    h.press(KeyCode::Tab);
    assert_eq!(h.builder.active(), Column::Preview);
    h.press(KeyCode::Tab);
    h.press(KeyCode::Char('p'));
    h.press(KeyCode::Tab);
    h.press(KeyCode::Tab);
    assert_eq!(h.builder.active(), Column::Left);
}

#[test]
fn cursors_stay_valid_under_random_input() {
    let (tmp, project) = project();
    let store = project.store.clone();
    for t in ComponentType::ALL {
        for i in 0..6 {
            create(&store, t, &format!("{} {i}", t.label()), &format!("body {i}"), &[]);
        }
    }
    let mut h = Harness::open(project, tmp, Pipeline::new("Fuzz"));
    h.send(Msg::Resize(90, 24));
    let keys = [
        KeyCode::Tab,
        KeyCode::BackTab,
        KeyCode::Char('j'),
        KeyCode::Char('k'),
        KeyCode::Char('J'),
        KeyCode::Char('K'),
        KeyCode::Enter,
        KeyCode::Enter,
        KeyCode::PageDown,
        KeyCode::PageUp,
        KeyCode::Char('G'),
        KeyCode::Char('g'),
        KeyCode::Char('p'),
    ];
    let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
    for _ in 0..600 {
        seed ^= seed << 13;
        seed ^= seed >> 7;
        seed ^= seed << 17;
        h.press(keys[(seed % keys.len() as u64) as usize]);
        h.assert_cursors_visible();
        let types: Vec<ComponentType> = h
            .builder
            .data
            .selected
            .iter()
            .map(|r| r.component_type)
            .collect();
        let mut sorted = types.clone();
        let order = h.project.settings.section_order();
        sorted.sort_by_key(|t| order.iter().position(|o| o == t));
        assert_eq!(types, sorted);
    }
}

#[test]
fn renders_columns_preview_and_modals() {
    let (tmp, project) = project();
    let store = project.store.clone();
    let p = create(&store, ComponentType::Prompt, "Render Me", "rendered body", &["ui"]);
    let pipeline = saved_pipeline(&store, "Drawn", &[(ComponentType::Prompt, &p)]);
    let mut h = Harness::open(project, tmp, pipeline);
    h.press(KeyCode::Tab);

    let mut terminal = Terminal::new(TestBackend::new(120, 40)).unwrap();
    terminal.draw(|f| h.builder.draw(f)).unwrap();
    let screen = screen_text(&terminal);
    assert!(screen.contains("Available Components"));
    assert!(screen.contains("Pipeline Components"));
    assert!(screen.contains("PROMPTS (1)"));
    assert!(screen.contains("Render Me"));
    assert!(screen.contains("rendered body"));

    h.press(KeyCode::Char('?'));
    terminal.draw(|f| h.builder.draw(f)).unwrap();
    assert!(screen_text(&terminal).contains("Keybindings"));

    h.press(KeyCode::Esc);
    h.press(KeyCode::Char('j'));
    h.press(KeyCode::Char('t'));
    let mut small = Terminal::new(TestBackend::new(60, 16)).unwrap();
    small.draw(|f| h.builder.draw(f)).unwrap();
}

fn screen_text(terminal: &Terminal<TestBackend>) -> String {
    let buffer = terminal.backend().buffer();
    let mut out = String::new();
    for y in 0..buffer.area.height {
        for x in 0..buffer.area.width {
            out.push_str(buffer[(x, y)].symbol());
        }
        out.push('\n');
    }
    out
}
