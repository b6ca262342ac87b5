//! In-memory model behind the builder: pools, filtered views, and the selection.

use pluqqy_shared::{ComponentItem, ComponentRef, ComponentType, Pipeline, canonical_path, to_ref_path};
use pluqqy_storage::TagRegistry;

use crate::event::Pools;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

/// Result of toggling a component's membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    /// Added; index of the new ref after regrouping.
    Added(usize),
    /// Removed from this index.
    Removed(usize),
}

#[derive(Debug, Clone)]
pub struct DataStore {
    /// Name, path, tags, and output path of the pipeline being edited.
    /// Its `components` are only filled in by [`DataStore::to_pipeline`].
    pub pipeline: Pipeline,
    pub prompts: Vec<ComponentItem>,
    pub contexts: Vec<ComponentItem>,
    pub rules: Vec<ComponentItem>,
    pub filtered_prompts: Vec<ComponentItem>,
    pub filtered_contexts: Vec<ComponentItem>,
    pub filtered_rules: Vec<ComponentItem>,
    pub selected: Vec<ComponentRef>,
    pub registry: TagRegistry,
    pub all_tags: Vec<String>,
    /// Whether the pools currently hold archived components too.
    pub includes_archived: bool,
    snapshot: Vec<ComponentRef>,
    section_order: Vec<ComponentType>,
}

impl DataStore {
    pub fn new(mut pipeline: Pipeline, section_order: Vec<ComponentType>) -> Self {
        let selected = std::mem::take(&mut pipeline.components);
        let mut data = Self {
            pipeline,
            prompts: Vec::new(),
            contexts: Vec::new(),
            rules: Vec::new(),
            filtered_prompts: Vec::new(),
            filtered_contexts: Vec::new(),
            filtered_rules: Vec::new(),
            selected,
            registry: TagRegistry::default(),
            all_tags: Vec::new(),
            includes_archived: false,
            snapshot: Vec::new(),
            section_order,
        };
        data.regroup();
        data.snapshot_original();
        data
    }

    pub fn section_order(&self) -> &[ComponentType] {
        &self.section_order
    }

    /// Replace the pools. Filtered views are reset to the full pools.
    pub fn set_pools(&mut self, pools: Pools) {
        self.filtered_prompts = pools.prompts.clone();
        self.filtered_contexts = pools.contexts.clone();
        self.filtered_rules = pools.rules.clone();
        self.prompts = pools.prompts;
        self.contexts = pools.contexts;
        self.rules = pools.rules;
        self.registry = pools.registry;
        self.all_tags = pools.all_tags;
        self.includes_archived = pools.includes_archived;
    }

    pub fn set_filtered_views(
        &mut self,
        prompts: Vec<ComponentItem>,
        contexts: Vec<ComponentItem>,
        rules: Vec<ComponentItem>,
    ) {
        self.filtered_prompts = prompts;
        self.filtered_contexts = contexts;
        self.filtered_rules = rules;
    }

    pub fn pool(&self, t: ComponentType) -> &[ComponentItem] {
        match t {
            ComponentType::Prompt => &self.prompts,
            ComponentType::Context => &self.contexts,
            ComponentType::Rules => &self.rules,
        }
    }

    pub fn filtered(&self, t: ComponentType) -> &[ComponentItem] {
        match t {
            ComponentType::Prompt => &self.filtered_prompts,
            ComponentType::Context => &self.filtered_contexts,
            ComponentType::Rules => &self.filtered_rules,
        }
    }

    /// Filtered views flattened in section order; what the left column lists.
    pub fn available(&self) -> Vec<&ComponentItem> {
        self.section_order
            .iter()
            .flat_map(|t| self.filtered(*t).iter())
            .collect()
    }

    /// Pool entry for a canonical path.
    pub fn find(&self, path: &str) -> Option<&ComponentItem> {
        let path = canonical_path(path);
        ComponentType::ALL
            .iter()
            .flat_map(|t| self.pool(*t).iter())
            .find(|i| i.path == path)
    }

    pub fn is_selected(&self, path: &str) -> bool {
        let path = canonical_path(path);
        self.selected.iter().any(|r| r.canonical_path() == path)
    }

    /// Add the ref, or remove it if its path is already selected.
    pub fn insert_if_absent(&mut self, r: ComponentRef) -> Toggle {
        let path = r.canonical_path().to_string();
        if let Some(i) = self
            .selected
            .iter()
            .position(|s| s.canonical_path() == path)
        {
            self.selected.remove(i);
            self.update_local_usage(&path, -1);
            self.regroup();
            return Toggle::Removed(i);
        }
        self.selected.push(r);
        self.update_local_usage(&path, 1);
        self.regroup();
        let at = self
            .selected
            .iter()
            .position(|s| s.canonical_path() == path)
            .unwrap_or(0);
        Toggle::Added(at)
    }

    pub fn remove_at(&mut self, i: usize) -> Option<ComponentRef> {
        if i >= self.selected.len() {
            return None;
        }
        let removed = self.selected.remove(i);
        self.update_local_usage(removed.canonical_path(), -1);
        self.regroup();
        Some(removed)
    }

    /// Swap with the neighbour if it has the same type. Returns the new index.
    pub fn swap_with_neighbor(&mut self, i: usize, dir: Direction) -> Option<usize> {
        let j = match dir {
            Direction::Up => i.checked_sub(1)?,
            Direction::Down => i + 1,
        };
        let (a, b) = (self.selected.get(i)?, self.selected.get(j)?);
        if a.component_type != b.component_type {
            return None;
        }
        self.selected.swap(i, j);
        self.regroup();
        Some(j)
    }

    /// Stable-partition the selection by section order and renumber 1..N.
    pub fn regroup(&mut self) {
        let mut grouped = Vec::with_capacity(self.selected.len());
        for t in &self.section_order {
            grouped.extend(
                self.selected
                    .iter()
                    .filter(|r| r.component_type == *t)
                    .cloned(),
            );
        }
        // Types missing from the section order keep their relative order at the end.
        grouped.extend(
            self.selected
                .iter()
                .filter(|r| !self.section_order.contains(&r.component_type))
                .cloned(),
        );
        for (i, r) in grouped.iter_mut().enumerate() {
            r.order = i + 1;
        }
        self.selected = grouped;
    }

    pub fn snapshot_original(&mut self) {
        self.snapshot = self.selected.clone();
    }

    /// Take the snapshot from what was actually written, which may predate
    /// edits made while the save was in flight.
    pub fn snapshot_from(&mut self, saved: &[ComponentRef]) {
        self.snapshot = saved.to_vec();
    }

    pub fn is_dirty(&self) -> bool {
        if !self.pipeline.is_saved() {
            return !self.selected.is_empty();
        }
        self.selected.len() != self.snapshot.len()
            || self
                .selected
                .iter()
                .zip(&self.snapshot)
                .any(|(a, b)| a.canonical_path() != b.canonical_path())
    }

    /// Adjust a pool entry's usage count, floored at zero.
    pub fn update_local_usage(&mut self, path: &str, delta: i64) {
        let path = canonical_path(path);
        for pool in [
            &mut self.prompts,
            &mut self.contexts,
            &mut self.rules,
            &mut self.filtered_prompts,
            &mut self.filtered_contexts,
            &mut self.filtered_rules,
        ] {
            if let Some(item) = pool.iter_mut().find(|i| i.path == path) {
                item.usage_count = item.usage_count.saturating_add_signed(delta as isize);
            }
        }
    }

    /// Point selection and snapshot refs at a moved file.
    pub fn replace_path(&mut self, from: &str, to: &str) {
        let from = canonical_path(from).to_string();
        for r in self.selected.iter_mut().chain(self.snapshot.iter_mut()) {
            if r.canonical_path() == from {
                r.path = to_ref_path(to);
            }
        }
    }

    /// Drop a deleted file from selection and snapshot.
    pub fn drop_path(&mut self, path: &str) {
        let path = canonical_path(path).to_string();
        self.selected.retain(|r| r.canonical_path() != path);
        self.snapshot.retain(|r| r.canonical_path() != path);
        self.regroup();
    }

    /// The pipeline as it would be written now.
    pub fn to_pipeline(&self) -> Pipeline {
        Pipeline {
            components: self.selected.clone(),
            ..self.pipeline.clone()
        }
    }
}
