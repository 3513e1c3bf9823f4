//! The central reactive state of one keymap UI instance.
//!
//! All mutation goes through [`KeymapUiState::set_states_by_ids`] (or
//! [`KeymapUiState::set_models_and_maps`] when the available layouts change).
//! Each call:
//!
//! 1. resolves ID-based arguments to live layout/guide/key references,
//!    failing without touching the state if any lookup fails,
//! 2. derives every dependent field in one pass,
//! 3. dispatches exactly one [`StateChangeMap`] to the attached observers,
//!    containing only the fields whose values actually changed.
//!
//! Observers receive `&KeymapUiState`, so they can read anything but cannot
//! mutate the state from inside a notification.

use crate::connection::{ConnectionPair, derive_connections};
use crate::error::{ModelError, StateError, StateResult};
use crate::id::KeyId;
use crate::model::{GuideStep, KeyboardModel, KeymapGuide, KeymapKey, KeymapLayer, KeymapLayout, StepContent};
use serde::Serialize;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

// ─── Fields & changes ────────────────────────────────────────────────────

/// Every observable field of the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum StateField {
    Keymaps,
    Keymap,
    Layer,
    SelectedKey,
    Guide,
    GuideStep,
    Debug,
    QueryPrefix,
    ConnectionPairs,
    Initialized,
}

impl StateField {
    pub fn name(self) -> &'static str {
        match self {
            StateField::Keymaps => "keymaps",
            StateField::Keymap => "keymap",
            StateField::Layer => "layer",
            StateField::SelectedKey => "selectedKey",
            StateField::Guide => "guide",
            StateField::GuideStep => "guideStep",
            StateField::Debug => "debug",
            StateField::QueryPrefix => "queryPrefix",
            StateField::ConnectionPairs => "connectionPairs",
            StateField::Initialized => "initialized",
        }
    }

    /// Fields that are mirrored into the URL query string.
    pub fn is_url_field(self) -> bool {
        matches!(
            self,
            StateField::Keymap
                | StateField::Layer
                | StateField::SelectedKey
                | StateField::Guide
                | StateField::GuideStep
        )
    }
}

/// A field value as seen by observers. Live objects are reported by ID;
/// observers read the objects themselves from the state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StateValue {
    Empty,
    Flag(bool),
    Index(usize),
    Level(u32),
    Id(String),
    Ids(Vec<String>),
    Connections(Vec<ConnectionPair>),
}

impl fmt::Display for StateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateValue::Empty => f.write_str("null"),
            StateValue::Flag(b) => write!(f, "{b}"),
            StateValue::Index(i) => write!(f, "{i}"),
            StateValue::Level(l) => write!(f, "{l}"),
            StateValue::Id(s) => f.write_str(s),
            StateValue::Ids(ids) => write!(f, "[{}]", ids.join(", ")),
            StateValue::Connections(c) => write!(f, "{} connections", c.len()),
        }
    }
}

/// Metadata attached to every change produced by one call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeMetadata {
    /// Set for direct user input; decides push vs. replace navigation.
    pub is_user_initiated: bool,
}

impl ChangeMetadata {
    pub fn user() -> Self {
        Self {
            is_user_initiated: true,
        }
    }
}

/// One field's transition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateChange {
    pub field: StateField,
    pub old: StateValue,
    pub new: StateValue,
    pub metadata: ChangeMetadata,
}

impl fmt::Display for StateChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StateChange({}, {}, {})", self.field.name(), self.old, self.new)
    }
}

/// The changes produced by one mutation call, keyed by field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateChangeMap(BTreeMap<StateField, StateChange>);

impl StateChangeMap {
    pub fn has(&self, field: StateField) -> bool {
        self.0.contains_key(&field)
    }

    /// True if any of `fields` changed.
    pub fn has_any(&self, fields: &[StateField]) -> bool {
        fields.iter().any(|f| self.has(*f))
    }

    pub fn get(&self, field: StateField) -> Option<&StateChange> {
        self.0.get(&field)
    }

    pub fn iter(&self) -> impl Iterator<Item = &StateChange> {
        self.0.values()
    }

    pub fn fields(&self) -> impl Iterator<Item = StateField> + '_ {
        self.0.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn insert(&mut self, change: StateChange) {
        self.0.insert(change.field, change);
    }
}

// ─── Observers ───────────────────────────────────────────────────────────

/// Something that re-renders when the state changes.
pub trait StateObserver {
    /// Stable name used in logs.
    fn observer_name(&self) -> &str;

    fn update(&mut self, state: &KeymapUiState, changes: &StateChangeMap);
}

/// Returned by `attach`, used to `detach`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverHandle(u64);

type SharedObserver = Rc<RefCell<dyn StateObserver>>;

/// The attached observers, in registration order.
///
/// Shared via `Rc` so an observer can detach itself (or another observer)
/// while a notification is being dispatched; the detached observer is not
/// called for the rest of that dispatch.
#[derive(Default)]
pub struct ObserverRegistry {
    entries: RefCell<Vec<(ObserverHandle, SharedObserver)>>,
    next: Cell<u64>,
}

impl ObserverRegistry {
    pub fn attach(&self, observer: SharedObserver) -> ObserverHandle {
        let handle = ObserverHandle(self.next.get());
        self.next.set(handle.0 + 1);
        if let Ok(o) = observer.try_borrow() {
            log::debug!("attach observer {} as {handle:?}", o.observer_name());
        }
        self.entries.borrow_mut().push((handle, observer));
        handle
    }

    /// Returns false if the handle was not attached.
    pub fn detach(&self, handle: ObserverHandle) -> bool {
        let mut entries = self.entries.borrow_mut();
        let before = entries.len();
        entries.retain(|(h, _)| *h != handle);
        before != entries.len()
    }

    pub fn is_attached(&self, handle: ObserverHandle) -> bool {
        self.entries.borrow().iter().any(|(h, _)| *h == handle)
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    fn handles(&self) -> Vec<ObserverHandle> {
        self.entries.borrow().iter().map(|(h, _)| *h).collect()
    }

    fn get(&self, handle: ObserverHandle) -> Option<SharedObserver> {
        self.entries
            .borrow()
            .iter()
            .find(|(h, _)| *h == handle)
            .map(|(_, o)| Rc::clone(o))
    }
}

impl fmt::Debug for ObserverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverRegistry")
            .field("attached", &self.len())
            .finish()
    }
}

// ─── Update arguments ────────────────────────────────────────────────────

/// The externally addressable fields, by ID. `None` means "not given".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateIdArgs {
    pub keymap_id: Option<String>,
    pub layer_idx: Option<i64>,
    /// An empty string clears the selection.
    pub selected_key: Option<String>,
    /// `Some(None)` leaves the guide; `Some(Some(id))` enters one.
    pub guide_id: Option<Option<String>>,
    /// Clamped to the guide's step range.
    pub guide_step_idx: Option<i64>,
    pub debug: Option<u32>,
    pub query_prefix: Option<String>,
}

impl StateIdArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keymap(mut self, id: impl Into<String>) -> Self {
        self.keymap_id = Some(id.into());
        self
    }

    pub fn layer(mut self, idx: i64) -> Self {
        self.layer_idx = Some(idx);
        self
    }

    pub fn key(mut self, id: impl Into<String>) -> Self {
        self.selected_key = Some(id.into());
        self
    }

    pub fn guide(mut self, id: Option<&str>) -> Self {
        self.guide_id = Some(id.map(str::to_string));
        self
    }

    pub fn step(mut self, idx: i64) -> Self {
        self.guide_step_idx = Some(idx);
        self
    }

    pub fn debug(mut self, level: u32) -> Self {
        self.debug = Some(level);
        self
    }

    pub fn query_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.query_prefix = Some(prefix.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Fields given in `over` win over fields given in `self`.
    pub fn overridden_by(self, over: StateIdArgs) -> StateIdArgs {
        StateIdArgs {
            keymap_id: over.keymap_id.or(self.keymap_id),
            layer_idx: over.layer_idx.or(self.layer_idx),
            selected_key: over.selected_key.or(self.selected_key),
            guide_id: over.guide_id.or(self.guide_id),
            guide_step_idx: over.guide_step_idx.or(self.guide_step_idx),
            debug: over.debug.or(self.debug),
            query_prefix: over.query_prefix.or(self.query_prefix),
        }
    }
}

// ─── Info panel content ──────────────────────────────────────────────────

/// What the info panel shows, in priority order.
#[derive(Debug, Clone, Copy)]
pub enum InfoContent<'a> {
    /// The active key: the selected key, or the key of the current step.
    Key(&'a KeymapKey),
    /// A guide step with its own title and text.
    Step(&'a GuideStep),
    /// The layer's welcome text.
    Welcome(&'a KeymapLayer),
}

impl<'a> InfoContent<'a> {
    fn resolve(
        layer: &'a KeymapLayer,
        selected_key: Option<KeyId>,
        step: Option<&'a GuideStep>,
    ) -> Self {
        let active = match step {
            Some(step) => step.key_id(),
            None => selected_key,
        };
        if let Some(key) = active.and_then(|id| layer.get(id)) {
            return InfoContent::Key(key);
        }
        match step {
            Some(step) if matches!(step.content, StepContent::Prose { .. }) => InfoContent::Step(step),
            _ => InfoContent::Welcome(layer),
        }
    }

    pub fn active_key(&self) -> Option<KeyId> {
        match self {
            InfoContent::Key(key) => Some(key.id),
            _ => None,
        }
    }

    pub fn paragraphs(&self) -> &'a [String] {
        match *self {
            InfoContent::Key(key) => key.info.as_slice(),
            InfoContent::Step(step) => match &step.content {
                StepContent::Prose { text, .. } => text.as_slice(),
                StepContent::Key(_) => &[],
            },
            InfoContent::Welcome(layer) => layer.welcome.as_slice(),
        }
    }

    /// Keys highlighted alongside the active one.
    pub fn selection(&self) -> &'a [KeyId] {
        match *self {
            InfoContent::Key(key) => key.selection.as_slice(),
            InfoContent::Step(step) => step.selection.as_slice(),
            InfoContent::Welcome(_) => &[],
        }
    }
}

/// Plain-data view of the addressable fields, for query-string writing and
/// for export to a host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshot {
    pub keymap_id: String,
    pub default_keymap_id: String,
    pub layer_idx: usize,
    pub selected_key: Option<String>,
    pub guide_id: Option<String>,
    pub guide_step_idx: Option<usize>,
    pub debug: u32,
    pub query_prefix: String,
}

// ─── State container ─────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct Fields {
    keymap: Arc<KeymapLayout>,
    layer: usize,
    selected_key: Option<KeyId>,
    guide: Option<usize>,
    guide_step: Option<usize>,
    debug: u32,
    query_prefix: String,
    connection_pairs: Vec<ConnectionPair>,
    initialized: bool,
}

/// The state of one keymap UI instance.
#[derive(Debug)]
pub struct KeymapUiState {
    keymaps: Vec<Arc<KeymapLayout>>,
    fields: Fields,
    observers: Rc<ObserverRegistry>,
}

impl Default for KeymapUiState {
    fn default() -> Self {
        Self::new()
    }
}

impl KeymapUiState {
    /// A state showing the blank layout of the fallback keyboard.
    pub fn new() -> Self {
        let keymap = Arc::new(fallback_layout());
        let fields = Fields {
            keymap: Arc::clone(&keymap),
            layer: 0,
            selected_key: None,
            guide: None,
            guide_step: None,
            debug: 0,
            query_prefix: String::new(),
            connection_pairs: Vec::new(),
            initialized: false,
        };
        let mut state = Self {
            keymaps: vec![keymap],
            fields,
            observers: Rc::new(ObserverRegistry::default()),
        };
        state.fields.connection_pairs = state.connections_for(&state.fields);
        state
    }

    // ─── Observers ───────────────────────────────────────────────────────

    pub fn attach(&self, observer: SharedObserver) -> ObserverHandle {
        self.observers.attach(observer)
    }

    pub fn detach(&self, handle: ObserverHandle) -> bool {
        self.observers.detach(handle)
    }

    /// The registry, for observers that need to detach during a dispatch.
    pub fn observers(&self) -> Rc<ObserverRegistry> {
        Rc::clone(&self.observers)
    }

    fn notify(&self, changes: &StateChangeMap) {
        for handle in self.observers.handles() {
            // Re-check: an earlier observer may have detached this one.
            let Some(observer) = self.observers.get(handle) else {
                continue;
            };
            match observer.try_borrow_mut() {
                Ok(mut observer) => {
                    log::trace!("notify {} of {} changes", observer.observer_name(), changes.len());
                    observer.update(self, changes);
                }
                Err(_) => log::error!("observer {handle:?} is busy; skipping notification"),
            }
        }
    }

    // ─── Accessors ───────────────────────────────────────────────────────

    /// All registered layouts, in registration order.
    pub fn keymaps(&self) -> &[Arc<KeymapLayout>] {
        &self.keymaps
    }

    pub fn keymap(&self) -> &Arc<KeymapLayout> {
        &self.fields.keymap
    }

    /// The first registered layout.
    pub fn default_keymap(&self) -> &Arc<KeymapLayout> {
        &self.keymaps[0]
    }

    pub fn model(&self) -> &Arc<KeyboardModel> {
        &self.fields.keymap.model
    }

    pub fn layer(&self) -> &KeymapLayer {
        &self.fields.keymap.layers[self.fields.layer]
    }

    pub fn layer_index(&self) -> usize {
        self.fields.layer
    }

    pub fn selected_key(&self) -> Option<KeyId> {
        self.fields.selected_key
    }

    pub fn guide(&self) -> Option<&KeymapGuide> {
        self.fields.guide.map(|g| &self.fields.keymap.guides[g])
    }

    pub fn guide_step(&self) -> Option<&GuideStep> {
        self.guide()
            .zip(self.fields.guide_step)
            .and_then(|(g, s)| g.step(s))
    }

    pub fn debug(&self) -> u32 {
        self.fields.debug
    }

    pub fn query_prefix(&self) -> &str {
        &self.fields.query_prefix
    }

    pub fn connection_pairs(&self) -> &[ConnectionPair] {
        &self.fields.connection_pairs
    }

    pub fn initialized(&self) -> bool {
        self.fields.initialized
    }

    pub fn info_content(&self) -> InfoContent<'_> {
        InfoContent::resolve(self.layer(), self.fields.selected_key, self.guide_step())
    }

    /// The key the info panel describes, if any.
    pub fn active_key(&self) -> Option<KeyId> {
        self.info_content().active_key()
    }

    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            keymap_id: self.fields.keymap.unique_id.clone(),
            default_keymap_id: self.default_keymap().unique_id.clone(),
            layer_idx: self.fields.layer,
            selected_key: self.fields.selected_key.map(|k| k.to_string()),
            guide_id: self.guide().map(|g| g.id.clone()),
            guide_step_idx: self.guide_step().map(|s| s.index),
            debug: self.fields.debug,
            query_prefix: self.fields.query_prefix.clone(),
        }
    }

    // ─── Mutation ────────────────────────────────────────────────────────

    /// Apply any subset of the addressable fields and derive the rest.
    ///
    /// Returns the changes that were dispatched. An empty map means nothing
    /// changed and no observer was notified.
    pub fn set_states_by_ids(
        &mut self,
        args: StateIdArgs,
        metadata: ChangeMetadata,
    ) -> StateResult<StateChangeMap> {
        let next = self.derive(&self.keymaps, None, &args)?;
        let changes = self.commit(None, next, metadata);
        Ok(changes)
    }

    /// Replace the registered layouts. The active layout is kept when a
    /// layout with the same unique ID is still registered; otherwise the
    /// first layout becomes active. An empty list falls back to the blank
    /// layout of the fallback keyboard.
    pub fn set_models_and_maps(
        &mut self,
        layouts: Vec<KeymapLayout>,
    ) -> StateResult<StateChangeMap> {
        let mut seen = HashSet::new();
        let duplicates: Vec<String> = layouts
            .iter()
            .filter(|l| !seen.insert(l.unique_id.as_str()))
            .map(|l| l.unique_id.clone())
            .collect();
        if !duplicates.is_empty() {
            return Err(ModelError::DuplicateLayouts { ids: duplicates }.into());
        }

        let keymaps: Vec<Arc<KeymapLayout>> = if layouts.is_empty() {
            vec![Arc::new(fallback_layout())]
        } else {
            layouts.into_iter().map(Arc::new).collect()
        };
        let active = keymaps
            .iter()
            .find(|l| l.unique_id == self.fields.keymap.unique_id)
            .unwrap_or(&keymaps[0]);
        let next = self.derive(&keymaps, Some(active), &StateIdArgs::default())?;
        Ok(self.commit(Some(keymaps), next, ChangeMetadata::default()))
    }

    /// Mark the state as owned by a live UI root.
    pub fn set_initialized(&mut self, initialized: bool) -> StateChangeMap {
        let mut next = self.fields.clone();
        next.initialized = initialized;
        self.commit(None, next, ChangeMetadata::default())
    }

    /// Compute the next field values without mutating anything.
    fn derive(
        &self,
        keymaps: &[Arc<KeymapLayout>],
        forced_keymap: Option<&Arc<KeymapLayout>>,
        args: &StateIdArgs,
    ) -> StateResult<Fields> {
        let cur = &self.fields;

        let keymap = match (&args.keymap_id, forced_keymap) {
            (_, Some(forced)) => Arc::clone(forced),
            (Some(id), None) => keymaps
                .iter()
                .find(|l| &l.unique_id == id)
                .cloned()
                .ok_or_else(|| StateError::UnknownLayout(id.clone()))?,
            (None, None) => Arc::clone(&cur.keymap),
        };
        let layout_changed = !Arc::ptr_eq(&keymap, &cur.keymap);

        // Guides belong to a layout, so a new layout drops the old guide.
        let guide = match &args.guide_id {
            Some(Some(id)) => Some(keymap.guide_index(id).ok_or_else(|| StateError::UnknownGuide {
                layout: keymap.unique_id.clone(),
                guide: id.clone(),
            })?),
            Some(None) => None,
            None if layout_changed => None,
            None => cur.guide,
        };
        let guide_changed = layout_changed || guide != cur.guide;

        let guide_step = match guide {
            None => None,
            Some(g) => {
                let requested = args.guide_step_idx.unwrap_or(match cur.guide_step {
                    Some(s) if !guide_changed => s as i64,
                    _ => 0,
                });
                Some(keymap.guides[g].clamp_step(requested))
            }
        };
        let step_changed = guide_changed || guide_step != cur.guide_step;

        // A step may ask for a specific layer when it becomes active.
        let step_layer = if step_changed {
            guide
                .zip(guide_step)
                .and_then(|(g, s)| keymap.guides[g].step(s))
                .and_then(|s| s.layer_idx)
        } else {
            None
        };

        let layer = match args.layer_idx {
            Some(idx) => {
                if idx < 0 || idx as usize >= keymap.layers.len() {
                    return Err(StateError::UnknownLayer {
                        layout: keymap.unique_id.clone(),
                        index: idx,
                        count: keymap.layers.len(),
                    });
                }
                idx as usize
            }
            None => match step_layer {
                Some(l) => l,
                None if layout_changed => 0,
                None => cur.layer,
            },
        };
        let layer_changed = layout_changed || layer != cur.layer;

        let selected_key = match args.selected_key.as_deref() {
            Some("") => None,
            Some(id) => {
                let key = KeyId::lookup(id)
                    .filter(|k| keymap.layers[layer].contains(*k))
                    .ok_or_else(|| StateError::UnknownKey {
                        layout: keymap.unique_id.clone(),
                        key: id.to_string(),
                    })?;
                Some(key)
            }
            None if layer_changed => None,
            None => cur.selected_key,
        };

        let mut next = Fields {
            keymap,
            layer,
            selected_key,
            guide,
            guide_step,
            debug: args.debug.unwrap_or(cur.debug),
            query_prefix: args
                .query_prefix
                .clone()
                .unwrap_or_else(|| cur.query_prefix.clone()),
            connection_pairs: Vec::new(),
            initialized: cur.initialized,
        };
        next.connection_pairs = self.connections_for(&next);
        Ok(next)
    }

    /// Connections are a pure function of layer, selected key and step.
    fn connections_for(&self, fields: &Fields) -> Vec<ConnectionPair> {
        let layer = &fields.keymap.layers[fields.layer];
        let step = fields
            .guide
            .zip(fields.guide_step)
            .and_then(|(g, s)| fields.keymap.guides[g].step(s));
        let content = InfoContent::resolve(layer, fields.selected_key, step);
        derive_connections(layer, content.active_key(), content.paragraphs())
    }

    /// Swap in the new fields, build the change map, notify once.
    fn commit(
        &mut self,
        keymaps: Option<Vec<Arc<KeymapLayout>>>,
        next: Fields,
        metadata: ChangeMetadata,
    ) -> StateChangeMap {
        let mut changes = StateChangeMap::default();
        let mut record = |field, old, new| {
            changes.insert(StateChange {
                field,
                old,
                new,
                metadata,
            })
        };

        if let Some(keymaps) = keymaps {
            let same = keymaps.len() == self.keymaps.len()
                && keymaps.iter().zip(&self.keymaps).all(|(a, b)| Arc::ptr_eq(a, b));
            if !same {
                record(
                    StateField::Keymaps,
                    StateValue::Ids(self.keymaps.iter().map(|l| l.unique_id.clone()).collect()),
                    StateValue::Ids(keymaps.iter().map(|l| l.unique_id.clone()).collect()),
                );
                self.keymaps = keymaps;
            }
        }

        let cur = &self.fields;
        let layout_changed = !Arc::ptr_eq(&cur.keymap, &next.keymap);
        if layout_changed {
            record(
                StateField::Keymap,
                StateValue::Id(cur.keymap.unique_id.clone()),
                StateValue::Id(next.keymap.unique_id.clone()),
            );
        }
        if layout_changed || cur.layer != next.layer {
            record(
                StateField::Layer,
                StateValue::Index(cur.layer),
                StateValue::Index(next.layer),
            );
        }
        if cur.selected_key != next.selected_key {
            record(
                StateField::SelectedKey,
                key_value(cur.selected_key),
                key_value(next.selected_key),
            );
        }
        if layout_changed || cur.guide != next.guide {
            let guide_id = |f: &Fields| {
                f.guide
                    .map_or(StateValue::Empty, |g| StateValue::Id(f.keymap.guides[g].id.clone()))
            };
            let (old, new) = (guide_id(cur), guide_id(&next));
            if old != new || cur.guide.is_some() || next.guide.is_some() {
                record(StateField::Guide, old, new);
            }
        }
        if layout_changed || cur.guide != next.guide || cur.guide_step != next.guide_step {
            let step = |s: Option<usize>| s.map_or(StateValue::Empty, StateValue::Index);
            if cur.guide_step.is_some() || next.guide_step.is_some() {
                record(StateField::GuideStep, step(cur.guide_step), step(next.guide_step));
            }
        }
        if cur.debug != next.debug {
            record(
                StateField::Debug,
                StateValue::Level(cur.debug),
                StateValue::Level(next.debug),
            );
        }
        if cur.query_prefix != next.query_prefix {
            record(
                StateField::QueryPrefix,
                StateValue::Id(cur.query_prefix.clone()),
                StateValue::Id(next.query_prefix.clone()),
            );
        }
        if cur.connection_pairs != next.connection_pairs {
            record(
                StateField::ConnectionPairs,
                StateValue::Connections(cur.connection_pairs.clone()),
                StateValue::Connections(next.connection_pairs.clone()),
            );
        }
        if cur.initialized != next.initialized {
            record(
                StateField::Initialized,
                StateValue::Flag(cur.initialized),
                StateValue::Flag(next.initialized),
            );
        }

        self.fields = next;

        if !changes.is_empty() {
            log::debug!(
                "state: {}",
                changes.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
            );
            self.notify(&changes);
        }
        changes
    }
}

fn key_value(key: Option<KeyId>) -> StateValue {
    key.map_or(StateValue::Empty, |k| StateValue::Id(k.to_string()))
}

fn fallback_layout() -> KeymapLayout {
    let model = KeyboardModel::fallback();
    KeyboardModel::blank_layout(&model)
        .unwrap_or_else(|e| unreachable!("blank layout of the fallback keyboard is valid: {e}"))
}
