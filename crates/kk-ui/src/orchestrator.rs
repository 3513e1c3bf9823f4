//! `KeymapUi`: one keymap UI root.
//!
//! Owns the state container, the view tree and the two observers (navbar
//! and diagram). Every input (key clicks, attribute changes, history
//! navigation, navbar actions) becomes a single `set_states_by_ids` call;
//! the returned change map then drives reconciliation:
//!
//! - `queryPrefix` → drop the old prefix from the URL, re-read the query
//! - `keymap` → swap the keyboard element if the model uses another one
//! - `keymap` / `layer` → recreate the key children
//! - `keymap` / `layer` / `guide` / `guideStep` / `selectedKey` → rebuild
//!   the info prose and per-key attributes
//! - any URL field → write the query string, pushing history for user input

use crate::diagram_view::{DiagramView, UiConfig, UiGeometry};
use crate::env::Environment;
use crate::error::{UiError, UiResult};
use crate::navbar::{NavbarAction, NavbarView};
use crate::prose::InfoProse;
use crate::selection::SelectionState;
use crate::view::{Region, ViewKind, ViewNode, ViewTree};
use kk_core::query::{keymap_baseline, strip_prefixed};
use kk_core::{
    ChangeMetadata, ElementAttributes, KeyId, KeyboardModel, KeymapLayout, KeymapUiState, Legend,
    NavigationMode, ObserverHandle, StateChangeMap, StateField, StateIdArgs, StateObserver,
    load_layouts, read_state_args, write_query,
};
use kk_render::{DrawSurface, hit_test_key};
use kurbo::{Point, Size};
use std::cell::{Ref, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

/// Parent → children, outermost first.
const LAYOUT: [(Region, &[Region]); 4] = [
    (Region::Root, &[Region::Styling, Region::KidContainer, Region::Diagram]),
    (
        Region::KidContainer,
        &[Region::DiamargLeft, Region::CenterPanel, Region::DiamargRight],
    ),
    (Region::CenterPanel, &[Region::Keyboard, Region::InfoContainer]),
    (Region::InfoContainer, &[Region::Navbar, Region::InfoProse]),
];

pub struct KeymapUi<E: Environment> {
    env: E,
    state: KeymapUiState,
    attributes: ElementAttributes,
    tree: ViewTree,
    navbar: Rc<RefCell<NavbarView>>,
    diagram: Rc<RefCell<DiagramView>>,
    handles: Vec<ObserverHandle>,
    prose: InfoProse,
    /// The prefix the URL was last synced under.
    synced_prefix: String,
    connected: bool,
}

impl<E: Environment> KeymapUi<E> {
    pub fn new(env: E, surface: Box<dyn DrawSurface>, config: UiConfig) -> Self {
        let state = KeymapUiState::new();
        let navbar = Rc::new(RefCell::new(NavbarView::new(&state)));
        let diagram = Rc::new(RefCell::new(DiagramView::new(surface, config)));
        let prose = InfoProse::from_state(&state);
        Self {
            env,
            state,
            attributes: ElementAttributes::default(),
            tree: ViewTree::new(),
            navbar,
            diagram,
            handles: Vec::new(),
            prose,
            synced_prefix: String::new(),
            connected: false,
        }
    }

    // ─── Accessors ───────────────────────────────────────────────────────

    pub fn env(&self) -> &E {
        &self.env
    }

    pub fn env_mut(&mut self) -> &mut E {
        &mut self.env
    }

    pub fn state(&self) -> &KeymapUiState {
        &self.state
    }

    pub fn tree(&self) -> &ViewTree {
        &self.tree
    }

    pub fn navbar(&self) -> Ref<'_, NavbarView> {
        self.navbar.borrow()
    }

    pub fn diagram(&self) -> Ref<'_, DiagramView> {
        self.diagram.borrow()
    }

    pub fn prose(&self) -> &InfoProse {
        &self.prose
    }

    pub fn attributes(&self) -> &ElementAttributes {
        &self.attributes
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn selection(&self) -> SelectionState {
        SelectionState::of(&self.state)
    }

    /// The attribute value of the key node for `id`, if rendered.
    pub fn key_attribute(&self, id: &str, name: &str) -> Option<&str> {
        let idx = self.tree.key_node(KeyId::lookup(id)?)?;
        self.tree.node(idx)?.attribute(name)
    }

    /// The key under a page position, topmost first.
    pub fn key_at(&self, point: Point) -> Option<KeyId> {
        hit_test_key(self.diagram.borrow().placement(), point)
    }

    // ─── Lifecycle ───────────────────────────────────────────────────────

    /// Replace the available layouts.
    pub fn set_models_and_maps(&mut self, layouts: Vec<KeymapLayout>) -> UiResult<()> {
        let changes = self.state.set_models_and_maps(layouts)?;
        self.react(&changes)
    }

    /// Parse a JSON layout bundle and register its layouts.
    pub fn load_bundle(&mut self, json: &str) -> UiResult<()> {
        let layouts = load_layouts(json)?;
        self.set_models_and_maps(layouts)
    }

    /// Attach to the page: attributes first, then the query string on top.
    pub fn connect(&mut self, attributes: ElementAttributes) -> UiResult<()> {
        self.attributes = attributes;
        self.attach_observers();
        self.connected = true;
        log::debug!("connect: {:?}", self.attributes);

        let changes = self.state.set_initialized(true);
        self.react(&changes)?;

        self.synced_prefix = self.state.query_prefix().to_string();
        let search = self.env.search();
        let args = read_state_args(&search, self.state.query_prefix(), "", Some(&self.attributes), false);
        self.apply(args, ChangeMetadata::default())?;

        self.ensure_keyboard()?;
        self.rebuild_keys()?;
        self.update_info_prose()?;
        self.redraw_diagram()
    }

    /// Detach observers. The state is kept so the UI can be reconnected.
    pub fn disconnect(&mut self) {
        for handle in self.handles.drain(..) {
            self.state.detach(handle);
        }
        self.state.set_initialized(false);
        self.connected = false;
        log::debug!("disconnect");
    }

    fn attach_observers(&mut self) {
        if !self.handles.is_empty() {
            return;
        }
        // Anything that happened while detached is not in a change map.
        *self.navbar.borrow_mut() = NavbarView::new(&self.state);
        let navbar: Rc<RefCell<dyn StateObserver>> = self.navbar.clone();
        let diagram: Rc<RefCell<dyn StateObserver>> = self.diagram.clone();
        self.handles.push(self.state.attach(navbar));
        self.handles.push(self.state.attach(diagram));
    }

    // ─── Inputs ──────────────────────────────────────────────────────────

    /// A click on a board key: select it, or clear the selection if it was
    /// already selected.
    pub fn handle_key_selected(&mut self, key_id: &str) -> UiResult<()> {
        let already = self.state.selected_key().is_some_and(|k| k.as_str() == key_id);
        let next = if already { "" } else { key_id };
        self.apply(StateIdArgs::new().key(next), ChangeMetadata::user())
    }

    /// An element attribute was set (`Some`) or removed (`None`).
    pub fn set_attribute(&mut self, name: &str, value: Option<&str>) -> UiResult<()> {
        if !self.attributes.set(name, value.map(str::to_string)) {
            log::error!("unhandled attribute: {name}");
            return Err(UiError::UnknownAttribute(name.to_string()));
        }
        if !self.connected {
            return Ok(());
        }
        let args = match name {
            "debug" => StateIdArgs::new().debug(self.attributes.debug_level()),
            "keymap-id" => match value {
                Some(id) => StateIdArgs::new().keymap(id),
                None => return Ok(()),
            },
            "layer" => StateIdArgs::new().layer(value.and_then(|v| v.trim().parse().ok()).unwrap_or(0)),
            "selected-key" => StateIdArgs::new().key(value.unwrap_or("")),
            "query-prefix" => StateIdArgs::new().query_prefix(value.unwrap_or("")),
            // Guide attributes only move the baseline the URL is written against.
            _ => {
                self.sync_query(NavigationMode::Replace);
                return Ok(());
            }
        };
        self.apply(args, ChangeMetadata::default())
    }

    /// Browser back/forward: the URL is the whole truth, so absent
    /// parameters reset their fields.
    pub fn handle_pop_state(&mut self) -> UiResult<()> {
        let search = self.env.search();
        let baseline = keymap_baseline(&self.attributes, &self.state.default_keymap().unique_id);
        let args = read_state_args(&search, self.state.query_prefix(), baseline, None, true);
        self.apply(args, ChangeMetadata::default())
    }

    pub fn navbar_action(&mut self, action: NavbarAction) -> UiResult<()> {
        let Some(args) = action.to_args(&self.state) else {
            log::debug!("navbar: {action:?} is disabled");
            return Ok(());
        };
        self.apply(args, ChangeMetadata::user())
    }

    pub fn choose_keymap(&mut self, id: &str) -> UiResult<()> {
        self.navbar_action(NavbarAction::ChooseKeymap(id.to_string()))
    }

    pub fn choose_layer(&mut self, index: usize) -> UiResult<()> {
        self.navbar_action(NavbarAction::ChooseLayer(index))
    }

    /// Start the layout's guide (only the first one is offered).
    pub fn start_guide(&mut self) -> UiResult<()> {
        let Some(id) = self.state.keymap().guides.first().map(|g| g.id.clone()) else {
            return Ok(());
        };
        self.navbar_action(NavbarAction::StartGuide(id))
    }

    pub fn exit_guide(&mut self) -> UiResult<()> {
        self.navbar_action(NavbarAction::ExitGuide)
    }

    pub fn next_step(&mut self) -> UiResult<()> {
        self.navbar_action(NavbarAction::NextStep)
    }

    pub fn previous_step(&mut self) -> UiResult<()> {
        self.navbar_action(NavbarAction::PreviousStep)
    }

    /// The kid container was resized; the canvas follows it.
    pub fn resize(&mut self, width: f64, height: f64) -> UiResult<()> {
        self.diagram.borrow_mut().set_canvas_size(Size::new(width, height));
        self.redraw_diagram()
    }

    /// The host measured the layout.
    pub fn set_geometry(&mut self, geometry: UiGeometry) -> UiResult<()> {
        self.diagram.borrow_mut().set_geometry(geometry);
        self.redraw_diagram()
    }

    /// The host measured the indicators in the prose, in document order.
    pub fn set_indicator_anchors(&mut self, points: Vec<Point>) -> UiResult<()> {
        self.diagram.borrow_mut().set_indicator_anchors(points);
        self.redraw_diagram()
    }

    pub fn redraw_diagram(&mut self) -> UiResult<()> {
        self.diagram.borrow_mut().redraw(&self.state);
        self.surface_fault()
    }

    // ─── Reconciliation ──────────────────────────────────────────────────

    fn apply(&mut self, args: StateIdArgs, metadata: ChangeMetadata) -> UiResult<()> {
        if args.is_empty() {
            return Ok(());
        }
        let changes = self.state.set_states_by_ids(args, metadata)?;
        self.react(&changes)?;
        self.surface_fault()
    }

    fn surface_fault(&mut self) -> UiResult<()> {
        match self.diagram.borrow_mut().take_fault() {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }

    fn react(&mut self, changes: &StateChangeMap) -> UiResult<()> {
        use StateField::*;
        if !self.connected || changes.is_empty() {
            return Ok(());
        }
        log::debug!("react: {:?}", changes.fields().collect::<Vec<_>>());

        if changes.has(QueryPrefix) {
            self.update_query_prefix()?;
        }
        if changes.has(Keymap) {
            self.ensure_keyboard()?;
        }
        if changes.has_any(&[Keymap, Layer]) {
            self.rebuild_keys()?;
        }
        if changes.has_any(&[Keymap, Layer, GuideStep, Guide, SelectedKey]) {
            self.update_info_prose()?;
        }
        if let Some(mode) = NavigationMode::for_changes(changes) {
            self.sync_query(mode);
        }
        Ok(())
    }

    /// Strip parameters of the previous prefix, then read the query string
    /// under the new one.
    fn update_query_prefix(&mut self) -> UiResult<()> {
        let old = std::mem::replace(&mut self.synced_prefix, self.state.query_prefix().to_string());
        if !old.is_empty() {
            let url = strip_prefixed(&old, &self.env.pathname(), &self.env.search());
            self.env.replace_state(&url);
        }
        let search = self.env.search();
        let args = read_state_args(&search, self.state.query_prefix(), "", None, false);
        self.apply(args, ChangeMetadata::default())
    }

    fn sync_query(&mut self, mode: NavigationMode) {
        let pathname = self.env.pathname();
        let search = self.env.search();
        let Some(url) = write_query(&self.state.snapshot(), &self.attributes, &pathname, &search) else {
            return;
        };
        log::debug!("query: {mode:?} {url}");
        match mode {
            NavigationMode::Push => self.env.push_state(&url),
            NavigationMode::Replace => self.env.replace_state(&url),
        }
    }

    /// Attach every region where it belongs. Returns how many parents had
    /// to be rebuilt; zero once the layout is in place.
    pub fn lay_out_idempotently(&mut self) -> usize {
        LAYOUT
            .iter()
            .filter(|(parent, children)| {
                let parent = self.tree.region(*parent);
                let children: Vec<_> = children.iter().map(|r| self.tree.region(*r)).collect();
                self.tree.set_children_idempotently(parent, &children)
            })
            .count()
    }

    /// Make sure the keyboard element matches the active model.
    fn ensure_keyboard(&mut self) -> UiResult<()> {
        let wanted = self.state.model().element_name.clone();
        let current = self
            .tree
            .node(self.tree.region(Region::Keyboard))
            .and_then(|n| match &n.kind {
                ViewKind::Keyboard { element_name } => Some(element_name.as_str()),
                _ => None,
            });
        if current == Some(wanted.as_str()) {
            return Ok(());
        }
        let built_in = KeyboardModel::fallback().element_name == wanted;
        if !built_in && !self.env.is_element_registered(&wanted) {
            return Err(UiError::MissingElement { name: wanted });
        }
        log::debug!("keyboard: {current:?} -> {wanted}");
        self.tree.replace_region(
            Region::Keyboard,
            ViewNode::new(ViewKind::Keyboard { element_name: wanted }),
        );
        self.navbar.borrow_mut().update_title_key(&self.state, None)?;
        self.lay_out_idempotently();
        Ok(())
    }

    /// Recreate one key node per key of the active layer.
    fn rebuild_keys(&mut self) -> UiResult<()> {
        let model = self.state.model();
        let model_order: HashMap<KeyId, usize> = model
            .physical_keys()
            .iter()
            .enumerate()
            .map(|(i, k)| (k.id(), i))
            .collect();

        let mut nodes = Vec::with_capacity(self.state.layer().len());
        for key in self.state.layer().keys() {
            let physical = model.physical_key(key.id)?;
            let handle_top = model_order.get(&key.id).is_some_and(|i| i % 2 == 0);
            let mut node = ViewNode::new(ViewKind::Key(key.id))
                .with_attribute("id", key.id.as_str())
                .with_attribute("position", physical.position_attribute())
                .with_attribute("key-handle-top", handle_top.to_string())
                .with_attribute("unset", key.unset.to_string());
            node = match key.legend() {
                Legend::Image(path) => node.with_attribute("legend-image", path),
                Legend::Html(html) => node.with_html(html),
                Legend::Text(text) => node.with_attribute("legend-text", text),
            };
            nodes.push(node);
        }

        let board = self.tree.region(Region::Keyboard);
        self.tree.replace_children(board, nodes);
        self.apply_key_attributes();
        Ok(())
    }

    /// Regenerate the info panel for the active key, guide step or layer.
    fn update_info_prose(&mut self) -> UiResult<()> {
        let prose = InfoProse::from_state(&self.state);
        let region = self.tree.region(Region::InfoProse);
        self.tree.replace_children(region, prose.to_nodes());
        self.navbar
            .borrow_mut()
            .update_title_key(&self.state, prose.active_key)?;
        // The navbar may not be attached yet on first render.
        self.lay_out_idempotently();
        self.prose = prose;
        self.apply_key_attributes();
        Ok(())
    }

    fn apply_key_attributes(&mut self) {
        let layer = self.state.layer();
        for key in layer.keys() {
            let Some(node) = self
                .tree
                .key_node(key.id)
                .and_then(|idx| self.tree.node_mut(idx))
            else {
                continue;
            };
            let active = self.prose.active_key == Some(key.id);
            node.set_flag("active", active);
            node.set_flag("selected", active);
            node.set_flag("related-to-active", self.prose.is_related(key.id));
            node.set_flag("target-of-indicator", self.prose.is_indicated(key.id));
            node.set_flag("layer-entry-key", layer.is_layer_entry_key(key.id));
        }
    }
}
