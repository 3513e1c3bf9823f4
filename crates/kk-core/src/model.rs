//! Keyboard layout data model.
//!
//! A `KeyboardModel` describes the physical board: which keys exist and where
//! they sit on the grid. A `KeymapLayout` assigns behavior to those keys in
//! one or more `KeymapLayer`s and may carry `KeymapGuide` tours.
//!
//! Every reference between the two (layer keys, key selections, guide step
//! keys, layer entry keys) is validated when the layout is constructed, so a
//! broken layout fails loudly at load time instead of rendering silently
//! wrong.

use crate::error::{ModelError, ModelResult};
use crate::geometry::{Point, Size, format_grid};
use crate::id::KeyId;
use serde::Deserialize;
use smallvec::SmallVec;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, LazyLock};

/// Related-key lists are short (a shift pair, a home row).
pub type KeySelection = SmallVec<[KeyId; 4]>;

// ─── Physical keys ───────────────────────────────────────────────────────

/// A key that physically exists on a board.
#[derive(Debug, Clone, PartialEq)]
pub struct PhysicalKey {
    id: KeyId,
    /// Logical sub-board, e.g. `l-f` for left fingers.
    pub board_id: String,
    pub position: Point,
    pub size: Size,
}

impl PhysicalKey {
    /// The ID is derived from the board and position: `{board}-{x}-{y}`.
    pub fn new(board_id: impl Into<String>, position: Point, size: Size) -> Self {
        let board_id = board_id.into();
        let id = KeyId::intern(&format!(
            "{board_id}-{}-{}",
            format_grid(position.x),
            format_grid(position.y)
        ));
        Self {
            id,
            board_id,
            position,
            size,
        }
    }

    pub fn id(&self) -> KeyId {
        self.id
    }

    /// `"x y width height"`, the form the key grid consumes.
    pub fn position_attribute(&self) -> String {
        format!("{} {}", self.position, self.size)
    }
}

// ─── Keyboard model ──────────────────────────────────────────────────────

/// A model of one keyboard. Immutable after construction.
#[derive(Debug, Clone)]
pub struct KeyboardModel {
    /// Name of the visual keyboard element that renders this model.
    pub element_name: String,
    pub display_name: String,
    /// Size of the blank key shown in the title bar when nothing is selected.
    pub default_blank_key_size: Size,
    pub max_key_size: Size,
    physical_keys: Vec<PhysicalKey>,
    index: HashMap<KeyId, usize>,
}

impl KeyboardModel {
    /// Build a model and its key index. Duplicate key IDs are rejected.
    pub fn new(
        element_name: impl Into<String>,
        display_name: impl Into<String>,
        default_blank_key_size: Size,
        max_key_size: Size,
        physical_keys: Vec<PhysicalKey>,
    ) -> ModelResult<Self> {
        let element_name = element_name.into();
        let mut index = HashMap::with_capacity(physical_keys.len());
        let mut duplicates: Vec<String> = Vec::new();
        for (i, key) in physical_keys.iter().enumerate() {
            if index.insert(key.id, i).is_some() && !duplicates.iter().any(|d| d == key.id.as_str())
            {
                duplicates.push(key.id.to_string());
            }
        }
        if !duplicates.is_empty() {
            return Err(ModelError::DuplicatePhysicalKeys {
                board: element_name,
                ids: duplicates,
            });
        }
        Ok(Self {
            element_name,
            display_name: display_name.into(),
            default_blank_key_size,
            max_key_size,
            physical_keys,
            index,
        })
    }

    pub fn physical_keys(&self) -> &[PhysicalKey] {
        &self.physical_keys
    }

    pub fn get(&self, id: KeyId) -> Option<&PhysicalKey> {
        self.index.get(&id).map(|&i| &self.physical_keys[i])
    }

    pub fn contains(&self, id: KeyId) -> bool {
        self.index.contains_key(&id)
    }

    /// Get a physical key by ID, or fail naming the board.
    pub fn physical_key(&self, id: KeyId) -> ModelResult<&PhysicalKey> {
        self.get(id).ok_or_else(|| ModelError::PhysicalKeyNotFound {
            id: id.to_string(),
            board: self.element_name.clone(),
        })
    }

    /// One unset key per physical key.
    pub fn blank_keys(&self) -> Vec<KeymapKey> {
        self.physical_keys
            .iter()
            .map(|k| KeymapKey::unset(k.id).with_info(vec![String::new()]))
            .collect()
    }

    /// A single-layer layout with every key unset.
    pub fn blank_layout(model: &Arc<KeyboardModel>) -> ModelResult<KeymapLayout> {
        let layer = KeymapLayer::from_key_list(
            "Blank layer",
            "Blank",
            vec!["No keymap selected".to_string()],
            model.blank_keys(),
        )?;
        KeymapLayout::new(
            "Blank",
            format!("{}-blank-keymap", model.element_name),
            Arc::clone(model),
            vec![layer],
            Vec::new(),
        )
    }

    /// The 16-key board shown when no layouts have been registered.
    pub fn fallback() -> Arc<KeyboardModel> {
        static FALLBACK: LazyLock<Arc<KeyboardModel>> = LazyLock::new(|| {
            let keys = (0..2)
                .flat_map(|row| {
                    (0..8).map(move |col| {
                        PhysicalKey::new(
                            "fallback-keyboard",
                            Point::new(1.0 + 2.0 * col as f64, 1.0 + 2.0 * row as f64),
                            Size::new(2.0, 2.0),
                        )
                    })
                })
                .collect();
            let model = KeyboardModel::new(
                "fallback-keyboard",
                "KeymapKit Fallback Keyboard",
                Size::new(2.0, 2.0),
                Size::new(2.0, 2.0),
                keys,
            )
            .unwrap_or_else(|e| unreachable!("fallback keyboard is statically valid: {e}"));
            Arc::new(model)
        });
        Arc::clone(&FALLBACK)
    }
}

// ─── Keymap keys ─────────────────────────────────────────────────────────

/// How a key's face should be drawn, in precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Legend<'a> {
    Image(&'a str),
    Html(&'a str),
    Text(&'a str),
}

/// A layer's definition of what one physical key does.
#[derive(Debug, Clone, PartialEq)]
pub struct KeymapKey {
    pub id: KeyId,
    /// Name shown in the title bar.
    pub name: String,
    /// Paragraphs describing the key; may contain HTML.
    pub info: Vec<String>,
    /// Keys highlighted together with this one.
    pub selection: KeySelection,
    pub text_legend: Option<String>,
    pub html_legend: Option<String>,
    pub image_path: Option<String>,
    pub image_attribution: Option<String>,
    /// The key has no function. It may still carry a name and info.
    pub unset: bool,
}

impl KeymapKey {
    pub fn new(id: impl AsRef<str>, name: impl Into<String>, info: Vec<String>) -> Self {
        Self {
            id: KeyId::intern(id.as_ref()),
            name: name.into(),
            info,
            selection: KeySelection::new(),
            text_legend: None,
            html_legend: None,
            image_path: None,
            image_attribution: None,
            unset: false,
        }
    }

    /// Placeholder for a physical key the layer does not define.
    pub fn unset(id: KeyId) -> Self {
        Self {
            id,
            name: String::new(),
            info: Vec::new(),
            selection: KeySelection::new(),
            text_legend: None,
            html_legend: None,
            image_path: None,
            image_attribution: None,
            unset: true,
        }
    }

    pub fn with_info(mut self, info: Vec<String>) -> Self {
        self.info = info;
        self
    }

    pub fn with_selection<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.selection = ids.into_iter().map(|s| KeyId::intern(s.as_ref())).collect();
        self
    }

    pub fn with_text_legend(mut self, legend: impl Into<String>) -> Self {
        self.text_legend = Some(legend.into());
        self
    }

    pub fn with_html_legend(mut self, legend: impl Into<String>) -> Self {
        self.html_legend = Some(legend.into());
        self
    }

    pub fn with_image(mut self, path: impl Into<String>, attribution: Option<String>) -> Self {
        self.image_path = Some(path.into());
        self.image_attribution = attribution;
        self
    }

    /// Image > HTML legend > text legend > name.
    pub fn legend(&self) -> Legend<'_> {
        fn non_empty(s: &Option<String>) -> Option<&str> {
            s.as_deref().filter(|s| !s.is_empty())
        }
        if let Some(path) = non_empty(&self.image_path) {
            Legend::Image(path)
        } else if let Some(html) = non_empty(&self.html_legend) {
            Legend::Html(html)
        } else if let Some(text) = non_empty(&self.text_legend) {
            Legend::Text(text)
        } else {
            Legend::Text(&self.name)
        }
    }

    /// Whether the info panel should present this key as "Unset key".
    pub fn displays_as_unset(&self) -> bool {
        self.unset || self.name.is_empty() || self.info.is_empty()
    }
}

// ─── Layers ──────────────────────────────────────────────────────────────

/// One full assignment of behavior to the keys of a board.
#[derive(Debug, Clone)]
pub struct KeymapLayer {
    pub display_name: String,
    pub short_name: String,
    /// Shown in the info panel when no key or guide step is active.
    pub welcome: Vec<String>,
    /// Keys whose selection is the documented way into this layer.
    pub layer_entry_keys: KeySelection,
    keys: Vec<KeymapKey>,
    index: HashMap<KeyId, usize>,
}

impl KeymapLayer {
    /// Build a layer from a list of keys, rejecting duplicate IDs.
    pub fn from_key_list(
        display_name: impl Into<String>,
        short_name: impl Into<String>,
        welcome: Vec<String>,
        keys: Vec<KeymapKey>,
    ) -> ModelResult<Self> {
        let mut index = HashMap::with_capacity(keys.len());
        let mut duplicates: Vec<String> = Vec::new();
        for (i, key) in keys.iter().enumerate() {
            if index.insert(key.id, i).is_some() && !duplicates.iter().any(|d| d == key.id.as_str())
            {
                duplicates.push(key.id.to_string());
            }
        }
        if !duplicates.is_empty() {
            return Err(ModelError::DuplicateKeys { ids: duplicates });
        }
        Ok(Self {
            display_name: display_name.into(),
            short_name: short_name.into(),
            welcome,
            layer_entry_keys: KeySelection::new(),
            keys,
            index,
        })
    }

    pub fn with_layer_entry_keys<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.layer_entry_keys = ids.into_iter().map(|s| KeyId::intern(s.as_ref())).collect();
        self
    }

    pub fn get(&self, id: KeyId) -> Option<&KeymapKey> {
        self.index.get(&id).map(|&i| &self.keys[i])
    }

    /// Look up by string without interning unknown IDs.
    pub fn get_str(&self, id: &str) -> Option<&KeymapKey> {
        KeyId::lookup(id).and_then(|k| self.get(k))
    }

    pub fn contains(&self, id: KeyId) -> bool {
        self.index.contains_key(&id)
    }

    /// Keys in definition order, backfilled keys last.
    pub fn keys(&self) -> impl Iterator<Item = &KeymapKey> {
        self.keys.iter()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn is_layer_entry_key(&self, id: KeyId) -> bool {
        self.layer_entry_keys.contains(&id)
    }

    /// Add an unset placeholder for every physical key the layer lacks.
    fn backfill_unset(&mut self, model: &KeyboardModel) {
        for pk in model.physical_keys() {
            if !self.index.contains_key(&pk.id()) {
                self.index.insert(pk.id(), self.keys.len());
                self.keys.push(KeymapKey::unset(pk.id()));
            }
        }
    }
}

// ─── Guides ──────────────────────────────────────────────────────────────

/// Input form of a guide step, as authored or deserialized.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuideStepDef {
    #[serde(default)]
    pub key_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub text: Option<Vec<String>>,
    #[serde(default, alias = "layerId")]
    pub layer_idx: Option<usize>,
    #[serde(default)]
    pub selection: Vec<String>,
}

impl GuideStepDef {
    /// A step that reuses a key's info.
    pub fn key(id: impl Into<String>) -> Self {
        Self {
            key_id: Some(id.into()),
            ..Default::default()
        }
    }

    /// A step with its own title and text.
    pub fn prose(title: impl Into<String>, text: Vec<String>) -> Self {
        Self {
            title: Some(title.into()),
            text: Some(text),
            ..Default::default()
        }
    }

    pub fn on_layer(mut self, layer_idx: usize) -> Self {
        self.layer_idx = Some(layer_idx);
        self
    }

    pub fn with_selection<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selection = ids.into_iter().map(Into::into).collect();
        self
    }
}

/// What a guide step shows in the info panel.
#[derive(Debug, Clone, PartialEq)]
pub enum StepContent {
    /// Show this key's info and highlight it.
    Key(KeyId),
    Prose { title: String, text: Vec<String> },
}

/// One validated step of a guide.
#[derive(Debug, Clone, PartialEq)]
pub struct GuideStep {
    pub index: usize,
    pub content: StepContent,
    /// Layer to switch to when this step becomes active.
    pub layer_idx: Option<usize>,
    pub selection: KeySelection,
    step_count: usize,
}

impl GuideStep {
    pub fn key_id(&self) -> Option<KeyId> {
        match self.content {
            StepContent::Key(id) => Some(id),
            StepContent::Prose { .. } => None,
        }
    }

    pub fn is_first_step(&self) -> bool {
        self.index == 0
    }

    pub fn is_last_step(&self) -> bool {
        self.index + 1 == self.step_count
    }

    pub fn next_index(&self) -> Option<usize> {
        (!self.is_last_step()).then_some(self.index + 1)
    }

    pub fn previous_index(&self) -> Option<usize> {
        (!self.is_first_step()).then(|| self.index - 1)
    }
}

/// An ordered tour through a layout.
#[derive(Debug, Clone)]
pub struct KeymapGuide {
    pub title: String,
    pub short_name: String,
    pub id: String,
    steps: Vec<GuideStep>,
}

impl KeymapGuide {
    pub fn new(
        title: impl Into<String>,
        short_name: impl Into<String>,
        id: impl Into<String>,
        steps: Vec<GuideStepDef>,
    ) -> ModelResult<Self> {
        let id = id.into();
        if steps.is_empty() {
            return Err(ModelError::EmptyGuide { guide: id });
        }
        let step_count = steps.len();
        let steps = steps
            .into_iter()
            .enumerate()
            .map(|(index, def)| {
                let content = match (def.key_id.filter(|k| !k.is_empty()), def.title, def.text) {
                    (Some(_), title, text) if title.is_some() || text.is_some() => {
                        return Err(ModelError::StepKeyAndText {
                            guide: id.clone(),
                            step: index,
                        });
                    }
                    (Some(key), _, _) => StepContent::Key(KeyId::intern(&key)),
                    (None, Some(title), Some(text)) if !title.is_empty() => {
                        StepContent::Prose { title, text }
                    }
                    (None, _, _) => {
                        return Err(ModelError::StepMissingContent {
                            guide: id.clone(),
                            step: index,
                        });
                    }
                };
                Ok(GuideStep {
                    index,
                    content,
                    layer_idx: def.layer_idx,
                    selection: def.selection.iter().map(|s| KeyId::intern(s)).collect(),
                    step_count,
                })
            })
            .collect::<ModelResult<Vec<_>>>()?;
        Ok(Self {
            title: title.into(),
            short_name: short_name.into(),
            id,
            steps,
        })
    }

    pub fn steps(&self) -> &[GuideStep] {
        &self.steps
    }

    pub fn step(&self, index: usize) -> Option<&GuideStep> {
        self.steps.get(index)
    }

    pub fn next_step(&self, step: &GuideStep) -> Option<&GuideStep> {
        step.next_index().and_then(|i| self.steps.get(i))
    }

    pub fn previous_step(&self, step: &GuideStep) -> Option<&GuideStep> {
        step.previous_index().and_then(|i| self.steps.get(i))
    }

    /// Clamp any requested index into `[0, steps - 1]`.
    pub fn clamp_step(&self, index: i64) -> usize {
        let last = self.steps.len().saturating_sub(1) as i64;
        index.clamp(0, last) as usize
    }
}

// ─── Layouts ─────────────────────────────────────────────────────────────

/// A complete named keymap for one keyboard model.
#[derive(Debug, Clone)]
pub struct KeymapLayout {
    pub display_name: String,
    /// Must be unique among layouts registered with one UI instance.
    pub unique_id: String,
    pub model: Arc<KeyboardModel>,
    pub layers: Vec<KeymapLayer>,
    /// The first guide is the default.
    pub guides: Vec<KeymapGuide>,
}

impl KeymapLayout {
    /// Validate and assemble a layout.
    ///
    /// Each layer is first backfilled in place with unset keys for physical
    /// keys it does not define. Then every key reference is checked against
    /// the model; any unknown ID fails the whole layout.
    pub fn new(
        display_name: impl Into<String>,
        unique_id: impl Into<String>,
        model: Arc<KeyboardModel>,
        mut layers: Vec<KeymapLayer>,
        guides: Vec<KeymapGuide>,
    ) -> ModelResult<Self> {
        let display_name = display_name.into();
        if layers.is_empty() {
            return Err(ModelError::NoLayers {
                layout: display_name,
            });
        }

        for (layer_idx, layer) in layers.iter_mut().enumerate() {
            layer.backfill_unset(&model);

            let mut invalid: Vec<String> = Vec::new();
            let referenced = layer
                .keys()
                .flat_map(|k| std::iter::once(k.id).chain(k.selection.iter().copied()))
                .chain(layer.layer_entry_keys.iter().copied());
            for id in referenced {
                if !model.contains(id) && !invalid.iter().any(|s| s == id.as_str()) {
                    invalid.push(id.to_string());
                }
            }
            if !invalid.is_empty() {
                return Err(ModelError::InvalidKeys {
                    layout: display_name,
                    layer: layer_idx,
                    ids: invalid,
                });
            }
        }

        let mut seen_guides = HashSet::new();
        let mut duplicate_guides = Vec::new();
        for guide in &guides {
            if !seen_guides.insert(guide.id.as_str()) {
                duplicate_guides.push(guide.id.clone());
            }
            let mut invalid: Vec<String> = Vec::new();
            for step in guide.steps() {
                if let Some(layer) = step.layer_idx
                    && layer >= layers.len()
                {
                    return Err(ModelError::GuideLayerOutOfRange {
                        layout: display_name,
                        guide: guide.id.clone(),
                        step: step.index,
                        layer,
                        count: layers.len(),
                    });
                }
                for id in step.key_id().into_iter().chain(step.selection.iter().copied()) {
                    if !model.contains(id) && !invalid.iter().any(|s| s == id.as_str()) {
                        invalid.push(id.to_string());
                    }
                }
            }
            if !invalid.is_empty() {
                return Err(ModelError::InvalidGuideKeys {
                    layout: display_name,
                    guide: guide.id.clone(),
                    ids: invalid,
                });
            }
        }
        if !duplicate_guides.is_empty() {
            return Err(ModelError::DuplicateGuides {
                layout: display_name,
                ids: duplicate_guides,
            });
        }

        log::debug!(
            "layout {:?}: {} layers, {} guides on {}",
            display_name,
            layers.len(),
            guides.len(),
            model.element_name
        );

        Ok(Self {
            display_name,
            unique_id: unique_id.into(),
            model,
            layers,
            guides,
        })
    }

    pub fn layer(&self, index: usize) -> Option<&KeymapLayer> {
        self.layers.get(index)
    }

    pub fn guide(&self, id: &str) -> Option<&KeymapGuide> {
        self.guides.iter().find(|g| g.id == id)
    }

    pub fn guide_index(&self, id: &str) -> Option<usize> {
        self.guides.iter().position(|g| g.id == id)
    }
}
