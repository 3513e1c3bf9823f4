//! JSON layout bundles.
//!
//! A bundle carries keyboard models and the layouts that use them:
//!
//! ```json
//! {
//!   "models": [{ "elementName": "demo-board", "displayName": "Demo",
//!                "defaultBlankKeySize": { "width": 2, "height": 2 },
//!                "maxKeySize": { "width": 2, "height": 2 },
//!                "keys": [{ "board": "d", "x": 1, "y": 1, "width": 2, "height": 2 }] }],
//!   "layouts": [{ "displayName": "Demo", "uniqueId": "demo", "model": "demo-board",
//!                 "layers": [{ "displayName": "Base", "shortName": "Base",
//!                              "keys": [{ "id": "d-1-1", "name": "A" }] }] }]
//! }
//! ```
//!
//! Layouts name their model by element name. Everything goes through the
//! regular constructors, so a bundle is validated exactly like hand-built
//! layouts.

use crate::error::{ModelError, ModelResult};
use crate::geometry::{Point, Size};
use crate::model::{
    GuideStepDef, KeyboardModel, KeymapGuide, KeymapKey, KeymapLayer, KeymapLayout, PhysicalKey,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutBundle {
    #[serde(default)]
    pub models: Vec<ModelDef>,
    #[serde(default)]
    pub layouts: Vec<LayoutDef>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelDef {
    pub element_name: String,
    pub display_name: String,
    #[serde(default)]
    pub default_blank_key_size: Size,
    #[serde(default)]
    pub max_key_size: Size,
    pub keys: Vec<PhysicalKeyDef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PhysicalKeyDef {
    pub board: String,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyDef {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub info: Vec<String>,
    #[serde(default)]
    pub selection: Vec<String>,
    pub text_legend: Option<String>,
    pub html_legend: Option<String>,
    pub image_path: Option<String>,
    pub image_attribution: Option<String>,
    #[serde(default)]
    pub unset: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerDef {
    pub display_name: String,
    pub short_name: String,
    #[serde(default)]
    pub welcome: Vec<String>,
    #[serde(default)]
    pub layer_entry_keys: Vec<String>,
    #[serde(default)]
    pub keys: Vec<KeyDef>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuideDef {
    pub title: String,
    pub short_name: String,
    pub id: String,
    pub steps: Vec<GuideStepDef>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutDef {
    pub display_name: String,
    pub unique_id: String,
    /// Element name of a model in the same bundle.
    pub model: String,
    pub layers: Vec<LayerDef>,
    #[serde(default)]
    pub guides: Vec<GuideDef>,
}

impl KeyDef {
    fn build(self) -> KeymapKey {
        let mut key = KeymapKey::new(&self.id, self.name, self.info).with_selection(self.selection);
        key.text_legend = self.text_legend;
        key.html_legend = self.html_legend;
        key.image_path = self.image_path;
        key.image_attribution = self.image_attribution;
        key.unset = self.unset;
        key
    }
}

impl ModelDef {
    pub fn build(self) -> ModelResult<KeyboardModel> {
        let keys = self
            .keys
            .into_iter()
            .map(|k| PhysicalKey::new(k.board, Point::new(k.x, k.y), Size::new(k.width, k.height)))
            .collect();
        KeyboardModel::new(
            self.element_name,
            self.display_name,
            self.default_blank_key_size,
            self.max_key_size,
            keys,
        )
    }
}

impl LayoutDef {
    pub fn build(self, model: Arc<KeyboardModel>) -> ModelResult<KeymapLayout> {
        let layers = self
            .layers
            .into_iter()
            .map(|l| {
                let keys = l.keys.into_iter().map(KeyDef::build).collect();
                Ok(KeymapLayer::from_key_list(l.display_name, l.short_name, l.welcome, keys)?
                    .with_layer_entry_keys(l.layer_entry_keys))
            })
            .collect::<ModelResult<Vec<_>>>()?;
        let guides = self
            .guides
            .into_iter()
            .map(|g| KeymapGuide::new(g.title, g.short_name, g.id, g.steps))
            .collect::<ModelResult<Vec<_>>>()?;
        KeymapLayout::new(self.display_name, self.unique_id, model, layers, guides)
    }
}

impl LayoutBundle {
    pub fn from_json(json: &str) -> ModelResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Build every model, then every layout against its model.
    pub fn into_layouts(self) -> ModelResult<Vec<KeymapLayout>> {
        let mut models: HashMap<String, Arc<KeyboardModel>> = HashMap::new();
        for def in self.models {
            let model = def.build()?;
            models.insert(model.element_name.clone(), Arc::new(model));
        }
        self.layouts
            .into_iter()
            .map(|def| {
                let model = models
                    .get(&def.model)
                    .cloned()
                    .ok_or_else(|| ModelError::UnknownModel {
                        layout: def.unique_id.clone(),
                        model: def.model.clone(),
                    })?;
                def.build(model)
            })
            .collect()
    }
}

/// Parse and validate a bundle in one go.
pub fn load_layouts(json: &str) -> ModelResult<Vec<KeymapLayout>> {
    let bundle = LayoutBundle::from_json(json)?;
    log::debug!(
        "bundle: {} models, {} layouts",
        bundle.models.len(),
        bundle.layouts.len()
    );
    bundle.into_layouts()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_with_unknown_model_fails() {
        let json = r#"{ "layouts": [{ "displayName": "X", "uniqueId": "x", "model": "ghost",
                        "layers": [{ "displayName": "B", "shortName": "B" }] }] }"#;
        let err = load_layouts(json).unwrap_err();
        assert_eq!(
            err,
            ModelError::UnknownModel {
                layout: "x".into(),
                model: "ghost".into()
            }
        );
    }

    #[test]
    fn malformed_json_is_a_model_error() {
        assert!(matches!(load_layouts("{ nope"), Err(ModelError::Json(_))));
    }
}
