//! [`Environment`] over `window.location` and `window.history`.

use kk_ui::Environment;
use std::collections::HashSet;
use wasm_bindgen::JsValue;

/// The page the UI lives in. Element registrations are reported by the host
/// because custom element registries are not reachable from here.
#[derive(Debug, Default)]
pub struct BrowserEnvironment {
    registered: HashSet<String>,
}

impl BrowserEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_element(&mut self, name: impl Into<String>) {
        self.registered.insert(name.into());
    }

    fn history() -> Option<web_sys::History> {
        web_sys::window()?.history().ok()
    }

    fn location() -> Option<web_sys::Location> {
        web_sys::window().map(|w| w.location())
    }
}

impl Environment for BrowserEnvironment {
    fn search(&self) -> String {
        Self::location()
            .and_then(|l| l.search().ok())
            .unwrap_or_default()
    }

    fn pathname(&self) -> String {
        Self::location()
            .and_then(|l| l.pathname().ok())
            .unwrap_or_else(|| "/".to_string())
    }

    fn push_state(&mut self, url: &str) {
        let Some(history) = Self::history() else {
            log::warn!("browser: no history, dropping push of {url}");
            return;
        };
        if let Err(err) = history.push_state_with_url(&JsValue::NULL, "", Some(url)) {
            log::error!("browser: pushState failed: {err:?}");
        }
    }

    fn replace_state(&mut self, url: &str) {
        let Some(history) = Self::history() else {
            log::warn!("browser: no history, dropping replace of {url}");
            return;
        };
        if let Err(err) = history.replace_state_with_url(&JsValue::NULL, "", Some(url)) {
            log::error!("browser: replaceState failed: {err:?}");
        }
    }

    fn is_element_registered(&self, name: &str) -> bool {
        self.registered.contains(name)
    }
}
