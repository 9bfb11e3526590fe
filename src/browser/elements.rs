//! Clickable Element Enumeration
//!
//! Every step the agent injects [`ENUMERATE_CLICKABLE_SCRIPT`] into the page. The
//! script finds all visible clickable elements (including those inside open
//! shadow roots), draws a numbered badge on each one so the oracle can refer to
//! it from the screenshot, and returns the list as a JSON string.
//!
//! Indices are 0-based end to end: the badge shows the same number as the
//! `index` field, and the resolver uses that number directly as a registry
//! position.

use super::BrowserSession;
use crate::error::{BrowserError, Result};
use serde::{Deserialize, Serialize};

/// Injected verbatim once per step. Returns `JSON.stringify([{index, x, y, width, height, kind}])`.
pub const ENUMERATE_CLICKABLE_SCRIPT: &str = r#"
    (() => {
        const selector = 'a, button, use, select, input, textarea, [role="button"], [onclick], [tabindex]:not([tabindex="-1"])';

        const queryDeep = (root) => {
            const found = [];
            const walk = (node) => {
                if (node.nodeType !== Node.ELEMENT_NODE) return;
                if (node.matches(selector)) found.push(node);
                if (node.shadowRoot) Array.from(node.shadowRoot.children).forEach(walk);
                Array.from(node.children).forEach(walk);
            };
            walk(root);
            return found;
        };

        const isVisible = (el) => {
            const rect = el.getBoundingClientRect();
            if (rect.width <= 0 || rect.height <= 0) return false;
            if (rect.bottom < 0 || rect.right < 0) return false;
            if (rect.top > window.innerHeight || rect.left > window.innerWidth) return false;
            const style = window.getComputedStyle(el);
            if (style.visibility === 'hidden' || style.display === 'none' || style.opacity === '0') return false;
            const cx = Math.min(Math.max(rect.left + rect.width / 2, 0), window.innerWidth - 1);
            const cy = Math.min(Math.max(rect.top + rect.height / 2, 0), window.innerHeight - 1);
            const top = document.elementFromPoint(cx, cy);
            return top === null || el.contains(top) || top.contains(el) || (el.getRootNode() !== document);
        };

        let overlay = document.getElementById('__goal_driven_test_badges');
        if (overlay) {
            overlay.replaceChildren();
        } else {
            overlay = document.createElement('div');
            overlay.id = '__goal_driven_test_badges';
            overlay.style.position = 'fixed';
            overlay.style.left = '0';
            overlay.style.top = '0';
            overlay.style.pointerEvents = 'none';
            overlay.style.zIndex = '2147483647';
            document.body.appendChild(overlay);
        }

        const elements = [];
        queryDeep(document.body).forEach((el) => {
            if (!isVisible(el)) return;
            const rect = el.getBoundingClientRect();
            const index = elements.length;
            elements.push({
                index: index,
                x: rect.left,
                y: rect.top,
                width: rect.width,
                height: rect.height,
                kind: el.tagName.toLowerCase(),
            });

            const badge = document.createElement('div');
            badge.innerText = String(index);
            badge.style.position = 'absolute';
            badge.style.left = (rect.left + rect.width / 2) + 'px';
            badge.style.top = (rect.top + rect.height / 2) + 'px';
            badge.style.minWidth = '18px';
            badge.style.height = '18px';
            badge.style.padding = '0 3px';
            badge.style.display = 'flex';
            badge.style.justifyContent = 'center';
            badge.style.alignItems = 'center';
            badge.style.backgroundColor = 'rgba(255, 255, 0, 0.8)';
            badge.style.borderRadius = '9px';
            badge.style.fontSize = '12px';
            badge.style.fontWeight = 'bold';
            badge.style.color = 'black';
            overlay.appendChild(badge);
        });

        return JSON.stringify(elements);
    })()
"#;

/// One clickable element, in viewport-relative CSS pixels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementRecord {
    pub index: usize,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub kind: String,
}

impl ElementRecord {
    /// Geometric center of the bounding box
    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// The clickable elements of the current step.
///
/// Rebuilt from scratch every step; `records[i].index == i` always holds.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ElementRegistry {
    records: Vec<ElementRecord>,
}

impl ElementRegistry {
    /// Build a registry, rejecting records whose index does not match their position
    pub fn new(records: Vec<ElementRecord>) -> Result<Self> {
        if let Some((position, record)) = records
            .iter()
            .enumerate()
            .find(|(position, record)| record.index != *position)
        {
            return Err(BrowserError::ScriptFailed(format!(
                "Element enumeration returned index {} at position {} (indices must be 0-based and contiguous)",
                record.index, position
            )));
        }

        Ok(Self { records })
    }

    /// Parse the JSON text returned by [`ENUMERATE_CLICKABLE_SCRIPT`]
    pub fn from_script_output(output: &str) -> Result<Self> {
        let records: Vec<ElementRecord> = serde_json::from_str(output).map_err(|e| {
            BrowserError::ScriptFailed(format!("Invalid element enumeration output: {}", e))
        })?;
        Self::new(records)
    }

    /// Run the enumeration script against the current page
    pub async fn observe(browser: &dyn BrowserSession) -> Result<Self> {
        let output = browser.execute_script(ENUMERATE_CLICKABLE_SCRIPT).await?;
        let registry = Self::from_script_output(&output)?;
        log::debug!("Enumerated {} clickable elements", registry.len());
        Ok(registry)
    }

    pub fn get(&self, index: usize) -> Option<&ElementRecord> {
        self.records.get(index)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ElementRecord> {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_script_output() {
        let output = r#"[
            {"index": 0, "x": 10, "y": 20, "width": 100, "height": 40, "kind": "button"},
            {"index": 1, "x": 0, "y": 0, "width": 50, "height": 10, "kind": "a"}
        ]"#;

        let registry = ElementRegistry::from_script_output(output).unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get(0).unwrap().kind, "button");
        assert_eq!(registry.get(0).unwrap().center(), (60.0, 40.0));
        assert!(registry.get(2).is_none());
    }

    #[test]
    fn test_rejects_one_based_indices() {
        let output = r#"[{"index": 1, "x": 0, "y": 0, "width": 1, "height": 1, "kind": "a"}]"#;

        let err = ElementRegistry::from_script_output(output).unwrap_err();
        assert!(err.to_string().contains("0-based"));
    }

    #[test]
    fn test_rejects_garbage_output() {
        assert!(ElementRegistry::from_script_output("undefined").is_err());
        assert!(ElementRegistry::from_script_output("[]").unwrap().is_empty());
    }

    #[test]
    fn test_script_returns_json() {
        assert!(ENUMERATE_CLICKABLE_SCRIPT.contains("[role=\"button\"]"));
        assert!(ENUMERATE_CLICKABLE_SCRIPT.contains("JSON.stringify"));
    }
}
