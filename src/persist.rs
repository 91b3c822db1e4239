//! Widget state persistence.
//!
//! Widgets that return a [`state_key`](crate::widget::Widget::state_key)
//! (or, failing that, a style id) take part. A widget's snapshot key is the
//! keys of its keyed ancestors and its own, joined with `/`, so identically
//! keyed widgets under different keyed parents do not collide.
//!
//! On disk a snapshot is a JSON document with base64 payloads:
//!
//! ```text
//! {
//!   "widgets": {
//!     "editor/search": "eyJxdWVyeSI6ImZvbyJ9"
//!   }
//! }
//! ```

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io::Write;
use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use crate::error::PersistError;
use crate::widget::{Widget, WidgetId};

/// Flat key path to payload map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSnapshot {
    #[serde(default, with = "base64_map")]
    pub widgets: BTreeMap<String, Vec<u8>>,
}

impl StateSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&[u8]> {
        self.widgets.get(key).map(Vec::as_slice)
    }

    pub fn insert(&mut self, key: impl Into<String>, data: Vec<u8>) {
        self.widgets.insert(key.into(), data);
    }

    pub fn len(&self) -> usize {
        self.widgets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.widgets.is_empty()
    }

    pub fn to_json(&self) -> Result<String, PersistError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self, PersistError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Write pretty JSON, readable by the owner only on Unix.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), PersistError> {
        let json = self.to_json()?;
        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(path.as_ref())?;
        file.write_all(json.as_bytes())?;
        file.write_all(b"\n")?;
        tracing::debug!(path = %path.as_ref().display(), entries = self.len(), "state snapshot saved");
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, PersistError> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }
}

mod base64_map {
    use super::*;
    use serde::de::Error as _;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(map: &BTreeMap<String, Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
        let encoded: BTreeMap<&str, String> = map
            .iter()
            .map(|(k, v)| (k.as_str(), STANDARD.encode(v)))
            .collect();
        encoded.serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<BTreeMap<String, Vec<u8>>, D::Error> {
        let encoded = Option::<BTreeMap<String, String>>::deserialize(d)?.unwrap_or_default();
        encoded
            .into_iter()
            .map(|(k, v)| {
                let data = STANDARD.decode(v.as_bytes()).map_err(|source| {
                    D::Error::custom(PersistError::Decode {
                        key: k.clone(),
                        source,
                    })
                })?;
                Ok((k, data))
            })
            .collect()
    }
}

// =============================================================================
// CAPTURE / APPLY
// =============================================================================

fn own_key(widget: &dyn Widget) -> Option<String> {
    let trimmed = |s: String| {
        let t = s.trim().to_string();
        (!t.is_empty()).then_some(t)
    };
    widget
        .state_key()
        .and_then(trimmed)
        .or_else(|| widget.style_id().and_then(trimmed))
}

fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}/{key}")
    }
}

/// Save every keyed widget under `roots` into one snapshot.
///
/// Stops collecting errors at the first one and returns it.
pub fn capture_state<'a>(roots: impl IntoIterator<Item = &'a dyn Widget>) -> Result<StateSnapshot, PersistError> {
    let mut snapshot = StateSnapshot::new();
    let mut visited = HashSet::new();
    let mut first_err = None;
    for root in roots {
        capture_node(root, "", &mut visited, &mut snapshot, &mut first_err);
    }
    match first_err {
        Some(err) => Err(err),
        None => Ok(snapshot),
    }
}

fn capture_node(
    widget: &dyn Widget,
    prefix: &str,
    visited: &mut HashSet<WidgetId>,
    snapshot: &mut StateSnapshot,
    first_err: &mut Option<PersistError>,
) {
    if !visited.insert(widget.id()) {
        return;
    }
    let path = own_key(widget).map(|key| join(prefix, &key));
    if let Some(path) = &path {
        match widget.save_state() {
            Some(Ok(data)) => {
                if snapshot.widgets.contains_key(path) {
                    first_err.get_or_insert(PersistError::DuplicateKey(path.clone()));
                } else {
                    snapshot.insert(path.clone(), data);
                }
            }
            Some(Err(err)) => {
                first_err.get_or_insert(PersistError::Save {
                    key: path.clone(),
                    reason: err.to_string(),
                });
            }
            None => {}
        }
    }
    let child_prefix = path.as_deref().unwrap_or(prefix);
    widget.visit_children(&mut |child| capture_node(child, child_prefix, visited, snapshot, first_err));
}

/// Restore every keyed widget under `roots` that has an entry.
///
/// Keeps going after a failure and returns the first one.
pub fn apply_state<'a>(
    roots: impl IntoIterator<Item = &'a mut dyn Widget>,
    snapshot: &StateSnapshot,
) -> Result<(), PersistError> {
    let mut visited = HashSet::new();
    let mut first_err = None;
    for root in roots {
        apply_node(root, "", snapshot, &mut visited, &mut first_err);
    }
    match first_err {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn apply_node(
    widget: &mut dyn Widget,
    prefix: &str,
    snapshot: &StateSnapshot,
    visited: &mut HashSet<WidgetId>,
    first_err: &mut Option<PersistError>,
) {
    if !visited.insert(widget.id()) {
        return;
    }
    let path = own_key(widget).map(|key| join(prefix, &key));
    if let Some(path) = &path {
        if let Some(data) = snapshot.get(path) {
            if let Err(err) = widget.restore_state(data) {
                tracing::warn!(key = %path, %err, "widget state restore failed");
                first_err.get_or_insert(PersistError::Restore {
                    key: path.clone(),
                    reason: err.to_string(),
                });
            }
        }
    }
    let child_prefix = path.unwrap_or_else(|| prefix.to_string());
    widget.visit_children_mut(&mut |child| apply_node(child, &child_prefix, snapshot, visited, first_err));
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::Message;
    use crate::screen::RenderContext;
    use crate::types::{Constraints, Rect, Size};
    use crate::widget::{HandleResult, StateError};

    struct Field {
        id: WidgetId,
        key: Option<&'static str>,
        value: String,
        fail: bool,
        children: Vec<Field>,
    }

    impl Field {
        fn new(key: Option<&'static str>, value: &str, children: Vec<Field>) -> Self {
            Self {
                id: WidgetId::next(),
                key,
                value: value.to_string(),
                fail: false,
                children,
            }
        }
    }

    impl Widget for Field {
        fn id(&self) -> WidgetId {
            self.id
        }
        fn measure(&mut self, c: Constraints) -> Size {
            c.min_size()
        }
        fn layout(&mut self, _bounds: Rect) {}
        fn render(&self, _ctx: &mut RenderContext<'_>) {}
        fn handle_message(&mut self, _msg: &Message) -> HandleResult {
            HandleResult::unhandled()
        }
        fn visit_children(&self, f: &mut dyn FnMut(&dyn Widget)) {
            for c in &self.children {
                f(c);
            }
        }
        fn visit_children_mut(&mut self, f: &mut dyn FnMut(&mut dyn Widget)) {
            for c in &mut self.children {
                f(c);
            }
        }
        fn state_key(&self) -> Option<String> {
            self.key.map(str::to_string)
        }
        fn save_state(&self) -> Option<Result<Vec<u8>, StateError>> {
            if self.fail {
                return Some(Err("disk full".into()));
            }
            Some(Ok(self.value.clone().into_bytes()))
        }
        fn restore_state(&mut self, data: &[u8]) -> Result<(), StateError> {
            if self.fail {
                return Err("bad payload".into());
            }
            self.value = String::from_utf8(data.to_vec())?;
            Ok(())
        }
    }

    fn setup() -> Field {
        Field::new(
            Some("editor"),
            "root",
            vec![
                Field::new(Some(" search "), "foo", vec![]),
                Field::new(None, "unkeyed", vec![Field::new(Some("cursor"), "12", vec![])]),
            ],
        )
    }

    #[test]
    fn test_capture_uses_keyed_ancestor_paths() {
        let root = setup();
        let snapshot = capture_state([&root as &dyn Widget]).expect("capture");

        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot.get("editor"), Some(&b"root"[..]));
        assert_eq!(snapshot.get("editor/search"), Some(&b"foo"[..]));
        assert_eq!(snapshot.get("editor/cursor"), Some(&b"12"[..]));
    }

    #[test]
    fn test_duplicate_key_is_error() {
        let root = Field::new(None, "", vec![Field::new(Some("a"), "1", vec![]), Field::new(Some("a"), "2", vec![])]);
        let err = capture_state([&root as &dyn Widget]).err();
        assert!(matches!(err, Some(PersistError::DuplicateKey(k)) if k == "a"));
    }

    #[test]
    fn test_apply_restores_and_reports_first_error() {
        let mut root = setup();
        root.children[0].fail = true;
        let mut snapshot = StateSnapshot::new();
        snapshot.insert("editor/search", b"bar".to_vec());
        snapshot.insert("editor/cursor", b"99".to_vec());

        let err = apply_state([&mut root as &mut dyn Widget], &snapshot).err();
        assert!(matches!(err, Some(PersistError::Restore { key, .. }) if key == "editor/search"));
        // Restoring continued past the failure.
        assert_eq!(root.children[1].children[0].value, "99");
    }

    #[test]
    fn test_save_and_load_roundtrip_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("state.json");
        let root = setup();
        let snapshot = capture_state([&root as &dyn Widget]).expect("capture");

        snapshot.save(&path).expect("save");
        let text = std::fs::read_to_string(&path).expect("read");
        assert!(text.contains("\"editor/search\": \"Zm9v\""));
        assert_eq!(StateSnapshot::load(&path).expect("load"), snapshot);
    }

    #[test]
    fn test_missing_widgets_field_defaults_empty() {
        let snapshot = StateSnapshot::from_json("{}").expect("parse");
        assert!(snapshot.is_empty());
        assert!(matches!(
            StateSnapshot::from_json(r#"{"widgets":{"a":"!!"}}"#),
            Err(PersistError::Json(_))
        ));
    }
}
