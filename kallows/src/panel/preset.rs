//! Panel presets
//!
//! A preset maps section names (`framing`, `tabs`, ...) to key/value
//! options. The built-in preset defines every section and key; layers
//! merged on top may only override keys that exist there.

use std::path::Path;

use serde_json::{json, Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PresetError {
    #[error("Unknown preset section '{0}'")]
    UnknownSection(String),
    #[error("Unknown key '{key}' in preset section '{section}'")]
    UnknownKey { section: String, key: String },
    #[error("Preset section '{0}' must be an object")]
    NotAnObject(String),
    #[error("Invalid value for {section}.{key}: {message}")]
    InvalidValue {
        section: String,
        key: String,
        message: String,
    },
    #[error("Unsupported {section}.{key} = {value}")]
    Unsupported {
        section: String,
        key: String,
        value: String,
    },
    #[error("Invalid override '{0}': expected section.key=value")]
    InvalidOverride(String),
    #[error("Cannot read preset {path}: {message}")]
    Read { path: String, message: String },
}

pub const SECTIONS: [&str; 15] = [
    "layout",
    "source",
    "tabs",
    "cuts",
    "framing",
    "tooling",
    "fiducials",
    "text",
    "text2",
    "text3",
    "text4",
    "copperfill",
    "post",
    "page",
    "debug",
];

fn text_defaults() -> Value {
    json!({
        "type": "none",
        "text": "",
        "anchor": "mt",
        "hoffset": "0mm",
        "voffset": "0mm",
        "orientation": "0deg",
        "width": "1.5mm",
        "height": "1.5mm",
        "thickness": "0.3mm",
        "hjustify": "center",
        "vjustify": "center",
        "layer": "F.SilkS",
        "plugin": "none"
    })
}

/// Complete set of options with their default values.
pub fn builtin_defaults() -> Value {
    json!({
        "layout": {
            "type": "grid",
            "hspace": "0mm",
            "vspace": "0mm",
            "vbackbone": "0mm",
            "hbackbone": "0mm",
            "vbonecut": true,
            "hbonecut": true,
            "renamenet": "Board_{n}-{orig}",
            "renameref": "Board_{n}-{orig}",
            "rotation": "0deg"
        },
        "source": {
            "type": "auto",
            "tolerance": "1mm",
            "stack": "inherit",
            "tlx": "0mm",
            "tly": "0mm",
            "brx": "0mm",
            "bry": "0mm"
        },
        "tabs": {
            "type": "spacing",
            "vwidth": "3mm",
            "hwidth": "3mm",
            "vcount": 1,
            "hcount": 1,
            "spacing": "10mm"
        },
        "cuts": {
            "type": "none",
            "drill": "0.5mm",
            "spacing": "0.8mm",
            "offset": "0mm",
            "prolong": "0mm",
            "clearance": "0mm",
            "layer": "Cmts.User",
            "linewidth": "0.3mm",
            "textlayer": "Cmts.User",
            "textoffset": "3mm",
            "endprolong": "3mm",
            "textthickness": "0.3mm",
            "textsize": "2mm",
            "template": "V-CUT {pos_mm}"
        },
        "framing": {
            "type": "none",
            "hspace": "2mm",
            "vspace": "2mm",
            "width": "5mm",
            "cuts": "both",
            "chamfer": "0mm",
            "fillet": "0mm",
            "tightframe": false,
            "mintotalheight": "0mm",
            "mintotalwidth": "0mm"
        },
        "tooling": {
            "type": "none",
            "hoffset": "0mm",
            "voffset": "0mm",
            "size": "1.152mm",
            "paste": false,
            "soldermaskmargin": "0mm"
        },
        "fiducials": {
            "type": "none",
            "hoffset": "0mm",
            "voffset": "0mm",
            "coppersize": "1mm",
            "opening": "1mm",
            "paste": false
        },
        "text": text_defaults(),
        "text2": text_defaults(),
        "text3": text_defaults(),
        "text4": text_defaults(),
        "copperfill": {
            "type": "none",
            "clearance": "0.5mm",
            "edgeclearance": "0.5mm",
            "layers": "F.Cu,B.Cu",
            "width": "1mm",
            "spacing": "1mm",
            "orientation": "45deg"
        },
        "post": {
            "type": "auto",
            "millradius": "0mm",
            "reconstructarcs": false,
            "refillzones": false,
            "script": "",
            "scriptarg": "",
            "origin": "",
            "dimensions": false,
            "edgewidth": "0.1mm"
        },
        "page": {
            "type": "inherit",
            "anchor": "mt",
            "posx": "50%",
            "posy": "20mm",
            "width": "297mm",
            "height": "210mm"
        },
        "debug": {
            "type": "none",
            "drawPartitionLines": false,
            "drawBackboneLines": false,
            "drawboxes": false,
            "trace": false,
            "deterministic": false
        }
    })
}

/// A complete preset: every section present, every key known.
#[derive(Debug, Clone, PartialEq)]
pub struct Preset {
    sections: Map<String, Value>,
}

impl Default for Preset {
    fn default() -> Self {
        match builtin_defaults() {
            Value::Object(sections) => Self { sections },
            _ => Self {
                sections: Map::new(),
            },
        }
    }
}

impl Preset {
    /// Defaults with the given layers merged on top, in order.
    pub fn obtain(layers: &[Value]) -> Result<Self, PresetError> {
        let mut preset = Self::default();
        for layer in layers {
            preset.merge(layer)?;
        }
        Ok(preset)
    }

    /// Override keys from a `{section: {key: value}}` object.
    pub fn merge(&mut self, layer: &Value) -> Result<(), PresetError> {
        let layer = layer
            .as_object()
            .ok_or_else(|| PresetError::NotAnObject("<root>".to_string()))?;
        for (section, values) in layer {
            if !self.sections.contains_key(section) {
                return Err(PresetError::UnknownSection(section.clone()));
            }
            let values = values
                .as_object()
                .ok_or_else(|| PresetError::NotAnObject(section.clone()))?;
            for (key, value) in values {
                self.set(section, key, value.clone())?;
            }
        }
        Ok(())
    }

    pub fn set(&mut self, section: &str, key: &str, value: Value) -> Result<(), PresetError> {
        let entries = self
            .sections
            .get_mut(section)
            .and_then(Value::as_object_mut)
            .ok_or_else(|| PresetError::UnknownSection(section.to_string()))?;
        let slot = entries.get_mut(key).ok_or_else(|| PresetError::UnknownKey {
            section: section.to_string(),
            key: key.to_string(),
        })?;
        *slot = value;
        Ok(())
    }

    /// Apply a command-line override `section.key=value`.
    pub fn apply_override(&mut self, spec: &str) -> Result<(), PresetError> {
        let (section, key, value) = parse_override(spec)?;
        self.set(&section, &key, value)
    }

    pub fn load_layer(path: &Path) -> Result<Value, PresetError> {
        let read_err = |message: String| PresetError::Read {
            path: path.display().to_string(),
            message,
        };
        let content = std::fs::read_to_string(path).map_err(|e| read_err(e.to_string()))?;
        serde_json::from_str(&content).map_err(|e| read_err(e.to_string()))
    }

    pub fn section(&self, name: &str) -> Option<&Map<String, Value>> {
        self.sections.get(name).and_then(Value::as_object)
    }

    pub fn get(&self, section: &str, key: &str) -> Option<&Value> {
        self.section(section)?.get(key)
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.sections.clone())
    }
}

/// Split `section.key=value` into its parts.
///
/// `true`/`false` become booleans and plain integers become numbers;
/// anything else is kept as text.
pub fn parse_override(spec: &str) -> Result<(String, String, Value), PresetError> {
    let invalid = || PresetError::InvalidOverride(spec.to_string());
    let (path, raw) = spec.split_once('=').ok_or_else(invalid)?;
    let (section, key) = path.trim().split_once('.').ok_or_else(invalid)?;
    let (section, key) = (section.trim(), key.trim());
    if section.is_empty() || key.is_empty() {
        return Err(invalid());
    }
    let raw = raw.trim();
    let value = match raw {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => raw
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(raw.to_string())),
    };
    Ok((section.to_string(), key.to_string(), value))
}

/// The deviations from the defaults used for the two-board production
/// panel: left/right rails, mouse-bites, spaced tabs and three tooling holes.
pub fn production_overrides() -> Value {
    json!({
        "framing": {
            "type": "railslr",
            "vspace": "3mm",
            "width": "6mm"
        },
        "cuts": {
            "type": "mousebites"
        },
        "tabs": {
            "type": "spacing",
            "vwidth": "5mm",
            "spacing": "70mm"
        },
        "tooling": {
            "type": "3hole",
            "hoffset": "5mm",
            "voffset": "3mm",
            "size": "3mm"
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_cover_every_section() {
        let preset = Preset::default();
        for section in SECTIONS {
            assert!(preset.section(section).is_some(), "missing {}", section);
        }
    }

    #[test]
    fn test_merge_overrides_key_by_key() {
        let preset = Preset::obtain(&[production_overrides()]).unwrap();
        assert_eq!(preset.get("framing", "type"), Some(&json!("railslr")));
        assert_eq!(preset.get("framing", "width"), Some(&json!("6mm")));
        // untouched keys keep their defaults
        assert_eq!(preset.get("framing", "hspace"), Some(&json!("2mm")));
        assert_eq!(preset.get("tabs", "hwidth"), Some(&json!("3mm")));
    }

    #[test]
    fn test_later_layers_win() {
        let preset = Preset::obtain(&[
            production_overrides(),
            json!({"cuts": {"type": "vcuts"}}),
        ])
        .unwrap();
        assert_eq!(preset.get("cuts", "type"), Some(&json!("vcuts")));
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let err = Preset::obtain(&[json!({"framing": {"colour": "red"}})]).unwrap_err();
        assert!(matches!(err, PresetError::UnknownKey { .. }));
        let err = Preset::obtain(&[json!({"frame": {}})]).unwrap_err();
        assert!(matches!(err, PresetError::UnknownSection(_)));
    }

    #[test]
    fn test_apply_override() {
        let mut preset = Preset::default();
        preset.apply_override("tabs.vcount=2").unwrap();
        preset.apply_override("debug.deterministic=true").unwrap();
        preset.apply_override("text.text = Panel {date}").unwrap();
        assert_eq!(preset.get("tabs", "vcount"), Some(&json!(2)));
        assert_eq!(preset.get("debug", "deterministic"), Some(&json!(true)));
        assert_eq!(preset.get("text", "text"), Some(&json!("Panel {date}")));
        assert!(matches!(
            preset.apply_override("tabs"),
            Err(PresetError::InvalidOverride(_))
        ));
    }
}
