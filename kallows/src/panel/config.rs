//! Typed, validated view of a [`Preset`].
//!
//! Lengths are millimetres and angles degrees. Values the panel builder
//! cannot honour are rejected here, before any board is touched.

use std::str::FromStr;

use serde_json::{Map, Value};

use crate::geometry::Anchor;
use crate::panel::preset::{Preset, PresetError};
use crate::units::{self, PageCoord};

/// Smallest size accepted for drills, pitches and widths.
pub const MIN_LENGTH_MM: f64 = 0.01;

macro_rules! option_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum $name {
            $($variant),+
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim() {
                    $($text => Ok($name::$variant),)+
                    other => Err(format!(
                        "'{}' is not one of: {}",
                        other,
                        [$($text),+].join(", ")
                    )),
                }
            }
        }
    };
}

option_enum!(SourceType { Auto => "auto", Rectangle => "rectangle" });
option_enum!(StackType { Inherit => "inherit", TwoLayer => "2layer", FourLayer => "4layer", SixLayer => "6layer" });
option_enum!(TabType { None => "none", Fixed => "fixed", Spacing => "spacing", Full => "full" });
option_enum!(CutType { None => "none", MouseBites => "mousebites", VCuts => "vcuts", Layer => "layer" });
option_enum!(FramingType { None => "none", RailsTb => "railstb", RailsLr => "railslr", Frame => "frame" });
option_enum!(FrameCuts { None => "none", Horizontal => "h", Vertical => "v", Both => "both" });
option_enum!(ToolingType { None => "none", ThreeHole => "3hole", FourHole => "4hole" });
option_enum!(FiducialType { None => "none", ThreeFid => "3fid", FourFid => "4fid" });
option_enum!(TextType { None => "none", Simple => "simple" });
option_enum!(FillType { None => "none", Solid => "solid", Hatched => "hatched" });
option_enum!(HJustify { Left => "left", Center => "center", Right => "right" });
option_enum!(VJustify { Top => "top", Center => "center", Bottom => "bottom" });

impl StackType {
    pub fn copper_layers(self) -> Option<usize> {
        match self {
            StackType::Inherit => None,
            StackType::TwoLayer => Some(2),
            StackType::FourLayer => Some(4),
            StackType::SixLayer => Some(6),
        }
    }
}

/// Reads typed values out of one preset section.
struct SectionReader<'a> {
    name: &'a str,
    values: &'a Map<String, Value>,
}

impl<'a> SectionReader<'a> {
    fn new(preset: &'a Preset, name: &'a str) -> Result<Self, PresetError> {
        let values = preset
            .section(name)
            .ok_or_else(|| PresetError::UnknownSection(name.to_string()))?;
        Ok(Self { name, values })
    }

    fn invalid(&self, key: &str, message: impl ToString) -> PresetError {
        PresetError::InvalidValue {
            section: self.name.to_string(),
            key: key.to_string(),
            message: message.to_string(),
        }
    }

    fn raw(&self, key: &str) -> Result<&'a Value, PresetError> {
        self.values.get(key).ok_or_else(|| PresetError::UnknownKey {
            section: self.name.to_string(),
            key: key.to_string(),
        })
    }

    fn string(&self, key: &str) -> Result<String, PresetError> {
        Ok(units::value_text(self.raw(key)?))
    }

    fn length(&self, key: &str) -> Result<f64, PresetError> {
        let value = units::parse_length(&self.string(key)?).map_err(|e| self.invalid(key, e))?;
        if !value.is_finite() {
            return Err(self.invalid(key, "must be a finite length"));
        }
        Ok(value)
    }

    fn non_negative(&self, key: &str) -> Result<f64, PresetError> {
        let value = self.length(key)?;
        if value < 0.0 {
            return Err(self.invalid(key, "must not be negative"));
        }
        Ok(value)
    }

    fn positive(&self, key: &str) -> Result<f64, PresetError> {
        let value = self.length(key)?;
        if value < MIN_LENGTH_MM {
            return Err(self.invalid(key, format!("must be at least {}mm", MIN_LENGTH_MM)));
        }
        Ok(value)
    }

    fn angle(&self, key: &str) -> Result<f64, PresetError> {
        units::parse_angle(&self.string(key)?).map_err(|e| self.invalid(key, e))
    }

    fn page_coord(&self, key: &str) -> Result<PageCoord, PresetError> {
        units::parse_page_coord(&self.string(key)?).map_err(|e| self.invalid(key, e))
    }

    fn bool(&self, key: &str) -> Result<bool, PresetError> {
        match self.raw(key)? {
            Value::Bool(b) => Ok(*b),
            Value::String(s) if s.eq_ignore_ascii_case("true") => Ok(true),
            Value::String(s) if s.eq_ignore_ascii_case("false") => Ok(false),
            other => Err(self.invalid(key, format!("expected a boolean, got {}", other))),
        }
    }

    fn count(&self, key: &str) -> Result<usize, PresetError> {
        let text = self.string(key)?;
        text.trim()
            .parse()
            .map_err(|_| self.invalid(key, format!("expected a whole number, got {}", text)))
    }

    fn parsed<T: FromStr<Err = String>>(&self, key: &str) -> Result<T, PresetError> {
        self.string(key)?.parse().map_err(|e| self.invalid(key, e))
    }

    /// Only the named `type` value is implemented for this section.
    fn require_type(&self, expected: &str) -> Result<(), PresetError> {
        let value = self.string("type")?;
        if value.trim() != expected {
            return Err(PresetError::Unsupported {
                section: self.name.to_string(),
                key: "type".into(),
                value,
            });
        }
        Ok(())
    }

    fn require_zero(&self, key: &str) -> Result<(), PresetError> {
        if self.length(key)?.abs() > f64::EPSILON {
            return Err(PresetError::Unsupported {
                section: self.name.to_string(),
                key: key.to_string(),
                value: self.string(key)?,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutConfig {
    pub hspace: f64,
    pub vspace: f64,
    pub vbackbone: f64,
    pub hbackbone: f64,
    pub vbonecut: bool,
    pub hbonecut: bool,
    pub rename_net: String,
    pub rename_ref: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceConfig {
    pub kind: SourceType,
    pub tolerance: f64,
    pub stack: StackType,
    pub top_left: (f64, f64),
    pub bottom_right: (f64, f64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TabsConfig {
    pub kind: TabType,
    pub vwidth: f64,
    pub hwidth: f64,
    pub vcount: usize,
    pub hcount: usize,
    pub spacing: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CutsConfig {
    pub kind: CutType,
    pub drill: f64,
    pub spacing: f64,
    pub offset: f64,
    pub prolong: f64,
    pub layer: String,
    pub line_width: f64,
    pub text_layer: String,
    pub text_offset: f64,
    pub end_prolong: f64,
    pub text_thickness: f64,
    pub text_size: f64,
    pub template: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FramingConfig {
    pub kind: FramingType,
    pub hspace: f64,
    pub vspace: f64,
    pub width: f64,
    pub cuts: FrameCuts,
    pub min_total_height: f64,
    pub min_total_width: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolingConfig {
    pub kind: ToolingType,
    pub hoffset: f64,
    pub voffset: f64,
    pub size: f64,
    pub paste: bool,
    pub mask_margin: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FiducialsConfig {
    pub kind: FiducialType,
    pub hoffset: f64,
    pub voffset: f64,
    pub copper_size: f64,
    pub opening: f64,
    pub paste: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextConfig {
    pub kind: TextType,
    pub text: String,
    pub anchor: Anchor,
    pub hoffset: f64,
    pub voffset: f64,
    pub orientation: f64,
    pub width: f64,
    pub height: f64,
    pub thickness: f64,
    pub hjustify: HJustify,
    pub vjustify: VJustify,
    pub layer: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CopperfillConfig {
    pub kind: FillType,
    pub clearance: f64,
    pub edge_clearance: f64,
    pub layers: Vec<String>,
    pub width: f64,
    pub spacing: f64,
    pub orientation: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PostConfig {
    pub reconstruct_arcs: bool,
    pub refill_zones: bool,
    pub script: String,
    pub script_arg: String,
    pub origin: Option<Anchor>,
    pub dimensions: bool,
    pub edge_width: f64,
}

/// Page format requested for the panel.
#[derive(Debug, Clone, PartialEq)]
pub enum PageType {
    Inherit,
    Named { name: String, portrait: bool },
    User { width: f64, height: f64 },
}

pub const NAMED_PAGES: [(&str, f64, f64); 10] = [
    ("A4", 297.0, 210.0),
    ("A3", 420.0, 297.0),
    ("A2", 594.0, 420.0),
    ("A1", 841.0, 594.0),
    ("A0", 1189.0, 841.0),
    ("A", 279.4, 215.9),
    ("B", 431.8, 279.4),
    ("C", 558.8, 431.8),
    ("D", 863.6, 558.8),
    ("E", 1117.6, 863.6),
];

#[derive(Debug, Clone, PartialEq)]
pub struct PageConfig {
    pub kind: PageType,
    pub anchor: Anchor,
    pub posx: PageCoord,
    pub posy: PageCoord,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DebugConfig {
    pub draw_partition_lines: bool,
    pub draw_backbone_lines: bool,
    pub draw_boxes: bool,
    pub trace: bool,
    pub deterministic: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PanelConfig {
    pub layout: LayoutConfig,
    pub source: SourceConfig,
    pub tabs: TabsConfig,
    pub cuts: CutsConfig,
    pub framing: FramingConfig,
    pub tooling: ToolingConfig,
    pub fiducials: FiducialsConfig,
    pub texts: Vec<TextConfig>,
    pub copperfill: CopperfillConfig,
    pub post: PostConfig,
    pub page: PageConfig,
    pub debug: DebugConfig,
}

impl PanelConfig {
    pub fn from_preset(preset: &Preset) -> Result<Self, PresetError> {
        Ok(Self {
            layout: Self::layout(preset)?,
            source: Self::source(preset)?,
            tabs: Self::tabs(preset)?,
            cuts: Self::cuts(preset)?,
            framing: Self::framing(preset)?,
            tooling: Self::tooling(preset)?,
            fiducials: Self::fiducials(preset)?,
            texts: ["text", "text2", "text3", "text4"]
                .into_iter()
                .map(|section| Self::text(preset, section))
                .collect::<Result<_, _>>()?,
            copperfill: Self::copperfill(preset)?,
            post: Self::post(preset)?,
            page: Self::page(preset)?,
            debug: Self::debug(preset)?,
        })
    }

    fn layout(preset: &Preset) -> Result<LayoutConfig, PresetError> {
        let s = SectionReader::new(preset, "layout")?;
        s.require_type("grid")?;
        if s.angle("rotation")?.abs() > f64::EPSILON {
            return Err(PresetError::Unsupported {
                section: "layout".into(),
                key: "rotation".into(),
                value: s.string("rotation")?,
            });
        }
        Ok(LayoutConfig {
            hspace: s.non_negative("hspace")?,
            vspace: s.non_negative("vspace")?,
            vbackbone: s.non_negative("vbackbone")?,
            hbackbone: s.non_negative("hbackbone")?,
            vbonecut: s.bool("vbonecut")?,
            hbonecut: s.bool("hbonecut")?,
            rename_net: s.string("renamenet")?,
            rename_ref: s.string("renameref")?,
        })
    }

    fn source(preset: &Preset) -> Result<SourceConfig, PresetError> {
        let s = SectionReader::new(preset, "source")?;
        let config = SourceConfig {
            kind: s.parsed("type")?,
            tolerance: s.non_negative("tolerance")?,
            stack: s.parsed("stack")?,
            top_left: (s.length("tlx")?, s.length("tly")?),
            bottom_right: (s.length("brx")?, s.length("bry")?),
        };
        if config.kind == SourceType::Rectangle
            && (config.bottom_right.0 <= config.top_left.0
                || config.bottom_right.1 <= config.top_left.1)
        {
            return Err(s.invalid("brx", "rectangle source needs brx > tlx and bry > tly"));
        }
        Ok(config)
    }

    fn tabs(preset: &Preset) -> Result<TabsConfig, PresetError> {
        let s = SectionReader::new(preset, "tabs")?;
        Ok(TabsConfig {
            kind: s.parsed("type")?,
            vwidth: s.positive("vwidth")?,
            hwidth: s.positive("hwidth")?,
            vcount: s.count("vcount")?,
            hcount: s.count("hcount")?,
            spacing: s.positive("spacing")?,
        })
    }

    fn cuts(preset: &Preset) -> Result<CutsConfig, PresetError> {
        let s = SectionReader::new(preset, "cuts")?;
        s.require_zero("clearance")?;
        Ok(CutsConfig {
            kind: s.parsed("type")?,
            drill: s.positive("drill")?,
            spacing: s.positive("spacing")?,
            offset: s.length("offset")?,
            prolong: s.non_negative("prolong")?,
            layer: s.string("layer")?,
            line_width: s.positive("linewidth")?,
            text_layer: s.string("textlayer")?,
            text_offset: s.length("textoffset")?,
            end_prolong: s.non_negative("endprolong")?,
            text_thickness: s.positive("textthickness")?,
            text_size: s.positive("textsize")?,
            template: s.string("template")?,
        })
    }

    fn framing(preset: &Preset) -> Result<FramingConfig, PresetError> {
        let s = SectionReader::new(preset, "framing")?;
        s.require_zero("chamfer")?;
        s.require_zero("fillet")?;
        if s.bool("tightframe")? {
            return Err(PresetError::Unsupported {
                section: "framing".into(),
                key: "tightframe".into(),
                value: "true".into(),
            });
        }
        Ok(FramingConfig {
            kind: s.parsed("type")?,
            hspace: s.non_negative("hspace")?,
            vspace: s.non_negative("vspace")?,
            width: s.positive("width")?,
            cuts: s.parsed("cuts")?,
            min_total_height: s.non_negative("mintotalheight")?,
            min_total_width: s.non_negative("mintotalwidth")?,
        })
    }

    fn tooling(preset: &Preset) -> Result<ToolingConfig, PresetError> {
        let s = SectionReader::new(preset, "tooling")?;
        Ok(ToolingConfig {
            kind: s.parsed("type")?,
            hoffset: s.length("hoffset")?,
            voffset: s.length("voffset")?,
            size: s.positive("size")?,
            paste: s.bool("paste")?,
            mask_margin: s.non_negative("soldermaskmargin")?,
        })
    }

    fn fiducials(preset: &Preset) -> Result<FiducialsConfig, PresetError> {
        let s = SectionReader::new(preset, "fiducials")?;
        let config = FiducialsConfig {
            kind: s.parsed("type")?,
            hoffset: s.length("hoffset")?,
            voffset: s.length("voffset")?,
            copper_size: s.positive("coppersize")?,
            opening: s.positive("opening")?,
            paste: s.bool("paste")?,
        };
        if config.opening < config.copper_size {
            return Err(s.invalid("opening", "mask opening must not be smaller than the copper"));
        }
        Ok(config)
    }

    fn text(preset: &Preset, section: &str) -> Result<TextConfig, PresetError> {
        let s = SectionReader::new(preset, section)?;
        if s.string("plugin")? != "none" {
            return Err(PresetError::Unsupported {
                section: section.to_string(),
                key: "plugin".into(),
                value: s.string("plugin")?,
            });
        }
        Ok(TextConfig {
            kind: s.parsed("type")?,
            text: s.string("text")?,
            anchor: s.parsed("anchor")?,
            hoffset: s.length("hoffset")?,
            voffset: s.length("voffset")?,
            orientation: s.angle("orientation")?,
            width: s.positive("width")?,
            height: s.positive("height")?,
            thickness: s.positive("thickness")?,
            hjustify: s.parsed("hjustify")?,
            vjustify: s.parsed("vjustify")?,
            layer: s.string("layer")?,
        })
    }

    fn copperfill(preset: &Preset) -> Result<CopperfillConfig, PresetError> {
        let s = SectionReader::new(preset, "copperfill")?;
        let layers: Vec<String> = s
            .string("layers")?
            .split(',')
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect();
        if let Some(bad) = layers.iter().find(|l| !l.ends_with(".Cu")) {
            return Err(s.invalid("layers", format!("'{}' is not a copper layer", bad)));
        }
        Ok(CopperfillConfig {
            kind: s.parsed("type")?,
            clearance: s.non_negative("clearance")?,
            edge_clearance: s.non_negative("edgeclearance")?,
            layers,
            width: s.positive("width")?,
            spacing: s.positive("spacing")?,
            orientation: s.angle("orientation")?,
        })
    }

    fn post(preset: &Preset) -> Result<PostConfig, PresetError> {
        let s = SectionReader::new(preset, "post")?;
        s.require_type("auto")?;
        s.require_zero("millradius")?;
        let origin = s.string("origin")?;
        Ok(PostConfig {
            reconstruct_arcs: s.bool("reconstructarcs")?,
            refill_zones: s.bool("refillzones")?,
            script: s.string("script")?,
            script_arg: s.string("scriptarg")?,
            origin: if origin.trim().is_empty() {
                None
            } else {
                Some(origin.parse().map_err(|e| s.invalid("origin", e))?)
            },
            dimensions: s.bool("dimensions")?,
            edge_width: s.positive("edgewidth")?,
        })
    }

    fn page(preset: &Preset) -> Result<PageConfig, PresetError> {
        let s = SectionReader::new(preset, "page")?;
        let raw = s.string("type")?;
        let kind = match raw.trim() {
            "inherit" => PageType::Inherit,
            "user" => PageType::User {
                width: s.positive("width")?,
                height: s.positive("height")?,
            },
            other => {
                let (name, portrait) = match other.strip_suffix("-portrait") {
                    Some(name) => (name, true),
                    None => (other, false),
                };
                if !NAMED_PAGES.iter().any(|(n, _, _)| *n == name) {
                    return Err(s.invalid("type", format!("unknown page size '{}'", other)));
                }
                PageType::Named {
                    name: name.to_string(),
                    portrait,
                }
            }
        };
        Ok(PageConfig {
            kind,
            anchor: s.parsed("anchor")?,
            posx: s.page_coord("posx")?,
            posy: s.page_coord("posy")?,
        })
    }

    fn debug(preset: &Preset) -> Result<DebugConfig, PresetError> {
        let s = SectionReader::new(preset, "debug")?;
        s.require_type("none")?;
        Ok(DebugConfig {
            draw_partition_lines: s.bool("drawPartitionLines")?,
            draw_backbone_lines: s.bool("drawBackboneLines")?,
            draw_boxes: s.bool("drawboxes")?,
            trace: s.bool("trace")?,
            deterministic: s.bool("deterministic")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::panel::preset::production_overrides;
    use serde_json::json;

    #[test]
    fn test_production_preset_converts() {
        let preset = Preset::obtain(&[production_overrides()]).unwrap();
        let config = PanelConfig::from_preset(&preset).unwrap();
        assert_eq!(config.framing.kind, FramingType::RailsLr);
        assert_eq!(config.framing.width, 6.0);
        assert_eq!(config.cuts.kind, CutType::MouseBites);
        assert_eq!(config.tabs.kind, TabType::Spacing);
        assert_eq!(config.tabs.vwidth, 5.0);
        assert_eq!(config.tabs.spacing, 70.0);
        assert_eq!(config.tooling.kind, ToolingType::ThreeHole);
        assert_eq!(config.tooling.size, 3.0);
        assert_eq!(config.texts.len(), 4);
        assert_eq!(config.page.kind, PageType::Inherit);
        assert_eq!(config.page.posx, PageCoord::Percent(50.0));
        assert!(!config.post.refill_zones);
    }

    #[test]
    fn test_bad_type_is_reported_with_location() {
        let preset = Preset::obtain(&[json!({"cuts": {"type": "laser"}})]).unwrap();
        let err = PanelConfig::from_preset(&preset).unwrap_err();
        match err {
            PresetError::InvalidValue { section, key, .. } => {
                assert_eq!((section.as_str(), key.as_str()), ("cuts", "type"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_unsupported_geometry_rejected() {
        for layer in [
            json!({"framing": {"chamfer": "1mm"}}),
            json!({"post": {"millradius": "1mm"}}),
            json!({"layout": {"rotation": "90deg"}}),
            json!({"cuts": {"clearance": "0.5mm"}}),
            json!({"post": {"type": "kikit"}}),
            json!({"debug": {"type": "full"}}),
        ] {
            let preset = Preset::obtain(&[layer]).unwrap();
            assert!(matches!(
                PanelConfig::from_preset(&preset),
                Err(PresetError::Unsupported { .. })
            ));
        }
    }

    #[test]
    fn test_lengths_must_be_finite_and_sane() {
        for spacing in ["1e400mm", "1e-300mm", "0.001mm"] {
            let preset = Preset::obtain(&[json!({"cuts": {"spacing": spacing}})]).unwrap();
            match PanelConfig::from_preset(&preset) {
                Err(PresetError::InvalidValue { section, key, .. }) => {
                    assert_eq!((section.as_str(), key.as_str()), ("cuts", "spacing"));
                }
                other => panic!("{} should be rejected, got {:?}", spacing, other),
            }
        }

        let preset = Preset::obtain(&[json!({"cuts": {"offset": "-1e400mm"}})]).unwrap();
        assert!(PanelConfig::from_preset(&preset).is_err());

        let preset = Preset::obtain(&[json!({"cuts": {"spacing": "0.01mm"}})]).unwrap();
        assert_eq!(PanelConfig::from_preset(&preset).unwrap().cuts.spacing, 0.01);
    }

    #[test]
    fn test_page_types() {
        let preset = Preset::obtain(&[json!({"page": {"type": "A3-portrait"}})]).unwrap();
        let config = PanelConfig::from_preset(&preset).unwrap();
        assert_eq!(
            config.page.kind,
            PageType::Named {
                name: "A3".into(),
                portrait: true
            }
        );

        let preset = Preset::obtain(&[json!({"page": {"type": "Letter"}})]).unwrap();
        assert!(PanelConfig::from_preset(&preset).is_err());
    }

    #[test]
    fn test_copperfill_layers_must_be_copper() {
        let preset =
            Preset::obtain(&[json!({"copperfill": {"layers": "F.Cu, F.SilkS"}})]).unwrap();
        assert!(PanelConfig::from_preset(&preset).is_err());
    }
}
