//! Tooling holes and fiducials in the panel corners.

use crate::geometry::{Point, Rect};
use crate::panel::config::{FiducialType, FiducialsConfig, ToolingConfig, ToolingType};
use crate::panel::Panel;
use crate::parser::sexp::SExp;

/// Corners inset by the offsets, in the order tl, tr, br, bl.
pub fn inset_corners(bbox: &Rect, hoffset: f64, voffset: f64) -> [Point; 4] {
    [
        Point::new(bbox.min.x + hoffset, bbox.min.y + voffset),
        Point::new(bbox.max.x - hoffset, bbox.min.y + voffset),
        Point::new(bbox.max.x - hoffset, bbox.max.y - voffset),
        Point::new(bbox.min.x + hoffset, bbox.max.y - voffset),
    ]
}

fn at_node(p: Point) -> SExp {
    SExp::node("at", vec![SExp::number(p.x), SExp::number(p.y)])
}

fn layers_node(layers: &[&str]) -> SExp {
    SExp::node("layers", layers.iter().map(|l| SExp::string(*l)).collect())
}

/// Footprint holding a single non-plated hole.
pub fn npth_footprint(name: &str, at: Point, diameter: f64, mask_margin: f64, paste: bool, uuid: String) -> SExp {
    let mut layers = vec!["*.Cu", "*.Mask"];
    if paste {
        layers.push("*.Paste");
    }
    let mut pad = vec![
        SExp::string(""),
        SExp::atom("np_thru_hole"),
        SExp::atom("circle"),
        SExp::node("at", vec![SExp::number(0.0), SExp::number(0.0)]),
        SExp::node("size", vec![SExp::number(diameter), SExp::number(diameter)]),
        SExp::node("drill", vec![SExp::number(diameter)]),
        layers_node(&layers),
    ];
    if mask_margin > 0.0 {
        pad.push(SExp::node("solder_mask_margin", vec![SExp::number(mask_margin)]));
    }
    SExp::node(
        "footprint",
        vec![
            SExp::string(name),
            SExp::node("layer", vec![SExp::string("F.Cu")]),
            SExp::node("uuid", vec![SExp::string(uuid)]),
            at_node(at),
            SExp::node("attr", vec![SExp::atom("exclude_from_pos_files"), SExp::atom("exclude_from_bom")]),
            SExp::node("pad", pad),
        ],
    )
}

/// Fiducial footprint on one side of the board.
pub fn fiducial_footprint(at: Point, config: &FiducialsConfig, bottom: bool, uuid: String) -> SExp {
    let side = if bottom { "B" } else { "F" };
    let copper = format!("{side}.Cu");
    let mask = format!("{side}.Mask");
    let paste = format!("{side}.Paste");
    let mut layers = vec![copper.as_str(), mask.as_str()];
    if config.paste {
        layers.push(paste.as_str());
    }
    SExp::node(
        "footprint",
        vec![
            SExp::string("kallows:Fiducial"),
            SExp::node("layer", vec![SExp::string(copper.clone())]),
            SExp::node("uuid", vec![SExp::string(uuid)]),
            at_node(at),
            SExp::node("attr", vec![SExp::atom("smd"), SExp::atom("exclude_from_bom")]),
            SExp::node(
                "pad",
                vec![
                    SExp::string(""),
                    SExp::atom("smd"),
                    SExp::atom("circle"),
                    SExp::node("at", vec![SExp::number(0.0), SExp::number(0.0)]),
                    SExp::node(
                        "size",
                        vec![SExp::number(config.copper_size), SExp::number(config.copper_size)],
                    ),
                    layers_node(&layers),
                    SExp::node(
                        "solder_mask_margin",
                        vec![SExp::number((config.opening - config.copper_size) / 2.0)],
                    ),
                ],
            ),
        ],
    )
}

/// Add tooling holes; returns the hole positions.
pub fn build_tooling(panel: &mut Panel, config: &ToolingConfig) -> Vec<Point> {
    let Some(bbox) = panel.bbox() else {
        return Vec::new();
    };
    let [tl, tr, br, bl] = inset_corners(&bbox, config.hoffset, config.voffset);
    let holes = match config.kind {
        ToolingType::None => return Vec::new(),
        ToolingType::ThreeHole => vec![tl, tr, bl],
        ToolingType::FourHole => vec![tl, tr, br, bl],
    };
    for hole in &holes {
        let uuid = panel.new_uuid();
        panel.add_item(npth_footprint(
            "kallows:ToolingHole",
            *hole,
            config.size,
            config.mask_margin,
            config.paste,
            uuid,
        ));
    }
    holes
}

/// Add fiducials on both sides; returns their positions.
pub fn build_fiducials(panel: &mut Panel, config: &FiducialsConfig) -> Vec<Point> {
    let Some(bbox) = panel.bbox() else {
        return Vec::new();
    };
    let [tl, tr, br, bl] = inset_corners(&bbox, config.hoffset, config.voffset);
    let positions = match config.kind {
        FiducialType::None => return Vec::new(),
        FiducialType::ThreeFid => vec![tl, tr, bl],
        FiducialType::FourFid => vec![tl, tr, br, bl],
    };
    for position in &positions {
        for bottom in [false, true] {
            let uuid = panel.new_uuid();
            panel.add_item(fiducial_footprint(*position, config, bottom, uuid));
        }
    }
    positions
}
