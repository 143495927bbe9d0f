//! Cut geometry: the lines along which boards are separated from the panel.

use crate::geometry::{xy_node, Point, Segment, EPSILON};
use crate::panel::config::{CutType, CutsConfig};
use crate::panel::tooling::npth_footprint;
use crate::panel::Panel;
use crate::parser::sexp::{format_number, SExp};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CutOrigin {
    Tab,
    Backbone,
    Frame,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cut {
    pub segment: Segment,
    pub origin: CutOrigin,
    /// Unit normal towards the board the cut belongs to, for tab cuts.
    pub inward: Option<(f64, f64)>,
}

impl Cut {
    pub fn new(segment: Segment, origin: CutOrigin) -> Self {
        Self {
            segment,
            origin,
            inward: None,
        }
    }

    pub fn tab(segment: Segment, inward: (f64, f64)) -> Self {
        Self {
            segment,
            origin: CutOrigin::Tab,
            inward: Some(inward),
        }
    }
}

/// Mouse-bite hole centres along one cut.
///
/// The cut is extended by `prolong` at both ends and shifted by `offset`
/// towards its board. Holes are `spacing` apart and centred on the cut.
pub fn mousebite_holes(cut: &Cut, config: &CutsConfig) -> Vec<Point> {
    let mut segment = cut.segment.prolong(config.prolong);
    if let Some((nx, ny)) = cut.inward {
        segment = segment.translate(nx * config.offset, ny * config.offset);
    }
    let len = segment.length();
    if len <= EPSILON {
        return vec![segment.start];
    }
    let count = (len / config.spacing).floor() as usize + 1;
    let start = (len - (count - 1) as f64 * config.spacing) / 2.0;
    (0..count)
        .map(|i| segment.lerp((start + i as f64 * config.spacing) / len))
        .collect()
}

/// Distinct V-cut positions: x of vertical cuts and y of horizontal cuts.
///
/// Cuts that are neither are returned separately; a V-groove cannot follow
/// them.
pub fn vcut_positions(cuts: &[Cut]) -> (Vec<f64>, Vec<f64>, Vec<Cut>) {
    let mut xs: Vec<f64> = Vec::new();
    let mut ys: Vec<f64> = Vec::new();
    let mut rejected = Vec::new();
    let push = |values: &mut Vec<f64>, v: f64| {
        if !values.iter().any(|x| (x - v).abs() < EPSILON) {
            values.push(v);
        }
    };
    for cut in cuts {
        if cut.segment.is_vertical() {
            push(&mut xs, cut.segment.start.x);
        } else if cut.segment.is_horizontal() {
            push(&mut ys, cut.segment.start.y);
        } else {
            rejected.push(*cut);
        }
    }
    xs.sort_by(f64::total_cmp);
    ys.sort_by(f64::total_cmp);
    (xs, ys, rejected)
}

pub fn render_template(template: &str, position: f64) -> String {
    template
        .replace("{pos_mm}", &format!("{:.2} mm", position))
        .replace("{pos_inch}", &format!("{:.3} in", position / 25.4))
}

pub(crate) fn gr_line(panel: &mut Panel, segment: Segment, layer: &str, width: f64) -> SExp {
    let uuid = panel.new_uuid();
    SExp::node(
        "gr_line",
        vec![
            xy_node("start", segment.start),
            xy_node("end", segment.end),
            SExp::node(
                "stroke",
                vec![
                    SExp::node("width", vec![SExp::number(width)]),
                    SExp::node("type", vec![SExp::atom("solid")]),
                ],
            ),
            SExp::node("layer", vec![SExp::string(layer)]),
            SExp::node("uuid", vec![SExp::string(uuid)]),
        ],
    )
}

fn label(panel: &mut Panel, text: String, at: Point, angle: f64, config: &CutsConfig) -> SExp {
    let uuid = panel.new_uuid();
    SExp::node(
        "gr_text",
        vec![
            SExp::string(text),
            SExp::node(
                "at",
                vec![SExp::number(at.x), SExp::number(at.y), SExp::number(angle)],
            ),
            SExp::node("layer", vec![SExp::string(config.text_layer.clone())]),
            SExp::node("uuid", vec![SExp::string(uuid)]),
            SExp::node(
                "effects",
                vec![
                    SExp::node(
                        "font",
                        vec![
                            SExp::node(
                                "size",
                                vec![SExp::number(config.text_size), SExp::number(config.text_size)],
                            ),
                            SExp::node("thickness", vec![SExp::number(config.text_thickness)]),
                        ],
                    ),
                    SExp::node("justify", vec![SExp::atom("left")]),
                ],
            ),
        ],
    )
}

/// Render cuts into the panel according to `cuts.type`.
///
/// Returns the number of features (holes, lines) added.
pub fn apply_cuts(panel: &mut Panel, cuts: &[Cut], config: &CutsConfig, trace: bool) -> usize {
    match config.kind {
        CutType::None => 0,
        CutType::MouseBites => {
            let mut added = 0;
            for cut in cuts {
                for hole in mousebite_holes(cut, config) {
                    let uuid = panel.new_uuid();
                    panel.add_item(npth_footprint("kallows:MouseBite", hole, config.drill, 0.0, false, uuid));
                    added += 1;
                }
                crate::geometry_trace!(trace, "Mouse-bites along {:?} ({:?})", cut.segment, cut.origin);
            }
            added
        }
        CutType::VCuts => {
            let Some(bbox) = panel.bbox() else {
                return 0;
            };
            let (xs, ys, rejected) = vcut_positions(cuts);
            for cut in &rejected {
                tracing::warn!("Cut {:?} is not axis-aligned and cannot be a V-cut", cut.segment);
            }
            let ext = config.end_prolong;
            for x in &xs {
                let segment = Segment::new(
                    Point::new(*x, bbox.min.y - ext),
                    Point::new(*x, bbox.max.y + ext),
                );
                let item = gr_line(panel, segment, &config.layer, config.line_width);
                panel.add_item(item);
                let text = render_template(&config.template, x - bbox.min.x);
                let at = Point::new(*x, bbox.min.y - ext - config.text_offset);
                let item = label(panel, text, at, 90.0, config);
                panel.add_item(item);
                crate::geometry_trace!(trace, "Vertical V-cut at x = {}", format_number(*x));
            }
            for y in &ys {
                let segment = Segment::new(
                    Point::new(bbox.min.x - ext, *y),
                    Point::new(bbox.max.x + ext, *y),
                );
                let item = gr_line(panel, segment, &config.layer, config.line_width);
                panel.add_item(item);
                let text = render_template(&config.template, y - bbox.min.y);
                let at = Point::new(bbox.max.x + ext + config.text_offset, *y);
                let item = label(panel, text, at, 0.0, config);
                panel.add_item(item);
                crate::geometry_trace!(trace, "Horizontal V-cut at y = {}", format_number(*y));
            }
            xs.len() + ys.len()
        }
        CutType::Layer => {
            for cut in cuts {
                let item = gr_line(panel, cut.segment, &config.layer, config.line_width);
                panel.add_item(item);
            }
            cuts.len()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(kind: CutType) -> CutsConfig {
        CutsConfig {
            kind,
            drill: 0.5,
            spacing: 0.8,
            offset: 0.25,
            prolong: 0.0,
            layer: "Cmts.User".into(),
            line_width: 0.3,
            text_layer: "Cmts.User".into(),
            text_offset: 3.0,
            end_prolong: 3.0,
            text_thickness: 0.3,
            text_size: 2.0,
            template: "V-CUT {pos_mm}".into(),
        }
    }

    fn vertical_cut(x: f64) -> Cut {
        Cut::tab(
            Segment::new(Point::new(x, -2.5), Point::new(x, 2.5)),
            (-1.0, 0.0),
        )
    }

    #[test]
    fn test_mousebites_are_centred_and_offset() {
        let holes = mousebite_holes(&vertical_cut(25.0), &config(CutType::MouseBites));
        // 5mm / 0.8mm -> 7 holes spanning 4.8mm
        assert_eq!(holes.len(), 7);
        assert!(holes.iter().all(|p| (p.x - 24.75).abs() < 1e-9));
        assert!((holes[0].y + 2.4).abs() < 1e-9);
        assert!((holes[6].y - 2.4).abs() < 1e-9);
    }

    #[test]
    fn test_prolong_extends_hole_run() {
        let mut cfg = config(CutType::MouseBites);
        cfg.prolong = 0.4;
        cfg.offset = 0.0;
        let holes = mousebite_holes(&vertical_cut(25.0), &cfg);
        assert_eq!(holes.len(), 8);
    }

    #[test]
    fn test_vcut_positions_deduplicate() {
        let cuts = [
            vertical_cut(25.0),
            vertical_cut(25.0),
            vertical_cut(28.0),
            Cut::new(Segment::new(Point::new(0.0, 5.0), Point::new(10.0, 5.0)), CutOrigin::Frame),
            Cut::new(Segment::new(Point::new(0.0, 0.0), Point::new(1.0, 1.0)), CutOrigin::Frame),
        ];
        let (xs, ys, rejected) = vcut_positions(&cuts);
        assert_eq!(xs, vec![25.0, 28.0]);
        assert_eq!(ys, vec![5.0]);
        assert_eq!(rejected.len(), 1);
    }

    #[test]
    fn test_template() {
        assert_eq!(render_template("V-CUT {pos_mm}", 53.0), "V-CUT 53.00 mm");
        assert_eq!(render_template("{pos_inch}", 25.4), "1.000 in");
    }
}
