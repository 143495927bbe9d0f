//! Copper fill over the non-board areas of the panel.

use crate::geometry::{xy_node, Point, Rect, EPSILON};
use crate::panel::config::{CopperfillConfig, FillType};
use crate::panel::Panel;
use crate::parser::sexp::SExp;

#[derive(Debug, Clone, PartialEq)]
pub struct CopperZone {
    pub rect: Rect,
    pub layers: Vec<String>,
    pub fill: FillType,
    pub clearance: f64,
    pub hatch_width: f64,
    pub hatch_gap: f64,
    pub hatch_orientation: f64,
}

impl CopperZone {
    fn corners(&self) -> [Point; 4] {
        let r = self.rect;
        [
            r.min,
            Point::new(r.max.x, r.min.y),
            r.max,
            Point::new(r.min.x, r.max.y),
        ]
    }

    fn pts(&self) -> SExp {
        SExp::node("pts", self.corners().iter().map(|p| xy_node("xy", *p)).collect())
    }

    /// Zone item on net 0. With `refill`, solid zones carry their filled
    /// polygons; hatched zones are left for KiCad to fill.
    pub fn to_sexp(&self, uuid: String, refill: bool) -> SExp {
        let mut fill = Vec::new();
        if refill {
            fill.push(SExp::atom("yes"));
        }
        if self.fill == FillType::Hatched {
            fill.extend([
                SExp::node("mode", vec![SExp::atom("hatch")]),
                SExp::node("hatch_thickness", vec![SExp::number(self.hatch_width)]),
                SExp::node("hatch_gap", vec![SExp::number(self.hatch_gap)]),
                SExp::node("hatch_orientation", vec![SExp::number(self.hatch_orientation)]),
            ]);
        }
        fill.extend([
            SExp::node("thermal_gap", vec![SExp::number(0.5)]),
            SExp::node("thermal_bridge_width", vec![SExp::number(0.5)]),
        ]);

        let mut zone = vec![
            SExp::node("net", vec![SExp::atom("0")]),
            SExp::node("net_name", vec![SExp::string("")]),
            SExp::node("layers", self.layers.iter().map(|l| SExp::string(l.clone())).collect()),
            SExp::node("uuid", vec![SExp::string(uuid)]),
            SExp::node("hatch", vec![SExp::atom("edge"), SExp::number(0.5)]),
            SExp::node(
                "connect_pads",
                vec![SExp::node("clearance", vec![SExp::number(self.clearance)])],
            ),
            SExp::node("min_thickness", vec![SExp::number(0.25)]),
            SExp::node("fill", fill),
            SExp::node("polygon", vec![self.pts()]),
        ];
        if refill && self.fill == FillType::Solid {
            for layer in &self.layers {
                zone.push(SExp::node(
                    "filled_polygon",
                    vec![SExp::node("layer", vec![SExp::string(layer.clone())]), self.pts()],
                ));
            }
        }
        SExp::node("zone", zone)
    }
}

/// Fill area for one framing or backbone rectangle.
///
/// Sides on the panel boundary are pulled in by `edge_clearance`, sides
/// facing the boards by `clearance`.
pub fn fill_area(rect: &Rect, panel_bbox: &Rect, config: &CopperfillConfig) -> Option<Rect> {
    let inset = |on_edge: bool| if on_edge { config.edge_clearance } else { config.clearance };
    let left = rect.min.x + inset((rect.min.x - panel_bbox.min.x).abs() < EPSILON);
    let top = rect.min.y + inset((rect.min.y - panel_bbox.min.y).abs() < EPSILON);
    let right = rect.max.x - inset((rect.max.x - panel_bbox.max.x).abs() < EPSILON);
    let bottom = rect.max.y - inset((rect.max.y - panel_bbox.max.y).abs() < EPSILON);
    // Insets that cross over leave no room for copper.
    let valid = left < right - EPSILON && top < bottom - EPSILON;
    valid.then(|| Rect::from_ltrb(left, top, right, bottom))
}

/// Add copper zones over framing and backbone; returns how many.
pub fn build_copperfill(panel: &mut Panel, config: &CopperfillConfig) -> usize {
    if config.kind == FillType::None {
        return 0;
    }
    let Some(bbox) = panel.bbox() else {
        return 0;
    };
    let areas: Vec<Rect> = panel
        .framing()
        .iter()
        .chain(panel.backbone())
        .filter_map(|r| fill_area(r, &bbox, config))
        .collect();
    let added = areas.len();
    for rect in areas {
        panel.add_copper_zone(CopperZone {
            rect,
            layers: config.layers.clone(),
            fill: config.kind,
            clearance: config.clearance,
            hatch_width: config.width,
            hatch_gap: config.spacing,
            hatch_orientation: config.orientation,
        });
    }
    added
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(kind: FillType) -> CopperfillConfig {
        CopperfillConfig {
            kind,
            clearance: 0.5,
            edge_clearance: 1.0,
            layers: vec!["F.Cu".into(), "B.Cu".into()],
            width: 1.0,
            spacing: 1.0,
            orientation: 45.0,
        }
    }

    #[test]
    fn test_fill_area_insets() {
        let bbox = Rect::from_ltrb(-33.0, -15.0, 86.0, 15.0);
        let rail = Rect::from_ltrb(-33.0, -15.0, -27.0, 15.0);
        let area = fill_area(&rail, &bbox, &config(FillType::Solid)).unwrap();
        assert_eq!(area, Rect::from_ltrb(-32.0, -14.0, -27.5, 14.0));
    }

    #[test]
    fn test_thin_area_dropped() {
        let bbox = Rect::from_ltrb(0.0, 0.0, 100.0, 100.0);
        let strip = Rect::from_ltrb(50.0, 0.0, 50.8, 100.0);
        assert!(fill_area(&strip, &bbox, &config(FillType::Solid)).is_none());
        let short = Rect::from_ltrb(0.0, 40.0, 100.0, 40.9);
        assert!(fill_area(&short, &bbox, &config(FillType::Solid)).is_none());
    }

    #[test]
    fn test_narrow_backbone_gets_no_zone() {
        let mut panel = Panel::new("panel.kicad_pcb");
        panel.add_framing([Rect::from_ltrb(0.0, 0.0, 100.0, 6.0)]);
        panel.add_backbone([Rect::from_ltrb(49.6, 6.0, 50.4, 60.0)]);
        assert_eq!(build_copperfill(&mut panel, &config(FillType::Solid)), 1);
        assert_eq!(panel.copper_zones().len(), 1);
        assert_eq!(panel.copper_zones()[0].rect, Rect::from_ltrb(1.0, 1.0, 99.0, 5.5));
    }

    #[test]
    fn test_zone_sexp() {
        let zone = CopperZone {
            rect: Rect::from_ltrb(0.0, 0.0, 2.0, 1.0),
            layers: vec!["F.Cu".into()],
            fill: FillType::Solid,
            clearance: 0.5,
            hatch_width: 1.0,
            hatch_gap: 1.0,
            hatch_orientation: 45.0,
        };
        let filled = zone.to_sexp("u".into(), true);
        assert_eq!(filled.get_all("filled_polygon").len(), 1);
        assert_eq!(filled.child("fill").unwrap().to_string(), "(fill yes (thermal_gap 0.5) (thermal_bridge_width 0.5))");
        let unfilled = zone.to_sexp("u".into(), false);
        assert!(unfilled.get_all("filled_polygon").is_empty());

        let hatched = CopperZone {
            fill: FillType::Hatched,
            ..zone
        };
        let text = hatched.to_sexp("u".into(), true).to_string();
        assert!(text.contains("(mode hatch)"));
        assert!(!text.contains("filled_polygon"));
    }
}
