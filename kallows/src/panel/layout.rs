//! Board placement: source areas, the placement grid and renaming.

use crate::geometry::{item_bbox, Point, Rect};
use crate::panel::config::{SourceConfig, SourceType};
use crate::panel::preset::PresetError;
use crate::panel::PanelError;
use crate::parser::board::Board;

const OUTLINE_TAGS: [&str; 7] = [
    "gr_line", "gr_arc", "gr_circle", "gr_rect", "gr_poly", "gr_curve", "gr_bezier",
];

/// True for board drawings on the Edge.Cuts layer.
pub fn is_outline_item(item: &crate::parser::sexp::SExp) -> bool {
    item.tag().is_some_and(|tag| OUTLINE_TAGS.contains(&tag)) && item.value("layer") == Some("Edge.Cuts")
}

/// Area of the board copied into the panel.
pub fn read_source_area(source: &SourceConfig, board: &Board) -> Result<Rect, PanelError> {
    match source.kind {
        SourceType::Rectangle => Ok(Rect::from_ltrb(
            source.top_left.0,
            source.top_left.1,
            source.bottom_right.0,
            source.bottom_right.1,
        )),
        SourceType::Auto => board
            .items
            .iter()
            .filter(|item| is_outline_item(item))
            .filter_map(item_bbox)
            .reduce(Rect::union)
            .filter(|area| !area.is_degenerate())
            .ok_or_else(|| PanelError::NoOutline(board.path.clone())),
    }
}

/// Places boards on a grid of cells, each board centred in its cell.
///
/// Column widths and row heights follow the largest board in them, so
/// neighbouring boards are separated by exactly the configured spacing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridPlacer {
    pub hspace: f64,
    pub vspace: f64,
}

impl GridPlacer {
    pub fn new(hspace: f64, vspace: f64) -> Self {
        Self { hspace, vspace }
    }

    /// Centre of each area when laid out `cols` per row, board 1 at (0, 0).
    pub fn place(&self, areas: &[Rect], cols: usize) -> Vec<Point> {
        let cols = cols.max(1);
        let rows = areas.len().div_ceil(cols);
        let mut col_widths = vec![0.0_f64; cols];
        let mut row_heights = vec![0.0_f64; rows];
        for (k, area) in areas.iter().enumerate() {
            col_widths[k % cols] = col_widths[k % cols].max(area.width());
            row_heights[k / cols] = row_heights[k / cols].max(area.height());
        }

        let starts = |sizes: &[f64], space: f64| -> Vec<f64> {
            let mut acc = 0.0;
            sizes
                .iter()
                .map(|size| {
                    let centre = acc + size / 2.0;
                    acc += size + space;
                    centre
                })
                .collect()
        };
        let xs = starts(&col_widths, self.hspace);
        let ys = starts(&row_heights, self.vspace);

        (0..areas.len())
            .map(|k| Point::new(xs[k % cols] - xs[0], ys[k / cols] - ys[0]))
            .collect()
    }
}

/// Template-based renaming of nets or references, e.g. `Board_{n}-{orig}`.
#[derive(Debug, Clone, PartialEq)]
pub struct Renamer {
    template: String,
}

impl Renamer {
    /// Net templates must name both the board and the original net, or
    /// nets from different boards would merge.
    pub fn for_nets(template: &str) -> Result<Self, PresetError> {
        if !template.contains("{n}") || !template.contains("{orig}") {
            return Err(PresetError::InvalidValue {
                section: "layout".into(),
                key: "renamenet".into(),
                message: format!("'{}' must contain both {{n}} and {{orig}}", template),
            });
        }
        Ok(Self {
            template: template.to_string(),
        })
    }

    pub fn for_references(template: &str) -> Result<Self, PresetError> {
        if !template.contains("{orig}") {
            return Err(PresetError::InvalidValue {
                section: "layout".into(),
                key: "renameref".into(),
                message: format!("'{}' must contain {{orig}}", template),
            });
        }
        if !template.contains("{n}") {
            tracing::warn!(
                "Reference template '{}' has no {{n}}; boards may share designators",
                template
            );
        }
        Ok(Self {
            template: template.to_string(),
        })
    }

    /// `n` is the 1-based placement index of the board.
    pub fn rename(&self, n: usize, orig: &str) -> String {
        self.template
            .replace("{n}", &n.to_string())
            .replace("{orig}", orig)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::panel::config::StackType;
    use std::collections::HashSet;
    use std::path::Path;

    #[test]
    fn test_rename_scheme() {
        let renamer = Renamer::for_nets("Board_{n}-{orig}").unwrap();
        assert_eq!(renamer.rename(1, "GND"), "Board_1-GND");
        assert_eq!(renamer.rename(2, "{n}"), "Board_2-{n}");
    }

    #[test]
    fn test_renaming_is_injective_across_boards() {
        let renamer = Renamer::for_nets("Board_{n}-{orig}").unwrap();
        let originals = ["GND", "2-GND", "", "Net-(U1-Pad1)", "1-X", "X"];
        let mut seen = HashSet::new();
        for board in 1..=12 {
            for orig in originals {
                assert!(seen.insert(renamer.rename(board, orig)), "collision on {board}/{orig}");
            }
        }
    }

    #[test]
    fn test_net_template_requires_index() {
        assert!(Renamer::for_nets("{orig}").is_err());
        assert!(Renamer::for_references("{orig}").is_ok());
        assert!(Renamer::for_references("R").is_err());
    }

    #[test]
    fn test_grid_places_second_board_one_cell_right() {
        let placer = GridPlacer::new(3.0, 3.0);
        let a = Rect::from_ltrb(100.0, 50.0, 150.0, 80.0);
        let b = Rect::from_ltrb(0.0, 0.0, 50.0, 30.0);
        let centres = placer.place(&[a, b], 2);
        assert_eq!(centres[0], Point::new(0.0, 0.0));
        assert_eq!(centres[1], Point::new(53.0, 0.0));
    }

    #[test]
    fn test_grid_gap_is_exact_for_unequal_boards() {
        let placer = GridPlacer::new(3.0, 3.0);
        let a = Rect::from_ltrb(0.0, 0.0, 40.0, 30.0);
        let b = Rect::from_ltrb(0.0, 0.0, 60.0, 20.0);
        let centres = placer.place(&[a, b], 2);
        let right_of_a = centres[0].x + a.width() / 2.0;
        let left_of_b = centres[1].x - b.width() / 2.0;
        assert!((left_of_b - right_of_a - 3.0).abs() < 1e-9);
        assert_eq!(centres[1].y, 0.0);
    }

    #[test]
    fn test_source_area_from_edge_cuts() {
        let board = Board::parse_str(
            r#"(kicad_pcb (version 20221018)
                (gr_rect (start 10 20) (end 60 50) (layer "Edge.Cuts"))
                (gr_line (start 0 0) (end 200 0) (layer "F.SilkS")))"#,
            Path::new("b.kicad_pcb"),
        )
        .unwrap();
        let source = SourceConfig {
            kind: SourceType::Auto,
            tolerance: 1.0,
            stack: StackType::Inherit,
            top_left: (0.0, 0.0),
            bottom_right: (0.0, 0.0),
        };
        assert_eq!(
            read_source_area(&source, &board).unwrap(),
            Rect::from_ltrb(10.0, 20.0, 60.0, 50.0)
        );
    }

    #[test]
    fn test_source_area_requires_outline() {
        let board = Board::parse_str("(kicad_pcb (version 20221018))", Path::new("b")).unwrap();
        let source = SourceConfig {
            kind: SourceType::Auto,
            tolerance: 1.0,
            stack: StackType::Inherit,
            top_left: (0.0, 0.0),
            bottom_right: (0.0, 0.0),
        };
        assert!(matches!(
            read_source_area(&source, &board),
            Err(PanelError::NoOutline(_))
        ));
    }
}
