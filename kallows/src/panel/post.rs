//! Post-processing: origin, dimensions, outline width, the user script and
//! debug drawings.

use std::process::Command;

use crate::geometry::{xy_node, Point, Rect};
use crate::panel::config::{DebugConfig, PostConfig};
use crate::panel::cuts::gr_line;
use crate::panel::{Panel, PanelError};
use crate::parser::board::Board;
use crate::parser::sexp::SExp;

const ANNOTATION_LAYER: &str = "Dwgs.User";
const DIMENSION_OFFSET: f64 = 5.0;

fn dimension(panel: &mut Panel, from: Point, to: Point, height: f64) -> SExp {
    let length = from.distance(to);
    let mid = Point::new((from.x + to.x) / 2.0, (from.y + to.y) / 2.0);
    let vertical = (from.x - to.x).abs() < f64::EPSILON;
    let text_at = if vertical {
        Point::new(mid.x - height, mid.y)
    } else {
        Point::new(mid.x, mid.y + height)
    };
    let dim_uuid = panel.new_uuid();
    let text_uuid = panel.new_uuid();
    SExp::node(
        "dimension",
        vec![
            SExp::node("type", vec![SExp::atom("aligned")]),
            SExp::node("layer", vec![SExp::string(ANNOTATION_LAYER)]),
            SExp::node("uuid", vec![SExp::string(dim_uuid)]),
            SExp::node("pts", vec![xy_node("xy", from), xy_node("xy", to)]),
            SExp::node("height", vec![SExp::number(height)]),
            SExp::node(
                "gr_text",
                vec![
                    SExp::string(format!("{:.2} mm", length)),
                    SExp::node(
                        "at",
                        vec![
                            SExp::number(text_at.x),
                            SExp::number(text_at.y),
                            SExp::number(if vertical { 90.0 } else { 0.0 }),
                        ],
                    ),
                    SExp::node("layer", vec![SExp::string(ANNOTATION_LAYER)]),
                    SExp::node("uuid", vec![SExp::string(text_uuid)]),
                    SExp::node(
                        "effects",
                        vec![SExp::node(
                            "font",
                            vec![
                                SExp::node("size", vec![SExp::number(1.0), SExp::number(1.0)]),
                                SExp::node("thickness", vec![SExp::number(0.15)]),
                            ],
                        )],
                    ),
                ],
            ),
            SExp::node(
                "format",
                vec![
                    SExp::node("units", vec![SExp::atom("2")]),
                    SExp::node("units_format", vec![SExp::atom("1")]),
                    SExp::node("precision", vec![SExp::atom("2")]),
                ],
            ),
            SExp::node(
                "style",
                vec![
                    SExp::node("thickness", vec![SExp::number(0.15)]),
                    SExp::node("arrow_length", vec![SExp::number(1.27)]),
                    SExp::node("text_position_mode", vec![SExp::atom("0")]),
                    SExp::node("extension_height", vec![SExp::number(0.58642)]),
                    SExp::node("extension_offset", vec![SExp::number(0.0)]),
                ],
            ),
        ],
    )
}

/// Apply `origin`, `dimensions` and `edgewidth`.
pub fn build_postprocessing(panel: &mut Panel, config: &PostConfig) {
    panel.set_edge_width(config.edge_width);
    let Some(bbox) = panel.bbox() else {
        return;
    };
    if let Some(anchor) = config.origin {
        let origin = bbox.anchor(anchor);
        panel.set_aux_origin(origin);
        tracing::debug!("Auxiliary origin at ({:.3}, {:.3})", origin.x, origin.y);
    }
    if config.dimensions {
        let width = dimension(
            panel,
            Point::new(bbox.min.x, bbox.min.y),
            Point::new(bbox.max.x, bbox.min.y),
            -DIMENSION_OFFSET,
        );
        panel.add_item(width);
        let height = dimension(
            panel,
            Point::new(bbox.min.x, bbox.min.y),
            Point::new(bbox.min.x, bbox.max.y),
            DIMENSION_OFFSET,
        );
        panel.add_item(height);
    }
}

/// Run `post.script` on a temporary copy of the panel and load the result
/// back. Does nothing when no script is configured.
///
/// The staged copy is final apart from the script's edits, so zone fills
/// are written into it.
pub fn run_user_script(panel: &mut Panel, config: &PostConfig) -> Result<bool, PanelError> {
    let script = config.script.trim();
    if script.is_empty() {
        return Ok(false);
    }
    let script_error = |message: String| PanelError::Script {
        script: script.to_string(),
        message,
    };

    let staged = tempfile::Builder::new()
        .prefix("kallows-panel-")
        .suffix(".kicad_pcb")
        .tempfile()
        .map_err(|e| script_error(format!("cannot create temporary panel: {}", e)))?;
    let document = panel.to_document(config.refill_zones).to_pretty_string();
    std::fs::write(staged.path(), document).map_err(|e| PanelError::io(staged.path(), e))?;

    let mut command = Command::new(script);
    command.arg(staged.path());
    if !config.script_arg.is_empty() {
        command.arg(&config.script_arg);
    }
    tracing::info!("Running user script {}", script);
    let output = command.output().map_err(|e| script_error(e.to_string()))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(script_error(format!("{} {}", output.status, stderr.trim())));
    }

    let board = Board::load(staged.path())?;
    panel.reload(board);
    Ok(true)
}

fn outline_rect(panel: &mut Panel, rect: Rect) -> Vec<SExp> {
    rect.edges()
        .into_iter()
        .map(|edge| gr_line(panel, edge, ANNOTATION_LAYER, 0.1))
        .collect()
}

/// Draw the requested debug geometry on `Dwgs.User`; returns the number of
/// lines added.
pub fn build_debug_annotation(panel: &mut Panel, config: &DebugConfig) -> usize {
    let mut rects = Vec::new();
    if config.draw_partition_lines {
        rects.extend(panel.substrates().iter().map(|s| s.partition));
    }
    if config.draw_backbone_lines {
        rects.extend(panel.backbone().iter().copied());
    }
    if config.draw_boxes {
        rects.extend(panel.substrates().iter().map(|s| s.rect));
    }
    let mut added = 0;
    for rect in rects {
        for line in outline_rect(panel, rect) {
            panel.add_item(line);
            added += 1;
        }
    }
    added
}
