//! Layer stack, page size and panel position on the page.

use crate::geometry::Point;
use crate::panel::config::{PageConfig, PageType, StackType, NAMED_PAGES};
use crate::panel::Panel;
use crate::parser::board::Board;
use crate::parser::sexp::SExp;

const NON_COPPER_LAYERS: [(u32, &str); 18] = [
    (32, "B.Adhes"),
    (33, "F.Adhes"),
    (34, "B.Paste"),
    (35, "F.Paste"),
    (36, "B.SilkS"),
    (37, "F.SilkS"),
    (38, "B.Mask"),
    (39, "F.Mask"),
    (40, "Dwgs.User"),
    (41, "Cmts.User"),
    (42, "Eco1.User"),
    (43, "Eco2.User"),
    (44, "Edge.Cuts"),
    (45, "Margin"),
    (46, "B.CrtYd"),
    (47, "F.CrtYd"),
    (48, "B.Fab"),
    (49, "F.Fab"),
];

fn is_copper_entry(entry: &SExp) -> bool {
    entry
        .as_list()
        .and_then(|l| l.get(1))
        .and_then(SExp::as_atom)
        .is_some_and(|name| name.ends_with(".Cu"))
}

/// Layer table with `copper` copper layers; non-copper layers are taken
/// from `template` when given.
pub fn layer_table(copper: usize, template: Option<&SExp>) -> SExp {
    let mut entries = vec![SExp::atom("layers")];
    let copper_entry = |id: u32, name: String| {
        SExp::List(vec![
            SExp::atom(id.to_string()),
            SExp::string(name),
            SExp::atom("signal"),
        ])
    };
    entries.push(copper_entry(0, "F.Cu".to_string()));
    for inner in 1..copper.saturating_sub(1) {
        entries.push(copper_entry(inner as u32, format!("In{inner}.Cu")));
    }
    entries.push(copper_entry(31, "B.Cu".to_string()));

    match template.and_then(SExp::as_list) {
        Some(existing) => entries.extend(
            existing
                .iter()
                .skip(1)
                .filter(|e| !is_copper_entry(e))
                .cloned(),
        ),
        None => entries.extend(NON_COPPER_LAYERS.iter().map(|(id, name)| {
            SExp::List(vec![
                SExp::atom(id.to_string()),
                SExp::string(*name),
                SExp::atom("user"),
            ])
        })),
    }
    SExp::List(entries)
}

/// Set the panel's layer table and stackup.
pub fn set_stackup(panel: &mut Panel, stack: StackType, reference: &Board) {
    match stack.copper_layers() {
        None => {
            panel.set_layers(reference.layers.clone());
            let stackup = reference.setup.as_ref().and_then(|s| s.child("stackup")).cloned();
            panel.set_stackup(stackup);
        }
        Some(copper) => {
            panel.set_layers(Some(layer_table(copper, reference.layers.as_ref())));
            panel.set_stackup(None);
        }
    }
}

/// Width and height of a `(paper ...)` entry in millimetres.
pub fn paper_dimensions(paper: &SExp) -> (f64, f64) {
    let values = paper.as_list().unwrap_or(&[]);
    let name = values.get(1).and_then(SExp::as_atom).unwrap_or("A4");
    let portrait = values.iter().any(|v| v.as_atom() == Some("portrait"));
    let (w, h) = if name == "User" {
        let w = values.get(2).and_then(SExp::as_f64).unwrap_or(297.0);
        let h = values.get(3).and_then(SExp::as_f64).unwrap_or(210.0);
        (w, h)
    } else {
        NAMED_PAGES
            .iter()
            .find(|(n, _, _)| *n == name)
            .map_or((297.0, 210.0), |(_, w, h)| (*w, *h))
    };
    if portrait {
        (h, w)
    } else {
        (w, h)
    }
}

/// Set the page format; returns the page size.
pub fn set_page_size(panel: &mut Panel, config: &PageConfig, reference: &Board) -> (f64, f64) {
    let paper = match &config.kind {
        PageType::Inherit => reference
            .paper
            .clone()
            .unwrap_or_else(|| SExp::node("paper", vec![SExp::string("A4")])),
        PageType::Named { name, portrait } => {
            let mut values = vec![SExp::string(name.clone())];
            if *portrait {
                values.push(SExp::atom("portrait"));
            }
            SExp::node("paper", values)
        }
        PageType::User { width, height } => SExp::node(
            "paper",
            vec![SExp::string("User"), SExp::number(*width), SExp::number(*height)],
        ),
    };
    let size = paper_dimensions(&paper);
    panel.set_paper(paper);
    size
}

/// Move the panel so its anchor lands on (`posx`, `posy`) of the page.
pub fn position_panel(panel: &mut Panel, config: &PageConfig, page: (f64, f64)) -> Option<Point> {
    let bbox = panel.bbox()?;
    let current = bbox.anchor(config.anchor);
    let target = Point::new(config.posx.resolve(page.0), config.posy.resolve(page.1));
    panel.translate(target.x - current.x, target.y - current.y);
    Some(target)
}
