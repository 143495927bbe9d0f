//! Partition, backbones and tabs.
//!
//! Everything here works on the rectangles of placed substrates and
//! framing. A substrate edge "faces" an obstacle when the obstacle lies on
//! the outer side of that edge and overlaps it along the edge direction.

use crate::geometry::{Point, Rect, Segment, EPSILON};
use crate::panel::config::{TabType, TabsConfig};
use crate::panel::cuts::{Cut, CutOrigin};
use crate::panel::Substrate;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Top,
    Bottom,
    Left,
    Right,
}

impl Side {
    pub const ALL: [Side; 4] = [Side::Top, Side::Bottom, Side::Left, Side::Right];

    fn is_vertical(self) -> bool {
        matches!(self, Side::Left | Side::Right)
    }

    /// Unit normal pointing from the edge into the rectangle.
    pub fn inward(self) -> (f64, f64) {
        match self {
            Side::Top => (0.0, 1.0),
            Side::Bottom => (0.0, -1.0),
            Side::Left => (1.0, 0.0),
            Side::Right => (-1.0, 0.0),
        }
    }
}

/// What a substrate edge looks at across a gap.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Facing {
    pub rect: Rect,
    /// Index of the substrate when the obstacle is another board.
    pub substrate: Option<usize>,
    pub distance: f64,
    /// Overlap interval along the edge.
    pub span: (f64, f64),
}

fn overlap(a: (f64, f64), b: (f64, f64)) -> Option<(f64, f64)> {
    let lo = a.0.max(b.0);
    let hi = a.1.min(b.1);
    (hi - lo > EPSILON).then_some((lo, hi))
}

fn edge_span(rect: &Rect, side: Side) -> (f64, f64) {
    if side.is_vertical() {
        (rect.min.y, rect.max.y)
    } else {
        (rect.min.x, rect.max.x)
    }
}

/// Gap between `rect`'s `side` and `other`, when `other` is across it.
fn gap(rect: &Rect, side: Side, other: &Rect) -> Option<(f64, (f64, f64))> {
    let distance = match side {
        Side::Top => rect.min.y - other.max.y,
        Side::Bottom => other.min.y - rect.max.y,
        Side::Left => rect.min.x - other.max.x,
        Side::Right => other.min.x - rect.max.x,
    };
    if distance < -EPSILON {
        return None;
    }
    let span = overlap(edge_span(rect, side), edge_span(other, side))?;
    Some((distance.max(0.0), span))
}

/// Nearest obstacle facing `side` of substrate `index`.
pub fn nearest_facing(
    substrates: &[Substrate],
    index: usize,
    side: Side,
    obstacles: &[Rect],
) -> Option<Facing> {
    let me = substrates.iter().find(|s| s.index == index)?;
    let boards = substrates
        .iter()
        .filter(|s| s.index != index)
        .map(|s| (s.rect, Some(s.index)));
    let others = obstacles.iter().map(|r| (*r, None));

    boards
        .chain(others)
        .filter_map(|(rect, substrate)| {
            gap(&me.rect, side, &rect).map(|(distance, span)| Facing {
                rect,
                substrate,
                distance,
                span,
            })
        })
        .min_by(|a, b| a.distance.total_cmp(&b.distance))
}

/// Partition rectangle of each substrate.
///
/// Towards another substrate the partition reaches halfway across the gap;
/// towards framing it reaches the framing; with nothing facing it stays at
/// the substrate edge.
pub fn build_partition(substrates: &[Substrate], framing: &[Rect]) -> Vec<Rect> {
    substrates
        .iter()
        .map(|s| {
            let mut partition = s.rect;
            for side in Side::ALL {
                let Some(facing) = nearest_facing(substrates, s.index, side, framing) else {
                    continue;
                };
                let reach = if facing.substrate.is_some() {
                    facing.distance / 2.0
                } else {
                    facing.distance
                };
                match side {
                    Side::Top => partition.min.y -= reach,
                    Side::Bottom => partition.max.y += reach,
                    Side::Left => partition.min.x -= reach,
                    Side::Right => partition.max.x += reach,
                }
            }
            partition
        })
        .collect()
}

/// Intervals between merged projections of `rects` on one axis.
fn projection_gaps(intervals: impl Iterator<Item = (f64, f64)>) -> Vec<(f64, f64)> {
    let mut intervals: Vec<(f64, f64)> = intervals.collect();
    intervals.sort_by(|a, b| a.0.total_cmp(&b.0));
    let mut merged: Vec<(f64, f64)> = Vec::new();
    for (lo, hi) in intervals {
        match merged.last_mut() {
            Some(last) if lo <= last.1 + EPSILON => last.1 = last.1.max(hi),
            _ => merged.push((lo, hi)),
        }
    }
    merged.windows(2).map(|w| (w[0].1, w[1].0)).collect()
}

/// Backbone strips centred in the gaps between board columns (`vbackbone`)
/// and rows (`hbackbone`), spanning the boards and reaching any framing.
pub fn build_backbone(substrates: &[Substrate], framing: &[Rect], vbackbone: f64, hbackbone: f64) -> Vec<Rect> {
    let Some(boards) = substrates.iter().map(|s| s.rect).reduce(Rect::union) else {
        return Vec::new();
    };
    // Inner edges of framing bars facing the boards.
    let reach_top = framing
        .iter()
        .filter(|f| f.max.y <= boards.min.y + EPSILON)
        .map(|f| f.max.y)
        .fold(boards.min.y, f64::min);
    let reach_bottom = framing
        .iter()
        .filter(|f| f.min.y >= boards.max.y - EPSILON)
        .map(|f| f.min.y)
        .fold(boards.max.y, f64::max);
    let reach_left = framing
        .iter()
        .filter(|f| f.max.x <= boards.min.x + EPSILON)
        .map(|f| f.max.x)
        .fold(boards.min.x, f64::min);
    let reach_right = framing
        .iter()
        .filter(|f| f.min.x >= boards.max.x - EPSILON)
        .map(|f| f.min.x)
        .fold(boards.max.x, f64::max);

    let mut strips = Vec::new();
    if vbackbone > 0.0 {
        for (lo, hi) in projection_gaps(substrates.iter().map(|s| (s.rect.min.x, s.rect.max.x))) {
            let cx = (lo + hi) / 2.0;
            strips.push(Rect::from_ltrb(cx - vbackbone / 2.0, reach_top, cx + vbackbone / 2.0, reach_bottom));
        }
    }
    if hbackbone > 0.0 {
        for (lo, hi) in projection_gaps(substrates.iter().map(|s| (s.rect.min.y, s.rect.max.y))) {
            let cy = (lo + hi) / 2.0;
            strips.push(Rect::from_ltrb(reach_left, cy - hbackbone / 2.0, reach_right, cy + hbackbone / 2.0));
        }
    }
    strips
}

/// Segments where backbone strips meet framing.
pub fn backbone_cuts(backbone: &[Rect], framing: &[Rect], vcut: bool, hcut: bool) -> Vec<Cut> {
    let mut cuts = Vec::new();
    for strip in backbone {
        let vertical = strip.height() > strip.width();
        if (vertical && !vcut) || (!vertical && !hcut) {
            continue;
        }
        for bar in framing {
            if let Some(edge) = strip.shared_edge(bar) {
                cuts.push(Cut::new(edge, CutOrigin::Backbone));
            }
        }
    }
    cuts
}

/// Tab centres along an edge span of length `len`.
fn tab_centres(span: (f64, f64), count: usize) -> Vec<f64> {
    let len = span.1 - span.0;
    (0..count)
        .map(|i| span.0 + len * (i as f64 + 0.5) / count as f64)
        .collect()
}

/// Tabs and their cuts.
///
/// Every substrate edge gets tabs towards its nearest facing obstacle. A
/// gap between two substrates is only tabbed from the lower-indexed one.
/// Cuts lie on the substrate edges a tab touches.
pub fn build_tabs(substrates: &[Substrate], obstacles: &[Rect], config: &TabsConfig) -> (Vec<Rect>, Vec<Cut>) {
    let mut tabs = Vec::new();
    let mut cuts = Vec::new();
    if config.kind == TabType::None {
        return (tabs, cuts);
    }

    for substrate in substrates {
        for side in Side::ALL {
            let Some(facing) = nearest_facing(substrates, substrate.index, side, obstacles) else {
                continue;
            };
            if facing.distance <= EPSILON {
                continue;
            }
            if facing.substrate.is_some_and(|other| other < substrate.index) {
                continue;
            }

            let len = facing.span.1 - facing.span.0;
            let width = if side.is_vertical() { config.vwidth } else { config.hwidth };
            let (count, width) = match config.kind {
                TabType::Fixed => (if side.is_vertical() { config.vcount } else { config.hcount }, width),
                TabType::Spacing => (((len / config.spacing).floor() as usize).max(1), width),
                TabType::Full => (1, len),
                TabType::None => (0, width),
            };
            let width = width.min(len);

            let r = substrate.rect;
            for c in tab_centres(facing.span, count) {
                let (lo, hi) = (c - width / 2.0, c + width / 2.0);
                let tab = match side {
                    Side::Top => Rect::from_ltrb(lo, r.min.y - facing.distance, hi, r.min.y),
                    Side::Bottom => Rect::from_ltrb(lo, r.max.y, hi, r.max.y + facing.distance),
                    Side::Left => Rect::from_ltrb(r.min.x - facing.distance, lo, r.min.x, hi),
                    Side::Right => Rect::from_ltrb(r.max.x, lo, r.max.x + facing.distance, hi),
                };
                let (near, far) = match side {
                    Side::Top => (r.min.y, r.min.y - facing.distance),
                    Side::Bottom => (r.max.y, r.max.y + facing.distance),
                    Side::Left => (r.min.x, r.min.x - facing.distance),
                    Side::Right => (r.max.x, r.max.x + facing.distance),
                };
                let across = |at: f64| {
                    if side.is_vertical() {
                        Segment::new(Point::new(at, lo), Point::new(at, hi))
                    } else {
                        Segment::new(Point::new(lo, at), Point::new(hi, at))
                    }
                };
                cuts.push(Cut::tab(across(near), side.inward()));
                if facing.substrate.is_some() {
                    let (ix, iy) = side.inward();
                    cuts.push(Cut::tab(across(far), (-ix, -iy)));
                }
                tabs.push(tab);
            }
        }
    }
    (tabs, cuts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn substrate(index: usize, rect: Rect) -> Substrate {
        Substrate {
            index,
            source: PathBuf::from(format!("{index}.kicad_pcb")),
            rect,
            partition: rect,
        }
    }

    fn pair() -> Vec<Substrate> {
        vec![
            substrate(1, Rect::from_ltrb(-25.0, -15.0, 25.0, 15.0)),
            substrate(2, Rect::from_ltrb(28.0, -15.0, 78.0, 15.0)),
        ]
    }

    fn rails() -> Vec<Rect> {
        vec![
            Rect::from_ltrb(-33.0, -15.0, -27.0, 15.0),
            Rect::from_ltrb(80.0, -15.0, 86.0, 15.0),
        ]
    }

    fn spacing_tabs() -> TabsConfig {
        TabsConfig {
            kind: TabType::Spacing,
            vwidth: 5.0,
            hwidth: 3.0,
            vcount: 1,
            hcount: 1,
            spacing: 70.0,
        }
    }

    #[test]
    fn test_partition_splits_gap_between_boards() {
        let partitions = build_partition(&pair(), &rails());
        assert_eq!(partitions[0], Rect::from_ltrb(-27.0, -15.0, 26.5, 15.0));
        assert_eq!(partitions[1], Rect::from_ltrb(26.5, -15.0, 80.0, 15.0));
    }

    #[test]
    fn test_each_gap_tabbed_once() {
        let (tabs, cuts) = build_tabs(&pair(), &rails(), &spacing_tabs());
        // left rail, board gap, right rail
        assert_eq!(tabs.len(), 3);
        assert!(tabs.contains(&Rect::from_ltrb(25.0, -2.5, 28.0, 2.5)));
        assert!(tabs.contains(&Rect::from_ltrb(-27.0, -2.5, -25.0, 2.5)));
        assert!(tabs.contains(&Rect::from_ltrb(78.0, -2.5, 80.0, 2.5)));
        // one cut per rail tab, two for the board-to-board tab
        assert_eq!(cuts.len(), 4);
    }

    #[test]
    fn test_tabs_touch_edge_and_obstacle() {
        let substrates = pair();
        let obstacles = rails();
        let (tabs, cuts) = build_tabs(&substrates, &obstacles, &spacing_tabs());
        for tab in &tabs {
            let touches_board = substrates.iter().any(|s| s.rect.shared_edge(tab).is_some());
            let touches_other = substrates
                .iter()
                .map(|s| s.rect)
                .chain(obstacles.iter().copied())
                .filter(|r| r.shared_edge(tab).is_some())
                .count();
            assert!(touches_board);
            assert_eq!(touches_other, 2);
        }
        for cut in &cuts {
            let span = Rect::new(cut.segment.start, cut.segment.end);
            let on_edge = substrates.iter().any(|s| {
                s.rect
                    .edges()
                    .iter()
                    .any(|e| Rect::new(e.start, e.end).contains_rect(&span))
            });
            assert!(on_edge, "cut {:?} not on a board edge", cut.segment);
        }
    }

    #[test]
    fn test_spacing_count_and_fixed_count() {
        let long = vec![substrate(1, Rect::from_ltrb(0.0, 0.0, 200.0, 30.0))];
        let bars = vec![Rect::from_ltrb(0.0, -8.0, 200.0, -3.0)];
        let mut config = spacing_tabs();
        config.spacing = 60.0;
        let (tabs, _) = build_tabs(&long, &bars, &config);
        assert_eq!(tabs.len(), 3);
        assert!(tabs.iter().all(|t| (t.width() - 3.0).abs() < 1e-9));

        config.kind = TabType::Fixed;
        config.hcount = 2;
        let (tabs, _) = build_tabs(&long, &bars, &config);
        assert_eq!(tabs.len(), 2);

        config.kind = TabType::Full;
        let (tabs, _) = build_tabs(&long, &bars, &config);
        assert_eq!(tabs, vec![Rect::from_ltrb(0.0, -3.0, 200.0, 0.0)]);

        config.kind = TabType::None;
        assert!(build_tabs(&long, &bars, &config).0.is_empty());
    }

    #[test]
    fn test_backbone_between_columns() {
        let framing = vec![
            Rect::from_ltrb(-25.0, -24.0, 78.0, -18.0),
            Rect::from_ltrb(-25.0, 18.0, 78.0, 24.0),
        ];
        let backbone = build_backbone(&pair(), &framing, 2.0, 0.0);
        assert_eq!(backbone, vec![Rect::from_ltrb(25.5, -18.0, 27.5, 18.0)]);
        let cuts = backbone_cuts(&backbone, &framing, true, true);
        assert_eq!(cuts.len(), 2);
        assert!(cuts.iter().all(|c| (c.segment.length() - 2.0).abs() < 1e-9));
        assert!(backbone_cuts(&backbone, &framing, false, true).is_empty());
        assert!(build_backbone(&pair(), &framing, 0.0, 2.0).is_empty());
    }
}
