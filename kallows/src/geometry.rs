//! Axis-aligned geometry used by the panel builder.
//!
//! All coordinates are millimetres in KiCad's board frame (y grows down).
//! Panel substrates, rails, backbones and tabs are rectangles; their union
//! outline is rectilinear.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::parser::sexp::SExp;

pub const EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    pub fn distance(self, other: Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    pub fn approx_eq(self, other: Point) -> bool {
        (self.x - other.x).abs() < EPSILON && (self.y - other.y).abs() < EPSILON
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub min: Point,
    pub max: Point,
}

impl Rect {
    /// Rectangle spanning two corners given in any order.
    pub fn new(a: Point, b: Point) -> Self {
        Self {
            min: Point::new(a.x.min(b.x), a.y.min(b.y)),
            max: Point::new(a.x.max(b.x), a.y.max(b.y)),
        }
    }

    pub fn from_ltrb(left: f64, top: f64, right: f64, bottom: f64) -> Self {
        Self::new(Point::new(left, top), Point::new(right, bottom))
    }

    pub fn from_points(points: impl IntoIterator<Item = Point>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        Some(iter.fold(Rect::new(first, first), |r, p| r.include(p)))
    }

    pub fn include(self, p: Point) -> Self {
        Self {
            min: Point::new(self.min.x.min(p.x), self.min.y.min(p.y)),
            max: Point::new(self.max.x.max(p.x), self.max.y.max(p.y)),
        }
    }

    pub fn union(self, other: Rect) -> Self {
        self.include(other.min).include(other.max)
    }

    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    pub fn center(&self) -> Point {
        Point::new((self.min.x + self.max.x) / 2.0, (self.min.y + self.max.y) / 2.0)
    }

    pub fn inflate(self, dx: f64, dy: f64) -> Self {
        Self {
            min: self.min.offset(-dx, -dy),
            max: self.max.offset(dx, dy),
        }
    }

    pub fn translate(self, dx: f64, dy: f64) -> Self {
        Self {
            min: self.min.offset(dx, dy),
            max: self.max.offset(dx, dy),
        }
    }

    pub fn is_degenerate(&self) -> bool {
        self.width() <= EPSILON || self.height() <= EPSILON
    }

    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.min.x >= self.min.x - EPSILON
            && other.min.y >= self.min.y - EPSILON
            && other.max.x <= self.max.x + EPSILON
            && other.max.y <= self.max.y + EPSILON
    }

    /// True when `other` lies inside without reaching any edge.
    pub fn strictly_contains_rect(&self, other: &Rect) -> bool {
        other.min.x > self.min.x + EPSILON
            && other.min.y > self.min.y + EPSILON
            && other.max.x < self.max.x - EPSILON
            && other.max.y < self.max.y - EPSILON
    }

    pub fn contains_point(&self, p: Point) -> bool {
        p.x > self.min.x && p.x < self.max.x && p.y > self.min.y && p.y < self.max.y
    }

    pub fn anchor(&self, anchor: Anchor) -> Point {
        let (fx, fy) = anchor.fractions();
        Point::new(
            self.min.x + self.width() * fx,
            self.min.y + self.height() * fy,
        )
    }

    /// Outline as four segments, clockwise from the top-left corner.
    pub fn edges(&self) -> [Segment; 4] {
        let tl = self.min;
        let tr = Point::new(self.max.x, self.min.y);
        let br = self.max;
        let bl = Point::new(self.min.x, self.max.y);
        [
            Segment::new(tl, tr),
            Segment::new(tr, br),
            Segment::new(br, bl),
            Segment::new(bl, tl),
        ]
    }

    /// The segment two touching rectangles share, if any.
    pub fn shared_edge(&self, other: &Rect) -> Option<Segment> {
        let overlap = |a0: f64, a1: f64, b0: f64, b1: f64| {
            let lo = a0.max(b0);
            let hi = a1.min(b1);
            (hi - lo > EPSILON).then_some((lo, hi))
        };
        let touching = |a: f64, b: f64| (a - b).abs() < EPSILON;

        if touching(self.max.x, other.min.x) || touching(self.min.x, other.max.x) {
            let x = if touching(self.max.x, other.min.x) { self.max.x } else { self.min.x };
            let (lo, hi) = overlap(self.min.y, self.max.y, other.min.y, other.max.y)?;
            return Some(Segment::new(Point::new(x, lo), Point::new(x, hi)));
        }
        if touching(self.max.y, other.min.y) || touching(self.min.y, other.max.y) {
            let y = if touching(self.max.y, other.min.y) { self.max.y } else { self.min.y };
            let (lo, hi) = overlap(self.min.x, self.max.x, other.min.x, other.max.x)?;
            return Some(Segment::new(Point::new(lo, y), Point::new(hi, y)));
        }
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start: Point,
    pub end: Point,
}

impl Segment {
    pub fn new(start: Point, end: Point) -> Self {
        Self { start, end }
    }

    pub fn length(&self) -> f64 {
        self.start.distance(self.end)
    }

    pub fn is_horizontal(&self) -> bool {
        (self.start.y - self.end.y).abs() < EPSILON
    }

    pub fn is_vertical(&self) -> bool {
        (self.start.x - self.end.x).abs() < EPSILON
    }

    pub fn translate(self, dx: f64, dy: f64) -> Self {
        Self::new(self.start.offset(dx, dy), self.end.offset(dx, dy))
    }

    /// Point at parameter `t` in [0, 1].
    pub fn lerp(&self, t: f64) -> Point {
        Point::new(
            self.start.x + (self.end.x - self.start.x) * t,
            self.start.y + (self.end.y - self.start.y) * t,
        )
    }

    /// Extend both ends by `amount` along the segment direction.
    pub fn prolong(self, amount: f64) -> Self {
        let len = self.length();
        if len <= EPSILON {
            return self;
        }
        let ux = (self.end.x - self.start.x) / len;
        let uy = (self.end.y - self.start.y) / len;
        Self::new(
            self.start.offset(-ux * amount, -uy * amount),
            self.end.offset(ux * amount, uy * amount),
        )
    }

    /// Same segment regardless of direction.
    pub fn same_as(&self, other: &Segment) -> bool {
        (self.start.approx_eq(other.start) && self.end.approx_eq(other.end))
            || (self.start.approx_eq(other.end) && self.end.approx_eq(other.start))
    }
}

/// Reference point of a rectangle: corners, edge midpoints, or centre.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Anchor {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
    MidTop,
    MidBottom,
    MidLeft,
    MidRight,
    Center,
}

impl Anchor {
    fn fractions(self) -> (f64, f64) {
        match self {
            Anchor::TopLeft => (0.0, 0.0),
            Anchor::TopRight => (1.0, 0.0),
            Anchor::BottomLeft => (0.0, 1.0),
            Anchor::BottomRight => (1.0, 1.0),
            Anchor::MidTop => (0.5, 0.0),
            Anchor::MidBottom => (0.5, 1.0),
            Anchor::MidLeft => (0.0, 0.5),
            Anchor::MidRight => (1.0, 0.5),
            Anchor::Center => (0.5, 0.5),
        }
    }
}

impl FromStr for Anchor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tl" => Ok(Anchor::TopLeft),
            "tr" => Ok(Anchor::TopRight),
            "bl" => Ok(Anchor::BottomLeft),
            "br" => Ok(Anchor::BottomRight),
            "mt" => Ok(Anchor::MidTop),
            "mb" => Ok(Anchor::MidBottom),
            "ml" => Ok(Anchor::MidLeft),
            "mr" => Ok(Anchor::MidRight),
            "c" => Ok(Anchor::Center),
            other => Err(format!("unknown anchor '{}'", other)),
        }
    }
}

/// Boundary of the union of rectangles, as maximal axis-aligned segments.
///
/// The plane is split into the grid of all rectangle edges; a grid cell is
/// inside when its centre lies in some rectangle, and every cell side
/// separating inside from outside is a boundary piece.
pub fn union_outline(rects: &[Rect]) -> Vec<Segment> {
    let rects: Vec<&Rect> = rects.iter().filter(|r| !r.is_degenerate()).collect();
    if rects.is_empty() {
        return Vec::new();
    }

    let xs = sorted_coordinates(rects.iter().flat_map(|r| [r.min.x, r.max.x]));
    let ys = sorted_coordinates(rects.iter().flat_map(|r| [r.min.y, r.max.y]));
    let cols = xs.len() - 1;
    let rows = ys.len() - 1;

    let inside = |i: isize, j: isize| -> bool {
        if i < 0 || j < 0 || i as usize >= cols || j as usize >= rows {
            return false;
        }
        let (i, j) = (i as usize, j as usize);
        let c = Point::new((xs[i] + xs[i + 1]) / 2.0, (ys[j] + ys[j + 1]) / 2.0);
        rects.iter().any(|r| r.contains_point(c))
    };

    let mut segments = Vec::new();

    // Vertical boundary runs, merged while the inside stays on the same side.
    for (i, &x) in xs.iter().enumerate() {
        let mut run: Option<(f64, bool)> = None;
        for j in 0..=rows {
            let side = if j < rows {
                let left = inside(i as isize - 1, j as isize);
                let right = inside(i as isize, j as isize);
                (left != right).then_some(right)
            } else {
                None
            };
            match (run, side) {
                (Some((_, open_side)), Some(s)) if open_side == s => {}
                (Some((start, _)), _) => {
                    segments.push(Segment::new(Point::new(x, start), Point::new(x, ys[j])));
                    run = side.map(|s| (ys[j], s));
                }
                (None, Some(s)) => run = Some((ys[j], s)),
                (None, None) => {}
            }
        }
    }

    for (j, &y) in ys.iter().enumerate() {
        let mut run: Option<(f64, bool)> = None;
        for i in 0..=cols {
            let side = if i < cols {
                let above = inside(i as isize, j as isize - 1);
                let below = inside(i as isize, j as isize);
                (above != below).then_some(below)
            } else {
                None
            };
            match (run, side) {
                (Some((_, open_side)), Some(s)) if open_side == s => {}
                (Some((start, _)), _) => {
                    segments.push(Segment::new(Point::new(start, y), Point::new(xs[i], y)));
                    run = side.map(|s| (xs[i], s));
                }
                (None, Some(s)) => run = Some((xs[i], s)),
                (None, None) => {}
            }
        }
    }

    segments
}

fn sorted_coordinates(values: impl Iterator<Item = f64>) -> Vec<f64> {
    let mut values: Vec<f64> = values.collect();
    values.sort_by(|a, b| a.total_cmp(b));
    values.dedup_by(|a, b| (*a - *b).abs() < EPSILON);
    values
}

const POINT_TAGS: [&str; 5] = ["at", "start", "end", "mid", "center"];

fn read_xy(list: &[SExp]) -> Option<Point> {
    let x = list.get(1)?.as_f64()?;
    let y = list.get(2)?.as_f64()?;
    Some(Point::new(x, y))
}

/// Bounding box of a top-level board item.
///
/// Footprints count by their anchor position only; circles by their full
/// radius; arcs by their three defining points.
pub fn item_bbox(item: &SExp) -> Option<Rect> {
    if item.tag() == Some("footprint") || item.tag() == Some("module") {
        let at = item.child("at")?.as_list()?;
        let p = read_xy(at)?;
        return Some(Rect::new(p, p));
    }
    if item.tag() == Some("gr_circle") {
        let center = read_xy(item.child("center")?.as_list()?)?;
        let end = read_xy(item.child("end")?.as_list()?)?;
        let r = center.distance(end);
        return Some(Rect::new(center, center).inflate(r, r));
    }

    let mut points = Vec::new();
    collect_points(item, &mut points);
    Rect::from_points(points)
}

fn collect_points(sexp: &SExp, points: &mut Vec<Point>) {
    let Some(list) = sexp.as_list() else {
        return;
    };
    match sexp.tag() {
        Some(tag) if POINT_TAGS.contains(&tag) || tag == "xy" => {
            if let Some(p) = read_xy(list) {
                points.push(p);
            }
        }
        Some("effects") | Some("font") => {}
        _ => {
            for child in list.iter().skip(1) {
                collect_points(child, points);
            }
        }
    }
}

/// Move a top-level item by (dx, dy).
///
/// Footprint children are relative to the footprint, so only its own
/// `at` moves.
pub fn translate_item(item: &mut SExp, dx: f64, dy: f64) {
    let is_footprint = matches!(item.tag(), Some("footprint") | Some("module"));
    let Some(list) = item.as_list_mut() else {
        return;
    };
    for child in list.iter_mut().skip(1) {
        match child.tag() {
            Some(tag) if POINT_TAGS.contains(&tag) || tag == "xy" => shift_xy(child, dx, dy),
            Some(_) if is_footprint => {}
            Some(_) => translate_item(child, dx, dy),
            None => {}
        }
    }
}

fn shift_xy(sexp: &mut SExp, dx: f64, dy: f64) {
    if let Some(list) = sexp.as_list_mut() {
        let x = list.get(1).and_then(SExp::as_f64);
        let y = list.get(2).and_then(SExp::as_f64);
        if let (Some(x), Some(y)) = (x, y) {
            list[1] = SExp::number(x + dx);
            list[2] = SExp::number(y + dy);
        }
    }
}

/// `(tag x y)` helper for building items.
pub fn xy_node(tag: &str, p: Point) -> SExp {
    SExp::node(tag, vec![SExp::number(p.x), SExp::number(p.y)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::sexp::SExpParser;

    fn rect(l: f64, t: f64, r: f64, b: f64) -> Rect {
        Rect::from_ltrb(l, t, r, b)
    }

    fn total_length(segments: &[Segment]) -> f64 {
        segments.iter().map(Segment::length).sum()
    }

    #[test]
    fn test_union_of_single_rect_is_its_edges() {
        let outline = union_outline(&[rect(0.0, 0.0, 10.0, 5.0)]);
        assert_eq!(outline.len(), 4);
        assert!((total_length(&outline) - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_union_merges_touching_rects() {
        // Two boards bridged by a tab: an H-like shape.
        let outline = union_outline(&[
            rect(0.0, 0.0, 10.0, 10.0),
            rect(13.0, 0.0, 23.0, 10.0),
            rect(10.0, 4.0, 13.0, 6.0),
        ]);
        // 2 * (10 + 10 + 10) board sides minus 2 * 2 tab joints, plus 2 * 3 tab sides
        assert!((total_length(&outline) - (80.0 - 4.0 + 6.0)).abs() < 1e-9);
        assert!(outline.iter().all(|s| s.is_horizontal() || s.is_vertical()));
    }

    #[test]
    fn test_union_of_overlapping_rects() {
        let outline = union_outline(&[rect(0.0, 0.0, 10.0, 10.0), rect(5.0, 0.0, 15.0, 10.0)]);
        assert_eq!(outline.len(), 4);
        assert!((total_length(&outline) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_shared_edge() {
        let a = rect(0.0, 0.0, 10.0, 10.0);
        let b = rect(10.0, 4.0, 13.0, 6.0);
        let edge = a.shared_edge(&b).unwrap();
        assert!(edge.same_as(&Segment::new(Point::new(10.0, 4.0), Point::new(10.0, 6.0))));
        assert!(a.shared_edge(&rect(20.0, 0.0, 30.0, 10.0)).is_none());
    }

    #[test]
    fn test_anchor_parse_and_position() {
        let r = rect(0.0, 0.0, 100.0, 50.0);
        let anchor: Anchor = "mb".parse().unwrap();
        assert_eq!(r.anchor(anchor), Point::new(50.0, 50.0));
        assert!("zz".parse::<Anchor>().is_err());
    }

    #[test]
    fn test_translate_footprint_moves_only_anchor() {
        let mut fp = SExpParser::new(
            "(footprint \"R\" (at 1 2 90) (fp_line (start 0 0) (end 1 0)) (pad \"1\" smd rect (at 0.5 0) (size 1 1)))",
        )
        .parse()
        .unwrap();
        translate_item(&mut fp, 10.0, 5.0);
        assert_eq!(
            fp.to_string(),
            "(footprint \"R\" (at 11 7 90) (fp_line (start 0 0) (end 1 0)) (pad \"1\" smd rect (at 0.5 0) (size 1 1)))"
        );
    }

    #[test]
    fn test_translate_and_bbox_zone() {
        let mut zone = SExpParser::new(
            "(zone (net 1) (polygon (pts (xy 0 0) (xy 4 0) (xy 4 3))) (filled_polygon (layer \"F.Cu\") (pts (xy 1 1) (xy 2 2))))",
        )
        .parse()
        .unwrap();
        translate_item(&mut zone, -1.0, 1.0);
        let bbox = item_bbox(&zone).unwrap();
        assert_eq!(bbox, rect(-1.0, 1.0, 3.0, 4.0));
    }

    #[test]
    fn test_circle_bbox_uses_radius() {
        let circle = SExpParser::new("(gr_circle (center 5 5) (end 7 5) (layer \"Edge.Cuts\"))")
            .parse()
            .unwrap();
        assert_eq!(item_bbox(&circle).unwrap(), rect(3.0, 3.0, 7.0, 7.0));
    }
}
