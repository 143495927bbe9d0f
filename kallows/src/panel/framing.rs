//! Rails and frames around the placed boards.

use crate::geometry::{Point, Rect, Segment};
use crate::panel::config::{FrameCuts, FramingConfig, FramingType};
use crate::panel::cuts::{Cut, CutOrigin};

/// Rails or frame pieces as rectangles around `boards`.
///
/// `boards` is the bounding box of all substrates. Rails are widened when
/// needed to reach `mintotalheight` / `mintotalwidth`.
pub fn framing_substrates(boards: Rect, config: &FramingConfig) -> Vec<Rect> {
    let (hspace, vspace) = (config.hspace, config.vspace);
    let widen = |width: f64, extent: f64, minimum: f64| -> f64 {
        let total = extent + 2.0 * width;
        if total < minimum {
            width + (minimum - total) / 2.0
        } else {
            width
        }
    };

    match config.kind {
        FramingType::None => Vec::new(),
        FramingType::RailsTb => {
            let w = widen(config.width, boards.height() + 2.0 * vspace, config.min_total_height);
            vec![
                Rect::from_ltrb(boards.min.x, boards.min.y - vspace - w, boards.max.x, boards.min.y - vspace),
                Rect::from_ltrb(boards.min.x, boards.max.y + vspace, boards.max.x, boards.max.y + vspace + w),
            ]
        }
        FramingType::RailsLr => {
            let w = widen(config.width, boards.width() + 2.0 * hspace, config.min_total_width);
            vec![
                Rect::from_ltrb(boards.min.x - hspace - w, boards.min.y, boards.min.x - hspace, boards.max.y),
                Rect::from_ltrb(boards.max.x + hspace, boards.min.y, boards.max.x + hspace + w, boards.max.y),
            ]
        }
        FramingType::Frame => {
            let wv = widen(config.width, boards.height() + 2.0 * vspace, config.min_total_height);
            let wh = widen(config.width, boards.width() + 2.0 * hspace, config.min_total_width);
            let inner = boards.inflate(hspace, vspace);
            let left = inner.min.x - wh;
            let right = inner.max.x + wh;
            vec![
                Rect::from_ltrb(left, inner.min.y - wv, right, inner.min.y),
                Rect::from_ltrb(left, inner.max.y, right, inner.max.y + wv),
                Rect::from_ltrb(left, inner.min.y, inner.min.x, inner.max.y),
                Rect::from_ltrb(inner.max.x, inner.min.y, right, inner.max.y),
            ]
        }
    }
}

/// Cuts separating the frame into removable pieces.
///
/// Vertical cuts run through the top and bottom bars at the inner corners,
/// horizontal cuts through the side bars.
pub fn frame_cuts(framing: &[Rect], config: &FramingConfig) -> Vec<Cut> {
    if config.kind != FramingType::Frame || framing.len() != 4 {
        return Vec::new();
    }
    let (top, bottom, left, right) = (framing[0], framing[1], framing[2], framing[3]);
    let inner_left = left.max.x;
    let inner_right = right.min.x;
    let mut cuts = Vec::new();

    if matches!(config.cuts, FrameCuts::Vertical | FrameCuts::Both) {
        for bar in [top, bottom] {
            for x in [inner_left, inner_right] {
                cuts.push(Cut::new(
                    Segment::new(Point::new(x, bar.min.y), Point::new(x, bar.max.y)),
                    CutOrigin::Frame,
                ));
            }
        }
    }
    if matches!(config.cuts, FrameCuts::Horizontal | FrameCuts::Both) {
        for bar in [left, right] {
            for y in [bar.min.y, bar.max.y] {
                cuts.push(Cut::new(
                    Segment::new(Point::new(bar.min.x, y), Point::new(bar.max.x, y)),
                    CutOrigin::Frame,
                ));
            }
        }
    }
    cuts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(kind: FramingType) -> FramingConfig {
        FramingConfig {
            kind,
            hspace: 2.0,
            vspace: 3.0,
            width: 6.0,
            cuts: FrameCuts::Both,
            min_total_height: 0.0,
            min_total_width: 0.0,
        }
    }

    #[test]
    fn test_left_right_rails() {
        let boards = Rect::from_ltrb(-25.0, -15.0, 78.0, 15.0);
        let rails = framing_substrates(boards, &config(FramingType::RailsLr));
        assert_eq!(
            rails,
            vec![
                Rect::from_ltrb(-33.0, -15.0, -27.0, 15.0),
                Rect::from_ltrb(80.0, -15.0, 86.0, 15.0),
            ]
        );
    }

    #[test]
    fn test_top_bottom_rails_reach_min_height() {
        let boards = Rect::from_ltrb(0.0, 0.0, 100.0, 30.0);
        let mut cfg = config(FramingType::RailsTb);
        cfg.min_total_height = 60.0;
        let rails = framing_substrates(boards, &cfg);
        let total = rails[0].union(rails[1]);
        assert!((total.height() - 60.0).abs() < 1e-9);
        assert_eq!(rails[0].max.y, -3.0);
    }

    #[test]
    fn test_frame_is_closed_and_cut_at_corners() {
        let boards = Rect::from_ltrb(0.0, 0.0, 100.0, 30.0);
        let cfg = config(FramingType::Frame);
        let frame = framing_substrates(boards, &cfg);
        assert_eq!(frame.len(), 4);
        let outer = frame.iter().copied().reduce(Rect::union).unwrap();
        assert_eq!(outer, Rect::from_ltrb(-8.0, -9.0, 108.0, 39.0));

        let cuts = frame_cuts(&frame, &cfg);
        assert_eq!(cuts.len(), 8);
        assert!(cuts.iter().all(|c| (c.segment.length() - 6.0).abs() < 1e-9));
    }

    #[test]
    fn test_no_frame_cuts_for_rails() {
        let boards = Rect::from_ltrb(0.0, 0.0, 100.0, 30.0);
        let cfg = config(FramingType::RailsLr);
        let rails = framing_substrates(boards, &cfg);
        assert!(frame_cuts(&rails, &cfg).is_empty());
        assert!(framing_substrates(boards, &config(FramingType::None)).is_empty());
    }
}
