//! Reuse of template pictures on generated slides.

// EMU per inch
pub const EMU_PER_INCH: i64 = 914_400;

/// When and how large reused pictures are placed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImagePolicy {
    /// Place on every slide whose 0-based index is a multiple of this
    pub cadence: usize,
    /// Also place on slides with at most this many bullets
    pub sparse_threshold: usize,
    /// Largest banner height, in EMU
    pub banner_max_height: i64,
    /// Largest banner width, as a fraction of slide width
    pub banner_max_width_ratio: f64,
    /// Largest accent width, as a fraction of slide width
    pub accent_max_width_ratio: f64,
    /// Largest accent height, as a fraction of slide height
    pub accent_max_height_ratio: f64,
    /// Distance kept from the slide edge, in EMU
    pub margin: i64,
    /// Distance kept from filled placeholders, in EMU
    pub gap: i64,
    /// Smallest side a placed picture may have, in EMU
    pub min_extent: i64,
}

impl Default for ImagePolicy {
    fn default() -> Self {
        Self {
            cadence: 3,
            sparse_threshold: 1,
            banner_max_height: EMU_PER_INCH * 6 / 5,
            banner_max_width_ratio: 0.35,
            accent_max_width_ratio: 0.18,
            accent_max_height_ratio: 0.35,
            margin: EMU_PER_INCH * 3 / 10,
            gap: EMU_PER_INCH / 10,
            min_extent: EMU_PER_INCH * 3 / 10,
        }
    }
}

impl ImagePolicy {
    /// Whether slide `index` with `bullet_count` bullets gets a picture.
    pub fn wants_picture(&self, index: usize, bullet_count: usize) -> bool {
        (self.cadence > 0 && index % self.cadence == 0) || bullet_count <= self.sparse_threshold
    }
}

/// Where a placed picture goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccentPosition {
    BottomBanner,
    RightAccent,
}

/// Position and size in EMU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub x: i64,
    pub y: i64,
    pub cx: i64,
    pub cy: i64,
}

impl Frame {
    pub fn right(&self) -> i64 {
        self.x + self.cx
    }

    pub fn bottom(&self) -> i64 {
        self.y + self.cy
    }

    /// Whether the two frames share any area. Touching edges do not count.
    pub fn intersects(&self, other: &Frame) -> bool {
        self.x < other.right() && other.x < self.right() && self.y < other.bottom() && other.y < self.bottom()
    }
}

/// Rotating cursor over the inventoried pictures.
///
/// Each placement takes the next picture and wraps at the end; placements
/// alternate between the bottom banner and the right accent.
#[derive(Debug, Clone)]
pub struct PictureCursor {
    len: usize,
    placed: usize,
}

impl PictureCursor {
    pub fn new(len: usize) -> Self {
        Self { len, placed: 0 }
    }

    /// Index of the next picture and its position, or `None` with no pictures.
    ///
    /// Does not move the cursor; call [`PictureCursor::advance`] once the
    /// picture is actually placed.
    pub fn peek(&self) -> Option<(usize, AccentPosition)> {
        if self.len == 0 {
            return None;
        }
        let position = if self.placed % 2 == 0 {
            AccentPosition::BottomBanner
        } else {
            AccentPosition::RightAccent
        };
        Some((self.placed % self.len, position))
    }

    /// Takes the next picture and its position, or `None` with no pictures.
    pub fn advance(&mut self) -> Option<(usize, AccentPosition)> {
        let next = self.peek()?;
        self.placed += 1;
        Some(next)
    }

    pub fn placed(&self) -> usize {
        self.placed
    }
}

// Fallback aspect ratio when the original size is unknown
const DEFAULT_ASPECT: (i64, i64) = (4, 3);

#[derive(Debug, Clone, Copy)]
enum Strip {
    Bottom,
    Right,
    Left,
    Top,
}

/// Fits a picture with extent `extent` next to the `occupied` frames.
///
/// The picture goes into the free strip below, right of, left of or above
/// everything occupied, trying the strip that matches `position` first. It is
/// scaled down to fit the strip and never overlaps an occupied frame. `None`
/// when no strip can hold it at `min_extent` or more.
pub fn accent_frame(
    policy: &ImagePolicy,
    position: AccentPosition,
    slide_cx: i64,
    slide_cy: i64,
    extent: Option<(i64, i64)>,
    occupied: &[Frame],
) -> Option<Frame> {
    let (w, h) = extent
        .filter(|(w, h)| *w > 0 && *h > 0)
        .unwrap_or(DEFAULT_ASPECT);

    let inner = Frame {
        x: policy.margin,
        y: policy.margin,
        cx: slide_cx - 2 * policy.margin,
        cy: slide_cy - 2 * policy.margin,
    };
    if inner.cx <= 0 || inner.cy <= 0 {
        return None;
    }
    let busy: Vec<&Frame> = occupied.iter().filter(|f| f.intersects(&inner)).collect();

    let (box_w, box_h) = match position {
        AccentPosition::BottomBanner => (
            (slide_cx as f64 * policy.banner_max_width_ratio) as i64,
            policy.banner_max_height,
        ),
        AccentPosition::RightAccent => (
            (slide_cx as f64 * policy.accent_max_width_ratio) as i64,
            (slide_cy as f64 * policy.accent_max_height_ratio) as i64,
        ),
    };
    let order = match position {
        AccentPosition::BottomBanner => [Strip::Bottom, Strip::Right, Strip::Left, Strip::Top],
        AccentPosition::RightAccent => [Strip::Right, Strip::Bottom, Strip::Left, Strip::Top],
    };

    order.into_iter().find_map(|side| {
        let strip = free_strip(side, &inner, &busy, policy.gap)?;

        // Scale to fit, keeping aspect ratio
        let fit_w = box_w.min(strip.cx);
        let fit_h = box_h.min(strip.cy);
        let scale = (fit_w as f64 / w as f64).min(fit_h as f64 / h as f64);
        let cx = ((w as f64 * scale) as i64).min(strip.cx);
        let cy = ((h as f64 * scale) as i64).min(strip.cy);
        if cx < policy.min_extent || cy < policy.min_extent {
            return None;
        }

        let (x, y) = match position {
            AccentPosition::BottomBanner => (strip.x, strip.bottom() - cy),
            AccentPosition::RightAccent => (strip.right() - cx, strip.y + (strip.cy - cy) / 2),
        };
        Some(Frame { x, y, cx, cy })
    })
}

// Part of `inner` beyond every busy frame on one side
fn free_strip(side: Strip, inner: &Frame, busy: &[&Frame], gap: i64) -> Option<Frame> {
    let strip = match side {
        Strip::Bottom => {
            let top = busy
                .iter()
                .map(|f| f.bottom() + gap)
                .max()
                .map_or(inner.y, |t| t.max(inner.y));
            Frame { x: inner.x, y: top, cx: inner.cx, cy: inner.bottom() - top }
        }
        Strip::Right => {
            let left = busy
                .iter()
                .map(|f| f.right() + gap)
                .max()
                .map_or(inner.x, |l| l.max(inner.x));
            Frame { x: left, y: inner.y, cx: inner.right() - left, cy: inner.cy }
        }
        Strip::Left => {
            let right = busy
                .iter()
                .map(|f| f.x - gap)
                .min()
                .map_or(inner.right(), |r| r.min(inner.right()));
            Frame { x: inner.x, y: inner.y, cx: right - inner.x, cy: inner.cy }
        }
        Strip::Top => {
            let bottom = busy
                .iter()
                .map(|f| f.y - gap)
                .min()
                .map_or(inner.bottom(), |b| b.min(inner.bottom()));
            Frame { x: inner.x, y: inner.y, cx: inner.cx, cy: bottom - inner.y }
        }
    };
    (strip.cx > 0 && strip.cy > 0).then_some(strip)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_third_slide_and_sparse_slides_get_pictures() {
        let policy = ImagePolicy::default();
        let picks: Vec<usize> = (0..9).filter(|&i| policy.wants_picture(i, 3)).collect();
        assert_eq!(picks, vec![0, 3, 6]);
        assert!(policy.wants_picture(4, 1));
        assert!(policy.wants_picture(5, 0));
        assert!(!policy.wants_picture(5, 2));
    }

    #[test]
    fn cursor_wraps_and_alternates() {
        let mut cursor = PictureCursor::new(2);
        let seq: Vec<_> = (0..3).filter_map(|_| cursor.advance()).collect();
        assert_eq!(
            seq,
            vec![
                (0, AccentPosition::BottomBanner),
                (1, AccentPosition::RightAccent),
                (0, AccentPosition::BottomBanner),
            ]
        );
        assert_eq!(cursor.placed(), 3);
    }

    #[test]
    fn empty_inventory_never_places() {
        let mut cursor = PictureCursor::new(0);
        assert_eq!(cursor.advance(), None);
        assert_eq!(cursor.placed(), 0);
    }

    #[test]
    fn banner_sits_inside_bottom_left_and_keeps_aspect() {
        let policy = ImagePolicy::default();
        let (sw, sh) = (12_192_000, 6_858_000);
        let f = accent_frame(&policy, AccentPosition::BottomBanner, sw, sh, Some((2_000_000, 1_000_000)), &[]).unwrap();
        assert!(f.cy <= policy.banner_max_height);
        assert_eq!(f.x, policy.margin);
        assert_eq!(f.y + f.cy, sh - policy.margin);
        let ratio = f.cx as f64 / f.cy as f64;
        assert!((ratio - 2.0).abs() < 0.01);
    }

    #[test]
    fn accent_sits_on_the_right_edge() {
        let policy = ImagePolicy::default();
        let (sw, sh) = (9_144_000, 6_858_000);
        let f = accent_frame(&policy, AccentPosition::RightAccent, sw, sh, None, &[]).unwrap();
        assert_eq!(f.x + f.cx, sw - policy.margin);
        assert!(f.cx as f64 <= sw as f64 * policy.accent_max_width_ratio + 1.0);
        assert!(f.y > 0 && f.y + f.cy < sh);
    }

    // Office 16:9 title and content placeholders
    const WIDE: (i64, i64) = (12_192_000, 6_858_000);
    const WIDE_TITLE: Frame = Frame { x: 838_200, y: 365_125, cx: 10_515_600, cy: 1_325_563 };
    const WIDE_BODY: Frame = Frame { x: 838_200, y: 1_825_625, cx: 10_515_600, cy: 4_351_338 };

    #[test]
    fn pictures_stay_clear_of_filled_placeholders() {
        let policy = ImagePolicy::default();
        let occupied = [WIDE_TITLE, WIDE_BODY];
        for position in [AccentPosition::BottomBanner, AccentPosition::RightAccent] {
            for extent in [Some((2_000_000, 1_000_000)), Some((1_000_000, 1_000_000)), None] {
                let f = accent_frame(&policy, position, WIDE.0, WIDE.1, extent, &occupied)
                    .expect("there is room below the body");
                assert!(!f.intersects(&WIDE_BODY), "{position:?} {f:?} overlaps the body");
                assert!(!f.intersects(&WIDE_TITLE), "{position:?} {f:?} overlaps the title");
                assert!(f.x >= policy.margin && f.right() <= WIDE.0 - policy.margin);
                assert!(f.y >= policy.margin && f.bottom() <= WIDE.1 - policy.margin);
                assert!(f.cx >= policy.min_extent && f.cy >= policy.min_extent);
            }
        }
    }

    #[test]
    fn banner_moves_below_the_body_and_shrinks() {
        let policy = ImagePolicy::default();
        let f = accent_frame(
            &policy,
            AccentPosition::BottomBanner,
            WIDE.0,
            WIDE.1,
            Some((2_000_000, 1_000_000)),
            &[WIDE_BODY],
        )
        .unwrap();
        assert!(f.y >= WIDE_BODY.bottom() + policy.gap);
        assert!(f.cy < policy.banner_max_height);
        let ratio = f.cx as f64 / f.cy as f64;
        assert!((ratio - 2.0).abs() < 0.01);
    }

    #[test]
    fn no_free_space_means_no_picture() {
        let policy = ImagePolicy::default();
        let everything = Frame { x: 0, y: 0, cx: WIDE.0, cy: WIDE.1 };
        for position in [AccentPosition::BottomBanner, AccentPosition::RightAccent] {
            assert_eq!(accent_frame(&policy, position, WIDE.0, WIDE.1, None, &[everything]), None);
        }
    }

    #[test]
    fn peek_does_not_move_the_cursor() {
        let mut cursor = PictureCursor::new(3);
        assert_eq!(cursor.peek(), Some((0, AccentPosition::BottomBanner)));
        assert_eq!(cursor.peek(), Some((0, AccentPosition::BottomBanner)));
        cursor.advance();
        assert_eq!(cursor.peek(), Some((1, AccentPosition::RightAccent)));
    }

    #[test]
    fn touching_frames_do_not_intersect() {
        let a = Frame { x: 0, y: 0, cx: 10, cy: 10 };
        let b = Frame { x: 10, y: 0, cx: 10, cy: 10 };
        let c = Frame { x: 9, y: 9, cx: 10, cy: 10 };
        assert!(!a.intersects(&b));
        assert!(a.intersects(&c));
    }
}
