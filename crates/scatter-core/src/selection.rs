//! Drag-gesture capture for rectangle and freehand lasso selection, plus the
//! screen-space membership tests that turn a finished gesture into indices.

use crate::backend::PixelRect;
use glam::Vec2;

/// Lasso vertices closer than this to the previous one are dropped, pixels.
const LASSO_MIN_SEGMENT_PX: f32 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionShape {
    #[default]
    Rectangle,
    Lasso,
}

/// Rectangle in logical pixels, top-left origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl ScreenRect {
    /// Smallest rectangle spanning two corners.
    pub fn from_corners(a: Vec2, b: Vec2) -> Self {
        let min = a.min(b);
        let max = a.max(b);
        Self {
            x: min.x,
            y: min.y,
            width: max.x - min.x,
            height: max.y - min.y,
        }
    }

    pub fn contains(&self, p: Vec2) -> bool {
        p.x >= self.x && p.x <= self.x + self.width && p.y >= self.y && p.y <= self.y + self.height
    }

    /// Device-pixel rectangle covering this one; never narrower than a pixel.
    pub fn to_pixel_rect(&self, device_pixel_ratio: f32) -> PixelRect {
        PixelRect {
            x: (self.x * device_pixel_ratio).floor().max(0.0) as u32,
            y: (self.y * device_pixel_ratio).floor().max(0.0) as u32,
            width: ((self.width * device_pixel_ratio).floor() as u32).max(1),
            height: ((self.height * device_pixel_ratio).floor() as u32).max(1),
        }
    }
}

/// A finished selection gesture.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectionRegion {
    Rectangle(ScreenRect),
    Lasso(Vec<Vec2>),
}

/// What the host should draw over the canvas while a gesture is live.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectionOverlay {
    Rectangle(ScreenRect),
    Path(Vec<Vec2>),
}

#[derive(Debug, Clone)]
struct Gesture {
    start: Vec2,
    rect: ScreenRect,
    path: Vec<Vec2>,
}

#[derive(Debug, Clone, Default)]
pub struct SelectionSurface {
    pub shape: SelectionShape,
    gesture: Option<Gesture>,
}

impl SelectionSurface {
    pub fn new(shape: SelectionShape) -> Self {
        Self {
            shape,
            gesture: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.gesture.is_some()
    }

    pub fn pointer_down(&mut self, position: Vec2) {
        self.gesture = Some(Gesture {
            start: position,
            rect: ScreenRect {
                x: position.x,
                y: position.y,
                width: 1.0,
                height: 1.0,
            },
            path: vec![position],
        });
    }

    pub fn pointer_move(&mut self, position: Vec2) {
        let Some(gesture) = self.gesture.as_mut() else {
            return;
        };
        gesture.rect = ScreenRect::from_corners(gesture.start, position);
        let far_enough = gesture
            .path
            .last()
            .map_or(true, |last| last.distance(position) >= LASSO_MIN_SEGMENT_PX);
        if far_enough {
            gesture.path.push(position);
        }
    }

    /// Ends the gesture. A release without a matching press yields `None`.
    pub fn pointer_up(&mut self) -> Option<SelectionRegion> {
        let gesture = self.gesture.take()?;
        Some(match self.shape {
            SelectionShape::Rectangle => SelectionRegion::Rectangle(gesture.rect),
            SelectionShape::Lasso => SelectionRegion::Lasso(gesture.path),
        })
    }

    /// Drops a live gesture without reporting it.
    pub fn cancel(&mut self) {
        self.gesture = None;
    }

    pub fn overlay(&self) -> Option<SelectionOverlay> {
        let gesture = self.gesture.as_ref()?;
        Some(match self.shape {
            SelectionShape::Rectangle => SelectionOverlay::Rectangle(gesture.rect),
            SelectionShape::Lasso => SelectionOverlay::Path(gesture.path.clone()),
        })
    }
}

/// Even-odd ray casting test.
pub fn point_in_polygon(p: Vec2, polygon: &[Vec2]) -> bool {
    let mut inside = false;
    let mut j = polygon.len().wrapping_sub(1);
    for i in 0..polygon.len() {
        let (a, b) = (polygon[i], polygon[j]);
        if (a.y > p.y) != (b.y > p.y) && p.x < (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Indices of projected points inside the rectangle.
pub fn indices_in_rect(screen_points: &[Option<Vec2>], rect: &ScreenRect) -> Vec<usize> {
    screen_points
        .iter()
        .enumerate()
        .filter_map(|(i, p)| p.filter(|p| rect.contains(*p)).map(|_| i))
        .collect()
}

/// Indices of projected points inside the lasso. Paths with fewer than three
/// vertices enclose nothing.
pub fn indices_in_polygon(screen_points: &[Option<Vec2>], polygon: &[Vec2]) -> Vec<usize> {
    if polygon.len() < 3 {
        return Vec::new();
    }
    let (min, max) = polygon
        .iter()
        .fold((Vec2::splat(f32::INFINITY), Vec2::splat(f32::NEG_INFINITY)), |(lo, hi), p| {
            (lo.min(*p), hi.max(*p))
        });
    screen_points
        .iter()
        .enumerate()
        .filter_map(|(i, p)| {
            let p = (*p)?;
            let in_bounds = p.cmpge(min).all() && p.cmple(max).all();
            (in_bounds && point_in_polygon(p, polygon)).then_some(i)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rectangle_gesture_normalizes_corners() {
        let mut s = SelectionSurface::new(SelectionShape::Rectangle);
        s.pointer_down(Vec2::new(50.0, 40.0));
        s.pointer_move(Vec2::new(10.0, 60.0));
        assert_eq!(
            s.overlay(),
            Some(SelectionOverlay::Rectangle(ScreenRect {
                x: 10.0,
                y: 40.0,
                width: 40.0,
                height: 20.0
            }))
        );
        let region = s.pointer_up().unwrap();
        assert!(matches!(region, SelectionRegion::Rectangle(r) if r.width == 40.0));
        assert!(!s.is_active());
    }

    #[test]
    fn release_without_press_is_a_no_op() {
        let mut s = SelectionSurface::new(SelectionShape::Lasso);
        s.pointer_move(Vec2::ONE);
        assert_eq!(s.pointer_up(), None);
    }

    #[test]
    fn lasso_drops_tiny_segments() {
        let mut s = SelectionSurface::new(SelectionShape::Lasso);
        s.pointer_down(Vec2::ZERO);
        s.pointer_move(Vec2::new(0.5, 0.5));
        s.pointer_move(Vec2::new(10.0, 0.0));
        s.pointer_move(Vec2::new(10.0, 10.0));
        let Some(SelectionRegion::Lasso(path)) = s.pointer_up() else {
            panic!("expected lasso");
        };
        assert_eq!(path.len(), 3);
    }

    #[test]
    fn polygon_membership() {
        let square = [
            Vec2::new(0.0, 0.0),
            Vec2::new(10.0, 0.0),
            Vec2::new(10.0, 10.0),
            Vec2::new(0.0, 10.0),
        ];
        assert!(point_in_polygon(Vec2::new(5.0, 5.0), &square));
        assert!(!point_in_polygon(Vec2::new(15.0, 5.0), &square));

        let pts = [Some(Vec2::new(5.0, 5.0)), None, Some(Vec2::new(-1.0, 5.0))];
        assert_eq!(indices_in_polygon(&pts, &square), vec![0]);
        assert!(indices_in_polygon(&pts, &square[..2]).is_empty());
    }

    #[test]
    fn pixel_rect_scales_by_device_ratio() {
        let r = ScreenRect {
            x: 10.5,
            y: 3.0,
            width: 0.2,
            height: 4.0,
        };
        assert_eq!(
            r.to_pixel_rect(2.0),
            PixelRect {
                x: 21,
                y: 6,
                width: 1,
                height: 8
            }
        );
    }

    #[test]
    fn shrinking_rectangle_never_grows_selection() {
        let pts: Vec<Option<Vec2>> = (0..100)
            .map(|i| Some(Vec2::new((i * 37 % 100) as f32, (i * 53 % 100) as f32)))
            .collect();
        let mut rect = ScreenRect {
            x: 0.0,
            y: 0.0,
            width: 100.0,
            height: 100.0,
        };
        let mut last = indices_in_rect(&pts, &rect).len();
        while rect.width > 1.0 {
            rect.x += 2.0;
            rect.y += 1.0;
            rect.width -= 4.0;
            rect.height -= 3.0;
            let n = indices_in_rect(&pts, &rect).len();
            assert!(n <= last);
            last = n;
        }
    }
}
