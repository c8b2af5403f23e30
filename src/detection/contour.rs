//! Border following over a binary change mask (Suzuki & Abe, 1985)
//!
//! Every connected component yields an outer border, and every hole inside
//! a component yields a hole border. Borders record their parent so the
//! full nesting tree is available. Boundary points are compressed: runs of
//! steps in the same direction keep only their end points.

use super::mask::ChangeMask;
use crate::types::BoundingBox;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BorderKind {
    Outer,
    Hole,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// One traced border
#[derive(Debug, Clone, PartialEq)]
pub struct Contour {
    pub points: Vec<Point>,
    pub kind: BorderKind,
    /// Index of the enclosing border in the returned list
    pub parent: Option<usize>,
}

impl Contour {
    /// Polygon area enclosed by the boundary points (shoelace formula)
    pub fn area(&self) -> f64 {
        let n = self.points.len();
        if n < 3 {
            return 0.0;
        }
        let mut twice = 0i64;
        for i in 0..n {
            let a = self.points[i];
            let b = self.points[(i + 1) % n];
            twice += a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64;
        }
        twice.abs() as f64 / 2.0
    }

    /// Smallest box containing every boundary pixel
    pub fn bounding_box(&self) -> BoundingBox {
        let mut min_x = i32::MAX;
        let mut min_y = i32::MAX;
        let mut max_x = i32::MIN;
        let mut max_y = i32::MIN;
        for p in &self.points {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        if self.points.is_empty() {
            return BoundingBox::new(0, 0, 0, 0);
        }
        BoundingBox::new(
            min_x as u32,
            min_y as u32,
            (max_x - min_x + 1) as u32,
            (max_y - min_y + 1) as u32,
        )
    }
}

// Clockwise in image coordinates (y grows downward), starting east
const NEIGHBORS: [(i32, i32); 8] = [
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
    (0, -1),
    (1, -1),
];

fn direction(from: (i32, i32), to: (i32, i32)) -> usize {
    let step = (to.0 - from.0, to.1 - from.1);
    NEIGHBORS.iter().position(|&d| d == step).unwrap_or(0)
}

/// Labelled working copy of the mask with a one-pixel zero frame
struct Grid {
    stride: i32,
    cells: Vec<i32>,
}

impl Grid {
    fn from_mask(mask: &ChangeMask) -> Self {
        let stride = mask.width() as i32 + 2;
        let rows = mask.height() as i32 + 2;
        let mut cells = vec![0i32; (stride * rows) as usize];
        for y in 0..mask.height() {
            for x in 0..mask.width() {
                if mask.is_changed(x, y) {
                    cells[((y as i32 + 1) * stride + x as i32 + 1) as usize] = 1;
                }
            }
        }
        Self { stride, cells }
    }

    fn get(&self, p: (i32, i32)) -> i32 {
        self.cells[(p.1 * self.stride + p.0) as usize]
    }

    fn set(&mut self, p: (i32, i32), value: i32) {
        self.cells[(p.1 * self.stride + p.0) as usize] = value;
    }
}

/// Trace all borders in `mask`
pub fn find_contours(mask: &ChangeMask) -> Vec<Contour> {
    let mut grid = Grid::from_mask(mask);
    let mut contours: Vec<Contour> = Vec::new();
    // Border label 1 is the implicit frame; traced borders start at 2
    let mut nbd = 1i32;

    for y in 1..=mask.height() as i32 {
        let mut lnbd = 1i32;
        for x in 1..=mask.width() as i32 {
            let value = grid.get((x, y));
            if value == 0 {
                continue;
            }

            let start = if value == 1 && grid.get((x - 1, y)) == 0 {
                Some((BorderKind::Outer, (x - 1, y)))
            } else if value >= 1 && grid.get((x + 1, y)) == 0 {
                if value > 1 {
                    lnbd = value;
                }
                Some((BorderKind::Hole, (x + 1, y)))
            } else {
                None
            };

            if let Some((kind, from)) = start {
                nbd += 1;
                let parent = if lnbd <= 1 {
                    None
                } else {
                    let previous = (lnbd - 2) as usize;
                    if contours[previous].kind == kind {
                        contours[previous].parent
                    } else {
                        Some(previous)
                    }
                };
                let points = follow_border(&mut grid, (x, y), from, nbd);
                contours.push(Contour {
                    points: compress(points),
                    kind,
                    parent,
                });
            }

            let value = grid.get((x, y));
            if value != 1 {
                lnbd = value.abs();
            }
        }
    }

    contours
}

fn follow_border(grid: &mut Grid, start: (i32, i32), from: (i32, i32), nbd: i32) -> Vec<Point> {
    let to_point = |p: (i32, i32)| Point::new(p.0 - 1, p.1 - 1);

    let first_dir = direction(start, from);
    let first = (0..8)
        .map(|k| {
            let d = NEIGHBORS[(first_dir + k) % 8];
            (start.0 + d.0, start.1 + d.1)
        })
        .find(|&p| grid.get(p) != 0);

    let Some(p1) = first else {
        // Isolated pixel
        grid.set(start, -nbd);
        return vec![to_point(start)];
    };

    let mut points = Vec::new();
    let mut previous = p1;
    let mut current = start;
    loop {
        let back = direction(current, previous);
        let mut next = current;
        let mut east_is_background = false;
        for k in 1..=8 {
            let d = (back + 8 - k) % 8;
            let candidate = (current.0 + NEIGHBORS[d].0, current.1 + NEIGHBORS[d].1);
            if grid.get(candidate) != 0 {
                next = candidate;
                break;
            }
            if d == 0 {
                east_is_background = true;
            }
        }

        if east_is_background {
            grid.set(current, -nbd);
        } else if grid.get(current) == 1 {
            grid.set(current, nbd);
        }
        points.push(to_point(current));

        if next == start && current == p1 {
            break;
        }
        previous = current;
        current = next;
    }

    points
}

fn compress(points: Vec<Point>) -> Vec<Point> {
    let n = points.len();
    if n < 3 {
        return points;
    }
    let mut kept = Vec::with_capacity(n);
    for i in 0..n {
        let prev = points[(i + n - 1) % n];
        let cur = points[i];
        let next = points[(i + 1) % n];
        let incoming = (cur.x - prev.x, cur.y - prev.y);
        let outgoing = (next.x - cur.x, next.y - cur.y);
        if i == 0 || incoming != outgoing {
            kept.push(cur);
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect_mask(width: u32, height: u32, x0: u32, y0: u32, w: u32, h: u32) -> ChangeMask {
        ChangeMask::from_fn(width, height, |x, y| {
            x >= x0 && x < x0 + w && y >= y0 && y < y0 + h
        })
    }

    #[test]
    fn test_empty_mask_has_no_contours() {
        assert!(find_contours(&ChangeMask::empty(10, 10)).is_empty());
    }

    #[test]
    fn test_solid_rectangle() {
        let contours = find_contours(&rect_mask(20, 20, 2, 3, 5, 4));
        assert_eq!(contours.len(), 1);

        let c = &contours[0];
        assert_eq!(c.kind, BorderKind::Outer);
        assert_eq!(c.parent, None);
        // Boundary polygon through pixel centers spans (w-1) x (h-1)
        assert_eq!(c.area(), 12.0);
        assert_eq!(c.bounding_box(), BoundingBox::new(2, 3, 5, 4));
        // Compressed down to the four corners
        assert_eq!(c.points.len(), 4);
    }

    #[test]
    fn test_isolated_pixel() {
        let contours = find_contours(&ChangeMask::from_fn(5, 5, |x, y| x == 2 && y == 2));
        assert_eq!(contours.len(), 1);
        assert_eq!(contours[0].points, vec![Point::new(2, 2)]);
        assert_eq!(contours[0].area(), 0.0);
        assert_eq!(contours[0].bounding_box(), BoundingBox::new(2, 2, 1, 1));
    }

    #[test]
    fn test_ring_has_outer_and_hole() {
        // 9x9 square with a 3x3 hole in the middle
        let mask = ChangeMask::from_fn(12, 12, |x, y| {
            let inside = (1..10).contains(&x) && (1..10).contains(&y);
            let hole = (4..7).contains(&x) && (4..7).contains(&y);
            inside && !hole
        });
        let contours = find_contours(&mask);
        assert_eq!(contours.len(), 2);

        let outer = &contours[0];
        let hole = &contours[1];
        assert_eq!(outer.kind, BorderKind::Outer);
        assert_eq!(hole.kind, BorderKind::Hole);
        assert_eq!(hole.parent, Some(0));
        assert_eq!(outer.area(), 64.0);
        assert!(hole.area() > 0.0);
    }

    #[test]
    fn test_nested_component_in_hole() {
        let mask = ChangeMask::from_fn(15, 15, |x, y| {
            let ring = (1..14).contains(&x) && (1..14).contains(&y);
            let hole = (3..12).contains(&x) && (3..12).contains(&y);
            let island = (6..9).contains(&x) && (6..9).contains(&y);
            (ring && !hole) || island
        });
        let contours = find_contours(&mask);
        assert_eq!(contours.len(), 3);

        let island = contours
            .iter()
            .position(|c| c.kind == BorderKind::Outer && c.parent.is_some())
            .expect("island border");
        let hole_index = contours[island].parent.unwrap();
        assert_eq!(contours[hole_index].kind, BorderKind::Hole);
        assert_eq!(contours[island].area(), 4.0);
    }

    #[test]
    fn test_separate_components() {
        let mask = ChangeMask::from_fn(30, 10, |x, y| {
            (y >= 2 && y < 6) && ((2..6).contains(&x) || (20..28).contains(&x))
        });
        let contours = find_contours(&mask);
        assert_eq!(contours.len(), 2);
        assert!(contours.iter().all(|c| c.kind == BorderKind::Outer && c.parent.is_none()));
        let mut areas: Vec<f64> = contours.iter().map(Contour::area).collect();
        areas.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(areas, vec![9.0, 21.0]);
    }

    #[test]
    fn test_component_touching_edges() {
        let contours = find_contours(&ChangeMask::from_fn(6, 4, |_, _| true));
        assert_eq!(contours.len(), 1);
        assert_eq!(contours[0].area(), 15.0);
        assert_eq!(contours[0].bounding_box(), BoundingBox::new(0, 0, 6, 4));
    }
}
