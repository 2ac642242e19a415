//! Outer contours of connected regions in a binary mask
//!
//! Regions are 8-connected. Each region's outer boundary is traced with
//! Moore-neighbor tracing, giving a closed polygon through boundary pixel
//! centers; its area is the polygon area, so a filled `w` x `h` rectangle
//! measures `(w - 1) * (h - 1)`.
//!
//! A region sitting inside another region's hole gets its own contour, but it
//! can never enclose more area than the region around it.

use image::GrayImage;

/// Clockwise ring starting West (y grows downward)
const RING: [(i32, i32); 8] = [
    (-1, 0),
    (-1, -1),
    (0, -1),
    (1, -1),
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
];

/// Axis-aligned pixel rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Closed boundary polygon of one region
#[derive(Debug, Clone)]
pub struct Contour {
    pub points: Vec<(u32, u32)>,
}

impl Contour {
    /// Shoelace area of the boundary polygon
    pub fn area(&self) -> f64 {
        let n = self.points.len();
        if n < 3 {
            return 0.0;
        }
        let twice: i64 = (0..n)
            .map(|i| {
                let (x0, y0) = self.points[i];
                let (x1, y1) = self.points[(i + 1) % n];
                x0 as i64 * y1 as i64 - x1 as i64 * y0 as i64
            })
            .sum();
        twice.abs() as f64 / 2.0
    }

    pub fn bounding_box(&self) -> BoundingBox {
        let (mut min_x, mut min_y) = (u32::MAX, u32::MAX);
        let (mut max_x, mut max_y) = (0, 0);
        for &(x, y) in &self.points {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
        if self.points.is_empty() {
            return BoundingBox { x: 0, y: 0, width: 0, height: 0 };
        }
        BoundingBox {
            x: min_x,
            y: min_y,
            width: max_x - min_x + 1,
            height: max_y - min_y + 1,
        }
    }
}

struct Grid<'a> {
    mask: &'a GrayImage,
    width: i32,
    height: i32,
}

impl Grid<'_> {
    fn is_on(&self, x: i32, y: i32) -> bool {
        x >= 0
            && y >= 0
            && x < self.width
            && y < self.height
            && self.mask.get_pixel(x as u32, y as u32).0[0] > 0
    }
}

/// Outer contours of every region, in raster order of their top-left pixel
pub fn find_contours(mask: &GrayImage) -> Vec<Contour> {
    let (width, height) = mask.dimensions();
    let grid = Grid {
        mask,
        width: width as i32,
        height: height as i32,
    };
    let mut visited = vec![false; (width as usize) * (height as usize)];
    let mut contours = Vec::new();

    for y in 0..grid.height {
        for x in 0..grid.width {
            let idx = (y * grid.width + x) as usize;
            if visited[idx] || !grid.is_on(x, y) {
                continue;
            }
            // First pixel of an unseen region in raster order is on its outer boundary
            mark_region(&grid, (x, y), &mut visited);
            contours.push(trace_boundary(&grid, (x, y)));
        }
    }

    contours
}

/// Flood-fill the 8-connected region containing `seed`
fn mark_region(grid: &Grid<'_>, seed: (i32, i32), visited: &mut [bool]) {
    let mut stack = vec![seed];
    visited[(seed.1 * grid.width + seed.0) as usize] = true;

    while let Some((x, y)) = stack.pop() {
        for (dx, dy) in RING {
            let (nx, ny) = (x + dx, y + dy);
            if !grid.is_on(nx, ny) {
                continue;
            }
            let idx = (ny * grid.width + nx) as usize;
            if !visited[idx] {
                visited[idx] = true;
                stack.push((nx, ny));
            }
        }
    }
}

/// Next boundary pixel clockwise from the backtrack direction.
///
/// Returns the pixel and the ring index pointing from it back to the last
/// background position examined.
fn next_step(grid: &Grid<'_>, current: (i32, i32), backtrack: usize) -> Option<((i32, i32), usize)> {
    for k in 1..=8 {
        let dir = (backtrack + k) % 8;
        let (dx, dy) = RING[dir];
        let candidate = (current.0 + dx, current.1 + dy);
        if !grid.is_on(candidate.0, candidate.1) {
            continue;
        }

        let (bx, by) = RING[(dir + 7) % 8];
        let prev = (current.0 + bx, current.1 + by);
        let offset = (prev.0 - candidate.0, prev.1 - candidate.1);
        let new_backtrack = RING.iter().position(|&d| d == offset)?;
        return Some((candidate, new_backtrack));
    }
    None
}

fn trace_boundary(grid: &Grid<'_>, start: (i32, i32)) -> Contour {
    let to_point = |(x, y): (i32, i32)| (x as u32, y as u32);
    let mut points = vec![to_point(start)];

    // Start is the region's top-left pixel, so West is background
    let Some((first, first_backtrack)) = next_step(grid, start, 0) else {
        return Contour { points };
    };

    let mut current = first;
    let mut backtrack = first_backtrack;
    points.push(to_point(first));

    loop {
        let Some((next, next_backtrack)) = next_step(grid, current, backtrack) else {
            break;
        };
        if current == start && next == first {
            break;
        }
        points.push(to_point(next));
        current = next;
        backtrack = next_backtrack;
    }

    if points.len() > 1 && points.first() == points.last() {
        points.pop();
    }
    Contour { points }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn mask_from(rows: &[&str]) -> GrayImage {
        let h = rows.len() as u32;
        let w = rows[0].len() as u32;
        GrayImage::from_fn(w, h, |x, y| {
            if rows[y as usize].as_bytes()[x as usize] == b'#' {
                Luma([255])
            } else {
                Luma([0])
            }
        })
    }

    #[test]
    fn test_filled_rectangle() {
        let mut mask = GrayImage::new(40, 30);
        for y in 5..15 {
            for x in 10..30 {
                mask.put_pixel(x, y, Luma([255]));
            }
        }
        let contours = find_contours(&mask);
        assert_eq!(contours.len(), 1);
        assert_eq!(contours[0].area(), 19.0 * 9.0);
        assert_eq!(
            contours[0].bounding_box(),
            BoundingBox { x: 10, y: 5, width: 20, height: 10 }
        );
    }

    #[test]
    fn test_single_pixel_has_zero_area() {
        let contours = find_contours(&mask_from(&["...", ".#.", "..."]));
        assert_eq!(contours.len(), 1);
        assert_eq!(contours[0].points, vec![(1, 1)]);
        assert_eq!(contours[0].area(), 0.0);
        assert_eq!(
            contours[0].bounding_box(),
            BoundingBox { x: 1, y: 1, width: 1, height: 1 }
        );
    }

    #[test]
    fn test_diagonal_pixels_form_one_region() {
        let contours = find_contours(&mask_from(&["#..", ".#.", "..#"]));
        assert_eq!(contours.len(), 1);
        assert_eq!(contours[0].bounding_box().width, 3);
    }

    #[test]
    fn test_separate_regions() {
        let contours = find_contours(&mask_from(&[
            "##....",
            "##....",
            "......",
            "...###",
            "...###",
            "...###",
        ]));
        assert_eq!(contours.len(), 2);
        assert_eq!(contours[0].area(), 1.0);
        assert_eq!(contours[1].area(), 4.0);
    }

    #[test]
    fn test_ring_area_ignores_hole() {
        let contours = find_contours(&mask_from(&[
            "#####",
            "#...#",
            "#...#",
            "#...#",
            "#####",
        ]));
        assert_eq!(contours.len(), 1);
        assert_eq!(contours[0].area(), 16.0);
    }

    #[test]
    fn test_concave_shape() {
        let contours = find_contours(&mask_from(&[
            "##..",
            "##..",
            "####",
            "####",
        ]));
        assert_eq!(contours.len(), 1);
        // Boundary cuts the inner corner diagonally from (1,1) to (2,2)
        assert_eq!(contours[0].area(), 5.5);
        assert_eq!(
            contours[0].bounding_box(),
            BoundingBox { x: 0, y: 0, width: 4, height: 4 }
        );
    }
}
