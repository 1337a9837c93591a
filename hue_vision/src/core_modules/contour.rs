// THEORY:
// The ContourExtractor is the spatial grouping stage of the threshold pipeline. It
// takes the binary `Mask` of a single frame and finds every connected island of
// foreground pixels, producing one `Region` per island.
//
// Algorithm steps:
// 1.  **Raster Seeding**: The mask is scanned row by row. The first foreground pixel
//     of a component met in this order (its top-most, then left-most pixel) seeds
//     it, so the output order depends on the mask alone and is stable across calls.
// 2.  **Region Growing**: From the seed, an iterative flood fill over all 8
//     neighbours collects every pixel of the component. The bounding rectangle is
//     the min/max of those pixels, so it is exact even for shapes with holes.
// 3.  **Border Following**: A Moore-neighbour trace walks the component's outer
//     border clockwise, starting at the seed with its (always background) west
//     neighbour as the backtrack. The walk ends with Jacob's criterion: back at the
//     seed and about to repeat the first move.
// 4.  **Stateless Utility**: `extract_regions` has no memory of previous frames.

use crate::core_modules::range_mask::Mask;
use crate::core_modules::region::{BoundingRect, Point, Region};

/// Clockwise neighbour offsets (y grows downwards), starting east.
const NEIGHBOURS: [(i64, i64); 8] = [
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
    (0, -1),
    (1, -1),
];

/// Index into `NEIGHBOURS` pointing west.
const WEST: usize = 4;

/// Finds every 8-connected foreground component of `mask`.
pub fn extract_regions(mask: &Mask) -> Vec<Region> {
    let mut visited = vec![false; mask.width() as usize * mask.height() as usize];
    let mut regions = Vec::new();

    for y in 0..mask.height() {
        for x in 0..mask.width() {
            if !mask.get(x, y) || visited[mask.index(x, y)] {
                continue;
            }
            let seed = Point::new(x, y);
            let (bounds, pixel_count) = grow_region(mask, seed, &mut visited);
            let boundary = trace_boundary(mask, seed, pixel_count);
            regions.push(Region {
                id: regions.len(),
                boundary,
                bounds,
                pixel_count,
            });
        }
    }

    regions
}

fn is_foreground(mask: &Mask, x: i64, y: i64) -> bool {
    x >= 0
        && y >= 0
        && x < i64::from(mask.width())
        && y < i64::from(mask.height())
        && mask.get(x as u32, y as u32)
}

/// Flood-fills the component containing `seed`, returning its bounds and size.
fn grow_region(mask: &Mask, seed: Point, visited: &mut [bool]) -> (BoundingRect, usize) {
    let mut stack = vec![seed];
    visited[mask.index(seed.x, seed.y)] = true;

    let mut top_left = seed;
    let mut bottom_right = seed;
    let mut pixel_count = 0;

    while let Some(current) = stack.pop() {
        pixel_count += 1;
        top_left.x = top_left.x.min(current.x);
        top_left.y = top_left.y.min(current.y);
        bottom_right.x = bottom_right.x.max(current.x);
        bottom_right.y = bottom_right.y.max(current.y);

        for (dx, dy) in NEIGHBOURS {
            let nx = i64::from(current.x) + dx;
            let ny = i64::from(current.y) + dy;
            if !is_foreground(mask, nx, ny) {
                continue;
            }
            let index = mask.index(nx as u32, ny as u32);
            if !visited[index] {
                visited[index] = true;
                stack.push(Point::new(nx as u32, ny as u32));
            }
        }
    }

    (BoundingRect::from_corners(top_left, bottom_right), pixel_count)
}

/// First foreground neighbour of `from`, searching clockwise after `backtrack`.
fn next_step(mask: &Mask, from: (i64, i64), backtrack: usize) -> Option<(usize, (i64, i64))> {
    (1..=8).map(|i| (backtrack + i) % 8).find_map(|direction| {
        let (dx, dy) = NEIGHBOURS[direction];
        let candidate = (from.0 + dx, from.1 + dy);
        is_foreground(mask, candidate.0, candidate.1).then_some((direction, candidate))
    })
}

/// Moore-neighbour trace of the outer border of the component whose raster-first
/// pixel is `seed`.
fn trace_boundary(mask: &Mask, seed: Point, pixel_count: usize) -> Vec<Point> {
    let mut boundary = vec![seed];
    let origin = (i64::from(seed.x), i64::from(seed.y));

    let Some(first) = next_step(mask, origin, WEST) else {
        return boundary;
    };

    // Each border pixel is entered at most four times.
    let step_limit = 4 * pixel_count + 8;
    let mut step = first;
    for _ in 0..step_limit {
        let (direction, current) = step;
        // The last background pixel examined, seen from the pixel we just entered.
        let backtrack = if direction % 2 == 0 {
            (direction + 6) % 8
        } else {
            (direction + 5) % 8
        };
        let Some(following) = next_step(mask, current, backtrack) else {
            break;
        };
        if current == origin && following == first {
            break;
        }
        boundary.push(Point::new(current.0 as u32, current.1 as u32));
        step = following;
    }

    boundary
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mask_from(rows: &[&str]) -> Mask {
        let height = rows.len() as u32;
        let width = rows.first().map_or(0, |row| row.len()) as u32;
        Mask::from_fn(width, height, |x, y| rows[y as usize].as_bytes()[x as usize] == b'#')
    }

    fn points(coords: &[(u32, u32)]) -> Vec<Point> {
        coords.iter().map(|&(x, y)| Point::new(x, y)).collect()
    }

    #[test]
    fn empty_mask_has_no_regions() {
        assert!(extract_regions(&Mask::new(16, 9)).is_empty());
        assert!(extract_regions(&Mask::new(0, 0)).is_empty());
    }

    #[test]
    fn disjoint_blobs_yield_exact_rectangles() {
        let mask = mask_from(&[
            "##......",
            "##...###",
            "........",
            ".#......",
            ".#..####",
            ".#..####",
        ]);
        let regions = extract_regions(&mask);
        let bounds: Vec<BoundingRect> = regions.iter().map(|r| r.bounds).collect();
        assert_eq!(
            bounds,
            vec![
                BoundingRect::new(0, 0, 2, 2),
                BoundingRect::new(5, 1, 3, 1),
                BoundingRect::new(1, 3, 1, 3),
                BoundingRect::new(4, 4, 4, 2),
            ]
        );
        let sizes: Vec<usize> = regions.iter().map(|r| r.pixel_count).collect();
        assert_eq!(sizes, vec![4, 3, 3, 8]);
        let ids: Vec<usize> = regions.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![0, 1, 2, 3]);
    }

    #[test]
    fn diagonal_touch_joins_components() {
        let mask = mask_from(&["#.#", ".#.", "#.#"]);
        let regions = extract_regions(&mask);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].bounds, BoundingRect::new(0, 0, 3, 3));
        assert_eq!(regions[0].pixel_count, 5);
    }

    #[test]
    fn isolated_pixel_is_a_one_by_one_region() {
        let mask = mask_from(&[".....", "..#..", "....."]);
        let regions = extract_regions(&mask);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].bounds, BoundingRect::new(2, 1, 1, 1));
        assert_eq!(regions[0].boundary, points(&[(2, 1)]));
    }

    #[test]
    fn square_boundary_walks_the_rim_clockwise() {
        let mask = mask_from(&[".....", ".###.", ".###.", ".###.", "....."]);
        let regions = extract_regions(&mask);
        assert_eq!(
            regions[0].boundary,
            points(&[(1, 1), (2, 1), (3, 1), (3, 2), (3, 3), (2, 3), (1, 3), (1, 2)])
        );
    }

    #[test]
    fn thin_line_boundary_doubles_back() {
        let regions = extract_regions(&mask_from(&["###"]));
        assert_eq!(regions[0].boundary, points(&[(0, 0), (1, 0), (2, 0), (1, 0)]));
    }

    #[test]
    fn ring_traces_only_its_outer_border() {
        let mask = mask_from(&["####", "#..#", "####"]);
        let regions = extract_regions(&mask);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].bounds, BoundingRect::new(0, 0, 4, 3));
        assert_eq!(regions[0].boundary.len(), 10);
    }

    #[test]
    fn blobs_touching_the_frame_edge_are_traced() {
        let mask = mask_from(&["..#", "##."]);
        let regions = extract_regions(&mask);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].bounds, BoundingRect::new(0, 0, 3, 2));
        assert_eq!(regions[0].boundary, points(&[(2, 0), (1, 1), (0, 1), (1, 1)]));
    }

    #[test]
    fn extraction_is_repeatable() {
        let mask = Mask::from_fn(40, 30, |x, y| (x / 5 + y / 5) % 2 == 0 && x % 5 != 0);
        let first: Vec<BoundingRect> = extract_regions(&mask).iter().map(|r| r.bounds).collect();
        let second: Vec<BoundingRect> = extract_regions(&mask).iter().map(|r| r.bounds).collect();
        assert_eq!(first, second);
    }
}
