//! Connected-component extraction over a per-pixel difference mask.

use std::collections::VecDeque;

use crate::types::{DifferenceRegion, PixelRect};

/// Row-major boolean mask of differing pixels.
#[derive(Debug, Clone)]
pub struct DiffMask {
    width: u32,
    height: u32,
    bits: Vec<bool>,
}

impl DiffMask {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            bits: vec![false; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    pub fn set(&mut self, x: u32, y: u32) {
        let i = self.index(x, y);
        self.bits[i] = true;
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> bool {
        self.bits[self.index(x, y)]
    }

    pub fn count(&self) -> u64 {
        self.bits.iter().filter(|b| **b).count() as u64
    }

    pub fn count_in(&self, rect: &PixelRect) -> u64 {
        let mut n = 0u64;
        for y in rect.y..rect.bottom().min(self.height) {
            for x in rect.x..rect.right().min(self.width) {
                if self.get(x, y) {
                    n += 1;
                }
            }
        }
        n
    }
}

#[derive(Debug, Clone, Copy)]
struct Component {
    rect: PixelRect,
    pixels: u64,
}

/// Breadth-first 4-connected flood fill from every unvisited differing pixel.
fn connected_components(mask: &DiffMask) -> Vec<Component> {
    let (w, h) = (mask.width, mask.height);
    let mut visited = vec![false; mask.bits.len()];
    let mut queue = VecDeque::new();
    let mut components = Vec::new();

    for sy in 0..h {
        for sx in 0..w {
            let start = mask.index(sx, sy);
            if !mask.bits[start] || visited[start] {
                continue;
            }

            visited[start] = true;
            queue.push_back((sx, sy));
            let (mut min_x, mut min_y, mut max_x, mut max_y) = (sx, sy, sx, sy);
            let mut pixels = 0u64;

            while let Some((x, y)) = queue.pop_front() {
                pixels += 1;
                min_x = min_x.min(x);
                min_y = min_y.min(y);
                max_x = max_x.max(x);
                max_y = max_y.max(y);

                let neighbors = [
                    (x.checked_sub(1), Some(y)),
                    ((x + 1 < w).then_some(x + 1), Some(y)),
                    (Some(x), y.checked_sub(1)),
                    (Some(x), (y + 1 < h).then_some(y + 1)),
                ];
                for (nx, ny) in neighbors {
                    let (Some(nx), Some(ny)) = (nx, ny) else {
                        continue;
                    };
                    let ni = mask.index(nx, ny);
                    if mask.bits[ni] && !visited[ni] {
                        visited[ni] = true;
                        queue.push_back((nx, ny));
                    }
                }
            }

            components.push(Component {
                rect: PixelRect {
                    x: min_x,
                    y: min_y,
                    width: max_x - min_x + 1,
                    height: max_y - min_y + 1,
                },
                pixels,
            });
        }
    }

    components
}

/// Merges components whose bounding boxes overlap until no two boxes
/// overlap. A merged box can reach new neighbors, hence the outer loop.
fn merge_overlapping(mut rects: Vec<PixelRect>) -> Vec<PixelRect> {
    loop {
        let n = rects.len();
        let mut parent: Vec<usize> = (0..n).collect();

        fn find(parent: &mut [usize], i: usize) -> usize {
            if parent[i] != i {
                parent[i] = find(parent, parent[i]);
            }
            parent[i]
        }

        let mut merged_any = false;
        for i in 0..n {
            for j in (i + 1)..n {
                if rects[i].intersects(&rects[j]) {
                    let (pi, pj) = (find(&mut parent, i), find(&mut parent, j));
                    if pi != pj {
                        parent[pj] = pi;
                        merged_any = true;
                    }
                }
            }
        }
        if !merged_any {
            return rects;
        }

        let mut groups: Vec<Option<PixelRect>> = vec![None; n];
        for i in 0..n {
            let root = find(&mut parent, i);
            groups[root] = Some(match groups[root] {
                Some(r) => r.union(&rects[i]),
                None => rects[i],
            });
        }
        rects = groups.into_iter().flatten().collect();
    }
}

/// Extracts non-overlapping difference regions, dropping components smaller
/// than `min_region_pixels`. Regions are ordered top-to-bottom, left-to-right.
pub fn extract_regions(mask: &DiffMask, min_region_pixels: u64) -> Vec<DifferenceRegion> {
    let rects: Vec<PixelRect> = connected_components(mask)
        .into_iter()
        .filter(|c| c.pixels >= min_region_pixels.max(1))
        .map(|c| c.rect)
        .collect();

    let mut regions: Vec<DifferenceRegion> = merge_overlapping(rects)
        .into_iter()
        .map(|rect| {
            let pixel_count = mask.count_in(&rect);
            DifferenceRegion {
                x: rect.x,
                y: rect.y,
                width: rect.width,
                height: rect.height,
                difference_score: (pixel_count as f64 / rect.area().max(1) as f64).clamp(0.0, 1.0),
                pixel_count,
            }
        })
        .collect();
    regions.sort_by_key(|r| (r.y, r.x));
    regions
}
