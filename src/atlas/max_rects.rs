//! MaxRects bin packing.
//!
//! Keeps the list of maximal free rectangles of a bin. Every placement splits
//! the free rectangles it overlaps into up to four maximal remainders, after
//! which rectangles fully contained in another one are pruned. Rectangles are
//! placed in the order given; sorting for quality is the caller's job.

use super::packer::{BinPackingStrategy, Heuristic, PackError, PackerConfig, PackerStats, SizeMode};
use super::rect::{Rect, Region};
use glam::{IVec2, UVec2};

/// Number of evenly spaced bin widths tried between the lower bound and the
/// maximum width when searching for the smallest bin.
const CANDIDATE_WIDTH_STEPS: u32 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Score {
    primary: i64,
    secondary: i64,
}

/// One bin being filled.
#[derive(Debug, Clone)]
struct Bin {
    width: u32,
    height: u32,
    free: Vec<Rect>,
    used: Vec<Rect>,
}

impl Bin {
    fn new(width: u32, height: u32) -> Self {
        let mut free = Vec::new();
        if width > 0 && height > 0 {
            free.push(Rect::from_size(width, height));
        }
        Self {
            width,
            height,
            free,
            used: Vec::new(),
        }
    }

    fn insert(
        &mut self,
        width: u32,
        height: u32,
        heuristic: Heuristic,
        allow_rotation: bool,
    ) -> Option<(Rect, bool)> {
        let (rect, rotated) = self.find_position(width, height, heuristic, allow_rotation)?;
        self.place(rect);
        Some((rect, rotated))
    }

    fn find_position(
        &self,
        width: u32,
        height: u32,
        heuristic: Heuristic,
        allow_rotation: bool,
    ) -> Option<(Rect, bool)> {
        let turned = (allow_rotation && width != height).then_some((height, width, true));
        let mut best: Option<(Score, Rect, bool)> = None;

        for free in &self.free {
            for (w, h, rotated) in std::iter::once((width, height, false)).chain(turned) {
                if free.width < w || free.height < h {
                    continue;
                }
                let candidate = Rect::new(free.x, free.y, w, h);
                let score = self.score(free, &candidate, heuristic);
                if best.map_or(true, |(current, ..)| score < current) {
                    best = Some((score, candidate, rotated));
                }
            }
        }

        best.map(|(_, rect, rotated)| (rect, rotated))
    }

    fn score(&self, free: &Rect, candidate: &Rect, heuristic: Heuristic) -> Score {
        let leftover_h = (free.width - candidate.width) as i64;
        let leftover_v = (free.height - candidate.height) as i64;
        let short_side = leftover_h.min(leftover_v);
        let long_side = leftover_h.max(leftover_v);

        match heuristic {
            Heuristic::BestShortSideFit => Score {
                primary: short_side,
                secondary: long_side,
            },
            Heuristic::BestLongSideFit => Score {
                primary: long_side,
                secondary: short_side,
            },
            Heuristic::BestAreaFit => Score {
                primary: free.area() as i64 - candidate.area() as i64,
                secondary: short_side,
            },
            Heuristic::BottomLeft => Score {
                primary: candidate.bottom() as i64,
                secondary: candidate.x as i64,
            },
            Heuristic::ContactPoint => Score {
                primary: -self.contact_score(candidate),
                secondary: 0,
            },
        }
    }

    /// Length of the candidate's perimeter touching the bin edges or used rects.
    fn contact_score(&self, candidate: &Rect) -> i64 {
        let mut score = 0i64;
        if candidate.x == 0 || candidate.right() == self.width {
            score += candidate.height as i64;
        }
        if candidate.y == 0 || candidate.bottom() == self.height {
            score += candidate.width as i64;
        }
        for used in &self.used {
            if used.x == candidate.right() || used.right() == candidate.x {
                score += common_interval(used.y, used.bottom(), candidate.y, candidate.bottom());
            }
            if used.y == candidate.bottom() || used.bottom() == candidate.y {
                score += common_interval(used.x, used.right(), candidate.x, candidate.right());
            }
        }
        score
    }

    fn place(&mut self, used: Rect) {
        let mut remainders = Vec::new();
        self.free.retain(|free| !split_free_rect(free, &used, &mut remainders));
        self.free.extend(remainders);
        self.prune();
        self.used.push(used);
    }

    /// Drops free rectangles fully contained in another free rectangle.
    fn prune(&mut self) {
        let mut i = 0;
        while i < self.free.len() {
            let mut j = i + 1;
            let mut removed = false;
            while j < self.free.len() {
                if self.free[j].contains(&self.free[i]) {
                    self.free.swap_remove(i);
                    removed = true;
                    break;
                }
                if self.free[i].contains(&self.free[j]) {
                    self.free.swap_remove(j);
                } else {
                    j += 1;
                }
            }
            if !removed {
                i += 1;
            }
        }
    }
}

fn common_interval(a_start: u32, a_end: u32, b_start: u32, b_end: u32) -> i64 {
    if a_end < b_start || b_end < a_start {
        return 0;
    }
    (a_end.min(b_end) - a_start.max(b_start)) as i64
}

/// Splits `free` around `used`. Returns false (and pushes nothing) when they
/// do not overlap.
fn split_free_rect(free: &Rect, used: &Rect, out: &mut Vec<Rect>) -> bool {
    if !free.intersects(used) {
        return false;
    }

    if used.x > free.x {
        out.push(Rect::new(free.x, free.y, used.x - free.x, free.height));
    }
    if used.right() < free.right() {
        out.push(Rect::new(
            used.right(),
            free.y,
            free.right() - used.right(),
            free.height,
        ));
    }
    if used.y > free.y {
        out.push(Rect::new(free.x, free.y, free.width, used.y - free.y));
    }
    if used.bottom() < free.bottom() {
        out.push(Rect::new(
            free.x,
            used.bottom(),
            free.width,
            free.bottom() - used.bottom(),
        ));
    }
    true
}

fn extent(regions: &[Region]) -> UVec2 {
    regions
        .iter()
        .filter(|region| !region.rect.is_empty())
        .fold(UVec2::ZERO, |acc, region| {
            acc.max(UVec2::new(region.rect.right(), region.rect.bottom()))
        })
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    requested: UVec2,
    region: Region,
}

#[derive(Debug)]
struct Solution {
    regions: Vec<Region>,
    canvas: UVec2,
}

/// [`BinPackingStrategy`] built on MaxRects with a smallest-bin search.
#[derive(Debug, Clone)]
pub struct MaxRectsPacker {
    config: PackerConfig,
    slots: Vec<Slot>,
    cursor: usize,
    canvas: UVec2,
    used_pixels: u64,
    prepared: bool,
}

impl MaxRectsPacker {
    pub fn new(config: PackerConfig) -> Self {
        Self {
            config,
            slots: Vec::new(),
            cursor: 0,
            canvas: UVec2::ZERO,
            used_pixels: 0,
            prepared: false,
        }
    }

    pub fn config(&self) -> &PackerConfig {
        &self.config
    }

    fn does_not_fit(&self, count: usize) -> PackError {
        PackError::DoesNotFit {
            count,
            max_width: self.config.max_width,
            max_height: self.config.max_height,
        }
    }

    fn fits_bound(&self, size: UVec2) -> bool {
        let max = self.config.max_size();
        let turned = UVec2::new(size.y, size.x);
        size.cmple(max).all() || (self.config.allow_rotation && turned.cmple(max).all())
    }

    /// Packs every size into a bin of `bin` pixels, padding between rectangles
    /// but not along the bin edges.
    fn pack_into(&self, sizes: &[UVec2], bin: UVec2) -> Option<Vec<Region>> {
        let pad = self.config.padding;
        let mut target = Bin::new(bin.x + pad, bin.y + pad);
        let mut regions = Vec::with_capacity(sizes.len());

        for &size in sizes {
            if size.x == 0 || size.y == 0 {
                regions.push(Region::new(Rect::from_size(size.x, size.y), false));
                continue;
            }
            let (placed, rotated) = target.insert(
                size.x + pad,
                size.y + pad,
                self.config.heuristic,
                self.config.allow_rotation,
            )?;
            let (width, height) = if rotated {
                (size.y, size.x)
            } else {
                (size.x, size.y)
            };
            regions.push(Region::new(
                Rect::new(placed.x, placed.y, width, height),
                rotated,
            ));
        }

        Some(regions)
    }

    fn candidate_widths(&self, sizes: &[UVec2]) -> Vec<u32> {
        let pad = self.config.padding as u64;
        let max_width = self.config.max_width;

        let narrowest = sizes
            .iter()
            .filter(|size| size.x > 0 && size.y > 0)
            .map(|size| {
                if self.config.allow_rotation {
                    size.x.min(size.y)
                } else {
                    size.x
                }
            })
            .max()
            .unwrap_or(0);
        let padded_area: u64 = sizes
            .iter()
            .filter(|size| size.x > 0 && size.y > 0)
            .map(|size| (size.x as u64 + pad) * (size.y as u64 + pad))
            .sum();
        let by_height = padded_area.div_ceil(self.config.max_height as u64 + pad) as u32;
        let lower = narrowest.max(by_height).min(max_width);
        let square = ((padded_area as f64).sqrt().ceil() as u32).clamp(lower, max_width);

        let mut widths: Vec<u32> = (0..=CANDIDATE_WIDTH_STEPS)
            .map(|step| {
                lower + ((max_width - lower) as u64 * step as u64 / CANDIDATE_WIDTH_STEPS as u64) as u32
            })
            .collect();
        for factor in [1.0f64, 1.25, 1.5] {
            widths.push(((square as f64 * factor).ceil() as u32).clamp(lower, max_width));
        }
        widths.sort_unstable();
        widths.dedup();
        widths
    }

    fn solve(&self, sizes: &[UVec2]) -> Result<Solution, PackError> {
        let max = self.config.max_size();
        let count = sizes.iter().filter(|s| s.x > 0 && s.y > 0).count();

        if sizes.iter().any(|&size| !self.fits_bound(size)) {
            return Err(self.does_not_fit(sizes.len()));
        }

        if self.config.size_mode == SizeMode::Max {
            let regions = self
                .pack_into(sizes, max)
                .ok_or_else(|| self.does_not_fit(sizes.len()))?;
            return Ok(Solution {
                regions,
                canvas: max,
            });
        }

        if count == 0 {
            let regions = sizes
                .iter()
                .map(|size| Region::new(Rect::from_size(size.x, size.y), false))
                .collect();
            return Ok(Solution {
                regions,
                canvas: UVec2::ZERO,
            });
        }

        let mut best: Option<((u64, u32), UVec2, Vec<Region>)> = None;
        for width in self.candidate_widths(sizes) {
            let Some(regions) = self.pack_into(sizes, UVec2::new(width, max.y)) else {
                continue;
            };
            let used = extent(&regions);
            let key = (used.x as u64 * used.y as u64, used.max_element());
            if best.as_ref().map_or(true, |(current, ..)| key < *current) {
                best = Some((key, used, regions));
            }
        }

        let (_, used, regions) = best.ok_or_else(|| self.does_not_fit(sizes.len()))?;
        let canvas = match self.config.size_mode {
            SizeMode::PowerOfTwo => UVec2::new(
                used.x.next_power_of_two().min(max.x),
                used.y.next_power_of_two().min(max.y),
            ),
            SizeMode::Square => {
                let side = used.max_element();
                UVec2::new(side.min(max.x), side.min(max.y))
            }
            SizeMode::Smart | SizeMode::Max => used,
        };

        Ok(Solution { regions, canvas })
    }
}

impl Default for MaxRectsPacker {
    fn default() -> Self {
        Self::new(PackerConfig::default())
    }
}

impl BinPackingStrategy for MaxRectsPacker {
    fn reset(&mut self) {
        self.slots.clear();
        self.cursor = 0;
        self.canvas = UVec2::ZERO;
        self.used_pixels = 0;
        self.prepared = false;
    }

    fn prepare_for_batch(&mut self, sizes: &[IVec2]) -> Result<(), PackError> {
        if self.prepared {
            return Err(PackError::NotReset);
        }

        let mut requested = Vec::with_capacity(sizes.len());
        for size in sizes {
            if size.x < 0 || size.y < 0 {
                return Err(PackError::NegativeSize {
                    width: size.x,
                    height: size.y,
                });
            }
            requested.push(size.as_uvec2());
        }

        let solution = self.solve(&requested)?;
        self.slots = requested
            .into_iter()
            .zip(solution.regions)
            .map(|(requested, region)| Slot { requested, region })
            .collect();
        self.canvas = solution.canvas;
        self.prepared = true;

        log::debug!(
            "Packed {} rectangles into {}x{}",
            self.slots.len(),
            self.canvas.x,
            self.canvas.y
        );
        Ok(())
    }

    fn allocate(&mut self, width: i32, height: i32) -> Result<Region, PackError> {
        if width < 0 || height < 0 {
            return Err(PackError::NegativeSize { width, height });
        }

        let index = self.cursor;
        let slot = *self.slots.get(index).ok_or(PackError::Exhausted {
            prepared: self.slots.len(),
        })?;

        let size = UVec2::new(width as u32, height as u32);
        let turned = UVec2::new(size.y, size.x);
        let matches =
            size == slot.requested || (self.config.allow_rotation && turned == slot.requested);
        if !matches {
            return Err(PackError::SlotMismatch {
                index,
                expected_width: slot.requested.x,
                expected_height: slot.requested.y,
                width: size.x,
                height: size.y,
            });
        }

        self.cursor += 1;
        self.used_pixels += slot.region.rect.area();
        Ok(slot.region)
    }

    fn canvas_dimensions(&self) -> UVec2 {
        self.canvas
    }

    fn stats(&self) -> PackerStats {
        PackerStats::new(self.cursor, self.used_pixels, self.canvas)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(max: u32, padding: u32) -> PackerConfig {
        PackerConfig {
            max_width: max,
            max_height: max,
            padding,
            ..PackerConfig::default()
        }
    }

    fn pack(packer: &mut MaxRectsPacker, sizes: &[IVec2]) -> Vec<Region> {
        packer.reset();
        packer.prepare_for_batch(sizes).unwrap();
        sizes
            .iter()
            .map(|size| packer.allocate(size.x, size.y).unwrap())
            .collect()
    }

    fn assert_disjoint(regions: &[Region]) {
        for (i, a) in regions.iter().enumerate() {
            for b in &regions[i + 1..] {
                assert!(!a.rect.intersects(&b.rect), "{a:?} overlaps {b:?}");
            }
        }
    }

    #[test]
    fn single_rect_lands_at_origin_with_tight_canvas() {
        let mut packer = MaxRectsPacker::new(config(256, 0));
        let regions = pack(&mut packer, &[IVec2::new(40, 20)]);
        assert_eq!(regions[0].rect, Rect::new(0, 0, 40, 20));
        assert_eq!(packer.canvas_dimensions(), UVec2::new(40, 20));
    }

    #[test]
    fn four_equal_squares_pack_into_a_square() {
        let mut packer = MaxRectsPacker::new(config(256, 0));
        let sizes = [IVec2::splat(32); 4];
        let regions = pack(&mut packer, &sizes);
        assert_disjoint(&regions);
        assert_eq!(packer.canvas_dimensions(), UVec2::splat(64));
        assert!((packer.stats().efficiency - 1.0).abs() < 1e-6);
    }

    #[test]
    fn every_heuristic_produces_disjoint_regions() {
        let sizes: Vec<IVec2> = [(60, 20), (20, 60), (35, 35), (10, 80), (80, 10), (25, 40)]
            .iter()
            .map(|&(w, h)| IVec2::new(w, h))
            .collect();
        for heuristic in [
            Heuristic::BestShortSideFit,
            Heuristic::BestLongSideFit,
            Heuristic::BestAreaFit,
            Heuristic::BottomLeft,
            Heuristic::ContactPoint,
        ] {
            let mut packer = MaxRectsPacker::new(PackerConfig {
                heuristic,
                ..config(256, 0)
            });
            let regions = pack(&mut packer, &sizes);
            assert_disjoint(&regions);
            let canvas = packer.canvas_dimensions();
            for region in &regions {
                assert!(region.rect.right() <= canvas.x && region.rect.bottom() <= canvas.y);
            }
        }
    }

    #[test]
    fn padding_separates_neighbours() {
        let mut packer = MaxRectsPacker::new(config(128, 3));
        let sizes = [IVec2::splat(20); 5];
        let regions = pack(&mut packer, &sizes);
        let padded: Vec<Region> = regions
            .iter()
            .map(|r| Region::new(Rect::new(r.rect.x, r.rect.y, r.rect.width + 3, r.rect.height + 3), false))
            .collect();
        assert_disjoint(&padded);
        let canvas = packer.canvas_dimensions();
        for region in &regions {
            assert!(region.rect.right() <= canvas.x && region.rect.bottom() <= canvas.y);
        }
    }

    #[test]
    fn oversized_rect_does_not_fit() {
        let mut packer = MaxRectsPacker::new(config(64, 0));
        let err = packer.prepare_for_batch(&[IVec2::new(65, 10)]).unwrap_err();
        assert_eq!(
            err,
            PackError::DoesNotFit {
                count: 1,
                max_width: 64,
                max_height: 64
            }
        );
    }

    #[test]
    fn too_many_rects_do_not_fit() {
        let mut packer = MaxRectsPacker::new(config(200, 0));
        let err = packer
            .prepare_for_batch(&[IVec2::splat(100); 5])
            .unwrap_err();
        assert!(matches!(err, PackError::DoesNotFit { count: 5, .. }));
    }

    #[test]
    fn rotation_lets_tall_rect_fit_a_wide_bound() {
        let mut packer = MaxRectsPacker::new(PackerConfig {
            max_width: 100,
            max_height: 20,
            padding: 0,
            allow_rotation: true,
            ..PackerConfig::default()
        });
        packer.prepare_for_batch(&[IVec2::new(10, 90)]).unwrap();
        let region = packer.allocate(10, 90).unwrap();
        assert!(region.rotated);
        assert_eq!(region.rect.size(), UVec2::new(90, 10));
    }

    #[test]
    fn rotation_accepts_swapped_allocate_dimensions() {
        let mut packer = MaxRectsPacker::new(PackerConfig {
            allow_rotation: true,
            ..config(128, 0)
        });
        packer.prepare_for_batch(&[IVec2::new(10, 30)]).unwrap();
        assert!(packer.allocate(30, 10).is_ok());
    }

    #[test]
    fn allocate_rejects_negative_sizes() {
        let mut packer = MaxRectsPacker::new(config(128, 0));
        packer.prepare_for_batch(&[IVec2::new(10, 10)]).unwrap();
        assert_eq!(
            packer.allocate(-1, 10).unwrap_err(),
            PackError::NegativeSize {
                width: -1,
                height: 10
            }
        );
    }

    #[test]
    fn prepare_rejects_negative_sizes() {
        let mut packer = MaxRectsPacker::new(config(128, 0));
        assert!(matches!(
            packer.prepare_for_batch(&[IVec2::new(4, -4)]),
            Err(PackError::NegativeSize { .. })
        ));
    }

    #[test]
    fn allocate_past_the_batch_is_exhausted() {
        let mut packer = MaxRectsPacker::new(config(128, 0));
        packer.prepare_for_batch(&[IVec2::new(10, 10)]).unwrap();
        packer.allocate(10, 10).unwrap();
        assert_eq!(
            packer.allocate(10, 10).unwrap_err(),
            PackError::Exhausted { prepared: 1 }
        );
    }

    #[test]
    fn allocate_with_wrong_dimensions_is_a_slot_mismatch() {
        let mut packer = MaxRectsPacker::new(config(128, 0));
        packer
            .prepare_for_batch(&[IVec2::new(30, 10), IVec2::new(10, 10)])
            .unwrap();
        let err = packer.allocate(10, 10).unwrap_err();
        assert!(matches!(err, PackError::SlotMismatch { index: 0, .. }));
        // Without rotation a swapped size is also a mismatch.
        assert!(packer.allocate(10, 30).is_err());
    }

    #[test]
    fn prepare_twice_without_reset_is_rejected() {
        let mut packer = MaxRectsPacker::new(config(128, 0));
        packer.prepare_for_batch(&[IVec2::new(10, 10)]).unwrap();
        assert_eq!(
            packer.prepare_for_batch(&[IVec2::new(10, 10)]).unwrap_err(),
            PackError::NotReset
        );
        packer.reset();
        assert!(packer.prepare_for_batch(&[IVec2::new(10, 10)]).is_ok());
    }

    #[test]
    fn empty_batch_has_empty_canvas() {
        let mut packer = MaxRectsPacker::new(config(128, 0));
        packer.prepare_for_batch(&[]).unwrap();
        assert_eq!(packer.canvas_dimensions(), UVec2::ZERO);
        assert!(matches!(packer.allocate(0, 0), Err(PackError::Exhausted { .. })));
    }

    #[test]
    fn zero_area_rects_get_empty_regions() {
        let mut packer = MaxRectsPacker::new(config(128, 0));
        let regions = pack(&mut packer, &[IVec2::new(0, 40), IVec2::new(16, 16)]);
        assert!(regions[0].rect.is_empty());
        assert_eq!(packer.canvas_dimensions(), UVec2::splat(16));
    }

    #[test]
    fn power_of_two_mode_rounds_canvas_up() {
        let mut packer = MaxRectsPacker::new(PackerConfig {
            size_mode: SizeMode::PowerOfTwo,
            ..config(1024, 0)
        });
        pack(&mut packer, &[IVec2::new(100, 60)]);
        assert_eq!(packer.canvas_dimensions(), UVec2::new(128, 64));
    }

    #[test]
    fn square_mode_uses_longest_side() {
        let mut packer = MaxRectsPacker::new(PackerConfig {
            size_mode: SizeMode::Square,
            ..config(1024, 0)
        });
        pack(&mut packer, &[IVec2::new(100, 60)]);
        assert_eq!(packer.canvas_dimensions(), UVec2::splat(100));
    }

    #[test]
    fn max_mode_always_reports_the_bound() {
        let mut packer = MaxRectsPacker::new(PackerConfig {
            size_mode: SizeMode::Max,
            ..config(512, 0)
        });
        pack(&mut packer, &[IVec2::new(10, 10)]);
        assert_eq!(packer.canvas_dimensions(), UVec2::splat(512));
    }

    #[test]
    fn stats_track_allocated_regions() {
        let mut packer = MaxRectsPacker::new(config(256, 0));
        packer
            .prepare_for_batch(&[IVec2::new(20, 10), IVec2::new(10, 10)])
            .unwrap();
        packer.allocate(20, 10).unwrap();
        let stats = packer.stats();
        assert_eq!(stats.allocated, 1);
        assert_eq!(stats.used_pixels, 200);
    }

    #[test]
    fn split_produces_maximal_remainders() {
        let mut out = Vec::new();
        let free = Rect::new(0, 0, 100, 100);
        assert!(split_free_rect(&free, &Rect::new(10, 20, 30, 40), &mut out));
        assert!(out.contains(&Rect::new(0, 0, 10, 100)));
        assert!(out.contains(&Rect::new(40, 0, 60, 100)));
        assert!(out.contains(&Rect::new(0, 0, 100, 20)));
        assert!(out.contains(&Rect::new(0, 60, 100, 40)));
        out.clear();
        assert!(!split_free_rect(&free, &Rect::new(100, 0, 5, 5), &mut out));
        assert!(out.is_empty());
    }
}
