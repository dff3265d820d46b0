use super::rect::{Rect, Region};
use glam::{Affine2, Mat2, Vec2};
use image::{Rgba, RgbaImage};

/// Drawing access to one sprite's region of the atlas.
///
/// Coordinates are in content space: `(0, 0)..size()` covers the region before
/// any layout transform, with rotated regions turned back upright. Every write
/// is clipped to the region.
pub struct RegionCanvas<'a> {
    pixels: &'a mut RgbaImage,
    region: Region,
    clip: Rect,
    base: Affine2,
    transform: Affine2,
}

impl<'a> RegionCanvas<'a> {
    pub fn new(pixels: &'a mut RgbaImage, region: Region) -> Self {
        let bounds = Rect::from_size(pixels.width(), pixels.height());
        let clip = region.rect.intersection(&bounds);
        let rect = region.rect;
        let base = if region.rotated {
            // Content is stored turned 90 degrees clockwise.
            Affine2::from_mat2_translation(
                Mat2::from_cols(Vec2::Y, Vec2::NEG_X),
                Vec2::new((rect.x + rect.width) as f32, rect.y as f32),
            )
        } else {
            Affine2::from_translation(rect.origin().as_vec2())
        };

        Self {
            pixels,
            region,
            clip,
            base,
            transform: base,
        }
    }

    pub fn region(&self) -> Region {
        self.region
    }

    /// Size of the content frame in content-space units.
    pub fn size(&self) -> Vec2 {
        self.region.content_size().as_vec2()
    }

    /// Replaces the content-space transform applied on top of the region mapping.
    pub fn set_layout(&mut self, layout: Affine2) {
        self.transform = self.base * layout;
    }

    pub fn transform(&self) -> Affine2 {
        self.transform
    }

    /// Fills the whole region, ignoring the layout.
    pub fn fill(&mut self, color: Rgba<u8>) {
        for y in self.clip.y..self.clip.bottom() {
            for x in self.clip.x..self.clip.right() {
                blend(self.pixels.get_pixel_mut(x, y), color);
            }
        }
    }

    pub fn fill_rect(&mut self, min: Vec2, size: Vec2, color: Rgba<u8>) {
        let Some(bounds) = self.pixel_bounds(min, min + size) else {
            return;
        };
        for y in bounds.y..bounds.bottom() {
            for x in bounds.x..bounds.right() {
                blend(self.pixels.get_pixel_mut(x, y), color);
            }
        }
    }

    pub fn fill_ellipse(&mut self, center: Vec2, radii: Vec2, color: Rgba<u8>) {
        if radii.x <= 0.0 || radii.y <= 0.0 {
            return;
        }
        let Some(bounds) = self.pixel_bounds(center - radii, center + radii) else {
            return;
        };
        let inverse = self.transform.inverse();
        for y in bounds.y..bounds.bottom() {
            for x in bounds.x..bounds.right() {
                let local = inverse.transform_point2(pixel_center(x, y));
                let d = (local - center) / radii;
                if d.length_squared() <= 1.0 {
                    blend(self.pixels.get_pixel_mut(x, y), color);
                }
            }
        }
    }

    /// Draws `image` stretched over `dest_min..dest_min + dest_size` with
    /// nearest sampling.
    pub fn blit(&mut self, image: &RgbaImage, dest_min: Vec2, dest_size: Vec2) {
        if image.width() == 0 || image.height() == 0 || dest_size.cmple(Vec2::ZERO).any() {
            return;
        }
        let Some(bounds) = self.pixel_bounds(dest_min, dest_min + dest_size) else {
            return;
        };
        let inverse = self.transform.inverse();
        let source_size = Vec2::new(image.width() as f32, image.height() as f32);
        for y in bounds.y..bounds.bottom() {
            for x in bounds.x..bounds.right() {
                let local = inverse.transform_point2(pixel_center(x, y));
                let uv = ((local - dest_min) / dest_size).clamp(Vec2::ZERO, Vec2::ONE);
                let texel = (uv * source_size).floor().min(source_size - Vec2::ONE);
                let color = *image.get_pixel(texel.x as u32, texel.y as u32);
                blend(self.pixels.get_pixel_mut(x, y), color);
            }
        }
    }

    /// Atlas pixels covered by a content-space box, clipped to the region.
    fn pixel_bounds(&self, min: Vec2, max: Vec2) -> Option<Rect> {
        let a = self.transform.transform_point2(min);
        let b = self.transform.transform_point2(max);
        let lo = a.min(b).round();
        let hi = a.max(b).round();

        let x0 = lo.x.max(self.clip.x as f32);
        let y0 = lo.y.max(self.clip.y as f32);
        let x1 = hi.x.min(self.clip.right() as f32);
        let y1 = hi.y.min(self.clip.bottom() as f32);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(Rect::new(
            x0 as u32,
            y0 as u32,
            (x1 - x0) as u32,
            (y1 - y0) as u32,
        ))
    }
}

fn pixel_center(x: u32, y: u32) -> Vec2 {
    Vec2::new(x as f32 + 0.5, y as f32 + 0.5)
}

/// Source-over blend of straight-alpha colors.
pub fn blend(dst: &mut Rgba<u8>, src: Rgba<u8>) {
    let src_a = src[3] as u32;
    if src_a == 255 {
        *dst = src;
        return;
    }
    if src_a == 0 {
        return;
    }

    let dst_a = dst[3] as u32 * (255 - src_a) / 255;
    let out_a = src_a + dst_a;
    for c in 0..3 {
        let value = (src[c] as u32 * src_a + dst[c] as u32 * dst_a) / out_a;
        dst[c] = value.min(255) as u8;
    }
    dst[3] = out_a.min(255) as u8;
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
    const CLEAR: Rgba<u8> = Rgba([0, 0, 0, 0]);

    fn count_colored(image: &RgbaImage, color: Rgba<u8>) -> usize {
        image.pixels().filter(|p| **p == color).count()
    }

    #[test]
    fn fill_stays_inside_the_region() {
        let mut image = RgbaImage::from_pixel(16, 16, CLEAR);
        let region = Region::new(Rect::new(4, 4, 3, 2), false);
        RegionCanvas::new(&mut image, region).fill(RED);

        assert_eq!(count_colored(&image, RED), 6);
        assert_eq!(*image.get_pixel(4, 4), RED);
        assert_eq!(*image.get_pixel(6, 5), RED);
        assert_eq!(*image.get_pixel(7, 5), CLEAR);
        assert_eq!(*image.get_pixel(4, 6), CLEAR);
    }

    #[test]
    fn oversized_rect_is_clipped_to_region() {
        let mut image = RgbaImage::from_pixel(16, 16, CLEAR);
        let region = Region::new(Rect::new(2, 2, 4, 4), false);
        let mut canvas = RegionCanvas::new(&mut image, region);
        canvas.fill_rect(Vec2::splat(-100.0), Vec2::splat(500.0), RED);

        assert_eq!(count_colored(&image, RED), 16);
    }

    #[test]
    fn rect_is_offset_by_region_origin() {
        let mut image = RgbaImage::from_pixel(16, 16, CLEAR);
        let region = Region::new(Rect::new(8, 0, 8, 8), false);
        let mut canvas = RegionCanvas::new(&mut image, region);
        canvas.fill_rect(Vec2::ZERO, Vec2::new(2.0, 1.0), RED);

        assert_eq!(*image.get_pixel(8, 0), RED);
        assert_eq!(*image.get_pixel(9, 0), RED);
        assert_eq!(count_colored(&image, RED), 2);
    }

    #[test]
    fn rotated_region_turns_content_clockwise() {
        let mut image = RgbaImage::from_pixel(8, 8, CLEAR);
        // Content is 2 wide by 4 tall, stored as 4 wide by 2 tall.
        let region = Region::new(Rect::new(0, 0, 4, 2), true);
        let mut canvas = RegionCanvas::new(&mut image, region);
        assert_eq!(canvas.size(), Vec2::new(2.0, 4.0));
        // Top content row lands in the rightmost atlas column.
        canvas.fill_rect(Vec2::ZERO, Vec2::new(2.0, 1.0), RED);

        assert_eq!(*image.get_pixel(3, 0), RED);
        assert_eq!(*image.get_pixel(3, 1), RED);
        assert_eq!(count_colored(&image, RED), 2);
    }

    #[test]
    fn layout_scales_content() {
        let mut image = RgbaImage::from_pixel(8, 8, CLEAR);
        let region = Region::new(Rect::new(0, 0, 8, 8), false);
        let mut canvas = RegionCanvas::new(&mut image, region);
        canvas.set_layout(Affine2::from_scale(Vec2::splat(4.0)));
        canvas.fill_rect(Vec2::ZERO, Vec2::ONE, RED);

        assert_eq!(count_colored(&image, RED), 16);
    }

    #[test]
    fn ellipse_covers_center_not_corners() {
        let mut image = RgbaImage::from_pixel(10, 10, CLEAR);
        let region = Region::new(Rect::new(0, 0, 10, 10), false);
        let mut canvas = RegionCanvas::new(&mut image, region);
        canvas.fill_ellipse(Vec2::splat(5.0), Vec2::splat(5.0), RED);

        assert_eq!(*image.get_pixel(5, 5), RED);
        assert_eq!(*image.get_pixel(0, 0), CLEAR);
        assert_eq!(*image.get_pixel(9, 9), CLEAR);
    }

    #[test]
    fn blit_stretches_source() {
        let mut image = RgbaImage::from_pixel(4, 4, CLEAR);
        let source = RgbaImage::from_pixel(1, 1, RED);
        let region = Region::new(Rect::new(0, 0, 4, 4), false);
        let mut canvas = RegionCanvas::new(&mut image, region);
        canvas.blit(&source, Vec2::ZERO, Vec2::splat(4.0));

        assert_eq!(count_colored(&image, RED), 16);
    }

    #[test]
    fn blend_mixes_translucent_over_opaque() {
        let mut dst = Rgba([0, 0, 255, 255]);
        blend(&mut dst, Rgba([255, 0, 0, 128]));
        assert_eq!(dst[3], 255);
        assert!(dst[0] > 120 && dst[0] < 136);
        assert!(dst[2] > 120 && dst[2] < 136);
    }

    #[test]
    fn blend_ignores_transparent_source() {
        let mut dst = Rgba([1, 2, 3, 4]);
        blend(&mut dst, Rgba([255, 255, 255, 0]));
        assert_eq!(dst, Rgba([1, 2, 3, 4]));
    }
}
