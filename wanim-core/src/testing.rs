//! In-crate raster backend for tests.
//!
//! Image bytes are raw RGBA8 rows as wide as the surface. Only the translation part of
//! the transform is honored and every blend mode except `destination-out` draws
//! source-over.

use crate::raster::{BlendMode, Color, ImageHandle, RasterBackend, Surface};
use crate::{Error, Result};
use kurbo::Affine;

/// Raw-pixel image filled with `color`
pub(crate) fn solid(width: u32, height: u32, color: Color) -> ImageHandle {
    ImageHandle::from_encoded(color.to_array().repeat((width * height) as usize))
}

/// Raw-pixel image with `color` at `(x, y)` and transparency elsewhere
pub(crate) fn dot(width: u32, height: u32, x: u32, y: u32, color: Color) -> ImageHandle {
    let mut pixels = vec![0u8; (width * height * 4) as usize];
    let offset = ((y * width + x) * 4) as usize;
    pixels[offset..offset + 4].copy_from_slice(&color.to_array());
    ImageHandle::from_encoded(pixels)
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct TestBackend;

impl RasterBackend for TestBackend {
    type Surface = TestSurface;

    fn create_surface(&self, width: u32, height: u32) -> TestSurface {
        TestSurface {
            width,
            height,
            pixels: vec![0; (width * height * 4) as usize],
            transform: Affine::IDENTITY,
            mode: BlendMode::SourceOver,
            alpha: 1.0,
        }
    }
}

#[derive(Debug)]
pub(crate) struct TestSurface {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    transform: Affine,
    mode: BlendMode,
    alpha: f64,
}

impl TestSurface {
    fn blend(&mut self, index: usize, src: [u8; 4]) {
        let dst = &mut self.pixels[index..index + 4];
        let sa = src[3] as f64 / 255.0 * self.alpha;
        let da = dst[3] as f64 / 255.0;

        if self.mode == BlendMode::DestinationOut {
            dst[3] = (da * (1.0 - sa) * 255.0).round() as u8;
            return;
        }

        let out_a = sa + da * (1.0 - sa);
        if out_a <= 0.0 {
            dst.copy_from_slice(&[0; 4]);
            return;
        }
        for c in 0..3 {
            let value = (src[c] as f64 * sa + dst[c] as f64 * da * (1.0 - sa)) / out_a;
            dst[c] = value.round() as u8;
        }
        dst[3] = (out_a * 255.0).round() as u8;
    }
}

impl Surface for TestSurface {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn clear(&mut self) {
        self.pixels.fill(0);
    }

    fn fill(&mut self, color: Color) {
        for index in (0..self.pixels.len()).step_by(4) {
            self.blend(index, color.to_array());
        }
    }

    fn set_transform(&mut self, transform: Affine) {
        self.transform = transform;
    }

    fn set_blend_mode(&mut self, mode: BlendMode) {
        self.mode = mode;
    }

    fn set_alpha(&mut self, alpha: f64) {
        self.alpha = alpha.clamp(0.0, 1.0);
    }

    fn draw_image(&mut self, image: &ImageHandle) -> Result<()> {
        if image.is_blank() {
            return Ok(());
        }
        let src = image.src().to_vec();
        let row = self.width as usize * 4;
        if row == 0 || src.len() % row != 0 {
            return Err(Error::ImageDecode(format!(
                "expected rows of {} bytes, got {} bytes",
                row,
                src.len()
            )));
        }

        let shift = self.transform.translation();
        let (dx, dy) = (shift.x.round() as i64, shift.y.round() as i64);
        let (w, h) = (self.width as i64, self.height as i64);
        let src_h = (src.len() / row) as i64;

        for y in 0..h {
            for x in 0..w {
                let (sx, sy) = (x - dx, y - dy);
                if sx < 0 || sy < 0 || sx >= w || sy >= src_h {
                    continue;
                }
                let from = ((sy * w + sx) * 4) as usize;
                let pixel = [src[from], src[from + 1], src[from + 2], src[from + 3]];
                self.blend(((y * w + x) * 4) as usize, pixel);
            }
        }
        Ok(())
    }

    fn alias(&mut self, threshold: u8) {
        for alpha in self.pixels.iter_mut().skip(3).step_by(4) {
            *alpha = if *alpha > threshold { 255 } else { 0 };
        }
    }

    fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    fn to_image(&self) -> Result<ImageHandle> {
        Ok(ImageHandle::from_encoded(self.pixels.clone()))
    }
}
