//! CPU surfaces backed by `image` buffers

use crate::blend::blend_pixel;
use crate::codec::{decode_png, encode_png};
use image::RgbaImage;
use kurbo::{Affine, Point, Rect};
use lru::LruCache;
use std::cell::RefCell;
use std::num::NonZeroUsize;
use std::rc::Rc;
use wanim_core::{BlendMode, Color, ImageHandle, ImageId, RasterBackend, Surface};

/// Default number of decoded images kept in memory
pub const DEFAULT_CACHE_CAPACITY: usize = 64;

type DecodeCache = Rc<RefCell<LruCache<ImageId, Rc<RgbaImage>>>>;

/// Creates [`CpuSurface`]s sharing one decoded-image cache
#[derive(Debug, Clone)]
pub struct CpuBackend {
    cache: DecodeCache,
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl CpuBackend {
    /// Creates a backend caching up to `capacity` decoded images (at least one)
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: Rc::new(RefCell::new(LruCache::new(capacity))),
        }
    }

    /// Number of decoded images currently cached
    pub fn cached_images(&self) -> usize {
        self.cache.borrow().len()
    }
}

impl RasterBackend for CpuBackend {
    type Surface = CpuSurface;

    fn create_surface(&self, width: u32, height: u32) -> CpuSurface {
        CpuSurface {
            buffer: RgbaImage::new(width, height),
            transform: Affine::IDENTITY,
            mode: BlendMode::SourceOver,
            alpha: 1.0,
            cache: Rc::clone(&self.cache),
        }
    }
}

/// An RGBA8 buffer drawn into with nearest-neighbour sampling
#[derive(Debug)]
pub struct CpuSurface {
    buffer: RgbaImage,
    transform: Affine,
    mode: BlendMode,
    alpha: f64,
    cache: DecodeCache,
}

impl CpuSurface {
    pub fn buffer(&self) -> &RgbaImage {
        &self.buffer
    }

    pub fn into_buffer(self) -> RgbaImage {
        self.buffer
    }

    fn decode(&self, image: &ImageHandle) -> wanim_core::Result<Rc<RgbaImage>> {
        if let Some(decoded) = self.cache.borrow_mut().get(&image.id()) {
            return Ok(Rc::clone(decoded));
        }
        let decoded = decode_png(image.src())
            .map(Rc::new)
            .map_err(|e| wanim_core::Error::ImageDecode(e.to_string()))?;
        tracing::debug!(
            image = image.id().get(),
            width = decoded.width(),
            height = decoded.height(),
            "decoded image"
        );
        self.cache.borrow_mut().put(image.id(), Rc::clone(&decoded));
        Ok(decoded)
    }
}

impl Surface for CpuSurface {
    fn width(&self) -> u32 {
        self.buffer.width()
    }

    fn height(&self) -> u32 {
        self.buffer.height()
    }

    fn clear(&mut self) {
        self.buffer.fill(0);
    }

    fn fill(&mut self, color: Color) {
        let src = color.to_array();
        for pixel in self.buffer.chunks_exact_mut(4) {
            blend_pixel(self.mode, pixel, src, self.alpha);
        }
    }

    fn set_transform(&mut self, transform: Affine) {
        self.transform = transform;
    }

    fn set_blend_mode(&mut self, mode: BlendMode) {
        self.mode = mode;
    }

    fn set_alpha(&mut self, alpha: f64) {
        self.alpha = if alpha.is_nan() { 1.0 } else { alpha.clamp(0.0, 1.0) };
    }

    fn draw_image(&mut self, image: &ImageHandle) -> wanim_core::Result<()> {
        if image.is_blank() {
            return Ok(());
        }
        let source = self.decode(image)?;

        // A degenerate transform collapses the image to nothing
        if self.transform.determinant().abs() < f64::EPSILON {
            return Ok(());
        }
        let inverse = self.transform.inverse();

        let bounds = self
            .transform
            .transform_rect_bbox(Rect::new(0.0, 0.0, source.width() as f64, source.height() as f64))
            .intersect(Rect::new(0.0, 0.0, self.width() as f64, self.height() as f64));
        if bounds.is_zero_area() {
            return Ok(());
        }

        let (x0, y0) = (bounds.x0.floor() as u32, bounds.y0.floor() as u32);
        let (x1, y1) = (
            (bounds.x1.ceil() as u32).min(self.width()),
            (bounds.y1.ceil() as u32).min(self.height()),
        );

        for y in y0..y1 {
            for x in x0..x1 {
                let at = inverse * Point::new(x as f64 + 0.5, y as f64 + 0.5);
                if at.x < 0.0 || at.y < 0.0 {
                    continue;
                }
                let (sx, sy) = (at.x.floor() as u32, at.y.floor() as u32);
                if sx >= source.width() || sy >= source.height() {
                    continue;
                }
                let src = source.get_pixel(sx, sy).0;
                blend_pixel(self.mode, &mut self.buffer.get_pixel_mut(x, y).0, src, self.alpha);
            }
        }
        Ok(())
    }

    fn alias(&mut self, threshold: u8) {
        for pixel in self.buffer.pixels_mut() {
            pixel.0[3] = if pixel.0[3] > threshold { 255 } else { 0 };
        }
    }

    fn pixels(&self) -> &[u8] {
        self.buffer.as_raw()
    }

    fn to_image(&self) -> wanim_core::Result<ImageHandle> {
        let data =
            encode_png(&self.buffer).map_err(|e| wanim_core::Error::Raster(e.to_string()))?;
        Ok(ImageHandle::from_encoded(data))
    }
}
