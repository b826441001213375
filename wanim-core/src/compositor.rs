//! Flattens a document's layers into rendered frames

use crate::document::Document;
use crate::frame::{Frame, FrameList};
use crate::layer::Layer;
use crate::raster::{Color, ImageHandle, RasterBackend, Surface};
use crate::settings::Settings;
use crate::time::{sanitize_duration, Ms};
use crate::transition::{BakeRaster, Property};
use crate::{Error, Result};
use kurbo::Affine;

/// One run of identical rendered output
#[derive(Debug, Clone, PartialEq)]
pub struct ExportFrame {
    pub image: ImageHandle,
    pub duration: Ms,
}

/// Renders documents through a raster backend
#[derive(Debug, Clone)]
pub struct Compositor<B> {
    backend: B,
    alias_threshold: Option<u8>,
}

impl<B: RasterBackend> Compositor<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            alias_threshold: None,
        }
    }

    /// Snaps alpha to 0 or 255 around `threshold` after every layer is drawn
    pub fn with_aliasing(mut self, threshold: Option<u8>) -> Self {
        self.alias_threshold = threshold;
        self
    }

    pub fn from_settings(backend: B, settings: &Settings) -> Self {
        Self::new(backend).with_aliasing(settings.alias())
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn alias_threshold(&self) -> Option<u8> {
        self.alias_threshold
    }

    /// Paints `layer` at `t` onto `surface` with its evaluated transform, blending and alpha
    fn paint_layer(&self, surface: &mut B::Surface, doc: &Document, layer: &Layer, t: Ms) -> Result<()> {
        surface.set_transform(layer.transform_at(t));
        surface.set_blend_mode(layer.style().blending);
        surface.set_alpha(layer.evaluate(Property::Alpha, t) / 255.0);
        surface.draw_image(&layer.image_at(t, doc))?;
        if let Some(threshold) = self.alias_threshold {
            surface.alias(threshold);
        }
        Ok(())
    }

    /// Renders every visible layer at `t` over a `background` fill, in layer order
    pub fn render_frame(&self, doc: &Document, t: Ms, background: Color) -> Result<B::Surface> {
        let mut surface = self.backend.create_surface(doc.width(), doc.height());
        surface.clear();
        surface.fill(background);

        for layer in doc.layers().iter().filter(|layer| !layer.hidden) {
            self.paint_layer(&mut surface, doc, layer, t)?;
        }
        Ok(surface)
    }

    /// Renders `[0, true_end)` every `epsilon` ms, calling `sink` once per run of
    /// identical output. Durations are multiples of `epsilon`.
    pub fn collect_frames_with(
        &self,
        doc: &Document,
        epsilon: Ms,
        background: Color,
        mut sink: impl FnMut(ExportFrame) -> Result<()>,
    ) -> Result<()> {
        let end = doc.true_end();
        if !end.is_finite() {
            return Err(Error::UnboundedTimeline);
        }
        let epsilon = sanitize_duration(epsilon, 1.0, 16.0);

        let mut run: Option<(B::Surface, Ms)> = None;
        let mut t = 0.0;
        while t < end {
            let surface = self.render_frame(doc, t, background)?;
            t += epsilon;

            if let Some((previous, duration)) = &mut run {
                if previous.pixels() == surface.pixels() {
                    *duration += epsilon;
                    continue;
                }
            }
            if let Some((previous, duration)) = run.replace((surface, epsilon)) {
                sink(ExportFrame {
                    image: previous.to_image()?,
                    duration,
                })?;
            }
        }

        if let Some((previous, duration)) = run {
            sink(ExportFrame {
                image: previous.to_image()?,
                duration,
            })?;
        }
        Ok(())
    }

    pub fn collect_frames(&self, doc: &Document, epsilon: Ms, background: Color) -> Result<Vec<ExportFrame>> {
        let mut frames = Vec::new();
        self.collect_frames_with(doc, epsilon, background, |frame| {
            frames.push(frame);
            Ok(())
        })?;
        tracing::debug!(frames = frames.len(), epsilon, "collected export frames");
        Ok(frames)
    }

    /// A single `background` frame spanning the whole document
    pub fn create_solid(&self, doc: &Document, background: Color) -> Result<FrameList> {
        let mut surface = self.backend.create_surface(doc.width(), doc.height());
        surface.clear();
        surface.fill(background);

        let mut list = FrameList::new();
        list.add(Frame::spanning(0.0, doc.true_end()).with_image(surface.to_image()?));
        Ok(list)
    }

    /// Folds every layer's frames into one list with `merge`, later layers over earlier
    /// ones. Layer transforms and styles are not applied.
    pub fn merge_all(&self, doc: &Document, background: Option<Color>) -> Result<FrameList> {
        let (width, height) = (doc.width(), doc.height());
        let mut lists = doc.layers().iter().map(Layer::frames);

        let mut result = match background {
            Some(color) => self.create_solid(doc, color)?,
            None => match lists.next() {
                Some(first) => first.clone(),
                None => return Ok(FrameList::new()),
            },
        };
        for list in lists {
            result = result.merge(list, &self.backend, width, height)?;
        }
        Ok(result)
    }

    /// Stacks every frame of the document into one image as wide as the document,
    /// frame `i` drawn at `y = height * i`. Frames come in layer order, then by start.
    pub fn form_sheet(&self, doc: &Document) -> Result<ImageHandle> {
        let frames: Vec<&Frame> = doc.all_frames().map(|(_, frame)| frame).collect();
        if frames.is_empty() {
            return Ok(ImageHandle::blank());
        }

        let height = doc.height();
        let sheet_height = u32::try_from(frames.len())
            .ok()
            .and_then(|count| height.checked_mul(count))
            .ok_or(Error::ValueOutOfRange {
                field: "sheet height",
                value: height as f64 * frames.len() as f64,
            })?;

        let mut sheet = self.backend.create_surface(doc.width(), sheet_height);
        sheet.clear();
        for (i, frame) in frames.iter().enumerate() {
            sheet.set_transform(Affine::translate((0.0, height as f64 * i as f64)));
            sheet.draw_image(frame.image())?;
        }
        tracing::debug!(frames = frames.len(), "formed sprite sheet");
        sheet.to_image()
    }

    /// Merges the frames of layer `secondary` into layer `primary` and deletes `secondary`.
    ///
    /// Returns the primary's previous frames and the deleted layer.
    pub fn merge_layers(
        &self,
        doc: &mut Document,
        primary: usize,
        secondary: usize,
    ) -> Result<(FrameList, Layer)> {
        if primary == secondary {
            return Err(Error::LayerIndex(secondary));
        }
        let lower = doc.layer(primary)?;
        let upper = doc.layer(secondary)?;
        let merged = lower
            .frames()
            .merge(upper.frames(), &self.backend, doc.width(), doc.height())?;

        let key = lower.key();
        let previous = doc.replace_frames(key, merged)?;
        let removed = doc.delete_layer(secondary)?;
        tracing::debug!(primary = %key, secondary = %removed.key(), "merged layers");
        Ok((previous, removed))
    }

    /// Bakes the transitions of layer `index` into a new frame list without modifying it
    pub fn bake_layer(&self, doc: &Document, index: usize, epsilon: Ms) -> Result<FrameList> {
        let layer = doc.layer(index)?;
        let raster = BakeRaster {
            backend: &self.backend,
            width: doc.width(),
            height: doc.height(),
            epsilon,
            alias: self.alias_threshold,
        };
        layer
            .transitions()
            .apply_to_frame_list(layer.frames(), Some(layer.style()), &raster)
    }
}
