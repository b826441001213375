//! Layers: one frame list, one transition list and one copy list plus static style

use crate::copy::CopyList;
use crate::document::LayerLookup;
use crate::frame::FrameList;
use crate::raster::{BlendMode, ImageHandle};
use crate::time::{sanitize_bounded, Ms};
use crate::transition::{Property, TransitionList};
use kurbo::Affine;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_LAYER_KEY: AtomicU64 = AtomicU64::new(1);

/// Stable identity of a layer, independent of its position in the document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LayerKey(u64);

impl LayerKey {
    fn next() -> Self {
        Self(NEXT_LAYER_KEY.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for LayerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// Static value of every animatable property, used where no transition applies
#[derive(Debug, Clone, PartialEq)]
pub struct LayerStyle {
    alpha: f64,
    pub perspective: f64,
    pub origin_x: f64,
    pub origin_y: f64,
    pub origin_z: f64,
    pub translate_x: f64,
    pub translate_y: f64,
    pub translate_z: f64,
    pub rotate_x: f64,
    pub rotate_y: f64,
    pub rotate_z: f64,
    pub rotate_a: f64,
    pub scale_x: f64,
    pub scale_y: f64,
    pub scale_z: f64,
    pub skew_x: f64,
    pub skew_y: f64,
    pub blending: BlendMode,
}

impl Default for LayerStyle {
    fn default() -> Self {
        Self {
            alpha: 255.0,
            perspective: 0.0,
            origin_x: 0.0,
            origin_y: 0.0,
            origin_z: 0.0,
            translate_x: 0.0,
            translate_y: 0.0,
            translate_z: 0.0,
            rotate_x: 0.0,
            rotate_y: 0.0,
            rotate_z: 1.0,
            rotate_a: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            scale_z: 1.0,
            skew_x: 0.0,
            skew_y: 0.0,
            blending: BlendMode::SourceOver,
        }
    }
}

impl LayerStyle {
    /// Opacity in `[0, 255]`
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn set_alpha(&mut self, alpha: f64) {
        self.alpha = sanitize_bounded(alpha, 0.0, 255.0);
    }

    pub fn get(&self, property: Property) -> f64 {
        match property {
            Property::Alpha => self.alpha,
            Property::Perspective => self.perspective,
            Property::OriginX => self.origin_x,
            Property::OriginY => self.origin_y,
            Property::OriginZ => self.origin_z,
            Property::TranslateX => self.translate_x,
            Property::TranslateY => self.translate_y,
            Property::TranslateZ => self.translate_z,
            Property::RotateX => self.rotate_x,
            Property::RotateY => self.rotate_y,
            Property::RotateZ => self.rotate_z,
            Property::RotateA => self.rotate_a,
            Property::ScaleX => self.scale_x,
            Property::ScaleY => self.scale_y,
            Property::ScaleZ => self.scale_z,
            Property::SkewX => self.skew_x,
            Property::SkewY => self.skew_y,
        }
    }

    pub fn set(&mut self, property: Property, value: f64) {
        let slot = match property {
            Property::Alpha => return self.set_alpha(value),
            Property::Perspective => &mut self.perspective,
            Property::OriginX => &mut self.origin_x,
            Property::OriginY => &mut self.origin_y,
            Property::OriginZ => &mut self.origin_z,
            Property::TranslateX => &mut self.translate_x,
            Property::TranslateY => &mut self.translate_y,
            Property::TranslateZ => &mut self.translate_z,
            Property::RotateX => &mut self.rotate_x,
            Property::RotateY => &mut self.rotate_y,
            Property::RotateZ => &mut self.rotate_z,
            Property::RotateA => &mut self.rotate_a,
            Property::ScaleX => &mut self.scale_x,
            Property::ScaleY => &mut self.scale_y,
            Property::ScaleZ => &mut self.scale_z,
            Property::SkewX => &mut self.skew_x,
            Property::SkewY => &mut self.skew_y,
        };
        *slot = value;
    }
}

/// A drawing layer
#[derive(Debug)]
pub struct Layer {
    key: LayerKey,
    frames: FrameList,
    transitions: TransitionList,
    copies: CopyList,
    style: LayerStyle,
    pub hidden: bool,
    /// Excludes the layer from the document's end
    pub can_end_prematurely: bool,
}

impl Default for Layer {
    fn default() -> Self {
        Self::new()
    }
}

impl Layer {
    pub fn new() -> Self {
        Self {
            key: LayerKey::next(),
            frames: FrameList::new(),
            transitions: TransitionList::new(),
            copies: CopyList::new(),
            style: LayerStyle::default(),
            hidden: false,
            can_end_prematurely: false,
        }
    }

    pub fn key(&self) -> LayerKey {
        self.key
    }

    pub fn frames(&self) -> &FrameList {
        &self.frames
    }

    pub fn frames_mut(&mut self) -> &mut FrameList {
        &mut self.frames
    }

    pub fn transitions(&self) -> &TransitionList {
        &self.transitions
    }

    pub fn transitions_mut(&mut self) -> &mut TransitionList {
        &mut self.transitions
    }

    pub fn copies(&self) -> &CopyList {
        &self.copies
    }

    pub fn copies_mut(&mut self) -> &mut CopyList {
        &mut self.copies
    }

    pub fn style(&self) -> &LayerStyle {
        &self.style
    }

    pub fn style_mut(&mut self) -> &mut LayerStyle {
        &mut self.style
    }

    /// Takes ownership of `frames`, returning the detached previous list
    pub fn assign_frames(&mut self, frames: FrameList) -> FrameList {
        std::mem::replace(&mut self.frames, frames)
    }

    pub fn assign_transitions(&mut self, transitions: TransitionList) -> TransitionList {
        std::mem::replace(&mut self.transitions, transitions)
    }

    /// Evaluated value of `property` at `t`
    pub fn evaluate(&self, property: Property, t: Ms) -> f64 {
        self.transitions
            .evaluate_property_at(property, t, Some(&self.style))
    }

    pub fn transform_at(&self, t: Ms) -> Affine {
        self.transitions.transform_at(t, Some(&self.style))
    }

    /// Content shown at `t`: the frame image, or a copy's image where the frames are blank
    pub fn image_at(&self, t: Ms, lookup: &impl LayerLookup) -> ImageHandle {
        let image = self.frames.image_at(t);
        if !image.is_blank() {
            return image;
        }
        self.copies.image_at(t, lookup)
    }

    /// Where the layer's content ends
    pub fn end(&self) -> Ms {
        if self.can_end_prematurely {
            0.0
        } else {
            self.frames.end()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::copy::{CopyReference, ListKind, SegmentCopy};
    use crate::frame::Frame;
    use crate::interval::IntervalItem;
    use crate::transition::Transition;

    #[test]
    fn test_style_defaults() {
        let style = LayerStyle::default();
        assert_eq!(style.get(Property::Alpha), 255.0);
        assert_eq!(style.get(Property::RotateZ), 1.0);
        assert_eq!(style.get(Property::ScaleY), 1.0);
        assert_eq!(style.get(Property::SkewX), 0.0);
        assert_eq!(style.blending, BlendMode::SourceOver);
    }

    #[test]
    fn test_style_alpha_is_clamped() {
        let mut style = LayerStyle::default();
        style.set(Property::Alpha, 300.7);
        assert_eq!(style.alpha(), 255.0);
        style.set(Property::Alpha, -3.0);
        assert_eq!(style.alpha(), 0.0);
        style.set(Property::TranslateX, -3.5);
        assert_eq!(style.translate_x, -3.5);
    }

    #[test]
    fn test_assign_returns_previous_list() {
        let mut layer = Layer::new();
        layer.frames_mut().add(Frame::new(0.0, 100.0));

        let previous = layer.assign_frames(FrameList::new());
        assert_eq!(previous.len(), 1);
        assert!(layer.frames().is_empty());
    }

    #[test]
    fn test_evaluate_uses_style() {
        let mut layer = Layer::new();
        layer.style_mut().set_alpha(0.0);
        layer
            .transitions_mut()
            .add(Transition::new(Property::Alpha, 0.0, 100.0, 255.0));

        assert!((layer.evaluate(Property::Alpha, 50.0) - 127.5).abs() < 1e-9);
        assert_eq!(layer.evaluate(Property::ScaleX, 50.0), 1.0);
    }

    #[test]
    fn test_image_falls_back_to_copies() {
        let image = ImageHandle::from_encoded(vec![1, 2, 3, 4]);
        let mut source = Layer::new();
        source
            .frames_mut()
            .add(Frame::new(0.0, 100.0).with_image(image.clone()));

        let mut layer = Layer::new();
        layer.frames_mut().add(Frame::new(0.0, 50.0));
        let reference = CopyReference::new(source.key(), ListKind::Frames).unwrap();
        layer.copies_mut().add(SegmentCopy::new(500.0, 0, 1, reference));

        let layers = vec![source, layer];
        let layer = &layers[1];
        assert!(layer.image_at(25.0, &layers).is_blank());
        assert_eq!(layer.image_at(550.0, &layers), image);
        assert!(layer.image_at(600.0, &layers).is_blank());
    }

    #[test]
    fn test_premature_end() {
        let mut layer = Layer::new();
        layer.frames_mut().add(Frame::new(0.0, 100.0));
        assert_eq!(layer.end(), 100.0);
        layer.can_end_prematurely = true;
        assert_eq!(layer.end(), 0.0);
        assert_eq!(layer.frames().get(0).map(|f| f.end()), Some(100.0));
    }
}
