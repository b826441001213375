//! Property transitions and their evaluation

use crate::easing::Easing;
use crate::frame::{Frame, FrameList};
use crate::interval::{find_preceding, IntervalItem, IntervalList, ItemId, Resizable};
use crate::layer::LayerStyle;
use crate::raster::{ImageHandle, RasterBackend, Surface};
use crate::time::{sanitize_duration, sanitize_start, Ms, DEFAULT_FRAME_DURATION};
use crate::{Error, Result};
use kurbo::Affine;
use std::fmt;
use std::str::FromStr;

/// A layer property that transitions can animate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Property {
    Alpha,
    Perspective,
    OriginX,
    OriginY,
    OriginZ,
    TranslateX,
    TranslateY,
    TranslateZ,
    RotateX,
    RotateY,
    RotateZ,
    RotateA,
    ScaleX,
    ScaleY,
    ScaleZ,
    SkewX,
    SkewY,
}

impl Property {
    pub const ALL: [Property; 17] = [
        Property::Alpha,
        Property::Perspective,
        Property::OriginX,
        Property::OriginY,
        Property::OriginZ,
        Property::TranslateX,
        Property::TranslateY,
        Property::TranslateZ,
        Property::RotateX,
        Property::RotateY,
        Property::RotateZ,
        Property::RotateA,
        Property::ScaleX,
        Property::ScaleY,
        Property::ScaleZ,
        Property::SkewX,
        Property::SkewY,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Property::Alpha => "alpha",
            Property::Perspective => "perspective",
            Property::OriginX => "originX",
            Property::OriginY => "originY",
            Property::OriginZ => "originZ",
            Property::TranslateX => "translateX",
            Property::TranslateY => "translateY",
            Property::TranslateZ => "translateZ",
            Property::RotateX => "rotateX",
            Property::RotateY => "rotateY",
            Property::RotateZ => "rotateZ",
            Property::RotateA => "rotateA",
            Property::ScaleX => "scaleX",
            Property::ScaleY => "scaleY",
            Property::ScaleZ => "scaleZ",
            Property::SkewX => "skewX",
            Property::SkewY => "skewY",
        }
    }

    /// Position in [`Property::ALL`], used as the stored property code
    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn from_index(index: u8) -> Result<Self> {
        Property::ALL
            .get(index as usize)
            .copied()
            .ok_or_else(|| Error::InvalidProperty(format!("#{index}")))
    }
}

impl FromStr for Property {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Property::ALL
            .into_iter()
            .find(|property| property.as_str() == s)
            .ok_or_else(|| Error::InvalidProperty(s.to_string()))
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Eased interpolation of one property toward a target value over `[start, end)`.
///
/// The value it starts from is whatever the property evaluates to just before
/// `start` in the owning list.
#[derive(Debug, Clone)]
pub struct Transition {
    id: ItemId,
    start: Ms,
    duration: Ms,
    property: Property,
    target_value: f64,
    easing: Easing,
}

impl Transition {
    pub fn new(property: Property, start: Ms, duration: Ms, target_value: f64) -> Self {
        Self {
            id: ItemId::next(),
            start: sanitize_start(start),
            duration: sanitize_duration(duration, Self::MIN_DURATION, DEFAULT_FRAME_DURATION),
            property,
            target_value,
            easing: Easing::linear(),
        }
    }

    pub fn with_easing(mut self, easing: Easing) -> Self {
        self.easing = easing;
        self
    }

    pub fn property(&self) -> Property {
        self.property
    }

    pub fn target_value(&self) -> f64 {
        self.target_value
    }

    pub fn easing(&self) -> &Easing {
        &self.easing
    }

    /// Eased progress in `[0, 1]` at `t`. A zero-length transition has already arrived.
    pub fn progress_at(&self, t: Ms) -> f64 {
        let u = (t - self.start) / self.duration;
        if u <= 0.0 {
            return 0.0;
        }
        if u >= 1.0 || u.is_nan() {
            return 1.0;
        }
        let eased = self.easing.apply(u);
        if eased.is_nan() {
            0.0
        } else {
            eased
        }
    }

    /// Value at `t` when starting from `initial`
    pub fn value_at(&self, t: Ms, initial: f64) -> f64 {
        self.progress_at(t) * (self.target_value - initial) + initial
    }
}

impl IntervalItem for Transition {
    fn id(&self) -> ItemId {
        self.id
    }

    fn start(&self) -> Ms {
        self.start
    }

    fn duration(&self) -> Ms {
        self.duration
    }
}

impl Resizable for Transition {
    const MIN_DURATION: Ms = 0.0;

    fn set_start(&mut self, start: Ms) {
        self.start = sanitize_start(start);
    }

    fn set_duration(&mut self, duration: Ms) {
        self.duration = sanitize_duration(duration, Self::MIN_DURATION, DEFAULT_FRAME_DURATION);
    }
}

pub type TransitionList = IntervalList<Transition>;

/// Surface size, sampling interval and aliasing used when baking transitions
pub struct BakeRaster<'a, B> {
    pub backend: &'a B,
    pub width: u32,
    pub height: u32,
    pub epsilon: Ms,
    pub alias: Option<u8>,
}

impl IntervalList<Transition> {
    /// Transition of `property` covering `t`
    pub fn item_of_property_at(&self, property: Property, t: Ms) -> Option<&Transition> {
        let t = t + self.offset;
        if t < 0.0 {
            return None;
        }
        self.items
            .iter()
            .find(|item| item.property == property && item.is_at(t))
    }

    /// Transition of `property` covering `t`, or the one whose value holds over `t`
    pub fn item_of_property_preceding(&self, property: Property, t: Ms) -> Option<&Transition> {
        if let Some(item) = self.item_of_property_at(property, t) {
            return Some(item);
        }
        let members = self.extract_property_members(property);
        find_preceding(&members, t + self.offset).map(|index| members[index])
    }

    /// Transitions of `property` intersecting `[start, end)`
    pub fn items_of_property_in_range(
        &self,
        property: Property,
        start: Ms,
        end: Ms,
    ) -> Vec<&Transition> {
        let (start, end) = (start + self.offset, end + self.offset);
        let mut found = Vec::new();
        for item in &self.items {
            if item.property == property && item.is_in_range(start, end) {
                found.push(item);
            }
            if item.start > end {
                break;
            }
        }
        found
    }

    /// Every transition of `property`, in order
    pub fn extract_property_members(&self, property: Property) -> Vec<&Transition> {
        self.items
            .iter()
            .filter(|item| item.property == property)
            .collect()
    }

    /// Value of `property` at `t`: the governing transition's value, else the static
    /// style value, else 0
    pub fn evaluate_property_at(
        &self,
        property: Property,
        t: Ms,
        style: Option<&LayerStyle>,
    ) -> f64 {
        match self.item_of_property_preceding(property, t) {
            Some(transition) => {
                let initial = self.evaluate_property_at(
                    property,
                    transition.start - 1.0 - self.offset,
                    style,
                );
                transition.value_at(t + self.offset, initial)
            }
            None => style.map_or(0.0, |style| style.get(property)),
        }
    }

    /// 2D transform of the layer at `t`
    pub fn transform_at(&self, t: Ms, style: Option<&LayerStyle>) -> Affine {
        let value = |property| self.evaluate_property_at(property, t, style);

        let origin = (value(Property::OriginX), value(Property::OriginY));
        let skew_x = value(Property::SkewX).to_radians().tan();
        let skew_y = value(Property::SkewY).to_radians().tan();

        Affine::translate(origin)
            * Affine::skew(skew_x, skew_y)
            * Affine::scale_non_uniform(value(Property::ScaleX), value(Property::ScaleY))
            * Affine::rotate(value(Property::RotateA).to_radians())
            * Affine::translate((value(Property::TranslateX), value(Property::TranslateY)))
            * Affine::translate((-origin.0, -origin.1))
    }

    /// Bakes this track into raster frames by sampling `reference` every `epsilon` ms.
    ///
    /// Fully transparent samples are dropped and identical consecutive samples fused,
    /// so the result no longer depends on the transitions.
    pub fn apply_to_frame_list<B: RasterBackend>(
        &self,
        reference: &FrameList,
        style: Option<&LayerStyle>,
        raster: &BakeRaster<'_, B>,
    ) -> Result<FrameList> {
        let end = reference.end();
        if !end.is_finite() {
            return Err(Error::UnboundedTimeline);
        }
        let epsilon = sanitize_duration(raster.epsilon, 1.0, 1.0);

        let mut buffer = raster.backend.create_surface(raster.width, raster.height);
        let mut baked = FrameList::new();

        let mut t = 0.0;
        while t < end {
            buffer.clear();
            buffer.set_transform(self.transform_at(t, style));
            buffer.draw_image(&reference.image_at(t))?;
            if let Some(threshold) = raster.alias {
                buffer.alias(threshold);
            }

            let (image, trimming) = if buffer.is_fully_transparent() {
                (ImageHandle::blank(), Default::default())
            } else {
                (buffer.to_image()?, buffer.trimming())
            };

            let window_end = t + epsilon;
            for frame in reference.items_in_range(t, window_end) {
                let mut sample = Frame::spanning(t.max(frame.start()), window_end.min(frame.end()))
                    .with_image(image.clone());
                sample.set_trimming(trimming);
                baked.push(sample);
            }
            t = window_end;
        }

        baked.arrange();
        baked.clear_blanks().fuse_consecutive_duplicates();
        tracing::debug!(samples = (end / epsilon).ceil(), frames = baked.len(), "baked transitions");
        Ok(baked)
    }
}
