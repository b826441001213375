//! Raster primitive contracts consumed by the compositor
//!
//! The core never touches pixels directly. Image content travels as
//! [`ImageHandle`]s and is drawn through a [`Surface`] obtained from a
//! [`RasterBackend`].

use crate::trim::{self, TrimmingRect};
use crate::{Error, Result};
use kurbo::Affine;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_IMAGE_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of an image handle, usable as a decode cache key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageId(u64);

impl ImageId {
    pub fn get(self) -> u64 {
        self.0
    }
}

/// Shared handle over encoded image bytes. Empty bytes denote a blank image.
#[derive(Clone)]
pub struct ImageHandle {
    id: ImageId,
    data: Arc<[u8]>,
}

impl ImageHandle {
    /// The handle of a blank image
    pub fn blank() -> Self {
        Self {
            id: ImageId(0),
            data: Arc::from(Vec::new()),
        }
    }

    /// Wraps encoded image bytes
    pub fn from_encoded(data: impl Into<Arc<[u8]>>) -> Self {
        let data = data.into();
        if data.is_empty() {
            return Self::blank();
        }
        Self {
            id: ImageId(NEXT_IMAGE_ID.fetch_add(1, Ordering::Relaxed)),
            data,
        }
    }

    pub fn id(&self) -> ImageId {
        self.id
    }

    /// Encoded bytes of the image
    pub fn src(&self) -> &[u8] {
        &self.data
    }

    pub fn is_blank(&self) -> bool {
        self.data.is_empty()
    }

    /// A handle with its own identity over the same content
    pub fn duplicate(&self) -> Self {
        Self::from_encoded(self.data.to_vec())
    }
}

impl Default for ImageHandle {
    fn default() -> Self {
        Self::blank()
    }
}

impl PartialEq for ImageHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.data, &other.data) || self.data == other.data
    }
}

impl Eq for ImageHandle {}

impl fmt::Debug for ImageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageHandle")
            .field("id", &self.id.0)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// Straight-alpha RGBA color
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "String", into = "String")
)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const TRANSPARENT: Color = Color::rgba(0, 0, 0, 0);
    pub const WHITE: Color = Color::rgba(255, 255, 255, 255);
    pub const BLACK: Color = Color::rgba(0, 0, 0, 255);

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

impl FromStr for Color {
    type Err = Error;

    /// Parses `transparent`, `white`, `black`, `#rgb`, `#rrggbb` or `#rrggbbaa`
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidColor(s.to_string());
        match s.trim().to_ascii_lowercase().as_str() {
            "transparent" => return Ok(Color::TRANSPARENT),
            "white" => return Ok(Color::WHITE),
            "black" => return Ok(Color::BLACK),
            _ => {}
        }

        let hex = s.trim().strip_prefix('#').ok_or_else(invalid)?;
        if !hex.is_ascii() {
            return Err(invalid());
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());
        match hex.len() {
            3 => {
                let nibble = |i: usize| {
                    u8::from_str_radix(&hex[i..i + 1], 16)
                        .map(|v| v * 17)
                        .map_err(|_| invalid())
                };
                Ok(Color::rgba(nibble(0)?, nibble(1)?, nibble(2)?, 255))
            }
            6 => Ok(Color::rgba(channel(0)?, channel(2)?, channel(4)?, 255)),
            8 => Ok(Color::rgba(channel(0)?, channel(2)?, channel(4)?, channel(6)?)),
            _ => Err(invalid()),
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.a == 255 {
            write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            write!(
                f,
                "#{:02x}{:02x}{:02x}{:02x}",
                self.r, self.g, self.b, self.a
            )
        }
    }
}

impl TryFrom<String> for Color {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_string()
    }
}

/// How drawn pixels combine with what is already on a surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlendMode {
    #[default]
    SourceOver,
    DestinationOver,
    DestinationOut,
    SourceAtop,
    Multiply,
    Screen,
    Overlay,
    Darken,
    Lighten,
    Difference,
}

impl BlendMode {
    pub const ALL: [BlendMode; 10] = [
        BlendMode::SourceOver,
        BlendMode::DestinationOver,
        BlendMode::DestinationOut,
        BlendMode::SourceAtop,
        BlendMode::Multiply,
        BlendMode::Screen,
        BlendMode::Overlay,
        BlendMode::Darken,
        BlendMode::Lighten,
        BlendMode::Difference,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BlendMode::SourceOver => "source-over",
            BlendMode::DestinationOver => "destination-over",
            BlendMode::DestinationOut => "destination-out",
            BlendMode::SourceAtop => "source-atop",
            BlendMode::Multiply => "multiply",
            BlendMode::Screen => "screen",
            BlendMode::Overlay => "overlay",
            BlendMode::Darken => "darken",
            BlendMode::Lighten => "lighten",
            BlendMode::Difference => "difference",
        }
    }
}

impl FromStr for BlendMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        BlendMode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| Error::InvalidBlendMode(s.to_string()))
    }
}

impl fmt::Display for BlendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A drawable RGBA8 buffer with canvas-like state
pub trait Surface {
    fn width(&self) -> u32;

    fn height(&self) -> u32;

    /// Makes every pixel transparent
    fn clear(&mut self);

    /// Paints `color` over the whole surface with the current blend mode and alpha
    fn fill(&mut self, color: Color);

    /// Sets the transform applied to subsequently drawn images
    fn set_transform(&mut self, transform: Affine);

    fn reset_transform(&mut self) {
        self.set_transform(Affine::IDENTITY);
    }

    fn set_blend_mode(&mut self, mode: BlendMode);

    /// Global alpha in `[0, 1]`
    fn set_alpha(&mut self, alpha: f64);

    /// Decodes `image` and draws it at the origin. Blank images draw nothing.
    fn draw_image(&mut self, image: &ImageHandle) -> Result<()>;

    /// Snaps every pixel's alpha to 0 or 255 around `threshold`
    fn alias(&mut self, threshold: u8);

    /// Straight-alpha RGBA8 pixels, row major
    fn pixels(&self) -> &[u8];

    fn is_fully_transparent(&self) -> bool {
        trim::is_fully_transparent(self.pixels())
    }

    fn trimming(&self) -> TrimmingRect {
        TrimmingRect::of_rgba(self.width(), self.pixels())
    }

    /// Encodes the current content into a new image handle
    fn to_image(&self) -> Result<ImageHandle>;
}

/// Factory of surfaces
pub trait RasterBackend {
    type Surface: Surface;

    fn create_surface(&self, width: u32, height: u32) -> Self::Surface;
}
