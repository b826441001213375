//! wanim container format serialization and deserialization
//!
//! A file is a sequence of records: a one byte ASCII tag, a big-endian `u64` payload
//! length, then the payload. Integers are big-endian.

use crate::document::Document;
use crate::easing::{AccelerationMode, Easing, EasingSpec};
use crate::frame::Frame;
use crate::interval::IntervalItem;
use crate::raster::ImageHandle;
use crate::time::Ms;
use crate::transition::{Property, Transition};
use crate::{Error, Result};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Cursor, Read, Write};

/// Canvas size and layer count
const TAG_HEADER: u8 = b'A';
/// One frame
const TAG_FRAME: u8 = b'F';
/// One transition
const TAG_TRANSITION: u8 = b'T';

/// Stored duration standing for an infinite duration
const INFINITE_DURATION: u32 = u32::MAX;

/// PNG file signature, left out of stored frame images
pub const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

const EASING_LINEAR: u8 = 0;
const EASING_POLYNOMIAL: u8 = 1;

/// Maps an I/O error inside a payload to a truncation error for that record
fn truncated(tag: u8) -> impl Fn(io::Error) -> Error {
    move |_| Error::TruncatedChunk(tag as char)
}

fn encode_time(field: &'static str, value: Ms) -> Result<u32> {
    if value.is_infinite() && value > 0.0 {
        return Ok(INFINITE_DURATION);
    }
    if !(0.0..INFINITE_DURATION as f64).contains(&value) {
        return Err(Error::ValueOutOfRange { field, value });
    }
    Ok(value as u32)
}

fn decode_duration(value: u32) -> Ms {
    if value == INFINITE_DURATION {
        f64::INFINITY
    } else {
        value as Ms
    }
}

fn strip_signature(image: &[u8]) -> &[u8] {
    image.strip_prefix(&PNG_SIGNATURE[..]).unwrap_or(image)
}

fn with_signature(image: Vec<u8>) -> ImageHandle {
    if image.is_empty() {
        return ImageHandle::blank();
    }
    let mut png = Vec::with_capacity(PNG_SIGNATURE.len() + image.len());
    png.extend_from_slice(&PNG_SIGNATURE);
    png.extend_from_slice(&image);
    ImageHandle::from_encoded(png)
}

fn write_record<W: Write>(writer: &mut W, tag: u8, payload: &[u8]) -> Result<()> {
    writer.write_u8(tag)?;
    writer.write_u64::<BigEndian>(payload.len() as u64)?;
    writer.write_all(payload)?;
    Ok(())
}

/// wanim header record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WanimHeader {
    /// Canvas width in pixels
    pub width: u32,
    /// Canvas height in pixels
    pub height: u32,
    /// Number of layers
    pub layer_count: u32,
}

impl WanimHeader {
    pub fn new(width: u32, height: u32, layer_count: u32) -> Self {
        Self {
            width,
            height,
            layer_count,
        }
    }

    /// Reads a header payload
    pub fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let field = truncated(TAG_HEADER);
        Ok(Self {
            width: reader.read_u32::<BigEndian>().map_err(&field)?,
            height: reader.read_u32::<BigEndian>().map_err(&field)?,
            layer_count: reader.read_u32::<BigEndian>().map_err(&field)?,
        })
    }

    /// Writes the header payload
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u32::<BigEndian>(self.width)?;
        writer.write_u32::<BigEndian>(self.height)?;
        writer.write_u32::<BigEndian>(self.layer_count)?;
        Ok(())
    }
}

/// One stored frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameRecord {
    /// Index of the owning layer
    pub layer: u32,
    pub start: u32,
    /// `u32::MAX` for an infinite duration
    pub duration: u32,
    /// PNG data without its signature, empty for a blank frame
    pub image: Vec<u8>,
}

impl FrameRecord {
    pub fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let field = truncated(TAG_FRAME);
        let layer = reader.read_u32::<BigEndian>().map_err(&field)?;
        let start = reader.read_u32::<BigEndian>().map_err(&field)?;
        let duration = reader.read_u32::<BigEndian>().map_err(&field)?;
        let mut image = Vec::new();
        reader.read_to_end(&mut image)?;
        Ok(Self {
            layer,
            start,
            duration,
            image,
        })
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u32::<BigEndian>(self.layer)?;
        writer.write_u32::<BigEndian>(self.start)?;
        writer.write_u32::<BigEndian>(self.duration)?;
        writer.write_all(&self.image)?;
        Ok(())
    }

    fn of(layer: u32, frame: &Frame) -> Result<Self> {
        Ok(Self {
            layer,
            start: encode_time("frame start", frame.start())?,
            duration: encode_time("frame duration", frame.duration())?,
            image: strip_signature(frame.src()).to_vec(),
        })
    }

    fn into_frame(self) -> Frame {
        Frame::new(self.start as Ms, decode_duration(self.duration)).with_image(with_signature(self.image))
    }
}

/// One stored transition
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionRecord {
    /// Index of the owning layer
    pub layer: u32,
    pub start: u32,
    /// `u32::MAX` for an infinite duration
    pub duration: u32,
    pub property: Property,
    pub target_value: f64,
    pub easing: EasingSpec,
}

impl TransitionRecord {
    pub fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let field = truncated(TAG_TRANSITION);
        let layer = reader.read_u32::<BigEndian>().map_err(&field)?;
        let start = reader.read_u32::<BigEndian>().map_err(&field)?;
        let duration = reader.read_u32::<BigEndian>().map_err(&field)?;
        let property = Property::from_index(reader.read_u8().map_err(&field)?)?;
        let target_value = reader.read_f64::<BigEndian>().map_err(&field)?;
        let kind = reader.read_u8().map_err(&field)?;
        let degree = reader.read_f64::<BigEndian>().map_err(&field)?;
        let mode = match reader.read_u8().map_err(&field)? {
            0 => AccelerationMode::In,
            1 => AccelerationMode::Out,
            2 => AccelerationMode::InOut,
            other => return Err(Error::InvalidAccelerationMode(other.to_string())),
        };

        let easing = match kind {
            EASING_POLYNOMIAL => EasingSpec::Polynomial { degree, mode },
            EASING_LINEAR => EasingSpec::Linear,
            other => {
                tracing::warn!(kind = other, "unknown easing kind, using linear");
                EasingSpec::Linear
            }
        };

        Ok(Self {
            layer,
            start,
            duration,
            property,
            target_value,
            easing,
        })
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        let (kind, degree, mode) = match self.easing {
            EasingSpec::Polynomial { degree, mode } => (EASING_POLYNOMIAL, degree, mode),
            EasingSpec::Linear | EasingSpec::Custom => (EASING_LINEAR, 1.0, AccelerationMode::default()),
        };
        let mode = match mode {
            AccelerationMode::In => 0,
            AccelerationMode::Out => 1,
            AccelerationMode::InOut => 2,
        };

        writer.write_u32::<BigEndian>(self.layer)?;
        writer.write_u32::<BigEndian>(self.start)?;
        writer.write_u32::<BigEndian>(self.duration)?;
        writer.write_u8(self.property.index())?;
        writer.write_f64::<BigEndian>(self.target_value)?;
        writer.write_u8(kind)?;
        writer.write_f64::<BigEndian>(degree)?;
        writer.write_u8(mode)?;
        Ok(())
    }

    fn of(layer: u32, transition: &Transition) -> Result<Self> {
        let easing = transition.easing().spec();
        if easing == EasingSpec::Custom {
            tracing::warn!(transition = %transition.id(), "custom easing is stored as linear");
        }
        Ok(Self {
            layer,
            start: encode_time("transition start", transition.start())?,
            duration: encode_time("transition duration", transition.duration())?,
            property: transition.property(),
            target_value: transition.target_value(),
            easing,
        })
    }

    fn into_transition(self) -> Transition {
        Transition::new(
            self.property,
            self.start as Ms,
            decode_duration(self.duration),
            self.target_value,
        )
        .with_easing(Easing::from_spec(self.easing))
    }
}

/// Complete wanim container
#[derive(Debug, Clone, PartialEq)]
pub struct WanimContainer {
    pub header: WanimHeader,
    pub frames: Vec<FrameRecord>,
    pub transitions: Vec<TransitionRecord>,
}

impl WanimContainer {
    pub fn new(header: WanimHeader) -> Self {
        Self {
            header,
            frames: Vec::new(),
            transitions: Vec::new(),
        }
    }

    /// Reads records until the end of input. Records with unknown tags are skipped.
    pub fn read<R: Read>(mut reader: R) -> Result<Self> {
        let mut header = None;
        let mut frames = Vec::new();
        let mut transitions = Vec::new();

        loop {
            let tag = match reader.read_u8() {
                Ok(tag) => tag,
                Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(err) => return Err(err.into()),
            };
            let length = reader
                .read_u64::<BigEndian>()
                .map_err(truncated(tag))?;

            let mut payload = Vec::new();
            (&mut reader).take(length).read_to_end(&mut payload)?;
            if (payload.len() as u64) < length {
                return Err(Error::TruncatedChunk(tag as char));
            }
            let mut cursor = Cursor::new(payload);

            match tag {
                TAG_HEADER => header = Some(WanimHeader::read(&mut cursor)?),
                TAG_FRAME => frames.push(FrameRecord::read(&mut cursor)?),
                TAG_TRANSITION => transitions.push(TransitionRecord::read(&mut cursor)?),
                other => {
                    tracing::warn!(
                        tag = %(other as char),
                        length,
                        "unrecognized chunk type, skipping"
                    );
                }
            }
        }

        let header = header.ok_or(Error::MissingHeader)?;
        tracing::debug!(
            layers = header.layer_count,
            frames = frames.len(),
            transitions = transitions.len(),
            "read container"
        );
        Ok(Self {
            header,
            frames,
            transitions,
        })
    }

    /// Writes the header record followed by every frame and transition record
    pub fn write<W: Write>(&self, mut writer: W) -> Result<()> {
        let mut payload = Vec::new();
        self.header.write(&mut payload)?;
        write_record(&mut writer, TAG_HEADER, &payload)?;

        for frame in &self.frames {
            payload.clear();
            frame.write(&mut payload)?;
            write_record(&mut writer, TAG_FRAME, &payload)?;
        }
        for transition in &self.transitions {
            payload.clear();
            transition.write(&mut payload)?;
            write_record(&mut writer, TAG_TRANSITION, &payload)?;
        }
        Ok(())
    }

    /// Captures the frames and transitions of every layer
    pub fn from_document(doc: &Document) -> Result<Self> {
        let mut container = Self::new(WanimHeader::new(
            doc.width(),
            doc.height(),
            doc.len() as u32,
        ));
        for (index, layer) in doc.layers().iter().enumerate() {
            let index = index as u32;
            for frame in layer.frames() {
                container.frames.push(FrameRecord::of(index, frame)?);
            }
            for transition in layer.transitions() {
                container
                    .transitions
                    .push(TransitionRecord::of(index, transition)?);
            }
        }
        Ok(container)
    }

    /// Rebuilds a document. Items are inserted as stored and only sorted, not arranged.
    pub fn into_document(self) -> Result<Document> {
        let mut doc = Document::new(self.header.width, self.header.height);
        let keys: Vec<_> = (0..self.header.layer_count as usize)
            .map(|index| doc.add_layer(index, None))
            .collect();
        let key_of = |layer: u32| {
            keys.get(layer as usize)
                .copied()
                .ok_or(Error::LayerIndex(layer as usize))
        };

        for record in self.frames {
            let key = key_of(record.layer)?;
            doc.readd_frame(key, record.into_frame())?;
        }
        for record in self.transitions {
            let key = key_of(record.layer)?;
            doc.readd_transition(key, record.into_transition())?;
        }
        Ok(doc)
    }
}
