//! Segment copies: a contiguous run of another list's items replayed at a new start

use crate::document::LayerLookup;
use crate::frame::FrameList;
use crate::interval::{IntervalItem, IntervalList, ItemId};
use crate::layer::LayerKey;
use crate::raster::ImageHandle;
use crate::time::{sanitize_offset, sanitize_start, Ms};
use crate::transition::TransitionList;
use crate::{Error, Result};

/// Which list of a layer a copy refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    Frames,
    Transitions,
    Copies,
}

/// The lists a copy may replay. Copy lists are not among them, so copies never chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopySource {
    Frames,
    Transitions,
}

impl TryFrom<ListKind> for CopySource {
    type Error = Error;

    fn try_from(kind: ListKind) -> Result<Self> {
        match kind {
            ListKind::Frames => Ok(CopySource::Frames),
            ListKind::Transitions => Ok(CopySource::Transitions),
            ListKind::Copies => Err(Error::CopyOfCopyList),
        }
    }
}

/// Non-owning pointer to the frames or transitions of a layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopyReference {
    layer: LayerKey,
    source: CopySource,
}

impl CopyReference {
    pub fn new(layer: LayerKey, kind: ListKind) -> Result<Self> {
        Ok(Self {
            layer,
            source: kind.try_into()?,
        })
    }

    pub fn layer(&self) -> LayerKey {
        self.layer
    }

    pub fn source(&self) -> CopySource {
        self.source
    }
}

/// Replays items `[start_index, end_index)` of the referenced list from `start`
#[derive(Debug, Clone)]
pub struct SegmentCopy {
    id: ItemId,
    start: Ms,
    start_index: usize,
    end_index: usize,
    reference: CopyReference,
}

impl SegmentCopy {
    pub fn new(start: Ms, start_index: usize, end_index: usize, reference: CopyReference) -> Self {
        Self {
            id: ItemId::next(),
            start: sanitize_start(start),
            start_index,
            end_index: end_index.max(start_index),
            reference,
        }
    }

    pub fn id(&self) -> ItemId {
        self.id
    }

    pub fn start(&self) -> Ms {
        self.start
    }

    pub fn set_start(&mut self, start: Ms) {
        self.start = sanitize_start(start);
    }

    pub fn range(&self) -> std::ops::Range<usize> {
        self.start_index..self.end_index
    }

    pub fn reference(&self) -> CopyReference {
        self.reference
    }

    /// Resolves the referenced items, `None` when the layer is gone
    pub fn resolve(&self, lookup: &impl LayerLookup) -> Option<ResolvedCopy> {
        let layer = lookup.layer_by_key(self.reference.layer)?;
        let target = match self.reference.source {
            CopySource::Frames => CopyTarget::Frames(rebase(layer.frames().slice(self.range()))),
            CopySource::Transitions => {
                CopyTarget::Transitions(rebase(layer.transitions().slice(self.range())))
            }
        };
        Some(ResolvedCopy {
            id: self.id,
            start: self.start,
            target,
        })
    }

    /// Span of the referenced items
    pub fn duration(&self, lookup: &impl LayerLookup) -> Option<Ms> {
        self.resolve(lookup).map(|copy| copy.duration())
    }
}

/// Sets the list offset to its first item's start so queries begin at 0
fn rebase<T: IntervalItem>(mut list: IntervalList<T>) -> IntervalList<T> {
    let start = list.start();
    list.set_offset(start);
    list
}

/// Snapshot of the items a copy refers to
#[derive(Debug, Clone)]
pub enum CopyTarget {
    Frames(FrameList),
    Transitions(TransitionList),
}

/// A copy with its referenced items looked up, usable as an interval item
#[derive(Debug, Clone)]
pub struct ResolvedCopy {
    id: ItemId,
    start: Ms,
    target: CopyTarget,
}

impl ResolvedCopy {
    pub fn target(&self) -> &CopyTarget {
        &self.target
    }

    /// Image of the copied frames at document time `t`
    pub fn image_at(&self, t: Ms) -> ImageHandle {
        match &self.target {
            CopyTarget::Frames(frames) if t >= self.start => frames.image_at(t - self.start),
            _ => ImageHandle::blank(),
        }
    }
}

impl IntervalItem for ResolvedCopy {
    fn id(&self) -> ItemId {
        self.id
    }

    fn start(&self) -> Ms {
        self.start
    }

    fn duration(&self) -> Ms {
        match &self.target {
            CopyTarget::Frames(list) => list.duration(),
            CopyTarget::Transitions(list) => list.duration(),
        }
    }
}

/// The copies of a layer, ordered by start
#[derive(Debug, Clone, Default)]
pub struct CopyList {
    copies: Vec<SegmentCopy>,
    offset: Ms,
}

impl CopyList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn offset(&self) -> Ms {
        self.offset
    }

    pub fn set_offset(&mut self, offset: Ms) {
        self.offset = sanitize_offset(offset);
    }

    pub fn len(&self) -> usize {
        self.copies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.copies.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SegmentCopy> {
        self.copies.iter()
    }

    pub fn add(&mut self, copy: SegmentCopy) -> ItemId {
        let id = copy.id;
        self.copies.push(copy);
        self.copies.sort_by(|a, b| a.start.total_cmp(&b.start));
        id
    }

    pub fn remove_id(&mut self, id: ItemId) -> Option<SegmentCopy> {
        let index = self.copies.iter().position(|copy| copy.id == id)?;
        Some(self.copies.remove(index))
    }

    pub fn clear(&mut self) {
        self.copies.clear();
    }

    /// Looks up every copy's items. Copies of removed layers are skipped.
    pub fn resolve(&self, lookup: &impl LayerLookup) -> IntervalList<ResolvedCopy> {
        let mut resolved: IntervalList<ResolvedCopy> = self
            .copies
            .iter()
            .filter_map(|copy| {
                let resolved = copy.resolve(lookup);
                if resolved.is_none() {
                    tracing::warn!(
                        copy = %copy.id,
                        layer = %copy.reference.layer,
                        "copy refers to a missing layer"
                    );
                }
                resolved
            })
            .collect();
        resolved.set_offset(self.offset);
        resolved
    }

    /// Image of the frame copy covering `t`, blank when there is none.
    ///
    /// Copies may overlap. Where they do, the copy starting last wins, as if the
    /// earlier ones were clipped at its start.
    pub fn image_at(&self, t: Ms, lookup: &impl LayerLookup) -> ImageHandle {
        if self.copies.is_empty() {
            return ImageHandle::blank();
        }
        let t = t + self.offset;
        if t < 0.0 {
            return ImageHandle::blank();
        }
        self.resolve(lookup)
            .iter()
            .rev()
            .find(|copy| matches!(copy.target, CopyTarget::Frames(_)) && copy.is_at(t))
            .map_or_else(ImageHandle::blank, |copy| copy.image_at(t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Frame;
    use crate::layer::Layer;

    fn source_layer() -> (Layer, Vec<ImageHandle>) {
        let images: Vec<ImageHandle> = (1..=3)
            .map(|i| ImageHandle::from_encoded(vec![i; 4]))
            .collect();
        let mut layer = Layer::new();
        for (i, image) in images.iter().enumerate() {
            layer
                .frames_mut()
                .add(Frame::new(100.0 + i as f64 * 100.0, 100.0).with_image(image.clone()));
        }
        (layer, images)
    }

    #[test]
    fn test_copies_never_chain() {
        let layer = Layer::new();
        assert!(matches!(
            CopyReference::new(layer.key(), ListKind::Copies),
            Err(Error::CopyOfCopyList)
        ));
        assert!(matches!(
            CopySource::try_from(ListKind::Copies),
            Err(Error::CopyOfCopyList)
        ));

        let reference = CopyReference::new(layer.key(), ListKind::Transitions).unwrap();
        assert_eq!(reference.source(), CopySource::Transitions);
    }

    #[test]
    fn test_later_copy_wins_overlap() {
        let (source, images) = source_layer();
        let first = CopyReference::new(source.key(), ListKind::Frames).unwrap();
        let mut copies = CopyList::new();
        copies.add(SegmentCopy::new(1000.0, 0, 3, first));
        copies.add(SegmentCopy::new(1100.0, 2, 3, first));

        let layers = vec![source];
        assert_eq!(copies.image_at(1050.0, &layers), images[0]);
        assert_eq!(copies.image_at(1150.0, &layers), images[2]);
        assert_eq!(copies.image_at(1250.0, &layers), images[2]);
        assert!(copies.image_at(1300.0, &layers).is_blank());
    }

    #[test]
    fn test_duration_is_derived() {
        let (source, _) = source_layer();
        let reference = CopyReference::new(source.key(), ListKind::Frames).unwrap();
        let copy = SegmentCopy::new(1000.0, 1, 3, reference);

        let layers = vec![source];
        assert_eq!(copy.duration(&layers), Some(200.0));

        let resolved = copy.resolve(&layers).unwrap();
        assert_eq!((resolved.start(), resolved.end()), (1000.0, 1200.0));
    }

    #[test]
    fn test_replays_items_at_copy_start() {
        let (source, images) = source_layer();
        let reference = CopyReference::new(source.key(), ListKind::Frames).unwrap();
        let mut copies = CopyList::new();
        copies.add(SegmentCopy::new(1000.0, 1, 3, reference));

        let layers = vec![source];
        assert_eq!(copies.image_at(1050.0, &layers), images[1]);
        assert_eq!(copies.image_at(1150.0, &layers), images[2]);
        assert!(copies.image_at(1200.0, &layers).is_blank());
        assert!(copies.image_at(999.0, &layers).is_blank());
    }

    #[test]
    fn test_missing_layer_is_skipped() {
        let (source, _) = source_layer();
        let reference = CopyReference::new(source.key(), ListKind::Frames).unwrap();
        let mut copies = CopyList::new();
        copies.add(SegmentCopy::new(0.0, 0, 1, reference));

        let empty: Vec<Layer> = Vec::new();
        assert!(copies.resolve(&empty).is_empty());
        assert!(copies.image_at(50.0, &empty).is_blank());
    }
}
