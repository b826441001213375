//! Raster keyframes and the frame list

use crate::interval::{
    find_in_range, Fillable, IntervalItem, IntervalList, ItemId, Reduration, Resizable,
};
use crate::raster::{ImageHandle, RasterBackend, Surface};
use crate::time::{sanitize_duration, sanitize_start, Ms, DEFAULT_FRAME_DURATION};
use crate::trim::TrimmingRect;
use crate::Result;

/// A raster keyframe valid over `[start, end)`
#[derive(Debug, Clone)]
pub struct Frame {
    id: ItemId,
    start: Ms,
    duration: Ms,
    image: ImageHandle,
    trimming: TrimmingRect,
}

impl Frame {
    /// Creates a blank frame. Out-of-range values are normalized.
    pub fn new(start: Ms, duration: Ms) -> Self {
        Self {
            id: ItemId::next(),
            start: sanitize_start(start),
            duration: sanitize_duration(duration, Self::MIN_DURATION, DEFAULT_FRAME_DURATION),
            image: ImageHandle::blank(),
            trimming: TrimmingRect::empty(),
        }
    }

    /// Creates a blank frame covering `[start, end)`
    pub fn spanning(start: Ms, end: Ms) -> Self {
        let start = sanitize_start(start);
        Self::new(start, end - start)
    }

    pub fn with_image(mut self, image: ImageHandle) -> Self {
        self.image = image;
        self
    }

    pub fn image(&self) -> &ImageHandle {
        &self.image
    }

    pub fn set_image(&mut self, image: ImageHandle) {
        self.image = image;
    }

    /// Encoded content. Empty for a blank frame.
    pub fn src(&self) -> &[u8] {
        self.image.src()
    }

    /// Shares the image of `other`
    pub fn link(&mut self, other: &Frame) {
        self.image = other.image.clone();
    }

    /// Gives this frame its own image with unchanged content
    pub fn unlink(&mut self) {
        if !self.image.is_blank() {
            self.image = self.image.duplicate();
        }
    }

    pub fn trimming(&self) -> TrimmingRect {
        self.trimming
    }

    pub fn set_trimming(&mut self, trimming: TrimmingRect) {
        self.trimming = trimming;
    }
}

impl IntervalItem for Frame {
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

impl Resizable for Frame {
    const ARRANGE_POLICY: Reduration = Reduration::Back;
    const MIN_DURATION: Ms = 1.0;

    fn set_start(&mut self, start: Ms) {
        self.start = sanitize_start(start);
    }

    fn set_duration(&mut self, duration: Ms) {
        self.duration = sanitize_duration(duration, Self::MIN_DURATION, DEFAULT_FRAME_DURATION);
    }
}

impl Fillable for Frame {
    fn blank(start: Ms, end: Ms) -> Self {
        Frame::spanning(start, end)
    }

    fn is_blank(&self) -> bool {
        self.image.is_blank()
    }
}

pub type FrameList = IntervalList<Frame>;

impl IntervalList<Frame> {
    /// Gets the frame at `t`, synthesizing a blank frame over the gap `t` falls in
    pub fn item_at_or_blank(&self, t: Ms) -> Option<Frame> {
        match self.item_at(t) {
            Some(frame) => Some(frame.clone()),
            None => self.fill_blanks(f64::INFINITY).item_at(t).cloned(),
        }
    }

    /// Gets every frame intersecting `[start, end)`, gaps included as blank frames
    pub fn items_in_range_or_blank(&self, start: Ms, end: Ms) -> Vec<Frame> {
        self.fill_blanks(f64::INFINITY)
            .items_in_range(start, end)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Image shown at `t`, blank in a gap
    pub fn image_at(&self, t: Ms) -> ImageHandle {
        self.item_at(t)
            .map(|frame| frame.image.clone())
            .unwrap_or_default()
    }

    /// Merges adjacent frames holding identical content into one longer frame
    pub fn fuse_consecutive_duplicates(&mut self) -> &mut Self {
        let mut i = 0;
        while i + 1 < self.items.len() {
            let (current, next) = (&self.items[i], &self.items[i + 1]);
            if current.end() == next.start() && current.image == next.image {
                let end = next.end();
                self.items[i].set_end(end);
                self.items.remove(i + 1);
            } else {
                i += 1;
            }
        }
        self
    }

    /// Shifts every frame by `ms`. Frames pushed entirely before 0 are dropped,
    /// frames straddling 0 are clipped.
    pub fn bump(&mut self, ms: Ms) -> &mut Self {
        if ms == 0.0 || ms.is_nan() {
            return self;
        }

        self.items.retain_mut(|frame| {
            let start = frame.start + ms;
            if start + frame.duration <= 0.0 {
                return false;
            }
            if start < 0.0 {
                frame.set_duration(frame.duration + start);
                frame.set_start(0.0);
            } else {
                frame.set_start(start);
            }
            true
        });
        self
    }

    /// Up to `count` frames before `index`, nearest last
    pub fn precedents(&self, index: usize, count: usize) -> &[Frame] {
        let end = index.min(self.items.len());
        &self.items[end.saturating_sub(count)..end]
    }

    /// Up to `count` frames after `index`, nearest first
    pub fn succedents(&self, index: usize, count: usize) -> &[Frame] {
        let start = index.saturating_add(1).min(self.items.len());
        let end = start.saturating_add(count).min(self.items.len());
        &self.items[start..end]
    }

    /// Composites `other` over this list into a new list.
    ///
    /// Both lists are tiled to the later end, then every overlapping pair of frames
    /// yields one frame over their intersection unless the composite is fully
    /// transparent.
    pub fn merge<B: RasterBackend>(
        &self,
        other: &FrameList,
        backend: &B,
        width: u32,
        height: u32,
    ) -> Result<FrameList> {
        let end = self.end().max(other.end());
        let primary = self.fill_blanks(end);
        let secondary = other.fill_blanks(end);

        let mut buffer = backend.create_surface(width, height);
        let mut merged = FrameList::new();

        for lower in &primary {
            for index in find_in_range(&secondary.items, lower.start(), lower.end()) {
                let upper = &secondary.items[index];

                buffer.clear();
                buffer.draw_image(&lower.image)?;
                buffer.draw_image(&upper.image)?;

                if buffer.is_fully_transparent() {
                    continue;
                }

                let mut frame = Frame::spanning(
                    lower.start().max(upper.start()),
                    lower.end().min(upper.end()),
                )
                .with_image(buffer.to_image()?);
                frame.set_trimming(buffer.trimming());
                merged.push(frame);
            }
        }

        merged.arrange();
        tracing::debug!(frames = merged.len(), "merged frame lists");
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::Color;
    use crate::testing::{solid, TestBackend};

    fn spans(list: &FrameList) -> Vec<(Ms, Ms)> {
        list.iter().map(|f| (f.start(), f.duration())).collect()
    }

    #[test]
    fn test_frame_normalization() {
        let frame = Frame::new(-20.5, f64::NAN);
        assert_eq!(frame.start(), 0.0);
        assert_eq!(frame.duration(), 500.0);

        let frame = Frame::new(10.9, 0.0);
        assert_eq!((frame.start(), frame.duration()), (10.0, 1.0));
        assert!(frame.is_blank());
    }

    #[test]
    fn test_add_resolves_overlap() {
        let mut list = FrameList::new();
        let first = list.add(Frame::new(0.0, 500.0));
        list.add(Frame::new(500.0, 300.0));
        assert_eq!(list.item_at(250.0).map(|f| f.id()), Some(first));

        list.add(Frame::new(250.0, 100.0));
        assert_eq!(spans(&list), vec![(0.0, 250.0), (250.0, 100.0), (500.0, 300.0)]);
    }

    #[test]
    fn test_blank_synthesis() {
        let mut list = FrameList::new();
        list.add(Frame::new(0.0, 500.0));
        list.add(Frame::new(500.0, 300.0));

        assert!(list.item_at(900.0).is_none());
        assert!(list.fill_blanks(0.0).item_at(900.0).is_none());

        let blank = list.fill_blanks(1000.0);
        let frame = blank.item_at(900.0).unwrap();
        assert_eq!((frame.start(), frame.end()), (800.0, 1000.0));
        assert!(frame.is_blank());

        let frame = list.item_at_or_blank(900.0).unwrap();
        assert_eq!((frame.start(), frame.end()), (800.0, f64::INFINITY));

        let spans: Vec<(Ms, Ms)> = list
            .items_in_range_or_blank(400.0, 900.0)
            .iter()
            .map(|f| (f.start(), f.end()))
            .collect();
        assert_eq!(spans, vec![(0.0, 500.0), (500.0, 800.0), (800.0, f64::INFINITY)]);
    }

    #[test]
    fn test_fill_blanks_is_contiguous() {
        let mut list = FrameList::new();
        list.add(Frame::new(100.0, 100.0));
        list.add(Frame::new(200.0, 50.0));
        list.add(Frame::new(400.0, 50.0));

        let filled = list.fill_blanks(1000.0);
        assert_eq!(filled.start(), 0.0);
        assert_eq!(filled.end(), 1000.0);
        for pair in filled.as_slice().windows(2) {
            assert_eq!(pair[0].end(), pair[1].start());
        }
        assert_eq!(filled.len(), 6);
        for t in [0.0, 150.0, 249.0, 300.0, 999.0] {
            assert!(filled.item_at(t).is_some());
        }
    }

    #[test]
    fn test_fuse_consecutive_duplicates() {
        let image = ImageHandle::from_encoded(vec![7; 4]);
        let mut list: FrameList = [
            Frame::new(0.0, 100.0).with_image(image.clone()),
            Frame::new(100.0, 100.0).with_image(ImageHandle::from_encoded(vec![7; 4])),
            Frame::new(200.0, 100.0).with_image(ImageHandle::from_encoded(vec![8; 4])),
            Frame::new(400.0, 100.0).with_image(ImageHandle::from_encoded(vec![8; 4])),
        ]
        .into_iter()
        .collect();

        list.fuse_consecutive_duplicates();
        assert_eq!(spans(&list), vec![(0.0, 200.0), (200.0, 100.0), (400.0, 100.0)]);
    }

    #[test]
    fn test_bump() {
        let mut list: FrameList = [Frame::new(0.0, 100.0), Frame::new(100.0, 100.0), Frame::new(300.0, 50.0)]
            .into_iter()
            .collect();

        list.bump(-150.0);
        assert_eq!(spans(&list), vec![(0.0, 50.0), (150.0, 50.0)]);

        list.bump(50.0);
        assert_eq!(spans(&list), vec![(50.0, 50.0), (200.0, 50.0)]);
    }

    #[test]
    fn test_precedents_and_succedents() {
        let list: FrameList = (0..5).map(|i| Frame::new(i as f64 * 10.0, 10.0)).collect();
        let starts = |frames: &[Frame]| frames.iter().map(|f| f.start()).collect::<Vec<_>>();

        assert_eq!(starts(list.precedents(3, 2)), vec![10.0, 20.0]);
        assert_eq!(starts(list.precedents(1, 3)), vec![0.0]);
        assert_eq!(starts(list.succedents(3, 5)), vec![40.0]);
        assert!(list.succedents(4, 2).is_empty());
    }

    #[test]
    fn test_merge_superposes_cut_points() {
        let red = solid(4, 4, Color::rgba(255, 0, 0, 255));
        let blue = solid(4, 4, Color::rgba(0, 0, 255, 255));

        let primary: FrameList = [Frame::new(0.0, 300.0).with_image(red.clone())]
            .into_iter()
            .collect();
        let secondary: FrameList = [
            Frame::new(100.0, 100.0).with_image(blue.clone()),
            Frame::new(200.0, 200.0),
        ]
        .into_iter()
        .collect();

        let merged = primary.merge(&secondary, &TestBackend, 4, 4).unwrap();

        // [300, 400) composites two blank frames and is dropped
        assert_eq!(
            spans(&merged),
            vec![(0.0, 100.0), (100.0, 100.0), (200.0, 100.0)]
        );
        assert_eq!(merged.get(0).unwrap().image(), &red);
        assert_eq!(merged.get(1).unwrap().image(), &blue);
        assert_eq!(merged.get(2).unwrap().image(), &red);
    }

    #[test]
    fn test_merge_with_empty_list() {
        let red = solid(2, 2, Color::rgba(255, 0, 0, 255));
        let list: FrameList = [
            Frame::new(100.0, 100.0).with_image(red.clone()),
            Frame::new(200.0, 100.0).with_image(red.clone()),
        ]
        .into_iter()
        .collect();

        let merged = list.merge(&FrameList::new(), &TestBackend, 2, 2).unwrap();
        assert_eq!(spans(&merged), spans(&list));

        let merged = FrameList::new().merge(&list, &TestBackend, 2, 2).unwrap();
        assert_eq!(spans(&merged), spans(&list));
    }

    #[test]
    fn test_link_and_unlink() {
        let mut a = Frame::new(0.0, 10.0).with_image(ImageHandle::from_encoded(vec![1, 2]));
        let mut b = Frame::new(10.0, 10.0);
        b.link(&a);
        assert_eq!(a.image().id(), b.image().id());

        a.unlink();
        assert_ne!(a.image().id(), b.image().id());
        assert_eq!(a.src(), b.src());
    }
}
