//! The ordered layer stack and the structural edits made to it

use crate::frame::{Frame, FrameList};
use crate::interval::{Adjustment, IntervalItem, ItemId};
use crate::layer::{Layer, LayerKey};
use crate::time::{Ms, DEFAULT_FRAME_DURATION};
use crate::transition::{Transition, TransitionList};
use crate::{Error, Result};
use std::fmt;

/// Finds layers by stable key
pub trait LayerLookup {
    fn layer_by_key(&self, key: LayerKey) -> Option<&Layer>;
}

impl LayerLookup for Vec<Layer> {
    fn layer_by_key(&self, key: LayerKey) -> Option<&Layer> {
        self.iter().find(|layer| layer.key() == key)
    }
}

/// Receives a notification for every structural change of the document.
///
/// Notifications are informational; the document never depends on them.
#[allow(unused_variables)]
pub trait TimelineObserver {
    fn add_layer(&mut self, layer: &Layer, index: usize) {}

    fn remove_layer(&mut self, layer: LayerKey) {}

    fn rearrange_layers(&mut self, order: &[LayerKey]) {}

    fn add_frame(&mut self, layer: LayerKey, frame: &Frame) {}

    fn remove_frame(&mut self, layer: LayerKey, frame: ItemId) {}

    fn rearrange_frames(&mut self, layer: LayerKey) {}

    fn reimage_frame(&mut self, layer: LayerKey, frame: &Frame) {}
}

/// Observer that ignores everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl TimelineObserver for NullObserver {}

/// Canvas size and layers in paint order
pub struct Document {
    width: u32,
    height: u32,
    layers: Vec<Layer>,
    observer: Box<dyn TimelineObserver>,
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("layers", &self.layers)
            .finish_non_exhaustive()
    }
}

impl LayerLookup for Document {
    fn layer_by_key(&self, key: LayerKey) -> Option<&Layer> {
        self.layers.iter().find(|layer| layer.key() == key)
    }
}

impl Document {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            layers: Vec::new(),
            observer: Box::new(NullObserver),
        }
    }

    pub fn with_observer(mut self, observer: impl TimelineObserver + 'static) -> Self {
        self.observer = Box::new(observer);
        self
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn layer(&self, index: usize) -> Result<&Layer> {
        self.layers.get(index).ok_or(Error::LayerIndex(index))
    }

    pub fn layer_mut(&mut self, index: usize) -> Result<&mut Layer> {
        self.layers.get_mut(index).ok_or(Error::LayerIndex(index))
    }

    /// Current position of the layer with the given key
    pub fn index_of(&self, key: LayerKey) -> Option<usize> {
        self.layers.iter().position(|layer| layer.key() == key)
    }

    fn entry(&mut self, key: LayerKey) -> Result<(&mut Layer, &mut dyn TimelineObserver)> {
        let layer = self
            .layers
            .iter_mut()
            .find(|layer| layer.key() == key)
            .ok_or(Error::LayerMissing(key.get()))?;
        Ok((layer, self.observer.as_mut()))
    }

    fn layer_order(&self) -> Vec<LayerKey> {
        self.layers.iter().map(Layer::key).collect()
    }

    /// Creates an empty layer at `index` (clamped), optionally with a starter frame at `init_frame_at`
    pub fn add_layer(&mut self, index: usize, init_frame_at: Option<Ms>) -> LayerKey {
        let mut layer = Layer::new();
        if let Some(start) = init_frame_at {
            layer
                .frames_mut()
                .add(Frame::new(start, DEFAULT_FRAME_DURATION));
        }
        let key = layer.key();
        self.insert_layer(layer, index);
        key
    }

    /// Puts an existing layer at `index` (clamped), returning the index used
    pub fn insert_layer(&mut self, layer: Layer, index: usize) -> usize {
        let index = index.min(self.layers.len());
        self.observer.add_layer(&layer, index);
        for frame in layer.frames() {
            self.observer.add_frame(layer.key(), frame);
        }
        tracing::debug!(layer = %layer.key(), index, "inserted layer");
        self.layers.insert(index, layer);
        index
    }

    pub fn delete_layer(&mut self, index: usize) -> Result<Layer> {
        if index >= self.layers.len() {
            return Err(Error::LayerIndex(index));
        }
        let layer = self.layers.remove(index);
        self.observer.remove_layer(layer.key());
        tracing::debug!(layer = %layer.key(), index, "deleted layer");
        Ok(layer)
    }

    pub fn swap_layers(&mut self, a: usize, b: usize) -> Result<()> {
        let len = self.layers.len();
        for index in [a, b] {
            if index >= len {
                return Err(Error::LayerIndex(index));
            }
        }
        self.layers.swap(a, b);
        let order = self.layer_order();
        self.observer.rearrange_layers(&order);
        Ok(())
    }

    /// Moves a layer to `to`, clamped to the last position
    pub fn move_layer(&mut self, from: usize, to: usize) -> Result<()> {
        if from >= self.layers.len() {
            return Err(Error::LayerIndex(from));
        }
        let layer = self.layers.remove(from);
        let to = to.min(self.layers.len());
        self.layers.insert(to, layer);
        let order = self.layer_order();
        self.observer.rearrange_layers(&order);
        Ok(())
    }

    /// Adds a frame, shortening neighbours it overlaps
    pub fn add_frame(&mut self, layer: LayerKey, frame: Frame) -> Result<(ItemId, Vec<Adjustment>)> {
        let (target, observer) = self.entry(layer)?;
        observer.add_frame(layer, &frame);
        let (id, adjustments) = target.frames_mut().add_tracked(frame);
        observer.rearrange_frames(layer);
        Ok((id, adjustments))
    }

    pub fn remove_frame(&mut self, layer: LayerKey, id: ItemId) -> Result<Frame> {
        let (target, observer) = self.entry(layer)?;
        let frame = target
            .frames_mut()
            .remove_id(id)
            .ok_or(Error::ItemNotFound(id))?;
        observer.remove_frame(layer, id);
        Ok(frame)
    }

    /// Restores a removed frame without resolving overlaps
    pub fn readd_frame(&mut self, layer: LayerKey, frame: Frame) -> Result<()> {
        let (target, observer) = self.entry(layer)?;
        observer.add_frame(layer, &frame);
        target.frames_mut().readd(frame);
        observer.rearrange_frames(layer);
        Ok(())
    }

    pub fn edit_frame<R>(
        &mut self,
        layer: LayerKey,
        id: ItemId,
        f: impl FnOnce(&mut Frame) -> R,
    ) -> Result<R> {
        let (target, observer) = self.entry(layer)?;
        let result = target
            .frames_mut()
            .edit(id, f)
            .ok_or(Error::ItemNotFound(id))?;
        if let Some(frame) = target.frames().find(id) {
            observer.reimage_frame(layer, frame);
        }
        observer.rearrange_frames(layer);
        Ok(result)
    }

    /// Reapplies (`revert = false`) or reverts span changes made by arranging
    pub fn adjust_frames(&mut self, layer: LayerKey, adjustments: &[Adjustment], revert: bool) -> Result<()> {
        if adjustments.is_empty() {
            return Ok(());
        }
        let (target, observer) = self.entry(layer)?;
        target.frames_mut().apply_adjustments(adjustments, revert);
        observer.rearrange_frames(layer);
        Ok(())
    }

    pub fn add_transition(&mut self, layer: LayerKey, transition: Transition) -> Result<ItemId> {
        let (target, _) = self.entry(layer)?;
        Ok(target.transitions_mut().add(transition))
    }

    pub fn readd_transition(&mut self, layer: LayerKey, transition: Transition) -> Result<()> {
        let (target, _) = self.entry(layer)?;
        target.transitions_mut().readd(transition);
        Ok(())
    }

    pub fn remove_transition(&mut self, layer: LayerKey, id: ItemId) -> Result<Transition> {
        let (target, _) = self.entry(layer)?;
        target
            .transitions_mut()
            .remove_id(id)
            .ok_or(Error::ItemNotFound(id))
    }

    /// Swaps in a new frame list, returning the previous one
    pub fn replace_frames(&mut self, layer: LayerKey, frames: FrameList) -> Result<FrameList> {
        let (target, observer) = self.entry(layer)?;
        let previous = target.assign_frames(frames);
        for frame in &previous {
            observer.remove_frame(layer, frame.id());
        }
        for frame in target.frames() {
            observer.add_frame(layer, frame);
        }
        observer.rearrange_frames(layer);
        Ok(previous)
    }

    pub fn replace_transitions(
        &mut self,
        layer: LayerKey,
        transitions: TransitionList,
    ) -> Result<TransitionList> {
        let (target, _) = self.entry(layer)?;
        Ok(target.assign_transitions(transitions))
    }

    /// Every frame of every layer, with the layer's index
    pub fn all_frames(&self) -> impl Iterator<Item = (usize, &Frame)> + '_ {
        self.layers
            .iter()
            .enumerate()
            .flat_map(|(index, layer)| layer.frames().iter().map(move |frame| (index, frame)))
    }

    /// Latest end over all layers, ignoring layers that may end prematurely
    pub fn true_end(&self) -> Ms {
        self.layers.iter().map(Layer::end).fold(0.0, f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interval::Resizable;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Recorder(Rc<RefCell<Vec<String>>>);

    impl TimelineObserver for Recorder {
        fn add_layer(&mut self, _layer: &Layer, index: usize) {
            self.0.borrow_mut().push(format!("add_layer {index}"));
        }

        fn remove_layer(&mut self, _layer: LayerKey) {
            self.0.borrow_mut().push("remove_layer".to_string());
        }

        fn add_frame(&mut self, _layer: LayerKey, frame: &Frame) {
            self.0.borrow_mut().push(format!("add_frame {}", frame.start()));
        }

        fn remove_frame(&mut self, _layer: LayerKey, _frame: ItemId) {
            self.0.borrow_mut().push("remove_frame".to_string());
        }
    }

    #[test]
    fn test_layer_positions() {
        let mut doc = Document::new(10, 10);
        let a = doc.add_layer(0, None);
        let b = doc.add_layer(0, None);
        let c = doc.add_layer(99, None);

        assert_eq!(doc.index_of(b), Some(0));
        assert_eq!(doc.index_of(a), Some(1));
        assert_eq!(doc.index_of(c), Some(2));

        doc.swap_layers(0, 2).unwrap();
        assert_eq!(doc.index_of(c), Some(0));

        doc.move_layer(0, 10).unwrap();
        assert_eq!(doc.index_of(c), Some(2));

        assert!(matches!(doc.swap_layers(0, 3), Err(Error::LayerIndex(3))));
        let removed = doc.delete_layer(1).unwrap();
        assert_eq!(removed.key(), b);
        assert_eq!(doc.len(), 2);
    }

    #[test]
    fn test_frame_edits() {
        let mut doc = Document::new(10, 10);
        let key = doc.add_layer(0, Some(0.0));
        let (id, adjustments) = doc.add_frame(key, Frame::new(200.0, 500.0)).unwrap();
        assert_eq!(adjustments.len(), 1);
        assert_eq!(doc.layer(0).unwrap().frames().len(), 2);

        let frame = doc.remove_frame(key, id).unwrap();
        doc.adjust_frames(key, &adjustments, true).unwrap();
        assert_eq!(doc.layer(0).unwrap().frames().end(), 500.0);

        doc.readd_frame(key, frame).unwrap();
        doc.edit_frame(key, id, |frame| frame.set_start(1000.0)).unwrap();
        assert_eq!(doc.true_end(), 1500.0);

        assert!(matches!(
            doc.remove_frame(key, ItemId::next()),
            Err(Error::ItemNotFound(_))
        ));
    }

    #[test]
    fn test_observer_notifications() {
        let events = Rc::new(RefCell::new(Vec::new()));
        let mut doc = Document::new(10, 10).with_observer(Recorder(events.clone()));

        let key = doc.add_layer(0, Some(100.0));
        let (id, _) = doc.add_frame(key, Frame::new(600.0, 10.0)).unwrap();
        doc.remove_frame(key, id).unwrap();
        doc.delete_layer(0).unwrap();

        assert_eq!(
            *events.borrow(),
            vec![
                "add_layer 0",
                "add_frame 100",
                "add_frame 600",
                "remove_frame",
                "remove_layer"
            ]
        );
    }

    #[test]
    fn test_true_end() {
        let mut doc = Document::new(10, 10);
        assert_eq!(doc.true_end(), 0.0);

        let a = doc.add_layer(0, Some(0.0));
        doc.add_layer(1, Some(2000.0));
        assert_eq!(doc.true_end(), 2500.0);

        doc.layer_mut(1).unwrap().can_end_prematurely = true;
        assert_eq!(doc.true_end(), 500.0);

        assert_eq!(doc.all_frames().count(), 2);
        assert_eq!(doc.index_of(a), Some(0));
    }
}
