//! Edit records for the command log
//!
//! Each record refers to layers by [`LayerKey`] and to items by [`ItemId`], and holds
//! whatever it took out of the document while that content is detached.

use crate::document::Document;
use crate::frame::{Frame, FrameList};
use crate::interval::{Adjustment, IntervalItem, ItemId, Resizable};
use crate::layer::{Layer, LayerKey};
use crate::log::Command;
use crate::raster::ImageHandle;
use crate::time::Ms;
use crate::transition::{Transition, TransitionList};
use crate::{Error, Result};

fn already(label: &str, state: &str) -> Error {
    Error::CommandState(format!("\"{label}\" is already {state}"))
}

fn require_layer(doc: &Document, layer: LayerKey) -> Result<usize> {
    doc.index_of(layer).ok_or(Error::LayerMissing(layer.get()))
}

/// A frame was added, possibly shortening neighbours
#[derive(Debug)]
pub struct FrameCreated {
    layer: LayerKey,
    id: ItemId,
    adjustments: Vec<Adjustment>,
    detached: Option<Frame>,
}

impl FrameCreated {
    pub fn new(layer: LayerKey, id: ItemId, adjustments: Vec<Adjustment>) -> Self {
        Self {
            layer,
            id,
            adjustments,
            detached: None,
        }
    }
}

impl Command for FrameCreated {
    fn label(&self) -> &str {
        "create frame"
    }

    fn undo(&mut self, doc: &mut Document) -> Result<()> {
        if self.detached.is_some() {
            return Err(already(self.label(), "undone"));
        }
        let frame = doc.remove_frame(self.layer, self.id)?;
        doc.adjust_frames(self.layer, &self.adjustments, true)?;
        self.detached = Some(frame);
        Ok(())
    }

    fn redo(&mut self, doc: &mut Document) -> Result<()> {
        require_layer(doc, self.layer)?;
        let frame = self
            .detached
            .take()
            .ok_or_else(|| already("create frame", "done"))?;
        doc.readd_frame(self.layer, frame)?;
        doc.adjust_frames(self.layer, &self.adjustments, false)
    }

    fn focus(&self) -> Option<(LayerKey, ItemId)> {
        Some((self.layer, self.id))
    }
}

/// A frame was removed
#[derive(Debug)]
pub struct FrameRemoved {
    layer: LayerKey,
    id: ItemId,
    detached: Option<Frame>,
}

impl FrameRemoved {
    /// Records the removal of `frame`, which the caller has already taken out
    pub fn new(layer: LayerKey, frame: Frame) -> Self {
        Self {
            layer,
            id: frame.id(),
            detached: Some(frame),
        }
    }
}

impl Command for FrameRemoved {
    fn label(&self) -> &str {
        "remove frame"
    }

    fn undo(&mut self, doc: &mut Document) -> Result<()> {
        require_layer(doc, self.layer)?;
        let frame = self
            .detached
            .take()
            .ok_or_else(|| already("remove frame", "undone"))?;
        doc.readd_frame(self.layer, frame)
    }

    fn redo(&mut self, doc: &mut Document) -> Result<()> {
        if self.detached.is_some() {
            return Err(already(self.label(), "done"));
        }
        self.detached = Some(doc.remove_frame(self.layer, self.id)?);
        Ok(())
    }

    fn focus(&self) -> Option<(LayerKey, ItemId)> {
        Some((self.layer, self.id))
    }
}

/// Span and content of a frame at one point in time
#[derive(Debug, Clone, PartialEq)]
pub struct FrameState {
    pub start: Ms,
    pub duration: Ms,
    pub image: ImageHandle,
}

impl FrameState {
    pub fn of(frame: &Frame) -> Self {
        Self {
            start: frame.start(),
            duration: frame.duration(),
            image: frame.image().clone(),
        }
    }

    fn apply(&self, frame: &mut Frame) {
        frame.set_start(self.start);
        frame.set_duration(self.duration);
        frame.set_image(self.image.clone());
    }
}

/// A frame's span or content was edited
#[derive(Debug)]
pub struct FrameEdited {
    layer: LayerKey,
    id: ItemId,
    before: FrameState,
    after: FrameState,
    done: bool,
}

impl FrameEdited {
    pub fn new(layer: LayerKey, id: ItemId, before: FrameState, after: FrameState) -> Self {
        Self {
            layer,
            id,
            before,
            after,
            done: true,
        }
    }
}

impl Command for FrameEdited {
    fn label(&self) -> &str {
        "edit frame"
    }

    fn undo(&mut self, doc: &mut Document) -> Result<()> {
        if !self.done {
            return Err(already(self.label(), "undone"));
        }
        doc.edit_frame(self.layer, self.id, |frame| self.before.apply(frame))?;
        self.done = false;
        Ok(())
    }

    fn redo(&mut self, doc: &mut Document) -> Result<()> {
        if self.done {
            return Err(already(self.label(), "done"));
        }
        doc.edit_frame(self.layer, self.id, |frame| self.after.apply(frame))?;
        self.done = true;
        Ok(())
    }

    fn focus(&self) -> Option<(LayerKey, ItemId)> {
        Some((self.layer, self.id))
    }
}

/// A transition was added
#[derive(Debug)]
pub struct TransitionCreated {
    layer: LayerKey,
    id: ItemId,
    detached: Option<Transition>,
}

impl TransitionCreated {
    pub fn new(layer: LayerKey, id: ItemId) -> Self {
        Self {
            layer,
            id,
            detached: None,
        }
    }
}

impl Command for TransitionCreated {
    fn label(&self) -> &str {
        "create transition"
    }

    fn undo(&mut self, doc: &mut Document) -> Result<()> {
        if self.detached.is_some() {
            return Err(already(self.label(), "undone"));
        }
        self.detached = Some(doc.remove_transition(self.layer, self.id)?);
        Ok(())
    }

    fn redo(&mut self, doc: &mut Document) -> Result<()> {
        require_layer(doc, self.layer)?;
        let transition = self
            .detached
            .take()
            .ok_or_else(|| already("create transition", "done"))?;
        doc.readd_transition(self.layer, transition)
    }
}

/// A transition was removed
#[derive(Debug)]
pub struct TransitionRemoved {
    layer: LayerKey,
    id: ItemId,
    detached: Option<Transition>,
}

impl TransitionRemoved {
    pub fn new(layer: LayerKey, transition: Transition) -> Self {
        Self {
            layer,
            id: transition.id(),
            detached: Some(transition),
        }
    }
}

impl Command for TransitionRemoved {
    fn label(&self) -> &str {
        "remove transition"
    }

    fn undo(&mut self, doc: &mut Document) -> Result<()> {
        require_layer(doc, self.layer)?;
        let transition = self
            .detached
            .take()
            .ok_or_else(|| already("remove transition", "undone"))?;
        doc.readd_transition(self.layer, transition)
    }

    fn redo(&mut self, doc: &mut Document) -> Result<()> {
        if self.detached.is_some() {
            return Err(already(self.label(), "done"));
        }
        self.detached = Some(doc.remove_transition(self.layer, self.id)?);
        Ok(())
    }
}

/// A layer was added at `index`
#[derive(Debug)]
pub struct LayerCreated {
    key: LayerKey,
    index: usize,
    detached: Option<Layer>,
}

impl LayerCreated {
    pub fn new(key: LayerKey, index: usize) -> Self {
        Self {
            key,
            index,
            detached: None,
        }
    }
}

impl Command for LayerCreated {
    fn label(&self) -> &str {
        "create layer"
    }

    fn undo(&mut self, doc: &mut Document) -> Result<()> {
        if self.detached.is_some() {
            return Err(already(self.label(), "undone"));
        }
        let index = require_layer(doc, self.key)?;
        self.detached = Some(doc.delete_layer(index)?);
        Ok(())
    }

    fn redo(&mut self, doc: &mut Document) -> Result<()> {
        let layer = self
            .detached
            .take()
            .ok_or_else(|| already("create layer", "done"))?;
        doc.insert_layer(layer, self.index);
        Ok(())
    }
}

/// A layer was deleted from `index`
#[derive(Debug)]
pub struct LayerRemoved {
    key: LayerKey,
    index: usize,
    detached: Option<Layer>,
}

impl LayerRemoved {
    pub fn new(layer: Layer, index: usize) -> Self {
        Self {
            key: layer.key(),
            index,
            detached: Some(layer),
        }
    }
}

impl Command for LayerRemoved {
    fn label(&self) -> &str {
        "remove layer"
    }

    fn undo(&mut self, doc: &mut Document) -> Result<()> {
        let layer = self
            .detached
            .take()
            .ok_or_else(|| already("remove layer", "undone"))?;
        doc.insert_layer(layer, self.index);
        Ok(())
    }

    fn redo(&mut self, doc: &mut Document) -> Result<()> {
        if self.detached.is_some() {
            return Err(already(self.label(), "done"));
        }
        let index = require_layer(doc, self.key)?;
        self.detached = Some(doc.delete_layer(index)?);
        Ok(())
    }
}

/// Two layers traded places
#[derive(Debug)]
pub struct LayersSwapped {
    layers: (LayerKey, LayerKey),
    done: bool,
}

impl LayersSwapped {
    pub fn new(a: LayerKey, b: LayerKey) -> Self {
        Self {
            layers: (a, b),
            done: true,
        }
    }

    fn swap(&self, doc: &mut Document) -> Result<()> {
        let a = require_layer(doc, self.layers.0)?;
        let b = require_layer(doc, self.layers.1)?;
        doc.swap_layers(a, b)
    }
}

impl Command for LayersSwapped {
    fn label(&self) -> &str {
        "swap layers"
    }

    fn undo(&mut self, doc: &mut Document) -> Result<()> {
        if !self.done {
            return Err(already(self.label(), "undone"));
        }
        self.swap(doc)?;
        self.done = false;
        Ok(())
    }

    fn redo(&mut self, doc: &mut Document) -> Result<()> {
        if self.done {
            return Err(already(self.label(), "done"));
        }
        self.swap(doc)?;
        self.done = true;
        Ok(())
    }
}

/// A layer was merged into another: the primary received the merged frames and the
/// secondary was deleted
#[derive(Debug)]
pub struct LayersMerged {
    primary: LayerKey,
    secondary: LayerKey,
    secondary_index: usize,
    /// The primary's frames from before the merge while the merge is applied,
    /// the merged frames while it is undone
    frames: Option<FrameList>,
    detached: Option<Layer>,
}

impl LayersMerged {
    pub fn new(
        primary: LayerKey,
        previous_frames: FrameList,
        secondary: Layer,
        secondary_index: usize,
    ) -> Self {
        Self {
            primary,
            secondary: secondary.key(),
            secondary_index,
            frames: Some(previous_frames),
            detached: Some(secondary),
        }
    }
}

impl Command for LayersMerged {
    fn label(&self) -> &str {
        "merge layers"
    }

    fn undo(&mut self, doc: &mut Document) -> Result<()> {
        require_layer(doc, self.primary)?;
        let (Some(previous), Some(secondary)) = (self.frames.take(), self.detached.take()) else {
            return Err(already(self.label(), "undone"));
        };
        self.frames = Some(doc.replace_frames(self.primary, previous)?);
        doc.insert_layer(secondary, self.secondary_index);
        Ok(())
    }

    fn redo(&mut self, doc: &mut Document) -> Result<()> {
        if self.detached.is_some() {
            return Err(already(self.label(), "done"));
        }
        let index = require_layer(doc, self.secondary)?;
        require_layer(doc, self.primary)?;
        let merged = self
            .frames
            .take()
            .ok_or_else(|| already("merge layers", "done"))?;
        self.frames = Some(doc.replace_frames(self.primary, merged)?);
        self.detached = Some(doc.delete_layer(index)?);
        Ok(())
    }
}

/// A whole list that was swapped out of a layer
#[derive(Debug)]
pub enum StoredList {
    Frames(FrameList),
    Transitions(TransitionList),
}

/// A layer's frame or transition list was replaced wholesale
#[derive(Debug)]
pub struct ListReplaced {
    layer: LayerKey,
    stored: Option<StoredList>,
    done: bool,
}

impl ListReplaced {
    /// Records a replacement given the list it replaced
    pub fn new(layer: LayerKey, previous: StoredList) -> Self {
        Self {
            layer,
            stored: Some(previous),
            done: true,
        }
    }

    fn exchange(&mut self, doc: &mut Document) -> Result<()> {
        require_layer(doc, self.layer)?;
        let stored = self
            .stored
            .take()
            .ok_or_else(|| Error::CommandState("replaced list is missing".into()))?;
        self.stored = Some(match stored {
            StoredList::Frames(list) => StoredList::Frames(doc.replace_frames(self.layer, list)?),
            StoredList::Transitions(list) => {
                StoredList::Transitions(doc.replace_transitions(self.layer, list)?)
            }
        });
        Ok(())
    }
}

impl Command for ListReplaced {
    fn label(&self) -> &str {
        "replace list"
    }

    fn undo(&mut self, doc: &mut Document) -> Result<()> {
        if !self.done {
            return Err(already(self.label(), "undone"));
        }
        self.exchange(doc)?;
        self.done = false;
        Ok(())
    }

    fn redo(&mut self, doc: &mut Document) -> Result<()> {
        if self.done {
            return Err(already(self.label(), "done"));
        }
        self.exchange(doc)?;
        self.done = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transition::Property;

    fn spans(doc: &Document, index: usize) -> Vec<(Ms, Ms)> {
        doc.layer(index)
            .unwrap()
            .frames()
            .iter()
            .map(|f| (f.start(), f.duration()))
            .collect()
    }

    #[test]
    fn test_frame_created_restores_neighbours() {
        let mut doc = Document::new(1, 1);
        let key = doc.add_layer(0, Some(0.0));
        let (id, adjustments) = doc.add_frame(key, Frame::new(200.0, 100.0)).unwrap();
        let mut command = FrameCreated::new(key, id, adjustments);

        command.undo(&mut doc).unwrap();
        assert_eq!(spans(&doc, 0), vec![(0.0, 500.0)]);
        assert!(matches!(command.undo(&mut doc), Err(Error::CommandState(_))));

        command.redo(&mut doc).unwrap();
        assert_eq!(spans(&doc, 0), vec![(0.0, 200.0), (200.0, 100.0)]);
        assert!(matches!(command.redo(&mut doc), Err(Error::CommandState(_))));
    }

    #[test]
    fn test_frame_removed() {
        let mut doc = Document::new(1, 1);
        let key = doc.add_layer(0, Some(0.0));
        let id = doc.layer(0).unwrap().frames().get(0).unwrap().id();
        let frame = doc.remove_frame(key, id).unwrap();
        let mut command = FrameRemoved::new(key, frame);

        command.undo(&mut doc).unwrap();
        assert_eq!(spans(&doc, 0), vec![(0.0, 500.0)]);
        command.redo(&mut doc).unwrap();
        assert!(doc.layer(0).unwrap().frames().is_empty());
    }

    #[test]
    fn test_frame_edited() {
        let mut doc = Document::new(1, 1);
        let key = doc.add_layer(0, Some(0.0));
        let id = doc.layer(0).unwrap().frames().get(0).unwrap().id();

        let before = FrameState::of(doc.layer(0).unwrap().frames().find(id).unwrap());
        let image = ImageHandle::from_encoded(vec![9; 4]);
        doc.edit_frame(key, id, |frame| {
            frame.set_duration(100.0);
            frame.set_image(image.clone());
        })
        .unwrap();
        let after = FrameState::of(doc.layer(0).unwrap().frames().find(id).unwrap());
        let mut command = FrameEdited::new(key, id, before, after);

        command.undo(&mut doc).unwrap();
        let frame = doc.layer(0).unwrap().frames().find(id).unwrap();
        assert_eq!(frame.duration(), 500.0);
        assert!(frame.image().is_blank());

        command.redo(&mut doc).unwrap();
        let frame = doc.layer(0).unwrap().frames().find(id).unwrap();
        assert_eq!(frame.image(), &image);
    }

    #[test]
    fn test_layer_records() {
        let mut doc = Document::new(1, 1);
        let a = doc.add_layer(0, None);
        let b = doc.add_layer(1, None);

        let mut created = LayerCreated::new(b, 1);
        created.undo(&mut doc).unwrap();
        assert_eq!(doc.len(), 1);
        created.redo(&mut doc).unwrap();
        assert_eq!(doc.index_of(b), Some(1));

        doc.swap_layers(0, 1).unwrap();
        let mut swapped = LayersSwapped::new(a, b);
        swapped.undo(&mut doc).unwrap();
        assert_eq!(doc.index_of(a), Some(0));
        swapped.redo(&mut doc).unwrap();
        assert_eq!(doc.index_of(a), Some(1));

        let index = doc.index_of(a).unwrap();
        let layer = doc.delete_layer(index).unwrap();
        let mut removed = LayerRemoved::new(layer, index);
        removed.undo(&mut doc).unwrap();
        assert_eq!(doc.index_of(a), Some(1));
        removed.redo(&mut doc).unwrap();
        assert_eq!(doc.index_of(a), None);
    }

    #[test]
    fn test_layers_merged() {
        let mut doc = Document::new(1, 1);
        let lower = doc.add_layer(0, Some(0.0));
        let upper = doc.add_layer(1, Some(1000.0));

        let merged: FrameList = [Frame::new(0.0, 1500.0)].into_iter().collect();
        let previous = doc.replace_frames(lower, merged).unwrap();
        let secondary = doc.delete_layer(1).unwrap();
        let mut command = LayersMerged::new(lower, previous, secondary, 1);

        command.undo(&mut doc).unwrap();
        assert_eq!(doc.len(), 2);
        assert_eq!(doc.index_of(upper), Some(1));
        assert_eq!(spans(&doc, 0), vec![(0.0, 500.0)]);
        assert!(command.undo(&mut doc).is_err());

        command.redo(&mut doc).unwrap();
        assert_eq!(doc.len(), 1);
        assert_eq!(spans(&doc, 0), vec![(0.0, 1500.0)]);
    }

    #[test]
    fn test_list_replaced_and_transitions() {
        let mut doc = Document::new(1, 1);
        let key = doc.add_layer(0, None);
        let id = doc
            .add_transition(key, Transition::new(Property::Alpha, 0.0, 10.0, 0.0))
            .unwrap();
        let mut created = TransitionCreated::new(key, id);
        created.undo(&mut doc).unwrap();
        assert!(doc.layer(0).unwrap().transitions().is_empty());
        created.redo(&mut doc).unwrap();

        let previous = doc.replace_transitions(key, TransitionList::new()).unwrap();
        let mut replaced = ListReplaced::new(key, StoredList::Transitions(previous));
        replaced.undo(&mut doc).unwrap();
        assert_eq!(doc.layer(0).unwrap().transitions().len(), 1);
        replaced.redo(&mut doc).unwrap();
        assert!(doc.layer(0).unwrap().transitions().is_empty());
        replaced.undo(&mut doc).unwrap();

        let transition = doc.remove_transition(key, id).unwrap();
        let mut removed = TransitionRemoved::new(key, transition);
        removed.undo(&mut doc).unwrap();
        assert_eq!(doc.layer(0).unwrap().transitions().len(), 1);
    }
}
