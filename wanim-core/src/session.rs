//! Editing context: a document, its command log, settings and the view cursor
//!
//! Every mutating operation here records a command so it can be undone.

use crate::commands::{
    FrameCreated, FrameEdited, FrameRemoved, FrameState, LayerCreated, LayerRemoved,
    LayersMerged, LayersSwapped, ListReplaced, StoredList, TransitionCreated, TransitionRemoved,
};
use crate::compositor::Compositor;
use crate::document::Document;
use crate::frame::Frame;
use crate::interval::{IntervalItem, ItemId, Resizable};
use crate::layer::{Layer, LayerKey};
use crate::log::{Command, CommandLog, GroupCommand};
use crate::raster::{ImageHandle, RasterBackend, Surface};
use crate::settings::Settings;
use crate::time::{sanitize_start, Ms};
use crate::transition::{Transition, TransitionList};
use crate::{Error, Result};

/// Changes to apply to a frame. `None` fields are left alone.
#[derive(Debug, Clone, Default)]
pub struct FrameEdit {
    pub start: Option<Ms>,
    pub duration: Option<Ms>,
    pub image: Option<ImageHandle>,
}

#[derive(Debug)]
pub struct Session {
    document: Document,
    log: CommandLog,
    settings: Settings,
    ms: Ms,
    layer_id: usize,
    /// Commands collected by an open `group`
    pending: Option<Vec<Box<dyn Command>>>,
}

impl Session {
    /// Starts an empty document sized by `settings`
    pub fn new(settings: Settings) -> Self {
        let document = Document::new(settings.width, settings.height);
        Self::with_document(document, settings)
    }

    pub fn with_document(document: Document, settings: Settings) -> Self {
        Self {
            document,
            log: CommandLog::new(settings.log_length_limit),
            settings,
            ms: 0.0,
            layer_id: 0,
            pending: None,
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn into_document(self) -> Document {
        self.document
    }

    pub fn log(&self) -> &CommandLog {
        &self.log
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn ms(&self) -> Ms {
        self.ms
    }

    /// Moves the time cursor. Non-finite values are ignored.
    pub fn set_ms(&mut self, ms: Ms) {
        if !ms.is_finite() {
            return;
        }
        self.ms = sanitize_start(ms);
    }

    pub fn layer_id(&self) -> usize {
        self.layer_id
    }

    /// Selects a layer, clamped to the existing ones
    pub fn set_layer_id(&mut self, layer_id: usize) {
        self.layer_id = layer_id.min(self.document.len().saturating_sub(1));
    }

    pub fn current_layer(&self) -> Option<&Layer> {
        self.document.layers().get(self.layer_id)
    }

    fn current_key(&self) -> Result<LayerKey> {
        self.current_layer()
            .map(Layer::key)
            .ok_or(Error::LayerIndex(self.layer_id))
    }

    fn key_of(&self, index: usize) -> Result<LayerKey> {
        Ok(self.document.layer(index)?.key())
    }

    /// Frame of the current layer under the cursor
    pub fn current_frame(&self) -> Option<&Frame> {
        self.current_layer()?.frames().item_at(self.ms)
    }

    /// Like `current_frame`, but a gap under the cursor yields a blank frame spanning it
    pub fn current_frame_or_blank(&self) -> Option<Frame> {
        self.current_layer()?.frames().item_at_or_blank(self.ms)
    }

    /// Moves the cursor to the end of the current frame or gap
    pub fn frame_next(&mut self) -> bool {
        let Some(end) = self.current_frame_or_blank().map(|frame| frame.end()) else {
            return false;
        };
        if !end.is_finite() {
            return false;
        }
        self.set_ms(end);
        true
    }

    /// Moves the cursor to the start of the frame or gap before the current one
    pub fn frame_prev(&mut self) -> bool {
        let Some(layer) = self.current_layer() else {
            return false;
        };
        let Some(current) = layer.frames().item_at_or_blank(self.ms) else {
            return false;
        };
        let previous = layer
            .frames()
            .fill_blanks(f64::INFINITY)
            .item_at(current.start() - 1.0)
            .map_or(0.0, |frame| frame.start());
        self.set_ms(previous);
        true
    }

    fn record(&mut self, command: Box<dyn Command>) {
        match &mut self.pending {
            Some(pending) => pending.push(command),
            None => self.log.add(command),
        }
    }

    /// Runs `f`, logging every command it records as one undoable unit.
    ///
    /// When `f` fails, its recorded commands are undone and nothing is logged.
    /// Nested groups merge into the outermost one.
    pub fn group<R>(
        &mut self,
        label: impl Into<String>,
        f: impl FnOnce(&mut Self) -> Result<R>,
    ) -> Result<R> {
        if self.pending.is_some() {
            return f(self);
        }

        self.pending = Some(Vec::new());
        let result = f(self);
        let members = self.pending.take().unwrap_or_default();

        match result {
            Ok(value) => {
                if !members.is_empty() {
                    self.log.add(Box::new(GroupCommand::new(label, members)));
                }
                Ok(value)
            }
            Err(err) => {
                let label = label.into();
                for mut member in members.into_iter().rev() {
                    if let Err(rollback) = member.undo(&mut self.document) {
                        tracing::warn!(group = %label, %rollback, "failed to roll back command");
                    }
                }
                Err(err)
            }
        }
    }

    /// Removes the frame under the cursor. Returns `false` when there is none.
    pub fn delete_current_frame(&mut self) -> Result<bool> {
        let Some(id) = self.current_frame().map(Frame::id) else {
            return Ok(false);
        };
        let key = self.current_key()?;
        let frame = self.document.remove_frame(key, id)?;
        self.record(Box::new(FrameRemoved::new(key, frame)));
        Ok(true)
    }

    fn create_frame(&mut self, key: LayerKey, frame: Frame) -> Result<ItemId> {
        let (id, adjustments) = self.document.add_frame(key, frame)?;
        self.record(Box::new(FrameCreated::new(key, id, adjustments)));
        Ok(id)
    }

    /// Stores `image` at the cursor on the current layer.
    ///
    /// An existing frame is reimaged. In a gap between frames, a gap longer than
    /// the minimum outlier duration gets a new frame of the default duration while a
    /// shorter one is filled entirely. Past the last frame a new frame is appended.
    pub fn record_frame(&mut self, image: ImageHandle) -> Result<ItemId> {
        let key = self.current_key()?;

        if let Some(id) = self.current_frame().map(Frame::id) {
            let edit = FrameEdit {
                image: Some(image),
                ..FrameEdit::default()
            };
            self.edit_frame_by_key(key, id, edit)?;
            return Ok(id);
        }

        let default_duration = self.settings.default_frame_duration;
        let gap = self
            .current_layer()
            .and_then(|layer| layer.frames().fill_blanks(0.0).item_at(self.ms).cloned());

        let frame = match gap {
            Some(gap) if gap.duration() > self.settings.min_outlier_duration() => Frame::new(
                self.ms.min(gap.end() - default_duration),
                default_duration,
            ),
            Some(gap) => Frame::spanning(gap.start(), gap.end()),
            None => Frame::new(self.ms, default_duration),
        };
        self.create_frame(key, frame.with_image(image))
    }

    /// Pastes `image` over the current layer's content at the cursor and records the
    /// result with [`Session::record_frame`]
    pub fn import_image<B: RasterBackend>(
        &mut self,
        compositor: &Compositor<B>,
        image: &ImageHandle,
    ) -> Result<ItemId> {
        let underneath = self
            .current_layer()
            .ok_or(Error::LayerIndex(self.layer_id))?
            .frames()
            .image_at(self.ms);

        let mut canvas = compositor
            .backend()
            .create_surface(self.document.width(), self.document.height());
        canvas.clear();
        canvas.draw_image(&underneath)?;
        canvas.draw_image(image)?;
        self.record_frame(canvas.to_image()?)
    }

    /// Creates a layer at `index`, optionally with a starter frame at `init_frame_at`
    pub fn add_layer(&mut self, index: usize, init_frame_at: Option<Ms>) -> LayerKey {
        let key = self.document.add_layer(index, init_frame_at);
        let index = self.document.index_of(key).unwrap_or(index);
        self.record(Box::new(LayerCreated::new(key, index)));
        key
    }

    pub fn delete_layer(&mut self, index: usize) -> Result<()> {
        let layer = self.document.delete_layer(index)?;
        self.record(Box::new(LayerRemoved::new(layer, index)));
        self.set_layer_id(self.layer_id);
        Ok(())
    }

    pub fn swap_layers(&mut self, a: usize, b: usize) -> Result<()> {
        let (key_a, key_b) = (self.key_of(a)?, self.key_of(b)?);
        self.document.swap_layers(a, b)?;
        self.record(Box::new(LayersSwapped::new(key_a, key_b)));
        Ok(())
    }

    pub fn add_frame(&mut self, layer: usize, frame: Frame) -> Result<ItemId> {
        let key = self.key_of(layer)?;
        self.create_frame(key, frame)
    }

    pub fn remove_frame(&mut self, layer: usize, id: ItemId) -> Result<()> {
        let key = self.key_of(layer)?;
        let frame = self.document.remove_frame(key, id)?;
        self.record(Box::new(FrameRemoved::new(key, frame)));
        Ok(())
    }

    pub fn edit_frame(&mut self, layer: usize, id: ItemId, edit: FrameEdit) -> Result<()> {
        let key = self.key_of(layer)?;
        self.edit_frame_by_key(key, id, edit)
    }

    fn edit_frame_by_key(&mut self, key: LayerKey, id: ItemId, edit: FrameEdit) -> Result<()> {
        let (before, after) = self.document.edit_frame(key, id, |frame| {
            let before = FrameState::of(frame);
            if let Some(start) = edit.start {
                frame.set_start(start);
            }
            if let Some(duration) = edit.duration {
                frame.set_duration(duration);
            }
            if let Some(image) = edit.image {
                frame.set_image(image);
            }
            (before, FrameState::of(frame))
        })?;
        if before != after {
            self.record(Box::new(FrameEdited::new(key, id, before, after)));
        }
        Ok(())
    }

    pub fn add_transition(&mut self, layer: usize, transition: Transition) -> Result<ItemId> {
        let key = self.key_of(layer)?;
        let id = self.document.add_transition(key, transition)?;
        self.record(Box::new(TransitionCreated::new(key, id)));
        Ok(id)
    }

    pub fn remove_transition(&mut self, layer: usize, id: ItemId) -> Result<()> {
        let key = self.key_of(layer)?;
        let transition = self.document.remove_transition(key, id)?;
        self.record(Box::new(TransitionRemoved::new(key, transition)));
        Ok(())
    }

    /// Merges the current layer into the one below it and selects the result.
    ///
    /// The current layer paints over the lower one.
    pub fn merge_down<B: RasterBackend>(&mut self, compositor: &Compositor<B>) -> Result<()> {
        let index = self.layer_id;
        if index == 0 {
            return Err(Error::LayerIndex(index));
        }
        let primary = self.key_of(index - 1)?;
        let (previous, removed) = compositor.merge_layers(&mut self.document, index - 1, index)?;
        self.record(Box::new(LayersMerged::new(primary, previous, removed, index)));
        self.layer_id = index - 1;
        Ok(())
    }

    /// Replaces the current layer's frames with its transitions baked in and drops
    /// the transitions
    pub fn bake_transitions<B: RasterBackend>(&mut self, compositor: &Compositor<B>) -> Result<()> {
        let key = self.current_key()?;
        let baked = compositor.bake_layer(&self.document, self.layer_id, self.settings.bake_epsilon)?;

        self.group("bake transitions", |session| {
            let frames = session.document.replace_frames(key, baked)?;
            session.record(Box::new(ListReplaced::new(key, StoredList::Frames(frames))));

            let transitions = session
                .document
                .replace_transitions(key, TransitionList::new())?;
            session.record(Box::new(ListReplaced::new(
                key,
                StoredList::Transitions(transitions),
            )));
            Ok(())
        })
    }

    /// Undoes the last command and brings the affected frame into view
    pub fn undo(&mut self) -> Result<bool> {
        let focus = self.log.present_command().and_then(|command| command.focus());
        let acted = self.log.undo_present(&mut self.document)?;
        if acted {
            self.reenter(focus);
        }
        Ok(acted)
    }

    pub fn redo(&mut self) -> Result<bool> {
        let focus = self.log.next_command().and_then(|command| command.focus());
        let acted = self.log.redo_present(&mut self.document)?;
        if acted {
            self.reenter(focus);
        }
        Ok(acted)
    }

    /// Selects the focused layer and moves the cursor into the frame if it is outside
    fn reenter(&mut self, focus: Option<(LayerKey, ItemId)>) {
        let Some((key, id)) = focus else {
            self.set_layer_id(self.layer_id);
            return;
        };
        let Some(index) = self.document.index_of(key) else {
            self.set_layer_id(self.layer_id);
            return;
        };
        self.layer_id = index;

        let span = self.document.layers()[index]
            .frames()
            .find(id)
            .map(|frame| (frame.start(), frame.end()));
        if let Some((start, end)) = span {
            if self.ms < start || self.ms >= end {
                self.set_ms(start);
            }
        }
    }
}
