//! Linear undo/redo history

use crate::document::Document;
use crate::interval::ItemId;
use crate::layer::LayerKey;
use crate::{Error, Result};
use std::fmt;

/// Default number of commands kept in history
pub const DEFAULT_LENGTH_LIMIT: usize = 40;

/// A reversible edit. Commands are recorded after they have been applied.
pub trait Command: fmt::Debug {
    fn label(&self) -> &str;

    /// Reverts the edit
    fn undo(&mut self, doc: &mut Document) -> Result<()>;

    /// Applies the edit again after an undo
    fn redo(&mut self, doc: &mut Document) -> Result<()>;

    /// The frame to bring into view after undoing or redoing
    fn focus(&self) -> Option<(LayerKey, ItemId)> {
        None
    }
}

#[derive(Debug)]
struct Entry {
    command: Box<dyn Command>,
    done: bool,
}

/// History of applied commands with a cursor on the most recent one still applied
#[derive(Debug)]
pub struct CommandLog {
    entries: Vec<Entry>,
    present: Option<usize>,
    length_limit: usize,
}

impl Default for CommandLog {
    fn default() -> Self {
        Self::new(DEFAULT_LENGTH_LIMIT)
    }
}

impl CommandLog {
    pub fn new(length_limit: usize) -> Self {
        Self {
            entries: Vec::new(),
            present: None,
            length_limit: length_limit.max(1),
        }
    }

    /// Index of the most recent applied command, `None` when nothing is applied
    pub fn present(&self) -> Option<usize> {
        self.present
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn length_limit(&self) -> usize {
        self.length_limit
    }

    pub fn can_undo(&self) -> bool {
        self.present.is_some()
    }

    /// Labels of every command, oldest first
    pub fn labels(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.iter().map(|entry| entry.command.label())
    }

    fn next_index(&self) -> usize {
        self.present.map_or(0, |present| present + 1)
    }

    /// Records an applied command. Redo history past the present is discarded and the
    /// oldest command is evicted past the length limit.
    pub fn add(&mut self, command: Box<dyn Command>) {
        self.entries.truncate(self.next_index());
        tracing::debug!(command = command.label(), "logged");
        self.entries.push(Entry {
            command,
            done: true,
        });
        if self.entries.len() > self.length_limit {
            self.entries.remove(0);
        }
        self.present = Some(self.entries.len() - 1);
    }

    /// Undoes the present command. Returns `false` when there is nothing to undo.
    pub fn undo_present(&mut self, doc: &mut Document) -> Result<bool> {
        let Some(index) = self.present else {
            return Ok(false);
        };
        self.undo_at(index, doc)?;
        self.present = index.checked_sub(1);
        Ok(true)
    }

    /// Redoes the command after the present. Returns `false` when there is nothing to redo.
    pub fn redo_present(&mut self, doc: &mut Document) -> Result<bool> {
        let index = self.next_index();
        if index >= self.entries.len() {
            return Ok(false);
        }
        self.redo_at(index, doc)?;
        self.present = Some(index);
        Ok(true)
    }

    /// The command `undo_present` would revert
    pub fn present_command(&self) -> Option<&dyn Command> {
        self.present
            .map(|index| self.entries[index].command.as_ref())
    }

    /// The command `redo_present` would apply
    pub fn next_command(&self) -> Option<&dyn Command> {
        self.entries
            .get(self.next_index())
            .map(|entry| entry.command.as_ref())
    }

    fn undo_at(&mut self, index: usize, doc: &mut Document) -> Result<()> {
        let entry = &mut self.entries[index];
        if !entry.done {
            return Err(Error::CommandState(format!(
                "\"{}\" is already undone",
                entry.command.label()
            )));
        }
        entry.command.undo(doc)?;
        entry.done = false;
        tracing::debug!(command = entry.command.label(), index, "undone");
        Ok(())
    }

    fn redo_at(&mut self, index: usize, doc: &mut Document) -> Result<()> {
        let entry = &mut self.entries[index];
        if entry.done {
            return Err(Error::CommandState(format!(
                "\"{}\" is already done",
                entry.command.label()
            )));
        }
        entry.command.redo(doc)?;
        entry.done = true;
        tracing::debug!(command = entry.command.label(), index, "redone");
        Ok(())
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.present = None;
    }
}

/// Commands that undo and redo as one unit. Members are only reachable through the group.
#[derive(Debug)]
pub struct GroupCommand {
    label: String,
    members: Vec<Box<dyn Command>>,
}

impl GroupCommand {
    pub fn new(label: impl Into<String>, members: Vec<Box<dyn Command>>) -> Self {
        Self {
            label: label.into(),
            members,
        }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl Command for GroupCommand {
    fn label(&self) -> &str {
        &self.label
    }

    fn undo(&mut self, doc: &mut Document) -> Result<()> {
        for index in (0..self.members.len()).rev() {
            if let Err(err) = self.members[index].undo(doc) {
                tracing::warn!(group = %self.label, %err, "rolling back partial undo");
                for member in &mut self.members[index + 1..] {
                    member.redo(doc)?;
                }
                return Err(err);
            }
        }
        Ok(())
    }

    fn redo(&mut self, doc: &mut Document) -> Result<()> {
        for index in 0..self.members.len() {
            if let Err(err) = self.members[index].redo(doc) {
                tracing::warn!(group = %self.label, %err, "rolling back partial redo");
                for member in self.members[..index].iter_mut().rev() {
                    member.undo(doc)?;
                }
                return Err(err);
            }
        }
        Ok(())
    }

    fn focus(&self) -> Option<(LayerKey, ItemId)> {
        self.members.iter().rev().find_map(|member| member.focus())
    }
}
