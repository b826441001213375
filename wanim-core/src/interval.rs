//! Interval items and the ordered lists that hold them

use crate::time::{sanitize_offset, Ms};
use std::fmt;
use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_ITEM_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of an interval item, stable while the item moves between lists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(u64);

impl ItemId {
    /// Allocates a fresh identifier
    pub fn next() -> Self {
        Self(NEXT_ITEM_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw identifier value
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A value that is valid over the time span `[start, end)`
pub trait IntervalItem {
    fn id(&self) -> ItemId;

    fn start(&self) -> Ms;

    fn duration(&self) -> Ms;

    fn end(&self) -> Ms {
        self.start() + self.duration()
    }

    /// Checks if the item covers the given instant
    fn is_at(&self, t: Ms) -> bool {
        self.start() <= t && t < self.end()
    }

    /// Checks if the item intersects `[start, end)`
    fn is_in_range(&self, start: Ms, end: Ms) -> bool {
        self.start() < end && start < self.end()
    }
}

impl<T: IntervalItem + ?Sized> IntervalItem for &T {
    fn id(&self) -> ItemId {
        (**self).id()
    }

    fn start(&self) -> Ms {
        (**self).start()
    }

    fn duration(&self) -> Ms {
        (**self).duration()
    }
}

/// Interval items whose span can be edited in place
pub trait Resizable: IntervalItem {
    /// Overlap resolution applied by [`IntervalList::add`]
    const ARRANGE_POLICY: Reduration = Reduration::None;

    /// Smallest duration the item normalizes to
    const MIN_DURATION: Ms;

    fn set_start(&mut self, start: Ms);

    fn set_duration(&mut self, duration: Ms);

    fn set_end(&mut self, end: Ms) {
        let start = self.start();
        self.set_duration(end - start);
    }
}

/// Items that can stand in for an empty stretch of a timeline
pub trait Fillable: Resizable + Clone {
    fn blank(start: Ms, end: Ms) -> Self;

    fn is_blank(&self) -> bool;
}

/// Which neighbour yields when two items overlap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Reduration {
    /// Sort only, overlaps stay
    #[default]
    None,
    /// The earlier item is shortened to end where the next one starts
    Back,
    /// The later item is pushed to start where the previous one ends
    Front,
}

/// A span change made while arranging, kept so the change can be reverted
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Adjustment {
    pub id: ItemId,
    /// `(start, duration)` before arranging
    pub before: (Ms, Ms),
    /// `(start, duration)` after arranging
    pub after: (Ms, Ms),
}

/// Ordered collection of interval items with a time offset applied to every query
#[derive(Debug, Clone)]
pub struct IntervalList<T> {
    pub(crate) items: Vec<T>,
    pub(crate) offset: Ms,
}

impl<T> Default for IntervalList<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            offset: 0.0,
        }
    }
}

impl<T: IntervalItem> IntervalList<T> {
    /// Creates an empty list
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
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    pub fn first(&self) -> Option<&T> {
        self.items.first()
    }

    pub fn last(&self) -> Option<&T> {
        self.items.last()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub fn index_of(&self, id: ItemId) -> Option<usize> {
        self.items.iter().position(|item| item.id() == id)
    }

    pub fn find(&self, id: ItemId) -> Option<&T> {
        self.items.iter().find(|item| item.id() == id)
    }

    /// Start of the first item, 0 when empty
    pub fn start(&self) -> Ms {
        self.items.first().map_or(0.0, |item| item.start())
    }

    /// End of the last item, 0 when empty
    pub fn end(&self) -> Ms {
        self.items.last().map_or(0.0, |item| item.end())
    }

    pub fn duration(&self) -> Ms {
        self.end() - self.start()
    }

    /// Index of the item covering `t`
    pub fn index_at(&self, t: Ms) -> Option<usize> {
        find_at(&self.items, t + self.offset)
    }

    /// Gets the item covering `t`. Only meaningful on an arranged list.
    pub fn item_at(&self, t: Ms) -> Option<&T> {
        self.index_at(t).map(|i| &self.items[i])
    }

    /// Gets the item covering `t`, or the one held over the gap `t` falls in
    pub fn item_preceding(&self, t: Ms) -> Option<&T> {
        find_preceding(&self.items, t + self.offset).map(|i| &self.items[i])
    }

    /// Gets every item intersecting `[start, end)`, in ascending order
    pub fn items_in_range(&self, start: Ms, end: Ms) -> Vec<&T> {
        find_in_range(&self.items, start + self.offset, end + self.offset)
            .into_iter()
            .map(|i| &self.items[i])
            .collect()
    }

    /// Appends an item without arranging
    pub fn push(&mut self, item: T) -> ItemId {
        let id = item.id();
        self.items.push(item);
        id
    }

    /// Puts a previously removed item back, sorting without redurationing
    pub fn readd(&mut self, item: T) -> ItemId {
        let id = self.push(item);
        self.arrange();
        id
    }

    pub fn remove(&mut self, index: usize) -> Option<T> {
        (index < self.items.len()).then(|| self.items.remove(index))
    }

    pub fn remove_id(&mut self, id: ItemId) -> Option<T> {
        let index = self.index_of(id)?;
        Some(self.items.remove(index))
    }

    /// Removes `amount` items starting at `index`
    pub fn remove_range(&mut self, index: usize, amount: usize) -> Vec<T> {
        let start = index.min(self.items.len());
        let end = start.saturating_add(amount).min(self.items.len());
        self.items.drain(start..end).collect()
    }

    pub fn retain(&mut self, keep: impl FnMut(&T) -> bool) {
        self.items.retain(keep);
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Sorts items by ascending start. The sort is stable.
    pub fn arrange(&mut self) {
        self.items.sort_by(|a, b| a.start().total_cmp(&b.start()));
    }

    /// Copies the items in `range` into a new list with no offset
    pub fn slice(&self, range: Range<usize>) -> Self
    where
        T: Clone,
    {
        let start = range.start.min(self.items.len());
        let end = range.end.clamp(start, self.items.len());
        Self {
            items: self.items[start..end].to_vec(),
            offset: 0.0,
        }
    }
}

impl<T: Resizable> IntervalList<T> {
    /// Adds an item and arranges with the item type's policy
    pub fn add(&mut self, item: T) -> ItemId {
        self.add_tracked(item).0
    }

    /// Adds an item, returning the span changes arranging made to its neighbours
    pub fn add_tracked(&mut self, item: T) -> (ItemId, Vec<Adjustment>) {
        let id = self.push(item);
        let adjustments = self.arrange_with(T::ARRANGE_POLICY);
        (id, adjustments)
    }

    /// Mutates the item with the given id, then restores ordering
    pub fn edit<R>(&mut self, id: ItemId, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let index = self.index_of(id)?;
        let result = f(&mut self.items[index]);
        self.arrange();
        Some(result)
    }

    /// Sorts, then removes overlaps according to `policy`
    pub fn arrange_with(&mut self, policy: Reduration) -> Vec<Adjustment> {
        self.arrange();
        if policy == Reduration::None {
            return Vec::new();
        }

        let before: Vec<(Ms, Ms)> = self
            .items
            .iter()
            .map(|item| (item.start(), item.duration()))
            .collect();

        for i in 1..self.items.len() {
            let (head, tail) = self.items.split_at_mut(i);
            let prev = &mut head[i - 1];
            let next = &mut tail[0];

            if prev.end() <= next.start() {
                continue;
            }
            match policy {
                Reduration::Back => yield_front(prev, next),
                Reduration::Front if prev.end().is_finite() => next.set_start(prev.end()),
                Reduration::Front => yield_front(prev, next),
                Reduration::None => unreachable!(),
            }
        }

        self.items
            .iter()
            .zip(before)
            .filter_map(|(item, before)| {
                let after = (item.start(), item.duration());
                (after != before).then_some(Adjustment {
                    id: item.id(),
                    before,
                    after,
                })
            })
            .collect()
    }

    /// Puts adjusted items back to their spans before (`revert = true`) or after arranging
    pub fn apply_adjustments(&mut self, adjustments: &[Adjustment], revert: bool) {
        for adjustment in adjustments {
            let (start, duration) = if revert {
                adjustment.before
            } else {
                adjustment.after
            };
            if let Some(index) = self.index_of(adjustment.id) {
                let item = &mut self.items[index];
                item.set_start(start);
                item.set_duration(duration);
            }
        }
        self.arrange();
    }
}

impl<T: Fillable> IntervalList<T> {
    /// Creates a new list in which every gap from 0 is an explicit blank item.
    /// A final blank stretches the list to `forced_end` when that lies past its end.
    pub fn fill_blanks(&self, forced_end: Ms) -> Self {
        let mut filled = Self {
            items: Vec::with_capacity(self.items.len() * 2 + 1),
            offset: self.offset,
        };

        for item in &self.items {
            let past_end = filled.end();
            if item.start() > past_end {
                filled.items.push(T::blank(past_end, item.start()));
            }
            filled.items.push(item.clone());
        }

        let end = filled.end();
        if forced_end > end {
            filled.items.push(T::blank(end, forced_end));
        }

        filled
    }

    /// Drops every blank item
    pub fn clear_blanks(&mut self) -> &mut Self {
        self.items.retain(|item| !item.is_blank());
        self
    }
}

impl<T: IntervalItem> FromIterator<T> for IntervalList<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut list = Self {
            items: iter.into_iter().collect(),
            offset: 0.0,
        };
        list.arrange();
        list
    }
}

impl<'a, T> IntoIterator for &'a IntervalList<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// Shortens `prev` to end at `next`'s start, or, when that would leave `prev` below its
/// minimum duration, pushes `next` past it instead
fn yield_front<T: Resizable>(prev: &mut T, next: &mut T) {
    if next.start() - prev.start() >= T::MIN_DURATION {
        prev.set_end(next.start());
    } else {
        prev.set_duration(T::MIN_DURATION);
        next.set_start(prev.end());
    }
}

pub(crate) fn find_at<T: IntervalItem>(items: &[T], t: Ms) -> Option<usize> {
    if t < 0.0 {
        return None;
    }
    items.iter().position(|item| item.is_at(t))
}

pub(crate) fn find_preceding<T: IntervalItem>(items: &[T], t: Ms) -> Option<usize> {
    if let Some(index) = find_at(items, t) {
        return Some(index);
    }
    let last = items.len().checked_sub(1)?;
    if t >= items[last].end() {
        return Some(last);
    }
    items
        .windows(2)
        .position(|pair| pair[0].start() <= t && t < pair[1].start())
}

pub(crate) fn find_in_range<T: IntervalItem>(items: &[T], start: Ms, end: Ms) -> Vec<usize> {
    let mut found = Vec::new();
    for (index, item) in items.iter().enumerate() {
        if item.is_in_range(start, end) {
            found.push(index);
        }
        if item.start() > end {
            break;
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{Frame, FrameList};

    fn list_of(spans: &[(Ms, Ms)]) -> FrameList {
        let mut list = FrameList::new();
        for &(start, duration) in spans {
            list.push(Frame::new(start, duration));
        }
        list
    }

    fn spans(list: &FrameList) -> Vec<(Ms, Ms)> {
        list.iter().map(|f| (f.start(), f.duration())).collect()
    }

    fn assert_sorted_disjoint(list: &FrameList) {
        for pair in list.as_slice().windows(2) {
            assert!(pair[0].start() <= pair[1].start());
            assert!(pair[0].end() <= pair[1].start(), "{:?}", spans(list));
        }
    }

    #[test]
    fn test_arrange_back_shrinks_front_item() {
        let mut list = list_of(&[(300.0, 500.0), (0.0, 500.0)]);
        let adjustments = list.arrange_with(Reduration::Back);

        assert_eq!(spans(&list), vec![(0.0, 300.0), (300.0, 500.0)]);
        assert_eq!(adjustments.len(), 1);
        assert_eq!(adjustments[0].before, (0.0, 500.0));
        assert_eq!(adjustments[0].after, (0.0, 300.0));
        assert_sorted_disjoint(&list);
    }

    #[test]
    fn test_arrange_front_pushes_back_item() {
        let mut list = list_of(&[(0.0, 500.0), (300.0, 500.0), (600.0, 100.0)]);
        list.arrange_with(Reduration::Front);

        assert_eq!(
            spans(&list),
            vec![(0.0, 500.0), (500.0, 500.0), (1000.0, 100.0)]
        );
        assert_sorted_disjoint(&list);
    }

    #[test]
    fn test_arrange_back_with_equal_starts() {
        let mut list = list_of(&[(100.0, 50.0), (100.0, 50.0), (100.0, 50.0)]);
        list.arrange_with(Reduration::Back);
        assert_sorted_disjoint(&list);
        assert!(list.iter().all(|f| f.duration() >= 1.0));
    }

    #[test]
    fn test_arrange_front_after_infinite_item() {
        let mut list = list_of(&[(0.0, f64::INFINITY), (200.0, 100.0)]);
        list.arrange_with(Reduration::Front);
        assert_eq!(spans(&list), vec![(0.0, 200.0), (200.0, 100.0)]);
    }

    #[test]
    fn test_arrange_none_keeps_overlaps() {
        let mut list = list_of(&[(300.0, 500.0), (0.0, 500.0)]);
        assert!(list.arrange_with(Reduration::None).is_empty());
        assert_eq!(spans(&list), vec![(0.0, 500.0), (300.0, 500.0)]);
    }

    #[test]
    fn test_adjustments_revert() {
        let mut list = list_of(&[(0.0, 500.0)]);
        let (id, adjustments) = list.add_tracked(Frame::new(200.0, 100.0));
        assert_eq!(spans(&list), vec![(0.0, 200.0), (200.0, 100.0)]);

        list.remove_id(id);
        list.apply_adjustments(&adjustments, true);
        assert_eq!(spans(&list), vec![(0.0, 500.0)]);
    }

    #[test]
    fn test_lookups() {
        let list = list_of(&[(0.0, 500.0), (500.0, 300.0), (1000.0, 100.0)]);

        assert_eq!(list.item_at(250.0).map(|f| f.start()), Some(0.0));
        assert_eq!(list.item_at(500.0).map(|f| f.start()), Some(500.0));
        assert!(list.item_at(900.0).is_none());
        assert!(list.item_at(-1.0).is_none());

        assert_eq!(list.item_preceding(900.0).map(|f| f.start()), Some(500.0));
        assert_eq!(list.item_preceding(5000.0).map(|f| f.start()), Some(1000.0));

        let hits: Vec<Ms> = list
            .items_in_range(400.0, 1000.0)
            .iter()
            .map(|f| f.start())
            .collect();
        assert_eq!(hits, vec![0.0, 500.0]);
    }

    #[test]
    fn test_offset_shifts_queries() {
        let mut list = list_of(&[(1000.0, 100.0)]);
        list.set_offset(1000.0);
        assert_eq!(list.item_at(50.0).map(|f| f.start()), Some(1000.0));
        assert!(list.item_at(150.0).is_none());
    }

    #[test]
    fn test_preceding_before_first_item() {
        let list = list_of(&[(100.0, 100.0)]);
        assert!(list.item_preceding(50.0).is_none());
        assert!(FrameList::new().item_preceding(50.0).is_none());
    }

    #[test]
    fn test_remove_range_and_slice() {
        let mut list = list_of(&[(0.0, 10.0), (10.0, 10.0), (20.0, 10.0), (30.0, 10.0)]);
        let slice = list.slice(1..3);
        assert_eq!(spans(&slice), vec![(10.0, 10.0), (20.0, 10.0)]);

        let removed = list.remove_range(2, 10);
        assert_eq!(removed.len(), 2);
        assert_eq!(list.len(), 2);
        assert!(list.remove(5).is_none());
    }

    #[test]
    fn test_edit_restores_order() {
        let mut list = list_of(&[(0.0, 10.0), (10.0, 10.0)]);
        let id = list.get(0).map(|f| f.id()).unwrap();
        list.edit(id, |frame| frame.set_start(50.0));
        assert_eq!(list.last().map(|f| f.id()), Some(id));
    }
}
