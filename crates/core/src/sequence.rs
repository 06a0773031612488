use std::collections::{BTreeMap, HashMap};

use crate::model::{QuestionTypeId, TemplateItemId};

//
// ─── INPUT ITEMS ───────────────────────────────────────────────────────────────
//

/// A template item projected for sequencing: identity, display label, how
/// many questions it contributes and its planned minutes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceItem {
    pub id: TemplateItemId,
    pub question_type_id: QuestionTypeId,
    pub label: String,
    pub question_count: u32,
    pub planned_minutes: u32,
}

impl SequenceItem {
    #[must_use]
    pub fn new(
        id: TemplateItemId,
        question_type_id: QuestionTypeId,
        label: impl Into<String>,
        question_count: u32,
        planned_minutes: u32,
    ) -> Self {
        Self {
            id,
            question_type_id,
            label: label.into(),
            question_count,
            planned_minutes,
        }
    }

    /// Planned time budget in milliseconds.
    #[must_use]
    pub fn planned_ms(&self) -> u64 {
        u64::from(self.planned_minutes) * 60_000
    }

    /// Planned milliseconds per question, divided evenly with integer
    /// rounding. Zero for zero-count items.
    #[must_use]
    pub fn planned_ms_per_question(&self) -> u64 {
        if self.question_count == 0 {
            return 0;
        }
        let count = u64::from(self.question_count);
        (self.planned_ms() + count / 2) / count
    }
}

//
// ─── GRID TYPES ────────────────────────────────────────────────────────────────
//

/// One cell of the question grid: a global 1-based number bound to the
/// template item it belongs to. The numbering is assigned in *base*
/// (template) order, so a given number means the same underlying question
/// no matter how the run is reordered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionSlot {
    pub number: u32,
    pub type_index: usize,
    pub label: String,
    pub template_item_id: TemplateItemId,
}

/// Inclusive question-number range covered by one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemRange {
    pub start: u32,
    pub end: u32,
}

impl ItemRange {
    #[must_use]
    pub fn contains(&self, number: u32) -> bool {
        number >= self.start && number <= self.end
    }
}

//
// ─── QUESTION SEQUENCE ─────────────────────────────────────────────────────────
//

/// Derived view over (base items, working order).
///
/// Recomputed on demand from the authoritative state; holds no caches that
/// can go stale. Three products:
///
/// 1. the question grid, numbered `1..=N` in base order,
/// 2. per-item number ranges used for time attribution,
/// 3. the traversal sequence: question numbers in the order the run visits
///    them, i.e. each working-order item's range concatenated.
#[derive(Debug, Clone)]
pub struct QuestionSequence {
    base_items: Vec<SequenceItem>,
    order: Vec<TemplateItemId>,
    slots: Vec<QuestionSlot>,
    ranges: HashMap<TemplateItemId, ItemRange>,
    sequence: Vec<u32>,
    sequence_index: HashMap<u32, usize>,
    order_index: HashMap<TemplateItemId, usize>,
}

impl QuestionSequence {
    #[must_use]
    pub fn build(base_items: Vec<SequenceItem>, order: Vec<TemplateItemId>) -> Self {
        let mut slots = Vec::new();
        let mut ranges = HashMap::new();
        let mut counter: u32 = 1;
        for (type_index, item) in base_items.iter().enumerate() {
            let start = counter;
            for _ in 0..item.question_count {
                slots.push(QuestionSlot {
                    number: counter,
                    type_index,
                    label: item.label.clone(),
                    template_item_id: item.id,
                });
                counter += 1;
            }
            if counter > start {
                ranges.insert(
                    item.id,
                    ItemRange {
                        start,
                        end: counter - 1,
                    },
                );
            }
        }

        let mut sequence = Vec::with_capacity(slots.len());
        for id in &order {
            if let Some(range) = ranges.get(id) {
                sequence.extend(range.start..=range.end);
            }
        }

        let sequence_index = sequence
            .iter()
            .enumerate()
            .map(|(idx, number)| (*number, idx))
            .collect();
        let order_index = order
            .iter()
            .enumerate()
            .map(|(idx, id)| (*id, idx))
            .collect();

        Self {
            base_items,
            order,
            slots,
            ranges,
            sequence,
            sequence_index,
            order_index,
        }
    }

    //
    // ─── GRID ──────────────────────────────────────────────────────────────
    //

    #[must_use]
    pub fn slots(&self) -> &[QuestionSlot] {
        &self.slots
    }

    #[must_use]
    pub fn total_questions(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn base_items(&self) -> &[SequenceItem] {
        &self.base_items
    }

    /// Base items rearranged by working order; unknown order ids drop out.
    #[must_use]
    pub fn ordered_items(&self) -> Vec<&SequenceItem> {
        self.order
            .iter()
            .filter_map(|id| self.base_items.iter().find(|item| item.id == *id))
            .collect()
    }

    #[must_use]
    pub fn range_of(&self, item_id: TemplateItemId) -> Option<ItemRange> {
        self.ranges.get(&item_id).copied()
    }

    /// The item a question number belongs to.
    #[must_use]
    pub fn item_of(&self, number: u32) -> Option<TemplateItemId> {
        self.slots
            .get(number.checked_sub(1)? as usize)
            .map(|slot| slot.template_item_id)
    }

    //
    // ─── TRAVERSAL ─────────────────────────────────────────────────────────
    //

    /// True when the run has at least one question to visit.
    #[must_use]
    pub fn has_items(&self) -> bool {
        !self.sequence.is_empty()
    }

    #[must_use]
    pub fn sequence(&self) -> &[u32] {
        &self.sequence
    }

    /// Keep a stored question number if it still exists in the traversal,
    /// otherwise fall back to the first question. `None` for empty runs.
    #[must_use]
    pub fn resolve_current(&self, stored: Option<u32>) -> Option<u32> {
        match stored {
            Some(number) if self.sequence_index.contains_key(&number) => Some(number),
            _ => self.sequence.first().copied(),
        }
    }

    #[must_use]
    pub fn sequence_position(&self, number: u32) -> Option<usize> {
        self.sequence_index.get(&number).copied()
    }

    #[must_use]
    pub fn can_go_prev(&self, number: u32) -> bool {
        self.sequence_position(number).unwrap_or(0) > 0
    }

    #[must_use]
    pub fn can_go_next(&self, number: u32) -> bool {
        let idx = self.sequence_position(number).unwrap_or(0);
        idx + 1 < self.sequence.len()
    }

    /// The next question in traversal order, or `None` at the end (and for
    /// unknown numbers, which resolve to position 0 first).
    #[must_use]
    pub fn next_after(&self, number: u32) -> Option<u32> {
        let idx = self.sequence_position(number).unwrap_or(0);
        let next_idx = (idx + 1).min(self.sequence.len().checked_sub(1)?);
        let next = self.sequence[next_idx];
        (next != number).then_some(next)
    }

    /// The previous question in traversal order, or `None` at the start.
    #[must_use]
    pub fn prev_before(&self, number: u32) -> Option<u32> {
        let idx = self.sequence_position(number).unwrap_or(0);
        let prev = self.sequence[idx.saturating_sub(1).min(self.sequence.len().checked_sub(1)?)];
        (prev != number).then_some(prev)
    }

    //
    // ─── REVERSE MAPPING ───────────────────────────────────────────────────
    //

    /// Position of an item in the working order.
    #[must_use]
    pub fn order_position(&self, item_id: TemplateItemId) -> Option<usize> {
        self.order_index.get(&item_id).copied()
    }

    /// Working-order index to resynchronize `current_index` to after
    /// navigating to a question number.
    #[must_use]
    pub fn target_index_for(&self, number: u32) -> Option<usize> {
        self.item_of(number)
            .and_then(|item_id| self.order_position(item_id))
    }

    //
    // ─── ATTRIBUTION ───────────────────────────────────────────────────────
    //

    /// Sum of recorded question times inside an item's number range.
    #[must_use]
    pub fn section_time(
        &self,
        item_id: TemplateItemId,
        question_times: &BTreeMap<u32, u64>,
    ) -> u64 {
        let Some(range) = self.range_of(item_id) else {
            return 0;
        };
        (range.start..=range.end)
            .map(|number| question_times.get(&number).copied().unwrap_or(0))
            .sum()
    }

    /// Item ids that contain at least one skipped question.
    #[must_use]
    pub fn skipped_item_ids<'a>(
        &self,
        skips: impl IntoIterator<Item = &'a u32>,
    ) -> Vec<TemplateItemId> {
        let mut out: Vec<TemplateItemId> = Vec::new();
        for number in skips {
            if let Some(item_id) = self.item_of(*number) {
                if !out.contains(&item_id) {
                    out.push(item_id);
                }
            }
        }
        out
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    fn two_item_fixture() -> (TemplateItemId, TemplateItemId, Vec<SequenceItem>) {
        let a = TemplateItemId::random();
        let b = TemplateItemId::random();
        let items = vec![
            SequenceItem::new(a, QuestionTypeId::random(), "A", 3, 5),
            SequenceItem::new(b, QuestionTypeId::random(), "B", 2, 10),
        ];
        (a, b, items)
    }

    #[test]
    fn grid_numbers_are_contiguous_from_one() {
        let (a, b, items) = two_item_fixture();
        let seq = QuestionSequence::build(items, vec![a, b]);

        let numbers: Vec<u32> = seq.slots().iter().map(|slot| slot.number).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4, 5]);
        assert_eq!(seq.total_questions(), 5);

        assert_eq!(seq.range_of(a), Some(ItemRange { start: 1, end: 3 }));
        assert_eq!(seq.range_of(b), Some(ItemRange { start: 4, end: 5 }));
        assert_eq!(seq.item_of(2), Some(a));
        assert_eq!(seq.item_of(4), Some(b));
        assert_eq!(seq.item_of(6), None);
    }

    #[test]
    fn reordering_changes_traversal_but_not_numbering() {
        let (a, b, items) = two_item_fixture();

        let forward = QuestionSequence::build(items.clone(), vec![a, b]);
        assert_eq!(forward.sequence(), &[1, 2, 3, 4, 5]);

        let reversed = QuestionSequence::build(items, vec![b, a]);
        assert_eq!(reversed.sequence(), &[4, 5, 1, 2, 3]);

        // grid numbering is invariant under working-order permutations
        for number in 1..=5 {
            assert_eq!(forward.item_of(number), reversed.item_of(number));
        }
    }

    #[test]
    fn zero_item_templates_disable_navigation() {
        let seq = QuestionSequence::build(Vec::new(), Vec::new());
        assert!(!seq.has_items());
        assert_eq!(seq.resolve_current(Some(3)), None);
        assert_eq!(seq.next_after(1), None);
        assert_eq!(seq.prev_before(1), None);
    }

    #[test]
    fn zero_count_items_contribute_no_slots() {
        let a = TemplateItemId::random();
        let b = TemplateItemId::random();
        let items = vec![
            SequenceItem::new(a, QuestionTypeId::random(), "A", 0, 5),
            SequenceItem::new(b, QuestionTypeId::random(), "B", 2, 10),
        ];
        let seq = QuestionSequence::build(items, vec![a, b]);

        assert_eq!(seq.range_of(a), None);
        assert_eq!(seq.sequence(), &[1, 2]);
        assert_eq!(seq.item_of(1), Some(b));
    }

    #[test]
    fn resolve_current_prefers_stored_when_valid() {
        let (a, b, items) = two_item_fixture();
        let seq = QuestionSequence::build(items, vec![b, a]);

        assert_eq!(seq.resolve_current(Some(2)), Some(2));
        assert_eq!(seq.resolve_current(Some(99)), Some(4));
        assert_eq!(seq.resolve_current(None), Some(4));
    }

    #[test]
    fn traversal_navigation_follows_sequence_not_numbers() {
        let (a, b, items) = two_item_fixture();
        let seq = QuestionSequence::build(items, vec![b, a]);

        // sequence is [4,5,1,2,3]: after 5 comes 1
        assert_eq!(seq.next_after(5), Some(1));
        assert_eq!(seq.prev_before(1), Some(5));
        assert_eq!(seq.next_after(3), None);
        assert_eq!(seq.prev_before(4), None);
        assert!(seq.can_go_next(4));
        assert!(!seq.can_go_prev(4));
        assert!(!seq.can_go_next(3));
    }

    #[test]
    fn target_index_resynchronizes_to_working_order() {
        let (a, b, items) = two_item_fixture();
        let seq = QuestionSequence::build(items, vec![b, a]);

        assert_eq!(seq.target_index_for(1), Some(1));
        assert_eq!(seq.target_index_for(5), Some(0));
        assert_eq!(seq.target_index_for(42), None);
    }

    #[test]
    fn section_time_sums_the_item_range() {
        let (a, b, items) = two_item_fixture();
        let seq = QuestionSequence::build(items, vec![a, b]);

        let mut times = BTreeMap::new();
        times.insert(1, 10_000);
        times.insert(3, 5_000);
        times.insert(4, 7_000);

        assert_eq!(seq.section_time(a, &times), 15_000);
        assert_eq!(seq.section_time(b, &times), 7_000);
        assert_eq!(seq.section_time(TemplateItemId::random(), &times), 0);
    }

    #[test]
    fn planned_per_question_uses_integer_rounding() {
        let item = SequenceItem::new(TemplateItemId::random(), QuestionTypeId::random(), "A", 3, 5);
        // 300000 / 3
        assert_eq!(item.planned_ms_per_question(), 100_000);

        let item = SequenceItem::new(TemplateItemId::random(), QuestionTypeId::random(), "B", 7, 2);
        // 120000 / 7 = 17142.857… rounds to 17143
        assert_eq!(item.planned_ms_per_question(), 17_143);

        let empty = SequenceItem::new(TemplateItemId::random(), QuestionTypeId::random(), "C", 0, 2);
        assert_eq!(empty.planned_ms_per_question(), 0);
    }

    #[test]
    fn skipped_item_ids_deduplicate_by_item() {
        let (a, b, items) = two_item_fixture();
        let seq = QuestionSequence::build(items, vec![a, b]);

        let skips = [1_u32, 2, 5];
        let ids = seq.skipped_item_ids(skips.iter());
        assert_eq!(ids, vec![a, b]);
    }

    #[test]
    fn ordered_items_follow_working_order() {
        let (a, b, items) = two_item_fixture();
        let seq = QuestionSequence::build(items, vec![b, a]);
        let labels: Vec<&str> = seq
            .ordered_items()
            .iter()
            .map(|item| item.label.as_str())
            .collect();
        assert_eq!(labels, vec!["B", "A"]);
    }
}
