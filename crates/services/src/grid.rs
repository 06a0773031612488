use std::collections::{BTreeMap, HashMap};

use pacer_core::model::{
    QuestionStatus, QuestionType, QuestionTypeId, SessionItemSnapshot, TemplateItem,
};
use pacer_core::sequence::{QuestionSlot, SequenceItem};

/// Label shown when an item references a question type that no longer
/// exists.
pub const FALLBACK_TYPE_LABEL: &str = "题型";

fn type_name_map(types: &[QuestionType]) -> HashMap<QuestionTypeId, &str> {
    types.iter().map(|t| (t.id(), t.name())).collect()
}

/// Project template items (already in base order) into sequencing inputs,
/// resolving display labels from the question types.
#[must_use]
pub fn sequence_items(items: &[TemplateItem], types: &[QuestionType]) -> Vec<SequenceItem> {
    let names = type_name_map(types);
    items
        .iter()
        .map(|item| {
            SequenceItem::new(
                item.id(),
                item.question_type_id(),
                names
                    .get(&item.question_type_id())
                    .copied()
                    .unwrap_or(FALLBACK_TYPE_LABEL),
                item.question_count(),
                item.planned_minutes(),
            )
        })
        .collect()
}

/// Project a session's frozen item snapshot into sequencing inputs. Labels
/// still resolve against the live question types (renames are cosmetic).
#[must_use]
pub fn snapshot_items(snapshot: &[SessionItemSnapshot], types: &[QuestionType]) -> Vec<SequenceItem> {
    let names = type_name_map(types);
    snapshot
        .iter()
        .map(|item| {
            SequenceItem::new(
                item.template_item_id,
                item.question_type_id,
                names
                    .get(&item.question_type_id)
                    .copied()
                    .unwrap_or(FALLBACK_TYPE_LABEL),
                item.question_count,
                item.planned_minutes,
            )
        })
        .collect()
}

//
// ─── STATUS COUNTS ─────────────────────────────────────────────────────────────
//

/// Per-status tally over a question grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusCounts {
    pub correct: u32,
    pub wrong: u32,
    pub skip: u32,
    pub unanswered: u32,
}

impl StatusCounts {
    /// Tally grid slots against a (possibly sparse) status map; slots
    /// without an entry count as unanswered.
    #[must_use]
    pub fn from_slots(slots: &[QuestionSlot], statuses: &BTreeMap<u32, QuestionStatus>) -> Self {
        let mut counts = Self::default();
        for slot in slots {
            counts.add(
                statuses
                    .get(&slot.number)
                    .copied()
                    .unwrap_or(QuestionStatus::Unanswered),
            );
        }
        counts
    }

    /// Tally an iterator of statuses directly (record listings).
    #[must_use]
    pub fn from_statuses(statuses: impl IntoIterator<Item = QuestionStatus>) -> Self {
        let mut counts = Self::default();
        for status in statuses {
            counts.add(status);
        }
        counts
    }

    pub fn add(&mut self, status: QuestionStatus) {
        match status {
            QuestionStatus::Correct => self.correct += 1,
            QuestionStatus::Wrong => self.wrong += 1,
            QuestionStatus::Skip => self.skip += 1,
            QuestionStatus::Unanswered => self.unanswered += 1,
        }
    }

    pub fn merge(&mut self, other: &StatusCounts) {
        self.correct += other.correct;
        self.wrong += other.wrong;
        self.skip += other.skip;
        self.unanswered += other.unanswered;
    }

    #[must_use]
    pub fn total(&self) -> u32 {
        self.correct + self.wrong + self.skip + self.unanswered
    }

    /// Questions with a definite answer (correct or wrong).
    #[must_use]
    pub fn answered(&self) -> u32 {
        self.correct + self.wrong
    }

    /// correct / answered; 0 when nothing is answered.
    #[must_use]
    pub fn accuracy_rate(&self) -> f64 {
        if self.answered() == 0 {
            return 0.0;
        }
        f64::from(self.correct) / f64::from(self.answered())
    }

    /// answered / total; 0 for empty grids.
    #[must_use]
    pub fn completion_rate(&self) -> f64 {
        if self.total() == 0 {
            return 0.0;
        }
        f64::from(self.answered()) / f64::from(self.total())
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use pacer_core::model::{TemplateId, TemplateItemId};
    use pacer_core::time::fixed_now;

    #[test]
    fn labels_resolve_with_fallback() {
        let known = QuestionType::new(
            QuestionTypeId::random(),
            "资料分析",
            None,
            None,
            fixed_now(),
        )
        .unwrap();
        let template_id = TemplateId::random();
        let items = vec![
            TemplateItem::new(
                TemplateItemId::random(),
                template_id,
                known.id(),
                20,
                30,
                0,
            ),
            TemplateItem::new(
                TemplateItemId::random(),
                template_id,
                QuestionTypeId::random(),
                10,
                10,
                1,
            ),
        ];

        let projected = sequence_items(&items, std::slice::from_ref(&known));
        assert_eq!(projected[0].label, "资料分析");
        assert_eq!(projected[1].label, FALLBACK_TYPE_LABEL);
    }

    #[test]
    fn counts_rates_handle_empty_and_partial_grids() {
        let counts = StatusCounts::default();
        assert!((counts.accuracy_rate() - 0.0).abs() < f64::EPSILON);
        assert!((counts.completion_rate() - 0.0).abs() < f64::EPSILON);

        let counts = StatusCounts::from_statuses([
            QuestionStatus::Correct,
            QuestionStatus::Correct,
            QuestionStatus::Wrong,
            QuestionStatus::Skip,
            QuestionStatus::Unanswered,
        ]);
        assert_eq!(counts.answered(), 3);
        assert!((counts.accuracy_rate() - 2.0 / 3.0).abs() < 1e-9);
        assert!((counts.completion_rate() - 3.0 / 5.0).abs() < 1e-9);
    }
}
