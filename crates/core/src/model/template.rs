use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::ids::{QuestionTypeId, TemplateId, TemplateItemId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TemplateError {
    #[error("template name cannot be empty")]
    EmptyName,

    #[error("item order indexes must be a permutation of 0..{len}")]
    InvalidOrderIndexes { len: usize },

    #[error("item belongs to a different template")]
    ForeignItem,
}

//
// ─── TEMPLATE ITEM ─────────────────────────────────────────────────────────────
//

/// One section of a template: a question type with a count and a planned
/// time budget in minutes. `order_index` fixes the canonical section order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateItem {
    id: TemplateItemId,
    template_id: TemplateId,
    question_type_id: QuestionTypeId,
    question_count: u32,
    planned_minutes: u32,
    order_index: u32,
}

impl TemplateItem {
    #[must_use]
    pub fn new(
        id: TemplateItemId,
        template_id: TemplateId,
        question_type_id: QuestionTypeId,
        question_count: u32,
        planned_minutes: u32,
        order_index: u32,
    ) -> Self {
        Self {
            id,
            template_id,
            question_type_id,
            question_count,
            planned_minutes,
            order_index,
        }
    }

    // Accessors
    #[must_use]
    pub fn id(&self) -> TemplateItemId {
        self.id
    }

    #[must_use]
    pub fn template_id(&self) -> TemplateId {
        self.template_id
    }

    #[must_use]
    pub fn question_type_id(&self) -> QuestionTypeId {
        self.question_type_id
    }

    #[must_use]
    pub fn question_count(&self) -> u32 {
        self.question_count
    }

    #[must_use]
    pub fn planned_minutes(&self) -> u32 {
        self.planned_minutes
    }

    /// Planned time budget in milliseconds.
    #[must_use]
    pub fn planned_ms(&self) -> u64 {
        u64::from(self.planned_minutes) * 60_000
    }

    #[must_use]
    pub fn order_index(&self) -> u32 {
        self.order_index
    }
}

/// Validates that the items' `order_index` values form a permutation of
/// `0..items.len()`.
///
/// # Errors
///
/// Returns `TemplateError::InvalidOrderIndexes` otherwise.
pub fn validate_order_indexes(items: &[TemplateItem]) -> Result<(), TemplateError> {
    let len = items.len();
    let mut seen = vec![false; len];
    for item in items {
        let idx = item.order_index() as usize;
        if idx >= len || seen[idx] {
            return Err(TemplateError::InvalidOrderIndexes { len });
        }
        seen[idx] = true;
    }
    Ok(())
}

/// Returns the items sorted by `order_index` (the canonical section order).
#[must_use]
pub fn items_in_template_order(items: &[TemplateItem]) -> Vec<TemplateItem> {
    let mut sorted = items.to_vec();
    sorted.sort_by_key(TemplateItem::order_index);
    sorted
}

//
// ─── TEMPLATE ──────────────────────────────────────────────────────────────────
//

/// An ordered exam blueprint. Owns its items (1:N); `total_questions` and
/// `total_planned_minutes` are derived sums kept on the row for listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    id: TemplateId,
    name: String,
    description: Option<String>,
    is_default: bool,
    total_questions: u32,
    total_planned_minutes: u32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Template {
    /// Creates a new template, deriving the totals from `items`.
    ///
    /// # Errors
    ///
    /// Returns `TemplateError::EmptyName` for a blank name,
    /// `TemplateError::ForeignItem` if an item references another template,
    /// or `TemplateError::InvalidOrderIndexes` if the item order indexes are
    /// not a permutation of `0..items.len()`.
    pub fn new(
        id: TemplateId,
        name: impl Into<String>,
        description: Option<String>,
        is_default: bool,
        items: &[TemplateItem],
        created_at: DateTime<Utc>,
    ) -> Result<Self, TemplateError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(TemplateError::EmptyName);
        }
        if items.iter().any(|item| item.template_id() != id) {
            return Err(TemplateError::ForeignItem);
        }
        validate_order_indexes(items)?;

        let (total_questions, total_planned_minutes) = totals(items);
        let description = description
            .map(|d| d.trim().to_owned())
            .filter(|d| !d.is_empty());

        Ok(Self {
            id,
            name: name.trim().to_owned(),
            description,
            is_default,
            total_questions,
            total_planned_minutes,
            created_at,
            updated_at: created_at,
        })
    }

    /// Rehydrate a template row from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `TemplateError::EmptyName` if the stored name is empty.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        id: TemplateId,
        name: String,
        description: Option<String>,
        is_default: bool,
        total_questions: u32,
        total_planned_minutes: u32,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Result<Self, TemplateError> {
        if name.trim().is_empty() {
            return Err(TemplateError::EmptyName);
        }
        Ok(Self {
            id,
            name,
            description,
            is_default,
            total_questions,
            total_planned_minutes,
            created_at,
            updated_at,
        })
    }

    /// Replace name/description and re-derive totals from a new item set,
    /// stamping `updated_at`.
    ///
    /// # Errors
    ///
    /// Same validation as [`Template::new`].
    pub fn update(
        &mut self,
        name: impl Into<String>,
        description: Option<String>,
        is_default: bool,
        items: &[TemplateItem],
        now: DateTime<Utc>,
    ) -> Result<(), TemplateError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(TemplateError::EmptyName);
        }
        if items.iter().any(|item| item.template_id() != self.id) {
            return Err(TemplateError::ForeignItem);
        }
        validate_order_indexes(items)?;

        let (total_questions, total_planned_minutes) = totals(items);
        self.name = name.trim().to_owned();
        self.description = description
            .map(|d| d.trim().to_owned())
            .filter(|d| !d.is_empty());
        self.is_default = is_default;
        self.total_questions = total_questions;
        self.total_planned_minutes = total_planned_minutes;
        self.updated_at = now;
        Ok(())
    }

    // Accessors
    #[must_use]
    pub fn id(&self) -> TemplateId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    #[must_use]
    pub fn is_default(&self) -> bool {
        self.is_default
    }

    #[must_use]
    pub fn total_questions(&self) -> u32 {
        self.total_questions
    }

    #[must_use]
    pub fn total_planned_minutes(&self) -> u32 {
        self.total_planned_minutes
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

fn totals(items: &[TemplateItem]) -> (u32, u32) {
    let questions = items.iter().map(TemplateItem::question_count).sum();
    let minutes = items.iter().map(TemplateItem::planned_minutes).sum();
    (questions, minutes)
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn build_item(template_id: TemplateId, count: u32, minutes: u32, order: u32) -> TemplateItem {
        TemplateItem::new(
            TemplateItemId::random(),
            template_id,
            QuestionTypeId::random(),
            count,
            minutes,
            order,
        )
    }

    #[test]
    fn template_derives_totals_from_items() {
        let id = TemplateId::random();
        let items = vec![build_item(id, 40, 30, 0), build_item(id, 15, 20, 1)];
        let template =
            Template::new(id, "Standard", None, true, &items, fixed_now()).unwrap();

        assert_eq!(template.total_questions(), 55);
        assert_eq!(template.total_planned_minutes(), 50);
        assert!(template.is_default());
    }

    #[test]
    fn template_rejects_empty_name() {
        let id = TemplateId::random();
        let err = Template::new(id, "   ", None, false, &[], fixed_now()).unwrap_err();
        assert_eq!(err, TemplateError::EmptyName);
    }

    #[test]
    fn template_rejects_foreign_items() {
        let id = TemplateId::random();
        let items = vec![build_item(TemplateId::random(), 10, 10, 0)];
        let err = Template::new(id, "Mixed", None, false, &items, fixed_now()).unwrap_err();
        assert_eq!(err, TemplateError::ForeignItem);
    }

    #[test]
    fn order_indexes_must_be_a_permutation() {
        let id = TemplateId::random();

        let duplicated = vec![build_item(id, 10, 10, 0), build_item(id, 10, 10, 0)];
        let err = validate_order_indexes(&duplicated).unwrap_err();
        assert_eq!(err, TemplateError::InvalidOrderIndexes { len: 2 });

        let out_of_range = vec![build_item(id, 10, 10, 0), build_item(id, 10, 10, 2)];
        assert!(validate_order_indexes(&out_of_range).is_err());

        let valid = vec![build_item(id, 10, 10, 1), build_item(id, 10, 10, 0)];
        assert!(validate_order_indexes(&valid).is_ok());
    }

    #[test]
    fn items_sort_into_template_order() {
        let id = TemplateId::random();
        let a = build_item(id, 1, 1, 2);
        let b = build_item(id, 2, 2, 0);
        let c = build_item(id, 3, 3, 1);
        let sorted = items_in_template_order(&[a.clone(), b.clone(), c.clone()]);
        assert_eq!(
            sorted.iter().map(TemplateItem::id).collect::<Vec<_>>(),
            vec![b.id(), c.id(), a.id()]
        );
    }

    #[test]
    fn update_rederives_totals() {
        let id = TemplateId::random();
        let items = vec![build_item(id, 40, 30, 0)];
        let mut template = Template::new(id, "Standard", None, false, &items, fixed_now()).unwrap();

        let later = fixed_now() + chrono::Duration::hours(1);
        let next_items = vec![build_item(id, 20, 10, 0), build_item(id, 5, 5, 1)];
        template
            .update("Standard v2", Some("tweaked".into()), false, &next_items, later)
            .unwrap();

        assert_eq!(template.name(), "Standard v2");
        assert_eq!(template.total_questions(), 25);
        assert_eq!(template.total_planned_minutes(), 15);
        assert_eq!(template.updated_at(), later);
    }

    #[test]
    fn planned_ms_converts_minutes() {
        let item = build_item(TemplateId::random(), 10, 5, 0);
        assert_eq!(item.planned_ms(), 300_000);
    }
}
