use std::sync::Arc;

use pacer_core::model::{
    QuestionType, QuestionTypeId, Template, TemplateId, TemplateItem, TemplateItemId,
};
use pacer_core::time::Clock;
use storage::repository::{QuestionTypeRepository, TemplateRepository};

use crate::error::TemplateServiceError;

/// Item input for template create/update; `order_index` comes from the
/// position in the slice.
#[derive(Debug, Clone)]
pub struct TemplateItemDraft {
    pub question_type_id: QuestionTypeId,
    pub question_count: u32,
    pub planned_minutes: u32,
}

/// Built-in question types seeded into an empty store.
const DEFAULT_QUESTION_TYPES: [(&str, &str, &str); 5] = [
    ("言语理解", "言语", "#2F6FED"),
    ("判断推理", "判断", "#16B8A9"),
    ("数量关系", "数量", "#F59E0B"),
    ("资料分析", "资料", "#0EA5E9"),
    ("常识判断", "常识", "#E11D48"),
];

/// (question count, planned minutes) per default type, in order.
const DEFAULT_TEMPLATE_ITEMS: [(u32, u32); 5] = [(40, 30), (40, 35), (15, 20), (20, 30), (20, 10)];

const DEFAULT_TEMPLATE_NAME: &str = "行测标准模板";
const DEFAULT_TEMPLATE_DESCRIPTION: &str = "内置行测标准模板";

/// Question-type and template management, including first-run seeding.
pub struct TemplateService {
    question_types: Arc<dyn QuestionTypeRepository>,
    templates: Arc<dyn TemplateRepository>,
    clock: Clock,
}

impl TemplateService {
    #[must_use]
    pub fn new(
        question_types: Arc<dyn QuestionTypeRepository>,
        templates: Arc<dyn TemplateRepository>,
        clock: Clock,
    ) -> Self {
        Self {
            question_types,
            templates,
            clock,
        }
    }

    //
    // ─── BOOTSTRAP ─────────────────────────────────────────────────────────
    //

    /// Seed the built-in question types and the standard template, only
    /// into an empty store. Safe to call on every startup.
    ///
    /// # Errors
    ///
    /// Returns `TemplateServiceError` for validation or storage failures.
    pub async fn bootstrap_defaults(&self) -> Result<(), TemplateServiceError> {
        let now = self.clock.now();

        let mut types = self.question_types.list_question_types().await?;
        if types.is_empty() {
            for (name, short_name, color) in DEFAULT_QUESTION_TYPES {
                let question_type = QuestionType::new(
                    QuestionTypeId::random(),
                    name,
                    Some(short_name.to_owned()),
                    Some(color.to_owned()),
                    now,
                )?;
                self.question_types
                    .upsert_question_type(&question_type)
                    .await?;
                types.push(question_type);
            }
            tracing::info!("seeded default question types");
        }

        let templates = self.templates.list_templates().await?;
        if templates.is_empty() && !types.is_empty() {
            let template_id = TemplateId::random();
            let items: Vec<TemplateItem> = DEFAULT_TEMPLATE_ITEMS
                .iter()
                .zip(types.iter())
                .enumerate()
                .map(|(index, (&(count, minutes), question_type))| {
                    TemplateItem::new(
                        TemplateItemId::random(),
                        template_id,
                        question_type.id(),
                        count,
                        minutes,
                        u32::try_from(index).unwrap_or(u32::MAX),
                    )
                })
                .collect();
            let template = Template::new(
                template_id,
                DEFAULT_TEMPLATE_NAME,
                Some(DEFAULT_TEMPLATE_DESCRIPTION.to_owned()),
                true,
                &items,
                now,
            )?;
            self.templates.upsert_template(&template, &items).await?;
            tracing::info!(template = %template_id, "seeded default template");
        }

        Ok(())
    }

    //
    // ─── QUESTION TYPES ────────────────────────────────────────────────────
    //

    /// # Errors
    ///
    /// Returns `TemplateServiceError::Storage` when rows cannot be read.
    pub async fn list_question_types(&self) -> Result<Vec<QuestionType>, TemplateServiceError> {
        Ok(self.question_types.list_question_types().await?)
    }

    /// # Errors
    ///
    /// Returns `TemplateServiceError` for validation or storage failures.
    pub async fn create_question_type(
        &self,
        name: &str,
        short_name: Option<String>,
        color: Option<String>,
    ) -> Result<QuestionType, TemplateServiceError> {
        let question_type = QuestionType::new(
            QuestionTypeId::random(),
            name,
            short_name,
            color,
            self.clock.now(),
        )?;
        self.question_types
            .upsert_question_type(&question_type)
            .await?;
        Ok(question_type)
    }

    /// # Errors
    ///
    /// Returns `QuestionTypeNotFound` for unknown ids, plus validation and
    /// storage failures.
    pub async fn update_question_type(
        &self,
        id: QuestionTypeId,
        name: &str,
        short_name: Option<String>,
        color: Option<String>,
    ) -> Result<QuestionType, TemplateServiceError> {
        let mut question_type = self
            .question_types
            .get_question_type(id)
            .await?
            .ok_or(TemplateServiceError::QuestionTypeNotFound)?;
        question_type.update(name, short_name, color, self.clock.now())?;
        self.question_types
            .upsert_question_type(&question_type)
            .await?;
        Ok(question_type)
    }

    /// # Errors
    ///
    /// Returns `TemplateServiceError::Storage` on failure.
    pub async fn remove_question_type(&self, id: QuestionTypeId) -> Result<(), TemplateServiceError> {
        self.question_types.delete_question_type(id).await?;
        Ok(())
    }

    //
    // ─── TEMPLATES ─────────────────────────────────────────────────────────
    //

    /// # Errors
    ///
    /// Returns `TemplateServiceError::Storage` when rows cannot be read.
    pub async fn list_templates(&self) -> Result<Vec<Template>, TemplateServiceError> {
        Ok(self.templates.list_templates().await?)
    }

    /// Template row plus its items in canonical order; `None` when
    /// missing.
    ///
    /// # Errors
    ///
    /// Returns `TemplateServiceError::Storage` when rows cannot be read.
    pub async fn get_template(
        &self,
        id: TemplateId,
    ) -> Result<Option<(Template, Vec<TemplateItem>)>, TemplateServiceError> {
        let Some(template) = self.templates.get_template(id).await? else {
            return Ok(None);
        };
        let items = self.templates.get_template_items(id).await?;
        Ok(Some((template, items)))
    }

    /// The default template, falling back to the oldest one.
    ///
    /// # Errors
    ///
    /// Returns `TemplateServiceError::Storage` when rows cannot be read.
    pub async fn default_template(&self) -> Result<Option<Template>, TemplateServiceError> {
        let templates = self.templates.list_templates().await?;
        Ok(templates
            .iter()
            .find(|t| t.is_default())
            .or_else(|| templates.first())
            .cloned())
    }

    /// # Errors
    ///
    /// Returns `TemplateServiceError` for validation or storage failures.
    pub async fn create_template(
        &self,
        name: &str,
        description: Option<String>,
        is_default: bool,
        item_drafts: &[TemplateItemDraft],
    ) -> Result<(Template, Vec<TemplateItem>), TemplateServiceError> {
        let template_id = TemplateId::random();
        let items = materialize_items(template_id, item_drafts);
        let template = Template::new(
            template_id,
            name,
            description,
            is_default,
            &items,
            self.clock.now(),
        )?;
        self.templates.upsert_template(&template, &items).await?;
        Ok((template, items))
    }

    /// Replace a template's fields and items (items are rewritten
    /// wholesale, totals re-derived).
    ///
    /// # Errors
    ///
    /// Returns `TemplateNotFound` for unknown ids, plus validation and
    /// storage failures.
    pub async fn update_template(
        &self,
        id: TemplateId,
        name: &str,
        description: Option<String>,
        is_default: bool,
        item_drafts: &[TemplateItemDraft],
    ) -> Result<(Template, Vec<TemplateItem>), TemplateServiceError> {
        let mut template = self
            .templates
            .get_template(id)
            .await?
            .ok_or(TemplateServiceError::TemplateNotFound)?;
        let items = materialize_items(id, item_drafts);
        template.update(name, description, is_default, &items, self.clock.now())?;
        self.templates.upsert_template(&template, &items).await?;
        Ok((template, items))
    }

    /// # Errors
    ///
    /// Returns `TemplateServiceError::Storage` on failure.
    pub async fn remove_template(&self, id: TemplateId) -> Result<(), TemplateServiceError> {
        self.templates.delete_template(id).await?;
        Ok(())
    }

    /// Filter a working order down to the template's current item ids and
    /// append any missing ones in template order.
    ///
    /// # Errors
    ///
    /// Returns `TemplateServiceError::Storage` when rows cannot be read.
    pub async fn normalize_order(
        &self,
        template_id: TemplateId,
        order: &[TemplateItemId],
    ) -> Result<Vec<TemplateItemId>, TemplateServiceError> {
        let items = self.templates.get_template_items(template_id).await?;
        let valid: Vec<TemplateItemId> = items.iter().map(TemplateItem::id).collect();
        let mut normalized: Vec<TemplateItemId> = order
            .iter()
            .copied()
            .filter(|id| valid.contains(id))
            .collect();
        for id in valid {
            if !normalized.contains(&id) {
                normalized.push(id);
            }
        }
        Ok(normalized)
    }
}

fn materialize_items(template_id: TemplateId, drafts: &[TemplateItemDraft]) -> Vec<TemplateItem> {
    drafts
        .iter()
        .enumerate()
        .map(|(index, draft)| {
            TemplateItem::new(
                TemplateItemId::random(),
                template_id,
                draft.question_type_id,
                draft.question_count,
                draft.planned_minutes,
                u32::try_from(index).unwrap_or(u32::MAX),
            )
        })
        .collect()
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
