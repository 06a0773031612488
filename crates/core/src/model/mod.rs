mod app_settings;
mod ids;
mod question_type;
mod session;
mod stats;
mod template;

pub use ids::{
    ParseIdError, QuestionRecordId, QuestionTypeId, SessionId, SessionItemId, TemplateId,
    TemplateItemId,
};

pub use app_settings::{AppSettings, AppSettingsDraft, AppSettingsError, ColorScheme, ThemeMode};
pub use question_type::{QuestionType, QuestionTypeError};
pub use session::{
    Mode, QuestionRecord, QuestionStatus, Session, SessionItem, SessionItemSnapshot,
    SessionRowError, SessionStatus,
};
pub use stats::DailyStat;
pub use template::{
    Template, TemplateError, TemplateItem, items_in_template_order, validate_order_indexes,
};
