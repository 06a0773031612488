#![forbid(unsafe_code)]

pub mod app_services;
pub mod backup;
pub mod commit;
pub mod error;
pub mod grid;
pub mod practice;
pub mod records;
pub mod review;
pub mod runtime_handle;
pub mod settings;
pub mod stats;
pub mod templates;
pub mod timer;

pub use pacer_core::time::Clock;

pub use app_services::AppServices;
pub use backup::BackupService;
pub use commit::{CommitInput, SessionCommitService, build_session_rows};
pub use error::{
    AppServicesError, BackupError, CommitError, PracticeError, RecordsError, ReviewError,
    SettingsServiceError, StatsError, TemplateServiceError,
};
pub use grid::StatusCounts;
pub use practice::{PracticeService, PracticeView};
pub use records::{RecordDetail, RecordSummary, RecordsOverview, RecordsService};
pub use review::{ReviewService, ReviewSheet};
pub use runtime_handle::{SharedRuntime, lock_runtime, new_shared_runtime};
pub use settings::AppSettingsService;
pub use stats::{DashboardStats, DayOverview, StatsService, TrendPoint};
pub use templates::{TemplateItemDraft, TemplateService};
pub use timer::{TICK_INTERVAL, TimerDriver, TimerGuard};
