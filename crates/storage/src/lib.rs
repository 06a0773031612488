#![forbid(unsafe_code)]

pub mod backup;
pub mod repository;
pub mod sqlite;

pub use backup::{BACKUP_VERSION, BackupData, BackupFormatError, BackupPayload};
pub use repository::{InMemoryRepository, Storage, StorageError};
pub use sqlite::{SqliteInitError, SqliteRepository};
