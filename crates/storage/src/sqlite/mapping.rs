use uuid::Uuid;

use crate::repository::StorageError;

pub(super) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(super) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

pub(super) fn uuid_from_str(field: &'static str, raw: &str) -> Result<Uuid, StorageError> {
    Uuid::parse_str(raw).map_err(|_| StorageError::Serialization(format!("invalid {field}: {raw}")))
}

pub(super) fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(super) fn u64_from_i64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(super) fn i64_from_u64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuid_parse_reports_field_name() {
        let err = uuid_from_str("session_id", "junk").unwrap_err();
        assert!(err.to_string().contains("session_id"));
    }

    #[test]
    fn numeric_conversions_reject_out_of_range() {
        assert!(u32_from_i64("count", -1).is_err());
        assert!(u64_from_i64("ms", -5).is_err());
        assert!(i64_from_u64("ms", u64::MAX).is_err());
        assert_eq!(u32_from_i64("count", 7).unwrap(), 7);
    }
}
