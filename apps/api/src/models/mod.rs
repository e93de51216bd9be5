pub mod help_request;
pub mod knowledge;
pub mod timestamp;

pub use help_request::{HelpRequest, RequestStatus};
pub use knowledge::{KnowledgeBaseEntry, KnowledgeSource};

use serde::{de::DeserializeOwned, Serialize};

use crate::store::StoreError;

/// A persisted entity. `check` runs after deserialization so records that
/// parse but break an entity invariant are still reported as corrupt.
pub trait Record: Serialize + DeserializeOwned {
    fn check(&self) -> Result<(), String> {
        Ok(())
    }
}

pub fn encode<T: Record>(key: &str, record: &T) -> Result<String, StoreError> {
    serde_json::to_string(record).map_err(|e| StoreError::corrupt(key, e))
}

pub fn decode<T: Record>(key: &str, raw: &str) -> Result<T, StoreError> {
    let record: T = serde_json::from_str(raw).map_err(|e| StoreError::corrupt(key, e))?;
    record.check().map_err(|reason| StoreError::CorruptRecord {
        key: key.to_string(),
        reason,
    })?;
    Ok(record)
}
