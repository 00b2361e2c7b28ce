/// 1-based scene position used by the submission endpoints.
pub type SceneNumber = u32;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
