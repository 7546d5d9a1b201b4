use chrono::{DateTime, Utc};

/// A newly detected question, ready to be answered.
#[derive(Debug, Clone)]
pub struct Question {
    /// Merged message text as it came out of the line merge pass.
    pub raw_text: String,
    /// Text after marker removal and trimming; the dedup key.
    pub normalized_key: String,
    pub detected_at: DateTime<Utc>,
}
