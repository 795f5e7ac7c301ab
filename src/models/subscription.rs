//! Subscriber rows, as read from the subscriptions file.

use serde::Deserialize;

/// Root of the subscriptions file: a list of `[[subscriber]]` tables.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct SubscriptionsFile {
    #[serde(default, rename = "subscriber")]
    pub subscribers: Vec<SubscriberRow>,
}

/// One subscriber row. All three columns are required; a row missing any of
/// them fails deserialization of the whole file.
#[derive(Debug, Clone, Deserialize)]
pub struct SubscriberRow {
    /// Recipient address
    pub email: String,

    /// Comma-delimited institution labels (full-width commas tolerated)
    pub schools: String,

    /// Only `ACTIVE` rows (case-insensitive) receive mail
    pub status: String,
}
