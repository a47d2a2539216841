//! Address registry types.

use serde::Serialize;

/// Durable record of an inbox address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct AddressRecord {
    /// Surrogate key.
    pub id: i64,
    /// Full address (`local@domain`), unique.
    pub address: String,
    /// Creation time in epoch milliseconds.
    pub created_at: i64,
    /// Messages currently indexed for this address.
    pub email_count: i64,
    /// Time of the last received message, cleared by an inbox reset.
    pub last_email_at: Option<i64>,
}

/// Aggregate registry totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    /// Number of address records.
    pub total_addresses: i64,
    /// Sum of all message counters.
    pub total_emails: i64,
}
