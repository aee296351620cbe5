use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Subject shown for threads and messages that carry none.
pub const NO_SUBJECT: &str = "(No Subject)";

/// Whether a message left the HR mailbox or arrived in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Sent,
    Received,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Received => "received",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sent" => Ok(Self::Sent),
            "received" => Ok(Self::Received),
            other => Err(anyhow::anyhow!("unknown message direction: {}", other)),
        }
    }
}

/// Delivery state recorded by the send path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Sent,
    Queued,
    Failed,
}

impl DeliveryStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Queued => "queued",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeliveryStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sent" => Ok(Self::Sent),
            "queued" => Ok(Self::Queued),
            "failed" => Ok(Self::Failed),
            other => Err(anyhow::anyhow!("unknown delivery status: {}", other)),
        }
    }
}

/// A stored mailbox row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub direction: Direction,
    pub timestamp: DateTime<Utc>,
    pub sender_email: String,
    pub recipient_email: String,
    pub subject: String,
    /// Markup as produced by the template that generated the message.
    pub body: String,
    pub status: Option<DeliveryStatus>,
    pub email_type: Option<String>,
    pub thread_id: Option<String>,
    pub in_reply_to: Option<i64>,
}

/// A message that has not been written yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMessage {
    pub direction: Direction,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub sender_email: String,
    #[serde(default)]
    pub recipient_email: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub status: Option<DeliveryStatus>,
    #[serde(default)]
    pub email_type: Option<String>,
    #[serde(default)]
    pub thread_id: Option<String>,
    #[serde(default)]
    pub in_reply_to: Option<i64>,
}

/// One inbox line: the latest state of a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadSummary {
    pub thread_id: String,
    pub last_time: DateTime<Utc>,
    /// Subject of the most recent message in the thread.
    pub subject: String,
    /// Distinct sender and recipient addresses, sorted.
    pub participants: Vec<String>,
    pub message_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeCount {
    #[serde(rename = "type")]
    pub email_type: String,
    pub count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailboxStats {
    pub total_emails: u64,
    pub sent_emails: u64,
    pub received_emails: u64,
    pub total_threads: u64,
    pub top_email_types: Vec<TypeCount>,
}

/// Encode a timestamp as fixed-width UTC text so that lexical order in SQLite
/// matches chronological order.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a stored timestamp. Accepts RFC 3339 (any offset) and naive
/// ISO-8601 with `T` or space separators, which is read as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Subject to display, substituting a placeholder for blank ones.
pub fn display_subject(subject: &str) -> String {
    if subject.trim().is_empty() {
        NO_SUBJECT.to_string()
    } else {
        subject.to_string()
    }
}
