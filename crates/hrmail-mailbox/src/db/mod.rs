use crate::model::{
    Direction, MailboxStats, Message, NewMessage, ThreadSummary, TypeCount, display_subject,
    format_timestamp, parse_timestamp,
};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, Row, params};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

/// Number of template types reported by [`MailboxDB::get_email_stats`].
pub const TOP_EMAIL_TYPES: usize = 5;

const MESSAGE_COLUMNS: &str = "id, direction, timestamp, sender_email, recipient_email, \
     subject, body, status, email_type, thread_id, in_reply_to";

/// SQLite-backed HR mailbox.
pub struct MailboxDB {
    conn: Mutex<Connection>,
    db_path: String,
}

impl MailboxDB {
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!(
                    "Failed to create database parent directory: {}",
                    parent.display()
                )
            })?;
        }

        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open database at: {}", db_path.display()))?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA synchronous=NORMAL;
             PRAGMA busy_timeout=3000;",
        )?;

        let db = Self {
            conn: Mutex::new(conn),
            db_path: db_path.to_string_lossy().to_string(),
        };

        db.ensure_schema().with_context(|| {
            format!(
                "Failed to initialize mailbox schema at: {}",
                db_path.display()
            )
        })?;
        debug!("mailbox opened at {}", db.db_path);
        Ok(db)
    }

    pub fn path(&self) -> &str {
        &self.db_path
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| anyhow::anyhow!("DB lock poisoned: {}", e))
    }

    fn ensure_schema(&self) -> Result<()> {
        let conn = self.lock()?;

        // Databases created by earlier tooling have the same columns but no
        // CHECK constraint; IF NOT EXISTS leaves them untouched.
        conn.execute(
            "CREATE TABLE IF NOT EXISTS mails (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                direction TEXT CHECK (direction IN ('sent', 'received')),
                timestamp TEXT,
                sender_email TEXT,
                recipient_email TEXT,
                subject TEXT,
                body TEXT,
                status TEXT,
                email_type TEXT,
                thread_id TEXT,
                in_reply_to INTEGER
            )",
            [],
        )?;

        conn.execute_batch(
            "CREATE INDEX IF NOT EXISTS idx_mails_thread ON mails(thread_id, timestamp);
             CREATE INDEX IF NOT EXISTS idx_mails_direction ON mails(direction, timestamp);",
        )?;
        Ok(())
    }

    /// Insert a message and return its row id.
    pub fn insert_message(&self, msg: &NewMessage) -> Result<i64> {
        let conn = self.lock()?;
        insert_row(&conn, msg)?;
        Ok(conn.last_insert_rowid())
    }

    /// Insert a batch of messages in one transaction. Either every row lands
    /// or none do.
    pub fn insert_messages(&self, msgs: &[NewMessage]) -> Result<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        for (i, msg) in msgs.iter().enumerate() {
            insert_row(&tx, msg).with_context(|| format!("Failed to insert message #{}", i))?;
        }
        tx.commit()?;
        debug!("inserted {} messages", msgs.len());
        Ok(msgs.len())
    }

    pub fn count_messages(&self) -> Result<u64> {
        let conn = self.lock()?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM mails", [], |row| row.get(0))?;
        Ok(n as u64)
    }

    /// Summaries of every thread, most recently active first.
    ///
    /// Rows without a thread identifier do not form a thread and are skipped.
    /// Stored timestamps are not all in one text format, so the latest message
    /// and the ordering are decided on parsed times rather than in SQL.
    pub fn get_inbox_threads(&self, limit: Option<usize>) -> Result<Vec<ThreadSummary>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, thread_id, timestamp, subject, sender_email, recipient_email
             FROM mails
             WHERE thread_id IS NOT NULL",
        )?;
        let rows: Result<Vec<_>, _> = stmt
            .query_map([], |row| {
                Ok(ThreadRow {
                    id: row.get(0)?,
                    thread_id: row.get(1)?,
                    timestamp: timestamp_column(row, 2)?,
                    subject: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                    sender: row.get(4)?,
                    recipient: row.get(5)?,
                })
            })?
            .collect();
        let rows = rows.context("Failed to load thread summaries")?;

        let mut acc: BTreeMap<String, ThreadAcc> = BTreeMap::new();
        for row in rows {
            let entry = acc.entry(row.thread_id).or_insert_with(|| ThreadAcc {
                latest: (row.timestamp, row.id),
                subject: row.subject.clone(),
                participants: BTreeSet::new(),
                count: 0,
            });
            entry.count += 1;
            if (row.timestamp, row.id) > entry.latest {
                entry.latest = (row.timestamp, row.id);
                entry.subject = row.subject;
            }
            for addr in [row.sender, row.recipient].into_iter().flatten() {
                if !addr.trim().is_empty() {
                    entry.participants.insert(addr);
                }
            }
        }

        let mut threads: Vec<ThreadSummary> = acc
            .into_iter()
            .map(|(thread_id, t)| ThreadSummary {
                thread_id,
                last_time: t.latest.0,
                subject: display_subject(&t.subject),
                participants: t.participants.into_iter().collect(),
                message_count: t.count,
            })
            .collect();
        threads.sort_by(|a, b| {
            b.last_time
                .cmp(&a.last_time)
                .then_with(|| a.thread_id.cmp(&b.thread_id))
        });
        if let Some(limit) = limit {
            threads.truncate(limit);
        }
        Ok(threads)
    }

    /// All messages of one thread, oldest first. Unknown threads yield an
    /// empty list.
    pub fn get_thread_messages(&self, thread_id: &str) -> Result<Vec<Message>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM mails
             WHERE thread_id = ?
             ORDER BY timestamp ASC, id ASC"
        ))?;
        let rows: Result<Vec<_>, _> = stmt.query_map([thread_id], message_from_row)?.collect();
        let mut messages = rows.context("Failed to load thread messages")?;
        // legacy rows may use a different text format than ours
        messages.sort_by_key(|m| (m.timestamp, m.id));
        Ok(messages)
    }

    /// Messages sent from the mailbox, newest first. The limit applies after
    /// ordering by parsed timestamp.
    pub fn get_sent_emails(&self, limit: Option<usize>) -> Result<Vec<Message>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM mails WHERE direction = ?"
        ))?;
        let rows: Result<Vec<_>, _> = stmt
            .query_map([Direction::Sent.as_str()], message_from_row)?
            .collect();
        let mut messages = rows.context("Failed to load sent emails")?;
        messages.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        if let Some(limit) = limit {
            messages.truncate(limit);
        }
        Ok(messages)
    }

    pub fn get_email_stats(&self) -> Result<MailboxStats> {
        let conn = self.lock()?;
        let (total, sent, received, threads) = conn.query_row(
            "SELECT COUNT(*),
                    COALESCE(SUM(direction = 'sent'), 0),
                    COALESCE(SUM(direction = 'received'), 0),
                    COUNT(DISTINCT thread_id)
             FROM mails",
            [],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, i64>(3)?,
                ))
            },
        )?;

        let mut stmt = conn.prepare(
            "SELECT email_type, COUNT(*) AS n
             FROM mails
             WHERE email_type IS NOT NULL
             GROUP BY email_type
             ORDER BY n DESC, email_type ASC
             LIMIT ?",
        )?;
        let top: Result<Vec<_>, _> = stmt
            .query_map([TOP_EMAIL_TYPES as i64], |row| {
                Ok(TypeCount {
                    email_type: row.get(0)?,
                    count: row.get::<_, i64>(1)? as u64,
                })
            })?
            .collect();

        Ok(MailboxStats {
            total_emails: total as u64,
            sent_emails: sent as u64,
            received_emails: received as u64,
            total_threads: threads as u64,
            top_email_types: top.context("Failed to count email types")?,
        })
    }

    /// Distinct template-type tags in use, sorted.
    pub fn get_template_types(&self) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT DISTINCT email_type FROM mails
             WHERE email_type IS NOT NULL
             ORDER BY email_type ASC",
        )?;
        let types: Result<Vec<String>, _> = stmt.query_map([], |row| row.get(0))?.collect();
        types.context("Failed to list template types")
    }
}

fn insert_row(conn: &Connection, msg: &NewMessage) -> rusqlite::Result<usize> {
    conn.execute(
        "INSERT INTO mails (direction, timestamp, sender_email, recipient_email, subject,
                            body, status, email_type, thread_id, in_reply_to)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            msg.direction.as_str(),
            format_timestamp(&msg.timestamp),
            msg.sender_email,
            msg.recipient_email,
            msg.subject,
            msg.body,
            msg.status.map(|s| s.as_str()),
            msg.email_type,
            msg.thread_id,
            msg.in_reply_to,
        ],
    )
}

struct ThreadRow {
    id: i64,
    thread_id: String,
    timestamp: DateTime<Utc>,
    subject: String,
    sender: Option<String>,
    recipient: Option<String>,
}

/// Running summary of one thread while rows are folded in.
struct ThreadAcc {
    latest: (DateTime<Utc>, i64),
    subject: String,
    participants: BTreeSet<String>,
    count: u64,
}

fn timestamp_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_timestamp(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("unparseable timestamp: {raw}").into(),
        )
    })
}

fn parsed_column<T>(idx: usize, raw: &str) -> rusqlite::Result<T>
where
    T: std::str::FromStr<Err = anyhow::Error>,
{
    raw.parse::<T>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<Message> {
    let direction: String = row.get(1)?;
    let status: Option<String> = row.get(7)?;
    Ok(Message {
        id: row.get(0)?,
        direction: parsed_column(1, &direction)?,
        timestamp: timestamp_column(row, 2)?,
        sender_email: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        recipient_email: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
        subject: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
        body: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
        status: status
            .as_deref()
            .map(|s| parsed_column(7, s))
            .transpose()?,
        email_type: row.get(8)?,
        thread_id: row.get(9)?,
        in_reply_to: row.get(10)?,
    })
}
