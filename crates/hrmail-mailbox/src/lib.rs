//! Mailbox storage for the hrmail dashboard.
//!
//! A single `mails` table holds every HR message; [`MailboxDB`] groups those
//! rows into threads and computes the statistics shown on the dashboard.

pub mod db;
pub mod model;

pub use db::{MailboxDB, TOP_EMAIL_TYPES};
pub use model::{
    DeliveryStatus, Direction, MailboxStats, Message, NO_SUBJECT, NewMessage, ThreadSummary,
    TypeCount,
};
