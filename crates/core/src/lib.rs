//! Core types for gitsms.
//!
//! Everything here is host-independent: parsing the accepted GitHub file
//! URLs, decoding `phone,message` dispatch lines, sizing SMS segments, and
//! the bounded on-disk journal shared by the daemon and the status command.

pub mod dispatch;
pub mod file_ref;
pub mod journal;
pub mod segment;

pub use dispatch::DispatchLine;
pub use file_ref::{FileRef, FileRefError};
pub use journal::{Journal, JournalEntry};
