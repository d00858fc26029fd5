//! # Roster Core
//!
//! Member records, the check-in state machine and storage for the Roster
//! event check-in tracker.
//!
//! This crate is synchronous and network-free. The `roster` binary wraps
//! it with the HTTP API, the real-time channel and the CLI.
//!
//! ```text
//! ┌──────────────┐    ┌─────────────────────────┐    ┌──────────────────┐
//! │ MemberDraft  │ →  │ Roster (rules, locking) │ →  │ MemberStore      │
//! │ MemberAction │    │  state::MemberState     │    │  RedbStore       │
//! │ Lookup       │    │  CheckinPolicy          │    │  MemoryStore     │
//! └──────────────┘    └─────────────────────────┘    └──────────────────┘
//! ```

pub mod error;
pub mod import;
pub mod member;
pub mod password;
pub mod roster;
pub mod state;
pub mod stats;
pub mod storage;
pub mod user;

pub use error::{Error, Result};
pub use import::{ImportFormat, read_members, read_members_csv, read_members_json};
pub use member::{Member, MemberDraft, MemberId};
pub use password::PasswordHash;
pub use roster::{Change, ImportReport, Lookup, Roster, Transition};
pub use state::{CheckinPolicy, MemberAction, MemberState};
pub use stats::{InterviewBoard, InterviewEntry, Statistics, Tally};
pub use storage::{MemberStore, MemoryStore, RedbStore, Sequence};
pub use user::User;
