//! # Storage Module
//!
//! Persistence for members, users and id sequences.
//!
//! Two backends implement [`MemberStore`]:
//! - [`RedbStore`]: redb embedded database (ACID, crash safe, one file)
//! - [`MemoryStore`]: BTreeMaps behind a mutex, for tests and ephemeral runs
//!
//! Stores are dumb: uniqueness and state rules live in [`crate::Roster`].

mod memory;
mod redb_store;

pub use memory::MemoryStore;
pub use redb_store::RedbStore;

use crate::error::Result;
use crate::member::{Member, MemberId};
use crate::user::User;

/// Named monotonic counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Sequence {
    /// Member row ids.
    Member,
    /// Lottery numbers handed out at check-in.
    Lottery,
}

impl Sequence {
    /// Key under which the counter is persisted.
    pub fn key(self) -> &'static str {
        match self {
            Sequence::Member => "member_id",
            Sequence::Lottery => "lottery_number",
        }
    }
}

/// Storage operations used by the roster.
///
/// All methods take `&self`; implementations handle their own locking.
pub trait MemberStore: Send + Sync {
    /// Fetch one member.
    fn load_member(&self, id: MemberId) -> Result<Option<Member>>;

    /// Fetch all members in ascending id order.
    fn load_members(&self) -> Result<Vec<Member>>;

    /// Insert or replace a member row.
    fn store_member(&self, member: &Member) -> Result<()>;

    /// Delete a member row, returning it if it existed.
    fn remove_member(&self, id: MemberId) -> Result<Option<Member>>;

    /// Delete every member row. Sequences are not rewound.
    fn clear_members(&self) -> Result<usize>;

    /// Advance a sequence and return the new value (first value is 1).
    fn next_sequence(&self, sequence: Sequence) -> Result<u64>;

    /// Rewind a sequence to zero.
    fn reset_sequence(&self, sequence: Sequence) -> Result<()>;

    /// Fetch a user by username.
    fn load_user(&self, username: &str) -> Result<Option<User>>;

    /// Insert or replace a user.
    fn store_user(&self, user: &User) -> Result<()>;

    /// Number of registered users.
    fn user_count(&self) -> Result<usize>;
}

// =============================================================================
// SHARED BACKEND TESTS
// =============================================================================
