//! In-memory backend.

use super::{MemberStore, Sequence};
use crate::error::{Error, Result};
use crate::member::{Member, MemberId};
use crate::user::User;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct Tables {
    members: BTreeMap<MemberId, Member>,
    users: BTreeMap<String, User>,
    sequences: BTreeMap<Sequence, u64>,
}

/// Volatile store. Everything is lost when it is dropped.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| Error::Corrupt("memory store lock poisoned".to_string()))
    }
}

impl MemberStore for MemoryStore {
    fn load_member(&self, id: MemberId) -> Result<Option<Member>> {
        Ok(self.tables()?.members.get(&id).cloned())
    }

    fn load_members(&self) -> Result<Vec<Member>> {
        Ok(self.tables()?.members.values().cloned().collect())
    }

    fn store_member(&self, member: &Member) -> Result<()> {
        self.tables()?.members.insert(member.id, member.clone());
        Ok(())
    }

    fn remove_member(&self, id: MemberId) -> Result<Option<Member>> {
        Ok(self.tables()?.members.remove(&id))
    }

    fn clear_members(&self) -> Result<usize> {
        let mut tables = self.tables()?;
        let count = tables.members.len();
        tables.members.clear();
        Ok(count)
    }

    fn next_sequence(&self, sequence: Sequence) -> Result<u64> {
        let mut tables = self.tables()?;
        let counter = tables.sequences.entry(sequence).or_insert(0);
        *counter = counter.saturating_add(1);
        Ok(*counter)
    }

    fn reset_sequence(&self, sequence: Sequence) -> Result<()> {
        self.tables()?.sequences.remove(&sequence);
        Ok(())
    }

    fn load_user(&self, username: &str) -> Result<Option<User>> {
        Ok(self.tables()?.users.get(username).cloned())
    }

    fn store_user(&self, user: &User) -> Result<()> {
        self.tables()?
            .users
            .insert(user.username.clone(), user.clone());
        Ok(())
    }

    fn user_count(&self) -> Result<usize> {
        Ok(self.tables()?.users.len())
    }
}
