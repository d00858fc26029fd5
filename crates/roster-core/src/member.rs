//! # Member Module
//!
//! The member record and its editable draft.
//!
//! Field names on the wire follow what the dashboards already send and
//! read (`MSSV`, `IDcard`), everything else is snake_case.

use crate::error::{Error, Result};
use crate::state::MemberState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum length of an MSSV, in characters.
pub const MAX_MSSV_LEN: usize = 32;

/// Maximum length of a member name, in characters.
pub const MAX_NAME_LEN: usize = 100;

/// Maximum length of any optional text field, in characters.
pub const MAX_FIELD_LEN: usize = 256;

// =============================================================================
// MEMBER ID
// =============================================================================

/// Stable identifier of a member row. Never reused after deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemberId(pub u64);

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

// =============================================================================
// DRAFT
// =============================================================================

/// The fields staff can set when adding or editing a member.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberDraft {
    #[serde(rename = "MSSV", alias = "mssv", default)]
    pub mssv: Option<String>,
    pub name: String,
    #[serde(default)]
    pub specialist: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub organization: Option<String>,
    #[serde(default)]
    pub join_year: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(rename = "IDcard", alias = "id_card", default)]
    pub id_card: Option<String>,
}

impl MemberDraft {
    /// Create a draft with only the required fields.
    pub fn new(mssv: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            mssv: Some(mssv.into()),
            name: name.into(),
            ..Self::default()
        }
    }

    /// A draft for a guest without a student id.
    pub fn guest(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Builder-style setter for `specialist`.
    #[must_use]
    pub fn with_specialist(mut self, specialist: impl Into<String>) -> Self {
        self.specialist = Some(specialist.into());
        self
    }

    /// Builder-style setter for `id_card`.
    #[must_use]
    pub fn with_id_card(mut self, id_card: impl Into<String>) -> Self {
        self.id_card = Some(id_card.into());
        self
    }

    /// Builder-style setter for `organization`.
    #[must_use]
    pub fn with_organization(mut self, organization: impl Into<String>) -> Self {
        self.organization = Some(organization.into());
        self
    }

    /// Builder-style setter for `role`.
    #[must_use]
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    /// Normalize and check a draft entered by staff.
    ///
    /// Every field is trimmed, blank optionals become `None`, and the
    /// length limits are enforced. MSSV is required.
    pub fn validate(self) -> Result<MemberDraft> {
        let draft = self.normalize()?;
        if draft.mssv.is_none() {
            return Err(Error::Validation("MSSV is required".to_string()));
        }
        Ok(draft)
    }

    /// Like [`validate`](Self::validate), but a blank MSSV is accepted.
    ///
    /// Anniversary exports list alumni guests who never had a student id.
    pub fn validate_import(self) -> Result<MemberDraft> {
        self.normalize()
    }

    fn normalize(self) -> Result<MemberDraft> {
        let mssv = match self.mssv.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(mssv) => Some(required("MSSV", mssv, MAX_MSSV_LEN)?),
        };
        let name = required("name", &self.name, MAX_NAME_LEN)?;

        Ok(MemberDraft {
            mssv,
            name,
            specialist: optional("specialist", self.specialist)?,
            role: optional("role", self.role)?,
            organization: optional("organization", self.organization)?,
            join_year: optional("join_year", self.join_year)?,
            note: optional("note", self.note)?,
            id_card: optional("IDcard", self.id_card)?,
        })
    }
}

// =============================================================================
// MEMBER
// =============================================================================

/// A member row as stored and as sent to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: MemberId,
    #[serde(rename = "MSSV")]
    pub mssv: Option<String>,
    pub name: String,
    pub specialist: Option<String>,
    pub role: Option<String>,
    pub organization: Option<String>,
    pub join_year: Option<String>,
    pub note: Option<String>,
    #[serde(rename = "IDcard")]
    pub id_card: Option<String>,
    pub state: MemberState,
    pub checkin_time: Option<DateTime<Utc>>,
    pub lottery_number: Option<u64>,
}

impl Member {
    /// A freshly registered member who has not arrived yet.
    pub fn from_draft(id: MemberId, draft: MemberDraft) -> Self {
        Self {
            id,
            mssv: draft.mssv,
            name: draft.name,
            specialist: draft.specialist,
            role: draft.role,
            organization: draft.organization,
            join_year: draft.join_year,
            note: draft.note,
            id_card: draft.id_card,
            state: MemberState::NotCheckedIn,
            checkin_time: None,
            lottery_number: None,
        }
    }

    /// Overwrite the editable fields, leaving check-in data alone.
    pub fn apply_draft(&mut self, draft: MemberDraft) {
        self.mssv = draft.mssv;
        self.name = draft.name;
        self.specialist = draft.specialist;
        self.role = draft.role;
        self.organization = draft.organization;
        self.join_year = draft.join_year;
        self.note = draft.note;
        self.id_card = draft.id_card;
    }

    /// Whether this member has the given MSSV.
    pub fn has_mssv(&self, mssv: &str) -> bool {
        self.mssv.as_deref() == Some(mssv)
    }

    /// Whether this member carries the given card UID.
    pub fn has_card(&self, card: &str) -> bool {
        self.id_card.as_deref() == Some(card)
    }
}

// =============================================================================
// TESTS
// =============================================================================
