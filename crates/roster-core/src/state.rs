//! # State Module
//!
//! The check-in / interview state machine.
//!
//! Every change to a member's `state` goes through [`MemberState::next`].
//! The wire strings are the labels the dashboards display, so they are
//! part of the API and must not change.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// MEMBER STATE
// =============================================================================

/// Where a member is in the event flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum MemberState {
    /// Registered but not yet arrived.
    #[default]
    #[serde(rename = "Chưa checkin")]
    NotCheckedIn,
    /// Arrived at the event.
    #[serde(rename = "Đã checkin")]
    CheckedIn,
    /// Called to the interview room.
    #[serde(rename = "Gọi PV")]
    CalledForInterview,
    /// Currently being interviewed.
    #[serde(rename = "Đang phỏng vấn")]
    Interviewing,
    /// Interview finished.
    #[serde(rename = "Đã phỏng vấn")]
    Interviewed,
}

impl MemberState {
    /// All states, in flow order.
    pub const ALL: [MemberState; 5] = [
        MemberState::NotCheckedIn,
        MemberState::CheckedIn,
        MemberState::CalledForInterview,
        MemberState::Interviewing,
        MemberState::Interviewed,
    ];

    /// The display label, identical to the serialized form.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            MemberState::NotCheckedIn => "Chưa checkin",
            MemberState::CheckedIn => "Đã checkin",
            MemberState::CalledForInterview => "Gọi PV",
            MemberState::Interviewing => "Đang phỏng vấn",
            MemberState::Interviewed => "Đã phỏng vấn",
        }
    }

    /// True once the member has checked in, whatever happened afterwards.
    #[must_use]
    pub fn has_arrived(self) -> bool {
        self != MemberState::NotCheckedIn
    }

    /// True while the member sits on the interview board.
    #[must_use]
    pub fn in_interview(self) -> bool {
        matches!(
            self,
            MemberState::CalledForInterview | MemberState::Interviewing
        )
    }

    /// Compute the state reached by applying `action`.
    ///
    /// Repeat check-ins are not an edge of this machine; the roster decides
    /// them according to its [`CheckinPolicy`].
    pub fn next(self, action: MemberAction) -> Result<MemberState> {
        use MemberAction as A;
        use MemberState as S;

        match (self, action) {
            (_, A::Reset) => Ok(S::NotCheckedIn),
            (S::NotCheckedIn, A::CheckIn) => Ok(S::CheckedIn),
            (S::CheckedIn, A::CallForInterview) => Ok(S::CalledForInterview),
            (S::CalledForInterview, A::StartInterview) => Ok(S::Interviewing),
            (S::Interviewing, A::FinishInterview) => Ok(S::Interviewed),
            (from, action) => Err(Error::InvalidTransition { from, action }),
        }
    }
}

impl fmt::Display for MemberState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.label())
    }
}

// =============================================================================
// ACTIONS
// =============================================================================

/// A request to move a member along the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberAction {
    CheckIn,
    CallForInterview,
    StartInterview,
    FinishInterview,
    Reset,
}

impl MemberAction {
    /// Snake-case name, as accepted on the wire.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            MemberAction::CheckIn => "check_in",
            MemberAction::CallForInterview => "call_for_interview",
            MemberAction::StartInterview => "start_interview",
            MemberAction::FinishInterview => "finish_interview",
            MemberAction::Reset => "reset",
        }
    }
}

impl fmt::Display for MemberAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// CHECK-IN POLICY
// =============================================================================

/// Rules applied to check-ins that the state machine alone cannot express.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckinPolicy {
    /// Accept a check-in from a member who already arrived, refreshing
    /// the timestamp instead of rejecting the request.
    pub allow_repeat: bool,
    /// Hand out sequential lottery numbers on first check-in.
    pub assign_lottery: bool,
}

// =============================================================================
// TESTS
// =============================================================================
