//! # Stats Module
//!
//! Read-side aggregations shown on the dashboards.
//!
//! Integer arithmetic only: the arrival rate is in per-mille.

use crate::member::Member;
use crate::state::MemberState;
use serde::Serialize;
use std::collections::BTreeMap;

/// Label used when a grouping field is empty.
pub const UNKNOWN_LABEL: &str = "Unknown";

/// Per-group counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub total: usize,
    pub arrived: usize,
}

impl Tally {
    fn count(&mut self, member: &Member) {
        self.total += 1;
        if member.state.has_arrived() {
            self.arrived += 1;
        }
    }
}

/// Headline numbers and breakdowns for the statistics page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Statistics {
    pub total: usize,
    pub arrived: usize,
    /// `arrived * 1000 / total`, 0 for an empty roster.
    pub rate_permille: u32,
    pub by_specialist: BTreeMap<String, Tally>,
    pub by_organization: BTreeMap<String, Tally>,
    pub by_role: BTreeMap<String, Tally>,
    pub by_state: BTreeMap<MemberState, usize>,
}

fn label(value: Option<&String>) -> String {
    value
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .unwrap_or(UNKNOWN_LABEL)
        .to_string()
}

impl Statistics {
    pub fn compute(members: &[Member]) -> Self {
        let mut stats = Statistics {
            by_state: MemberState::ALL.iter().map(|s| (*s, 0)).collect(),
            ..Self::default()
        };

        for member in members {
            stats.total += 1;
            if member.state.has_arrived() {
                stats.arrived += 1;
            }
            *stats.by_state.entry(member.state).or_insert(0) += 1;
            stats
                .by_specialist
                .entry(label(member.specialist.as_ref()))
                .or_default()
                .count(member);
            stats
                .by_organization
                .entry(label(member.organization.as_ref()))
                .or_default()
                .count(member);
            stats
                .by_role
                .entry(label(member.role.as_ref()))
                .or_default()
                .count(member);
        }

        stats.rate_permille = permille(stats.arrived, stats.total);
        stats
    }
}

/// `part * 1000 / whole`, rounded down; 0 when `whole` is 0.
pub fn permille(part: usize, whole: usize) -> u32 {
    if whole == 0 {
        return 0;
    }
    ((part as u128 * 1000) / whole as u128) as u32
}

// =============================================================================
// INTERVIEW BOARD
// =============================================================================

/// One row of the interview board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InterviewEntry {
    pub id: crate::MemberId,
    #[serde(rename = "MSSV")]
    pub mssv: Option<String>,
    pub name: String,
    pub state: MemberState,
}

/// Members currently called or being interviewed, grouped by specialist.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InterviewBoard {
    pub groups: BTreeMap<String, Vec<InterviewEntry>>,
}

impl InterviewBoard {
    pub fn compute(members: &[Member]) -> Self {
        let mut board = InterviewBoard::default();
        for member in members.iter().filter(|m| m.state.in_interview()) {
            board
                .groups
                .entry(label(member.specialist.as_ref()))
                .or_default()
                .push(InterviewEntry {
                    id: member.id,
                    mssv: member.mssv.clone(),
                    name: member.name.clone(),
                    state: member.state,
                });
        }
        for entries in board.groups.values_mut() {
            entries.sort_by_key(|e| e.id);
        }
        board
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::member::{MemberDraft, MemberId};
    use proptest::prelude::*;

    fn member(id: u64, specialist: Option<&str>, state: MemberState) -> Member {
        let mut draft = MemberDraft::new(id.to_string(), format!("M{id}"));
        draft.specialist = specialist.map(str::to_string);
        let mut m = Member::from_draft(MemberId(id), draft);
        m.state = state;
        m
    }

    #[test]
    fn empty_roster_has_zero_rate() {
        let stats = Statistics::compute(&[]);
        assert_eq!(stats.total, 0);
        assert_eq!(stats.rate_permille, 0);
        assert_eq!(stats.by_state.len(), MemberState::ALL.len());
    }

    #[test]
    fn groups_by_specialist_with_unknown_fallback() {
        let members = vec![
            member(1, Some("Design"), MemberState::CheckedIn),
            member(2, Some("Design"), MemberState::NotCheckedIn),
            member(3, None, MemberState::Interviewing),
        ];
        let stats = Statistics::compute(&members);

        assert_eq!(stats.arrived, 2);
        assert_eq!(stats.rate_permille, 666);
        assert_eq!(
            stats.by_specialist["Design"],
            Tally {
                total: 2,
                arrived: 1
            }
        );
        assert_eq!(stats.by_specialist[UNKNOWN_LABEL].arrived, 1);
        assert_eq!(stats.by_state[&MemberState::Interviewing], 1);
    }

    #[test]
    fn interview_board_filters_and_sorts() {
        let members = vec![
            member(5, Some("Media"), MemberState::Interviewing),
            member(2, Some("Media"), MemberState::CalledForInterview),
            member(3, Some("Tech"), MemberState::CheckedIn),
            member(4, Some("Tech"), MemberState::Interviewed),
        ];
        let board = InterviewBoard::compute(&members);
        assert!(!board.is_empty());
        assert_eq!(board.groups.len(), 1);
        let ids: Vec<_> = board.groups["Media"].iter().map(|e| e.id.0).collect();
        assert_eq!(ids, vec![2, 5]);
    }

    #[test]
    fn interview_board_empty_when_nobody_is_called() {
        let members = vec![
            member(1, Some("Media"), MemberState::CheckedIn),
            member(2, None, MemberState::NotCheckedIn),
        ];
        assert!(InterviewBoard::compute(&members).is_empty());
        assert!(InterviewBoard::compute(&[]).is_empty());
    }

    fn any_state() -> impl Strategy<Value = MemberState> {
        prop::sample::select(MemberState::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn tallies_sum_to_total(
            rows in prop::collection::vec((prop::option::of("[a-c]"), any_state()), 0..40)
        ) {
            let members: Vec<_> = rows
                .iter()
                .enumerate()
                .map(|(i, (spec, state))| member(i as u64 + 1, spec.as_deref(), *state))
                .collect();
            let stats = Statistics::compute(&members);

            let group_total: usize = stats.by_specialist.values().map(|t| t.total).sum();
            let group_arrived: usize = stats.by_specialist.values().map(|t| t.arrived).sum();
            let state_total: usize = stats.by_state.values().sum();
            prop_assert_eq!(group_total, stats.total);
            prop_assert_eq!(group_arrived, stats.arrived);
            prop_assert_eq!(state_total, stats.total);
            prop_assert!(stats.rate_permille <= 1000);
        }
    }
}
