//! # Realtime Module
//!
//! Fan-out of member changes to connected dashboards.
//!
//! The [`Hub`] is a `tokio::sync::broadcast` channel fed by the roster's
//! change listener, so events leave in commit order. Every WebSocket session
//! holds a receiver. A session that falls more than the channel capacity
//! behind gets a fresh `members_list` instead of the events it missed.

use roster_core::{Change, Member, MemberId, Transition};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

/// A message on the real-time channel.
///
/// Serialized as `{"event": "<name>", "data": <payload>}`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum Event {
    /// Full table snapshot (on connect and on resync).
    MembersList(Vec<Member>),
    MemberAdded(Member),
    MemberEdited(Member),
    MemberDeleted { id: MemberId },
    MemberCheckedIn(Member),
    MemberStateChanged(Transition),
    MembersReset { count: usize },
    Error { message: String },
}

impl Event {
    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            Event::MembersList(_) => "members_list",
            Event::MemberAdded(_) => "member_added",
            Event::MemberEdited(_) => "member_edited",
            Event::MemberDeleted { .. } => "member_deleted",
            Event::MemberCheckedIn(_) => "member_checked_in",
            Event::MemberStateChanged(_) => "member_state_changed",
            Event::MembersReset { .. } => "members_reset",
            Event::Error { .. } => "error",
        }
    }

    /// JSON text frame for this event.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl From<&Change> for Event {
    fn from(change: &Change) -> Self {
        match change {
            Change::Added(member) => Event::MemberAdded(member.clone()),
            Change::Edited(member) => Event::MemberEdited(member.clone()),
            Change::Deleted(member) => Event::MemberDeleted { id: member.id },
            Change::CheckedIn(transition) => Event::MemberCheckedIn(transition.member.clone()),
            Change::StateChanged(transition) => Event::MemberStateChanged(transition.clone()),
            Change::Reset { count } => Event::MembersReset { count: *count },
        }
    }
}

/// Broadcast hub shared by all handlers.
#[derive(Debug, Clone)]
pub struct Hub {
    tx: broadcast::Sender<Event>,
}

impl Hub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Send `event` to every subscriber. Returns how many received it.
    pub fn publish(&self, event: Event) -> usize {
        let name = event.name();
        // No subscribers is the normal idle case, not an error.
        let delivered = self.tx.send(event).unwrap_or(0);
        debug!(event = name, delivered, "published");
        delivered
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use roster_core::{MemberDraft, MemberState};
    use tokio::sync::broadcast::error::RecvError;

    fn member() -> Member {
        Member::from_draft(MemberId(1), MemberDraft::new("2012345", "A"))
    }

    #[test]
    fn events_serialize_with_name_and_data() {
        let json: serde_json::Value =
            serde_json::from_str(&Event::MemberDeleted { id: MemberId(3) }.to_json().unwrap())
                .unwrap();
        assert_eq!(json["event"], "member_deleted");
        assert_eq!(json["data"]["id"], 3);

        let json: serde_json::Value =
            serde_json::from_str(&Event::MemberAdded(member()).to_json().unwrap()).unwrap();
        assert_eq!(json["event"], "member_added");
        assert_eq!(json["data"]["MSSV"], "2012345");
    }

    #[test]
    fn state_change_carries_both_states() {
        let event = Event::MemberStateChanged(Transition {
            member: member(),
            from: MemberState::CheckedIn,
            to: MemberState::CalledForInterview,
        });
        let json: serde_json::Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();
        assert_eq!(json["event"], event.name());
        assert_eq!(json["data"]["from"], "Đã checkin");
        assert_eq!(json["data"]["to"], "Gọi PV");
    }

    #[test]
    fn changes_map_to_wire_events() {
        let transition = Transition {
            member: member(),
            from: MemberState::NotCheckedIn,
            to: MemberState::CheckedIn,
        };
        let cases = [
            (Change::Added(member()), "member_added"),
            (Change::Edited(member()), "member_edited"),
            (Change::Deleted(member()), "member_deleted"),
            (Change::CheckedIn(transition.clone()), "member_checked_in"),
            (Change::StateChanged(transition), "member_state_changed"),
            (Change::Reset { count: 2 }, "members_reset"),
        ];
        for (change, name) in &cases {
            assert_eq!(Event::from(change).name(), *name);
        }
        assert!(matches!(
            Event::from(&Change::Deleted(member())),
            Event::MemberDeleted { id: MemberId(1) }
        ));
    }

    #[tokio::test]
    async fn roster_writes_reach_subscribers_in_order() {
        use roster_core::{Lookup, MemoryStore, Roster};

        let hub = Hub::new(8);
        let mut rx = hub.subscribe();
        let feed = hub.clone();
        let roster = Roster::new(MemoryStore::new()).with_listener(move |change| {
            feed.publish(Event::from(change));
        });

        let added = roster.add(MemberDraft::new("2012345", "A")).unwrap();
        roster
            .check_in(&Lookup::Mssv("2012345".into()), chrono::Utc::now())
            .unwrap();
        roster.delete(added.id).unwrap();

        let names: Vec<_> = [
            rx.recv().await.unwrap(),
            rx.recv().await.unwrap(),
            rx.recv().await.unwrap(),
        ]
        .iter()
        .map(Event::name)
        .collect();
        assert_eq!(names, ["member_added", "member_checked_in", "member_deleted"]);
    }

    #[test]
    fn publish_without_subscribers_is_fine() {
        let hub = Hub::new(4);
        assert_eq!(hub.publish(Event::MembersReset { count: 0 }), 0);
    }

    #[tokio::test]
    async fn every_subscriber_receives_each_event() {
        let hub = Hub::new(4);
        let mut a = hub.subscribe();
        let mut b = hub.subscribe();
        assert_eq!(hub.subscriber_count(), 2);

        assert_eq!(hub.publish(Event::MemberAdded(member())), 2);
        assert_eq!(a.recv().await.unwrap().name(), "member_added");
        assert_eq!(b.recv().await.unwrap().name(), "member_added");
    }

    #[tokio::test]
    async fn slow_subscriber_sees_lag() {
        let hub = Hub::new(2);
        let mut slow = hub.subscribe();
        for count in 0..5 {
            hub.publish(Event::MembersReset { count });
        }
        match slow.recv().await {
            Err(RecvError::Lagged(missed)) => assert_eq!(missed, 3),
            other => panic!("expected lag, got {other:?}"),
        }
    }
}
