//! Family roster and live status merging.
//!
//! A [`RosterState`] is seeded from one bulk fetch and then patched by
//! sparse [`PartialStatusEvent`]s, one member at a time. Only fields present
//! in an event are written. Profile fields (name, avatar, relationship) are
//! never touched by status events. Events for members not in the roster are
//! dropped; membership changes need a fresh fetch.

use chrono::{DateTime, Duration, FixedOffset, Offset, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::record::{format_display, Coordinates};

/// A family member as shown in the roster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FamilyMember {
    /// Stable user identity.
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub avatar_ref: String,
    #[serde(default)]
    pub relationship_label: String,
    #[serde(default)]
    pub status_text: String,
    #[serde(default)]
    pub last_check_in_display: String,
    /// `None` means the member has never reported a position.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Coordinates>,
    /// Passed through unvalidated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery_level: Option<i32>,
    #[serde(default)]
    pub is_online: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

impl FamilyMember {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            avatar_ref: String::new(),
            relationship_label: String::new(),
            status_text: String::new(),
            last_check_in_display: String::new(),
            location: None,
            battery_level: None,
            is_online: false,
            last_updated: None,
        }
    }
}

/// Sparse status change for one member.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartialStatusEvent {
    pub member_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Coordinates>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_online: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery_level: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

impl PartialStatusEvent {
    pub fn new(member_id: impl Into<String>) -> Self {
        Self {
            member_id: member_id.into(),
            ..Self::default()
        }
    }

    pub fn location(mut self, location: Coordinates) -> Self {
        self.location = Some(location);
        self
    }

    pub fn status_text(mut self, text: impl Into<String>) -> Self {
        self.status_text = Some(text.into());
        self
    }

    pub fn online(mut self, is_online: bool) -> Self {
        self.is_online = Some(is_online);
        self
    }

    pub fn battery(mut self, level: i32) -> Self {
        self.battery_level = Some(level);
        self
    }

    pub fn at(mut self, when: DateTime<Utc>) -> Self {
        self.last_updated = Some(when);
        self
    }
}

/// How overlapping field updates for the same member are reconciled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    /// Every present field overwrites, in the order events arrive.
    #[default]
    ArrivalOrder,
    /// A field is not overwritten by an event whose `last_updated` is older
    /// than the timestamp that last wrote that field. Events without a
    /// timestamp still overwrite.
    TimestampGuarded,
}

/// Per-field write timestamps, used by [`MergePolicy::TimestampGuarded`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct FieldStamps {
    location: Option<DateTime<Utc>>,
    status_text: Option<DateTime<Utc>>,
    is_online: Option<DateTime<Utc>>,
    battery_level: Option<DateTime<Utc>>,
}

impl FieldStamps {
    fn seeded(at: Option<DateTime<Utc>>) -> Self {
        Self {
            location: at,
            status_text: at,
            is_online: at,
            battery_level: at,
        }
    }
}

/// Result of applying one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied {
        /// Fields written.
        updated: usize,
        /// Fields rejected by the timestamp guard.
        stale: usize,
    },
    UnknownMember,
}

enum FieldMerge {
    Absent,
    Updated,
    Stale,
}

/// Live roster for one session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RosterState {
    members: IndexMap<String, FamilyMember>,
    #[serde(skip)]
    stamps: IndexMap<String, FieldStamps>,
    #[serde(skip)]
    policy: MergePolicy,
    #[serde(skip)]
    display_offset: FixedOffset,
}

impl Default for RosterState {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

/// Seed a roster from a bulk fetch.
pub fn init_roster(members: impl IntoIterator<Item = FamilyMember>) -> RosterState {
    RosterState::new(members)
}

/// Pure reducer: the roster after `event`, leaving `state` untouched.
pub fn apply_update(state: &RosterState, event: &PartialStatusEvent) -> RosterState {
    let mut next = state.clone();
    next.apply(event);
    next
}

impl RosterState {
    /// Keyed by member id, in fetch order. A repeated id keeps its first
    /// position and the later profile.
    pub fn new(members: impl IntoIterator<Item = FamilyMember>) -> Self {
        let mut map = IndexMap::new();
        let mut stamps = IndexMap::new();
        for member in members {
            stamps.insert(member.id.clone(), FieldStamps::seeded(member.last_updated));
            map.insert(member.id.clone(), member);
        }
        Self {
            members: map,
            stamps,
            policy: MergePolicy::default(),
            display_offset: Utc.fix(),
        }
    }

    pub fn with_policy(mut self, policy: MergePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Offset used to render `last_check_in_display`.
    pub fn with_display_offset(mut self, offset: FixedOffset) -> Self {
        self.display_offset = offset;
        self
    }

    pub fn policy(&self) -> MergePolicy {
        self.policy
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&FamilyMember> {
        self.members.get(id)
    }

    pub fn members(&self) -> impl Iterator<Item = &FamilyMember> {
        self.members.values()
    }

    pub fn into_members(self) -> Vec<FamilyMember> {
        self.members.into_values().collect()
    }

    /// Everyone except the viewer.
    pub fn others<'a>(&'a self, self_id: &'a str) -> impl Iterator<Item = &'a FamilyMember> + 'a {
        self.members.values().filter(move |m| m.id != self_id)
    }

    /// Members whose last update is unknown or older than `threshold`.
    pub fn needing_attention(&self, now: DateTime<Utc>, threshold: Duration) -> Vec<&FamilyMember> {
        self.members
            .values()
            .filter(|m| match m.last_updated {
                Some(at) => now - at > threshold,
                None => true,
            })
            .collect()
    }

    /// Merge one event in place.
    pub fn apply(&mut self, event: &PartialStatusEvent) -> ApplyOutcome {
        let policy = self.policy;
        let offset = self.display_offset;
        let Some(member) = self.members.get_mut(&event.member_id) else {
            tracing::debug!(
                member_id = %event.member_id,
                "ignoring status event for unknown member"
            );
            return ApplyOutcome::UnknownMember;
        };
        let stamps = self.stamps.entry(event.member_id.clone()).or_default();
        let at = event.last_updated;

        let results = [
            merge_field(
                &mut member.location,
                event.location.map(Some),
                &mut stamps.location,
                at,
                policy,
            ),
            merge_field(
                &mut member.status_text,
                event.status_text.clone(),
                &mut stamps.status_text,
                at,
                policy,
            ),
            merge_field(
                &mut member.is_online,
                event.is_online,
                &mut stamps.is_online,
                at,
                policy,
            ),
            merge_field(
                &mut member.battery_level,
                event.battery_level.map(Some),
                &mut stamps.battery_level,
                at,
                policy,
            ),
        ];

        if let Some(at) = at {
            let newest = match (policy, member.last_updated) {
                (MergePolicy::TimestampGuarded, Some(seen)) => seen.max(at),
                _ => at,
            };
            member.last_updated = Some(newest);
            member.last_check_in_display =
                format_display(newest.with_timezone(&offset).naive_local());
        }

        let updated = results
            .iter()
            .filter(|r| matches!(r, FieldMerge::Updated))
            .count();
        let stale = results
            .iter()
            .filter(|r| matches!(r, FieldMerge::Stale))
            .count();
        if stale > 0 {
            tracing::debug!(
                member_id = %event.member_id,
                stale,
                "timestamp guard kept newer field values"
            );
        }
        ApplyOutcome::Applied { updated, stale }
    }
}

fn merge_field<T>(
    slot: &mut T,
    incoming: Option<T>,
    stamp: &mut Option<DateTime<Utc>>,
    at: Option<DateTime<Utc>>,
    policy: MergePolicy,
) -> FieldMerge {
    let Some(value) = incoming else {
        return FieldMerge::Absent;
    };
    if policy == MergePolicy::TimestampGuarded {
        if let (Some(at), Some(seen)) = (at, *stamp) {
            if at < seen {
                return FieldMerge::Stale;
            }
        }
    }
    *slot = value;
    if at.is_some() {
        *stamp = at;
    }
    FieldMerge::Updated
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn member(id: &str, online: bool, battery: i32) -> FamilyMember {
        FamilyMember {
            relationship_label: "แม่".to_string(),
            avatar_ref: "👵".to_string(),
            status_text: "สบายดี".to_string(),
            is_online: online,
            battery_level: Some(battery),
            ..FamilyMember::new(id, format!("Member {id}"))
        }
    }

    fn roster() -> RosterState {
        init_roster(vec![member("m1", false, 40), member("m2", true, 85)])
    }

    fn t(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 11, hour, 0, 0).unwrap()
    }

    #[test]
    fn partial_event_only_touches_present_fields() {
        let next = apply_update(&roster(), &PartialStatusEvent::new("m1").online(true));
        let m1 = next.get("m1").unwrap();
        assert!(m1.is_online);
        assert_eq!(m1.battery_level, Some(40));
        assert_eq!(m1.status_text, "สบายดี");
        assert_eq!(m1.location, None);
    }

    #[test]
    fn reducer_leaves_input_untouched() {
        let before = roster();
        let _ = apply_update(&before, &PartialStatusEvent::new("m1").battery(5));
        assert_eq!(before.get("m1").unwrap().battery_level, Some(40));
    }

    #[test]
    fn unknown_member_is_ignored() {
        let before = roster();
        let mut after = before.clone();
        let outcome = after.apply(&PartialStatusEvent::new("ghost").online(true).battery(1));

        assert_eq!(outcome, ApplyOutcome::UnknownMember);
        assert_eq!(after, before);
        assert_eq!(
            serde_json::to_string(&after).unwrap(),
            serde_json::to_string(&before).unwrap()
        );
    }

    #[test]
    fn other_members_are_untouched() {
        let next = apply_update(
            &roster(),
            &PartialStatusEvent::new("m1")
                .status_text("เดินทาง")
                .location(Coordinates {
                    latitude: 14.07,
                    longitude: 100.62,
                }),
        );
        assert_eq!(next.get("m2"), roster().get("m2"));
        assert_eq!(next.get("m1").unwrap().status_text, "เดินทาง");
    }

    #[test]
    fn profile_fields_survive_status_events() {
        let next = apply_update(
            &roster(),
            &PartialStatusEvent::new("m1").status_text("x").online(true).battery(1).at(t(3)),
        );
        let m1 = next.get("m1").unwrap();
        assert_eq!(m1.display_name, "Member m1");
        assert_eq!(m1.avatar_ref, "👵");
        assert_eq!(m1.relationship_label, "แม่");
    }

    #[test]
    fn arrival_order_lets_older_events_win() {
        let mut state = roster();
        state.apply(&PartialStatusEvent::new("m1").status_text("new").at(t(10)));
        state.apply(&PartialStatusEvent::new("m1").status_text("old").at(t(9)));

        let m1 = state.get("m1").unwrap();
        assert_eq!(m1.status_text, "old");
        assert_eq!(m1.last_updated, Some(t(9)));
    }

    #[test]
    fn timestamp_guard_rejects_stale_fields_only() {
        let mut state = roster().with_policy(MergePolicy::TimestampGuarded);
        state.apply(&PartialStatusEvent::new("m1").status_text("new").at(t(10)));
        let outcome = state.apply(
            &PartialStatusEvent::new("m1")
                .status_text("old")
                .battery(12)
                .at(t(9)),
        );

        assert_eq!(outcome, ApplyOutcome::Applied { updated: 1, stale: 1 });
        let m1 = state.get("m1").unwrap();
        assert_eq!(m1.status_text, "new");
        assert_eq!(m1.battery_level, Some(12));
        assert_eq!(m1.last_updated, Some(t(10)));
    }

    #[test]
    fn disjoint_fields_commute_under_either_order() {
        let a = PartialStatusEvent::new("m1").battery(70).at(t(8));
        let b = PartialStatusEvent::new("m1").online(true).at(t(8));

        let ab = apply_update(&apply_update(&roster(), &a), &b);
        let ba = apply_update(&apply_update(&roster(), &b), &a);
        assert_eq!(ab.get("m1"), ba.get("m1"));
    }

    #[test]
    fn last_check_in_display_follows_offset() {
        let offset = FixedOffset::east_opt(7 * 3600).unwrap();
        let state = roster().with_display_offset(offset);
        let next = apply_update(&state, &PartialStatusEvent::new("m2").at(t(3)));
        assert_eq!(next.get("m2").unwrap().last_check_in_display, "11/2/2569 10:00:00");
    }

    #[test]
    fn others_excludes_self() {
        let state = roster();
        let ids: Vec<_> = state.others("m1").map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["m2"]);
    }

    #[test]
    fn needing_attention_covers_stale_and_unknown() {
        let mut state = roster();
        state.apply(&PartialStatusEvent::new("m2").online(true).at(t(10)));

        let now = t(12);
        let ids: Vec<_> = state
            .needing_attention(now, Duration::hours(24))
            .into_iter()
            .map(|m| m.id.as_str())
            .collect();
        assert_eq!(ids, vec!["m1"]);

        let later = now + Duration::hours(30);
        assert_eq!(state.needing_attention(later, Duration::hours(24)).len(), 2);
    }

    #[test]
    fn event_json_omits_absent_fields() {
        let event: PartialStatusEvent =
            serde_json::from_str(r#"{"member_id":"m1","is_online":true}"#).unwrap();
        assert_eq!(event, PartialStatusEvent::new("m1").online(true));
    }
}
