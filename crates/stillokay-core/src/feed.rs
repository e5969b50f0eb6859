//! Realtime roster feed.
//!
//! Transport is out of scope: whatever delivers `user_status` rows (a
//! realtime channel, polling, a replay file) decodes them with
//! [`RealtimePayload`] and publishes the resulting events on a
//! [`StatusBroker`]. A [`RosterSession`] subscribed to the broker folds
//! them into its roster in arrival order.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};

use crate::error::Result;
use crate::record::Coordinates;
use crate::roster::{ApplyOutcome, FamilyMember, MergePolicy, PartialStatusEvent, RosterState};

/// Default broker buffer; slow subscribers beyond this lag and skip events.
pub const DEFAULT_BROKER_CAPACITY: usize = 256;

/// Bulk, point-in-time roster fetch.
pub trait RosterSource {
    fn fetch_members(&self) -> Result<Vec<FamilyMember>>;
}

/// Fixed member list, e.g. loaded from a file.
#[derive(Debug, Clone, Default)]
pub struct StaticRoster(pub Vec<FamilyMember>);

impl RosterSource for StaticRoster {
    fn fetch_members(&self) -> Result<Vec<FamilyMember>> {
        Ok(self.0.clone())
    }
}

/// One row of the `user_status` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusRow {
    pub user_id: String,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub status_text: Option<String>,
    #[serde(default)]
    pub battery_level: Option<i32>,
    #[serde(default)]
    pub is_online: Option<bool>,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

impl From<StatusRow> for PartialStatusEvent {
    fn from(row: StatusRow) -> Self {
        let location = match (row.latitude, row.longitude) {
            (Some(latitude), Some(longitude)) => Some(Coordinates {
                latitude,
                longitude,
            }),
            _ => None,
        };
        PartialStatusEvent {
            member_id: row.user_id,
            location,
            status_text: row.status_text,
            is_online: row.is_online,
            battery_level: row.battery_level,
            last_updated: row.last_updated,
        }
    }
}

/// Change notification envelope as delivered by the realtime channel.
#[derive(Debug, Clone, Deserialize)]
pub struct RealtimePayload {
    #[serde(rename = "eventType")]
    pub event_type: String,
    #[serde(default)]
    pub new: Option<StatusRow>,
}

impl RealtimePayload {
    /// Only `UPDATE` notifications carrying a row become status events.
    pub fn into_event(self) -> Option<PartialStatusEvent> {
        if self.event_type != "UPDATE" {
            return None;
        }
        self.new.map(PartialStatusEvent::from)
    }
}

/// In-process fan-out of status events.
#[derive(Debug, Clone)]
pub struct StatusBroker {
    tx: broadcast::Sender<PartialStatusEvent>,
}

impl Default for StatusBroker {
    fn default() -> Self {
        Self::new(DEFAULT_BROKER_CAPACITY)
    }
}

impl StatusBroker {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish to every live subscriber. Returns how many received it.
    pub fn publish(&self, event: PartialStatusEvent) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> Subscription {
        Subscription {
            rx: Some(self.tx.subscribe()),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Receiving end of a broker. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    rx: Option<broadcast::Receiver<PartialStatusEvent>>,
}

impl Subscription {
    /// Wait for the next event. `None` once unsubscribed or the broker is gone.
    pub async fn next(&mut self) -> Option<PartialStatusEvent> {
        loop {
            let rx = self.rx.as_mut()?;
            match rx.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "roster subscription lagged, events dropped");
                }
                Err(RecvError::Closed) => {
                    self.rx = None;
                    return None;
                }
            }
        }
    }

    /// Next already-delivered event, without waiting.
    pub fn try_next(&mut self) -> Option<PartialStatusEvent> {
        loop {
            let rx = self.rx.as_mut()?;
            match rx.try_recv() {
                Ok(event) => return Some(event),
                Err(TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "roster subscription lagged, events dropped");
                }
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Closed) => {
                    self.rx = None;
                    return None;
                }
            }
        }
    }

    pub fn unsubscribe(&mut self) {
        if self.rx.take().is_some() {
            tracing::debug!("roster subscription closed");
        }
    }

    pub fn is_active(&self) -> bool {
        self.rx.is_some()
    }
}

/// Running tally of what a session has applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub applied: usize,
    pub ignored: usize,
    pub stale_fields: usize,
}

/// Roster owned by one screen or session.
#[derive(Debug)]
pub struct RosterSession {
    state: RosterState,
    self_id: Option<String>,
    stats: SessionStats,
}

impl RosterSession {
    /// Seed the roster from one bulk fetch.
    ///
    /// # Errors
    /// Returns an error if the source fails to fetch.
    pub fn start(source: &dyn RosterSource, policy: MergePolicy) -> Result<Self> {
        let members = source.fetch_members()?;
        tracing::info!(members = members.len(), ?policy, "roster session started");
        Ok(Self {
            state: RosterState::new(members).with_policy(policy),
            self_id: None,
            stats: SessionStats::default(),
        })
    }

    /// Identity of the viewer, excluded from [`RosterSession::others`].
    pub fn with_self_id(mut self, self_id: impl Into<String>) -> Self {
        self.self_id = Some(self_id.into());
        self
    }

    pub fn with_display_offset(mut self, offset: FixedOffset) -> Self {
        self.state = self.state.with_display_offset(offset);
        self
    }

    pub fn state(&self) -> &RosterState {
        &self.state
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    pub fn into_state(self) -> RosterState {
        self.state
    }

    /// Other family members, or everyone if no self id is set.
    pub fn others(&self) -> Vec<&FamilyMember> {
        match &self.self_id {
            Some(id) => self.state.others(id).collect(),
            None => self.state.members().collect(),
        }
    }

    pub fn apply(&mut self, event: &PartialStatusEvent) -> ApplyOutcome {
        let outcome = self.state.apply(event);
        match outcome {
            ApplyOutcome::Applied { stale, .. } => {
                self.stats.applied += 1;
                self.stats.stale_fields += stale;
            }
            ApplyOutcome::UnknownMember => self.stats.ignored += 1,
        }
        outcome
    }

    /// Apply every event already waiting on `subscription`.
    pub fn drain(&mut self, subscription: &mut Subscription) -> usize {
        let mut count = 0;
        while let Some(event) = subscription.try_next() {
            self.apply(&event);
            count += 1;
        }
        count
    }

    /// Apply events until the subscription ends.
    pub async fn run(&mut self, mut subscription: Subscription) -> SessionStats {
        while let Some(event) = subscription.next().await {
            self.apply(&event);
        }
        tracing::info!(
            applied = self.stats.applied,
            ignored = self.stats.ignored,
            "roster feed ended"
        );
        self.stats
    }
}
