//! Tracker notification observer.
//!
//! Subscribes to the tracker's notifications, logs each one and feeds the
//! join/leave counters exposed on `/metrics`.

use domain::models::TrackerEvent;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::middleware::metrics::{record_invite_join, record_invite_leave};

/// Spawn the observer. It stops once the tracker is dropped.
pub fn spawn_observer(notifications: broadcast::Receiver<TrackerEvent>) -> JoinHandle<u64> {
    tokio::spawn(observe(notifications))
}

/// Consume notifications until the channel closes. Returns how many were seen.
pub async fn observe(mut notifications: broadcast::Receiver<TrackerEvent>) -> u64 {
    let mut seen = 0;
    loop {
        match notifications.recv().await {
            Ok(event) => {
                record_notification(&event);
                seen += 1;
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped = skipped, "Observer fell behind, notifications dropped");
            }
            Err(RecvError::Closed) => break,
        }
    }
    info!(seen = seen, "Tracker notifications closed, observer stopped");
    seen
}

fn record_notification(event: &TrackerEvent) {
    match event {
        TrackerEvent::InviteJoin { member, attribution } => {
            info!(
                guild_id = %member.guild_id,
                user_id = %member.user_id,
                username = ?member.username,
                join_type = %attribution.join_type,
                invite_code = ?attribution.invite_code,
                inviter_id = ?attribution.inviter_id,
                fake = attribution.fake,
                "inviteJoin"
            );
            record_invite_join(attribution.join_type.as_str(), attribution.fake);
        }
        TrackerEvent::InviteLeave { member, record } => {
            info!(
                guild_id = %member.guild_id,
                user_id = %member.user_id,
                inviter_id = ?record.as_ref().and_then(|r| r.inviter_id.as_deref()),
                invite_code = ?record.as_ref().and_then(|r| r.invite_code.as_deref()),
                "inviteLeave"
            );
            record_invite_leave(record.is_some());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use domain::models::{AttributionResult, Member};

    #[tokio::test]
    async fn test_observer_counts_until_closed() {
        let (tx, rx) = broadcast::channel(8);
        let handle = spawn_observer(rx);

        let member = Member::new("g", "1");
        tx.send(TrackerEvent::InviteJoin {
            member: member.clone(),
            attribution: AttributionResult::unknown("g", "1", false, Utc::now()),
        })
        .unwrap();
        tx.send(TrackerEvent::InviteLeave {
            member,
            record: None,
        })
        .unwrap();
        drop(tx);

        assert_eq!(handle.await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_observer_stops_without_events() {
        let (tx, rx) = broadcast::channel::<TrackerEvent>(1);
        drop(tx);
        assert_eq!(observe(rx).await, 0);
    }
}
