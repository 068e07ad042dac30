//! Notification persistence.

use rusqlite::{params, OptionalExtension, Row};

use loomnet_core::error::Result;
use loomnet_domain::{Notification, NotificationStatus};

use crate::{parse_text, Store};

fn map_notification(row: &Row<'_>) -> rusqlite::Result<Notification> {
    Ok(Notification {
        notification_id: row.get(0)?,
        identity: row.get(1)?,
        kind: row.get(2)?,
        body: row.get(3)?,
        status: parse_text(4, row.get::<_, String>(4)?)?,
        created_at: row.get(5)?,
        expires_at: row.get(6)?,
    })
}

impl Store {
    /// Queue a notification for an identity.
    pub fn insert_notification(&self, notification: &Notification) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO notifications (notification_id, identity, kind, body, \
                 status, created_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    notification.notification_id,
                    notification.identity,
                    notification.kind,
                    notification.body,
                    notification.status.as_str(),
                    notification.created_at,
                    notification.expires_at,
                ],
            )?;
            Ok(())
        })
    }

    /// Fetch a notification by id.
    pub fn get_notification(&self, notification_id: &str) -> Result<Option<Notification>> {
        self.with_conn(|conn| {
            let notification = conn
                .query_row(
                    "SELECT notification_id, identity, kind, body, status, created_at, \
                     expires_at
                     FROM notifications WHERE notification_id = ?1",
                    params![notification_id],
                    map_notification,
                )
                .optional()?;
            Ok(notification)
        })
    }

    /// Unread notifications queued for an identity, oldest first.
    pub fn unread_notifications_for(&self, identity: &str) -> Result<Vec<Notification>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT notification_id, identity, kind, body, status, created_at, \
                 expires_at
                 FROM notifications
                 WHERE identity = ?1 AND status = 'unread'
                 ORDER BY created_at ASC, notification_id ASC",
            )?;
            let notifications = stmt
                .query_map(params![identity], map_notification)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(notifications)
        })
    }

    /// Acknowledge an unread notification. Zero rows means it was already
    /// acknowledged or expired.
    pub fn acknowledge_notification(&self, notification_id: &str) -> Result<usize> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE notifications SET status = 'acknowledged'
                 WHERE notification_id = ?1 AND status = 'unread'",
                params![notification_id],
            )?;
            Ok(changed)
        })
    }

    /// Expire unacknowledged notifications past their deadline. Idempotent.
    pub fn expire_notifications(&self, now_ms: i64) -> Result<usize> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE notifications SET status = 'expired'
                 WHERE status = 'unread' AND expires_at < ?1",
                params![now_ms],
            )?;
            Ok(changed)
        })
    }
}
