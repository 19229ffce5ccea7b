use chrono::Utc;
use sqlx::types::Json;
use sqlx::SqliteConnection;

use crate::models::audit::{
    ActivityLog, CancelledOrder, HistoryFilter, Notification, NotificationKind, OrderHistoryEntry,
};

pub async fn record_history(
    conn: &mut SqliteConnection,
    order_id: i64,
    status: &str,
    updated_by: Option<i64>,
) -> sqlx::Result<()> {
    sqlx::query(
        "INSERT INTO order_history (order_id, status, timestamp, updated_by) VALUES (?, ?, ?, ?)",
    )
    .bind(order_id)
    .bind(status)
    .bind(Utc::now())
    .bind(updated_by)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn history(
    conn: &mut SqliteConnection,
    filter: &HistoryFilter,
) -> sqlx::Result<Vec<OrderHistoryEntry>> {
    sqlx::query_as::<_, OrderHistoryEntry>(
        "SELECT h.id, h.order_id AS \"order\", h.status, h.timestamp, h.updated_by,
                u.username AS updated_by_name
         FROM order_history h
         LEFT JOIN profiles p ON p.id = h.updated_by
         LEFT JOIN users u ON u.id = p.user_id
         WHERE (?1 IS NULL OR h.status = ?1) AND (?2 IS NULL OR h.order_id = ?2)
         ORDER BY h.timestamp DESC, h.id DESC",
    )
    .bind(filter.status.as_deref())
    .bind(filter.order)
    .fetch_all(&mut *conn)
    .await
}

/// Records the cancellation; a second cancellation of the same order keeps the first record.
pub async fn record_cancellation(
    conn: &mut SqliteConnection,
    order_id: i64,
    reason: &str,
    cancelled_by: Option<i64>,
) -> sqlx::Result<()> {
    sqlx::query(
        "INSERT INTO cancelled_orders (order_id, reason, cancelled_at, cancelled_by)
         VALUES (?, ?, ?, ?)
         ON CONFLICT (order_id) DO NOTHING",
    )
    .bind(order_id)
    .bind(reason)
    .bind(Utc::now())
    .bind(cancelled_by)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn cancellations(conn: &mut SqliteConnection) -> sqlx::Result<Vec<CancelledOrder>> {
    sqlx::query_as::<_, CancelledOrder>(
        "SELECT c.id, c.order_id AS \"order\", c.order_id, u.username AS customer_name,
                o.total_amount, c.reason, c.cancelled_at, c.cancelled_by
         FROM cancelled_orders c
         JOIN orders o ON o.id = c.order_id
         LEFT JOIN profiles p ON p.id = o.customer_id
         LEFT JOIN users u ON u.id = p.user_id
         ORDER BY c.cancelled_at DESC, c.id DESC",
    )
    .fetch_all(&mut *conn)
    .await
}

pub async fn log_activity(
    conn: &mut SqliteConnection,
    actor: Option<i64>,
    action: &str,
    entity: &str,
    meta: serde_json::Value,
) -> sqlx::Result<()> {
    sqlx::query(
        "INSERT INTO activity_logs (actor_id, action, entity, meta, timestamp) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(actor)
    .bind(action)
    .bind(entity)
    .bind(Json(meta))
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Activity entries newest first; `actor` narrows to one profile.
pub async fn activity(
    conn: &mut SqliteConnection,
    actor: Option<i64>,
) -> sqlx::Result<Vec<ActivityLog>> {
    sqlx::query_as::<_, ActivityLog>(
        "SELECT l.id, l.actor_id AS actor, u.username AS actor_username,
                p.first_name AS actor_first_name, p.last_name AS actor_last_name,
                p.role AS actor_role, l.action, l.entity, l.meta, l.timestamp
         FROM activity_logs l
         LEFT JOIN profiles p ON p.id = l.actor_id
         LEFT JOIN users u ON u.id = p.user_id
         WHERE (?1 IS NULL OR l.actor_id = ?1)
         ORDER BY l.timestamp DESC, l.id DESC",
    )
    .bind(actor)
    .fetch_all(&mut *conn)
    .await
}

pub async fn notify(
    conn: &mut SqliteConnection,
    profile_id: i64,
    kind: NotificationKind,
    message: &str,
) -> sqlx::Result<()> {
    sqlx::query(
        "INSERT INTO notifications (profile_id, kind, message, sent_at, is_read) VALUES (?, ?, ?, ?, 0)",
    )
    .bind(profile_id)
    .bind(kind)
    .bind(message)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn notifications(
    conn: &mut SqliteConnection,
    profile_id: i64,
) -> sqlx::Result<Vec<Notification>> {
    sqlx::query_as::<_, Notification>(
        "SELECT n.id, n.profile_id AS user, u.username AS user_username, n.kind, n.message,
                n.sent_at, n.is_read
         FROM notifications n
         JOIN profiles p ON p.id = n.profile_id
         LEFT JOIN users u ON u.id = p.user_id
         WHERE n.profile_id = ?
         ORDER BY n.sent_at DESC, n.id DESC",
    )
    .bind(profile_id)
    .fetch_all(&mut *conn)
    .await
}

/// Marks one of the profile's notifications read; false if it is not theirs.
pub async fn mark_read(
    conn: &mut SqliteConnection,
    profile_id: i64,
    notification_id: i64,
) -> sqlx::Result<bool> {
    let result = sqlx::query("UPDATE notifications SET is_read = 1 WHERE id = ? AND profile_id = ?")
        .bind(notification_id)
        .bind(profile_id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn mark_all_read(conn: &mut SqliteConnection, profile_id: i64) -> sqlx::Result<u64> {
    let result = sqlx::query("UPDATE notifications SET is_read = 1 WHERE profile_id = ? AND is_read = 0")
        .bind(profile_id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected())
}
