use sqlx::SqliteConnection;

use crate::models::audit::NotificationKind;
use crate::models::order::OrderStatus;
use crate::repository::audit_repo;

/// Text sent to a customer when their order changes status.
pub fn order_status_message(
    order_id: i64,
    status: OrderStatus,
    driver_name: Option<&str>,
    reason: &str,
) -> String {
    match status {
        OrderStatus::Out => match driver_name {
            Some(name) => format!("Your order #{} is now Out for Delivery by {}.", order_id, name),
            None => format!("Your order #{} is now Out for Delivery.", order_id),
        },
        OrderStatus::Delivered => format!(
            "Your order #{} has been Delivered. Thank you for choosing our service!",
            order_id
        ),
        OrderStatus::Cancelled if !reason.trim().is_empty() => {
            format!("Your order #{} has been Cancelled. Reason: {}", order_id, reason)
        }
        OrderStatus::Cancelled => format!("Your order #{} has been Cancelled.", order_id),
        OrderStatus::Processing => format!(
            "Your order #{} status has been updated to {}.",
            order_id,
            status.label()
        ),
    }
}

/// Stores an in-app notification for the order's customer, if it has one.
pub async fn notify_customer(
    conn: &mut SqliteConnection,
    customer_id: Option<i64>,
    message: &str,
) -> sqlx::Result<()> {
    match customer_id {
        Some(profile_id) => {
            audit_repo::notify(conn, profile_id, NotificationKind::Inapp, message).await?;
            tracing::debug!(profile_id, "Customer notified");
            Ok(())
        }
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_for_delivery_names_the_driver() {
        assert_eq!(
            order_status_message(5, OrderStatus::Out, Some("Dan Cruz"), ""),
            "Your order #5 is now Out for Delivery by Dan Cruz."
        );
        assert_eq!(
            order_status_message(5, OrderStatus::Out, None, ""),
            "Your order #5 is now Out for Delivery."
        );
    }

    #[test]
    fn cancellation_includes_reason_when_given() {
        assert_eq!(
            order_status_message(9, OrderStatus::Cancelled, None, "Customer away"),
            "Your order #9 has been Cancelled. Reason: Customer away"
        );
        assert_eq!(
            order_status_message(9, OrderStatus::Cancelled, None, ""),
            "Your order #9 has been Cancelled."
        );
    }

    #[test]
    fn delivered_thanks_the_customer() {
        assert_eq!(
            order_status_message(1, OrderStatus::Delivered, None, ""),
            "Your order #1 has been Delivered. Thank you for choosing our service!"
        );
    }
}
