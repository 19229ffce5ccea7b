//! Order fulfillment: order intake, status processing, driver assignment,
//! delivery completion against deployment stock, and container returns.
//!
//! Every function here expects to run inside the caller's transaction so a
//! failure at any step leaves no partial writes behind.

use chrono::Utc;
use serde_json::json;
use sqlx::SqliteConnection;

use crate::error::{AppError, AppResult};
use crate::models::delivery::{Delivery, DeliveryPatch, DeliveryStatus, NewDelivery};
use crate::models::fleet::{check_stock, Deployment, DeploymentStatus};
use crate::models::order::{
    is_walk_in_note, DriverChange, NewOrder, Order, OrderPatch, OrderStatus, ProcessOrder,
};
use crate::models::user::{Account, Profile, Role};
use crate::repository::order_repo::OrderRecord;
use crate::repository::{audit_repo, delivery_repo, fleet_repo, order_repo, product_repo, user_repo};
use crate::services::accounts::WALK_IN_USERNAME;
use crate::services::{containers, notification};

fn order_entity(id: i64) -> String {
    format!("order:{}", id)
}

fn delivery_entity(id: i64) -> String {
    format!("delivery:{}", id)
}

async fn load_order(conn: &mut SqliteConnection, id: i64) -> AppResult<Order> {
    order_repo::find(conn, id)
        .await?
        .ok_or_else(|| AppError::not_found("Order not found."))
}

async fn load_driver(conn: &mut SqliteConnection, id: i64) -> AppResult<Profile> {
    user_repo::find_profile(conn, id)
        .await?
        .filter(|p| p.role == Role::Driver)
        .ok_or_else(|| AppError::not_found("Driver not found"))
}

/// Places an order and returns its id.
pub async fn create_order(
    conn: &mut SqliteConnection,
    actor: &Account,
    input: NewOrder,
) -> AppResult<i64> {
    if input.quantity < 1 {
        return Err(AppError::validation(
            "quantity",
            "Ensure this value is greater than or equal to 1.",
        ));
    }
    let product = product_repo::find(conn, input.product)
        .await?
        .ok_or_else(|| {
            AppError::validation(
                "product",
                format!("Invalid pk \"{}\" - object does not exist.", input.product),
            )
        })?;

    let customer_id = if actor.is_customer() {
        Some(actor.profile_id())
    } else if let Some(requested) = input.customer {
        let customer = user_repo::find_profile(conn, requested)
            .await?
            .filter(|p| p.role.is_customer())
            .ok_or_else(|| AppError::forbidden("Invalid customer specified"))?;
        Some(customer.id)
    } else if is_walk_in_note(&input.notes) {
        user_repo::find_profile_by_username(conn, WALK_IN_USERNAME)
            .await?
            .filter(|p| p.role.is_customer())
            .map(|p| p.id)
    } else {
        None
    };

    let record = OrderRecord {
        product_id: product.id,
        customer_id,
        quantity: input.quantity,
        total_amount: product.price.times(input.quantity),
        notes: input.notes,
    };
    let order_id = order_repo::insert(conn, &record).await?;

    audit_repo::record_history(
        conn,
        order_id,
        OrderStatus::Processing.as_str(),
        Some(actor.profile_id()),
    )
    .await?;
    audit_repo::log_activity(
        conn,
        Some(actor.profile_id()),
        "create_order",
        &order_entity(order_id),
        json!({
            "product": product.id,
            "quantity": record.quantity,
            "customer": customer_id,
            "total_amount": record.total_amount,
        }),
    )
    .await?;

    tracing::info!(order_id, product_id = product.id, quantity = record.quantity, "Order created");
    Ok(order_id)
}

/// Edits quantity, product or notes of an order that is still open.
pub async fn update_order(
    conn: &mut SqliteConnection,
    order_id: i64,
    patch: OrderPatch,
) -> AppResult<()> {
    let mut order = load_order(conn, order_id).await?;
    if order.status.is_final() {
        return Err(AppError::bad_request("Order is already in a final state."));
    }

    if let Some(quantity) = patch.quantity {
        if quantity < 1 {
            return Err(AppError::validation(
                "quantity",
                "Ensure this value is greater than or equal to 1.",
            ));
        }
        order.quantity = quantity;
    }
    if let Some(product_id) = patch.product {
        order.product_id = Some(product_id);
    }
    if let Some(notes) = patch.notes {
        order.notes = notes;
    }

    let product_id = order
        .product_id
        .ok_or_else(|| AppError::validation("product", "This field is required."))?;
    let product = product_repo::find(conn, product_id).await?.ok_or_else(|| {
        AppError::validation(
            "product",
            format!("Invalid pk \"{}\" - object does not exist.", product_id),
        )
    })?;
    order.total_amount = product.price.times(order.quantity);

    order_repo::update(conn, &order).await?;
    Ok(())
}

/// Handles `POST /orders/{id}/process`: status change and/or driver assignment.
pub async fn process_order(
    conn: &mut SqliteConnection,
    actor: &Account,
    order_id: i64,
    request: ProcessOrder,
) -> AppResult<()> {
    let mut order = load_order(conn, order_id).await?;

    let target = match request.status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => Some(
            raw.parse::<OrderStatus>()
                .map_err(|_| AppError::bad_request("Invalid status"))?,
        ),
        None => None,
    };

    if order.status.is_final() {
        return Err(AppError::bad_request("Order is already in a final state."));
    }

    let walk_in = order.is_walk_in();
    match actor.role() {
        Role::Admin | Role::Staff => {
            if let Some(status) = target {
                let allowed = matches!(
                    status,
                    OrderStatus::Processing | OrderStatus::Out | OrderStatus::Cancelled
                ) || (status == OrderStatus::Delivered && walk_in);
                if !allowed {
                    return Err(AppError::forbidden("Not allowed for your role"));
                }
            }
        }
        Role::Driver => {
            if let Some(status) = target {
                if !matches!(status, OrderStatus::Delivered | OrderStatus::Cancelled) {
                    return Err(AppError::forbidden("Not allowed for your role"));
                }
            }
            if request.driver_id != DriverChange::Keep {
                return Err(AppError::forbidden("Not allowed for your role"));
            }
            let delivery = delivery_repo::find_by_order(conn, order.id)
                .await?
                .ok_or_else(|| AppError::bad_request("No delivery assigned"))?;
            if delivery.driver_id != Some(actor.profile_id()) {
                return Err(AppError::forbidden("You are not assigned to this delivery"));
            }
        }
        _ => {
            return Err(AppError::forbidden(
                "Only staff, admin or driver may update order status",
            ))
        }
    }

    let target = target.filter(|status| *status != order.status);
    if let Some(status) = target {
        if !order.status.can_transition(status, walk_in) {
            return Err(AppError::bad_request(format!(
                "Cannot change status from {} to {}",
                order.status, status
            )));
        }
    }

    let resulting_status = target.unwrap_or(order.status);
    match request.driver_id {
        DriverChange::Keep => {}
        DriverChange::Unassign => {
            delivery_repo::delete_for_order(conn, order.id).await?;
            audit_repo::log_activity(
                conn,
                Some(actor.profile_id()),
                "unassign_driver",
                &order_entity(order.id),
                json!({}),
            )
            .await?;
            tracing::info!(order_id = order.id, "Driver unassigned");
        }
        DriverChange::Assign(driver_id) => {
            assign_driver(conn, actor, &order, driver_id, resulting_status).await?;
        }
    }

    let Some(status) = target else {
        return Ok(());
    };

    let notes = request.notes.unwrap_or_default();
    if !notes.is_empty() {
        order.notes = notes.clone();
        order_repo::update(conn, &order).await?;
    }

    match status {
        OrderStatus::Delivered => {
            let delivery = match delivery_repo::find_by_order(conn, order.id).await? {
                Some(delivery) => delivery,
                None => {
                    let id = delivery_repo::insert(
                        conn,
                        order.id,
                        None,
                        None,
                        None,
                        DeliveryStatus::Pending,
                    )
                    .await?;
                    delivery_repo::find(conn, id)
                        .await?
                        .ok_or_else(|| anyhow::anyhow!("delivery {} vanished after insert", id))?
                }
            };
            let completion = Completion {
                delivered_quantity: None,
                returned_containers: None,
                use_deployment: !walk_in,
            };
            complete_delivery(conn, actor, &order, delivery, completion).await?;
        }
        OrderStatus::Cancelled => {
            cancel_order(conn, actor, &order, &notes).await?;
        }
        OrderStatus::Out | OrderStatus::Processing => {
            let from = order.status;
            order_repo::set_status(conn, order.id, status).await?;

            let mut driver_name = None;
            if let Some(mut delivery) = delivery_repo::find_by_order(conn, order.id).await? {
                if status == OrderStatus::Out && delivery.status == DeliveryStatus::Pending {
                    delivery.status = DeliveryStatus::Assigned;
                    delivery_repo::update(conn, &delivery).await?;
                }
                if let Some(driver_id) = delivery.driver_id {
                    driver_name = driver_display_name(conn, driver_id).await?;
                }
            }

            audit_repo::record_history(conn, order.id, status.as_str(), Some(actor.profile_id()))
                .await?;
            audit_repo::log_activity(
                conn,
                Some(actor.profile_id()),
                "update_order_status",
                &order_entity(order.id),
                json!({ "from": from, "to": status, "notes": notes }),
            )
            .await?;
            let message = notification::order_status_message(
                order.id,
                status,
                driver_name.as_deref(),
                &notes,
            );
            notification::notify_customer(conn, order.customer_id, &message).await?;

            tracing::info!(order_id = order.id, from = %from, to = %status, "Order status changed");
        }
    }

    Ok(())
}

async fn driver_display_name(
    conn: &mut SqliteConnection,
    driver_id: i64,
) -> AppResult<Option<String>> {
    Ok(user_repo::find_account_by_profile(conn, driver_id)
        .await?
        .map(|account| account.user.display_name()))
}

/// Creates or retargets the order's delivery to `driver_id`, taking vehicle
/// and route from the driver's latest active deployment.
async fn assign_driver(
    conn: &mut SqliteConnection,
    actor: &Account,
    order: &Order,
    driver_id: i64,
    order_status: OrderStatus,
) -> AppResult<()> {
    let driver = load_driver(conn, driver_id).await?;
    let deployment = fleet_repo::latest_deployment(conn, driver.id, true, None).await?;
    let vehicle_id = deployment.as_ref().map(|d| d.vehicle_id);
    let route_id = deployment.as_ref().map(|d| d.route_id);
    let status = if order_status == OrderStatus::Out {
        DeliveryStatus::Assigned
    } else {
        DeliveryStatus::Pending
    };

    let delivery_id = match delivery_repo::find_by_order(conn, order.id).await? {
        Some(mut delivery) => {
            if delivery.status.is_final() {
                return Err(AppError::bad_request("Delivery is already in a final state."));
            }
            delivery.driver_id = Some(driver.id);
            delivery.vehicle_id = vehicle_id;
            delivery.route_id = route_id;
            if delivery.status != DeliveryStatus::InRoute {
                delivery.status = status;
            }
            delivery_repo::update(conn, &delivery).await?;
            delivery.id
        }
        None => {
            delivery_repo::insert(conn, order.id, Some(driver.id), vehicle_id, route_id, status)
                .await?
        }
    };

    audit_repo::log_activity(
        conn,
        Some(actor.profile_id()),
        "assign_driver",
        &order_entity(order.id),
        json!({
            "driver_id": driver.id,
            "delivery_id": delivery_id,
            "deployment_id": deployment.as_ref().map(|d| d.id),
        }),
    )
    .await?;
    tracing::info!(order_id = order.id, driver_id = driver.id, delivery_id, "Driver assigned");
    Ok(())
}

/// Quantities supplied when a delivery is completed.
#[derive(Debug, Clone, Copy)]
pub struct Completion {
    pub delivered_quantity: Option<i64>,
    pub returned_containers: Option<i64>,
    /// Draw the delivered units from the driver's active deployment.
    pub use_deployment: bool,
}

/// Marks the delivery and its order delivered, drawing stock from the
/// driver's latest active deployment for the ordered product.
pub async fn complete_delivery(
    conn: &mut SqliteConnection,
    actor: &Account,
    order: &Order,
    mut delivery: Delivery,
    completion: Completion,
) -> AppResult<()> {
    let quantity = completion.delivered_quantity.unwrap_or(order.quantity);
    if quantity < 1 || quantity > order.quantity {
        return Err(AppError::validation(
            "delivered_quantity",
            format!(
                "Delivered quantity must be between 1 and the ordered quantity ({}).",
                order.quantity
            ),
        ));
    }
    let returned = completion.returned_containers.unwrap_or(0);
    if returned < 0 || returned > quantity {
        return Err(AppError::validation(
            "returned_containers",
            format!(
                "Returned containers must be between 0 and the delivered quantity ({}).",
                quantity
            ),
        ));
    }
    let product_id = order
        .product_id
        .ok_or_else(|| AppError::bad_request("Order has no product."))?;

    let deployment_id = if completion.use_deployment {
        let driver_id = delivery
            .driver_id
            .ok_or_else(|| AppError::bad_request("Delivery has no driver assigned."))?;
        let deployment = fleet_repo::latest_deployment(conn, driver_id, true, Some(product_id))
            .await?
            .ok_or_else(|| {
                AppError::bad_request("No active deployment found for this driver and product.")
            })?;
        if !fleet_repo::draw_stock(conn, deployment.id, quantity, returned).await? {
            return Err(AppError::bad_request(format!(
                "Insufficient stock: deployment has {} left but {} were delivered.",
                deployment.stock, quantity
            )));
        }
        Some(deployment.id)
    } else {
        None
    };

    delivery.status = DeliveryStatus::Delivered;
    delivery.delivered_quantity = Some(quantity);
    delivery.returned_containers = returned;
    delivery.delivered_at = Some(Utc::now());
    delivery_repo::update(conn, &delivery).await?;
    order_repo::set_status(conn, order.id, OrderStatus::Delivered).await?;

    if let Some(customer_id) = order.customer_id {
        containers::apply_delta(conn, customer_id, product_id, quantity - returned).await?;
    }

    audit_repo::record_history(
        conn,
        order.id,
        OrderStatus::Delivered.as_str(),
        Some(actor.profile_id()),
    )
    .await?;
    audit_repo::log_activity(
        conn,
        Some(actor.profile_id()),
        "complete_delivery",
        &delivery_entity(delivery.id),
        json!({
            "order_id": order.id,
            "delivered_quantity": quantity,
            "returned_containers": returned,
            "deployment_id": deployment_id,
        }),
    )
    .await?;
    let message =
        notification::order_status_message(order.id, OrderStatus::Delivered, None, "");
    notification::notify_customer(conn, order.customer_id, &message).await?;

    tracing::info!(
        order_id = order.id,
        delivery_id = delivery.id,
        quantity,
        returned,
        deployment_id,
        "Delivery completed"
    );
    Ok(())
}

/// Cancels the order and its open delivery, keeping one cancellation record.
async fn cancel_order(
    conn: &mut SqliteConnection,
    actor: &Account,
    order: &Order,
    reason: &str,
) -> AppResult<()> {
    let from = order.status;
    order_repo::set_status(conn, order.id, OrderStatus::Cancelled).await?;

    if let Some(mut delivery) = delivery_repo::find_by_order(conn, order.id).await? {
        if !delivery.status.is_final() {
            delivery.status = DeliveryStatus::Cancelled;
            delivery_repo::update(conn, &delivery).await?;
        }
    }

    audit_repo::record_cancellation(conn, order.id, reason, Some(actor.profile_id())).await?;
    audit_repo::record_history(
        conn,
        order.id,
        OrderStatus::Cancelled.as_str(),
        Some(actor.profile_id()),
    )
    .await?;
    audit_repo::log_activity(
        conn,
        Some(actor.profile_id()),
        "update_order_status",
        &order_entity(order.id),
        json!({ "from": from, "to": OrderStatus::Cancelled, "notes": reason }),
    )
    .await?;
    let message =
        notification::order_status_message(order.id, OrderStatus::Cancelled, None, reason);
    notification::notify_customer(conn, order.customer_id, &message).await?;

    tracing::info!(order_id = order.id, from = %from, "Order cancelled");
    Ok(())
}

/// Handles `PATCH /deliveries/{id}`.
pub async fn update_delivery(
    conn: &mut SqliteConnection,
    actor: &Account,
    delivery_id: i64,
    patch: DeliveryPatch,
) -> AppResult<()> {
    let mut delivery = delivery_repo::find(conn, delivery_id)
        .await?
        .ok_or_else(|| AppError::not_found("Delivery not found."))?;

    match actor.role() {
        Role::Admin => {}
        Role::Driver if delivery.driver_id == Some(actor.profile_id()) => {}
        Role::Driver => {
            return Err(AppError::forbidden("You are not assigned to this delivery"));
        }
        _ => {
            return Err(AppError::forbidden(
                "You do not have permission to perform this action.",
            ))
        }
    }

    if patch.vehicle.is_some() || patch.route.is_some() {
        if actor.role() != Role::Admin {
            return Err(AppError::forbidden(
                "Only admins can reassign the vehicle or route.",
            ));
        }
        if let Some(vehicle_id) = patch.vehicle {
            fleet_repo::find_vehicle(conn, vehicle_id).await?.ok_or_else(|| {
                AppError::validation(
                    "vehicle",
                    format!("Invalid pk \"{}\" - object does not exist.", vehicle_id),
                )
            })?;
            delivery.vehicle_id = Some(vehicle_id);
        }
        if let Some(route_id) = patch.route {
            fleet_repo::find_route(conn, route_id).await?.ok_or_else(|| {
                AppError::validation(
                    "route",
                    format!("Invalid pk \"{}\" - object does not exist.", route_id),
                )
            })?;
            delivery.route_id = Some(route_id);
        }
        delivery_repo::update(conn, &delivery).await?;
    }

    let target = match patch.status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => Some(raw.parse::<DeliveryStatus>().map_err(|_| {
            AppError::validation("status", format!("\"{}\" is not a valid choice.", raw))
        })?),
        None => None,
    };

    let Some(status) = target.filter(|s| *s != delivery.status) else {
        if delivery.status == DeliveryStatus::Delivered {
            if let Some(returned) = patch.returned_containers {
                let order = load_order(conn, delivery.order_id).await?;
                reconcile_returns(conn, actor, &order, delivery, returned).await?;
            }
        }
        return Ok(());
    };

    if delivery.status.is_final() {
        return Err(AppError::bad_request("Delivery is already in a final state."));
    }
    if !delivery.status.can_transition(status) {
        return Err(AppError::bad_request(format!(
            "Cannot change delivery status from {} to {}",
            delivery.status, status
        )));
    }

    let order = load_order(conn, delivery.order_id).await?;
    let from = delivery.status;

    match status {
        DeliveryStatus::Delivered => {
            if order.status.is_final() {
                return Err(AppError::bad_request("Order is already in a final state."));
            }
            let completion = Completion {
                delivered_quantity: patch.delivered_quantity,
                returned_containers: patch.returned_containers,
                use_deployment: true,
            };
            complete_delivery(conn, actor, &order, delivery, completion).await?;
        }
        DeliveryStatus::Cancelled => {
            delivery.status = DeliveryStatus::Cancelled;
            delivery_repo::update(conn, &delivery).await?;
            if !order.status.is_final() {
                cancel_order(conn, actor, &order, "").await?;
            }
        }
        DeliveryStatus::InRoute => {
            delivery.status = DeliveryStatus::InRoute;
            delivery_repo::update(conn, &delivery).await?;

            if order.status == OrderStatus::Processing {
                order_repo::set_status(conn, order.id, OrderStatus::Out).await?;
                audit_repo::record_history(
                    conn,
                    order.id,
                    OrderStatus::Out.as_str(),
                    Some(actor.profile_id()),
                )
                .await?;
            }
            let driver_name = match delivery.driver_id {
                Some(driver_id) => driver_display_name(conn, driver_id).await?,
                None => None,
            };
            let message = notification::order_status_message(
                order.id,
                OrderStatus::Out,
                driver_name.as_deref(),
                "",
            );
            notification::notify_customer(conn, order.customer_id, &message).await?;
        }
        DeliveryStatus::Assigned | DeliveryStatus::Pending => {
            delivery.status = status;
            delivery_repo::update(conn, &delivery).await?;
        }
    }

    if status != DeliveryStatus::Delivered {
        audit_repo::log_activity(
            conn,
            Some(actor.profile_id()),
            "update_delivery_status",
            &delivery_entity(delivery_id),
            json!({ "from": from, "to": status, "order_id": order.id }),
        )
        .await?;
    }

    tracing::info!(delivery_id, from = %from, to = %status, "Delivery status changed");
    Ok(())
}

/// Admin creation of a delivery record for an order without one.
pub async fn create_delivery(
    conn: &mut SqliteConnection,
    input: NewDelivery,
) -> AppResult<i64> {
    let order = load_order(conn, input.order).await?;
    if order.status.is_final() {
        return Err(AppError::bad_request("Order is already in a final state."));
    }
    if delivery_repo::find_by_order(conn, order.id).await?.is_some() {
        return Err(AppError::validation(
            "order",
            "delivery with this order already exists.",
        ));
    }

    let driver = match input.driver {
        Some(id) => Some(load_driver(conn, id).await?),
        None => None,
    };
    if let Some(vehicle_id) = input.vehicle {
        fleet_repo::find_vehicle(conn, vehicle_id)
            .await?
            .ok_or_else(|| AppError::validation("vehicle", "Invalid vehicle."))?;
    }
    if let Some(route_id) = input.route {
        fleet_repo::find_route(conn, route_id)
            .await?
            .ok_or_else(|| AppError::validation("route", "Invalid route."))?;
    }

    let status = if driver.is_some() && order.status == OrderStatus::Out {
        DeliveryStatus::Assigned
    } else {
        DeliveryStatus::Pending
    };
    let id = delivery_repo::insert(
        conn,
        order.id,
        driver.map(|d| d.id),
        input.vehicle,
        input.route,
        status,
    )
    .await?;
    Ok(id)
}

/// Handles `PATCH /orders/{id}/returns`.
pub async fn record_returns(
    conn: &mut SqliteConnection,
    actor: &Account,
    order_id: i64,
    returned: i64,
) -> AppResult<()> {
    let order = load_order(conn, order_id).await?;
    let delivery = delivery_repo::find_by_order(conn, order.id).await?;

    match actor.role() {
        Role::Driver => {
            let delivery = delivery
                .as_ref()
                .ok_or_else(|| AppError::bad_request("No delivery assigned to this order"))?;
            if delivery.driver_id != Some(actor.profile_id()) {
                return Err(AppError::forbidden("You are not assigned to this delivery"));
            }
        }
        Role::Admin | Role::Staff => {
            if !order.is_walk_in() {
                return Err(AppError::forbidden(
                    "Only drivers can update order items for non-walk-in orders",
                ));
            }
        }
        _ => return Err(AppError::forbidden("Not authorized to update order items")),
    }

    let delivery =
        delivery.ok_or_else(|| AppError::bad_request("No delivery assigned to this order"))?;
    if order.status != OrderStatus::Delivered || delivery.status != DeliveryStatus::Delivered {
        return Err(AppError::bad_request(
            "Containers can only be recorded on a delivered order.",
        ));
    }

    reconcile_returns(conn, actor, &order, delivery, returned).await
}

/// Replaces the delivery's returned count and moves the customer's
/// outstanding containers by the difference.
async fn reconcile_returns(
    conn: &mut SqliteConnection,
    actor: &Account,
    order: &Order,
    mut delivery: Delivery,
    returned: i64,
) -> AppResult<()> {
    let delivered = delivery.delivered_quantity.unwrap_or(order.quantity);
    if returned < 0 {
        return Err(AppError::validation(
            "returned_containers",
            "Returned containers cannot be negative.",
        ));
    }
    if returned > delivered {
        return Err(AppError::validation(
            "returned_containers",
            format!(
                "Returned containers cannot be greater than the delivered quantity ({}).",
                delivered
            ),
        ));
    }

    let difference = returned - delivery.returned_containers;
    if difference == 0 {
        return Ok(());
    }

    delivery.returned_containers = returned;
    delivery_repo::update(conn, &delivery).await?;

    if let (Some(customer_id), Some(product_id)) = (order.customer_id, order.product_id) {
        containers::apply_delta(conn, customer_id, product_id, -difference).await?;
    }

    audit_repo::log_activity(
        conn,
        Some(actor.profile_id()),
        "record_returns",
        &order_entity(order.id),
        json!({
            "delivery_id": delivery.id,
            "returned_containers": returned,
            "difference": difference,
        }),
    )
    .await?;
    tracing::info!(order_id = order.id, returned, difference, "Container returns recorded");
    Ok(())
}

/// Validates a deployment against its driver, vehicle, route and product.
pub async fn check_deployment(conn: &mut SqliteConnection, deployment: &Deployment) -> AppResult<()> {
    user_repo::find_profile(conn, deployment.driver_id)
        .await?
        .filter(|p| p.role == Role::Driver)
        .ok_or_else(|| AppError::validation("driver", "Invalid driver ID or driver not found."))?;
    let vehicle = fleet_repo::find_vehicle(conn, deployment.vehicle_id)
        .await?
        .ok_or_else(|| {
            AppError::validation(
                "vehicle",
                format!("Invalid pk \"{}\" - object does not exist.", deployment.vehicle_id),
            )
        })?;
    fleet_repo::find_route(conn, deployment.route_id)
        .await?
        .ok_or_else(|| {
            AppError::validation(
                "route",
                format!("Invalid pk \"{}\" - object does not exist.", deployment.route_id),
            )
        })?;
    product_repo::find(conn, deployment.product_id)
        .await?
        .ok_or_else(|| {
            AppError::validation(
                "product",
                format!("Invalid pk \"{}\" - object does not exist.", deployment.product_id),
            )
        })?;

    check_stock(deployment.stock, &vehicle)?;
    Ok(())
}

/// Driver brings the truck back: `active → returned`.
pub async fn return_deployment(
    conn: &mut SqliteConnection,
    actor: &Account,
    deployment_id: i64,
    returned_containers: i64,
) -> AppResult<()> {
    let mut deployment = fleet_repo::find_deployment(conn, deployment_id)
        .await?
        .ok_or_else(|| AppError::not_found("Deployment not found."))?;

    let own = deployment.driver_id == actor.profile_id();
    if !(actor.role() == Role::Admin || (actor.role() == Role::Driver && own)) {
        return Err(AppError::forbidden(
            "You do not have permission to perform this action.",
        ));
    }
    if deployment.status != DeploymentStatus::Active {
        return Err(AppError::bad_request(format!(
            "Only active deployments can be returned (current status: {}).",
            deployment.status
        )));
    }
    if returned_containers < 0 {
        return Err(AppError::validation(
            "returned_containers",
            "Returned containers cannot be negative.",
        ));
    }

    deployment.status = DeploymentStatus::Returned;
    deployment.returned_at = Some(Utc::now());
    deployment.returned_containers += returned_containers;
    fleet_repo::update_deployment(conn, &deployment).await?;

    audit_repo::log_activity(
        conn,
        Some(actor.profile_id()),
        "return_deployment",
        &format!("deployment:{}", deployment.id),
        json!({
            "remaining_stock": deployment.stock,
            "returned_containers": deployment.returned_containers,
        }),
    )
    .await?;
    tracing::info!(deployment_id, remaining = deployment.stock, "Deployment returned");
    Ok(())
}

/// Admin closes out a returned deployment: `returned → completed`.
pub async fn complete_deployment(
    conn: &mut SqliteConnection,
    actor: &Account,
    deployment_id: i64,
) -> AppResult<()> {
    let mut deployment = fleet_repo::find_deployment(conn, deployment_id)
        .await?
        .ok_or_else(|| AppError::not_found("Deployment not found."))?;
    if deployment.status != DeploymentStatus::Returned {
        return Err(AppError::bad_request(format!(
            "Only returned deployments can be completed (current status: {}).",
            deployment.status
        )));
    }

    deployment.status = DeploymentStatus::Completed;
    fleet_repo::update_deployment(conn, &deployment).await?;
    audit_repo::log_activity(
        conn,
        Some(actor.profile_id()),
        "complete_deployment",
        &format!("deployment:{}", deployment.id),
        json!({}),
    )
    .await?;
    Ok(())
}
