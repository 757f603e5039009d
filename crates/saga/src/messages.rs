//! Outbound message texts.
//!
//! Suppliers and customers are reached through chat-style channels, so every
//! message is plain prose with the identifiers a human needs to answer.

use chrono::{DateTime, Utc};
use common::{AggregateId, SupplierId};

/// First contact with a supplier about a shortfall.
pub fn stock_request(
    supplier_id: &SupplierId,
    product_name: &str,
    quantity: u32,
    order_number: &str,
    query_id: AggregateId,
    expires_at: DateTime<Utc>,
) -> String {
    format!(
        "Hello {supplier_id},\n\n\
         We have an urgent stock requirement for an order we're processing.\n\n\
         Product Needed: {product_name}\n\
         Quantity Required: {quantity} units\n\
         Order Reference: {order_number}\n\
         Query ID: {query_id}\n\n\
         Could you let us know whether you have this product, how many units \
         you can supply, and your price and delivery timeline? \
         This request stays open until {}.",
        expires_at.format("%Y-%m-%d %H:%M UTC")
    )
}

/// Another supplier covered part of the need; the rest is still open.
pub fn requirement_update(
    product_name: &str,
    order_number: &str,
    new_requirement: u32,
    previous: u32,
    fulfilled_by: &SupplierId,
) -> String {
    format!(
        "Update on Stock Requirement\n\n\
         {fulfilled_by} has provided partial stock. Our updated requirement is:\n\n\
         Product: {product_name}\n\
         New Quantity Needed: {new_requirement} units (reduced from {previous})\n\
         Order Reference: {order_number}\n\n\
         If you can supply any of this quantity, please let us know your \
         availability, price, and delivery timeline."
    )
}

/// Another supplier covered the whole need.
pub fn requirement_fulfilled(product_name: &str, fulfilled_by: &SupplierId) -> String {
    format!(
        "Stock Requirement Fulfilled\n\n\
         Thank you for your response! Our requirement for {product_name} has been \
         fulfilled by another supplier ({fulfilled_by}).\n\n\
         We appreciate your time and will reach out again for future requirements."
    )
}

/// A supplier offered stock after other suppliers had covered the need.
pub fn requirement_already_met(product_name: &str, order_number: &str) -> String {
    format!(
        "Stock Requirement Already Met\n\n\
         Thank you for your offer! Our requirement for {product_name} on order \
         {order_number} was covered by other suppliers before your reply arrived, \
         so we won't need these units.\n\n\
         We appreciate your time and will reach out again for future requirements."
    )
}

/// The order behind a request was cancelled.
pub fn request_withdrawn(product_name: &str, order_number: &str) -> String {
    format!(
        "Stock Request Withdrawn\n\n\
         Order {order_number} has been cancelled, so we no longer need {product_name} \
         for it. Thank you for your time."
    )
}

/// Tells the customer every product of the order is secured.
pub fn order_ready(order_number: &str, delivery_days: u32) -> String {
    format!(
        "Great News About Your Order!\n\n\
         We've secured all the products for your order {order_number} from our suppliers.\n\n\
         Estimated Delivery: {delivery_days} days from now\n\n\
         Your order is now being processed and will be shipped soon. \
         Thank you for your patience!"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requirement_update_names_both_quantities() {
        let text = requirement_update("Gold Ring", "ORD-1A2B3C4D", 6, 10, &SupplierId::new("ACME"));
        assert!(text.contains("ACME has provided partial stock"));
        assert!(text.contains("6 units (reduced from 10)"));
        assert!(text.contains("ORD-1A2B3C4D"));
    }

    #[test]
    fn order_ready_mentions_delivery_days() {
        let text = order_ready("ORD-1A2B3C4D", 7);
        assert!(text.contains("ORD-1A2B3C4D"));
        assert!(text.contains("7 days from now"));
    }
}
