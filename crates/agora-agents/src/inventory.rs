//! Inventory operations for agents.
//!
//! Each agent carries items subject to a total-quantity capacity. This
//! module provides the add, remove, and query primitives with full
//! checked arithmetic -- no silent overflows, no panics. A key whose
//! quantity reaches zero is removed entirely, so an inventory never
//! holds zero-count entries.

use std::collections::BTreeMap;

use agora_types::ItemId;

use crate::error::AgentError;

/// Compute the total quantity (sum over all items) in an inventory.
///
/// Returns `None` if the sum overflows `u32`.
pub fn total_quantity(inventory: &BTreeMap<ItemId, u32>) -> Option<u32> {
    let mut total: u32 = 0;
    for qty in inventory.values() {
        total = total.checked_add(*qty)?;
    }
    Some(total)
}

/// Check whether the inventory contains at least `amount` of an item.
pub fn has_item(inventory: &BTreeMap<ItemId, u32>, item: &ItemId, amount: u32) -> bool {
    inventory.get(item).copied().unwrap_or(0) >= amount
}

/// Add `amount` units of `item` to the inventory.
///
/// Fails without mutating if the addition would exceed `capacity` or
/// overflow `u32`.
pub fn add_item(
    inventory: &mut BTreeMap<ItemId, u32>,
    capacity: u32,
    item: &ItemId,
    amount: u32,
) -> Result<(), AgentError> {
    let current_load =
        total_quantity(inventory).ok_or_else(|| AgentError::ArithmeticOverflow {
            context: String::from("total_quantity overflow in add_item"),
        })?;

    let new_load = current_load
        .checked_add(amount)
        .ok_or_else(|| AgentError::CapacityExceeded {
            item: item.clone(),
            attempted: amount,
            current_load,
            capacity,
        })?;

    if new_load > capacity {
        return Err(AgentError::CapacityExceeded {
            item: item.clone(),
            attempted: amount,
            current_load,
            capacity,
        });
    }

    let entry = inventory.entry(item.clone()).or_insert(0);
    // Cannot overflow: the entry is bounded by new_load <= capacity.
    *entry = entry
        .checked_add(amount)
        .ok_or_else(|| AgentError::ArithmeticOverflow {
            context: String::from("item quantity overflow in add_item"),
        })?;

    Ok(())
}

/// Remove `amount` units of `item` from the inventory.
///
/// Fails without mutating if the inventory holds fewer than `amount`.
/// Removes the key entirely when the quantity reaches zero.
pub fn remove_item(
    inventory: &mut BTreeMap<ItemId, u32>,
    item: &ItemId,
    amount: u32,
) -> Result<(), AgentError> {
    let current = inventory.get(item).copied().unwrap_or(0);

    if current < amount {
        return Err(AgentError::InsufficientItems {
            item: item.clone(),
            requested: amount,
            available: current,
        });
    }

    let remaining = current
        .checked_sub(amount)
        .ok_or_else(|| AgentError::ArithmeticOverflow {
            context: String::from("subtraction underflow in remove_item"),
        })?;

    if remaining == 0 {
        inventory.remove(item);
    } else {
        inventory.insert(item.clone(), remaining);
    }

    Ok(())
}
