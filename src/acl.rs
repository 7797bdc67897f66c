//! Access-control list toggling for shareable records.
//!
//! An ACL is the `accesibles` array of user ids on a record. Toggling a user id
//! grants access when it is absent and revokes it when present, so applying the
//! same toggle twice restores the original membership.

use uuid::Uuid;

use crate::models::AccessChange;

pub const GRANTED_MESSAGE: &str = "Access granted to admin";
pub const REMOVED_MESSAGE: &str = "Access removed";

/// Toggles each target in order and reports what happened to it.
///
/// Targets are not checked against the user table: an unknown id is granted
/// like any other.
pub fn toggle(acl: &mut Vec<Uuid>, targets: &[Uuid]) -> Vec<AccessChange> {
    targets
        .iter()
        .map(|&user_id| {
            let granted = match acl.iter().position(|member| *member == user_id) {
                Some(index) => {
                    acl.remove(index);
                    false
                }
                None => {
                    acl.push(user_id);
                    true
                }
            };
            AccessChange {
                user_id,
                granted,
                message: if granted { GRANTED_MESSAGE } else { REMOVED_MESSAGE }.to_string(),
            }
        })
        .collect()
}
