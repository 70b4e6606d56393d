//! Pure diff between the applied and the desired route sets.

use meshroute_types::{Route, RouteId};
use std::collections::HashMap;

/// What a reconciliation cycle has to change.
///
/// Both lists are sorted by id so cycles are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteDiff {
    /// Applied routes that are gone from the desired set or whose value
    /// changed.
    pub to_remove: Vec<RouteId>,
    /// Desired routes that are not applied with exactly this value.
    pub to_add: Vec<RouteId>,
}

impl RouteDiff {
    pub fn is_empty(&self) -> bool {
        self.to_remove.is_empty() && self.to_add.is_empty()
    }
}

/// Compares `applied` with `desired` by full value equality.
///
/// A route whose id is kept but whose value changed shows up in both lists:
/// changes are applied as remove-then-add.
pub fn diff_routes(
    applied: &HashMap<RouteId, Route>,
    desired: &HashMap<RouteId, Route>,
) -> RouteDiff {
    let mut to_remove: Vec<RouteId> = applied
        .iter()
        .filter(|(id, route)| desired.get(*id) != Some(*route))
        .map(|(id, _)| id.clone())
        .collect();

    let mut to_add: Vec<RouteId> = desired
        .iter()
        .filter(|(id, route)| applied.get(*id) != Some(*route))
        .map(|(id, _)| id.clone())
        .collect();

    to_remove.sort();
    to_add.sort();

    RouteDiff { to_remove, to_add }
}
