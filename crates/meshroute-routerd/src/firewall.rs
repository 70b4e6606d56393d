//! Firewall/NAT collaborator and its iptables backend.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use meshroute_common::shell::CommandRunner;
use meshroute_common::{RouteMgrError, RouteMgrResult};
use meshroute_types::RouteId;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::commands::{build_ip_forward_cmd, build_nat_rule_cmds, RuleAction};
use crate::router_pair::RouterPair;

/// NAT/forwarding primitives the reconciler drives.
///
/// Routing toggles are idempotent and process-wide. NAT rules are keyed by
/// [`RouterPair::id`].
#[async_trait]
pub trait Firewall: Send + Sync {
    async fn enable_routing(&self) -> RouteMgrResult<()>;

    async fn disable_routing(&self) -> RouteMgrResult<()>;

    async fn add_nat_rule(&self, pair: &RouterPair) -> RouteMgrResult<()>;

    async fn remove_nat_rule(&self, pair: &RouterPair) -> RouteMgrResult<()>;
}

/// iptables/sysctl backed [`Firewall`].
///
/// Remembers the delete commands for every installed pair so removal undoes
/// exactly what was inserted. Re-adding a pair first deletes whatever is left
/// of its previous rules.
pub struct IptablesFirewall {
    iface: String,
    runner: Arc<dyn CommandRunner>,
    /// Pair id -> commands deleting its installed rules
    installed: Mutex<HashMap<RouteId, Vec<String>>>,
}

impl IptablesFirewall {
    pub fn new(iface: impl Into<String>, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            iface: iface.into(),
            runner,
            installed: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the ids of all pairs with installed rules.
    pub async fn installed_ids(&self) -> Vec<RouteId> {
        let mut ids: Vec<RouteId> = self.installed.lock().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Runs every delete command. On failure returns the commands that did
    /// not succeed along with the first error.
    async fn run_deletes(&self, deletes: Vec<String>) -> Result<(), (Vec<String>, RouteMgrError)> {
        let mut failed = Vec::new();
        let mut first_error = None;
        for cmd in deletes {
            if let Err(e) = self.runner.run(&cmd).await {
                first_error.get_or_insert(e);
                failed.push(cmd);
            }
        }
        match first_error {
            None => Ok(()),
            Some(e) => Err((failed, e)),
        }
    }

    async fn set_forwarding(&self, enabled: bool) -> RouteMgrResult<()> {
        self.runner
            .run(&build_ip_forward_cmd(enabled))
            .await
            .map_err(|e| RouteMgrError::firewall("set ip_forward", e.to_string()))
    }
}

#[async_trait]
impl Firewall for IptablesFirewall {
    async fn enable_routing(&self) -> RouteMgrResult<()> {
        self.set_forwarding(true).await
    }

    async fn disable_routing(&self) -> RouteMgrResult<()> {
        self.set_forwarding(false).await
    }

    #[instrument(skip(self, pair), fields(pair = %pair))]
    async fn add_nat_rule(&self, pair: &RouterPair) -> RouteMgrResult<()> {
        let mut installed = self.installed.lock().await;
        // Leftovers of an earlier, partly failed removal go first
        if let Some(leftover) = installed.remove(&pair.id) {
            if let Err((remaining, e)) = self.run_deletes(leftover).await {
                installed.insert(pair.id.clone(), remaining);
                return Err(RouteMgrError::firewall("add nat rule", e.to_string()));
            }
        }

        let inserts = build_nat_rule_cmds(RuleAction::Append, &self.iface, pair);
        let deletes = build_nat_rule_cmds(RuleAction::Delete, &self.iface, pair);

        for (applied, cmd) in inserts.iter().enumerate() {
            if let Err(e) = self.runner.run(cmd).await {
                // Roll back the rules inserted so far, newest first
                let mut stuck = Vec::new();
                for undo in deletes[..applied].iter().rev() {
                    if let Err(undo_err) = self.runner.run(undo).await {
                        warn!(command = %undo, error = %undo_err, "Rollback failed");
                        stuck.push(undo.clone());
                    }
                }
                // Rules that could not be rolled back are still installed
                if !stuck.is_empty() {
                    installed.insert(pair.id.clone(), stuck);
                }
                return Err(RouteMgrError::firewall("add nat rule", e.to_string()));
            }
        }

        installed.insert(pair.id.clone(), deletes);
        info!("Installed NAT rules for {}", pair.id);
        Ok(())
    }

    #[instrument(skip(self, pair), fields(pair = %pair))]
    async fn remove_nat_rule(&self, pair: &RouterPair) -> RouteMgrResult<()> {
        let mut installed = self.installed.lock().await;
        let Some(deletes) = installed.remove(&pair.id) else {
            debug!("No NAT rules installed for {}", pair.id);
            return Ok(());
        };

        match self.run_deletes(deletes).await {
            Ok(()) => {
                info!("Removed NAT rules for {}", pair.id);
                Ok(())
            }
            Err((remaining, e)) => {
                // Keep what is still installed so a later call can retry it
                installed.insert(pair.id.clone(), remaining);
                Err(RouteMgrError::firewall("remove nat rule", e.to_string()))
            }
        }
    }
}
