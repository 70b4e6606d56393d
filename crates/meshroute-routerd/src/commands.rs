//! Shell command builders for the iptables firewall backend

use meshroute_common::shell::{self, IPTABLES_CMD, SYSCTL_CMD};

use crate::router_pair::RouterPair;

/// Whether a rule command inserts or deletes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleAction {
    Append,
    Delete,
}

impl RuleAction {
    pub fn flag(&self) -> &'static str {
        match self {
            RuleAction::Append => "-A",
            RuleAction::Delete => "-D",
        }
    }
}

/// Build the command toggling IPv4 forwarding
pub fn build_ip_forward_cmd(enabled: bool) -> String {
    format!(
        "{} -w net.ipv4.ip_forward={}",
        SYSCTL_CMD,
        if enabled { 1 } else { 0 }
    )
}

/// Build the FORWARD rule accepting traffic that enters from the tunnel
/// towards the pair's destination
pub fn build_forward_rule_cmd(action: RuleAction, iface: &str, pair: &RouterPair) -> String {
    format!(
        "{} {} FORWARD -i {} -s {} -d {} -m comment --comment {} -j ACCEPT",
        IPTABLES_CMD,
        action.flag(),
        shell::shellquote(iface),
        pair.source,
        pair.destination,
        shell::shellquote(pair.id.as_str())
    )
}

/// Build the FORWARD rule accepting replies back into the tunnel
pub fn build_return_rule_cmd(action: RuleAction, iface: &str, pair: &RouterPair) -> String {
    format!(
        "{} {} FORWARD -o {} -s {} -d {} -m conntrack --ctstate RELATED,ESTABLISHED \
         -m comment --comment {} -j ACCEPT",
        IPTABLES_CMD,
        action.flag(),
        shell::shellquote(iface),
        pair.destination,
        pair.source,
        shell::shellquote(pair.id.as_str())
    )
}

/// Build the POSTROUTING masquerade rule for traffic leaving the host
pub fn build_masquerade_cmd(action: RuleAction, iface: &str, pair: &RouterPair) -> String {
    format!(
        "{} -t nat {} POSTROUTING ! -o {} -s {} -d {} -m comment --comment {} -j MASQUERADE",
        IPTABLES_CMD,
        action.flag(),
        shell::shellquote(iface),
        pair.source,
        pair.destination,
        shell::shellquote(pair.id.as_str())
    )
}

/// Build every command installing (or deleting) the rules for one pair, in
/// installation order
pub fn build_nat_rule_cmds(action: RuleAction, iface: &str, pair: &RouterPair) -> Vec<String> {
    let mut cmds = vec![
        build_forward_rule_cmd(action, iface, pair),
        build_return_rule_cmd(action, iface, pair),
    ];
    if pair.masquerade {
        cmds.push(build_masquerade_cmd(action, iface, pair));
    }
    cmds
}
