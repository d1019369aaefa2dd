// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Rule synthesis.
//!
//! Everything here is pure: the builders return the [`RuleSpec`]s to create, in chain order, and
//! never talk to the controller.
//! Callers create the returned rules in the order given.

mod nat;
mod security_group;
mod vif;

pub use nat::*;
pub use security_group::*;
pub use vif::*;

use controller::model::{Rule, RuleSpec};

/// The rules of `rules` tagged with `key=value`.
pub fn tagged<'a>(rules: &'a [Rule], key: &'a str, value: &'a str) -> impl Iterator<Item = &'a Rule> {
    rules.iter().filter(move |rule| rule.is_tagged(key, value))
}

/// True if `rule` is what `spec` creates, wherever it sits in its chain.
#[must_use]
pub fn realizes(rule: &Rule, spec: &RuleSpec) -> bool {
    rule.action == spec.action
        && rule.jump_chain_id == spec.jump_chain_id
        && rule.flow_action == spec.flow_action
        && rule.nat_targets == spec.nat_targets
        && rule.matches == spec.matches
        && rule.properties == spec.properties
}
