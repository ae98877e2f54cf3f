use std::collections::{HashMap, HashSet};

use tracing::{debug, error, warn};

use crate::common::entity::{PortId, RuleId};
use crate::common::error::DomainError;
use crate::condition::entity::RuleContext;
use crate::nat::engine as nat;
use crate::nat::entity::NatStore;
use crate::packet::entity::FlowMatch;
use crate::rule::entity::{Rule, RuleAction, Verdict};

/// Final verdict of a chain evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainVerdict {
    Accept,
    Drop,
    Reject,
}

/// How a single chain traversal ended: with a final verdict, or by
/// running off the end (or hitting a `Return`).
enum Traversal {
    Final(ChainVerdict),
    Fallthrough,
}

/// Named rule chains evaluated with first-match semantics.
///
/// Each chain keeps its rules sorted by ascending position. Jumps
/// descend into other chains; a cycle is a configuration error and
/// drops the packet.
#[derive(Debug, Default)]
pub struct ChainEngine {
    chains: HashMap<String, Vec<Rule>>,
}

impl ChainEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_chain(&mut self, name: &str) -> Result<(), DomainError> {
        if self.chains.contains_key(name) {
            return Err(DomainError::InvalidConfig(format!(
                "chain already exists: {name}"
            )));
        }
        self.chains.insert(name.to_string(), Vec::new());
        Ok(())
    }

    /// Remove a chain and every rule in it.
    pub fn remove_chain(&mut self, name: &str) -> Result<(), DomainError> {
        self.chains
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| DomainError::ChainNotFound(name.to_string()))
    }

    pub fn chain_names(&self) -> impl Iterator<Item = &str> {
        self.chains.keys().map(String::as_str)
    }

    /// Add a rule to an existing chain. Rejects duplicate IDs and
    /// duplicate positions.
    pub fn add_rule(&mut self, chain: &str, rule: Rule) -> Result<(), DomainError> {
        rule.validate()?;
        if self
            .chains
            .values()
            .flatten()
            .any(|r| r.id == rule.id)
        {
            return Err(DomainError::DuplicateRule(rule.id.to_string()));
        }
        let rules = self
            .chains
            .get_mut(chain)
            .ok_or_else(|| DomainError::ChainNotFound(chain.to_string()))?;
        if rules.iter().any(|r| r.position == rule.position) {
            return Err(DomainError::DuplicateRule(format!(
                "position {} already taken in chain {chain}",
                rule.position
            )));
        }
        rules.push(rule);
        rules.sort_by_key(|r| r.position);
        Ok(())
    }

    pub fn remove_rule(&mut self, chain: &str, id: &RuleId) -> Result<(), DomainError> {
        let rules = self
            .chains
            .get_mut(chain)
            .ok_or_else(|| DomainError::ChainNotFound(chain.to_string()))?;
        let pos = rules
            .iter()
            .position(|r| &r.id == id)
            .ok_or_else(|| DomainError::RuleNotFound(id.to_string()))?;
        rules.remove(pos);
        Ok(())
    }

    /// Evaluate a chain against the flow, rewriting it in place when
    /// NAT rules fire. A missing or exhausted chain accepts the packet.
    pub fn evaluate(
        &self,
        chain: &str,
        flow: &mut FlowMatch,
        ctx_in: &PortId,
        ctx_out: Option<&PortId>,
        nat_store: &mut dyn NatStore,
    ) -> ChainVerdict {
        if !self.chains.contains_key(chain) {
            return ChainVerdict::Accept;
        }
        let mut visited = HashSet::new();
        match self.walk(chain, flow, ctx_in, ctx_out, nat_store, &mut visited) {
            Traversal::Final(verdict) => verdict,
            Traversal::Fallthrough => ChainVerdict::Accept,
        }
    }

    fn walk(
        &self,
        chain: &str,
        flow: &mut FlowMatch,
        ctx_in: &PortId,
        ctx_out: Option<&PortId>,
        nat_store: &mut dyn NatStore,
        visited: &mut HashSet<String>,
    ) -> Traversal {
        visited.insert(chain.to_string());
        // Rules are kept sorted, so iteration order is match order.
        let rules = &self.chains[chain];
        for rule in rules {
            let ctx = RuleContext {
                flow,
                in_port: ctx_in,
                out_port: ctx_out,
            };
            if !rule.condition.matches(&ctx) {
                continue;
            }
            debug!(chain, rule = %rule.id, "rule matched");
            let verdict = match &rule.action {
                RuleAction::Literal { verdict } => *verdict,
                RuleAction::Jump { target } => {
                    if visited.contains(target) {
                        error!(chain, target, "jump cycle detected, dropping packet");
                        return Traversal::Final(ChainVerdict::Drop);
                    }
                    if !self.chains.contains_key(target) {
                        warn!(chain, target, "jump target missing, skipping rule");
                        continue;
                    }
                    match self.walk(target, flow, ctx_in, ctx_out, nat_store, visited) {
                        Traversal::Final(v) => return Traversal::Final(v),
                        Traversal::Fallthrough => {
                            visited.remove(target);
                            continue;
                        }
                    }
                }
                RuleAction::ForwardNat {
                    dnat,
                    targets,
                    verdict,
                } => {
                    nat::apply_forward(nat_store, flow, *dnat, targets);
                    *verdict
                }
                RuleAction::ReverseNat { dnat, verdict } => {
                    if !nat::apply_reverse(nat_store, flow, *dnat) {
                        continue;
                    }
                    *verdict
                }
            };
            match verdict {
                Verdict::Accept => return Traversal::Final(ChainVerdict::Accept),
                Verdict::Drop => return Traversal::Final(ChainVerdict::Drop),
                Verdict::Reject => return Traversal::Final(ChainVerdict::Reject),
                Verdict::Return => return Traversal::Fallthrough,
                Verdict::Continue => continue,
            }
        }
        Traversal::Fallthrough
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::entity::PortId;
    use crate::condition::entity::Condition;
    use crate::nat::entity::{NatBinding, NatKey, NatTarget};
    use crate::packet::entity::Mac;

    #[derive(Default)]
    struct MapStore(HashMap<NatKey, NatBinding>);

    impl NatStore for MapStore {
        fn get(&self, key: &NatKey) -> Option<NatBinding> {
            self.0.get(key).copied()
        }
        fn put(&mut self, key: NatKey, binding: NatBinding) {
            self.0.insert(key, binding);
        }
    }

    fn rule(id: &str, position: u32, condition: Condition, action: RuleAction) -> Rule {
        Rule {
            id: RuleId(id.into()),
            position,
            condition,
            action,
        }
    }

    fn literal(id: &str, position: u32, condition: Condition, verdict: Verdict) -> Rule {
        rule(id, position, condition, RuleAction::Literal { verdict })
    }

    fn flow(nw_src: u32, nw_dst: u32) -> FlowMatch {
        FlowMatch {
            dl_src: Mac::ZERO,
            dl_dst: Mac::ZERO,
            nw_src,
            nw_dst,
            nw_proto: 17,
            tp_src: 1000,
            tp_dst: 2000,
        }
    }

    fn eval(engine: &ChainEngine, chain: &str, flow: &mut FlowMatch) -> ChainVerdict {
        let in_port = PortId("p0".into());
        let mut store = MapStore::default();
        engine.evaluate(chain, flow, &in_port, None, &mut store)
    }

    fn dst_cond(addr: u32, prefix_len: u8) -> Condition {
        Condition {
            nw_dst: Some(crate::common::entity::Ipv4Cidr::new(addr, prefix_len)),
            ..Condition::default()
        }
    }

    // ── Chain management ──────────────────────────────────────────

    #[test]
    fn duplicate_chain_rejected() {
        let mut engine = ChainEngine::new();
        engine.add_chain("pre").unwrap();
        assert!(engine.add_chain("pre").is_err());
    }

    #[test]
    fn duplicate_position_rejected() {
        let mut engine = ChainEngine::new();
        engine.add_chain("pre").unwrap();
        engine
            .add_rule("pre", literal("a", 1, Condition::any(), Verdict::Accept))
            .unwrap();
        let err = engine
            .add_rule("pre", literal("b", 1, Condition::any(), Verdict::Drop))
            .unwrap_err();
        assert!(matches!(err, DomainError::DuplicateRule(_)));
    }

    #[test]
    fn duplicate_rule_id_rejected_across_chains() {
        let mut engine = ChainEngine::new();
        engine.add_chain("pre").unwrap();
        engine.add_chain("post").unwrap();
        engine
            .add_rule("pre", literal("a", 1, Condition::any(), Verdict::Accept))
            .unwrap();
        assert!(engine
            .add_rule("post", literal("a", 1, Condition::any(), Verdict::Accept))
            .is_err());
    }

    #[test]
    fn remove_chain_drops_rules() {
        let mut engine = ChainEngine::new();
        engine.add_chain("pre").unwrap();
        engine
            .add_rule("pre", literal("a", 1, Condition::any(), Verdict::Drop))
            .unwrap();
        engine.remove_chain("pre").unwrap();
        // Chain gone: evaluation falls back to accept.
        assert_eq!(eval(&engine, "pre", &mut flow(1, 2)), ChainVerdict::Accept);
        assert!(engine.remove_chain("pre").is_err());
    }

    // ── Evaluation ────────────────────────────────────────────────

    #[test]
    fn missing_chain_accepts() {
        let engine = ChainEngine::new();
        assert_eq!(eval(&engine, "pre", &mut flow(1, 2)), ChainVerdict::Accept);
    }

    #[test]
    fn exhausted_chain_accepts() {
        let mut engine = ChainEngine::new();
        engine.add_chain("pre").unwrap();
        engine
            .add_rule("pre", literal("a", 1, dst_cond(0x0A00_0000, 8), Verdict::Drop))
            .unwrap();
        assert_eq!(
            eval(&engine, "pre", &mut flow(1, 0x0B00_0001)),
            ChainVerdict::Accept
        );
    }

    #[test]
    fn first_match_by_position() {
        let mut engine = ChainEngine::new();
        engine.add_chain("pre").unwrap();
        // Inserted out of order; position decides.
        engine
            .add_rule("pre", literal("late", 5, Condition::any(), Verdict::Accept))
            .unwrap();
        engine
            .add_rule("pre", literal("early", 2, Condition::any(), Verdict::Drop))
            .unwrap();
        assert_eq!(eval(&engine, "pre", &mut flow(1, 2)), ChainVerdict::Drop);
    }

    #[test]
    fn jump_and_return() {
        let mut engine = ChainEngine::new();
        engine.add_chain("pre").unwrap();
        engine.add_chain("sub").unwrap();
        engine
            .add_rule(
                "pre",
                rule("j", 1, Condition::any(), RuleAction::Jump { target: "sub".into() }),
            )
            .unwrap();
        engine
            .add_rule("pre", literal("after", 2, Condition::any(), Verdict::Drop))
            .unwrap();
        // Sub chain returns without a verdict for this flow.
        engine
            .add_rule(
                "sub",
                literal("ret", 1, Condition::any(), Verdict::Return),
            )
            .unwrap();
        assert_eq!(eval(&engine, "pre", &mut flow(1, 2)), ChainVerdict::Drop);
    }

    #[test]
    fn jump_final_verdict_propagates() {
        let mut engine = ChainEngine::new();
        engine.add_chain("pre").unwrap();
        engine.add_chain("sub").unwrap();
        engine
            .add_rule(
                "pre",
                rule("j", 1, Condition::any(), RuleAction::Jump { target: "sub".into() }),
            )
            .unwrap();
        engine
            .add_rule("pre", literal("after", 2, Condition::any(), Verdict::Accept))
            .unwrap();
        engine
            .add_rule("sub", literal("rej", 1, Condition::any(), Verdict::Reject))
            .unwrap();
        assert_eq!(eval(&engine, "pre", &mut flow(1, 2)), ChainVerdict::Reject);
    }

    #[test]
    fn jump_to_missing_chain_skips_rule() {
        let mut engine = ChainEngine::new();
        engine.add_chain("pre").unwrap();
        engine
            .add_rule(
                "pre",
                rule("j", 1, Condition::any(), RuleAction::Jump { target: "ghost".into() }),
            )
            .unwrap();
        engine
            .add_rule("pre", literal("after", 2, Condition::any(), Verdict::Drop))
            .unwrap();
        assert_eq!(eval(&engine, "pre", &mut flow(1, 2)), ChainVerdict::Drop);
    }

    #[test]
    fn jump_cycle_drops() {
        let mut engine = ChainEngine::new();
        engine.add_chain("a").unwrap();
        engine.add_chain("b").unwrap();
        engine
            .add_rule("a", rule("ab", 1, Condition::any(), RuleAction::Jump { target: "b".into() }))
            .unwrap();
        engine
            .add_rule("b", rule("ba", 1, Condition::any(), RuleAction::Jump { target: "a".into() }))
            .unwrap();
        assert_eq!(eval(&engine, "a", &mut flow(1, 2)), ChainVerdict::Drop);
    }

    // ── NAT actions ───────────────────────────────────────────────

    #[test]
    fn forward_nat_rewrites_and_accepts() {
        let mut engine = ChainEngine::new();
        engine.add_chain("pre").unwrap();
        engine
            .add_rule(
                "pre",
                rule(
                    "dnat",
                    1,
                    dst_cond(0xC000_0205, 32),
                    RuleAction::ForwardNat {
                        dnat: true,
                        targets: vec![NatTarget {
                            nw_start: 0x0A00_020A,
                            nw_end: 0x0A00_020A,
                            tp_start: 8080,
                            tp_end: 8080,
                        }],
                        verdict: Verdict::Accept,
                    },
                ),
            )
            .unwrap();

        let in_port = PortId("p0".into());
        let mut store = MapStore::default();
        let mut f = flow(0x0A00_010A, 0xC000_0205);
        let verdict = engine.evaluate("pre", &mut f, &in_port, None, &mut store);
        assert_eq!(verdict, ChainVerdict::Accept);
        assert_eq!(f.nw_dst, 0x0A00_020A);
        assert_eq!(f.tp_dst, 8080);
    }

    #[test]
    fn reverse_nat_without_state_falls_through() {
        let mut engine = ChainEngine::new();
        engine.add_chain("post").unwrap();
        engine
            .add_rule(
                "post",
                rule(
                    "undnat",
                    1,
                    Condition::any(),
                    RuleAction::ReverseNat {
                        dnat: true,
                        verdict: Verdict::Accept,
                    },
                ),
            )
            .unwrap();
        engine
            .add_rule("post", literal("drop", 2, Condition::any(), Verdict::Drop))
            .unwrap();

        let in_port = PortId("p0".into());
        let mut store = MapStore::default();
        let mut f = flow(1, 2);
        let verdict = engine.evaluate("post", &mut f, &in_port, None, &mut store);
        assert_eq!(verdict, ChainVerdict::Drop, "no mapping, rule skipped");
    }
}
