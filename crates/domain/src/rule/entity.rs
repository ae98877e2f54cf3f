use serde::{Deserialize, Serialize};

use crate::common::entity::RuleId;
use crate::common::error::DomainError;
use crate::condition::entity::Condition;
use crate::nat::entity::NatTarget;

/// Outcome a rule can yield when it matches.
///
/// `Return` and `Continue` only steer chain traversal; a finished
/// evaluation always collapses to accept, drop, or reject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Accept,
    Drop,
    Reject,
    Return,
    Continue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleAction {
    /// Yield the verdict directly.
    Literal { verdict: Verdict },
    /// Descend into another chain; a `Return` there resumes after this rule.
    Jump { target: String },
    /// Translate the flow (destination when `dnat`, source otherwise)
    /// and then apply the verdict.
    ForwardNat {
        dnat: bool,
        targets: Vec<NatTarget>,
        verdict: Verdict,
    },
    /// Undo an earlier translation on the return flow. Without a stored
    /// translation the rule does not match.
    ReverseNat { dnat: bool, verdict: Verdict },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub id: RuleId,
    /// 1-based position within the chain. Unique per chain.
    pub position: u32,
    #[serde(default)]
    pub condition: Condition,
    pub action: RuleAction,
}

impl Rule {
    pub fn validate(&self) -> Result<(), DomainError> {
        self.id
            .validate()
            .map_err(|e| DomainError::InvalidRule(format!("{}: {e}", self.id)))?;
        if self.position == 0 {
            return Err(DomainError::InvalidRule(format!(
                "{}: position must be >= 1",
                self.id
            )));
        }
        self.condition
            .validate()
            .map_err(|e| DomainError::InvalidRule(format!("{}: {e}", self.id)))?;
        match &self.action {
            RuleAction::Literal { verdict } => {
                if *verdict == Verdict::Continue {
                    return Err(DomainError::InvalidRule(format!(
                        "{}: continue is implicit, not a literal verdict",
                        self.id
                    )));
                }
            }
            RuleAction::Jump { target } => {
                if target.is_empty() {
                    return Err(DomainError::InvalidRule(format!(
                        "{}: jump target must not be empty",
                        self.id
                    )));
                }
            }
            RuleAction::ForwardNat {
                targets, verdict, ..
            } => {
                if targets.is_empty() {
                    return Err(DomainError::InvalidRule(format!(
                        "{}: nat rule needs at least one target",
                        self.id
                    )));
                }
                for target in targets {
                    target
                        .validate()
                        .map_err(|e| DomainError::InvalidRule(format!("{}: {e}", self.id)))?;
                }
                validate_nat_verdict(&self.id, *verdict)?;
            }
            RuleAction::ReverseNat { verdict, .. } => {
                validate_nat_verdict(&self.id, *verdict)?;
            }
        }
        Ok(())
    }
}

/// NAT rules translate and keep going or stop the chain; they cannot
/// drop or reject on their own.
fn validate_nat_verdict(id: &RuleId, verdict: Verdict) -> Result<(), DomainError> {
    match verdict {
        Verdict::Accept | Verdict::Continue | Verdict::Return => Ok(()),
        Verdict::Drop | Verdict::Reject => Err(DomainError::InvalidRule(format!(
            "{id}: nat verdict must be accept, continue, or return"
        ))),
    }
}
