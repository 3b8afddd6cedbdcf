//! The checker's return discipline.
//!
//! Every check procedure reports one of six outcomes. The two non-terminal
//! ones (`Success`, `Complete`) travel as `Ok`; the four that must bubble to
//! `check_entity` travel as `Err(Interrupt)` so `?` reproduces the
//! propagation rule exactly.

use sable_ast::NodeId;

/// Entity-visible outcome of a check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    /// The node was accepted; the entity moves to code generation.
    Success,
    /// The entity is fully finished (static-if, constraints, polyquery).
    Complete,
    /// The AST was rewritten; the entity must re-run symbol resolution.
    ReturnToSymres,
    /// Progress needs information another entity has not produced yet.
    Yield,
    /// Definitively unsatisfiable, errors suppressed (speculative checks).
    Failed,
    /// A hard error was reported.
    Error,
}

/// The propagating half of [`CheckStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    ReturnToSymres,
    Yield,
    Failed,
    Error,
}

pub type CheckResult<T = ()> = Result<T, Interrupt>;

/// `Ok` payload of entity-level checks: whether the entity is merely checked
/// (→ code generation) or entirely done (→ finalized).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    Checked,
    Complete,
}

impl CheckStatus {
    pub fn of(result: CheckResult<Progress>) -> CheckStatus {
        match result {
            Ok(Progress::Checked) => CheckStatus::Success,
            Ok(Progress::Complete) => CheckStatus::Complete,
            Err(Interrupt::ReturnToSymres) => CheckStatus::ReturnToSymres,
            Err(Interrupt::Yield) => CheckStatus::Yield,
            Err(Interrupt::Failed) => CheckStatus::Failed,
            Err(Interrupt::Error) => CheckStatus::Error,
        }
    }
}

/// Outcome of asking the type engine to conform an expression to a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeMatch {
    Success,
    Yield,
    Failed,
}

/// Outcome of overload, macro-header and polymorph lookups. Replaces the
/// original's sentinel pointer values with explicit variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Found(NodeId),
    Yield,
    NoMatch,
}
