//! Exploration strategies
//!
//! The engine is heuristic-agnostic: it hands a strategy the per-section
//! state and a parent block, and the strategy decides where to look next,
//! how confident it is in what the sweep found, and what to keep.

use std::fmt;

use clap::ValueEnum;

use crate::{BasicBlock, DisasmSection, DisassemblyError};

pub mod linear;
pub mod recursive;

/// The three hooks the section explorer drives.
///
/// Seed deduplication is a strategy concern; the address map (`BB_START`
/// flags, the unmapped bag) exists so strategies can do it in O(1).
pub trait Strategy {
    /// Propose candidate blocks to explore. `parent` is `None` exactly once
    /// per section, for the initial seed. Returned candidates carry only a
    /// start address; ownership transfers to the engine.
    fn mutate(&self, dis: &DisasmSection<'_>, parent: Option<&BasicBlock>) -> Vec<BasicBlock>;

    /// Confidence score for a candidate the sweep has filled in.
    fn score(&self, dis: &DisasmSection<'_>, bb: &BasicBlock) -> Result<f64, DisassemblyError>;

    /// Mark the candidates to commit (`alive = true`), possibly reordering
    /// the slice. The engine scans the first `n` entries of the result,
    /// where `n` is the returned count.
    fn select(
        &self,
        dis: &DisasmSection<'_>,
        mutants: &mut [BasicBlock],
    ) -> Result<usize, DisassemblyError>;
}

/// Available exploration strategies.
#[derive(Copy, Clone, ValueEnum, Debug, PartialEq, Eq)]
pub enum StrategyKind {
    /// Front-to-back sweep over every unclaimed byte
    Linear,
    /// Control-flow following from the section entry
    Recursive,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyKind::Linear => write!(f, "Linear sweep"),
            StrategyKind::Recursive => write!(f, "Recursive descent"),
        }
    }
}

impl StrategyKind {
    /// Instantiate the heuristic. Called once at engine start.
    pub fn create(&self) -> Box<dyn Strategy> {
        match self {
            StrategyKind::Linear => Box::new(linear::LinearStrategy),
            StrategyKind::Recursive => Box::new(recursive::RecursiveStrategy),
        }
    }

    /// Return all available strategies
    pub fn all() -> &'static [StrategyKind] {
        &[StrategyKind::Linear, StrategyKind::Recursive]
    }
}
