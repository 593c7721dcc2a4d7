//! Linear-sweep exploration strategy
//!
//! Walks the section front to back. Each committed block hands the cursor to
//! the first byte past it that no committed block has claimed yet, so the
//! whole section gets covered exactly once. Junk bytes produce invalid
//! one-byte blocks with zero confidence rather than stopping the walk.

use log::debug;

use crate::strategy::Strategy;
use crate::{Address, BasicBlock, DisasmSection, DisassemblyError};

pub struct LinearStrategy;

impl Strategy for LinearStrategy {
    fn mutate(&self, dis: &DisasmSection<'_>, parent: Option<&BasicBlock>) -> Vec<BasicBlock> {
        let seed = match parent {
            None => {
                if dis.section.size == 0 {
                    return Vec::new();
                }
                debug!(
                    "linear sweep of '{}' from 0x{:x}",
                    dis.section.name, dis.section.vma
                );
                dis.section.vma
            }
            Some(parent) => {
                // Resume at the first byte past the parent that no committed
                // block has claimed as code.
                let mut addr: Address = parent.end;
                while dis.addrmap.contains(addr) && !dis.addrmap.addr_type(addr).is_unmapped() {
                    addr += 1;
                }
                if !dis.addrmap.contains(addr) {
                    // walked off the section
                    return Vec::new();
                }
                addr
            }
        };
        vec![BasicBlock::seeded_at(seed)]
    }

    fn score(&self, _dis: &DisasmSection<'_>, bb: &BasicBlock) -> Result<f64, DisassemblyError> {
        if bb.invalid {
            return Ok(0.0);
        }
        let mut score = bb.insns.len() as f64;
        if bb.padding {
            score *= 0.5;
        }
        if bb.last_insn().map_or(false, |i| i.is_cflow()) {
            score += 1.0;
        }
        Ok(score)
    }

    fn select(
        &self,
        _dis: &DisasmSection<'_>,
        mutants: &mut [BasicBlock],
    ) -> Result<usize, DisassemblyError> {
        // Everything commits, junk included: the cursor lives in the parent
        // chain, so an uncommitted candidate would end the walk early.
        for bb in mutants.iter_mut() {
            bb.alive = true;
        }
        Ok(mutants.len())
    }
}
