//! Recursive-descent exploration strategy
//!
//! Follows control flow: the section entry seeds the walk, and every
//! committed block proposes its statically known successors. Addresses that
//! already start a committed block are pruned through the address map, so
//! loops and shared tails terminate. Bytes nothing branches to are simply
//! never explored; they stay in the unmapped bag.

use log::debug;

use crate::addrmap::RegionFlags;
use crate::strategy::Strategy;
use crate::{Address, BasicBlock, DisasmSection, DisassemblyError, InsnFlags};

pub struct RecursiveStrategy;

impl RecursiveStrategy {
    /// Queue `addr` as a candidate unless it leaves the section, repeats a
    /// committed block start, or repeats a seed from this same round.
    fn propose(dis: &DisasmSection<'_>, seeds: &mut Vec<BasicBlock>, addr: Address) {
        if !dis.section.contains(addr) {
            return;
        }
        if dis.addrmap.addr_type(addr).contains(RegionFlags::BB_START) {
            return;
        }
        if seeds.iter().any(|bb| bb.start == addr) {
            return;
        }
        seeds.push(BasicBlock::seeded_at(addr));
    }
}

impl Strategy for RecursiveStrategy {
    fn mutate(&self, dis: &DisasmSection<'_>, parent: Option<&BasicBlock>) -> Vec<BasicBlock> {
        let mut seeds = Vec::new();
        let parent = match parent {
            None => {
                if dis.section.size > 0 {
                    debug!(
                        "recursive descent into '{}' from 0x{:x}",
                        dis.section.name, dis.section.vma
                    );
                    Self::propose(dis, &mut seeds, dis.section.vma);
                }
                return seeds;
            }
            Some(parent) => parent,
        };

        // Junk blocks have no successors worth trusting.
        if parent.invalid {
            return seeds;
        }
        let last = match parent.last_insn() {
            Some(last) => last,
            None => return seeds,
        };

        if last.is_cflow() {
            if let Some(target) = last.target {
                Self::propose(dis, &mut seeds, target);
            }
            // Calls return and conditional branches may fall through; rets,
            // plain jumps, and indirect flow end the walk here.
            if last.flags.contains(InsnFlags::CALL) || last.flags.contains(InsnFlags::COND) {
                Self::propose(dis, &mut seeds, parent.end);
            }
        } else {
            // Padding run or a block cut at a nop boundary: execution slides
            // into whatever comes next.
            Self::propose(dis, &mut seeds, parent.end);
        }

        seeds
    }

    fn score(&self, _dis: &DisasmSection<'_>, bb: &BasicBlock) -> Result<f64, DisassemblyError> {
        let score = if bb.invalid {
            0.0
        } else if bb.trap {
            0.25
        } else if bb.padding {
            0.5
        } else if bb.last_insn().map_or(false, |i| i.is_cflow()) {
            1.0
        } else {
            // ran into the section end without a terminator
            0.75
        };
        Ok(score)
    }

    fn select(
        &self,
        dis: &DisasmSection<'_>,
        mutants: &mut [BasicBlock],
    ) -> Result<usize, DisassemblyError> {
        for bb in mutants.iter_mut() {
            // A block committed at this start since we proposed it wins.
            if dis.section.contains(bb.start)
                && dis.addrmap.addr_type(bb.start).contains(RegionFlags::BB_START)
            {
                continue;
            }
            bb.alive = true;
        }
        Ok(mutants.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Instruction, Section, SectionType};

    fn explored_section(bytes: &[u8]) -> Section {
        Section::new(".text".to_string(), SectionType::Code, 0x1000, bytes.to_vec())
    }

    fn tracked(sec: &Section) -> DisasmSection<'_> {
        let mut dis = DisasmSection::new(0, sec);
        for vma in sec.vma..sec.end() {
            dis.addrmap.insert(vma);
        }
        dis
    }

    fn cflow_parent(start: Address, end: Address, flags: InsnFlags, target: Option<Address>) -> BasicBlock {
        let mut bb = BasicBlock::seeded_at(start);
        bb.end = end;
        bb.insns.push(Instruction {
            start,
            size: (end - start) as u8,
            flags: flags | InsnFlags::CFLOW,
            target,
            ..Default::default()
        });
        bb
    }

    #[test]
    fn test_initial_seed_is_section_entry() {
        let sec = explored_section(&[0xc3]);
        let dis = tracked(&sec);
        let seeds = RecursiveStrategy.mutate(&dis, None);
        assert_eq!(seeds.len(), 1);
        assert_eq!(seeds[0].start, 0x1000);
    }

    #[test]
    fn test_call_proposes_target_and_fallthrough() {
        let sec = explored_section(&[0u8; 0x20]);
        let dis = tracked(&sec);
        let parent = cflow_parent(0x1000, 0x1005, InsnFlags::CALL, Some(0x1010));

        let mut starts: Vec<Address> = RecursiveStrategy
            .mutate(&dis, Some(&parent))
            .iter()
            .map(|bb| bb.start)
            .collect();
        starts.sort_unstable();
        assert_eq!(starts, vec![0x1005, 0x1010]);
    }

    #[test]
    fn test_call_with_coincident_target_proposes_once() {
        // call to the instruction right after itself
        let sec = explored_section(&[0u8; 0x10]);
        let dis = tracked(&sec);
        let parent = cflow_parent(0x1000, 0x1005, InsnFlags::CALL, Some(0x1005));

        let seeds = RecursiveStrategy.mutate(&dis, Some(&parent));
        assert_eq!(seeds.len(), 1);
        assert_eq!(seeds[0].start, 0x1005);
    }

    #[test]
    fn test_plain_jump_has_no_fallthrough() {
        let sec = explored_section(&[0u8; 0x10]);
        let dis = tracked(&sec);
        let parent = cflow_parent(0x1000, 0x1002, InsnFlags::JMP, Some(0x1008));

        let seeds = RecursiveStrategy.mutate(&dis, Some(&parent));
        assert_eq!(seeds.len(), 1);
        assert_eq!(seeds[0].start, 0x1008);
    }

    #[test]
    fn test_ret_ends_the_walk() {
        let sec = explored_section(&[0u8; 0x10]);
        let dis = tracked(&sec);
        let parent = cflow_parent(0x1000, 0x1001, InsnFlags::RET, None);
        assert!(RecursiveStrategy.mutate(&dis, Some(&parent)).is_empty());
    }

    #[test]
    fn test_out_of_section_target_pruned() {
        let sec = explored_section(&[0u8; 0x10]);
        let dis = tracked(&sec);
        let parent = cflow_parent(0x1000, 0x1002, InsnFlags::JMP, Some(0x4000));
        assert!(RecursiveStrategy.mutate(&dis, Some(&parent)).is_empty());
    }

    #[test]
    fn test_committed_start_pruned() {
        let sec = explored_section(&[0u8; 0x10]);
        let mut dis = tracked(&sec);
        dis.addrmap.add_addr_flag(0x1008, RegionFlags::BB_START);

        let parent = cflow_parent(0x1000, 0x1002, InsnFlags::JMP, Some(0x1008));
        assert!(RecursiveStrategy.mutate(&dis, Some(&parent)).is_empty());
    }

    #[test]
    fn test_padding_block_falls_through() {
        let sec = explored_section(&[0u8; 0x10]);
        let dis = tracked(&sec);
        let mut parent = BasicBlock::seeded_at(0x1000);
        parent.end = 0x1003;
        parent.padding = true;
        parent.insns.push(Instruction {
            start: 0x1002,
            size: 1,
            flags: InsnFlags::NOP,
            ..Default::default()
        });

        let seeds = RecursiveStrategy.mutate(&dis, Some(&parent));
        assert_eq!(seeds.len(), 1);
        assert_eq!(seeds[0].start, 0x1003);
    }

    #[test]
    fn test_invalid_parent_proposes_nothing() {
        let sec = explored_section(&[0u8; 0x10]);
        let dis = tracked(&sec);
        let mut parent = BasicBlock::seeded_at(0x1000);
        parent.end = 0x1001;
        parent.invalid = true;
        assert!(RecursiveStrategy.mutate(&dis, Some(&parent)).is_empty());
    }

    #[test]
    fn test_scores_grade_confidence() {
        let sec = explored_section(&[0u8; 0x10]);
        let dis = tracked(&sec);

        let mut invalid = BasicBlock::seeded_at(0x1000);
        invalid.invalid = true;
        assert_eq!(RecursiveStrategy.score(&dis, &invalid).unwrap(), 0.0);

        let terminated = cflow_parent(0x1000, 0x1001, InsnFlags::RET, None);
        assert_eq!(RecursiveStrategy.score(&dis, &terminated).unwrap(), 1.0);

        let mut padding = BasicBlock::seeded_at(0x1000);
        padding.padding = true;
        padding.insns.push(Instruction::default());
        assert_eq!(RecursiveStrategy.score(&dis, &padding).unwrap(), 0.5);
    }
}
