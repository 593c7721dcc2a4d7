//! The exploration engine: block-level linear sweep, per-section worklist,
//! and the run orchestrator.
//!
//! Exploration is speculative. A strategy proposes candidate blocks, the
//! sweep fills each candidate by decoding until a control-flow terminator or
//! an undecodable byte, the strategy scores and selects winners, and the
//! engine commits the winners into the section state. Committed blocks may
//! overlap; arbitration between overlapping readings belongs to the strategy,
//! not the engine.

use std::collections::VecDeque;

use capstone::arch::x86::X86OperandType;
use capstone::arch::DetailsArchInsn;
use log::{debug, info, warn};

use crate::addrmap::RegionFlags;
use crate::classify;
use crate::decoder;
use crate::strategy::Strategy;
use crate::{
    Address, Arch, BasicBlock, Binary, BinaryFormat, DisasmSection, DisassemblyError, InsnFlags,
    Instruction, MemOperand, Operand, OperandKind, Options, SectionType,
};

/// Decode one basic block starting at `bb.start`, filling `bb` in place.
/// Returns the number of instructions decoded.
///
/// The block ends at the first control-flow instruction (included), at the
/// first undecodable byte (the block is marked invalid and claims that byte),
/// or at a padding boundary: a block is either all effective nops or free of
/// them, so runs of padding land in blocks of their own.
pub fn disasm_bb(
    bin: &Binary,
    dis: &DisasmSection<'_>,
    bb: &mut BasicBlock,
) -> Result<usize, DisassemblyError> {
    match bin.arch {
        Arch::X86 => disasm_bb_x86(bin, dis, bb),
        other => Err(DisassemblyError::UnsupportedArchitecture(other)),
    }
}

fn disasm_bb_x86(
    bin: &Binary,
    dis: &DisasmSection<'_>,
    bb: &mut BasicBlock,
) -> Result<usize, DisassemblyError> {
    // Fresh handle per block; dropped on every exit path.
    let cs = decoder::build_x86(bin.bits)?;

    let sec = dis.section;
    if bb.start < sec.vma || bb.start - sec.vma >= sec.size {
        return Err(DisassemblyError::BlockOutOfSection {
            start: bb.start,
            section: sec.name.clone(),
        });
    }

    let mut offset = (bb.start - sec.vma) as usize;
    let mut pc = bb.start;
    bb.end = bb.start;
    bb.section_id = dis.id;

    let mut ndisassembled = 0usize;
    let mut only_nop = false;

    while offset < sec.bytes.len() {
        let insns = cs.disasm_count(&sec.bytes[offset..], pc, 1)?;
        let Some(ins) = insns.iter().next() else {
            // Undecodable opcode: claim the byte so the worklist advances.
            bb.invalid = true;
            bb.end += 1;
            break;
        };
        let size = ins.bytes().len();
        if size == 0 {
            break;
        }
        let detail = cs.insn_detail(ins)?;
        let arch_detail = detail.arch_detail();
        let Some(x86) = arch_detail.x86() else {
            break;
        };

        let trap = classify::is_trap_ins(ins);
        let nop = classify::is_nop_ins(ins)
            // MSVC emits semantic nops too rarely to treat them as padding
            || (classify::is_semantic_nop_ins(ins, x86) && bin.format != BinaryFormat::Pe)
            // MSVC pads between functions with int3
            || (trap && bin.format == BinaryFormat::Pe);
        let ret = classify::is_ret_ins(ins);
        let cond = classify::is_conditional_cflow_ins(ins);
        let jmp = classify::is_unconditional_jmp_ins(ins) || cond;
        let cflow = classify::is_cflow_ins(&detail);
        let call = classify::is_call_ins(ins);
        let privileged = classify::is_privileged_ins(ins);

        // Keep nop runs in blocks of their own.
        if ndisassembled == 0 && nop {
            only_nop = true;
        }
        if only_nop != nop {
            break;
        }

        ndisassembled += 1;
        bb.end += size as Address;
        bb.privileged |= privileged;
        bb.padding |= nop;
        bb.trap |= trap;

        let mut insn = Instruction {
            start: ins.address(),
            size: size as u8,
            addr_size: x86.addr_size(),
            mnemonic: ins.mnemonic().unwrap_or("").to_string(),
            op_str: ins.op_str().unwrap_or("").to_string(),
            privileged,
            trap,
            ..Default::default()
        };
        if nop {
            insn.flags |= InsnFlags::NOP;
        }
        if ret {
            insn.flags |= InsnFlags::RET;
        }
        if jmp {
            insn.flags |= InsnFlags::JMP;
        }
        if cond {
            insn.flags |= InsnFlags::COND;
        }
        if cflow {
            insn.flags |= InsnFlags::CFLOW;
        }
        if call {
            insn.flags |= InsnFlags::CALL;
        }

        for op in x86.operands() {
            let kind = match op.op_type {
                X86OperandType::Reg(reg) => {
                    if cflow {
                        insn.flags |= InsnFlags::INDIRECT;
                    }
                    OperandKind::Reg(reg.0)
                }
                X86OperandType::Imm(imm) => {
                    if cflow {
                        insn.target = Some(imm as Address);
                    }
                    OperandKind::Imm(imm)
                }
                X86OperandType::Mem(mem) => {
                    if cflow {
                        insn.flags |= InsnFlags::INDIRECT;
                    }
                    OperandKind::Mem(MemOperand {
                        segment: mem.segment().0,
                        base: mem.base().0,
                        index: mem.index().0,
                        scale: mem.scale(),
                        disp: mem.disp(),
                    })
                }
                _ => OperandKind::None,
            };
            insn.operands.push(Operand { kind, size: op.size });
        }

        bb.insns.push(insn);
        offset += size;
        pc += size as Address;

        if cflow {
            // end of basic block
            break;
        }
    }

    if ndisassembled == 0 && !bb.invalid {
        bb.invalid = true;
        bb.end += 1; // ensure forward progress
    }

    Ok(ndisassembled)
}

/// Drain the exploration worklist for one section.
///
/// The queue holds indices into `dis.blocks`; the initial seed is the
/// strategy's no-parent case. Seed deduplication is the strategy's job
/// (the address map exists for exactly that), so the engine never filters.
pub fn disasm_section(
    bin: &Binary,
    dis: &mut DisasmSection<'_>,
    strategy: &dyn Strategy,
    opts: &Options,
) -> Result<(), DisassemblyError> {
    if dis.section.kind != SectionType::Code && opts.only_code_sections {
        warn!("skipping non-code section '{}'", dis.section.name);
        return Ok(());
    }

    debug!("disassembling section '{}'", dis.section.name);

    let mut queue: VecDeque<Option<usize>> = VecDeque::new();
    queue.push_back(None);
    while let Some(parent_idx) = queue.pop_front() {
        let mut mutants = {
            let parent = parent_idx.map(|i| &dis.blocks[i]);
            strategy.mutate(dis, parent)
        };

        for bb in mutants.iter_mut() {
            disasm_bb(bin, dis, bb)?;
            bb.score = strategy.score(dis, bb)?;
        }

        let keep = strategy.select(dis, &mut mutants)?;
        for bb in mutants.into_iter().take(keep) {
            if !bb.alive {
                continue;
            }
            dis.addrmap.add_addr_flag(bb.start, RegionFlags::BB_START);
            for ins in &bb.insns {
                dis.addrmap.add_addr_flag(ins.start, RegionFlags::INS_START);
            }
            for vma in bb.start..bb.end {
                dis.addrmap.add_addr_flag(vma, RegionFlags::CODE);
            }
            dis.blocks.push(bb);
            queue.push_back(Some(dis.blocks.len() - 1));
        }
    }

    Ok(())
}

fn init_disasm<'a>(bin: &'a Binary, opts: &Options) -> Vec<DisasmSection<'a>> {
    let mut sections = Vec::new();
    for sec in &bin.sections {
        let in_scope = match sec.kind {
            SectionType::Code => true,
            SectionType::Data => !opts.only_code_sections,
        };
        if !in_scope {
            continue;
        }

        let mut dis = DisasmSection::new(sections.len(), sec);
        for vma in sec.vma..sec.end() {
            dis.addrmap.insert(vma);
        }
        sections.push(dis);
    }
    debug!("disassembler initialized");
    sections
}

/// Recover basic blocks in every in-scope section of `bin`.
///
/// Sections are explored in order, each to completion; a failure in any
/// section fails the run.
pub fn disasm<'a>(
    bin: &'a Binary,
    opts: &Options,
) -> Result<Vec<DisasmSection<'a>>, DisassemblyError> {
    if bin.arch != Arch::X86 {
        return Err(DisassemblyError::UnsupportedArchitecture(bin.arch));
    }
    if !matches!(bin.bits, 16 | 32 | 64) {
        return Err(DisassemblyError::UnsupportedBitWidth(bin.bits));
    }

    let strategy = opts.strategy.create();
    let mut sections = init_disasm(bin, opts);
    for dis in sections.iter_mut() {
        disasm_section(bin, dis, strategy.as_ref(), opts)?;
    }

    info!("disassembly complete");
    Ok(sections)
}
