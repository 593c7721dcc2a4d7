//! JSON and JSON Lines output formatters

use serde::{Deserialize, Serialize};

use super::{JsonFormatter, JsonLinesFormatter, SectionFormatter};
use crate::{BasicBlock, DisasmSection, DisassemblyError};

/// Serializable instruction for JSON output
#[derive(Serialize, Deserialize)]
struct InstructionJson {
    /// Address of the instruction
    address: String,
    /// Size of the instruction in bytes
    size: u8,
    /// Mnemonic (e.g., "mov", "ret")
    mnemonic: String,
    /// Operand string
    op_str: String,
    /// Branch target, for direct control flow
    #[serde(skip_serializing_if = "Option::is_none")]
    target: Option<String>,
}

/// Serializable basic block for JSON output
#[derive(Serialize, Deserialize)]
struct BlockJson {
    /// Containing section name (JSON Lines only)
    #[serde(skip_serializing_if = "Option::is_none")]
    section: Option<String>,
    /// Start address of the block
    start: String,
    /// End address of the block (exclusive)
    end: String,
    /// Strategy confidence score
    score: f64,
    invalid: bool,
    padding: bool,
    trap: bool,
    privileged: bool,
    /// Instructions in this block
    instructions: Vec<InstructionJson>,
}

/// Serializable section for JSON output
#[derive(Serialize, Deserialize)]
struct SectionJson {
    /// Section name
    name: String,
    /// Base address of the section
    vma: String,
    /// Section size in bytes
    size: u64,
    /// Recovered blocks, sorted by start address
    blocks: Vec<BlockJson>,
}

/// Serializable disassembly result for JSON output
#[derive(Serialize, Deserialize)]
struct DisassemblyJson {
    sections: Vec<SectionJson>,
}

fn instruction_to_json(ins: &crate::Instruction) -> InstructionJson {
    InstructionJson {
        address: format!("0x{:x}", ins.start),
        size: ins.size,
        mnemonic: ins.mnemonic.clone(),
        op_str: ins.op_str.clone(),
        target: ins.target.map(|t| format!("0x{:x}", t)),
    }
}

fn block_to_json(bb: &BasicBlock, section: Option<String>) -> BlockJson {
    BlockJson {
        section,
        start: format!("0x{:x}", bb.start),
        end: format!("0x{:x}", bb.end),
        score: bb.score,
        invalid: bb.invalid,
        padding: bb.padding,
        trap: bb.trap,
        privileged: bb.privileged,
        instructions: bb.insns.iter().map(instruction_to_json).collect(),
    }
}

fn sorted_blocks<'a>(dis: &'a DisasmSection<'_>) -> Vec<&'a BasicBlock> {
    let mut blocks: Vec<&BasicBlock> = dis.blocks.iter().collect();
    blocks.sort_by_key(|b| (b.start, b.end));
    blocks
}

impl SectionFormatter for JsonFormatter {
    fn format(&self, sections: &[DisasmSection<'_>]) -> Result<String, DisassemblyError> {
        let doc = DisassemblyJson {
            sections: sections
                .iter()
                .map(|dis| SectionJson {
                    name: dis.section.name.clone(),
                    vma: format!("0x{:x}", dis.section.vma),
                    size: dis.section.size,
                    blocks: sorted_blocks(dis)
                        .into_iter()
                        .map(|bb| block_to_json(bb, None))
                        .collect(),
                })
                .collect(),
        };

        serde_json::to_string_pretty(&doc).map_err(|e| DisassemblyError::Format(e.to_string()))
    }
}

impl SectionFormatter for JsonLinesFormatter {
    fn format(&self, sections: &[DisasmSection<'_>]) -> Result<String, DisassemblyError> {
        let mut out = String::new();
        for dis in sections {
            for bb in sorted_blocks(dis) {
                let line = block_to_json(bb, Some(dis.section.name.clone()));
                out.push_str(
                    &serde_json::to_string(&line)
                        .map_err(|e| DisassemblyError::Format(e.to_string()))?,
                );
                out.push('\n');
            }
        }
        Ok(out)
    }
}
