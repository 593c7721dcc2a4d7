//! CSV output formatter

use super::{CsvFormatter, SectionFormatter};
use crate::{BasicBlock, DisasmSection, DisassemblyError};

impl SectionFormatter for CsvFormatter {
    fn format(&self, sections: &[DisasmSection<'_>]) -> Result<String, DisassemblyError> {
        let mut output = String::new();

        // CSV header
        output.push_str("section,block_start,block_end,score,invalid,address,size,mnemonic,op_str\n");

        for dis in sections {
            let mut blocks: Vec<&BasicBlock> = dis.blocks.iter().collect();
            blocks.sort_by_key(|b| (b.start, b.end));

            for bb in blocks {
                let section = escape_csv_field(&dis.section.name);
                let block_start = format!("0x{:x}", bb.start);
                let block_end = format!("0x{:x}", bb.end);

                if bb.insns.is_empty() {
                    // invalid blocks carry no instructions but still occupy bytes
                    output.push_str(&format!(
                        "{},{},{},{},{},\"\",\"\",\"\",\"\"\n",
                        section, block_start, block_end, bb.score, bb.invalid
                    ));
                    continue;
                }

                for insn in &bb.insns {
                    let mnemonic = escape_csv_field(&insn.mnemonic);
                    let op_str = escape_csv_field(&insn.op_str);
                    output.push_str(&format!(
                        "{},{},{},{},{},0x{:x},{},{},{}\n",
                        section,
                        block_start,
                        block_end,
                        bb.score,
                        bb.invalid,
                        insn.start,
                        insn.size,
                        mnemonic,
                        op_str
                    ));
                }
            }
        }

        Ok(output)
    }
}

/// Helper function to escape a field for CSV output
fn escape_csv_field(field: &str) -> String {
    if field.contains(',') || field.contains('\"') || field.contains('\n') {
        let escaped = field.replace('\"', "\"\"");
        format!("\"{}\"", escaped)
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{sample_dis, sample_section};
    use super::*;

    #[test]
    fn test_csv_rows_per_instruction() {
        let sec = sample_section();
        let dis = sample_dis(&sec);
        let out = CsvFormatter.format(std::slice::from_ref(&dis)).unwrap();

        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 3); // header + two instructions
        assert!(lines[0].starts_with("section,block_start"));
        assert!(lines[1].contains(".text,0x1000,0x1001"));
        assert!(lines[1].contains("nop"));
        assert!(lines[2].contains("ret"));
    }

    #[test]
    fn test_csv_escaping() {
        assert_eq!(escape_csv_field("ret"), "ret");
        assert_eq!(escape_csv_field("a,b"), "\"a,b\"");
        assert_eq!(escape_csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }
}
