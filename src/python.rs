//! Python bindings for the fission disassembler

use pyo3::exceptions::{PyIOError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyDict;

use crate::format::{OutputFormat, SectionFormatter};
use crate::strategy::StrategyKind;
use crate::{engine, loader, Options};

/// Recover basic blocks from binary data and render them in the requested
/// output format.
#[pyfunction]
#[pyo3(signature = (
    binary_data,
    strategy="recursive",
    output_format="text",
    include_data=false
))]
fn disassemble(
    binary_data: Vec<u8>,
    strategy: &str,
    output_format: &str,
    include_data: bool,
) -> PyResult<String> {
    let binary = loader::load(&binary_data)
        .map_err(|e| PyValueError::new_err(format!("failed to load binary: {}", e)))?;

    let strategy = match strategy.to_lowercase().as_str() {
        "linear" => StrategyKind::Linear,
        "recursive" => StrategyKind::Recursive,
        _ => return Err(PyValueError::new_err(format!("Unknown strategy: {}", strategy))),
    };

    let output_format: OutputFormat = output_format
        .to_lowercase()
        .parse()
        .map_err(PyValueError::new_err)?;

    let opts = Options {
        only_code_sections: !include_data,
        strategy,
    };
    let sections = engine::disasm(&binary, &opts)
        .map_err(|e| PyValueError::new_err(format!("disassembly failed: {}", e)))?;

    output_format
        .get_formatter()
        .format(&sections)
        .map_err(|e| PyValueError::new_err(format!("failed to format output: {}", e)))
}

/// Recover basic blocks from a file on disk.
#[pyfunction]
#[pyo3(signature = (
    file_path,
    strategy="recursive",
    output_format="text",
    include_data=false
))]
fn disassemble_file(
    file_path: &str,
    strategy: &str,
    output_format: &str,
    include_data: bool,
) -> PyResult<String> {
    let bytes = std::fs::read(file_path)
        .map_err(|e| PyIOError::new_err(format!("failed to read file {}: {}", file_path, e)))?;

    disassemble(bytes, strategy, output_format, include_data)
}

/// Python module initialization
#[pymodule]
fn fission(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(disassemble, m)?)?;
    m.add_function(wrap_pyfunction!(disassemble_file, m)?)?;

    let py = m.py();
    let output_format = PyDict::new_bound(py);
    output_format.set_item("TEXT", "text")?;
    output_format.set_item("JSON", "json")?;
    output_format.set_item("JSONL", "jsonl")?;
    output_format.set_item("CSV", "csv")?;
    m.setattr("OutputFormat", output_format)?;

    let strategy = PyDict::new_bound(py);
    strategy.set_item("LINEAR", "linear")?;
    strategy.set_item("RECURSIVE", "recursive")?;
    m.setattr("Strategy", strategy)?;

    Ok(())
}
