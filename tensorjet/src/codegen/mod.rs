//! Graph → Rust source.
//!
//! `lower()` classifies the graph and translates every computed node into a
//! `TranslationUnit`; `render()` turns that into tokens; a `Formatter` turns
//! the tokens into text.

pub mod classify;
pub mod eval;
pub mod ident;
pub mod lower;
pub mod ops;
pub mod plan;
pub mod render;
pub mod types;
mod value_expr;

use crate::error::CompileError;
use crate::format::{Formatter, PrettyPlease};
use crate::ir::Graph;

pub use eval::{EvalContext, EvalError, Evaluator, GraphEvaluator};
pub use lower::lower;
pub use plan::TranslationUnit;
pub use render::render;

/// Names and switches for the generated unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOptions {
    /// Name of the generated struct.
    pub unit_name: String,
    /// Name of the method that runs the graph.
    pub method_name: String,
    /// Name the Python extension module is exported under.
    pub module_name: String,
    /// Emit the pyo3 class/module export.
    pub python_bindings: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            unit_name: "TensorJet".to_string(),
            method_name: "run".to_string(),
            module_name: "tensorjet".to_string(),
            python_bindings: true,
        }
    }
}

impl CompileOptions {
    pub fn validate(&self) -> Result<(), CompileError> {
        for (what, name) in [
            ("unit name", &self.unit_name),
            ("method name", &self.method_name),
            ("module name", &self.module_name),
        ] {
            if !ident::is_plain_ident(name) {
                return Err(CompileError::InvalidOption(format!(
                    "{what} {name:?} is not a plain identifier"
                )));
            }
        }
        // `new` is always generated alongside the method
        if self.method_name == "new" {
            return Err(CompileError::InvalidOption(
                "method name \"new\" clashes with the constructor".to_string(),
            ));
        }
        Ok(())
    }
}

/// Compile `outputs` of `graph` with default options, the reference evaluator
/// and the in-process formatter.
pub fn compile(outputs: &[&str], graph: &Graph) -> Result<String, CompileError> {
    compile_with(
        outputs,
        graph,
        &CompileOptions::default(),
        &GraphEvaluator,
        &PrettyPlease,
    )
}

pub fn compile_with(
    outputs: &[&str],
    graph: &Graph,
    options: &CompileOptions,
    evaluator: &dyn Evaluator,
    formatter: &dyn Formatter,
) -> Result<String, CompileError> {
    let unit = lower(outputs, graph, options, evaluator)?;
    let tokens = render(&unit, options);
    let source = formatter.format(tokens)?;
    log::info!(
        "compiled {} outputs into {} bytes of source",
        outputs.len(),
        source.len()
    );
    Ok(source)
}
