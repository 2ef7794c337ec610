//! `tensorjet` command line driver
//!
//! Usage:
//!   tensorjet compile graph.json --outputs y,z -o generated.rs

use std::fs;
use std::path::PathBuf;
use std::process;

const COMPILE_USAGE: &str =
    "Usage: tensorjet compile <graph.json> --outputs <a,b,..> [-o <file>] [OPTIONS]";

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();

    match args.first().map(|s| s.as_str()) {
        Some("compile") => cmd_compile(&args[1..]),
        Some("--help") | Some("-h") | None => print_usage(),
        Some(other) => {
            eprintln!("error: unknown subcommand '{other}'");
            eprintln!();
            print_usage();
            process::exit(1);
        }
    }
}

fn print_usage() {
    eprintln!("tensorjet: graph to Rust source compiler");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  tensorjet compile <graph.json> --outputs <a,b,..> [-o <file>]");
    eprintln!();
    eprintln!("Subcommands:");
    eprintln!("  compile   Compile the named outputs of a graph into a Rust module");
}

// ---------------------------------------------------------------------------
// compile
// ---------------------------------------------------------------------------

fn cmd_compile(args: &[String]) {
    use tensorjet::codegen::{compile_with, CompileOptions, GraphEvaluator};
    use tensorjet::format::{ExternalFormatter, Formatter, PrettyPlease};
    use tensorjet::parse::json;

    let mut graph_path: Option<String> = None;
    let mut outputs: Vec<String> = Vec::new();
    let mut out_file: Option<PathBuf> = None;
    let mut options = CompileOptions::default();
    let mut use_rustfmt = false;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--outputs" => {
                i += 1;
                let list = value_of(args, i, "--outputs requires a comma-separated list");
                outputs.extend(
                    list.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(String::from),
                );
            }
            "--out" | "-o" => {
                i += 1;
                out_file = Some(PathBuf::from(value_of(args, i, COMPILE_USAGE)));
            }
            "--unit" => {
                i += 1;
                options.unit_name = value_of(args, i, "--unit requires a struct name").to_string();
            }
            "--method" => {
                i += 1;
                options.method_name =
                    value_of(args, i, "--method requires a method name").to_string();
            }
            "--module" => {
                i += 1;
                options.module_name =
                    value_of(args, i, "--module requires a module name").to_string();
            }
            "--no-bindings" => options.python_bindings = false,
            "--rustfmt" => use_rustfmt = true,
            "--help" | "-h" => {
                eprintln!("{COMPILE_USAGE}");
                eprintln!();
                eprintln!("Compile the requested outputs of a JSON graph into a Rust module.");
                eprintln!();
                eprintln!("Options:");
                eprintln!("  --outputs <A,B>   Output tensors, in return order (required)");
                eprintln!("  -o, --out <FILE>  Write to FILE instead of stdout");
                eprintln!("  --unit <NAME>     Generated struct name (default: TensorJet)");
                eprintln!("  --method <NAME>   Generated method name (default: run)");
                eprintln!("  --module <NAME>   Python module name (default: tensorjet)");
                eprintln!("  --no-bindings     Skip the pyo3 class/module export");
                eprintln!("  --rustfmt         Format with rustfmt instead of prettyplease");
                eprintln!();
                eprintln!("Environment:");
                eprintln!("  RUST_LOG=info    Show compile summary");
                eprintln!("  RUST_LOG=debug   Show every node and statement");
                process::exit(0);
            }
            _ => {
                if graph_path.is_none() {
                    graph_path = Some(args[i].clone());
                } else {
                    eprintln!("Unexpected argument: {}", args[i]);
                    eprintln!("{COMPILE_USAGE}");
                    process::exit(1);
                }
            }
        }
        i += 1;
    }

    let graph_path = graph_path.unwrap_or_else(|| {
        eprintln!("{COMPILE_USAGE}");
        process::exit(1);
    });
    if outputs.is_empty() {
        eprintln!("error: --outputs is required");
        eprintln!("{COMPILE_USAGE}");
        process::exit(1);
    }

    let graph = json::from_path(&graph_path).unwrap_or_else(|err| {
        eprintln!("Error loading graph: {err}");
        process::exit(1);
    });

    let rustfmt = ExternalFormatter::rustfmt();
    let formatter: &dyn Formatter = if use_rustfmt { &rustfmt } else { &PrettyPlease };

    let output_refs: Vec<&str> = outputs.iter().map(String::as_str).collect();
    let source = compile_with(&output_refs, &graph, &options, &GraphEvaluator, formatter)
        .unwrap_or_else(|err| {
            eprintln!("Error: {err}");
            process::exit(1);
        });

    match out_file {
        Some(path) => {
            if let Err(err) = fs::write(&path, source) {
                eprintln!("Error writing {}: {err}", path.display());
                process::exit(1);
            }
            eprintln!("Generated {}", path.display());
        }
        None => print!("{source}"),
    }
}

// ---------------------------------------------------------------------------
// helpers
// ---------------------------------------------------------------------------

fn value_of<'a>(args: &'a [String], i: usize, usage: &str) -> &'a str {
    args.get(i).map(String::as_str).unwrap_or_else(|| {
        eprintln!("{usage}");
        process::exit(1);
    })
}
