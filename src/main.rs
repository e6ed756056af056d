//! Quill semantic checker
//!
//! Boundary tool around the analysis stage: the parser serializes its AST
//! to JSON, `quillc` analyzes it and reports semantic errors, and on
//! success can emit the computed facts for the interpreter.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;

use quill_lang::frontend::ast::{Ast, NodeId};
use quill_lang::frontend::semantic::{analyze, Analysis};
use quill_lang::solver::Typing;

/// Quill semantic checker
#[derive(Parser, Debug)]
#[command(name = "quillc")]
#[command(version = "0.1.0")]
#[command(about = "Semantic analysis for the Quill language")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check a parsed program (JSON-encoded AST) for semantic errors
    Check {
        /// Input AST file (.json)
        input: PathBuf,
    },
    /// Check a parsed program and emit the computed facts as JSON
    Facts {
        /// Input AST file (.json)
        input: PathBuf,
    },
    /// Print version information
    Version,
}

/// Per-node facts handed to the interpreter.
#[derive(Serialize)]
struct Facts {
    /// Expression/declaration types, rendered; templated expressions carry
    /// one entry per instantiation site
    types: BTreeMap<u32, Vec<String>>,
    /// Completion flags of block/if/return statements
    returns: BTreeMap<u32, bool>,
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Check { input } => check_file(&input, false),
        Commands::Facts { input } => check_file(&input, true),
        Commands::Version => {
            println!("quillc 0.1.0");
            Ok(())
        }
    };
    if let Err(e) = result {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

fn load_ast(input: &Path) -> anyhow::Result<Ast> {
    let source = std::fs::read_to_string(input)
        .with_context(|| format!("reading {}", input.display()))?;
    let ast: Ast = serde_json::from_str(&source)
        .with_context(|| format!("decoding AST from {}", input.display()))?;
    Ok(ast)
}

fn check_file(input: &Path, emit_facts: bool) -> anyhow::Result<()> {
    let ast = load_ast(input)?;
    log::debug!("loaded {} nodes from {}", ast.len(), input.display());

    let analysis = analyze(&ast);
    if !analysis.ok() {
        analysis.report_errors(|error| {
            eprintln!("error: {error}");
        });
        eprintln!("{} semantic error(s)", analysis.errors().len());
        process::exit(1);
    }

    if emit_facts {
        let facts = collect_facts(&ast, &analysis);
        println!("{}", serde_json::to_string_pretty(&facts)?);
    } else {
        println!("no semantic errors");
    }
    Ok(())
}

fn collect_facts(ast: &Ast, analysis: &Analysis) -> Facts {
    let mut types = BTreeMap::new();
    let mut returns = BTreeMap::new();
    for id in 0..ast.len() as u32 {
        let node = NodeId(id);
        if let Some(typing) = analysis.typing(node) {
            let rendered = match typing {
                Typing::Resolved(ty) => vec![ty.to_string()],
                Typing::Instantiated(list) => list.iter().map(|t| t.to_string()).collect(),
            };
            types.insert(id, rendered);
        }
        if let Some(flag) = analysis.returns(node) {
            returns.insert(id, flag);
        }
    }
    Facts { types, returns }
}
