/// Script Linter: checks scene scripts for errors and suspicious structure.
///
/// Usage: script_linter <script_file_or_dir> [--config <loader.ron>] [--strict]

use narrative_script::core::lexer::LexError;
use narrative_script::core::loader::{load_source, script_files_in, LoaderConfig};
use narrative_script::core::registry::{Script, ScriptError};
use narrative_script::core::template::Template;
use narrative_script::schema::expr::{Condition, Expression};
use narrative_script::schema::statement::{Statement, StatementKind};
use rustc_hash::FxHashSet;
use std::path::{Path, PathBuf};
use std::process;

fn main() {
    env_logger::init();
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        println!("Usage: script_linter <script_file_or_dir> [--config <loader.ron>] [--strict]");
        process::exit(0);
    }

    let target = Path::new(&args[1]);
    let mut config = LoaderConfig::default();
    let mut strict = false;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--config" if i + 1 < args.len() => {
                i += 1;
                config = match LoaderConfig::load_from_ron(Path::new(&args[i])) {
                    Ok(c) => c,
                    Err(e) => {
                        eprintln!("ERROR: Failed to load config: {}", e);
                        process::exit(1);
                    }
                };
            }
            "--strict" => strict = true,
            other => {
                eprintln!("Unknown argument: {}", other);
                process::exit(1);
            }
        }
        i += 1;
    }
    // Lexer diagnostics are reported below either way.
    config.strict_lexing = false;

    let files: Vec<PathBuf> = if target.is_file() {
        vec![target.to_path_buf()]
    } else if target.is_dir() {
        match script_files_in(target) {
            Ok(files) => files,
            Err(e) => {
                eprintln!("ERROR: {}", e);
                process::exit(1);
            }
        }
    } else {
        eprintln!("ERROR: Path '{}' does not exist", target.display());
        process::exit(1);
    };

    let mut errors: Vec<String> = Vec::new();
    let mut warnings: Vec<String> = Vec::new();
    let mut script = Script::default();

    for path in &files {
        let name = path.display().to_string();
        let source = match std::fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) => {
                errors.push(format!("{}: {}", name, e));
                continue;
            }
        };

        match load_source(&source, &config) {
            Ok((part, diagnostics)) => {
                println!("  Loaded: {} ({} scenes)", name, part.len());
                report_lex(&name, &diagnostics, strict, &mut errors, &mut warnings);
                lint_choices(&name, &part, &mut warnings);
                if let Err(e) = script.merge(part) {
                    errors.push(format!("{}: {}", name, e));
                }
            }
            Err(ScriptError::Syntax(syntax)) => {
                for e in syntax {
                    errors.push(format!("{}: {}", name, e));
                }
            }
            Err(e) => errors.push(format!("{}: {}", name, e)),
        }
    }

    println!("Loaded {} scenes from {} file(s)", script.len(), files.len());

    for (scene, line) in script.unresolved_references() {
        errors.push(format!("line {}: reference to undeclared scene `@{}`", line, scene));
    }
    for scene in script.unreferenced_scenes() {
        warnings.push(format!(
            "line {}: scene `@{}` is never targeted and only reachable by fall-through",
            scene.line, scene.name
        ));
    }

    lint_unassigned_names(&script, &mut warnings);

    println!("\n=== Script Lint Report ===\n");

    if errors.is_empty() && warnings.is_empty() {
        println!("All checks passed!");
    }

    for warning in &warnings {
        println!("WARNING: {}", warning);
    }

    for error in &errors {
        println!("ERROR: {}", error);
    }

    println!(
        "\nSummary: {} errors, {} warnings",
        errors.len(),
        warnings.len()
    );

    if errors.is_empty() {
        process::exit(0);
    } else {
        process::exit(1);
    }
}

fn report_lex(
    file: &str,
    diagnostics: &[LexError],
    strict: bool,
    errors: &mut Vec<String>,
    warnings: &mut Vec<String>,
) {
    for diag in diagnostics {
        let message = format!("{}: {}", file, diag);
        if strict {
            errors.push(message);
        } else {
            warnings.push(message);
        }
    }
}

/// A choice where every option is conditional can leave the player stuck.
fn lint_choices(file: &str, script: &Script, warnings: &mut Vec<String>) {
    for scene in script.scenes() {
        walk(&scene.statements, &mut |stmt| {
            if let StatementKind::Choice { options } = &stmt.kind {
                if options.iter().all(|o| o.condition.is_some()) {
                    warnings.push(format!(
                        "{}: line {}: every option of this choice is conditional",
                        file, stmt.line
                    ));
                }
            }
        });
    }
}

fn walk<F: FnMut(&Statement)>(statements: &[Statement], visit: &mut F) {
    for stmt in statements {
        visit(stmt);
        if let StatementKind::Conditional {
            then_branch,
            else_branch,
            ..
        } = &stmt.kind
        {
            walk(then_branch, visit);
            if let Some(body) = else_branch {
                walk(body, visit);
            }
        }
    }
}

/// Names read by conditions, expressions or placeholders that no `var`,
/// `set` or `stat` in the script assigns. They read as 0 or empty unless
/// the host sets them.
fn lint_unassigned_names(script: &Script, warnings: &mut Vec<String>) {
    let mut assigned: FxHashSet<String> = FxHashSet::default();
    let mut reads: Vec<(String, usize)> = Vec::new();

    for scene in script.scenes() {
        walk(&scene.statements, &mut |stmt| {
            let mut names = Vec::new();
            match &stmt.kind {
                StatementKind::Var { name, value }
                | StatementKind::Set { name, value }
                | StatementKind::Stat { name, value } => {
                    assigned.insert(name.clone());
                    expression_reads(value, &mut names);
                }
                StatementKind::Dialogue { text, .. } => template_reads(text, &mut names),
                StatementKind::Conditional { condition, .. } => condition_reads(condition, &mut names),
                StatementKind::Choice { options } => {
                    for condition in options.iter().filter_map(|o| o.condition.as_ref()) {
                        condition_reads(condition, &mut names);
                    }
                }
                StatementKind::Place {
                    position: Some((x, y)),
                    ..
                } => {
                    expression_reads(x, &mut names);
                    expression_reads(y, &mut names);
                }
                _ => {}
            }
            reads.extend(names.into_iter().map(|name| (name, stmt.line)));
        });
    }

    for (name, line) in reads {
        if !assigned.contains(&name) {
            warnings.push(format!("line {}: `{}` is read but never assigned", line, name));
        }
    }
}

fn expression_reads(expr: &Expression, out: &mut Vec<String>) {
    if let Expression::Formatted(text) = expr {
        template_reads(text, out);
    }
    let mut names = Vec::new();
    expr.variables(&mut names);
    out.extend(names.into_iter().map(str::to_string));
}

fn condition_reads(condition: &Condition, out: &mut Vec<String>) {
    match condition {
        Condition::BoolCheck(name) => out.push(name.clone()),
        Condition::Comparison { left, right, .. } => {
            expression_reads(left, out);
            expression_reads(right, out);
        }
    }
}

fn template_reads(text: &str, out: &mut Vec<String>) {
    if let Ok(template) = Template::parse(text) {
        out.extend(template.placeholders().map(str::to_string));
    }
}
