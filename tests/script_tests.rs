/// Script loading integration tests: lexing, parsing, scene registry and
/// the loader against fixture scripts.

use narrative_script::core::lexer::tokenize;
use narrative_script::core::loader::{LoaderConfig, ScriptLoader};
use narrative_script::core::parser::parse;
use narrative_script::core::printer::{script_to_source, to_source};
use narrative_script::core::registry::{Script, ScriptError};
use narrative_script::schema::expr::{CompareOp, Condition, Expression};
use narrative_script::schema::statement::{Statement, StatementKind};
use narrative_script::schema::value::Value;

fn fixture(name: &str) -> String {
    std::fs::read_to_string(format!("tests/fixtures/{name}")).unwrap()
}

fn parse_source(source: &str) -> Vec<Statement> {
    parse(tokenize(source).tokens).unwrap()
}

#[test]
fn welcome_script_registers_scenes_in_order() {
    let script = Script::parse(&fixture("welcome.vns")).unwrap();
    let names: Vec<&str> = script.scene_names().collect();
    assert_eq!(names, vec!["start", "greetings", "wonder", "end", "town_square"]);
    assert_eq!(script.scene("start").map(|s| s.line), Some(1));
}

#[test]
fn parsing_is_deterministic() {
    let source = fixture("welcome.vns");
    assert_eq!(parse_source(&source), parse_source(&source));
}

#[test]
fn printed_scripts_reparse_to_the_same_tree() {
    for source in [
        fixture("welcome.vns"),
        std::fs::read_to_string("demos/scripts/campus_day.vns").unwrap(),
    ] {
        let original = parse_source(&source);
        let printed = to_source(&original);
        assert_eq!(parse_source(&printed), original, "printed:\n{printed}");
    }
}

#[test]
fn registry_output_reloads_identically() {
    let script = Script::parse(&fixture("welcome.vns")).unwrap();
    let reloaded = Script::parse(&script_to_source(&script)).unwrap();
    let shape = |s: &Script| {
        s.scenes()
            .iter()
            .map(|scene| (scene.name.clone(), scene.statements.clone()))
            .collect::<Vec<_>>()
    };
    assert_eq!(shape(&script), shape(&reloaded));
}

#[test]
fn dedent_closes_both_branches() {
    let script = Script::parse(&fixture("welcome.vns")).unwrap();
    let start = &script.scene("start").unwrap().statements;

    let kinds: Vec<&str> = start
        .iter()
        .map(|s| match &s.kind {
            StatementKind::Var { .. } => "var",
            StatementKind::Set { .. } => "set",
            StatementKind::Dialogue { .. } => "dialogue",
            StatementKind::Conditional { .. } => "if",
            StatementKind::Choice { .. } => "choice",
            _ => "other",
        })
        .collect();
    assert_eq!(kinds, vec!["var", "set", "dialogue", "dialogue", "if", "choice"]);

    let StatementKind::Conditional {
        condition,
        then_branch,
        else_branch,
    } = &start[4].kind
    else {
        panic!("expected a conditional");
    };
    assert_eq!(
        *condition,
        Condition::compare(
            Expression::Variable("knowledge".to_string()),
            CompareOp::Ge,
            Expression::Literal(Value::Int(5))
        )
    );
    assert_eq!(then_branch.len(), 2);
    assert_eq!(else_branch.as_ref().map(Vec::len), Some(2));
}

#[test]
fn choice_conditions_are_parsed_from_option_lines() {
    let script = Script::parse(&fixture("welcome.vns")).unwrap();
    let start = &script.scene("start").unwrap().statements;
    let StatementKind::Choice { options } = &start[5].kind else {
        panic!("expected a choice");
    };
    assert_eq!(options[0].text, "Hello?");
    assert_eq!(options[0].target, "greetings");
    assert!(options[0].condition.is_some());
    assert_eq!(options[1].text, "Who are you?");
    assert!(options[1].condition.is_none());
}

#[test]
fn broken_script_reports_every_syntax_error() {
    let err = Script::parse(&fixture("broken.vns")).unwrap_err();
    let ScriptError::Syntax(errors) = err else {
        panic!("expected syntax errors, got {err}");
    };
    let lines: Vec<usize> = errors.iter().map(|e| e.line).collect();
    assert_eq!(lines, vec![2, 4, 5, 9]);
}

#[test]
fn unresolved_choice_target_fails_the_load() {
    let err = ScriptLoader::new()
        .script_file("tests/fixtures/unresolved.vns")
        .build()
        .unwrap_err();
    assert!(matches!(
        err,
        ScriptError::UnresolvedScene { ref name, line: 3 } if name == "library"
    ));
}

#[test]
fn loader_reads_directories_in_file_order() {
    let loaded = ScriptLoader::new()
        .scripts_dir("tests/fixtures/multi")
        .build()
        .unwrap();
    let names: Vec<&str> = loaded.script.scene_names().collect();
    assert_eq!(names, vec!["", "intro", "market", "outro"]);
}

#[test]
fn loader_reads_config_file() {
    let loaded = ScriptLoader::new()
        .config_file("tests/fixtures/loader.ron")
        .with_source("inline.vns", "@a:\nif x:\n  end\n")
        .build()
        .unwrap();
    assert_eq!(
        loaded.config,
        LoaderConfig {
            strict_lexing: false,
            tab_width: 2,
            max_steps: 500,
        }
    );
    assert_eq!(loaded.executor().step_limit(), 500);
}

#[test]
fn tab_width_controls_mixed_indentation() {
    // With a tab width of 4, a tab and four spaces open the same level.
    let source = "@a:\nif x:\n\tvar a 1\n    var b 2\n";
    let loaded = ScriptLoader::new()
        .with_source("tabs.vns", source)
        .build()
        .unwrap();
    let stmts = &loaded.script.scene("a").unwrap().statements;
    assert!(matches!(&stmts[0].kind, StatementKind::Conditional { then_branch, .. } if then_branch.len() == 2));
    assert!(loaded.warnings.is_empty());
}

#[test]
fn missing_script_file_is_an_io_error() {
    let err = ScriptLoader::new()
        .script_file("tests/fixtures/does_not_exist.vns")
        .build()
        .unwrap_err();
    assert!(matches!(err, ScriptError::Io(_)));
}
