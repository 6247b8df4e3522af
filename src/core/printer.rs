/// Serializes statement trees back to script text.
///
/// Output re-parses to an equal tree. Expressions get the minimum
/// parentheses their precedence needs; blocks indent by four spaces.

use std::fmt::{self, Write};

use crate::core::registry::Script;
use crate::schema::expr::{Condition, Expression};
use crate::schema::statement::{ChoiceOption, Statement, StatementKind};
use crate::schema::value::Value;

const INDENT: &str = "    ";

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_expr(f, self, 0, false)
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::BoolCheck(name) => write!(f, "{name}"),
            Condition::Comparison { left, op, right } => {
                write!(f, "{left} {} {right}", op.symbol())
            }
        }
    }
}

fn write_expr(f: &mut fmt::Formatter<'_>, expr: &Expression, parent: u8, right_side: bool) -> fmt::Result {
    match expr {
        Expression::Literal(value) => write_literal(f, value),
        Expression::Formatted(text) => write!(f, "\"{text}\""),
        Expression::Variable(name) => write!(f, "{name}"),
        Expression::Binary { left, op, right } => {
            let prec = op.precedence();
            // Operators are left-associative.
            let wrap = prec < parent || (right_side && prec == parent);
            if wrap {
                f.write_char('(')?;
            }
            write_expr(f, left, prec, false)?;
            write!(f, " {} ", op.symbol())?;
            write_expr(f, right, prec, true)?;
            if wrap {
                f.write_char(')')?;
            }
            Ok(())
        }
    }
}

fn write_literal(f: &mut fmt::Formatter<'_>, value: &Value) -> fmt::Result {
    match value {
        Value::String(s) => write!(f, "\"{s}\""),
        // Display never uses an exponent; the lexer needs the `.` to see a float.
        Value::Float(x) => {
            let text = x.to_string();
            if text.contains('.') {
                write!(f, "{text}")
            } else {
                write!(f, "{text}.0")
            }
        }
        Value::Int(i) => write!(f, "{i}"),
        Value::Bool(b) => write!(f, "{b}"),
    }
}

/// Render a statement list as script text.
pub fn to_source(statements: &[Statement]) -> String {
    let mut out = String::new();
    for stmt in statements {
        write_statement(&mut out, stmt, 0);
    }
    out
}

/// Render every scene of a script, markers included.
pub fn script_to_source(script: &Script) -> String {
    let mut out = String::new();
    for scene in script.scenes() {
        if !scene.name.is_empty() {
            out.push_str(&format!("@{}:\n", scene.name));
        }
        for stmt in &scene.statements {
            write_statement(&mut out, stmt, 0);
        }
    }
    out
}

fn write_statement(out: &mut String, stmt: &Statement, depth: usize) {
    let pad = INDENT.repeat(depth);
    let line = match &stmt.kind {
        StatementKind::SceneDef { name } => format!("@{name}:"),
        StatementKind::Dialogue { speaker, text } if speaker.is_empty() => format!("$: {text}"),
        StatementKind::Dialogue { speaker, text } => format!("{speaker}: {text}"),
        StatementKind::Choice { options } => {
            out.push_str(&format!("{pad}choice:\n"));
            for option in options {
                out.push_str(&format!("{pad}{INDENT}{}\n", option_line(option)));
            }
            return;
        }
        StatementKind::Conditional {
            condition,
            then_branch,
            else_branch,
        } => {
            out.push_str(&format!("{pad}if {condition}:\n"));
            for inner in then_branch {
                write_statement(out, inner, depth + 1);
            }
            if let Some(body) = else_branch {
                out.push_str(&format!("{pad}else:\n"));
                for inner in body {
                    write_statement(out, inner, depth + 1);
                }
            }
            return;
        }
        StatementKind::Media { kind, argument } => {
            format!("{} \"{argument}\"", kind.command().keyword())
        }
        StatementKind::Goto { target } => format!("goto @{target}"),
        StatementKind::Move { location } => format!("move @{location}"),
        StatementKind::Stat { name, value } => format!("stat {name} {value}"),
        StatementKind::Var { name, value } => format!("var {name} {value}"),
        StatementKind::Set { name, value } => format!("set {name} {value}"),
        StatementKind::End => "end".to_string(),
        StatementKind::Place {
            object,
            image,
            position,
        } => match position {
            Some((x, y)) => format!("place {object} \"{image}\" {x} {}", coordinate(y)),
            None => format!("place {object} \"{image}\""),
        },
        StatementKind::Remove { object } => format!("remove {object}"),
    };
    out.push_str(&pad);
    out.push_str(&line);
    out.push('\n');
}

fn option_line(option: &ChoiceOption) -> String {
    let text = option.text.replace('(', "\\(").replace(')', "\\)");
    match &option.condition {
        Some(condition) => format!("{text} ({condition}) -> @{}", option.target),
        None => format!("{text} -> @{}", option.target),
    }
}

/// The second coordinate follows the first directly, so anything that
/// could read as a continuation of it is wrapped.
fn coordinate(expr: &Expression) -> String {
    match expr {
        Expression::Variable(_) => expr.to_string(),
        Expression::Literal(Value::Int(i)) if *i >= 0 => expr.to_string(),
        Expression::Literal(Value::Float(x)) if *x >= 0.0 => expr.to_string(),
        _ => format!("({expr})"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::lexer::tokenize;
    use crate::core::parser::parse;
    use crate::schema::expr::BinaryOp;

    fn round_trip(source: &str) {
        let first = parse(tokenize(source).tokens).unwrap();
        let printed = to_source(&first);
        let second = parse(tokenize(&printed).tokens)
            .unwrap_or_else(|e| panic!("reprinted source failed to parse: {e:?}\n{printed}"));
        assert_eq!(first, second, "printed:\n{printed}");
    }

    #[test]
    fn expression_parentheses() {
        let e = Expression::binary(
            Expression::Variable("a".into()),
            BinaryOp::Sub,
            Expression::binary(Expression::Variable("b".into()), BinaryOp::Sub, Expression::Variable("c".into())),
        );
        assert_eq!(e.to_string(), "a - (b - c)");
        let e = Expression::binary(
            Expression::binary(Expression::Literal(Value::Int(1)), BinaryOp::Add, Expression::Literal(Value::Int(2))),
            BinaryOp::Mul,
            Expression::Literal(Value::Float(3.0)),
        );
        assert_eq!(e.to_string(), "(1 + 2) * 3.0");
    }

    #[test]
    fn round_trips_commands() {
        round_trip(
            "@start:\nbg classroom\nbgm \"theme.ogg\"\nsound \"victory.wav\"\nshow maria_smile\nvar user \"Player\"\nset knowledge 3\nstat wisdom -2.5\nvar greeting \"Hi {user}\"\nplace door \"door.png\" 10 (-5)\nplace sign \"sign.png\"\nremove door\nmove @plaza\ngoto @start\nend\n@plaza:\nend\n",
        );
    }

    #[test]
    fn round_trips_blocks() {
        round_trip(
            "@a:\nif (knowledge >= 5):\n    maria: Impressive, {user}!\n    if met_john:\n        $: They nod.\n    else:\n        stat charm 1\nelse:\n    maria: Study more.\nchoice:\n    Ask \\(politely\\) (charm * 2 > 4) -> @a\n    Leave -> @a\n",
        );
    }

    #[test]
    fn round_trips_arithmetic() {
        round_trip("var x (1 + 2) * 3 - 4 / (5 - 6)\nvar y a - -5\nvar z 0 - -b\nvar w 10 - (4 - 3)\n");
        round_trip("var big 100000000000000000.0\nvar tiny 0.0000001\nvar whole 3.0 * -2.0\n");
    }

    #[test]
    fn floats_print_without_exponents() {
        let big = Expression::Literal(Value::Float(1e17));
        assert_eq!(big.to_string(), "100000000000000000.0");
        let tiny = Expression::Literal(Value::Float(1e-7));
        assert_eq!(tiny.to_string(), "0.0000001");
    }

    #[test]
    fn script_output_keeps_markers() {
        let script = Script::parse("var a 1\n@one:\ngoto @two\n@two:\nend\n").unwrap();
        let text = script_to_source(&script);
        assert_eq!(text, "var a 1\n@one:\ngoto @two\n@two:\nend\n");
    }
}
