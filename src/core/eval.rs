/// Expression and condition evaluation against a session's stores.

use thiserror::Error;

use crate::core::session::Session;
use crate::core::template::Template;
use crate::schema::expr::{BinaryOp, CompareOp, Condition, Expression};
use crate::schema::value::Value;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("cannot apply `{op}` to {left} and {right}")]
    TypeMismatch {
        op: &'static str,
        left: &'static str,
        right: &'static str,
    },
    #[error("integer overflow in `{op}`")]
    Overflow { op: &'static str },
}

/// Reduce an expression to a value. Unknown names read as `Int(0)`.
pub fn evaluate(expr: &Expression, session: &Session) -> Result<Value, EvalError> {
    match expr {
        Expression::Literal(value) => Ok(value.clone()),
        Expression::Formatted(text) => Ok(Value::String(interpolate(text, session))),
        Expression::Variable(name) => Ok(session.lookup(name)),
        Expression::Binary { left, op, right } => {
            let l = evaluate(left, session)?;
            let r = evaluate(right, session)?;
            arithmetic(&l, *op, &r)
        }
    }
}

/// Evaluate a condition. A bare name checks the variable store only; stats
/// never satisfy it.
pub fn evaluate_condition(condition: &Condition, session: &Session) -> Result<bool, EvalError> {
    match condition {
        Condition::BoolCheck(name) => Ok(session.var(name).is_some_and(Value::is_truthy)),
        Condition::Comparison { left, op, right } => {
            let l = evaluate(left, session)?;
            let r = evaluate(right, session)?;
            compare(&l, *op, &r)
        }
    }
}

/// Apply an arithmetic operator.
///
/// Int with Int stays Int and overflow is an error; any Float operand
/// promotes the result. Division by zero yields `Int(0)`, and an Int
/// quotient that does not divide evenly becomes a Float.
pub fn arithmetic(left: &Value, op: BinaryOp, right: &Value) -> Result<Value, EvalError> {
    let mismatch = || EvalError::TypeMismatch {
        op: op.symbol(),
        left: left.kind(),
        right: right.kind(),
    };
    let overflow = || EvalError::Overflow { op: op.symbol() };

    match (left, right) {
        (Value::Int(a), Value::Int(b)) => {
            let (a, b) = (*a, *b);
            match op {
                BinaryOp::Add => a.checked_add(b).map(Value::Int).ok_or_else(overflow),
                BinaryOp::Sub => a.checked_sub(b).map(Value::Int).ok_or_else(overflow),
                BinaryOp::Mul => a.checked_mul(b).map(Value::Int).ok_or_else(overflow),
                BinaryOp::Div => {
                    if b == 0 {
                        return Ok(Value::Int(0));
                    }
                    match a.checked_rem(b) {
                        Some(0) => a.checked_div(b).map(Value::Int).ok_or_else(overflow),
                        Some(_) => Ok(Value::Float(a as f64 / b as f64)),
                        None => Err(overflow()),
                    }
                }
            }
        }
        _ => {
            let (Some(a), Some(b)) = (left.as_f64(), right.as_f64()) else {
                return Err(mismatch());
            };
            Ok(match op {
                BinaryOp::Add => Value::Float(a + b),
                BinaryOp::Sub => Value::Float(a - b),
                BinaryOp::Mul => Value::Float(a * b),
                BinaryOp::Div if b == 0.0 => Value::Int(0),
                BinaryOp::Div => Value::Float(a / b),
            })
        }
    }
}

/// Apply a comparison. Equality works across all kinds; ordering
/// requires two numbers.
pub fn compare(left: &Value, op: CompareOp, right: &Value) -> Result<bool, EvalError> {
    match op {
        CompareOp::Eq => return Ok(left == right),
        CompareOp::Ne => return Ok(left != right),
        _ => {}
    }

    // Ints compare exactly; mixed pairs go through f64.
    let ordering = match (left, right) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        _ => match (left.as_f64(), right.as_f64()) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => {
                return Err(EvalError::TypeMismatch {
                    op: op.symbol(),
                    left: left.kind(),
                    right: right.kind(),
                })
            }
        },
    };

    // NaN orders with nothing.
    let Some(ordering) = ordering else {
        return Ok(false);
    };
    Ok(match op {
        CompareOp::Ge => ordering.is_ge(),
        CompareOp::Le => ordering.is_le(),
        CompareOp::Gt => ordering.is_gt(),
        CompareOp::Lt => ordering.is_lt(),
        CompareOp::Eq => ordering.is_eq(),
        CompareOp::Ne => ordering.is_ne(),
    })
}

/// Resolve `{name}` placeholders against variables, then stats. Missing
/// names render empty; text that is not a valid template is returned as-is.
pub fn interpolate(text: &str, session: &Session) -> String {
    match Template::parse(text) {
        Ok(template) => template.render(|name| session.display(name)),
        Err(_) => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(i: i64) -> Expression {
        Expression::Literal(Value::Int(i))
    }

    fn float(f: f64) -> Expression {
        Expression::Literal(Value::Float(f))
    }

    fn bin(l: Expression, op: BinaryOp, r: Expression) -> Expression {
        Expression::binary(l, op, r)
    }

    #[test]
    fn literal_comparison() {
        let session = Session::new();
        let cond = Condition::compare(int(5), CompareOp::Ge, int(3));
        assert!(evaluate_condition(&cond, &session).unwrap());
    }

    #[test]
    fn division_by_zero_is_zero() {
        let session = Session::new();
        assert_eq!(
            evaluate(&bin(int(10), BinaryOp::Div, int(0)), &session).unwrap(),
            Value::Int(0)
        );
        assert_eq!(
            evaluate(&bin(float(1.5), BinaryOp::Div, float(0.0)), &session).unwrap(),
            Value::Int(0)
        );
    }

    #[test]
    fn integer_division_rules() {
        let session = Session::new();
        let even = evaluate(&bin(int(10), BinaryOp::Div, int(2)), &session).unwrap();
        assert!(matches!(even, Value::Int(5)));
        let uneven = evaluate(&bin(int(7), BinaryOp::Div, int(2)), &session).unwrap();
        assert!(matches!(uneven, Value::Float(f) if f == 3.5));
    }

    #[test]
    fn mixed_arithmetic_promotes() {
        let session = Session::new();
        let v = evaluate(&bin(int(1), BinaryOp::Add, float(0.5)), &session).unwrap();
        assert!(matches!(v, Value::Float(f) if f == 1.5));
    }

    #[test]
    fn overflow_is_an_error() {
        let session = Session::new();
        let err = evaluate(&bin(int(i64::MAX), BinaryOp::Add, int(1)), &session).unwrap_err();
        assert_eq!(err, EvalError::Overflow { op: "+" });
        assert!(arithmetic(&Value::Int(i64::MIN), BinaryOp::Div, &Value::Int(-1)).is_err());
    }

    #[test]
    fn string_arithmetic_is_rejected() {
        let session = Session::new();
        let err = evaluate(
            &bin(Expression::Literal("a".into()), BinaryOp::Add, int(1)),
            &session,
        )
        .unwrap_err();
        assert_eq!(
            err,
            EvalError::TypeMismatch {
                op: "+",
                left: "string",
                right: "int"
            }
        );
    }

    #[test]
    fn unknown_names_read_as_zero() {
        let session = Session::new();
        let v = evaluate(&bin(Expression::Variable("ghost".into()), BinaryOp::Add, int(2)), &session).unwrap();
        assert_eq!(v, Value::Int(2));
        assert!(!evaluate_condition(&Condition::BoolCheck("ghost".into()), &session).unwrap());
    }

    #[test]
    fn variables_shadow_stats() {
        let mut session = Session::new();
        session.set_stat("charm", Value::Int(4));
        assert_eq!(evaluate(&Expression::Variable("charm".into()), &session).unwrap(), Value::Int(4));
        session.set_var("charm", Value::Int(9));
        assert_eq!(evaluate(&Expression::Variable("charm".into()), &session).unwrap(), Value::Int(9));
    }

    #[test]
    fn bool_check_ignores_stats() {
        let mut session = Session::new();
        session.set_stat("met", Value::Int(1));
        let check = Condition::BoolCheck("met".into());
        assert!(!evaluate_condition(&check, &session).unwrap());
        session.set_var("met", Value::Bool(true));
        assert!(evaluate_condition(&check, &session).unwrap());
        session.set_var("met", Value::String(String::new()));
        assert!(!evaluate_condition(&check, &session).unwrap());
    }

    #[test]
    fn equality_across_kinds() {
        assert!(compare(&Value::Int(3), CompareOp::Eq, &Value::Float(3.0)).unwrap());
        assert!(compare(&"a".into(), CompareOp::Ne, &Value::Int(0)).unwrap());
        assert!(compare(&"Player".into(), CompareOp::Eq, &"Player".into()).unwrap());
        assert!(!compare(&Value::Bool(true), CompareOp::Eq, &Value::Int(1)).unwrap());
    }

    #[test]
    fn ordering_requires_numbers() {
        assert!(compare(&Value::Float(2.5), CompareOp::Lt, &Value::Int(3)).unwrap());
        assert!(compare(&"b".into(), CompareOp::Gt, &"a".into()).is_err());
        assert!(!compare(&Value::Float(f64::NAN), CompareOp::Ge, &Value::Int(0)).unwrap());
    }

    #[test]
    fn formatted_strings_interpolate() {
        let mut session = Session::new();
        session.set_var("user", "Player".into());
        session.set_stat("wisdom", Value::Int(20));
        let v = evaluate(&Expression::Formatted("{user} has {wisdom} wisdom{none}".into()), &session).unwrap();
        assert_eq!(v, Value::String("Player has 20 wisdom".into()));
    }
}
