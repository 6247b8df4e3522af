use serde::{Deserialize, Serialize};

use super::command::CommandKind;
use super::expr::{Condition, Expression};

/// Which presentation call a media command maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaKind {
    Sound,
    Music,
    Background,
    Image,
}

impl MediaKind {
    pub fn command(&self) -> CommandKind {
        match self {
            Self::Sound => CommandKind::Sound,
            Self::Music => CommandKind::Music,
            Self::Background => CommandKind::Background,
            Self::Image => CommandKind::Show,
        }
    }

    pub fn from_command(kind: CommandKind) -> Option<Self> {
        match kind {
            CommandKind::Sound => Some(Self::Sound),
            CommandKind::Music => Some(Self::Music),
            CommandKind::Background => Some(Self::Background),
            CommandKind::Show => Some(Self::Image),
            _ => None,
        }
    }
}

/// One presented branch of a `choice` block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoiceOption {
    pub text: String,
    /// Gates selectability when present.
    pub condition: Option<Condition>,
    /// Target scene name, without the `@` sigil.
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StatementKind {
    SceneDef {
        name: String,
    },
    /// `speaker` is empty for narration.
    Dialogue {
        speaker: String,
        text: String,
    },
    Choice {
        options: Vec<ChoiceOption>,
    },
    Conditional {
        condition: Condition,
        then_branch: Vec<Statement>,
        else_branch: Option<Vec<Statement>>,
    },
    Media {
        kind: MediaKind,
        argument: String,
    },
    Goto {
        target: String,
    },
    Move {
        location: String,
    },
    /// Additive stat mutation.
    Stat {
        name: String,
        value: Expression,
    },
    Var {
        name: String,
        value: Expression,
    },
    /// Same assignment semantics as `Var`, kept as its own spelling.
    Set {
        name: String,
        value: Expression,
    },
    End,
    Place {
        object: String,
        image: String,
        position: Option<(Expression, Expression)>,
    },
    Remove {
        object: String,
    },
}

/// A parsed statement with the source line it started on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Statement {
    pub kind: StatementKind,
    pub line: usize,
}

/// Source positions are not part of tree identity.
impl PartialEq for Statement {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}

impl Statement {
    pub fn new(kind: StatementKind, line: usize) -> Self {
        Self { kind, line }
    }

    /// Scene names this statement (or any nested branch) may jump to,
    /// paired with the line that names them.
    pub fn scene_targets(&self) -> Vec<(&str, usize)> {
        let mut out = Vec::new();
        self.collect_targets(&mut out);
        out
    }

    fn collect_targets<'a>(&'a self, out: &mut Vec<(&'a str, usize)>) {
        match &self.kind {
            StatementKind::Goto { target } => out.push((target, self.line)),
            StatementKind::Move { location } => out.push((location, self.line)),
            StatementKind::Choice { options } => {
                for option in options {
                    out.push((&option.target, self.line));
                }
            }
            StatementKind::Conditional {
                then_branch,
                else_branch,
                ..
            } => {
                for stmt in then_branch.iter().chain(else_branch.iter().flatten()) {
                    stmt.collect_targets(out);
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::expr::CompareOp;
    use crate::schema::value::Value;

    #[test]
    fn equality_ignores_lines() {
        let a = Statement::new(StatementKind::End, 3);
        let b = Statement::new(StatementKind::End, 10);
        assert_eq!(a, b);
    }

    #[test]
    fn targets_include_nested_branches() {
        let stmt = Statement::new(
            StatementKind::Conditional {
                condition: Condition::BoolCheck("met".to_string()),
                then_branch: vec![Statement::new(
                    StatementKind::Goto {
                        target: "a".to_string(),
                    },
                    2,
                )],
                else_branch: Some(vec![Statement::new(
                    StatementKind::Choice {
                        options: vec![ChoiceOption {
                            text: "B".to_string(),
                            condition: Some(Condition::compare(
                                Expression::Variable("k".to_string()),
                                CompareOp::Ge,
                                Expression::Literal(Value::Int(5)),
                            )),
                            target: "b".to_string(),
                        }],
                    },
                    4,
                )]),
            },
            1,
        );
        assert_eq!(stmt.scene_targets(), vec![("a", 2), ("b", 4)]);
    }

    #[test]
    fn media_kind_maps_commands() {
        assert_eq!(MediaKind::from_command(CommandKind::Show), Some(MediaKind::Image));
        assert_eq!(MediaKind::Music.command(), CommandKind::Music);
        assert_eq!(MediaKind::from_command(CommandKind::Goto), None);
    }
}
