/// Effect snippets: short statement lists a host attaches to map objects
/// or choice outcomes, run through the executor against the live session.
///
/// Only non-interactive statements are allowed. A `goto` or `move`
/// hands control back to the story at the target scene.

use crate::core::lexer::tokenize;
use crate::core::parser;
use crate::core::registry::{Script, ScriptError};
use crate::schema::statement::{Statement, StatementKind};

#[derive(Debug, Clone, PartialEq)]
pub struct EffectScript {
    statements: Vec<Statement>,
}

impl EffectScript {
    pub fn parse(source: &str) -> Result<EffectScript, ScriptError> {
        let statements = parser::parse(tokenize(source).tokens).map_err(ScriptError::Syntax)?;
        check_statements(&statements)?;
        Ok(EffectScript { statements })
    }

    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    /// Fail if the effect can jump to a scene `script` does not declare.
    pub fn validate_against(&self, script: &Script) -> Result<(), ScriptError> {
        match self.unresolved_target(script) {
            Some((name, line)) => Err(ScriptError::UnresolvedScene {
                name: name.to_string(),
                line,
            }),
            None => Ok(()),
        }
    }

    /// The first jump target, with its line, that `script` does not declare.
    pub fn unresolved_target(&self, script: &Script) -> Option<(&str, usize)> {
        self.statements
            .iter()
            .flat_map(|stmt| stmt.scene_targets())
            .find(|(name, _)| !script.contains(name))
    }
}

fn check_statements(statements: &[Statement]) -> Result<(), ScriptError> {
    for stmt in statements {
        let refused = match &stmt.kind {
            StatementKind::SceneDef { .. } => "scene marker",
            StatementKind::Dialogue { .. } => "dialogue",
            StatementKind::Choice { .. } => "choice",
            StatementKind::End => "end",
            StatementKind::Conditional {
                then_branch,
                else_branch,
                ..
            } => {
                check_statements(then_branch)?;
                if let Some(body) = else_branch {
                    check_statements(body)?;
                }
                continue;
            }
            _ => continue,
        };
        return Err(ScriptError::NotAnEffect {
            statement: refused,
            line: stmt.line,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_state_and_media_commands() {
        let effect = EffectScript::parse(
            "stat charm 2\nvar visited_fountain true\nsound \"splash.wav\"\nif charm >= 10:\n    place medal \"medal.png\" 4 4\n",
        )
        .unwrap();
        assert_eq!(effect.statements().len(), 4);
    }

    #[test]
    fn refuses_interactive_statements() {
        for (source, line) in [
            ("maria: Hi", 1),
            ("var a 1\nchoice:\n    A -> @x\n", 2),
            ("end", 1),
            ("@scene:", 1),
            ("if a:\n    $: nested narration\n", 2),
        ] {
            match EffectScript::parse(source) {
                Err(ScriptError::NotAnEffect { line: l, .. }) => assert_eq!(l, line, "{source}"),
                other => panic!("{source}: unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn validates_jump_targets() {
        let script = Script::parse("@plaza:\nend\n").unwrap();
        assert!(EffectScript::parse("goto @plaza").unwrap().validate_against(&script).is_ok());
        assert!(EffectScript::parse("move library").unwrap().validate_against(&script).is_err());
    }
}
