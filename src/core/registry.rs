/// Scene registry: splits a parsed statement list into named scenes,
/// checks scene references, and merges scripts loaded from several files.

use log::debug;
use rustc_hash::{FxHashMap, FxHashSet};
use thiserror::Error;

use crate::core::lexer::{LexError, Lexer};
use crate::core::parser::{self, SyntaxError};
use crate::schema::statement::{Statement, StatementKind};

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("{}", join_lines(.0))]
    Lex(Vec<LexError>),
    #[error("{}", join_lines(.0))]
    Syntax(Vec<SyntaxError>),
    #[error("line {line}: scene `@{name}` already defined on line {first_line}")]
    DuplicateScene {
        name: String,
        line: usize,
        first_line: usize,
    },
    #[error("line {line}: reference to undeclared scene `@{name}`")]
    UnresolvedScene { name: String, line: usize },
    #[error("line {line}: `{statement}` is not allowed in an effect")]
    NotAnEffect {
        statement: &'static str,
        line: usize,
    },
    #[error("{file}: {source}")]
    InFile {
        file: String,
        source: Box<ScriptError>,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON error: {0}")]
    Ron(#[from] ron::error::SpannedError),
}

impl ScriptError {
    pub fn in_file(self, file: impl Into<String>) -> Self {
        ScriptError::InFile {
            file: file.into(),
            source: Box::new(self),
        }
    }
}

fn join_lines<T: std::fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(|item| item.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

/// A named, ordered list of statements.
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    /// Empty for the prologue (statements before the first marker).
    pub name: String,
    /// Line of the scene marker, 0 for the prologue.
    pub line: usize,
    pub statements: Vec<Statement>,
}

/// All scenes of a loaded script, in source order.
#[derive(Debug, Clone, Default)]
pub struct Script {
    scenes: Vec<Scene>,
    index: FxHashMap<String, usize>,
}

impl Script {
    /// Lex, parse, split and validate a single source text. Lexer
    /// diagnostics are logged and otherwise ignored.
    pub fn parse(source: &str) -> Result<Script, ScriptError> {
        let lexed = Lexer::default().tokenize(source);
        let statements = parser::parse(lexed.tokens).map_err(ScriptError::Syntax)?;
        let script = Script::from_statements(statements)?;
        script.validate()?;
        Ok(script)
    }

    /// Group top-level statements under the scene marker preceding them.
    pub fn from_statements(statements: Vec<Statement>) -> Result<Script, ScriptError> {
        let mut script = Script::default();
        let mut current = Scene {
            name: String::new(),
            line: 0,
            statements: Vec::new(),
        };

        for stmt in statements {
            if let StatementKind::SceneDef { name } = &stmt.kind {
                let next = Scene {
                    name: name.clone(),
                    line: stmt.line,
                    statements: Vec::new(),
                };
                let finished = std::mem::replace(&mut current, next);
                if !finished.name.is_empty() || !finished.statements.is_empty() {
                    script.push(finished)?;
                }
            } else {
                current.statements.push(stmt);
            }
        }
        if !current.name.is_empty() || !current.statements.is_empty() {
            script.push(current)?;
        }

        debug!("registered {} scene(s)", script.scenes.len());
        Ok(script)
    }

    fn push(&mut self, scene: Scene) -> Result<(), ScriptError> {
        if let Some(&existing) = self.index.get(&scene.name) {
            return Err(ScriptError::DuplicateScene {
                name: scene.name,
                line: scene.line,
                first_line: self.scenes[existing].line,
            });
        }
        self.index.insert(scene.name.clone(), self.scenes.len());
        self.scenes.push(scene);
        Ok(())
    }

    /// Fail on the first reference to an undeclared scene.
    pub fn validate(&self) -> Result<(), ScriptError> {
        match self.unresolved_references().into_iter().next() {
            Some((name, line)) => Err(ScriptError::UnresolvedScene {
                name: name.to_string(),
                line,
            }),
            None => Ok(()),
        }
    }

    /// Every `goto`, `move` or choice target that names no declared scene.
    pub fn unresolved_references(&self) -> Vec<(&str, usize)> {
        self.references()
            .into_iter()
            .filter(|(name, _)| !self.index.contains_key(*name))
            .collect()
    }

    /// Declared scenes that nothing jumps to. The first scene is entered
    /// directly and never counts as unreferenced.
    pub fn unreferenced_scenes(&self) -> Vec<&Scene> {
        let targeted: FxHashSet<&str> = self.references().into_iter().map(|(n, _)| n).collect();
        self.scenes
            .iter()
            .skip(1)
            .filter(|scene| !targeted.contains(scene.name.as_str()))
            .collect()
    }

    fn references(&self) -> Vec<(&str, usize)> {
        self.scenes
            .iter()
            .flat_map(|scene| scene.statements.iter())
            .flat_map(|stmt| stmt.scene_targets())
            .collect()
    }

    /// Append another script's scenes after this one's. Scene names must
    /// stay unique across both; on a collision nothing is merged.
    pub fn merge(&mut self, other: Script) -> Result<(), ScriptError> {
        if let Some(scene) = other.scenes.iter().find(|s| self.index.contains_key(&s.name)) {
            return Err(ScriptError::DuplicateScene {
                name: scene.name.clone(),
                line: scene.line,
                first_line: self.scenes[self.index[&scene.name]].line,
            });
        }
        for scene in other.scenes {
            self.push(scene)?;
        }
        Ok(())
    }

    pub fn scene(&self, name: &str) -> Option<&Scene> {
        self.index.get(name).map(|&i| &self.scenes[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn first_scene(&self) -> Option<&Scene> {
        self.scenes.first()
    }

    /// The scene following `name` in source order, where fall-through lands.
    pub fn next_scene(&self, name: &str) -> Option<&Scene> {
        self.index.get(name).and_then(|&i| self.scenes.get(i + 1))
    }

    pub fn scenes(&self) -> &[Scene] {
        &self.scenes
    }

    pub fn scene_names(&self) -> impl Iterator<Item = &str> {
        self.scenes.iter().map(|s| s.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }
}
