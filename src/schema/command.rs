/// Reserved command words and their argument shapes.
///
/// This table is the single source of truth for the command vocabulary:
/// the lexer consults it to classify identifiers and the parser uses the
/// arity to decide which arguments to read.

use serde::{Deserialize, Serialize};

/// Which statement a command word produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandKind {
    Sound,
    Music,
    Background,
    Show,
    Goto,
    Move,
    Stat,
    Var,
    Set,
    End,
    Place,
    Remove,
}

/// Argument shape accepted after a command word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// `end`
    Nullary,
    /// A path: string literal or bare identifier.
    Path,
    /// A scene: `@ref`, identifier or string literal.
    Scene,
    /// An identifier followed by an expression.
    Binding,
    /// A single identifier.
    Name,
    /// Identifier, path, then an optional `x y` expression pair.
    Placement,
}

impl Arity {
    /// Human-readable argument list used in syntax errors.
    pub fn describe(&self) -> &'static str {
        match self {
            Self::Nullary => "no arguments",
            Self::Path => "one path argument",
            Self::Scene => "one scene argument",
            Self::Binding => "a name and a value",
            Self::Name => "one name argument",
            Self::Placement => "a name, a path and an optional x y pair",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CommandSpec {
    pub keyword: &'static str,
    pub kind: CommandKind,
    pub arity: Arity,
}

pub const COMMANDS: &[CommandSpec] = &[
    CommandSpec { keyword: "sound", kind: CommandKind::Sound, arity: Arity::Path },
    CommandSpec { keyword: "bgm", kind: CommandKind::Music, arity: Arity::Path },
    CommandSpec { keyword: "bg", kind: CommandKind::Background, arity: Arity::Path },
    CommandSpec { keyword: "show", kind: CommandKind::Show, arity: Arity::Path },
    CommandSpec { keyword: "goto", kind: CommandKind::Goto, arity: Arity::Scene },
    CommandSpec { keyword: "move", kind: CommandKind::Move, arity: Arity::Scene },
    CommandSpec { keyword: "locate", kind: CommandKind::Move, arity: Arity::Scene },
    CommandSpec { keyword: "stat", kind: CommandKind::Stat, arity: Arity::Binding },
    CommandSpec { keyword: "var", kind: CommandKind::Var, arity: Arity::Binding },
    CommandSpec { keyword: "set", kind: CommandKind::Set, arity: Arity::Binding },
    CommandSpec { keyword: "end", kind: CommandKind::End, arity: Arity::Nullary },
    CommandSpec { keyword: "place", kind: CommandKind::Place, arity: Arity::Placement },
    CommandSpec { keyword: "remove", kind: CommandKind::Remove, arity: Arity::Name },
];

/// Block-structure words that are reserved alongside the commands.
pub const BLOCK_KEYWORDS: &[&str] = &["choice", "if", "else", "true", "false"];

/// Look up a command word.
pub fn lookup(word: &str) -> Option<&'static CommandSpec> {
    COMMANDS.iter().find(|spec| spec.keyword == word)
}

/// Returns true if `word` can never be used as an identifier or speaker.
pub fn is_reserved(word: &str) -> bool {
    lookup(word).is_some() || BLOCK_KEYWORDS.contains(&word)
}

impl CommandKind {
    /// The canonical spelling used when printing scripts.
    pub fn keyword(&self) -> &'static str {
        COMMANDS
            .iter()
            .find(|spec| spec.kind == *self)
            .map(|spec| spec.keyword)
            .unwrap_or("end")
    }

    pub fn arity(&self) -> Arity {
        COMMANDS
            .iter()
            .find(|spec| spec.kind == *self)
            .map(|spec| spec.arity)
            .unwrap_or(Arity::Nullary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_has_a_keyword() {
        let kinds = [
            CommandKind::Sound,
            CommandKind::Music,
            CommandKind::Background,
            CommandKind::Show,
            CommandKind::Goto,
            CommandKind::Move,
            CommandKind::Stat,
            CommandKind::Var,
            CommandKind::Set,
            CommandKind::End,
            CommandKind::Place,
            CommandKind::Remove,
        ];
        for kind in kinds {
            let spec = lookup(kind.keyword()).unwrap();
            assert_eq!(spec.kind, kind);
        }
    }

    #[test]
    fn locate_aliases_move() {
        assert_eq!(lookup("locate").unwrap().kind, CommandKind::Move);
        assert_eq!(CommandKind::Move.keyword(), "move");
    }

    #[test]
    fn reserved_words() {
        assert!(is_reserved("choice"));
        assert!(is_reserved("bgm"));
        assert!(is_reserved("true"));
        assert!(!is_reserved("maria"));
    }

    #[test]
    fn keywords_are_unique() {
        for (i, a) in COMMANDS.iter().enumerate() {
            for b in &COMMANDS[i + 1..] {
                assert_ne!(a.keyword, b.keyword);
            }
        }
    }
}
