/// Script loading: configuration plus a builder that gathers script
/// sources from files, directories and in-memory text into one `Script`.

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::core::executor::Executor;
use crate::core::lexer::{LexError, Lexer, DEFAULT_TAB_WIDTH};
use crate::core::parser;
use crate::core::registry::{Script, ScriptError};

/// File extension of script sources.
pub const SCRIPT_EXTENSION: &str = "vns";

pub const DEFAULT_MAX_STEPS: usize = 10_000;

/// Loader and executor settings, usually read from a `.ron` file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Fail the load on any lexer diagnostic instead of warning.
    pub strict_lexing: bool,
    /// Columns a tab counts for when measuring indentation.
    pub tab_width: usize,
    /// Statements the executor may run per input before giving up.
    pub max_steps: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            strict_lexing: false,
            tab_width: DEFAULT_TAB_WIDTH,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }
}

impl LoaderConfig {
    pub fn parse_ron(input: &str) -> Result<LoaderConfig, ScriptError> {
        Ok(ron::from_str(input)?)
    }

    pub fn load_from_ron(path: &Path) -> Result<LoaderConfig, ScriptError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }
}

/// A loaded script plus the warnings collected on the way.
#[derive(Debug, Clone)]
pub struct LoadedScript {
    pub script: Script,
    /// Lexer diagnostics, tagged with the source they came from.
    pub warnings: Vec<(String, LexError)>,
    pub config: LoaderConfig,
}

impl LoadedScript {
    /// An executor over the loaded script honouring the configured step limit.
    pub fn executor(&self) -> Executor {
        Executor::new(self.script.clone()).max_steps(self.config.max_steps)
    }
}

/// Lex, parse and split one source without validating references.
///
/// Validation waits until every source is merged so scenes may jump
/// across files.
pub fn load_source(
    source: &str,
    config: &LoaderConfig,
) -> Result<(Script, Vec<LexError>), ScriptError> {
    let lexed = Lexer::new(config.tab_width).tokenize(source);
    if config.strict_lexing && !lexed.diagnostics.is_empty() {
        return Err(ScriptError::Lex(lexed.diagnostics));
    }
    let statements = parser::parse(lexed.tokens).map_err(ScriptError::Syntax)?;
    let script = Script::from_statements(statements)?;
    Ok((script, lexed.diagnostics))
}

/// Builder for a `LoadedScript`.
#[derive(Debug, Default)]
pub struct ScriptLoader {
    config: Option<LoaderConfig>,
    config_path: Option<PathBuf>,
    scripts_dirs: Vec<PathBuf>,
    script_files: Vec<PathBuf>,
    /// Directly provided sources as (name, text), loaded after files.
    sources: Vec<(String, String)>,
}

impl ScriptLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: LoaderConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Read the config from a RON file at build time. An explicit
    /// `config(..)` wins over this.
    pub fn config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    /// Load every `.vns` file in `path`, in file-name order.
    pub fn scripts_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.scripts_dirs.push(path.into());
        self
    }

    pub fn script_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.script_files.push(path.into());
        self
    }

    /// Provide a script source directly (for testing without files).
    pub fn with_source(mut self, name: &str, text: &str) -> Self {
        self.sources.push((name.to_string(), text.to_string()));
        self
    }

    pub fn build(self) -> Result<LoadedScript, ScriptError> {
        let config = match (self.config, &self.config_path) {
            (Some(config), _) => config,
            (None, Some(path)) => LoaderConfig::load_from_ron(path)?,
            (None, None) => LoaderConfig::default(),
        };

        let mut inputs: Vec<(String, String)> = Vec::new();
        for dir in &self.scripts_dirs {
            for path in script_files_in(dir)? {
                inputs.push(read_source(&path)?);
            }
        }
        for path in &self.script_files {
            inputs.push(read_source(path)?);
        }
        inputs.extend(self.sources);

        let mut script = Script::default();
        let mut warnings = Vec::new();
        for (name, text) in inputs {
            let (part, diagnostics) =
                load_source(&text, &config).map_err(|e| e.in_file(name.clone()))?;
            debug!("loaded `{}`: {} scene(s)", name, part.len());
            for diag in diagnostics {
                warn!("{name}: {diag}");
                warnings.push((name.clone(), diag));
            }
            script.merge(part).map_err(|e| e.in_file(name.clone()))?;
        }
        script.validate()?;

        Ok(LoadedScript {
            script,
            warnings,
            config,
        })
    }
}

fn read_source(path: &Path) -> Result<(String, String), ScriptError> {
    let text = std::fs::read_to_string(path)?;
    Ok((path.display().to_string(), text))
}

/// Script files directly inside `dir`, sorted so load order is stable.
pub fn script_files_in(dir: &Path) -> Result<Vec<PathBuf>, ScriptError> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|s| s.to_str()) == Some(SCRIPT_EXTENSION) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_fill_missing_fields() {
        let config = LoaderConfig::parse_ron("(strict_lexing: true)").unwrap();
        assert!(config.strict_lexing);
        assert_eq!(config.tab_width, DEFAULT_TAB_WIDTH);
        assert_eq!(config.max_steps, DEFAULT_MAX_STEPS);
    }

    #[test]
    fn bad_config_is_an_error() {
        assert!(matches!(
            LoaderConfig::parse_ron("(tab_width: \"four\")"),
            Err(ScriptError::Ron(_))
        ));
    }

    #[test]
    fn merges_sources_then_validates() {
        let loaded = ScriptLoader::new()
            .with_source("a.vns", "@a:\ngoto @b\n")
            .with_source("b.vns", "@b:\nend\n")
            .build()
            .unwrap();
        assert_eq!(loaded.script.len(), 2);
        assert!(loaded.warnings.is_empty());
    }

    #[test]
    fn unresolved_after_merge_fails() {
        let err = ScriptLoader::new()
            .with_source("a.vns", "@a:\ngoto @b\n")
            .build()
            .unwrap_err();
        assert!(matches!(err, ScriptError::UnresolvedScene { .. }));
    }

    #[test]
    fn lexer_warnings_are_collected() {
        let loaded = ScriptLoader::new()
            .with_source("a.vns", "@a:\nvar x 1 ~\nend\n")
            .build()
            .unwrap();
        assert_eq!(loaded.warnings.len(), 1);
        assert_eq!(loaded.warnings[0].0, "a.vns");
        assert_eq!(loaded.warnings[0].1.line, 2);
    }

    #[test]
    fn strict_lexing_fails_the_load() {
        let err = ScriptLoader::new()
            .config(LoaderConfig {
                strict_lexing: true,
                ..LoaderConfig::default()
            })
            .with_source("a.vns", "@a:\nvar x 1 ~\nend\n")
            .build()
            .unwrap_err();
        match err {
            ScriptError::InFile { file, source } => {
                assert_eq!(file, "a.vns");
                assert!(matches!(*source, ScriptError::Lex(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn collisions_name_the_file() {
        let err = ScriptLoader::new()
            .with_source("one.vns", "@a:\nend\n")
            .with_source("two.vns", "@a:\nend\n")
            .build()
            .unwrap_err();
        assert!(err.to_string().starts_with("two.vns: "));
    }

    #[test]
    fn loaded_executor_uses_step_limit() {
        let loaded = ScriptLoader::new()
            .config(LoaderConfig {
                max_steps: 7,
                ..LoaderConfig::default()
            })
            .with_source("a.vns", "@a:\nend\n")
            .build()
            .unwrap();
        assert_eq!(loaded.executor().step_limit(), 7);
    }
}
