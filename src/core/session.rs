/// Playthrough state: the variable and stat stores, the executor cursor,
/// and the save format that bundles them.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::eval::{arithmetic, EvalError};
use crate::schema::expr::BinaryOp;
use crate::schema::value::Value;

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("failed to write save data: {0}")]
    Serialize(#[from] ron::Error),
    #[error("failed to read save data: {0}")]
    Deserialize(#[from] ron::error::SpannedError),
}

/// Variable and stat stores for one playthrough.
///
/// Variables hold any value and are overwritten by `var`/`set`. Stats are
/// numeric accumulators that `stat` only ever adds to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub variables: FxHashMap<String, Value>,
    pub stats: FxHashMap<String, Value>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a bare name: variables first, then stats, else `Int(0)`.
    pub fn lookup(&self, name: &str) -> Value {
        self.variables
            .get(name)
            .or_else(|| self.stats.get(name))
            .cloned()
            .unwrap_or_default()
    }

    /// Placeholder text for `name`, or `None` when neither store has it.
    pub fn display(&self, name: &str) -> Option<String> {
        self.variables
            .get(name)
            .or_else(|| self.stats.get(name))
            .map(|v| v.to_string())
    }

    pub fn var(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    pub fn stat(&self, name: &str) -> Option<&Value> {
        self.stats.get(name)
    }

    pub fn set_var(&mut self, name: &str, value: Value) {
        self.variables.insert(name.to_string(), value);
    }

    /// Overwrite a stat directly. Scripts only accumulate; hosts seeding a
    /// new game use this.
    pub fn set_stat(&mut self, name: &str, value: Value) {
        self.stats.insert(name.to_string(), value);
    }

    /// `stat[name] += amount`, starting from `Int(0)`.
    pub fn add_stat(&mut self, name: &str, amount: &Value) -> Result<&Value, EvalError> {
        let current = self.stats.get(name).cloned().unwrap_or_default();
        let total = arithmetic(&current, BinaryOp::Add, amount)?;
        let slot = self.stats.entry(name.to_string()).or_default();
        *slot = total;
        Ok(slot)
    }

    pub fn reset(&mut self) {
        self.variables.clear();
        self.stats.clear();
    }
}

/// Which statement list of a conditional a frame walks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Branch {
    /// The scene's own statement list.
    Scene,
    Then,
    Else,
}

/// One level of the cursor. For every frame after the first, the
/// previous frame's `index` points at the conditional that owns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    pub branch: Branch,
    pub index: usize,
}

impl Frame {
    pub fn new(branch: Branch) -> Self {
        Self { branch, index: 0 }
    }
}

/// Position of the executor inside the script's statement trees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    pub scene: String,
    pub frames: Vec<Frame>,
}

impl Cursor {
    pub fn at_scene(scene: &str) -> Self {
        Self {
            scene: scene.to_string(),
            frames: vec![Frame::new(Branch::Scene)],
        }
    }
}

/// Everything needed to resume a playthrough mid-script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveState {
    pub session: Session,
    /// `None` once the script has ended.
    pub cursor: Option<Cursor>,
}

impl SaveState {
    pub fn to_ron(&self) -> Result<String, SaveError> {
        Ok(ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?)
    }

    pub fn from_ron(input: &str) -> Result<SaveState, SaveError> {
        Ok(ron::from_str(input)?)
    }
}
