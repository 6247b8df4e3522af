//! WASM bindings for narrative-script: runs scene scripts in the browser.
//!
//! Every stepping call returns a JSON batch of the presenter events it
//! produced plus what the player is expected to do next.

use wasm_bindgen::prelude::*;

use narrative_script::core::effects::EffectScript;
use narrative_script::core::executor::{ExecError, Executor, WaitingFor};
use narrative_script::core::loader::ScriptLoader;
use narrative_script::core::presenter::{PresenterEvent, RecordingPresenter};
use narrative_script::core::session::SaveState;
use narrative_script::schema::value::Value;

// ---------------------------------------------------------------------------
// JSON helper types for communication across the WASM boundary
// ---------------------------------------------------------------------------
#[derive(serde::Deserialize)]
struct SourceInput {
    name: String,
    text: String,
}

#[derive(serde::Serialize)]
struct StepOutput {
    waiting: WaitingFor,
    scene: Option<String>,
    finished: bool,
    events: Vec<PresenterEvent>,
}

#[derive(serde::Serialize)]
struct StoreOutput<'a> {
    variables: Vec<(&'a str, &'a Value)>,
    stats: Vec<(&'a str, &'a Value)>,
}

fn js_error(context: &str, e: impl std::fmt::Display) -> JsError {
    JsError::new(&format!("{context}: {e}"))
}

// ---------------------------------------------------------------------------
// ScriptPlayer, the main exported struct
// ---------------------------------------------------------------------------
#[wasm_bindgen]
pub struct ScriptPlayer {
    executor: Executor,
    presenter: RecordingPresenter,
}

#[wasm_bindgen]
impl ScriptPlayer {
    /// Load a single script source.
    #[wasm_bindgen(constructor)]
    pub fn new(source: &str) -> Result<ScriptPlayer, JsError> {
        let loaded = ScriptLoader::new()
            .with_source("script", source)
            .build()
            .map_err(|e| js_error("Script load error", e))?;
        Ok(Self::from_executor(loaded.executor()))
    }

    /// Load several sources given as a JSON array of `{ "name", "text" }`.
    pub fn from_sources(sources_json: &str) -> Result<ScriptPlayer, JsError> {
        let sources: Vec<SourceInput> = serde_json::from_str(sources_json)
            .map_err(|e| js_error("Invalid sources JSON", e))?;
        let mut loader = ScriptLoader::new();
        for source in &sources {
            loader = loader.with_source(&source.name, &source.text);
        }
        let loaded = loader.build().map_err(|e| js_error("Script load error", e))?;
        Ok(Self::from_executor(loaded.executor()))
    }

    pub fn start(&mut self) -> Result<String, JsError> {
        let result = self.executor.start(&mut self.presenter);
        self.step_output(result)
    }

    /// Clear variables and stats and play from the first scene.
    pub fn restart(&mut self) -> Result<String, JsError> {
        let result = self.executor.restart(&mut self.presenter);
        self.step_output(result)
    }

    pub fn advance(&mut self) -> Result<String, JsError> {
        let result = self.executor.advance(&mut self.presenter);
        self.step_output(result)
    }

    pub fn select_choice(&mut self, index: usize) -> Result<String, JsError> {
        let result = self.executor.select_choice(index, &mut self.presenter);
        self.step_output(result)
    }

    pub fn jump_to_scene(&mut self, name: &str) -> Result<String, JsError> {
        let result = self.executor.jump_to_scene(name, &mut self.presenter);
        self.step_output(result)
    }

    /// Run an effect snippet (state changes, media cues, an optional jump).
    pub fn apply_effect(&mut self, source: &str) -> Result<String, JsError> {
        let effect = EffectScript::parse(source).map_err(|e| js_error("Effect parse error", e))?;
        effect
            .validate_against(self.executor.script())
            .map_err(|e| js_error("Effect parse error", e))?;
        let result = self.executor.apply(&effect, &mut self.presenter);
        self.step_output(result)
    }

    /// Save data as RON text.
    pub fn save(&self) -> Result<String, JsError> {
        self.executor
            .snapshot()
            .to_ron()
            .map_err(|e| js_error("Save error", e))
    }

    pub fn restore(&mut self, save: &str) -> Result<String, JsError> {
        let save = SaveState::from_ron(save).map_err(|e| js_error("Save error", e))?;
        let result = self.executor.restore(save, &mut self.presenter);
        self.step_output(result)
    }

    /// Variables and stats as JSON, sorted by name.
    pub fn variables(&self) -> Result<String, JsError> {
        let session = self.executor.session();
        let mut variables: Vec<(&str, &Value)> =
            session.variables.iter().map(|(k, v)| (k.as_str(), v)).collect();
        variables.sort_by(|a, b| a.0.cmp(b.0));
        let mut stats: Vec<(&str, &Value)> =
            session.stats.iter().map(|(k, v)| (k.as_str(), v)).collect();
        stats.sort_by(|a, b| a.0.cmp(b.0));

        serde_json::to_string(&StoreOutput { variables, stats })
            .map_err(|e| js_error("Serialization error", e))
    }

    /// Declared scene names in source order, as a JSON array.
    pub fn scene_names(&self) -> String {
        let names: Vec<&str> = self.executor.script().scene_names().collect();
        serde_json::to_string(&names).unwrap_or_else(|_| "[]".to_string())
    }
}

impl ScriptPlayer {
    fn from_executor(executor: Executor) -> Self {
        Self {
            executor,
            presenter: RecordingPresenter::new(),
        }
    }

    fn step_output(&mut self, result: Result<WaitingFor, ExecError>) -> Result<String, JsError> {
        let events = self.presenter.take();
        let waiting = result.map_err(|e| js_error("Script error", e))?;
        let output = StepOutput {
            waiting,
            scene: self.executor.current_scene().map(str::to_string),
            finished: self.executor.is_finished(),
            events,
        };
        serde_json::to_string(&output).map_err(|e| js_error("Serialization error", e))
    }
}
