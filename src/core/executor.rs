/// Stepping executor: walks scene statement trees, mutates the session,
/// and drives a `Presenter`.
///
/// Every input (`start`, `advance`, `select_choice`, `jump_to_scene`,
/// `apply`, `restore`) runs statements until the next one that needs the
/// player, then returns what it is waiting for.

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::core::effects::EffectScript;
use crate::core::eval::{evaluate, evaluate_condition, interpolate, EvalError};
use crate::core::loader::DEFAULT_MAX_STEPS;
use crate::core::presenter::{ChoiceView, Presenter};
use crate::core::registry::Script;
use crate::core::session::{Branch, Cursor, Frame, SaveState, Session};
use crate::schema::expr::Expression;
use crate::schema::statement::{ChoiceOption, MediaKind, Statement, StatementKind};

/// What the executor needs before it can continue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitingFor {
    Advance,
    Choice,
    /// The script ended, or nothing has started yet.
    Nothing,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExecError {
    #[error("unknown scene `@{0}`")]
    UnknownScene(String),
    #[error("expected to be waiting for {expected:?}, but waiting for {actual:?}")]
    NotWaiting {
        expected: WaitingFor,
        actual: WaitingFor,
    },
    #[error("choice {0} cannot be selected")]
    ChoiceRejected(usize),
    #[error("ran {0} statements without reaching dialogue, a choice or the end")]
    StepLimit(usize),
    #[error("cursor does not point into the script: {0}")]
    InvalidCursor(String),
}

/// Outcome of dispatching one statement.
enum Flow {
    Next,
    Enter(Branch),
    Jump(String),
    Wait(WaitingFor),
    End,
}

pub struct Executor {
    script: Arc<Script>,
    session: Session,
    cursor: Option<Cursor>,
    waiting: WaitingFor,
    max_steps: usize,
}

impl Executor {
    pub fn new(script: Script) -> Self {
        Self {
            script: Arc::new(script),
            session: Session::new(),
            cursor: None,
            waiting: WaitingFor::Nothing,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }

    pub fn max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    pub fn step_limit(&self) -> usize {
        self.max_steps
    }

    pub fn script(&self) -> &Script {
        &self.script
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub fn cursor(&self) -> Option<&Cursor> {
        self.cursor.as_ref()
    }

    pub fn waiting(&self) -> WaitingFor {
        self.waiting
    }

    pub fn current_scene(&self) -> Option<&str> {
        self.cursor.as_ref().map(|c| c.scene.as_str())
    }

    pub fn is_finished(&self) -> bool {
        self.cursor.is_none()
    }

    // ─── Inputs ──────────────────────────────────────────────────────────

    /// Enter the first scene and run to the first interaction point.
    pub fn start<P: Presenter + ?Sized>(&mut self, presenter: &mut P) -> Result<WaitingFor, ExecError> {
        let Some(first) = self.script.first_scene().map(|s| s.name.clone()) else {
            self.finish(presenter);
            return Ok(WaitingFor::Nothing);
        };
        self.enter_scene(&first, presenter)?;
        self.run(presenter)
    }

    /// New game: clear variables and stats, then start from the first scene.
    pub fn restart<P: Presenter + ?Sized>(&mut self, presenter: &mut P) -> Result<WaitingFor, ExecError> {
        self.session.reset();
        self.cursor = None;
        self.waiting = WaitingFor::Nothing;
        self.start(presenter)
    }

    /// Continue past the dialogue line currently shown.
    pub fn advance<P: Presenter + ?Sized>(&mut self, presenter: &mut P) -> Result<WaitingFor, ExecError> {
        self.expect_waiting(WaitingFor::Advance)?;
        self.step_past();
        self.run(presenter)
    }

    /// Pick an option of the choice currently shown. An out-of-range or
    /// unselectable index is rejected and the choice stays open.
    pub fn select_choice<P: Presenter + ?Sized>(
        &mut self,
        index: usize,
        presenter: &mut P,
    ) -> Result<WaitingFor, ExecError> {
        self.expect_waiting(WaitingFor::Choice)?;
        let script = Arc::clone(&self.script);
        let stmt = self.current_statement(&script)?;
        let StatementKind::Choice { options } = &stmt.kind else {
            return Err(ExecError::InvalidCursor(format!(
                "line {} is not a choice",
                stmt.line
            )));
        };

        let option = options.get(index).ok_or(ExecError::ChoiceRejected(index))?;
        if let Some(condition) = &option.condition {
            if !matches!(evaluate_condition(condition, &self.session), Ok(true)) {
                return Err(ExecError::ChoiceRejected(index));
            }
        }

        debug!("selected choice {index} -> @{}", option.target);
        self.enter_scene(&option.target, presenter)?;
        self.run(presenter)
    }

    /// Jump to a scene regardless of what the executor is waiting for.
    pub fn jump_to_scene<P: Presenter + ?Sized>(
        &mut self,
        name: &str,
        presenter: &mut P,
    ) -> Result<WaitingFor, ExecError> {
        self.enter_scene(name, presenter)?;
        self.run(presenter)
    }

    /// Run an effect snippet against the session. When it jumps, the story
    /// continues from the target scene; otherwise the current wait stands.
    /// An effect naming an unknown scene is refused before anything runs.
    pub fn apply<P: Presenter + ?Sized>(
        &mut self,
        effect: &EffectScript,
        presenter: &mut P,
    ) -> Result<WaitingFor, ExecError> {
        if let Some((name, _)) = effect.unresolved_target(&self.script) {
            return Err(ExecError::UnknownScene(name.to_string()));
        }
        match self.apply_list(effect.statements(), presenter)? {
            Some(target) => {
                self.enter_scene(&target, presenter)?;
                self.run(presenter)
            }
            None => Ok(self.waiting),
        }
    }

    pub fn snapshot(&self) -> SaveState {
        SaveState {
            session: self.session.clone(),
            cursor: self.cursor.clone(),
        }
    }

    /// Replace the session and cursor with saved ones and re-present the
    /// statement that was waiting.
    pub fn restore<P: Presenter + ?Sized>(
        &mut self,
        save: SaveState,
        presenter: &mut P,
    ) -> Result<WaitingFor, ExecError> {
        let Some(cursor) = save.cursor else {
            self.session = save.session;
            self.cursor = None;
            self.waiting = WaitingFor::Nothing;
            return Ok(WaitingFor::Nothing);
        };

        let list = resolve(&self.script, &cursor)?;
        let index = cursor.frames.last().map_or(0, |f| f.index);
        if index >= list.len() {
            return Err(ExecError::InvalidCursor(format!(
                "index {index} past the end of `@{}`",
                cursor.scene
            )));
        }

        debug!("restoring at @{} {:?}", cursor.scene, cursor.frames);
        if !cursor.scene.is_empty() {
            presenter.on_scene_changed(&cursor.scene);
        }
        self.session = save.session;
        self.cursor = Some(cursor);
        self.run(presenter)
    }

    // ─── Stepping ────────────────────────────────────────────────────────

    fn run<P: Presenter + ?Sized>(&mut self, presenter: &mut P) -> Result<WaitingFor, ExecError> {
        let script = Arc::clone(&self.script);
        self.waiting = WaitingFor::Nothing;
        let mut steps = 0usize;

        loop {
            let Some(cursor) = &self.cursor else {
                return Ok(WaitingFor::Nothing);
            };
            let list = resolve(&script, cursor)?;
            let depth = cursor.frames.len();
            let index = cursor.frames.last().map_or(0, |f| f.index);

            if index >= list.len() {
                if depth > 1 {
                    self.leave_branch();
                    continue;
                }
                // End of scene: fall through to the next one in source order.
                match script.next_scene(&cursor.scene) {
                    Some(next) => self.enter_scene(&next.name, presenter)?,
                    None => {
                        self.finish(presenter);
                        return Ok(WaitingFor::Nothing);
                    }
                }
                continue;
            }

            steps += 1;
            if steps > self.max_steps {
                warn!("step limit of {} reached", self.max_steps);
                return Err(ExecError::StepLimit(self.max_steps));
            }

            match self.execute(&list[index], presenter) {
                Flow::Next => self.step_past(),
                Flow::Enter(branch) => {
                    if let Some(cursor) = self.cursor.as_mut() {
                        cursor.frames.push(Frame::new(branch));
                    }
                }
                Flow::Jump(target) => self.enter_scene(&target, presenter)?,
                Flow::Wait(waiting) => {
                    self.waiting = waiting;
                    return Ok(waiting);
                }
                Flow::End => {
                    self.finish(presenter);
                    return Ok(WaitingFor::Nothing);
                }
            }
        }
    }

    fn execute<P: Presenter + ?Sized>(&mut self, stmt: &Statement, presenter: &mut P) -> Flow {
        match &stmt.kind {
            StatementKind::SceneDef { .. } => Flow::Next,
            StatementKind::Dialogue { speaker, text } => {
                let text = interpolate(text, &self.session);
                presenter.on_dialogue(speaker, &text);
                Flow::Wait(WaitingFor::Advance)
            }
            StatementKind::Choice { options } => {
                let views = self.choice_views(options, stmt.line, presenter);
                presenter.on_choices_presented(&views);
                Flow::Wait(WaitingFor::Choice)
            }
            StatementKind::Conditional {
                condition,
                else_branch,
                ..
            } => match evaluate_condition(condition, &self.session) {
                Ok(true) => Flow::Enter(Branch::Then),
                Ok(false) if else_branch.is_some() => Flow::Enter(Branch::Else),
                Ok(false) => Flow::Next,
                Err(e) => {
                    report(presenter, stmt.line, &e);
                    Flow::Next
                }
            },
            StatementKind::Media { kind, argument } => {
                match kind {
                    MediaKind::Sound => presenter.on_play_sound(argument),
                    MediaKind::Music => presenter.on_play_music(argument),
                    MediaKind::Background => presenter.on_set_background(argument),
                    MediaKind::Image => presenter.on_show_image(argument),
                }
                Flow::Next
            }
            StatementKind::Goto { target } => Flow::Jump(target.clone()),
            StatementKind::Move { location } => {
                presenter.on_location_changed(location);
                Flow::Jump(location.clone())
            }
            StatementKind::Stat { name, value } => {
                let result = evaluate(value, &self.session)
                    .and_then(|amount| self.session.add_stat(name, &amount).map(|_| ()));
                if let Err(e) = result {
                    report(presenter, stmt.line, &e);
                }
                Flow::Next
            }
            StatementKind::Var { name, value } | StatementKind::Set { name, value } => {
                match evaluate(value, &self.session) {
                    Ok(v) => self.session.set_var(name, v),
                    Err(e) => report(presenter, stmt.line, &e),
                }
                Flow::Next
            }
            StatementKind::End => Flow::End,
            StatementKind::Place {
                object,
                image,
                position,
            } => {
                let position = match position {
                    Some((x, y)) => self.coordinates(x, y).map(Some),
                    None => Ok(None),
                };
                match position {
                    Ok(position) => presenter.on_place_object(object, image, position),
                    Err(e) => report(presenter, stmt.line, &e),
                }
                Flow::Next
            }
            StatementKind::Remove { object } => {
                presenter.on_remove_object(object);
                Flow::Next
            }
        }
    }

    /// Every option with its selectability. An option whose condition fails
    /// to evaluate is reported and not selectable.
    fn choice_views<P: Presenter + ?Sized>(
        &self,
        options: &[ChoiceOption],
        line: usize,
        presenter: &mut P,
    ) -> Vec<ChoiceView> {
        options
            .iter()
            .enumerate()
            .map(|(index, option)| {
                let selectable = match &option.condition {
                    None => true,
                    Some(condition) => match evaluate_condition(condition, &self.session) {
                        Ok(ok) => ok,
                        Err(e) => {
                            report(presenter, line, &e);
                            false
                        }
                    },
                };
                ChoiceView {
                    index,
                    text: option.text.clone(),
                    selectable,
                }
            })
            .collect()
    }

    fn coordinates(&self, x: &Expression, y: &Expression) -> Result<(f64, f64), EvalError> {
        let x = evaluate(x, &self.session)?;
        let y = evaluate(y, &self.session)?;
        match (x.as_f64(), y.as_f64()) {
            (Some(a), Some(b)) => Ok((a, b)),
            _ => Err(EvalError::TypeMismatch {
                op: "place",
                left: x.kind(),
                right: y.kind(),
            }),
        }
    }

    /// Run effect statements in place. Returns the jump target, if any.
    fn apply_list<P: Presenter + ?Sized>(
        &mut self,
        statements: &[Statement],
        presenter: &mut P,
    ) -> Result<Option<String>, ExecError> {
        for stmt in statements {
            match self.execute(stmt, presenter) {
                Flow::Next => {}
                Flow::Enter(branch) => {
                    if let Some(body) = branch_body(stmt, branch) {
                        if let Some(target) = self.apply_list(body, presenter)? {
                            return Ok(Some(target));
                        }
                    }
                }
                Flow::Jump(target) => return Ok(Some(target)),
                // Interactive statements and `end` are refused when an
                // effect is parsed.
                Flow::Wait(_) | Flow::End => {}
            }
        }
        Ok(None)
    }

    // ─── Cursor moves ────────────────────────────────────────────────────

    fn enter_scene<P: Presenter + ?Sized>(&mut self, name: &str, presenter: &mut P) -> Result<(), ExecError> {
        // Leaves the cursor and the current wait untouched on failure.
        if !self.script.contains(name) {
            return Err(ExecError::UnknownScene(name.to_string()));
        }
        debug!("entering scene @{name}");
        self.cursor = Some(Cursor::at_scene(name));
        if !name.is_empty() {
            presenter.on_scene_changed(name);
        }
        Ok(())
    }

    fn step_past(&mut self) {
        if let Some(frame) = self.cursor.as_mut().and_then(|c| c.frames.last_mut()) {
            frame.index += 1;
        }
    }

    fn leave_branch(&mut self) {
        if let Some(cursor) = self.cursor.as_mut() {
            cursor.frames.pop();
        }
        self.step_past();
    }

    fn finish<P: Presenter + ?Sized>(&mut self, presenter: &mut P) {
        debug!("script ended");
        self.cursor = None;
        self.waiting = WaitingFor::Nothing;
        presenter.on_script_ended();
    }

    fn expect_waiting(&self, expected: WaitingFor) -> Result<(), ExecError> {
        if self.waiting == expected {
            Ok(())
        } else {
            Err(ExecError::NotWaiting {
                expected,
                actual: self.waiting,
            })
        }
    }

    fn current_statement<'s>(&self, script: &'s Script) -> Result<&'s Statement, ExecError> {
        let cursor = self
            .cursor
            .as_ref()
            .ok_or_else(|| ExecError::InvalidCursor("script has ended".to_string()))?;
        let list = resolve(script, cursor)?;
        let index = cursor.frames.last().map_or(0, |f| f.index);
        list.get(index)
            .ok_or_else(|| ExecError::InvalidCursor(format!("index {index} out of range")))
    }
}

/// Follow a cursor's frames down to the statement list its last frame walks.
fn resolve<'s>(script: &'s Script, cursor: &Cursor) -> Result<&'s [Statement], ExecError> {
    let scene = script
        .scene(&cursor.scene)
        .ok_or_else(|| ExecError::UnknownScene(cursor.scene.clone()))?;
    let Some((root, nested)) = cursor.frames.split_first() else {
        return Err(ExecError::InvalidCursor("no frames".to_string()));
    };
    if root.branch != Branch::Scene {
        return Err(ExecError::InvalidCursor("first frame must walk the scene".to_string()));
    }

    let mut list = scene.statements.as_slice();
    let mut parent = root;
    for frame in nested {
        list = list
            .get(parent.index)
            .and_then(|owner| branch_body(owner, frame.branch))
            .ok_or_else(|| {
                ExecError::InvalidCursor(format!(
                    "no {:?} branch at index {} of `@{}`",
                    frame.branch, parent.index, cursor.scene
                ))
            })?;
        parent = frame;
    }
    Ok(list)
}

fn branch_body(stmt: &Statement, branch: Branch) -> Option<&[Statement]> {
    match (&stmt.kind, branch) {
        (StatementKind::Conditional { then_branch, .. }, Branch::Then) => Some(then_branch.as_slice()),
        (StatementKind::Conditional { else_branch, .. }, Branch::Else) => else_branch.as_deref(),
        _ => None,
    }
}

fn report<P: Presenter + ?Sized>(presenter: &mut P, line: usize, error: &EvalError) {
    warn!("line {line}: {error}, statement skipped");
    presenter.on_diagnostic(line, &error.to_string());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::presenter::{PresenterEvent, RecordingPresenter};
    use crate::schema::value::Value;

    fn executor(source: &str) -> Executor {
        Executor::new(Script::parse(source).unwrap())
    }

    #[test]
    fn dialogue_waits_for_advance() {
        let mut ex = executor("@a:\nmaria: One\nmaria: Two\n");
        let mut p = RecordingPresenter::new();
        assert_eq!(ex.start(&mut p).unwrap(), WaitingFor::Advance);
        assert_eq!(p.dialogue(), vec![("maria", "One")]);
        assert_eq!(ex.advance(&mut p).unwrap(), WaitingFor::Advance);
        assert_eq!(ex.advance(&mut p).unwrap(), WaitingFor::Nothing);
        assert!(ex.is_finished());
        assert_eq!(p.events.last(), Some(&PresenterEvent::ScriptEnded));
    }

    #[test]
    fn wrong_input_is_refused() {
        let mut ex = executor("@a:\nmaria: One\n");
        let mut p = ();
        ex.start(&mut p).unwrap();
        assert_eq!(
            ex.select_choice(0, &mut p),
            Err(ExecError::NotWaiting {
                expected: WaitingFor::Choice,
                actual: WaitingFor::Advance
            })
        );
        assert_eq!(ex.waiting(), WaitingFor::Advance);
    }

    #[test]
    fn branch_exit_resumes_after_conditional() {
        let mut ex = executor("@a:\nif flag:\n    var x 1\nelse:\n    var x 2\n$: done {x}\n");
        ex.session_mut().set_var("flag", Value::Bool(true));
        let mut p = RecordingPresenter::new();
        ex.start(&mut p).unwrap();
        assert_eq!(p.dialogue(), vec![("", "done 1")]);
        assert_eq!(ex.cursor().map(|c| c.frames.len()), Some(1));
    }

    #[test]
    fn step_limit_stops_goto_cycles() {
        let mut ex = executor("@a:\ngoto @b\n@b:\ngoto @a\n").max_steps(50);
        assert_eq!(ex.start(&mut ()), Err(ExecError::StepLimit(50)));
    }

    #[test]
    fn eval_errors_skip_the_statement() {
        let mut ex = executor("@a:\nstat wisdom \"lots\"\nstat wisdom 2\n$: {wisdom}\n");
        let mut p = RecordingPresenter::new();
        ex.start(&mut p).unwrap();
        assert!(matches!(p.events[1], PresenterEvent::Diagnostic { line: 2, .. }));
        assert_eq!(p.dialogue(), vec![("", "2")]);
    }

    #[test]
    fn resolve_rejects_bogus_frames() {
        let script = Script::parse("@a:\nvar x 1\n").unwrap();
        let cursor = Cursor {
            scene: "a".to_string(),
            frames: vec![Frame::new(Branch::Scene), Frame::new(Branch::Then)],
        };
        assert!(matches!(resolve(&script, &cursor), Err(ExecError::InvalidCursor(_))));
    }
}
