/// The presentation-side interface the executor drives.

use serde::{Deserialize, Serialize};

/// One option of a presented choice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceView {
    /// Position in the script's option list; pass back to `select_choice`.
    pub index: usize,
    pub text: String,
    pub selectable: bool,
}

/// Side-effect sink for script output. Every method defaults to a no-op
/// so hosts implement only what they render.
pub trait Presenter {
    fn on_dialogue(&mut self, _speaker: &str, _text: &str) {}
    fn on_choices_presented(&mut self, _choices: &[ChoiceView]) {}
    fn on_play_sound(&mut self, _path: &str) {}
    fn on_play_music(&mut self, _path: &str) {}
    fn on_set_background(&mut self, _path: &str) {}
    fn on_show_image(&mut self, _path: &str) {}
    fn on_scene_changed(&mut self, _scene: &str) {}
    fn on_script_ended(&mut self) {}
    /// Called by `move`/`locate` before the jump to the location's scene.
    fn on_location_changed(&mut self, _location: &str) {}
    fn on_place_object(&mut self, _object: &str, _image: &str, _position: Option<(f64, f64)>) {}
    fn on_remove_object(&mut self, _object: &str) {}
    /// A statement failed at run time and was skipped.
    fn on_diagnostic(&mut self, _line: usize, _message: &str) {}
}

/// Discards everything.
impl Presenter for () {}

/// Presenter output captured as data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PresenterEvent {
    Dialogue { speaker: String, text: String },
    Choices { choices: Vec<ChoiceView> },
    PlaySound { path: String },
    PlayMusic { path: String },
    SetBackground { path: String },
    ShowImage { path: String },
    SceneChanged { scene: String },
    ScriptEnded,
    LocationChanged { location: String },
    PlaceObject {
        object: String,
        image: String,
        position: Option<(f64, f64)>,
    },
    RemoveObject { object: String },
    Diagnostic { line: usize, message: String },
}

/// Records every call in order. Used by tests and by hosts that hand
/// event batches across an FFI boundary.
#[derive(Debug, Clone, Default)]
pub struct RecordingPresenter {
    pub events: Vec<PresenterEvent>,
}

impl RecordingPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain the recorded events.
    pub fn take(&mut self) -> Vec<PresenterEvent> {
        std::mem::take(&mut self.events)
    }

    /// The (speaker, text) pairs shown so far.
    pub fn dialogue(&self) -> Vec<(&str, &str)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                PresenterEvent::Dialogue { speaker, text } => Some((speaker.as_str(), text.as_str())),
                _ => None,
            })
            .collect()
    }

    /// The most recently presented choice list.
    pub fn last_choices(&self) -> Option<&[ChoiceView]> {
        self.events.iter().rev().find_map(|e| match e {
            PresenterEvent::Choices { choices } => Some(choices.as_slice()),
            _ => None,
        })
    }
}

impl Presenter for RecordingPresenter {
    fn on_dialogue(&mut self, speaker: &str, text: &str) {
        self.events.push(PresenterEvent::Dialogue {
            speaker: speaker.to_string(),
            text: text.to_string(),
        });
    }

    fn on_choices_presented(&mut self, choices: &[ChoiceView]) {
        self.events.push(PresenterEvent::Choices {
            choices: choices.to_vec(),
        });
    }

    fn on_play_sound(&mut self, path: &str) {
        self.events.push(PresenterEvent::PlaySound { path: path.to_string() });
    }

    fn on_play_music(&mut self, path: &str) {
        self.events.push(PresenterEvent::PlayMusic { path: path.to_string() });
    }

    fn on_set_background(&mut self, path: &str) {
        self.events.push(PresenterEvent::SetBackground { path: path.to_string() });
    }

    fn on_show_image(&mut self, path: &str) {
        self.events.push(PresenterEvent::ShowImage { path: path.to_string() });
    }

    fn on_scene_changed(&mut self, scene: &str) {
        self.events.push(PresenterEvent::SceneChanged { scene: scene.to_string() });
    }

    fn on_script_ended(&mut self) {
        self.events.push(PresenterEvent::ScriptEnded);
    }

    fn on_location_changed(&mut self, location: &str) {
        self.events.push(PresenterEvent::LocationChanged {
            location: location.to_string(),
        });
    }

    fn on_place_object(&mut self, object: &str, image: &str, position: Option<(f64, f64)>) {
        self.events.push(PresenterEvent::PlaceObject {
            object: object.to_string(),
            image: image.to_string(),
            position,
        });
    }

    fn on_remove_object(&mut self, object: &str) {
        self.events.push(PresenterEvent::RemoveObject { object: object.to_string() });
    }

    fn on_diagnostic(&mut self, line: usize, message: &str) {
        self.events.push(PresenterEvent::Diagnostic {
            line,
            message: message.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_in_order() {
        let mut p = RecordingPresenter::new();
        p.on_set_background("classroom");
        p.on_dialogue("maria", "Hi");
        p.on_choices_presented(&[ChoiceView {
            index: 0,
            text: "A".to_string(),
            selectable: true,
        }]);
        assert_eq!(p.events.len(), 3);
        assert_eq!(p.dialogue(), vec![("maria", "Hi")]);
        assert_eq!(p.last_choices().map(|c| c.len()), Some(1));
        assert_eq!(p.take().len(), 3);
        assert!(p.events.is_empty());
    }

    #[test]
    fn unit_presenter_accepts_everything() {
        let mut p = ();
        p.on_dialogue("a", "b");
        p.on_script_ended();
    }
}
