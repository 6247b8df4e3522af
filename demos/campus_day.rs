/// Campus Day example: plays the bundled campus script along a fixed route.
///
/// A day at school: pick a morning activity, meet classmates, answer in
/// class if your stats allow it. Shows stepping, choices, effects and
/// save/restore.
///
/// Run with: cargo run --example campus_day

use narrative_script::core::effects::EffectScript;
use narrative_script::core::executor::WaitingFor;
use narrative_script::core::loader::ScriptLoader;
use narrative_script::core::presenter::{ChoiceView, Presenter};

const CAMPUS_DAY: &str = include_str!("scripts/campus_day.vns");

/// Prints output and remembers the last choice list.
#[derive(Default)]
struct Console {
    choices: Vec<ChoiceView>,
}

impl Presenter for Console {
    fn on_dialogue(&mut self, speaker: &str, text: &str) {
        if speaker.is_empty() {
            println!("    {}", text);
        } else {
            println!("    {}: \"{}\"", speaker, text);
        }
    }

    fn on_choices_presented(&mut self, choices: &[ChoiceView]) {
        for c in choices {
            let marker = if c.selectable { ' ' } else { 'x' };
            println!("      {}{}. {}", marker, c.index + 1, c.text);
        }
        self.choices = choices.to_vec();
    }

    fn on_set_background(&mut self, path: &str) {
        println!("  [bg: {}]", path);
    }

    fn on_play_sound(&mut self, path: &str) {
        println!("  [sound: {}]", path);
    }

    fn on_play_music(&mut self, path: &str) {
        println!("  [music: {}]", path);
    }

    fn on_scene_changed(&mut self, scene: &str) {
        println!("\n=== @{} ===", scene);
    }

    fn on_script_ended(&mut self) {
        println!("\n=== The End ===");
    }

    fn on_place_object(&mut self, object: &str, _image: &str, position: Option<(f64, f64)>) {
        println!("  [{} placed at {:?}]", object, position);
    }

    fn on_remove_object(&mut self, object: &str) {
        println!("  [{} removed]", object);
    }
}

fn main() {
    env_logger::init();

    let loaded = ScriptLoader::new()
        .with_source("campus_day.vns", CAMPUS_DAY)
        .build()
        .expect("Failed to load campus script");
    println!("Loaded {} scenes", loaded.script.len());

    let mut executor = loaded.executor();
    let mut console = Console::default();

    // Fountain, make the wish, then charm the professor.
    let mut route = vec![2, 0, 1].into_iter();

    let mut waiting = executor.start(&mut console).expect("start failed");
    let mut saved = None;

    while waiting != WaitingFor::Nothing {
        waiting = match waiting {
            WaitingFor::Advance => executor.advance(&mut console).expect("advance failed"),
            WaitingFor::Choice => {
                let pick = route
                    .next()
                    .filter(|&i| console.choices.get(i).is_some_and(|c| c.selectable))
                    .or_else(|| console.choices.iter().find(|c| c.selectable).map(|c| c.index))
                    .expect("no selectable option");
                println!("  > picks {}", pick + 1);

                if executor.current_scene() == Some("classroom") && saved.is_none() {
                    saved = Some(executor.snapshot());
                }
                executor.select_choice(pick, &mut console).expect("choice failed")
            }
            WaitingFor::Nothing => break,
        };
    }

    println!("\n--- Final stats ---");
    let mut stats: Vec<_> = executor.session().stats.iter().collect();
    stats.sort_by(|a, b| a.0.cmp(b.0));
    for (name, value) in stats {
        println!("  {} = {}", name, value);
    }

    // --- Replay the classroom from the save, after a study-group effect ---
    if let Some(save) = saved {
        println!("\n--- Restoring the classroom save ---");
        println!("{}", save.to_ron().expect("Failed to write save"));
        executor.restore(save, &mut console).expect("restore failed");

        let study_group = EffectScript::parse("stat knowledge 5\nsound \"chime.wav\"")
            .expect("Failed to parse effect");
        executor.apply(&study_group, &mut console).expect("effect failed");

        // Conditions are checked again on selection, so answering now works.
        println!("  > picks 1");
        let mut waiting = executor.select_choice(0, &mut console).expect("choice failed");
        while waiting == WaitingFor::Advance {
            waiting = executor.advance(&mut console).expect("advance failed");
        }
    }
}
