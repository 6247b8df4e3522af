/// Play: step through a scene script in the terminal.
///
/// Usage: play <script_file_or_dir> [--config <loader.ron>] [--save <file>]
///
/// Input:
///   <Enter>            advance past the current line
///   <n>                pick choice n
///   :save              write save data to the save file
///   :load              restore from the save file
///   :jump <scene>      jump to a scene
///   :restart           new game from the first scene
///   :vars              print variables and stats
///   :help              list commands
///   :quit              exit

use narrative_script::core::executor::{Executor, WaitingFor};
use narrative_script::core::loader::ScriptLoader;
use narrative_script::core::presenter::{ChoiceView, Presenter};
use narrative_script::core::session::{SaveState, Session};
use narrative_script::schema::value::Value;
use std::io::{self, BufRead, Write};
use std::path::Path;

/// Prints script output to stdout.
struct TerminalPresenter;

impl Presenter for TerminalPresenter {
    fn on_dialogue(&mut self, speaker: &str, text: &str) {
        if speaker.is_empty() {
            println!("  {}", text);
        } else {
            println!("  {}: {}", speaker, text);
        }
    }

    fn on_choices_presented(&mut self, choices: &[ChoiceView]) {
        for choice in choices {
            if choice.selectable {
                println!("    [{}] {}", choice.index + 1, choice.text);
            } else {
                println!("    [-] {}", choice.text);
            }
        }
    }

    fn on_play_sound(&mut self, path: &str) {
        println!("  (sound: {})", path);
    }

    fn on_play_music(&mut self, path: &str) {
        println!("  (music: {})", path);
    }

    fn on_set_background(&mut self, path: &str) {
        println!("  (background: {})", path);
    }

    fn on_show_image(&mut self, path: &str) {
        println!("  (image: {})", path);
    }

    fn on_scene_changed(&mut self, scene: &str) {
        println!("\n--- @{} ---", scene);
    }

    fn on_script_ended(&mut self) {
        println!("\n--- The End ---");
    }

    fn on_location_changed(&mut self, location: &str) {
        println!("  (moving to {})", location);
    }

    fn on_place_object(&mut self, object: &str, image: &str, position: Option<(f64, f64)>) {
        match position {
            Some((x, y)) => println!("  (place {} [{}] at {}, {})", object, image, x, y),
            None => println!("  (place {} [{}])", object, image),
        }
    }

    fn on_remove_object(&mut self, object: &str) {
        println!("  (remove {})", object);
    }

    fn on_diagnostic(&mut self, line: usize, message: &str) {
        eprintln!("  ! line {}: {}", line, message);
    }
}

fn main() {
    env_logger::init();
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        print_usage();
        return;
    }

    let mut loader = ScriptLoader::new();
    let target = Path::new(&args[1]);
    if target.is_dir() {
        loader = loader.scripts_dir(target);
    } else {
        loader = loader.script_file(target);
    }

    let mut save_path = String::from("save.ron");
    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--config" if i + 1 < args.len() => {
                i += 1;
                loader = loader.config_file(&args[i]);
            }
            "--save" if i + 1 < args.len() => {
                i += 1;
                save_path = args[i].clone();
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_usage();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let loaded = match loader.build() {
        Ok(l) => l,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            std::process::exit(1);
        }
    };
    for (file, warning) in &loaded.warnings {
        eprintln!("WARNING: {}: {}", file, warning);
    }
    println!("Loaded {} scenes. Type :help for commands.", loaded.script.len());

    let mut executor = loaded.executor();
    let mut presenter = TerminalPresenter;
    let mut waiting = report(executor.start(&mut presenter), executor.waiting());

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        match waiting {
            WaitingFor::Advance => print!("[Enter] "),
            WaitingFor::Choice => print!("choose> "),
            WaitingFor::Nothing => print!("play> "),
        }
        stdout.flush().ok();

        let mut line = String::new();
        if stdin.lock().read_line(&mut line).is_err() || line.is_empty() {
            break;
        }
        let line = line.trim();
        let parts: Vec<&str> = line.split_whitespace().collect();

        let result = match parts.first().copied() {
            None if waiting == WaitingFor::Advance => executor.advance(&mut presenter),
            None => continue,
            Some(":quit") | Some(":q") => {
                println!("Goodbye.");
                break;
            }
            Some(":help") => {
                print_help();
                continue;
            }
            Some(":vars") => {
                print_session(executor.session());
                continue;
            }
            Some(":save") => {
                match executor.snapshot().to_ron() {
                    Ok(text) => match std::fs::write(&save_path, text) {
                        Ok(()) => println!("Saved to {}", save_path),
                        Err(e) => println!("ERROR: {}", e),
                    },
                    Err(e) => println!("ERROR: {}", e),
                }
                continue;
            }
            Some(":load") => {
                let save = std::fs::read_to_string(&save_path)
                    .map_err(|e| e.to_string())
                    .and_then(|text| SaveState::from_ron(&text).map_err(|e| e.to_string()));
                match save {
                    Ok(save) => executor.restore(save, &mut presenter),
                    Err(e) => {
                        println!("ERROR: {}", e);
                        continue;
                    }
                }
            }
            Some(":restart") => executor.restart(&mut presenter),
            Some(":jump") => {
                let Some(scene) = parts.get(1) else {
                    println!("Usage: :jump <scene>");
                    continue;
                };
                executor.jump_to_scene(scene.trim_start_matches('@'), &mut presenter)
            }
            Some(word) => match word.parse::<usize>() {
                Ok(n) if n > 0 && waiting == WaitingFor::Choice => {
                    executor.select_choice(n - 1, &mut presenter)
                }
                _ => {
                    println!("Unknown input: {}. Type :help for commands.", word);
                    continue;
                }
            },
        };
        waiting = report(result, executor.waiting());
    }
}

fn report<E: std::fmt::Display>(result: Result<WaitingFor, E>, current: WaitingFor) -> WaitingFor {
    match result {
        Ok(waiting) => waiting,
        Err(e) => {
            println!("ERROR: {}", e);
            current
        }
    }
}

fn print_session(session: &Session) {
    let mut vars: Vec<(&String, &Value)> = session.variables.iter().collect();
    vars.sort_by(|a, b| a.0.cmp(b.0));
    let mut stats: Vec<(&String, &Value)> = session.stats.iter().collect();
    stats.sort_by(|a, b| a.0.cmp(b.0));

    println!("Variables:");
    for (name, value) in vars {
        println!("  {} = {}", name, value);
    }
    println!("Stats:");
    for (name, value) in stats {
        println!("  {} = {}", name, value);
    }
}

fn print_usage() {
    println!("Usage: play <script_file_or_dir> [--config <loader.ron>] [--save <file>]");
}

fn print_help() {
    println!("Commands:");
    println!("  <Enter>          advance past the current line");
    println!("  <n>              pick choice n");
    println!("  :save            write save data");
    println!("  :load            restore save data");
    println!("  :jump <scene>    jump to a scene");
    println!("  :restart         new game from the first scene");
    println!("  :vars            print variables and stats");
    println!("  :quit            exit");
}
