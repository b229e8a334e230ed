/// Scene Preview — interactive shell for stepping through scenes.
///
/// Usage: scene_preview --content <path> [--config <file>] [--seed <n>]
///
/// Commands:
///   scenes                 — list scene templates
///   cast <scene>           — cast a scene from every character and start it
///   play                   — build the current beat's line
///   next                   — advance to the next beat
///   run [n]                — play the rest of the scene (at most n beats)
///   rel <from> <to> <type> — show a relationship value
///   ctx                    — dump the scene context
///   var <key> <value>      — set a {var:key} text variable
///   reset                  — forget relationships, context and history
///   help                   — list commands
///   quit                   — exit
///
/// Set RUST_LOG (e.g. `RUST_LOG=calliope=debug`) to watch scoring and
/// branch decisions.

use calliope::config::CalliopeConfig;
use calliope::core::library::{ContentLibrary, ContentPack};
use calliope::schema::event::TracingEventSink;
use calliope::{BeatLine, Calliope};
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        print_usage();
        return;
    }

    let mut content_path = None;
    let mut config_path = None;
    let mut seed = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--content" if i + 1 < args.len() => {
                i += 1;
                content_path = Some(args[i].clone());
            }
            "--config" if i + 1 < args.len() => {
                i += 1;
                config_path = Some(args[i].clone());
            }
            "--seed" if i + 1 < args.len() => {
                i += 1;
                seed = args[i].parse().ok();
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_usage();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let Some(content_path) = content_path else {
        eprintln!("ERROR: --content is required");
        std::process::exit(1);
    };
    let pack = match load_content(Path::new(&content_path)) {
        Ok(pack) => pack,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            std::process::exit(1);
        }
    };
    let config = match config_path {
        Some(path) => match CalliopeConfig::from_file(Path::new(&path)) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("ERROR: Failed to load config: {}", e);
                std::process::exit(1);
            }
        },
        None => CalliopeConfig::default(),
    };

    let scene_ids: Vec<String> = pack.scene_ids().into_iter().map(String::from).collect();

    let mut builder = Calliope::builder()
        .config(config)
        .library(pack)
        .event_sink(Arc::new(TracingEventSink));
    if let Some(seed) = seed {
        builder = builder.seed(seed);
    }
    let mut engine = match builder.build() {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            std::process::exit(1);
        }
    };

    println!(
        "Loaded {} characters. Seed: {}",
        engine.library().characters().len(),
        engine.config().seed
    );
    println!("Type 'help' for commands.\n");

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("scene> ");
        stdout.flush().ok();

        let mut line = String::new();
        if stdin.lock().read_line(&mut line).is_err() || line.is_empty() {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        let cmd = parts[0].to_lowercase();

        match cmd.as_str() {
            "quit" | "exit" | "q" => {
                println!("Goodbye.");
                break;
            }
            "help" | "h" => print_help(),
            "scenes" => {
                let ids: Vec<String> = engine
                    .library()
                    .characters()
                    .iter()
                    .map(|c| format!("{} ({})", c.display_name, c.id))
                    .collect();
                println!("Characters: {}", ids.join(", "));
                println!("Scenes: {}", scene_ids.join(", "));
            }
            "cast" => {
                let Some(scene) = parts.get(1) else {
                    println!("Usage: cast <scene>");
                    continue;
                };
                let characters = engine.library().characters().to_vec();
                match engine.cast_scene(scene, &characters) {
                    Some(cast) => {
                        let mut roles: Vec<(&String, &String)> =
                            cast.iter().map(|(role, c)| (role, &c.display_name)).collect();
                        roles.sort();
                        for (role, name) in roles {
                            println!("  {:<12} {}", role, name);
                        }
                        if !engine.start_scene(scene, cast) {
                            println!("Scene '{}' could not start.", scene);
                        }
                    }
                    None => println!("Could not cast '{}'.", scene),
                }
            }
            "play" => match engine.play_current_beat() {
                Some(line) => print_line(&line),
                None => println!("(no line)"),
            },
            "next" => {
                if engine.advance() {
                    let beat = engine.orchestrator().current_beat_id().unwrap_or("?");
                    println!("-> {}", beat);
                } else {
                    println!("Scene over.");
                }
            }
            "run" => {
                let limit = parts.get(1).and_then(|n| n.parse().ok()).unwrap_or(50);
                for line in engine.run_scene(limit) {
                    print_line(&line);
                }
                println!("Scene over.");
            }
            "rel" => {
                if parts.len() < 4 {
                    println!("Usage: rel <from> <to> <type>");
                    continue;
                }
                let value = engine.relationships().get_relationship(parts[1], parts[2], parts[3]);
                println!("{} -> {} [{}] = {:.1}", parts[1], parts[2], parts[3], value);
            }
            "ctx" => {
                let mut entries = engine.scene_context().entries_with_prefix("");
                entries.sort_by(|a, b| a.0.cmp(&b.0));
                for (key, value) in entries {
                    println!("  {} = {}", key, value);
                }
            }
            "var" => {
                if parts.len() < 3 {
                    println!("Usage: var <key> <value>");
                    continue;
                }
                engine.set_variable(parts[1], parts[2..].join(" "));
            }
            "reset" => {
                engine.reset_session();
                println!("Session reset.");
            }
            _ => println!("Unknown command '{}'. Type 'help'.", cmd),
        }
    }
}

fn load_content(path: &Path) -> Result<ContentPack, calliope::core::library::ContentError> {
    if path.is_dir() {
        ContentPack::load_dir(path)
    } else {
        ContentPack::load_from_ron(path)
    }
}

fn print_line(line: &BeatLine) {
    println!("[{}] {}", line.beat_id, line.text);
    println!("        ({} via '{}', score {:.2})", line.speaker_id, line.fragment_id, line.score);
}

fn print_usage() {
    println!("Usage: scene_preview --content <path> [--config <file>] [--seed <n>]");
}

fn print_help() {
    println!("Commands:");
    println!("  scenes                 list characters and scene templates");
    println!("  cast <scene>           cast a scene from every character and start it");
    println!("  play                   build the current beat's line");
    println!("  next                   advance to the next beat");
    println!("  run [n]                play the rest of the scene (at most n beats)");
    println!("  rel <from> <to> <type> show a relationship value");
    println!("  ctx                    dump the scene context");
    println!("  var <key> <value>      set a {{var:key}} text variable");
    println!("  reset                  forget relationships, context and history");
    println!("  quit                   exit");
}
