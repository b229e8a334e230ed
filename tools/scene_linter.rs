/// Scene Linter — validates every scene template in a content pack.
///
/// Usage: scene_linter <content_path> [--scene <id>] [--strict]
///
/// `content_path` is a single RON pack or a directory of them. With
/// `--strict`, warnings fail the run as well.

use calliope::core::library::{ContentLibrary, ContentPack};
use calliope::core::validation::validate_template;
use std::path::Path;
use std::process;

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        println!("Usage: scene_linter <content_path> [--scene <id>] [--strict]");
        process::exit(0);
    }

    let content_path = &args[1];
    let mut only_scene = None;
    let mut strict = false;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--scene" if i + 1 < args.len() => {
                i += 1;
                only_scene = Some(args[i].clone());
            }
            "--strict" => strict = true,
            other => {
                eprintln!("Unknown argument: {}", other);
                process::exit(2);
            }
        }
        i += 1;
    }

    let path = Path::new(content_path);
    let loaded = if path.is_dir() {
        ContentPack::load_dir(path)
    } else if path.is_file() {
        ContentPack::load_from_ron(path)
    } else {
        eprintln!("ERROR: Path '{}' does not exist", content_path);
        process::exit(1);
    };
    let pack = match loaded {
        Ok(pack) => pack,
        Err(e) => {
            eprintln!("ERROR: Failed to load content: {}", e);
            process::exit(1);
        }
    };

    println!(
        "Loaded {} characters, {} variation sets, {} scenes",
        pack.characters().len(),
        pack.variation_set_ids().len(),
        pack.scene_ids().len()
    );

    let scene_ids: Vec<String> = match only_scene {
        Some(id) => {
            if pack.scene_template(&id).is_none() {
                eprintln!("ERROR: Scene '{}' not found", id);
                process::exit(1);
            }
            vec![id]
        }
        None => pack.scene_ids().into_iter().map(String::from).collect(),
    };

    println!("\n=== Scene Lint Report ===\n");

    let mut errors = 0;
    let mut warnings = 0;
    for id in &scene_ids {
        let Some(template) = pack.scene_template(id) else {
            continue;
        };
        let report = validate_template(template, &pack);
        if report.errors.is_empty() && report.warnings.is_empty() {
            println!("{}: ok ({} beats)", id, template.beats.len());
            continue;
        }
        for warning in &report.warnings {
            println!("WARNING: {}", warning);
        }
        for error in &report.errors {
            println!("ERROR: {}", error);
        }
        errors += report.errors.len();
        warnings += report.warnings.len();
    }

    println!("\nSummary: {} scenes, {} errors, {} warnings", scene_ids.len(), errors, warnings);

    if errors > 0 || (strict && warnings > 0) {
        process::exit(1);
    }
}
