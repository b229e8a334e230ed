/// Dinner Party example — one scene played three ways.
///
/// The same template runs with the cast the engine picks, with a cast
/// chosen by hand, and again after the guests already distrust each other.
/// Branches read traits, relationships and scene flags, so each run takes
/// a different path through the beats.
///
/// Run with: cargo run --example dinner_party

use calliope::config::CalliopeConfig;
use calliope::core::casting::Cast;
use calliope::core::library::{ContentLibrary, ContentPack};
use calliope::core::selection::StrategyKind;
use calliope::core::validation::validate_template;
use calliope::schema::event::EventLog;
use calliope::{BeatLine, Calliope};
use std::path::Path;
use std::sync::Arc;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let pack = ContentPack::load_from_ron(Path::new("content/dinner_party.ron"))
        .expect("Failed to load dinner party content");

    let template = pack
        .scene_template("dinner_party")
        .expect("dinner_party scene missing");
    let report = validate_template(template, &pack);
    for warning in &report.warnings {
        println!("WARNING: {}", warning);
    }
    assert!(report.is_ok(), "content errors: {:?}", report.errors);

    let mut config = CalliopeConfig::default();
    config.seed = 2026;
    config.selection.strategy = StrategyKind::HighestScore;

    let events = Arc::new(EventLog::new());
    let mut engine = Calliope::builder()
        .config(config)
        .library(pack.clone())
        .event_sink(events.clone())
        .build()
        .expect("Failed to build engine");

    // --- Act 1: the engine casts the scene ---
    println!("=== Act 1: cast by preference ===\n");
    let characters = engine.library().characters().to_vec();
    let cast = engine
        .cast_scene("dinner_party", &characters)
        .expect("Nobody fits the roles");
    print_cast(&cast);
    engine.start_scene("dinner_party", cast);
    print_lines(&engine.run_scene(20));
    println!(
        "\nEleanor's trust in James: {:.1}",
        engine.relationships().get_relationship("eleanor", "james", "trust")
    );

    // --- Act 2: a gentler accuser ---
    println!("\n=== Act 2: Robert asks the questions ===\n");
    engine.reset_session();
    let member = |id: &str| pack.character(id).expect("unknown character").clone();
    let cast = Cast::from([
        ("host".to_string(), member("margaret")),
        ("accuser".to_string(), member("robert")),
        ("suspect".to_string(), member("james")),
    ]);
    print_cast(&cast);
    engine.start_scene("dinner_party", cast);
    print_lines(&engine.run_scene(20));

    // --- Act 3: bad blood carried over ---
    println!("\n=== Act 3: old grudges ===\n");
    engine.reset_session();
    engine.relationships().set_relationship("eleanor", "james", "trust", 20.0);
    engine.scene_context().set("accusation_made", true);
    let characters = engine.library().characters().to_vec();
    engine.cast_and_start("dinner_party", &characters);
    print_lines(&engine.run_scene(20));

    println!("\n--- {} events published ---", events.len());
    for kind in ["scene_cast", "line_prepared", "beat_advanced", "relationship_changed", "scene_ended"] {
        println!("  {:<22} {}", kind, events.count_kind(kind));
    }
}

fn print_cast(cast: &Cast) {
    let mut roles: Vec<_> = cast.iter().collect();
    roles.sort_by(|a, b| a.0.cmp(b.0));
    for (role, character) in roles {
        println!("  {:<8} {}", role, character.display_name);
    }
    println!();
}

fn print_lines(lines: &[BeatLine]) {
    for line in lines {
        println!("[{}] {}", line.beat_id, line.text);
    }
}
