//! tapeline CLI: inspect and edit project snapshots, preview arrangements.
//!
//! Usage:
//!   tl-cli info <project.json>
//!   tl-cli trim <project.json> <track> <start_ms> <end_ms> [-o out.json]
//!   tl-cli cut  <project.json> <track> <start_ms> <end_ms> [-o out.json]
//!   tl-cli preview <project.json> [--wav out.wav] [--config engine.json]
//!
//! `preview` cannot decode audio, so every source is replaced by a
//! placeholder tone of the length its segments need.

use std::collections::BTreeMap;
use std::io::Write;
use std::time::Duration;
use std::{env, fs};

use tl_audio::CpalContext;
use tl_engine::{Engine, EngineConfig, SourceBank, SourceBuffer};
use tl_ir::{edit_track, CompositionSignature, EditMode, Project, SourceRef, TrackId};
use tl_master::{ExportSettings, Session};

const USAGE: &str = "Usage:
  tl-cli info <project.json>
  tl-cli trim|cut <project.json> <track> <start_ms> <end_ms> [-o out.json]
  tl-cli preview <project.json> [--wav out.wav] [--config engine.json]";

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().skip(1).collect();
    let (Some(command), Some(path)) = (args.first(), args.get(1)) else {
        die(USAGE);
    };
    let project = load_project(path);

    match command.as_str() {
        "info" => print_info(&project),
        "trim" => run_edit(&project, &args, EditMode::Trim),
        "cut" => run_edit(&project, &args, EditMode::Cut),
        "preview" => {
            let project = match project.length_ms {
                Some(_) => project,
                None => project.with_derived_length(),
            };
            let config = match flag(&args, "--config") {
                Some(path) => load_config(&path),
                None => EngineConfig::default(),
            };
            match flag(&args, "--wav") {
                Some(wav) => render_to_wav(project, config, &wav),
                None => play_audio(project, config),
            }
        }
        _ => die(USAGE),
    }
}

fn die(msg: &str) -> ! {
    eprintln!("{}", msg);
    std::process::exit(1);
}

fn flag(args: &[String], name: &str) -> Option<String> {
    args.iter()
        .position(|a| a == name)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

fn load_project(path: &str) -> Project {
    let json = fs::read_to_string(path).unwrap_or_else(|e| die(&format!("Failed to read {}: {}", path, e)));
    Project::from_json(&json).unwrap_or_else(|e| die(&format!("Failed to parse {}: {}", path, e)))
}

fn load_config(path: &str) -> EngineConfig {
    let json = fs::read_to_string(path).unwrap_or_else(|e| die(&format!("Failed to read {}: {}", path, e)));
    EngineConfig::from_json(&json).unwrap_or_else(|e| die(&format!("Failed to parse {}: {}", path, e)))
}

fn print_info(project: &Project) {
    let derived = project.derived_length_ms();
    println!(
        "Tempo:     {} BPM, {}/{} ({:.1} ms/beat)",
        project.bpm,
        project.time_signature.beats_per_bar(),
        project.time_signature.beat_unit(),
        project.ms_per_beat()
    );
    match project.length_ms {
        Some(len) => println!("Length:    {:.1} ms (segments end at {:.1} ms)", len, derived),
        None => println!("Length:    {:.1} ms (derived)", derived),
    }
    match project.loop_region.bounds() {
        Some((start, end)) => println!("Loop:      {:.1} .. {:.1} ms", start, end),
        None => println!("Loop:      off"),
    }
    println!("Signature: {:016x}", CompositionSignature::of(project).value());
    println!("Master:    {}", chain_names(&project.master_chain));
    println!();

    let any_soloed = project.any_soloed();
    for track in &project.tracks {
        let segments: Vec<_> = project.segments_on(&track.id).collect();
        let flags = match (track.mute, track.solo, track.is_silent(any_soloed)) {
            (true, _, _) => " [muted]",
            (_, true, _) => " [solo]",
            (_, _, true) => " [silent]",
            _ => "",
        };
        println!(
            "{:<12} {:<20} {:+6.1} dB  pan {:+.2}  {} segments{}",
            track.id.as_str(),
            track.name,
            track.gain_db,
            track.pan,
            segments.len(),
            flags
        );
        if !track.effects.is_empty() {
            println!("{:<12} fx: {}", "", chain_names(&track.effects));
        }
        for seg in segments {
            println!(
                "{:<12}   {:<16} {:>9.1} .. {:>9.1} ms  src {} @ {:.1} ms",
                "",
                seg.id.as_str(),
                seg.start_on_timeline_ms,
                seg.end_on_timeline_ms(),
                seg.source,
                seg.start_in_source_ms
            );
        }
    }
}

fn chain_names(chain: &[tl_ir::EffectSpec]) -> String {
    if chain.is_empty() {
        return "-".into();
    }
    chain.iter().map(|e| e.type_name()).collect::<Vec<_>>().join(" > ")
}

fn run_edit(project: &Project, args: &[String], mode: EditMode) {
    let (Some(track), Some(start), Some(end)) = (args.get(2), args.get(3), args.get(4)) else {
        die(USAGE);
    };
    let parse = |s: &str| s.parse::<f64>().unwrap_or_else(|_| die(&format!("Not a number: {}", s)));
    let track = TrackId::from(track.as_str());

    let (next, result) = edit_track(project, &track, parse(start), parse(end), mode)
        .unwrap_or_else(|e| die(&format!("Edit failed: {}", e)));
    eprintln!(
        "{:?}: {} kept, {} removed, length {:.1} ms",
        mode,
        result.kept.len(),
        result.removed.len(),
        next.length_ms.unwrap_or(0.0)
    );

    let json = next
        .to_json_pretty()
        .unwrap_or_else(|e| die(&format!("Failed to serialize: {}", e)));
    match flag(args, "-o") {
        Some(out) => fs::write(&out, json).unwrap_or_else(|e| die(&format!("Failed to write {}: {}", out, e))),
        None => println!("{}", json),
    }
}

/// One sine per source key, long enough for every segment that uses it.
fn placeholder_sources(project: &Project, sample_rate: u32) -> SourceBank {
    let mut needed: BTreeMap<&SourceRef, f64> = BTreeMap::new();
    for seg in project.segments.iter().filter(|s| s.is_live()) {
        let end = seg.start_in_source_ms.max(0.0) + seg.duration_ms;
        let slot = needed.entry(&seg.source).or_insert(0.0);
        *slot = slot.max(end);
    }

    let mut bank = SourceBank::new();
    for (i, (key, ms)) in needed.into_iter().enumerate() {
        // Minor thirds apart
        let freq = 220.0 * 2f32.powf((i % 12) as f32 * 3.0 / 12.0);
        let frames = (ms / 1000.0 * sample_rate as f64).ceil() as usize;
        let samples = (0..frames)
            .map(|n| 0.25 * (std::f32::consts::TAU * freq * n as f32 / sample_rate as f32).sin())
            .collect();
        let source = SourceBuffer::mono(sample_rate, samples);
        let info = source.info();
        println!(
            "Source {:<16} {:.0} Hz tone, {:.1} ms, {} ch @ {} Hz, peak {:.1} dBFS",
            key.as_str(),
            freq,
            info.duration_ms,
            info.channels,
            info.sample_rate,
            info.peak_dbfs
        );
        bank.insert(key.clone(), source);
    }
    bank
}

fn play_audio(project: Project, config: EngineConfig) {
    let context = CpalContext::new().unwrap_or_else(|e| die(&format!("Audio output unavailable: {}", e)));
    let mut engine = Engine::new(config, context);
    *engine.sources_mut() = placeholder_sources(&project, engine.sample_rate());

    let mut session = Session::new(engine);
    session
        .reload(project)
        .unwrap_or_else(|e| die(&format!("Failed to load project: {}", e)));
    session
        .engine_mut()
        .play()
        .unwrap_or_else(|e| die(&format!("Failed to start playback: {}", e)));
    println!("Playing...");

    let length = session.engine().length_ms().unwrap_or(0.0);
    while !session.engine().is_ended() {
        if let Err(e) = session.pump() {
            die(&format!("Playback error: {}", e));
        }
        print!("\r{:>9.1} / {:.1} ms", session.coordinator().state().ms, length);
        let _ = std::io::stdout().flush();
        std::thread::sleep(Duration::from_millis(5));
    }

    session.engine_mut().dispose();
    println!("\rDone.                          ");
}

fn render_to_wav(project: Project, config: EngineConfig, path: &str) {
    let settings = ExportSettings {
        sample_rate: config.sample_rate,
        normalize: true,
        tail_ms: 1000.0,
        ..Default::default()
    };
    println!("Rendering to {} at {} Hz...", path, settings.sample_rate);

    let sources = placeholder_sources(&project, settings.sample_rate);
    let mut file = fs::File::create(path).unwrap_or_else(|e| die(&format!("Failed to create {}: {}", path, e)));
    let frames = tl_master::export_wav(&mut file, &project, &sources, &config, &settings)
        .unwrap_or_else(|e| die(&format!("Export failed: {}", e)));

    println!("Rendered {} frames", frames);
}
