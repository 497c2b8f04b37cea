//! Headless driver: loads a model into a studio, lets the scene tree settle
//! and prints it as JSON.
//!
//! Usage: `studio3d <model.gltf|model.glb> [--config studio.json] [--tree-out tree.json]`

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use studio3d::assets::ImportMode;
use studio3d::{Studio, StudioConfig, StudioEvent};

const SETTLE_STEP: Duration = Duration::from_millis(50);
const SETTLE_STEPS: u32 = 100;

struct Args {
    model: PathBuf,
    config: Option<PathBuf>,
    tree_out: Option<PathBuf>,
}

const USAGE: &str = "usage: studio3d <model> [--config path] [--tree-out path]";

fn flag_value(args: &mut impl Iterator<Item = String>, flag: &str) -> Result<PathBuf, String> {
    args.next().map(PathBuf::from).ok_or_else(|| format!("{flag} needs a path"))
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Args, String> {
    let mut model = None;
    let mut config = None;
    let mut tree_out = None;
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => config = Some(flag_value(&mut args, "--config")?),
            "--tree-out" => tree_out = Some(flag_value(&mut args, "--tree-out")?),
            _ if model.is_none() => model = Some(PathBuf::from(arg)),
            _ => return Err(format!("unexpected argument: {arg}")),
        }
    }
    Ok(Args {
        model: model.ok_or(USAGE)?,
        config,
        tree_out,
    })
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = match &args.config {
        Some(path) => StudioConfig::load(path)?,
        None => StudioConfig::default(),
    };
    let mut studio = Studio::new(config)?;
    studio.import_file(&args.model, ImportMode::Replace)?;

    let start = Instant::now();
    let mut failure = None;
    for step in 0..SETTLE_STEPS {
        studio.update(start + SETTLE_STEP * step);
        for event in studio.drain_events() {
            match event {
                StudioEvent::ModelLoaded { name, size, .. } => {
                    log::info!("Loaded {name} ({size} bytes)");
                }
                StudioEvent::ImportFailed { name, message } => {
                    failure = Some(format!("{name}: {message}"));
                }
                StudioEvent::SceneTreeChanged { tree } => {
                    log::debug!("Scene tree now has {} top-level objects", tree.len());
                }
                _ => {}
            }
        }
        if failure.is_some() || (!studio.is_importing() && !studio.is_rebuild_pending() && !studio.is_loading()) {
            break;
        }
    }
    if let Some(failure) = failure {
        return Err(failure.into());
    }

    match &args.tree_out {
        Some(path) => {
            studio.export_tree(path)?;
            log::info!("Wrote scene tree to {}", path.display());
        }
        None => println!("{}", serde_json::to_string_pretty(studio.scene_tree())?),
    }
    studio.shutdown();
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = match parse_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(message) => {
            eprintln!("{message}");
            return ExitCode::from(2);
        }
    };
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Args, String> {
        parse_args(args.iter().map(|arg| arg.to_string()))
    }

    #[test]
    fn flags_take_paths_in_any_order() {
        let args = parse(&["--tree-out", "tree.json", "chair.glb", "--config", "studio.json"]).unwrap();
        assert_eq!(args.model, PathBuf::from("chair.glb"));
        assert_eq!(args.config, Some(PathBuf::from("studio.json")));
        assert_eq!(args.tree_out, Some(PathBuf::from("tree.json")));
    }

    #[test]
    fn missing_values_and_extra_models_are_rejected() {
        assert_eq!(parse(&["chair.glb", "--config"]).err().unwrap(), "--config needs a path");
        assert!(parse(&["a.glb", "b.glb"]).err().unwrap().contains("b.glb"));
        assert_eq!(parse(&[]).err().unwrap(), USAGE);
    }
}
