//! Projector Tuning - headless session tool
//!
//! Creates, inspects and configures calibration session files.

use anyhow::{anyhow, bail, Context, Result};
use projector_tuning::stream::decode_session;
use projector_tuning::{CalibratorConfig, Session, StaticScreenSetup};
use std::path::{Path, PathBuf};

const USAGE: &str = "\
Usage: projector-tuning [--config <file>] <command>

Commands:
  new <session> [count]     Create a session file with `count` tunings (default 1)
  inspect <session> [--json]  Print the tunings of a session file
  config [file]             Print the default configuration or write it to a file";

fn main() -> Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    log::debug!("Starting Projector Tuning v{}", env!("CARGO_PKG_VERSION"));

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let config = match args.iter().position(|a| a == "--config") {
        Some(i) => {
            let path = args
                .get(i + 1)
                .cloned()
                .ok_or_else(|| anyhow!("--config needs a file\n\n{}", USAGE))?;
            args.drain(i..i + 2);
            CalibratorConfig::load(Path::new(&path))
                .with_context(|| format!("Failed to load config {}", path))?
        }
        None => CalibratorConfig::default(),
    };

    match args.first().map(String::as_str) {
        Some("new") => {
            let path = path_arg(&args, 1)?;
            let count = match args.get(2) {
                Some(n) => n
                    .parse::<usize>()
                    .with_context(|| format!("Invalid tuning count '{}'", n))?,
                None => 1,
            };
            create_session(config, &path, count)
        }
        Some("inspect") => {
            let path = path_arg(&args, 1)?;
            let json = args.iter().any(|a| a == "--json");
            inspect_session(&path, json)
        }
        Some("config") => match args.get(1) {
            Some(path) => {
                config.save(Path::new(path))?;
                Ok(())
            }
            None => {
                println!("{}", config.to_ron()?);
                Ok(())
            }
        },
        Some(other) => bail!("Unknown command '{}'\n\n{}", other, USAGE),
        None => {
            println!("{}", USAGE);
            Ok(())
        }
    }
}

fn path_arg(args: &[String], index: usize) -> Result<PathBuf> {
    args.get(index)
        .map(PathBuf::from)
        .ok_or_else(|| anyhow!("Missing session file\n\n{}", USAGE))
}

fn create_session(config: CalibratorConfig, path: &Path, count: usize) -> Result<()> {
    let screens = Box::new(StaticScreenSetup::new(config.standard_screen()));
    let mut session = Session::new(config, screens);
    for _ in 0..count {
        session.add_tuning();
    }
    session
        .save(path)
        .with_context(|| format!("Failed to write {:?}", path))?;
    Ok(())
}

/// Print a session file as stored, without reconciling its screens
fn inspect_session(path: &Path, json: bool) -> Result<()> {
    let data = std::fs::read(path).with_context(|| format!("Failed to read {:?}", path))?;
    let (mode, tunings) =
        decode_session(&data).with_context(|| format!("Failed to decode {:?}", path))?;

    let tunings: Vec<serde_json::Value> = tunings
        .iter()
        .enumerate()
        .map(|(index, tuning)| {
            let grid = tuning.warp_grid();
            let mask = tuning.blend_mask();
            serde_json::json!({
                "index": index,
                "color": tuning.color().to_string(),
                "screen": tuning.screen().map(|s| s.id.clone()),
                "sub_screen": tuning.sub_screen_index(),
                "resolution": [tuning.width(), tuning.height()],
                "fov": tuning.projector().fov(),
                "warp": {
                    "columns": grid.columns(),
                    "rows": grid.rows(),
                    "identity": grid.is_identity(),
                    "selected": grid.get_selected().len(),
                },
                "blend": {
                    "edges": [mask.top_width(), mask.bottom_width(), mask.left_width(), mask.right_width()],
                    "gamma": mask.gamma(),
                    "painted": !mask.strokes().is_clear(),
                },
            })
        })
        .collect();

    if json {
        let summary = serde_json::json!({
            "mode": mode.name(),
            "tunings": tunings,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("Mode: {}", mode);
    for tuning in &tunings {
        println!(
            "  #{} {} screen={} resolution={} warp={}x{}{} mask painted={}",
            tuning["index"],
            tuning["color"].as_str().unwrap_or_default(),
            tuning["screen"].as_str().unwrap_or("-"),
            tuning["resolution"],
            tuning["warp"]["columns"],
            tuning["warp"]["rows"],
            if tuning["warp"]["identity"] == true { "" } else { " (warped)" },
            tuning["blend"]["painted"],
        );
    }
    Ok(())
}
