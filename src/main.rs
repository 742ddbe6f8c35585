use std::error::Error;
use std::io::BufRead;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rand::SeedableRng;
use rand_pcg::Pcg32;

use evoart::config::EvolveParams;
use evoart::engine;
use evoart::eval::Evaluator;
use evoart::persist::{JsonStateStore, StateStore};
use evoart::progress::{BestImageWriter, CsvProgressLog, ProgressSink};
use evoart::target::TargetImage;

const SETTINGS_FILE: &str = "evoart.json";
const STATE_FILE: &str = "evoart-state.json";
const PROGRESS_FILE: &str = "progress.csv";
const FRAMES_DIR: &str = "frames";

fn main() -> ExitCode {
    env_logger::init();

    let Some(image_path) = std::env::args().nth(1) else {
        eprintln!("usage: evoart <target-image>");
        eprintln!("  settings are read from {SETTINGS_FILE} if present;");
        eprintln!("  a run resumes from {STATE_FILE} when one exists.");
        eprintln!("  press 'q' then enter to stop and save.");
        return ExitCode::FAILURE;
    };

    match run(&image_path) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(image_path: &str) -> Result<(), Box<dyn Error>> {
    let params = Arc::new(EvolveParams::load(Path::new(SETTINGS_FILE))?);
    let target = Arc::new(TargetImage::load(Path::new(image_path), params.image_size)?);
    log::info!(
        "target {} at {}x{}, population {}, {} polygons",
        image_path,
        target.width,
        target.height,
        params.population_size,
        params.polygon_count,
    );

    let evaluator = Arc::new(Evaluator::new(true)?);
    let rng = Pcg32::from_os_rng();
    let store = JsonStateStore::new(STATE_FILE);

    let snapshot = store.load()?;
    if let Some(snapshot) = &snapshot {
        log::info!("resuming from generation {}", snapshot.generation);
    }
    let mut evolver = engine::build(snapshot, rng, target, evaluator, Arc::clone(&params))?;

    let mut sinks: Vec<Box<dyn ProgressSink>> = vec![Box::new(CsvProgressLog::create(PROGRESS_FILE)?)];
    if params.save_images {
        sinks.push(Box::new(BestImageWriter::new(FRAMES_DIR)?));
    }

    let stop = Arc::new(AtomicBool::new(false));
    spawn_stop_listener(Arc::clone(&stop));

    println!("evolving; press 'q' then enter to stop");
    engine::run(evolver.as_mut(), &mut sinks, &store, &stop)?;

    log::info!("stopped after generation {}", evolver.generation());
    println!("{}", evolver.status());
    Ok(())
}

/// watches stdin for a line starting with 'q'. the thread is detached; it
/// dies with the process once the engine loop has exited.
fn spawn_stop_listener(stop: Arc<AtomicBool>) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if line.trim().eq_ignore_ascii_case("q") {
                stop.store(true, Ordering::Relaxed);
                break;
            }
        }
    });
}
