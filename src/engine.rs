use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use rand_pcg::Pcg32;
use thiserror::Error;

use crate::config::{Algorithm, EvolveParams};
use crate::eval::{EvalError, Evaluator};
use crate::individual::Individual;
use crate::persist::{Snapshot, SnapshotError, StateStore, SNAPSHOT_VERSION};
use crate::population::Population;
use crate::progress::{GenerationReport, ProgressError, ProgressSink};
use crate::target::TargetImage;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Eval(#[from] EvalError),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    #[error(transparent)]
    Progress(#[from] ProgressError),
}

/// one algorithm variant: a single generation step plus the accessors the
/// run loop needs. the set of implementors is closed; variants are chosen
/// through the `algorithm` setting.
pub trait Evolver {
    /// one full generation; true when it produced a new all-time best
    fn iterate(&mut self) -> Result<bool, EngineError>;
    /// whether the run is done. no variant currently has a convergence
    /// criterion; runs go until the user stops them.
    fn stopping_condition_met(&self) -> bool;
    fn best(&self) -> &Individual;
    fn snapshot(&self) -> Snapshot;
    fn generation(&self) -> u64;
    fn status(&self) -> &str;
}

/// constructs the configured algorithm variant, resuming from a snapshot
/// when one is given
pub fn build(
    snapshot: Option<Snapshot>,
    rng: Pcg32,
    target: Arc<TargetImage>,
    evaluator: Arc<Evaluator>,
    params: Arc<EvolveParams>,
) -> Result<Box<dyn Evolver>, EngineError> {
    match params.algorithm {
        Algorithm::Ga => Ok(Box::new(match snapshot {
            Some(snapshot) => Engine::restore(snapshot, rng, target, evaluator, params)?,
            None => Engine::new(rng, target, evaluator, params)?,
        })),
    }
}

/// loops generations until `stop` is raised, reporting each one to the
/// sinks and snapshotting on every improvement. the stop flag is only
/// checked between generations.
pub fn run(
    evolver: &mut dyn Evolver,
    sinks: &mut [Box<dyn ProgressSink>],
    store: &dyn StateStore,
    stop: &AtomicBool,
) -> Result<(), EngineError> {
    while !stop.load(Ordering::Relaxed) && !evolver.stopping_condition_met() {
        let improved = evolver.iterate()?;
        if improved {
            // losing a snapshot is not worth killing the run over
            if let Err(e) = store.save(&evolver.snapshot()) {
                log::warn!("snapshot save failed: {e}");
            }
        }
        let best = evolver.best();
        let canvas = best.rendered()?;
        let report = GenerationReport {
            generation: evolver.generation(),
            status: evolver.status(),
            best_fitness: best.fitness()?,
            best_canvas: canvas.as_ref(),
            improved,
        };
        for sink in sinks.iter_mut() {
            sink.report(&report)?;
        }
    }
    Ok(())
}

/// the generational GA variant: owns the population plus the run's
/// counters, elapsed time, and status line
pub struct Engine {
    population: Population,
    params: Arc<EvolveParams>,
    generation: u64,
    time_spent: Duration,
    best_fitness: Option<u64>,
    generations_since_improvement: u64,
    status: String,
}

impl Engine {
    pub fn new(
        rng: Pcg32,
        target: Arc<TargetImage>,
        evaluator: Arc<Evaluator>,
        params: Arc<EvolveParams>,
    ) -> Result<Self, EngineError> {
        let population = Population::random(rng, target, evaluator, Arc::clone(&params))?;
        Ok(Self {
            population,
            params,
            generation: 0,
            time_spent: Duration::ZERO,
            best_fitness: None,
            generations_since_improvement: 0,
            status: String::new(),
        })
    }

    /// resumes a run from a snapshot. the snapshot's genomes are re-evaluated
    /// from scratch against the current target; the active configuration wins
    /// over the one stored in the snapshot, except for the layout fields that
    /// must match the stored genomes.
    pub fn restore(
        snapshot: Snapshot,
        rng: Pcg32,
        target: Arc<TargetImage>,
        evaluator: Arc<Evaluator>,
        params: Arc<EvolveParams>,
    ) -> Result<Self, EngineError> {
        if snapshot.genomes.len() != params.population_size {
            return Err(SnapshotError::Incompatible(format!(
                "snapshot holds {} genomes but populationSize is {}",
                snapshot.genomes.len(),
                params.population_size
            ))
            .into());
        }
        if let Some(genome) = snapshot.genomes.first() {
            if genome.genes.len() != params.polygon_count {
                return Err(SnapshotError::Incompatible(format!(
                    "snapshot genomes hold {} polygons but polygonCount is {}",
                    genome.genes.len(),
                    params.polygon_count
                ))
                .into());
            }
            if genome.width != target.width || genome.height != target.height {
                return Err(SnapshotError::Incompatible(format!(
                    "snapshot genomes are {}x{} but the target is {}x{}",
                    genome.width, genome.height, target.width, target.height
                ))
                .into());
            }
        }
        let population = Population::from_genomes(
            rng,
            snapshot.genomes,
            target,
            evaluator,
            Arc::clone(&params),
        )?;
        Ok(Self {
            population,
            params,
            generation: snapshot.generation,
            time_spent: Duration::from_millis(snapshot.time_spent_ms),
            best_fitness: snapshot.best_fitness,
            generations_since_improvement: snapshot.generations_since_improvement,
            status: String::new(),
        })
    }
}

impl Evolver for Engine {
    fn iterate(&mut self) -> Result<bool, EngineError> {
        profiling::scope!("Engine::iterate");
        let started = Instant::now();
        self.population.step()?;

        // the sort already resolved every member, so this never blocks
        let best = self.population.best().fitness()?;
        let mut improvement = 0u64;
        let improved = match self.best_fitness {
            Some(previous) if best < previous => {
                improvement = previous - best;
                true
            }
            None => true,
            _ => false,
        };
        if improved {
            self.best_fitness = Some(best);
            self.generations_since_improvement = 0;
        }
        // unconditional, so an improving generation reports "Last change: 1"
        self.generations_since_improvement += 1;
        self.generation += 1;
        self.time_spent += started.elapsed();
        self.status = format!(
            "Generation: {} Last change: {} Best: {} Time: {:.1}sec",
            self.generation,
            self.generations_since_improvement,
            best,
            self.time_spent.as_secs_f64(),
        );
        if improvement > 0 {
            self.status.push_str(&format!(" (improvement: {improvement})"));
        }
        log::debug!("{}", self.status);
        Ok(improved)
    }

    fn stopping_condition_met(&self) -> bool {
        false
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            version: SNAPSHOT_VERSION,
            params: (*self.params).clone(),
            generation: self.generation,
            time_spent_ms: self.time_spent.as_millis() as u64,
            best_fitness: self.best_fitness,
            generations_since_improvement: self.generations_since_improvement,
            genomes: self.population.genomes(),
        }
    }

    fn best(&self) -> &Individual {
        self.population.best()
    }

    fn generation(&self) -> u64 {
        self.generation
    }

    fn status(&self) -> &str {
        &self.status
    }
}
