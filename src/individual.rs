/// one candidate solution: a genome plus lazily resolved, memoized render
/// and fitness values computed through the shared evaluator
use std::sync::{Arc, Mutex, OnceLock};

use rand::Rng;

use crate::config::EvolveParams;
use crate::dna::Genome;
use crate::eval::{EvalError, Evaluator, FitnessHandle, RenderHandle, relock};
use crate::render::Canvas;
use crate::target::TargetImage;

#[derive(Clone)]
struct Handles {
    render: RenderHandle,
    fitness: FitnessHandle,
}

/// the genome is fixed at construction; new genetic material only ever
/// enters the population as a brand-new individual produced by `mate`.
pub struct Individual {
    genome: Genome,
    target: Arc<TargetImage>,
    evaluator: Arc<Evaluator>,
    params: Arc<EvolveParams>,

    // in-flight jobs; dropped once their values land in the caches below
    pending: Mutex<Option<Handles>>,
    canvas: OnceLock<Arc<Canvas>>,
    fitness: OnceLock<u64>,
}

impl Individual {
    /// random seed individual; render and fitness jobs are submitted
    /// immediately so evaluation overlaps with further construction
    pub fn random<R: Rng>(
        rng: &mut R,
        target: Arc<TargetImage>,
        evaluator: Arc<Evaluator>,
        params: Arc<EvolveParams>,
    ) -> Self {
        let genome = Genome::random(rng, &params, target.width, target.height);
        Self::evaluated(genome, target, evaluator, params)
    }

    /// wrap an existing genome and kick off its evaluation
    pub fn evaluated(
        genome: Genome,
        target: Arc<TargetImage>,
        evaluator: Arc<Evaluator>,
        params: Arc<EvolveParams>,
    ) -> Self {
        let individual = Self::dormant(genome, target, evaluator, params);
        individual.handles();
        individual
    }

    /// wrap an existing genome without submitting any work. used for
    /// snapshot-restored individuals that lost their in-flight handles;
    /// the first fitness/render query triggers evaluation instead.
    pub fn dormant(
        genome: Genome,
        target: Arc<TargetImage>,
        evaluator: Arc<Evaluator>,
        params: Arc<EvolveParams>,
    ) -> Self {
        Self {
            genome,
            target,
            evaluator,
            params,
            pending: Mutex::new(None),
            canvas: OnceLock::new(),
            fitness: OnceLock::new(),
        }
    }

    pub fn genome(&self) -> &Genome {
        &self.genome
    }

    /// submit the render/fitness pair if nothing is in flight yet, and
    /// return clones of the handles
    fn handles(&self) -> Handles {
        let mut pending = relock(self.pending.lock());
        pending
            .get_or_insert_with(|| {
                let render = self.evaluator.submit_render(self.genome.clone());
                let fitness = self
                    .evaluator
                    .submit_fitness(Arc::clone(&self.target), render.clone());
                Handles { render, fitness }
            })
            .clone()
    }

    /// drop the in-flight handles once both values are memoized
    fn release_handles(&self) {
        if self.fitness.get().is_some() && self.canvas.get().is_some() {
            *relock(self.pending.lock()) = None;
        }
    }

    /// blocking, memoized fitness. computed at most once per individual.
    pub fn fitness(&self) -> Result<u64, EvalError> {
        if let Some(&f) = self.fitness.get() {
            return Ok(f);
        }
        let handles = self.handles();
        let f = handles.fitness.resolve()?;
        // the fitness job waited on the render, so this resolves instantly
        let canvas = handles.render.resolve()?;
        let _ = self.fitness.set(f);
        let _ = self.canvas.set(canvas);
        self.release_handles();
        Ok(f)
    }

    /// blocking, memoized rendered canvas
    pub fn rendered(&self) -> Result<Arc<Canvas>, EvalError> {
        if let Some(canvas) = self.canvas.get() {
            return Ok(Arc::clone(canvas));
        }
        let canvas = self.handles().render.resolve()?;
        let _ = self.canvas.set(Arc::clone(&canvas));
        self.release_handles();
        Ok(canvas)
    }

    /// fitness value if it has already been resolved
    pub fn fitness_if_resolved(&self) -> Option<u64> {
        self.fitness.get().copied()
    }

    /// crossover with `other`, mutate the child, and submit it for
    /// evaluation. both parents are left untouched.
    pub fn mate<R: Rng>(&self, other: &Individual, rng: &mut R) -> Individual {
        profiling::scope!("Individual::mate");
        let mut genome = self.genome.crossover(&other.genome, rng);
        genome.mutate(rng, &self.params);
        Individual::evaluated(
            genome,
            Arc::clone(&self.target),
            Arc::clone(&self.evaluator),
            Arc::clone(&self.params),
        )
    }
}
