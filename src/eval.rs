/// asynchronous render/score pipeline. submission never blocks; each job
/// runs on one of two bounded worker pools and delivers its result through
/// a shareable, blocking `JobHandle`.
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};

use rayon::{ThreadPool, ThreadPoolBuilder};
use thiserror::Error;

use crate::dna::Genome;
use crate::fitness::{self, FitnessError};
use crate::render::{Canvas, CpuRenderer, RenderError};
use crate::target::TargetImage;

/// pool sizes bound peak concurrent canvas allocations regardless of
/// population size
pub const RENDER_WORKERS: usize = 5;
pub const FITNESS_WORKERS: usize = 5;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum EvalError {
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Fitness(#[from] FitnessError),
    #[error("worker job panicked")]
    WorkerPanic,
}

#[derive(Debug, Error)]
#[error("failed to build worker pool: {0}")]
pub struct PoolBuildError(#[from] rayon::ThreadPoolBuildError);

pub type RenderHandle = JobHandle<Arc<Canvas>>;
pub type FitnessHandle = JobHandle<u64>;

/// handle to an in-flight worker job. cloning shares the same underlying
/// slot, so any number of consumers may `resolve` the same job.
#[derive(Debug)]
pub struct JobHandle<T> {
    slot: Arc<Slot<T>>,
}

#[derive(Debug)]
struct Slot<T> {
    result: Mutex<Option<Result<T, EvalError>>>,
    ready: Condvar,
}

impl<T> Clone for JobHandle<T> {
    fn clone(&self) -> Self {
        Self { slot: Arc::clone(&self.slot) }
    }
}

// a poisoned lock only means some other consumer panicked after the result
// was written; the stored value is still valid
pub(crate) fn relock<'a, T>(
    lock: Result<MutexGuard<'a, T>, std::sync::PoisonError<MutexGuard<'a, T>>>,
) -> MutexGuard<'a, T> {
    match lock {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl<T: Clone> JobHandle<T> {
    fn new() -> Self {
        Self {
            slot: Arc::new(Slot {
                result: Mutex::new(None),
                ready: Condvar::new(),
            }),
        }
    }

    fn complete(&self, value: Result<T, EvalError>) {
        let mut guard = relock(self.slot.result.lock());
        *guard = Some(value);
        self.slot.ready.notify_all();
    }

    /// block until the job finishes, then return its result. a failed job
    /// (including a panicked worker) surfaces here as an `EvalError`.
    pub fn resolve(&self) -> Result<T, EvalError> {
        profiling::scope!("JobHandle::resolve");
        let mut guard = relock(self.slot.result.lock());
        loop {
            if let Some(result) = guard.as_ref() {
                return result.clone();
            }
            guard = relock(self.slot.ready.wait(guard));
        }
    }
}

/// two independent bounded pools: one rasterizes genomes, one scores the
/// rendered canvases against the target. a fitness job blocks on its
/// paired render handle inside the fitness pool, which can never starve
/// the render pool since the pools share no threads.
pub struct Evaluator {
    render_pool: ThreadPool,
    fitness_pool: ThreadPool,
    antialias: bool,
}

impl Evaluator {
    pub fn new(antialias: bool) -> Result<Self, PoolBuildError> {
        let render_pool = ThreadPoolBuilder::new()
            .num_threads(RENDER_WORKERS)
            .thread_name(|i| format!("render-{i}"))
            .build()?;
        let fitness_pool = ThreadPoolBuilder::new()
            .num_threads(FITNESS_WORKERS)
            .thread_name(|i| format!("fitness-{i}"))
            .build()?;
        Ok(Self {
            render_pool,
            fitness_pool,
            antialias,
        })
    }

    /// queue a rasterization of the given genome; returns immediately.
    /// the genome copy is private to the job.
    pub fn submit_render(&self, genome: Genome) -> RenderHandle {
        let handle = JobHandle::new();
        let slot = handle.clone();
        let antialias = self.antialias;
        self.render_pool.spawn(move || {
            profiling::scope!("render_job");
            let result = catch_unwind(AssertUnwindSafe(|| {
                CpuRenderer::render(&genome, antialias)
                    .map(Arc::new)
                    .map_err(EvalError::from)
            }))
            .unwrap_or(Err(EvalError::WorkerPanic));
            slot.complete(result);
        });
        handle
    }

    /// queue a fitness evaluation of a render against the shared target;
    /// returns immediately. the worker waits for the render itself, so the
    /// score is never computed from a stale or partial canvas.
    pub fn submit_fitness(
        &self,
        target: Arc<TargetImage>,
        render: RenderHandle,
    ) -> FitnessHandle {
        let handle = JobHandle::new();
        let slot = handle.clone();
        self.fitness_pool.spawn(move || {
            profiling::scope!("fitness_job");
            let result = catch_unwind(AssertUnwindSafe(|| {
                let canvas = render.resolve()?;
                fitness::score(&target, &canvas).map_err(EvalError::from)
            }))
            .unwrap_or(Err(EvalError::WorkerPanic));
            slot.complete(result);
        });
        handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dna::{Color, Gene, Point, Polygon};

    fn solid_genome(w: u32, h: u32, color: Color) -> Genome {
        Genome {
            width: w,
            height: h,
            genes: vec![Gene {
                poly: Polygon {
                    points: vec![
                        Point { x: 0, y: 0 },
                        Point { x: w as i32, y: 0 },
                        Point { x: w as i32, y: h as i32 },
                        Point { x: 0, y: h as i32 },
                    ],
                },
                color,
            }],
        }
    }

    fn white_target(w: u32, h: u32) -> Arc<TargetImage> {
        Arc::new(TargetImage::from_rgba(w, h, vec![255; (w * h * 4) as usize]))
    }

    #[test]
    fn render_then_resolve() {
        let eval = Evaluator::new(false).unwrap();
        let genome = solid_genome(4, 4, Color { r: 9, g: 8, b: 7, a: 255 });
        let canvas = eval.submit_render(genome).resolve().unwrap();
        assert_eq!(canvas.rgb(2, 2), (9, 8, 7));
    }

    #[test]
    fn fitness_chains_on_render() {
        let eval = Evaluator::new(false).unwrap();
        // white polygon over white target: perfect score
        let genome = solid_genome(4, 4, Color { r: 255, g: 255, b: 255, a: 255 });
        let render = eval.submit_render(genome);
        let fitness = eval.submit_fitness(white_target(4, 4), render);
        assert_eq!(fitness.resolve().unwrap(), 0);
    }

    #[test]
    fn handle_is_shareable() {
        let eval = Evaluator::new(false).unwrap();
        let render = eval.submit_render(solid_genome(4, 4, Color { r: 1, g: 2, b: 3, a: 255 }));

        // the fitness job consumes a clone; the original stays resolvable
        let fitness = eval.submit_fitness(white_target(4, 4), render.clone());
        let canvas = render.resolve().unwrap();
        assert_eq!(canvas.rgb(0, 0), (1, 2, 3));
        assert!(fitness.resolve().unwrap() > 0);

        // repeated resolution returns the memoized result
        assert_eq!(render.resolve().unwrap(), canvas);
    }

    #[test]
    fn render_failure_propagates_through_both_handles() {
        let eval = Evaluator::new(false).unwrap();
        // zero-extent canvas cannot be allocated
        let genome = Genome { width: 0, height: 0, genes: vec![] };
        let render = eval.submit_render(genome);
        let fitness = eval.submit_fitness(white_target(4, 4), render.clone());

        assert!(matches!(render.resolve(), Err(EvalError::Render(_))));
        assert!(matches!(fitness.resolve(), Err(EvalError::Render(_))));
    }

    #[test]
    fn dimension_mismatch_surfaces_from_fitness_job() {
        let eval = Evaluator::new(false).unwrap();
        let render = eval.submit_render(solid_genome(4, 4, Color { r: 0, g: 0, b: 0, a: 255 }));
        let fitness = eval.submit_fitness(white_target(2, 2), render);
        assert!(matches!(fitness.resolve(), Err(EvalError::Fitness(_))));
    }

    #[test]
    fn many_jobs_exceeding_pool_size_all_complete() {
        let eval = Evaluator::new(false).unwrap();
        let target = white_target(8, 8);

        let handles: Vec<FitnessHandle> = (0..4 * RENDER_WORKERS)
            .map(|i| {
                let shade = (i * 8) as u8;
                let genome = solid_genome(8, 8, Color { r: shade, g: shade, b: shade, a: 255 });
                let render = eval.submit_render(genome);
                eval.submit_fitness(Arc::clone(&target), render)
            })
            .collect();

        for handle in handles {
            handle.resolve().unwrap();
        }
    }
}
