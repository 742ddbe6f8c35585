/// fixed-size, fitness-sorted collection of individuals with (mu+lambda)
/// survivor selection: every generation each member produces one offspring,
/// then parents and offspring compete for the original population size.
use std::sync::Arc;

use rand::Rng;
use rand_pcg::Pcg32;

use crate::config::EvolveParams;
use crate::dna::Genome;
use crate::eval::{EvalError, Evaluator};
use crate::individual::Individual;
use crate::target::TargetImage;

pub struct Population {
    /// always sorted ascending by fitness; index 0 is the best member
    members: Vec<Individual>,
    rng: Pcg32,
}

/// mate index biased toward nearby ranks: `(i + floor(U1*U2*N)) mod N`.
/// with the population fitness-sorted this mildly favors mates of similar
/// fitness. self-mating is possible and allowed.
fn mate_index<R: Rng>(rng: &mut R, i: usize, n: usize) -> usize {
    let offset = (rng.random::<f64>() * rng.random::<f64>() * n as f64) as usize;
    (i + offset) % n
}

/// resolve every member's fitness (the per-generation synchronization
/// barrier) and sort ascending. the sort is stable, so equal fitness
/// values keep their relative order.
fn sort_ascending(members: Vec<Individual>) -> Result<Vec<Individual>, EvalError> {
    profiling::scope!("sort_ascending");
    let mut scored = members
        .into_iter()
        .map(|ind| Ok((ind.fitness()?, ind)))
        .collect::<Result<Vec<(u64, Individual)>, EvalError>>()?;
    scored.sort_by_key(|&(fitness, _)| fitness);
    Ok(scored.into_iter().map(|(_, ind)| ind).collect())
}

impl Population {
    /// fresh population of random individuals, evaluated and sorted once
    pub fn random(
        mut rng: Pcg32,
        target: Arc<TargetImage>,
        evaluator: Arc<Evaluator>,
        params: Arc<EvolveParams>,
    ) -> Result<Self, EvalError> {
        profiling::scope!("Population::random");
        let members = (0..params.population_size)
            .map(|_| {
                Individual::random(
                    &mut rng,
                    Arc::clone(&target),
                    Arc::clone(&evaluator),
                    Arc::clone(&params),
                )
            })
            .collect();
        Ok(Self {
            members: sort_ascending(members)?,
            rng,
        })
    }

    /// rebuild a population from snapshot genomes. the individuals lost
    /// their in-flight handles, so the initial sort re-triggers evaluation.
    pub fn from_genomes(
        rng: Pcg32,
        genomes: Vec<Genome>,
        target: Arc<TargetImage>,
        evaluator: Arc<Evaluator>,
        params: Arc<EvolveParams>,
    ) -> Result<Self, EvalError> {
        let members = genomes
            .into_iter()
            .map(|genome| {
                Individual::dormant(
                    genome,
                    Arc::clone(&target),
                    Arc::clone(&evaluator),
                    Arc::clone(&params),
                )
            })
            .collect();
        Ok(Self {
            members: sort_ascending(members)?,
            rng,
        })
    }

    /// one generation: every member mates once, offspring and parents merge
    /// into a 2N working set, and the best N survive. all render/fitness
    /// submissions happen up front; blocking is confined to the sort.
    pub fn step(&mut self) -> Result<(), EvalError> {
        profiling::scope!("Population::step");
        let n = self.members.len();

        let mut working = Vec::with_capacity(2 * n);
        for i in 0..n {
            let m = mate_index(&mut self.rng, i, n);
            working.push(self.members[i].mate(&self.members[m], &mut self.rng));
        }
        working.append(&mut self.members);

        self.members = sort_ascending(working)?;
        self.members.truncate(n);
        Ok(())
    }

    pub fn best(&self) -> &Individual {
        &self.members[0]
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// genome copies in rank order, for snapshots
    pub fn genomes(&self) -> Vec<Genome> {
        self.members.iter().map(|m| m.genome().clone()).collect()
    }
}
