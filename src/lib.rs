//! Evolves an ordered stack of semi-transparent polygons toward a target
//! image with a generational genetic algorithm: crossover plus three
//! mutation operators, (mu + lambda) survivor selection, lazy memoized
//! rendering and scoring on dedicated worker pools.

pub mod config;
pub mod dna;
pub mod engine;
pub mod eval;
pub mod fitness;
pub mod individual;
pub mod persist;
pub mod population;
pub mod progress;
pub mod render;
pub mod target;
