/// run parameters for the evolutionary engine
/// loaded from a JSON settings file, with legacy property names as wire keys
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read settings file: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed settings file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid setting {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// the closed set of evolutionary algorithm variants. selection happens in
/// the settings file; each variant implements the engine's `Evolver` trait.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    /// generational GA with (mu+lambda) survivor selection
    #[default]
    Ga,
}

/// All recognized run parameters. Every field has a default, so an empty
/// settings file (or none at all) yields a usable configuration.
///
/// Wire keys keep the legacy property spelling, including the historical
/// `mutateRearrengeChance` typo, so old settings files keep working.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EvolveParams {
    /// number of individuals kept after each generation
    pub population_size: usize,
    /// genes per genome; constant for the lifetime of a run
    pub polygon_count: usize,
    /// vertices per polygon; polygons are never resized after creation
    pub poly_vertex_count: usize,

    /// per-repetition chance of the point-mutation operator
    pub mutate_modify_chance: f64,
    /// per-repetition chance of zeroing a gene's alpha
    pub mutate_dormant_chance: f64,
    /// per-repetition chance of swapping two genes
    #[serde(rename = "mutateRearrengeChance")]
    pub mutate_rearrange_chance: f64,

    /// width the target image is resized to (height follows aspect ratio)
    pub image_size: u32,
    /// write the best render to disk whenever an all-time best appears
    pub save_images: bool,
    /// which algorithm variant drives the run
    pub algorithm: Algorithm,
}

impl Default for EvolveParams {
    fn default() -> Self {
        Self {
            population_size: 100,
            polygon_count: 500,
            poly_vertex_count: 5,
            mutate_modify_chance: 0.01,
            mutate_dormant_chance: 0.005,
            mutate_rearrange_chance: 0.008,
            image_size: 300,
            save_images: true,
            algorithm: Algorithm::Ga,
        }
    }
}

impl EvolveParams {
    /// load settings from a JSON file, or return defaults if the file
    /// doesn't exist. A file that exists but doesn't parse, or that holds
    /// out-of-range values, is a startup error, never a silent fallback.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let params = match std::fs::read_to_string(path) {
            Ok(json) => serde_json::from_str::<Self>(&json)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(e) => return Err(e.into()),
        };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        fn positive(name: &'static str, value: usize) -> Result<(), ConfigError> {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    name,
                    reason: "must be at least 1".to_owned(),
                });
            }
            Ok(())
        }
        fn chance(name: &'static str, value: f64) -> Result<(), ConfigError> {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Invalid {
                    name,
                    reason: format!("{value} is outside [0, 1]"),
                });
            }
            Ok(())
        }

        positive("populationSize", self.population_size)?;
        positive("polygonCount", self.polygon_count)?;
        if self.poly_vertex_count < 3 {
            return Err(ConfigError::Invalid {
                name: "polyVertexCount",
                reason: "polygons need at least 3 vertices".to_owned(),
            });
        }
        chance("mutateModifyChance", self.mutate_modify_chance)?;
        chance("mutateDormantChance", self.mutate_dormant_chance)?;
        chance("mutateRearrengeChance", self.mutate_rearrange_chance)?;
        if self.image_size == 0 {
            return Err(ConfigError::Invalid {
                name: "imageSize",
                reason: "must be at least 1".to_owned(),
            });
        }
        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
