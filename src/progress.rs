use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use thiserror::Error;

use crate::render::Canvas;

#[derive(Debug, Error)]
pub enum ProgressError {
    #[error("progress io failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not encode best image: {0}")]
    Image(#[from] image::ImageError),
}

/// per-generation summary handed to every sink
pub struct GenerationReport<'a> {
    pub generation: u64,
    pub status: &'a str,
    pub best_fitness: u64,
    pub best_canvas: &'a Canvas,
    /// true when this generation produced a new all-time best
    pub improved: bool,
}

pub trait ProgressSink {
    fn report(&mut self, report: &GenerationReport<'_>) -> Result<(), ProgressError>;
}

/// appends one `generation,fitness` row per generation
pub struct CsvProgressLog {
    file: File,
}

impl CsvProgressLog {
    pub fn create(path: impl Into<PathBuf>) -> Result<Self, ProgressError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.into())?;
        if file.metadata()?.len() == 0 {
            writeln!(file, "generation,fitness")?;
        }
        Ok(Self { file })
    }
}

impl ProgressSink for CsvProgressLog {
    fn report(&mut self, report: &GenerationReport<'_>) -> Result<(), ProgressError> {
        writeln!(self.file, "{},{}", report.generation, report.best_fitness)?;
        Ok(())
    }
}

/// writes the best canvas as a PNG whenever the all-time best improves
pub struct BestImageWriter {
    dir: PathBuf,
}

impl BestImageWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, ProgressError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }
}

impl ProgressSink for BestImageWriter {
    fn report(&mut self, report: &GenerationReport<'_>) -> Result<(), ProgressError> {
        if !report.improved {
            return Ok(());
        }
        profiling::scope!("BestImageWriter::report");
        let canvas = report.best_canvas;
        let img = image::RgbaImage::from_raw(canvas.width, canvas.height, canvas.rgba.clone())
            .ok_or_else(|| {
                image::ImageError::Parameter(image::error::ParameterError::from_kind(
                    image::error::ParameterErrorKind::DimensionMismatch,
                ))
            })?;
        let path = self.dir.join(format!("best-{:08}.png", report.generation));
        img.save(path)?;
        Ok(())
    }
}
