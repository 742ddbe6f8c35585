use thiserror::Error;
use tiny_skia as sk;

use crate::dna::{Gene, Genome};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RenderError {
    #[error("cannot allocate a {width}x{height} canvas")]
    Allocation { width: u32, height: u32 },
}

/// a rendered RGBA pixel grid. the background is opaque white and every
/// paint is source-over onto it, so the buffer's alpha is 255 everywhere
/// and premultiplied equals straight RGBA.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl Canvas {
    /// rgb triple at (x, y); alpha is deliberately not exposed here since
    /// scoring ignores it
    #[inline]
    pub fn rgb(&self, x: u32, y: u32) -> (u8, u8, u8) {
        let idx = ((y * self.width + x) * 4) as usize;
        (self.rgba[idx], self.rgba[idx + 1], self.rgba[idx + 2])
    }
}

pub struct CpuRenderer;

impl CpuRenderer {
    /// rasterize a full genome: white canvas, then every gene's polygon in
    /// index order, composited with standard alpha blending. pure function
    /// of its inputs, bit-reproducible for a fixed genome and size.
    pub fn render(genome: &Genome, antialias: bool) -> Result<Canvas, RenderError> {
        Self::render_prefix(genome, genome.genes.len(), antialias)
    }

    /// rasterize only the first `up_to` genes (clamped to the gene count)
    pub fn render_prefix(
        genome: &Genome,
        up_to: usize,
        antialias: bool,
    ) -> Result<Canvas, RenderError> {
        profiling::scope!("render_prefix");
        let (w, h) = (genome.width, genome.height);
        let mut pix = sk::Pixmap::new(w, h).ok_or(RenderError::Allocation {
            width: w,
            height: h,
        })?;
        pix.fill(sk::Color::WHITE);

        for gene in genome.genes.iter().take(up_to) {
            draw_gene(&mut pix, gene, antialias);
        }

        Ok(Canvas {
            width: w,
            height: h,
            rgba: pix.take(),
        })
    }
}

fn draw_gene(pix: &mut sk::Pixmap, gene: &Gene, antialias: bool) {
    profiling::scope!("draw_gene");
    let pts = &gene.poly.points;
    if pts.is_empty() {
        return;
    }

    let mut pb = sk::PathBuilder::new();
    pb.move_to(pts[0].x as f32, pts[0].y as f32);
    for p in &pts[1..] {
        pb.line_to(p.x as f32, p.y as f32);
    }
    pb.close();
    // a fully degenerate polygon (zero extent) produces no path; it covers
    // no pixels either way
    let Some(path) = pb.finish() else {
        return;
    };

    let c = gene.color;
    let mut paint = sk::Paint::default();
    paint.set_color(sk::Color::from_rgba8(c.r, c.g, c.b, c.a));
    paint.anti_alias = antialias;

    // dormant genes (alpha 0) still run the fill; source-over with zero
    // alpha leaves every pixel untouched
    pix.fill_path(
        &path,
        &paint,
        sk::FillRule::Winding,
        sk::Transform::identity(),
        None,
    );
}
