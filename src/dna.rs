/// genome representation: fixed-length ordered sequence of (polygon, color)
/// genes. index order is paint order, so later genes cover earlier ones.
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::EvolveParams;

/// new random polygons spawn with their vertices jittered within this
/// radius of a shared seed point
const SEED_JITTER: i32 = 10;

/// integer canvas coordinate, kept inside [0, width] x [0, height]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn clamp_to(&mut self, width: u32, height: u32) {
        self.x = self.x.clamp(0, width as i32);
        self.y = self.y.clamp(0, height as i32);
    }
}

/// un-premultiplied 8-bit RGBA. alpha 0 marks the gene dormant: it keeps
/// its genome slot but contributes nothing visible.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub fn is_dormant(self) -> bool {
        self.a == 0
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Polygon {
    pub points: Vec<Point>,
}

/// one gene: a filled polygon
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gene {
    pub poly: Polygon,
    pub color: Color,
}

/// the full gene sequence plus the canvas extent it is painted on.
/// gene count and per-polygon vertex count are fixed once constructed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Genome {
    pub width: u32,
    pub height: u32,
    pub genes: Vec<Gene>,
}

/// signed offset drawn as sign * U1*U2*max. the product of two uniform
/// draws biases perturbations toward small magnitudes while still allowing
/// the occasional large jump.
fn perturbation<R: Rng>(rng: &mut R, max: f64) -> f64 {
    let delta = rng.random::<f64>() * rng.random::<f64>() * max;
    if rng.random::<bool>() { delta } else { -delta }
}

impl Genome {
    /// generate a full random genome: each gene is a polygon seeded at a
    /// random point with jittered vertices and a random fill color whose
    /// alpha may land anywhere from transparent to opaque
    pub fn random<R: Rng>(rng: &mut R, params: &EvolveParams, width: u32, height: u32) -> Self {
        profiling::scope!("Genome::random");
        let genes = (0..params.polygon_count)
            .map(|_| Gene {
                poly: random_polygon(rng, params.poly_vertex_count, width, height),
                color: Color {
                    r: rng.random(),
                    g: rng.random(),
                    b: rng.random(),
                    a: rng.random(),
                },
            })
            .collect();
        Self { width, height, genes }
    }

    /// single-point, index-aligned crossover: the child's genes [0, k) are
    /// copies of `self`'s, [k, len) copies of `other`'s at the same
    /// indices. genes are never reordered or mixed within an index.
    pub fn crossover<R: Rng>(&self, other: &Genome, rng: &mut R) -> Genome {
        profiling::scope!("Genome::crossover");
        debug_assert_eq!(self.genes.len(), other.genes.len());
        let cut = rng.random_range(0..self.genes.len());

        let mut genes = Vec::with_capacity(self.genes.len());
        genes.extend_from_slice(&self.genes[..cut]);
        genes.extend_from_slice(&other.genes[cut..]);

        Genome {
            width: self.width,
            height: self.height,
            genes,
        }
    }

    /// apply the three mutation operators in fixed order. each repeats a
    /// geometrically distributed number of times with its configured
    /// per-repetition chance.
    pub fn mutate<R: Rng>(&mut self, rng: &mut R, params: &EvolveParams) {
        profiling::scope!("Genome::mutate");
        self.mutate_dormant(rng, params.mutate_dormant_chance);
        self.mutate_rearrange(rng, params.mutate_rearrange_chance);
        self.mutate_modify(rng, params.mutate_modify_chance);
    }

    /// zero a random gene's alpha, making it invisible without removing it
    fn mutate_dormant<R: Rng>(&mut self, rng: &mut R, chance: f64) {
        while rng.random::<f64>() < chance {
            let which = rng.random_range(0..self.genes.len());
            self.genes[which].color.a = 0;
        }
    }

    /// swap the full (polygon, color) contents of two gene slots, changing
    /// their paint order
    fn mutate_rearrange<R: Rng>(&mut self, rng: &mut R, chance: f64) {
        let n = self.genes.len();
        while rng.random::<f64>() < chance {
            let a = rng.random_range(0..n);
            let b = (a + rng.random_range(0..n)) % n;
            self.genes.swap(a, b);
        }
    }

    /// perturb one random component of one random gene: either a single
    /// vertex coordinate, or the gene's color as a whole
    fn mutate_modify<R: Rng>(&mut self, rng: &mut R, chance: f64) {
        while rng.random::<f64>() < chance {
            let width = self.width;
            let height = self.height;
            let idx = rng.random_range(0..self.genes.len());
            let gene = &mut self.genes[idx];
            let coords = gene.poly.points.len() * 2;

            // components 0..coords address vertex x/y pairs; the final
            // component is the color
            let component = rng.random_range(0..=coords);
            if component < coords {
                let point = &mut gene.poly.points[component / 2];
                if component % 2 == 0 {
                    point.x += perturbation(rng, width as f64) as i32;
                } else {
                    point.y += perturbation(rng, height as f64) as i32;
                }
                point.clamp_to(width, height);
            } else {
                let c = &mut gene.color;
                for channel in [&mut c.r, &mut c.g, &mut c.b, &mut c.a] {
                    let v = *channel as f64 + perturbation(rng, 255.0);
                    *channel = v.clamp(0.0, 255.0) as u8;
                }
            }
        }
    }

    /// true if every coordinate lies inside the canvas extent
    pub fn in_bounds(&self) -> bool {
        self.genes.iter().all(|g| {
            g.poly.points.iter().all(|p| {
                (0..=self.width as i32).contains(&p.x) && (0..=self.height as i32).contains(&p.y)
            })
        })
    }
}

fn random_polygon<R: Rng>(rng: &mut R, vertex_count: usize, width: u32, height: u32) -> Polygon {
    let seed = Point {
        x: rng.random_range(0..width as i32),
        y: rng.random_range(0..height as i32),
    };
    let points = (0..vertex_count)
        .map(|_| {
            let mut p = Point {
                x: seed.x + rng.random_range(-SEED_JITTER..=SEED_JITTER),
                y: seed.y + rng.random_range(-SEED_JITTER..=SEED_JITTER),
            };
            p.clamp_to(width, height);
            p
        })
        .collect();
    Polygon { points }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    fn small_params() -> EvolveParams {
        EvolveParams {
            polygon_count: 12,
            poly_vertex_count: 4,
            ..EvolveParams::default()
        }
    }

    #[test]
    fn random_genome_has_fixed_shape() {
        let mut rng = Pcg32::seed_from_u64(1);
        let params = small_params();
        let g = Genome::random(&mut rng, &params, 64, 48);
        assert_eq!(g.genes.len(), 12);
        assert!(g.genes.iter().all(|gene| gene.poly.points.len() == 4));
        assert!(g.in_bounds());
    }

    #[test]
    fn random_vertices_stay_near_seed() {
        let mut rng = Pcg32::seed_from_u64(7);
        let poly = random_polygon(&mut rng, 5, 200, 200);
        for a in &poly.points {
            for b in &poly.points {
                // any two vertices share a seed, so they are at most one
                // jitter diameter apart on each axis
                assert!((a.x - b.x).abs() <= 2 * SEED_JITTER);
                assert!((a.y - b.y).abs() <= 2 * SEED_JITTER);
            }
        }
    }

    #[test]
    fn crossover_is_index_aligned() {
        let params = small_params();
        let mut rng = Pcg32::seed_from_u64(2);
        let a = Genome::random(&mut rng, &params, 64, 48);
        let b = Genome::random(&mut rng, &params, 64, 48);

        // every gene of the child comes verbatim from one parent at the
        // same index, with an A-prefix and a B-suffix
        for seed in 0..32 {
            let mut rng = Pcg32::seed_from_u64(seed);
            let child = a.crossover(&b, &mut rng);
            assert_eq!(child.genes.len(), a.genes.len());

            let mut cut = child.genes.len();
            for (i, gene) in child.genes.iter().enumerate() {
                if *gene != a.genes[i] {
                    cut = i;
                    break;
                }
            }
            for (i, gene) in child.genes.iter().enumerate() {
                if i < cut {
                    assert_eq!(*gene, a.genes[i]);
                } else {
                    assert_eq!(*gene, b.genes[i]);
                }
            }
        }
    }

    #[test]
    fn mutation_respects_bounds() {
        let params = EvolveParams {
            polygon_count: 8,
            poly_vertex_count: 5,
            mutate_modify_chance: 0.9,
            mutate_dormant_chance: 0.5,
            mutate_rearrange_chance: 0.5,
            ..EvolveParams::default()
        };
        let mut rng = Pcg32::seed_from_u64(3);
        let mut g = Genome::random(&mut rng, &params, 40, 30);
        for _ in 0..200 {
            g.mutate(&mut rng, &params);
            assert!(g.in_bounds());
            assert_eq!(g.genes.len(), 8);
            assert!(g.genes.iter().all(|gene| gene.poly.points.len() == 5));
        }
    }

    #[test]
    fn point_mutation_reaches_both_component_kinds() {
        let params = small_params();
        let mut rng = Pcg32::seed_from_u64(8);
        let mut g = Genome::random(&mut rng, &params, 64, 48);
        let before = g.clone();

        let mut saw_vertex_change = false;
        let mut saw_color_change = false;
        for _ in 0..500 {
            g.mutate_modify(&mut rng, 0.95);
            assert!(g.in_bounds());
            for (old, new) in before.genes.iter().zip(&g.genes) {
                if old.poly != new.poly {
                    saw_vertex_change = true;
                }
                if old.color != new.color {
                    saw_color_change = true;
                }
            }
        }
        assert!(saw_vertex_change);
        assert!(saw_color_change);
    }

    #[test]
    fn dormancy_only_zeroes_alpha() {
        let params = small_params();
        let mut rng = Pcg32::seed_from_u64(4);
        let mut g = Genome::random(&mut rng, &params, 64, 48);
        let before = g.clone();

        // force a high dormancy rate and nothing else
        g.mutate_dormant(&mut rng, 0.8);

        for (old, new) in before.genes.iter().zip(&g.genes) {
            assert_eq!(old.poly, new.poly);
            if new.color != old.color {
                assert!(new.color.is_dormant());
                assert_eq!(
                    (old.color.r, old.color.g, old.color.b),
                    (new.color.r, new.color.g, new.color.b)
                );
            }
        }
    }

    #[test]
    fn rearrange_preserves_gene_multiset() {
        let params = small_params();
        let mut rng = Pcg32::seed_from_u64(5);
        let mut g = Genome::random(&mut rng, &params, 64, 48);
        let before = g.clone();
        g.mutate_rearrange(&mut rng, 0.9);

        let mut sorted_before: Vec<String> =
            before.genes.iter().map(|x| format!("{x:?}")).collect();
        let mut sorted_after: Vec<String> = g.genes.iter().map(|x| format!("{x:?}")).collect();
        sorted_before.sort();
        sorted_after.sort();
        assert_eq!(sorted_before, sorted_after);
    }

    #[test]
    fn perturbation_magnitude_bounded() {
        let mut rng = Pcg32::seed_from_u64(6);
        for _ in 0..1000 {
            let d = perturbation(&mut rng, 100.0);
            assert!(d.abs() < 100.0);
        }
    }
}
