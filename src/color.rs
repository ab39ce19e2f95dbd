use std::fmt;

use clap::ValueEnum;
use image::{Rgb, RgbImage};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Serialize, Serializer};
use tracing::debug;

/// Reported when the crop holds nothing but masked (pure black) pixels.
pub const FALLBACK_COLOR: HexColor = HexColor(Rgb([0x80, 0x80, 0x80]));

const MASK_COLOR: [u8; 3] = [0, 0, 0];
const MAX_ITERATIONS: usize = 300;
const TOLERANCE: f64 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HexColor(pub Rgb<u8>);

impl fmt::Display for HexColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Rgb([r, g, b]) = self.0;
        write!(f, "#{r:02X}{g:02X}{b:02X}")
    }
}

impl Serialize for HexColor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Which cluster of the fit is reported as the dominant color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ColorStrategy {
    /// Centroid of cluster 0, whatever its size.
    #[default]
    FirstCluster,
    /// Centroid of the cluster with the most pixels.
    LargestCluster,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClusterSettings {
    pub clusters: usize,
    pub restarts: usize,
    pub seed: u64,
    pub strategy: ColorStrategy,
}

impl Default for ClusterSettings {
    fn default() -> Self {
        Self {
            clusters: 3,
            restarts: 10,
            seed: 0,
            strategy: ColorStrategy::FirstCluster,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct KMeansFit {
    pub centroids: Vec<[f64; 3]>,
    pub counts: Vec<usize>,
    pub inertia: f64,
}

impl KMeansFit {
    fn pick(&self, strategy: ColorStrategy) -> Option<[f64; 3]> {
        let index = match strategy {
            ColorStrategy::FirstCluster => 0,
            ColorStrategy::LargestCluster => self
                .counts
                .iter()
                .enumerate()
                .fold(None, |best: Option<(usize, usize)>, (i, &c)| match best {
                    Some((_, b)) if c <= b => best,
                    _ => Some((i, c)),
                })
                .map(|(i, _)| i)?,
        };
        self.centroids.get(index).copied()
    }
}

/// Dominant color of `image`, ignoring pure black pixels.
pub fn dominant_color(image: &RgbImage, settings: &ClusterSettings) -> HexColor {
    let pixels = unmasked_pixels(image);
    if pixels.is_empty() {
        debug!("no unmasked pixels, using fallback color");
        return FALLBACK_COLOR;
    }

    let Some(fit) = kmeans(&pixels, settings.clusters, settings.restarts, settings.seed) else {
        return FALLBACK_COLOR;
    };
    debug!(counts = ?fit.counts, inertia = fit.inertia, "color clusters");

    fit.pick(settings.strategy)
        .map(centroid_to_color)
        .unwrap_or(FALLBACK_COLOR)
}

fn unmasked_pixels(image: &RgbImage) -> Vec<[f64; 3]> {
    image
        .pixels()
        .filter(|p| p.0 != MASK_COLOR)
        .map(|&Rgb([r, g, b])| [f64::from(r), f64::from(g), f64::from(b)])
        .collect()
}

/// Channels are truncated toward zero; `as` saturates out-of-range values.
fn centroid_to_color(centroid: [f64; 3]) -> HexColor {
    HexColor(Rgb(centroid.map(|c| c as u8)))
}

/// Lloyd's k-means with k-means++ seeding, run `restarts` times from one
/// seeded RNG; the fit with the lowest inertia wins. `k` is capped at the
/// number of points.
pub fn kmeans(points: &[[f64; 3]], k: usize, restarts: usize, seed: u64) -> Option<KMeansFit> {
    if points.is_empty() || k == 0 {
        return None;
    }
    let k = k.min(points.len());
    let tolerance = TOLERANCE * mean_variance(points);
    let mut rng = StdRng::seed_from_u64(seed);

    (0..restarts.max(1))
        .map(|_| {
            let centroids = kmeans_plus_plus(points, k, &mut rng);
            lloyd(points, centroids, tolerance)
        })
        .fold(None, |best: Option<KMeansFit>, fit| match best {
            Some(b) if b.inertia <= fit.inertia => Some(b),
            _ => Some(fit),
        })
}

fn kmeans_plus_plus(points: &[[f64; 3]], k: usize, rng: &mut StdRng) -> Vec<[f64; 3]> {
    let mut centroids = Vec::with_capacity(k);
    centroids.push(points[rng.gen_range(0..points.len())]);

    let mut distances: Vec<f64> = points
        .iter()
        .map(|p| squared_distance(p, &centroids[0]))
        .collect();

    while centroids.len() < k {
        let total: f64 = distances.iter().sum();
        let next = if total > 0.0 {
            let mut target = rng.gen::<f64>() * total;
            distances
                .iter()
                .position(|&d| {
                    target -= d;
                    target <= 0.0
                })
                .unwrap_or(points.len() - 1)
        } else {
            // every point already sits on a centroid
            rng.gen_range(0..points.len())
        };

        let centroid = points[next];
        for (d, p) in distances.iter_mut().zip(points) {
            *d = d.min(squared_distance(p, &centroid));
        }
        centroids.push(centroid);
    }
    centroids
}

fn lloyd(points: &[[f64; 3]], mut centroids: Vec<[f64; 3]>, tolerance: f64) -> KMeansFit {
    let k = centroids.len();
    let mut labels = vec![0usize; points.len()];

    for _ in 0..MAX_ITERATIONS {
        assign(points, &centroids, &mut labels);

        let mut sums = vec![[0.0f64; 3]; k];
        let mut counts = vec![0usize; k];
        for (p, &label) in points.iter().zip(&labels) {
            for c in 0..3 {
                sums[label][c] += p[c];
            }
            counts[label] += 1;
        }

        let mut shift = 0.0;
        for (i, centroid) in centroids.iter_mut().enumerate() {
            // empty clusters keep their previous position
            if counts[i] == 0 {
                continue;
            }
            let n = counts[i] as f64;
            let updated = sums[i].map(|s| s / n);
            shift += squared_distance(centroid, &updated);
            *centroid = updated;
        }

        if shift <= tolerance {
            break;
        }
    }

    let inertia = assign(points, &centroids, &mut labels);
    let mut counts = vec![0usize; k];
    for &label in &labels {
        counts[label] += 1;
    }

    KMeansFit {
        centroids,
        counts,
        inertia,
    }
}

/// Labels every point with its nearest centroid and returns the inertia.
fn assign(points: &[[f64; 3]], centroids: &[[f64; 3]], labels: &mut [usize]) -> f64 {
    let mut inertia = 0.0;
    for (p, label) in points.iter().zip(labels.iter_mut()) {
        let (nearest, distance) = centroids
            .iter()
            .enumerate()
            .map(|(i, c)| (i, squared_distance(p, c)))
            .fold((0, f64::INFINITY), |best, cur| if cur.1 < best.1 { cur } else { best });
        *label = nearest;
        inertia += distance;
    }
    inertia
}

fn mean_variance(points: &[[f64; 3]]) -> f64 {
    let n = points.len() as f64;
    let mut variance = 0.0;
    for c in 0..3 {
        let mean = points.iter().map(|p| p[c]).sum::<f64>() / n;
        variance += points.iter().map(|p| (p[c] - mean).powi(2)).sum::<f64>() / n;
    }
    variance / 3.0
}

fn squared_distance(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    (0..3).map(|c| (a[c] - b[c]).powi(2)).sum()
}
