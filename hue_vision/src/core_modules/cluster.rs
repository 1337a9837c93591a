// THEORY:
// The ClusterEstimator answers "what color is this patch, mostly?". It partitions an
// unordered bag of color samples into k groups with k-means and reports the most
// populous group's centroid as the dominant color.
//
// The clustering itself is `kmeans_colors` over `palette::Srgb<f32>` points, with
// channels scaled to 0..1. The `Srgb` type is only a three-float container here;
// samples may be RGB, BGR or HSV bytes. This module owns the policy around it:
// 1.  **Explicit Randomness**: Seeding is the only random step. The strategy
//     (`Seeding`) and the RNG seed are both parameters. Each restart draws its own
//     seed from the estimator's `StdRng`, so a fixed seed makes every estimate
//     reproducible; no seed means OS entropy and run-to-run variation in centroid
//     positions (the winner is stable for well separated groups).
// 2.  **Restarts**: Several independent runs are made and the partition with the
//     lowest inertia (sum of squared distances to centroids) is kept.
// 3.  **Consistent Counts**: Membership is always recomputed against the final
//     centroids, so every reported count is exactly the number of samples whose
//     nearest centroid it is.
// 4.  **No Silent Shrinking**: Asking for more clusters than there are samples is an
//     `InsufficientSamples` error every time. k is never reduced behind the
//     caller's back. When the samples hold fewer distinct colors than k, each
//     distinct color is its own cluster and the rest stay empty.
// 5.  **Frame Local**: An estimator keeps its settings and RNG between calls but no
//     clustering state; every estimate starts from scratch.

use crate::core_modules::color::{Color, ColorSpace};
use crate::error::{Result, VisionError};
use kmeans_colors::{Calculate, get_kmeans};
use palette::Srgb;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use serde::{Deserialize, Serialize};

/// A single color sample, three 8-bit channels.
pub type Sample = [u8; 3];

type Point = Srgb<f32>;

const CHANNEL_SCALE: f64 = 255.0;

/// Cluster labels are bytes.
const MAX_CLUSTERS: usize = u8::MAX as usize + 1;

/// How the initial centroids are picked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Seeding {
    /// k-means++: each new centroid drawn with probability proportional to its
    /// squared distance from the centroids chosen so far.
    #[default]
    PlusPlus,
    /// k distinct samples drawn uniformly.
    Random,
}

/// Tunables for `ClusterEstimator`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EstimatorSettings {
    pub seeding: Seeding,
    /// `None` seeds the RNG from OS entropy.
    pub seed: Option<u64>,
    pub max_iterations: usize,
    /// Stop once the summed squared centroid movement of an iteration is at most
    /// this, in 8-bit channel units.
    pub tolerance: f64,
    pub restarts: usize,
}

impl Default for EstimatorSettings {
    fn default() -> Self {
        Self {
            seeding: Seeding::PlusPlus,
            seed: None,
            max_iterations: 300,
            tolerance: 1e-4,
            restarts: 3,
        }
    }
}

/// One group of samples: its mean color and how many samples it holds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorCluster {
    pub centroid: [f64; 3],
    pub count: usize,
}

impl ColorCluster {
    /// Share of `total` samples belonging to this cluster.
    pub fn fraction(&self, total: usize) -> f64 {
        if total == 0 {
            0.0
        } else {
            self.count as f64 / total as f64
        }
    }

    /// The centroid as a color in `space` (the space the samples were taken in).
    pub fn color(&self, space: ColorSpace) -> Color {
        Color::new(self.centroid.map(|c| c as f32), space)
    }
}

/// Outcome of one `ClusterEstimator::estimate` call.
#[derive(Debug, Clone, PartialEq)]
pub struct Estimate {
    /// Clusters in centroid index order.
    pub clusters: Vec<ColorCluster>,
    /// The most populous cluster (lowest index on ties).
    pub dominant: ColorCluster,
    pub dominant_index: usize,
    /// Sum of squared distances from each sample to its centroid.
    pub inertia: f64,
}

impl Estimate {
    fn from_clusters(clusters: Vec<ColorCluster>, inertia: f64) -> Self {
        let mut dominant_index = 0;
        for (index, cluster) in clusters.iter().enumerate() {
            if cluster.count > clusters[dominant_index].count {
                dominant_index = index;
            }
        }
        Self {
            dominant: clusters[dominant_index],
            dominant_index,
            clusters,
            inertia,
        }
    }

    /// Number of samples that were clustered.
    pub fn samples(&self) -> usize {
        self.clusters.iter().map(|c| c.count).sum()
    }

    /// Share of the samples held by the dominant cluster.
    pub fn dominant_fraction(&self) -> f64 {
        self.dominant.fraction(self.samples())
    }
}

/// k-means color clustering with explicit seeding.
pub struct ClusterEstimator {
    settings: EstimatorSettings,
    rng: StdRng,
}

impl ClusterEstimator {
    pub fn new(settings: EstimatorSettings) -> Self {
        let rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { settings, rng }
    }

    /// Estimator with default settings and a fixed seed.
    pub fn seeded(seed: u64) -> Self {
        Self::new(EstimatorSettings {
            seed: Some(seed),
            ..EstimatorSettings::default()
        })
    }

    pub fn settings(&self) -> &EstimatorSettings {
        &self.settings
    }

    /// Partitions `samples` into `k` clusters and picks the dominant one.
    pub fn estimate(&mut self, samples: &[Sample], k: usize) -> Result<Estimate> {
        if k == 0 || k > MAX_CLUSTERS {
            return Err(VisionError::invalid_parameter("clusters", k));
        }
        if samples.len() < k {
            return Err(VisionError::InsufficientSamples {
                samples: samples.len(),
                clusters: k,
            });
        }

        let distinct = distinct_colors(samples, k);
        if distinct.len() < k {
            return Ok(partition_distinct(samples, &distinct, k));
        }

        let points: Vec<Point> = samples.iter().map(|&s| to_point(s)).collect();
        let converge = (self.settings.tolerance / (CHANNEL_SCALE * CHANNEL_SCALE)) as f32;
        let max_iterations = self.settings.max_iterations.max(1);

        let mut best: Option<Estimate> = None;
        for _ in 0..self.settings.restarts.max(1) {
            let run_seed = self.rng.next_u64();
            let centroids = match self.settings.seeding {
                Seeding::PlusPlus => {
                    get_kmeans(k, max_iterations, converge, false, &points, run_seed).centroids
                }
                Seeding::Random => {
                    random_start(&points, k, max_iterations, converge, run_seed)
                }
            };
            let estimate = summarize(samples, &points, &centroids);
            if best.as_ref().is_none_or(|b| estimate.inertia < b.inertia) {
                best = Some(estimate);
            }
        }
        best.ok_or_else(|| VisionError::invalid_parameter("restarts", self.settings.restarts))
    }
}

fn to_point(sample: Sample) -> Point {
    let [a, b, c] = sample.map(|v| f32::from(v) / CHANNEL_SCALE as f32);
    Srgb::new(a, b, c)
}

fn from_point(point: &Point) -> [f64; 3] {
    [point.red, point.green, point.blue].map(|v| f64::from(v) * CHANNEL_SCALE)
}

#[inline]
fn distance_squared(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    (0..3).map(|i| (a[i] - b[i]).powi(2)).sum()
}

/// Up to `limit` distinct colors, in order of first appearance.
fn distinct_colors(samples: &[Sample], limit: usize) -> Vec<Sample> {
    let mut distinct: Vec<Sample> = Vec::with_capacity(limit);
    for sample in samples {
        if !distinct.contains(sample) {
            distinct.push(*sample);
            if distinct.len() == limit {
                break;
            }
        }
    }
    distinct
}

/// Exact partition of a sample set with fewer distinct colors than clusters.
fn partition_distinct(samples: &[Sample], distinct: &[Sample], k: usize) -> Estimate {
    let mut clusters: Vec<ColorCluster> = distinct
        .iter()
        .map(|color| ColorCluster {
            centroid: color.map(f64::from),
            count: 0,
        })
        .collect();
    for sample in samples {
        if let Some(index) = distinct.iter().position(|color| color == sample) {
            clusters[index].count += 1;
        }
    }
    let last = clusters[clusters.len() - 1].centroid;
    clusters.resize(
        k,
        ColorCluster {
            centroid: last,
            count: 0,
        },
    );
    Estimate::from_clusters(clusters, 0.0)
}

/// Lloyd iterations from k samples drawn uniformly without replacement.
fn random_start(
    points: &[Point],
    k: usize,
    max_iterations: usize,
    converge: f32,
    seed: u64,
) -> Vec<Point> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut centroids: Vec<Point> = rand::seq::index::sample(&mut rng, points.len(), k)
        .into_iter()
        .map(|i| points[i])
        .collect();
    let mut labels = Vec::with_capacity(points.len());
    for _ in 0..max_iterations {
        labels.clear();
        <Point as Calculate>::get_closest_centroid(points, &centroids, &mut labels);
        let previous = centroids.clone();
        <Point as Calculate>::recalculate_centroids(&mut rng, points, &mut centroids, &labels);
        if <Point as Calculate>::check_loop(&centroids, &previous) <= converge {
            break;
        }
    }
    centroids
}

/// Assigns every sample to its nearest final centroid and tallies the clusters.
fn summarize(samples: &[Sample], points: &[Point], centroids: &[Point]) -> Estimate {
    let mut labels = Vec::with_capacity(points.len());
    <Point as Calculate>::get_closest_centroid(points, centroids, &mut labels);

    let mut clusters: Vec<ColorCluster> = centroids
        .iter()
        .map(|centroid| ColorCluster {
            centroid: from_point(centroid),
            count: 0,
        })
        .collect();
    let mut inertia = 0.0;
    for (sample, &label) in samples.iter().zip(&labels) {
        let cluster = &mut clusters[usize::from(label)];
        cluster.count += 1;
        inertia += distance_squared(&sample.map(f64::from), &cluster.centroid);
    }
    Estimate::from_clusters(clusters, inertia)
}
