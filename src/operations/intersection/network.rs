use std::fmt;
use std::time::{Duration, Instant};

use rayon::prelude::*;

use crate::error::{GeometricError, Result};
use crate::geometry::{IntersectionData, JunctionType, WallSolid};
use crate::math::Point2;

use super::classify::{classify, JunctionCandidate};
use super::resolve::Resolution;
use super::spatial_index::SpatialIndex;
use super::{apply_resolutions, IntersectionResolver};

/// Optimizations a network pass applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum NetworkOptimization {
    /// Candidate pairs came from a bounding volume hierarchy.
    SpatialIndexing,
    /// Pairwise junctions at one point were merged into cross junctions.
    JunctionGrouping,
    /// Junctions were classified and resolved on the rayon pool.
    ParallelResolution,
}

impl fmt::Display for NetworkOptimization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::SpatialIndexing => "spatial_indexing",
            Self::JunctionGrouping => "junction_grouping",
            Self::ParallelResolution => "parallel_resolution",
        })
    }
}

/// Outcome of [`IntersectionResolver::optimize_intersection_network`].
#[derive(Debug, Clone)]
pub struct NetworkReport {
    /// False only when the pass was aborted; junctions that failed to
    /// resolve are listed in `errors` and leave their walls untouched.
    pub success: bool,
    /// Fraction of wall pairs the pass did not have to test, in `[0, 1]`.
    pub performance_gain: f64,
    pub optimizations_applied: Vec<NetworkOptimization>,
    pub processing_time: Duration,
    pub intersections: Vec<IntersectionData>,
    /// Input walls with adjusted offsets and recorded junctions, in input order.
    pub walls: Vec<WallSolid>,
    pub pairs_tested: usize,
    pub total_pairs: usize,
    pub warnings: Vec<String>,
    pub errors: Vec<GeometricError>,
}

impl NetworkReport {
    #[must_use]
    pub fn applied(&self, optimization: NetworkOptimization) -> bool {
        self.optimizations_applied.contains(&optimization)
    }

    fn aborted(walls: &[WallSolid], total_pairs: usize, error: GeometricError, started: Instant) -> Self {
        tracing::warn!(%error, "network pass aborted");
        Self {
            success: false,
            performance_gain: 0.0,
            optimizations_applied: Vec::new(),
            processing_time: started.elapsed(),
            intersections: Vec::new(),
            walls: walls.to_vec(),
            pairs_tested: 0,
            total_pairs,
            warnings: Vec::new(),
            errors: vec![error.in_operation("optimize_intersection_network")],
        }
    }
}

/// Junctions to resolve, after merging pairwise candidates that share a point.
#[derive(Debug, Clone)]
enum JunctionGroup {
    Pair {
        a: usize,
        b: usize,
        candidate: JunctionCandidate,
    },
    Cross {
        members: Vec<usize>,
        point: Point2,
    },
}

/// Clusters point junctions lying within `tolerance` of each other; a
/// cluster touching three or more walls becomes one cross junction.
fn group_candidates(candidates: &[(usize, usize, JunctionCandidate)], tolerance: f64) -> Vec<JunctionGroup> {
    let mut groups = Vec::new();
    let mut clusters: Vec<(Point2, Vec<(usize, usize, JunctionCandidate)>)> = Vec::new();
    for &(a, b, candidate) in candidates {
        if candidate.junction_type == JunctionType::ParallelOverlap {
            groups.push(JunctionGroup::Pair { a, b, candidate });
            continue;
        }
        match clusters
            .iter_mut()
            .find(|(p, _)| (p - candidate.point).norm() <= tolerance)
        {
            Some((_, members)) => members.push((a, b, candidate)),
            None => clusters.push((candidate.point, vec![(a, b, candidate)])),
        }
    }

    for (point, entries) in clusters {
        let mut members: Vec<usize> = entries.iter().flat_map(|&(a, b, _)| [a, b]).collect();
        members.sort_unstable();
        members.dedup();
        if members.len() >= 3 {
            groups.push(JunctionGroup::Cross { members, point });
        } else {
            groups.extend(entries.into_iter().map(|(a, b, candidate)| JunctionGroup::Pair { a, b, candidate }));
        }
    }
    groups
}

impl IntersectionResolver {
    /// Finds and resolves every junction in a set of walls.
    ///
    /// With spatial indexing enabled, a bounding volume hierarchy over the
    /// walls' boxes is built once and only overlapping pairs are classified;
    /// otherwise every pair is. Candidate pairs beyond `max_complexity` abort
    /// the pass with `complexity_exceeded`. Junctions are independent, so
    /// they are resolved concurrently when parallel processing is enabled;
    /// adjustments are applied afterwards in input order.
    #[must_use]
    pub fn optimize_intersection_network(&self, walls: &[WallSolid], tolerance: f64) -> NetworkReport {
        let started = Instant::now();
        let _span = tracing::info_span!("optimize_intersection_network", walls = walls.len()).entered();
        let n = walls.len();
        let total_pairs = n * n.saturating_sub(1) / 2;

        if !(tolerance.is_finite() && tolerance > 0.0) {
            return NetworkReport::aborted(
                walls,
                total_pairs,
                GeometricError::invalid_parameter(format!("tolerance must be positive, got {tolerance}")),
                started,
            );
        }

        let mut optimizations = Vec::new();
        let pairs: Vec<(usize, usize)> = if self.config.optimization_enabled && self.config.spatial_indexing_enabled {
            let index = SpatialIndex::build(walls.iter().map(WallSolid::bounding_box).collect());
            tracing::debug!(depth = index.depth(), "built wall index");
            optimizations.push(NetworkOptimization::SpatialIndexing);
            index.candidate_pairs(tolerance)
        } else {
            if total_pairs > self.config.max_complexity {
                return NetworkReport::aborted(
                    walls,
                    total_pairs,
                    GeometricError::complexity_exceeded(format!(
                        "{total_pairs} wall pairs exceed the budget of {}",
                        self.config.max_complexity
                    )),
                    started,
                );
            }
            (0..n).flat_map(|i| (i + 1..n).map(move |j| (i, j))).collect()
        };
        if pairs.len() > self.config.max_complexity {
            return NetworkReport::aborted(
                walls,
                total_pairs,
                GeometricError::complexity_exceeded(format!(
                    "{} candidate pairs exceed the budget of {}",
                    pairs.len(),
                    self.config.max_complexity
                )),
                started,
            );
        }

        let parallel = self.config.enable_parallel_processing;
        let classify_pair = |&(i, j): &(usize, usize)| {
            classify(&walls[i], &walls[j], &self.config, tolerance).map(|c| c.map(|c| (i, j, c)))
        };
        let classified: Vec<Result<Option<(usize, usize, JunctionCandidate)>>> = if parallel {
            pairs.par_iter().map(classify_pair).collect()
        } else {
            pairs.iter().map(classify_pair).collect()
        };

        let mut errors = Vec::new();
        let mut candidates = Vec::new();
        for result in classified {
            match result {
                Ok(Some(c)) => candidates.push(c),
                Ok(None) => {}
                Err(e) => errors.push(e),
            }
        }

        let groups = group_candidates(&candidates, tolerance);
        if groups.iter().any(|g| matches!(g, JunctionGroup::Cross { .. })) {
            optimizations.push(NetworkOptimization::JunctionGrouping);
        }

        let solve = |group: &JunctionGroup| self.solve_group(walls, group, tolerance);
        let solved: Vec<Result<Resolution>> = if parallel {
            optimizations.push(NetworkOptimization::ParallelResolution);
            groups.par_iter().map(solve).collect()
        } else {
            groups.iter().map(solve).collect()
        };

        let mut warnings = Vec::new();
        let mut resolutions = Vec::with_capacity(solved.len());
        for result in solved {
            match result {
                Ok(r) => {
                    warnings.extend(r.warnings.iter().cloned());
                    resolutions.push(r);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "junction left unresolved");
                    errors.push(e.in_operation("optimize_intersection_network"));
                }
            }
        }

        let (updated, apply_warnings, apply_errors) = apply_resolutions(walls, &resolutions, tolerance);
        warnings.extend(apply_warnings);
        errors.extend(apply_errors);

        #[allow(clippy::cast_precision_loss)]
        let performance_gain = if total_pairs == 0 {
            0.0
        } else {
            (total_pairs - pairs.len()) as f64 / total_pairs as f64
        };

        tracing::info!(
            walls = n,
            pairs_tested = pairs.len(),
            total_pairs,
            junctions = resolutions.len(),
            failed = errors.len(),
            performance_gain,
            "intersection network resolved"
        );
        NetworkReport {
            success: !errors.iter().any(GeometricError::is_fatal),
            performance_gain,
            optimizations_applied: optimizations,
            processing_time: started.elapsed(),
            intersections: resolutions.into_iter().map(|r| r.data).collect(),
            walls: updated,
            pairs_tested: pairs.len(),
            total_pairs,
            warnings,
            errors,
        }
    }

    fn solve_group(&self, walls: &[WallSolid], group: &JunctionGroup, tolerance: f64) -> Result<Resolution> {
        match group {
            JunctionGroup::Cross { members, point } => self.solve_cross(walls, members, Some(*point), tolerance),
            JunctionGroup::Pair { a, b, candidate } => match candidate.junction_type {
                JunctionType::T => {
                    let (main, branch) = if candidate.main == Some(1) { (*b, *a) } else { (*a, *b) };
                    self.solve_t(walls, main, branch, tolerance)
                }
                JunctionType::L => self.solve_l(walls, *a, *b, tolerance),
                JunctionType::Cross => self.solve_cross(walls, &[*a, *b], Some(candidate.point), tolerance),
                JunctionType::ParallelOverlap => self.solve_overlap(walls, *a, *b, tolerance),
            },
        }
    }
}
