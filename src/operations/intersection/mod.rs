//! Intersection resolver: T, L, cross and parallel-overlap junctions.
//!
//! Every resolver works on a slice of walls and produces [`Resolution`]s:
//! the junction record plus the offset end points to move. Adjustments are
//! applied to the walls afterwards, so independent junctions of a plan can
//! be solved in any order.

mod arms;
mod classify;
mod network;
mod resolve;
mod spatial_index;

use std::collections::BTreeSet;

use crate::config::IntersectionConfig;
use crate::error::{GeometricError, Result};
use crate::geometry::{IntersectionData, WallSolid};
use crate::operations::tolerance::ToleranceManager;

use arms::apply_adjustments;
use resolve::Resolution;

pub use classify::JunctionCandidate;
pub use network::{NetworkOptimization, NetworkReport};
pub use spatial_index::{NodeId, SpatialIndex};

/// Outcome of resolving one junction.
///
/// `walls` holds the participating walls with adjusted offsets and the
/// junction recorded; on failure they are returned unchanged.
#[derive(Debug, Clone)]
pub struct JunctionResult {
    pub success: bool,
    pub intersection: Option<IntersectionData>,
    pub walls: Vec<WallSolid>,
    pub warnings: Vec<String>,
    pub errors: Vec<GeometricError>,
}

impl JunctionResult {
    fn failed(walls: Vec<WallSolid>, error: GeometricError, operation: &'static str) -> Self {
        tracing::warn!(%error, operation, "junction resolution failed");
        Self {
            success: false,
            intersection: None,
            walls,
            warnings: Vec::new(),
            errors: vec![error.in_operation(operation)],
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IntersectionResolver {
    config: IntersectionConfig,
    tolerances: ToleranceManager,
}

fn check_tolerance(tolerance: f64) -> Result<()> {
    if tolerance.is_finite() && tolerance > 0.0 {
        Ok(())
    } else {
        Err(GeometricError::invalid_parameter(format!(
            "tolerance must be positive, got {tolerance}"
        )))
    }
}

/// Applies resolved junctions to `walls`.
///
/// The first adjustment to a given wall end wins; later ones are dropped
/// with a warning. A wall whose moved offsets no longer form a face keeps
/// its previous geometry and the failure is reported.
fn apply_resolutions(
    walls: &[WallSolid],
    resolutions: &[Resolution],
    tolerance: f64,
) -> (Vec<WallSolid>, Vec<String>, Vec<GeometricError>) {
    let mut warnings = Vec::new();
    let mut errors = Vec::new();
    let mut per_wall = vec![Vec::new(); walls.len()];
    let mut claimed = BTreeSet::new();
    for resolution in resolutions {
        for adj in &resolution.adjustments {
            if claimed.insert((adj.wall, adj.end)) {
                per_wall[adj.wall].push(*adj);
            } else {
                let warning = format!(
                    "conflicting junctions at {:?} end of wall {}; first resolution kept",
                    adj.end,
                    walls[adj.wall].id()
                );
                tracing::warn!("{warning}");
                warnings.push(warning);
            }
        }
    }

    let mut updated: Vec<WallSolid> = walls
        .iter()
        .zip(&per_wall)
        .map(|(wall, adjustments)| {
            apply_adjustments(wall, adjustments, tolerance).unwrap_or_else(|e| {
                tracing::warn!(wall = %wall.id(), error = %e, "offset adjustment rejected");
                errors.push(e);
                wall.clone()
            })
        })
        .collect();

    for resolution in resolutions {
        for &w in &resolution.walls {
            updated[w] = updated[w].clone().with_intersection(resolution.data.clone());
        }
    }
    (updated, warnings, errors)
}

fn finish(walls: &[WallSolid], solved: Result<Resolution>, tolerance: f64, operation: &'static str) -> JunctionResult {
    let resolution = match solved {
        Ok(r) => r,
        Err(e) => return JunctionResult::failed(walls.to_vec(), e, operation),
    };
    let (updated, apply_warnings, errors) = apply_resolutions(walls, std::slice::from_ref(&resolution), tolerance);
    for w in &resolution.warnings {
        tracing::warn!(operation, "{w}");
    }
    let mut warnings = resolution.warnings;
    warnings.extend(apply_warnings);
    JunctionResult {
        success: errors.is_empty(),
        intersection: Some(resolution.data),
        walls: updated,
        warnings,
        errors: errors.into_iter().map(|e| e.in_operation(operation)).collect(),
    }
}

impl IntersectionResolver {
    #[must_use]
    pub fn new(config: IntersectionConfig, tolerances: ToleranceManager) -> Self {
        Self { config, tolerances }
    }

    #[must_use]
    pub fn config(&self) -> &IntersectionConfig {
        &self.config
    }

    /// Resolves `branch` ending on `main`.
    ///
    /// The branch end is trimmed flat against the main wall's near face. A
    /// branch meeting the main wall at less than one degree is handed to the
    /// L or parallel-overlap resolver instead.
    #[must_use]
    pub fn resolve_t_junction(&self, main: &WallSolid, branch: &WallSolid, tolerance: f64) -> JunctionResult {
        let _span = tracing::debug_span!("resolve_t_junction", main = %main.id(), branch = %branch.id()).entered();
        let walls = [main.clone(), branch.clone()];
        let solved = check_tolerance(tolerance).and_then(|()| self.solve_t(&walls, 0, 1, tolerance));
        finish(&walls, solved, tolerance, "resolve_t_junction")
    }

    /// Resolves two walls sharing an endpoint with a miter or bevel corner.
    #[must_use]
    pub fn resolve_l_junction(&self, a: &WallSolid, b: &WallSolid, tolerance: f64) -> JunctionResult {
        let _span = tracing::debug_span!("resolve_l_junction", a = %a.id(), b = %b.id()).entered();
        let walls = [a.clone(), b.clone()];
        let solved = check_tolerance(tolerance).and_then(|()| self.solve_l(&walls, 0, 1, tolerance));
        finish(&walls, solved, tolerance, "resolve_l_junction")
    }

    /// Resolves three or more walls meeting at a common point.
    #[must_use]
    pub fn resolve_cross_junction(&self, walls: &[WallSolid], tolerance: f64) -> JunctionResult {
        let _span = tracing::debug_span!("resolve_cross_junction", walls = walls.len()).entered();
        let solved = check_tolerance(tolerance).and_then(|()| {
            if walls.len() < 3 {
                return Err(GeometricError::invalid_parameter(format!(
                    "a cross junction needs at least 3 walls, got {}",
                    walls.len()
                )));
            }
            let members: Vec<usize> = (0..walls.len()).collect();
            self.solve_cross(walls, &members, None, tolerance)
        });
        finish(walls, solved, tolerance, "resolve_cross_junction")
    }

    /// Merges two parallel walls whose bands overlap.
    #[must_use]
    pub fn resolve_parallel_overlap(&self, a: &WallSolid, b: &WallSolid, tolerance: f64) -> JunctionResult {
        let _span = tracing::debug_span!("resolve_parallel_overlap", a = %a.id(), b = %b.id()).entered();
        let walls = [a.clone(), b.clone()];
        let solved = check_tolerance(tolerance).and_then(|()| self.solve_overlap(&walls, 0, 1, tolerance));
        finish(&walls, solved, tolerance, "resolve_parallel_overlap")
    }

    /// Detects how two walls meet without resolving the junction.
    ///
    /// # Errors
    ///
    /// `invalid_parameter` for a non-positive tolerance and
    /// `degenerate_geometry` when a baseline cannot be flattened.
    pub fn classify_junction(&self, a: &WallSolid, b: &WallSolid, tolerance: f64) -> Result<Option<JunctionCandidate>> {
        check_tolerance(tolerance)?;
        classify::classify(a, b, &self.config, tolerance)
    }
}
