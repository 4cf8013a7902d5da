#![allow(clippy::unwrap_used)]

use tracing_subscriber::EnvFilter;
use wallform::config::IntersectionConfig;
use wallform::geometry::JunctionType;
use wallform::math::Point2;
use wallform::operations::intersection::NetworkOptimization;
use wallform::operations::tolerance::ToleranceContext;
use wallform::{
    Curve, HealingEngine, IntersectionResolver, JoinType, KernelConfig, OffsetEngine, SimplificationEngine,
    ToleranceManager, Validator, WallInput, WallPipeline, WallSolid, WallType,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn baseline(coords: &[(f64, f64)]) -> Curve {
    let pts: Vec<Point2> = coords.iter().map(|&(x, y)| Point2::new(x, y)).collect();
    Curve::polyline(&pts).unwrap()
}

fn wall(coords: &[(f64, f64)], thickness: f64) -> WallSolid {
    OffsetEngine::default()
        .offset_wall(&baseline(coords), thickness, WallType::Interior, JoinType::Miter, 0.01)
        .unwrap()
}

#[test]
fn l_shaped_baseline_offsets_with_miter() {
    init_tracing();
    let line = baseline(&[(0.0, 0.0), (3000.0, 0.0), (3000.0, 2000.0)]);
    let result = OffsetEngine::default().offset_curve(&line, 75.0, JoinType::Miter, 0.01);
    assert!(result.success, "{:?}", result.errors);
    assert_eq!(result.join_type, JoinType::Miter);
    let left = result.left_offset.unwrap();
    let right = result.right_offset.unwrap();
    let mean = 0.5 * (left.length() + right.length());
    assert!((mean - line.length()).abs() < 0.01, "mean offset length {mean}");
}

#[test]
fn t_junction_thickness_warning_depends_on_mismatch() {
    init_tracing();
    let resolver = IntersectionResolver::default();

    let matched = resolver.resolve_t_junction(
        &wall(&[(0.0, 0.0), (100.0, 0.0)], 150.0),
        &wall(&[(100.0, 0.0), (100.0, 500.0)], 150.0),
        0.01,
    );
    assert!(matched.success, "{:?}", matched.errors);
    assert!(!matched.warnings.iter().any(|w| w.contains("thickness")));

    let mismatched = resolver.resolve_t_junction(
        &wall(&[(0.0, 0.0), (100.0, 0.0)], 100.0),
        &wall(&[(100.0, 0.0), (100.0, 500.0)], 400.0),
        0.01,
    );
    assert!(mismatched.success, "{:?}", mismatched.errors);
    assert!(mismatched.warnings.iter().any(|w| w.contains("thickness")));
}

#[test]
fn clean_wall_validates_with_high_score() {
    init_tracing();
    let solid = wall(&[(0.0, 0.0), (3000.0, 0.0)], 150.0);
    let result = Validator::default().validate_wall_solid(&solid);
    assert_eq!(result.metrics.self_intersection_count, 0);
    assert_eq!(result.metrics.sliver_face_count, 0);
    assert!(result.is_valid);
    assert!(result.quality_score > 0.95, "score {}", result.quality_score);
}

#[test]
fn large_network_uses_spatial_indexing() {
    init_tracing();
    let walls: Vec<WallSolid> = (0..120)
        .map(|i| {
            let (x, y) = (f64::from(i % 10) * 2500.0, f64::from(i / 10) * 2500.0);
            wall(&[(x, y), (x + 1200.0, y)], 150.0)
        })
        .collect();
    let resolver = IntersectionResolver::new(IntersectionConfig::default(), ToleranceManager::default());
    let report = resolver.optimize_intersection_network(&walls, 0.01);
    assert!(report.success, "{:?}", report.errors);
    assert!(report
        .optimizations_applied
        .iter()
        .any(|o| o.to_string() == "spatial_indexing"));
    assert!(report.applied(NetworkOptimization::SpatialIndexing));
    assert!(report.performance_gain >= 0.0);
    assert_eq!(report.walls.len(), 120);
}

#[test]
fn healing_twice_changes_nothing_the_second_time() {
    init_tracing();
    let solid = wall(&[(0.0, 0.0), (1500.0, 0.0), (3000.0, 0.0)], 200.0);
    let engine = HealingEngine::default();
    let first = engine.heal_shape(&solid, 0.02);
    assert!(first.success, "{:?}", first.errors);

    let second = engine.heal_shape(&first.healed_solid, 0.02);
    assert!(second.success);
    assert!(second.operations_applied.is_empty(), "{:?}", second.operations_applied);
    assert!((second.healed_solid.area() - first.healed_solid.area()).abs() < 1e-9);
    assert_eq!(
        second.healed_solid.healing_history().len(),
        first.healed_solid.healing_history().len()
    );
}

#[test]
fn simplified_wall_keeps_its_quality() {
    init_tracing();
    let solid = wall(&[(0.0, 0.0), (1500.0, 0.004), (3000.0, 0.0)], 200.0);
    let validator = Validator::default();
    let before = validator.validate_wall_solid(&solid);

    let simplifier = SimplificationEngine::default();
    let simplified = simplifier.simplify_wall_geometry(&solid, 0.02);
    assert!(simplified.success, "{:?}", simplified.errors);
    assert!(simplified.accuracy_preserved);

    let after = validator.validate_wall_solid(&simplified.simplified_solid);
    assert!(after.is_valid);
    let budget = simplifier.config().max_simplification_level;
    assert!(
        after.quality_score >= before.quality_score - budget,
        "{} dropped below {} - {budget}",
        after.quality_score,
        before.quality_score
    );
}

#[test]
fn tolerance_grows_with_thickness_and_angle() {
    init_tracing();
    let manager = ToleranceManager::default();
    let precision = manager.recommended_precision();
    for context in [
        ToleranceContext::VertexMerge,
        ToleranceContext::OffsetOperation,
        ToleranceContext::ShapeHealing,
        ToleranceContext::BooleanOperation,
    ] {
        let mut last = 0.0;
        for thickness in [50.0, 100.0, 200.0, 400.0, 1000.0] {
            let t = manager.calculate_tolerance(thickness, precision, 90.0, context).unwrap();
            assert!(t >= last, "{context}: {t} < {last} at thickness {thickness}");
            last = t;
        }
        let mut last = 0.0;
        for angle in [90.0, 60.0, 30.0, 10.0, 1.0] {
            let t = manager.calculate_tolerance(200.0, precision, angle, context).unwrap();
            assert!(t >= last, "{context}: {t} < {last} at angle {angle}");
            last = t;
        }
    }
}

#[test]
fn room_plan_produces_a_closed_footprint() {
    init_tracing();
    let inputs: Vec<WallInput> = [
        [(0.0, 0.0), (6000.0, 0.0)],
        [(6000.0, 0.0), (6000.0, 4000.0)],
        [(6000.0, 4000.0), (0.0, 4000.0)],
        [(0.0, 4000.0), (0.0, 0.0)],
    ]
    .iter()
    .map(|ends| WallInput::new(baseline(ends), 200.0, WallType::Exterior))
    .collect();

    let plan = WallPipeline::new(KernelConfig::default()).process_plan(&inputs);
    assert!(plan.success, "{:?}", plan.errors);
    let network = plan.network.as_ref().unwrap();
    assert_eq!(network.intersections.len(), 4);
    assert!(network.intersections.iter().all(|i| i.junction_type == JunctionType::L));

    let expected = 6200.0 * 4200.0 - 5800.0 * 3800.0;
    let walls: f64 = plan.solids().iter().map(|w| w.area()).sum();
    assert!((walls - expected).abs() < 1.0, "walls {walls} expected {expected}");
    let footprint = plan.footprint.as_ref().unwrap();
    assert!(footprint.success);
    assert!((footprint.area() - expected).abs() < 1.0, "footprint {}", footprint.area());
}

#[test]
fn scattered_plan_is_processed_in_groups() {
    init_tracing();
    let inputs: Vec<WallInput> = (0..30)
        .map(|i| {
            let (x, y) = (f64::from(i % 6) * 3000.0, f64::from(i / 6) * 3000.0);
            WallInput::new(baseline(&[(x, y), (x + 1500.0, y)]), 150.0, WallType::Partition)
        })
        .collect();
    let plan = WallPipeline::default().process_plan(&inputs);
    assert!(plan.success, "{:?}", plan.errors);
    assert_eq!(plan.walls.len(), 30);
    assert!(plan.walls.iter().all(|w| w.validation.as_ref().is_some_and(|v| v.is_valid)));
    assert_eq!(plan.footprint.as_ref().unwrap().polygons.len(), 30);
}
