use std::fmt;

use cad4_core::{CoordinateSystem, Extent, Point};
use glam::{DMat2, DVec2};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::control::ControlPointSet;
use crate::errors::ProjectionError;
use crate::projections::{LambertConformalConic, TransverseMercator};

/// 拟合仿射参数所需的最少控制点数。
pub const MIN_CONTROL_POINTS: usize = 3;

/// 六参数仿射变换，在各自重心处展开：
/// `N' = n0' + a11 (N - n0) + a12 (E - e0)`，`E' = e0' + a21 (N - n0) + a22 (E - e0)`。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AffineParameters {
    pub from: CoordinateSystem,
    pub to: CoordinateSystem,
    source_origin: DVec2,
    target_origin: DVec2,
    matrix: DMat2,
}

impl AffineParameters {
    pub fn identity(from: CoordinateSystem, to: CoordinateSystem) -> Self {
        Self {
            from,
            to,
            source_origin: DVec2::ZERO,
            target_origin: DVec2::ZERO,
            matrix: DMat2::IDENTITY,
        }
    }

    /// 最小二乘拟合。点对为 (源, 目标)，向量 x = N、y = E。
    pub fn fit(
        from: CoordinateSystem,
        to: CoordinateSystem,
        pairs: &[(DVec2, DVec2)],
    ) -> Result<Self, ProjectionError> {
        if pairs.len() < MIN_CONTROL_POINTS {
            return Err(ProjectionError::InsufficientControlPoints {
                from,
                to,
                found: pairs.len(),
                required: MIN_CONTROL_POINTS,
            });
        }

        let count = pairs.len() as f64;
        let source_origin = pairs.iter().map(|(s, _)| *s).sum::<DVec2>() / count;
        let target_origin = pairs.iter().map(|(_, t)| *t).sum::<DVec2>() / count;

        // 法方程：sum(d d^T) X = sum(d t^T)，d 与 t 为去重心后的坐标。
        let mut normal = DMat2::ZERO;
        let mut rhs = DMat2::ZERO;
        for (source, target) in pairs {
            let d = *source - source_origin;
            let t = *target - target_origin;
            normal += outer(d, d);
            rhs += outer(d, t);
        }

        let scale = normal.x_axis.x.abs() + normal.y_axis.y.abs();
        if scale <= f64::EPSILON || normal.determinant().abs() <= scale * scale * 1e-12 {
            return Err(ProjectionError::DegenerateControlPoints { from, to });
        }
        let solution = normal.inverse() * rhs;

        Ok(Self {
            from,
            to,
            source_origin,
            target_origin,
            matrix: solution.transpose(),
        })
    }

    /// 变换 (N, E)。
    pub fn apply(&self, n: f64, e: f64) -> (f64, f64) {
        let result = self.target_origin + self.matrix * (DVec2::new(n, e) - self.source_origin);
        (result.x, result.y)
    }

    pub fn is_identity(&self) -> bool {
        self.matrix == DMat2::IDENTITY && self.source_origin == self.target_origin
    }
}

fn outer(a: DVec2, b: DVec2) -> DMat2 {
    DMat2::from_cols(a * b.x, a * b.y)
}

/// 可替换的投影引擎：仿射参数计算与各闭式投影。
///
/// 返回的点保留输入点的标识与元数据，并标记为所在的中间坐标系。
pub trait ProjectionEngine: fmt::Debug + Send + Sync {
    fn affine_parameters(
        &self,
        extent: &Extent,
        from: CoordinateSystem,
        to: CoordinateSystem,
    ) -> Result<AffineParameters, ProjectionError>;

    fn apply_affine(&self, point: &Point, parameters: &AffineParameters) -> Point {
        let (n, e) = parameters.apply(point.n(), point.e());
        point
            .moved_to(n, e, point.z())
            .with_coordinate_system(parameters.to)
    }

    fn lambert_to_geographic(&self, point: &Point) -> Point;

    fn geographic_to_lambert(&self, point: &Point) -> Point;

    fn utm_to_geographic(&self, point: &Point, zone: u8) -> Point;

    fn geographic_to_utm(&self, point: &Point, zone: u8) -> Point;
}

/// 默认引擎：BGS2005 Lambert、WGS84 UTM，以及基于控制点的仿射拟合。
#[derive(Debug, Clone)]
pub struct GeodeticEngine {
    lambert: LambertConformalConic,
    control_points: ControlPointSet,
}

impl Default for GeodeticEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl GeodeticEngine {
    pub fn new() -> Self {
        Self {
            lambert: LambertConformalConic::bgs2005(),
            control_points: ControlPointSet::new(),
        }
    }

    pub fn with_control_points(mut self, control_points: ControlPointSet) -> Self {
        self.control_points = control_points;
        self
    }

    pub fn control_points(&self) -> &ControlPointSet {
        &self.control_points
    }
}

impl ProjectionEngine for GeodeticEngine {
    fn affine_parameters(
        &self,
        extent: &Extent,
        from: CoordinateSystem,
        to: CoordinateSystem,
    ) -> Result<AffineParameters, ProjectionError> {
        if from == to {
            return Ok(AffineParameters::identity(from, to));
        }
        let pairs = self.control_points.pairs(from, to, extent);
        debug!(%from, %to, control_points = pairs.len(), "fitting affine parameters");
        AffineParameters::fit(from, to, &pairs)
    }

    fn lambert_to_geographic(&self, point: &Point) -> Point {
        let (lat, lon) = self.lambert.inverse(point.n(), point.e());
        point
            .moved_to(lat, lon, point.z())
            .with_coordinate_system(CoordinateSystem::Wgs84Geographic)
    }

    fn geographic_to_lambert(&self, point: &Point) -> Point {
        let (n, e) = self.lambert.forward(point.n(), point.e());
        point
            .moved_to(n, e, point.z())
            .with_coordinate_system(CoordinateSystem::Bgs2005Kk)
    }

    fn utm_to_geographic(&self, point: &Point, zone: u8) -> Point {
        let (lat, lon) = TransverseMercator::utm(zone).inverse(point.n(), point.e());
        point
            .moved_to(lat, lon, point.z())
            .with_coordinate_system(CoordinateSystem::Wgs84Geographic)
    }

    fn geographic_to_utm(&self, point: &Point, zone: u8) -> Point {
        let (n, e) = TransverseMercator::utm(zone).forward(point.n(), point.e());
        let system = match zone {
            34 => CoordinateSystem::Utm34N,
            35 => CoordinateSystem::Utm35N,
            _ => CoordinateSystem::Unknown,
        };
        point.moved_to(n, e, point.z()).with_coordinate_system(system)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn affine_pairs() -> Vec<(DVec2, DVec2)> {
        let (sin, cos) = 0.002_f64.sin_cos();
        let scale = 0.99995;
        let mut pairs = Vec::new();
        for dn in [-10_000.0, 0.0, 10_000.0] {
            for de in [-10_000.0, 0.0, 10_000.0] {
                let source = DVec2::new(4_589_000.0 + dn, 8_505_000.0 + de);
                let target = DVec2::new(
                    4_716_000.0 + scale * (cos * dn - sin * de),
                    326_000.0 + scale * (sin * dn + cos * de),
                );
                pairs.push((source, target));
            }
        }
        pairs
    }

    #[test]
    fn fit_recovers_exact_affine() {
        let pairs = affine_pairs();
        let params = AffineParameters::fit(
            CoordinateSystem::Bgs1970K9,
            CoordinateSystem::Bgs2005Kk,
            &pairs,
        )
        .expect("well conditioned");
        for (source, target) in &pairs {
            let (n, e) = params.apply(source.x, source.y);
            assert_abs_diff_eq!(n, target.x, epsilon = 1e-4);
            assert_abs_diff_eq!(e, target.y, epsilon = 1e-4);
        }
        assert!(!params.is_identity());
    }

    #[test]
    fn fit_rejects_too_few_or_collinear_points() {
        let pairs = affine_pairs();
        let few = AffineParameters::fit(
            CoordinateSystem::Bgs1970K9,
            CoordinateSystem::Bgs2005Kk,
            &pairs[..2],
        );
        assert!(matches!(
            few,
            Err(ProjectionError::InsufficientControlPoints { found: 2, required: 3, .. })
        ));

        let line: Vec<_> = (0..4)
            .map(|i| {
                let v = DVec2::new(i as f64 * 100.0, i as f64 * 50.0);
                (v, v)
            })
            .collect();
        let collinear =
            AffineParameters::fit(CoordinateSystem::BgsSofia, CoordinateSystem::Bgs2005Kk, &line);
        assert!(matches!(
            collinear,
            Err(ProjectionError::DegenerateControlPoints { .. })
        ));
    }

    #[test]
    fn identical_systems_use_identity() {
        let engine = GeodeticEngine::new();
        let params = engine
            .affine_parameters(
                &Extent::empty(),
                CoordinateSystem::Bgs2005Kk,
                CoordinateSystem::Bgs2005Kk,
            )
            .expect("identity");
        assert!(params.is_identity());
    }

    #[test]
    fn engine_keeps_identity_and_tags_intermediate_system() {
        let engine = GeodeticEngine::new();
        let kk = Point::new(4_675_440.845, 330_568.432, 512.0)
            .with_coordinate_system(CoordinateSystem::Bgs2005Kk);
        let geo = engine.lambert_to_geographic(&kk);
        assert_eq!(geo.id(), kk.id());
        assert_eq!(geo.coordinate_system(), CoordinateSystem::Wgs84Geographic);
        assert_abs_diff_eq!(geo.z(), 512.0);

        let utm = engine.geographic_to_utm(&geo, 34);
        assert_eq!(utm.coordinate_system(), CoordinateSystem::Utm34N);
        assert_abs_diff_eq!(utm.n(), 4_674_414.567, epsilon = 0.02);
        assert_abs_diff_eq!(utm.e(), 702_154.830, epsilon = 0.02);
    }
}
