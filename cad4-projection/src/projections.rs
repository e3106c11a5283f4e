//! 闭式投影公式：国家 Lambert 网格（双标准纬线等角圆锥）与 UTM（横轴墨卡托）。
//!
//! 所有函数以度为单位输入输出经纬度，以米为单位输入输出平面坐标，
//! 平面坐标按 (N, E) 顺序给出。

use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};

/// 旋转椭球。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ellipsoid {
    pub semi_major_axis: f64,
    pub inverse_flattening: f64,
}

impl Ellipsoid {
    pub const GRS80: Ellipsoid = Ellipsoid {
        semi_major_axis: 6_378_137.0,
        inverse_flattening: 298.257_222_101,
    };

    pub const WGS84: Ellipsoid = Ellipsoid {
        semi_major_axis: 6_378_137.0,
        inverse_flattening: 298.257_223_563,
    };

    #[inline]
    pub fn flattening(&self) -> f64 {
        1.0 / self.inverse_flattening
    }

    /// 第一偏心率的平方。
    #[inline]
    pub fn eccentricity_squared(&self) -> f64 {
        let f = self.flattening();
        2.0 * f - f * f
    }
}

/// 双标准纬线 Lambert 等角圆锥投影。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LambertConformalConic {
    ellipsoid: Ellipsoid,
    central_meridian: f64,
    false_easting: f64,
    false_northing: f64,
    n: f64,
    f: f64,
    rho_origin: f64,
}

impl LambertConformalConic {
    /// 参数均以度为单位。
    pub fn new(
        ellipsoid: Ellipsoid,
        first_parallel: f64,
        second_parallel: f64,
        latitude_of_origin: f64,
        central_meridian: f64,
        false_easting: f64,
        false_northing: f64,
    ) -> Self {
        let e = ellipsoid.eccentricity_squared().sqrt();
        let phi1 = first_parallel.to_radians();
        let phi2 = second_parallel.to_radians();
        let m1 = conformal_m(phi1, e);
        let m2 = conformal_m(phi2, e);
        let t1 = conformal_t(phi1, e);
        let t2 = conformal_t(phi2, e);
        let n = (m1.ln() - m2.ln()) / (t1.ln() - t2.ln());
        let f = m1 / (n * t1.powf(n));
        let rho_origin =
            ellipsoid.semi_major_axis * f * conformal_t(latitude_of_origin.to_radians(), e).powf(n);
        Self {
            ellipsoid,
            central_meridian: central_meridian.to_radians(),
            false_easting,
            false_northing,
            n,
            f,
            rho_origin,
        }
    }

    /// 地籍局使用的 BGS2005 网格。
    pub fn bgs2005() -> Self {
        Self::new(
            Ellipsoid::GRS80,
            42.0,
            43.0 + 20.0 / 60.0,
            42.667_875_683_333_33,
            25.5,
            500_000.0,
            4_725_824.3591,
        )
    }

    pub fn forward(&self, latitude: f64, longitude: f64) -> (f64, f64) {
        let e = self.ellipsoid.eccentricity_squared().sqrt();
        let phi = latitude.to_radians();
        let rho = self.ellipsoid.semi_major_axis * self.f * conformal_t(phi, e).powf(self.n);
        let theta = self.n * (longitude.to_radians() - self.central_meridian);
        let northing = self.false_northing + self.rho_origin - rho * theta.cos();
        let easting = self.false_easting + rho * theta.sin();
        (northing, easting)
    }

    pub fn inverse(&self, northing: f64, easting: f64) -> (f64, f64) {
        let e = self.ellipsoid.eccentricity_squared().sqrt();
        let dx = easting - self.false_easting;
        let dy = self.rho_origin - (northing - self.false_northing);
        let rho = (dx * dx + dy * dy).sqrt().copysign(self.n);
        let t = (rho / (self.ellipsoid.semi_major_axis * self.f)).powf(1.0 / self.n);
        let theta = if self.n > 0.0 {
            dx.atan2(dy)
        } else {
            (-dx).atan2(-dy)
        };
        let longitude = theta / self.n + self.central_meridian;

        let mut phi = FRAC_PI_2 - 2.0 * t.atan();
        for _ in 0..15 {
            let es = e * phi.sin();
            let next = FRAC_PI_2 - 2.0 * (t * ((1.0 - es) / (1.0 + es)).powf(e / 2.0)).atan();
            let converged = (next - phi).abs() < 1e-14;
            phi = next;
            if converged {
                break;
            }
        }
        (phi.to_degrees(), longitude.to_degrees())
    }
}

fn conformal_m(phi: f64, e: f64) -> f64 {
    let es = e * phi.sin();
    phi.cos() / (1.0 - es * es).sqrt()
}

fn conformal_t(phi: f64, e: f64) -> f64 {
    let es = e * phi.sin();
    (FRAC_PI_4 - phi / 2.0).tan() / ((1.0 - es) / (1.0 + es)).powf(e / 2.0)
}

/// 北半球 UTM 分带投影（Snyder 级数展开）。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransverseMercator {
    ellipsoid: Ellipsoid,
    central_meridian: f64,
    scale_factor: f64,
    false_easting: f64,
}

impl TransverseMercator {
    pub fn utm(zone: u8) -> Self {
        Self {
            ellipsoid: Ellipsoid::WGS84,
            central_meridian: (f64::from(zone) * 6.0 - 183.0).to_radians(),
            scale_factor: 0.9996,
            false_easting: 500_000.0,
        }
    }

    fn meridian_arc(&self, phi: f64) -> f64 {
        let e2 = self.ellipsoid.eccentricity_squared();
        let e4 = e2 * e2;
        let e6 = e4 * e2;
        self.ellipsoid.semi_major_axis
            * ((1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * phi
                - (3.0 * e2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * phi).sin()
                + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * phi).sin()
                - (35.0 * e6 / 3072.0) * (6.0 * phi).sin())
    }

    pub fn forward(&self, latitude: f64, longitude: f64) -> (f64, f64) {
        let a = self.ellipsoid.semi_major_axis;
        let e2 = self.ellipsoid.eccentricity_squared();
        let ep2 = e2 / (1.0 - e2);
        let k0 = self.scale_factor;

        let phi = latitude.to_radians();
        let (sin_phi, cos_phi) = phi.sin_cos();
        let nu = a / (1.0 - e2 * sin_phi * sin_phi).sqrt();
        let t = phi.tan().powi(2);
        let c = ep2 * cos_phi * cos_phi;
        let big_a = (longitude.to_radians() - self.central_meridian) * cos_phi;
        let m = self.meridian_arc(phi);

        let x = k0
            * nu
            * (big_a
                + (1.0 - t + c) * big_a.powi(3) / 6.0
                + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * ep2) * big_a.powi(5) / 120.0);
        let y = k0
            * (m + nu
                * phi.tan()
                * (big_a * big_a / 2.0
                    + (5.0 - t + 9.0 * c + 4.0 * c * c) * big_a.powi(4) / 24.0
                    + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * ep2) * big_a.powi(6)
                        / 720.0));
        (y, self.false_easting + x)
    }

    pub fn inverse(&self, northing: f64, easting: f64) -> (f64, f64) {
        let a = self.ellipsoid.semi_major_axis;
        let e2 = self.ellipsoid.eccentricity_squared();
        let e4 = e2 * e2;
        let e6 = e4 * e2;
        let ep2 = e2 / (1.0 - e2);
        let k0 = self.scale_factor;

        let x = easting - self.false_easting;
        let m = northing / k0;
        let mu = m / (a * (1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0));
        let e1 = (1.0 - (1.0 - e2).sqrt()) / (1.0 + (1.0 - e2).sqrt());
        let phi1 = mu
            + (3.0 * e1 / 2.0 - 27.0 * e1.powi(3) / 32.0) * (2.0 * mu).sin()
            + (21.0 * e1 * e1 / 16.0 - 55.0 * e1.powi(4) / 32.0) * (4.0 * mu).sin()
            + (151.0 * e1.powi(3) / 96.0) * (6.0 * mu).sin()
            + (1097.0 * e1.powi(4) / 512.0) * (8.0 * mu).sin();

        let (sin_phi1, cos_phi1) = phi1.sin_cos();
        let c1 = ep2 * cos_phi1 * cos_phi1;
        let t1 = phi1.tan().powi(2);
        let denominator = 1.0 - e2 * sin_phi1 * sin_phi1;
        let nu1 = a / denominator.sqrt();
        let rho1 = a * (1.0 - e2) / denominator.powf(1.5);
        let d = x / (nu1 * k0);

        let phi = phi1
            - (nu1 * phi1.tan() / rho1)
                * (d * d / 2.0
                    - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1 * c1 - 9.0 * ep2) * d.powi(4) / 24.0
                    + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1 * t1 - 252.0 * ep2 - 3.0 * c1 * c1)
                        * d.powi(6)
                        / 720.0);
        let lambda = self.central_meridian
            + (d - (1.0 + 2.0 * t1 + c1) * d.powi(3) / 6.0
                + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1 * c1 + 8.0 * ep2 + 24.0 * t1 * t1)
                    * d.powi(5)
                    / 120.0)
                / cos_phi1;
        (phi.to_degrees(), lambda.to_degrees())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn bgs2005_inverse_matches_reference_point() {
        let lcc = LambertConformalConic::bgs2005();
        let (lat, lon) = lcc.inverse(4_675_440.845, 330_568.432);
        assert_abs_diff_eq!(lat, 42.195768, epsilon = 1e-5);
        assert_abs_diff_eq!(lon, 23.448409, epsilon = 1e-5);

        let (n, e) = lcc.forward(lat, lon);
        assert_abs_diff_eq!(n, 4_675_440.845, epsilon = 1e-4);
        assert_abs_diff_eq!(e, 330_568.432, epsilon = 1e-4);
    }

    #[test]
    fn utm_forward_matches_reference_values() {
        let (n34, e34) = TransverseMercator::utm(34).forward(42.195768, 23.448409);
        assert_abs_diff_eq!(n34, 4_674_414.567, epsilon = 0.01);
        assert_abs_diff_eq!(e34, 702_154.830, epsilon = 0.01);

        let (n35, e35) = TransverseMercator::utm(35).forward(42.195768, 23.448409);
        assert_abs_diff_eq!(n35, 4_677_621.280, epsilon = 0.01);
        assert_abs_diff_eq!(e35, 206_750.321, epsilon = 0.01);
    }

    #[test]
    fn utm_inverse_round_trips() {
        let tm = TransverseMercator::utm(35);
        for (lat, lon) in [(41.5, 26.0), (43.9, 28.4), (42.195768, 23.448409)] {
            let (n, e) = tm.forward(lat, lon);
            let (lat2, lon2) = tm.inverse(n, e);
            assert_abs_diff_eq!(lat2, lat, epsilon = 1e-8);
            assert_abs_diff_eq!(lon2, lon, epsilon = 1e-8);
        }
    }
}
