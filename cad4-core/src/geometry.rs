use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Neg, Sub};
use std::str::FromStr;

use glam::{DVec2, DVec3};
use rstar::AABB;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::nomenclature;

/// 两个顶点视为重合的最大平面距离（米）。
pub const COINCIDENCE_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    #[error("polygon ring has no parts")]
    Empty,
    #[error("ring is disconnected: {remaining} part(s) do not touch ({n:.3}, {e:.3})")]
    Disconnected { remaining: usize, n: f64, e: f64 },
    #[error("ring is not closed: gap of {gap:.3} between last and first vertex")]
    NotClosed { gap: f64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown coordinate system `{0}`")]
pub struct ParseCoordinateSystemError(pub String);

/// 实体与其几何共享的稳定标识。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(Uuid);

impl EntityId {
    #[inline]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    #[inline]
    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> Uuid {
        self.0
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// 支持的坐标系。数值代码与国家测绘登记所用代码一致。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CoordinateSystem {
    #[default]
    #[serde(rename = "unknown")]
    Unknown,
    #[serde(rename = "wgs84")]
    Wgs84Geographic,
    #[serde(rename = "bgs-sofia")]
    BgsSofia,
    #[serde(rename = "bgs-1930-24")]
    Bgs1930_24,
    #[serde(rename = "bgs-1930-27")]
    Bgs1930_27,
    #[serde(rename = "bgs-1950-3-24")]
    Bgs1950_3_24,
    #[serde(rename = "bgs-1950-3-27")]
    Bgs1950_3_27,
    #[serde(rename = "bgs-1950-6-21")]
    Bgs1950_6_21,
    #[serde(rename = "bgs-1950-6-27")]
    Bgs1950_6_27,
    #[serde(rename = "bgs-1970-k3")]
    Bgs1970K3,
    #[serde(rename = "bgs-1970-k5")]
    Bgs1970K5,
    #[serde(rename = "bgs-1970-k7")]
    Bgs1970K7,
    #[serde(rename = "bgs-1970-k9")]
    Bgs1970K9,
    #[serde(rename = "bgs-2005-kk")]
    Bgs2005Kk,
    #[serde(rename = "utm34n")]
    Utm34N,
    #[serde(rename = "utm35n")]
    Utm35N,
}

const SYSTEM_TABLE: [(CoordinateSystem, i32, &str); 16] = [
    (CoordinateSystem::Unknown, -1, "unknown"),
    (CoordinateSystem::Wgs84Geographic, 4326, "wgs84"),
    (CoordinateSystem::BgsSofia, 108501, "bgs-sofia"),
    (CoordinateSystem::Bgs1930_24, 1083024, "bgs-1930-24"),
    (CoordinateSystem::Bgs1930_27, 1083027, "bgs-1930-27"),
    (CoordinateSystem::Bgs1950_3_24, 10850324, "bgs-1950-3-24"),
    (CoordinateSystem::Bgs1950_3_27, 10850327, "bgs-1950-3-27"),
    (CoordinateSystem::Bgs1950_6_21, 10850621, "bgs-1950-6-21"),
    (CoordinateSystem::Bgs1950_6_27, 10850627, "bgs-1950-6-27"),
    (CoordinateSystem::Bgs1970K3, 108703, "bgs-1970-k3"),
    (CoordinateSystem::Bgs1970K5, 108705, "bgs-1970-k5"),
    (CoordinateSystem::Bgs1970K7, 108707, "bgs-1970-k7"),
    (CoordinateSystem::Bgs1970K9, 108709, "bgs-1970-k9"),
    (CoordinateSystem::Bgs2005Kk, 7801, "bgs-2005-kk"),
    (CoordinateSystem::Utm34N, 32634, "utm34n"),
    (CoordinateSystem::Utm35N, 32635, "utm35n"),
];

impl CoordinateSystem {
    fn entry(self) -> (CoordinateSystem, i32, &'static str) {
        SYSTEM_TABLE
            .into_iter()
            .find(|(system, _, _)| *system == self)
            .unwrap_or(SYSTEM_TABLE[0])
    }

    #[inline]
    pub fn code(self) -> i32 {
        self.entry().1
    }

    #[inline]
    pub fn token(self) -> &'static str {
        self.entry().2
    }

    pub fn from_code(code: i32) -> Option<Self> {
        SYSTEM_TABLE
            .into_iter()
            .find(|(_, value, _)| *value == code)
            .map(|(system, _, _)| system)
    }

    #[inline]
    pub fn is_known(self) -> bool {
        self != CoordinateSystem::Unknown
    }

    /// 旧的高斯分带坐标系（含索非亚地方坐标系）。
    pub fn is_legacy(self) -> bool {
        matches!(
            self,
            CoordinateSystem::BgsSofia
                | CoordinateSystem::Bgs1930_24
                | CoordinateSystem::Bgs1930_27
                | CoordinateSystem::Bgs1950_3_24
                | CoordinateSystem::Bgs1950_3_27
                | CoordinateSystem::Bgs1950_6_21
                | CoordinateSystem::Bgs1950_6_27
                | CoordinateSystem::Bgs1970K3
                | CoordinateSystem::Bgs1970K5
                | CoordinateSystem::Bgs1970K7
                | CoordinateSystem::Bgs1970K9
        )
    }

    #[inline]
    pub fn is_lambert(self) -> bool {
        self == CoordinateSystem::Bgs2005Kk
    }

    #[inline]
    pub fn is_utm(self) -> bool {
        self.utm_zone().is_some()
    }

    #[inline]
    pub fn is_geographic(self) -> bool {
        self == CoordinateSystem::Wgs84Geographic
    }

    pub fn utm_zone(self) -> Option<u8> {
        match self {
            CoordinateSystem::Utm34N => Some(34),
            CoordinateSystem::Utm35N => Some(35),
            _ => None,
        }
    }
}

impl fmt::Display for CoordinateSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for CoordinateSystem {
    type Err = ParseCoordinateSystemError;

    /// 接受小写标记（如 `bgs-1970-k9`）或数值代码（如 `32635`）。
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        let lowered = raw.to_ascii_lowercase();
        if let Some((system, _, _)) = SYSTEM_TABLE
            .into_iter()
            .find(|(_, _, token)| *token == lowered)
        {
            return Ok(system);
        }
        raw.parse::<i32>()
            .ok()
            .and_then(Self::from_code)
            .ok_or_else(|| ParseCoordinateSystemError(raw.to_string()))
    }
}

/// 线顶点附带的元数据。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointInfo {
    pub number: i32,
    precision_code: i32,
    marker_code: i32,
    method_code: i32,
}

impl PointInfo {
    pub fn new(number: i32, precision_code: i32, marker_code: i32, method_code: i32) -> Self {
        Self {
            number,
            precision_code,
            marker_code,
            method_code,
        }
    }

    #[inline]
    pub fn precision_code(&self) -> i32 {
        self.precision_code
    }

    #[inline]
    pub fn marker_code(&self) -> i32 {
        self.marker_code
    }

    #[inline]
    pub fn method_code(&self) -> i32 {
        self.method_code
    }

    pub fn precision(&self) -> Option<&'static str> {
        nomenclature::point_precision(self.precision_code)
    }

    pub fn marker_type(&self) -> Option<&'static str> {
        nomenclature::point_marker_type(self.marker_code)
    }

    pub fn measurement_method(&self) -> Option<&'static str> {
        nomenclature::measurement_method(self.method_code)
    }
}

/// 轴对齐的 N/E 范围。最小值和最大值分开保存，宽度沿 E 方向，高度沿 N 方向。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    min_n: f64,
    min_e: f64,
    max_n: f64,
    max_e: f64,
}

impl Extent {
    pub fn new(min_n: f64, min_e: f64, max_n: f64, max_e: f64) -> Self {
        Self {
            min_n: min_n.min(max_n),
            min_e: min_e.min(max_e),
            max_n: min_n.max(max_n),
            max_e: min_e.max(max_e),
        }
    }

    /// 不包含任何点的范围，可作为 `include_*` 的起点。
    #[inline]
    pub fn empty() -> Self {
        Self {
            min_n: f64::INFINITY,
            min_e: f64::INFINITY,
            max_n: f64::NEG_INFINITY,
            max_e: f64::NEG_INFINITY,
        }
    }

    pub fn from_corners(a: &Point, b: &Point) -> Self {
        Self::new(a.n(), a.e(), b.n(), b.e())
    }

    #[inline]
    pub fn min_n(&self) -> f64 {
        self.min_n
    }

    #[inline]
    pub fn min_e(&self) -> f64 {
        self.min_e
    }

    #[inline]
    pub fn max_n(&self) -> f64 {
        self.max_n
    }

    #[inline]
    pub fn max_e(&self) -> f64 {
        self.max_e
    }

    #[inline]
    pub fn width(&self) -> f64 {
        self.max_e - self.min_e
    }

    #[inline]
    pub fn height(&self) -> f64 {
        self.max_n - self.min_n
    }

    /// 退化为一个点的范围同样视为空。
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width() <= 0.0 && self.height() <= 0.0
    }

    #[inline]
    pub fn is_finite(&self) -> bool {
        self.min_n.is_finite()
            && self.min_e.is_finite()
            && self.max_n.is_finite()
            && self.max_e.is_finite()
    }

    /// 四边同时向外扩展 `margin`。
    pub fn expand(&mut self, margin: f64) {
        self.min_n -= margin;
        self.min_e -= margin;
        self.max_n += margin;
        self.max_e += margin;
    }

    pub fn expanded(mut self, margin: f64) -> Self {
        self.expand(margin);
        self
    }

    pub fn include_point(&mut self, n: f64, e: f64) {
        self.min_n = self.min_n.min(n);
        self.min_e = self.min_e.min(e);
        self.max_n = self.max_n.max(n);
        self.max_e = self.max_e.max(e);
    }

    pub fn include_extent(&mut self, other: &Extent) {
        if !other.is_finite() {
            return;
        }
        self.include_point(other.min_n, other.min_e);
        self.include_point(other.max_n, other.max_e);
    }

    pub fn union(mut self, other: &Extent) -> Self {
        self.include_extent(other);
        self
    }

    /// 闭区间相交：共享边界也算相交。
    pub fn intersects(&self, other: &Extent) -> bool {
        self.min_n <= other.max_n
            && other.min_n <= self.max_n
            && self.min_e <= other.max_e
            && other.min_e <= self.max_e
    }

    pub fn contains(&self, other: &Extent) -> bool {
        self.min_n <= other.min_n
            && self.min_e <= other.min_e
            && self.max_n >= other.max_n
            && self.max_e >= other.max_e
    }

    pub fn contains_point(&self, n: f64, e: f64) -> bool {
        n >= self.min_n && n <= self.max_n && e >= self.min_e && e <= self.max_e
    }

    /// 返回 (N, E) 中心。
    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_n + self.max_n) * 0.5,
            (self.min_e + self.max_e) * 0.5,
        )
    }

    /// 西南角与东北角。
    pub fn corners(&self) -> (Point, Point) {
        (
            Point::planar(self.min_n, self.min_e),
            Point::planar(self.max_n, self.max_e),
        )
    }

    /// 转换为 R 树包络，x = E，y = N。空范围没有对应的包络。
    pub fn to_aabb(&self) -> Option<AABB<[f64; 2]>> {
        if !self.is_finite() {
            return None;
        }
        Some(AABB::from_corners(
            [self.min_e, self.min_n],
            [self.max_e, self.max_n],
        ))
    }

    pub fn from_aabb(envelope: &AABB<[f64; 2]>) -> Self {
        let lower = envelope.lower();
        let upper = envelope.upper();
        Self::new(lower[1], lower[0], upper[1], upper[0])
    }
}

impl Default for Extent {
    fn default() -> Self {
        Self::empty()
    }
}

/// 测量点：N、E、Z（地理坐标系下为纬度、经度、高程）。
///
/// 包络在构造时计算并冻结；坐标只读，改变坐标只能构造新点。
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Point {
    id: EntityId,
    position: DVec3,
    coordinate_system: CoordinateSystem,
    info: Option<PointInfo>,
    envelope: Extent,
}

impl Point {
    pub fn new(n: f64, e: f64, z: f64) -> Self {
        Self::assemble(
            DVec3::new(n, e, z),
            EntityId::new(),
            CoordinateSystem::Unknown,
            None,
        )
    }

    #[inline]
    pub fn planar(n: f64, e: f64) -> Self {
        Self::new(n, e, 0.0)
    }

    fn assemble(
        position: DVec3,
        id: EntityId,
        coordinate_system: CoordinateSystem,
        info: Option<PointInfo>,
    ) -> Self {
        Self {
            id,
            position,
            coordinate_system,
            info,
            envelope: Extent::new(position.x, position.y, position.x, position.y),
        }
    }

    /// 以新坐标构造点，保留标识、元数据和坐标系标记。
    pub fn moved_to(&self, n: f64, e: f64, z: f64) -> Self {
        Self::assemble(
            DVec3::new(n, e, z),
            self.id,
            self.coordinate_system,
            self.info,
        )
    }

    pub fn with_coordinate_system(mut self, coordinate_system: CoordinateSystem) -> Self {
        self.coordinate_system = coordinate_system;
        self
    }

    pub fn with_info(mut self, info: PointInfo) -> Self {
        self.info = Some(info);
        self
    }

    pub fn with_id(mut self, id: EntityId) -> Self {
        self.id = id;
        self
    }

    pub fn set_id(&mut self, id: EntityId) {
        self.id = id;
    }

    #[inline]
    pub fn n(&self) -> f64 {
        self.position.x
    }

    #[inline]
    pub fn e(&self) -> f64 {
        self.position.y
    }

    #[inline]
    pub fn z(&self) -> f64 {
        self.position.z
    }

    #[inline]
    pub fn id(&self) -> EntityId {
        self.id
    }

    #[inline]
    pub fn coordinate_system(&self) -> CoordinateSystem {
        self.coordinate_system
    }

    #[inline]
    pub fn info(&self) -> Option<&PointInfo> {
        self.info.as_ref()
    }

    #[inline]
    pub fn envelope(&self) -> Extent {
        self.envelope
    }

    #[inline]
    pub fn as_vec3(&self) -> DVec3 {
        self.position
    }

    /// 平面向量，x = E，y = N。
    #[inline]
    pub fn planar_vec(&self) -> DVec2 {
        DVec2::new(self.e(), self.n())
    }

    pub fn distance_to(&self, other: &Point) -> f64 {
        self.planar_vec().distance(other.planar_vec())
    }

    pub fn coincides_with(&self, other: &Point) -> bool {
        self.distance_to(other) <= COINCIDENCE_TOLERANCE
    }
}

impl PartialEq for Point {
    fn eq(&self, other: &Self) -> bool {
        self.position == other.position
    }
}

impl PartialOrd for Point {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        (self.n(), self.e(), self.z()).partial_cmp(&(other.n(), other.e(), other.z()))
    }
}

/// 平移：标识、元数据与坐标系取自右操作数（相对点）。
impl Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::assemble(
            self.position + rhs.position,
            rhs.id,
            rhs.coordinate_system,
            rhs.info,
        )
    }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::assemble(
            self.position - rhs.position,
            rhs.id,
            rhs.coordinate_system,
            rhs.info,
        )
    }
}

impl Neg for Point {
    type Output = Point;

    fn neg(self) -> Point {
        Point::assemble(-self.position, self.id, self.coordinate_system, self.info)
    }
}

/// 有序顶点序列。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Polyline {
    id: EntityId,
    vertices: Vec<Point>,
    coordinate_system: CoordinateSystem,
    envelope: Extent,
}

impl Polyline {
    pub fn new(vertices: Vec<Point>) -> Self {
        let coordinate_system = vertices
            .first()
            .map(Point::coordinate_system)
            .unwrap_or_default();
        let envelope = union_envelope(vertices.iter().map(Point::envelope));
        Self {
            id: EntityId::new(),
            vertices,
            coordinate_system,
            envelope,
        }
    }

    pub fn with_id(mut self, id: EntityId) -> Self {
        self.id = id;
        self
    }

    pub fn set_id(&mut self, id: EntityId) {
        self.id = id;
    }

    #[inline]
    pub fn id(&self) -> EntityId {
        self.id
    }

    #[inline]
    pub fn vertices(&self) -> &[Point] {
        &self.vertices
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    #[inline]
    pub fn coordinate_system(&self) -> CoordinateSystem {
        self.coordinate_system
    }

    #[inline]
    pub fn envelope(&self) -> Extent {
        self.envelope
    }

    pub fn start_point(&self) -> Option<&Point> {
        self.vertices.first()
    }

    pub fn end_point(&self) -> Option<&Point> {
        self.vertices.last()
    }

    /// 平面长度。
    pub fn length(&self) -> f64 {
        self.vertices
            .windows(2)
            .map(|pair| pair[0].distance_to(&pair[1]))
            .sum()
    }

    /// 反向副本，标识不变。
    pub fn reversed(&self) -> Self {
        let mut vertices = self.vertices.clone();
        vertices.reverse();
        Self {
            id: self.id,
            vertices,
            coordinate_system: self.coordinate_system,
            envelope: self.envelope,
        }
    }
}

/// 面：顶点环，以及（若由线拼接而来）组成它的各段线。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Polygon {
    id: EntityId,
    vertices: Vec<Point>,
    parts: Vec<Polyline>,
    coordinate_system: CoordinateSystem,
    envelope: Extent,
}

impl Polygon {
    pub fn new(vertices: Vec<Point>) -> Self {
        Self::build(vertices, Vec::new())
    }

    fn build(vertices: Vec<Point>, parts: Vec<Polyline>) -> Self {
        let coordinate_system = vertices
            .first()
            .map(Point::coordinate_system)
            .unwrap_or_default();
        let envelope = if parts.is_empty() {
            union_envelope(vertices.iter().map(Point::envelope))
        } else {
            union_envelope(parts.iter().map(Polyline::envelope))
        };
        Self {
            id: EntityId::new(),
            vertices,
            parts,
            coordinate_system,
            envelope,
        }
    }

    /// 按给定顺序直接拼接各段线的顶点，不做方向整理。
    pub fn from_parts(parts: Vec<Polyline>) -> Self {
        let vertices = parts
            .iter()
            .flat_map(|part| part.vertices().iter().copied())
            .collect();
        Self::build(vertices, parts)
    }

    /// 把无序的边界线拼成首尾相接的闭合环。
    ///
    /// 从第一段开始，每次选取第一条尚未使用、且起点或终点与当前环末端重合的线；
    /// 终点重合时将其反向。连接处的公共顶点只保留一次，环的方向沿用第一段。
    pub fn assemble(parts: Vec<Polyline>) -> Result<Self, GeometryError> {
        let mut pending: Vec<Polyline> = parts.into_iter().filter(|p| !p.is_empty()).collect();
        if pending.is_empty() {
            return Err(GeometryError::Empty);
        }

        let first = pending.remove(0);
        let mut vertices = first.vertices().to_vec();
        let mut ordered = vec![first];

        while !pending.is_empty() {
            let Some(tail) = vertices.last().copied() else {
                return Err(GeometryError::Empty);
            };
            let forward = pending
                .iter()
                .position(|p| p.start_point().is_some_and(|s| s.coincides_with(&tail)));
            let next = match forward {
                Some(index) => pending.remove(index),
                None => {
                    let backward = pending
                        .iter()
                        .position(|p| p.end_point().is_some_and(|e| e.coincides_with(&tail)));
                    match backward {
                        Some(index) => pending.remove(index).reversed(),
                        None => {
                            return Err(GeometryError::Disconnected {
                                remaining: pending.len(),
                                n: tail.n(),
                                e: tail.e(),
                            });
                        }
                    }
                }
            };
            vertices.extend(next.vertices().iter().skip(1).copied());
            ordered.push(next);
        }

        if let (Some(head), Some(tail)) = (vertices.first(), vertices.last()) {
            if !head.coincides_with(tail) {
                return Err(GeometryError::NotClosed {
                    gap: head.distance_to(tail),
                });
            }
        }

        Ok(Self::build(vertices, ordered))
    }

    pub fn with_id(mut self, id: EntityId) -> Self {
        self.id = id;
        self
    }

    pub fn set_id(&mut self, id: EntityId) {
        self.id = id;
    }

    #[inline]
    pub fn id(&self) -> EntityId {
        self.id
    }

    #[inline]
    pub fn vertices(&self) -> &[Point] {
        &self.vertices
    }

    #[inline]
    pub fn parts(&self) -> &[Polyline] {
        &self.parts
    }

    #[inline]
    pub fn coordinate_system(&self) -> CoordinateSystem {
        self.coordinate_system
    }

    #[inline]
    pub fn envelope(&self) -> Extent {
        self.envelope
    }

    pub fn is_closed(&self) -> bool {
        match (self.vertices.first(), self.vertices.last()) {
            (Some(head), Some(tail)) => self.vertices.len() > 3 && head.coincides_with(tail),
            _ => false,
        }
    }

    /// (E, N) 平面上的有向面积，逆时针为正。以首顶点为原点计算，避免大坐标的舍入误差。
    pub fn signed_area(&self) -> f64 {
        let count = self.vertices.len();
        if count < 3 {
            return 0.0;
        }
        let origin = self.vertices[0].planar_vec();
        let twice: f64 = (0..count)
            .map(|i| {
                let a = self.vertices[i].planar_vec() - origin;
                let b = self.vertices[(i + 1) % count].planar_vec() - origin;
                a.perp_dot(b)
            })
            .sum();
        twice * 0.5
    }

    #[inline]
    pub fn area(&self) -> f64 {
        self.signed_area().abs()
    }

    pub fn perimeter(&self) -> f64 {
        let open: f64 = self
            .vertices
            .windows(2)
            .map(|pair| pair[0].distance_to(&pair[1]))
            .sum();
        match (self.vertices.first(), self.vertices.last()) {
            (Some(head), Some(tail)) if !self.is_closed() => open + tail.distance_to(head),
            _ => open,
        }
    }

    #[inline]
    pub fn is_counter_clockwise(&self) -> bool {
        self.signed_area() > 0.0
    }

    /// 统一为逆时针方向；需要时同时反转各段线的顺序与方向。
    pub fn oriented_counter_clockwise(self) -> Self {
        if self.signed_area() >= 0.0 {
            return self;
        }
        let mut vertices = self.vertices;
        vertices.reverse();
        let parts = self.parts.iter().rev().map(Polyline::reversed).collect();
        Self {
            id: self.id,
            vertices,
            parts,
            coordinate_system: self.coordinate_system,
            envelope: self.envelope,
        }
    }
}

fn union_envelope(envelopes: impl Iterator<Item = Extent>) -> Extent {
    envelopes.fold(Extent::empty(), |acc, env| acc.union(&env))
}

/// 实体持有的几何。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Geometry {
    Point(Point),
    Polyline(Polyline),
    Polygon(Polygon),
}

impl Geometry {
    pub fn id(&self) -> EntityId {
        match self {
            Geometry::Point(point) => point.id(),
            Geometry::Polyline(polyline) => polyline.id(),
            Geometry::Polygon(polygon) => polygon.id(),
        }
    }

    pub fn set_id(&mut self, id: EntityId) {
        match self {
            Geometry::Point(point) => point.set_id(id),
            Geometry::Polyline(polyline) => polyline.set_id(id),
            Geometry::Polygon(polygon) => polygon.set_id(id),
        }
    }

    pub fn envelope(&self) -> Extent {
        match self {
            Geometry::Point(point) => point.envelope(),
            Geometry::Polyline(polyline) => polyline.envelope(),
            Geometry::Polygon(polygon) => polygon.envelope(),
        }
    }

    pub fn coordinate_system(&self) -> CoordinateSystem {
        match self {
            Geometry::Point(point) => point.coordinate_system(),
            Geometry::Polyline(polyline) => polyline.coordinate_system(),
            Geometry::Polygon(polygon) => polygon.coordinate_system(),
        }
    }

    pub fn as_point(&self) -> Option<&Point> {
        match self {
            Geometry::Point(point) => Some(point),
            _ => None,
        }
    }

    pub fn as_polyline(&self) -> Option<&Polyline> {
        match self {
            Geometry::Polyline(polyline) => Some(polyline),
            _ => None,
        }
    }

    pub fn as_polygon(&self) -> Option<&Polygon> {
        match self {
            Geometry::Polygon(polygon) => Some(polygon),
            _ => None,
        }
    }
}

impl From<Point> for Geometry {
    fn from(value: Point) -> Self {
        Geometry::Point(value)
    }
}

impl From<Polyline> for Geometry {
    fn from(value: Polyline) -> Self {
        Geometry::Polyline(value)
    }
}

impl From<Polygon> for Geometry {
    fn from(value: Polygon) -> Self {
        Geometry::Polygon(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn line(points: &[Point]) -> Polyline {
        Polyline::new(points.to_vec())
    }

    #[test]
    fn point_equality_ignores_identity_and_metadata() {
        let a = Point::new(10.0, 20.0, 1.0);
        let b = Point::new(10.0, 20.0, 1.0)
            .with_info(PointInfo::new(7, 11, 0, 1))
            .with_coordinate_system(CoordinateSystem::Bgs2005Kk);
        assert_ne!(a.id(), b.id());
        assert_eq!(a, b);
        assert_eq!(b, a);
        assert_eq!(a, a);
        assert_ne!(a, Point::new(10.0, 20.0, 1.5));
        assert!(Point::planar(1.0, 5.0) < Point::planar(2.0, 0.0));
        assert!(Point::planar(1.0, 5.0) > Point::planar(1.0, 4.0));
    }

    #[test]
    fn translation_takes_identity_from_relative_operand() {
        let reference = Point::planar(4_589_000.0, 8_505_000.0);
        let relative = Point::new(632.64, 1537.09, 3.5).with_info(PointInfo::new(1, 12, 3, 0));
        let absolute = reference + relative;
        assert_relative_eq!(absolute.n(), 4_589_632.64, epsilon = 1e-6);
        assert_relative_eq!(absolute.e(), 8_506_537.09, epsilon = 1e-6);
        assert_eq!(absolute.id(), relative.id());
        assert_eq!(absolute.info(), relative.info());

        let back = absolute - relative;
        assert_relative_eq!(back.n(), reference.n(), epsilon = 1e-9);
        assert_relative_eq!(back.e(), reference.e(), epsilon = 1e-9);
        assert_relative_eq!(back.z(), reference.z(), epsilon = 1e-9);
        assert_eq!(-(-relative), relative);
    }

    #[test]
    fn envelopes_are_frozen_at_construction() {
        let point = Point::planar(5.0, 7.0);
        let tagged = point.with_coordinate_system(CoordinateSystem::Utm35N);
        assert_eq!(tagged.envelope(), point.envelope());
        assert!(point.envelope().is_empty());

        let polyline = line(&[Point::planar(0.0, 0.0), Point::planar(3.0, 4.0)]);
        let envelope = polyline.envelope();
        assert_eq!(polyline.reversed().envelope(), envelope);
        assert_relative_eq!(envelope.width(), 4.0);
        assert_relative_eq!(envelope.height(), 3.0);
        assert_relative_eq!(polyline.length(), 5.0);
    }

    #[test]
    fn extent_expands_symmetrically_and_round_trips_aabb() {
        let mut extent = Extent::new(10.0, 20.0, 0.0, 0.0);
        assert_eq!(extent.min_n(), 0.0);
        assert_eq!(extent.max_e(), 20.0);
        extent.expand(5.0);
        assert_relative_eq!(extent.width(), 30.0);
        assert_relative_eq!(extent.height(), 20.0);

        let aabb = extent.to_aabb().expect("finite extent");
        assert_eq!(aabb.lower(), [-5.0, -5.0]);
        assert_eq!(Extent::from_aabb(&aabb), extent);
        assert!(Extent::empty().to_aabb().is_none());
        assert!(Extent::empty().is_empty());
    }

    #[test]
    fn coordinate_system_tokens_and_codes() {
        assert_eq!(
            "bgs-1970-k9".parse::<CoordinateSystem>(),
            Ok(CoordinateSystem::Bgs1970K9)
        );
        assert_eq!("UTM35N".parse::<CoordinateSystem>(), Ok(CoordinateSystem::Utm35N));
        assert_eq!("7801".parse::<CoordinateSystem>(), Ok(CoordinateSystem::Bgs2005Kk));
        assert!("mars".parse::<CoordinateSystem>().is_err());
        assert_eq!(CoordinateSystem::Wgs84Geographic.code(), 4326);
        assert_eq!(CoordinateSystem::Utm34N.utm_zone(), Some(34));
        assert!(CoordinateSystem::BgsSofia.is_legacy());
        assert!(!CoordinateSystem::Bgs2005Kk.is_legacy());
    }

    #[test]
    fn assemble_orders_and_orients_boundary_lines() {
        let p1 = Point::planar(0.0, 0.0);
        let p2 = Point::planar(0.0, 20.0);
        let p3 = Point::planar(0.0, 30.0);
        let p4 = Point::planar(10.0, 30.0);
        let p5 = Point::planar(20.0, 30.0);
        let p6 = Point::planar(20.0, 20.0);
        let p7 = Point::planar(20.0, 10.0);
        let p8 = Point::planar(20.0, 0.0);

        let ab = line(&[p7, p6]);
        let de = line(&[p2, p1]);
        let ae = line(&[p7, p8, p1]);
        let bc = line(&[p6, p5, p4]);
        let dc = line(&[p2, p3, p4]);
        let ids = [ab.id(), bc.id(), dc.id(), de.id(), ae.id()];

        let polygon = Polygon::assemble(vec![ab, de, ae, bc, dc]).expect("closed ring");
        let order: Vec<_> = polygon.parts().iter().map(Polyline::id).collect();
        assert_eq!(order, ids);
        assert_eq!(polygon.parts()[2].start_point(), Some(&p4));
        assert_eq!(polygon.parts()[4].end_point(), Some(&p7));
        assert_eq!(polygon.vertices(), &[p7, p6, p5, p4, p3, p2, p1, p8, p7]);
        assert!(polygon.is_closed());
        assert_relative_eq!(polygon.area(), 600.0);
        assert_relative_eq!(polygon.perimeter(), 100.0);

        let ccw = polygon.oriented_counter_clockwise();
        assert!(ccw.is_counter_clockwise());
        assert_eq!(ccw.parts()[0].id(), ids[4]);
        assert_eq!(ccw.vertices().first(), Some(&p7));
    }

    #[test]
    fn assemble_reports_unclosable_sets() {
        let a = Point::planar(0.0, 0.0);
        let b = Point::planar(0.0, 10.0);
        let c = Point::planar(10.0, 10.0);
        let far = Point::planar(50.0, 50.0);

        assert_eq!(Polygon::assemble(Vec::new()).unwrap_err(), GeometryError::Empty);

        let open = Polygon::assemble(vec![line(&[a, b]), line(&[b, c])]).unwrap_err();
        assert!(matches!(open, GeometryError::NotClosed { .. }));

        let split =
            Polygon::assemble(vec![line(&[a, b]), line(&[far, c]), line(&[b, a])]).unwrap_err();
        assert!(matches!(split, GeometryError::Disconnected { remaining: 1, .. }));
    }

    #[test]
    fn from_parts_keeps_given_order() {
        let a = line(&[Point::planar(0.0, 0.0), Point::planar(0.0, 1.0)]);
        let b = line(&[Point::planar(5.0, 5.0), Point::planar(6.0, 6.0)]);
        let polygon = Polygon::from_parts(vec![b.clone(), a.clone()]);
        assert_eq!(polygon.vertices().len(), 4);
        assert_eq!(polygon.vertices()[0], b.vertices()[0]);
        assert_eq!(polygon.envelope(), b.envelope().union(&a.envelope()));
    }
}
