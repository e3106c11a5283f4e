//! 五类图形实体。每个实体由一行定长字段构造，并持有一个可替换的几何。

use std::fmt;
use std::num::{ParseFloatError, ParseIntError};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geometry::{EntityId, Geometry, Point, PointInfo, Polygon, Polyline};
use crate::nomenclature::{self, TextAlignment};

/// 文件中日期的格式（dd.MM.yyyy）。
pub const DATE_FORMAT: &str = "%d.%m.%Y";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Point,
    Line,
    Contour,
    Symbol,
    Text,
}

impl EntityKind {
    /// 记录行首的关键字。
    pub fn record_key(self) -> &'static str {
        match self {
            EntityKind::Point => "P",
            EntityKind::Line => "L",
            EntityKind::Contour => "C",
            EntityKind::Symbol => "S",
            EntityKind::Text => "T",
        }
    }

    pub fn from_record_key(key: &str) -> Option<Self> {
        match key {
            "P" => Some(EntityKind::Point),
            "L" => Some(EntityKind::Line),
            "C" => Some(EntityKind::Contour),
            "S" => Some(EntityKind::Symbol),
            "T" => Some(EntityKind::Text),
            _ => None,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EntityKind::Point => "point",
            EntityKind::Line => "line",
            EntityKind::Contour => "contour",
            EntityKind::Symbol => "symbol",
            EntityKind::Text => "text",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    #[error(transparent)]
    Int(#[from] ParseIntError),
    #[error(transparent)]
    Float(#[from] ParseFloatError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EntityError {
    #[error("{kind} record has {found} field(s), expected at least {expected}")]
    FieldCount {
        kind: EntityKind,
        expected: usize,
        found: usize,
    },
    #[error("{kind} field `{field}` has invalid value \"{value}\"")]
    InvalidField {
        kind: EntityKind,
        field: &'static str,
        value: String,
        #[source]
        source: ValueError,
    },
}

/// 创建与注销日期。无法解析的注销日期（例如 `0`）表示仍然有效。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Lifespan {
    pub created: Option<NaiveDate>,
    pub removed: Option<NaiveDate>,
}

impl Lifespan {
    pub fn parse(created: &str, removed: &str) -> Self {
        Self {
            created: parse_date(created),
            removed: parse_date(removed),
        }
    }

    pub fn is_active_on(&self, date: NaiveDate) -> bool {
        self.created.is_none_or(|created| created <= date)
            && self.removed.is_none_or(|removed| date < removed)
    }
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT).ok()
}

fn require(values: &[&str], expected: usize, kind: EntityKind) -> Result<(), EntityError> {
    if values.len() < expected {
        return Err(EntityError::FieldCount {
            kind,
            expected,
            found: values.len(),
        });
    }
    Ok(())
}

fn parse_int(raw: &str, kind: EntityKind, field: &'static str) -> Result<i32, EntityError> {
    raw.trim()
        .parse::<i32>()
        .map_err(|err| EntityError::InvalidField {
            kind,
            field,
            value: raw.to_string(),
            source: err.into(),
        })
}

fn parse_float(raw: &str, kind: EntityKind, field: &'static str) -> Result<f64, EntityError> {
    raw.trim()
        .parse::<f64>()
        .map_err(|err| EntityError::InvalidField {
            kind,
            field,
            value: raw.to_string(),
            source: err.into(),
        })
}

fn strip_quotes(raw: &str) -> String {
    raw.trim().trim_matches('"').trim().to_string()
}

impl PointInfo {
    /// 线顶点组 `nl xl yl tl o m`：编号、坐标、精度、标志类型、测量方式。
    pub fn from_fields(values: &[&str]) -> Result<Self, EntityError> {
        let kind = EntityKind::Line;
        require(values, 6, kind)?;
        Ok(PointInfo::new(
            parse_int(values[0], kind, "vertex number")?,
            parse_int(values[3], kind, "vertex precision")?,
            parse_int(values[4], kind, "vertex marker")?,
            parse_int(values[5], kind, "vertex method")?,
        ))
    }
}

/// 测量点 `P t n x y h k mx my kh mh mst msg sgn cen ono b d`。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoPoint {
    id: EntityId,
    pub type_code: i32,
    pub number: i32,
    pub position_class: i32,
    pub mx: f64,
    pub my: f64,
    pub height_class: i32,
    pub mh: f64,
    marking_code: i32,
    signalling_code: i32,
    pub sign: i32,
    pub underground_marker: bool,
    pub old_number: String,
    pub lifespan: Lifespan,
    geometry: Option<Geometry>,
}

impl GeoPoint {
    pub const FIELD_COUNT: usize = 17;

    pub fn from_fields(values: &[&str]) -> Result<Self, EntityError> {
        let kind = EntityKind::Point;
        require(values, Self::FIELD_COUNT, kind)?;
        let id = EntityId::new();
        let point = Point::new(
            parse_float(values[2], kind, "x")?,
            parse_float(values[3], kind, "y")?,
            parse_float(values[4], kind, "h")?,
        )
        .with_id(id);
        Ok(Self {
            id,
            type_code: parse_int(values[0], kind, "type")?,
            number: parse_int(values[1], kind, "number")?,
            position_class: parse_int(values[5], kind, "position class")?,
            mx: parse_float(values[6], kind, "mx")?,
            my: parse_float(values[7], kind, "my")?,
            height_class: parse_int(values[8], kind, "height class")?,
            mh: parse_float(values[9], kind, "mh")?,
            marking_code: parse_int(values[10], kind, "marking")?,
            signalling_code: parse_int(values[11], kind, "signalling")?,
            sign: parse_int(values[12], kind, "sign")?,
            underground_marker: parse_int(values[13], kind, "underground marker")? == 1,
            old_number: strip_quotes(values[14]),
            lifespan: Lifespan::parse(values[15], values[16]),
            geometry: Some(Geometry::Point(point)),
        })
    }

    pub fn marking(&self) -> Option<&'static str> {
        nomenclature::point_marking(self.marking_code)
    }

    pub fn signalling(&self) -> Option<&'static str> {
        nomenclature::point_signalling(self.signalling_code)
    }
}

/// 线 `L t n k b d [h]`，顶点在后续行中给出。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Line {
    id: EntityId,
    pub type_code: i32,
    pub number: i32,
    border_code: i32,
    pub lifespan: Lifespan,
    pub parameter: Option<f64>,
    geometry: Option<Geometry>,
}

impl Line {
    pub const FIELD_COUNT: usize = 5;

    pub fn from_fields(values: &[&str]) -> Result<Self, EntityError> {
        let kind = EntityKind::Line;
        require(values, Self::FIELD_COUNT, kind)?;
        let parameter = match values.get(5) {
            Some(raw) => Some(parse_float(raw, kind, "h")?),
            None => None,
        };
        Ok(Self {
            id: EntityId::new(),
            type_code: parse_int(values[0], kind, "type")?,
            number: parse_int(values[1], kind, "number")?,
            border_code: parse_int(values[2], kind, "border")?,
            lifespan: Lifespan::parse(values[3], values[4]),
            parameter,
            geometry: None,
        })
    }

    /// 解析一个顶点组，返回带元数据的相对坐标点。
    pub fn parse_vertex(values: &[&str]) -> Result<Point, EntityError> {
        let info = PointInfo::from_fields(values)?;
        let kind = EntityKind::Line;
        Ok(Point::planar(
            parse_float(values[1], kind, "vertex x")?,
            parse_float(values[2], kind, "vertex y")?,
        )
        .with_info(info))
    }

    pub fn border_type(&self) -> Option<&'static str> {
        nomenclature::line_border_type(self.border_code)
    }

    pub fn polyline(&self) -> Option<&Polyline> {
        self.geometry.as_ref().and_then(Geometry::as_polyline)
    }
}

/// 轮廓 `C t id x y b d`，边界由后续行引用的线号拼成。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contour {
    id: EntityId,
    pub type_code: i32,
    pub identifier: String,
    pub interior_point: Point,
    pub lifespan: Lifespan,
    pub line_numbers: Vec<i32>,
    geometry: Option<Geometry>,
}

impl Contour {
    pub const FIELD_COUNT: usize = 6;

    pub fn from_fields(values: &[&str]) -> Result<Self, EntityError> {
        let kind = EntityKind::Contour;
        require(values, Self::FIELD_COUNT, kind)?;
        Ok(Self {
            id: EntityId::new(),
            type_code: parse_int(values[0], kind, "type")?,
            identifier: values[1].trim().to_string(),
            interior_point: Point::planar(
                parse_float(values[2], kind, "x")?,
                parse_float(values[3], kind, "y")?,
            ),
            lifespan: Lifespan::parse(values[4], values[5]),
            line_numbers: Vec::new(),
            geometry: None,
        })
    }

    /// 追加一行引用的线号。
    pub fn push_line_numbers(&mut self, values: &[&str]) -> Result<(), EntityError> {
        for raw in values {
            self.line_numbers
                .push(parse_int(raw, EntityKind::Contour, "line number")?);
        }
        Ok(())
    }

    pub fn polygon(&self) -> Option<&Polygon> {
        self.geometry.as_ref().and_then(Geometry::as_polygon)
    }
}

/// 符号 `S t n x y a m b d`。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Symbol {
    id: EntityId,
    pub type_code: i32,
    pub number: i32,
    pub rotation: f64,
    pub scale: Option<f64>,
    pub lifespan: Lifespan,
    geometry: Option<Geometry>,
}

impl Symbol {
    pub const FIELD_COUNT: usize = 8;

    pub fn from_fields(values: &[&str]) -> Result<Self, EntityError> {
        let kind = EntityKind::Symbol;
        require(values, Self::FIELD_COUNT, kind)?;
        let id = EntityId::new();
        let point = Point::planar(
            parse_float(values[2], kind, "x")?,
            parse_float(values[3], kind, "y")?,
        )
        .with_id(id);
        Ok(Self {
            id,
            type_code: parse_int(values[0], kind, "type")?,
            number: parse_int(values[1], kind, "number")?,
            rotation: parse_float(values[4], kind, "rotation")?,
            scale: values[5].trim().parse::<f64>().ok(),
            lifespan: Lifespan::parse(values[6], values[7]),
            geometry: Some(Geometry::Point(point)),
        })
    }
}

/// 文本 `T t n x y h b d r j`，紧随其后的一行是文本内容。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Text {
    id: EntityId,
    pub type_code: i32,
    pub number: i32,
    pub height: f64,
    pub lifespan: Lifespan,
    pub rotation: f64,
    pub alignment: TextAlignment,
    content: String,
    geometry: Option<Geometry>,
}

impl Text {
    pub const FIELD_COUNT: usize = 9;

    pub fn from_fields(values: &[&str]) -> Result<Self, EntityError> {
        let kind = EntityKind::Text;
        require(values, Self::FIELD_COUNT, kind)?;
        let id = EntityId::new();
        let point = Point::planar(
            parse_float(values[2], kind, "x")?,
            parse_float(values[3], kind, "y")?,
        )
        .with_id(id);
        Ok(Self {
            id,
            type_code: parse_int(values[0], kind, "type")?,
            number: parse_int(values[1], kind, "number")?,
            height: parse_float(values[4], kind, "height")?,
            lifespan: Lifespan::parse(values[5], values[6]),
            rotation: parse_float(values[7], kind, "rotation")?,
            alignment: TextAlignment::from_code(values[8]),
            content: String::new(),
            geometry: Some(Geometry::Point(point)),
        })
    }

    /// 保存内容行，去掉两端的空格与引号。
    pub fn set_content(&mut self, line: &str) {
        self.content = line.trim_matches(|c: char| c == '"' || c == ' ').to_string();
    }

    #[inline]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// 内容前缀代码（如 `AR`）对应的说明。
    pub fn content_kind(&self) -> Option<&'static str> {
        self.content
            .split_whitespace()
            .next()
            .and_then(nomenclature::text_content_type)
    }
}

/// 图形实体的和类型。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Entity {
    Point(GeoPoint),
    Line(Line),
    Contour(Contour),
    Symbol(Symbol),
    Text(Text),
}

impl Entity {
    pub fn id(&self) -> EntityId {
        match self {
            Entity::Point(point) => point.id,
            Entity::Line(line) => line.id,
            Entity::Contour(contour) => contour.id,
            Entity::Symbol(symbol) => symbol.id,
            Entity::Text(text) => text.id,
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Point(_) => EntityKind::Point,
            Entity::Line(_) => EntityKind::Line,
            Entity::Contour(_) => EntityKind::Contour,
            Entity::Symbol(_) => EntityKind::Symbol,
            Entity::Text(_) => EntityKind::Text,
        }
    }

    pub fn geometry(&self) -> Option<&Geometry> {
        match self {
            Entity::Point(point) => point.geometry.as_ref(),
            Entity::Line(line) => line.geometry.as_ref(),
            Entity::Contour(contour) => contour.geometry.as_ref(),
            Entity::Symbol(symbol) => symbol.geometry.as_ref(),
            Entity::Text(text) => text.geometry.as_ref(),
        }
    }

    fn geometry_slot(&mut self) -> &mut Option<Geometry> {
        match self {
            Entity::Point(point) => &mut point.geometry,
            Entity::Line(line) => &mut line.geometry,
            Entity::Contour(contour) => &mut contour.geometry,
            Entity::Symbol(symbol) => &mut symbol.geometry,
            Entity::Text(text) => &mut text.geometry,
        }
    }

    /// 替换几何，并把实体标识写入新几何。
    ///
    /// 若实体已加入图层，应通过 `Layer::replace_geometry` 调用，以便同步空间索引。
    pub fn set_geometry(&mut self, geometry: impl Into<Geometry>) {
        let mut geometry = geometry.into();
        geometry.set_id(self.id());
        *self.geometry_slot() = Some(geometry);
    }

    /// 原始坐标点（测量点、符号、文本），用于解析阶段的坐标换算。
    pub fn anchor(&self) -> Option<&Point> {
        self.geometry().and_then(Geometry::as_point)
    }

    pub fn lifespan(&self) -> &Lifespan {
        match self {
            Entity::Point(point) => &point.lifespan,
            Entity::Line(line) => &line.lifespan,
            Entity::Contour(contour) => &contour.lifespan,
            Entity::Symbol(symbol) => &symbol.lifespan,
            Entity::Text(text) => &text.lifespan,
        }
    }

    pub fn type_code(&self) -> i32 {
        match self {
            Entity::Point(point) => point.type_code,
            Entity::Line(line) => line.type_code,
            Entity::Contour(contour) => contour.type_code,
            Entity::Symbol(symbol) => symbol.type_code,
            Entity::Text(text) => text.type_code,
        }
    }

    pub fn as_line(&self) -> Option<&Line> {
        match self {
            Entity::Line(line) => Some(line),
            _ => None,
        }
    }

    pub fn as_point(&self) -> Option<&GeoPoint> {
        match self {
            Entity::Point(point) => Some(point),
            _ => None,
        }
    }

    pub fn as_contour(&self) -> Option<&Contour> {
        match self {
            Entity::Contour(contour) => Some(contour),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&Text> {
        match self {
            Entity::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl From<GeoPoint> for Entity {
    fn from(value: GeoPoint) -> Self {
        Entity::Point(value)
    }
}

impl From<Line> for Entity {
    fn from(value: Line) -> Self {
        Entity::Line(value)
    }
}

impl From<Contour> for Entity {
    fn from(value: Contour) -> Self {
        Entity::Contour(value)
    }
}

impl From<Symbol> for Entity {
    fn from(value: Symbol) -> Self {
        Entity::Symbol(value)
    }
}

impl From<Text> for Entity {
    fn from(value: Text) -> Self {
        Entity::Text(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    fn fields(line: &str) -> Vec<&str> {
        line.split_whitespace().collect()
    }

    #[test]
    fn geo_point_reads_all_seventeen_fields() {
        let values = fields(
            "28 2158 632.640 1537.090 0.000 0 0.00 0.00 0 0.00 3 1 0 1 \"12\" 25.11.2008 0",
        );
        let point = GeoPoint::from_fields(&values).expect("valid point");
        assert_eq!(point.number, 2158);
        assert_eq!(point.type_code, 28);
        assert_eq!(point.old_number, "12");
        assert!(point.underground_marker);
        assert_eq!(point.signalling(), Some("Метална пирамида"));
        assert_eq!(
            point.lifespan.created,
            NaiveDate::from_ymd_opt(2008, 11, 25)
        );
        assert_eq!(point.lifespan.removed, None);

        let entity = Entity::from(point);
        let anchor = entity.anchor().expect("point geometry");
        assert_eq!(anchor.id(), entity.id());
        assert!((anchor.n() - 632.64).abs() < 1e-9);
        assert!((anchor.e() - 1537.09).abs() < 1e-9);
    }

    #[test]
    fn malformed_fields_keep_the_cause() {
        let err = Line::from_fields(&fields("1 12 2 01.01.2000")).unwrap_err();
        assert_eq!(
            err,
            EntityError::FieldCount {
                kind: EntityKind::Line,
                expected: 5,
                found: 4
            }
        );

        let err = Symbol::from_fields(&fields("5 1 1.0 abc 0 1 01.01.2000 0")).unwrap_err();
        assert!(matches!(err, EntityError::InvalidField { field: "y", .. }));
        assert!(err.source().is_some());
    }

    #[test]
    fn line_vertex_groups_carry_point_info() {
        let vertex = Line::parse_vertex(&fields("2158 632.640 1537.090 12 4 1")).unwrap();
        let info = vertex.info().expect("vertex info");
        assert_eq!(info.number, 2158);
        assert_eq!(info.precision(), Some("0.10 м"));
        assert_eq!(info.marker_type(), Some("За маркиране на граници на поземлени имоти"));

        let line = Line::from_fields(&fields("1 17 2 01.01.2000 0 1.5")).unwrap();
        assert_eq!(line.parameter, Some(1.5));
        assert!(line.border_type().is_some());
        assert!(line.polyline().is_none());
    }

    #[test]
    fn set_geometry_stamps_entity_id() {
        let mut entity = Entity::from(Line::from_fields(&fields("1 17 2 01.01.2000 0")).unwrap());
        let polyline = Polyline::new(vec![Point::planar(0.0, 0.0), Point::planar(1.0, 1.0)]);
        assert_ne!(polyline.id(), entity.id());
        entity.set_geometry(polyline);
        assert_eq!(entity.geometry().map(Geometry::id), Some(entity.id()));
        assert_eq!(entity.kind(), EntityKind::Line);
    }

    #[test]
    fn text_content_is_trimmed() {
        let mut text =
            Text::from_fields(&fields("3 44 600.1 1500.2 2.5 01.02.2010 0 90 CC")).unwrap();
        assert_eq!(text.alignment, TextAlignment::MiddleCenter);
        text.set_content(" \"AR 512 кв.м\" ");
        assert_eq!(text.content(), "AR 512 кв.м");
        assert_eq!(text.content_kind(), Some("площ"));
    }

    #[test]
    fn lifespan_bounds_validity() {
        let span = Lifespan::parse("01.01.2000", "01.01.2010");
        let inside = NaiveDate::from_ymd_opt(2005, 6, 1).unwrap();
        let after = NaiveDate::from_ymd_opt(2011, 1, 1).unwrap();
        assert!(span.is_active_on(inside));
        assert!(!span.is_active_on(after));
        assert!(Lifespan::parse("bad", "0").is_active_on(after));
    }
}
