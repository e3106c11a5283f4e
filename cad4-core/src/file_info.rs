use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::geometry::{CoordinateSystem, Extent, Point};
use crate::nomenclature::{CadVersion, ContentType};

/// 文件头记录。
///
/// 读取完成后，`reference_point` 与 `window` 以目标坐标系表示。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileInfo {
    pub version: CadVersion,
    pub raw_version: String,
    pub ekatte: String,
    pub name: String,
    pub program: String,
    pub date: Option<NaiveDate>,
    pub firm: String,
    pub reference_point: Point,
    pub window: Extent,
    pub window_coordinate_system: CoordinateSystem,
    pub coordtype: String,
    pub coordinate_system: CoordinateSystem,
    pub contents: Option<ContentType>,
    pub comment: String,
}

impl Default for FileInfo {
    fn default() -> Self {
        Self {
            version: CadVersion::Unknown,
            raw_version: String::new(),
            ekatte: String::new(),
            name: String::new(),
            program: String::new(),
            date: None,
            firm: String::new(),
            reference_point: Point::planar(0.0, 0.0),
            window: Extent::empty(),
            window_coordinate_system: CoordinateSystem::Unknown,
            coordtype: String::new(),
            coordinate_system: CoordinateSystem::Unknown,
            contents: None,
            comment: String::new(),
        }
    }
}

impl FileInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_version(&mut self, token: &str) -> CadVersion {
        self.raw_version = token.trim().to_string();
        self.version = CadVersion::parse(token);
        self.version
    }

    /// 保存原始坐标类型字符串，并解析出坐标系。
    pub fn set_coordtype(&mut self, raw: &str) -> CoordinateSystem {
        self.coordtype = raw.to_string();
        self.coordinate_system = parse_coordtype(raw);
        self.coordinate_system
    }
}

/// 解析 `年代, 高程基准, 分带` 形式的坐标类型。无法识别时返回 `Unknown`。
pub fn parse_coordtype(raw: &str) -> CoordinateSystem {
    let values: Vec<&str> = raw
        .split(',')
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .collect();
    let Some(era) = values.first() else {
        return CoordinateSystem::Unknown;
    };
    let era = era.split_whitespace().collect::<Vec<_>>().join(" ");
    let zone = values.get(2).copied().unwrap_or_default();

    match (era.as_str(), zone) {
        ("1930", "8") => CoordinateSystem::Bgs1930_24,
        ("1930", "9") => CoordinateSystem::Bgs1930_27,
        ("1950", "8") => CoordinateSystem::Bgs1950_3_24,
        ("1950", "9") => CoordinateSystem::Bgs1950_3_27,
        ("1950", "4") => CoordinateSystem::Bgs1950_6_21,
        ("1950", "5") => CoordinateSystem::Bgs1950_6_27,
        ("1970", "K3") => CoordinateSystem::Bgs1970K3,
        ("1970", "K5") => CoordinateSystem::Bgs1970K5,
        ("1970", "K7") => CoordinateSystem::Bgs1970K7,
        ("1970", "K9") => CoordinateSystem::Bgs1970K9,
        ("2005 UTM", "34") => CoordinateSystem::Utm34N,
        ("2005 UTM", "35") => CoordinateSystem::Utm35N,
        ("2005", _) => CoordinateSystem::Bgs2005Kk,
        _ => CoordinateSystem::Unknown,
    }
}
