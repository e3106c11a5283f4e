//! 代码表：把文件中的数字/字母代码翻译成可读描述，以及少量封闭枚举。

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NomenclatureError {
    #[error("unknown layer kind `{0}`")]
    UnknownLayer(String),
    #[error("unknown contents tag `{0}`")]
    UnknownContentType(String),
}

/// 文件格式版本。只有 `4.x` 能被完整读取，其余仅用于报告。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CadVersion {
    #[default]
    Unknown,
    V200,
    V400,
    V403,
}

impl CadVersion {
    /// 只识别完整的版本号，像 `"4"` 这样的前缀会得到 `Unknown`。
    pub fn parse(token: &str) -> Self {
        match token.trim() {
            "2.00" => CadVersion::V200,
            "4.00" => CadVersion::V400,
            "4.03" => CadVersion::V403,
            _ => CadVersion::Unknown,
        }
    }

    #[inline]
    pub fn is_supported(self) -> bool {
        matches!(self, CadVersion::V400 | CadVersion::V403)
    }
}

impl fmt::Display for CadVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CadVersion::Unknown => "unknown",
            CadVersion::V200 => "2.00",
            CadVersion::V400 => "4.00",
            CadVersion::V403 => "4.03",
        };
        f.write_str(label)
    }
}

/// 文件内容范围：项目、局部或完整地籍图。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContentType {
    Pro,
    Part,
    Allk,
}

impl FromStr for ContentType {
    type Err = NomenclatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "PRO" => Ok(ContentType::Pro),
            "PART" => Ok(ContentType::Part),
            "ALLK" => Ok(ContentType::Allk),
            other => Err(NomenclatureError::UnknownContentType(other.to_string())),
        }
    }
}

/// 五个固定图层。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LayerKind {
    Cadaster,
    Leso,
    Pochkateg,
    Regplan,
    Shemi,
}

impl LayerKind {
    pub const ALL: [LayerKind; 5] = [
        LayerKind::Cadaster,
        LayerKind::Leso,
        LayerKind::Pochkateg,
        LayerKind::Regplan,
        LayerKind::Shemi,
    ];

    pub fn name(self) -> &'static str {
        match self {
            LayerKind::Cadaster => "CADASTER",
            LayerKind::Leso => "LESO",
            LayerKind::Pochkateg => "POCHKATEG",
            LayerKind::Regplan => "REGPLAN",
            LayerKind::Shemi => "SHEMI",
        }
    }
}

impl FromStr for LayerKind {
    type Err = NomenclatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        LayerKind::ALL
            .into_iter()
            .find(|kind| kind.name() == name)
            .ok_or_else(|| NomenclatureError::UnknownLayer(name.to_string()))
    }
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TextAlignment {
    TopLeft,
    TopCenter,
    TopRight,
    MiddleLeft,
    MiddleCenter,
    MiddleRight,
    #[default]
    BottomLeft,
    BottomCenter,
    BottomRight,
}

impl TextAlignment {
    /// 两字母对齐代码：第一个字母为水平方向（L/C/R），第二个为垂直方向（T/C/D）。
    /// 无法识别时回退到左下角。
    pub fn from_code(code: &str) -> Self {
        match code.trim() {
            "LT" => TextAlignment::TopLeft,
            "LC" => TextAlignment::MiddleLeft,
            "LD" => TextAlignment::BottomLeft,
            "CT" => TextAlignment::TopCenter,
            "CC" => TextAlignment::MiddleCenter,
            "CD" => TextAlignment::BottomCenter,
            "RT" => TextAlignment::TopRight,
            "RC" => TextAlignment::MiddleRight,
            "RD" => TextAlignment::BottomRight,
            _ => TextAlignment::BottomLeft,
        }
    }
}

/// 点位精度（代码 11..=21）。
pub fn point_precision(code: i32) -> Option<&'static str> {
    let label = match code {
        11 => "0.05 м",
        12 => "0.10 м",
        13 => "0.15 м",
        14 => "0.2 м",
        15 => "0.3 м",
        16 => "0.4 м",
        17 => "0.6 м",
        18 => "0.9 м",
        19 => "1.2 м",
        20 => "1.8 м",
        21 => "над 1.8 м",
        _ => return None,
    };
    Some(label)
}

/// 线顶点的标志类型。
pub fn point_marker_type(code: i32) -> Option<&'static str> {
    let label = match code {
        0 => "Липсва информация",
        1 => "За маркиране на землищни, общински и обласни граници",
        2 => "Железобетонни колове или тръби, поставени в земята",
        3 => "Железобетонни колове или тръби с бетонова основа",
        4 => "За маркиране на граници на поземлени имоти",
        5 => "Знаци от камък и бетон",
        6 => "Камък от твърда порода",
        7 => "Метален прът с бетонирана горна част",
        8 => "Бетоново блокче с метален прът или тръба",
        9 => "Железобетонен или железен кол",
        10 => "Знаци от други материали",
        11 => "Тръби от твърда пластмаса",
        12 => "Маркиране с жълта боя ъглите на масивни съоражения",
        13 => "Знак от некорозираща алуминиева сплав",
        14 => "Знак от компресиран полиетилен",
        15 => "Знак от полимерен бетон",
        16 => "Маркиращ болт",
        17 => "Маркиращ пирон",
        18 => "Маркиращи табели",
        _ => return None,
    };
    Some(label)
}

/// 测量点的埋石方式。
pub fn point_marking(code: i32) -> Option<&'static str> {
    let label = match code {
        0 => "Липсва информация",
        1 => "Знаци от камък и бетон",
        2 => "Камък от твърда порода",
        3 => "Метална тръба с бетонирана горна част",
        4 => "Бетоново блокче с метална тръба в центъра",
        5 => "Знаци от полимерен бетон",
        6 => "Знаци от полимерен бетон с 'С' образен ствол",
        7 => "Знаци от други материали",
        8 => "Знаци за стабилизиране върху трайни настилки",
        9 => "Метална тръба",
        10 => "Маркиращ пирон",
        _ => return None,
    };
    Some(label)
}

pub fn point_signalling(code: i32) -> Option<&'static str> {
    match code {
        0 => Some("Няма"),
        1 => Some("Метална пирамида"),
        2 => Some("Дървена веха"),
        _ => None,
    }
}

/// 边界线等级。
pub fn line_border_type(code: i32) -> Option<&'static str> {
    let label = match code {
        0 => "Не е граница",
        1 => "Граница с нисък приоритет",
        2 => "Граница с основен приоритет(имот, подотдел, УПИ, почвена категория)",
        3 => "Граница с висок приоритет(кадастрален район, отдел, квартал)",
        4 => "Граница с по-висок приоритет(землищна граница)",
        _ => return None,
    };
    Some(label)
}

/// 顶点测量方式。现行代码表与边界等级共用同一组描述。
pub fn measurement_method(code: i32) -> Option<&'static str> {
    line_border_type(code)
}

/// 文本内容前缀代码。
pub fn text_content_type(code: &str) -> Option<&'static str> {
    let label = match code.trim() {
        "AN" => "административен номер на обект",
        "SI" => "сигнатура на сграда",
        "NU" => "номер на обект",
        "LE" => "дължина",
        "XC" => "х координата",
        "YC" => "у координата",
        "HI" => "височина",
        "AR" => "площ",
        "LP" => "номер на точка от линия",
        "AD" => "надпис на адрес",
        "ST" => "надпис на улица",
        "IO" => "данни за собственика/ците на контур (идентификатор на контур)",
        _ => return None,
    };
    Some(label)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_tokens_map_exactly() {
        assert_eq!(CadVersion::parse("4.00"), CadVersion::V400);
        assert_eq!(CadVersion::parse("4.03"), CadVersion::V403);
        assert_eq!(CadVersion::parse("2.00"), CadVersion::V200);
        assert_eq!(CadVersion::parse("4"), CadVersion::Unknown);
        assert_eq!(CadVersion::parse("4.01"), CadVersion::Unknown);
        assert!(!CadVersion::parse("2.00").is_supported());
    }

    #[test]
    fn layer_names_have_no_default() {
        assert_eq!("CADASTER".parse::<LayerKind>(), Ok(LayerKind::Cadaster));
        assert_eq!(" SHEMI ".parse::<LayerKind>(), Ok(LayerKind::Shemi));
        assert_eq!(
            "cadaster".parse::<LayerKind>(),
            Err(NomenclatureError::UnknownLayer("cadaster".to_string()))
        );
    }

    #[test]
    fn alignment_falls_back_to_bottom_left() {
        assert_eq!(TextAlignment::from_code("CC"), TextAlignment::MiddleCenter);
        assert_eq!(TextAlignment::from_code("RT"), TextAlignment::TopRight);
        assert_eq!(TextAlignment::from_code("??"), TextAlignment::BottomLeft);
    }

    #[test]
    fn code_tables_reject_unknown_codes() {
        assert_eq!(point_precision(11), Some("0.05 м"));
        assert_eq!(point_precision(10), None);
        assert_eq!(point_signalling(2), Some("Дървена веха"));
        assert!(point_marker_type(18).is_some());
        assert!(point_marking(11).is_none());
        assert_eq!(text_content_type("AR"), Some("площ"));
        assert_eq!("PART".parse::<ContentType>(), Ok(ContentType::Part));
        assert!("FULL".parse::<ContentType>().is_err());
    }
}
