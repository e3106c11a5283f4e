//! 地籍交换文件的数据模型：几何、代码表、实体、图层与文件头。

pub mod entity;
pub mod file_info;
pub mod geometry;
pub mod layer;
pub mod nomenclature;

pub use entity::{Contour, Entity, EntityError, EntityKind, GeoPoint, Lifespan, Line, Symbol, Text};
pub use file_info::FileInfo;
pub use geometry::{
    CoordinateSystem, EntityId, Extent, Geometry, GeometryError, Point, PointInfo, Polygon,
    Polyline,
};
pub use layer::{EntityCounts, Layer, LayerError};
pub use nomenclature::{CadVersion, ContentType, LayerKind, NomenclatureError, TextAlignment};
