use cad4_core::{CoordinateSystem, Extent, Point};
use tracing::{debug, trace};

use crate::engine::{AffineParameters, GeodeticEngine, ProjectionEngine};
use crate::errors::ProjectionError;

/// 计算参数时窗口在每个方向上的最小跨度（米）。
pub const DEFAULT_MIN_SPAN: f64 = 20_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Family {
    Legacy,
    Lambert,
    Utm(u8),
    Geographic,
}

impl Family {
    fn of(system: CoordinateSystem) -> Option<Self> {
        if system.is_legacy() {
            Some(Family::Legacy)
        } else if system.is_lambert() {
            Some(Family::Lambert)
        } else if let Some(zone) = system.utm_zone() {
            Some(Family::Utm(zone))
        } else if system.is_geographic() {
            Some(Family::Geographic)
        } else {
            None
        }
    }
}

/// 仿射拟合一侧的代表坐标系：UTM 与地理坐标都先换算到 Lambert 网格。
fn representative(system: CoordinateSystem) -> CoordinateSystem {
    if system.is_utm() || system.is_geographic() {
        CoordinateSystem::Bgs2005Kk
    } else {
        system
    }
}

/// 一次读取过程中的坐标转换状态。由调用方持有，每个文件一份。
#[derive(Debug)]
pub struct TransformationPipeline {
    source: CoordinateSystem,
    target: CoordinateSystem,
    parameters: Option<AffineParameters>,
    min_span: f64,
    engine: Box<dyn ProjectionEngine>,
}

impl TransformationPipeline {
    pub fn new(target: CoordinateSystem) -> Self {
        Self {
            source: CoordinateSystem::Unknown,
            target,
            parameters: None,
            min_span: DEFAULT_MIN_SPAN,
            engine: Box::new(GeodeticEngine::new()),
        }
    }

    pub fn with_engine(mut self, engine: impl ProjectionEngine + 'static) -> Self {
        self.engine = Box::new(engine);
        self.parameters = None;
        self
    }

    pub fn with_min_span(mut self, min_span: f64) -> Self {
        self.min_span = min_span.max(0.0);
        self
    }

    #[inline]
    pub fn source(&self) -> CoordinateSystem {
        self.source
    }

    #[inline]
    pub fn target(&self) -> CoordinateSystem {
        self.target
    }

    #[inline]
    pub fn min_span(&self) -> f64 {
        self.min_span
    }

    pub fn parameters(&self) -> Option<&AffineParameters> {
        self.parameters.as_ref()
    }

    /// 更换源坐标系会使已计算的参数失效。
    pub fn set_source(&mut self, source: CoordinateSystem) {
        if self.source != source {
            self.parameters = None;
        }
        self.source = source;
    }

    /// 回到初始状态（源未知、无参数），目标与引擎保持不变。
    pub fn reset(&mut self) {
        self.source = CoordinateSystem::Unknown;
        self.parameters = None;
    }

    pub fn needs_transformation(&self) -> bool {
        self.source.is_known() && self.target.is_known() && self.source != self.target
    }

    /// 针对以源坐标系表示的窗口计算仿射参数。
    ///
    /// 窗口先换算到源的代表坐标系，再在跨度不足时向四周扩展 `min_span`。
    /// 不含任何点的窗口表示不按位置筛选控制点。
    pub fn calculate_transformation_parameters(
        &mut self,
        extent: &Extent,
    ) -> Result<(), ProjectionError> {
        self.parameters = None;
        if !self.needs_transformation() {
            return Ok(());
        }

        let from = representative(self.source);
        let to = representative(self.target);

        let mut window = if extent.is_finite() {
            self.to_representative(extent)?
        } else {
            Extent::new(
                f64::NEG_INFINITY,
                f64::NEG_INFINITY,
                f64::INFINITY,
                f64::INFINITY,
            )
        };
        if window.is_finite()
            && (window.is_empty()
                || window.width() < self.min_span
                || window.height() < self.min_span)
        {
            window.expand(self.min_span);
        }

        debug!(
            source = %self.source,
            target = %self.target,
            %from,
            %to,
            width = window.width(),
            height = window.height(),
            "calculating transformation parameters"
        );
        self.parameters = Some(self.engine.affine_parameters(&window, from, to)?);
        Ok(())
    }

    fn to_representative(&self, extent: &Extent) -> Result<Extent, ProjectionError> {
        let family = self.family(self.source)?;
        if matches!(family, Family::Legacy | Family::Lambert) {
            return Ok(*extent);
        }
        let corners = [
            (extent.min_n(), extent.min_e()),
            (extent.min_n(), extent.max_e()),
            (extent.max_n(), extent.min_e()),
            (extent.max_n(), extent.max_e()),
        ];
        let mut converted = Extent::empty();
        for (n, e) in corners {
            let corner = Point::planar(n, e).with_coordinate_system(self.source);
            let lambert = match family {
                Family::Utm(zone) => self
                    .engine
                    .geographic_to_lambert(&self.engine.utm_to_geographic(&corner, zone)),
                _ => self.engine.geographic_to_lambert(&corner),
            };
            converted.include_point(lambert.n(), lambert.e());
        }
        Ok(converted)
    }

    fn family(&self, system: CoordinateSystem) -> Result<Family, ProjectionError> {
        Family::of(system).ok_or(ProjectionError::UnsupportedConversion {
            from: self.source,
            to: self.target,
        })
    }

    fn affine(&self, point: &Point) -> Result<Point, ProjectionError> {
        let parameters = self
            .parameters
            .as_ref()
            .ok_or(ProjectionError::MissingParameters {
                from: self.source,
                to: self.target,
            })?;
        Ok(self.engine.apply_affine(point, parameters))
    }

    /// 把以源坐标系表示的点转换到目标坐标系。结果保留点的标识与元数据。
    pub fn transform_point(&self, point: &Point) -> Result<Point, ProjectionError> {
        if !self.needs_transformation() {
            return Ok(point.with_coordinate_system(self.target));
        }

        let engine = self.engine.as_ref();
        let transformed = match (self.family(self.source)?, self.family(self.target)?) {
            (Family::Legacy, Family::Legacy | Family::Lambert) => self.affine(point)?,
            (Family::Legacy, Family::Utm(zone)) => {
                let lambert = self.affine(point)?;
                engine.geographic_to_utm(&engine.lambert_to_geographic(&lambert), zone)
            }
            (Family::Legacy, Family::Geographic) => {
                engine.lambert_to_geographic(&self.affine(point)?)
            }
            (Family::Lambert, Family::Legacy) => self.affine(point)?,
            (Family::Lambert, Family::Lambert) | (Family::Geographic, Family::Geographic) => {
                *point
            }
            (Family::Lambert, Family::Utm(zone)) => {
                engine.geographic_to_utm(&engine.lambert_to_geographic(point), zone)
            }
            (Family::Lambert, Family::Geographic) => engine.lambert_to_geographic(point),
            (Family::Utm(zone), Family::Legacy) => {
                let geographic = engine.utm_to_geographic(point, zone);
                self.affine(&engine.geographic_to_lambert(&geographic))?
            }
            (Family::Utm(zone), Family::Lambert) => {
                engine.geographic_to_lambert(&engine.utm_to_geographic(point, zone))
            }
            (Family::Utm(from), Family::Utm(to)) => {
                engine.geographic_to_utm(&engine.utm_to_geographic(point, from), to)
            }
            (Family::Utm(zone), Family::Geographic) => engine.utm_to_geographic(point, zone),
            (Family::Geographic, Family::Legacy) => {
                self.affine(&engine.geographic_to_lambert(point))?
            }
            (Family::Geographic, Family::Lambert) => engine.geographic_to_lambert(point),
            (Family::Geographic, Family::Utm(zone)) => engine.geographic_to_utm(point, zone),
        };

        trace!(
            from_n = point.n(),
            from_e = point.e(),
            to_n = transformed.n(),
            to_e = transformed.e(),
            "transformed point"
        );
        Ok(transformed.with_coordinate_system(self.target))
    }
}
