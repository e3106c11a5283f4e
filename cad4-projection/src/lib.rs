//! 坐标转换：旧坐标系之间的仿射拟合、国家 Lambert 网格与 UTM 的闭式投影，
//! 以及按源/目标坐标系分派的转换管线。

pub mod errors {
    use std::io;
    use std::path::PathBuf;

    use cad4_core::CoordinateSystem;
    use thiserror::Error;

    #[derive(Debug, Error)]
    pub enum ProjectionError {
        #[error(
            "not enough control points for {from} -> {to}: found {found}, need at least {required}"
        )]
        InsufficientControlPoints {
            from: CoordinateSystem,
            to: CoordinateSystem,
            found: usize,
            required: usize,
        },
        #[error("control points for {from} -> {to} are collinear")]
        DegenerateControlPoints {
            from: CoordinateSystem,
            to: CoordinateSystem,
        },
        #[error("transformation parameters for {from} -> {to} have not been calculated")]
        MissingParameters {
            from: CoordinateSystem,
            to: CoordinateSystem,
        },
        #[error("conversion from {from} to {to} is not supported")]
        UnsupportedConversion {
            from: CoordinateSystem,
            to: CoordinateSystem,
        },
        #[error("failed to read control points {path:?}: {source}")]
        ControlPointsIo {
            path: PathBuf,
            #[source]
            source: io::Error,
        },
        #[error("control points line {line}: {message}")]
        ControlPointSyntax { line: usize, message: String },
    }
}

pub mod control;
pub mod engine;
pub mod pipeline;
pub mod projections;

pub use control::{ControlPoint, ControlPointSet};
pub use engine::{AffineParameters, GeodeticEngine, ProjectionEngine};
pub use errors::ProjectionError;
pub use pipeline::{DEFAULT_MIN_SPAN, TransformationPipeline};
pub use projections::{Ellipsoid, LambertConformalConic, TransverseMercator};
