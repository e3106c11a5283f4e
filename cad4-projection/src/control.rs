use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use cad4_core::{CoordinateSystem, Extent};
use glam::DVec2;
use tracing::debug;

use crate::errors::ProjectionError;

/// 在多个坐标系中都有已知坐标的控制点。坐标向量按 x = N、y = E 保存。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ControlPoint {
    coordinates: HashMap<CoordinateSystem, DVec2>,
}

impl ControlPoint {
    pub fn coordinates_in(&self, system: CoordinateSystem) -> Option<DVec2> {
        self.coordinates.get(&system).copied()
    }

    pub fn systems(&self) -> impl Iterator<Item = CoordinateSystem> + '_ {
        self.coordinates.keys().copied()
    }
}

/// 控制点集合，按点名索引。
///
/// 文本格式每行一条记录：`点名 坐标系 N E`，字段以空白或 `;` 分隔，
/// `#` 开头的行为注释。
#[derive(Debug, Clone, Default)]
pub struct ControlPointSet {
    points: BTreeMap<String, ControlPoint>,
}

impl ControlPointSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&ControlPoint> {
        self.points.get(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, system: CoordinateSystem, n: f64, e: f64) {
        self.points
            .entry(name.into())
            .or_default()
            .coordinates
            .insert(system, DVec2::new(n, e));
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ProjectionError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ProjectionError::ControlPointsIo {
            path: path.to_path_buf(),
            source,
        })?;
        let set = Self::parse(&content)?;
        debug!(path = %path.display(), count = set.len(), "loaded control points");
        Ok(set)
    }

    pub fn parse(content: &str) -> Result<Self, ProjectionError> {
        let mut set = Self::new();
        for (index, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = line
                .split(|c: char| c == ';' || c.is_whitespace())
                .filter(|field| !field.is_empty())
                .collect();
            let syntax = |message: String| ProjectionError::ControlPointSyntax {
                line: index + 1,
                message,
            };
            let [name, system, n, e] = fields.as_slice() else {
                return Err(syntax(format!("expected 4 fields, found {}", fields.len())));
            };
            let system = system
                .parse::<CoordinateSystem>()
                .map_err(|err| syntax(err.to_string()))?;
            let n = n
                .parse::<f64>()
                .map_err(|_| syntax(format!("invalid northing \"{n}\"")))?;
            let e = e
                .parse::<f64>()
                .map_err(|_| syntax(format!("invalid easting \"{e}\"")))?;
            set.insert(*name, system, n, e);
        }
        Ok(set)
    }

    /// 同时具有两套坐标、且源坐标落在 `extent` 内的点对 (源, 目标)。
    pub fn pairs(
        &self,
        from: CoordinateSystem,
        to: CoordinateSystem,
        extent: &Extent,
    ) -> Vec<(DVec2, DVec2)> {
        self.points
            .values()
            .filter_map(|point| Some((point.coordinates_in(from)?, point.coordinates_in(to)?)))
            .filter(|(source, _)| extent.contains_point(source.x, source.y))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = "
        # name system N E
        A1 bgs-1970-k9 4589000.0 8505000.0
        A1;bgs-2005-kk;4716000.5;326000.25
        B7 108709 4590000 8506000
    ";

    #[test]
    fn parses_records_and_groups_by_name() {
        let set = ControlPointSet::parse(SAMPLE).expect("valid control points");
        assert_eq!(set.len(), 2);
        let a1 = set.get("A1").expect("A1");
        assert_eq!(
            a1.coordinates_in(CoordinateSystem::Bgs2005Kk),
            Some(DVec2::new(4_716_000.5, 326_000.25))
        );
        assert_eq!(set.get("B7").map(|p| p.systems().count()), Some(1));

        let window = Extent::new(4_580_000.0, 8_500_000.0, 4_600_000.0, 8_510_000.0);
        let pairs = set.pairs(
            CoordinateSystem::Bgs1970K9,
            CoordinateSystem::Bgs2005Kk,
            &window,
        );
        assert_eq!(pairs.len(), 1);
        let outside = Extent::new(0.0, 0.0, 1.0, 1.0);
        assert!(set
            .pairs(CoordinateSystem::Bgs1970K9, CoordinateSystem::Bgs2005Kk, &outside)
            .is_empty());
    }

    #[test]
    fn reports_line_of_malformed_record() {
        let err = ControlPointSet::parse("A1 bgs-1970-k9 1.0 2.0\nA2 nowhere 1 2\n").unwrap_err();
        match err {
            ProjectionError::ControlPointSyntax { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(ControlPointSet::parse("A1 bgs-1970-k9 1.0").is_err());
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        write!(file, "{SAMPLE}").unwrap();
        let set = ControlPointSet::load(file.path()).expect("load control points");
        assert_eq!(set.len(), 2);

        let missing = ControlPointSet::load("/definitely/not/here.txt");
        assert!(matches!(missing, Err(ProjectionError::ControlPointsIo { .. })));
    }
}
