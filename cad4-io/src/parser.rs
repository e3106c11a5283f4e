use cad4_core::entity::DATE_FORMAT;
use cad4_core::{
    ContentType, Contour, Entity, EntityError, EntityKind, Extent, FileInfo, GeoPoint, Layer,
    LayerKind, Line, NomenclatureError, Point, Polygon, Polyline, Symbol, Text,
};
use cad4_projection::{ProjectionError, TransformationPipeline};
use chrono::NaiveDate;
use thiserror::Error;
use tracing::{debug, trace};

use crate::ReadError;
use crate::diagnostics::DiagnosticLog;
use crate::reader::{LineReader, split_key};

const HEADER: &str = "HEADER";
const END_HEADER: &str = "END_HEADER";
const LAYER: &str = "LAYER";
const END_LAYER: &str = "END_LAYER";

const VERSION: &str = "VERSION";
const EKATTE: &str = "EKATTE";
const NAME: &str = "NAME";
const PROGRAM: &str = "PROGRAM";
const DATE: &str = "DATE";
const FIRM: &str = "FIRM";
const REFERENCE: &str = "REFERENCE";
const WINDOW: &str = "WINDOW";
const COORDTYPE: &str = "COORDTYPE";
const CONTENTS: &str = "CONTENTS";
const COMMENT: &str = "COMMENT";

/// 线顶点组之间的分隔符。
const VERTEX_SEPARATOR: char = ';';

/// 单条记录或单个图层的可恢复错误。记录到诊断日志后跳过。
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("invalid {kind} record at line {line}")]
    Entity {
        kind: EntityKind,
        line: usize,
        #[source]
        source: EntityError,
    },
    #[error("failed to transform {kind} record at line {line}")]
    Transform {
        kind: EntityKind,
        line: usize,
        #[source]
        source: ProjectionError,
    },
    #[error("layer at line {line} skipped")]
    UnknownLayer {
        line: usize,
        #[source]
        source: NomenclatureError,
    },
}

pub(crate) struct ParsedFile {
    pub(crate) file_info: FileInfo,
    pub(crate) layers: Vec<Layer>,
}

pub(crate) struct CadParser<'a, 'r> {
    reader: LineReader<'a>,
    pipeline: &'r mut TransformationPipeline,
    log: &'r mut DiagnosticLog,
    file_info: FileInfo,
    /// 源坐标系下的绝对窗口角点（西南、东北）。
    window: Option<(Point, Point)>,
    layers: Vec<Layer>,
}

impl<'a, 'r> CadParser<'a, 'r> {
    pub(crate) fn new(
        source: &'a str,
        pipeline: &'r mut TransformationPipeline,
        log: &'r mut DiagnosticLog,
    ) -> Self {
        Self {
            reader: LineReader::new(source),
            pipeline,
            log,
            file_info: FileInfo::new(),
            window: None,
            layers: Vec::new(),
        }
    }

    pub(crate) fn parse(mut self) -> Result<ParsedFile, ReadError> {
        while let Some(line) = self.reader.next_line() {
            let (key, rest) = split_key(line);
            match key {
                HEADER => self.read_header()?,
                LAYER => self.read_layer(rest),
                _ => trace!(
                    line = self.reader.line_number(),
                    key,
                    "skipping line outside of header and layers"
                ),
            }
        }
        self.finish()
    }

    fn read_header(&mut self) -> Result<(), ReadError> {
        loop {
            let Some(line) = self.reader.next_line() else {
                return Err(header_error(
                    self.reader.line_number(),
                    "unexpected end of input before END_HEADER",
                ));
            };
            let line_number = self.reader.line_number();
            let (key, value) = split_key(line);
            match key {
                END_HEADER => return Ok(()),
                VERSION => {
                    let version = self.file_info.set_version(value);
                    if !value.starts_with('4') {
                        return Err(ReadError::UnsupportedVersion {
                            version: value.to_string(),
                        });
                    }
                    debug!(raw = value, ?version, "file version");
                }
                EKATTE => self.file_info.ekatte = value.to_string(),
                NAME => self.file_info.name = value.to_string(),
                PROGRAM => self.file_info.program = value.to_string(),
                FIRM => self.file_info.firm = value.to_string(),
                COMMENT => self.file_info.comment = value.to_string(),
                DATE => {
                    let date = NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|err| {
                        header_error(line_number, format!("invalid DATE \"{value}\": {err}"))
                    })?;
                    self.file_info.date = Some(date);
                }
                REFERENCE => {
                    let [n, e] = parse_numbers(value, REFERENCE, line_number)?;
                    self.file_info.reference_point = Point::planar(n, e);
                }
                WINDOW => {
                    let [n1, e1, n2, e2] = parse_numbers(value, WINDOW, line_number)?;
                    let reference = self.file_info.reference_point;
                    self.window = Some((
                        reference + Point::planar(n1, e1),
                        reference + Point::planar(n2, e2),
                    ));
                }
                COORDTYPE => self.apply_coordtype(value, line_number)?,
                CONTENTS => {
                    let contents = value
                        .parse::<ContentType>()
                        .map_err(|err| header_error(line_number, err.to_string()))?;
                    self.file_info.contents = Some(contents);
                }
                _ => trace!(line = line_number, key, "ignoring header key"),
            }
        }
    }

    /// 固定源坐标系，并按源坐标系下的绝对窗口计算转换参数。
    fn apply_coordtype(&mut self, value: &str, line_number: usize) -> Result<(), ReadError> {
        let source = self.file_info.set_coordtype(value);
        self.pipeline.set_source(source);

        let extent = match &self.window {
            Some((south_west, north_east)) => Extent::from_corners(south_west, north_east),
            None => {
                self.log.log_warning(format!(
                    "COORDTYPE at line {line_number} precedes WINDOW, using the reference point"
                ));
                self.file_info.reference_point.envelope()
            }
        };
        debug!(
            coordtype = value,
            %source,
            target = %self.pipeline.target(),
            "source coordinate system"
        );
        self.pipeline
            .calculate_transformation_parameters(&extent)
            .map_err(|source| ReadError::Parameters {
                line: line_number,
                source,
            })
    }

    fn read_layer(&mut self, name: &str) {
        let start = self.reader.line_number();
        let kind = match name.parse::<LayerKind>() {
            Ok(kind) => kind,
            Err(source) => {
                self.log.log_error_chain(&RecordError::UnknownLayer {
                    line: start,
                    source,
                });
                self.skip_layer();
                return;
            }
        };

        debug!(layer = kind.name(), line = start, "reading layer");
        let mut layer = Layer::new(kind);
        loop {
            let Some(line) = self.reader.next_line() else {
                self.log.log_warning(format!(
                    "layer {kind} starting at line {start} is not terminated by {END_LAYER}"
                ));
                break;
            };
            let (key, rest) = split_key(line);
            if key == END_LAYER {
                break;
            }
            if key == LAYER {
                self.log.log_warning(format!(
                    "layer {kind} starting at line {start} is not terminated by {END_LAYER}"
                ));
                self.reader.push_back(line);
                break;
            }
            let Some(entity_kind) = EntityKind::from_record_key(key) else {
                trace!(line = self.reader.line_number(), key, "ignoring line inside layer");
                continue;
            };
            let line_number = self.reader.line_number();
            if let Err(err) = self.read_record(&mut layer, entity_kind, rest, line_number) {
                self.log.log_error_chain(&err);
            }
        }

        debug!(layer = kind.name(), counts = ?layer.counts(), "layer finished");
        self.layers.push(layer);
    }

    fn skip_layer(&mut self) {
        while let Some(line) = self.reader.next_line() {
            let (key, _) = split_key(line);
            if key == END_LAYER {
                return;
            }
            if key == LAYER {
                self.reader.push_back(line);
                return;
            }
        }
    }

    /// 读取续行直到下一条记录、图层结束或新图层，终止行放回读取器。
    fn read_continuation(&mut self) -> Vec<(usize, &'a str)> {
        let mut body = Vec::new();
        while let Some(line) = self.reader.next_line() {
            let (key, _) = split_key(line);
            if key == END_LAYER || key == LAYER || EntityKind::from_record_key(key).is_some() {
                self.reader.push_back(line);
                break;
            }
            body.push((self.reader.line_number(), line));
        }
        body
    }

    fn read_record(
        &mut self,
        layer: &mut Layer,
        kind: EntityKind,
        rest: &str,
        line: usize,
    ) -> Result<(), RecordError> {
        let values: Vec<&str> = rest.split_whitespace().collect();
        let entity_error = |source| RecordError::Entity { kind, line, source };

        match kind {
            EntityKind::Point => {
                let point = GeoPoint::from_fields(&values).map_err(entity_error)?;
                let entity = self.locate_anchor(point.into(), line)?;
                layer.add_entity(entity);
            }
            EntityKind::Symbol => {
                let symbol = Symbol::from_fields(&values).map_err(entity_error)?;
                let entity = self.locate_anchor(symbol.into(), line)?;
                layer.add_entity(entity);
            }
            EntityKind::Text => {
                let content = self.reader.next_line();
                let mut text = Text::from_fields(&values).map_err(entity_error)?;
                text.set_content(content.unwrap_or_default());
                let entity = self.locate_anchor(text.into(), line)?;
                layer.add_entity(entity);
            }
            EntityKind::Line => {
                let body = self.read_continuation();
                let record = Line::from_fields(&values).map_err(entity_error)?;
                let polyline = self.read_vertices(&body)?;
                let mut entity = Entity::from(record);
                entity.set_geometry(polyline);
                layer.add_entity(entity);
            }
            EntityKind::Contour => {
                let body = self.read_continuation();
                let mut contour = Contour::from_fields(&values).map_err(entity_error)?;
                contour.interior_point = self.locate(&contour.interior_point, kind, line)?;
                for (number, body_line) in &body {
                    let numbers: Vec<&str> = body_line.split_whitespace().collect();
                    contour
                        .push_line_numbers(&numbers)
                        .map_err(|source| RecordError::Entity {
                            kind,
                            line: *number,
                            source,
                        })?;
                }
                let polygon = contour_ring(layer, &contour);
                let mut entity = Entity::from(contour);
                entity.set_geometry(polygon);
                layer.add_entity(entity);
            }
        }
        Ok(())
    }

    fn read_vertices(&self, body: &[(usize, &str)]) -> Result<Polyline, RecordError> {
        let kind = EntityKind::Line;
        let mut vertices = Vec::new();
        for (number, body_line) in body {
            for group in body_line.split(VERTEX_SEPARATOR) {
                let fields: Vec<&str> = group.split_whitespace().collect();
                if fields.is_empty() {
                    continue;
                }
                let relative = Line::parse_vertex(&fields).map_err(|source| RecordError::Entity {
                    kind,
                    line: *number,
                    source,
                })?;
                vertices.push(self.locate(&relative, kind, *number)?);
            }
        }
        Ok(Polyline::new(vertices))
    }

    /// 把实体的原始锚点换算为绝对坐标并转换到目标坐标系。
    fn locate_anchor(&self, mut entity: Entity, line: usize) -> Result<Entity, RecordError> {
        if let Some(relative) = entity.anchor().copied() {
            let point = self.locate(&relative, entity.kind(), line)?;
            entity.set_geometry(point);
        }
        Ok(entity)
    }

    fn locate(&self, relative: &Point, kind: EntityKind, line: usize) -> Result<Point, RecordError> {
        let absolute = self.file_info.reference_point + *relative;
        self.pipeline
            .transform_point(&absolute)
            .map_err(|source| RecordError::Transform { kind, line, source })
    }

    fn finish(mut self) -> Result<ParsedFile, ReadError> {
        let finalize = |source| ReadError::Finalize { source };
        let reference = self
            .pipeline
            .transform_point(&self.file_info.reference_point)
            .map_err(finalize)?;
        self.file_info.reference_point = reference;

        if let Some((south_west, north_east)) = self.window {
            let south_west = self.pipeline.transform_point(&south_west).map_err(finalize)?;
            let north_east = self.pipeline.transform_point(&north_east).map_err(finalize)?;
            self.file_info.window = Extent::from_corners(&south_west, &north_east);
        }
        self.file_info.window_coordinate_system = self.pipeline.target();

        Ok(ParsedFile {
            file_info: self.file_info,
            layers: self.layers,
        })
    }
}

/// 由已转换的线拼出轮廓边界。缺失的线号直接跳过。
fn contour_ring(layer: &Layer, contour: &Contour) -> Polygon {
    let parts: Vec<Polyline> = contour
        .line_numbers
        .iter()
        .filter_map(|number| layer.find_line(*number))
        .filter_map(Line::polyline)
        .cloned()
        .collect();
    match Polygon::assemble(parts.clone()) {
        Ok(polygon) => polygon,
        Err(err) => {
            debug!(
                contour = %contour.identifier,
                error = %err,
                "contour ring not assembled, concatenating parts in order"
            );
            Polygon::from_parts(parts)
        }
    }
}

fn header_error(line: usize, message: impl Into<String>) -> ReadError {
    ReadError::Header {
        line,
        message: message.into(),
    }
}

fn parse_numbers<const N: usize>(
    raw: &str,
    key: &str,
    line: usize,
) -> Result<[f64; N], ReadError> {
    let mut values = [0.0; N];
    let mut tokens = raw.split_whitespace();
    for slot in values.iter_mut() {
        let token = tokens
            .next()
            .ok_or_else(|| header_error(line, format!("{key} expects {N} numbers, got \"{raw}\"")))?;
        *slot = token.parse::<f64>().map_err(|_| {
            header_error(line, format!("{key} value \"{token}\" is not a number"))
        })?;
    }
    Ok(values)
}
