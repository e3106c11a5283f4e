//! 地籍交换文件（CAD v4）读取器。

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use cad4_core::{CoordinateSystem, FileInfo, Layer, LayerKind};
use cad4_projection::{ProjectionError, TransformationPipeline};
use thiserror::Error;
use tracing::{info, warn};

mod diagnostics;
mod parser;
mod reader;

pub use diagnostics::{DiagnosticLog, LogEntry, Severity, error_chain};
pub use parser::RecordError;

use parser::CadParser;

#[derive(Debug, Error)]
pub enum ReadError {
    #[error("failed to read file {path:?}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Only CAD files v4 are supported")]
    UnsupportedVersion { version: String },
    #[error("invalid header at line {line}: {message}")]
    Header { line: usize, message: String },
    #[error("failed to calculate transformation parameters at line {line}")]
    Parameters {
        line: usize,
        #[source]
        source: ProjectionError,
    },
    #[error("failed to transform reference point and window")]
    Finalize {
        #[source]
        source: ProjectionError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported text encoding `{0}`")]
pub struct ParseEncodingError(pub String);

/// 输入文本的字符编码。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextEncoding {
    #[default]
    Utf8,
    Windows1251,
}

impl TextEncoding {
    pub fn encoding(self) -> &'static encoding_rs::Encoding {
        match self {
            TextEncoding::Utf8 => encoding_rs::UTF_8,
            TextEncoding::Windows1251 => encoding_rs::WINDOWS_1251,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "utf-8",
            TextEncoding::Windows1251 => "windows-1251",
        }
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TextEncoding {
    type Err = ParseEncodingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Ok(TextEncoding::Utf8),
            "windows-1251" | "cp1251" => Ok(TextEncoding::Windows1251),
            _ => Err(ParseEncodingError(s.to_string())),
        }
    }
}

/// 一个 CAD v4 文件：原始字节、转换管线与读取结果。
///
/// 每个实例拥有自己的管线与诊断日志，不同文件可在不同线程上读取。
#[derive(Debug)]
pub struct CadFile {
    source: Vec<u8>,
    path: Option<PathBuf>,
    encoding: TextEncoding,
    pipeline: TransformationPipeline,
    file_info: FileInfo,
    layers: Vec<Layer>,
    log: DiagnosticLog,
}

impl CadFile {
    /// 打开文件。文件不可读时立即失败。
    pub fn open(path: impl AsRef<Path>, target: CoordinateSystem) -> Result<Self, ReadError> {
        let path = path.as_ref();
        let source = fs::read(path).map_err(|source| ReadError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let mut file = Self::from_bytes(source, target);
        file.path = Some(path.to_path_buf());
        Ok(file)
    }

    pub fn from_bytes(bytes: impl Into<Vec<u8>>, target: CoordinateSystem) -> Self {
        Self {
            source: bytes.into(),
            path: None,
            encoding: TextEncoding::default(),
            pipeline: TransformationPipeline::new(target),
            file_info: FileInfo::new(),
            layers: Vec::new(),
            log: DiagnosticLog::new(),
        }
    }

    pub fn with_encoding(mut self, encoding: TextEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// 使用自定义管线（引擎、控制点、最小跨度）。管线的目标坐标系取代构造时给出的目标。
    pub fn with_pipeline(mut self, pipeline: TransformationPipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn encoding(&self) -> TextEncoding {
        self.encoding
    }

    pub fn target(&self) -> CoordinateSystem {
        self.pipeline.target()
    }

    pub fn pipeline(&self) -> &TransformationPipeline {
        &self.pipeline
    }

    /// 从头解析缓存的字节。致命错误之前写入的日志在失败后仍可查看。
    pub fn read_file(&mut self) -> Result<(), ReadError> {
        self.log.reset();
        self.pipeline.reset();
        self.file_info = FileInfo::new();
        self.layers.clear();

        info!(
            path = ?self.path,
            bytes = self.source.len(),
            encoding = %self.encoding,
            target = %self.pipeline.target(),
            "reading CAD file"
        );
        self.log
            .log_info(format!("Reading CAD file: length={}", self.source.len()));

        let (text, had_errors) = self
            .encoding
            .encoding()
            .decode_with_bom_removal(&self.source);
        if had_errors {
            warn!(encoding = %self.encoding, "input contains malformed byte sequences");
            self.log.log_warning(format!(
                "input is not valid {}, malformed sequences were replaced",
                self.encoding
            ));
        }

        match CadParser::new(&text, &mut self.pipeline, &mut self.log).parse() {
            Ok(parsed) => {
                self.file_info = parsed.file_info;
                self.layers = parsed.layers;
                self.log.log_info("Finished");
                Ok(())
            }
            Err(err) => {
                self.log.log_error_chain(&err);
                Err(err)
            }
        }
    }

    pub fn file_info(&self) -> &FileInfo {
        &self.file_info
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn layer(&self, kind: LayerKind) -> Option<&Layer> {
        self.layers.iter().find(|layer| layer.kind() == kind)
    }

    pub fn log(&self) -> &DiagnosticLog {
        &self.log
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoding_labels_parse() {
        assert_eq!("UTF-8".parse::<TextEncoding>(), Ok(TextEncoding::Utf8));
        assert_eq!("cp1251".parse::<TextEncoding>(), Ok(TextEncoding::Windows1251));
        assert_eq!(
            TextEncoding::Windows1251.to_string().parse::<TextEncoding>(),
            Ok(TextEncoding::Windows1251)
        );
        assert!("latin1".parse::<TextEncoding>().is_err());
    }

    #[test]
    fn open_fails_for_missing_file() {
        let err = CadFile::open("/no/such/file.cad", CoordinateSystem::Unknown).unwrap_err();
        assert!(matches!(err, ReadError::Open { .. }));
    }
}
