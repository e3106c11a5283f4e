use std::fs;
use std::path::PathBuf;

use cad4_core::{ContentType, CoordinateSystem};
use cad4_io::{CadFile, Severity};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct GoldenSummary {
    version: String,
    ekatte: String,
    name: String,
    date: Option<NaiveDate>,
    coordinate_system: CoordinateSystem,
    contents: Option<ContentType>,
    reference: [f64; 2],
    window: [f64; 4],
    layers: Vec<GoldenLayer>,
    diagnostics: GoldenDiagnostics,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct GoldenLayer {
    name: String,
    points: usize,
    lines: usize,
    contours: usize,
    symbols: usize,
    texts: usize,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct GoldenDiagnostics {
    info: usize,
    warning: usize,
    error: usize,
}

fn data_path(name: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests/data");
    path.push(name);
    path
}

fn summarize(file: &CadFile) -> GoldenSummary {
    let info = file.file_info();
    GoldenSummary {
        version: info.raw_version.clone(),
        ekatte: info.ekatte.clone(),
        name: info.name.clone(),
        date: info.date,
        coordinate_system: info.coordinate_system,
        contents: info.contents,
        reference: [info.reference_point.n(), info.reference_point.e()],
        window: [
            info.window.min_n(),
            info.window.min_e(),
            info.window.max_n(),
            info.window.max_e(),
        ],
        layers: file
            .layers()
            .iter()
            .map(|layer| {
                let counts = layer.counts();
                GoldenLayer {
                    name: layer.name().to_string(),
                    points: counts.points,
                    lines: counts.lines,
                    contours: counts.contours,
                    symbols: counts.symbols,
                    texts: counts.texts,
                }
            })
            .collect(),
        diagnostics: GoldenDiagnostics {
            info: file.log().count(Severity::Info),
            warning: file.log().count(Severity::Warning),
            error: file.log().count(Severity::Error),
        },
    }
}

#[test]
fn kokalyane_matches_golden_summary() {
    let mut file = CadFile::open(data_path("kokalyane.cad"), CoordinateSystem::Unknown)
        .expect("打开测试文件失败");
    file.read_file().expect("读取测试文件失败");

    let golden_text =
        fs::read_to_string(data_path("kokalyane.golden.json")).expect("读取 golden 文件失败");
    let expected: GoldenSummary = serde_json::from_str(&golden_text).expect("解析 golden 文件失败");
    let actual = summarize(&file);
    assert_eq!(actual, expected);
}

#[test]
fn file_info_serializes_with_system_tokens() {
    let mut file = CadFile::open(data_path("kokalyane.cad"), CoordinateSystem::Bgs1970K9)
        .expect("打开测试文件失败");
    file.read_file().expect("读取测试文件失败");

    let value: Value = serde_json::to_value(file.file_info()).expect("序列化文件头失败");
    assert_eq!(value["coordinate_system"], Value::from("bgs-1970-k9"));
    assert_eq!(value["window_coordinate_system"], Value::from("bgs-1970-k9"));
    assert_eq!(value["date"], Value::from("2019-03-15"));
    assert_eq!(value["coordtype"], Value::from("1970, Балтийска, K9"));
}
