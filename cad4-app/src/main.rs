use std::path::PathBuf;
use std::process::ExitCode;

use cad4_config::{AppConfig, ConfigError};
use cad4_core::{CoordinateSystem, Extent};
use cad4_io::{CadFile, TextEncoding};
use cad4_projection::{ControlPointSet, GeodeticEngine, TransformationPipeline};
use clap::Parser;
use serde_json::{Value, json};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

/// 读取 CAD v4 地籍文件并输出摘要。
#[derive(Parser, Debug)]
#[command(name = "cad4", author, version, about, long_about = None)]
struct Args {
    /// 输入的 CAD 文件
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// 目标坐标系（如 bgs-2005-kk、utm35n 或数值代码），缺省时不做转换
    #[arg(short, long)]
    target: Option<CoordinateSystem>,

    /// 输入编码（utf-8 或 windows-1251）
    #[arg(short, long)]
    encoding: Option<TextEncoding>,

    /// 配置文件路径
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// 按范围检索实体：MIN_N MIN_E MAX_N MAX_E（目标坐标系）
    #[arg(
        long,
        num_args = 4,
        value_names = ["MIN_N", "MIN_E", "MAX_N", "MAX_E"],
        allow_negative_numbers = true
    )]
    extent: Option<Vec<f64>>,

    /// 以 JSON 输出文件头、图层统计与诊断日志
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let config = load_configuration(args.config.clone());
    init_logging(&config);
    info!("启动 CAD v4 读取器");

    let encoding = match args.encoding {
        Some(encoding) => encoding,
        None => config.reader.encoding.parse().unwrap_or_else(|err| {
            warn!(error = %err, "配置中的编码无效，使用 UTF-8");
            TextEncoding::Utf8
        }),
    };
    let target = args.target.or(config.reader.target).unwrap_or_default();

    let pipeline = match build_pipeline(&config, target) {
        Ok(pipeline) => pipeline,
        Err(err) => {
            error!(error = %err, "无法加载控制点");
            return ExitCode::FAILURE;
        }
    };

    let mut file = match CadFile::open(&args.input, target) {
        Ok(file) => file.with_encoding(encoding).with_pipeline(pipeline),
        Err(err) => {
            error!(path = %args.input.display(), error = %err, "无法打开文件");
            return ExitCode::FAILURE;
        }
    };

    let result = file.read_file();
    if args.json {
        match serde_json::to_string_pretty(&json_report(&file, result.is_ok())) {
            Ok(text) => println!("{text}"),
            Err(err) => error!(error = %err, "无法序列化报告"),
        }
    } else {
        if result.is_ok() {
            print_summary(&file);
            if let Some(values) = &args.extent {
                print_search(&file, values);
            }
        }
        println!("-- log ({} entries) --", file.log().len());
        for entry in file.log() {
            println!("{entry}");
        }
    }

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(path = %args.input.display(), error = %err, "读取失败");
            ExitCode::FAILURE
        }
    }
}

fn build_pipeline(
    config: &AppConfig,
    target: CoordinateSystem,
) -> Result<TransformationPipeline, cad4_projection::ProjectionError> {
    let mut engine = GeodeticEngine::new();
    if let Some(path) = &config.projection.control_points {
        let control_points = ControlPointSet::load(path)?;
        info!(path = %path.display(), count = control_points.len(), "已加载控制点");
        engine = engine.with_control_points(control_points);
    }
    Ok(TransformationPipeline::new(target)
        .with_engine(engine)
        .with_min_span(config.projection.min_span))
}

fn print_summary(file: &CadFile) {
    let header = file.file_info();
    println!("version:  {}", header.raw_version);
    println!("ekatte:   {}", header.ekatte);
    println!("name:     {}", header.name);
    println!("program:  {}", header.program);
    if let Some(date) = header.date {
        println!("date:     {}", date.format("%d.%m.%Y"));
    }
    println!("firm:     {}", header.firm);
    println!(
        "coordtype: {} ({})",
        header.coordtype, header.coordinate_system
    );
    println!(
        "reference: N={:.3} E={:.3} [{}]",
        header.reference_point.n(),
        header.reference_point.e(),
        header.reference_point.coordinate_system()
    );
    println!(
        "window:   N {:.3}..{:.3} E {:.3}..{:.3} [{}]",
        header.window.min_n(),
        header.window.max_n(),
        header.window.min_e(),
        header.window.max_e(),
        header.window_coordinate_system
    );
    if let Some(contents) = header.contents {
        println!("contents: {contents:?}");
    }

    for layer in file.layers() {
        let counts = layer.counts();
        println!(
            "layer {}: {} entities (P={} L={} C={} S={} T={})",
            layer.name(),
            counts.total(),
            counts.points,
            counts.lines,
            counts.contours,
            counts.symbols,
            counts.texts
        );
    }
}

fn json_report(file: &CadFile, complete: bool) -> Value {
    let layers: Vec<Value> = file
        .layers()
        .iter()
        .map(|layer| {
            let counts = layer.counts();
            json!({
                "name": layer.name(),
                "points": counts.points,
                "lines": counts.lines,
                "contours": counts.contours,
                "symbols": counts.symbols,
                "texts": counts.texts,
            })
        })
        .collect();
    json!({
        "complete": complete,
        "file_info": if complete { json!(file.file_info()) } else { Value::Null },
        "layers": layers,
        "log": file.log().entries(),
    })
}

fn print_search(file: &CadFile, values: &[f64]) {
    let [min_n, min_e, max_n, max_e] = values else {
        warn!(count = values.len(), "范围参数数量不正确");
        return;
    };
    let extent = Extent::new(*min_n, *min_e, *max_n, *max_e);
    for layer in file.layers() {
        let hits = layer.search_extent(&extent);
        println!("search {}: {} hits", layer.name(), hits.len());
    }
}

fn load_configuration(override_path: Option<PathBuf>) -> AppConfig {
    match override_path {
        Some(path) => AppConfig::from_file(&path).unwrap_or_else(|err| {
            warn!(path = %path.display(), error = %err, "加载指定配置失败，使用默认配置");
            AppConfig::default()
        }),
        None => match AppConfig::discover() {
            Ok(cfg) => cfg,
            Err(err) => {
                match &err {
                    ConfigError::Io { path, .. } | ConfigError::Parse { path, .. } => {
                        warn!(path = %path.display(), error = %err, "加载默认配置失败，使用内建默认值");
                    }
                    ConfigError::Context { .. } => {
                        warn!(error = %err, "加载默认配置失败，使用内建默认值");
                    }
                }
                AppConfig::default()
            }
        },
    }
}

fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_new(config.logging.level.clone()).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(filter).with_writer(std::io::stderr);
    if subscriber.try_init().is_err() {
        // 已初始化，忽略
    }
}
