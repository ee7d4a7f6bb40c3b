//! 各子命令的执行流程：加载文档 → 建模 → 引擎运算 → 写出结果，
//! 并逐条汇报批处理的跳过项。

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use tracing::{info, warn};

use railcad_config::AppConfig;
use railcad_core::document::{Document, Entity};
use railcad_core::geometry::Point2;
use railcad_engine::alignment::Alignment;
use railcad_engine::report::BatchOutcome;
use railcad_engine::{annotate, crossing, extract, rooms};
use railcad_io::table::{self, RoomRow};
use railcad_io::{DocumentLoader, DocumentSaver, DxfFacade};

pub fn run_crossings(
    config: &AppConfig,
    dxf: &Path,
    out: Option<PathBuf>,
) -> anyhow::Result<()> {
    let document = load_document(dxf)?;
    let alignment = build_alignment(&document, config)?;
    let features = extract::crossing_features(
        &document,
        &config.crossing.layer_prefix,
        &config.crossing.remark_separator,
    );
    if features.is_empty() {
        bail!(
            "未发现任何以 {} 开头的图层，终止计算",
            config.crossing.layer_prefix
        );
    }

    let outcome = crossing::resolve_crossings(&alignment, &features, config.rails.epsilon);
    report_outcome("交叉解算", &outcome);

    let out = out.unwrap_or_else(|| sibling(dxf, "crossings.csv"));
    table::write_crossing_table(&out, &outcome.records)
        .with_context(|| format!("写出交叉记录表 {} 失败", out.display()))?;
    info!(path = %out.display(), records = outcome.records.len(), "交叉记录表已写出");
    Ok(())
}

pub fn run_annotate(
    config: &AppConfig,
    dxf: &Path,
    table_path: &Path,
    out: Option<PathBuf>,
) -> anyhow::Result<()> {
    let mut document = load_document(dxf)?;
    let alignment = build_alignment(&document, config)?;

    let parsed = table::read_mileage_angle_table(table_path)
        .with_context(|| format!("读取里程-角度表 {} 失败", table_path.display()))?;
    for (line, reason) in &parsed.skipped {
        warn!(line, reason = %reason, "表格行已跳过");
    }

    let outcome = annotate::synthesize_batch(&alignment, &parsed.rows, config.annotation.length);
    report_outcome("标注合成", &outcome);

    for points in &outcome.records {
        document.add_polyline([points[0], points[1]], false, config.annotation.layer.clone());
    }

    let out = out.unwrap_or_else(|| stem_suffixed(dxf, "_with_annotations"));
    DxfFacade::new()
        .save(&document, &out)
        .with_context(|| format!("写出标注文件 {} 失败", out.display()))?;
    info!(path = %out.display(), annotations = outcome.records.len(), "标注已写出");
    Ok(())
}

pub fn run_connect(
    config: &AppConfig,
    dxf: &Path,
    mileages: &Path,
    target: Option<&str>,
    out: Option<PathBuf>,
) -> anyhow::Result<()> {
    let mut document = load_document(dxf)?;
    let alignment = build_alignment(&document, config)?;

    let list = table::read_mileage_list(mileages)
        .with_context(|| format!("读取里程列表 {} 失败", mileages.display()))?;
    for (line, reason) in &list.skipped {
        warn!(line, reason = %reason, "里程记号已跳过");
    }

    let target = match target {
        Some(raw) => parse_target(raw)?,
        None => Point2::new(config.connect.target[0], config.connect.target[1]),
    };

    let outcome = annotate::connect_batch(&alignment, &list.rows, target);
    report_outcome("连接线绘制", &outcome);

    for points in &outcome.records {
        document.add_polyline([points[0], points[1]], false, config.connect.layer.clone());
    }

    let out = out.unwrap_or_else(|| stem_suffixed(dxf, "_connected"));
    DxfFacade::new()
        .save(&document, &out)
        .with_context(|| format!("写出连接线文件 {} 失败", out.display()))?;
    info!(path = %out.display(), connections = outcome.records.len(), "连接线已写出");
    Ok(())
}

pub fn run_rooms(
    config: &AppConfig,
    rail_dxf: &Path,
    room_dxf: &Path,
    out: Option<PathBuf>,
) -> anyhow::Result<()> {
    let rail_document = load_document(rail_dxf)?;
    let alignment = build_alignment(&rail_document, config)?;
    let room_document = load_document(room_dxf)?;
    let (regions, labels) = extract::regions_and_labels(&room_document, &config.rooms.layer);
    if regions.is_empty() {
        bail!("图层 {} 上没有封闭多段线", config.rooms.layer);
    }

    let outcome = rooms::extract_labels(&regions, &labels, &alignment);
    report_outcome("标签提取", &outcome);

    let rows: Vec<RoomRow> = outcome
        .records
        .iter()
        .map(|matched| RoomRow {
            text: matched.content.clone(),
            outline: outline_string(&regions[matched.region_index].vertices),
            mileage_m: matched.projection.mileage,
        })
        .collect();

    let out = out.unwrap_or_else(|| sibling(room_dxf, "rooms.csv"));
    table::write_room_table(&out, &rows)
        .with_context(|| format!("写出房屋标签表 {} 失败", out.display()))?;
    info!(path = %out.display(), rows = rows.len(), "房屋标签表已写出");
    Ok(())
}

pub fn run_regions(
    config: &AppConfig,
    rail_dxf: &Path,
    room_dxf: &Path,
    out: Option<PathBuf>,
) -> anyhow::Result<()> {
    let rail_document = load_document(rail_dxf)?;
    let alignment = build_alignment(&rail_document, config)?;
    let room_document = load_document(room_dxf)?;
    let (regions, _) = extract::regions_and_labels(&room_document, &config.rooms.layer);
    if regions.is_empty() {
        bail!("图层 {} 上没有封闭多段线", config.rooms.layer);
    }

    let records = rooms::region_info(&regions, &alignment);
    info!(processed = regions.len(), succeeded = records.len(), "区域统计完成");

    let out = out.unwrap_or_else(|| sibling(room_dxf, "regions.csv"));
    table::write_region_table(&out, &records)
        .with_context(|| format!("写出区域统计表 {} 失败", out.display()))?;
    info!(path = %out.display(), rows = records.len(), "区域统计表已写出");
    Ok(())
}

pub fn run_stats(dxf: &Path) -> anyhow::Result<()> {
    let document = load_document(dxf)?;
    let entity_count = document.entities().count();
    let layer_count = document.layers().count();
    let text_count = document
        .entities()
        .filter(|(_, entity)| matches!(entity, Entity::Text(_)))
        .count();
    info!(entity_count, layer_count, text_count, "文档统计");

    println!("文档 {}", dxf.display());
    println!("  实体 {entity_count} 个，图层 {layer_count} 个，TEXT {text_count} 个");
    for layer in document.layers() {
        let on_layer = document.entities_on_layer(&layer.name).count();
        println!("  - {}（{} 个实体）", layer.name, on_layer);
    }
    Ok(())
}

fn load_document(path: &Path) -> anyhow::Result<Document> {
    let document = DxfFacade::new()
        .load(path)
        .with_context(|| format!("读取 DXF 文件 {} 失败", path.display()))?;
    info!(path = %path.display(), entities = document.entities().count(), "DXF 已加载");
    Ok(document)
}

/// 建立中心线里程模型。建模失败是致命错误：没有有效的
/// 中心线就无法产出任何里程。
fn build_alignment(document: &Document, config: &AppConfig) -> anyhow::Result<Alignment> {
    let segments = extract::rail_segments(document, &config.rails.layers);
    let alignment = Alignment::build(segments, &config.rails.layers, config.rails.epsilon)
        .context("中心线建模失败")?;
    info!(
        segments = alignment.segments().len(),
        total_length = alignment.total_length(),
        "中心线建模完成"
    );
    Ok(alignment)
}

/// 统一汇报批处理结果：处理数、成功数，以及逐条跳过原因。
fn report_outcome<T>(operation: &str, outcome: &BatchOutcome<T>) {
    info!(
        operation,
        processed = outcome.processed,
        succeeded = outcome.succeeded(),
        skipped = outcome.skipped.len(),
        "批处理完成"
    );
    for skipped in &outcome.skipped {
        warn!(operation, item = %skipped.item, reason = %skipped.reason, "输入项已跳过");
    }
}

fn parse_target(raw: &str) -> anyhow::Result<Point2> {
    let mut parts = raw.split(',');
    let (Some(x), Some(y), None) = (parts.next(), parts.next(), parts.next()) else {
        bail!("目标坐标格式应为 \"X,Y\"：{raw}");
    };
    let x: f64 = x.trim().parse().with_context(|| format!("无法解析目标 X：{raw}"))?;
    let y: f64 = y.trim().parse().with_context(|| format!("无法解析目标 Y：{raw}"))?;
    Ok(Point2::new(x, y))
}

fn outline_string(vertices: &[Point2]) -> String {
    vertices
        .iter()
        .map(|point| format!("{:.3},{:.3}", point.x(), point.y()))
        .collect::<Vec<_>>()
        .join(";")
}

/// `<目录>/<文件主名>.<suffix>`，例如 break.dxf → break.crossings.csv。
fn sibling(input: &Path, suffix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "output".to_string());
    input.with_file_name(format!("{stem}.{suffix}"))
}

/// `<目录>/<文件主名><suffix>.dxf`，例如 break.dxf → break_connected.dxf。
fn stem_suffixed(input: &Path, suffix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "output".to_string());
    input.with_file_name(format!("{stem}{suffix}.dxf"))
}
