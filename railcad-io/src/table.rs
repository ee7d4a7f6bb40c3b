//! 表格边界：里程-角度记录的 CSV 读写与度分文本转换。
//! 角度在引擎内部一律为十进制度，度分形式只在这里出现。

use std::fs;
use std::path::Path;

use railcad_core::records::{MileageAngleRecord, RegionRecord};
use serde::Serialize;

use crate::IoError;

/// 把十进制度格式化为度分文本（分四舍五入为整数，60′ 进位），
/// 例如 12.5 → `12°30'`，-0.994 → `-1°0'`。
pub fn format_angle_dm(angle_deg: f64) -> String {
    let sign = if angle_deg < 0.0 { "-" } else { "" };
    let magnitude = angle_deg.abs();
    let mut degrees = magnitude.trunc() as i64;
    let mut minutes = ((magnitude - degrees as f64) * 60.0).round() as i64;
    if minutes == 60 {
        degrees += 1;
        minutes = 0;
    }
    format!("{sign}{degrees}°{minutes}'")
}

/// 解析表格中的角度列，接受三种写法：
/// 1. 度分文本 `12°30'`；
/// 2. 3~4 位纯数字，末两位作分（`6815` → 68°15′）；
/// 3. 十进制度 `45` / `45.5`。
pub fn parse_angle_dm(raw: &str) -> Result<f64, IoError> {
    let s = raw.trim();
    if s.is_empty() {
        return Err(IoError::InvalidTable("角度为空".to_string()));
    }

    if let Some(idx) = s.find('°') {
        let degrees_part = s[..idx].trim();
        let minutes_part = s[idx + '°'.len_utf8()..]
            .trim()
            .trim_end_matches(['\'', '′'])
            .trim();
        let negative = degrees_part.starts_with('-');
        let degrees: f64 = degrees_part.parse().map_err(|_| {
            IoError::InvalidTable(format!("无法解析角度的度数部分：{raw}"))
        })?;
        let minutes: f64 = if minutes_part.is_empty() {
            0.0
        } else {
            minutes_part.parse().map_err(|_| {
                IoError::InvalidTable(format!("无法解析角度的分数部分：{raw}"))
            })?
        };
        let magnitude = degrees.abs() + minutes / 60.0;
        return Ok(if negative { -magnitude } else { magnitude });
    }

    if s.chars().all(|c| c.is_ascii_digit()) && (3..=4).contains(&s.len()) {
        let split = s.len() - 2;
        let degrees: f64 = s[..split]
            .parse()
            .map_err(|_| IoError::InvalidTable(format!("无法解析角度格式：{raw}")))?;
        let minutes: f64 = s[split..]
            .parse()
            .map_err(|_| IoError::InvalidTable(format!("无法解析角度格式：{raw}")))?;
        return Ok(degrees + minutes / 60.0);
    }

    s.parse::<f64>()
        .map_err(|_| IoError::InvalidTable(format!("无法解析角度格式：{raw}")))
}

#[derive(Debug, Serialize)]
struct CrossingRow {
    #[serde(rename = "Mileage_m")]
    mileage_m: String,
    #[serde(rename = "Angle")]
    angle: String,
    #[serde(rename = "Remark")]
    remark: String,
}

/// 写出交叉记录表：`Mileage_m, Angle, Remark`，
/// 里程保留 3 位小数，角度为度分文本。
pub fn write_crossing_table(
    path: &Path,
    records: &[MileageAngleRecord],
) -> Result<(), IoError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for record in records {
        writer
            .serialize(CrossingRow {
                mileage_m: format!("{:.3}", record.mileage_m),
                angle: format_angle_dm(record.angle_deg),
                remark: record.remark.clone(),
            })
            .map_err(|err| IoError::InvalidTable(err.to_string()))?;
    }
    flush_to_file(writer, path)
}

/// 房屋标签表的一行：文字内容、区域轮廓串、里程。
#[derive(Debug, Serialize)]
pub struct RoomRow {
    #[serde(rename = "text")]
    pub text: String,
    #[serde(rename = "polyline")]
    pub outline: String,
    #[serde(rename = "mileage_m")]
    pub mileage_m: f64,
}

pub fn write_room_table(path: &Path, rows: &[RoomRow]) -> Result<(), IoError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer
            .serialize(RoomRow {
                text: row.text.clone(),
                outline: row.outline.clone(),
                mileage_m: (row.mileage_m * 1_000.0).round() / 1_000.0,
            })
            .map_err(|err| IoError::InvalidTable(err.to_string()))?;
    }
    flush_to_file(writer, path)
}

#[derive(Debug, Serialize)]
struct RegionRow {
    mileage_m: String,
    min_vertex_dist: String,
    area: String,
}

/// 写出区域统计表：`mileage_m, min_vertex_dist, area`，各 3 位小数。
pub fn write_region_table(path: &Path, records: &[RegionRecord]) -> Result<(), IoError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for record in records {
        writer
            .serialize(RegionRow {
                mileage_m: record
                    .mileage_m
                    .map(|v| format!("{v:.3}"))
                    .unwrap_or_default(),
                min_vertex_dist: record
                    .min_vertex_dist
                    .map(|v| format!("{v:.3}"))
                    .unwrap_or_default(),
                area: format!("{:.3}", record.area),
            })
            .map_err(|err| IoError::InvalidTable(err.to_string()))?;
    }
    flush_to_file(writer, path)
}

fn flush_to_file(writer: csv::Writer<Vec<u8>>, path: &Path) -> Result<(), IoError> {
    let buffer = writer
        .into_inner()
        .map_err(|err| IoError::InvalidTable(err.to_string()))?;
    fs::write(path, buffer).map_err(|source| IoError::WriteError {
        path: path.to_path_buf(),
        source,
    })
}

/// 读取的表格内容 + 逐行跳过原因（行号从 1 起，含表头行计数）。
#[derive(Debug)]
pub struct TableOutcome<T> {
    pub rows: Vec<T>,
    pub skipped: Vec<(usize, String)>,
}

impl<T> Default for TableOutcome<T> {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            skipped: Vec::new(),
        }
    }
}

/// 读取里程-角度表（CSV，首行表头）：第 0 列里程（米），
/// 第 1 列角度（三种写法见 [`parse_angle_dm`]），第 2 列备注可选。
/// 无法解析的行逐条跳过并记录，不中断整表。
pub fn read_mileage_angle_table(
    path: &Path,
) -> Result<TableOutcome<MileageAngleRecord>, IoError> {
    let content = fs::read_to_string(path).map_err(|source| IoError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = csv::Reader::from_reader(content.as_bytes());
    let mut outcome = TableOutcome::default();
    for (index, row) in reader.records().enumerate() {
        let line = index + 2;
        let row = match row {
            Ok(row) => row,
            Err(err) => {
                outcome.skipped.push((line, format!("行读取失败：{err}")));
                continue;
            }
        };
        let Some(mileage_raw) = row.get(0) else {
            outcome.skipped.push((line, "缺少里程列".to_string()));
            continue;
        };
        let mileage: f64 = match mileage_raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                outcome
                    .skipped
                    .push((line, format!("无法解析里程：{mileage_raw}")));
                continue;
            }
        };
        let Some(angle_raw) = row.get(1) else {
            outcome.skipped.push((line, "缺少角度列".to_string()));
            continue;
        };
        let angle = match parse_angle_dm(angle_raw) {
            Ok(value) => value,
            Err(err) => {
                outcome.skipped.push((line, err.to_string()));
                continue;
            }
        };
        let remark = row.get(2).unwrap_or("").to_string();
        outcome
            .rows
            .push(MileageAngleRecord::new(mileage, angle, remark));
    }
    Ok(outcome)
}

/// 读取里程列表：每行一个或多个里程值，逗号/空白分隔，
/// 无法解析的记号逐个记录。
pub fn read_mileage_list(path: &Path) -> Result<TableOutcome<f64>, IoError> {
    let content = fs::read_to_string(path).map_err(|source| IoError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;
    let mut outcome = TableOutcome::default();
    for (index, line) in content.lines().enumerate() {
        for token in line.split([',', ' ', '\t']).map(str::trim) {
            if token.is_empty() {
                continue;
            }
            match token.parse::<f64>() {
                Ok(value) => outcome.rows.push(value),
                Err(_) => outcome
                    .skipped
                    .push((index + 1, format!("无法解析里程：{token}"))),
            }
        }
    }
    Ok(outcome)
}
