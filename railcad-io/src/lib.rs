pub mod table;

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use railcad_core::document::{Document, Entity, PolylineVertex};
use railcad_core::geometry::Point2;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IoError {
    #[error("failed to read file {path:?}: {source}")]
    ReadError {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write file {path:?}: {source}")]
    WriteError {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid document structure: {0}")]
    InvalidDocument(String),
    #[error("invalid table content: {0}")]
    InvalidTable(String),
}

pub trait DocumentLoader {
    fn load(&self, path: &Path) -> Result<Document, IoError>;
}

pub trait DocumentSaver {
    fn save(&self, document: &Document, path: &Path) -> Result<(), IoError>;
}

/// DXF 读写门面。读取只保留里程工具链消费的实体子集，
/// 写出同一子集（足够被本读取器及常见制图软件重新打开）。
pub struct DxfFacade;

impl DxfFacade {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DxfFacade {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentLoader for DxfFacade {
    fn load(&self, path: &Path) -> Result<Document, IoError> {
        let data = fs::read_to_string(path).map_err(|source| IoError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        let parser = DxfParser::new(&data);
        parser
            .parse()
            .map_err(|err| IoError::InvalidDocument(err.message))
    }
}

impl DocumentSaver for DxfFacade {
    fn save(&self, document: &Document, path: &Path) -> Result<(), IoError> {
        let content = render_dxf(document);
        fs::write(path, content).map_err(|source| IoError::WriteError {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// 生成 ENTITIES 段式 DXF 文本。图层随实体隐式声明。
fn render_dxf(document: &Document) -> String {
    let mut out = String::new();
    push_pair(&mut out, 0, "SECTION");
    push_pair(&mut out, 2, "ENTITIES");
    for (_, entity) in document.entities() {
        match entity {
            Entity::Line(line) => {
                push_pair(&mut out, 0, "LINE");
                push_pair(&mut out, 8, &line.layer);
                push_coord(&mut out, 10, 20, line.start);
                push_coord(&mut out, 11, 21, line.end);
            }
            Entity::Arc(arc) => {
                push_pair(&mut out, 0, "ARC");
                push_pair(&mut out, 8, &arc.layer);
                push_coord(&mut out, 10, 20, arc.center);
                push_pair(&mut out, 40, &format_f64(arc.radius));
                push_pair(&mut out, 50, &format_f64(arc.start_angle.to_degrees()));
                push_pair(&mut out, 51, &format_f64(arc.end_angle.to_degrees()));
            }
            Entity::Polyline(polyline) => {
                push_pair(&mut out, 0, "LWPOLYLINE");
                push_pair(&mut out, 8, &polyline.layer);
                push_pair(&mut out, 90, &polyline.vertices.len().to_string());
                push_pair(&mut out, 70, if polyline.is_closed { "1" } else { "0" });
                for vertex in &polyline.vertices {
                    push_coord(&mut out, 10, 20, vertex.position);
                    if vertex.bulge.abs() > 0.0 {
                        push_pair(&mut out, 42, &format_f64(vertex.bulge));
                    }
                }
            }
            Entity::Text(text) => {
                push_pair(&mut out, 0, "TEXT");
                push_pair(&mut out, 8, &text.layer);
                push_coord(&mut out, 10, 20, text.insert);
                push_pair(&mut out, 40, &format_f64(text.height));
                push_pair(&mut out, 50, &format_f64(text.rotation.to_degrees()));
                push_pair(&mut out, 1, &text.content);
            }
        }
    }
    push_pair(&mut out, 0, "ENDSEC");
    push_pair(&mut out, 0, "EOF");
    out
}

fn push_pair(out: &mut String, code: i32, value: &str) {
    let _ = writeln!(out, "{code}");
    let _ = writeln!(out, "{value}");
}

fn push_coord(out: &mut String, x_code: i32, y_code: i32, point: Point2) {
    push_pair(out, x_code, &format_f64(point.x()));
    push_pair(out, y_code, &format_f64(point.y()));
}

fn format_f64(value: f64) -> String {
    // Rust 默认输出最短可回读表示，读取侧按 f64 解析无损。
    format!("{value}")
}

/// 解析期内部错误，出口处统一映射为 [`IoError::InvalidDocument`]。
#[derive(Debug)]
struct DxfError {
    message: String,
}

impl DxfError {
    fn invalid(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

struct DxfParser<'a> {
    reader: DxfReader<'a>,
}

impl<'a> DxfParser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            reader: DxfReader::new(source),
        }
    }

    fn parse(mut self) -> Result<Document, DxfError> {
        let mut document = Document::new();
        while let Some((code, value)) = self.reader.next_pair()? {
            if code != 0 {
                return Err(DxfError::invalid(format!(
                    "意外的组码 {code}（期望 0 表示 SECTION/EOF）"
                )));
            }
            match value.as_str() {
                "SECTION" => {
                    let (name_code, name) = self
                        .reader
                        .next_pair()?
                        .ok_or_else(|| DxfError::invalid("SECTION 缺少名称（组码 2）"))?;
                    if name_code != 2 {
                        return Err(DxfError::invalid(format!(
                            "SECTION 名称使用了组码 {name_code}（期望 2）"
                        )));
                    }
                    match name.as_str() {
                        "ENTITIES" => self.parse_entities(&mut document)?,
                        _ => self.skip_section()?,
                    }
                }
                "EOF" => break,
                unexpected => {
                    return Err(DxfError::invalid(format!(
                        "意外的标记 {unexpected}，期望 SECTION 或 EOF"
                    )));
                }
            }
        }
        Ok(document)
    }

    fn skip_section(&mut self) -> Result<(), DxfError> {
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) if value == "ENDSEC" => break,
                Some(_) => continue,
                None => {
                    return Err(DxfError::invalid("SECTION 未找到 ENDSEC 终止标记"));
                }
            }
        }
        Ok(())
    }

    fn parse_entities(&mut self, document: &mut Document) -> Result<(), DxfError> {
        loop {
            let (code, value) = match self.reader.next_pair()? {
                Some(pair) => pair,
                None => return Err(DxfError::invalid("ENTITIES 段提前结束")),
            };
            if code != 0 {
                return Err(DxfError::invalid(format!(
                    "ENTITIES 段遇到组码 {code}（期望 0 表示实体起始）"
                )));
            }

            match value.as_str() {
                "ENDSEC" => break,
                "LINE" => {
                    let line = self.parse_line()?;
                    document.add_entity(line);
                }
                "ARC" => {
                    let arc = self.parse_arc()?;
                    document.add_entity(arc);
                }
                "LWPOLYLINE" => {
                    let polyline = self.parse_lwpolyline()?;
                    document.add_entity(polyline);
                }
                "POLYLINE" => {
                    self.parse_polyline_entity(document)?;
                }
                "TEXT" => {
                    let text = self.parse_text()?;
                    document.add_entity(text);
                }
                _ => {
                    // 图纸里与里程无关的实体（标注、图案填充等）直接跳过。
                    self.skip_entity_body()?;
                }
            }
        }
        Ok(())
    }

    fn parse_line(&mut self) -> Result<Entity, DxfError> {
        let mut layer: Option<String> = None;
        let mut start_x: Option<f64> = None;
        let mut start_y: Option<f64> = None;
        let mut end_x: Option<f64> = None;
        let mut end_y: Option<f64> = None;

        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => {
                    self.reader.put_back((0, value));
                    break;
                }
                Some((code, value)) => match code {
                    8 => layer = Some(value.trim().to_string()),
                    10 => assign_coord(&mut start_x, &value, "LINE 起点 X")?,
                    20 => assign_coord(&mut start_y, &value, "LINE 起点 Y")?,
                    11 => assign_coord(&mut end_x, &value, "LINE 终点 X")?,
                    21 => assign_coord(&mut end_y, &value, "LINE 终点 Y")?,
                    30 | 31 | 39 | 62 | 100 | 210 | 220 | 230 => {}
                    _ => {}
                },
                None => return Err(DxfError::invalid("LINE 未正确结束")),
            }
        }

        let sx = start_x.ok_or_else(|| DxfError::invalid("LINE 缺少起点 X（组码 10）"))?;
        let sy = start_y.ok_or_else(|| DxfError::invalid("LINE 缺少起点 Y（组码 20）"))?;
        let ex = end_x.ok_or_else(|| DxfError::invalid("LINE 缺少终点 X（组码 11）"))?;
        let ey = end_y.ok_or_else(|| DxfError::invalid("LINE 缺少终点 Y（组码 21）"))?;
        Ok(Entity::Line(railcad_core::document::Line {
            start: Point2::new(sx, sy),
            end: Point2::new(ex, ey),
            layer: layer.unwrap_or_else(|| "0".to_string()),
        }))
    }

    fn parse_arc(&mut self) -> Result<Entity, DxfError> {
        let mut layer: Option<String> = None;
        let mut center_x: Option<f64> = None;
        let mut center_y: Option<f64> = None;
        let mut radius: Option<f64> = None;
        let mut start_deg: f64 = 0.0;
        let mut end_deg: f64 = 360.0;

        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => {
                    self.reader.put_back((0, value));
                    break;
                }
                Some((code, value)) => match code {
                    8 => layer = Some(value.trim().to_string()),
                    10 => assign_coord(&mut center_x, &value, "ARC 圆心 X")?,
                    20 => assign_coord(&mut center_y, &value, "ARC 圆心 Y")?,
                    40 => radius = Some(parse_f64(&value, "ARC 半径")?),
                    50 => start_deg = parse_f64(&value, "ARC 起始角")?,
                    51 => end_deg = parse_f64(&value, "ARC 终止角")?,
                    30 | 39 | 62 | 100 | 210 | 220 | 230 => {}
                    _ => {}
                },
                None => return Err(DxfError::invalid("ARC 未正确结束")),
            }
        }

        let cx = center_x.ok_or_else(|| DxfError::invalid("ARC 缺少圆心 X（组码 10）"))?;
        let cy = center_y.ok_or_else(|| DxfError::invalid("ARC 缺少圆心 Y（组码 20）"))?;
        let radius = radius.ok_or_else(|| DxfError::invalid("ARC 缺少半径（组码 40）"))?;
        Ok(Entity::Arc(railcad_core::document::Arc {
            center: Point2::new(cx, cy),
            radius,
            start_angle: start_deg.to_radians(),
            end_angle: end_deg.to_radians(),
            layer: layer.unwrap_or_else(|| "0".to_string()),
        }))
    }

    fn parse_lwpolyline(&mut self) -> Result<Entity, DxfError> {
        let mut layer: Option<String> = None;
        let mut is_closed = false;
        let mut vertices: Vec<PolylineVertex> = Vec::new();
        let mut pending_x: Option<f64> = None;

        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => {
                    self.reader.put_back((0, value));
                    break;
                }
                Some((code, value)) => match code {
                    8 => layer = Some(value.trim().to_string()),
                    70 => {
                        let flags = parse_i16(&value, "LWPOLYLINE 标志")?;
                        is_closed = flags & 0x01 != 0;
                    }
                    90 => {
                        // 顶点数提示，按实际 10/20 对计数即可。
                        parse_i32(&value, "LWPOLYLINE 顶点数")?;
                    }
                    10 => {
                        if pending_x.is_some() {
                            return Err(DxfError::invalid(
                                "LWPOLYLINE 顶点 X 之后缺少对应的 Y（组码 20）",
                            ));
                        }
                        pending_x = Some(parse_f64(&value, "LWPOLYLINE 顶点 X")?);
                    }
                    20 => {
                        let x = pending_x.take().ok_or_else(|| {
                            DxfError::invalid("LWPOLYLINE 顶点 Y 之前缺少 X（组码 10）")
                        })?;
                        let y = parse_f64(&value, "LWPOLYLINE 顶点 Y")?;
                        vertices.push(PolylineVertex::new(Point2::new(x, y)));
                    }
                    42 => {
                        let bulge = parse_f64(&value, "LWPOLYLINE bulge")?;
                        match vertices.last_mut() {
                            Some(vertex) => vertex.bulge = bulge,
                            None => {
                                return Err(DxfError::invalid(
                                    "LWPOLYLINE bulge 出现在任何顶点之前",
                                ));
                            }
                        }
                    }
                    38 | 39 | 43 | 62 | 100 | 210 | 220 | 230 => {}
                    _ => {}
                },
                None => return Err(DxfError::invalid("LWPOLYLINE 未正确结束")),
            }
        }

        if pending_x.is_some() {
            return Err(DxfError::invalid("LWPOLYLINE 末尾顶点缺少 Y 坐标"));
        }
        if vertices.len() < 2 {
            return Err(DxfError::invalid("LWPOLYLINE 顶点不足两个"));
        }
        Ok(Entity::Polyline(railcad_core::document::Polyline {
            vertices,
            is_closed,
            layer: layer.unwrap_or_else(|| "0".to_string()),
        }))
    }

    /// 旧式 POLYLINE：头实体 + 一串 VERTEX + SEQEND。
    fn parse_polyline_entity(&mut self, document: &mut Document) -> Result<(), DxfError> {
        let mut layer: Option<String> = None;
        let mut is_closed = false;

        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => {
                    self.reader.put_back((0, value));
                    break;
                }
                Some((code, value)) => match code {
                    8 => layer = Some(value.trim().to_string()),
                    70 => {
                        let flags = parse_i16(&value, "POLYLINE 标志")?;
                        is_closed = flags & 0x01 != 0;
                    }
                    _ => {}
                },
                None => return Err(DxfError::invalid("POLYLINE 头部未正确结束")),
            }
        }

        let mut vertices: Vec<PolylineVertex> = Vec::new();
        loop {
            let (code, value) = match self.reader.next_pair()? {
                Some(pair) => pair,
                None => return Err(DxfError::invalid("POLYLINE 未找到 SEQEND 终止标记")),
            };
            if code != 0 {
                return Err(DxfError::invalid(format!(
                    "POLYLINE 顶点序列遇到组码 {code}（期望 0）"
                )));
            }
            match value.as_str() {
                "VERTEX" => {
                    vertices.push(self.parse_vertex()?);
                }
                "SEQEND" => {
                    self.skip_entity_body()?;
                    break;
                }
                unexpected => {
                    return Err(DxfError::invalid(format!(
                        "POLYLINE 顶点序列遇到意外实体 {unexpected}"
                    )));
                }
            }
        }

        if vertices.len() < 2 {
            return Err(DxfError::invalid("POLYLINE 顶点不足两个"));
        }
        document.add_polyline_with_vertices(
            vertices,
            is_closed,
            layer.unwrap_or_else(|| "0".to_string()),
        );
        Ok(())
    }

    fn parse_vertex(&mut self) -> Result<PolylineVertex, DxfError> {
        let mut x: Option<f64> = None;
        let mut y: Option<f64> = None;
        let mut bulge = 0.0;

        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => {
                    self.reader.put_back((0, value));
                    break;
                }
                Some((code, value)) => match code {
                    10 => assign_coord(&mut x, &value, "VERTEX X")?,
                    20 => assign_coord(&mut y, &value, "VERTEX Y")?,
                    42 => bulge = parse_f64(&value, "VERTEX bulge")?,
                    _ => {}
                },
                None => return Err(DxfError::invalid("VERTEX 未正确结束")),
            }
        }

        let x = x.ok_or_else(|| DxfError::invalid("VERTEX 缺少 X（组码 10）"))?;
        let y = y.ok_or_else(|| DxfError::invalid("VERTEX 缺少 Y（组码 20）"))?;
        Ok(PolylineVertex::with_bulge(Point2::new(x, y), bulge))
    }

    fn parse_text(&mut self) -> Result<Entity, DxfError> {
        let mut layer: Option<String> = None;
        let mut insert_x: Option<f64> = None;
        let mut insert_y: Option<f64> = None;
        let mut height: f64 = 0.0;
        let mut rotation_deg: f64 = 0.0;
        let mut content: Option<String> = None;

        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => {
                    self.reader.put_back((0, value));
                    break;
                }
                Some((code, value)) => match code {
                    8 => layer = Some(value.trim().to_string()),
                    10 => assign_coord(&mut insert_x, &value, "TEXT 插入点 X")?,
                    20 => assign_coord(&mut insert_y, &value, "TEXT 插入点 Y")?,
                    40 => height = parse_f64(&value, "TEXT 高度")?,
                    50 => rotation_deg = parse_f64(&value, "TEXT 旋转角")?,
                    1 => content = Some(value),
                    7 | 11 | 21 | 30 | 41 | 51 | 62 | 71 | 72 | 73 | 100 | 210 | 220 | 230 => {}
                    _ => {}
                },
                None => return Err(DxfError::invalid("TEXT 未正确结束")),
            }
        }

        let ix = insert_x.ok_or_else(|| DxfError::invalid("TEXT 缺少插入点 X（组码 10）"))?;
        let iy = insert_y.ok_or_else(|| DxfError::invalid("TEXT 缺少插入点 Y（组码 20）"))?;
        let raw = content.ok_or_else(|| DxfError::invalid("TEXT 缺少文本内容（组码 1）"))?;
        Ok(Entity::Text(railcad_core::document::Text {
            insert: Point2::new(ix, iy),
            content: decode_inline_text(&raw),
            height,
            rotation: rotation_deg.to_radians(),
            layer: layer.unwrap_or_else(|| "0".to_string()),
        }))
    }

    fn skip_entity_body(&mut self) -> Result<(), DxfError> {
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => {
                    self.reader.put_back((0, value));
                    break;
                }
                Some(_) => continue,
                None => break,
            }
        }
        Ok(())
    }
}

struct DxfReader<'a> {
    lines: std::str::Lines<'a>,
    buffer: Option<(i32, String)>,
    line_number: usize,
}

impl<'a> DxfReader<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            lines: source.lines(),
            buffer: None,
            line_number: 0,
        }
    }

    fn next_pair(&mut self) -> Result<Option<(i32, String)>, DxfError> {
        if let Some(pair) = self.buffer.take() {
            return Ok(Some(pair));
        }

        let code_line = match self.lines.next() {
            Some(line) => {
                self.line_number += 1;
                line
            }
            None => return Ok(None),
        };

        let value_line = match self.lines.next() {
            Some(line) => {
                self.line_number += 1;
                line
            }
            None => {
                return Err(DxfError::invalid(format!(
                    "文件在第 {} 行结束，缺少与组码对应的值行",
                    self.line_number
                )));
            }
        };

        let code = code_line.trim().parse::<i32>().map_err(|_| {
            DxfError::invalid(format!(
                "第 {} 行的组码 \"{}\" 无法解析为整数",
                self.line_number - 1,
                code_line.trim()
            ))
        })?;
        let value = value_line.trim_end_matches('\r').to_string();
        Ok(Some((code, value)))
    }

    fn put_back(&mut self, pair: (i32, String)) {
        if self.buffer.is_some() {
            panic!("内部错误：尝试多次回退 DXF pair");
        }
        self.buffer = Some(pair);
    }
}

fn assign_coord(slot: &mut Option<f64>, raw: &str, context: &str) -> Result<(), DxfError> {
    if slot.is_some() {
        return Err(DxfError::invalid(format!("{context} 出现重复值")));
    }
    *slot = Some(parse_f64(raw, context)?);
    Ok(())
}

fn parse_f64(raw: &str, context: &str) -> Result<f64, DxfError> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| DxfError::invalid(format!("{context} 解析失败（值：\"{raw}\"）")))
}

fn parse_i32(raw: &str, context: &str) -> Result<i32, DxfError> {
    raw.trim()
        .parse::<i32>()
        .map_err(|_| DxfError::invalid(format!("{context} 解析失败（值：\"{raw}\"）")))
}

fn parse_i16(raw: &str, context: &str) -> Result<i16, DxfError> {
    let value = parse_i32(raw, context)?;
    i16::try_from(value)
        .map_err(|_| DxfError::invalid(format!("{context} 超出 i16 范围（值：{value}）")))
}

fn decode_inline_text(raw: &str) -> String {
    let mut result = String::new();
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            match chars.next() {
                Some('P') | Some('p') => result.push('\n'),
                Some('~') => result.push(' '),
                Some('\\') => result.push('\\'),
                Some(other) => {
                    result.push('\\');
                    result.push(other);
                }
                None => result.push('\\'),
            }
        } else {
            result.push(ch);
        }
    }
    result
}
