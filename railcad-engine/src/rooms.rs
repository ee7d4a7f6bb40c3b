//! 房屋拆迁图层处理：封闭多段线内的文字标签归属判定，
//! 以及区域质心/面积/最近距离统计。

use railcad_core::geometry::Point2;
use railcad_core::records::RegionRecord;
use tracing::{debug, warn};

use crate::alignment::Alignment;
use crate::projection::Projection;
use crate::report::BatchOutcome;

const BOUNDARY_GUARD: f64 = 1e-9;

/// 封闭区域：顶点序列，首尾闭合（提取层保证）。
#[derive(Debug, Clone)]
pub struct ClosedRegion {
    pub vertices: Vec<Point2>,
}

/// 单行文字标签。
#[derive(Debug, Clone)]
pub struct TextLabel {
    pub position: Point2,
    pub content: String,
}

/// 标签归属结果：标签内容、所属区域下标、标签位置在
/// （次级）中心线上的投影。
#[derive(Debug, Clone)]
pub struct LabelMatch {
    pub content: String,
    pub position: Point2,
    pub region_index: usize,
    pub projection: Projection,
}

/// 射线法点-多边形包含判定，落在边界上的点计为内部。
pub fn point_in_polygon(point: Point2, vertices: &[Point2]) -> bool {
    if vertices.len() < 3 {
        return false;
    }
    if on_boundary(point, vertices) {
        return true;
    }
    let (x, y) = (point.x(), point.y());
    let mut inside = false;
    let n = vertices.len();
    for i in 0..n {
        let a = vertices[i];
        let b = vertices[(i + 1) % n];
        if (a.y() > y) != (b.y() > y) {
            let x_cross = (b.x() - a.x()) * (y - a.y()) / (b.y() - a.y()) + a.x();
            if x < x_cross {
                inside = !inside;
            }
        }
    }
    inside
}

fn on_boundary(point: Point2, vertices: &[Point2]) -> bool {
    let n = vertices.len();
    for i in 0..n {
        let a = vertices[i];
        let b = vertices[(i + 1) % n];
        let ab = a.vector_to(b);
        let len_sq = ab.length_squared();
        if len_sq <= BOUNDARY_GUARD {
            if point.distance(a) <= BOUNDARY_GUARD {
                return true;
            }
            continue;
        }
        let t = (a.vector_to(point).dot(ab) / len_sq).clamp(0.0, 1.0);
        let foot = a.translate(ab.scaled(t));
        if point.distance(foot) <= BOUNDARY_GUARD {
            return true;
        }
    }
    false
}

/// 鞋带公式求多边形面积与质心；面积退化时回退为顶点均值。
pub fn polygon_area_centroid(vertices: &[Point2]) -> (f64, Point2) {
    let mut closed: Vec<Point2> = vertices.to_vec();
    if closed.len() >= 2 {
        let first = closed[0];
        let last = closed[closed.len() - 1];
        if first.distance(last) > BOUNDARY_GUARD {
            closed.push(first);
        }
    }

    let mut area2 = 0.0;
    let mut cx = 0.0;
    let mut cy = 0.0;
    for pair in closed.windows(2) {
        let (x0, y0) = (pair[0].x(), pair[0].y());
        let (x1, y1) = (pair[1].x(), pair[1].y());
        let cross = x0 * y1 - x1 * y0;
        area2 += cross;
        cx += (x0 + x1) * cross;
        cy += (y0 + y1) * cross;
    }

    if area2.abs() < BOUNDARY_GUARD {
        let count = (closed.len() - 1).max(1);
        let mean_x = closed[..count].iter().map(|p| p.x()).sum::<f64>() / count as f64;
        let mean_y = closed[..count].iter().map(|p| p.y()).sum::<f64>() / count as f64;
        (0.0, Point2::new(mean_x, mean_y))
    } else {
        let area = area2.abs() / 2.0;
        (area, Point2::new(cx / (3.0 * area2), cy / (3.0 * area2)))
    }
}

/// 标签归属与里程提取：逐标签做点-多边形判定，未命中任何区域
/// 的标签跳过并记录；命中多个区域时取输入顺序首个并告警。
/// 命中后以标签位置（而非区域质心）投影到中心线。
pub fn extract_labels(
    regions: &[ClosedRegion],
    labels: &[TextLabel],
    alignment: &Alignment,
) -> BatchOutcome<LabelMatch> {
    let mut outcome = BatchOutcome::new();
    for label in labels {
        outcome.processed += 1;
        let matched: Vec<usize> = regions
            .iter()
            .enumerate()
            .filter(|(_, region)| point_in_polygon(label.position, &region.vertices))
            .map(|(index, _)| index)
            .collect();

        let Some(&region_index) = matched.first() else {
            debug!(content = %label.content, "标签不在任何封闭区域内，已跳过");
            outcome.skip(label.content.clone(), "不在任何封闭区域内");
            continue;
        };
        if matched.len() > 1 {
            warn!(
                content = %label.content,
                candidates = matched.len(),
                "标签落在多个重叠区域内，取输入顺序首个"
            );
        }

        outcome.records.push(LabelMatch {
            content: label.content.clone(),
            position: label.position,
            region_index,
            projection: alignment.project(label.position),
        });
    }
    outcome
}

/// 区域统计：逐区域求面积、质心里程、顶点到中心线的最近距离。
pub fn region_info(regions: &[ClosedRegion], alignment: &Alignment) -> Vec<RegionRecord> {
    regions
        .iter()
        .map(|region| {
            let (area, centroid) = polygon_area_centroid(&region.vertices);
            let mileage = alignment.project(centroid).mileage;
            let min_vertex_dist = region
                .vertices
                .iter()
                .map(|vertex| alignment.project(*vertex).distance())
                .fold(f64::INFINITY, f64::min);
            RegionRecord {
                mileage_m: Some(mileage),
                min_vertex_dist: (min_vertex_dist.is_finite()).then_some(min_vertex_dist),
                area,
            }
        })
        .collect()
}
