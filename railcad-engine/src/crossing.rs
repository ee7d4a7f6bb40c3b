//! 交叉解算：电力折线与中心线的交点、交点里程与右侧夹角。

use railcad_core::document::normalize_angle;
use railcad_core::geometry::{Point2, Vector2};
use railcad_core::records::MileageAngleRecord;
use tracing::debug;

use crate::alignment::{Alignment, SegmentGeometry};
use crate::report::BatchOutcome;

const PARAM_GUARD: f64 = 1e-9;

/// 跨越中心线的线状要素（如电力线），已带备注。
#[derive(Debug, Clone)]
pub struct CrossingFeature {
    pub points: Vec<Point2>,
    pub layer: String,
    pub remark: String,
}

/// 从图层名提取备注：按分隔符拆分后保留中间各段。
/// `电力--110kV线路--3` → `110kV线路`；不足三段时为空。
pub fn remark_from_layer(name: &str, separator: &str) -> String {
    let parts: Vec<&str> = name.split(separator).collect();
    if parts.len() >= 3 {
        parts[1..parts.len() - 1].join(separator)
    } else {
        String::new()
    }
}

/// 右侧夹角：以中心线切向为基准，要素方向相对其的右侧夹角，
/// 十进制度，范围 [0, 180)。
pub fn angle_right(t_rail: Vector2, t_feature: Vector2) -> f64 {
    let det = t_rail.cross(t_feature);
    let dot = t_rail.dot(t_feature);
    let theta = (-det.atan2(dot)).to_degrees();
    if theta >= 0.0 { theta } else { 180.0 - theta.abs() }
}

/// 线段与中心线区段的交点（0~2 个）。
fn intersect_edge(edge_start: Point2, edge_end: Point2, segment: &SegmentGeometry) -> Vec<Point2> {
    match *segment {
        SegmentGeometry::Line { start, end } => {
            intersect_edge_line(edge_start, edge_end, start, end)
                .into_iter()
                .collect()
        }
        SegmentGeometry::Arc {
            center,
            radius,
            start_angle,
            sweep,
        } => intersect_edge_arc(edge_start, edge_end, center, radius, start_angle, sweep),
    }
}

/// 两线段交点，参数式闭式解。平行或共线视为不相交。
fn intersect_edge_line(p0: Point2, p1: Point2, q0: Point2, q1: Point2) -> Option<Point2> {
    let r = p0.vector_to(p1);
    let s = q0.vector_to(q1);
    let denom = r.cross(s);
    if denom.abs() <= PARAM_GUARD {
        return None;
    }
    let pq = p0.vector_to(q0);
    let t = pq.cross(s) / denom;
    let u = pq.cross(r) / denom;
    if (-PARAM_GUARD..=1.0 + PARAM_GUARD).contains(&t)
        && (-PARAM_GUARD..=1.0 + PARAM_GUARD).contains(&u)
    {
        Some(p0.translate(r.scaled(t)))
    } else {
        None
    }
}

/// 线段与圆弧交点：先解线-圆二次方程，再按扫角裁剪。
fn intersect_edge_arc(
    p0: Point2,
    p1: Point2,
    center: Point2,
    radius: f64,
    start_angle: f64,
    sweep: f64,
) -> Vec<Point2> {
    let d = p0.vector_to(p1);
    let f = center.vector_to(p0);
    let a = d.dot(d);
    if a <= PARAM_GUARD {
        return Vec::new();
    }
    let b = 2.0 * f.dot(d);
    let c = f.dot(f) - radius * radius;
    let disc = b * b - 4.0 * a * c;
    if disc < 0.0 {
        return Vec::new();
    }
    let sqrt_disc = disc.sqrt();
    let mut hits = Vec::new();
    for t in [(-b - sqrt_disc) / (2.0 * a), (-b + sqrt_disc) / (2.0 * a)] {
        if !(-PARAM_GUARD..=1.0 + PARAM_GUARD).contains(&t) {
            continue;
        }
        let point = p0.translate(d.scaled(t));
        let phi = center.vector_to(point).angle();
        let delta = if sweep >= 0.0 {
            normalize_angle(phi - start_angle)
        } else {
            normalize_angle(start_angle - phi)
        };
        if delta <= sweep.abs() + PARAM_GUARD {
            // 相切时两根重合，由调用侧按容差去重。
            hits.push(point);
        }
    }
    hits
}

/// 解算全部要素与中心线的交叉记录，按里程升序返回。
/// 单个要素可多次穿越（每次一条记录）；同一交点按容差去重；
/// 与中心线无交的要素直接省略，不算错误。
pub fn resolve_crossings(
    alignment: &Alignment,
    features: &[CrossingFeature],
    epsilon: f64,
) -> BatchOutcome<MileageAngleRecord> {
    let mut outcome = BatchOutcome::new();
    for (index, feature) in features.iter().enumerate() {
        outcome.processed += 1;
        if feature.points.len() < 2 {
            outcome.skip(
                format!("{}#{}", feature.layer, index),
                "折线顶点不足，无法构成线段",
            );
            continue;
        }

        let mut hits: Vec<(Point2, Vector2)> = Vec::new();
        for pair in feature.points.windows(2) {
            let direction = pair[0].vector_to(pair[1]);
            for segment in alignment.segments() {
                for point in intersect_edge(pair[0], pair[1], &segment.geometry) {
                    if hits.iter().any(|(seen, _)| seen.distance(point) <= epsilon) {
                        continue;
                    }
                    hits.push((point, direction));
                }
            }
        }

        if hits.is_empty() {
            debug!(layer = %feature.layer, index, "要素未与中心线相交，省略");
            continue;
        }

        for (point, direction) in hits {
            let Some(direction) = direction.normalize() else {
                continue;
            };
            let projection = alignment.project(point);
            outcome.records.push(MileageAngleRecord::new(
                projection.mileage,
                angle_right(projection.tangent, direction),
                feature.remark.clone(),
            ));
        }
    }

    outcome
        .records
        .sort_by(|a, b| a.mileage_m.total_cmp(&b.mileage_m));
    outcome
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::alignment::RawSegment;

    fn north_alignment() -> Alignment {
        let raw = vec![RawSegment::new(
            SegmentGeometry::Line {
                start: Point2::new(0.0, 0.0),
                end: Point2::new(0.0, 100.0),
            },
            "dl1",
        )];
        Alignment::build(raw, &BTreeMap::new(), 0.001).expect("build")
    }

    fn feature(points: Vec<Point2>, remark: &str) -> CrossingFeature {
        CrossingFeature {
            points,
            layer: format!("电力--{remark}--1"),
            remark: remark.to_string(),
        }
    }

    #[test]
    fn remark_strips_prefix_and_sequence() {
        assert_eq!(remark_from_layer("电力--110kV线路--3", "--"), "110kV线路");
        assert_eq!(
            remark_from_layer("电力--110kV--备用--3", "--"),
            "110kV--备用"
        );
        assert_eq!(remark_from_layer("电力", "--"), "");
        assert_eq!(remark_from_layer("电力--裸名", "--"), "");
    }

    #[test]
    fn perpendicular_crossing_yields_ninety_degrees() {
        let alignment = north_alignment();
        let features = vec![feature(
            vec![Point2::new(-10.0, 50.0), Point2::new(10.0, 50.0)],
            "10kV线路",
        )];
        let outcome = resolve_crossings(&alignment, &features, 0.001);
        assert_eq!(outcome.processed, 1);
        assert_eq!(outcome.records.len(), 1);
        let record = &outcome.records[0];
        assert!((record.mileage_m - 50.0).abs() < 1e-9);
        assert!((record.angle_deg - 90.0).abs() < 1e-9);
        assert_eq!(record.remark, "10kV线路");
    }

    #[test]
    fn oblique_crossing_angle_follows_right_side_rule() {
        let alignment = north_alignment();
        // 方向北偏东 45°（相对北行切向为顺时针 45°）。
        let features = vec![feature(
            vec![Point2::new(-10.0, 40.0), Point2::new(10.0, 60.0)],
            "35kV线路",
        )];
        let outcome = resolve_crossings(&alignment, &features, 0.001);
        assert_eq!(outcome.records.len(), 1);
        assert!((outcome.records[0].angle_deg - 45.0).abs() < 1e-9);

        // 反向给点不改变夹角（按 180° 取模）。
        let features = vec![feature(
            vec![Point2::new(10.0, 60.0), Point2::new(-10.0, 40.0)],
            "35kV线路",
        )];
        let outcome = resolve_crossings(&alignment, &features, 0.001);
        assert!((outcome.records[0].angle_deg - 45.0).abs() < 1e-9);

        // 北偏西 45° 的走向夹角为 135°。
        let features = vec![feature(
            vec![Point2::new(10.0, 40.0), Point2::new(-10.0, 60.0)],
            "35kV线路",
        )];
        let outcome = resolve_crossings(&alignment, &features, 0.001);
        assert!((outcome.records[0].angle_deg - 135.0).abs() < 1e-9);
    }

    #[test]
    fn multiple_crossings_sorted_by_mileage() {
        let alignment = north_alignment();
        // 折线两次穿越中心线。
        let features = vec![feature(
            vec![
                Point2::new(-5.0, 80.0),
                Point2::new(5.0, 70.0),
                Point2::new(-5.0, 20.0),
            ],
            "10kV线路",
        )];
        let outcome = resolve_crossings(&alignment, &features, 0.001);
        assert_eq!(outcome.records.len(), 2);
        assert!(outcome.records[0].mileage_m < outcome.records[1].mileage_m);
    }

    #[test]
    fn junction_crossing_deduped() {
        // 在两区段折角 (0,100) 处穿越：两段各报一次，按容差去重为一条。
        let raw = vec![
            RawSegment::new(
                SegmentGeometry::Line {
                    start: Point2::new(0.0, 0.0),
                    end: Point2::new(0.0, 100.0),
                },
                "dl1",
            ),
            RawSegment::new(
                SegmentGeometry::Line {
                    start: Point2::new(0.0, 100.0),
                    end: Point2::new(100.0, 100.0),
                },
                "dl1",
            ),
        ];
        let alignment = Alignment::build(raw, &BTreeMap::new(), 0.001).expect("build");
        let features = vec![feature(
            vec![Point2::new(-10.0, 110.0), Point2::new(10.0, 90.0)],
            "10kV线路",
        )];
        let outcome = resolve_crossings(&alignment, &features, 0.001);
        assert_eq!(outcome.records.len(), 1);
        assert!((outcome.records[0].mileage_m - 100.0).abs() < 1e-9);
    }

    #[test]
    fn non_crossing_feature_is_omitted_not_error() {
        let alignment = north_alignment();
        let features = vec![
            feature(
                vec![Point2::new(50.0, 0.0), Point2::new(60.0, 10.0)],
                "远离线路",
            ),
            feature(
                vec![Point2::new(-10.0, 30.0), Point2::new(10.0, 30.0)],
                "10kV线路",
            ),
        ];
        let outcome = resolve_crossings(&alignment, &features, 0.001);
        assert_eq!(outcome.processed, 2);
        assert_eq!(outcome.records.len(), 1);
        assert!(outcome.skipped.is_empty());
    }

    #[test]
    fn degenerate_feature_is_skipped_with_reason() {
        let alignment = north_alignment();
        let features = vec![feature(vec![Point2::new(0.0, 50.0)], "孤点")];
        let outcome = resolve_crossings(&alignment, &features, 0.001);
        assert!(outcome.records.is_empty());
        assert_eq!(outcome.skipped.len(), 1);
        assert!(outcome.skipped[0].reason.contains("顶点不足"));
    }

    #[test]
    fn crossing_through_arc_segment() {
        // 四分之一圆弧中心线，水平线在 45° 处穿越。
        let raw = vec![RawSegment::new(
            SegmentGeometry::Arc {
                center: Point2::new(0.0, 0.0),
                radius: 10.0,
                start_angle: 0.0,
                sweep: std::f64::consts::FRAC_PI_2,
            },
            "dl1",
        )];
        let alignment = Alignment::build(raw, &BTreeMap::new(), 0.001).expect("build");
        let y = 10.0 * (std::f64::consts::FRAC_PI_4).sin();
        let features = vec![feature(
            vec![Point2::new(0.0, y), Point2::new(20.0, y)],
            "10kV线路",
        )];
        let outcome = resolve_crossings(&alignment, &features, 0.001);
        assert_eq!(outcome.records.len(), 1);
        let record = &outcome.records[0];
        assert!((record.mileage_m - 10.0 * std::f64::consts::FRAC_PI_4).abs() < 1e-9);
        // 弧上 45° 处切向 135°，东向线与其右侧夹角 135°。
        assert!((record.angle_deg - 135.0).abs() < 1e-9);
    }
}
