//! 标注合成：交叉解算的逆运算。由里程-角度记录反算世界坐标
//! 与方向，生成标注线段；以及按里程表画连接线。

use railcad_core::geometry::Point2;
use railcad_core::records::MileageAngleRecord;
use tracing::warn;

use crate::alignment::Alignment;
use crate::errors::SynthesizeError;
use crate::report::BatchOutcome;

/// 反算单条记录：在记录里程处取点与切向，把切向顺时针旋转
/// 记录角度得到标注方向，以该点为中心向两端各延伸半长。
pub fn synthesize(
    alignment: &Alignment,
    record: &MileageAngleRecord,
    length: f64,
) -> Result<[Point2; 2], SynthesizeError> {
    let (point, tangent) = alignment.point_and_tangent(record.mileage_m)?;
    let direction = tangent.rotated(-record.angle_deg.to_radians());
    let half = length / 2.0;
    Ok([
        point.translate(direction.scaled(-half)),
        point.translate(direction.scaled(half)),
    ])
}

/// 批量反算。越界里程逐条跳过并记录原因，不中断整批。
pub fn synthesize_batch(
    alignment: &Alignment,
    records: &[MileageAngleRecord],
    length: f64,
) -> BatchOutcome<[Point2; 2]> {
    let mut outcome = BatchOutcome::new();
    for (index, record) in records.iter().enumerate() {
        outcome.processed += 1;
        match synthesize(alignment, record, length) {
            Ok(points) => outcome.records.push(points),
            Err(err) => {
                warn!(row = index + 1, mileage = record.mileage_m, "记录跳过：{err}");
                outcome.skip(format!("第 {} 行（里程 {}）", index + 1, record.mileage_m), err.to_string());
            }
        }
    }
    outcome
}

/// 从给定里程处的中心线位置画一条到固定目标点的连接线。
pub fn connect(
    alignment: &Alignment,
    mileage: f64,
    target: Point2,
) -> Result<[Point2; 2], SynthesizeError> {
    let (point, _) = alignment.point_and_tangent(mileage)?;
    Ok([point, target])
}

/// 按里程列表批量画连接线，越界里程跳过并记录。
pub fn connect_batch(
    alignment: &Alignment,
    mileages: &[f64],
    target: Point2,
) -> BatchOutcome<[Point2; 2]> {
    let mut outcome = BatchOutcome::new();
    for &mileage in mileages {
        outcome.processed += 1;
        match connect(alignment, mileage, target) {
            Ok(points) => outcome.records.push(points),
            Err(err) => {
                warn!(mileage, "里程不在任何区段范围内，已跳过");
                outcome.skip(format!("里程 {mileage}"), err.to_string());
            }
        }
    }
    outcome
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::alignment::{RawSegment, SegmentGeometry};
    use crate::crossing::{CrossingFeature, resolve_crossings};

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

    #[test]
    fn annotation_is_centered_and_rotated_clockwise() {
        let alignment = north_alignment();
        let record = MileageAngleRecord::new(50.0, 90.0, "");
        let points = synthesize(&alignment, &record, 20.0).expect("synthesize");
        // 北行切向顺时针转 90° 即正东，中心 (0,50)。
        assert!(points[0].distance(Point2::new(-10.0, 50.0)) < 1e-9);
        assert!(points[1].distance(Point2::new(10.0, 50.0)) < 1e-9);
    }

    #[test]
    fn round_trip_with_resolver() {
        let alignment = north_alignment();
        let features = vec![CrossingFeature {
            points: vec![Point2::new(-10.0, 42.0), Point2::new(10.0, 58.0)],
            layer: "电力--10kV线路--1".to_string(),
            remark: "10kV线路".to_string(),
        }];
        let outcome = resolve_crossings(&alignment, &features, 0.001);
        assert_eq!(outcome.records.len(), 1);
        let record = &outcome.records[0];

        let points = synthesize(&alignment, record, 10.0).expect("synthesize");
        // 标注中点落回真实交点。
        let midpoint = points[0].midpoint(points[1]);
        assert!(midpoint.distance(Point2::new(0.0, 50.0)) < 1e-6);
        // 标注方向与要素走向平行（按 180° 取模）。
        let annotated = points[0].vector_to(points[1]).normalize().unwrap();
        let feature_dir = Point2::new(-10.0, 42.0)
            .vector_to(Point2::new(10.0, 58.0))
            .normalize()
            .unwrap();
        assert!(annotated.cross(feature_dir).abs() < 1e-6);
    }

    #[test]
    fn out_of_range_record_skipped_batch_continues() {
        let alignment = north_alignment();
        let records = vec![
            MileageAngleRecord::new(30.0, 90.0, ""),
            MileageAngleRecord::new(alignment.total_length() + 1_000.0, 90.0, ""),
            MileageAngleRecord::new(70.0, 90.0, ""),
        ];
        let outcome = synthesize_batch(&alignment, &records, 10.0);
        assert_eq!(outcome.processed, 3);
        assert_eq!(outcome.succeeded(), 2);
        assert_eq!(outcome.skipped.len(), 1);
        assert!(outcome.skipped[0].reason.contains("不在任何中心线区段范围内"));
    }

    #[test]
    fn connect_draws_from_alignment_to_target() {
        let alignment = north_alignment();
        let target = Point2::new(500.0, 500.0);
        let outcome = connect_batch(&alignment, &[25.0, 9_999.0], target);
        assert_eq!(outcome.processed, 2);
        assert_eq!(outcome.succeeded(), 1);
        assert_eq!(outcome.skipped.len(), 1);
        let points = &outcome.records[0];
        assert!(points[0].distance(Point2::new(0.0, 25.0)) < 1e-9);
        assert!(points[1].distance(target) < 1e-9);
    }
}
