//! 文档到引擎输入的适配：按配置图层从 `Document` 挑出
//! 中心线区段、跨越要素与封闭区域/标签。

use std::collections::BTreeMap;

use railcad_core::document::{Document, Entity, Polyline, bulge_arc, canonical_interval};
use railcad_core::geometry::Point2;
use tracing::debug;

use crate::alignment::{RawSegment, SegmentGeometry};
use crate::crossing::{CrossingFeature, remark_from_layer};
use crate::rooms::{ClosedRegion, TextLabel};

const VERTEX_GUARD: f64 = 1e-9;

/// 收集配置图层上的全部线段/圆弧/多段线，炸开为建模用原始区段。
/// 顺序保持文档实体顺序（决定链的定向种子）。
pub fn rail_segments(document: &Document, offsets: &BTreeMap<String, f64>) -> Vec<RawSegment> {
    let mut segments = Vec::new();
    for (_, entity) in document.entities() {
        if !offsets.contains_key(entity.layer_name()) {
            continue;
        }
        match entity {
            Entity::Line(line) => segments.push(RawSegment::new(
                SegmentGeometry::Line {
                    start: line.start,
                    end: line.end,
                },
                line.layer.clone(),
            )),
            Entity::Arc(arc) => {
                let (start, end) = canonical_interval(arc.start_angle, arc.end_angle);
                segments.push(RawSegment::new(
                    SegmentGeometry::Arc {
                        center: arc.center,
                        radius: arc.radius.abs(),
                        start_angle: start,
                        sweep: end - start,
                    },
                    arc.layer.clone(),
                ));
            }
            Entity::Polyline(polyline) => explode_polyline(polyline, &mut segments),
            Entity::Text(_) => {}
        }
    }
    debug!(count = segments.len(), "已收集中心线原始区段");
    segments
}

/// 把多段线炸开为逐边区段，bulge 边还原为圆弧。
fn explode_polyline(polyline: &Polyline, out: &mut Vec<RawSegment>) {
    let count = polyline.vertices.len();
    if count < 2 {
        return;
    }
    let edge_count = if polyline.is_closed { count } else { count - 1 };
    for i in 0..edge_count {
        let from = &polyline.vertices[i];
        let to = &polyline.vertices[(i + 1) % count];
        if from.position.distance(to.position) <= VERTEX_GUARD {
            continue;
        }
        let geometry = match bulge_arc(from.position, to.position, from.bulge) {
            Some(arc) => SegmentGeometry::Arc {
                center: arc.center,
                radius: arc.radius,
                start_angle: arc.start_angle,
                sweep: arc.sweep,
            },
            None => SegmentGeometry::Line {
                start: from.position,
                end: to.position,
            },
        };
        out.push(RawSegment::new(geometry, polyline.layer.clone()));
    }
}

/// 收集图层名以 `prefix` 开头的多段线作为跨越要素，
/// 备注从图层名按分隔符提取。
pub fn crossing_features(
    document: &Document,
    prefix: &str,
    separator: &str,
) -> Vec<CrossingFeature> {
    let mut features = Vec::new();
    for (_, entity) in document.entities() {
        let layer = entity.layer_name();
        if !layer.starts_with(prefix) {
            continue;
        }
        if let Entity::Polyline(polyline) = entity {
            let mut points: Vec<Point2> =
                polyline.vertices.iter().map(|v| v.position).collect();
            if polyline.is_closed {
                if let Some(&first) = points.first() {
                    points.push(first);
                }
            }
            features.push(CrossingFeature {
                points,
                layer: layer.to_string(),
                remark: remark_from_layer(layer, separator),
            });
        }
    }
    debug!(count = features.len(), prefix, "已收集跨越要素");
    features
}

/// 收集指定图层上的封闭多段线与文字标签。
/// 少于三个顶点的多段线不构成区域，忽略；未闭合的补回首点。
pub fn regions_and_labels(document: &Document, layer: &str) -> (Vec<ClosedRegion>, Vec<TextLabel>) {
    let mut regions = Vec::new();
    let mut labels = Vec::new();
    for entity in document.entities_on_layer(layer) {
        match entity {
            Entity::Polyline(polyline) => {
                if polyline.vertices.len() < 3 {
                    continue;
                }
                let mut vertices: Vec<Point2> =
                    polyline.vertices.iter().map(|v| v.position).collect();
                let first = vertices[0];
                let last = vertices[vertices.len() - 1];
                if first.distance(last) > VERTEX_GUARD {
                    vertices.push(first);
                }
                regions.push(ClosedRegion { vertices });
            }
            Entity::Text(text) => labels.push(TextLabel {
                position: text.insert,
                content: text.content.clone(),
            }),
            _ => {}
        }
    }
    debug!(
        regions = regions.len(),
        labels = labels.len(),
        layer,
        "已收集封闭区域与标签"
    );
    (regions, labels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use railcad_core::document::PolylineVertex;

    #[test]
    fn collects_only_configured_layers_in_document_order() {
        let mut doc = Document::new();
        doc.add_line(Point2::new(0.0, 0.0), Point2::new(0.0, 50.0), "dl1");
        doc.add_line(Point2::new(9.0, 9.0), Point2::new(9.0, 99.0), "无关图层");
        doc.add_polyline(
            [
                Point2::new(0.0, 50.0),
                Point2::new(0.0, 80.0),
                Point2::new(20.0, 80.0),
            ],
            false,
            "dl2",
        );

        let mut offsets = BTreeMap::new();
        offsets.insert("dl1".to_string(), 0.0);
        offsets.insert("dl2".to_string(), 100.0);
        let segments = rail_segments(&doc, &offsets);
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0].layer, "dl1");
        assert_eq!(segments[1].layer, "dl2");
        assert_eq!(segments[2].layer, "dl2");
    }

    #[test]
    fn bulge_vertices_become_arcs() {
        let mut doc = Document::new();
        doc.add_polyline_with_vertices(
            [
                PolylineVertex::with_bulge(Point2::new(0.0, 0.0), 1.0),
                PolylineVertex::new(Point2::new(10.0, 0.0)),
            ],
            false,
            "dl1",
        );
        let mut offsets = BTreeMap::new();
        offsets.insert("dl1".to_string(), 0.0);
        let segments = rail_segments(&doc, &offsets);
        assert_eq!(segments.len(), 1);
        match segments[0].geometry {
            SegmentGeometry::Arc { radius, sweep, .. } => {
                assert!((radius - 5.0).abs() < 1e-9);
                assert!((sweep - std::f64::consts::PI).abs() < 1e-9);
            }
            ref other => panic!("expected arc, got {other:?}"),
        }
    }

    #[test]
    fn crossing_features_filtered_by_prefix() {
        let mut doc = Document::new();
        doc.add_polyline(
            [Point2::new(-5.0, 10.0), Point2::new(5.0, 10.0)],
            false,
            "电力--10kV线路--1",
        );
        doc.add_polyline(
            [Point2::new(-5.0, 20.0), Point2::new(5.0, 20.0)],
            false,
            "给水管线",
        );
        let features = crossing_features(&doc, "电力", "--");
        assert_eq!(features.len(), 1);
        assert_eq!(features[0].remark, "10kV线路");
        assert_eq!(features[0].points.len(), 2);
    }

    #[test]
    fn regions_are_closed_and_labels_collected() {
        let mut doc = Document::new();
        // 未闭合矩形：提取时补回首点。
        doc.add_polyline(
            [
                Point2::new(0.0, 0.0),
                Point2::new(4.0, 0.0),
                Point2::new(4.0, 4.0),
                Point2::new(0.0, 4.0),
            ],
            false,
            "房屋拆迁",
        );
        doc.add_text(Point2::new(2.0, 2.0), "1-01", 2.5, 0.0, "房屋拆迁");
        doc.add_text(Point2::new(50.0, 50.0), "别的图层", 2.5, 0.0, "0");

        let (regions, labels) = regions_and_labels(&doc, "房屋拆迁");
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].vertices.len(), 5);
        assert!(regions[0].vertices[0].distance(regions[0].vertices[4]) < 1e-12);
        assert_eq!(labels.len(), 1);
        assert_eq!(labels[0].content, "1-01");
    }
}
