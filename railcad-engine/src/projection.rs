//! 投影引擎：任意查询点到中心线的最近点、里程与带符号横向偏距。
//! 三个工具共用这一份实现，不再各自内联最近点搜索。

use railcad_core::geometry::{Point2, Vector2};

use crate::alignment::Alignment;

/// 投影结果。`offset` 以里程增加方向的右手侧为正
/// （北行时东侧为正）；`tangent` 为垂足处里程增加方向的单位切向。
#[derive(Debug, Clone, Copy)]
pub struct Projection {
    pub mileage: f64,
    pub offset: f64,
    pub tangent: Vector2,
}

impl Projection {
    /// 垂足处切向与 +X 轴的夹角（弧度）。
    #[inline]
    pub fn tangent_angle(&self) -> f64 {
        self.tangent.angle()
    }

    /// 查询点到垂足的距离。
    #[inline]
    pub fn distance(&self) -> f64 {
        self.offset.abs()
    }
}

impl Alignment {
    /// 对单个查询点求全局最近投影。逐段闭式求解并取全局最小距离，
    /// 距离相同时取区段序号更小、段内参数更小者。
    pub fn project(&self, query: Point2) -> Projection {
        debug_assert!(!self.segments().is_empty());

        let mut best: Option<(f64, usize, f64, Point2)> = None;
        for (index, segment) in self.segments().iter().enumerate() {
            let (local, foot, dist) = segment.geometry.closest_point(query);
            let better = match best {
                None => true,
                Some((best_dist, best_index, best_local, _)) => {
                    if (dist - best_dist).abs() <= 1e-12 {
                        (index, local) < (best_index, best_local)
                    } else {
                        dist < best_dist
                    }
                }
            };
            if better {
                best = Some((dist, index, local, foot));
            }
        }

        let (_, index, local, foot) = best.expect("alignment has at least one segment");
        let segment = &self.segments()[index];
        let tangent = segment.geometry.tangent_at(local);
        let offset = tangent.perp_right().dot(foot.vector_to(query));
        Projection {
            mileage: segment.start_mileage + local,
            offset,
            tangent,
        }
    }

    /// 对线段查询取中点投影（有意的简化，非真正的段-线最近搜索）。
    pub fn project_segment(&self, a: Point2, b: Point2) -> Projection {
        self.project(a.midpoint(b))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::alignment::{RawSegment, SegmentGeometry};

    fn straight(points: &[(f64, f64)]) -> Alignment {
        let raw: Vec<RawSegment> = points
            .windows(2)
            .map(|pair| {
                RawSegment::new(
                    SegmentGeometry::Line {
                        start: Point2::new(pair[0].0, pair[0].1),
                        end: Point2::new(pair[1].0, pair[1].1),
                    },
                    "dl1",
                )
            })
            .collect();
        Alignment::build(raw, &BTreeMap::new(), 0.001).expect("build")
    }

    #[test]
    fn on_curve_point_has_zero_offset_and_arc_length_mileage() {
        let alignment = straight(&[(0.0, 0.0), (0.0, 100.0), (100.0, 100.0)]);
        let projection = alignment.project(Point2::new(0.0, 42.0));
        assert!(projection.offset.abs() < 1e-9);
        assert!((projection.mileage - 42.0).abs() < 1e-9);

        let projection = alignment.project(Point2::new(30.0, 100.0));
        assert!(projection.offset.abs() < 1e-9);
        assert!((projection.mileage - 130.0).abs() < 1e-9);
    }

    #[test]
    fn right_side_convention_is_east_positive_heading_north() {
        let alignment = straight(&[(0.0, 0.0), (0.0, 100.0)]);
        let east = alignment.project(Point2::new(1.0, 50.0));
        assert!((east.offset - 1.0).abs() < 1e-9);
        let west = alignment.project(Point2::new(-1.0, 50.0));
        assert!((west.offset + 1.0).abs() < 1e-9);
    }

    #[test]
    fn two_segment_scenario() {
        // (0,0)→(0,100)→(100,100)，查询 (5,50)：
        // 里程 50，偏距 +5（北行时位于东侧，即右手侧）。
        let alignment = straight(&[(0.0, 0.0), (0.0, 100.0), (100.0, 100.0)]);
        let projection = alignment.project(Point2::new(5.0, 50.0));
        assert!((projection.mileage - 50.0).abs() < 0.01);
        assert!((projection.offset - 5.0).abs() < 0.01);
        let angle = projection.tangent_angle();
        assert!((angle - std::f64::consts::FRAC_PI_2).abs() < 1e-9);
    }

    #[test]
    fn monotone_mileage_along_one_segment() {
        let alignment = straight(&[(0.0, 0.0), (0.0, 100.0)]);
        let near = alignment.project(Point2::new(3.0, 20.0));
        let far = alignment.project(Point2::new(-4.0, 80.0));
        assert!(near.mileage < far.mileage);
    }

    #[test]
    fn tie_breaks_to_earliest_mileage() {
        // 查询点与折角两侧等距：取序号更小的区段。
        let alignment = straight(&[(0.0, 0.0), (0.0, 100.0), (100.0, 100.0)]);
        let projection = alignment.project(Point2::new(10.0, 90.0));
        assert!((projection.mileage - 90.0).abs() < 1e-9);
        assert!((projection.offset - 10.0).abs() < 1e-9);
    }

    #[test]
    fn projects_onto_arc_interior() {
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

        // 45° 方向、半径 12 处：垂足在弧中点。逆时针行进时圆外
        // 在右手侧，偏距 +2。
        let query = Point2::new(
            12.0 * (std::f64::consts::FRAC_PI_4).cos(),
            12.0 * (std::f64::consts::FRAC_PI_4).sin(),
        );
        let projection = alignment.project(query);
        assert!((projection.mileage - 10.0 * std::f64::consts::FRAC_PI_4).abs() < 1e-9);
        assert!((projection.offset - 2.0).abs() < 1e-9);
    }

    #[test]
    fn segment_query_uses_midpoint() {
        let alignment = straight(&[(0.0, 0.0), (0.0, 100.0)]);
        let projection = alignment.project_segment(Point2::new(4.0, 10.0), Point2::new(4.0, 30.0));
        assert!((projection.mileage - 20.0).abs() < 1e-9);
        assert!((projection.offset - 4.0).abs() < 1e-9);
    }
}
