//! 中心线里程模型：把无序、可跨图层的线段/圆弧串联成
//! 一条按弧长参数化的连续曲线，并叠加各图层的里程起点偏置。

use std::collections::BTreeMap;

use railcad_core::document::normalize_angle;
use railcad_core::geometry::{Point2, Vector2};
use tracing::debug;

use crate::errors::{AlignmentError, SynthesizeError};

/// 长度退化判定阈值，与连接容差无关。
const LENGTH_GUARD: f64 = 1e-9;

/// 中心线基元：直线段，或以带符号扫角表示的圆弧（正值逆时针）。
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SegmentGeometry {
    Line {
        start: Point2,
        end: Point2,
    },
    Arc {
        center: Point2,
        radius: f64,
        start_angle: f64,
        sweep: f64,
    },
}

impl SegmentGeometry {
    pub fn start_point(&self) -> Point2 {
        match *self {
            SegmentGeometry::Line { start, .. } => start,
            SegmentGeometry::Arc {
                center,
                radius,
                start_angle,
                ..
            } => arc_point(center, radius, start_angle),
        }
    }

    pub fn end_point(&self) -> Point2 {
        match *self {
            SegmentGeometry::Line { end, .. } => end,
            SegmentGeometry::Arc {
                center,
                radius,
                start_angle,
                sweep,
            } => arc_point(center, radius, start_angle + sweep),
        }
    }

    pub fn length(&self) -> f64 {
        match *self {
            SegmentGeometry::Line { start, end } => start.distance(end),
            SegmentGeometry::Arc { radius, sweep, .. } => radius.abs() * sweep.abs(),
        }
    }

    /// 反转行进方向，端点互换。
    pub fn reversed(&self) -> Self {
        match *self {
            SegmentGeometry::Line { start, end } => SegmentGeometry::Line {
                start: end,
                end: start,
            },
            SegmentGeometry::Arc {
                center,
                radius,
                start_angle,
                sweep,
            } => SegmentGeometry::Arc {
                center,
                radius,
                start_angle: start_angle + sweep,
                sweep: -sweep,
            },
        }
    }

    /// 弧长参数 `s`（自段起点起算）处的坐标。
    pub fn point_at(&self, s: f64) -> Point2 {
        match *self {
            SegmentGeometry::Line { start, end } => {
                let length = start.distance(end);
                if length <= LENGTH_GUARD {
                    return start;
                }
                let t = (s / length).clamp(0.0, 1.0);
                start.translate(start.vector_to(end).scaled(t))
            }
            SegmentGeometry::Arc {
                center,
                radius,
                start_angle,
                sweep,
            } => {
                let angle = start_angle + sweep.signum() * (s / radius.abs());
                arc_point(center, radius, angle)
            }
        }
    }

    /// 弧长参数 `s` 处里程增加方向的单位切向。
    pub fn tangent_at(&self, s: f64) -> Vector2 {
        match *self {
            SegmentGeometry::Line { start, end } => start
                .vector_to(end)
                .normalize()
                .unwrap_or(Vector2::new(1.0, 0.0)),
            SegmentGeometry::Arc {
                radius,
                start_angle,
                sweep,
                ..
            } => {
                let angle = start_angle + sweep.signum() * (s / radius.abs());
                if sweep >= 0.0 {
                    Vector2::new(-angle.sin(), angle.cos())
                } else {
                    Vector2::new(angle.sin(), -angle.cos())
                }
            }
        }
    }

    /// 查询点到本段的最近点：返回（弧长参数，垂足，距离）。
    /// 直线段夹紧标量投影，圆弧夹紧角度位置，均为闭式解。
    pub fn closest_point(&self, query: Point2) -> (f64, Point2, f64) {
        match *self {
            SegmentGeometry::Line { start, end } => {
                let ab = start.vector_to(end);
                let len_sq = ab.length_squared();
                if len_sq <= LENGTH_GUARD {
                    return (0.0, start, query.distance(start));
                }
                let t = (start.vector_to(query).dot(ab) / len_sq).clamp(0.0, 1.0);
                let foot = start.translate(ab.scaled(t));
                (t * ab.length(), foot, query.distance(foot))
            }
            SegmentGeometry::Arc {
                center,
                radius,
                start_angle,
                sweep,
            } => {
                let radius = radius.abs();
                let to_query = center.vector_to(query);
                if to_query.length() <= LENGTH_GUARD {
                    // 查询点在圆心：全弧等距，取段起点。
                    let foot = self.start_point();
                    return (0.0, foot, radius);
                }
                let phi = to_query.angle();
                let delta = if sweep >= 0.0 {
                    normalize_angle(phi - start_angle)
                } else {
                    normalize_angle(start_angle - phi)
                };
                if delta <= sweep.abs() {
                    let s = radius * delta;
                    let foot = self.point_at(s);
                    (s, foot, query.distance(foot))
                } else {
                    let start_pt = self.start_point();
                    let end_pt = self.end_point();
                    let to_start = query.distance(start_pt);
                    let to_end = query.distance(end_pt);
                    if to_start <= to_end {
                        (0.0, start_pt, to_start)
                    } else {
                        (self.length(), end_pt, to_end)
                    }
                }
            }
        }
    }
}

fn arc_point(center: Point2, radius: f64, angle: f64) -> Point2 {
    center.translate(Vector2::new(
        radius.abs() * angle.cos(),
        radius.abs() * angle.sin(),
    ))
}

/// 建模输入：几何基元 + 来源图层。顺序即文档实体顺序。
#[derive(Debug, Clone)]
pub struct RawSegment {
    pub geometry: SegmentGeometry,
    pub layer: String,
}

impl RawSegment {
    pub fn new(geometry: SegmentGeometry, layer: impl Into<String>) -> Self {
        Self {
            geometry,
            layer: layer.into(),
        }
    }
}

/// 定型后的中心线区段：几何 + 来源图层 + 起止里程（已含图层偏置）。
#[derive(Debug, Clone)]
pub struct AlignmentSegment {
    pub geometry: SegmentGeometry,
    pub layer: String,
    pub start_mileage: f64,
    pub end_mileage: f64,
}

impl AlignmentSegment {
    #[inline]
    pub fn length(&self) -> f64 {
        self.end_mileage - self.start_mileage
    }
}

/// 里程模型本体。构建完成后只读。
#[derive(Debug, Clone)]
pub struct Alignment {
    segments: Vec<AlignmentSegment>,
    epsilon: f64,
}

impl Alignment {
    /// 把无序区段串联成一条连续开曲线并建立里程表。
    ///
    /// `offsets` 是图层名到里程起点偏置（米）的映射；链上图层切换时
    /// 里程原点重置为新图层的偏置（偏置是原点修正，不是长度缩放）。
    /// `epsilon` 为端点连接容差（图纸单位，默认 1 毫米）。
    pub fn build(
        raw: Vec<RawSegment>,
        offsets: &BTreeMap<String, f64>,
        epsilon: f64,
    ) -> Result<Self, AlignmentError> {
        let segments: Vec<RawSegment> = raw
            .into_iter()
            .filter(|seg| seg.geometry.length() > LENGTH_GUARD)
            .collect();
        if segments.is_empty() {
            return Err(AlignmentError::Empty);
        }

        // 端点表：2i 为第 i 段起点，2i+1 为终点。
        let endpoints: Vec<Point2> = segments
            .iter()
            .flat_map(|seg| [seg.geometry.start_point(), seg.geometry.end_point()])
            .collect();

        let mut partners: Vec<Vec<usize>> = vec![Vec::new(); endpoints.len()];
        for i in 0..endpoints.len() {
            for j in 0..endpoints.len() {
                if i / 2 == j / 2 {
                    continue;
                }
                if endpoints[i].distance(endpoints[j]) <= epsilon {
                    partners[i].push(j);
                }
            }
        }

        for (index, list) in partners.iter().enumerate() {
            if list.len() > 1 {
                let at = endpoints[index];
                return Err(AlignmentError::Ambiguous {
                    x: at.x(),
                    y: at.y(),
                    count: list.len() + 1,
                    layer: segments[index / 2].layer.clone(),
                });
            }
        }

        let free_ends: Vec<usize> = (0..endpoints.len())
            .filter(|&i| partners[i].is_empty())
            .collect();
        match free_ends.len() {
            2 => {}
            0 => {
                return Err(AlignmentError::Disconnected {
                    detail: "所有端点均已配对，输入构成闭合环而非开曲线".to_string(),
                });
            }
            n => {
                return Err(AlignmentError::Disconnected {
                    detail: format!("检测到 {n} 个自由端点，输入包含 {} 条互不相连的链", n / 2),
                });
            }
        }

        // 起点取输入顺序最早的自由端；若该端是段的终点，则反转该段。
        let seed = *free_ends
            .iter()
            .min_by_key(|&&i| (i / 2, i % 2))
            .expect("free_ends has two entries");

        let mut used = vec![false; segments.len()];
        let mut chain: Vec<(usize, bool)> = Vec::with_capacity(segments.len());
        let mut current = seed / 2;
        let mut reversed = seed % 2 == 1;
        loop {
            used[current] = true;
            chain.push((current, reversed));
            let far = if reversed { current * 2 } else { current * 2 + 1 };
            let Some(&next_end) = partners[far].first() else {
                break;
            };
            let next = next_end / 2;
            if used[next] {
                return Err(AlignmentError::Disconnected {
                    detail: "串联时回到已使用的区段，输入存在重叠或环".to_string(),
                });
            }
            current = next;
            reversed = next_end % 2 == 1;
        }

        if chain.len() != segments.len() {
            let leftover = segments
                .iter()
                .enumerate()
                .find(|(i, _)| !used[*i])
                .map(|(_, seg)| seg.layer.clone())
                .unwrap_or_default();
            return Err(AlignmentError::Disconnected {
                detail: format!(
                    "{} 段未能接入主链（首个游离段位于图层 {leftover}）",
                    segments.len() - chain.len()
                ),
            });
        }

        let mut ordered = Vec::with_capacity(chain.len());
        let mut current_layer: Option<&str> = None;
        let mut mileage = 0.0;
        for (index, reversed) in chain {
            let source = &segments[index];
            let geometry = if reversed {
                source.geometry.reversed()
            } else {
                source.geometry
            };
            if current_layer != Some(source.layer.as_str()) {
                mileage = offsets.get(&source.layer).copied().unwrap_or(0.0);
                debug!(
                    layer = %source.layer,
                    origin = mileage,
                    "里程原点切换"
                );
                current_layer = Some(source.layer.as_str());
            }
            let length = geometry.length();
            ordered.push(AlignmentSegment {
                geometry,
                layer: source.layer.clone(),
                start_mileage: mileage,
                end_mileage: mileage + length,
            });
            mileage += length;
        }

        debug!(
            segments = ordered.len(),
            total = ordered.iter().map(AlignmentSegment::length).sum::<f64>(),
            "中心线建模完成"
        );
        Ok(Self {
            segments: ordered,
            epsilon,
        })
    }

    #[inline]
    pub fn segments(&self) -> &[AlignmentSegment] {
        &self.segments
    }

    #[inline]
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// 曲线总弧长（不含偏置跳变）。
    pub fn total_length(&self) -> f64 {
        self.segments.iter().map(AlignmentSegment::length).sum()
    }

    /// 按里程定位所在区段与段内弧长参数。落在任何区段
    /// `[start, end]`（端部各放宽连接容差）之外时返回 None。
    pub fn locate(&self, mileage: f64) -> Option<(&AlignmentSegment, f64)> {
        self.segments.iter().find_map(|segment| {
            if mileage >= segment.start_mileage - self.epsilon
                && mileage <= segment.end_mileage + self.epsilon
            {
                let local = (mileage - segment.start_mileage).clamp(0.0, segment.length());
                Some((segment, local))
            } else {
                None
            }
        })
    }

    /// 里程反算：求该里程处的坐标与切向。
    pub fn point_and_tangent(&self, mileage: f64) -> Result<(Point2, Vector2), SynthesizeError> {
        let (segment, local) = self
            .locate(mileage)
            .ok_or(SynthesizeError::MileageOutOfRange { mileage })?;
        Ok((
            segment.geometry.point_at(local),
            segment.geometry.tangent_at(local),
        ))
    }
}
