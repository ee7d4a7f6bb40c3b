pub mod alignment;
pub mod annotate;
pub mod crossing;
pub mod extract;
pub mod projection;
pub mod report;
pub mod rooms;

pub mod errors {
    use thiserror::Error;

    /// 中心线建模失败：任何一种都无法产出可用的里程，直接终止本次运行。
    #[derive(Debug, Error)]
    pub enum AlignmentError {
        #[error("没有可用的中心线图元，无法建立里程模型")]
        Empty,
        #[error(
            "中心线在 ({x:.3}, {y:.3}) 附近有 {count} 个候选连接端点（图层 {layer}），存在分岔，暂不支持"
        )]
        Ambiguous {
            x: f64,
            y: f64,
            count: usize,
            layer: String,
        },
        #[error("中心线无法串联成一条连续开曲线：{detail}")]
        Disconnected { detail: String },
    }

    /// 逐条记录级错误：跳过该条记录并继续批处理。
    #[derive(Debug, Error)]
    pub enum SynthesizeError {
        #[error("里程 {mileage:.3} m 不在任何中心线区段范围内")]
        MileageOutOfRange { mileage: f64 },
    }
}
