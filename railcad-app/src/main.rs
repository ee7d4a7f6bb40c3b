use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use railcad_config::{AppConfig, ConfigError};

mod commands;

#[derive(Debug, Parser)]
#[command(name = "railcad", version, about = "铁路里程 CAD 分析工具")]
struct Cli {
    /// 配置文件路径；缺省时按 RAILCAD_CONFIG / ./config/default.toml 发现
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// 解算电力折线与中心线的交叉，输出里程-角度表
    Crossings {
        /// 含中心线与电力图层的 DXF 文件
        #[arg(long)]
        dxf: PathBuf,
        /// 输出 CSV 路径（缺省为 <输入名>.crossings.csv）
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// 按里程-角度表在中心线上绘制标注线段
    Annotate {
        #[arg(long)]
        dxf: PathBuf,
        /// 里程-角度表（CSV，第 0 列里程、第 1 列角度）
        #[arg(long)]
        table: PathBuf,
        /// 输出 DXF 路径（缺省为 <输入名>_with_annotations.dxf）
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// 按里程列表绘制到固定目标点的连接线
    Connect {
        #[arg(long)]
        dxf: PathBuf,
        /// 里程列表文本（每行一个或多个值，逗号/空白分隔）
        #[arg(long)]
        mileages: PathBuf,
        /// 目标坐标 "X,Y"（缺省取配置中的 connect.target）
        #[arg(long)]
        target: Option<String>,
        /// 输出 DXF 路径（缺省为 <输入名>_connected.dxf）
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// 提取封闭区域内的文字标签并投影到中心线求里程
    Rooms {
        /// 含中心线图层的 DXF 文件
        #[arg(long)]
        rail_dxf: PathBuf,
        /// 含封闭区域与文字的 DXF 文件
        #[arg(long)]
        room_dxf: PathBuf,
        /// 输出 CSV 路径（缺省为 <区域文件名>.rooms.csv）
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// 封闭区域统计：质心里程、顶点最近距离、面积
    Regions {
        #[arg(long)]
        rail_dxf: PathBuf,
        #[arg(long)]
        room_dxf: PathBuf,
        /// 输出 CSV 路径（缺省为 <区域文件名>.regions.csv）
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// 文档图层与实体统计
    Stats {
        #[arg(long)]
        dxf: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_configuration(cli.config);
    init_logging(&config);
    info!("启动 railcad");

    match cli.command {
        Command::Crossings { dxf, out } => commands::run_crossings(&config, &dxf, out),
        Command::Annotate { dxf, table, out } => {
            commands::run_annotate(&config, &dxf, &table, out)
        }
        Command::Connect {
            dxf,
            mileages,
            target,
            out,
        } => commands::run_connect(&config, &dxf, &mileages, target.as_deref(), out),
        Command::Rooms {
            rail_dxf,
            room_dxf,
            out,
        } => commands::run_rooms(&config, &rail_dxf, &room_dxf, out),
        Command::Regions {
            rail_dxf,
            room_dxf,
            out,
        } => commands::run_regions(&config, &rail_dxf, &room_dxf, out),
        Command::Stats { dxf } => commands::run_stats(&dxf),
    }
}

fn load_configuration(override_path: Option<PathBuf>) -> AppConfig {
    match override_path {
        Some(path) => AppConfig::from_file(&path).unwrap_or_else(|err| {
            warn!(path = %path.display(), error = %err, "加载指定配置失败，使用默认配置");
            AppConfig::default()
        }),
        None => match AppConfig::discover() {
            Ok(cfg) => cfg,
            Err(err) => {
                match &err {
                    ConfigError::Io { path, .. } | ConfigError::Parse { path, .. } => {
                        warn!(path = %path.display(), error = %err, "加载默认配置失败，使用内建默认值");
                    }
                    ConfigError::Context { .. } => {
                        warn!(error = %err, "加载默认配置失败，使用内建默认值");
                    }
                }
                AppConfig::default()
            }
        },
    }
}

fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_new(config.logging.level.clone()).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(filter);
    if subscriber.try_init().is_err() {
        // 已初始化，忽略
    }
}
