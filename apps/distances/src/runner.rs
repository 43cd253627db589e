//! 程序运行函数.

use crate::summary::{ImageOutcome, RunSummary};
use cell_berry::measure::{self, ChannelConfig, Marker, Report};
use cell_berry::{ImgWriteRaw, Volume};
use log::{error, info};
use std::error::Error;
use std::fs::{self, File};
use std::path::Path;
use utils::{config, loader};

/// 结果表格文件名.
const TABLE_FILE: &str = "distances.csv";

/// 实际运行.
pub fn run() -> Result<RunSummary, Box<dyn Error>> {
    let volume_dir = loader::volume_dir_from_env_or_home().ok_or("无法确定体数据目录")?;
    if !volume_dir.is_dir() {
        return Err(format!("{} 不是目录", volume_dir.display()).into());
    }
    let out_dir = loader::output_dir_from_env_or(&volume_dir);
    fs::create_dir_all(&out_dir)?;

    let channels = config::channel_config_from_env()?;
    let calibration = config::calibration_from_env()?;
    let save_masks = config::flag_from_env("CELL_SAVE_MASKS");
    let dump_report = config::flag_from_env("CELL_DUMP_REPORT");

    let volumes = loader::volume_loader(&volume_dir, calibration)?;
    info!(
        "从 {} 加载 {} 个体数据, 输出至 {} ({} 核)",
        volume_dir.display(),
        volumes.len(),
        out_dir.display(),
        utils::cpus()
    );

    let mut summary = RunSummary::new();
    for (path, volume) in volumes {
        let volume = match volume {
            Ok(v) => v,
            Err(e) => {
                error!("{}: {e}", path.display());
                summary.push_failure(path.display().to_string(), e.to_string());
                continue;
            }
        };
        match process(&volume, &channels, &out_dir, save_masks, dump_report) {
            Ok(report) => {
                summary.push(ImageOutcome::from_report(&report));
                summary.extend_table(report.table);
            }
            Err(e) => {
                error!("{}: {e}", volume.name());
                summary.push_failure(volume.name().to_string(), e.to_string());
            }
        }
    }

    let table_path = out_dir.join(TABLE_FILE);
    summary.table().write_csv(File::create(&table_path)?)?;
    info!("结果表格已写入 {}", table_path.display());
    Ok(summary)
}

/// 测量一个体数据, 并写出标注图以及可选的掩膜和报告.
fn process(
    volume: &Volume,
    channels: &ChannelConfig,
    out_dir: &Path,
    save_masks: bool,
    dump_report: bool,
) -> Result<Report, Box<dyn Error>> {
    let report = measure::run(volume, channels)?;
    let name = volume.name();

    // 标注图以 OPN 通道的投影为背景.
    let background = volume.max_project(channels.spec(Marker::Opn).channel_index());
    report
        .overlay
        .save(&background.as_immutable(), out_dir.join(format!("{name}_overlay.png")))?;

    if save_masks {
        for (marker, mask) in report.masks.iter() {
            let mask = mask.decompress();
            mask.as_immut()
                .save_raw(out_dir.join(format!("{name}_{}.png", marker.name())))?;
        }
    }

    if dump_report {
        report.save_bincode(out_dir.join(format!("{name}.report")))?;
    }
    Ok(report)
}
