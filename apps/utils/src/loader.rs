//! 对 `cell-berry::dataset` 的更一层封装. 提供更直接的数据集加载器.

use cell_berry::dataset::{self, VolumeLoader};
use cell_berry::Calibration;
use std::env;
use std::io;
use std::path::{Path, PathBuf};

/// 获取体数据目录.
///
/// 1. 若环境变量 `$CELL_VOLUME_DIR` 非空, 则返回其值;
/// 2. 否则, 返回 `$HOME/dataset/cells`.
///
/// 两者都无法确定时返回 `None`.
pub fn volume_dir_from_env_or_home() -> Option<PathBuf> {
    match env::var("CELL_VOLUME_DIR") {
        Ok(d) if !d.is_empty() => Some(PathBuf::from(d)),
        _ => dataset::home_dataset_dir_with(["cells"]),
    }
}

/// 获取输出目录.
///
/// 1. 若环境变量 `$CELL_OUTPUT_DIR` 非空, 则返回其值;
/// 2. 否则, 返回 `{体数据目录}/results`.
pub fn output_dir_from_env_or(volume_dir: &Path) -> PathBuf {
    match env::var("CELL_OUTPUT_DIR") {
        Ok(d) if !d.is_empty() => PathBuf::from(d),
        _ => volume_dir.join("results"),
    }
}

/// 获取 `path` 下的体数据加载器.
#[inline]
pub fn volume_loader<P: AsRef<Path>>(path: P, calibration: Calibration) -> io::Result<VolumeLoader> {
    dataset::volume_loader(path, calibration)
}
