//! 数据集操作.
//!
//! 提供迭代器风格的体数据目录加载器.

use crate::{Calibration, OpenVolumeError, Volume};
use std::io;
use std::path::{Path, PathBuf};

/// 获取 `{用户主目录}/dataset` 目录.
pub fn home_dataset_dir() -> Option<PathBuf> {
    let mut ans = dirs::home_dir()?;
    ans.push("dataset");
    Some(ans)
}

/// 获取 `{用户主目录}/dataset` 目录下给定继续项组成的全路径.
pub fn home_dataset_dir_with<P: AsRef<Path>, I: IntoIterator<Item = P>>(it: I) -> Option<PathBuf> {
    let mut ans = home_dataset_dir()?;
    ans.extend(it);
    Some(ans)
}

/// 支持的体数据文件格式.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum VolumeFormat {
    /// `.nii` 或 `.nii.gz`.
    Nifti,

    /// `.npy`.
    Npy,
}

impl VolumeFormat {
    /// 根据文件名后缀判断格式. 不支持的文件返回 `None`.
    pub fn of<P: AsRef<Path>>(path: P) -> Option<Self> {
        let name = path.as_ref().file_name()?.to_str()?.to_ascii_lowercase();
        if name.ends_with(".nii") || name.ends_with(".nii.gz") {
            Some(Self::Nifti)
        } else if name.ends_with(".npy") {
            Some(Self::Npy)
        } else {
            None
        }
    }
}

/// 打开 `path` 处的体数据. npy 文件使用 `calibration` 作为标定,
/// nifti 文件使用 header 中的标定.
///
/// 不支持的后缀按 npy 处理.
pub fn open_volume<P: AsRef<Path>>(
    path: P,
    calibration: Calibration,
) -> Result<Volume, OpenVolumeError> {
    let path = path.as_ref();
    match VolumeFormat::of(path) {
        Some(VolumeFormat::Nifti) => Volume::open_nifti(path),
        _ => Volume::open_npy(path, calibration),
    }
}

/// 从目录 `dir` 创建体数据加载器. 目录下所有支持格式的文件按文件名排序后依次加载,
/// 其他文件和子目录被忽略.
///
/// # 注意
///
/// 1. 目录无法读取时返回 `Err`.
/// 2. 单个文件加载失败不会中断迭代, 而是在对应项中返回 `Result::Err`.
pub fn volume_loader<P: AsRef<Path>>(
    dir: P,
    calibration: Calibration,
) -> io::Result<VolumeLoader> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && VolumeFormat::of(&path).is_some() {
            files.push(path);
        }
    }
    files.sort_unstable();
    files.reverse();

    Ok(VolumeLoader {
        files_rev: files,
        calibration,
    })
}

/// 体数据加载器, 每一项为 (文件路径, 加载结果).
#[derive(Debug)]
pub struct VolumeLoader {
    files_rev: Vec<PathBuf>,
    calibration: Calibration,
}

impl Iterator for VolumeLoader {
    type Item = (PathBuf, Result<Volume, OpenVolumeError>);

    fn next(&mut self) -> Option<Self::Item> {
        let path = self.files_rev.pop()?;
        let data = open_volume(&path, self.calibration);
        Some((path, data))
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.files_rev.len(), Some(self.files_rev.len()))
    }
}

impl ExactSizeIterator for VolumeLoader {
    #[inline]
    fn len(&self) -> usize {
        self.files_rev.len()
    }
}

#[cfg(test)]
mod tests {
    use super::{volume_loader, VolumeFormat};
    use crate::Calibration;
    use ndarray::Array4;
    use ndarray_npy::write_npy;
    use std::path::PathBuf;

    #[test]
    fn test_format() {
        assert_eq!(VolumeFormat::of("a/b.nii"), Some(VolumeFormat::Nifti));
        assert_eq!(VolumeFormat::of("b.NII.GZ"), Some(VolumeFormat::Nifti));
        assert_eq!(VolumeFormat::of("c.npy"), Some(VolumeFormat::Npy));
        assert_eq!(VolumeFormat::of("d.tif"), None);
        assert_eq!(VolumeFormat::of("npy"), None);
    }

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(name);
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_loader_sorted_and_filtered() {
        let dir = temp_dir("cell-berry-loader-sorted");
        let data = Array4::<f32>::from_elem((4, 2, 5, 6), 3.0);
        write_npy(dir.join("b.npy"), &data).unwrap();
        write_npy(dir.join("a.npy"), &data).unwrap();
        std::fs::write(dir.join("notes.txt"), "ignored").unwrap();
        std::fs::write(dir.join("broken.npy"), "not an array").unwrap();

        let cal = Calibration::new(0.3, 0.3).unwrap();
        let loader = volume_loader(&dir, cal).unwrap();
        assert_eq!(loader.len(), 3);

        let items: Vec<_> = loader.collect();
        let names: Vec<_> = items
            .iter()
            .map(|(p, _)| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["a.npy", "b.npy", "broken.npy"]);

        let v = items[0].1.as_ref().unwrap();
        assert_eq!(v.name(), "a");
        assert_eq!(v.shape(), (4, 2, 5, 6));
        assert_eq!(v.calibration(), cal);
        assert!(items[2].1.is_err());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_loader_missing_dir() {
        let dir = std::env::temp_dir().join("cell-berry-loader-does-not-exist");
        let _ = std::fs::remove_dir_all(&dir);
        assert!(volume_loader(&dir, Calibration::unit()).is_err());
    }
}
