//! 距离测量: 对每个 Hoechst+ OPN+ 候选细胞, 求其到最近 SCA1+ GFP+ 区域的平均距离.

mod config;
mod pipeline;
mod protocol;
mod table;

pub use config::{ChannelConfig, ChannelSpec, ConfigError, Marker, CHANNEL_COUNT};
pub use pipeline::{run, run_with};
pub use protocol::Protocol;
pub use table::{MeasurementRow, ResultsTable, COLUMNS};

use crate::overlay::Overlay;
use crate::{Calibration, CompactMask};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 一张图像的测量报告.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Report {
    /// 图像名称.
    pub image: String,

    /// 物理标定.
    pub calibration: Calibration,

    /// 测量结果.
    pub table: ResultsTable,

    /// 可视化标注.
    pub overlay: Overlay,

    /// 四个标记的分割掩膜 (压缩存储).
    pub masks: Vec<(Marker, CompactMask)>,
}

impl Report {
    /// 获取 `marker` 的分割掩膜.
    pub fn mask(&self, marker: Marker) -> Option<&CompactMask> {
        self.masks
            .iter()
            .find_map(|(m, mask)| (*m == marker).then_some(mask))
    }
}

#[cfg(feature = "serde")]
mod persist {
    use super::Report;
    use std::fs::File;
    use std::io::{BufReader, BufWriter};
    use std::path::Path;

    impl Report {
        /// 以 bincode 格式保存到 `path`.
        pub fn save_bincode<P: AsRef<Path>>(&self, path: P) -> bincode::Result<()> {
            let f = BufWriter::new(File::create(path)?);
            bincode::serialize_into(f, self)
        }

        /// 从 bincode 文件读取.
        pub fn load_bincode<P: AsRef<Path>>(path: P) -> bincode::Result<Self> {
            let f = BufReader::new(File::open(path)?);
            bincode::deserialize_from(f)
        }
    }

    #[cfg(test)]
    mod tests {
        use crate::measure::{run, ChannelConfig, Marker, Report};
        use crate::{Calibration, Volume};
        use ndarray::{s, Array4};

        #[test]
        fn test_bincode_round_trip() {
            let mut data = Array4::<f32>::from_elem((4, 2, 32, 32), 1.0);
            data.slice_mut(s![.., 1, 4..12, 4..12]).fill(500.0);
            let v = Volume::from_array("rt", data, Calibration::new(0.4, 0.4).unwrap()).unwrap();
            let report = run(&v, &ChannelConfig::default()).unwrap();

            let path = std::env::temp_dir().join("cell-berry-report-round-trip.bin");
            report.save_bincode(&path).unwrap();
            let back = Report::load_bincode(&path).unwrap();
            let _ = std::fs::remove_file(&path);

            assert_eq!(back.image, "rt");
            assert_eq!(back.calibration, report.calibration);
            assert_eq!(back.table, report.table);
            assert_eq!(back.overlay, report.overlay);
            assert_eq!(
                back.mask(Marker::Gfp).unwrap().decompress(),
                report.mask(Marker::Gfp).unwrap().decompress()
            );
        }
    }
}
