//! z 方向最大值投影.

use super::{OwnedIntensity, Volume};
use ndarray::{Array2, Axis, Zip};

impl Volume {
    /// 获取第 `channel` 个通道 (从 0 开始) 的最大值投影:
    /// 每个像素取该通道所有 z 切片在此位置上的最大强度.
    ///
    /// `channel` 越界属于调用方违约, 程序 panic.
    pub fn max_project(&self, channel: usize) -> OwnedIntensity {
        assert!(
            channel < self.channels(),
            "通道 {channel} 越界, 体数据只有 {} 个通道",
            self.channels()
        );
        let stack = self.data.index_axis(Axis(0), channel);
        let mut proj = Array2::from_elem(self.slice_shape(), f32::NEG_INFINITY);
        for sli in stack.axis_iter(Axis(0)) {
            Zip::from(&mut proj).and(&sli).for_each(|p, &v| *p = p.max(v));
        }
        OwnedIntensity::from_raw(proj)
    }
}
