//! 固定的测量协议: 各标记的分割参数和候选细胞面积范围.

use super::config::{Marker, CHANNEL_COUNT};
use crate::consts::{MAX_CELL_AREA, MIN_CELL_AREA};
use crate::segment::{SegmentSpec, ThresholdMethod};

/// 测量协议. 不对用户开放, 正式流程总是使用 [`Protocol::standard`].
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Protocol {
    specs: [SegmentSpec; CHANNEL_COUNT],
    area_range: (f64, f64),
}

impl Protocol {
    /// 标准协议.
    ///
    /// | 标记    | sigma (µm) | k | 阈值方法   | 填充孔洞 | 分水岭 |
    /// |---------|------------|---|------------|----------|--------|
    /// | SCA1    | 1.0        | 6 | Otsu       | 否       | 否     |
    /// | Hoechst | 1.5        | 5 | Otsu       | 是       | 是     |
    /// | OPN     | 1.0        | 0 | MaxEntropy | 否       | 否     |
    /// | GFP     | 0.5        | 5 | Otsu       | 否       | 是     |
    ///
    /// 候选细胞面积范围为 `[5, 100]` µm².
    pub const fn standard() -> Self {
        use ThresholdMethod::*;
        Self {
            specs: [
                SegmentSpec::new_unchecked(1.0, 6.0, Otsu, false, false),
                SegmentSpec::new_unchecked(1.5, 5.0, Otsu, true, true),
                SegmentSpec::new_unchecked(1.0, 0.0, MaxEntropy, false, false),
                SegmentSpec::new_unchecked(0.5, 5.0, Otsu, false, true),
            ],
            area_range: (MIN_CELL_AREA, MAX_CELL_AREA),
        }
    }

    /// 自定义协议, 用于测试合成图像.
    #[cfg(test)]
    pub(crate) const fn new(specs: [SegmentSpec; CHANNEL_COUNT], area_range: (f64, f64)) -> Self {
        Self { specs, area_range }
    }

    /// `marker` 的分割参数.
    #[inline]
    pub fn spec(&self, marker: Marker) -> &SegmentSpec {
        &self.specs[marker.index()]
    }

    /// 候选细胞物理面积的闭区间 `(下限, 上限)`.
    #[inline]
    pub fn area_range(&self) -> (f64, f64) {
        self.area_range
    }

    /// `area` 是否在候选细胞面积范围内?
    #[inline]
    pub fn accepts_area(&self, area: f64) -> bool {
        let (lo, hi) = self.area_range;
        lo <= area && area <= hi
    }
}

impl Default for Protocol {
    #[inline]
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::Protocol;
    use crate::measure::Marker;
    use crate::segment::ThresholdMethod;

    #[test]
    fn test_standard_protocol() {
        let p = Protocol::standard();
        assert_eq!(p.spec(Marker::Opn).method(), ThresholdMethod::MaxEntropy);
        assert_eq!(p.spec(Marker::Opn).background_factor(), 0.0);
        assert!(p.spec(Marker::Hoechst).fill_holes());
        assert!(p.spec(Marker::Gfp).watershed());
        assert!(!p.spec(Marker::Sca1).watershed());
        assert_eq!(p.spec(Marker::Sca1).background_factor(), 6.0);
    }

    #[test]
    fn test_area_range_is_inclusive() {
        let p = Protocol::standard();
        assert!(p.accepts_area(5.0));
        assert!(p.accepts_area(100.0));
        assert!(!p.accepts_area(4.99));
        assert!(!p.accepts_area(100.01));
    }
}
