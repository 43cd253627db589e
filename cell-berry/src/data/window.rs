//! 强度显示窗口.

/// 强度显示窗口, 包含下限和上限. 用于将任意范围的荧光强度映射到 8 位灰度.
///
/// 该窗口是只读的. 若要修改窗口参数, 你应该创建新的实例.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct IntensityWindow {
    lower: f32,
    upper: f32,
}

impl IntensityWindow {
    /// 构建显示窗口.
    ///
    /// `lower` 和 `upper` 必须是有限值, 且 `lower < upper`, 否则返回 `None`.
    pub fn new(lower: f32, upper: f32) -> Option<IntensityWindow> {
        (lower.is_finite() && upper.is_finite() && lower < upper).then_some(Self { lower, upper })
    }

    /// 以切片的 (最小值, 最大值) 作为窗口. 切片为常数或不存在有限值时,
    /// 退化为 `[v, v + 1]`.
    pub fn auto(slice: &crate::IntensitySlice) -> IntensityWindow {
        match slice.min_max() {
            Some((lo, hi)) if lo < hi => Self {
                lower: lo,
                upper: hi,
            },
            Some((v, _)) => Self {
                lower: v,
                upper: v + 1.0,
            },
            None => Self {
                lower: 0.0,
                upper: 1.0,
            },
        }
    }

    /// 窗下限.
    #[inline]
    pub fn lower_bound(&self) -> f32 {
        self.lower
    }

    /// 窗上限.
    #[inline]
    pub fn upper_bound(&self) -> f32 {
        self.upper
    }

    /// 窗宽.
    #[inline]
    pub fn width(&self) -> f32 {
        self.upper - self.lower
    }

    /// 求在当前窗口设置下, 强度 `v` 对应的灰度图像素整数值 (0 <= value <= 255)
    ///
    /// 如果 `v` 无意义 (如 inf, NaN), 则返回 `None`.
    pub fn eval(&self, v: f32) -> Option<u8> {
        self.eval_f32(v).map(|g| g as u8)
    }

    /// 求在当前窗口设置下, 强度 `v` 对应的灰度图像素分布点 (0.0 <= value <= 255.0).
    ///
    /// 如果 `v` 无意义 (如 inf, NaN), 则返回 `None`.
    pub fn eval_f32(&self, v: f32) -> Option<f32> {
        if !v.is_finite() {
            return None;
        }
        if v <= self.lower {
            Some(0.0)
        } else if v >= self.upper {
            Some(255.0)
        } else {
            // 255, not 256.
            Some((v - self.lower) / self.width() * 255.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{IntensityWindow, OwnedIntensity};
    use ndarray::array;

    #[test]
    fn test_window_invalid_input() {
        assert!(IntensityWindow::new(1.0, 1.0).is_none());
        assert!(IntensityWindow::new(2.0, 1.0).is_none());
        assert!(IntensityWindow::new(f32::NAN, 1.0).is_none());
    }

    #[test]
    fn test_window_generic() {
        let win = IntensityWindow::new(100.0, 500.0).unwrap();
        assert_eq!(win.eval(f32::NAN), None);
        assert_eq!(win.eval(f32::MIN), Some(0));
        assert_eq!(win.eval(100.0), Some(0));
        assert_eq!(win.eval(200.0), Some((255.0 * 0.25) as u8));
        assert_eq!(win.eval(300.0), Some((255.0 * 0.5) as u8));
        assert_eq!(win.eval(499.99), Some(254));
        assert_eq!(win.eval(500.0), Some(255));
        assert_eq!(win.eval(f32::MAX), Some(255));
    }

    #[test]
    fn test_window_auto() {
        let s = OwnedIntensity::from_raw(array![[3.0, 7.0], [f32::NAN, 5.0]]);
        let win = IntensityWindow::auto(&s.as_immutable());
        assert_eq!(win.lower_bound(), 3.0);
        assert_eq!(win.upper_bound(), 7.0);

        let flat = OwnedIntensity::from_raw(array![[2.0, 2.0]]);
        let win = IntensityWindow::auto(&flat.as_immutable());
        assert_eq!(win.width(), 1.0);
        assert_eq!(win.eval(2.0), Some(0));
    }
}
