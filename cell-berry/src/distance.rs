//! 精确欧氏距离变换.
//!
//! 使用 Felzenszwalb & Huttenlocher 的下包络算法, 先按列, 再按行各做一次一维平方距离变换,
//! 时间复杂度与像素个数成线性.

use crate::consts::ElemType;
use crate::{Idx2d, MaskSlice};
use ndarray::{Array2, ArrayView2, Axis};

/// 距离场. 每个像素保存其到最近参考像素的欧氏距离 (像素单位).
///
/// 当不存在任何参考像素时, 所有值为 `f64::INFINITY`.
#[derive(Clone, Debug)]
pub struct DistanceField {
    data: Array2<f64>,
}

impl DistanceField {
    /// 每个像素到最近 **前景** 像素的距离. 前景像素本身为 0.
    pub fn to_foreground(mask: &MaskSlice) -> Self {
        Self::build(mask, ElemType::Foreground)
    }

    /// 每个像素到最近 **背景** 像素的距离. 背景像素本身为 0.
    ///
    /// 分水岭切分用这种极性求前景内部的 "深度".
    pub fn to_background(mask: &MaskSlice) -> Self {
        Self::build(mask, ElemType::Background)
    }

    fn build(mask: &MaskSlice, reference: ElemType) -> Self {
        let target = reference.pixel();
        let mut sq = mask
            .array_view()
            .mapv(|p| if p == target { 0.0 } else { f64::INFINITY });
        let (height, width) = mask.shape();

        let mut envelope = LowerEnvelope::new(height);
        let mut src = vec![0.0; height];
        let mut dst = vec![0.0; height];
        for mut col in sq.axis_iter_mut(Axis(1)) {
            src.iter_mut().zip(col.iter()).for_each(|(s, &v)| *s = v);
            envelope.transform(&src, &mut dst);
            col.iter_mut().zip(dst.iter()).for_each(|(c, &v)| *c = v);
        }

        let mut envelope = LowerEnvelope::new(width);
        let mut src = vec![0.0; width];
        let mut dst = vec![0.0; width];
        for mut row in sq.axis_iter_mut(Axis(0)) {
            src.iter_mut().zip(row.iter()).for_each(|(s, &v)| *s = v);
            envelope.transform(&src, &mut dst);
            row.iter_mut().zip(dst.iter()).for_each(|(r, &v)| *r = v);
        }

        sq.mapv_inplace(f64::sqrt);
        Self { data: sq }
    }

    /// 是否存在至少一个参考像素?
    #[inline]
    pub fn has_reference(&self) -> bool {
        self.data.iter().any(|v| v.is_finite())
    }

    /// 获取给定位置 (高, 宽) 的距离. 越界时返回 `None`.
    #[inline]
    pub fn get(&self, pos: Idx2d) -> Option<f64> {
        self.data.get(pos).copied()
    }

    /// 距离场的形状 (高, 宽).
    #[inline]
    pub fn shape(&self) -> Idx2d {
        self.data.dim()
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView2<f64> {
        self.data.view()
    }

    /// 由 `it` 给出的所有位置上距离的平均值. `it` 为空时返回 `None`.
    ///
    /// 如果存在越界索引, 则程序 panic.
    pub fn mean_over<I: IntoIterator<Item = Idx2d>>(&self, it: I) -> Option<f64> {
        let mut n = 0usize;
        let mut sum = 0.0;
        for pos in it {
            n += 1;
            sum += self.data[pos];
        }
        (n != 0).then(|| sum / n as f64)
    }
}

/// 一维平方距离变换所需的下包络缓冲区.
struct LowerEnvelope {
    /// 下包络中各抛物线的顶点位置.
    locations: Vec<usize>,

    /// 第 `i` 条抛物线在 `[boundaries[i], boundaries[i + 1])` 上最低.
    boundaries: Vec<f64>,
}

impl LowerEnvelope {
    fn new(len: usize) -> Self {
        Self {
            locations: vec![0; len],
            boundaries: vec![f64::NAN; len + 1],
        }
    }

    /// `out[q] = min_p (q - p)² + f[p]`.
    fn transform(&mut self, f: &[f64], out: &mut [f64]) {
        debug_assert_eq!(f.len(), out.len());
        debug_assert_eq!(self.locations.len(), f.len());
        if f.is_empty() {
            return;
        }

        let mut k = 0;
        self.locations[0] = 0;
        self.boundaries[0] = f64::NEG_INFINITY;
        self.boundaries[1] = f64::INFINITY;

        for q in 1..f.len() {
            if f[q] == f64::INFINITY {
                continue;
            }
            if k == 0 && f[self.locations[0]] == f64::INFINITY {
                self.locations[0] = q;
                self.boundaries[0] = f64::NEG_INFINITY;
                self.boundaries[1] = f64::INFINITY;
                continue;
            }

            let mut s = intersection(f, self.locations[k], q);
            while s <= self.boundaries[k] {
                k -= 1;
                s = intersection(f, self.locations[k], q);
            }
            k += 1;
            self.locations[k] = q;
            self.boundaries[k] = s;
            self.boundaries[k + 1] = f64::INFINITY;
        }

        let mut k = 0;
        for (q, o) in out.iter_mut().enumerate() {
            while self.boundaries[k + 1] < q as f64 {
                k += 1;
            }
            let p = self.locations[k];
            let d = q as f64 - p as f64;
            *o = d * d + f[p];
        }
    }
}

/// 抛物线 `f[p] + (x - p)²` 与 `f[q] + (x - q)²` 的交点横坐标.
#[inline]
fn intersection(f: &[f64], p: usize, q: usize) -> f64 {
    let (fp, fq) = (f[p], f[q]);
    let (p, q) = (p as f64, q as f64);
    ((fq + q * q) - (fp + p * p)) / (2.0 * q - 2.0 * p)
}

#[cfg(test)]
mod tests {
    use super::DistanceField;
    use crate::OwnedMask;
    use ndarray::Array2;

    fn f64_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn brute_force(mask: &Array2<u8>, pos: (usize, usize)) -> f64 {
        mask.indexed_iter()
            .filter(|(_, &p)| p != 0)
            .map(|((h, w), _)| {
                let dh = h as f64 - pos.0 as f64;
                let dw = w as f64 - pos.1 as f64;
                (dh * dh + dw * dw).sqrt()
            })
            .fold(f64::INFINITY, f64::min)
    }

    #[test]
    fn test_single_point() {
        let mut raw = Array2::zeros((15, 11));
        raw[(4, 7)] = 1u8;
        let mask = OwnedMask::from_raw(raw);
        let field = DistanceField::to_foreground(&mask.as_immut());
        for ((h, w), &d) in field.data().indexed_iter() {
            let dh = h as f64 - 4.0;
            let dw = w as f64 - 7.0;
            assert!(f64_eq(d, (dh * dh + dw * dw).sqrt()), "{h} {w}");
        }
    }

    #[test]
    fn test_matches_brute_force() {
        let mut seed = 7u64;
        let raw = Array2::from_shape_fn((20, 23), |_| {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
            ((seed >> 60) == 0) as u8
        });
        let mask = OwnedMask::from_raw(raw.clone());
        let field = DistanceField::to_foreground(&mask.as_immut());
        for (pos, &d) in field.data().indexed_iter() {
            assert!(f64_eq(d, brute_force(&raw, pos)));
        }
    }

    #[test]
    fn test_foreground_is_zero() {
        let mut raw = Array2::zeros((6, 6));
        raw.slice_mut(ndarray::s![1..4, 2..5]).fill(1u8);
        let mask = OwnedMask::from_raw(raw);
        let field = DistanceField::to_foreground(&mask.as_immut());
        for (pos, &p) in mask.as_immut().indexed_iter() {
            let d = field.get(pos).unwrap();
            if p == 255 {
                assert_eq!(d, 0.0);
            } else {
                assert!(d > 0.0);
            }
        }
        assert!(f64_eq(field.get((5, 5)).unwrap(), 5.0f64.sqrt()));
    }

    #[test]
    fn test_to_background() {
        let mut raw = Array2::zeros((7, 7));
        raw.slice_mut(ndarray::s![1..6, 1..6]).fill(1u8);
        let mask = OwnedMask::from_raw(raw);
        let field = DistanceField::to_background(&mask.as_immut());
        assert_eq!(field.get((0, 0)), Some(0.0));
        assert_eq!(field.get((1, 1)), Some(1.0));
        assert_eq!(field.get((3, 3)), Some(3.0));
        assert_eq!(field.get((2, 3)), Some(2.0));
    }

    #[test]
    fn test_no_reference() {
        let mask = OwnedMask::empty((4, 5));
        let field = DistanceField::to_foreground(&mask.as_immut());
        assert!(!field.has_reference());
        assert_eq!(field.get((2, 2)), Some(f64::INFINITY));
        assert_eq!(field.mean_over(Vec::new()), None);
    }
}
