//! 256-bin 直方图与全局自动阈值.

use crate::consts::HISTOGRAM_BINS;
use ndarray::ArrayView2;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 自动阈值方法.
///
/// 每种方法都返回直方图中 **最后一个背景 bin** 的索引 `level`,
/// 即 `0..=level` 为背景, `level + 1..` 为前景.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ThresholdMethod {
    /// 最大类间方差.
    Otsu,

    /// 最大熵 (Kapur, Sahoo & Wong).
    MaxEntropy,

    /// 迭代自组织 (Ridler & Calvard 的 ImageJ 变体).
    IsoData,

    /// 灰度平均值.
    Mean,
}

impl ThresholdMethod {
    /// 对直方图 `hist` 求最后一个背景 bin. 方法无定义时 (例如直方图为空) 返回 `None`.
    pub fn level(&self, hist: &[u64]) -> Option<usize> {
        if hist.iter().all(|&c| c == 0) {
            return None;
        }
        match self {
            Self::Otsu => otsu(hist),
            Self::MaxEntropy => max_entropy(hist),
            Self::IsoData => iso_data(hist),
            Self::Mean => mean(hist),
        }
    }
}

fn otsu(hist: &[u64]) -> Option<usize> {
    let total: f64 = hist.iter().map(|&c| c as f64).sum();
    let sum_total: f64 = hist
        .iter()
        .enumerate()
        .map(|(i, &c)| i as f64 * c as f64)
        .sum();

    let mut sum_bg = 0.0;
    let mut weight_bg = 0.0;
    let mut best: Option<(usize, f64)> = None;
    for (t, &count) in hist.iter().enumerate() {
        weight_bg += count as f64;
        if weight_bg == 0.0 {
            continue;
        }
        let weight_fg = total - weight_bg;
        if weight_fg == 0.0 {
            break;
        }
        sum_bg += t as f64 * count as f64;

        let mean_bg = sum_bg / weight_bg;
        let mean_fg = (sum_total - sum_bg) / weight_fg;
        let variance = weight_bg * weight_fg * (mean_bg - mean_fg).powi(2);
        if best.map_or(true, |(_, v)| variance > v) {
            best = Some((t, variance));
        }
    }
    best.map(|(t, _)| t)
}

fn max_entropy(hist: &[u64]) -> Option<usize> {
    const EPS: f64 = f64::EPSILON;

    let total: f64 = hist.iter().map(|&c| c as f64).sum();
    let norm: Vec<f64> = hist.iter().map(|&c| c as f64 / total).collect();

    // 累积分布.
    let mut p1 = Vec::with_capacity(norm.len());
    let mut acc = 0.0;
    for &p in norm.iter() {
        acc += p;
        p1.push(acc);
    }
    let p2: Vec<f64> = p1.iter().map(|&p| 1.0 - p).collect();

    let first = p1.iter().position(|p| p.abs() >= EPS)?;
    let last = p2.iter().rposition(|p| p.abs() >= EPS)?;

    let entropy = |range: std::ops::Range<usize>, mass: f64| -> f64 {
        norm[range]
            .iter()
            .filter(|&&p| p != 0.0)
            .map(|&p| {
                let q = p / mass;
                -q * q.ln()
            })
            .sum()
    };

    let mut best: Option<(usize, f64)> = None;
    for it in first..=last {
        let total_entropy = entropy(0..it + 1, p1[it]) + entropy(it + 1..norm.len(), p2[it]);
        if best.map_or(true, |(_, e)| total_entropy > e) {
            best = Some((it, total_entropy));
        }
    }
    best.map(|(it, _)| it)
}

fn iso_data(hist: &[u64]) -> Option<usize> {
    let n = hist.len();
    let mut g = (1..n).find(|&i| hist[i] > 0)? + 1;
    loop {
        let (mut tot_l, mut l) = (0.0, 0.0);
        for (i, &c) in hist.iter().enumerate().take((g + 1).min(n)) {
            tot_l += c as f64;
            l += c as f64 * i as f64;
        }
        let (mut tot_h, mut h) = (0.0, 0.0);
        for (i, &c) in hist.iter().enumerate().skip(g + 1) {
            tot_h += c as f64;
            h += c as f64 * i as f64;
        }
        if tot_l > 0.0 && tot_h > 0.0 {
            let centre = ((l / tot_l + h / tot_h) / 2.0).round() as usize;
            if g == centre {
                return Some(g);
            }
        }
        g += 1;
        if g + 1 >= n {
            return None;
        }
    }
}

fn mean(hist: &[u64]) -> Option<usize> {
    let total: f64 = hist.iter().map(|&c| c as f64).sum();
    let sum: f64 = hist
        .iter()
        .enumerate()
        .map(|(i, &c)| i as f64 * c as f64)
        .sum();
    Some((sum / total).floor() as usize)
}

/// 强度网格在其自身 `[min, max]` 范围上的 256-bin 直方图.
#[derive(Clone, Debug)]
pub struct Histogram {
    bins: Vec<u64>,
    min: f32,
    max: f32,
}

impl Histogram {
    /// 统计所有有限像素. 不存在有限像素, 或网格为常数时返回 `None`.
    pub fn of(grid: ArrayView2<f32>) -> Option<Self> {
        let (min, max) = grid
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(None, |acc: Option<(f32, f32)>, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })?;
        if min >= max {
            return None;
        }

        let mut bins = vec![0u64; HISTOGRAM_BINS];
        let scale = HISTOGRAM_BINS as f64 / (max as f64 - min as f64);
        for &v in grid.iter().filter(|v| v.is_finite()) {
            let bin = ((v as f64 - min as f64) * scale) as usize;
            bins[bin.min(HISTOGRAM_BINS - 1)] += 1;
        }
        Some(Self { bins, min, max })
    }

    /// 各 bin 的计数.
    #[inline]
    pub fn bins(&self) -> &[u64] {
        &self.bins
    }

    /// 统计范围 `(min, max)`.
    #[inline]
    pub fn range(&self) -> (f32, f32) {
        (self.min, self.max)
    }

    /// 用 `method` 求阈值, 并把 bin 索引 `level` 按 `level / 255` 换算回原始强度范围.
    /// 强度 **严格大于** 返回值的像素为前景.
    ///
    /// 方法无定义时返回 `None`.
    pub fn threshold(&self, method: ThresholdMethod) -> Option<f32> {
        let level = method.level(&self.bins)? as f64;
        let span = self.max as f64 - self.min as f64;
        Some((level / 255.0 * span + self.min as f64) as f32)
    }
}

#[cfg(test)]
mod tests {
    use super::{Histogram, ThresholdMethod};
    use ndarray::Array2;

    /// 两个高斯样峰, 分别位于 `lo` 和 `hi`.
    fn bimodal(lo: usize, hi: usize) -> Vec<u64> {
        let mut hist = vec![0u64; 256];
        for (i, c) in hist.iter_mut().enumerate() {
            let a = (i as f64 - lo as f64) / 6.0;
            let b = (i as f64 - hi as f64) / 6.0;
            *c = (1000.0 * (-a * a / 2.0).exp() + 1000.0 * (-b * b / 2.0).exp()) as u64;
        }
        hist
    }

    #[test]
    fn test_methods_split_bimodal() {
        let hist = bimodal(60, 190);
        for method in [
            ThresholdMethod::Otsu,
            ThresholdMethod::MaxEntropy,
            ThresholdMethod::IsoData,
            ThresholdMethod::Mean,
        ] {
            let level = method.level(&hist).unwrap();
            assert!((60..190).contains(&level), "{method:?}: {level}");
        }
    }

    #[test]
    fn test_two_spikes() {
        let mut hist = vec![0u64; 256];
        hist[10] = 50;
        hist[200] = 50;
        let otsu = ThresholdMethod::Otsu.level(&hist).unwrap();
        assert!((10..200).contains(&otsu));
        assert_eq!(ThresholdMethod::Mean.level(&hist), Some(105));
    }

    #[test]
    fn test_empty_histogram() {
        let hist = vec![0u64; 256];
        assert_eq!(ThresholdMethod::Otsu.level(&hist), None);
        assert_eq!(ThresholdMethod::MaxEntropy.level(&hist), None);
    }

    #[test]
    fn test_histogram_flat_grid() {
        let grid = Array2::from_elem((4, 4), 3.0f32);
        assert!(Histogram::of(grid.view()).is_none());
        let nan = Array2::from_elem((2, 2), f32::NAN);
        assert!(Histogram::of(nan.view()).is_none());
    }

    #[test]
    fn test_histogram_rescale() {
        // 一半 0, 一半 1000.
        let grid = Array2::from_shape_fn((4, 4), |(h, _)| if h < 2 { 0.0f32 } else { 1000.0 });
        let hist = Histogram::of(grid.view()).unwrap();
        assert_eq!(hist.bins()[0], 8);
        assert_eq!(hist.bins()[255], 8);
        assert_eq!(hist.range(), (0.0, 1000.0));

        let t = hist.threshold(ThresholdMethod::Otsu).unwrap();
        assert_eq!(t, 0.0);
        let fg = grid.iter().filter(|&&v| v > t).count();
        assert_eq!(fg, 8);
    }

    #[test]
    fn test_threshold_keeps_dim_pixels_above_level() {
        // 40 个 0, 20 个 2.0, 40 个 1000. 2.0 与 0 落在同一个 bin,
        // 但换算后的阈值为 0, 因此 2.0 仍属于前景.
        let grid = Array2::from_shape_fn((10, 10), |(h, _)| match h {
            0..=3 => 0.0f32,
            4..=5 => 2.0,
            _ => 1000.0,
        });
        let hist = Histogram::of(grid.view()).unwrap();
        assert_eq!(hist.bins()[0], 60);
        assert_eq!(ThresholdMethod::Otsu.level(hist.bins()), Some(0));

        let t = hist.threshold(ThresholdMethod::Otsu).unwrap();
        assert_eq!(t, 0.0);
        let fg = grid.iter().filter(|&&v| v > t).count();
        assert_eq!(fg, 60);
    }
}
