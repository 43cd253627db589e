//! 可分离高斯平滑与背景扣除.

use ndarray::{Array2, ArrayView2, Axis, Zip};

/// 截断处的高斯核相对峰值的幅度.
const KERNEL_ACCURACY: f64 = 0.01;

/// 归一化的一维高斯核, 长度 `2r + 1`, 其中 `r = ceil(sigma * sqrt(-2 ln 0.01)) + 1`.
fn kernel(sigma: f64) -> Vec<f64> {
    let radius = (sigma * (-2.0 * KERNEL_ACCURACY.ln()).sqrt()).ceil() as usize + 1;
    let mut k: Vec<f64> = (0..=2 * radius)
        .map(|i| {
            let x = i as f64 - radius as f64;
            (-x * x / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let sum: f64 = k.iter().sum();
    k.iter_mut().for_each(|v| *v /= sum);
    k
}

/// 沿 `axis` 做一维卷积, 越界位置取最近的边缘像素.
fn convolve_axis(src: ArrayView2<f32>, k: &[f64], axis: Axis) -> Array2<f32> {
    let radius = k.len() / 2;
    let mut out = Array2::zeros(src.raw_dim());
    Zip::from(out.lanes_mut(axis))
        .and(src.lanes(axis))
        .for_each(|mut dst, lane| {
            let n = lane.len();
            for (i, d) in dst.iter_mut().enumerate() {
                let mut acc = 0.0;
                for (j, &w) in k.iter().enumerate() {
                    let idx = (i + j).saturating_sub(radius).min(n - 1);
                    acc += w * lane[idx] as f64;
                }
                *d = acc as f32;
            }
        });
    out
}

/// 以 `sigma` (像素) 对网格做高斯平滑. `sigma <= 0` 时原样复制.
pub fn blur(src: ArrayView2<f32>, sigma: f64) -> Array2<f32> {
    if !(sigma > 0.0) || src.is_empty() {
        return src.to_owned();
    }
    let k = kernel(sigma);
    let rows = convolve_axis(src, &k, Axis(1));
    convolve_axis(rows.view(), &k, Axis(0))
}

/// 平滑并扣除局部背景.
///
/// 结果为 `blur(sigma) - blur(factor * sigma)`, 负值截断为 0.
/// `factor <= 0` 时只做平滑.
pub fn smooth_and_subtract(src: ArrayView2<f32>, sigma: f64, factor: f64) -> Array2<f32> {
    let mut fine = blur(src, sigma);
    if factor > 0.0 {
        let coarse = blur(src, factor * sigma);
        Zip::from(&mut fine)
            .and(&coarse)
            .for_each(|f, &c| *f = (*f - c).max(0.0));
    }
    fine
}
