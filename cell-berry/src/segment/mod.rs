//! 单通道分割: 将一个通道的投影强度图转化为二值掩膜.
//!
//! 流程依次为: 高斯平滑 (可选背景扣除) → 256-bin 直方图自动阈值 → 二值化
//! → (可选) 孔洞填充 → (可选) 分水岭切分 → 3×3 闭运算 (之后重新施加切割线)
//! → 原图平均强度否决.

mod gaussian;
mod threshold;
mod watershed;

pub use gaussian::{blur, smooth_and_subtract};
pub use threshold::{Histogram, ThresholdMethod};
pub use watershed::cut_lines;

use crate::consts::gray::*;
use crate::consts::WATERSHED_TOLERANCE;
use crate::{Calibration, Idx2d, IntensitySlice, MaskSlice, OwnedMask};
use ndarray::{Array2, Zip};
use std::collections::VecDeque;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 单通道分割参数.
///
/// 该对象是只读的. 若要修改参数, 你应该创建新的实例.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SegmentSpec {
    sigma: f64,
    background_factor: f64,
    method: ThresholdMethod,
    fill_holes: bool,
    watershed: bool,
}

impl SegmentSpec {
    /// 构建分割参数.
    ///
    /// `sigma` 为高斯平滑的标准差 (µm), 必须是非负有限值; `background_factor`
    /// 为背景扣除倍率 `k`, 必须是非负有限值, 为 0 时不做背景扣除. 否则返回 `None`.
    pub fn new(
        sigma: f64,
        background_factor: f64,
        method: ThresholdMethod,
        fill_holes: bool,
        watershed: bool,
    ) -> Option<Self> {
        let valid = |v: f64| v.is_finite() && v >= 0.0;
        (valid(sigma) && valid(background_factor)).then_some(Self {
            sigma,
            background_factor,
            method,
            fill_holes,
            watershed,
        })
    }

    /// 内部使用的常量构造, 不做检查.
    pub(crate) const fn new_unchecked(
        sigma: f64,
        background_factor: f64,
        method: ThresholdMethod,
        fill_holes: bool,
        watershed: bool,
    ) -> Self {
        Self {
            sigma,
            background_factor,
            method,
            fill_holes,
            watershed,
        }
    }

    /// 高斯平滑标准差 (µm).
    #[inline]
    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    /// 背景扣除倍率.
    #[inline]
    pub fn background_factor(&self) -> f64 {
        self.background_factor
    }

    /// 自动阈值方法.
    #[inline]
    pub fn method(&self) -> ThresholdMethod {
        self.method
    }

    /// 是否填充孔洞.
    #[inline]
    pub fn fill_holes(&self) -> bool {
        self.fill_holes
    }

    /// 是否做分水岭切分.
    #[inline]
    pub fn watershed(&self) -> bool {
        self.watershed
    }
}

/// 分割 `slice`.
///
/// 平滑半径按 `calibration` 的像素宽度从 µm 换算为像素, 使结果与分辨率无关.
/// 如果最终前景区域在 **原始** 强度图上的平均值低于 `minimum`, 则整张掩膜作废,
/// 返回全背景掩膜. 因此返回值要么满足该否决条件, 要么是全背景.
pub fn segment(
    slice: &IntensitySlice,
    spec: &SegmentSpec,
    calibration: Calibration,
    minimum: f64,
) -> OwnedMask {
    let shape = slice.shape();
    let sigma_px = spec.sigma / calibration.pixel_width();
    let smoothed = smooth_and_subtract(slice.data(), sigma_px, spec.background_factor);

    let threshold = Histogram::of(smoothed.view()).and_then(|h| h.threshold(spec.method));
    let Some(threshold) = threshold else {
        log::debug!("阈值无定义 ({:?}), 返回空掩膜", spec.method);
        return OwnedMask::empty(shape);
    };
    log::debug!("{:?} 阈值 {threshold:.3}", spec.method);

    let mut mask = OwnedMask::empty(shape);
    Zip::from(mask.as_mutable().array_view_mut())
        .and(&smoothed)
        .for_each(|m, &v| {
            if v > threshold {
                *m = MASK_FOREGROUND;
            }
        });

    if spec.fill_holes {
        let filled = mask.as_mutable().fill_holes();
        log::trace!("填充孔洞像素 {filled} 个");
    }

    let lines = if spec.watershed {
        cut_lines(&mask.as_immut(), WATERSHED_TOLERANCE)
    } else {
        vec![]
    };

    if lines.is_empty() {
        mask.as_mutable().close();
    } else {
        log::trace!("分水岭切割线像素 {} 个", lines.len());
        let uncut = mask.clone();
        mask.as_mutable().fill_batch(lines.iter().copied(), MASK_BACKGROUND);
        let cut = mask.clone();
        mask.as_mutable().close();
        mask.as_mutable().fill_batch(lines, MASK_BACKGROUND);
        let removed = keep_pieces_apart(&uncut.as_immut(), &cut.as_immut(), &mut mask);
        log::trace!("删除重新连接切块的闭运算像素 {removed} 个");
    }

    gate(slice, mask, minimum)
}

/// 删除闭运算新增的, 把同一前景块中被切开的两部分重新连接起来的像素. 返回删除的像素个数.
///
/// `uncut` 为切分前的掩膜, `cut` 为去掉切割线后的掩膜, `closed` 为 `cut` 在整张图上
/// 闭运算并重新施加切割线的结果.
///
/// 闭运算新增的像素按 4-邻域广度优先归属到最近的切块. 若某个新增像素与另一切块的像素相邻,
/// 且两个切块来自同一个切分前的块, 则该像素被置为背景. 来自不同块的切块之间的缝隙照常闭合.
fn keep_pieces_apart(uncut: &MaskSlice, cut: &MaskSlice, closed: &mut OwnedMask) -> usize {
    let blob_of = label_map(uncut);

    // 标签从 1 开始, `source[label]` 为切块所在的切分前的块.
    let mut owner = Array2::<u32>::zeros(cut.shape());
    let mut source = vec![0u32];
    let mut queue = VecDeque::new();
    for (label, piece) in (1u32..).zip(cut.foreground_areas()) {
        source.push(blob_of[piece[0]]);
        for pos in piece {
            owner[pos] = label;
            queue.push_back(pos);
        }
    }

    let view = closed.as_immut();
    while let Some(pos) = queue.pop_front() {
        for n in view.n4_positions(pos) {
            if owner[n] == 0 && is_foreground(view[n]) {
                owner[n] = owner[pos];
                queue.push_back(n);
            }
        }
    }

    let bridges: Vec<Idx2d> = view
        .foreground_pos::<Vec<_>>()
        .into_iter()
        .filter(|&pos| {
            let own = owner[pos];
            own != 0
                && is_background(cut[pos])
                && view.n4_positions(pos).into_iter().any(|n| {
                    let other = owner[n];
                    other != 0 && other != own && source[other as usize] == source[own as usize]
                })
        })
        .collect();

    let mut removed = bridges.len();
    closed.as_mutable().fill_batch(bridges, MASK_BACKGROUND);

    // 删除后不再与任何切块相连的闭运算像素也一并删除.
    let view = closed.as_immut();
    let mut reached = Array2::from_elem(cut.shape(), false);
    let mut queue: VecDeque<Idx2d> = cut.foreground_pos();
    for &pos in queue.iter() {
        reached[pos] = true;
    }
    while let Some(pos) = queue.pop_front() {
        for n in view.n4_positions(pos) {
            if !reached[n] && is_foreground(view[n]) {
                reached[n] = true;
                queue.push_back(n);
            }
        }
    }
    let orphans: Vec<Idx2d> = view
        .foreground_pos::<Vec<_>>()
        .into_iter()
        .filter(|&pos| !reached[pos])
        .collect();
    removed += orphans.len();
    closed.as_mutable().fill_batch(orphans, MASK_BACKGROUND);
    removed
}

/// 4-连通前景块的标签图. 背景为 0, 前景块从 1 开始编号.
fn label_map(mask: &MaskSlice) -> Array2<u32> {
    let mut labels = Array2::zeros(mask.shape());
    for (label, area) in (1u32..).zip(mask.foreground_areas()) {
        for pos in area {
            labels[pos] = label;
        }
    }
    labels
}

/// 原图平均强度否决. 空掩膜原样返回.
fn gate(slice: &IntensitySlice, mask: OwnedMask, minimum: f64) -> OwnedMask {
    let fg: Vec<_> = mask.as_immut().foreground_pos();
    let Some(mean) = slice.mean_over(fg) else {
        return mask;
    };
    if mean < minimum {
        log::debug!("前景平均强度 {mean:.3} 低于下限 {minimum}, 掩膜作废");
        OwnedMask::empty(mask.as_immut().shape())
    } else {
        mask
    }
}
