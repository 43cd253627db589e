//! 连通区域提取.
//!
//! 区域一律按 4-相邻规则划分, 与孔洞填充的连通规则一致.

use crate::{Area2d, Calibration, Idx2d, MaskSlice};
use ndarray::Array2;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 外接矩形, 所有边界均为闭区间像素索引.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BoundingBox {
    /// 最小行索引.
    pub top: usize,
    /// 最小列索引.
    pub left: usize,
    /// 最大行索引.
    pub bottom: usize,
    /// 最大列索引.
    pub right: usize,
}

impl BoundingBox {
    /// 包含所有 `pixels` 的最小矩形. `pixels` 为空时返回 `None`.
    pub fn enclosing<'a, I: IntoIterator<Item = &'a Idx2d>>(pixels: I) -> Option<Self> {
        pixels.into_iter().fold(None, |acc, &(h, w)| {
            Some(match acc {
                None => Self {
                    top: h,
                    left: w,
                    bottom: h,
                    right: w,
                },
                Some(b) => Self {
                    top: b.top.min(h),
                    left: b.left.min(w),
                    bottom: b.bottom.max(h),
                    right: b.right.max(w),
                },
            })
        })
    }

    /// 矩形的高 (像素).
    #[inline]
    pub fn height(&self) -> usize {
        self.bottom - self.top + 1
    }

    /// 矩形的宽 (像素).
    #[inline]
    pub fn width(&self) -> usize {
        self.right - self.left + 1
    }

    /// `pos` 是否在矩形内?
    #[inline]
    pub fn contains(&self, (h, w): Idx2d) -> bool {
        (self.top..=self.bottom).contains(&h) && (self.left..=self.right).contains(&w)
    }
}

/// 掩膜中的一个区域: 像素集合及其派生属性.
///
/// 像素按发现顺序保存, 第一个像素是该区域在行优先意义下的第一个像素.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Region {
    pixels: Area2d,
    bounds: BoundingBox,
}

impl Region {
    /// 从像素集合创建区域. `pixels` 为空时返回 `None`.
    pub fn new(pixels: Area2d) -> Option<Self> {
        let bounds = BoundingBox::enclosing(&pixels)?;
        Some(Self { pixels, bounds })
    }

    /// 区域内所有像素索引.
    #[inline]
    pub fn pixels(&self) -> &[Idx2d] {
        &self.pixels
    }

    /// 外接矩形.
    #[inline]
    pub fn bounds(&self) -> BoundingBox {
        self.bounds
    }

    /// 像素个数.
    #[inline]
    pub fn area(&self) -> usize {
        self.pixels.len()
    }

    /// 物理面积 = 像素个数 × 像素宽 × 像素高.
    #[inline]
    pub fn physical_area(&self, calibration: Calibration) -> f64 {
        self.area() as f64 * calibration.pixel_area()
    }

    /// 物理单位下的质心 `(x, y)`, 即所有像素中心 `(w + 0.5, h + 0.5)` 的平均值乘以像素尺寸.
    pub fn centroid(&self, calibration: Calibration) -> (f64, f64) {
        let n = self.area() as f64;
        let (sum_x, sum_y) = self
            .pixels
            .iter()
            .fold((0.0, 0.0), |(x, y), &(h, w)| (x + w as f64 + 0.5, y + h as f64 + 0.5));
        (
            sum_x / n * calibration.pixel_width(),
            sum_y / n * calibration.pixel_height(),
        )
    }

    /// 区域的轮廓像素: 4-邻域中存在区域外像素的区域像素, 按行优先顺序.
    pub fn outline(&self) -> Vec<Idx2d> {
        let b = self.bounds;
        // 外扩一圈, 使区域外的邻居总能落在局部网格内.
        let mut local = Array2::from_elem((b.height() + 2, b.width() + 2), false);
        for &(h, w) in self.pixels.iter() {
            local[(h - b.top + 1, w - b.left + 1)] = true;
        }
        let mut ans: Vec<Idx2d> = local
            .indexed_iter()
            .filter(|&((h, w), &inside)| {
                inside
                    && crate::eight::neighbour4((h, w))
                        .into_iter()
                        .any(|p| !local[p])
            })
            .map(|((h, w), _)| (h + b.top - 1, w + b.left - 1))
            .collect();
        ans.shrink_to_fit();
        ans
    }
}

/// 按 4-相邻规则提取掩膜中所有前景区域.
///
/// 区域按其行优先意义下的第一个像素排序. 全背景掩膜返回空集合.
pub fn regions(mask: &MaskSlice) -> Vec<Region> {
    mask.foreground_areas()
        .into_iter()
        .filter_map(Region::new)
        .collect()
}

/// 将掩膜中所有前景像素合并为一个区域, 仅用于可视化.
///
/// 全背景掩膜返回 `None`.
pub fn merged_region(mask: &MaskSlice) -> Option<Region> {
    Region::new(mask.foreground_pos())
}
