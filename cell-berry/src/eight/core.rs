use crate::consts::gray::*;
use crate::data::slice::BorderIter;
use crate::{Idx2d, MaskSlice, MaskSliceMut};
use ndarray::Array2;
use std::collections::VecDeque;

/// 二值形态学算法实现块.
impl<'a> MaskSliceMut<'a> {
    /// 填充孔洞: 所有无法经过 4-相邻背景路径到达图像边缘的背景像素, 均涂为前景.
    ///
    /// 返回被填充的像素个数. 该操作是幂等的.
    pub fn fill_holes(&mut self) -> usize {
        let shape = self.shape();
        let mut reached = Array2::from_elem(shape, false);
        let mut bfs_q: VecDeque<Idx2d> = VecDeque::with_capacity(64);

        for pos in BorderIter::new(shape) {
            if is_background(self[pos]) {
                reached[pos] = true;
                bfs_q.push_back(pos);
            }
        }

        while let Some(cur) = bfs_q.pop_front() {
            for neigh in super::neighbour4(cur) {
                if self.check(neigh) && !reached[neigh] && is_background(self[neigh]) {
                    reached[neigh] = true;
                    bfs_q.push_back(neigh);
                }
            }
        }

        let mut filled = 0;
        for (p, &r) in self.iter_mut().zip(reached.iter()) {
            if !r && is_background(*p) {
                *p = MASK_FOREGROUND;
                filled += 1;
            }
        }
        filled
    }

    /// 3×3 膨胀. 越界位置视为最近的边缘像素 (边缘复制).
    pub fn dilate(&mut self) {
        let out = self.shallow_copy().rank_3x3(true);
        self.array_view_mut().assign(&out);
    }

    /// 3×3 腐蚀. 越界位置视为最近的边缘像素 (边缘复制).
    pub fn erode(&mut self) {
        let out = self.shallow_copy().rank_3x3(false);
        self.array_view_mut().assign(&out);
    }

    /// 3×3 闭运算, 即先膨胀后腐蚀.
    #[inline]
    pub fn close(&mut self) {
        self.dilate();
        self.erode();
    }
}

impl MaskSlice<'_> {
    /// 3×3 邻域 (含自身) 的秩滤波. `any` 为 `true` 时取最大值 (膨胀), 否则取最小值 (腐蚀).
    fn rank_3x3(&self, any: bool) -> Array2<u8> {
        let (height, width) = self.shape();
        Array2::from_shape_fn((height, width), |(h, w)| {
            let rows = h.saturating_sub(1)..=(h + 1).min(height - 1);
            let mut fg = rows.flat_map(|i| {
                (w.saturating_sub(1)..=(w + 1).min(width - 1)).map(move |j| (i, j))
            });
            let hit = if any {
                fg.any(|p| is_foreground(self[p]))
            } else {
                fg.all(|p| is_foreground(self[p]))
            };
            if hit {
                MASK_FOREGROUND
            } else {
                MASK_BACKGROUND
            }
        })
    }

    /// 掩膜的轮廓: 所有 4-邻域存在背景 (或位于图像边缘) 的前景像素, 按行优先顺序.
    pub fn outline(&self) -> Vec<Idx2d> {
        self.pos_iter()
            .filter(|&pos| {
                is_foreground(self[pos])
                    && (self.is_at_border(pos) || self.is_n4_having(pos, is_background))
            })
            .collect()
    }
}
