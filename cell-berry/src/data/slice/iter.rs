use crate::Idx2d;

/// 行优先索引迭代器.
///
/// 与 `(0..h).flat_map(|i| (0..w).map(move |j| (i, j)))` 等价,
/// 但对象本身更小, 且可以直接保存在结构体中.
#[derive(Debug, Clone)]
pub struct PosIter {
    cur_h: usize,
    cur_w: usize,
    h: usize,
    w: usize,
}

impl PosIter {
    #[inline]
    pub fn new((h, w): Idx2d) -> Self {
        Self {
            cur_h: 0,
            cur_w: 0,
            h,
            w,
        }
    }
}

impl Iterator for PosIter {
    type Item = Idx2d;

    fn next(&mut self) -> Option<Self::Item> {
        if self.h == 0 || self.w == 0 || self.cur_h == self.h {
            return None;
        }
        let ret_pos = (self.cur_h, self.cur_w);
        if self.cur_w + 1 == self.w {
            self.cur_w = 0;
            self.cur_h += 1;
        } else {
            self.cur_w += 1;
        }
        Some(ret_pos)
    }
}

/// 以行优先顺序迭代图像最外一圈像素的索引, 每个索引恰好出现一次.
#[derive(Debug, Clone)]
pub struct BorderIter {
    inner: PosIter,
    h: usize,
    w: usize,
}

impl BorderIter {
    #[inline]
    pub fn new((h, w): Idx2d) -> Self {
        Self {
            inner: PosIter::new((h, w)),
            h,
            w,
        }
    }
}

impl Iterator for BorderIter {
    type Item = Idx2d;

    fn next(&mut self) -> Option<Self::Item> {
        let (h, w) = (self.h, self.w);
        loop {
            let (i, j) = self.inner.next()?;
            if i == 0 || i + 1 == h {
                return Some((i, j));
            }
            if j == 0 || j + 1 == w {
                return Some((i, j));
            }
            // 跳过内部一整行
            if j == 1 && w > 2 {
                self.inner.cur_h = i + 1;
                self.inner.cur_w = 0;
                return Some((i, w - 1));
            }
        }
    }
}
