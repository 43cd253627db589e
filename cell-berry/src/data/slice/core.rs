use crate::consts::gray::*;
use crate::{Area2d, Areas2d, Idx2d, Predicate};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use ndarray::iter::{Iter, IterMut};
use ndarray::{Array2, ArrayView2, ArrayViewMut2, Ix2, Zip};
use std::borrow::Cow;
use std::collections::VecDeque;
use std::io::{Read, Write};
use std::ops::{Index, IndexMut};

/// 不可变、借用的二维二值掩膜.
pub struct MaskSlice<'a> {
    /// 底层数据的轻量级视图.
    ///
    /// 像素只允许 [`MASK_BACKGROUND`] 和 [`MASK_FOREGROUND`] 两种取值.
    data: ArrayView2<'a, u8>,
}

impl Index<Idx2d> for MaskSlice<'_> {
    type Output = u8;

    #[inline]
    fn index(&self, index: Idx2d) -> &Self::Output {
        &self.data[index]
    }
}

/// 可变、借用的二维二值掩膜.
pub struct MaskSliceMut<'a> {
    /// 底层数据的轻量级视图.
    ///
    /// 像素只允许 [`MASK_BACKGROUND`] 和 [`MASK_FOREGROUND`] 两种取值.
    data: ArrayViewMut2<'a, u8>,
}

/// 可变方法集合.
impl<'a> MaskSliceMut<'a> {
    /// 获得 **底层** 数据的一份可变 shallow copy.
    #[inline]
    pub fn array_view_mut(&mut self) -> ArrayViewMut2<u8> {
        self.data.view_mut()
    }

    /// 获取可以迭代并修改图像像素的迭代器.
    #[inline]
    pub fn iter_mut(&mut self) -> IterMut<'_, u8, Ix2> {
        self.data.iter_mut()
    }

    /// 将 `it` 给出的所有位置设置为 `value`. 越界时 panic.
    pub fn fill_batch<I: IntoIterator<Item = Idx2d>>(&mut self, it: I, value: u8) {
        for pos in it {
            self[pos] = value;
        }
    }

    /// 与 `other` 逐像素求交, 结果写入 `self`.
    ///
    /// 两者形状不一致时 panic.
    pub fn and_assign(&mut self, other: &MaskSlice) {
        assert_eq!(self.shape(), other.shape(), "掩膜形状不一致");
        Zip::from(&mut self.data)
            .and(&other.data)
            .for_each(|a, &b| {
                if is_background(b) {
                    *a = MASK_BACKGROUND;
                }
            });
    }
}

impl Index<Idx2d> for MaskSliceMut<'_> {
    type Output = u8;

    #[inline]
    fn index(&self, index: Idx2d) -> &Self::Output {
        &self.data[index]
    }
}

impl IndexMut<Idx2d> for MaskSliceMut<'_> {
    #[inline]
    fn index_mut(&mut self, index: Idx2d) -> &mut Self::Output {
        &mut self.data[index]
    }
}

/// mask 不可变方法集合.
macro_rules! impl_mask_slice_immut {
    ($life: lifetime, $slice: ty, $array: ty) => {
        /// 不可变方法集合.
        impl<$life> $slice {
            /// 直接初始化.
            #[inline]
            pub(crate) fn new(data: $array) -> Self {
                Self { data }
            }

            /// 获得 **底层** 数据的一份不可变 shallow copy.
            #[inline]
            pub fn array_view(&self) -> ArrayView2<u8> {
                self.data.view()
            }

            /// 获取可以迭代图像像素的迭代器.
            #[inline]
            pub fn iter(&self) -> Iter<'_, u8, Ix2> {
                self.data.iter()
            }

            /// 获取给定位置 (高, 宽) 的像素值. 越界时返回 `None`.
            #[inline]
            pub fn get(&self, pos: Idx2d) -> Option<&u8> {
                self.data.get(pos)
            }

            /// 该图是否为全背景图?
            #[inline]
            pub fn is_background(&self) -> bool {
                self.data.iter().copied().all(is_background)
            }

            /// 图像的分辨率 (高, 宽).
            #[inline]
            pub fn shape(&self) -> Idx2d {
                let &[h, w] = self.data.shape() else {
                    unreachable!()
                };
                (h, w)
            }

            /// 图像的像素个数.
            #[inline]
            pub fn size(&self) -> usize {
                let (h, w) = self.shape();
                h * w
            }

            /// 判断一个索引是否合法 (未越界).
            #[inline]
            pub fn check(&self, (h, w): Idx2d) -> bool {
                let (h_len, w_len) = self.shape();
                h < h_len && w < w_len
            }

            /// 统计图像中前景像素总个数.
            #[inline]
            pub fn count_foreground(&self) -> usize {
                self.data.iter().filter(|&p| is_foreground(*p)).count()
            }

            /// 将图像转化为行优先的序列化存储.
            pub fn as_row_major_vec(&self) -> Vec<u8> {
                let mut buf = Vec::with_capacity(self.size());
                buf.extend(self.iter());
                buf
            }

            /// 获得行优先存储的序列化数据.
            /// 当原始数据本身就是行优先格式时, 可以避免一次 deepcopy.
            pub fn as_row_major_slice(&self) -> Cow<[u8]> {
                match self.data.as_slice() {
                    Some(s) => Cow::Borrowed(s),
                    None => Cow::Owned(self.as_row_major_vec()),
                }
            }

            /// 获得一份不可变的 **本体** shallow copy.
            #[inline]
            pub fn shallow_copy(&self) -> MaskSlice {
                MaskSlice { data: self.array_view() }
            }

            /// 克隆自己, 获得一个拥有所有权的掩膜对象.
            pub fn to_owned(&self) -> OwnedMask {
                OwnedMask {
                    data: self.data.to_owned(),
                }
            }

            /// 与 `other` 逐像素求交, 返回新的掩膜. 两者形状不一致时 panic.
            pub fn and(&self, other: &MaskSlice) -> OwnedMask {
                let mut ans = self.to_owned();
                ans.as_mutable().and_assign(other);
                ans
            }

            /// 获得图像的高.
            #[inline]
            pub fn height(&self) -> usize {
                self.shape().0
            }

            /// 获得图像的宽.
            #[inline]
            pub fn width(&self) -> usize {
                self.shape().1
            }

            /// 判断一个索引是否位于图像的边缘.
            #[inline]
            pub fn is_at_border(&self, (h, w): Idx2d) -> bool {
                h == 0
                    || h.saturating_add(1) == self.height()
                    || w == 0
                    || w.saturating_add(1) == self.width()
            }

            /// 获得 `pos` 的 4-邻域像素索引. 保证返回的索引都不越界.
            pub fn n4_positions(&self, pos: Idx2d) -> Vec<Idx2d> {
                crate::eight::neighbour4(pos)
                    .into_iter()
                    .filter(|p| self.check(*p))
                    .collect()
            }

            /// 获得 `pos` 的 8-邻域像素索引. 保证返回的索引都不越界.
            pub fn n8_positions(&self, pos: Idx2d) -> Vec<Idx2d> {
                crate::eight::neighbour8(pos)
                    .into_iter()
                    .filter(|p| self.check(*p))
                    .collect()
            }

            /// 判断 `(h, w)` 的 4-邻域是否有满足谓词 `pred` 的像素.
            /// 越界的位置不参与判断.
            pub fn is_n4_having(&self, (h, w): Idx2d, mut pred: impl FnMut(u8) -> bool) -> bool {
                matches!(self.get((h.wrapping_sub(1), w)), Some(&v) if pred(v))
                    || matches!(self.get((h.saturating_add(1), w)), Some(&v) if pred(v))
                    || matches!(self.get((h, w.wrapping_sub(1))), Some(&v) if pred(v))
                    || matches!(self.get((h, w.saturating_add(1))), Some(&v) if pred(v))
            }

            /// 以行优先规则, 获取能迭代图像所有索引的迭代器.
            #[inline]
            pub fn pos_iter(&self) -> impl Iterator<Item = Idx2d> {
                super::iter::PosIter::new(self.shape())
            }

            /// 以行优先规则, 获取能迭代图像所有 `(索引, 像素值)` 的迭代器.
            #[inline]
            pub fn indexed_iter(&self) -> impl Iterator<Item = (Idx2d, &u8)> {
                self.data.indexed_iter()
            }

            /// 获取所有前景像素的索引, 按行优先顺序.
            pub fn foreground_pos<B: FromIterator<Idx2d>>(&self) -> B {
                FromIterator::from_iter(
                    self.indexed_iter()
                        .filter_map(|(pos, pixel)| is_foreground(*pixel).then_some(pos))
                )
            }

            /// 按照 4-相邻规则获取所有区域. 两个像素 `p1` 和 `p2` 属于同一个区域,
            /// 当且仅当存在一条从 `p1` 到 `p2` 的 4-相邻路径, 且路径上的所有像素
            /// (包括 `p1` 和 `p2`) 都满足谓词 `pred`.
            ///
            /// 区域按其行优先意义下的第一个像素排序.
            pub fn areas(&self, pred: Predicate) -> Areas2d {
                self.areas_from_local(self.pos_iter(), pred)
            }

            /// 按照 4-相邻原则获得图像中所有前景区域.
            #[inline]
            pub fn foreground_areas(&self) -> Areas2d {
                self.areas(is_foreground)
            }

            /// 按照 4-相邻规则获取所有区域, 但区域起点由 `it` 指定.
            /// 两个像素 `p1` 和 `p2` 属于同一个区域, 当且仅当存在一条从 `p1` 到
            /// `p2` 的 4-相邻路径, 且路径上的所有像素 (包括 `p1` 和 `p2`)
            /// 都满足谓词 `pred`.
            pub fn areas_from_local<I: IntoIterator<Item = Idx2d>>(
                &self,
                it: I,
                pred: Predicate,
            ) -> Areas2d {
                let mut ans = Areas2d::with_capacity(1);
                let mut bfs_q = VecDeque::with_capacity(4);
                let mut visited = Array2::from_elem(self.shape(), false);

                for pos in it.into_iter() {
                    if visited[pos] || !pred(self[pos]) {
                        continue;
                    }
                    visited[pos] = true;
                    bfs_q.push_back(pos);
                    let mut this_area = Area2d::with_capacity(1);
                    while let Some(cur_pos) = bfs_q.pop_front() {
                        this_area.push(cur_pos);

                        // bfs
                        for neigh in crate::eight::neighbour4(cur_pos) {
                            if self.check(neigh) && !visited[neigh] && pred(self[neigh]) {
                                visited[neigh] = true;
                                bfs_q.push_back(neigh);
                            }
                        }
                    }
                    ans.push(this_area);
                }
                ans
            }
        }
    };
}
impl_mask_slice_immut!('a, MaskSlice<'a>, ArrayView2<'a, u8>);
impl_mask_slice_immut!('a, MaskSliceMut<'a>, ArrayViewMut2<'a, u8>);

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 拥有所有权的二维二值掩膜.
///
/// `OwnedMask` 仅提供到 `MaskSlice` 和 `MaskSliceMut`
/// 的轻量转换和底层数据移动, 不提供任何其它方法.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct OwnedMask {
    data: Array2<u8>,
}

impl OwnedMask {
    /// 创建形状为 `shape` 的全背景掩膜.
    #[inline]
    pub fn empty(shape: Idx2d) -> Self {
        Self {
            data: Array2::from_elem(shape, MASK_BACKGROUND),
        }
    }

    /// 直接从底层数据创建. 非 0 像素被视为前景.
    pub fn from_raw(data: Array2<u8>) -> Self {
        Self {
            data: data.mapv(|p| if p != 0 { MASK_FOREGROUND } else { MASK_BACKGROUND }),
        }
    }

    /// 获得不可变切片引用.
    #[inline]
    pub fn as_immut(&self) -> MaskSlice<'_> {
        MaskSlice::new(self.data.view())
    }

    /// 获得可变切片引用.
    #[inline]
    pub fn as_mutable(&mut self) -> MaskSliceMut<'_> {
        MaskSliceMut::new(self.data.view_mut())
    }

    /// 压缩数据.
    pub fn compress(&self) -> CompactMask {
        let data = self.as_immut();
        let buf = data.as_row_major_slice();
        let mut e = ZlibEncoder::new(Vec::with_capacity(8), Compression::best());
        // 写入内存缓冲区不会失败.
        e.write_all(buf.as_ref()).expect("Compression error");
        CompactMask {
            buf: e.finish().expect("Compression error"),
            sh: data.shape(),
        }
    }
}

/// 压缩存储的 `OwnedMask`; 不透明类型.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CompactMask {
    /// 压缩的不透明字节流.
    buf: Vec<u8>,

    /// 形状.
    sh: Idx2d,
}

impl CompactMask {
    /// 解压缩数据.
    pub fn decompress(&self) -> OwnedMask {
        let (h, w) = self.sh;
        let mut d = ZlibDecoder::new(self.buf.as_slice());
        let mut buf = Vec::with_capacity(h * w);
        d.read_to_end(&mut buf).expect("Decompression error");
        debug_assert_eq!(buf.len(), h * w);
        let data = Array2::<u8>::from_shape_vec((h, w), buf).unwrap();
        OwnedMask { data }
    }

    /// 原掩膜形状.
    #[inline]
    pub fn shape(&self) -> Idx2d {
        self.sh
    }
}

/// 不可变、借用的二维强度切片.
pub struct IntensitySlice<'a> {
    /// 底层数据的轻量级视图, 借用于 [`crate::Volume`] 或 [`OwnedIntensity`].
    data: ArrayView2<'a, f32>,
}

impl Index<Idx2d> for IntensitySlice<'_> {
    type Output = f32;

    #[inline]
    fn index(&self, index: Idx2d) -> &Self::Output {
        &self.data[index]
    }
}

impl<'a> IntensitySlice<'a> {
    /// 直接初始化.
    #[inline]
    pub(crate) fn new(data: ArrayView2<'a, f32>) -> Self {
        Self { data }
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView2<f32> {
        self.data.view()
    }

    /// 获取可以迭代图像像素的迭代器.
    #[inline]
    pub fn iter(&self) -> Iter<'_, f32, Ix2> {
        self.data.iter()
    }

    /// 获取给定位置 (高, 宽) 的像素值. 越界时返回 `None`.
    #[inline]
    pub fn get(&self, pos: Idx2d) -> Option<&f32> {
        self.data.get(pos)
    }

    /// 图像的分辨率 (高, 宽).
    #[inline]
    pub fn shape(&self) -> Idx2d {
        let &[h, w] = self.data.shape() else {
            unreachable!()
        };
        (h, w)
    }

    /// 图像的像素个数.
    #[inline]
    pub fn size(&self) -> usize {
        let (h, w) = self.shape();
        h * w
    }

    /// 以行优先规则, 获取能迭代图像所有 `(索引, 强度)` 的迭代器.
    #[inline]
    pub fn indexed_iter(&self) -> impl Iterator<Item = (Idx2d, &f32)> {
        self.data.indexed_iter()
    }

    /// 有限像素值的 (最小值, 最大值). 不存在有限值时返回 `None`.
    pub fn min_max(&self) -> Option<(f32, f32)> {
        self.data
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }

    /// 计算由 `it` 给出的所有索引对应强度的平均值. `it` 为空时返回 `None`.
    ///
    /// 如果存在越界索引, 则程序 panic.
    pub fn mean_over<I: IntoIterator<Item = Idx2d>>(&self, it: I) -> Option<f64> {
        let mut count = 0u64;
        let mut sum = 0.0;
        for pos in it.into_iter() {
            count += 1;
            sum += self[pos] as f64;
        }
        (count != 0).then(|| sum / (count as f64))
    }
}

/// 拥有所有权的二维强度切片 (例如最大值投影).
///
/// `OwnedIntensity` 仅提供到 `IntensitySlice`
/// 的轻量转换和底层数据移动, 不提供任何其它方法.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct OwnedIntensity {
    data: Array2<f32>,
}

impl OwnedIntensity {
    /// 直接从底层数据创建.
    #[inline]
    pub fn from_raw(data: Array2<f32>) -> Self {
        Self { data }
    }

    /// 获得不可变切片引用.
    #[inline]
    pub fn as_immutable(&self) -> IntensitySlice<'_> {
        IntensitySlice::new(self.data.view())
    }
}

#[cfg(test)]
mod tests {
    use super::OwnedMask;
    use ndarray::{array, Array2};

    fn mask(rows: &[&str]) -> OwnedMask {
        let h = rows.len();
        let w = rows[0].len();
        OwnedMask::from_raw(Array2::from_shape_fn((h, w), |(i, j)| {
            (rows[i].as_bytes()[j] == b'#') as u8
        }))
    }

    #[test]
    fn test_areas_are_4_connected() {
        let m = mask(&[
            "##..", //
            "##..",
            "..#.",
            "...#",
        ]);
        let areas = m.as_immut().foreground_areas();
        assert_eq!(areas.len(), 3);
        assert_eq!(areas[0].len(), 4);
        assert_eq!(areas[1], vec![(2, 2)]);
        assert_eq!(areas[2], vec![(3, 3)]);
    }

    #[test]
    fn test_areas_order_is_row_major() {
        let m = mask(&[
            "...#", //
            "#..#",
            "#...",
        ]);
        let areas = m.as_immut().foreground_areas();
        assert_eq!(areas.len(), 2);
        assert_eq!(areas[0][0], (0, 3));
        assert_eq!(areas[1][0], (1, 0));
    }

    #[test]
    fn test_and() {
        let a = mask(&["##.", "##."]);
        let b = mask(&[".##", ".#."]);
        let c = a.as_immut().and(&b.as_immut());
        assert_eq!(c, mask(&[".#.", ".#."]));
        assert_eq!(c.as_immut().count_foreground(), 2);
    }

    #[test]
    #[should_panic]
    fn test_and_shape_mismatch() {
        let a = mask(&["##.", "##."]);
        let b = mask(&["##", "##"]);
        let _ = a.as_immut().and(&b.as_immut());
    }

    #[test]
    fn test_compress() {
        let m = OwnedMask::from_raw(array![[0, 1, 1], [0, 0, 7]]);
        let c = m.compress();
        assert_eq!(c.shape(), (2, 3));
        assert_eq!(c.decompress(), m);
        assert_eq!(m.as_immut().foreground_pos::<Vec<_>>(), vec![(0, 1), (0, 2), (1, 2)]);
    }
}
