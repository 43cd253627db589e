//! 基于距离场的分水岭切分.
//!
//! 1. 求前景像素到最近背景像素的欧氏距离 (EDM);
//! 2. 在 EDM 上以噪声容限寻找区域极大值, 每个极大值区域取一个种子;
//! 3. 从种子出发按 EDM 从高到低做优先级泛洪, 两个种子相遇处即为切割线.

use crate::consts::gray::is_foreground;
use crate::distance::DistanceField;
use crate::{Idx2d, MaskSlice};
use binary_heap_plus::BinaryHeap;
use ndarray::Array2;
use ordered_float::OrderedFloat;
use std::cmp::Reverse;
use std::collections::VecDeque;

/// 切割线标记.
const LINE: u32 = u32::MAX;

/// 泛洪队列元素: (EDM, 入堆序号, 位置).
type Entry = (OrderedFloat<f64>, u64, Idx2d);

/// 求 `mask` 的分水岭切割线像素, 按行优先顺序. 只有一个 (或没有) 极大值时返回空.
///
/// `tolerance` 为极大值的噪声容限 (像素单位): 从极大值出发, 下降不超过
/// `tolerance` 就能到达更高处的点不视为独立极大值.
pub fn cut_lines(mask: &MaskSlice, tolerance: f64) -> Vec<Idx2d> {
    let edm = DistanceField::to_background(mask);
    if !edm.has_reference() {
        // 整张图都是前景, 不存在可切分的 "深度".
        return vec![];
    }
    let edm = edm.data();

    let seeds = find_maxima(mask, edm, tolerance);
    log::trace!("分水岭种子 {} 个", seeds.len());
    if seeds.len() < 2 {
        return vec![];
    }
    flood(mask, edm, &seeds)
}

/// 区域极大值种子, 按发现顺序 (EDM 降序, 同值行优先) 排列.
fn find_maxima(mask: &MaskSlice, edm: ndarray::ArrayView2<f64>, tolerance: f64) -> Vec<Idx2d> {
    // 8-邻域内不存在更高点的前景像素才是候选.
    let mut candidates: Vec<(Idx2d, f64)> = mask
        .indexed_iter()
        .filter(|(_, &p)| is_foreground(p))
        .map(|(pos, _)| (pos, edm[pos]))
        .filter(|&(pos, v)| mask.n8_positions(pos).into_iter().all(|n| edm[n] <= v))
        .collect();
    candidates.sort_by_key(|&(pos, v)| (Reverse(OrderedFloat(v)), pos));

    let shape = mask.shape();
    let mut max_area = Array2::from_elem(shape, false);
    let mut processed = Array2::from_elem(shape, false);
    let mut flooded = Array2::from_elem(shape, false);
    let mut seeds = Vec::with_capacity(candidates.len().min(64));

    let mut bfs_q = VecDeque::with_capacity(16);
    let mut visited = Vec::with_capacity(16);
    for (start, v0) in candidates {
        if processed[start] {
            continue;
        }

        let mut is_max = true;
        visited.clear();
        bfs_q.clear();
        flooded[start] = true;
        bfs_q.push_back(start);
        while let Some(cur) = bfs_q.pop_front() {
            visited.push(cur);
            for n in mask.n8_positions(cur) {
                if flooded[n] || edm[n] <= 0.0 || edm[n] <= v0 - tolerance {
                    continue;
                }
                if edm[n] > v0 || max_area[n] {
                    is_max = false;
                    continue;
                }
                flooded[n] = true;
                bfs_q.push_back(n);
            }
        }

        let plateau: Vec<Idx2d> = visited
            .iter()
            .copied()
            .filter(|&p| edm[p] == v0)
            .collect();
        for &p in visited.iter() {
            flooded[p] = false;
        }
        for &p in plateau.iter() {
            processed[p] = true;
        }
        if !is_max {
            continue;
        }
        for &p in visited.iter() {
            max_area[p] = true;
        }
        seeds.push(nearest_to_centroid(&plateau));
    }
    seeds
}

/// 平台中距离其质心最近的像素. 多个像素等距时取先出现者.
fn nearest_to_centroid(plateau: &[Idx2d]) -> Idx2d {
    let n = plateau.len() as f64;
    let (sh, sw) = plateau
        .iter()
        .fold((0.0, 0.0), |(a, b), &(h, w)| (a + h as f64, b + w as f64));
    let (ch, cw) = (sh / n, sw / n);
    plateau
        .iter()
        .copied()
        .min_by_key(|&(h, w)| OrderedFloat((h as f64 - ch).powi(2) + (w as f64 - cw).powi(2)))
        .unwrap_or_default()
}

/// 从 `seeds` 出发做 4-相邻优先级泛洪, 返回切割线像素.
fn flood(mask: &MaskSlice, edm: ndarray::ArrayView2<f64>, seeds: &[Idx2d]) -> Vec<Idx2d> {
    let mut labels = Array2::<u32>::zeros(mask.shape());
    let mut queued = Array2::from_elem(mask.shape(), false);

    // 堆顶 EDM 最大; 同值时先入堆者先出.
    let mut heap: BinaryHeap<Entry, _> =
        BinaryHeap::new_by(|a: &Entry, b: &Entry| a.0.cmp(&b.0).then(b.1.cmp(&a.1)));
    let mut seq = 0u64;

    for (label, &seed) in (1..).zip(seeds.iter()) {
        labels[seed] = label;
        queued[seed] = true;
    }
    for &seed in seeds.iter() {
        for n in mask.n4_positions(seed) {
            if is_foreground(mask[n]) && !queued[n] {
                queued[n] = true;
                heap.push((OrderedFloat(edm[n]), seq, n));
                seq += 1;
            }
        }
    }

    while let Some((_, _, pos)) = heap.pop() {
        let mut found = 0;
        let mut conflict = false;
        for n in mask.n4_positions(pos) {
            let l = labels[n];
            if l == 0 || l == LINE {
                continue;
            }
            if found == 0 {
                found = l;
            } else if found != l {
                conflict = true;
            }
        }
        if conflict {
            labels[pos] = LINE;
            continue;
        }
        if found == 0 {
            continue;
        }
        labels[pos] = found;
        for n in mask.n4_positions(pos) {
            if is_foreground(mask[n]) && !queued[n] {
                queued[n] = true;
                heap.push((OrderedFloat(edm[n]), seq, n));
                seq += 1;
            }
        }
    }

    labels
        .indexed_iter()
        .filter_map(|(pos, &l)| (l == LINE).then_some(pos))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::cut_lines;
    use crate::region::regions;
    use crate::OwnedMask;
    use ndarray::Array2;

    fn discs(centres: &[(f64, f64)], radius: f64, shape: (usize, usize)) -> OwnedMask {
        OwnedMask::from_raw(Array2::from_shape_fn(shape, |(h, w)| {
            centres.iter().any(|&(ch, cw)| {
                (h as f64 - ch).powi(2) + (w as f64 - cw).powi(2) <= radius * radius
            }) as u8
        }))
    }

    #[test]
    fn test_two_overlapping_discs_are_split() {
        let mut m = discs(&[(20.0, 16.0), (20.0, 30.0)], 8.0, (40, 48));
        assert_eq!(regions(&m.as_immut()).len(), 1);

        let lines = cut_lines(&m.as_immut(), 0.5);
        assert!(!lines.is_empty());
        // 切割线位于两圆之间的颈部.
        assert!(lines.iter().all(|&(_, w)| (20..=26).contains(&w)));

        m.as_mutable().fill_batch(lines, 0);
        assert_eq!(regions(&m.as_immut()).len(), 2);
    }

    #[test]
    fn test_single_disc_is_not_split() {
        let m = discs(&[(20.0, 20.0)], 9.0, (40, 40));
        assert!(cut_lines(&m.as_immut(), 0.5).is_empty());
    }

    #[test]
    fn test_degenerate_masks() {
        let empty = OwnedMask::empty((10, 10));
        assert!(cut_lines(&empty.as_immut(), 0.5).is_empty());

        let full = OwnedMask::from_raw(Array2::from_elem((10, 10), 1));
        assert!(cut_lines(&full.as_immut(), 0.5).is_empty());
    }
}
