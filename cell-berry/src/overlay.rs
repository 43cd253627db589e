//! 可视化标注: 表型轮廓, 候选细胞轮廓和编号. 纯派生数据, 不参与任何计算.

use crate::consts::{rgb, LABEL_OFFSET};
use crate::region::{merged_region, Region};
use crate::{Idx2d, IntensitySlice, MaskSlice};
use image::{ImageResult, Rgb, RgbImage};
use std::path::Path;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 标注内容.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Shape {
    /// 轮廓像素集合.
    Outline(Vec<Idx2d>),

    /// 数字编号, 以 `anchor` 为左上角.
    Label {
        /// 文本, 只绘制其中的数字.
        text: String,
        /// 左上角 (高, 宽).
        anchor: Idx2d,
    },
}

/// 一条带颜色的标注.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Annotation {
    /// 标注内容.
    pub shape: Shape,

    /// RGB 颜色.
    pub color: [u8; 3],
}

/// 一张图像的全部标注.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Overlay {
    shape: Idx2d,
    items: Vec<Annotation>,
}

impl Overlay {
    /// 为形状 (高, 宽) 的图像创建空标注.
    pub fn new(shape: Idx2d) -> Self {
        Self {
            shape,
            items: Vec::with_capacity(8),
        }
    }

    /// 图像形状 (高, 宽).
    #[inline]
    pub fn shape(&self) -> Idx2d {
        self.shape
    }

    /// 所有标注, 按添加顺序.
    #[inline]
    pub fn items(&self) -> &[Annotation] {
        &self.items
    }

    /// 添加一条轮廓.
    pub fn push_outline(&mut self, pixels: Vec<Idx2d>, color: [u8; 3]) {
        self.items.push(Annotation {
            shape: Shape::Outline(pixels),
            color,
        });
    }

    /// 添加一个编号.
    pub fn push_label(&mut self, text: impl Into<String>, anchor: Idx2d, color: [u8; 3]) {
        self.items.push(Annotation {
            shape: Shape::Label {
                text: text.into(),
                anchor,
            },
            color,
        });
    }

    /// 添加一个表型掩膜的合并轮廓. 全背景掩膜不添加任何内容.
    pub fn push_phenotype(&mut self, mask: &MaskSlice, color: [u8; 3]) {
        if let Some(region) = merged_region(mask) {
            self.push_outline(region.outline(), color);
        }
    }

    /// 添加一个被接受的候选细胞: 品红色轮廓, 以及外接矩形上方
    /// [`LABEL_OFFSET`] 像素处的品红色编号 (不超出图像上边缘).
    pub fn push_cell(&mut self, region: &Region, index: usize) {
        let b = region.bounds();
        self.push_outline(region.outline(), rgb::MAGENTA);
        self.push_label(
            index.to_string(),
            (b.top.saturating_sub(LABEL_OFFSET), b.left),
            rgb::MAGENTA,
        );
    }

    /// 编号标注的个数.
    pub fn label_count(&self) -> usize {
        self.items
            .iter()
            .filter(|a| matches!(a.shape, Shape::Label { .. }))
            .count()
    }

    /// 在 `background` 的自动窗口灰度图上绘制所有标注.
    ///
    /// `background` 形状与标注不一致时 panic.
    pub fn render(&self, background: &IntensitySlice) -> RgbImage {
        assert_eq!(background.shape(), self.shape, "背景与标注形状不一致");
        let gray = crate::data::slice::to_gray_image(background);
        let mut canvas = RgbImage::from_fn(gray.width(), gray.height(), |x, y| {
            let g = gray.get_pixel(x, y).0[0];
            Rgb([g, g, g])
        });

        for item in self.items.iter() {
            match &item.shape {
                Shape::Outline(pixels) => {
                    for &pos in pixels.iter() {
                        put(&mut canvas, pos, item.color);
                    }
                }
                Shape::Label { text, anchor } => draw_text(&mut canvas, text, *anchor, item.color),
            }
        }
        canvas
    }

    /// 绘制并保存为图片.
    pub fn save<P: AsRef<Path>>(&self, background: &IntensitySlice, path: P) -> ImageResult<()> {
        self.render(background).save(path)
    }
}

/// 越界时忽略.
#[inline]
fn put(canvas: &mut RgbImage, (h, w): Idx2d, color: [u8; 3]) {
    if (w as u32) < canvas.width() && (h as u32) < canvas.height() {
        canvas.put_pixel(w as u32, h as u32, Rgb(color));
    }
}

/// 3×5 点阵数字, 每行低 3 位从左到右.
const DIGITS: [[u8; 5]; 10] = [
    [0b111, 0b101, 0b101, 0b101, 0b111],
    [0b010, 0b110, 0b010, 0b010, 0b111],
    [0b111, 0b001, 0b111, 0b100, 0b111],
    [0b111, 0b001, 0b111, 0b001, 0b111],
    [0b101, 0b101, 0b111, 0b001, 0b001],
    [0b111, 0b100, 0b111, 0b001, 0b111],
    [0b111, 0b100, 0b111, 0b101, 0b111],
    [0b111, 0b001, 0b010, 0b010, 0b010],
    [0b111, 0b101, 0b111, 0b101, 0b111],
    [0b111, 0b101, 0b111, 0b001, 0b111],
];

/// 字符宽 3 像素, 间隔 1 像素. 非数字字符只占位.
fn draw_text(canvas: &mut RgbImage, text: &str, (top, left): Idx2d, color: [u8; 3]) {
    for (i, ch) in text.chars().enumerate() {
        let Some(d) = ch.to_digit(10) else {
            continue;
        };
        let x0 = left + i * 4;
        for (dy, bits) in DIGITS[d as usize].iter().enumerate() {
            for dx in 0..3 {
                if bits & (0b100 >> dx) != 0 {
                    put(canvas, (top + dy, x0 + dx), color);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Overlay, Shape};
    use crate::consts::rgb;
    use crate::region::Region;
    use crate::{OwnedIntensity, OwnedMask};
    use ndarray::Array2;

    #[test]
    fn test_label_is_clamped_at_top() {
        let mut o = Overlay::new((64, 64));
        let near_top = Region::new(vec![(3, 10), (3, 11)]).unwrap();
        let lower = Region::new(vec![(40, 20)]).unwrap();
        o.push_cell(&near_top, 0);
        o.push_cell(&lower, 1);

        assert_eq!(o.label_count(), 2);
        let anchors: Vec<_> = o
            .items()
            .iter()
            .filter_map(|a| match &a.shape {
                Shape::Label { anchor, .. } => Some(*anchor),
                _ => None,
            })
            .collect();
        assert_eq!(anchors, vec![(0, 10), (24, 20)]);
    }

    #[test]
    fn test_empty_phenotype_adds_nothing() {
        let mut o = Overlay::new((8, 8));
        o.push_phenotype(&OwnedMask::empty((8, 8)).as_immut(), rgb::YELLOW);
        assert!(o.items().is_empty());
    }

    #[test]
    fn test_render() {
        let mut raw = Array2::<u8>::zeros((20, 20));
        raw.slice_mut(ndarray::s![5..10, 5..10]).fill(1);
        let mask = OwnedMask::from_raw(raw);

        let mut o = Overlay::new((20, 20));
        o.push_phenotype(&mask.as_immut(), rgb::CYAN);
        o.push_label("18", (0, 0), rgb::MAGENTA);

        let bg = OwnedIntensity::from_raw(Array2::from_shape_fn((20, 20), |(h, _)| h as f32));
        let img = o.render(&bg.as_immutable());
        assert_eq!(img.dimensions(), (20, 20));
        assert_eq!(img.get_pixel(5, 5).0, rgb::CYAN);
        // 内部保持灰度.
        let inner = img.get_pixel(7, 7).0;
        assert!(inner[0] == inner[1] && inner[1] == inner[2]);
        // "1" 的第一行中间像素, "8" 的左上角像素.
        assert_eq!(img.get_pixel(1, 0).0, rgb::MAGENTA);
        assert_eq!(img.get_pixel(4, 0).0, rgb::MAGENTA);
        assert_ne!(img.get_pixel(3, 0).0, rgb::MAGENTA);
    }

    #[test]
    #[should_panic]
    fn test_render_shape_mismatch() {
        let o = Overlay::new((4, 4));
        let bg = OwnedIntensity::from_raw(Array2::zeros((5, 5)));
        let _ = o.render(&bg.as_immutable());
    }
}
