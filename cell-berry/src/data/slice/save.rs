//! 图像的持久化存储.

use crate::{IntensitySlice, IntensityWindow, MaskSlice, MaskSliceMut};
use image::ImageResult;
use std::path::Path;

/// 表明一个可以通过 **可视化友好** 模式持久化存储的图像对象.
///
/// `ImgWriteVis` trait 的意图是, 图像将以 "可视化友好"
/// 的方式保存, 而不是 "as is" 的方式. 对于 `IntensitySlice` 这类任意范围的荧光强度,
/// 在保存时会用其自身的 (最小值, 最大值) 窗口规范化.
pub trait ImgWriteVis {
    /// 按照一定的可视化规则将图片保存到 `path` 路径.
    fn save<P: AsRef<Path>>(&self, path: P) -> ImageResult<()>;
}

/// 表明一个可以通过 **按原样** 模式持久化存储的图像对象.
///
/// 二值掩膜只包含 0 和 255 两种像素, 按原样保存即为黑白图.
pub trait ImgWriteRaw {
    /// 按原样将图片保存到 `path` 路径.
    fn save_raw<P: AsRef<Path>>(&self, path: P) -> ImageResult<()>;
}

macro_rules! impl_mask_raw {
    ($($slice: ty),+) => {
        $(
            /// 按原样存储.
            impl ImgWriteRaw for $slice {
                fn save_raw<P: AsRef<Path>>(&self, path: P) -> image::ImageResult<()> {
                    let (height, width) = self.shape();
                    let mut buf = image::GrayImage::new(width as u32, height as u32);
                    for ((h, w), &pix) in self.indexed_iter() {
                        buf.put_pixel(w as u32, h as u32, image::Luma([pix]));
                    }
                    buf.save(path)
                }
            }
        )+
    };
}

impl_mask_raw!(MaskSlice<'_>, MaskSliceMut<'_>);

/// 自动窗口. 非有限值映射为黑色.
impl ImgWriteVis for IntensitySlice<'_> {
    fn save<P: AsRef<Path>>(&self, path: P) -> ImageResult<()> {
        to_gray_image(self).save(path)
    }
}

/// 以自动窗口将强度切片转化为灰度图.
pub(crate) fn to_gray_image(slice: &IntensitySlice) -> image::GrayImage {
    let (height, width) = slice.shape();
    let window = IntensityWindow::auto(slice);
    let mut buf = image::GrayImage::new(width as u32, height as u32);
    for ((h, w), &v) in slice.indexed_iter() {
        let gray = window.eval(v).unwrap_or(crate::consts::gray::BLACK);
        buf.put_pixel(w as u32, h as u32, image::Luma([gray]));
    }
    buf
}
