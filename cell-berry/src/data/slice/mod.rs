//! 强度切片 / 二值掩膜对象的操作.

mod core;
mod iter;
mod save;

pub use core::{CompactMask, IntensitySlice, MaskSlice, MaskSliceMut, OwnedIntensity, OwnedMask};

pub use save::{ImgWriteRaw, ImgWriteVis};

pub(crate) use iter::BorderIter;
pub(crate) use save::to_gray_image;
