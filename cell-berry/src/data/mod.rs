use std::fmt::{Display, Formatter};
use std::ops::Index;
use std::path::Path;

use ndarray::{Array4, ArrayD, ArrayView, Axis, Ix3, Ix4};
use ndarray_npy::{ReadNpyError, ReadNpyExt, ReadableElement};
use nifti::{IntoNdArray, NiftiError, NiftiHeader, NiftiObject, ReaderOptions};
use num::ToPrimitive;

use crate::{Idx2d, Idx4d};

mod projection;
pub mod slice;
pub mod window;

pub use slice::{
    CompactMask, ImgWriteRaw, ImgWriteVis, IntensitySlice, MaskSlice, MaskSliceMut,
    OwnedIntensity, OwnedMask,
};

pub use window::IntensityWindow;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 像素的物理标定, 单位为 µm / 像素.
///
/// 该对象是只读的. 若要修改标定, 你应该创建新的实例.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Calibration {
    pixel_width: f64,
    pixel_height: f64,
}

impl Calibration {
    /// 构建标定.
    ///
    /// `pixel_width` 和 `pixel_height` 必须是正的有限值, 否则返回 `None`.
    pub fn new(pixel_width: f64, pixel_height: f64) -> Option<Self> {
        let valid = |v: f64| v.is_finite() && v > 0.0;
        (valid(pixel_width) && valid(pixel_height)).then_some(Self {
            pixel_width,
            pixel_height,
        })
    }

    /// 1 µm × 1 µm 的标定, 即像素单位.
    #[inline]
    pub const fn unit() -> Self {
        Self {
            pixel_width: 1.0,
            pixel_height: 1.0,
        }
    }

    /// 像素宽度 (水平方向).
    #[inline]
    pub fn pixel_width(&self) -> f64 {
        self.pixel_width
    }

    /// 像素高度 (垂直方向).
    #[inline]
    pub fn pixel_height(&self) -> f64 {
        self.pixel_height
    }

    /// 单个像素的物理面积.
    #[inline]
    pub fn pixel_area(&self) -> f64 {
        self.pixel_width * self.pixel_height
    }

    /// 像素是否是方形的?
    #[inline]
    pub fn is_isotropic(&self) -> bool {
        self.pixel_width == self.pixel_height
    }
}

impl Default for Calibration {
    #[inline]
    fn default() -> Self {
        Self::unit()
    }
}

/// 打开体数据错误.
#[derive(Debug)]
pub enum OpenVolumeError {
    /// 读取 nifti 文件错误.
    Nifti(NiftiError),

    /// 读取 npy 文件错误.
    Npy(ReadNpyError),

    /// 不支持的数据形状. 只支持三维 (单通道) 和四维数据.
    UnsupportedShape(Vec<usize>),

    /// 体数据没有任何切片或像素.
    Empty,
}

impl Display for OpenVolumeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Nifti(e) => write!(f, "nifti 读取错误: {e}"),
            Self::Npy(e) => write!(f, "npy 读取错误: {e}"),
            Self::UnsupportedShape(sh) => write!(f, "不支持的数据形状 {sh:?}"),
            Self::Empty => write!(f, "体数据为空"),
        }
    }
}

impl std::error::Error for OpenVolumeError {}

impl From<NiftiError> for OpenVolumeError {
    fn from(value: NiftiError) -> Self {
        Self::Nifti(value)
    }
}

impl From<ReadNpyError> for OpenVolumeError {
    fn from(value: ReadNpyError) -> Self {
        Self::Npy(value)
    }
}

/// 多通道 z-stack 显微图像, 包括名称, 物理标定和强度数据.
///
/// 数据以 `(通道, z, 高, 宽)` 形式保存, 强度为 `f32`. 创建后不可变.
#[derive(Debug, Clone)]
pub struct Volume {
    name: String,
    calibration: Calibration,
    data: Array4<f32>,
}

impl Index<Idx4d> for Volume {
    type Output = f32;

    #[inline]
    fn index(&self, index: Idx4d) -> &Self::Output {
        &self.data[index]
    }
}

impl Volume {
    /// 从 `(通道, z, 高, 宽)` 形式的任意数值数组创建体数据.
    ///
    /// 无法表示为 `f32` 的样本被视为 0. 如果任一维度为 0, 则返回 `Err(OpenVolumeError::Empty)`.
    pub fn from_array<T: ToPrimitive + Clone>(
        name: impl Into<String>,
        data: Array4<T>,
        calibration: Calibration,
    ) -> Result<Self, OpenVolumeError> {
        if data.is_empty() {
            return Err(OpenVolumeError::Empty);
        }
        let data = data.mapv(|v| v.to_f32().unwrap_or(0.0));
        Ok(Self {
            name: name.into(),
            calibration,
            data,
        })
    }

    /// 打开 nii 文件格式的体数据. `path` 为 nii 文件的本地路径.
    ///
    /// nifti 以 \[W, H, z, c\] 存储, 内部会转换为 \[c, z, H, W\].
    /// 三维文件被视为单通道. 物理标定取自 header 的 `pixdim`.
    pub fn open_nifti<P: AsRef<Path>>(path: P) -> Result<Self, OpenVolumeError> {
        let path = path.as_ref();
        let obj = ReaderOptions::new().read_file(path)?;
        let calibration = calibration_from_header(obj.header());

        let data = obj.into_volume().into_ndarray::<f32>()?;
        let shape = data.shape().to_vec();
        let data = match *shape.as_slice() {
            // [W, H, z] -> [1, z, H, W]
            [w, h, z] => {
                let data = data.permuted_axes([2, 1, 0].as_slice());
                let data = data.as_standard_layout().into_owned();
                Array4::from_shape_vec((1, z, h, w), data.into_raw_vec())
            }
            // [W, H, z, c] -> [c, z, H, W]
            [w, h, z, c] => {
                let data = data.permuted_axes([3, 2, 1, 0].as_slice());
                let data = data.as_standard_layout().into_owned();
                Array4::from_shape_vec((c, z, h, w), data.into_raw_vec())
            }
            _ => return Err(OpenVolumeError::UnsupportedShape(shape)),
        }
        // 元素个数由形状本身决定, 该操作不会生成 `Err`.
        .map_err(|_| OpenVolumeError::UnsupportedShape(vec![]))?;

        Self::from_array(file_title(path), data, calibration)
    }

    /// 打开 npy 文件格式的体数据.
    ///
    /// 支持 `f32`, `f64`, `u16` 和 `u8` 元素. 四维数组按 `(c, z, H, W)` 解释,
    /// 三维数组被视为单通道 `(1, z, H, W)`.
    ///
    /// npy 不携带物理标定, 因此需要由 `calibration` 指定.
    pub fn open_npy<P: AsRef<Path>>(
        path: P,
        calibration: Calibration,
    ) -> Result<Self, OpenVolumeError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(ReadNpyError::from)?;

        // 元素类型由 header 中的描述符决定, 不匹配时依次尝试下一种.
        let mut data = NPY_READERS[0](&bytes);
        for read in &NPY_READERS[1..] {
            match data {
                Err(OpenVolumeError::Npy(ReadNpyError::WrongDescriptor(_))) => {
                    data = read(&bytes);
                }
                _ => break,
            }
        }
        Self::from_array(file_title(path), data?, calibration)
    }

    /// 图像名称 (标识符).
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 物理标定.
    #[inline]
    pub fn calibration(&self) -> Calibration {
        self.calibration
    }

    /// 数据形状 `(通道, z, 高, 宽)`.
    #[inline]
    pub fn shape(&self) -> Idx4d {
        let &[c, z, h, w] = self.data.shape() else {
            unreachable!()
        };
        (c, z, h, w)
    }

    /// 通道个数.
    #[inline]
    pub fn channels(&self) -> usize {
        self.shape().0
    }

    /// 每个通道的切片个数.
    #[inline]
    pub fn len_z(&self) -> usize {
        self.shape().1
    }

    /// 水平切片形状 (高, 宽).
    #[inline]
    pub fn slice_shape(&self) -> Idx2d {
        let (_, _, h, w) = self.shape();
        (h, w)
    }

    /// 获取第 `channel` 个通道 (从 0 开始), 第 `z_index` 层切片的视图.
    ///
    /// 当任一索引越界时 panic.
    #[inline]
    pub fn slice_at(&self, channel: usize, z_index: usize) -> IntensitySlice<'_> {
        IntensitySlice::new(
            self.data
                .index_axis(Axis(0), channel)
                .index_axis_move(Axis(0), z_index),
        )
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView<'_, f32, Ix4> {
        self.data.view()
    }
}

type NpyReader = fn(&[u8]) -> Result<Array4<f32>, OpenVolumeError>;

const NPY_READERS: [NpyReader; 4] = [
    read_npy_stack::<f32>,
    read_npy_stack::<u16>,
    read_npy_stack::<u8>,
    read_npy_stack::<f64>,
];

/// 以元素类型 `T` 读取 npy 数据并转换为四维 `f32` 数组.
fn read_npy_stack<T>(bytes: &[u8]) -> Result<Array4<f32>, OpenVolumeError>
where
    T: ReadableElement + ToPrimitive + Clone,
{
    let data = ArrayD::<T>::read_npy(bytes)?.mapv(|v| v.to_f32().unwrap_or(0.0));
    let shape = data.shape().to_vec();
    let data = match shape.len() {
        3 => data
            .into_dimensionality::<Ix3>()
            .map(|d| d.insert_axis(Axis(0))),
        4 => data.into_dimensionality::<Ix4>(),
        _ => return Err(OpenVolumeError::UnsupportedShape(shape)),
    };
    data.map_err(|_| OpenVolumeError::UnsupportedShape(shape))
}

/// 文件名去掉所有扩展名后的部分 (`a.nii.gz` -> `a`).
fn file_title(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    match name.split_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem.to_string(),
        _ => name,
    }
}

/// 从 header 读取像素宽高. 不合法时退化为像素单位.
fn calibration_from_header(header: &NiftiHeader) -> Calibration {
    let [_, w, h, ..] = header.pixdim;
    Calibration::new(w as f64, h as f64).unwrap_or_default()
}
