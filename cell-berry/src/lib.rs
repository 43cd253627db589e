#![warn(missing_docs)] // <= 合适时移除它.
// #![warn(clippy::missing_docs_in_private_items)]  // <= too strict.

//! 核心库. 对多通道、多切片 (z-stack) 的肝脏显微图像进行逐通道分割,
//! 并测量每个 OPN+ 细胞到最近 SCA1+ GFP+ 双阳性区域的距离.
//!
//! 该 crate 目前仅提供 `safe` 接口.
//!
//! # 注意
//!
//! 1. 该 crate 只处理 z 方向最大值投影后的二维图像, 不做三维分割.
//! 2. 输入体数据的物理标定 (像素宽高, 单位 µm) 由调用方保证正确.
//! 3. 在非期望情况下 (例如越界通道), 程序会直接 panic, 而不会导致内存错误.
//!
//! # 开发计划
//!
//! ### 最大值投影 ✅
//!
//! 实现位于 `cell-berry/src/data/projection.rs`.
//!
//! ### 单通道分割 ✅
//!
//! 高斯平滑, 背景扣除, 256-bin 直方图自动阈值 (Otsu / MaxEntropy / IsoData / Mean),
//! 空洞填充, 分水岭切分, 闭运算, 以及原图平均强度否决.
//!
//! 实现位于 `cell-berry/src/segment`.
//!
//! ### 区域提取 ✅
//!
//! 按 4-相邻规则提取连通区域. 空洞填充使用同样的连通规则.
//! 区域顺序按照每个区域行优先意义下的第一个像素排序 (自上而下, 自左而右),
//! 因此多次运行结果稳定.
//!
//! 实现位于 `cell-berry/src/region.rs`.
//!
//! ### 欧氏距离变换 ✅
//!
//! 精确 EDT (下包络抛物线算法), 线性时间.
//!
//! 实现位于 `cell-berry/src/distance.rs`.
//!
//! ### 距离测量与标注 ✅
//!
//! 实现位于 `cell-berry/src/measure`.
//!
//! ### 小功能 ✅
//!
//! 1. 压缩存储二值掩膜 (`CompactMask`). ✅
//! 2. 结果表格 CSV 输出, 标注图 PNG 输出. ✅
//! 3. 目录批量加载器. ✅
//!
//! ### 非方形像素 ⌛️
//!
//! 距离的物理换算目前只乘以像素宽度 (假设像素各向同性).

/// 二维索引 (高, 宽), 同时也可一定程度上用作非负整数向量.
pub type Idx2d = (usize, usize);

/// 四维索引 (通道, z, 高, 宽).
pub type Idx4d = (usize, usize, usize, usize);

type Predicate = fn(u8) -> bool;

type Area2d = Vec<Idx2d>;
type Areas2d = Vec<Area2d>;

/// 体数据和二维切片的基础数据结构.
mod data;

pub use data::{
    Calibration, CompactMask, ImgWriteRaw, ImgWriteVis, IntensitySlice, IntensityWindow,
    MaskSlice, MaskSliceMut, OpenVolumeError, OwnedIntensity, OwnedMask, Volume,
};

pub mod consts;

pub mod distance;

pub mod eight;

pub mod region;

pub mod segment;

pub mod measure;

pub mod overlay;

pub mod dataset;
pub mod prelude;
