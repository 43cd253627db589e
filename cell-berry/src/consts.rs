//! 通用常量.

/// 单通道颜色.
pub mod gray {
    /// 二值掩膜中, 背景的像素值.
    pub const MASK_BACKGROUND: u8 = 0;

    /// 二值掩膜中, 前景的像素值.
    pub const MASK_FOREGROUND: u8 = 255;

    /// 单通道黑色.
    pub const BLACK: u8 = 0b_0000_0000;

    /// 像素是否是前景?
    #[inline]
    pub const fn is_foreground(p: u8) -> bool {
        matches!(p, MASK_FOREGROUND)
    }

    /// 像素是否是背景?
    #[inline]
    pub const fn is_background(p: u8) -> bool {
        !is_foreground(p)
    }
}

/// 标注用的 RGB 颜色.
pub mod rgb {
    /// SCA1 掩膜轮廓.
    pub const YELLOW: [u8; 3] = [255, 255, 0];

    /// OPN 掩膜轮廓.
    pub const CYAN: [u8; 3] = [0, 255, 255];

    /// GFP 掩膜轮廓.
    pub const BLUE: [u8; 3] = [0, 0, 255];

    /// 被接受的候选细胞轮廓和编号.
    pub const MAGENTA: [u8; 3] = [255, 0, 255];
}

/// 候选细胞物理面积下限 (µm², 闭区间).
pub const MIN_CELL_AREA: f64 = 5.0;

/// 候选细胞物理面积上限 (µm², 闭区间).
pub const MAX_CELL_AREA: f64 = 100.0;

/// 分水岭切分时寻找距离场局部极大值的噪声容限 (像素单位).
pub const WATERSHED_TOLERANCE: f64 = 0.5;

/// 自动阈值直方图的 bin 个数.
pub const HISTOGRAM_BINS: usize = 256;

/// 细胞编号相对其外接矩形上边缘的向上偏移 (像素).
pub const LABEL_OFFSET: usize = 16;

/// 体素/像素类型.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ElemType {
    /// `MASK_BACKGROUND`, 代表背景.
    Background,

    /// `MASK_FOREGROUND`, 代表前景.
    Foreground,
}

impl ElemType {
    /// 对应的掩膜像素值.
    #[inline]
    pub const fn pixel(&self) -> u8 {
        match self {
            Self::Background => gray::MASK_BACKGROUND,
            Self::Foreground => gray::MASK_FOREGROUND,
        }
    }
}
