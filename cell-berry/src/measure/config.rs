//! 通道配置: 四个标记各自所在的通道, 以及各自的最低平均强度.

use crate::Volume;
use std::fmt::{Display, Formatter};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 配置的通道总数. 四个标记恰好占满所有通道.
pub const CHANNEL_COUNT: usize = 4;

/// 生物标记.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Marker {
    /// SCA1, 与 GFP 组成参考表型.
    Sca1,

    /// Hoechst 核染色, 与 OPN 组成候选表型.
    Hoechst,

    /// OPN.
    Opn,

    /// GFP.
    Gfp,
}

impl Marker {
    /// 所有标记, 按固定顺序.
    pub const ALL: [Marker; CHANNEL_COUNT] = [Self::Sca1, Self::Hoechst, Self::Opn, Self::Gfp];

    /// 标记在 [`Marker::ALL`] 中的位置.
    #[inline]
    pub const fn index(&self) -> usize {
        match self {
            Self::Sca1 => 0,
            Self::Hoechst => 1,
            Self::Opn => 2,
            Self::Gfp => 3,
        }
    }

    /// 标记名称.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Sca1 => "SCA1",
            Self::Hoechst => "Hoechst",
            Self::Opn => "OPN",
            Self::Gfp => "GFP",
        }
    }
}

impl Display for Marker {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// 单个标记的通道设置.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ChannelSpec {
    /// 通道编号, 从 1 开始.
    pub channel: usize,

    /// 分割结果在原图上的最低平均强度. 低于该值时整个通道视为无信号.
    pub minimum: f64,
}

impl ChannelSpec {
    /// 直接初始化. 合法性由 [`ChannelConfig::new`] 统一检查.
    #[inline]
    pub const fn new(channel: usize, minimum: f64) -> Self {
        Self { channel, minimum }
    }

    /// 从 0 开始的通道索引.
    #[inline]
    pub fn channel_index(&self) -> usize {
        self.channel - 1
    }
}

/// 配置错误.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// 通道编号不在 `1..=4` 之内.
    ChannelOutOfRange {
        /// 出错的标记.
        marker: Marker,
        /// 给定的通道编号.
        channel: usize,
    },

    /// 两个标记使用了同一个通道.
    DuplicateChannel {
        /// 重复的通道编号.
        channel: usize,
    },

    /// 最低平均强度不是非负有限值.
    InvalidMinimum {
        /// 出错的标记.
        marker: Marker,
        /// 给定的值.
        value: f64,
    },

    /// 体数据的通道数少于配置需要的通道数.
    TooFewChannels {
        /// 需要的通道数.
        required: usize,
        /// 实际通道数.
        found: usize,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ChannelOutOfRange { marker, channel } => {
                write!(f, "{marker} 的通道 {channel} 越界, 只允许 1 ~ {CHANNEL_COUNT}")
            }
            Self::DuplicateChannel { channel } => write!(f, "通道 {channel} 被重复使用"),
            Self::InvalidMinimum { marker, value } => {
                write!(f, "{marker} 的最低平均强度 {value} 不合法")
            }
            Self::TooFewChannels { required, found } => {
                write!(f, "需要 {required} 个通道, 但体数据只有 {found} 个")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// 四个标记的通道配置.
///
/// 只能通过 [`ChannelConfig::new`] 创建, 因此总是合法的:
/// 四个通道编号恰好是 `1..=4` 的一个排列, 所有最低平均强度都是非负有限值.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ChannelConfig {
    specs: [ChannelSpec; CHANNEL_COUNT],
}

impl ChannelConfig {
    /// 按 SCA1, Hoechst, OPN, GFP 的顺序给出设置, 检查后创建配置.
    pub fn new(
        sca1: ChannelSpec,
        hoechst: ChannelSpec,
        opn: ChannelSpec,
        gfp: ChannelSpec,
    ) -> Result<Self, ConfigError> {
        let specs = [sca1, hoechst, opn, gfp];
        let mut used = [false; CHANNEL_COUNT];
        for (marker, spec) in Marker::ALL.iter().zip(specs.iter()) {
            if !(1..=CHANNEL_COUNT).contains(&spec.channel) {
                return Err(ConfigError::ChannelOutOfRange {
                    marker: *marker,
                    channel: spec.channel,
                });
            }
            if std::mem::replace(&mut used[spec.channel - 1], true) {
                return Err(ConfigError::DuplicateChannel {
                    channel: spec.channel,
                });
            }
            if !(spec.minimum.is_finite() && spec.minimum >= 0.0) {
                return Err(ConfigError::InvalidMinimum {
                    marker: *marker,
                    value: spec.minimum,
                });
            }
        }
        Ok(Self { specs })
    }

    /// 由通道编号列表和最低平均强度列表创建, 顺序均为 SCA1, Hoechst, OPN, GFP.
    pub fn from_lists(
        channels: [usize; CHANNEL_COUNT],
        minimums: [f64; CHANNEL_COUNT],
    ) -> Result<Self, ConfigError> {
        let [a, b, c, d] = channels;
        let [ma, mb, mc, md] = minimums;
        Self::new(
            ChannelSpec::new(a, ma),
            ChannelSpec::new(b, mb),
            ChannelSpec::new(c, mc),
            ChannelSpec::new(d, md),
        )
    }

    /// 获取 `marker` 的设置.
    #[inline]
    pub fn spec(&self, marker: Marker) -> ChannelSpec {
        self.specs[marker.index()]
    }

    /// 配置用到的最大通道编号.
    #[inline]
    pub fn max_channel(&self) -> usize {
        self.specs.iter().map(|s| s.channel).max().unwrap_or(0)
    }

    /// 检查体数据是否有足够多的通道.
    pub fn check_volume(&self, volume: &Volume) -> Result<(), ConfigError> {
        let required = self.max_channel();
        let found = volume.channels();
        if found < required {
            Err(ConfigError::TooFewChannels { required, found })
        } else {
            Ok(())
        }
    }
}

impl Default for ChannelConfig {
    /// SCA1 = 1, Hoechst = 2, OPN = 3, GFP = 4, 最低平均强度均为 0.
    fn default() -> Self {
        Self {
            specs: [
                ChannelSpec::new(1, 0.0),
                ChannelSpec::new(2, 0.0),
                ChannelSpec::new(3, 0.0),
                ChannelSpec::new(4, 0.0),
            ],
        }
    }
}
