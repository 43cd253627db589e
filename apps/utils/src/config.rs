//! 从环境变量读取测量配置.

use cell_berry::measure::{ChannelConfig, ConfigError, CHANNEL_COUNT};
use cell_berry::Calibration;
use std::env;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// 环境变量解析错误.
#[derive(Debug, Clone, PartialEq)]
pub enum EnvConfigError {
    /// 变量值无法解析.
    Malformed {
        /// 变量名.
        var: &'static str,
        /// 原始值.
        value: String,
    },

    /// 通道配置不合法.
    Config(ConfigError),
}

impl Display for EnvConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Malformed { var, value } => write!(f, "无法解析 ${var} = {value:?}"),
            Self::Config(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for EnvConfigError {}

impl From<ConfigError> for EnvConfigError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

/// 将逗号分隔的 `CHANNEL_COUNT` 个数值解析为数组.
pub fn parse_list<T: FromStr + Copy + Default>(s: &str) -> Option<[T; CHANNEL_COUNT]> {
    let mut ans = [T::default(); CHANNEL_COUNT];
    let mut parts = s.split(',');
    for slot in ans.iter_mut() {
        *slot = parts.next()?.trim().parse().ok()?;
    }
    parts.next().is_none().then_some(ans)
}

fn list_from_env<T: FromStr + Copy + Default>(
    var: &'static str,
    default: [T; CHANNEL_COUNT],
) -> Result<[T; CHANNEL_COUNT], EnvConfigError> {
    match env::var(var) {
        Ok(value) if !value.trim().is_empty() => {
            parse_list(&value).ok_or(EnvConfigError::Malformed { var, value })
        }
        _ => Ok(default),
    }
}

/// 从 `$CELL_CHANNELS` (默认 `"1,2,3,4"`) 和 `$CELL_MINIMUMS` (默认 `"0,0,0,0"`)
/// 读取通道配置. 顺序为 SCA1, Hoechst, OPN, GFP.
pub fn channel_config_from_env() -> Result<ChannelConfig, EnvConfigError> {
    let channels = list_from_env("CELL_CHANNELS", [1, 2, 3, 4])?;
    let minimums = list_from_env("CELL_MINIMUMS", [0.0; CHANNEL_COUNT])?;
    Ok(ChannelConfig::from_lists(channels, minimums)?)
}

/// 从 `$CELL_PIXEL_SIZE` 读取 npy 文件使用的像素边长 (µm). 未设置时为 1.
pub fn calibration_from_env() -> Result<Calibration, EnvConfigError> {
    const VAR: &str = "CELL_PIXEL_SIZE";
    match env::var(VAR) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(|s| Calibration::new(s, s))
            .ok_or(EnvConfigError::Malformed { var: VAR, value }),
        _ => Ok(Calibration::unit()),
    }
}

/// 布尔型开关: 值为 `1`, `true`, `yes` 或 `on` (不区分大小写) 时为真.
pub fn flag_from_env(var: &str) -> bool {
    env::var(var).is_ok_and(|v| {
        matches!(
            v.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}

#[cfg(test)]
mod tests {
    use super::parse_list;

    #[test]
    fn test_parse_list() {
        assert_eq!(parse_list::<usize>("4, 3,2,1"), Some([4, 3, 2, 1]));
        assert_eq!(parse_list::<f64>("0,0.5,10,0"), Some([0.0, 0.5, 10.0, 0.0]));
        assert_eq!(parse_list::<usize>("1,2,3"), None);
        assert_eq!(parse_list::<usize>("1,2,3,4,5"), None);
        assert_eq!(parse_list::<usize>("1,x,3,4"), None);
    }
}
