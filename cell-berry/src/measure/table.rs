//! 测量结果表格.

use std::io::Write;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 表头.
pub const COLUMNS: [&str; 5] = [
    "Image",
    "OPN+ Cell",
    "X",
    "Y",
    "OPN+ cell distance from SCA1+ GFP+ (µm)",
];

/// 一个被接受的候选细胞的测量结果.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MeasurementRow {
    /// 图像名称.
    pub image: String,

    /// 细胞编号, 从 0 开始, 按区域提取顺序递增.
    pub cell: usize,

    /// 质心 x (µm).
    pub x: f64,

    /// 质心 y (µm).
    pub y: f64,

    /// 到最近参考区域的平均距离 (µm).
    pub distance: f64,
}

/// 测量结果表格, 行按细胞编号排列.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ResultsTable {
    rows: Vec<MeasurementRow>,
}

impl ResultsTable {
    /// 空表.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一行.
    #[inline]
    pub fn push(&mut self, row: MeasurementRow) {
        self.rows.push(row);
    }

    /// 所有行.
    #[inline]
    pub fn rows(&self) -> &[MeasurementRow] {
        &self.rows
    }

    /// 行数.
    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// 是否为空表?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// 追加另一张表的所有行.
    pub fn extend(&mut self, other: ResultsTable) {
        self.rows.extend(other.rows);
    }

    /// 所有行距离的平均值. 空表返回 `None`.
    pub fn mean_distance(&self) -> Option<f64> {
        (!self.is_empty())
            .then(|| self.rows.iter().map(|r| r.distance).sum::<f64>() / self.len() as f64)
    }

    /// 以 CSV 格式写出表格 (含表头). 坐标与距离保留 4 位小数.
    pub fn write_csv<W: Write>(&self, w: W) -> csv::Result<()> {
        let mut writer = csv::Writer::from_writer(w);
        writer.write_record(COLUMNS)?;
        for r in self.rows.iter() {
            writer.write_record([
                r.image.clone(),
                r.cell.to_string(),
                format!("{:.4}", r.x),
                format!("{:.4}", r.y),
                format!("{:.4}", r.distance),
            ])?;
        }
        writer.flush()?;
        Ok(())
    }
}
