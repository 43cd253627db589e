//! 运行结果汇总.

use cell_berry::measure::{Report, ResultsTable};
use std::io::{self, Write};

/// 单张图像的处理结果.
pub enum ImageOutcome {
    /// 测量完成.
    Measured {
        /// 图像名称.
        image: String,
        /// 被接受的细胞个数.
        cells: usize,
        /// 平均距离 (µm).
        mean_distance: Option<f64>,
    },

    /// 加载或处理失败.
    Failed {
        /// 图像名称或文件路径.
        image: String,
        /// 错误描述.
        reason: String,
    },
}

impl ImageOutcome {
    /// 从测量报告创建.
    pub fn from_report(report: &Report) -> Self {
        Self::Measured {
            image: report.image.clone(),
            cells: report.table.len(),
            mean_distance: report.table.mean_distance(),
        }
    }
}

/// 将 `outcome` 写进 `w` 中.
fn describe_into<W: Write>(outcome: &ImageOutcome, w: &mut W) -> io::Result<()> {
    const S4: &str = "    ";

    match outcome {
        ImageOutcome::Measured {
            image,
            cells,
            mean_distance,
        } => {
            writeln!(w, "Image `{image}`:")?;
            writeln!(w, "{S4}Accepted OPN+ cells: {cells}")?;
            match mean_distance {
                Some(d) => write!(w, "{S4}Mean distance: {d:.4} µm")?,
                None => write!(w, "{S4}Mean distance: /")?,
            }
        }
        ImageOutcome::Failed { image, reason } => {
            writeln!(w, "Image `{image}`:")?;
            write!(w, "{S4}Failed: {reason}")?;
        }
    }
    Ok(())
}

/// 一次批量运行的最终结果.
#[derive(Default)]
pub struct RunSummary {
    outcomes: Vec<ImageOutcome>,
    table: ResultsTable,
}

impl RunSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, outcome: ImageOutcome) {
        self.outcomes.push(outcome);
    }

    pub fn push_failure(&mut self, image: String, reason: String) {
        self.outcomes.push(ImageOutcome::Failed { image, reason });
    }

    pub fn extend_table(&mut self, table: ResultsTable) {
        self.table.extend(table);
    }

    /// 所有图像合并后的结果表格.
    pub fn table(&self) -> &ResultsTable {
        &self.table
    }

    /// 失败的图像个数.
    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, ImageOutcome::Failed { .. }))
            .count()
    }

    /// 打印运行结果.
    pub fn describe(&self) {
        utils::sep();
        let mut buf = Vec::with_capacity(256);

        for outcome in self.outcomes.iter() {
            if describe_into(outcome, &mut buf).is_ok() {
                println!("{}", String::from_utf8_lossy(&buf));
            }
            buf.clear();

            utils::sep();
        }
        println!(
            "{} image(s), {} failed, {} cell(s) measured",
            self.outcomes.len(),
            self.failed(),
            self.table.len()
        );
    }
}
