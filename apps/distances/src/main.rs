//! 批量测量目录下所有体数据中 OPN+ 细胞到 SCA1+ GFP+ 区域的距离.
//!
//! 所有配置均来自环境变量, 见 `utils::config` 与 `utils::loader`.

use log::LevelFilter;
use simple_logger::SimpleLogger;
use std::process::ExitCode;

mod runner;
mod summary;

fn main() -> ExitCode {
    if let Err(e) = SimpleLogger::new().with_level(LevelFilter::Info).env().init() {
        eprintln!("Logger init error: {e}");
    }

    match runner::run() {
        Ok(summary) => {
            summary.describe();
            if summary.failed() > 0 {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
