//! 数据库连通性探测工具
//!
//! 单次运行，完成以下检查：
//! - 从环境变量（及 .env 文件）读取连接配置
//! - 建立数据库连接并执行诊断查询
//! - 输出结果或错误提示，并始终释放连接

mod driver;
mod probe;
mod report;
mod sqlx_driver;

use std::io::{self, Write};
use std::process::ExitCode;

use anyhow::Context;
use common::config::{env_lookup, AppConfig, OutputFormat};
use probe::ConnectionProbe;
use report::Reporter;
use sqlx_driver::SqlxDriver;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<ExitCode> {
    // 读取 .env 文件（不存在时忽略），已存在的环境变量优先
    dotenv::dotenv().ok();

    // 初始化日志追踪（输出到 stderr，不干扰报告）
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    // 加载配置
    let config = AppConfig::from_env();

    // 执行探测
    let mut probe = ConnectionProbe::new(SqlxDriver, Reporter::new(io::stdout(), config.output));
    let report = probe.run(env_lookup).await;

    let mut stdout = io::stdout().lock();
    if config.output == OutputFormat::Json {
        serde_json::to_writer_pretty(&mut stdout, &report)
            .context("failed to write JSON report")?;
        writeln!(stdout).context("failed to write JSON report")?;
    }
    stdout.flush().context("failed to flush stdout")?;

    tracing::info!(status = ?report.status, "Probe finished");
    Ok(if report.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
