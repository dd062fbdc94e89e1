//! segue-cli - 命令行播放器
//!
//! 播放本地文件，可以预备下一首实现无缝切换

use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use segue_transport::Transport;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod command;
mod settings;
mod shell;

use settings::Settings;
use shell::Shell;

#[derive(Parser, Debug)]
#[command(name = "segue-cli")]
#[command(about = "Gapless command line audio player")]
#[command(version)]
struct Args {
    /// TOML 配置文件
    #[arg(short, long, env = "SEGUE_CONFIG")]
    config: Option<PathBuf>,

    /// 初始音量 (0-100)，覆盖配置文件
    #[arg(short, long)]
    volume: Option<f64>,

    /// 第一个文件立即播放，第二个作为下一首
    files: Vec<String>,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "segue_cli=info,segue_transport=info,segue_player=warn".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let args = Args::parse();

    let mut settings = Settings::load(args.config.as_deref())?;
    if let Some(volume) = args.volume {
        settings.transport.volume = volume / 100.0;
    }

    let transport =
        Transport::with_config(&settings.transport).context("Failed to start transport")?;
    if transport.output().has_device() {
        info!("output device: {}", transport.output().name());
    } else {
        tracing::warn!("no output device, tracks will report errors when played");
    }

    let printer = shell::spawn_event_printer(transport.subscribe())
        .context("Failed to spawn event printer")?;

    let mut files = args.files.iter();
    if let Some(first) = files.next() {
        transport.start(first);
    }
    if let Some(second) = files.next() {
        transport.prepare_next_track(second);
    }
    if files.next().is_some() {
        info!("only the first two files are used");
    }

    Shell::new(&transport).run(io::stdin().lock())?;

    // 释放 Transport 后通知通道断开，打印线程随之退出
    drop(transport);
    if printer.join().is_err() {
        tracing::warn!("event printer panicked");
    }

    info!("bye");
    Ok(())
}
