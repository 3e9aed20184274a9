//! # EV3 CLI
//!
//! Command-line interface for the LEGO Mindstorms EV3 brick.
//!
//! 每条命令独立完成 连接 -> 执行 -> 断开：
//!
//! ```bash
//! # 配置默认主控
//! ev3-cli config set --address 192.168.1.20 --serial 0016535D7E2D
//!
//! # 电机 A、D 以 50% 功率转动 1 秒
//! ev3-cli motor --ports AD --power 50 --time-ms 1000 --brake
//!
//! # 持续监控传感器和按键
//! ev3-cli monitor --mode 1=0
//!
//! # 上传程序
//! ev3-cli upload demo.rbf apps/demo/demo.rbf
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

use commands::{
    CliConfig, ConfigCommand, InfoCommand, MonitorCommand, MotorCommand, PathCommand, StopCommand,
    ToneCommand, UploadCommand,
};

/// EV3 CLI - 主控命令行工具
#[derive(Parser, Debug)]
#[command(name = "ev3-cli")]
#[command(about = "Command-line interface for the LEGO Mindstorms EV3 brick", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 配置管理
    #[command(subcommand)]
    Config(ConfigCommand),

    /// 固件版本与端口设备
    Info {
        #[command(flatten)]
        args: InfoCommand,
    },

    /// 监控传感器和按键
    Monitor {
        #[command(flatten)]
        args: MonitorCommand,
    },

    /// 驱动电机
    Motor {
        #[command(flatten)]
        args: MotorCommand,
    },

    /// 停止电机
    Stop {
        #[command(flatten)]
        args: StopCommand,
    },

    /// 播放蜂鸣
    Tone {
        #[command(flatten)]
        args: ToneCommand,
    },

    /// 上传文件到主控
    Upload {
        #[command(flatten)]
        args: UploadCommand,
    },

    /// 在主控上创建目录
    Mkdir {
        #[command(flatten)]
        args: PathCommand,
    },

    /// 删除主控上的文件
    Rm {
        #[command(flatten)]
        args: PathCommand,
    },
}

fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("ev3_cli=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let config = CliConfig::load()?;
    tracing::debug!("Loaded config: {:?}", config);

    run(cli.command, &config)
}

fn run(command: Commands, config: &CliConfig) -> Result<()> {
    match command {
        Commands::Config(cmd) => cmd.execute(),
        Commands::Info { args } => args.execute(config),
        Commands::Monitor { args } => args.execute(config),
        Commands::Motor { args } => args.execute(config),
        Commands::Stop { args } => args.execute(config),
        Commands::Tone { args } => args.execute(config),
        Commands::Upload { args } => args.execute(config),
        Commands::Mkdir { args } => args.mkdir(config),
        Commands::Rm { args } => args.remove(config),
    }
}
