//! 连接参数与端口解析
//!
//! 命令行参数优先于配置文件。

use super::config::CliConfig;
use anyhow::{Context, Result, bail};
use clap::Args;
use ev3_sdk::prelude::*;

/// 所有需要连接主控的命令共用的参数
#[derive(Args, Debug, Clone, Default)]
pub struct ConnectArgs {
    /// 主控地址（覆盖配置）
    #[arg(short, long)]
    pub address: Option<String>,

    /// 主控序列号（覆盖配置）
    #[arg(short, long)]
    pub serial: Option<String>,

    /// 回复超时（毫秒，覆盖配置）
    #[arg(long)]
    pub timeout_ms: Option<u64>,
}

/// 合并后的连接参数
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub address: String,
    pub serial: String,
    pub pipeline: PipelineConfig,
}

impl ConnectArgs {
    pub fn resolve(&self, config: &CliConfig) -> Result<Resolved> {
        let Some(address) = self.address.clone().or_else(|| config.address.clone()) else {
            bail!("未指定主控地址，请使用 --address 或 `ev3-cli config set --address <HOST>`");
        };
        let mut pipeline = PipelineConfig::default();
        if let Some(ms) = self.timeout_ms.or(config.response_timeout_ms) {
            pipeline.response_timeout_ms = ms;
        }
        if let Some(ms) = config.poll_period_ms {
            pipeline.poll_period_ms = ms;
        }
        Ok(Resolved {
            address,
            serial: self.serial.clone().or_else(|| config.serial.clone()).unwrap_or_default(),
            pipeline,
        })
    }

    /// 连接主控
    ///
    /// `poll` 为 `false` 时不启动后台轮询。
    pub fn connect(&self, config: &CliConfig, poll: bool) -> Result<Brick> {
        self.connect_with(config, poll, BrickBuilder::new())
    }

    /// 在已有的 builder（例如已设置变化回调）上连接
    pub fn connect_with(&self, config: &CliConfig, poll: bool, builder: BrickBuilder) -> Result<Brick> {
        let brick = self.build_with(config, poll, builder)?;
        let period = brick.config().poll_period();
        brick
            .connect(period)
            .with_context(|| format!("连接 {} 失败", self.describe(config)))?;
        Ok(brick)
    }

    /// 只构建不连接，调用方可以先设置端口模式
    pub fn build_with(&self, config: &CliConfig, poll: bool, builder: BrickBuilder) -> Result<Brick> {
        let resolved = self.resolve(config)?;
        let mut pipeline = resolved.pipeline;
        if !poll {
            pipeline.poll_period_ms = 0;
        }
        println!("🔌 连接到主控 {}...", resolved.address);
        Ok(builder
            .address(resolved.address)
            .serial(resolved.serial)
            .pipeline_config(pipeline)
            .build()?)
    }

    fn describe(&self, config: &CliConfig) -> String {
        self.address
            .clone()
            .or_else(|| config.address.clone())
            .unwrap_or_default()
    }
}

/// 解析输出端口集合，例如 `A`、`AD`、`all`
pub fn parse_output_ports(s: &str) -> Result<OutputPorts> {
    if s.eq_ignore_ascii_case("all") {
        return Ok(OutputPorts::all());
    }
    let mut ports = OutputPorts::none();
    for c in s.chars() {
        let port = match c.to_ascii_uppercase() {
            'A' => OutputPort::A,
            'B' => OutputPort::B,
            'C' => OutputPort::C,
            'D' => OutputPort::D,
            ',' | '+' => continue,
            other => bail!("无效的输出端口: {other}"),
        };
        ports = ports | port;
    }
    if ports.bits() == 0 {
        bail!("至少需要一个输出端口");
    }
    Ok(ports)
}

/// 解析单个输入端口：`1`-`4` 或 `A`-`D`
pub fn parse_input_port(s: &str) -> Result<InputPort> {
    let port = match s.to_ascii_uppercase().as_str() {
        "1" => InputPort::One,
        "2" => InputPort::Two,
        "3" => InputPort::Three,
        "4" => InputPort::Four,
        "A" => InputPort::A,
        "B" => InputPort::B,
        "C" => InputPort::C,
        "D" => InputPort::D,
        _ => bail!("无效的输入端口: {s}"),
    };
    Ok(port)
}
