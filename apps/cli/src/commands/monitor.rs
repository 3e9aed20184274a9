//! 监控主控状态
//!
//! 启动后台轮询，把每个变化事件打印出来，Ctrl-C 退出。

use super::config::CliConfig;
use super::connection::{ConnectArgs, parse_input_port};
use anyhow::{Context, Result};
use clap::Args;
use crossbeam_channel::{Receiver, select};
use ev3_sdk::prelude::*;
use std::sync::Arc;

#[derive(Args, Debug)]
pub struct MonitorCommand {
    #[command(flatten)]
    pub connect: ConnectArgs,

    /// 轮询周期（毫秒，覆盖配置）
    #[arg(long)]
    pub period_ms: Option<u64>,

    /// 每个周期都输出（即使状态没有变化）
    #[arg(long)]
    pub always: bool,

    /// 端口读取模式，例如 `1=4`（可重复）
    #[arg(long = "mode", value_name = "PORT=MODE")]
    pub modes: Vec<String>,
}

impl MonitorCommand {
    pub fn execute(&self, config: &CliConfig) -> Result<()> {
        let modes = self
            .modes
            .iter()
            .map(|s| parse_port_mode(s))
            .collect::<Result<Vec<_>>>()?;

        let mut config = config.clone();
        if let Some(period) = self.period_ms {
            config.poll_period_ms = Some(period);
        }

        let (event_tx, event_rx) = crossbeam_channel::bounded::<BrickChanged>(16);
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
        ctrlc::set_handler(move || {
            let _ = stop_tx.try_send(());
        })
        .context("注册 Ctrl-C 处理失败")?;

        let builder = BrickBuilder::new()
            .always_send_events(self.always)
            .change_sink(Arc::new(event_tx));
        let brick = self.connect.build_with(&config, true, builder)?;
        for (port, mode) in modes {
            brick.set_port_mode(port, mode);
        }
        brick.connect(brick.config().poll_period())?;

        println!("📡 监控中（Ctrl-C 退出）...");
        let printed = run_monitor(&event_rx, &stop_rx);

        brick.disconnect()?;
        let metrics = brick.metrics();
        println!(
            "✅ 已退出：{} 个事件，{} 个轮询周期，{} 次跳过",
            printed, metrics.poll_cycles, metrics.poll_skipped
        );
        Ok(())
    }
}

/// 打印事件直到收到停止信号或事件通道关闭，返回打印的事件数
fn run_monitor(events: &Receiver<BrickChanged>, stop: &Receiver<()>) -> usize {
    let mut printed = 0;
    loop {
        select! {
            recv(stop) -> _ => break,
            recv(events) -> event => match event {
                Ok(event) => {
                    println!("{}", format_event(&event));
                    printed += 1;
                },
                Err(_) => break,
            },
        }
    }
    printed
}

fn parse_port_mode(s: &str) -> Result<(InputPort, u8)> {
    let (port, mode) = s
        .split_once('=')
        .ok_or_else(|| anyhow::anyhow!("端口模式格式应为 PORT=MODE: {s}"))?;
    let mode = mode.trim().parse::<u8>().with_context(|| format!("无效的模式: {mode}"))?;
    Ok((parse_input_port(port.trim())?, mode))
}

/// 单行展示：周期号、非空端口的 SI 值、按下的按键
pub fn format_event(event: &BrickChanged) -> String {
    let snapshot = &event.snapshot;
    let mut line = format!("[{:>6}]", snapshot.cycle);
    for port in &snapshot.ports {
        let Some(device_type) = port.device_type else {
            continue;
        };
        if matches!(device_type, DeviceType::Empty | DeviceType::WrongPort) {
            continue;
        }
        line.push_str(&format!(" {}:{:?}={:.2}", port.id, device_type, port.si_value));
    }
    let buttons = snapshot.buttons;
    if buttons.any() {
        let pressed: Vec<&str> = [
            (buttons.back, "back"),
            (buttons.left, "left"),
            (buttons.up, "up"),
            (buttons.right, "right"),
            (buttons.down, "down"),
            (buttons.enter, "enter"),
        ]
        .into_iter()
        .filter_map(|(on, name)| on.then_some(name))
        .collect();
        line.push_str(&format!(" buttons=[{}]", pressed.join(",")));
    }
    line
}
