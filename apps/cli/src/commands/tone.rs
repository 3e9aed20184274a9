//! 蜂鸣与 LED

use super::config::CliConfig;
use super::connection::ConnectArgs;
use anyhow::{Result, bail};
use clap::Args;
use ev3_sdk::prelude::*;

#[derive(Args, Debug)]
pub struct ToneCommand {
    #[command(flatten)]
    pub connect: ConnectArgs,

    /// 音量（0-100）
    #[arg(short, long, default_value_t = 50)]
    pub volume: u8,

    /// 频率（Hz）
    #[arg(short, long, default_value_t = 1000)]
    pub frequency: u16,

    /// 时长（毫秒）
    #[arg(short = 'm', long, default_value_t = 500)]
    pub duration_ms: u16,

    /// 同时切换 LED 图案（如 green、red-flash、orange-pulse）
    #[arg(long)]
    pub led: Option<String>,
}

impl ToneCommand {
    pub fn execute(&self, config: &CliConfig) -> Result<()> {
        if self.volume > 100 {
            bail!("音量超出范围: {}", self.volume);
        }
        let led = self.led.as_deref().map(parse_led).transpose()?;

        let brick = self.connect.connect(config, false)?;
        if let Some(pattern) = led {
            brick.set_led_pattern(pattern)?;
        }
        println!("🔔 {} Hz, {} ms", self.frequency, self.duration_ms);
        brick.play_tone(self.volume, self.frequency, self.duration_ms)?;
        brick.disconnect()?;
        Ok(())
    }
}

fn parse_led(s: &str) -> Result<LedPattern> {
    let pattern = match s.to_ascii_lowercase().as_str() {
        "off" | "black" => LedPattern::Black,
        "green" => LedPattern::Green,
        "red" => LedPattern::Red,
        "orange" => LedPattern::Orange,
        "green-flash" => LedPattern::GreenFlash,
        "red-flash" => LedPattern::RedFlash,
        "orange-flash" => LedPattern::OrangeFlash,
        "green-pulse" => LedPattern::GreenPulse,
        "red-pulse" => LedPattern::RedPulse,
        "orange-pulse" => LedPattern::OrangePulse,
        _ => bail!("未知的 LED 图案: {s}"),
    };
    Ok(pattern)
}
