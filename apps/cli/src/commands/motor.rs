//! 电机控制命令
//!
//! 按功率或速度驱动电机，可选按时间或步数（角度）限定。

use super::config::CliConfig;
use super::connection::{ConnectArgs, parse_output_ports};
use anyhow::{Result, bail};
use clap::Args;
use ev3_sdk::prelude::*;

#[derive(Args, Debug)]
pub struct MotorCommand {
    #[command(flatten)]
    pub connect: ConnectArgs,

    /// 输出端口（如 A、BC、all）
    #[arg(short, long, default_value = "A")]
    pub ports: String,

    /// 功率（-100..=100）
    #[arg(long, allow_hyphen_values = true, conflicts_with = "speed")]
    pub power: Option<i8>,

    /// 速度（-100..=100，带速度调节）
    #[arg(long, allow_hyphen_values = true)]
    pub speed: Option<i8>,

    /// 运行时长（毫秒）
    #[arg(long, conflicts_with = "steps")]
    pub time_ms: Option<u32>,

    /// 运行步数（度）
    #[arg(long)]
    pub steps: Option<u32>,

    /// 结束时刹车
    #[arg(long)]
    pub brake: bool,
}

/// 解析后的电机动作
#[derive(Debug, Clone, Copy, PartialEq)]
enum Action {
    Power(i8),
    Speed(i8),
    PowerFor { power: i8, millis: u32 },
    SpeedFor { speed: i8, millis: u32 },
    PowerSteps { power: i8, steps: u32 },
    SpeedSteps { speed: i8, steps: u32 },
}

impl MotorCommand {
    fn action(&self) -> Result<Action> {
        let (value, by_speed) = match (self.power, self.speed) {
            (Some(p), None) => (p, false),
            (None, Some(s)) => (s, true),
            _ => bail!("需要 --power 或 --speed 之一"),
        };
        if !(-100..=100).contains(&value) {
            bail!("功率/速度超出范围: {value}");
        }
        let action = match (self.time_ms, self.steps, by_speed) {
            (None, None, false) => Action::Power(value),
            (None, None, true) => Action::Speed(value),
            (Some(millis), _, false) => Action::PowerFor { power: value, millis },
            (Some(millis), _, true) => Action::SpeedFor { speed: value, millis },
            (None, Some(steps), false) => Action::PowerSteps { power: value, steps },
            (None, Some(steps), true) => Action::SpeedSteps { speed: value, steps },
        };
        Ok(action)
    }

    pub fn execute(&self, config: &CliConfig) -> Result<()> {
        let ports = parse_output_ports(&self.ports)?;
        let action = self.action()?;

        let brick = self.connect.connect(config, false)?;
        println!("⚙️  {} -> {:?}", self.ports, action);
        match action {
            Action::Power(power) => brick.turn_motor_at_power(ports, power)?,
            Action::Speed(speed) => brick.turn_motor_at_speed(ports, speed)?,
            Action::PowerFor { power, millis } => {
                brick.turn_motor_at_power_for_time(ports, power, Ramp::constant(millis), self.brake)?
            },
            Action::SpeedFor { speed, millis } => {
                brick.turn_motor_at_speed_for_time(ports, speed, Ramp::constant(millis), self.brake)?
            },
            Action::PowerSteps { power, steps } => {
                brick.step_motor_at_power(ports, power, Ramp::constant(steps), self.brake)?
            },
            Action::SpeedSteps { speed, steps } => {
                brick.step_motor_at_speed(ports, speed, Ramp::constant(steps), self.brake)?
            },
        }
        brick.disconnect()?;
        Ok(())
    }
}
