//! 模拟主控
//!
//! 基于 `MockTransport` 的应答函数：解析写出的帧，像真实主控一样回复。
//! - 直接指令：全局缓冲区为 94 字节时按轮询布局填充端口和按键，否则返回 `memory`
//! - 系统指令：BeginDownload / ContinueDownload / CreateDirectory / DeleteFile

#![allow(dead_code)]

use ev3_sdk::transport::{MockHandle, MockTransport};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const POLL_GLOBAL_SIZE: usize = 94;
pub const HANDLE: u8 = 3;

#[derive(Debug, Clone, Copy, Default)]
pub struct SimPort {
    pub device_type: u8,
    pub mode: u8,
    pub si: f32,
    pub raw: i32,
    pub percent: u8,
}

#[derive(Debug, Default)]
pub struct SimState {
    /// 按轮询缓冲区顺序
    pub ports: [SimPort; 8],
    /// Back, Left, Up, Right, Down, Enter
    pub buttons: [bool; 6],
    /// 非轮询直接指令的回复负载
    pub memory: Vec<u8>,
    /// 不回复任何帧
    pub silent: bool,
    pub begin_status: u8,
    pub continue_status: u8,
    /// ContinueDownload 收到的数据（按块）
    pub chunks: Vec<Vec<u8>>,
    pub directories: Vec<String>,
    pub polls: usize,
}

#[derive(Clone, Default)]
pub struct SimulatedBrick {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedBrick {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut SimState) -> R) -> R {
        f(&mut self.state.lock())
    }

    pub fn transport(&self) -> (MockTransport, MockHandle) {
        let state = self.state.clone();
        let transport = MockTransport::new(move |frame: &[u8]| respond(&mut state.lock(), frame));
        let handle = transport.handle();
        (transport, handle)
    }
}

fn respond(state: &mut SimState, frame: &[u8]) -> Option<Vec<u8>> {
    if state.silent || frame.len() < 3 {
        return None;
    }
    let mut reply = frame[..2].to_vec();
    match frame[2] {
        // DirectReply
        0x00 => {
            let global = (u16::from_le_bytes([frame[3], frame[4]]) & 0x03FF) as usize;
            reply.push(0x02);
            if global == POLL_GLOBAL_SIZE {
                state.polls += 1;
                reply.extend_from_slice(&poll_payload(state));
            } else {
                let mut payload = state.memory.clone();
                payload.resize(global, 0);
                reply.extend_from_slice(&payload);
            }
        },
        // SystemReply
        0x01 => {
            let opcode = frame[3];
            let (status, extra) = match opcode {
                0x92 => (state.begin_status, vec![HANDLE]),
                0x93 => {
                    state.chunks.push(frame[5..].to_vec());
                    (state.continue_status, Vec::new())
                },
                0x9B => {
                    let path = String::from_utf8_lossy(&frame[4..frame.len() - 1]).into_owned();
                    state.directories.push(path);
                    (0x00, Vec::new())
                },
                _ => (0x00, Vec::new()),
            };
            reply.push(if status == 0 { 0x03 } else { 0x05 });
            reply.push(opcode);
            reply.push(status);
            reply.extend_from_slice(&extra);
        },
        _ => return None,
    }
    Some(reply)
}

fn poll_payload(state: &SimState) -> Vec<u8> {
    let mut payload = Vec::with_capacity(POLL_GLOBAL_SIZE);
    for port in &state.ports {
        payload.push(port.device_type);
        payload.push(port.mode);
        payload.extend_from_slice(&port.si.to_le_bytes());
        payload.extend_from_slice(&port.raw.to_le_bytes());
        payload.push(port.percent);
    }
    payload.extend(state.buttons.iter().map(|&pressed| pressed as u8));
    payload
}

/// 直接回复报告
pub fn direct_report(sequence: u16, payload: &[u8]) -> Vec<u8> {
    let mut report = sequence.to_le_bytes().to_vec();
    report.push(0x02);
    report.extend_from_slice(payload);
    report
}

/// 轮询直到条件成立或超时
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    condition()
}
