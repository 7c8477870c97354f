//! G-code motion driver over a serial port

use crate::config::ArmConfig;
use crate::driver::{EffectorCommand, MotionDriver, MotionRequest};
use crate::error::ArmError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::io::{ErrorKind, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Waits for all buffered moves to finish before the firmware answers
const WAIT_FOR_MOVES: &str = "M400";

/// Stops all steppers at once without losing the firmware state
const QUICK_STOP: &str = "M410";

/// Byte link to the firmware
pub trait PortIo: Read + Write + Send {}

impl<T: Read + Write + Send + ?Sized> PortIo for T {}

type SharedPort = Arc<Mutex<Box<dyn PortIo>>>;

/// Raises the flag when the awaiting future goes away, so the worker
/// stops instead of writing on behalf of a caller that gave up.
struct CancelOnDrop(Arc<AtomicBool>);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Newline-terminated G-code link to the arm firmware.
///
/// Every command is followed by `M400`, so an `ok` reply means the motion
/// has physically finished. One deadline bounds a whole command sequence;
/// when it passes, or the caller stops waiting, the driver sends `M410`.
pub struct SerialDriver {
    port_name: String,
    baudrate: u32,
    read_timeout: Duration,
    reply_timeout: Duration,
    port: Option<SharedPort>,
}

impl SerialDriver {
    pub fn new(port_name: impl Into<String>, baudrate: u32, read_timeout: Duration) -> Self {
        Self {
            port_name: port_name.into(),
            baudrate,
            read_timeout,
            reply_timeout: read_timeout,
            port: None,
        }
    }

    /// Longest time a full command sequence may take, replies included
    pub fn with_reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout = timeout;
        self
    }

    /// Use an already open link instead of opening `port_name`
    pub fn with_port(mut self, port: Box<dyn PortIo>) -> Self {
        self.port = Some(Arc::new(Mutex::new(port)));
        self
    }

    pub fn from_config(config: &ArmConfig) -> Self {
        Self::new(
            config.port.clone(),
            config.baudrate,
            Duration::from_millis(config.command_timeout_ms),
        )
        .with_reply_timeout(config.motion.move_timeout())
    }

    /// Send `lines` and wait for `ok` after each of them
    async fn exchange(&self, lines: Vec<String>) -> Result<(), String> {
        let port = self
            .port
            .clone()
            .ok_or_else(|| "serial port is not open".to_string())?;
        let deadline = Instant::now() + self.reply_timeout;
        let cancel = Arc::new(AtomicBool::new(false));
        let _guard = CancelOnDrop(cancel.clone());

        tokio::task::spawn_blocking(move || -> Result<(), String> {
            let Some(mut port) = port.try_lock_until(deadline) else {
                return Err("serial port busy".to_string());
            };
            send_lines(&mut **port, &lines, deadline, &cancel)
        })
        .await
        .map_err(|e| format!("serial worker failed: {}", e))?
    }
}

/// Write each line and wait for its acknowledgement, all before `deadline`.
///
/// Once anything has been written, any failure (an expired deadline and a
/// raised `cancel` flag included) sends a quick stop before returning.
fn send_lines<P: Read + Write + ?Sized>(
    port: &mut P,
    lines: &[String],
    deadline: Instant,
    cancel: &AtomicBool,
) -> Result<(), String> {
    let mut sent_any = false;
    for line in lines {
        if let Err(e) = send_line(port, line, deadline, cancel, &mut sent_any) {
            if sent_any {
                quick_stop(port);
            }
            return Err(e);
        }
    }
    Ok(())
}

fn send_line<P: Read + Write + ?Sized>(
    port: &mut P,
    line: &str,
    deadline: Instant,
    cancel: &AtomicBool,
    sent_any: &mut bool,
) -> Result<(), String> {
    check_live(deadline, cancel)?;
    debug!("-> {}", line);
    port.write_all(format!("{}\n", line).as_bytes())
        .map_err(|e| format!("write failed: {}", e))?;
    *sent_any = true;
    port.flush().map_err(|e| format!("flush failed: {}", e))?;
    wait_for_ok(port, deadline, cancel)
}

fn check_live(deadline: Instant, cancel: &AtomicBool) -> Result<(), String> {
    if cancel.load(Ordering::SeqCst) {
        return Err("cancelled".to_string());
    }
    if Instant::now() >= deadline {
        return Err("no reply from firmware".to_string());
    }
    Ok(())
}

fn quick_stop<P: Write + ?Sized>(port: &mut P) {
    warn!("Sending {} after an unfinished exchange", QUICK_STOP);
    let sent = port
        .write_all(format!("{}\n", QUICK_STOP).as_bytes())
        .and_then(|_| port.flush());
    if let Err(e) = sent {
        warn!("Quick stop not delivered: {}", e);
    }
}

/// Read reply lines until the firmware acknowledges or reports an error
fn wait_for_ok<P: Read + ?Sized>(port: &mut P, deadline: Instant, cancel: &AtomicBool) -> Result<(), String> {
    let mut line = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        check_live(deadline, cancel)?;
        match port.read(&mut byte) {
            Ok(0) => return Err("serial port closed".to_string()),
            Ok(_) if byte[0] == b'\n' => {
                let reply = String::from_utf8_lossy(&line).trim().to_string();
                line.clear();
                debug!("<- {}", reply);
                if reply.starts_with("ok") {
                    return Ok(());
                }
                if reply.starts_with("error") || reply.starts_with("!!") {
                    return Err(format!("firmware reported '{}'", reply));
                }
                // Status and echo lines are ignored
            }
            Ok(_) => line.push(byte[0]),
            // Long moves outlast the per-read timeout; keep waiting
            Err(e) if e.kind() == ErrorKind::TimedOut => continue,
            Err(e) => return Err(format!("read failed: {}", e)),
        }
    }
}

fn move_line(request: &MotionRequest) -> String {
    let p = &request.pose;
    format!(
        "G0 X{:.2} Y{:.2} Z{:.2} A{:.2} B{:.2} C{:.2} F{:.0}",
        p.x, p.y, p.z, p.rx, p.ry, p.rz, request.speed
    )
}

fn effector_line(value: u32) -> String {
    format!("M3 S{}", value)
}

#[async_trait]
impl MotionDriver for SerialDriver {
    fn name(&self) -> &str {
        "serial"
    }

    async fn open(&mut self) -> Result<(), ArmError> {
        let port_name = self.port_name.clone();
        let baudrate = self.baudrate;
        let timeout = self.read_timeout;

        let port = tokio::task::spawn_blocking(move || {
            serialport::new(port_name.as_str(), baudrate)
                .timeout(timeout)
                .open()
        })
        .await
        .map_err(|e| ArmError::Connection(format!("serial worker failed: {}", e)))?
        .map_err(|e| ArmError::Connection(format!("cannot open {}: {}", self.port_name, e)))?;

        info!("Opened serial port {} at {} baud", self.port_name, baudrate);
        let port: Box<dyn PortIo> = Box::new(port);
        self.port = Some(Arc::new(Mutex::new(port)));
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ArmError> {
        if self.port.take().is_some() {
            info!("Closed serial port {}", self.port_name);
        }
        Ok(())
    }

    async fn move_to_pose(&mut self, request: &MotionRequest) -> Result<(), ArmError> {
        self.exchange(vec![move_line(request), WAIT_FOR_MOVES.to_string()])
            .await
            .map_err(|e| ArmError::MotionFault(format!("move to {}: {}", request.waypoint, e)))
    }

    async fn set_effector(&mut self, command: EffectorCommand, value: u32) -> Result<(), ArmError> {
        self.exchange(vec![effector_line(value), WAIT_FOR_MOVES.to_string()])
            .await
            .map_err(|e| ArmError::ActuatorFault(format!("effector {}: {}", command, e)))
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }
}
