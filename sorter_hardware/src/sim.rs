//! Simulated plant.
//!
//! One shared model of the cell answers the controller through three handles:
//! a [`SimTransport`] that reacts to command lines with telemetry, and a
//! [`SimCamera`]/[`SimDetector`] pair that reports the staged object while
//! pusher 1 drives it under the camera.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use sorter_traits::{
    BoxError, Camera, Clock, DetectedObject, DetectionService, Frame, Shape, Transport,
};

/// Beam 2 is broken this long after conveyor 1 starts with an object queued.
const BEAM_BREAK_AFTER: Duration = Duration::from_millis(300);
/// ...and clears again this long after it started.
const BEAM_CLEAR_AFTER: Duration = Duration::from_millis(600);
/// A reversing pusher reaches its home switch after this long.
const HOME_SWITCH_AFTER: Duration = Duration::from_millis(200);
/// Height sensor reporting period.
const HEIGHT_PERIOD: Duration = Duration::from_millis(100);
/// Where a freshly loaded object sits in the frame.
const START_Y_PX: f32 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimObject {
    pub length_mm: f32,
    pub width_mm: f32,
    pub height_mm: f32,
    pub shape: Shape,
    pub angle_deg: f32,
}

#[derive(Debug, Clone)]
pub struct SimConfig {
    pub conveyor1_servo: u8,
    pub pusher1_servo: u8,
    pub pusher2_servo: u8,
    pub height_scale: f32,
    pub height_offset: f32,
    pub frame_width_px: u32,
    pub frame_height_px: u32,
    /// Image-space speed of an object driven by pusher 1.
    pub push_px_per_ms: f32,
    pub objects: Vec<SimObject>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            conveyor1_servo: 0,
            pusher1_servo: 2,
            pusher2_servo: 6,
            height_scale: -1.305,
            height_offset: 382.4,
            frame_width_px: 1440,
            frame_height_px: 1080,
            push_px_per_ms: 1.0,
            objects: Vec::new(),
        }
    }
}

enum SimEvent {
    Line(String),
    Arrive(SimObject),
}

#[derive(Default)]
struct PlantState {
    queue: VecDeque<SimObject>,
    current: Option<SimObject>,
    loading: bool,
    /// Active pusher 1 stroke: start and drive time.
    push: Option<(Instant, Duration)>,
    y_px: f32,
    pending: Vec<(Instant, SimEvent)>,
    last_height_at: Option<Instant>,
    sent: Vec<String>,
    delivered: usize,
}

/// Shared simulated cell.
#[derive(Clone)]
pub struct SimPlant {
    cfg: Arc<SimConfig>,
    state: Arc<Mutex<PlantState>>,
    clock: Arc<dyn Clock + Send + Sync>,
}

impl SimPlant {
    pub fn new(cfg: SimConfig, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        let state = PlantState {
            queue: cfg.objects.iter().copied().collect(),
            y_px: START_Y_PX,
            ..PlantState::default()
        };
        Self {
            cfg: Arc::new(cfg),
            state: Arc::new(Mutex::new(state)),
            clock,
        }
    }

    pub fn transport(&self) -> SimTransport {
        SimTransport {
            plant: self.clone(),
        }
    }

    pub fn camera(&self) -> SimCamera {
        SimCamera {
            width: self.cfg.frame_width_px,
            height: self.cfg.frame_height_px,
        }
    }

    pub fn detector(&self) -> SimDetector {
        SimDetector {
            plant: self.clone(),
        }
    }

    /// Every command line received so far.
    pub fn sent_lines(&self) -> Vec<String> {
        self.lock().sent.clone()
    }

    /// Objects still waiting on conveyor 1.
    pub fn remaining(&self) -> usize {
        self.lock().queue.len()
    }

    /// Objects pushed off the second table by pusher 2.
    pub fn delivered(&self) -> usize {
        self.lock().delivered
    }

    fn lock(&self) -> MutexGuard<'_, PlantState> {
        // A poisoned plant only happens after a panicking test thread; keep serving.
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn current_y(st: &PlantState, cfg: &SimConfig, now: Instant) -> f32 {
        match st.push {
            Some((start, drive)) => {
                let ms = now.saturating_duration_since(start).min(drive).as_millis() as f32;
                st.y_px + ms * cfg.push_px_per_ms
            }
            None => st.y_px,
        }
    }

    fn handle_command(&self, line: &str) {
        let now = self.clock.now();
        let cfg = &self.cfg;
        let mut st = self.lock();
        st.sent.push(line.to_string());

        let parts: Vec<&str> = line.split_whitespace().collect();
        let ["SET", servo, dir, rest @ ..] = parts.as_slice() else {
            return;
        };
        let Ok(servo) = servo.parse::<u8>() else {
            return;
        };

        if servo == cfg.conveyor1_servo && *dir == "FWD" {
            if st.loading {
                return;
            }
            if st.current.take().is_some() {
                st.delivered += 1;
            }
            if let Some(obj) = st.queue.pop_front() {
                st.loading = true;
                st.push = None;
                st.y_px = START_Y_PX;
                st.pending
                    .push((now + BEAM_BREAK_AFTER, SimEvent::Line("b21".into())));
                st.pending
                    .push((now + BEAM_CLEAR_AFTER, SimEvent::Line("b20".into())));
                st.pending.push((now + BEAM_CLEAR_AFTER, SimEvent::Arrive(obj)));
            }
        } else if servo == cfg.pusher1_servo {
            if *dir == "FWD" {
                let drive_ms = rest.first().and_then(|s| s.parse::<u64>().ok()).unwrap_or(0);
                st.y_px = Self::current_y(&st, cfg, now);
                st.push = Some((now, Duration::from_millis(drive_ms)));
                st.pending.push((now, SimEvent::Line("GO2".into())));
            } else {
                st.y_px = Self::current_y(&st, cfg, now);
                st.push = None;
                st.pending
                    .push((now + HOME_SWITCH_AFTER, SimEvent::Line("STOP2".into())));
            }
        } else if servo == cfg.pusher2_servo {
            if *dir == "FWD" {
                st.pending.push((now, SimEvent::Line("GO6".into())));
            } else {
                st.pending
                    .push((now + HOME_SWITCH_AFTER, SimEvent::Line("STOP6".into())));
            }
        }
    }

    fn drain(&self) -> Vec<String> {
        let now = self.clock.now();
        let cfg = &self.cfg;
        let mut st = self.lock();

        let mut due: Vec<(Instant, SimEvent)> = Vec::new();
        let mut keep = Vec::with_capacity(st.pending.len());
        for (at, ev) in st.pending.drain(..) {
            if at <= now {
                due.push((at, ev));
            } else {
                keep.push((at, ev));
            }
        }
        st.pending = keep;
        due.sort_by_key(|(at, _)| *at);

        let mut lines = Vec::new();
        for (_, ev) in due {
            match ev {
                SimEvent::Line(l) => lines.push(l),
                SimEvent::Arrive(obj) => {
                    st.current = Some(obj);
                    st.loading = false;
                }
            }
        }

        let height_due = st
            .last_height_at
            .is_none_or(|t| now.saturating_duration_since(t) >= HEIGHT_PERIOD);
        if height_due {
            st.last_height_at = Some(now);
            let h = st.current.map(|o| o.height_mm).unwrap_or(0.0);
            let raw = ((h - cfg.height_offset) / cfg.height_scale).round() as i32;
            lines.push(format!("HT {raw}"));
        }
        lines
    }

    fn observe(&self) -> Option<DetectedObject> {
        let now = self.clock.now();
        let st = self.lock();
        let obj = st.current?;
        Some(DetectedObject {
            length_mm: obj.length_mm,
            width_mm: obj.width_mm,
            height_mm: 0.0,
            shape: obj.shape,
            center_x: self.cfg.frame_width_px as f32 / 2.0,
            center_y: Self::current_y(&st, &self.cfg, now),
            angle_deg: DetectedObject::normalize_angle(obj.angle_deg),
        })
    }
}

/// Telemetry/command side of the plant.
pub struct SimTransport {
    plant: SimPlant,
}

impl Transport for SimTransport {
    fn send(&mut self, line: &str) -> Result<(), BoxError> {
        tracing::trace!(line, "sim <- command");
        self.plant.handle_command(line.trim());
        Ok(())
    }

    fn poll_lines(&mut self) -> Result<Vec<String>, BoxError> {
        Ok(self.plant.drain())
    }
}

/// Produces empty frames of the configured size.
pub struct SimCamera {
    width: u32,
    height: u32,
}

impl Camera for SimCamera {
    fn capture(&mut self, _timeout: Duration) -> Result<Frame, BoxError> {
        Ok(Frame {
            width: self.width,
            height: self.height,
            pixels: Vec::new(),
        })
    }
}

/// Reads the staged object straight from the plant model.
pub struct SimDetector {
    plant: SimPlant,
}

impl DetectionService for SimDetector {
    fn detect(&mut self, _frame: &Frame) -> Option<DetectedObject> {
        self.plant.observe()
    }
}
