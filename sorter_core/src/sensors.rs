use crate::height::HeightBuffer;
use crate::protocol::TelemetryEvent;

/// Latest known state of every discrete sensor plus the fused height.
///
/// `None` means nothing has been reported yet; guards treat it as "not satisfied".
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SensorState {
    pub beam1_broken: Option<bool>,
    pub beam2_broken: Option<bool>,
    pub limit1_pressed: Option<bool>,
    pub limit2_pressed: Option<bool>,
    pub height_mm: Option<f32>,
}

impl SensorState {
    pub fn apply(&mut self, ev: TelemetryEvent, height: &mut HeightBuffer) {
        match ev {
            TelemetryEvent::Beam1 { broken } => self.beam1_broken = Some(broken),
            TelemetryEvent::Beam2 { broken } => self.beam2_broken = Some(broken),
            TelemetryEvent::Limit1 { pressed } => self.limit1_pressed = Some(pressed),
            TelemetryEvent::Limit2 { pressed } => self.limit2_pressed = Some(pressed),
            TelemetryEvent::Height { raw } => {
                if let Some(avg) = height.update(raw) {
                    self.height_mm = Some(avg);
                }
            }
        }
    }

    pub fn beam2_is_broken(&self) -> bool {
        self.beam2_broken == Some(true)
    }

    pub fn beam2_is_clear(&self) -> bool {
        self.beam2_broken == Some(false)
    }

    pub fn limit1_is_pressed(&self) -> bool {
        self.limit1_pressed == Some(true)
    }

    pub fn limit2_is_pressed(&self) -> bool {
        self.limit2_pressed == Some(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HeightCfg;
    use crate::protocol::parse_line;

    #[test]
    fn unknown_until_reported() {
        let s = SensorState::default();
        assert!(!s.beam2_is_broken());
        assert!(!s.beam2_is_clear());
        assert!(!s.limit1_is_pressed());
        assert_eq!(s.height_mm, None);
    }

    #[test]
    fn height_only_updates_once_a_sample_is_admitted() {
        let mut hb = HeightBuffer::new(HeightCfg::default());
        let mut s = SensorState::default();
        s.apply(parse_line("HT 120").unwrap(), &mut hb);
        assert_eq!(s.height_mm, None);
        s.apply(parse_line("HT 280").unwrap(), &mut hb);
        assert!(s.height_mm.is_some());
    }

    #[test]
    fn events_overwrite_previous_state() {
        let mut hb = HeightBuffer::new(HeightCfg::default());
        let mut s = SensorState::default();
        for l in ["b21", "STOP2", "b20", "GO2", "STOP6"] {
            s.apply(parse_line(l).unwrap(), &mut hb);
        }
        assert!(s.beam2_is_clear());
        assert_eq!(s.limit1_pressed, Some(false));
        assert!(s.limit2_is_pressed());
        assert_eq!(s.beam1_broken, None);
    }
}
