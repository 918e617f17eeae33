//! Backlog-driven bitrate and frame-skip controller

use std::time::Instant;

use super::settings::ControllerSettings;
use crate::data::DataMap;
use crate::status::{
    BroadcastEvent, BroadcastState, Status, BACKLOG_KEY, NEW_BITRATE_KEY, PREVIOUS_BITRATE_KEY,
};

/// What to do with the next captured frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameDecision {
    /// Encode and send
    Deliver,
    /// Discard as part of the skip pattern
    Skip,
    /// Discard because delivery is paused
    Drop,
}

/// A change produced by one backlog observation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerEvent {
    LowBandwidth { backlog: usize },
    BitrateReduced { previous: u32, new: u32 },
    BitrateIncreased { previous: u32, new: u32 },
    EncoderPaused,
    EncoderResumed,
}

impl ControllerEvent {
    /// Status event this maps to
    pub fn broadcast_event(&self) -> BroadcastEvent {
        match self {
            ControllerEvent::LowBandwidth { .. } => BroadcastEvent::LowBandwidth,
            ControllerEvent::BitrateReduced { .. } => BroadcastEvent::BitrateReduced,
            ControllerEvent::BitrateIncreased { .. } => BroadcastEvent::BitrateIncreased,
            ControllerEvent::EncoderPaused => BroadcastEvent::EncoderPaused,
            ControllerEvent::EncoderResumed => BroadcastEvent::EncoderResumed,
        }
    }

    /// Auxiliary data carried with the event
    pub fn data(&self) -> Option<DataMap> {
        match *self {
            ControllerEvent::LowBandwidth { backlog } => {
                let mut data = DataMap::new();
                data.set_integer(BACKLOG_KEY, backlog as i64);
                Some(data)
            }
            ControllerEvent::BitrateReduced { previous, new }
            | ControllerEvent::BitrateIncreased { previous, new } => {
                let mut data = DataMap::new();
                data.set_integer(PREVIOUS_BITRATE_KEY, previous as i64);
                data.set_integer(NEW_BITRATE_KEY, new as i64);
                Some(data)
            }
            ControllerEvent::EncoderPaused | ControllerEvent::EncoderResumed => None,
        }
    }

    /// Status reporting this event in the given state
    pub fn to_status(&self, state: BroadcastState) -> Status {
        let status = Status::with_state_and_event(state, self.broadcast_event());
        match self.data() {
            Some(data) => status.data(data),
            None => status,
        }
    }
}

/// Adaptive bitrate controller for one encoder
///
/// Not internally synchronized; the owning encoder holds it behind a lock.
#[derive(Debug)]
pub struct AdaptiveBitrateController {
    settings: ControllerSettings,
    current_bitrate: u32,
    /// Active skip count (<= 1 = deliver every frame)
    skip_count: u32,
    throttled: bool,
    paused: bool,
    /// Backlog was at/over the threshold at the previous observation
    over_threshold: bool,
    /// When the backlog last dropped (or the last recovery step happened)
    below_since: Option<Instant>,
    frame_counter: u64,
    last_backlog: usize,
}

impl AdaptiveBitrateController {
    pub fn new(settings: ControllerSettings) -> Self {
        let current_bitrate = settings.target_bitrate;
        Self {
            settings,
            current_bitrate,
            skip_count: 0,
            throttled: false,
            paused: false,
            over_threshold: false,
            below_since: None,
            frame_counter: 0,
            last_backlog: 0,
        }
    }

    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    /// Bitrate the encoder should currently use
    pub fn current_bitrate(&self) -> u32 {
        self.current_bitrate
    }

    /// Skip count currently applied
    pub fn skip_count(&self) -> u32 {
        self.skip_count
    }

    pub fn is_throttled(&self) -> bool {
        self.throttled
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn last_backlog(&self) -> usize {
        self.last_backlog
    }

    /// Return to the unthrottled state at the target bitrate
    pub fn reset(&mut self) {
        *self = Self::new(self.settings.clone());
    }

    /// Feed one backlog sample and return the resulting events in order
    pub fn observe(&mut self, backlog: usize, now: Instant) -> Vec<ControllerEvent> {
        self.last_backlog = backlog;
        let mut events = Vec::new();

        if backlog >= self.settings.backlog_threshold {
            self.below_since = None;

            if !self.over_threshold {
                self.over_threshold = true;
                events.push(ControllerEvent::LowBandwidth { backlog });
            }

            if self.current_bitrate > self.settings.reduced_bitrate {
                let previous = self.current_bitrate;
                self.current_bitrate = self.settings.reduced_bitrate;
                events.push(ControllerEvent::BitrateReduced {
                    previous,
                    new: self.current_bitrate,
                });
            }

            if !self.throttled || self.skip_count < self.settings.skip_count {
                self.frame_counter = 0;
            }
            self.throttled = true;
            self.skip_count = self.settings.skip_count;

            if backlog >= self.settings.pause_threshold && !self.paused {
                self.paused = true;
                events.push(ControllerEvent::EncoderPaused);
            }
            return events;
        }

        self.over_threshold = false;
        if !self.throttled && !self.paused {
            return events;
        }

        let since = *self.below_since.get_or_insert(now);
        if now.duration_since(since) < self.settings.recovery_window {
            return events;
        }
        self.below_since = Some(now);

        if self.paused {
            self.paused = false;
            events.push(ControllerEvent::EncoderResumed);
            return events;
        }

        if self.current_bitrate < self.settings.target_bitrate {
            let previous = self.current_bitrate;
            self.current_bitrate = previous
                .saturating_add(self.settings.recovery_step)
                .min(self.settings.target_bitrate);
            events.push(ControllerEvent::BitrateIncreased {
                previous,
                new: self.current_bitrate,
            });
        }

        if self.skip_count > 1 {
            self.skip_count -= 1;
            self.frame_counter = 0;
        }

        if self.current_bitrate >= self.settings.target_bitrate && self.skip_count <= 1 {
            self.throttled = false;
            self.below_since = None;
        }

        events
    }

    /// Decide the fate of the next captured frame
    pub fn admit_frame(&mut self) -> FrameDecision {
        if self.paused {
            return FrameDecision::Drop;
        }
        if self.skip_count <= 1 {
            return FrameDecision::Deliver;
        }

        let position = self.frame_counter % self.skip_count as u64;
        self.frame_counter = self.frame_counter.wrapping_add(1);
        if position == 0 {
            FrameDecision::Deliver
        } else {
            FrameDecision::Skip
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::MediaConfig;

    const WINDOW: Duration = Duration::from_secs(2);

    fn controller(bitrate: u32, factor: f32) -> AdaptiveBitrateController {
        let config = MediaConfig::default()
            .bitrate(bitrate)
            .frame_rate(30)
            .frame_buffer_size_multiplier(4)
            .low_bandwidth_scaling_factor(factor);
        AdaptiveBitrateController::new(ControllerSettings::from_media_config(&config))
    }

    #[test]
    fn test_idle_below_threshold() {
        let mut abr = controller(1_000_000, 0.5);
        let now = Instant::now();

        assert!(abr.observe(0, now).is_empty());
        assert!(abr.observe(119, now + WINDOW * 3).is_empty());
        assert!(!abr.is_throttled());
        assert_eq!(abr.admit_frame(), FrameDecision::Deliver);
    }

    #[test]
    fn test_throttle_on_threshold() {
        let mut abr = controller(1_000_000, 0.5);
        let now = Instant::now();

        let events = abr.observe(120, now);
        assert_eq!(
            events,
            vec![
                ControllerEvent::LowBandwidth { backlog: 120 },
                ControllerEvent::BitrateReduced {
                    previous: 1_000_000,
                    new: 500_000
                },
            ]
        );
        assert!(abr.is_throttled());
        assert_eq!(abr.current_bitrate(), 500_000);
        assert_eq!(abr.skip_count(), 2);

        // Still high: no repeated low-bandwidth or reduction events
        assert!(abr.observe(130, now + Duration::from_millis(100)).is_empty());
    }

    #[test]
    fn test_skip_pattern() {
        let mut abr = controller(1_000_000, 0.5);
        abr.observe(120, Instant::now());

        let decisions: Vec<_> = (0..6).map(|_| abr.admit_frame()).collect();
        assert_eq!(
            decisions,
            vec![
                FrameDecision::Deliver,
                FrameDecision::Skip,
                FrameDecision::Deliver,
                FrameDecision::Skip,
                FrameDecision::Deliver,
                FrameDecision::Skip,
            ]
        );
    }

    #[test]
    fn test_pause_and_resume() {
        let mut abr = controller(1_000_000, 0.5);
        let start = Instant::now();

        let events = abr.observe(240, start);
        assert_eq!(events.last(), Some(&ControllerEvent::EncoderPaused));
        assert!(abr.is_paused());
        assert_eq!(abr.admit_frame(), FrameDecision::Drop);

        // Draining but still above threshold keeps the pause
        assert!(abr.observe(150, start + WINDOW).is_empty());
        assert!(abr.is_paused());

        // Below threshold, window not yet elapsed
        let low = start + WINDOW * 2;
        assert!(abr.observe(10, low).is_empty());
        assert!(abr.is_paused());

        let events = abr.observe(10, low + WINDOW);
        assert_eq!(events, vec![ControllerEvent::EncoderResumed]);
        assert!(!abr.is_paused());
        assert_eq!(abr.admit_frame(), FrameDecision::Deliver);
    }

    #[test]
    fn test_pause_when_backlog_keeps_growing_while_skipping() {
        let mut abr = controller(1_000_000, 0.5);
        let start = Instant::now();

        assert_eq!(abr.observe(120, start).len(), 2);
        assert_eq!(abr.admit_frame(), FrameDecision::Deliver);
        assert_eq!(abr.admit_frame(), FrameDecision::Skip);
        assert!(!abr.is_paused());

        // Under the ceiling the skip pattern alone carries on
        assert!(abr.observe(200, start + Duration::from_millis(100)).is_empty());
        assert!(!abr.is_paused());

        // Past the ceiling: pause only, no repeated warning or second reduction
        let events = abr.observe(250, start + Duration::from_millis(200));
        assert_eq!(events, vec![ControllerEvent::EncoderPaused]);
        assert!(abr.is_paused());
        assert_eq!(abr.current_bitrate(), 500_000);
        assert_eq!(abr.skip_count(), 2);
        assert_eq!(abr.admit_frame(), FrameDecision::Drop);

        assert!(abr.observe(300, start + Duration::from_millis(300)).is_empty());
    }

    #[test]
    fn test_recovery_steps_back_to_target() {
        let mut abr = controller(1_000_000, 0.5);
        let mut now = Instant::now();
        abr.observe(120, now);

        now += Duration::from_millis(10);
        assert!(abr.observe(0, now).is_empty());

        let mut increases = Vec::new();
        for _ in 0..20 {
            now += WINDOW;
            for event in abr.observe(0, now) {
                if let ControllerEvent::BitrateIncreased { previous, new } = event {
                    assert!(new > previous);
                    assert_eq!(new - previous, 100_000);
                    increases.push(new);
                }
            }
        }

        assert_eq!(increases.len(), 5);
        assert_eq!(increases.last(), Some(&1_000_000));
        assert_eq!(abr.current_bitrate(), 1_000_000);
        assert!(!abr.is_throttled());
        assert!(abr.skip_count() <= 1);
        assert_eq!(abr.admit_frame(), FrameDecision::Deliver);
    }

    #[test]
    fn test_skip_relaxes_during_recovery() {
        let config = MediaConfig::default()
            .bitrate(1_000_000)
            .key_frame_interval(60)
            .low_bandwidth_skip_count(4);
        let mut abr = AdaptiveBitrateController::new(ControllerSettings::from_media_config(&config));
        let mut now = Instant::now();
        abr.observe(200, now);
        assert_eq!(abr.skip_count(), 4);

        now += Duration::from_millis(1);
        abr.observe(0, now);
        let mut skips = Vec::new();
        for _ in 0..3 {
            now += WINDOW;
            abr.observe(0, now);
            skips.push(abr.skip_count());
        }
        assert_eq!(skips, vec![3, 2, 1]);
    }

    #[test]
    fn test_backlog_spike_during_recovery_resets_window() {
        let mut abr = controller(1_000_000, 0.5);
        let start = Instant::now();
        abr.observe(120, start);
        abr.observe(0, start + Duration::from_millis(1));

        // Spike before the window elapses
        abr.observe(125, start + WINDOW / 2);
        assert!(abr.observe(0, start + WINDOW + Duration::from_millis(1)).is_empty());
        assert_eq!(abr.current_bitrate(), 500_000);
    }

    #[test]
    fn test_rethrottle_after_partial_recovery() {
        let mut abr = controller(1_000_000, 0.5);
        let mut now = Instant::now();
        abr.observe(120, now);
        now += Duration::from_millis(1);
        abr.observe(0, now);
        now += WINDOW;
        abr.observe(0, now);
        assert_eq!(abr.current_bitrate(), 600_000);

        let events = abr.observe(121, now + Duration::from_millis(1));
        assert_eq!(
            events,
            vec![
                ControllerEvent::LowBandwidth { backlog: 121 },
                ControllerEvent::BitrateReduced {
                    previous: 600_000,
                    new: 500_000
                },
            ]
        );
    }

    #[test]
    fn test_factor_one_throttles_frames_only() {
        let mut abr = controller(1_000_000, 1.0);
        let events = abr.observe(120, Instant::now());
        assert_eq!(events, vec![ControllerEvent::LowBandwidth { backlog: 120 }]);
        assert!(abr.is_throttled());
        assert_eq!(abr.current_bitrate(), 1_000_000);
    }

    #[test]
    fn test_bitrate_bounds_hold_for_any_factor() {
        for bitrate in [1u32, 7, 999, 64_000, 1_000_000, 3_750_000, u32::MAX / 2] {
            for step in 0..=20 {
                let factor = step as f32 / 20.0;
                let mut abr = controller(bitrate, factor);
                let floor = bitrate as f64 * factor as f64;
                let mut now = Instant::now();

                for round in 0..6 {
                    let backlog = if round % 2 == 0 { 500 } else { 0 };
                    for _ in 0..8 {
                        now += WINDOW;
                        for event in abr.observe(backlog, now) {
                            match event {
                                ControllerEvent::BitrateReduced { new, .. } => {
                                    assert!(new as f64 >= floor, "{} < {} x {}", new, bitrate, factor);
                                }
                                ControllerEvent::BitrateIncreased { new, .. } => {
                                    assert!(new <= bitrate);
                                }
                                _ => {}
                            }
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_event_status_data() {
        let status = ControllerEvent::BitrateReduced {
            previous: 2_000_000,
            new: 1_500_000,
        }
        .to_status(BroadcastState::Running);
        assert_eq!(status.event, BroadcastEvent::BitrateReduced);
        assert_eq!(status.previous_bitrate(), Some(2_000_000));
        assert_eq!(status.new_bitrate(), Some(1_500_000));
        assert!(!status.has_error());

        let status = ControllerEvent::EncoderPaused.to_status(BroadcastState::Running);
        assert_eq!(status.event, BroadcastEvent::EncoderPaused);
        assert!(status.data.is_none());
    }

    #[test]
    fn test_reset() {
        let mut abr = controller(1_000_000, 0.5);
        abr.observe(500, Instant::now());
        abr.reset();
        assert!(!abr.is_throttled());
        assert!(!abr.is_paused());
        assert_eq!(abr.current_bitrate(), 1_000_000);
    }
}
