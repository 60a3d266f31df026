//! Frame-quantised progress generator.
//!
//! A timeline maps elapsed time onto `0..=n_frames` frames at a fixed rate.
//! It does not run by itself: the scheduler calls [`Timeline::advance`] on
//! each tick and gets a frame back only when the frame number has moved.
//! Frames can be skipped when ticks are late, but the final frame is always
//! delivered exactly once.

use std::time::Duration;

use crate::common::constants::TIMELINE_FPS;

/// One step of a timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub index: u32,
    pub total: u32,
}

impl Frame {
    pub fn new(index: u32, total: u32) -> Self {
        Self { index, total }
    }

    /// Linear progress in `[0, 1]`.
    pub fn progress(&self) -> f32 {
        if self.total == 0 {
            1.0
        } else {
            self.index as f32 / self.total as f32
        }
    }

    pub fn is_last(&self) -> bool {
        self.index >= self.total
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Timeline {
    duration: Duration,
    n_frames: u32,
    started_at: Option<Duration>,
    last_frame: u32,
    finished: bool,
}

impl Timeline {
    /// A stopped timeline lasting `duration_ms` milliseconds. Negative lengths count as zero.
    pub fn new(duration_ms: i64) -> Self {
        let ms = duration_ms.max(0) as u64;
        let n_frames = (ms as f64 * f64::from(TIMELINE_FPS) / 1000.0)
            .round()
            .clamp(1.0, f64::from(u32::MAX)) as u32;
        Self {
            duration: Duration::from_millis(ms),
            n_frames,
            started_at: None,
            last_frame: 0,
            finished: false,
        }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn n_frames(&self) -> u32 {
        self.n_frames
    }

    pub fn start(&mut self, now: Duration) {
        self.started_at = Some(now);
        self.last_frame = 0;
        self.finished = false;
    }

    pub fn is_running(&self) -> bool {
        self.started_at.is_some() && !self.finished
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Last frame delivered.
    pub fn current_frame(&self) -> Frame {
        Frame::new(self.last_frame, self.n_frames)
    }

    /// Frame the timeline should be showing at `now`, clamped to the last frame.
    pub fn frame_at(&self, now: Duration) -> u32 {
        let Some(started_at) = self.started_at else {
            return 0;
        };
        if self.duration.is_zero() {
            return self.n_frames;
        }
        let elapsed = now.saturating_sub(started_at).as_secs_f64();
        let frame = (elapsed / self.duration.as_secs_f64() * self.n_frames as f64).floor();
        (frame as u32).min(self.n_frames)
    }

    /// Move to the frame due at `now`. Returns it only if it differs from the
    /// last delivered frame.
    pub fn advance(&mut self, now: Duration) -> Option<Frame> {
        if !self.is_running() {
            return None;
        }
        let frame = self.frame_at(now);
        if frame <= self.last_frame {
            return None;
        }
        self.last_frame = frame;
        if frame >= self.n_frames {
            self.finished = true;
        }
        Some(Frame::new(frame, self.n_frames))
    }

    /// Jump straight to the final frame.
    pub fn stop(&mut self) -> Frame {
        self.last_frame = self.n_frames;
        self.finished = true;
        Frame::new(self.n_frames, self.n_frames)
    }

    /// When the next frame becomes due, if the timeline is running.
    pub fn next_frame_due(&self) -> Option<Duration> {
        let started_at = self.started_at?;
        if self.finished {
            return None;
        }
        let next = f64::from(self.last_frame + 1) / f64::from(self.n_frames);
        Some(started_at.saturating_add(self.duration.mul_f64(next)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn test_frame_count_follows_duration() {
        assert_eq!(Timeline::new(250).n_frames(), 15);
        assert_eq!(Timeline::new(1000).n_frames(), 60);
        // Never fewer than one frame
        assert_eq!(Timeline::new(0).n_frames(), 1);
        assert_eq!(Timeline::new(-50).n_frames(), 1);
    }

    #[test]
    fn test_advance_only_reports_new_frames() {
        let mut timeline = Timeline::new(1000);
        assert_eq!(timeline.advance(ms(10)), None);

        timeline.start(ms(0));
        assert_eq!(timeline.advance(ms(5)), None);
        assert_eq!(timeline.advance(ms(17)), Some(Frame::new(1, 60)));
        assert_eq!(timeline.advance(ms(18)), None);
        assert_eq!(timeline.advance(ms(500)), Some(Frame::new(30, 60)));
    }

    #[test]
    fn test_final_frame_delivered_once() {
        let mut timeline = Timeline::new(100);
        timeline.start(ms(0));

        let last = timeline.advance(ms(5000)).unwrap();
        assert!(last.is_last());
        assert_eq!(last.progress(), 1.0);
        assert!(timeline.is_finished());
        assert_eq!(timeline.advance(ms(6000)), None);
    }

    #[test]
    fn test_stop_jumps_to_end() {
        let mut timeline = Timeline::new(300);
        timeline.start(ms(0));
        timeline.advance(ms(50));

        let frame = timeline.stop();
        assert_eq!(frame, Frame::new(18, 18));
        assert!(!timeline.is_running());
        assert_eq!(timeline.next_frame_due(), None);
    }

    #[test]
    fn test_next_frame_due() {
        let mut timeline = Timeline::new(1000);
        assert_eq!(timeline.next_frame_due(), None);

        timeline.start(ms(100));
        let due = timeline.next_frame_due().unwrap();
        assert!(due > ms(116) && due < ms(118));
    }

    #[test]
    fn test_huge_duration_does_not_overflow() {
        let mut timeline = Timeline::new(i64::MAX);
        assert_eq!(timeline.n_frames(), u32::MAX);
        assert_eq!(timeline.duration(), Duration::from_millis(i64::MAX as u64));

        timeline.start(ms(0));
        assert_eq!(timeline.advance(ms(1000)), None);
        assert!(timeline.next_frame_due().is_some());
        assert_eq!(timeline.stop(), Frame::new(u32::MAX, u32::MAX));
    }

    #[test]
    fn test_zero_length_finishes_on_first_advance() {
        let mut timeline = Timeline::new(0);
        timeline.start(ms(40));
        assert_eq!(timeline.advance(ms(40)), Some(Frame::new(1, 1)));
    }
}
