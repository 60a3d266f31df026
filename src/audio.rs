//! Fire-and-forget sound cues.
//!
//! The engine plays a sound when an application window closes. Playback goes
//! through an [`AudioBackend`]; [`SoundCue`] opens it lazily on first use and
//! turns audio off for the rest of the process if opening fails. Playback is a
//! synchronous call on the event thread, so slow calls are reported.

use anyhow::Result;
use std::time::Instant;

use crate::common::constants::SLOW_SOUND_CALL_MS;

/// Sound output used by [`SoundCue`].
#[cfg_attr(test, mockall::automock)]
pub trait AudioBackend {
    /// Prepare the output. Called once, before the first `play`.
    fn open(&mut self) -> Result<()>;

    /// Start playing the sound file at `file` without waiting for it to finish.
    fn play(&mut self, file: &str) -> Result<()>;

    /// Whether the user's profile mutes event sounds.
    fn is_silent(&self) -> bool;
}

/// Backend that only logs what it would play.
#[derive(Debug, Default)]
pub struct LogOnlyAudio;

impl AudioBackend for LogOnlyAudio {
    fn open(&mut self) -> Result<()> {
        Ok(())
    }

    fn play(&mut self, file: &str) -> Result<()> {
        log_debug!("Playing sound {file}");
        Ok(())
    }

    fn is_silent(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CueState {
    Unopened,
    Ready,
    Disabled,
}

/// Lazily opened sound player that never fails its caller.
pub struct SoundCue {
    backend: Option<Box<dyn AudioBackend>>,
    state: CueState,
}

impl SoundCue {
    pub fn new(backend: Box<dyn AudioBackend>) -> Self {
        Self {
            backend: Some(backend),
            state: CueState::Unopened,
        }
    }

    /// A cue that never plays anything.
    pub fn disabled() -> Self {
        Self {
            backend: None,
            state: CueState::Disabled,
        }
    }

    /// Whether sounds can still be played.
    pub fn is_enabled(&self) -> bool {
        self.state != CueState::Disabled
    }

    /// Play `file`, logging instead of failing.
    pub fn play(&mut self, file: &str) {
        let Some(backend) = self.backend.as_mut() else {
            return;
        };
        if self.state == CueState::Disabled || backend.is_silent() {
            return;
        }

        if self.state == CueState::Unopened {
            if let Err(e) = backend.open() {
                log_warning!("Sound output unavailable, disabling sounds: {e:#}");
                self.state = CueState::Disabled;
                return;
            }
            self.state = CueState::Ready;
        }

        let started = Instant::now();
        if let Err(e) = backend.play(file) {
            log_warning!("{file}: {e:#}");
        }

        let elapsed = started.elapsed().as_millis();
        if elapsed > SLOW_SOUND_CALL_MS {
            log_warning!("Sound playback blocked for {elapsed} ms to play {file}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn test_backend_opened_once() {
        let mut backend = MockAudioBackend::new();
        backend.expect_is_silent().return_const(false);
        backend.expect_open().times(1).returning(|| Ok(()));
        backend
            .expect_play()
            .withf(|file| file == "close.wav")
            .times(2)
            .returning(|_| Ok(()));

        let mut cue = SoundCue::new(Box::new(backend));
        cue.play("close.wav");
        cue.play("close.wav");
        assert!(cue.is_enabled());
    }

    #[test]
    fn test_open_failure_disables_audio() {
        let mut backend = MockAudioBackend::new();
        backend.expect_is_silent().return_const(false);
        backend
            .expect_open()
            .times(1)
            .returning(|| Err(anyhow!("no sound server")));
        backend.expect_play().never();

        let mut cue = SoundCue::new(Box::new(backend));
        cue.play("close.wav");
        cue.play("close.wav");
        assert!(!cue.is_enabled());
    }

    #[test]
    fn test_play_failure_is_not_fatal() {
        let mut backend = MockAudioBackend::new();
        backend.expect_is_silent().return_const(false);
        backend.expect_open().returning(|| Ok(()));
        backend
            .expect_play()
            .times(2)
            .returning(|_| Err(anyhow!("file missing")));

        let mut cue = SoundCue::new(Box::new(backend));
        cue.play("missing.wav");
        cue.play("missing.wav");
        assert!(cue.is_enabled());
    }

    #[test]
    fn test_silent_profile_skips_playback() {
        let mut backend = MockAudioBackend::new();
        backend.expect_is_silent().return_const(true);
        backend.expect_open().never();
        backend.expect_play().never();

        let mut cue = SoundCue::new(Box::new(backend));
        cue.play("close.wav");
    }

    #[test]
    fn test_disabled_cue_is_inert() {
        let mut cue = SoundCue::disabled();
        cue.play("close.wav");
        assert!(!cue.is_enabled());
    }
}
