//! Voice mixer
//!
//! Sums every registered voice into the device buffer. Voices are shared with
//! the control side through atomics, so gain, pause and seek changes never
//! wait on the audio callback.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// PCM and transport state for one loaded item
///
/// Samples are interleaved stereo at the mixer rate.
#[derive(Debug)]
pub struct VoiceState {
    samples: Vec<f32>,
    /// Next frame to render
    frame_pos: AtomicUsize,
    /// f32 bit pattern
    gain: AtomicU32,
    paused: AtomicBool,
}

impl VoiceState {
    /// New voice, paused at frame 0 with unity gain
    pub fn new(samples: Vec<f32>) -> Self {
        Self {
            samples,
            frame_pos: AtomicUsize::new(0),
            gain: AtomicU32::new(1.0f32.to_bits()),
            paused: AtomicBool::new(true),
        }
    }

    pub fn total_frames(&self) -> usize {
        self.samples.len() / 2
    }

    pub fn frame_pos(&self) -> usize {
        self.frame_pos.load(Ordering::Acquire)
    }

    pub fn set_frame_pos(&self, frame: usize) {
        self.frame_pos
            .store(frame.min(self.total_frames()), Ordering::Release);
    }

    pub fn gain(&self) -> f32 {
        f32::from_bits(self.gain.load(Ordering::Relaxed))
    }

    pub fn set_gain(&self, gain: f32) {
        self.gain
            .store(gain.clamp(0.0, 1.0).to_bits(), Ordering::Relaxed);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::Release);
    }

    pub fn is_finished(&self) -> bool {
        self.frame_pos() >= self.total_frames()
    }
}

/// Set of live voices rendered by the output thread
#[derive(Debug, Default)]
pub struct Mixer {
    voices: Mutex<Vec<Arc<VoiceState>>>,
}

impl Mixer {
    pub fn new() -> Self {
        Self::default()
    }

    fn voices(&self) -> MutexGuard<'_, Vec<Arc<VoiceState>>> {
        // A panic while holding the lock leaves the list itself intact
        match self.voices.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn add(&self, voice: Arc<VoiceState>) {
        self.voices().push(voice);
    }

    pub fn remove(&self, voice: &Arc<VoiceState>) {
        self.voices().retain(|v| !Arc::ptr_eq(v, voice));
    }

    pub fn voice_count(&self) -> usize {
        self.voices().len()
    }

    /// Render into an interleaved buffer with `channels` channels
    ///
    /// Left/right go to the first two channels, any others get silence. The
    /// sum is clamped to [-1, 1].
    pub fn mix_into(&self, out: &mut [f32], channels: usize) {
        out.fill(0.0);
        if channels == 0 {
            return;
        }
        let frames = out.len() / channels;
        let voices = self.voices();

        for voice in voices.iter() {
            if voice.is_paused() {
                continue;
            }
            let gain = voice.gain();
            let start = voice.frame_pos();
            let available = voice.total_frames().saturating_sub(start);
            let count = frames.min(available);

            for i in 0..count {
                let src = (start + i) * 2;
                let dst = i * channels;
                let left = voice.samples[src] * gain;
                let right = voice.samples[src + 1] * gain;
                if channels == 1 {
                    out[dst] += 0.5 * (left + right);
                } else {
                    out[dst] += left;
                    out[dst + 1] += right;
                }
            }
            // Seek from the control side wins over this advance
            let _ = voice.frame_pos.compare_exchange(
                start,
                start + count,
                Ordering::AcqRel,
                Ordering::Acquire,
            );
        }

        for sample in out.iter_mut() {
            *sample = sample.clamp(-1.0, 1.0);
        }
    }
}
