//! Multichannel f32 audio buffer with planar layout.

/// Channel count of every node buffer in the render graph.
pub const STEREO: u16 = 2;

/// A multichannel f32 audio buffer in planar layout.
///
/// `data[ch * frames + frame]` gives the sample for channel `ch` at `frame`.
#[derive(Clone, Debug, PartialEq)]
pub struct AudioBuffer {
    data: Vec<f32>,
    channels: u16,
    frames: usize,
}

impl AudioBuffer {
    /// Create a new silent buffer with the given dimensions.
    pub fn new(channels: u16, frames: usize) -> Self {
        Self {
            data: vec![0.0; channels as usize * frames],
            channels,
            frames,
        }
    }

    pub fn stereo(frames: usize) -> Self {
        Self::new(STEREO, frames)
    }

    pub fn silence(&mut self) {
        self.data.fill(0.0);
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn channel(&self, ch: u16) -> &[f32] {
        let start = ch as usize * self.frames;
        &self.data[start..start + self.frames]
    }

    pub fn channel_mut(&mut self, ch: u16) -> &mut [f32] {
        let start = ch as usize * self.frames;
        let len = self.frames;
        &mut self.data[start..start + len]
    }

    /// Left and right planes at once. Mono buffers return the same plane
    /// split in two, so callers should check `channels()` first.
    pub fn stereo_mut(&mut self) -> (&mut [f32], &mut [f32]) {
        self.data.split_at_mut(self.frames)
    }

    /// Sum overlapping channels from `source` into this buffer with gain.
    pub fn mix_from_scaled(&mut self, source: &AudioBuffer, gain: f32) {
        let chs = self.channels.min(source.channels);
        let frs = self.frames.min(source.frames);
        for ch in 0..chs {
            let dst = self.channel_mut(ch);
            let src = source.channel(ch);
            for i in 0..frs {
                dst[i] += src[i] * gain;
            }
        }
    }

    pub fn mix_from(&mut self, source: &AudioBuffer) {
        self.mix_from_scaled(source, 1.0);
    }

    /// Overwrite with `source`, silencing anything it does not cover.
    pub fn copy_from(&mut self, source: &AudioBuffer) {
        self.silence();
        self.mix_from(source);
    }

    pub fn apply_gain(&mut self, gain: f32) {
        for s in &mut self.data {
            *s *= gain;
        }
    }

    /// Largest absolute sample value.
    pub fn peak(&self) -> f32 {
        self.data.iter().fold(0.0f32, |m, s| m.max(s.abs()))
    }

    /// Append frames as interleaved samples.
    pub fn append_interleaved(&self, out: &mut Vec<f32>) {
        out.reserve(self.frames * self.channels as usize);
        for i in 0..self.frames {
            for ch in 0..self.channels {
                out.push(self.channel(ch)[i]);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_is_silent() {
        let buf = AudioBuffer::stereo(4);
        assert_eq!(buf.channels(), 2);
        assert_eq!(buf.frames(), 4);
        assert_eq!(buf.peak(), 0.0);
    }

    #[test]
    fn stereo_mut_splits_planes() {
        let mut buf = AudioBuffer::stereo(2);
        {
            let (l, r) = buf.stereo_mut();
            l[1] = 0.5;
            r[0] = -0.25;
        }
        assert_eq!(buf.channel(0), &[0.0, 0.5]);
        assert_eq!(buf.channel(1), &[-0.25, 0.0]);
    }

    #[test]
    fn mix_from_scaled_sums_with_gain() {
        let mut dst = AudioBuffer::stereo(2);
        dst.channel_mut(0)[0] = 0.5;
        let mut src = AudioBuffer::stereo(2);
        src.channel_mut(0)[0] = 1.0;
        src.channel_mut(1)[1] = -1.0;

        dst.mix_from_scaled(&src, 0.5);
        assert!((dst.channel(0)[0] - 1.0).abs() < 1e-6);
        assert!((dst.channel(1)[1] + 0.5).abs() < 1e-6);
    }

    #[test]
    fn copy_from_mismatched_sizes_silences_remainder() {
        let mut dst = AudioBuffer::stereo(4);
        dst.channel_mut(1)[3] = 9.0;
        let mut src = AudioBuffer::new(1, 2);
        src.channel_mut(0)[0] = 1.0;

        dst.copy_from(&src);
        assert_eq!(dst.channel(0), &[1.0, 0.0, 0.0, 0.0]);
        assert_eq!(dst.channel(1), &[0.0; 4]);
    }

    #[test]
    fn interleaves_frames() {
        let mut buf = AudioBuffer::stereo(2);
        buf.channel_mut(0).copy_from_slice(&[1.0, 2.0]);
        buf.channel_mut(1).copy_from_slice(&[-1.0, -2.0]);
        let mut out = Vec::new();
        buf.append_interleaved(&mut out);
        assert_eq!(out, vec![1.0, -1.0, 2.0, -2.0]);
    }

    #[test]
    fn peak_tracks_largest_magnitude() {
        let mut buf = AudioBuffer::stereo(3);
        buf.channel_mut(1)[2] = -0.75;
        buf.channel_mut(0)[0] = 0.5;
        assert_eq!(buf.peak(), 0.75);
    }
}
