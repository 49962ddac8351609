//! Transmission assembly: payload + session -> ordered waveform segments -> flat samples.
//!
//! Segment order: lead silence, [pilot tone, gap], control, gap, control, settle,
//! then per block: data frame, gap. Trail silence last.

use std::f64::consts::TAU;

use tracing::{debug, trace};

use crate::chunk;
use crate::error::ProtocolError;
use crate::frame;
use crate::protocol::FrameType;
use crate::session::{SampleFormat, Session};
use crate::tone::TonePort;

/// Pilot tone frequency in low bit rate mode.
pub const PILOT_HZ: f64 = 8666.0;

/// Full-scale 16-bit amplitude.
pub const PCM16_SCALE: f64 = 32767.0;

/// A frame and its modulated waveform.
#[derive(Debug, Clone, PartialEq)]
pub struct ModulatedFrame {
    pub frame_type: FrameType,
    pub bytes: Vec<u8>,
    pub samples: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WaveformSegment {
    /// Zero samples.
    Silence(usize),
    /// Cosine at `PILOT_HZ`, full amplitude, this many samples.
    PilotTone(usize),
    ModulatedFrame(ModulatedFrame),
}

impl WaveformSegment {
    pub fn len(&self) -> usize {
        match self {
            WaveformSegment::Silence(n) | WaveformSegment::PilotTone(n) => *n,
            WaveformSegment::ModulatedFrame(f) => f.samples.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Rendered output.
#[derive(Debug, Clone, PartialEq)]
pub enum Samples {
    Float(Vec<f32>),
    Pcm16(Vec<i16>),
}

impl Samples {
    pub fn len(&self) -> usize {
        match self {
            Samples::Float(v) => v.len(),
            Samples::Pcm16(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 16-bit view for container writers. Float samples are quantized.
    pub fn into_pcm16(self) -> Vec<i16> {
        match self {
            Samples::Pcm16(v) => v,
            Samples::Float(v) => v.into_iter().map(|s| quantize(s as f64)).collect(),
        }
    }
}

/// Map [-1, 1] to i16 as `round(x * 32767)`, saturating.
pub fn quantize(x: f64) -> i16 {
    (x * PCM16_SCALE)
        .round()
        .clamp(i16::MIN as f64, i16::MAX as f64) as i16
}

/// Ordered, immutable list of segments derived from one payload and one session.
#[derive(Debug, Clone, PartialEq)]
pub struct TransmissionPlan {
    sample_rate: u32,
    segments: Vec<WaveformSegment>,
}

impl TransmissionPlan {
    /// Build the plan. Any frame error aborts the whole build.
    pub fn build(
        payload: &[u8],
        session: &Session,
        tone: &dyn TonePort,
    ) -> Result<Self, ProtocolError> {
        let version = session.version();
        let timing = session.timing();
        let blocks = chunk::split_into_blocks(payload.len())?;
        let control = frame::make_control_frame(version, payload)?;
        let data_frames = blocks
            .iter()
            .map(|b| frame::make_data_frame(version, &payload[b.range.clone()], b.index))
            .collect::<Result<Vec<_>, _>>()?;

        let modulate = |frame_type: FrameType, bytes: Vec<u8>| {
            let samples = tone.modulate(&bytes);
            trace!(?frame_type, bytes = bytes.len(), samples = samples.len(), "modulated frame");
            WaveformSegment::ModulatedFrame(ModulatedFrame {
                frame_type,
                bytes,
                samples,
            })
        };

        let mut segments = Vec::with_capacity(8 + 2 * data_frames.len());
        segments.push(WaveformSegment::Silence(session.silence_len(timing.lead_ms)));
        if session.low_bit_rate() {
            segments.push(WaveformSegment::PilotTone(session.silence_len(timing.pilot_ms)));
            segments.push(WaveformSegment::Silence(session.silence_len(timing.pilot_gap_ms)));
        }
        let control_segment = modulate(FrameType::Control, control);
        segments.push(control_segment.clone());
        segments.push(WaveformSegment::Silence(session.silence_len(timing.control_gap_ms)));
        segments.push(control_segment);
        segments.push(WaveformSegment::Silence(session.silence_len(timing.settle_ms)));
        for bytes in data_frames {
            segments.push(modulate(FrameType::Data, bytes));
            segments.push(WaveformSegment::Silence(session.silence_len(timing.inter_frame_ms)));
        }
        segments.push(WaveformSegment::Silence(session.silence_len(timing.lead_ms)));

        let plan = Self {
            sample_rate: session.sample_rate(),
            segments,
        };
        debug!(
            version = %version,
            payload_len = payload.len(),
            blocks = blocks.len(),
            samples = plan.total_samples(),
            "built transmission plan"
        );
        Ok(plan)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn segments(&self) -> &[WaveformSegment] {
        &self.segments
    }

    /// Modulated frames in transmission order.
    pub fn frames(&self) -> impl Iterator<Item = &ModulatedFrame> {
        self.segments.iter().filter_map(|s| match s {
            WaveformSegment::ModulatedFrame(f) => Some(f),
            _ => None,
        })
    }

    pub fn total_samples(&self) -> usize {
        self.segments.iter().map(WaveformSegment::len).sum()
    }

    pub fn render(&self, format: SampleFormat) -> Samples {
        match format {
            SampleFormat::Float => Samples::Float(self.render_with(|x| x as f32)),
            SampleFormat::Pcm16 => Samples::Pcm16(self.render_with(quantize)),
        }
    }

    // One allocation sized from the segment lengths; each segment writes its own slice.
    fn render_with<T: Copy + Default>(&self, convert: impl Fn(f64) -> T) -> Vec<T> {
        let mut out = vec![T::default(); self.total_samples()];
        let mut offset = 0usize;
        let omega = TAU * PILOT_HZ / self.sample_rate as f64;
        for segment in &self.segments {
            let dst = &mut out[offset..offset + segment.len()];
            match segment {
                WaveformSegment::Silence(_) => dst.fill(convert(0.0)),
                WaveformSegment::PilotTone(_) => {
                    let mut phase = 0.0f64;
                    for s in dst.iter_mut() {
                        *s = convert(phase.cos());
                        phase += omega;
                    }
                }
                WaveformSegment::ModulatedFrame(f) => {
                    for (s, &x) in dst.iter_mut().zip(&f.samples) {
                        *s = convert(x as f64);
                    }
                }
            }
            offset += segment.len();
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{inspect, FrameBody, CONTROL_FRAME_LEN, DATA_FRAME_LEN};
    use crate::protocol::ProtocolVersion;
    use crate::session::{silence_len, Timing};
    use crate::tone::AfskEncoder;

    /// One sample per bit, value = bit.
    struct BitTone;

    impl TonePort for BitTone {
        fn samples_per_bit(&self) -> f64 {
            1.0
        }

        fn modulate(&self, frame: &[u8]) -> Vec<f32> {
            frame
                .iter()
                .flat_map(|b| (0..8).map(move |i| ((b >> i) & 1) as f32))
                .collect()
        }
    }

    fn session(lbr: bool) -> Session {
        Session::builder().low_bit_rate(lbr).build().unwrap()
    }

    fn data_indices(plan: &TransmissionPlan) -> Vec<u16> {
        plan.frames()
            .filter(|f| f.frame_type == FrameType::Data)
            .map(|f| match inspect(&f.bytes).unwrap().0.body {
                FrameBody::Data(d) => d.block_index,
                FrameBody::Control(_) => unreachable!(),
            })
            .collect()
    }

    #[test]
    fn one_data_frame_per_block_in_order() {
        for len in [0usize, 1, 255, 256, 257, 1000, 4096] {
            let payload: Vec<u8> = (0..len).map(|i| i as u8).collect();
            let plan = TransmissionPlan::build(&payload, &session(false), &BitTone).unwrap();
            let indices = data_indices(&plan);
            assert_eq!(indices.len(), len.div_ceil(256), "len {}", len);
            assert!(indices.iter().enumerate().all(|(i, &x)| x as usize == i));
        }
    }

    #[test]
    fn random_payload_lengths_split_in_order() {
        use rand::{Rng, RngCore};

        let mut rng = rand::thread_rng();
        for _ in 0..32 {
            let len = rng.gen_range(0..20_000usize);
            let mut payload = vec![0u8; len];
            rng.fill_bytes(&mut payload);
            let plan = TransmissionPlan::build(&payload, &session(false), &BitTone).unwrap();
            let indices = data_indices(&plan);
            assert_eq!(indices.len(), len.div_ceil(256), "len {}", len);
            assert!(indices.windows(2).all(|w| w[1] == w[0] + 1), "len {}", len);
            assert!(indices.first().map_or(true, |&i| i == 0));

            let blocks: Vec<u8> = plan
                .frames()
                .filter_map(|f| match inspect(&f.bytes).unwrap().0.body {
                    FrameBody::Data(d) => Some(d.data),
                    FrameBody::Control(_) => None,
                })
                .flatten()
                .collect();
            assert_eq!(&blocks[..len], &payload[..]);
        }
    }

    #[test]
    fn segment_order_standard() {
        let t = Timing::default();
        let plan = TransmissionPlan::build(&[0x41; 300], &session(false), &BitTone).unwrap();
        let segs = plan.segments();
        assert_eq!(segs.len(), 1 + 4 + 2 * 2 + 1);
        assert_eq!(segs[0], WaveformSegment::Silence(silence_len(44100, t.lead_ms)));
        assert!(matches!(
            &segs[1],
            WaveformSegment::ModulatedFrame(f) if f.frame_type == FrameType::Control
        ));
        assert_eq!(segs[2], WaveformSegment::Silence(silence_len(44100, t.control_gap_ms)));
        assert_eq!(segs[1], segs[3]);
        assert_eq!(segs[4], WaveformSegment::Silence(silence_len(44100, t.settle_ms)));
        assert!(matches!(
            &segs[5],
            WaveformSegment::ModulatedFrame(f) if f.frame_type == FrameType::Data
        ));
        assert_eq!(segs[6], WaveformSegment::Silence(silence_len(44100, t.inter_frame_ms)));
        assert_eq!(segs[9], segs[0]);
    }

    #[test]
    fn low_bit_rate_adds_pilot() {
        let t = Timing::default();
        let plan = TransmissionPlan::build(b"x", &session(true), &BitTone).unwrap();
        let segs = plan.segments();
        assert_eq!(segs[1], WaveformSegment::PilotTone(silence_len(44100, t.pilot_ms)));
        assert_eq!(segs[2], WaveformSegment::Silence(silence_len(44100, t.pilot_gap_ms)));
        let plain = TransmissionPlan::build(b"x", &session(false), &BitTone).unwrap();
        assert!(!plain
            .segments()
            .iter()
            .any(|s| matches!(s, WaveformSegment::PilotTone(_))));
    }

    #[test]
    fn control_frames_identical_and_describe_payload() {
        let payload = [0x41u8; 10];
        let plan = TransmissionPlan::build(&payload, &session(false), &BitTone).unwrap();
        let controls: Vec<_> = plan
            .frames()
            .filter(|f| f.frame_type == FrameType::Control)
            .collect();
        assert_eq!(controls.len(), 2);
        assert_eq!(controls[0].bytes, controls[1].bytes);
        assert_eq!(controls[0].bytes.len(), CONTROL_FRAME_LEN);
        match inspect(&controls[0].bytes).unwrap().0.body {
            FrameBody::Control(c) => {
                assert_eq!(c.length, 10);
                assert_eq!(c.content_hash, crate::hash::hash32(&payload, 0x32D0_BABE));
                assert_eq!(c.content_digest, crate::hash::digest128(&payload));
            }
            FrameBody::Data(_) => panic!("expected control frame"),
        }
    }

    #[test]
    fn frames_bounded_by_markers() {
        let plan = TransmissionPlan::build(&[7u8; 700], &session(false), &BitTone).unwrap();
        for f in plan.frames() {
            assert_eq!(&f.bytes[..7], &crate::protocol::PREAMBLE);
            assert_eq!(f.bytes.last(), Some(&0xFF));
            assert!(f.bytes.len() == CONTROL_FRAME_LEN || f.bytes.len() == DATA_FRAME_LEN);
        }
    }

    #[test]
    fn render_total_matches_segments() {
        let plan = TransmissionPlan::build(&[1u8; 513], &session(true), &BitTone).unwrap();
        let total = plan.total_samples();
        assert_eq!(plan.render(SampleFormat::Float).len(), total);
        assert_eq!(plan.render(SampleFormat::Pcm16).len(), total);
        let lead = silence_len(44100, 150);
        match plan.render(SampleFormat::Pcm16) {
            Samples::Pcm16(v) => {
                assert!(v[..lead].iter().all(|&s| s == 0));
                assert_eq!(v[lead], 32767);
                assert!(v[total - lead..].iter().all(|&s| s == 0));
            }
            Samples::Float(_) => panic!("expected pcm16"),
        }
    }

    #[test]
    fn rendered_frame_samples_at_offset() {
        let plan = TransmissionPlan::build(b"A", &session(false), &BitTone).unwrap();
        let lead = silence_len(44100, 150);
        let Samples::Float(v) = plan.render(SampleFormat::Float) else {
            panic!("expected float");
        };
        let first = plan.frames().next().unwrap();
        assert_eq!(&v[lead..lead + first.samples.len()], first.samples.as_slice());
    }

    #[test]
    fn deterministic() {
        let payload: Vec<u8> = (0..900u32).map(|i| (i * 31) as u8).collect();
        for version in [ProtocolVersion::V1, ProtocolVersion::V2] {
            let s = Session::builder().version(version).build().unwrap();
            let tone = AfskEncoder::new(s.sample_rate(), s.low_bit_rate());
            let a = TransmissionPlan::build(&payload, &s, &tone).unwrap();
            let b = TransmissionPlan::build(&payload, &s, &tone).unwrap();
            assert_eq!(a.render(SampleFormat::Pcm16), b.render(SampleFormat::Pcm16));
        }
    }

    #[test]
    fn quantize_rounds_and_saturates() {
        assert_eq!(quantize(0.0), 0);
        assert_eq!(quantize(1.0), 32767);
        assert_eq!(quantize(-1.0), -32767);
        assert_eq!(quantize(2.0), 32767);
        assert_eq!(quantize(-2.0), -32768);
        assert_eq!(quantize(0.5), 16384);
    }

    #[test]
    fn oversized_payload_aborts() {
        let payload = vec![0u8; crate::protocol::MAX_PAYLOAD_LEN + 1];
        assert!(matches!(
            TransmissionPlan::build(&payload, &session(false), &BitTone),
            Err(ProtocolError::PayloadTooLarge { .. })
        ));
    }
}
