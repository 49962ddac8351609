//! Programmatic surface: encode payloads to samples or containers, start playback.

use tracing::debug;

use crate::container::{self, CompressedEncoder, ContainerFormat};
use crate::error::{FormatError, Result};
use crate::playback::{CompletionCallback, PlaybackResource, PlaybackSession};
use crate::plan::{Samples, TransmissionPlan};
use crate::session::Session;
use crate::tone::{AfskEncoder, TonePort};

/// Creates a fresh MP3 encoder per container.
pub type EncoderFactory = Box<dyn Fn() -> Box<dyn CompressedEncoder> + Send + Sync>;

pub struct Transmitter {
    session: Session,
    tone: Box<dyn TonePort>,
    default_tone: bool,
    mp3: Option<EncoderFactory>,
}

impl Transmitter {
    /// Transmitter with the built-in AFSK tone port for the session's mode.
    pub fn new(session: Session) -> Self {
        Self {
            tone: Box::new(AfskEncoder::new(session.sample_rate(), session.low_bit_rate())),
            session,
            default_tone: true,
            mp3: None,
        }
    }

    pub fn with_tone_port(session: Session, tone: Box<dyn TonePort>) -> Self {
        Self {
            session,
            tone,
            default_tone: false,
            mp3: None,
        }
    }

    /// Install the encoder used for `ContainerFormat::Mp3`.
    pub fn with_mp3_encoder(mut self, factory: EncoderFactory) -> Self {
        self.mp3 = Some(factory);
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Swap the session. The built-in tone port is rebuilt when rate or mode changed.
    pub fn reconfigure(&mut self, session: Session) {
        let changed = session.low_bit_rate() != self.session.low_bit_rate()
            || session.sample_rate() != self.session.sample_rate();
        if self.default_tone && changed {
            debug!(low_bit_rate = session.low_bit_rate(), "rebuilding tone port");
            self.tone = Box::new(AfskEncoder::new(session.sample_rate(), session.low_bit_rate()));
        }
        self.session = session;
    }

    pub fn plan(&self, payload: &[u8]) -> Result<TransmissionPlan> {
        Ok(TransmissionPlan::build(payload, &self.session, self.tone.as_ref())?)
    }

    /// Samples in the session's sample format. Pure.
    pub fn encode(&self, payload: &[u8]) -> Result<Samples> {
        Ok(self.plan(payload)?.render(self.session.sample_format()))
    }

    /// Container bytes and mime type in the session's output format.
    pub fn encode_to_container(&self, payload: &[u8]) -> Result<(Vec<u8>, &'static str)> {
        let format = self.session.output_format();
        // Check the encoder before doing any work.
        let mut mp3 = match format {
            ContainerFormat::Mp3 => {
                let factory = self.mp3.as_ref().ok_or(FormatError::EncoderUnavailable)?;
                Some(factory())
            }
            ContainerFormat::Wav => None,
        };
        let pcm = self
            .plan(payload)?
            .render(crate::session::SampleFormat::Pcm16)
            .into_pcm16();
        let bytes = match mp3.as_deref_mut() {
            Some(encoder) => container::mp3_bytes(encoder, &pcm)?,
            None => container::wav_bytes(self.session.sample_rate(), &pcm)?,
        };
        debug!(%format, bytes = bytes.len(), samples = pcm.len(), "encoded container");
        Ok((bytes, format.mime_type()))
    }

    /// Encode `payload` and start playing it on `resource`. The host forwards each
    /// playback-finished event to the returned session.
    pub fn play<R>(
        &self,
        payload: &[u8],
        resource: &mut R,
        on_complete: CompletionCallback,
    ) -> Result<PlaybackSession>
    where
        R: PlaybackResource + ?Sized,
    {
        let mut playback = PlaybackSession::new(self.session.repeat_count());
        playback.play(resource, || self.encode_to_container(payload), on_complete)?;
        Ok(playback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::frame::{DATA_FRAME_LEN, CONTROL_FRAME_LEN};
    use crate::playback::tests::MockResource;
    use crate::playback::PlaybackState;
    use crate::session::{silence_len, SampleFormat, Timing};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    fn expected_total(session: &Session, blocks: usize) -> usize {
        let t = Timing::default();
        let tone = AfskEncoder::new(session.sample_rate(), session.low_bit_rate());
        let rate = session.sample_rate();
        let mut n = 2 * silence_len(rate, t.lead_ms)
            + 2 * tone.modulated_len(CONTROL_FRAME_LEN)
            + silence_len(rate, t.control_gap_ms)
            + silence_len(rate, t.settle_ms)
            + blocks * (tone.modulated_len(DATA_FRAME_LEN) + silence_len(rate, t.inter_frame_ms));
        if session.low_bit_rate() {
            n += silence_len(rate, t.pilot_ms) + silence_len(rate, t.pilot_gap_ms);
        }
        n
    }

    #[test]
    fn encode_length_matches_plan() {
        for lbr in [false, true] {
            let session = Session::builder().low_bit_rate(lbr).build().unwrap();
            let tx = Transmitter::new(session);
            let samples = tx.encode(&[0x41; 10]).unwrap();
            assert_eq!(samples.len(), expected_total(&session, 1));
            assert!(matches!(samples, Samples::Pcm16(_)));
        }
    }

    #[test]
    fn encode_float_format() {
        let session = Session::builder()
            .sample_format(SampleFormat::Float)
            .build()
            .unwrap();
        let Samples::Float(v) = Transmitter::new(session).encode(b"hi").unwrap() else {
            panic!("expected float samples");
        };
        assert!(v.iter().all(|s| (-1.0..=1.0).contains(s)));
    }

    #[test]
    fn encode_empty_payload_sends_only_control() {
        let tx = Transmitter::new(Session::default());
        let plan = tx.plan(&[]).unwrap();
        assert_eq!(plan.frames().count(), 2);
        assert_eq!(tx.encode(&[]).unwrap().len(), expected_total(tx.session(), 0));
    }

    #[test]
    fn encode_is_deterministic() {
        let tx = Transmitter::new(Session::default());
        let payload: Vec<u8> = (0..2000u32).map(|i| (i ^ (i >> 3)) as u8).collect();
        assert_eq!(tx.encode(&payload).unwrap(), tx.encode(&payload).unwrap());
        assert_eq!(
            tx.encode_to_container(&payload).unwrap(),
            tx.encode_to_container(&payload).unwrap()
        );
    }

    #[test]
    fn wav_container() {
        let tx = Transmitter::new(Session::default());
        let (bytes, mime) = tx.encode_to_container(b"hello").unwrap();
        let n = tx.encode(b"hello").unwrap().len();
        assert_eq!(mime, "audio/wav");
        assert_eq!(bytes.len(), 44 + 2 * n);
        assert_eq!(&bytes[0..4], b"RIFF");
    }

    #[test]
    fn mp3_without_encoder_fails_before_playback() {
        let session = Session::builder()
            .output_format(ContainerFormat::Mp3)
            .build()
            .unwrap();
        let tx = Transmitter::new(session);
        let mut res = MockResource::default();
        let err = tx.play(b"x", &mut res, Box::new(|| {})).err().unwrap();
        assert_eq!(err, Error::Format(FormatError::EncoderUnavailable));
        assert!(res.source.is_none());
        assert_eq!(res.starts, 0);
    }

    struct NullMp3;

    impl CompressedEncoder for NullMp3 {
        fn encode_block(&mut self, samples: &[i16]) -> std::result::Result<Vec<u8>, FormatError> {
            Ok(vec![samples.len() as u8])
        }

        fn flush(&mut self) -> std::result::Result<Vec<u8>, FormatError> {
            Ok(b"END".to_vec())
        }
    }

    #[test]
    fn mp3_container_uses_installed_encoder() {
        let session = Session::builder()
            .output_format(ContainerFormat::Mp3)
            .build()
            .unwrap();
        let factory: EncoderFactory =
            Box::new(|| -> Box<dyn CompressedEncoder> { Box::new(NullMp3) });
        let tx = Transmitter::new(session).with_mp3_encoder(factory);
        let (bytes, mime) = tx.encode_to_container(b"x").unwrap();
        assert_eq!(mime, "audio/mpeg");
        assert!(bytes.ends_with(b"END"));
    }

    #[test]
    fn play_runs_to_completion() {
        let session = Session::builder().repeat_count(2).build().unwrap();
        let tx = Transmitter::new(session);
        let mut res = MockResource::default();
        let done = Arc::new(AtomicBool::new(false));
        let d = done.clone();
        let mut playback = tx
            .play(b"payload", &mut res, Box::new(move || d.store(true, Ordering::SeqCst)))
            .unwrap();
        assert_eq!(res.source.as_ref().unwrap().1, "audio/wav");
        playback.on_playback_finished(&mut res).unwrap();
        assert!(!done.load(Ordering::SeqCst));
        assert_eq!(
            playback.on_playback_finished(&mut res).unwrap(),
            PlaybackState::Completed
        );
        assert!(done.load(Ordering::SeqCst));
    }

    #[test]
    fn reconfigure_rebuilds_tone_for_mode() {
        let mut tx = Transmitter::new(Session::default());
        let standard = tx.encode(b"a").unwrap().len();
        tx.reconfigure(Session::builder().low_bit_rate(true).build().unwrap());
        let lbr = tx.encode(b"a").unwrap().len();
        assert_eq!(lbr, expected_total(tx.session(), 1));
        assert!(lbr > standard);
    }

    #[test]
    fn oversized_payload_is_protocol_error() {
        let tx = Transmitter::new(Session::default());
        let payload = vec![0u8; crate::protocol::MAX_PAYLOAD_LEN + 1];
        assert!(matches!(tx.encode(&payload), Err(Error::Protocol(_))));
    }
}
