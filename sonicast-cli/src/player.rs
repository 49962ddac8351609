//! Host adapters: an external player process as the playback resource, and an external
//! MP3 encoder process as the compressed-audio encoder.

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};

use sonicast_core::container::{CompressedEncoder, MP3_BITRATE_KBPS, MP3_SAMPLE_RATE};
use sonicast_core::{FormatError, PlaybackError, PlaybackResource};
use tokio::process::{Child, Command};
use tracing::debug;

/// Plays the container by spawning `program args... <file>` once per play.
/// Process exit is the "playback finished" event.
pub struct ExternalPlayer {
    program: String,
    args: Vec<String>,
    dir: tempfile::TempDir,
    source: Option<PathBuf>,
    child: Option<Child>,
}

impl ExternalPlayer {
    pub fn new(program: String, args: Vec<String>) -> io::Result<Self> {
        Ok(Self {
            program,
            args,
            dir: tempfile::tempdir()?,
            source: None,
            child: None,
        })
    }

    /// Wait for the running player process to exit.
    pub async fn wait_finished(&mut self) -> io::Result<ExitStatus> {
        let child = self
            .child
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "player is not running"))?;
        let status = child.wait().await;
        self.child = None;
        status
    }
}

impl PlaybackResource for ExternalPlayer {
    fn is_paused(&self) -> bool {
        self.child.is_none()
    }

    fn pause(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.start_kill();
        }
    }

    fn set_source(&mut self, bytes: Vec<u8>, mime_type: &'static str) -> Result<(), PlaybackError> {
        let ext = match mime_type {
            "audio/mpeg" => "mp3",
            _ => "wav",
        };
        let path = self.dir.path().join(format!("transmission.{}", ext));
        std::fs::write(&path, &bytes).map_err(|e| PlaybackError::Resource(e.to_string()))?;
        debug!(path = %path.display(), bytes = bytes.len(), "player source set");
        self.source = Some(path);
        Ok(())
    }

    fn start(&mut self) -> Result<(), PlaybackError> {
        let source = self
            .source
            .as_ref()
            .ok_or_else(|| PlaybackError::Resource("no source set".into()))?;
        let child = Command::new(&self.program)
            .args(&self.args)
            .arg(source)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| PlaybackError::Resource(format!("{}: {}", self.program, e)))?;
        self.child = Some(child);
        Ok(())
    }
}

/// Buffers raw PCM and runs `lame` (or a compatible encoder) over it on flush.
pub struct LameProcess {
    program: String,
    pcm: Vec<u8>,
}

impl LameProcess {
    pub fn new(program: String) -> Self {
        Self {
            program,
            pcm: Vec::new(),
        }
    }

    fn args() -> Vec<String> {
        vec![
            "--quiet".into(),
            "-r".into(),
            "-s".into(),
            format!("{}", MP3_SAMPLE_RATE as f64 / 1000.0),
            "--bitwidth".into(),
            "16".into(),
            "--signed".into(),
            "--little-endian".into(),
            "-m".into(),
            "m".into(),
            "--cbr".into(),
            "-b".into(),
            MP3_BITRATE_KBPS.to_string(),
            "-".into(),
            "-".into(),
        ]
    }
}

impl CompressedEncoder for LameProcess {
    fn encode_block(&mut self, samples: &[i16]) -> Result<Vec<u8>, FormatError> {
        for s in samples {
            self.pcm.extend_from_slice(&s.to_le_bytes());
        }
        Ok(Vec::new())
    }

    fn flush(&mut self) -> Result<Vec<u8>, FormatError> {
        let encoder_err = |e: io::Error| FormatError::Encoder(format!("{}: {}", self.program, e));
        let mut child = std::process::Command::new(&self.program)
            .args(Self::args())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(encoder_err)?;
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| FormatError::Encoder("encoder stdin unavailable".into()))?;
        let pcm = std::mem::take(&mut self.pcm);
        let writer = std::thread::spawn(move || stdin.write_all(&pcm));
        let output = child.wait_with_output().map_err(encoder_err)?;
        match writer.join() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(encoder_err(e)),
            Err(_) => return Err(FormatError::Encoder("encoder input thread panicked".into())),
        }
        if !output.status.success() {
            return Err(FormatError::Encoder(format!(
                "{} exited with {}",
                self.program, output.status
            )));
        }
        Ok(output.stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_written_with_extension() {
        let mut p = ExternalPlayer::new("true".into(), vec![]).unwrap();
        assert!(p.is_paused());
        p.set_source(vec![1, 2, 3], "audio/wav").unwrap();
        let path = p.source.clone().unwrap();
        assert!(path.ends_with("transmission.wav"));
        assert_eq!(std::fs::read(&path).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn start_without_source_fails() {
        let mut p = ExternalPlayer::new("true".into(), vec![]).unwrap();
        assert!(matches!(p.start(), Err(PlaybackError::Resource(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn process_exit_is_finished_event() {
        let mut p = ExternalPlayer::new("true".into(), vec![]).unwrap();
        p.set_source(vec![0], "audio/wav").unwrap();
        p.start().unwrap();
        assert!(!p.is_paused());
        let status = p.wait_finished().await.unwrap();
        assert!(status.success());
        assert!(p.is_paused());
    }

    #[test]
    fn missing_encoder_reports_error() {
        let mut enc = LameProcess::new("sonicast-no-such-encoder".into());
        enc.encode_block(&[0, 1, 2]).unwrap();
        assert!(matches!(enc.flush(), Err(FormatError::Encoder(_))));
    }

    #[test]
    fn lame_args_fixed_profile() {
        let args = LameProcess::args();
        assert!(args.windows(2).any(|w| w[0] == "-s" && w[1] == "44.1"));
        assert!(args.windows(2).any(|w| w[0] == "-b" && w[1] == "128"));
        assert!(args.windows(2).any(|w| w[0] == "-m" && w[1] == "m"));
    }
}
