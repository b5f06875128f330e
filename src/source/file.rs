use std::fs::File;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use super::SampleSource;
use crate::error::CaptureError;
use crate::models::{AudioFrame, SAMPLE_RATE};

/// Replays a decoded recording one frame per read.
///
/// The last partial frame is padded with silence. Once every frame has been
/// served, `read` reports `EndOfStream`.
pub struct FileSource {
    samples: Vec<i16>,
    position: usize,
    frame_size: usize,
    name: String,
}

impl FileSource {
    /// Decode `path` fully into mono 16-bit samples.
    pub fn open(path: &Path, frame_size: usize) -> Result<Self, CaptureError> {
        let decode_err = |message: String| CaptureError::Decode {
            path: path.to_path_buf(),
            message,
        };

        let file = File::open(path).map_err(|e| decode_err(e.to_string()))?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| decode_err(e.to_string()))?;
        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != symphonia::core::codecs::CODEC_TYPE_NULL)
            .ok_or_else(|| decode_err("no audio track found".to_string()))?;

        let codec_params = track.codec_params.clone();
        let track_id = track.id;
        let sample_rate = codec_params.sample_rate.unwrap_or(SAMPLE_RATE);
        if sample_rate != SAMPLE_RATE {
            log::warn!(
                "{} is {} Hz; replaying without resampling",
                path.display(),
                sample_rate
            );
        }

        let mut decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| decode_err(e.to_string()))?;

        let mut mono: Vec<i16> = Vec::new();
        let mut sample_buf: Option<SampleBuffer<i16>> = None;
        let mut sample_buf_frames: u64 = 0;

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(symphonia::core::errors::Error::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(symphonia::core::errors::Error::ResetRequired) => break,
                Err(e) => return Err(decode_err(e.to_string())),
            };

            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(d) => d,
                Err(symphonia::core::errors::Error::DecodeError(e)) => {
                    log::debug!("Skipping undecodable packet: {}", e);
                    continue;
                }
                Err(e) => return Err(decode_err(e.to_string())),
            };

            let spec = *decoded.spec();
            let channels = spec.channels.count().max(1);
            let num_frames = decoded.frames() as u64;

            // Reuse the buffer across packets; reallocate only when a packet outgrows it
            if sample_buf_frames < num_frames {
                sample_buf = None;
            }
            let buf = sample_buf.get_or_insert_with(|| {
                sample_buf_frames = num_frames;
                SampleBuffer::new(num_frames, spec)
            });

            buf.copy_interleaved_ref(decoded);
            mono.extend(downmix(buf.samples(), channels));
        }

        log::info!(
            "Loaded {} ({} samples, {} frames)",
            path.display(),
            mono.len(),
            mono.len().div_ceil(frame_size.max(1))
        );

        Ok(Self::from_samples(mono, frame_size, path.display().to_string()))
    }

    /// Serve already-decoded mono samples.
    pub fn from_samples(samples: Vec<i16>, frame_size: usize, name: impl Into<String>) -> Self {
        Self {
            samples,
            position: 0,
            frame_size: frame_size.max(1),
            name: name.into(),
        }
    }

    pub fn remaining_frames(&self) -> usize {
        (self.samples.len() - self.position).div_ceil(self.frame_size)
    }
}

impl SampleSource for FileSource {
    fn read(&mut self) -> Result<AudioFrame, CaptureError> {
        if self.position >= self.samples.len() {
            return Err(CaptureError::EndOfStream);
        }
        let end = (self.position + self.frame_size).min(self.samples.len());
        let mut frame = self.samples[self.position..end].to_vec();
        frame.resize(self.frame_size, 0);
        self.position = end;
        Ok(AudioFrame::new(frame))
    }

    fn describe(&self) -> String {
        self.name.clone()
    }
}

fn downmix(interleaved: &[i16], channels: usize) -> impl Iterator<Item = i16> + '_ {
    interleaved.chunks(channels).map(|frame| {
        let sum: i32 = frame.iter().map(|&s| s as i32).sum();
        (sum / frame.len() as i32) as i16
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frames_are_fixed_size_and_padded() {
        let mut source = FileSource::from_samples((1..=5).collect(), 2, "mem");
        assert_eq!(source.remaining_frames(), 3);
        assert_eq!(source.read().unwrap().samples(), &[1, 2]);
        assert_eq!(source.read().unwrap().samples(), &[3, 4]);
        assert_eq!(source.read().unwrap().samples(), &[5, 0]);
        assert!(matches!(source.read(), Err(CaptureError::EndOfStream)));
    }

    #[test]
    fn test_empty_recording_ends_immediately() {
        let mut source = FileSource::from_samples(Vec::new(), 1024, "mem");
        assert_eq!(source.remaining_frames(), 0);
        assert!(matches!(source.read(), Err(CaptureError::EndOfStream)));
    }

    #[test]
    fn test_downmix_averages_channels() {
        let mixed: Vec<i16> = downmix(&[100, 300, -200, 200, i16::MAX, i16::MAX], 2).collect();
        assert_eq!(mixed, vec![200, 0, i16::MAX]);
    }

    #[test]
    fn test_missing_file_is_decode_error() {
        let err = FileSource::open(Path::new("/nonexistent/input.wav"), 1024).err().unwrap();
        assert!(matches!(err, CaptureError::Decode { .. }));
    }
}
