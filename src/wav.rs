//! WAV assembler — lossless concatenation of synthesised segments.
//!
//! VOICEVOX returns a complete RIFF/WAVE file per `/synthesis` call (24 kHz,
//! mono, 16-bit PCM with the default query).  Gluing those files together
//! byte-wise would leave stray headers in the middle of the stream, so the
//! segments are decoded with [`hound`] and their frames re-written into one
//! file that carries the first segment's header parameters.

use std::{
    fmt, fs,
    path::{Path, PathBuf},
};

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use serde::Serialize;

use crate::error::{NarrationError, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Format parameters
// ─────────────────────────────────────────────────────────────────────────────

/// Header parameters that must agree across all segments of one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    pub float: bool,
}

impl From<WavSpec> for AudioFormat {
    fn from(spec: WavSpec) -> Self {
        Self {
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            bits_per_sample: spec.bits_per_sample,
            float: spec.sample_format == SampleFormat::Float,
        }
    }
}

impl From<AudioFormat> for WavSpec {
    fn from(f: AudioFormat) -> Self {
        WavSpec {
            channels: f.channels,
            sample_rate: f.sample_rate,
            bits_per_sample: f.bits_per_sample,
            sample_format: if f.float { SampleFormat::Float } else { SampleFormat::Int },
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} Hz/{} ch/{}-bit {}",
            self.sample_rate,
            self.channels,
            self.bits_per_sample,
            if self.float { "float" } else { "PCM" }
        )
    }
}

/// Summary of an assembled file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AudioInfo {
    pub format: AudioFormat,
    /// Frames per channel.
    pub frames: u32,
}

impl AudioInfo {
    pub fn duration_secs(&self) -> f64 {
        self.frames as f64 / self.format.sample_rate as f64
    }
}

/// Read the header of a WAV file.
pub fn probe(path: &Path) -> Result<AudioInfo> {
    let reader = WavReader::open(path)?;
    Ok(AudioInfo { format: reader.spec().into(), frames: reader.duration() })
}

// ─────────────────────────────────────────────────────────────────────────────
// Assembly
// ─────────────────────────────────────────────────────────────────────────────

/// Concatenate `segments` in order into `output`.
///
/// The output takes the format of the first segment; any later segment with
/// a different format fails with [`NarrationError::FormatMismatch`].  An empty
/// list fails with [`NarrationError::EmptyInput`].
///
/// Frames are written to `<output>.part` and renamed into place after the
/// writer is finalised, so `output` either appears complete or not at all.
pub fn assemble<P: AsRef<Path>>(segments: &[P], output: &Path) -> Result<AudioInfo> {
    let first = segments.first().ok_or(NarrationError::EmptyInput)?;
    let format: AudioFormat = WavReader::open(first.as_ref())?.spec().into();

    let partial = part_path(output);
    let frames = match write_frames(segments, format, &partial) {
        Ok(frames) => frames,
        Err(e) => {
            let _ = fs::remove_file(&partial);
            return Err(e);
        }
    };

    if let Err(e) = fs::rename(&partial, output) {
        let _ = fs::remove_file(&partial);
        return Err(NarrationError::io(output, e));
    }

    Ok(AudioInfo { format, frames })
}

fn part_path(output: &Path) -> PathBuf {
    let mut name = output.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

fn write_frames<P: AsRef<Path>>(segments: &[P], format: AudioFormat, dest: &Path) -> Result<u32> {
    let mut writer = WavWriter::create(dest, format.into())?;
    let mut frames = 0u32;

    for segment in segments {
        let path = segment.as_ref();
        let mut reader = WavReader::open(path)?;
        let found: AudioFormat = reader.spec().into();
        if found != format {
            return Err(NarrationError::FormatMismatch {
                path: path.to_path_buf(),
                expected: format,
                found,
            });
        }

        if format.float {
            for s in reader.samples::<f32>() {
                writer.write_sample(s?)?;
            }
        } else {
            for s in reader.samples::<i32>() {
                writer.write_sample(s?)?;
            }
        }
        frames += reader.duration();
    }

    writer.finalize()?;
    Ok(frames)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
