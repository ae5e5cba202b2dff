//! WAV encoding
//!
//! Output is always 16-bit PCM mono; samples are hard-clamped to `[-1, 1]`.

use std::io::{Cursor, Seek, Write};
use std::path::Path;

use hound::{SampleFormat, WavSpec, WavWriter};
use tts_demo_config::constants::audio;
use tts_demo_core::{AudioBuffer, Error, Result};

fn spec(sample_rate: u32) -> WavSpec {
    WavSpec {
        channels: audio::CHANNELS,
        sample_rate,
        bits_per_sample: audio::BITS_PER_SAMPLE,
        sample_format: SampleFormat::Int,
    }
}

fn io_err(e: hound::Error) -> Error {
    match e {
        hound::Error::IoError(e) => Error::FileIo(e),
        other => Error::FileIo(std::io::Error::other(other.to_string())),
    }
}

fn write_samples<W: Write + Seek>(writer: W, buffer: &AudioBuffer) -> Result<()> {
    let mut wav = WavWriter::new(writer, spec(buffer.sample_rate)).map_err(io_err)?;
    for &sample in &buffer.samples {
        let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        wav.write_sample(value).map_err(io_err)?;
    }
    wav.finalize().map_err(io_err)
}

/// Write `buffer` as a WAV file at `path`
pub fn write_wav(buffer: &AudioBuffer, path: impl AsRef<Path>) -> Result<()> {
    let file = std::io::BufWriter::new(std::fs::File::create(path.as_ref())?);
    write_samples(file, buffer)
}

/// Encode `buffer` as in-memory WAV bytes
pub fn encode_wav(buffer: &AudioBuffer) -> Result<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());
    write_samples(&mut cursor, buffer)?;
    Ok(cursor.into_inner())
}
