use std::fs::File;
use std::path::{Path, PathBuf};

use ambience_catalog::SourceLocator;
use anyhow::Context;
use log::debug;
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

pub const SOUNDS_ROOT: &str = "sounds";

/// Decoded, interleaved audio.
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioBuffer {
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / self.channels as usize
    }

    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Resolve a locator to an existing file on disk.
/// Accepts `file://` URIs, plain paths, and paths relative to the sounds root
/// (e.g. `rain.ogg` for `sounds/rain.ogg`).
pub fn resolve_source(locator: &SourceLocator) -> Option<PathBuf> {
    resolve_source_in(locator, Path::new(SOUNDS_ROOT))
}

pub fn resolve_source_in(locator: &SourceLocator, root: &Path) -> Option<PathBuf> {
    let path = locator.to_path()?;

    if path.exists() {
        return Some(path);
    }

    let with_root = root.join(&path);
    if with_root.exists() {
        return Some(with_root);
    }

    None
}

/// Resolve, decode and resample a track source for an output running at
/// `target_sample_rate`.
pub fn load_source(locator: &SourceLocator, target_sample_rate: u32) -> anyhow::Result<AudioBuffer> {
    let path = match resolve_source(locator) {
        Some(path) => path,
        None if locator.to_path().is_none() => {
            anyhow::bail!("unsupported locator scheme: {locator}")
        }
        None => anyhow::bail!("sound not found: {locator}"),
    };

    let decoded = decode_file(&path).with_context(|| format!("failed to decode {locator}"))?;
    if decoded.is_empty() {
        anyhow::bail!("{locator} contains no audio");
    }
    debug!(
        "decoded {locator}: {} frames, {} Hz, {} channels",
        decoded.frames(),
        decoded.sample_rate,
        decoded.channels
    );

    resample(&decoded, target_sample_rate).with_context(|| format!("failed to resample {locator}"))
}

pub fn decode_file(path: &Path) -> anyhow::Result<AudioBuffer> {
    let file = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;

    let mut format = probed.format;

    let track = format
        .default_track()
        .ok_or_else(|| anyhow::anyhow!("no default track"))?;

    let sample_rate = track.codec_params.sample_rate.unwrap_or(44100);
    let channels = track.codec_params.channels.map(|c| c.count()).unwrap_or(2) as u16;
    let track_id = track.id;

    let mut decoder =
        symphonia::default::get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

    let mut samples = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(e.into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = decoder.decode(&packet)?;
        let spec = *decoded.spec();
        let duration = decoded.capacity() as u64;

        let mut sample_buf = SampleBuffer::<f32>::new(duration, spec);
        sample_buf.copy_interleaved_ref(decoded);
        samples.extend_from_slice(sample_buf.samples());
    }

    Ok(AudioBuffer {
        samples,
        sample_rate,
        channels,
    })
}

const SINC_LEN: usize = 256;

/// Resample to `target_sample_rate`, cloning when the rate already matches.
///
/// The buffer is treated as one period of a loop: the input is wrapped with
/// its own tail and head so the filter never sees silence at the edges, and
/// the output is exactly `ceil(frames * ratio)` frames long.
pub fn resample(buffer: &AudioBuffer, target_sample_rate: u32) -> anyhow::Result<AudioBuffer> {
    if buffer.sample_rate == target_sample_rate || buffer.is_empty() {
        return Ok(AudioBuffer {
            sample_rate: target_sample_rate,
            ..buffer.clone()
        });
    }

    let channels = buffer.channels as usize;
    let input_frames = buffer.frames();

    let resample_ratio = target_sample_rate as f64 / buffer.sample_rate as f64;
    let output_frames = (input_frames as f64 * resample_ratio).ceil() as usize;

    // rubato wants one Vec per channel
    let pad = SINC_LEN;
    let padded_frames = input_frames + 2 * pad;
    let mut input_channels = vec![Vec::with_capacity(padded_frames); channels];
    for i in 0..padded_frames {
        let frame_idx = (i as isize - pad as isize).rem_euclid(input_frames as isize) as usize;
        for (ch, channel) in input_channels.iter_mut().enumerate() {
            channel.push(buffer.samples[frame_idx * channels + ch]);
        }
    }

    let params = SincInterpolationParameters {
        sinc_len: SINC_LEN,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let mut resampler =
        SincFixedIn::<f32>::new(resample_ratio, 2.0, params, padded_frames, channels)?;

    let mut output_channels = resampler.process(&input_channels, None)?;
    let tail = resampler.process_partial(None::<&[Vec<f32>]>, None)?;
    for (channel, rest) in output_channels.iter_mut().zip(tail) {
        channel.extend(rest);
    }

    // Output frame `skip` lines up with input frame 0.
    let skip = (pad as f64 * resample_ratio).round() as usize + resampler.output_delay();
    let available = output_channels[0].len();
    if available < skip + output_frames {
        anyhow::bail!(
            "resampler produced {available} frames, needed {}",
            skip + output_frames
        );
    }

    let mut output_samples = Vec::with_capacity(output_frames * channels);
    for frame_idx in skip..skip + output_frames {
        for channel in &output_channels {
            output_samples.push(channel[frame_idx]);
        }
    }

    Ok(AudioBuffer {
        samples: output_samples,
        sample_rate: target_sample_rate,
        channels: buffer.channels,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;
    use tempfile::tempdir;

    fn write_sine_wav(path: &Path, sample_rate: u32, channels: u16, frames: usize) {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).expect("create wav");
        for i in 0..frames {
            let t = i as f32 / sample_rate as f32;
            let value = ((2.0 * PI * 440.0 * t).sin() * 0.5 * i16::MAX as f32) as i16;
            for _ in 0..channels {
                writer.write_sample(value).expect("write sample");
            }
        }
        writer.finalize().expect("finalize wav");
    }

    #[test]
    fn test_decode_wav() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("tone.wav");
        write_sine_wav(&path, 44100, 2, 4410);

        let buffer = decode_file(&path).expect("decode");

        assert_eq!(buffer.sample_rate, 44100);
        assert_eq!(buffer.channels, 2);
        assert_eq!(buffer.frames(), 4410);
        assert!((buffer.duration_secs() - 0.1).abs() < 0.001);
        assert!(buffer.samples.iter().all(|s| s.abs() <= 1.0));
    }

    #[test]
    fn test_decode_missing_file() {
        assert!(decode_file(Path::new("/nonexistent/tone.wav")).is_err());
    }

    #[test]
    fn test_decode_garbage_fails() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("garbage.wav");
        std::fs::write(&path, b"definitely not a riff header").expect("write garbage");

        assert!(decode_file(&path).is_err());
    }

    #[test]
    fn test_resolve_source_prefers_direct_path() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("rain.wav");
        write_sine_wav(&path, 8000, 1, 10);

        let direct = SourceLocator(path.display().to_string());
        assert_eq!(resolve_source(&direct), Some(path.clone()));

        let uri = SourceLocator(format!("file://{}", path.display()));
        assert_eq!(resolve_source(&uri), Some(path));
    }

    #[test]
    fn test_resolve_source_under_root() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("fire.wav");
        write_sine_wav(&path, 8000, 1, 10);

        let relative = SourceLocator("fire.wav".to_string());
        assert_eq!(resolve_source_in(&relative, dir.path()), Some(path));

        let missing = SourceLocator("wind.wav".to_string());
        assert_eq!(resolve_source_in(&missing, dir.path()), None);
    }

    #[test]
    fn test_remote_locator_not_resolved() {
        let remote = SourceLocator("https://example.com/rain.mp3".to_string());
        assert_eq!(resolve_source(&remote), None);

        let err = load_source(&remote, 48000).expect_err("remote should fail");
        assert!(err.to_string().contains("unsupported locator scheme"));
    }

    #[test]
    fn test_load_source_resamples() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("waves.wav");
        write_sine_wav(&path, 44100, 1, 44100);

        let locator = SourceLocator(path.display().to_string());
        let buffer = load_source(&locator, 48000).expect("load");

        assert_eq!(buffer.sample_rate, 48000);
        assert_eq!(buffer.channels, 1);
        assert_eq!(buffer.frames(), 48000);
    }

    fn constant(frames: usize, channels: u16, sample_rate: u32) -> AudioBuffer {
        AudioBuffer {
            samples: vec![0.5; frames * channels as usize],
            sample_rate,
            channels,
        }
    }

    #[test]
    fn test_resampled_loop_has_no_seam() {
        let resampled = resample(&constant(44100, 1, 44100), 48000).expect("resample");

        assert_eq!(resampled.frames(), 48000);
        for (i, sample) in resampled.samples.iter().enumerate() {
            assert!((sample - 0.5).abs() < 0.005, "frame {i} is {sample}");
        }
        let last = resampled.samples[resampled.samples.len() - 1];
        assert!((last - resampled.samples[0]).abs() < 0.005);
    }

    #[test]
    fn test_resample_short_stereo_loop() {
        let resampled = resample(&constant(100, 2, 44100), 48000).expect("resample");

        assert_eq!(resampled.frames(), 109);
        assert_eq!(resampled.channels, 2);
        assert!(resampled.samples.iter().all(|s| (s - 0.5).abs() < 0.005));
    }

    #[test]
    fn test_resample_same_rate_is_identity() {
        let buffer = AudioBuffer {
            samples: vec![0.0, 0.25, 0.5, 0.75],
            sample_rate: 48000,
            channels: 2,
        };
        let resampled = resample(&buffer, 48000).expect("resample");
        assert_eq!(resampled.samples, buffer.samples);
        assert_eq!(resampled.frames(), 2);
    }
}
