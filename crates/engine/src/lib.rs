use ambience_decode::AudioBuffer;
use basedrop::{Collector, Handle, Shared};
use cpal::{
    FromSample, SizedSample,
    traits::{DeviceTrait, HostTrait, StreamTrait},
};
use log::{debug, error, info};

/// Upper bound on simultaneously loaded voices. The audio thread's voice
/// table is allocated with this capacity up front.
pub const MAX_VOICES: usize = 32;

const COMMAND_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VoiceId(pub u64);

pub enum Command {
    Insert {
        id: VoiceId,
        audio: Shared<AudioBuffer>,
        gain: f32,
    },
    Play(VoiceId),
    Pause(VoiceId),
    Rewind(VoiceId),
    SetGain(VoiceId, f32),
    Remove(VoiceId),
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("command queue is full")]
    QueueFull,

    #[error("voice limit of {MAX_VOICES} reached")]
    TooManyVoices,

    #[error("audio buffer is empty")]
    EmptyBuffer,
}

/// One looping buffer inside the mixer.
pub struct Voice {
    id: VoiceId,
    audio: Shared<AudioBuffer>,
    frame: usize,
    gain: f32,
    playing: bool,
}

impl Voice {
    pub fn new(id: VoiceId, audio: Shared<AudioBuffer>, gain: f32) -> Self {
        Self {
            id,
            audio,
            frame: 0,
            gain,
            playing: false,
        }
    }

    pub fn id(&self) -> VoiceId {
        self.id
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn position(&self) -> usize {
        self.frame
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }
}

/// Apply a control command to the voice table. Runs on the audio thread, so
/// it must not allocate: `voices` is created with `MAX_VOICES` capacity and
/// inserts beyond that are dropped (the control side refuses them first).
pub fn apply(voices: &mut Vec<Voice>, command: Command) {
    match command {
        Command::Insert { id, audio, gain } => {
            if voices.len() < voices.capacity() {
                voices.push(Voice::new(id, audio, gain));
            }
        }
        Command::Play(id) => with_voice(voices, id, |v| v.playing = true),
        Command::Pause(id) => with_voice(voices, id, |v| v.playing = false),
        Command::Rewind(id) => with_voice(voices, id, |v| v.frame = 0),
        Command::SetGain(id, gain) => with_voice(voices, id, |v| v.gain = gain),
        Command::Remove(id) => {
            if let Some(index) = voices.iter().position(|v| v.id == id) {
                // Dropping the Shared buffer only enqueues it for the collector.
                voices.swap_remove(index);
            }
        }
    }
}

fn with_voice(voices: &mut [Voice], id: VoiceId, f: impl FnOnce(&mut Voice)) {
    if let Some(voice) = voices.iter_mut().find(|v| v.id == id) {
        f(voice);
    }
}

/// Mix every playing voice into `data` (interleaved, `output_channels` wide),
/// advancing and wrapping each voice so it loops forever.
pub fn mix_frames<T>(voices: &mut [Voice], data: &mut [T], output_channels: usize)
where
    T: SizedSample + FromSample<f32>,
{
    for frame in data.chunks_mut(output_channels) {
        for (ch, sample) in frame.iter_mut().enumerate() {
            let mut mixed = 0.0f32;
            for voice in voices.iter().filter(|v| v.playing) {
                let channels = voice.audio.channels as usize;
                if channels == 0 {
                    continue;
                }
                let idx = voice.frame * channels + ch % channels;
                if let Some(value) = voice.audio.samples.get(idx) {
                    mixed += value * voice.gain;
                }
            }
            *sample = T::from_sample(mixed);
        }

        for voice in voices.iter_mut().filter(|v| v.playing) {
            let frames = voice.audio.frames();
            if frames == 0 {
                continue;
            }
            voice.frame = (voice.frame + 1) % frames;
        }
    }
}

pub struct MixerHandle {
    // Dropped first: the stream owns the voice table, whose buffers must be
    // released before the collector goes away.
    _stream: cpal::Stream,
    commands: rtrb::Producer<Command>,
    collector: Collector,
    handle: Handle,
    voice_count: usize,
    sample_rate: u32,
}

impl MixerHandle {
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn voice_count(&self) -> usize {
        self.voice_count
    }

    /// Hand a decoded buffer to the audio thread as a new, paused voice.
    pub fn insert(&mut self, id: VoiceId, audio: AudioBuffer, gain: f32) -> Result<(), EngineError> {
        if audio.is_empty() {
            return Err(EngineError::EmptyBuffer);
        }
        if self.voice_count >= MAX_VOICES {
            return Err(EngineError::TooManyVoices);
        }
        let audio = Shared::new(&self.handle, audio);
        self.push(Command::Insert { id, audio, gain })?;
        self.voice_count += 1;
        Ok(())
    }

    pub fn play(&mut self, id: VoiceId) -> Result<(), EngineError> {
        self.push(Command::Play(id))
    }

    pub fn pause(&mut self, id: VoiceId) -> Result<(), EngineError> {
        self.push(Command::Pause(id))
    }

    pub fn rewind(&mut self, id: VoiceId) -> Result<(), EngineError> {
        self.push(Command::Rewind(id))
    }

    pub fn set_gain(&mut self, id: VoiceId, gain: f32) -> Result<(), EngineError> {
        self.push(Command::SetGain(id, gain))
    }

    pub fn remove(&mut self, id: VoiceId) -> Result<(), EngineError> {
        self.push(Command::Remove(id))?;
        self.voice_count = self.voice_count.saturating_sub(1);
        Ok(())
    }

    // Frees buffers from voices the audio thread has already removed. A
    // buffer removed by this push is freed on a later one.
    fn push(&mut self, command: Command) -> Result<(), EngineError> {
        self.collector.collect();
        self.commands
            .push(command)
            .map_err(|_| EngineError::QueueFull)
    }
}

pub fn start() -> anyhow::Result<MixerHandle> {
    let collector = Collector::new();
    let handle = collector.handle();

    let (command_tx, command_rx) = rtrb::RingBuffer::<Command>::new(COMMAND_CAPACITY);

    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| anyhow::anyhow!("no output device found"))?;

    let config = device.default_output_config()?;
    let sample_rate = config.sample_rate().0;
    let channels = config.channels();

    let stream = match config.sample_format() {
        cpal::SampleFormat::F32 => build_stream::<f32>(&device, &config.into(), command_rx)?,
        sample_format => anyhow::bail!("unsupported sample format '{sample_format}'"),
    };

    stream.play()?;
    info!("mixer running at {sample_rate} Hz, {channels} channels");

    Ok(MixerHandle {
        _stream: stream,
        commands: command_tx,
        collector,
        handle,
        voice_count: 0,
        sample_rate,
    })
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut command_rx: rtrb::Consumer<Command>,
) -> anyhow::Result<cpal::Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let output_channels = config.channels as usize;
    let mut voices: Vec<Voice> = Vec::with_capacity(MAX_VOICES);
    debug!("building output stream: {config:?}");

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            while let Ok(command) = command_rx.pop() {
                apply(&mut voices, command);
            }
            mix_frames(&mut voices, data, output_channels);
        },
        |err| error!("stream error: {err}"),
        None,
    )?;

    Ok(stream)
}
