//! `cpal` device backend.
//!
//! `cpal::Stream` is not `Send`, so both streams are built and owned by a
//! dedicated `audio-devices` thread. The [`AudioSession`] talks to that thread
//! through a command channel; dropping the session stops it and closes the
//! streams.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::mpsc as std_mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio::sync::mpsc;

use super::{AudioBackend, AudioDevices, AudioSession, AudioSpec, QueuedPlayback};
use crate::error::ConsultError;

/// Default host input and output devices.
#[derive(Debug, Default, Clone, Copy)]
pub struct CpalBackend;

enum DeviceCommand {
    Resume,
    Release,
}

impl AudioBackend for CpalBackend {
    fn acquire(&self, spec: &AudioSpec) -> Result<AudioSession, ConsultError> {
        let (frame_tx, frame_rx) = mpsc::unbounded_channel();
        let (ended_tx, ended_rx) = mpsc::unbounded_channel();
        let playback = Arc::new(QueuedPlayback::new(spec.playback_sample_rate, ended_tx));
        let (ready_tx, ready_rx) = std_mpsc::channel();
        let (cmd_tx, cmd_rx) = std_mpsc::channel();

        let thread_spec = spec.clone();
        let thread_playback = Arc::clone(&playback);
        let handle = std::thread::Builder::new()
            .name("audio-devices".into())
            .spawn(move || device_thread(thread_spec, frame_tx, thread_playback, ready_tx, cmd_rx))
            .map_err(|e| ConsultError::Device(format!("failed to spawn audio thread: {e}")))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = handle.join();
                return Err(e);
            }
            Err(_) => {
                let _ = handle.join();
                return Err(ConsultError::Device(
                    "audio thread exited during setup".into(),
                ));
            }
        }

        Ok(AudioSession::new(
            frame_rx,
            ended_rx,
            playback,
            spec.playback_sample_rate,
            Box::new(CpalDevices {
                cmd_tx,
                thread: Some(handle),
            }),
        ))
    }
}

struct CpalDevices {
    cmd_tx: std_mpsc::Sender<DeviceCommand>,
    thread: Option<JoinHandle<()>>,
}

impl AudioDevices for CpalDevices {
    fn resume(&self) {
        let _ = self.cmd_tx.send(DeviceCommand::Resume);
    }
}

impl Drop for CpalDevices {
    fn drop(&mut self) {
        let _ = self.cmd_tx.send(DeviceCommand::Release);
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                tracing::warn!("Audio device thread panicked during release");
            }
        }
    }
}

struct Streams {
    input: cpal::Stream,
    output: cpal::Stream,
}

impl Streams {
    fn resume(&self) {
        if let Err(e) = self.input.play() {
            tracing::warn!(error = %e, "Failed to resume capture stream");
        }
        if let Err(e) = self.output.play() {
            tracing::warn!(error = %e, "Failed to resume playback stream");
        }
    }
}

fn device_thread(
    spec: AudioSpec,
    frame_tx: mpsc::UnboundedSender<Vec<f32>>,
    playback: Arc<QueuedPlayback>,
    ready_tx: std_mpsc::Sender<Result<(), ConsultError>>,
    cmd_rx: std_mpsc::Receiver<DeviceCommand>,
) {
    let streams = match open_streams(&spec, frame_tx, playback) {
        Ok(streams) => {
            let _ = ready_tx.send(Ok(()));
            streams
        }
        Err(e) => {
            tracing::warn!(error = %e, "Audio device setup failed");
            let _ = ready_tx.send(Err(e));
            return;
        }
    };

    while let Ok(cmd) = cmd_rx.recv() {
        match cmd {
            DeviceCommand::Resume => streams.resume(),
            DeviceCommand::Release => break,
        }
    }

    drop(streams);
    tracing::debug!("Audio devices closed");
}

fn open_streams(
    spec: &AudioSpec,
    frame_tx: mpsc::UnboundedSender<Vec<f32>>,
    playback: Arc<QueuedPlayback>,
) -> Result<Streams, ConsultError> {
    let host = cpal::default_host();
    let mic = host
        .default_input_device()
        .ok_or_else(|| ConsultError::Device("no input device available".into()))?;
    let speaker = host
        .default_output_device()
        .ok_or_else(|| ConsultError::Device("no output device available".into()))?;

    let capture = &spec.capture;
    tracing::info!(
        input = %mic.name().unwrap_or_else(|_| "unknown".into()),
        output = %speaker.name().unwrap_or_else(|_| "unknown".into()),
        capture_rate = capture.sample_rate,
        playback_rate = spec.playback_sample_rate,
        frame_samples = capture.frame_samples,
        echo_cancellation = capture.echo_cancellation,
        noise_suppression = capture.noise_suppression,
        auto_gain_control = capture.auto_gain_control,
        "Opening audio devices"
    );

    let capture_config = cpal::StreamConfig {
        channels: capture.channels,
        sample_rate: cpal::SampleRate(capture.sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };
    let frame_samples = capture.frame_samples;
    let mut pending: Vec<f32> = Vec::with_capacity(frame_samples);

    let input = mic.build_input_stream(
        &capture_config,
        move |data: &[f32], _: &cpal::InputCallbackInfo| {
            for &sample in data {
                pending.push(sample);
                if pending.len() == frame_samples {
                    let frame =
                        std::mem::replace(&mut pending, Vec::with_capacity(frame_samples));
                    // Receiver gone means the call is over.
                    let _ = frame_tx.send(frame);
                }
            }
        },
        |err| tracing::warn!(error = %err, "Capture stream error"),
        None,
    )?;

    let playback_config = cpal::StreamConfig {
        channels: 1,
        sample_rate: cpal::SampleRate(spec.playback_sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };
    let output = speaker.build_output_stream(
        &playback_config,
        move |data: &mut [f32], _: &cpal::OutputCallbackInfo| playback.render(data),
        |err| tracing::warn!(error = %err, "Playback stream error"),
        None,
    )?;

    input.play()?;
    output.play()?;

    Ok(Streams { input, output })
}
