//! Blipstep CLI: real-time player and offline renderer for chip-style scenes.

use blipstep_engine::{Engine, Scene};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::error::Error;
use std::str::FromStr;
use std::time::Duration;
use tracing::{error, info, warn};

/// NES (NTSC) CPU clock; any rate up to ~2^20 clocks per sample works.
const DEFAULT_CLOCK_RATE: f64 = 1_789_773.0;
const DEFAULT_SAMPLE_RATE: u32 = 48_000;
const DEFAULT_GAIN: f32 = 0.8;
const DEFAULT_SCENE: &str = "chiptune";
/// Offline renders stop here unless `--duration` says otherwise.
const DEFAULT_OFFLINE_SECS: u64 = 5;
/// Frames rendered per engine call; device callbacks are served in blocks of this.
const BLOCK_FRAMES: usize = 1024;

#[derive(Debug, Default)]
struct Args {
    list_devices: bool,
    device_name: Option<String>,
    sample_rate: Option<u32>,
    channels: Option<u16>,
    duration_sec: Option<u64>,
    scene: Option<String>,
    gain: Option<f32>,
    clock_rate: Option<f64>,
    seed: Option<u64>,
    offline: bool,
}

fn parse_args<I: IntoIterator<Item = String>>(argv: I) -> Args {
    let mut a = Args::default();
    for arg in argv {
        let (key, value) = match arg.split_once('=') {
            Some((k, v)) => (k, Some(v)),
            None => (arg.as_str(), None),
        };
        match (key, value) {
            ("--list-devices", None)   => a.list_devices = true,
            ("--offline", None)        => a.offline = true,
            ("--device", Some(v))      => a.device_name = Some(v.to_owned()),
            ("--scene", Some(v))       => a.scene = Some(v.to_owned()),
            ("--sample-rate", Some(v)) => a.sample_rate = flag_value(key, v),
            ("--channels", Some(v))    => a.channels = flag_value(key, v),
            ("--duration", Some(v))    => a.duration_sec = flag_value(key, v),
            ("--gain", Some(v))        => a.gain = flag_value(key, v),
            ("--clock-rate", Some(v))  => a.clock_rate = flag_value(key, v),
            ("--seed", Some(v))        => a.seed = flag_value(key, v),
            _ => warn!("unknown arg: {arg}"),
        }
    }
    a
}

fn flag_value<T: FromStr>(key: &str, raw: &str) -> Option<T> {
    let parsed = raw.parse().ok();
    if parsed.is_none() {
        warn!("ignoring {key}={raw}: not a valid value");
    }
    parsed
}

/// Print output device names, marking the host default with `*`.
fn list_output_devices(host: &cpal::Host) -> Result<(), Box<dyn Error>> {
    let default = host.default_output_device().and_then(|d| d.name().ok());
    println!("Output devices ({}):", host.id().name());
    for dev in host.output_devices()? {
        let name = dev.name()?;
        let mark = if default.as_deref() == Some(name.as_str()) { '*' } else { ' ' };
        println!("{mark} {name}");
    }
    Ok(())
}

fn find_output_device(host: &cpal::Host, wanted: Option<&str>) -> Result<cpal::Device, Box<dyn Error>> {
    let Some(wanted) = wanted else {
        return host.default_output_device().ok_or_else(|| "no default output device".into());
    };
    host.output_devices()?
        .find(|d| d.name().is_ok_and(|n| n == wanted))
        .ok_or_else(|| format!("output device {wanted:?} not found").into())
}

fn choose_config(
    device: &cpal::Device,
    req_sr: Option<u32>,
    req_ch: Option<u16>,
) -> Result<cpal::SupportedStreamConfig, Box<dyn Error>> {
    if req_sr.is_none() && req_ch.is_none() {
        return Ok(device.default_output_config()?);
    }

    // Score each range: sample rate distance dominates channel mismatch.
    let mut best: Option<(u64, cpal::SupportedStreamConfigRange)> = None;
    for range in device.supported_output_configs()? {
        let ch     = range.channels();
        let sr_min = range.min_sample_rate().0;
        let sr_max = range.max_sample_rate().0;

        let ch_pen = req_ch.map_or(0, |c| u64::from(ch.abs_diff(c)));
        let sr_pen = match req_sr {
            Some(sr) if !(sr_min..=sr_max).contains(&sr) => u64::from(sr_min.abs_diff(sr).min(sr_max.abs_diff(sr))),
            _ => 0,
        };

        let score = sr_pen.saturating_mul(1000) + ch_pen;
        if best.as_ref().map_or(true, |(s, _)| score < *s) {
            best = Some((score, range));
        }
    }

    let (_, range) = best.ok_or_else(|| "no supported output configs".to_string())?;

    let pick_sr = match req_sr {
        Some(sr) => cpal::SampleRate(sr.clamp(range.min_sample_rate().0, range.max_sample_rate().0)),
        None => range.max_sample_rate(),
    };

    Ok(range.with_sample_rate(pick_sr))
}

fn make_scene(args: &Args) -> Scene {
    let name = args.scene.as_deref().unwrap_or(DEFAULT_SCENE).to_ascii_lowercase();
    let seed = args.seed.unwrap_or(0);
    let mut scene = Scene::by_name(&name, seed).unwrap_or_else(|| {
        warn!("unknown scene {name:?}, using {DEFAULT_SCENE}");
        Scene::chiptune(seed)
    });
    scene.set_gain(args.gain.unwrap_or(DEFAULT_GAIN));
    scene
}

/// Render without a device and report what came out.
fn render_offline(args: &Args) -> Result<(), Box<dyn Error>> {
    let sample_rate = args.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE);
    let channels = usize::from(args.channels.unwrap_or(2)).clamp(1, 2);
    let clock_rate = args.clock_rate.unwrap_or(DEFAULT_CLOCK_RATE);
    let secs = args.duration_sec.unwrap_or(DEFAULT_OFFLINE_SECS);

    let mut engine = Engine::new(make_scene(args), channels, clock_rate, f64::from(sample_rate))?;
    let total = usize::try_from(u64::from(sample_rate).saturating_mul(secs))?;

    let mut block = vec![0i16; BLOCK_FRAMES * channels];
    let mut frames = 0usize;
    let mut peak = 0u16;
    while frames < total {
        let want = (total - frames).min(BLOCK_FRAMES);
        let n = engine.render_interleaved(&mut block[..want * channels])?;
        if n == 0 {
            break;
        }
        peak = block[..n * channels].iter().fold(peak, |p, s| p.max(s.unsigned_abs()));
        frames += n;
    }

    info!(frames, channels, sample_rate, clock_rate, peak, "offline render done");
    Ok(())
}

fn build_stream<T>(
    device: &cpal::Device,
    cfg: &cpal::StreamConfig,
    mut engine: Engine<Scene>,
    err_fn: impl Fn(cpal::StreamError) + Send + 'static,
) -> Result<cpal::Stream, Box<dyn Error>>
where
    T: cpal::Sample + cpal::FromSample<i16> + cpal::SizedSample + Send + 'static,
{
    let channels = usize::from(cfg.channels).max(1);
    let rendered = engine.channel_count();

    // Allocated once here; callbacks larger than a block are served in pieces.
    let mut scratch = vec![0i16; BLOCK_FRAMES * rendered];
    let mut failed = false;

    // ~1 second meter at the stream rate
    let meter_interval = (cfg.sample_rate.0).max(1) as usize;
    let mut meter_count: usize = 0;
    let mut meter_peak: u16 = 0;

    let stream = device.build_output_stream(
        cfg,
        move |output: &mut [T], _| {
            for block in output.chunks_mut(BLOCK_FRAMES * channels) {
                let frames = block.len() / channels;
                let buf = &mut scratch[..frames * rendered];

                match engine.render_interleaved(buf) {
                    Ok(n) => buf[n * rendered..].fill(0),
                    Err(e) => {
                        if !failed {
                            error!("render failed, output muted: {e}");
                            failed = true;
                        }
                        buf.fill(0);
                    }
                }

                // Extra device channels repeat the last rendered one.
                for (frame, src) in block.chunks_mut(channels).zip(buf.chunks(rendered)) {
                    for (c, out) in frame.iter_mut().enumerate() {
                        let s = src[c.min(rendered - 1)];
                        *out = T::from_sample(s);
                        meter_peak = meter_peak.max(s.unsigned_abs());
                    }
                    meter_count += 1;
                    if meter_count >= meter_interval {
                        info!("peak ~ {:.3}", f32::from(meter_peak) / 32768.0);
                        meter_peak = 0;
                        meter_count = 0;
                    }
                }
            }
        },
        err_fn,
        None,
    )?;

    Ok(stream)
}

fn main() -> Result<(), Box<dyn Error>> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let args = parse_args(std::env::args().skip(1));

    if args.list_devices {
        list_output_devices(&cpal::default_host())?;
        return Ok(());
    }
    if args.offline {
        return render_offline(&args);
    }

    let host    = cpal::default_host();
    let device  = find_output_device(&host, args.device_name.as_deref())?;
    let sup_cfg = choose_config(&device, args.sample_rate, args.channels)?;
    let sample_format = sup_cfg.sample_format();
    let mut cfg = sup_cfg.config();

    if let Some(sr) = args.sample_rate { cfg.sample_rate = cpal::SampleRate(sr); }
    if let Some(ch) = args.channels    { cfg.channels    = ch; }

    let clock_rate = args.clock_rate.unwrap_or(DEFAULT_CLOCK_RATE);
    let engine = Engine::new(
        make_scene(&args),
        usize::from(cfg.channels),
        clock_rate,
        f64::from(cfg.sample_rate.0),
    )?;

    info!(device = %device.name()?, ?cfg, ?sample_format, "stream config");
    info!(
        scene = args.scene.as_deref().unwrap_or(DEFAULT_SCENE),
        seed = args.seed.unwrap_or(0),
        clock_rate,
        "playing"
    );
    if let Some(d) = args.duration_sec { info!("auto-stop after {d} seconds"); }
    info!("press Ctrl+C to stop");

    let err_fn = |e: cpal::StreamError| error!("stream error: {e}");

    let stream = match sample_format {
        cpal::SampleFormat::F32 => build_stream::<f32>(&device, &cfg, engine, err_fn)?,
        cpal::SampleFormat::I16 => build_stream::<i16>(&device, &cfg, engine, err_fn)?,
        cpal::SampleFormat::U16 => build_stream::<u16>(&device, &cfg, engine, err_fn)?,
        other => return Err(format!("unsupported device sample format: {other:?}").into()),
    };

    stream.play()?;

    if let Some(d) = args.duration_sec {
        std::thread::sleep(Duration::from_secs(d));
        return Ok(());
    }

    loop { std::thread::sleep(Duration::from_millis(500)); }
}
