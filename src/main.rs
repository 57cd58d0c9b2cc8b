use std::sync::Arc;
use std::time::Duration;

use log::{error, info};

use fme_detect::capture::SyntheticCapture;
use fme_detect::config::{self, Config};
use fme_detect::detect::freq_search::FreqSearchParams;
use fme_detect::detect::recording_buffer::RecordingBufferParams;
use fme_detect::detect::supervisor::{PipelineSupervisor, SupervisorParams};
use fme_detect::detect::tone_assembler::ToneAssemblerParams;
use fme_detect::dsp::designer::design_lowpass_from_transition;
use fme_detect::dsp::downsampler::FullDownsampler;
use fme_detect::dsp::fir::FilterSpec;
use fme_detect::monitoring::Metrics;
use fme_detect::notify::LoggingNotificationSink;
use fme_detect::sink::WavSink;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cfg_path = std::env::args().nth(1).unwrap_or_else(|| "config.toml".into());
    let cfg: Config = config::load(&cfg_path)?;
    info!("[fme-detect] loaded {}", cfg_path);

    let running = Arc::new(std::sync::atomic::AtomicBool::new(true));
    {
        let r = running.clone();
        ctrlc::set_handler(move || {
            info!("[fme-detect] shutdown requested");
            r.store(false, std::sync::atomic::Ordering::SeqCst);
        })?;
    }

    if let Some(mon) = &cfg.monitoring {
        let metrics = Arc::new(Metrics::new());
        let port = mon.http_port;
        std::thread::spawn(move || {
            let rt = tokio::runtime::Runtime::new().expect("tokio runtime");
            if let Err(e) = rt.block_on(fme_detect::monitoring::run_status_server(metrics, port)) {
                error!("[monitoring] error: {e}");
            }
        });
        info!("[fme-detect] monitoring on port {}", port);
    }

    let fs = cfg.resampler.input_fs;
    let proc_b = design_lowpass_from_transition(
        cfg.resampler.trans_width_proc,
        cfg.resampler.cutoff_freq_proc,
        fs,
        500,
        1000,
    )?;
    let rec_b = design_lowpass_from_transition(
        cfg.resampler.trans_width_rec,
        cfg.resampler.cutoff_freq_rec,
        fs,
        500,
        1000,
    )?;
    let proc_spec = FilterSpec::new(proc_b, 1, cfg.resampler.downsample_factor_proc, 1e-9)?;
    let rec_spec = FilterSpec::new(rec_b, 1, cfg.resampler.downsample_factor_rec, 1e-9)?;
    let downsampler = FullDownsampler::new(proc_spec, rec_spec)?;

    let proc_fs = fs / cfg.resampler.downsample_factor_proc as f64;
    let rec_fs = fs / cfg.resampler.downsample_factor_rec as f64;

    let freq_search_params = FreqSearchParams {
        sample_length_ms: cfg.freq_search.sample_length_ms,
        freq_resolution_n: cfg.freq_search.freq_resolution_n,
        fs: proc_fs,
        max_num_peaks: cfg.freq_search.max_num_peaks,
        overlap: cfg.freq_search.overlap,
        delta: cfg.freq_search.delta,
    };

    let tone_assembler_params = ToneAssemblerParams {
        code_length: cfg.tone_assembler.code_length,
        excess_time: cfg.tone_assembler.excess_time(),
        dt_max_twice: cfg.tone_assembler.dt_max_twice(),
        min_length: cfg.tone_assembler.min_length(),
        max_length: cfg.tone_assembler.max_length(),
        max_tone_level_ratio: cfg.tone_assembler.max_tone_level_ratio,
    };

    let recording_params = RecordingBufferParams {
        record_time_lower: cfg.recording.record_time_lower(),
        record_time_upper: cfg.recording.record_time_upper(),
        storing_fs: cfg.recording.storing_fs,
        record_time_buffer: cfg.recording.record_time_buffer(),
    };

    let whitelist: Vec<Vec<usize>> = cfg
        .supervisor
        .whitelist
        .iter()
        .map(|s| s.chars().filter_map(|c| c.to_digit(10)).map(|d| d as usize).collect())
        .collect();

    let supervisor_params = SupervisorParams {
        tone_table: cfg.tone_table(),
        tone_match_tolerance_hz: 10.0,
        min_distance_repetition: Duration::from_secs_f64(cfg.supervisor.min_distance_repetition_s),
        record_time_upper: cfg.recording.record_time_upper(),
        whitelist,
        default_recording: cfg.supervisor.default_recording,
    };

    let supervisor = PipelineSupervisor::new(
        supervisor_params,
        freq_search_params,
        tone_assembler_params,
        downsampler,
        recording_params,
        rec_fs,
        10_000,
    )?;

    // No ALSA device requested in this example run: exercise the
    // pipeline against silence so the binary is runnable standalone.
    // A real deployment supplies an `alsa`-backed `AudioCapture`.
    let capture = SyntheticCapture::new(vec![0.0; 0], 4096, fs);
    let sink = WavSink;
    let notify = LoggingNotificationSink;

    info!("[fme-detect] running");
    supervisor.run(capture, &sink, &notify)?;
    info!("[fme-detect] shutdown complete");
    Ok(())
}
