use clap::Parser;
use std::fs::File;
use std::time::{Duration, Instant};

mod analyser;
mod audio;
mod buffer;
mod cli;
mod sampler;
mod types;
mod ui;

use audio::{MicrophoneSource, list_input_devices};
use cli::Args;
use sampler::{Sampler, SystemClock};
use ui::{App, Command, draw_ui, handle_events, init_terminal, restore_terminal};

type MicSampler = Sampler<MicrophoneSource, SystemClock>;

fn init_logging(args: &Args) -> Result<(), anyhow::Error> {
    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(args.default_log_filter()),
    );
    if let Some(path) = &args.log_file {
        let file = File::create(path)?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }
    builder.init();
    Ok(())
}

fn start_capture(args: &Args, app: &mut App) -> Option<MicSampler> {
    match MicrophoneSource::open(args.device.as_deref(), args.fft_size) {
        Ok(source) => {
            log::info!(
                "Capture started on '{}' every {} ms",
                source.device_name(),
                args.period_ms
            );
            app.capture_started(source.device_name(), source.sample_rate());
            Some(Sampler::start(
                source,
                SystemClock,
                args.capacity,
                args.wrap_policy(),
                args.period(),
            ))
        }
        Err(e) => {
            log::error!("Could not open microphone: {}", e);
            app.capture_failed(e.to_string());
            None
        }
    }
}

fn main() -> Result<(), anyhow::Error> {
    let args = Args::parse();
    args.validate()?;
    init_logging(&args)?;

    if args.list_devices {
        for name in list_input_devices()? {
            println!("{}", name);
        }
        return Ok(());
    }

    let mut terminal = init_terminal()?;

    let cleanup = || {
        let _ = restore_terminal();
    };

    ctrlc::set_handler(move || {
        cleanup();
        std::process::exit(0);
    })?;

    let window_secs = args.period().as_secs_f64() * args.capacity as f64;
    let mut app = App::new(
        args.initial_threshold(),
        args.style,
        args.y_max,
        !args.no_threshold_line,
        window_secs,
    );

    let mut sampler: Option<MicSampler> = None;
    if args.autostart {
        sampler = start_capture(&args, &mut app);
    }

    let frame_duration = Duration::from_millis(16); // ~60 FPS

    loop {
        if let Some(s) = sampler.as_mut() {
            let threshold = app.threshold;
            if let Some(outcome) = s.poll(threshold, &mut app) {
                log::debug!(
                    "tick {} level {:.2} at {:.2}s slot {} {:?}",
                    outcome.tick,
                    outcome.level,
                    outcome.elapsed,
                    outcome.slot,
                    outcome.alert
                );
            }
        }

        handle_events(&mut app)?;

        match app.take_command() {
            Some(Command::StartCapture) => {
                sampler = start_capture(&args, &mut app);
            }
            Some(Command::StopCapture) => {
                if let Some(mut s) = sampler.take() {
                    s.stop();
                    log::info!("Capture stopped after {} ticks", s.session().ticks());
                }
                app.reset();
            }
            None => {}
        }

        if app.should_quit {
            break;
        }

        terminal.draw(|f| draw_ui(f, &app, Instant::now()))?;

        let wait = sampler
            .as_ref()
            .and_then(|s| s.ticker().time_until_due(Instant::now()))
            .map_or(frame_duration, |d| d.min(frame_duration));
        std::thread::sleep(wait);
    }

    restore_terminal()?;
    Ok(())
}
