mod cli;
mod fs;
mod output;

use clap::Parser;
use indicatif::ProgressBar;
use std::time::Instant;

use cli::Cli;
use output::*;
use timelapso::command::thread_count;
use timelapso::logging::init_logging;
use timelapso::{
    plan_transcode, JobEvent, Result, TimelapseError, TranscoderConfig, Transcoder,
};

/// Standard exit code for Ctrl+C
const EXIT_CANCELLED: i32 = 130;

fn main() {
    let cli = Cli::parse();

    let mut config = match TranscoderConfig::from_env() {
        Ok(config) => config,
        Err(e) => std::process::exit(report(&cli, &e)),
    };
    config.logging.level = Some(cli.log_level(config.logging.level.as_deref()).to_string());
    config.logging.json |= cli.log_json;
    init_logging(&config.logging);

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => std::process::exit(report(&cli, &TimelapseError::Io(e))),
    };

    let code = match runtime.block_on(run(&cli, config)) {
        Ok(()) => 0,
        Err(e) => report(&cli, &e),
    };
    std::process::exit(code);
}

/// Print the failure in the selected format and pick the exit code
fn report(cli: &Cli, error: &TimelapseError) -> i32 {
    if cli.json {
        print_error_json(error);
    } else if matches!(error, TimelapseError::Cancelled) {
        print_cancelled();
    } else {
        print_error_with_hint(error);
    }

    match error {
        TimelapseError::Cancelled => EXIT_CANCELLED,
        _ => 1,
    }
}

async fn run(cli: &Cli, config: TranscoderConfig) -> Result<()> {
    if !cli.json {
        print_header();
    }

    // Validate input file
    if !cli.input.is_file() {
        return Err(TimelapseError::SourceNotFound(cli.input.clone()));
    }
    if !fs::is_video_file(&cli.input) {
        return Err(TimelapseError::InvalidInput(format!(
            "{} is not a valid video file",
            cli.input.display()
        )));
    }

    let transcoder = Transcoder::new(config)?;

    if cli.info {
        return run_info_mode(cli, &transcoder).await;
    }

    let mut options = cli.to_options()?;
    let output_path = cli
        .output
        .clone()
        .unwrap_or_else(|| fs::generate_output_path(&cli.input));
    fs::validate_output_path(&cli.input, &output_path, cli.overwrite || cli.dry_run)?;

    // Resolve once so the job does not probe a second time
    let video = transcoder.resolve_dimensions(&cli.input, &options).await;
    options.video_width = Some(video.width);
    options.video_height = Some(video.height);

    let plan = plan_transcode(
        &cli.input,
        &output_path,
        &options,
        video,
        thread_count(transcoder.config().min_threads),
        transcoder.config().max_blur_regions,
    )?;

    if cli.dry_run {
        if cli.json {
            print_plan_json(&plan);
        } else {
            print_plan(&cli.input, &output_path, &options, &plan);
            print_command(transcoder.ffmpeg().path(), &plan.args);
        }
        return Ok(());
    }

    if !cli.json {
        print_plan(&cli.input, &output_path, &options, &plan);
    }

    // Setup Ctrl+C handler
    let canceller = transcoder.clone();
    if let Err(e) = ctrlc::set_handler(move || canceller.cancel_all()) {
        tracing::warn!(error = %e, "Could not install Ctrl+C handler");
    }

    let original_size = fs::file_size(&cli.input)?;
    let progress_bar = if cli.json {
        ProgressBar::hidden()
    } else {
        create_progress_bar()
    };

    let start_time = Instant::now();
    let mut handle = transcoder.start(&cli.input, &output_path, options)?;
    let job_id = handle.id().clone();

    while let Some(event) = handle.next_event().await {
        if let JobEvent::Progress { percent, stage } = event {
            update_progress(&progress_bar, percent, stage);
        }
    }

    let result = match handle.wait().await {
        Ok(result) => result,
        Err(e) => {
            progress_bar.abandon();
            return Err(e);
        }
    };
    let elapsed = start_time.elapsed();

    let output_size = fs::file_size(&result.output_path).unwrap_or(0);
    if cli.json {
        print_result_json(&job_id, &result, output_size, elapsed);
    } else {
        finish_progress(&progress_bar);
        print_result(&result, original_size, output_size, elapsed);
    }

    Ok(())
}

async fn run_info_mode(cli: &Cli, transcoder: &Transcoder) -> Result<()> {
    let video_info = transcoder.ffmpeg().probe(&cli.input).await?;
    let size = fs::file_size(&cli.input)?;

    if cli.json {
        print_video_info_json(&cli.input, &video_info, size);
    } else {
        print_video_info(&cli.input, &video_info, size);
    }
    Ok(())
}
