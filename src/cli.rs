use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use shorts_studio::aggregate::get_global_status;
use shorts_studio::api::elevenlabs::ElevenLabsTts;
use shorts_studio::api::replicate::ReplicateFlux;
use shorts_studio::api::{http_client, text_generator};
use shorts_studio::config::Config;
use shorts_studio::ffmpeg::FfmpegAssembler;
use shorts_studio::producer::ShortsSeriesGenerator;
use shorts_studio::series::SeriesRecord;
use shorts_studio::status::{ProductionStatus, StatusTracker};
use shorts_studio::writer::Writer;
use shorts_studio::{init, pipeline, server};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "shorts-cli", about = "Produce and review short videos")]
struct Cli {
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct VideoRef {
    /// Series directory name under the channel root
    series: String,
    /// Video number inside the series
    n: u32,
}

#[derive(Subcommand)]
enum Command {
    /// Run the review dashboard
    Serve,
    /// Print every video's production status
    Status,
    /// Write, score and storyboard a batch of stories for a series
    NewSeries {
        name: String,
        #[arg(long)]
        theme: String,
        #[arg(long)]
        expertise: String,
        #[arg(long, default_value_t = 5)]
        stories: u32,
    },
    Evaluate(VideoRef),
    Images(VideoRef),
    Tts(VideoRef),
    Render(VideoRef),
    /// Approve (or reject) one scene image
    Approve {
        #[command(flatten)]
        video: VideoRef,
        index: usize,
        #[arg(long)]
        reject: bool,
    },
    /// Date unscheduled videos of a series
    Schedule {
        series: String,
        #[arg(long)]
        start: NaiveDate,
        #[arg(long, default_value_t = 1)]
        every: i64,
    },
}

fn print_status(status: &ProductionStatus) {
    let approved = status.images_completed.iter().filter(|d| **d).count();
    println!(
        "text: {}  score: {}  storyboard: {}  images: {}/{}  speech: {}  upload: {}  completed: {}",
        status.text_completed,
        status
            .score()
            .map(|s| format!("{s:.1}"))
            .unwrap_or_else(|| "-".into()),
        status.storyboard_completed,
        approved,
        status.scene_count(),
        status.tts_completed,
        status.ready_to_upload,
        status.completed()
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let cfg = Config::load_or_default(&cli.config).await?;
    init::ensure_directories(&cfg.channel_root).await?;
    let video_dir = |v: &VideoRef| cfg.channel_root.join(&v.series).join(v.n.to_string());

    match cli.command {
        Command::Serve => server::serve(cfg.clone()).await?,
        Command::Status => {
            let global = get_global_status(&cfg.channel_root).await;
            for (name, entries) in &global.series {
                println!("== {name}");
                for entry in entries {
                    print!("  #{:<3} ", entry.ordinal);
                    match &entry.error {
                        Some(err) => println!("unreadable: {err}"),
                        None => print_status(&entry.status),
                    }
                }
            }
            println!(
                "{} of {} videos completed",
                global.completed_count(),
                global.video_count()
            );
        }
        Command::NewSeries {
            name,
            theme,
            expertise,
            stories,
        } => {
            let dir = cfg.channel_root.join(&name);
            let mut series = SeriesRecord::get(&SeriesRecord::data_path(&dir)).await?;
            series.name = Some(name);
            series.series_theme = Some(theme);
            series.expertise = Some(expertise);
            series.num_stories = Some(stories);

            let llm = text_generator(&cfg, http_client()?)?;
            let added = ShortsSeriesGenerator::new(llm, cfg.llm.story_words)
                .generate_series(&mut series)
                .await?;
            println!("{added} videos added to {}", dir.display());
        }
        Command::Evaluate(v) => {
            let writer = Writer::new(text_generator(&cfg, http_client()?)?);
            print_status(&StatusTracker::evaluate_text(&video_dir(&v), &writer).await?);
        }
        Command::Images(v) => {
            let images = ReplicateFlux::new(http_client()?, &cfg)?;
            print_status(&pipeline::generate_images(&video_dir(&v), &images, &cfg.image).await?);
        }
        Command::Tts(v) => {
            let speech = ElevenLabsTts::new(http_client()?, &cfg)?;
            let status =
                pipeline::generate_speech(&video_dir(&v), &speech, &cfg.eleven_voice_id).await?;
            print_status(&status);
        }
        Command::Render(v) => {
            if !init::check_ffmpeg().await {
                anyhow::bail!("ffmpeg not found in PATH");
            }
            let status = pipeline::render_video(&video_dir(&v), &FfmpegAssembler, &cfg.video).await?;
            print_status(&status);
        }
        Command::Approve {
            video,
            index,
            reject,
        } => {
            let status = StatusTracker::update_image_status(&video_dir(&video), index, !reject)
                .await
                .with_context(|| format!("cannot update scene {index}"))?;
            print_status(&status);
        }
        Command::Schedule {
            series,
            start,
            every,
        } => {
            let path = SeriesRecord::data_path(&cfg.channel_root.join(&series));
            let mut record = SeriesRecord::get(&path).await?;
            let dated = record.schedule_releases(start, every);
            record.save(None).await?;
            println!("{dated} videos scheduled from {start}");
        }
    }
    Ok(())
}
