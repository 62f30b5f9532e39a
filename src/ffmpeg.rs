use crate::api::VideoAssembler;
use crate::config::VideoSettings;
use crate::{logi, logok, logw};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

const MAX_VIDEO_SPEEDUP: f64 = 1.75;
const MAX_ZOOM: f64 = 1.5;

async fn run_cmd(args: &[String]) -> Result<()> {
    if args.is_empty() {
        return Ok(());
    }

    let mut cmd = Command::new(&args[0]);
    if args.len() > 1 {
        cmd.args(&args[1..]);
    }

    let status = cmd.status().await.context("Command execution failed")?;
    if !status.success() {
        return Err(anyhow::anyhow!("Command failed: {:?}", args));
    }

    Ok(())
}

fn ffmpeg_base() -> Vec<String> {
    ["ffmpeg", "-y", "-hide_banner", "-loglevel", "error"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn h264_aac_out(out_mp4: &Path) -> Vec<String> {
    [
        "-c:v",
        "libx264",
        "-pix_fmt",
        "yuv420p",
        "-preset",
        "veryfast",
        "-crf",
        "22",
        "-c:a",
        "aac",
        "-b:a",
        "192k",
    ]
    .iter()
    .map(|s| s.to_string())
    .chain(std::iter::once(out_mp4.display().to_string()))
    .collect()
}

pub async fn ffprobe_duration_seconds(path: &Path) -> Result<f64> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(path)
        .output()
        .await
        .context("ffprobe duration failed")?;

    if !output.status.success() {
        return Err(anyhow::anyhow!("ffprobe failed"));
    }

    let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let duration = text.parse::<f64>().unwrap_or(-1.0);
    if duration <= 0.1 {
        return Err(anyhow::anyhow!("Invalid duration"));
    }
    Ok(duration)
}

/// Slow push-in over a still image, sized to the output frame.
fn zoompan_filter(settings: &VideoSettings, frames: u64) -> String {
    format!(
        "[0:v]scale={w2}:{h2},zoompan=z='min(zoom+{zpf},{max})':x='iw/2-(iw/zoom/2)':y='ih/2-(ih/zoom/2)':d={frames}:s={w}x{h}:fps={fps}[v]",
        w2 = settings.width * 2,
        h2 = settings.height * 2,
        zpf = settings.zoom_per_frame,
        max = MAX_ZOOM,
        w = settings.width,
        h = settings.height,
        fps = settings.fps,
    )
}

/// Playback factor that fits `total_s` into `max_s`, capped; 1.0 when it fits.
fn speed_factor(total_s: f64, max_s: f64) -> f64 {
    if max_s <= 0.0 || total_s <= max_s {
        return 1.0;
    }
    (total_s / max_s).min(MAX_VIDEO_SPEEDUP)
}

pub async fn ffmpeg_image_clip(
    image: &Path,
    narration_mp3: &Path,
    narration_dur: f64,
    settings: &VideoSettings,
    out_mp4: &Path,
) -> Result<bool> {
    let frames = (narration_dur * settings.fps as f64).ceil().max(1.0) as u64;
    let mut args = ffmpeg_base();
    args.extend([
        "-loop".to_string(),
        "1".to_string(),
        "-i".to_string(),
        image.display().to_string(),
        "-i".to_string(),
        narration_mp3.display().to_string(),
        "-filter_complex".to_string(),
        zoompan_filter(settings, frames),
        "-map".to_string(),
        "[v]".to_string(),
        "-map".to_string(),
        "1:a".to_string(),
        "-t".to_string(),
        format!("{:.3}", narration_dur),
    ]);
    args.extend(h264_aac_out(out_mp4));
    run_cmd(&args).await?;
    Ok(out_mp4.exists())
}

pub async fn ffmpeg_concat_videos(list_txt: &Path, out_mp4: &Path) -> Result<bool> {
    let mut args = ffmpeg_base();
    args.extend([
        "-f".to_string(),
        "concat".to_string(),
        "-safe".to_string(),
        "0".to_string(),
        "-i".to_string(),
        list_txt.display().to_string(),
        "-movflags".to_string(),
        "+faststart".to_string(),
    ]);
    args.extend(h264_aac_out(out_mp4));
    run_cmd(&args).await?;
    Ok(out_mp4.exists())
}

pub async fn ffmpeg_speed_up(in_mp4: &Path, factor: f64, out_mp4: &Path) -> Result<bool> {
    let mut args = ffmpeg_base();
    args.extend([
        "-i".to_string(),
        in_mp4.display().to_string(),
        "-filter_complex".to_string(),
        format!("[0:v]setpts=PTS/{factor:.6}[v];[0:a]atempo={factor:.6}[a]"),
        "-map".to_string(),
        "[v]".to_string(),
        "-map".to_string(),
        "[a]".to_string(),
        "-movflags".to_string(),
        "+faststart".to_string(),
    ]);
    args.extend(h264_aac_out(out_mp4));
    run_cmd(&args).await?;
    Ok(out_mp4.exists())
}

/// `(image, audio)` per scene, from `0` up to the first scene missing either file.
pub fn scene_media(images_dir: &Path, audios_dir: &Path) -> Vec<(PathBuf, PathBuf)> {
    (0..)
        .map(|i| {
            (
                images_dir.join(format!("{i}.png")),
                audios_dir.join(format!("{i}.mp3")),
            )
        })
        .take_while(|(image, audio)| image.is_file() && audio.is_file())
        .collect()
}

/// Renders still-image scenes with narration using the ffmpeg CLI.
#[derive(Debug, Default, Clone, Copy)]
pub struct FfmpegAssembler;

#[async_trait]
impl VideoAssembler for FfmpegAssembler {
    async fn generate_video(
        &self,
        images_dir: &Path,
        audios_dir: &Path,
        output_path: &Path,
        settings: &VideoSettings,
    ) -> Result<bool> {
        let scenes = scene_media(images_dir, audios_dir);
        if scenes.is_empty() {
            logw(format!("No scene media in {}", images_dir.display()));
            return Ok(false);
        }

        let work = tempfile::TempDir::new().context("Failed to create render workspace")?;
        let list_path = work.path().join("concat_list.txt");
        let mut listf = fs::File::create(&list_path).await?;

        let mut total = 0.0;
        for (i, (image, audio)) in scenes.iter().enumerate() {
            let dur = match ffprobe_duration_seconds(audio).await {
                Ok(d) => d,
                Err(err) => {
                    logw(format!("Scene {} audio unreadable: {}", i, err));
                    return Ok(false);
                }
            };
            let clip = work.path().join(format!("clip_{i}.mp4"));
            if !ffmpeg_image_clip(image, audio, dur, settings, &clip).await? {
                logw(format!("Scene {} clip failed", i));
                return Ok(false);
            }
            listf
                .write_all(format!("file '{}'\n", clip.display()).as_bytes())
                .await?;
            total += dur;
        }
        listf.flush().await?;
        drop(listf);
        logi(format!("{} scene clips, {:.1}s of narration", scenes.len(), total));

        let joined = work.path().join("joined.mp4");
        if !ffmpeg_concat_videos(&list_path, &joined).await? {
            return Ok(false);
        }

        if let Some(parent) = output_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let factor = speed_factor(total, settings.max_duration_s);
        if factor > 1.0 {
            logi(format!(
                "Speeding up {:.2}x to fit {:.0}s",
                factor, settings.max_duration_s
            ));
            if !ffmpeg_speed_up(&joined, factor, output_path).await? {
                return Ok(false);
            }
        } else {
            fs::copy(&joined, output_path)
                .await
                .with_context(|| format!("Failed to write {}", output_path.display()))?;
        }

        logok(format!("Video ready: {}", output_path.display()));
        Ok(output_path.exists())
    }
}
