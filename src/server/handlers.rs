use super::templates::{
    APPROVAL_FRAGMENT, DASHBOARD_PAGE, IMAGE_FRAGMENT, SAVED_FRAGMENT, STAGE_FRAGMENT,
    STORYBOARD_PAGE,
};
use super::{AppState, ServerError};
use crate::aggregate::{GlobalStatus, get_global_status};
use crate::api::elevenlabs::ElevenLabsTts;
use crate::api::replicate::ReplicateFlux;
use crate::api::text_generator;
use crate::ffmpeg::FfmpegAssembler;
use crate::pipeline;
use crate::status::{ProductionStatus, StatusTracker};
use crate::storyboard::{SceneField, SceneUpdate};
use crate::video::VideoRecord;
use crate::writer::Writer;
use axum::Json;
use axum::extract::{Form, Path, State};
use axum::response::Html;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

type HtmlResult = Result<Html<String>, ServerError>;

#[derive(Deserialize)]
pub struct ValueForm {
    #[serde(default)]
    value: String,
}

#[derive(Deserialize)]
pub struct PromptForm {
    prompt: Option<String>,
}

fn render(state: &AppState, name: &str, ctx: &Value) -> HtmlResult {
    Ok(Html(state.templates.render(name, ctx)?))
}

fn score_label(status: &ProductionStatus) -> String {
    status
        .score()
        .map(|s| format!("{s:.1}"))
        .unwrap_or_else(|| "-".to_string())
}

fn status_context(status: &ProductionStatus) -> Value {
    json!({
        "status": status,
        "score": score_label(status),
        "approved": status.images_completed.iter().filter(|done| **done).count(),
        "scenes": status.scene_count(),
    })
}

fn dashboard_context(global: &GlobalStatus, root: &str) -> Value {
    let series: Vec<Value> = global
        .series
        .iter()
        .map(|(name, entries)| {
            let videos: Vec<Value> = entries
                .iter()
                .map(|entry| {
                    let mut ctx = status_context(&entry.status);
                    ctx["ordinal"] = json!(entry.ordinal);
                    ctx["completed"] = json!(entry.completed);
                    ctx["error"] = json!(entry.error);
                    ctx
                })
                .collect();
            json!({"name": name, "videos": videos})
        })
        .collect();

    json!({
        "series": series,
        "total": global.video_count(),
        "completed": global.completed_count(),
        "root": root,
    })
}

pub async fn dashboard(State(state): State<AppState>) -> HtmlResult {
    let global = get_global_status(&state.config.channel_root).await;
    let root = state.config.channel_root.display().to_string();
    render(&state, DASHBOARD_PAGE, &dashboard_context(&global, &root))
}

pub async fn api_status(State(state): State<AppState>) -> Json<GlobalStatus> {
    Json(get_global_status(&state.config.channel_root).await)
}

pub async fn storyboard(
    State(state): State<AppState>,
    Path((series, n)): Path<(String, u32)>,
) -> HtmlResult {
    let dir = state.video_dir(&series, n)?;
    let record = StatusTracker::load_reconciled(&dir).await?;
    let status = &record.production_status;

    let existing_url = |path: Option<std::path::PathBuf>| {
        path.filter(|p| p.is_file())
            .and_then(|p| state.media_url(&p))
    };

    let scenes: Vec<Value> = record
        .storyboard
        .scenes
        .iter()
        .enumerate()
        .map(|(index, scene)| {
            json!({
                "series": series,
                "n": n,
                "index": index,
                "text": scene.text,
                "image": scene.image,
                "image_url": existing_url(record.image_path(index)),
                "audio_url": existing_url(record.audio_path(index)),
                "approved": status.images_completed.get(index).copied().unwrap_or(false),
            })
        })
        .collect();

    let mut ctx = status_context(status);
    ctx["series"] = json!(series);
    ctx["n"] = json!(n);
    ctx["title"] = json!(record.title());
    ctx["scenes"] = json!(scenes);
    ctx["video_url"] = json!(existing_url(record.video_path.clone()));
    render(&state, STORYBOARD_PAGE, &ctx)
}

pub async fn update_scene(
    State(state): State<AppState>,
    Path((series, n, index, field)): Path<(String, u32, usize, String)>,
    Form(form): Form<ValueForm>,
) -> HtmlResult {
    let dir = state.video_dir(&series, n)?;
    let field: SceneField = field.parse()?;
    VideoRecord::update_storyboard(&dir, &[SceneUpdate::new(index, field, form.value)]).await?;
    info!("scene {} {} of {}/{} updated", index, field, series, n);
    render(&state, SAVED_FRAGMENT, &json!({"field": field.as_str()}))
}

pub async fn update_image_status(
    State(state): State<AppState>,
    Path((series, n, index, is_completed)): Path<(String, u32, usize, bool)>,
) -> HtmlResult {
    let dir = state.video_dir(&series, n)?;
    let status = StatusTracker::update_image_status(&dir, index, is_completed).await?;
    let ctx = json!({
        "series": series,
        "n": n,
        "index": index,
        "approved": status.images_completed.get(index).copied().unwrap_or(false),
    });
    render(&state, APPROVAL_FRAGMENT, &ctx)
}

pub async fn remake_image(
    State(state): State<AppState>,
    Path((series, n, index)): Path<(String, u32, usize)>,
    Form(form): Form<PromptForm>,
) -> HtmlResult {
    let dir = state.video_dir(&series, n)?;
    let images = ReplicateFlux::new(state.http.clone(), &state.config)?;
    let status = pipeline::remake_image(
        &dir,
        index,
        form.prompt.as_deref(),
        &images,
        &state.config.image,
    )
    .await?;

    let record = VideoRecord::get(&VideoRecord::data_path(&dir)).await?;
    // Cache-bust so the browser shows the new file at the same path.
    let image_url = record
        .image_path(index)
        .and_then(|p| state.media_url(&p))
        .map(|url| format!("{url}?v={}", chrono::Utc::now().timestamp_millis()));
    let ctx = json!({
        "series": series,
        "n": n,
        "index": index,
        "image_url": image_url,
        "approved": status.images_completed.get(index).copied().unwrap_or(false),
    });
    render(&state, IMAGE_FRAGMENT, &ctx)
}

pub async fn run_stage(
    State(state): State<AppState>,
    Path((series, n, stage)): Path<(String, u32, String)>,
) -> HtmlResult {
    let dir = state.video_dir(&series, n)?;
    let cfg = &state.config;
    info!("running {} for {}/{}", stage, series, n);

    let status = match stage.as_str() {
        "evaluate" => {
            let writer = Writer::new(text_generator(cfg, state.http.clone())?);
            StatusTracker::evaluate_text(&dir, &writer).await?
        }
        "images" => {
            let images = ReplicateFlux::new(state.http.clone(), cfg)?;
            pipeline::generate_images(&dir, &images, &cfg.image).await?
        }
        "tts" => {
            let speech = ElevenLabsTts::new(state.http.clone(), cfg)?;
            pipeline::generate_speech(&dir, &speech, &cfg.eleven_voice_id).await?
        }
        "render" => pipeline::render_video(&dir, &FfmpegAssembler, &cfg.video).await?,
        other => return Err(ServerError::BadRequest(format!("unknown stage '{other}'"))),
    };

    let mut ctx = status_context(&status);
    ctx["message"] = json!(format!("{stage} done"));
    render(&state, STAGE_FRAGMENT, &ctx)
}
