use raylib::prelude::*;
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};

use shorts_studio::aggregate::get_global_status;
use shorts_studio::config::Config;
use shorts_studio::set_log_hook;
use shorts_studio::{init, platform, server};

const LOG_MAX_LINES: usize = 300;
const LOG_LINE_MAX: usize = 600;
const CONFIG_PATH: &str = "config.json";

const COLOR_BG: Color = Color::new(25, 25, 25, 255);
const COLOR_BTN: Color = Color::new(40, 90, 170, 255);
const COLOR_BTN_HOVER: Color = Color::new(70, 120, 200, 255);
const COLOR_BTN_DISABLED: Color = Color::new(60, 60, 60, 255);
const COLOR_LOG_BG: Color = Color::new(18, 18, 18, 255);
const COLOR_LOG_TEXT: Color = Color::new(210, 210, 210, 255);

struct LauncherState {
    config: Arc<Config>,
    server_running: Arc<AtomicBool>,
    scanning: Arc<AtomicBool>,
    log_buffer: Arc<Mutex<Vec<String>>>,
}

fn push_log_line(buffer: &Arc<Mutex<Vec<String>>>, line: &str) {
    let mut guard = buffer.lock().unwrap_or_else(|e| e.into_inner());
    if guard.len() >= LOG_MAX_LINES {
        let excess = guard.len() + 1 - LOG_MAX_LINES;
        guard.drain(0..excess);
    }
    let mut text = line.to_string();
    if text.len() > LOG_LINE_MAX {
        let mut cut = LOG_LINE_MAX;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        text.truncate(cut);
    }
    guard.push(text);
}

fn draw_button(
    d: &mut RaylibDrawHandle,
    rect: Rectangle,
    label: &str,
    enabled: bool,
    font_size: f32,
) -> bool {
    let mouse = d.get_mouse_position();
    let hot = rect.check_collision_point_rec(mouse);

    let bg = if !enabled {
        COLOR_BTN_DISABLED
    } else if hot {
        COLOR_BTN_HOVER
    } else {
        COLOR_BTN
    };

    d.draw_rectangle_rounded(rect, 0.25, 10, bg);
    d.draw_rectangle_rounded_lines(rect, 0.25, 10, Color::new(20, 20, 20, 255));

    let ts = d.measure_text(label, font_size as i32);
    let pos_x = rect.x + (rect.width - ts as f32) * 0.5;
    let pos_y = rect.y + (rect.height - font_size) * 0.5;
    d.draw_text(label, pos_x as i32, pos_y as i32, font_size as i32, Color::RAYWHITE);

    enabled && hot && d.is_mouse_button_released(MouseButton::MOUSE_BUTTON_LEFT)
}

fn draw_log_panel(d: &mut RaylibDrawHandle, rect: Rectangle, lines: &[String]) {
    d.draw_rectangle_rec(rect, COLOR_LOG_BG);
    d.draw_rectangle_lines_ex(rect, 2.0, Color::new(40, 40, 40, 255));

    let font_size = 14;
    let pad = 8.0;
    let line_h = 16.0;
    let max_lines = ((rect.height - 2.0 * pad) / line_h).floor().max(1.0) as usize;

    let start = lines.len().saturating_sub(max_lines);

    let mut y = rect.y + pad;
    for line in lines.iter().skip(start) {
        d.draw_text(line, (rect.x + pad) as i32, y as i32, font_size, COLOR_LOG_TEXT);
        y += line_h;
    }
}

/// Runs `job` on its own thread and runtime while `busy` is set.
fn spawn_async<F, Fut>(busy: &Arc<AtomicBool>, log_buffer: &Arc<Mutex<Vec<String>>>, job: F)
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: std::future::Future<Output = anyhow::Result<()>>,
{
    if busy.swap(true, Ordering::SeqCst) {
        return;
    }
    let busy = Arc::clone(busy);
    let log_buffer = Arc::clone(log_buffer);

    std::thread::spawn(move || {
        match tokio::runtime::Runtime::new() {
            Ok(rt) => {
                if let Err(err) = rt.block_on(job()) {
                    push_log_line(&log_buffer, &format!("[ERROR] {:#}", err));
                }
            }
            Err(err) => {
                push_log_line(&log_buffer, &format!("[ERROR] {}", err));
                push_log_line(&log_buffer, "Failed to initialize async runtime");
            }
        }
        busy.store(false, Ordering::SeqCst);
    });
}

fn start_server(state: &LauncherState) {
    let cfg = (*state.config).clone();
    spawn_async(&state.server_running, &state.log_buffer, move || async move {
        server::serve(cfg).await
    });
}

fn scan_status(state: &LauncherState) {
    let root = state.config.channel_root.clone();
    let log_buffer = Arc::clone(&state.log_buffer);
    spawn_async(&state.scanning, &state.log_buffer, move || async move {
        let global = get_global_status(&root).await;
        for (name, entries) in &global.series {
            let done = entries.iter().filter(|e| e.completed).count();
            let broken = entries.iter().filter(|e| e.error.is_some()).count();
            let mut line = format!("[INFO] {}: {}/{} completed", name, done, entries.len());
            if broken > 0 {
                line.push_str(&format!(", {} unreadable", broken));
            }
            push_log_line(&log_buffer, &line);
        }
        push_log_line(
            &log_buffer,
            &format!(
                "[OK] {} of {} videos completed",
                global.completed_count(),
                global.video_count()
            ),
        );
        Ok(())
    });
}

fn snapshot_logs(buffer: &Arc<Mutex<Vec<String>>>) -> Vec<String> {
    buffer.lock().unwrap_or_else(|e| e.into_inner()).clone()
}

fn main() {
    tracing_subscriber::fmt::init();

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(err) => {
            eprintln!("[ERROR] Failed to create async runtime: {}", err);
            return;
        }
    };
    let config = rt.block_on(async {
        let config = match Config::load_or_default(CONFIG_PATH).await {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("[ERROR] {:#}; using defaults", e);
                Config::default()
            }
        };
        if let Err(e) = init::ensure_directories(&config.channel_root).await {
            eprintln!("[ERROR] Failed to create directories: {}", e);
        }
        if !init::check_ffmpeg().await {
            eprintln!("[WARNING] FFmpeg not found in PATH. Please install FFmpeg.");
        }
        config
    });
    drop(rt);

    let state = LauncherState {
        config: Arc::new(config),
        server_running: Arc::new(AtomicBool::new(false)),
        scanning: Arc::new(AtomicBool::new(false)),
        log_buffer: Arc::new(Mutex::new(Vec::with_capacity(LOG_MAX_LINES))),
    };

    let hook_buffer = Arc::clone(&state.log_buffer);
    set_log_hook(Some(Arc::new(Mutex::new(move |line: &str| {
        push_log_line(&hook_buffer, line);
    }))));

    let (mut rl, thread) = raylib::init()
        .size(920, 560)
        .resizable()
        .title("Shorts Studio")
        .build();
    rl.set_target_fps(60);

    let dashboard_url = format!("http://{}", state.config.server_addr);

    while !rl.window_should_close() {
        let mut d = rl.begin_drawing(&thread);
        d.clear_background(COLOR_BG);

        d.draw_text("Channel", 30, 20, 24, Color::RAYWHITE);

        if draw_button(
            &mut d,
            Rectangle::new(30.0, 60.0, 260.0, 44.0),
            "Open Channel Folder",
            true,
            18.0,
        ) {
            platform::open_folder(&state.config.channel_root);
        }

        let scanning = state.scanning.load(Ordering::SeqCst);
        if draw_button(
            &mut d,
            Rectangle::new(30.0, 115.0, 260.0, 44.0),
            if scanning { "Scanning..." } else { "Scan Status" },
            !scanning,
            18.0,
        ) {
            scan_status(&state);
        }

        let running = state.server_running.load(Ordering::SeqCst);
        if draw_button(
            &mut d,
            Rectangle::new(30.0, 170.0, 260.0, 44.0),
            "Open Dashboard",
            running,
            18.0,
        ) {
            platform::open_url(&dashboard_url);
        }

        if draw_button(
            &mut d,
            Rectangle::new(30.0, 280.0, 260.0, 70.0),
            if running { "SERVER RUNNING" } else { "START SERVER" },
            !running,
            22.0,
        ) {
            push_log_line(&state.log_buffer, &format!("[INFO] Starting {}", dashboard_url));
            start_server(&state);
        }

        let status = format!(
            "Server: {}   Root: {}",
            if running { "RUNNING" } else { "STOPPED" },
            state.config.channel_root.display()
        );
        d.draw_text(&status, 30, 370, 16, Color::new(220, 220, 220, 255));

        d.draw_text("Log", 320, 20, 24, Color::RAYWHITE);
        let lines = snapshot_logs(&state.log_buffer);
        draw_log_panel(&mut d, Rectangle::new(320.0, 60.0, 570.0, 470.0), &lines);
    }

    set_log_hook(None);
}
