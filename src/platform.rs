use std::ffi::OsStr;
use std::path::Path;

/// Hands `target` (a path or URL) to the desktop's default handler.
pub fn open_with_system<S: AsRef<OsStr>>(target: S) {
    let target = target.as_ref();
    if target.is_empty() {
        return;
    }

    #[cfg(target_os = "windows")]
    {
        let _ = std::process::Command::new("explorer").arg(target).spawn();
    }

    #[cfg(target_os = "macos")]
    {
        let _ = std::process::Command::new("open").arg(target).spawn();
    }

    #[cfg(all(unix, not(target_os = "macos")))]
    {
        let _ = std::process::Command::new("xdg-open").arg(target).spawn();
    }
}

pub fn open_folder<P: AsRef<Path>>(path: P) {
    open_with_system(path.as_ref().as_os_str());
}

pub fn open_url(url: &str) {
    open_with_system(url);
}
