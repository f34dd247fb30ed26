use std::path::PathBuf;

const APP_DIR: &str = "saba-radio";

pub fn mpv_socket_name() -> String {
    format!("{}/saba-mpv.sock", std::env::temp_dir().display())
}

pub fn mpv_socket_arg() -> String {
    format!("--input-ipc-server={}", mpv_socket_name())
}

pub fn data_dir() -> PathBuf {
    // ~/.local/share/saba-radio/ (XDG layout, the target is a Raspberry Pi)
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join(".local")
        .join("share")
        .join(APP_DIR)
}

pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join(APP_DIR)
}

/// Directory holding the bitmap assets shown on the display.
pub fn assets_dir() -> PathBuf {
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            let beside = exe_dir.join("Assets");
            if beside.exists() {
                return beside;
            }
        }
    }
    data_dir().join("Assets")
}

fn find_on_path(name: &str) -> Option<PathBuf> {
    let path = std::env::var("PATH").ok()?;
    path.split(':')
        .map(|dir| PathBuf::from(dir).join(name))
        .find(|p| p.exists())
}

/// Find the mpv binary: beside the current exe first, then PATH.
pub fn find_mpv_binary() -> Option<PathBuf> {
    if let Ok(current_exe) = std::env::current_exe() {
        if let Some(dir) = current_exe.parent() {
            let local_mpv = dir.join("mpv");
            if local_mpv.exists() {
                return Some(local_mpv);
            }
        }
    }
    find_on_path("mpv")
}
