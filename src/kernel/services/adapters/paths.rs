//! 数据目录管理
//!
//! 跨平台的应用数据路径：
//! - macOS: ~/Library/Application Support/zpilot/{logs,conversations}
//! - Linux: $XDG_DATA_HOME/zpilot 或 ~/.local/share/zpilot
//! - Windows: %APPDATA%\zpilot

use std::path::PathBuf;

const APP_NAME: &str = "zpilot";
const LOG_DIR: &str = "logs";
const CONVERSATIONS_DIR: &str = "conversations";

/// 获取应用数据目录
fn get_app_data_dir() -> Option<PathBuf> {
    #[cfg(target_os = "macos")]
    {
        std::env::var("HOME").ok().map(|home| {
            PathBuf::from(home)
                .join("Library/Application Support")
                .join(APP_NAME)
        })
    }

    #[cfg(target_os = "linux")]
    {
        if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
            Some(PathBuf::from(xdg).join(APP_NAME))
        } else {
            std::env::var("HOME")
                .ok()
                .map(|home| PathBuf::from(home).join(".local/share").join(APP_NAME))
        }
    }

    #[cfg(target_os = "windows")]
    {
        std::env::var("APPDATA")
            .ok()
            .map(|appdata| PathBuf::from(appdata).join(APP_NAME))
    }

    #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
    {
        None
    }
}

pub fn get_log_dir() -> Option<PathBuf> {
    get_app_data_dir().map(|p| p.join(LOG_DIR))
}

pub fn get_conversations_dir() -> Option<PathBuf> {
    get_app_data_dir().map(|p| p.join(CONVERSATIONS_DIR))
}

fn ensure_dir(dir: Option<PathBuf>, what: &str) -> std::io::Result<PathBuf> {
    let dir = dir.ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Cannot determine {what} directory"),
        )
    })?;

    if !dir.exists() {
        std::fs::create_dir_all(&dir)?;
    }

    Ok(dir)
}

/// 确保日志目录存在
pub fn ensure_log_dir() -> std::io::Result<PathBuf> {
    ensure_dir(get_log_dir(), "log")
}

/// 确保会话目录存在
pub fn ensure_conversations_dir() -> std::io::Result<PathBuf> {
    ensure_dir(get_conversations_dir(), "conversations")
}
