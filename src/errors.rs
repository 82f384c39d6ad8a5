//! Child-friendly error taxonomy
//!
//! Raw engine and HTTP errors are never shown to the child. They are
//! classified into a small set of kinds, each with a fixed title, message
//! and suggestion written for a young reader.

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    Network,
    Permission,
    Recognition,
    Camera,
    Upload,
    Validation,
    Unknown,
}

impl ErrorKind {
    /// Whether an automatic retry may succeed without the user acting
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Network | Self::Upload | Self::Recognition)
    }

    fn template(self) -> (&'static str, &'static str, &'static str) {
        match self {
            Self::Network => (
                "网络好像有问题",
                "连接不上服务器，请检查网络",
                "试试：\n1. 检查 WiFi 是否开启\n2. 稍后再试",
            ),
            Self::Permission => (
                "需要使用麦克风",
                "请允许使用麦克风，这样才能和小芽对话",
                "试试：\n1. 点击地址栏左侧的锁图标\n2. 允许使用麦克风\n3. 刷新页面",
            ),
            Self::Recognition => (
                "没听清楚",
                "小芽没听懂你说什么，能再说一遍吗？",
                "试试：\n1. 说话大声一点\n2. 说慢一点\n3. 或者用文字输入",
            ),
            Self::Camera => (
                "需要使用相机",
                "请允许使用相机，这样才能拍照上传作业",
                "试试：\n1. 点击地址栏左侧的锁图标\n2. 允许使用相机\n3. 刷新页面",
            ),
            Self::Upload => (
                "上传失败",
                "图片上传失败了，请重试",
                "试试：\n1. 检查网络连接\n2. 重新拍照\n3. 选择更清晰的图片",
            ),
            Self::Validation => (
                "输入有误",
                "请检查输入内容",
                "试试：\n1. 确保内容不为空\n2. 内容不超过 2000 字",
            ),
            Self::Unknown => (
                "出错了",
                "小芽遇到一点问题，请再试一次",
                "如果问题一直存在，请告诉爸爸妈妈",
            ),
        }
    }
}

/// Keywords per kind, checked in this order
const KEYWORDS: &[(ErrorKind, &[&str])] = &[
    (
        ErrorKind::Network,
        &["network", "fetch", "connection", "timeout", "econnrefused", "enotfound"],
    ),
    (
        ErrorKind::Permission,
        &["permission", "denied", "allowed", "notallowederror", "securityerror"],
    ),
    (
        ErrorKind::Recognition,
        &["recognition", "speech", "audio", "no-speech", "aborted"],
    ),
    (
        ErrorKind::Camera,
        &["camera", "video", "notfounderror", "devicesnotfounderror"],
    ),
    (ErrorKind::Upload, &["upload", "file"]),
    (ErrorKind::Validation, &["validation", "invalid"]),
];

/// Narrower set applied to error text sent by the backend
///
/// Backend messages never map to validation, and timeouts reported in the
/// body are not treated as network failures.
const MESSAGE_KEYWORDS: &[(ErrorKind, &[&str])] = &[
    (ErrorKind::Network, &["network", "fetch", "connection"]),
    (ErrorKind::Permission, &["permission", "denied", "allowed"]),
    (ErrorKind::Recognition, &["recognition", "speech", "audio"]),
    (ErrorKind::Camera, &["camera", "video"]),
    (ErrorKind::Upload, &["upload", "file"]),
];

fn match_keywords(table: &[(ErrorKind, &[&str])], text: &str) -> ErrorKind {
    let lower = text.to_lowercase();
    table
        .iter()
        .find(|(_, words)| words.iter().any(|w| lower.contains(w)))
        .map(|(kind, _)| *kind)
        .unwrap_or(ErrorKind::Unknown)
}

/// Classify raw error text by case-insensitive keyword match
pub fn classify(text: &str) -> ErrorKind {
    match_keywords(KEYWORDS, text)
}

/// Classify an error message returned by the backend
pub fn classify_message(text: &str) -> ErrorKind {
    match_keywords(MESSAGE_KEYWORDS, text)
}

/// An error as presented to the child
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FriendlyError {
    pub kind: ErrorKind,
    pub title: String,
    pub message: String,
    pub suggestion: String,
    pub retryable: bool,
}

impl FriendlyError {
    /// Catalog entry for `kind`
    pub fn of(kind: ErrorKind) -> Self {
        let (title, message, suggestion) = kind.template();
        Self {
            kind,
            title: title.to_string(),
            message: message.to_string(),
            suggestion: suggestion.to_string(),
            retryable: kind.is_retryable(),
        }
    }

    /// Image rejected by the server for its size (HTTP 413)
    pub fn image_too_large() -> Self {
        Self {
            kind: ErrorKind::Upload,
            title: "图片太大".to_string(),
            message: "图片文件太大，上传失败".to_string(),
            suggestion: "试试：\n1. 选择小一点的图片\n2. 拍照时离远一点".to_string(),
            retryable: true,
        }
    }

    /// Same error, but no further automatic retries
    pub fn into_final(mut self) -> Self {
        self.retryable = false;
        self
    }
}

impl fmt::Display for FriendlyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\n\n{}\n\n{}", self.title, self.message, self.suggestion)
    }
}

/// Classify raw error text into its friendly form
pub fn handle_error(text: &str) -> FriendlyError {
    FriendlyError::of(classify(text))
}

/// Map an HTTP failure (status and backend `error` text) to a friendly error
pub fn handle_api_error(status: Option<u16>, error: Option<&str>) -> FriendlyError {
    match status {
        Some(401 | 403) => return FriendlyError::of(ErrorKind::Permission),
        Some(413) => return FriendlyError::image_too_large(),
        Some(s) if s >= 500 => return FriendlyError::of(ErrorKind::Network),
        _ => {}
    }

    match error {
        Some(text) => FriendlyError::of(classify_message(text)),
        None => FriendlyError::of(ErrorKind::Unknown),
    }
}

/// Full text shown in an error dialog
pub fn format_error_message(error: &FriendlyError) -> String {
    error.to_string()
}

pub fn is_retryable(error: &FriendlyError) -> bool {
    error.retryable
}
