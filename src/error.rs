use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Json Error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config Error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Detections file, line {line}: {reason}")]
    DetectionsFormat { line: usize, reason: String },

    #[error("OCR Error: {0}")]
    Ocr(String),

    #[error("Unable to open video: {0}")]
    VideoOpen(String),

    #[cfg(feature = "video")]
    #[error("OpenCV Error: {0}")]
    OpenCv(#[from] opencv::Error),
}
