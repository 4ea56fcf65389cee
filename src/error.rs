use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoderError {
    #[error("設定エラー: {0}")]
    Config(String),

    #[error("見つかりません: {0}")]
    NotFound(String),

    #[error("表の形式が不正: {0}")]
    Format(String),

    /// リモートのストアが返す書き込み上限。ローカルのストアは返さない
    #[error("書き込み上限を超えました: {0}")]
    #[allow(dead_code)]
    QuotaExceeded(String),

    #[error("一時的なIOエラー（再試行可能）: {0}")]
    TransientIo(String),

    #[error("スプレッドシートエラー: {0}")]
    Spreadsheet(String),

    #[error("JSON解析エラー: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("CSVエラー: {0}")]
    Csv(#[from] csv::Error),

    #[error("IOエラー: {0}")]
    Io(#[source] std::io::Error),

    #[error(transparent)]
    Common(#[from] survey_coder_common::Error),
}

impl CoderError {
    /// 再試行で回復しうるエラーか
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoderError::QuotaExceeded(_) | CoderError::TransientIo(_))
    }
}

impl From<std::io::Error> for CoderError {
    fn from(e: std::io::Error) -> Self {
        use std::io::ErrorKind;
        match e.kind() {
            ErrorKind::Interrupted | ErrorKind::TimedOut | ErrorKind::WouldBlock => {
                CoderError::TransientIo(e.to_string())
            }
            _ => CoderError::Io(e),
        }
    }
}

impl From<calamine::Error> for CoderError {
    fn from(e: calamine::Error) -> Self {
        match e {
            calamine::Error::Io(io) => io.into(),
            other => CoderError::Spreadsheet(other.to_string()),
        }
    }
}

impl From<rust_xlsxwriter::XlsxError> for CoderError {
    fn from(e: rust_xlsxwriter::XlsxError) -> Self {
        use rust_xlsxwriter::XlsxError;
        match e {
            XlsxError::IoError(io) => io.into(),
            other => CoderError::Spreadsheet(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, CoderError>;
