//! エラー型定義

use thiserror::Error;

/// 共通エラー型
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// シート・ワークシート・ファイルが見つからない
    #[error("Not found: {0}")]
    NotFound(String),

    /// 表形式ソースに必要な列がない
    #[error("Format error: {0}")]
    Format(String),

    /// 行のコード枠が満杯（致命的ではない。呼び出し側で破棄する）
    #[error("Slot overflow: row {row} already holds {capacity} codes, dropped '{code}'")]
    SlotOverflow {
        row: usize,
        capacity: usize,
        code: String,
    },
}

/// Result型エイリアス
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_io() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error = Error::Io(io_error);
        let display = format!("{}", error);
        assert!(display.contains("IO error"));
        assert!(display.contains("file not found"));
    }

    #[test]
    fn test_error_display_format() {
        let error = Error::Format("対義語の行に列が足りません".to_string());
        assert_eq!(format!("{}", error), "Format error: 対義語の行に列が足りません");
    }

    #[test]
    fn test_error_display_slot_overflow() {
        let error = Error::SlotOverflow {
            row: 4,
            capacity: 7,
            code: "C9".to_string(),
        };
        let display = format!("{}", error);
        assert!(display.contains("row 4"));
        assert!(display.contains("C9"));
    }

    #[test]
    fn test_error_from_io() {
        let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let error: Error = io_error.into();
        assert!(matches!(error, Error::Io(_)));
    }
}
