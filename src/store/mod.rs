//! スプレッドシートストア
//!
//! 回答シート・用語集・対義語表の読み書きを抽象化する。
//! - `MemoryStore`: メモリ上のセル表（テスト・読み込み結果の保持に使用）
//! - `FileStore`: .xlsx/.xls/.ods を calamine で読み、rust_xlsxwriter で書き戻す。.csv は csv で読み書き

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::{CellValue, MemoryStore, Worksheet};

use crate::error::{CoderError, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use survey_coder_common::{CellRange, CellUpdate, FormatInstruction};

/// ワークシートの一覧情報
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorksheetInfo {
    pub index: usize,
    pub title: String,
}

/// ワークシートの指定方法
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorksheetRef {
    /// 0始まりの位置
    Index(usize),
    /// シート名
    Name(String),
}

impl Default for WorksheetRef {
    fn default() -> Self {
        WorksheetRef::Index(0)
    }
}

impl WorksheetRef {
    /// "2" / "gid=2" → 位置、それ以外はシート名
    pub fn parse(s: &str) -> Self {
        lazy_static::lazy_static! {
            static ref GID: regex::Regex = regex::Regex::new(r"^(?:gid=)?(\d+)$").unwrap();
        }
        let s = s.trim();
        if let Some(index) = GID
            .captures(s)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok())
        {
            return WorksheetRef::Index(index);
        }
        WorksheetRef::Name(s.to_string())
    }
}

impl fmt::Display for WorksheetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorksheetRef::Index(i) => write!(f, "{}", i),
            WorksheetRef::Name(name) => write!(f, "{}", name),
        }
    }
}

/// ファイルとワークシートの組（例: `answers.xlsx#Wave2`, `glossary.csv`）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetLocator {
    pub path: PathBuf,
    pub worksheet: WorksheetRef,
}

impl SheetLocator {
    pub fn new(path: impl Into<PathBuf>, worksheet: WorksheetRef) -> Self {
        Self {
            path: path.into(),
            worksheet,
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(CoderError::Format("シートの指定が空です".into()));
        }
        match s.rsplit_once('#') {
            Some((path, sheet)) if !path.is_empty() && !sheet.is_empty() => {
                Ok(Self::new(path, WorksheetRef::parse(sheet)))
            }
            _ => Ok(Self::new(s, WorksheetRef::default())),
        }
    }

    /// 相対パスを基準ディレクトリからの位置に解決
    pub fn resolve_against(mut self, base: &Path) -> Self {
        if self.path.is_relative() {
            self.path = base.join(&self.path);
        }
        self
    }
}

impl std::str::FromStr for SheetLocator {
    type Err = CoderError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for SheetLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.path.display(), self.worksheet)
    }
}

/// スプレッドシートの読み書きインターフェース
///
/// 行・列は0始まり。`sheet` は `worksheet()` で得た位置。
pub trait SpreadsheetStore {
    /// ワークシート一覧
    fn worksheets(&self) -> Vec<WorksheetInfo>;

    /// 指定に一致するワークシートの位置
    fn worksheet(&self, target: &WorksheetRef) -> Result<usize> {
        let sheets = self.worksheets();
        let found = match target {
            WorksheetRef::Index(i) => sheets.iter().find(|s| s.index == *i),
            WorksheetRef::Name(name) => sheets.iter().find(|s| s.title == *name),
        };
        found
            .map(|s| s.index)
            .ok_or_else(|| CoderError::NotFound(format!("ワークシート {}", target)))
    }

    /// 列の値（末尾の空セルは含まない）
    fn column_values(&self, sheet: usize, col: u32) -> Result<Vec<String>>;

    /// 矩形範囲の値（範囲外・空セルは空文字）
    fn read_range(&self, sheet: usize, range: &CellRange) -> Result<Vec<Vec<String>>>;

    /// シート全体の値
    fn all_values(&self, sheet: usize) -> Result<Vec<Vec<String>>>;

    /// セル値をまとめて更新
    fn update_cells(&mut self, sheet: usize, updates: &[CellUpdate]) -> Result<()>;

    /// 背景色の書式をまとめて適用
    fn format_cell_ranges(&mut self, sheet: usize, formats: &[FormatInstruction]) -> Result<()>;

    /// 変更を保存
    fn save(&mut self) -> Result<()>;
}
