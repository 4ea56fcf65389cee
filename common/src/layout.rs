//! シートレイアウト・セル番地モジュール
//!
//! 回答列・コード枠・データ開始行の固定配置と、A1形式の番地変換を扱う。
//! 行・列はすべて0始まりで保持し、A1表記への変換時のみ1始まりにする。

use serde::{Deserialize, Serialize};
use std::fmt;

/// 1回答あたりのコード枠数
pub const MAX_CODES_PER_RESPONSE: usize = 7;
/// 回答列（D列）
pub const DEFAULT_RESPONSE_COLUMN: u32 = 3;
/// データ開始前のヘッダー・空行数（データは4行目から）
pub const DEFAULT_HEADER_ROWS: u32 = 3;
/// 新規コードセルの背景色（薄い黄色）
pub const DEFAULT_HIGHLIGHT_RGB: u32 = 0xFFFFB3;

/// 回答シートの配置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetLayout {
    /// 回答テキストの列
    pub response_column: u32,
    /// コード枠の数（回答列の右隣から連続）
    pub slots_per_row: usize,
    /// データ行の前にあるヘッダー・空行の数
    pub header_rows: u32,
}

impl Default for SheetLayout {
    fn default() -> Self {
        Self {
            response_column: DEFAULT_RESPONSE_COLUMN,
            slots_per_row: MAX_CODES_PER_RESPONSE,
            header_rows: DEFAULT_HEADER_ROWS,
        }
    }
}

impl SheetLayout {
    /// 最初のコード枠の列
    pub fn first_slot_column(&self) -> u32 {
        self.response_column + 1
    }

    /// 最後のコード枠の列
    pub fn last_slot_column(&self) -> u32 {
        self.first_slot_column() + self.slots_per_row.saturating_sub(1) as u32
    }

    /// 枠番号からシート上の列を求める
    pub fn slot_column(&self, slot: usize) -> u32 {
        self.first_slot_column() + slot as u32
    }

    /// 回答の通し番号からシート上の行を求める
    pub fn sheet_row(&self, response_index: usize) -> u32 {
        self.header_rows + response_index as u32
    }

    /// 回答数ぶんのコード枠範囲（例: E4:K10）
    pub fn slot_range(&self, response_count: usize) -> Option<CellRange> {
        if response_count == 0 || self.slots_per_row == 0 {
            return None;
        }
        Some(CellRange::new(
            CellRef::new(self.sheet_row(0), self.first_slot_column()),
            CellRef::new(
                self.sheet_row(response_count - 1),
                self.last_slot_column(),
            ),
        ))
    }
}

/// 列番号をA1形式の列名に変換（0 → A, 26 → AA）
pub fn column_name(col: u32) -> String {
    let mut n = col + 1;
    let mut name = Vec::new();
    while n > 0 {
        let rem = ((n - 1) % 26) as u8;
        name.push(b'A' + rem);
        n = (n - 1) / 26;
    }
    name.reverse();
    String::from_utf8(name).unwrap_or_default()
}

/// A1形式の列名を列番号に変換
pub fn column_index(name: &str) -> Option<u32> {
    if name.is_empty() {
        return None;
    }
    let mut n: u32 = 0;
    for c in name.chars() {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        let v = c.to_ascii_uppercase() as u32 - 'A' as u32 + 1;
        n = n.checked_mul(26)?.checked_add(v)?;
    }
    Some(n - 1)
}

/// 単一セルの番地
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellRef {
    pub row: u32,
    pub col: u32,
}

impl CellRef {
    pub fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    /// A1表記から解析（例: "E4"）
    pub fn parse(a1: &str) -> Option<Self> {
        let a1 = a1.trim();
        let split = a1.find(|c: char| c.is_ascii_digit())?;
        let (letters, digits) = a1.split_at(split);
        let col = column_index(letters)?;
        let row: u32 = digits.parse().ok()?;
        if row == 0 {
            return None;
        }
        Some(Self::new(row - 1, col))
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", column_name(self.col), self.row + 1)
    }
}

/// 矩形範囲（両端を含む）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellRange {
    pub start: CellRef,
    pub end: CellRef,
}

impl CellRange {
    pub fn new(start: CellRef, end: CellRef) -> Self {
        Self {
            start: CellRef::new(start.row.min(end.row), start.col.min(end.col)),
            end: CellRef::new(start.row.max(end.row), start.col.max(end.col)),
        }
    }

    /// 1セルだけの範囲（例: F5:F5）
    pub fn single(cell: CellRef) -> Self {
        Self::new(cell, cell)
    }

    /// A1表記から解析（例: "E4:K10"、"F5"）
    pub fn parse(a1: &str) -> Option<Self> {
        match a1.split_once(':') {
            Some((start, end)) => Some(Self::new(CellRef::parse(start)?, CellRef::parse(end)?)),
            None => CellRef::parse(a1).map(Self::single),
        }
    }

    pub fn rows(&self) -> u32 {
        self.end.row - self.start.row + 1
    }

    pub fn cols(&self) -> u32 {
        self.end.col - self.start.col + 1
    }

    pub fn contains(&self, cell: CellRef) -> bool {
        (self.start.row..=self.end.row).contains(&cell.row)
            && (self.start.col..=self.end.col).contains(&cell.col)
    }

    /// 範囲内のセルを行優先で列挙
    pub fn cells(&self) -> impl Iterator<Item = CellRef> + '_ {
        (self.start.row..=self.end.row)
            .flat_map(move |row| (self.start.col..=self.end.col).map(move |col| CellRef::new(row, col)))
    }
}

impl fmt::Display for CellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.start, self.end)
    }
}

/// セルの背景色ハイライト
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Highlight {
    pub rgb: u32,
}

impl Default for Highlight {
    fn default() -> Self {
        Self {
            rgb: DEFAULT_HIGHLIGHT_RGB,
        }
    }
}

impl Highlight {
    /// "#FFFFB3" / "FFFFB3" 形式から生成
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim().trim_start_matches('#');
        if hex.len() != 6 {
            return None;
        }
        u32::from_str_radix(hex, 16).ok().map(|rgb| Self { rgb })
    }

    pub fn to_hex(&self) -> String {
        format!("#{:06X}", self.rgb)
    }
}

impl TryFrom<String> for Highlight {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value).ok_or_else(|| format!("不正な色指定: {}", value))
    }
}

impl From<Highlight> for String {
    fn from(h: Highlight) -> Self {
        h.to_hex()
    }
}
