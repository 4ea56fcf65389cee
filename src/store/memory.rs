//! メモリ上のスプレッドシート

use super::{SpreadsheetStore, WorksheetInfo};
use crate::error::{CoderError, Result};
use chrono::{Duration, NaiveDate};
use std::collections::BTreeMap;
use std::fmt;
use survey_coder_common::{CellRange, CellRef, CellUpdate, FormatInstruction, Highlight};

/// セル値
#[derive(Debug, Clone, Default, PartialEq)]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    /// Excel のシリアル値で持つ日付・日時
    Date(f64),
    /// 数式と、読み込み時の計算結果
    Formula { formula: String, cached: String },
}

impl CellValue {
    /// 文字列から生成（空白のみは空セル）
    pub fn text(s: &str) -> Self {
        if s.trim().is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(s.to_string())
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Text(s) => write!(f, "{}", s),
            // 整数値は小数点なしで表示（1.0 → "1"）
            CellValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            CellValue::Number(n) => write!(f, "{}", n),
            CellValue::Bool(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            CellValue::Date(serial) => match serial_to_datetime(*serial) {
                Some(dt) if serial.fract() == 0.0 => write!(f, "{}", dt.format("%Y-%m-%d")),
                Some(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
                None => write!(f, "{}", serial),
            },
            CellValue::Formula { cached, .. } => write!(f, "{}", cached),
        }
    }
}

/// Excel のシリアル値（1900年基準）を日時に変換
fn serial_to_datetime(serial: f64) -> Option<chrono::NaiveDateTime> {
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let millis = (serial * 86_400_000.0).round();
    if !millis.is_finite() {
        return None;
    }
    epoch.checked_add_signed(Duration::try_milliseconds(millis as i64)?)
}

static EMPTY: CellValue = CellValue::Empty;

/// ワークシート1枚
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Worksheet {
    pub title: String,
    rows: Vec<Vec<CellValue>>,
    highlights: BTreeMap<CellRef, Highlight>,
}

impl Worksheet {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    /// 文字列の表から生成
    pub fn from_rows<S: AsRef<str>>(title: impl Into<String>, rows: &[Vec<S>]) -> Self {
        let mut sheet = Self::new(title);
        for (r, row) in rows.iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                let value = CellValue::text(value.as_ref());
                if !value.is_empty() {
                    sheet.set(r as u32, c as u32, value);
                }
            }
        }
        sheet
    }

    pub fn get(&self, row: u32, col: u32) -> &CellValue {
        self.rows
            .get(row as usize)
            .and_then(|r| r.get(col as usize))
            .unwrap_or(&EMPTY)
    }

    pub fn text(&self, row: u32, col: u32) -> String {
        self.get(row, col).to_string()
    }

    pub fn set(&mut self, row: u32, col: u32, value: CellValue) {
        let (row, col) = (row as usize, col as usize);
        if self.rows.len() <= row {
            self.rows.resize(row + 1, Vec::new());
        }
        let cells = &mut self.rows[row];
        if cells.len() <= col {
            cells.resize(col + 1, CellValue::Empty);
        }
        cells[col] = value;
    }

    pub fn row_count(&self) -> u32 {
        self.rows.len() as u32
    }

    pub fn col_count(&self) -> u32 {
        self.rows.iter().map(Vec::len).max().unwrap_or(0) as u32
    }

    /// 値のある行（列は不揃い）
    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    pub fn highlight(&mut self, cell: CellRef, highlight: Highlight) {
        self.highlights.insert(cell, highlight);
    }

    pub fn highlight_at(&self, cell: CellRef) -> Option<Highlight> {
        self.highlights.get(&cell).copied()
    }

    pub fn highlights(&self) -> impl Iterator<Item = (&CellRef, &Highlight)> {
        self.highlights.iter()
    }

    /// 全セルを文字列の表として取得（各行は最大列数にそろえる）
    pub fn values(&self) -> Vec<Vec<String>> {
        let width = self.col_count();
        (0..self.row_count())
            .map(|r| (0..width).map(|c| self.text(r, c)).collect())
            .collect()
    }
}

/// メモリ上のスプレッドシート
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    sheets: Vec<Worksheet>,
    saves: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sheet(mut self, sheet: Worksheet) -> Self {
        self.sheets.push(sheet);
        self
    }

    pub fn add_sheet(&mut self, sheet: Worksheet) -> usize {
        self.sheets.push(sheet);
        self.sheets.len() - 1
    }

    pub fn sheets(&self) -> &[Worksheet] {
        &self.sheets
    }

    pub fn sheet(&self, index: usize) -> Result<&Worksheet> {
        self.sheets
            .get(index)
            .ok_or_else(|| CoderError::NotFound(format!("ワークシート {}", index)))
    }

    pub fn sheet_mut(&mut self, index: usize) -> Result<&mut Worksheet> {
        self.sheets
            .get_mut(index)
            .ok_or_else(|| CoderError::NotFound(format!("ワークシート {}", index)))
    }

    /// save() が呼ばれた回数
    pub fn save_count(&self) -> usize {
        self.saves
    }
}

impl SpreadsheetStore for MemoryStore {
    fn worksheets(&self) -> Vec<WorksheetInfo> {
        self.sheets
            .iter()
            .enumerate()
            .map(|(index, s)| WorksheetInfo {
                index,
                title: s.title.clone(),
            })
            .collect()
    }

    fn column_values(&self, sheet: usize, col: u32) -> Result<Vec<String>> {
        let ws = self.sheet(sheet)?;
        let mut values: Vec<String> = (0..ws.row_count()).map(|r| ws.text(r, col)).collect();
        while values.last().is_some_and(|v| v.trim().is_empty()) {
            values.pop();
        }
        Ok(values)
    }

    fn read_range(&self, sheet: usize, range: &CellRange) -> Result<Vec<Vec<String>>> {
        let ws = self.sheet(sheet)?;
        Ok((range.start.row..=range.end.row)
            .map(|r| {
                (range.start.col..=range.end.col)
                    .map(|c| ws.text(r, c))
                    .collect()
            })
            .collect())
    }

    fn all_values(&self, sheet: usize) -> Result<Vec<Vec<String>>> {
        Ok(self.sheet(sheet)?.values())
    }

    fn update_cells(&mut self, sheet: usize, updates: &[CellUpdate]) -> Result<()> {
        let ws = self.sheet_mut(sheet)?;
        for update in updates {
            ws.set(update.cell.row, update.cell.col, CellValue::text(&update.value));
        }
        Ok(())
    }

    fn format_cell_ranges(&mut self, sheet: usize, formats: &[FormatInstruction]) -> Result<()> {
        let ws = self.sheet_mut(sheet)?;
        for format in formats {
            for cell in format.range.cells() {
                ws.highlight(cell, format.highlight);
            }
        }
        Ok(())
    }

    fn save(&mut self) -> Result<()> {
        self.saves += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::WorksheetRef;

    fn sample() -> MemoryStore {
        let rows = vec![
            vec!["Survey", "", "", ""],
            vec!["", "", "", ""],
            vec!["id", "", "", "Answer"],
            vec!["1", "", "", "slow service"],
            vec!["2", "", "", "great food"],
        ];
        MemoryStore::new()
            .with_sheet(Worksheet::new("Index"))
            .with_sheet(Worksheet::from_rows("Wave1", &rows))
    }

    #[test]
    fn test_worksheet_lookup() {
        let store = sample();
        assert_eq!(store.worksheet(&WorksheetRef::Name("Wave1".into())).unwrap(), 1);
        assert_eq!(store.worksheet(&WorksheetRef::Index(0)).unwrap(), 0);
        let err = store.worksheet(&WorksheetRef::Name("Wave9".into())).unwrap_err();
        assert!(matches!(err, CoderError::NotFound(_)));
    }

    #[test]
    fn test_column_values_trims_trailing_empty() {
        let store = sample();
        let values = store.column_values(1, 3).unwrap();
        assert_eq!(values, vec!["", "", "Answer", "slow service", "great food"]);
        assert!(store.column_values(1, 10).unwrap().is_empty());
    }

    #[test]
    fn test_update_and_format() {
        let mut store = sample();
        let cell = CellRef::new(3, 4);
        store
            .update_cells(1, &[CellUpdate { cell, value: "C1".into() }])
            .unwrap();
        store
            .format_cell_ranges(
                1,
                &[FormatInstruction {
                    range: CellRange::single(cell),
                    highlight: Highlight::default(),
                }],
            )
            .unwrap();

        let range = CellRange::parse("E4:F5").unwrap();
        let values = store.read_range(1, &range).unwrap();
        assert_eq!(values, vec![vec!["C1", ""], vec!["", ""]]);
        let ws = store.sheet(1).unwrap();
        assert_eq!(ws.highlight_at(cell), Some(Highlight::default()));
        assert_eq!(ws.highlight_at(CellRef::new(4, 4)), None);
    }

    #[test]
    fn test_number_display() {
        assert_eq!(CellValue::Number(3.0).to_string(), "3");
        assert_eq!(CellValue::Number(2.5).to_string(), "2.5");
        assert_eq!(CellValue::Bool(true).to_string(), "TRUE");
        assert!(CellValue::text("  ").is_empty());
        assert_eq!(CellValue::Date(45413.0).to_string(), "2024-05-01");
        assert_eq!(CellValue::Date(45413.5).to_string(), "2024-05-01 12:00:00");
        let sum = CellValue::Formula {
            formula: "SUM(A1:A2)".into(),
            cached: "3".into(),
        };
        assert_eq!(sum.to_string(), "3");
        assert!(!sum.is_empty());
    }
}
