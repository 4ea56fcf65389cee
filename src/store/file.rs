//! ファイルベースのスプレッドシート
//!
//! - 読み込み: .xlsx/.xlsm/.xlsb/.xls/.ods は calamine、.csv は csv
//! - 書き込み: ブック形式は rust_xlsxwriter で全シートを書き直す（数式・日付・ハイライトを反映）。
//!   元のブックにある書式・列幅・結合セルは引き継げないため、ブックは上書きせず
//!   `<名前>.coded.xlsx` に保存する。.csv は値のみで、元ファイルに上書きする

use super::memory::{CellValue, MemoryStore, Worksheet};
use super::{SpreadsheetStore, WorksheetInfo};
use crate::error::{CoderError, Result};
use calamine::{open_workbook_auto, Data, Range, Reader};
use log::{debug, info};
use rust_xlsxwriter::{Color, Format, Formula, Workbook};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use survey_coder_common::{CellRange, CellUpdate, FormatInstruction};

/// Excelの列数上限
const MAX_COLUMNS: u32 = 16_384;

/// Excelのシート名の最大文字数
const MAX_SHEET_NAME: usize = 31;

/// ブックの既定の保存先に付ける印
const CODED_SUFFIX: &str = "coded";

const BOOK_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "ods"];

/// ファイル形式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Workbook,
    Csv,
}

impl FileKind {
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if ext == "csv" {
            Ok(FileKind::Csv)
        } else if BOOK_EXTENSIONS.contains(&ext.as_str()) {
            Ok(FileKind::Workbook)
        } else {
            Err(CoderError::Format(format!(
                "未対応のファイル形式: {} (xlsx/xls/ods/csv)",
                path.display()
            )))
        }
    }
}

/// ファイルから読み込んだスプレッドシート
#[derive(Debug, Clone)]
pub struct FileStore {
    source: PathBuf,
    output: PathBuf,
    kind: FileKind,
    book: MemoryStore,
    /// 最後に書き込んだシート（CSV出力の対象）
    active: usize,
    dirty: bool,
}

impl FileStore {
    /// ファイルを開いて全シートを読み込む
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CoderError::NotFound(path.display().to_string()));
        }
        let kind = FileKind::from_path(path)?;
        let book = match kind {
            FileKind::Csv => read_csv(path)?,
            FileKind::Workbook => read_workbook(path)?,
        };
        debug!("{}: {}シート読み込み", path.display(), book.sheets().len());

        Ok(Self {
            source: path.to_path_buf(),
            output: default_output(path, kind),
            kind,
            book,
            active: 0,
            dirty: false,
        })
    }

    /// 保存先を変更（省略時は CSV なら元ファイル、ブックなら `<名前>.coded.xlsx`）
    ///
    /// ブック形式の元ファイル自体は保存先にできない。
    pub fn with_output(mut self, output: &Path) -> Result<Self> {
        if self.kind == FileKind::Workbook && same_file(&self.source, output) {
            return Err(CoderError::Config(format!(
                "{} は書式を保持できないため上書きできません。別の保存先を指定してください",
                self.source.display()
            )));
        }
        self.output = output.to_path_buf();
        Ok(self)
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn book(&self) -> &MemoryStore {
        &self.book
    }
}

fn default_output(path: &Path, kind: FileKind) -> PathBuf {
    match kind {
        FileKind::Csv => path.to_path_buf(),
        FileKind::Workbook => {
            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default();
            path.with_file_name(format!("{}.{}.xlsx", stem, CODED_SUFFIX))
        }
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Excelで使えるシート名にする（禁止文字の置換・31文字まで・重複回避）
fn excel_sheet_name(title: &str, used: &mut HashSet<String>) -> String {
    let cleaned: String = title
        .chars()
        .map(|c| if "[]:*?/\\".contains(c) { '_' } else { c })
        .collect();
    let truncated: String = cleaned.trim().chars().take(MAX_SHEET_NAME).collect();
    let mut base = truncated.trim_matches(|c: char| c == '\'' || c.is_whitespace()).to_string();
    if base.is_empty() || base.eq_ignore_ascii_case("history") {
        base = format!("Sheet{}", used.len() + 1);
    }

    let mut name = base.clone();
    let mut n = 2;
    while used.contains(&name.to_lowercase()) {
        let suffix = format!("~{}", n);
        let keep = MAX_SHEET_NAME - suffix.chars().count();
        name = format!("{}{}", base.chars().take(keep).collect::<String>(), suffix);
        n += 1;
    }
    used.insert(name.to_lowercase());
    name
}

fn read_csv(path: &Path) -> Result<MemoryStore> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;

    let mut rows: Vec<Vec<String>> = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(String::from).collect());
    }

    let title = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "Sheet1".to_string());
    Ok(MemoryStore::new().with_sheet(Worksheet::from_rows(title, &rows)))
}

fn read_workbook(path: &Path) -> Result<MemoryStore> {
    let mut workbook = open_workbook_auto(path)?;
    let mut book = MemoryStore::new();

    for name in workbook.sheet_names() {
        let range = workbook.worksheet_range(&name)?;
        let mut sheet = Worksheet::new(name.clone());
        // calamine の範囲は最初の値のあるセルから始まる
        let (row0, col0) = range.start().unwrap_or((0, 0));
        for (r, c, data) in range.cells() {
            let value = cell_value(data);
            if !value.is_empty() {
                sheet.set(row0 + r as u32, col0 + c as u32, value);
            }
        }

        match workbook.worksheet_formula(&name) {
            Ok(formulas) => apply_formulas(&mut sheet, &formulas),
            Err(e) => debug!("{}: 数式を読めません ({})、値のみ保持", name, e),
        }
        book.add_sheet(sheet);
    }

    Ok(book)
}

/// 数式セルを「数式 + 読み込み時の値」に置き換える
fn apply_formulas(sheet: &mut Worksheet, formulas: &Range<String>) {
    let (row0, col0) = formulas.start().unwrap_or((0, 0));
    for (r, c, formula) in formulas.cells() {
        if formula.trim().is_empty() {
            continue;
        }
        let (row, col) = (row0 + r as u32, col0 + c as u32);
        let cached = sheet.text(row, col);
        sheet.set(
            row,
            col,
            CellValue::Formula {
                formula: formula.clone(),
                cached,
            },
        );
    }
}

fn cell_value(data: &Data) -> CellValue {
    match data {
        Data::Empty => CellValue::Empty,
        Data::String(s) => CellValue::text(s),
        Data::Float(f) => CellValue::Number(*f),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) if dt.is_duration() => CellValue::Number(dt.as_f64()),
        Data::DateTime(dt) => CellValue::Date(dt.as_f64()),
        other => CellValue::text(&other.to_string()),
    }
}

/// セルの書式（ハイライト色と日付の表示形式）
fn cell_format(
    cache: &mut HashMap<(Option<u32>, bool, bool), Format>,
    highlight: Option<u32>,
    value: &CellValue,
) -> Option<Format> {
    let (is_date, with_time) = match value {
        CellValue::Date(serial) => (true, serial.fract() != 0.0),
        _ => (false, false),
    };
    if highlight.is_none() && !is_date {
        return None;
    }
    let format = cache
        .entry((highlight, is_date, with_time))
        .or_insert_with(|| {
            let mut format = Format::new();
            if let Some(rgb) = highlight {
                format = format.set_background_color(Color::RGB(rgb));
            }
            if is_date {
                format = format.set_num_format(if with_time {
                    "yyyy-mm-dd hh:mm:ss"
                } else {
                    "yyyy-mm-dd"
                });
            }
            format
        });
    Some(format.clone())
}

fn write_workbook(book: &MemoryStore, output: &Path) -> Result<()> {
    let mut workbook = Workbook::new();
    let mut formats = HashMap::new();
    let mut names = HashSet::new();

    for sheet in book.sheets() {
        let worksheet = workbook.add_worksheet();
        let name = excel_sheet_name(&sheet.title, &mut names);
        if name != sheet.title {
            info!("シート名 '{}' を '{}' として保存します", sheet.title, name);
        }
        worksheet.set_name(&name)?;

        for (r, row) in sheet.rows().iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                let (r, c) = (r as u32, c as u32);
                let col = column_number(c)?;
                let highlight = sheet
                    .highlight_at(survey_coder_common::CellRef::new(r, c))
                    .map(|h| h.rgb);
                let format = cell_format(&mut formats, highlight, value);

                match (value, format.as_ref()) {
                    (CellValue::Empty, None) => {}
                    (CellValue::Empty, Some(fmt)) => {
                        worksheet.write_blank(r, col, fmt)?;
                    }
                    (CellValue::Text(s), None) => {
                        worksheet.write_string(r, col, s)?;
                    }
                    (CellValue::Text(s), Some(fmt)) => {
                        worksheet.write_string_with_format(r, col, s, fmt)?;
                    }
                    (CellValue::Number(n) | CellValue::Date(n), None) => {
                        worksheet.write_number(r, col, *n)?;
                    }
                    (CellValue::Number(n) | CellValue::Date(n), Some(fmt)) => {
                        worksheet.write_number_with_format(r, col, *n, fmt)?;
                    }
                    (CellValue::Bool(b), None) => {
                        worksheet.write_boolean(r, col, *b)?;
                    }
                    (CellValue::Bool(b), Some(fmt)) => {
                        worksheet.write_boolean_with_format(r, col, *b, fmt)?;
                    }
                    (CellValue::Formula { formula, cached }, None) => {
                        worksheet.write_formula(r, col, Formula::new(formula).set_result(cached))?;
                    }
                    (CellValue::Formula { formula, cached }, Some(fmt)) => {
                        worksheet.write_formula_with_format(
                            r,
                            col,
                            Formula::new(formula).set_result(cached),
                            fmt,
                        )?;
                    }
                }
            }
        }

        // 値のない行・列にあるハイライト
        for (cell, h) in sheet.highlights() {
            let stored = sheet
                .rows()
                .get(cell.row as usize)
                .is_some_and(|row| (cell.col as usize) < row.len());
            if !stored {
                let fmt = Format::new().set_background_color(Color::RGB(h.rgb));
                worksheet.write_blank(cell.row, column_number(cell.col)?, &fmt)?;
            }
        }
    }

    workbook.save(output)?;
    Ok(())
}

fn write_csv(book: &MemoryStore, sheet: usize, output: &Path) -> Result<()> {
    let sheet = book.sheet(sheet)?;
    if sheet.highlights().next().is_some() {
        info!("CSVには書式を保存できないため、ハイライトは省略します: {}", output.display());
    }
    let mut writer = csv::WriterBuilder::new().flexible(true).from_path(output)?;
    for row in sheet.rows() {
        writer.write_record(row.iter().map(|v| v.to_string()))?;
    }
    writer.flush()?;
    Ok(())
}

fn column_number(col: u32) -> Result<u16> {
    if col >= MAX_COLUMNS {
        return Err(CoderError::Spreadsheet(format!(
            "列 {} はシートの列数上限 {} を超えています",
            col + 1,
            MAX_COLUMNS
        )));
    }
    Ok(col as u16)
}

impl SpreadsheetStore for FileStore {
    fn worksheets(&self) -> Vec<WorksheetInfo> {
        self.book.worksheets()
    }

    fn column_values(&self, sheet: usize, col: u32) -> Result<Vec<String>> {
        self.book.column_values(sheet, col)
    }

    fn read_range(&self, sheet: usize, range: &CellRange) -> Result<Vec<Vec<String>>> {
        self.book.read_range(sheet, range)
    }

    fn all_values(&self, sheet: usize) -> Result<Vec<Vec<String>>> {
        self.book.all_values(sheet)
    }

    fn update_cells(&mut self, sheet: usize, updates: &[CellUpdate]) -> Result<()> {
        if let Some(over) = updates.iter().find(|u| u.cell.col >= MAX_COLUMNS) {
            column_number(over.cell.col)?;
        }
        self.book.update_cells(sheet, updates)?;
        self.active = sheet;
        self.dirty |= !updates.is_empty();
        Ok(())
    }

    fn format_cell_ranges(&mut self, sheet: usize, formats: &[FormatInstruction]) -> Result<()> {
        self.book.format_cell_ranges(sheet, formats)?;
        self.dirty |= !formats.is_empty();
        Ok(())
    }

    fn save(&mut self) -> Result<()> {
        if !self.dirty && self.output == self.source {
            debug!("変更なし、保存をスキップ: {}", self.output.display());
            return Ok(());
        }
        if self.output != self.source {
            info!("{} の結果を {} に保存します", self.source.display(), self.output.display());
        }

        match FileKind::from_path(&self.output)? {
            FileKind::Csv => write_csv(&self.book, self.active, &self.output)?,
            FileKind::Workbook => write_workbook(&self.book, &self.output)?,
        }
        self.dirty = false;
        Ok(())
    }
}
