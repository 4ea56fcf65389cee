//! コード付与モジュール
//!
//! 回答1件のフレーズ列を用語集と照合し、行のコード枠に新しいコードを追記する。
//!
//! ## 規則
//! - 用語集にないフレーズは無視
//! - コードが対義ペアに含まれ、極性スコアが負なら、ペアの2列目（否定側）のコードにする
//! - 行にすでにあるコード（既存分を含む）は追加しない
//! - 空き枠がなければ破棄（エラーにはしない）
//!
//! 書き込み内容とハイライト指示は `CodingBatch` に溜め、呼び出し側がまとめて反映する。

use crate::error::{Error, Result};
use crate::glossary::{Glossary, OppositePairs};
use crate::layout::{CellRange, CellRef, Highlight, SheetLayout};
use crate::phrase::generate_phrases;
use crate::sentiment::SentimentScorer;
use crate::spell::{SpellChecker, SpellingMode, WithKnownWords};
use log::debug;

/// 1行分のコード枠
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeSlots {
    /// 回答の通し番号（0始まり）
    row: usize,
    slots: Vec<Option<String>>,
}

impl CodeSlots {
    /// 空の枠
    pub fn new(row: usize, capacity: usize) -> Self {
        Self {
            row,
            slots: vec![None; capacity],
        }
    }

    /// シートから読んだセル値で初期化（空白セルは空き枠）
    pub fn from_cells<S: AsRef<str>>(row: usize, cells: &[S], capacity: usize) -> Self {
        let mut slots = Self::new(row, capacity);
        for (i, cell) in cells.iter().take(capacity).enumerate() {
            let value = cell.as_ref().trim();
            if !value.is_empty() {
                slots.slots[i] = Some(value.to_string());
            }
        }
        slots
    }

    pub fn row(&self) -> usize {
        self.row
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// 埋まっている枠の数
    pub fn filled(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_full(&self) -> bool {
        self.next_free().is_none()
    }

    pub fn contains(&self, code: &str) -> bool {
        self.slots.iter().flatten().any(|c| c == code)
    }

    /// 左から最初の空き枠
    pub fn next_free(&self) -> Option<usize> {
        self.slots.iter().position(Option::is_none)
    }

    /// 空き枠にコードを入れ、その枠番号を返す
    pub fn assign(&mut self, code: &str) -> Result<usize> {
        let slot = self.next_free().ok_or_else(|| Error::SlotOverflow {
            row: self.row,
            capacity: self.capacity(),
            code: code.to_string(),
        })?;
        self.slots[slot] = Some(code.to_string());
        Ok(slot)
    }

    pub fn get(&self, slot: usize) -> Option<&str> {
        self.slots.get(slot).and_then(|s| s.as_deref())
    }

    /// 埋まっているコード（枠順）
    pub fn codes(&self) -> Vec<&str> {
        self.slots.iter().flatten().map(String::as_str).collect()
    }
}

/// セル値の更新
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellUpdate {
    pub cell: CellRef,
    pub value: String,
}

/// 背景色の書式指示
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatInstruction {
    pub range: CellRange,
    pub highlight: Highlight,
}

/// シート1枚分の書き込みバッチ
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodingBatch {
    pub updates: Vec<CellUpdate>,
    pub formats: Vec<FormatInstruction>,
}

impl CodingBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// 新規セルの値とハイライトを1組追加
    pub fn push(&mut self, cell: CellRef, value: &str, highlight: Highlight) {
        self.updates.push(CellUpdate {
            cell,
            value: value.to_string(),
        });
        self.formats.push(FormatInstruction {
            range: CellRange::single(cell),
            highlight,
        });
    }

    pub fn len(&self) -> usize {
        self.updates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }
}

/// 1行分の処理結果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowOutcome {
    /// 極性スコア
    pub score: f64,
    /// 追加したコード（追加順）
    pub added: Vec<String>,
    /// 枠不足で破棄したコード
    pub dropped: Vec<String>,
}

impl RowOutcome {
    pub fn changed(&self) -> bool {
        !self.added.is_empty()
    }
}

/// 用語集・対義語表・レイアウトを束ねたコーダー
#[derive(Debug, Clone, Copy)]
pub struct Coder<'a> {
    glossary: &'a Glossary,
    opposites: &'a OppositePairs,
    layout: SheetLayout,
    highlight: Highlight,
}

impl<'a> Coder<'a> {
    pub fn new(glossary: &'a Glossary, opposites: &'a OppositePairs) -> Self {
        Self {
            glossary,
            opposites,
            layout: SheetLayout::default(),
            highlight: Highlight::default(),
        }
    }

    pub fn with_layout(mut self, layout: SheetLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_highlight(mut self, highlight: Highlight) -> Self {
        self.highlight = highlight;
        self
    }

    pub fn layout(&self) -> &SheetLayout {
        &self.layout
    }

    /// フレーズ列からコードを決めて行の枠に追記
    pub fn code_phrases(
        &self,
        phrases: &[String],
        score: f64,
        slots: &mut CodeSlots,
        batch: &mut CodingBatch,
    ) -> RowOutcome {
        let mut outcome = RowOutcome {
            score,
            ..Default::default()
        };

        for phrase in phrases {
            let Some(code) = self.glossary.get(phrase) else {
                continue;
            };
            let code = self.opposites.resolve(code, score);
            if slots.contains(code) {
                continue;
            }

            match slots.assign(code) {
                Ok(slot) => {
                    let cell = CellRef::new(
                        self.layout.sheet_row(slots.row()),
                        self.layout.slot_column(slot),
                    );
                    debug!("row {}: '{}' -> {} at {}", cell.row + 1, phrase, code, cell);
                    batch.push(cell, code, self.highlight);
                    outcome.added.push(code.to_string());
                }
                Err(e) => {
                    debug!("{}", e);
                    if !outcome.dropped.iter().any(|c| c == code) {
                        outcome.dropped.push(code.to_string());
                    }
                }
            }
        }

        outcome
    }

    /// 回答1件を採点・フレーズ化してコード付与
    pub fn code_response(
        &self,
        response: &str,
        scorer: &dyn SentimentScorer,
        speller: &dyn SpellChecker,
        mode: SpellingMode,
        slots: &mut CodeSlots,
        batch: &mut CodingBatch,
    ) -> RowOutcome {
        let score = scorer.score(response);
        let speller = WithKnownWords::new(speller, self.glossary.words());
        let phrases = generate_phrases(&response.to_lowercase(), &speller, mode);
        self.code_phrases(&phrases, score, slots, batch)
    }
}
