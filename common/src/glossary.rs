//! 用語集・対義語表モジュール
//!
//! 研究者が作成した表（ヘッダー行 + データ行）から、
//! フレーズ→コードの用語集と、対義コードのペア一覧を構築する。

use crate::error::{Error, Result};
use log::warn;
use std::collections::{BTreeSet, HashMap, HashSet};

/// CSVテキストを行の配列に変換（ヘッダー行も含む）
pub fn parse_csv_rows(content: &str) -> Result<Vec<Vec<String>>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(String::from).collect());
    }
    Ok(rows)
}

fn is_blank(row: &[String]) -> bool {
    row.iter().all(|c| c.trim().is_empty())
}

/// フレーズ→コードの用語集
///
/// 1行目の列がコード、同じ行の空でないセルすべて（コード自身を含む）がトリガーフレーズ。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Glossary {
    entries: HashMap<String, String>,
    /// トリガーフレーズを構成する語
    words: HashSet<String>,
}

impl Glossary {
    /// 表の行から構築（先頭行はヘッダーとして読み飛ばす）
    pub fn from_rows(rows: &[Vec<String>]) -> Result<Self> {
        let Some((_header, data)) = rows.split_first() else {
            return Err(Error::Format("glossary has no header row".into()));
        };

        let mut glossary = Self::default();
        for (i, row) in data.iter().enumerate() {
            if is_blank(row) {
                continue;
            }
            let code = row.first().map(|c| c.trim()).unwrap_or("");
            if code.is_empty() {
                warn!("glossary row {}: code column is empty, row skipped", i + 2);
                continue;
            }
            for cell in row {
                if !cell.trim().is_empty() {
                    glossary.insert(cell, code);
                }
            }
        }
        Ok(glossary)
    }

    /// CSVテキストから構築
    pub fn from_csv_str(content: &str) -> Result<Self> {
        Self::from_rows(&parse_csv_rows(content)?)
    }

    /// 登録（後から登録したものが優先）
    pub fn insert(&mut self, phrase: &str, code: &str) {
        let phrase = phrase.trim().to_lowercase();
        self.words.extend(
            phrase
                .split(|c: char| c == ',' || c == '.' || c.is_whitespace())
                .filter(|w| !w.is_empty())
                .map(String::from),
        );
        self.entries.insert(phrase, code.trim().to_string());
    }

    /// フレーズに含まれる語の集合（スペル補正で既知扱いにする）
    pub fn words(&self) -> &HashSet<String> {
        &self.words
    }

    pub fn get(&self, phrase: &str) -> Option<&str> {
        self.entries.get(phrase).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 登録されているコードの一覧
    pub fn codes(&self) -> BTreeSet<&str> {
        self.entries.values().map(String::as_str).collect()
    }
}

/// 対義コードのペア
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OppositePair {
    pub first: String,
    pub second: String,
}

impl OppositePair {
    pub fn new(first: impl Into<String>, second: impl Into<String>) -> Self {
        Self {
            first: first.into(),
            second: second.into(),
        }
    }

    pub fn contains(&self, code: &str) -> bool {
        self.first == code || self.second == code
    }

}

/// 対義コード表（読み込み順を保持）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OppositePairs {
    pairs: Vec<OppositePair>,
}

impl OppositePairs {
    pub fn new(pairs: Vec<OppositePair>) -> Self {
        Self { pairs }
    }

    /// 表の行から構築（先頭行はヘッダーとして読み飛ばす）
    pub fn from_rows(rows: &[Vec<String>]) -> Result<Self> {
        let Some((_header, data)) = rows.split_first() else {
            return Err(Error::Format("opposites table has no header row".into()));
        };

        let mut pairs = Vec::new();
        for (i, row) in data.iter().enumerate() {
            if is_blank(row) {
                continue;
            }
            let first = row.first().map(|c| c.trim()).unwrap_or("");
            let second = row.get(1).map(|c| c.trim()).unwrap_or("");
            if first.is_empty() || second.is_empty() {
                return Err(Error::Format(format!(
                    "opposites row {}: expected two codes, got {:?}",
                    i + 2,
                    row
                )));
            }
            pairs.push(OppositePair::new(first, second));
        }

        let result = Self { pairs };
        for code in result.ambiguous_codes() {
            warn!(
                "code '{}' appears in several opposite pairs; the first pair is used",
                code
            );
        }
        Ok(result)
    }

    pub fn from_csv_str(content: &str) -> Result<Self> {
        Self::from_rows(&parse_csv_rows(content)?)
    }

    /// コードを含む最初のペア
    pub fn find(&self, code: &str) -> Option<&OppositePair> {
        self.pairs.iter().find(|p| p.contains(code))
    }

    /// 極性スコアが負ならペアの2列目（否定側）のコードにする
    ///
    /// 2列目のコード自身はそのまま残る。
    pub fn resolve<'a>(&'a self, code: &'a str, score: f64) -> &'a str {
        if score < 0.0 {
            if let Some(pair) = self.find(code) {
                return &pair.second;
            }
        }
        code
    }

    /// 複数のペアに現れるコード
    pub fn ambiguous_codes(&self) -> Vec<String> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for pair in &self.pairs {
            *counts.entry(pair.first.as_str()).or_insert(0) += 1;
            if pair.second != pair.first {
                *counts.entry(pair.second.as_str()).or_insert(0) += 1;
            }
        }
        let mut codes: Vec<String> = counts
            .into_iter()
            .filter(|(_, n)| *n > 1)
            .map(|(c, _)| c.to_string())
            .collect();
        codes.sort();
        codes
    }

    pub fn iter(&self) -> impl Iterator<Item = &OppositePair> {
        self.pairs.iter()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}
