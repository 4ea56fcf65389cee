//! スペル補正モジュール
//!
//! 回答中の未知語を単語頻度辞書で補正する。
//! 候補は編集距離1、見つからなければ編集距離2から、出現頻度が最大のものを選ぶ。
//! 辞書を指定しない場合は同梱の英語頻度表（`data/en_words.txt`）を使う。

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::io::BufRead;
use std::path::Path;

const ALPHABET: &str = "abcdefghijklmnopqrstuvwxyz";

/// 同梱の英語単語頻度表（`word count` 形式）
const ENGLISH_WORDS: &str = include_str!("../data/en_words.txt");

/// 編集距離2の候補生成を行う最大語長（これより長い語は距離1のみ）
const MAX_LEN_FOR_DISTANCE_TWO: usize = 20;

/// スペルチェッカーのインターフェース
pub trait SpellChecker {
    /// 辞書に載っている語か
    fn is_known(&self, word: &str) -> bool;

    /// 補正後の語（候補がなければ元の語）
    fn correct(&self, word: &str) -> String;
}

/// 補正したトークンをフレーズ生成に反映するかどうか
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpellingMode {
    /// 補正結果をトークン列に書き戻す
    #[default]
    Fix,
    /// 補正は計算するが結果を捨てる（旧スクリプト互換）
    Legacy,
    /// スペルチェックを行わない
    Off,
}

impl std::str::FromStr for SpellingMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fix" => Ok(SpellingMode::Fix),
            "legacy" => Ok(SpellingMode::Legacy),
            "off" | "none" => Ok(SpellingMode::Off),
            _ => Err(format!("Unknown spelling mode: {}. Use fix, legacy, or off", s)),
        }
    }
}

impl std::fmt::Display for SpellingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SpellingMode::Fix => write!(f, "fix"),
            SpellingMode::Legacy => write!(f, "legacy"),
            SpellingMode::Off => write!(f, "off"),
        }
    }
}

/// 辞書なしで全語を既知とみなすチェッカー
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl SpellChecker for AcceptAll {
    fn is_known(&self, _word: &str) -> bool {
        true
    }

    fn correct(&self, word: &str) -> String {
        word.to_string()
    }
}

/// 単語頻度辞書によるスペルチェッカー
#[derive(Debug, Clone, Default)]
pub struct FrequencySpellChecker {
    words: HashMap<String, u64>,
}

impl FrequencySpellChecker {
    /// 単語リストから生成（頻度はすべて1）
    pub fn from_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut checker = Self::default();
        for w in words {
            checker.add(w.as_ref(), 1);
        }
        checker
    }

    /// 同梱の英語頻度表で生成
    pub fn english() -> Self {
        let mut checker = Self::default();
        for line in ENGLISH_WORDS.lines() {
            checker.add_line(line);
        }
        checker
    }

    /// 辞書ファイルから読み込み
    ///
    /// 1行1語。`word` または `word count` 形式、`#` 始まりはコメント。
    pub fn from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::NotFound(format!(
                "spelling dictionary {}",
                path.display()
            )));
        }
        let file = std::fs::File::open(path)?;
        Self::from_reader(std::io::BufReader::new(file))
    }

    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut checker = Self::default();
        for line in reader.lines() {
            checker.add_line(&line?);
        }
        Ok(checker)
    }

    fn add_line(&mut self, line: &str) {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return;
        }
        let mut parts = line.split_whitespace();
        if let Some(word) = parts.next() {
            let count = parts.next().and_then(|c| c.parse().ok()).unwrap_or(1);
            self.add(word, count);
        }
    }

    fn add(&mut self, word: &str, count: u64) {
        let word = word.trim().to_lowercase();
        if !word.is_empty() {
            *self.words.entry(word).or_insert(0) += count;
        }
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    fn best_known<'a, I>(&self, candidates: I) -> Option<String>
    where
        I: IntoIterator<Item = &'a String>,
    {
        candidates
            .into_iter()
            .filter_map(|c| self.words.get(c).map(|&n| (c, n)))
            // 同頻度なら辞書順で先の語を採用して結果を決定的にする
            .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(a.0)))
            .map(|(c, _)| c.clone())
    }
}

impl SpellChecker for FrequencySpellChecker {
    fn is_known(&self, word: &str) -> bool {
        // 数字を含むトークンと記号だけのトークンは補正対象外
        if word.chars().any(|c| c.is_ascii_digit()) || !word.chars().any(char::is_alphabetic) {
            return true;
        }
        let lower = word.to_lowercase();
        if self.words.contains_key(&lower) {
            return true;
        }
        // check-in などの複合語は各部分が既知なら既知
        lower.contains('-')
            && lower
                .split('-')
                .filter(|part| !part.is_empty())
                .all(|part| self.words.contains_key(part))
    }

    fn correct(&self, word: &str) -> String {
        let lower = word.to_lowercase();
        if self.words.contains_key(&lower) {
            return lower;
        }

        let first = edits1(&lower);
        if let Some(best) = self.best_known(&first) {
            return best;
        }

        if lower.chars().count() <= MAX_LEN_FOR_DISTANCE_TWO {
            let second: HashSet<String> = first.iter().flat_map(|e| edits1(e)).collect();
            if let Some(best) = self.best_known(&second) {
                return best;
            }
        }

        word.to_string()
    }
}

/// 指定した語も既知として扱うチェッカー
///
/// 用語集に載っている語が辞書にない場合でも補正で書き換えないようにする。
pub struct WithKnownWords<'a> {
    inner: &'a dyn SpellChecker,
    known: &'a HashSet<String>,
}

impl<'a> WithKnownWords<'a> {
    pub fn new(inner: &'a dyn SpellChecker, known: &'a HashSet<String>) -> Self {
        Self { inner, known }
    }
}

impl SpellChecker for WithKnownWords<'_> {
    fn is_known(&self, word: &str) -> bool {
        self.known.contains(&word.to_lowercase()) || self.inner.is_known(word)
    }

    fn correct(&self, word: &str) -> String {
        let lower = word.to_lowercase();
        if self.known.contains(&lower) {
            return lower;
        }
        self.inner.correct(word)
    }
}

/// 編集距離1の語（削除・隣接入替・置換・挿入）
fn edits1(word: &str) -> HashSet<String> {
    let chars: Vec<char> = word.chars().collect();
    let mut out = HashSet::new();

    for i in 0..=chars.len() {
        let (left, right) = chars.split_at(i);

        if !right.is_empty() {
            let mut s: String = left.iter().collect();
            s.extend(&right[1..]);
            out.insert(s);
        }

        if right.len() > 1 {
            let mut s: String = left.iter().collect();
            s.push(right[1]);
            s.push(right[0]);
            s.extend(&right[2..]);
            out.insert(s);
        }

        for c in ALPHABET.chars() {
            if !right.is_empty() {
                let mut s: String = left.iter().collect();
                s.push(c);
                s.extend(&right[1..]);
                out.insert(s);
            }

            let mut s: String = left.iter().collect();
            s.push(c);
            s.extend(right);
            out.insert(s);
        }
    }

    out
}
