//! 感情スコアモジュール
//!
//! 回答テキストの極性を [-1, 1] の compound スコアとして算出する。
//! 既定は `vader_sentiment` の VADER 実装（辞書全体を同梱）。
//! 独自の辞書ファイルを指定した場合は `LexiconScorer` で同じ方式の簡易版を使う:
//! - 強調語（very 等）で直後の語の値を増減（3語先まで減衰あり）
//! - 3語以内の否定語で符号反転（×-0.74）
//! - "but" の前を×0.5、後を×1.5
//! - 感嘆符で強調
//! - 合計値を `sum / sqrt(sum² + 15)` で正規化

use crate::error::{Error, Result};
use log::debug;
use std::collections::HashMap;
use std::path::Path;

const NORMALIZATION_ALPHA: f64 = 15.0;
const BOOSTER_INCREMENT: f64 = 0.293;
const NEGATION_SCALAR: f64 = -0.74;
const EXCLAMATION_INCREMENT: f64 = 0.292;
const MAX_EXCLAMATIONS: usize = 4;

/// 感情スコアラーのインターフェース
pub trait SentimentScorer {
    /// compound スコア（負なら否定的）
    fn score(&self, text: &str) -> f64;
}

impl<F> SentimentScorer for F
where
    F: Fn(&str) -> f64,
{
    fn score(&self, text: &str) -> f64 {
        self(text)
    }
}

const BOOSTERS_UP: &[&str] = &[
    "absolutely",
    "completely",
    "extremely",
    "highly",
    "incredibly",
    "really",
    "so",
    "totally",
    "very",
];

const BOOSTERS_DOWN: &[&str] = &[
    "barely",
    "hardly",
    "kind",
    "less",
    "little",
    "marginally",
    "slightly",
    "somewhat",
];

const NEGATIONS: &[&str] = &[
    "aint", "cannot", "cant", "didnt", "doesnt", "dont", "isnt", "never", "no", "nor", "not",
    "nothing", "nowhere", "wasnt", "without", "wont",
];

/// VADER による既定のスコアラー
#[derive(Debug, Clone, Copy, Default)]
pub struct VaderScorer;

impl SentimentScorer for VaderScorer {
    fn score(&self, text: &str) -> f64 {
        vader_sentiment::SentimentIntensityAnalyzer::new()
            .polarity_scores(text)
            .get("compound")
            .copied()
            .unwrap_or(0.0)
    }
}

/// 辞書ファイルベースのスコアラー
#[derive(Debug, Clone)]
pub struct LexiconScorer {
    lexicon: HashMap<String, f64>,
}

impl LexiconScorer {
    pub fn with_lexicon(lexicon: HashMap<String, f64>) -> Self {
        Self { lexicon }
    }

    /// VADER形式（タブ区切り: token, mean, ...）の辞書ファイルから読み込み
    pub fn from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::NotFound(format!("sentiment lexicon {}", path.display())));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_tsv_str(&content)
    }

    pub fn from_tsv_str(content: &str) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .flexible(true)
            .quoting(false)
            .from_reader(content.as_bytes());

        let mut lexicon = HashMap::new();
        for (line, record) in reader.records().enumerate() {
            let record = record?;
            let token = record.get(0).unwrap_or("").trim();
            if token.is_empty() {
                continue;
            }
            let value = record
                .get(1)
                .and_then(|v| v.trim().parse::<f64>().ok())
                .ok_or_else(|| {
                    Error::Format(format!(
                        "lexicon line {}: missing valence for '{}'",
                        line + 1,
                        token
                    ))
                })?;
            lexicon.insert(token.to_lowercase(), value);
        }

        debug!("sentiment lexicon: {} entries", lexicon.len());
        Ok(Self::with_lexicon(lexicon))
    }

    pub fn len(&self) -> usize {
        self.lexicon.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lexicon.is_empty()
    }

    fn valence_at(&self, words: &[String], i: usize) -> f64 {
        let Some(&base) = self.lexicon.get(&words[i]) else {
            return 0.0;
        };
        let mut valence = base;

        for distance in 1..=3 {
            if i < distance {
                break;
            }
            let prev = words[i - distance].as_str();
            let decay = match distance {
                1 => 1.0,
                2 => 0.95,
                _ => 0.9,
            };
            let boost = if BOOSTERS_UP.contains(&prev) {
                BOOSTER_INCREMENT
            } else if BOOSTERS_DOWN.contains(&prev) {
                -BOOSTER_INCREMENT
            } else {
                0.0
            };
            valence += boost * decay * base.signum();
        }

        let negated = (1..=3)
            .filter(|d| i >= *d)
            .any(|d| is_negation(&words[i - d]));
        if negated {
            valence *= NEGATION_SCALAR;
        }

        valence
    }
}

impl SentimentScorer for LexiconScorer {
    fn score(&self, text: &str) -> f64 {
        let words = normalize_words(text);
        if words.is_empty() {
            return 0.0;
        }

        let mut valences: Vec<f64> = (0..words.len()).map(|i| self.valence_at(&words, i)).collect();

        if let Some(but) = words.iter().position(|w| w == "but") {
            for (i, v) in valences.iter_mut().enumerate() {
                if i < but {
                    *v *= 0.5;
                } else if i > but {
                    *v *= 1.5;
                }
            }
        }

        let mut sum: f64 = valences.iter().sum();
        if sum != 0.0 {
            let bangs = text.matches('!').count().min(MAX_EXCLAMATIONS) as f64;
            sum += bangs * EXCLAMATION_INCREMENT * sum.signum();
        }

        normalize(sum)
    }
}

fn is_negation(word: &str) -> bool {
    NEGATIONS.contains(&word) || word.ends_with("n't")
}

/// 前後の記号を除いて小文字化（語中のアポストロフィは残す）
fn normalize_words(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric() && c != '\'')
                .trim_matches('\'')
                .to_lowercase()
        })
        .filter(|w| !w.is_empty())
        .collect()
}

fn normalize(sum: f64) -> f64 {
    let score = sum / (sum * sum + NORMALIZATION_ALPHA).sqrt();
    score.clamp(-1.0, 1.0)
}
