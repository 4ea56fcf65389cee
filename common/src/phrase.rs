//! フレーズ生成モジュール
//!
//! 回答テキストを単語に分割し、1-gram・2-gram・3-gramの照合候補を作る。
//!
//! ## 出力順
//! 1. 全1-gram（補正後）
//! 2. 各位置 i について 2-gram → 3-gram の順に交互
//! 3. 末尾の2-gram（ループが2つ手前で止まるため最後の隣接ペアを補う）
//!
//! 長さ違いで同じフレーズが重複することがあるが、ここでは取り除かない。

use crate::spell::{SpellChecker, SpellingMode};
use log::debug;
use regex::Regex;

/// カンマ・空白・ピリオドで分割し、空トークンを除く
pub fn tokenize(response: &str) -> Vec<String> {
    lazy_static::lazy_static! {
        static ref SEPARATOR: Regex = Regex::new(r"[,\s.]").unwrap();
    }
    SEPARATOR
        .split(response)
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect()
}

/// 未知語をスペル補正する
///
/// `Legacy` では補正を問い合わせるだけで結果を使わない。
pub fn correct_tokens(tokens: &[String], speller: &dyn SpellChecker, mode: SpellingMode) -> Vec<String> {
    if mode == SpellingMode::Off {
        return tokens.to_vec();
    }

    tokens
        .iter()
        .map(|token| {
            if speller.is_known(token) {
                return token.clone();
            }
            let corrected = speller.correct(token);
            if corrected != *token {
                debug!("spelling: {} -> {}", token, corrected);
            }
            match mode {
                SpellingMode::Fix => corrected,
                _ => token.clone(),
            }
        })
        .collect()
}

/// トークン列から照合候補フレーズを生成
pub fn phrases_from_tokens(tokens: &[String]) -> Vec<String> {
    let n = tokens.len();
    let mut out = tokens.to_vec();

    for i in 0..n.saturating_sub(2) {
        out.push(format!("{} {}", tokens[i], tokens[i + 1]));
        out.push(format!("{} {} {}", tokens[i], tokens[i + 1], tokens[i + 2]));
    }
    if n > 1 {
        out.push(format!("{} {}", tokens[n - 2], tokens[n - 1]));
    }

    out
}

/// 回答1件分のフレーズを生成
///
/// `response` は呼び出し側で小文字化済みであること。
pub fn generate_phrases(response: &str, speller: &dyn SpellChecker, mode: SpellingMode) -> Vec<String> {
    let tokens = correct_tokens(&tokenize(response), speller, mode);
    phrases_from_tokens(&tokens)
}
