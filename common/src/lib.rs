//! Survey Coder Common Library
//!
//! 自由記述回答のコーディング中核:
//! フレーズ生成・用語集照合・対義コード置換・コード枠への追記

pub mod error;
pub mod layout;
pub mod spell;
pub mod sentiment;
pub mod phrase;
pub mod glossary;
pub mod coder;

pub use error::{Error, Result};
pub use layout::{CellRange, CellRef, Highlight, SheetLayout, MAX_CODES_PER_RESPONSE};
pub use spell::{AcceptAll, FrequencySpellChecker, SpellChecker, SpellingMode, WithKnownWords};
pub use sentiment::{LexiconScorer, SentimentScorer, VaderScorer};
pub use phrase::{generate_phrases, tokenize};
pub use glossary::{parse_csv_rows, Glossary, OppositePair, OppositePairs};
pub use coder::{CellUpdate, CodeSlots, Coder, CodingBatch, FormatInstruction, RowOutcome};
