//! シート1枚のコーディング処理
//!
//! 回答列とコード枠を読み、全回答をコーディングしてから
//! 書き込みと書式設定をそれぞれ1回でまとめて反映する。

use crate::config::Config;
use crate::error::Result;
use crate::retry::{with_retry, RetryPolicy};
use crate::source::{self, SourceCache};
use crate::store::{FileStore, SheetLocator, SpreadsheetStore};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info};
use serde::Serialize;
use std::path::PathBuf;
use survey_coder_common::{
    AcceptAll, CodeSlots, Coder, CodingBatch, FrequencySpellChecker, Glossary, LexiconScorer,
    OppositePairs, SentimentScorer, SpellChecker, SpellingMode, VaderScorer,
};

/// 採点器・スペルチェッカーの組
pub struct Collaborators {
    pub scorer: Box<dyn SentimentScorer>,
    pub speller: Box<dyn SpellChecker>,
    pub mode: SpellingMode,
}

impl Collaborators {
    /// 設定の辞書パスから構築
    ///
    /// 感情辞書の指定がなければ VADER、単語辞書の指定がなければ同梱の英語頻度表を使う。
    pub fn from_config(config: &Config) -> Result<Self> {
        let scorer: Box<dyn SentimentScorer> = match &config.lexicon {
            Some(path) => {
                let scorer = LexiconScorer::from_path(path)?;
                info!("感情辞書: {} ({}語)", path.display(), scorer.len());
                Box::new(scorer)
            }
            None => Box::new(VaderScorer),
        };

        let speller: Box<dyn SpellChecker> = match (&config.dictionary, config.spelling) {
            (_, SpellingMode::Off) => Box::new(AcceptAll),
            (Some(path), _) => {
                let speller = FrequencySpellChecker::from_path(path)?;
                info!("単語辞書: {} ({}語)", path.display(), speller.len());
                Box::new(speller)
            }
            (None, _) => Box::new(FrequencySpellChecker::english()),
        };

        Ok(Self {
            scorer,
            speller,
            mode: config.spelling,
        })
    }
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            scorer: Box::new(VaderScorer),
            speller: Box::new(FrequencySpellChecker::english()),
            mode: SpellingMode::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CodeOptions {
    /// 書き込み・保存をしない
    pub dry_run: bool,
    /// 進捗バーを表示
    pub progress: bool,
}

/// シート1枚の処理結果
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CodingReport {
    pub sheet: String,
    pub responses: usize,
    pub rows_changed: usize,
    pub codes_added: usize,
    pub codes_dropped: usize,
    pub cells_written: usize,
    /// 保存先（dry-run では None）
    pub saved_to: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct SheetRun {
    pub report: CodingReport,
    pub batch: CodingBatch,
}

fn progress_bar(len: usize, show: bool) -> ProgressBar {
    if !show {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(len as u64);
    let style = ProgressStyle::with_template("{spinner} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .map(|s| s.progress_chars("=>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb
}

/// ワークシート `sheet` の全回答をコーディングする
pub fn code_sheet<S: SpreadsheetStore + ?Sized>(
    store: &mut S,
    sheet: usize,
    coder: &Coder,
    collab: &Collaborators,
    options: CodeOptions,
) -> Result<SheetRun> {
    let layout = *coder.layout();
    let title = store
        .worksheets()
        .into_iter()
        .find(|w| w.index == sheet)
        .map(|w| w.title)
        .unwrap_or_default();

    let responses: Vec<String> = store
        .column_values(sheet, layout.response_column)?
        .into_iter()
        .skip(layout.header_rows as usize)
        .collect();

    let existing = match layout.slot_range(responses.len()) {
        Some(range) => store.read_range(sheet, &range)?,
        None => Vec::new(),
    };

    let mut report = CodingReport {
        sheet: title,
        responses: responses.len(),
        ..Default::default()
    };
    let mut batch = CodingBatch::new();
    let pb = progress_bar(responses.len(), options.progress);
    pb.set_message(report.sheet.clone());

    for (i, response) in responses.iter().enumerate() {
        let cells = existing.get(i).map(Vec::as_slice).unwrap_or(&[]);
        let mut slots = CodeSlots::from_cells(i, cells, layout.slots_per_row);
        let outcome = coder.code_response(
            response,
            collab.scorer.as_ref(),
            collab.speller.as_ref(),
            collab.mode,
            &mut slots,
            &mut batch,
        );

        if outcome.changed() {
            report.rows_changed += 1;
        }
        report.codes_added += outcome.added.len();
        report.codes_dropped += outcome.dropped.len();
        if !outcome.dropped.is_empty() {
            debug!(
                "row {}: 枠不足で破棄 {:?}",
                layout.sheet_row(i) + 1,
                outcome.dropped
            );
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    report.cells_written = batch.len();
    if options.dry_run {
        info!("dry-run: {}セルの書き込みを省略", batch.len());
    } else if !batch.is_empty() {
        store.update_cells(sheet, &batch.updates)?;
        store.format_cell_ranges(sheet, &batch.formats)?;
    }

    Ok(SheetRun { report, batch })
}

/// 1シート分の入力指定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeJob {
    pub responses: SheetLocator,
    pub glossary: SheetLocator,
    pub opposites: Option<SheetLocator>,
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JobOptions {
    pub code: CodeOptions,
    pub use_cache: bool,
}

/// 用語集・対義語表を読み、回答ファイルを開いてコーディングし、保存する
pub fn run_job(
    job: &CodeJob,
    config: &Config,
    collab: &Collaborators,
    cache: Option<&SourceCache>,
    options: JobOptions,
) -> Result<CodingReport> {
    let glossary = source::load_glossary(&job.glossary, cache, options.use_cache)?;
    let opposites = match &job.opposites {
        Some(locator) => source::load_opposites(locator, cache, options.use_cache)?,
        None => OppositePairs::default(),
    };
    debug!("用語集 {}件 / 対義ペア {}件", glossary.len(), opposites.len());

    let policy = config.retry_policy();
    let mut store = open_store(&job.responses, job.output.as_ref(), policy)?;
    let sheet = store.worksheet(&job.responses.worksheet)?;

    let coder = coder_for(&glossary, &opposites, config);
    let run = code_sheet(&mut store, sheet, &coder, collab, options.code)?;

    let mut report = run.report;
    if !options.code.dry_run {
        with_retry(policy, "保存", || store.save())?;
        report.saved_to = Some(store.output().to_path_buf());
    }
    Ok(report)
}

pub fn coder_for<'a>(glossary: &'a Glossary, opposites: &'a OppositePairs, config: &Config) -> Coder<'a> {
    Coder::new(glossary, opposites)
        .with_layout(config.layout)
        .with_highlight(config.highlight)
}

fn open_store(locator: &SheetLocator, output: Option<&PathBuf>, policy: RetryPolicy) -> Result<FileStore> {
    let store = with_retry(policy, "読み込み", || FileStore::open(&locator.path))?;
    Ok(match output {
        Some(path) => store.with_output(path)?,
        None => store,
    })
}
