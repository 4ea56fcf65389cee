use anyhow::Context;
use clap::Parser;
use env_logger::Env;
use std::collections::HashSet;
use std::path::Path;
use survey_coder::{batch, cli, config, pipeline, source};
use cli::{Cli, Commands};
use config::Config;
use pipeline::{CodeJob, CodeOptions, CodingReport, Collaborators, JobOptions};
use source::SourceCache;
use survey_coder_common::{
    generate_phrases, phrase::correct_tokens, tokenize, CodeSlots, CodingBatch, Glossary,
    OppositePairs, SentimentScorer, WithKnownWords, MAX_CODES_PER_RESPONSE,
};

fn print_report(report: &CodingReport, dry_run: bool) {
    println!(
        "✔ {}: 回答{}件 / {}行にコード追加 / 追加{}件",
        report.sheet, report.responses, report.rows_changed, report.codes_added
    );
    if report.codes_dropped > 0 {
        println!("  ⚠ 枠不足で{}件のコードを破棄", report.codes_dropped);
    }
    if dry_run {
        println!("  (dry-run: {}セル分の書き込みを省略)", report.cells_written);
    }
}

fn write_report<T: serde::Serialize>(path: &Path, report: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json).with_context(|| format!("{} に書き込めません", path.display()))?;
    println!("✔ 結果を保存: {}", path.display());
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::from_env(Env::default().default_filter_or(if cli.verbose { "debug" } else { "warn" }))
        .init();

    let config = Config::load()?;

    match cli.command {
        Commands::Code { responses, glossary, opposites, output, dry_run, use_cache, report: report_path, scoring } => {
            println!("📝 survey-coder - コーディング\n");
            let mut config = config;
            scoring.apply(&mut config);

            println!("[1/3] 辞書を準備中...");
            let collab = Collaborators::from_config(&config).context("辞書の読み込みに失敗しました")?;
            let cache = SourceCache::new(config.cache_dir()?);
            println!("✔ スペル補正: {}\n", config.spelling);

            println!("[2/3] コーディング中...{}", if use_cache { " (キャッシュ有効)" } else { "" });
            let job = CodeJob { responses, glossary, opposites, output };
            let options = JobOptions {
                code: CodeOptions { dry_run, progress: true },
                use_cache,
            };
            let report = pipeline::run_job(&job, &config, &collab, Some(&cache), options)
                .with_context(|| format!("{} のコーディングに失敗しました", job.responses))?;
            print_report(&report, dry_run);

            if let Some(path) = &report.saved_to {
                println!("\n[3/3] 保存完了: {}", path.display());
            }
            if let Some(path) = report_path {
                write_report(&path, &report)?;
            }
            println!("\n✅ 完了");
        }

        Commands::Batch { index, dry_run, use_cache, report: report_path, scoring } => {
            println!("📚 survey-coder - 一括コーディング\n");
            let mut config = config;
            scoring.apply(&mut config);

            let entries = batch::read_index(&index)
                .with_context(|| format!("一覧シート {} を読めません", index))?;
            println!("✔ {}シートを検出\n", entries.len());

            let collab = Collaborators::from_config(&config).context("辞書の読み込みに失敗しました")?;
            let cache = SourceCache::new(config.cache_dir()?);
            let options = JobOptions {
                code: CodeOptions { dry_run, progress: true },
                use_cache,
            };
            let total = entries.len();
            let reports = batch::run_batch(&entries, &config, &collab, Some(&cache), options, |i, entry| {
                println!("[{}/{}] {} ({})", i + 1, total, entry.name, entry.job.responses);
            })?;

            for report in &reports {
                print_report(report, dry_run);
            }
            if let Some(path) = report_path {
                write_report(&path, &reports)?;
            }
            println!("\n✅ 一括処理完了");
        }

        Commands::Phrases { text, glossary, opposites, scoring } => {
            let mut config = config;
            scoring.apply(&mut config);
            let collab = Collaborators::from_config(&config)?;

            let glossary: Option<Glossary> = match glossary {
                Some(locator) => Some(source::load_glossary(&locator, None, false)?),
                None => None,
            };
            let no_terms = HashSet::new();
            let terms = glossary.as_ref().map_or(&no_terms, |g| g.words());
            let speller = WithKnownWords::new(collab.speller.as_ref(), terms);

            let lowered = text.to_lowercase();
            let tokens = tokenize(&lowered);
            let corrected = correct_tokens(&tokens, &speller, collab.mode);
            let phrases = generate_phrases(&lowered, &speller, collab.mode);
            let score = collab.scorer.score(&text);

            println!("トークン: {:?}", tokens);
            if corrected != tokens {
                println!("補正後: {:?}", corrected);
            }
            println!("フレーズ ({}件):", phrases.len());
            for phrase in &phrases {
                println!("  - {}", phrase);
            }
            println!("極性スコア: {:.4}", score);

            if let Some(glossary) = glossary {
                let opposites = match opposites {
                    Some(locator) => source::load_opposites(&locator, None, false)?,
                    None => OppositePairs::default(),
                };
                let coder = pipeline::coder_for(&glossary, &opposites, &config);
                let mut slots = CodeSlots::new(0, MAX_CODES_PER_RESPONSE);
                let mut batch = CodingBatch::new();
                let outcome = coder.code_phrases(&phrases, score, &mut slots, &mut batch);
                println!("付与コード: {:?}", outcome.added);
            }
        }

        Commands::Cache { clear, info } => {
            let cache = SourceCache::new(config.cache_dir()?);

            if info || !clear {
                let entries = cache.entries()?;
                if entries.is_empty() {
                    println!("キャッシュなし: {}", cache.dir().display());
                } else {
                    println!("キャッシュ: {}", cache.dir().display());
                    for entry in &entries {
                        let modified = entry
                            .modified
                            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                            .unwrap_or_else(|| "-".into());
                        println!("  {} {} ({}行, {})", entry.kind.label(), entry.path.display(), entry.rows, modified);
                    }
                }
            }

            if clear {
                if cache.clear()? {
                    println!("✔ キャッシュを削除しました");
                } else {
                    println!("キャッシュは存在しません");
                }
            }
        }

        Commands::Config { set_dictionary, set_lexicon, set_spelling, set_highlight, show } => {
            let mut config = config;

            if let Some(path) = set_dictionary {
                config.set_dictionary(path)?;
                println!("✔ 単語辞書を設定しました");
            }
            if let Some(path) = set_lexicon {
                config.set_lexicon(path)?;
                println!("✔ 感情辞書を設定しました");
            }
            if let Some(mode) = set_spelling {
                config.set_spelling(mode)?;
                println!("✔ スペル補正: {}", mode);
            }
            if let Some(hex) = set_highlight {
                config.set_highlight(&hex)?;
                println!("✔ ハイライト色: {}", config.highlight.to_hex());
            }

            if show {
                let layout = &config.layout;
                println!("設定:");
                println!(
                    "  回答列: {} / コード枠: {}列 / ヘッダー行: {}",
                    survey_coder_common::layout::column_name(layout.response_column),
                    layout.slots_per_row,
                    layout.header_rows
                );
                println!("  ハイライト色: {}", config.highlight.to_hex());
                println!("  スペル補正: {}", config.spelling);
                println!(
                    "  単語辞書: {}",
                    config.dictionary.as_ref().map(|p| p.display().to_string()).unwrap_or_else(|| "未設定".into())
                );
                println!(
                    "  感情辞書: {}",
                    config.lexicon.as_ref().map(|p| p.display().to_string()).unwrap_or_else(|| "内蔵".into())
                );
                println!("  キャッシュ: {}", config.cache_dir()?.display());
                println!("  再試行: {}回 / {}ms", config.retry_attempts, config.retry_delay_ms);
            }
        }
    }

    Ok(())
}
