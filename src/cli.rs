use crate::store::SheetLocator;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use survey_coder_common::SpellingMode;

#[derive(Parser)]
#[command(name = "survey-coder")]
#[command(about = "自由記述アンケート回答のコーディングツール", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 詳細ログを出力
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// 採点・スペル補正の上書き指定（省略時は設定ファイルの値）
#[derive(Args, Debug, Clone, Default)]
pub struct ScoringArgs {
    /// スペル補正 (fix/legacy/off)
    #[arg(long)]
    pub spelling: Option<SpellingMode>,

    /// 単語頻度辞書ファイル
    #[arg(long)]
    pub dictionary: Option<PathBuf>,

    /// 感情辞書ファイル（タブ区切り）
    #[arg(long)]
    pub lexicon: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 回答シートをコーディング
    Code {
        /// 回答シート（例: answers.xlsx#Wave1）
        #[arg(required = true)]
        responses: SheetLocator,

        /// 用語集シート
        #[arg(short, long)]
        glossary: SheetLocator,

        /// 対義語表シート
        #[arg(long)]
        opposites: Option<SheetLocator>,

        /// 出力ファイル（デフォルト: CSVは元ファイルに上書き、ブックは <名前>.coded.xlsx）
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// 書き込まずに結果だけ表示
        #[arg(long)]
        dry_run: bool,

        /// 用語集・対義語表のキャッシュを使用
        #[arg(long)]
        use_cache: bool,

        /// 処理結果をJSONで保存
        #[arg(long)]
        report: Option<PathBuf>,

        #[command(flatten)]
        scoring: ScoringArgs,
    },

    /// 一覧シートに並んだ複数シートを一括コーディング
    Batch {
        /// 一覧シート（名前, 回答シート, 用語集, 対義語表）
        #[arg(required = true)]
        index: SheetLocator,

        /// 書き込まずに結果だけ表示
        #[arg(long)]
        dry_run: bool,

        /// 用語集・対義語表のキャッシュを使用
        #[arg(long)]
        use_cache: bool,

        /// 処理結果をJSONで保存
        #[arg(long)]
        report: Option<PathBuf>,

        #[command(flatten)]
        scoring: ScoringArgs,
    },

    /// 回答1件のフレーズ・スコア・付与コードを表示
    Phrases {
        /// 回答テキスト
        #[arg(required = true)]
        text: String,

        /// 用語集シート
        #[arg(short, long)]
        glossary: Option<SheetLocator>,

        /// 対義語表シート
        #[arg(long)]
        opposites: Option<SheetLocator>,

        #[command(flatten)]
        scoring: ScoringArgs,
    },

    /// キャッシュ管理
    Cache {
        /// キャッシュを削除
        #[arg(long)]
        clear: bool,

        /// キャッシュ情報を表示
        #[arg(long)]
        info: bool,
    },

    /// 設定
    Config {
        /// 単語頻度辞書を設定
        #[arg(long)]
        set_dictionary: Option<PathBuf>,

        /// 感情辞書を設定
        #[arg(long)]
        set_lexicon: Option<PathBuf>,

        /// スペル補正モードを設定 (fix/legacy/off)
        #[arg(long)]
        set_spelling: Option<SpellingMode>,

        /// ハイライト色を設定（例: #FFFFB3）
        #[arg(long)]
        set_highlight: Option<String>,

        /// 現在の設定を表示
        #[arg(long)]
        show: bool,
    },
}

impl ScoringArgs {
    /// 設定に上書きを反映
    pub fn apply(&self, config: &mut crate::config::Config) {
        if let Some(mode) = self.spelling {
            config.spelling = mode;
        }
        if let Some(path) = &self.dictionary {
            config.dictionary = Some(path.clone());
        }
        if let Some(path) = &self.lexicon {
            config.lexicon = Some(path.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::store::WorksheetRef;

    #[test]
    fn test_parse_code() {
        let cli = Cli::try_parse_from([
            "survey-coder",
            "code",
            "answers.xlsx#Wave1",
            "-g",
            "codes.csv",
            "--opposites",
            "pairs.csv",
            "--spelling",
            "legacy",
            "--dry-run",
            "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Code {
                responses,
                glossary,
                opposites,
                dry_run,
                scoring,
                ..
            } => {
                assert_eq!(responses.worksheet, WorksheetRef::Name("Wave1".into()));
                assert_eq!(glossary.path, PathBuf::from("codes.csv"));
                assert!(opposites.is_some());
                assert!(dry_run);
                assert_eq!(scoring.spelling, Some(SpellingMode::Legacy));
            }
            _ => panic!("code サブコマンドのはず"),
        }
    }

    #[test]
    fn test_code_requires_glossary() {
        assert!(Cli::try_parse_from(["survey-coder", "code", "answers.xlsx"]).is_err());
    }

    #[test]
    fn test_scoring_args_override() {
        let mut config = Config::default();
        let args = ScoringArgs {
            spelling: Some(SpellingMode::Off),
            dictionary: Some(PathBuf::from("words.txt")),
            lexicon: None,
        };
        args.apply(&mut config);
        assert_eq!(config.spelling, SpellingMode::Off);
        assert_eq!(config.dictionary, Some(PathBuf::from("words.txt")));
        assert!(config.lexicon.is_none());
    }
}
