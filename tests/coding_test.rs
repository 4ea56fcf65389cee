//! コーディング処理テスト
//!
//! ファイル上の回答シートに対する読み込み→コード付与→保存の一連の動作を検証

use std::fs;
use std::path::Path;
use survey_coder::config::Config;
use survey_coder::pipeline::{self, CodeJob, CodeOptions, Collaborators, JobOptions};
use survey_coder::source::{SourceCache, SourceKind};
use survey_coder::store::{FileStore, MemoryStore, SheetLocator, SpreadsheetStore, Worksheet};
use survey_coder_common::{Glossary, OppositePair, OppositePairs, SpellingMode};
use tempfile::tempdir;

const RESPONSES: &str = "\
Customer survey,,,
,,,
id,,,answer,code1,code2,code3,code4,code5,code6,code7
1,,,terrible slow service
2,,,The food was great,C3
3,,,
4,,,\"waiting, waiting and more waiting for food\",C9,C8,C7,C6,C5,C4,C0
";

const GLOSSARY: &str = "\
code,trigger1,trigger2
C1,slow service,waiting
C3,food,meal
";

const OPPOSITES: &str = "\
positive,negative
C1,C2
";

fn locator(path: &Path) -> SheetLocator {
    SheetLocator::parse(&path.to_string_lossy()).expect("ロケーター解析失敗")
}

fn write_inputs(dir: &Path) -> CodeJob {
    fs::write(dir.join("answers.csv"), RESPONSES).unwrap();
    fs::write(dir.join("glossary.csv"), GLOSSARY).unwrap();
    fs::write(dir.join("opposites.csv"), OPPOSITES).unwrap();
    CodeJob {
        responses: locator(&dir.join("answers.csv")),
        glossary: locator(&dir.join("glossary.csv")),
        opposites: Some(locator(&dir.join("opposites.csv"))),
        output: None,
    }
}

fn test_config(dir: &Path) -> Config {
    Config {
        cache_dir: Some(dir.join("cache")),
        retry_delay_ms: 0,
        ..Default::default()
    }
}

fn quiet(dry_run: bool, use_cache: bool) -> JobOptions {
    JobOptions {
        code: CodeOptions {
            dry_run,
            progress: false,
        },
        use_cache,
    }
}

fn text_at(path: &Path, row: u32, col: u32) -> String {
    let store = FileStore::open(path).expect("再読み込み失敗");
    store.book().sheet(0).unwrap().text(row, col)
}

/// CSVの回答シートをコーディングして上書き保存
#[test]
fn test_code_csv_in_place() {
    let dir = tempdir().expect("Failed to create temp dir");
    let job = write_inputs(dir.path());
    let config = test_config(dir.path());
    let cache = SourceCache::new(config.cache_dir().unwrap());

    let report = pipeline::run_job(&job, &config, &Collaborators::default(), Some(&cache), quiet(false, false))
        .expect("コーディング失敗");

    assert_eq!(report.responses, 4);
    assert_eq!(report.rows_changed, 1);
    assert_eq!(report.codes_added, 1);
    // 7枠埋まった行の C1, C3 は破棄
    assert_eq!(report.codes_dropped, 2);
    assert_eq!(report.saved_to, Some(dir.path().join("answers.csv")));

    let answers = dir.path().join("answers.csv");
    // 否定的な回答は対義コード
    assert_eq!(text_at(&answers, 3, 4), "C2");
    // 既存のコードは重複させない
    assert_eq!(text_at(&answers, 4, 4), "C3");
    assert_eq!(text_at(&answers, 4, 5), "");
    assert_eq!(text_at(&answers, 6, 10), "C0");

    // 読み込んだ表はキャッシュに残る
    assert!(cache.path(SourceKind::Glossary).exists());
    assert!(cache.path(SourceKind::Opposites).exists());
}

/// 2回目の実行では何も追加されない
#[test]
fn test_second_run_adds_nothing() {
    let dir = tempdir().expect("Failed to create temp dir");
    let job = write_inputs(dir.path());
    let config = test_config(dir.path());
    let collab = Collaborators::default();

    pipeline::run_job(&job, &config, &collab, None, quiet(false, false)).unwrap();
    let before = fs::read_to_string(dir.path().join("answers.csv")).unwrap();

    let report = pipeline::run_job(&job, &config, &collab, None, quiet(false, false)).unwrap();
    assert_eq!(report.codes_added, 0);
    assert_eq!(report.cells_written, 0);
    assert_eq!(fs::read_to_string(dir.path().join("answers.csv")).unwrap(), before);
}

/// dry-run はファイルを変更しない
#[test]
fn test_dry_run_keeps_file() {
    let dir = tempdir().expect("Failed to create temp dir");
    let job = write_inputs(dir.path());
    let config = test_config(dir.path());

    let report = pipeline::run_job(&job, &config, &Collaborators::default(), None, quiet(true, false)).unwrap();
    assert_eq!(report.cells_written, 1);
    assert!(report.saved_to.is_none());
    assert_eq!(fs::read_to_string(dir.path().join("answers.csv")).unwrap(), RESPONSES);
}

/// 別ファイルへの出力
#[test]
fn test_output_elsewhere() {
    let dir = tempdir().expect("Failed to create temp dir");
    let mut job = write_inputs(dir.path());
    let out = dir.path().join("coded.csv");
    job.output = Some(out.clone());

    pipeline::run_job(&job, &test_config(dir.path()), &Collaborators::default(), None, quiet(false, false))
        .unwrap();
    assert_eq!(text_at(&out, 3, 4), "C2");
    assert_eq!(fs::read_to_string(dir.path().join("answers.csv")).unwrap(), RESPONSES);
}

/// キャッシュがあれば元の用語集は読まない
#[test]
fn test_use_cache_after_source_removed() {
    let dir = tempdir().expect("Failed to create temp dir");
    let job = write_inputs(dir.path());
    let config = test_config(dir.path());
    let cache = SourceCache::new(config.cache_dir().unwrap());
    let collab = Collaborators::default();

    pipeline::run_job(&job, &config, &collab, Some(&cache), quiet(true, false)).unwrap();
    fs::remove_file(dir.path().join("glossary.csv")).unwrap();
    fs::remove_file(dir.path().join("opposites.csv")).unwrap();

    let report = pipeline::run_job(&job, &config, &collab, Some(&cache), quiet(false, true))
        .expect("キャッシュから読めるはず");
    assert_eq!(report.codes_added, 1);
    assert!(pipeline::run_job(&job, &config, &collab, Some(&cache), quiet(false, false)).is_err());
}

/// xlsx の指定シートだけを書き換え、他のシートと数式・日付は残す
///
/// 元のブックは変更せず `<名前>.coded.xlsx` に保存する。
#[test]
fn test_code_xlsx_named_sheet() {
    let dir = tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("answers.xlsx");

    let mut workbook = rust_xlsxwriter::Workbook::new();
    let notes = workbook.add_worksheet();
    notes.set_name("Notes").unwrap();
    notes.write_string(0, 0, "wave 1 fieldwork").unwrap();
    let wave = workbook.add_worksheet();
    wave.set_name("Wave1").unwrap();
    wave.write_string(0, 0, "Customer survey").unwrap();
    wave.write_string(2, 3, "answer").unwrap();
    wave.write_number(3, 0, 1).unwrap();
    wave.write_formula(3, 1, rust_xlsxwriter::Formula::new("=A4*2").set_result("2"))
        .unwrap();
    let date = rust_xlsxwriter::Format::new().set_num_format("yyyy-mm-dd");
    wave.write_number_with_format(3, 2, 45413.0, &date).unwrap();
    wave.write_string(3, 3, "Terrible slow service.").unwrap();
    wave.write_number(4, 0, 2).unwrap();
    wave.write_string(4, 3, "good meal").unwrap();
    workbook.save(&path).unwrap();
    let original = fs::read(&path).unwrap();

    let mut job = write_inputs(dir.path());
    job.responses = SheetLocator::parse(&format!("{}#Wave1", path.display())).unwrap();

    let report = pipeline::run_job(&job, &test_config(dir.path()), &Collaborators::default(), None, quiet(false, false))
        .expect("xlsx のコーディング失敗");
    assert_eq!(report.sheet, "Wave1");
    assert_eq!(report.codes_added, 2);
    let coded = dir.path().join("answers.coded.xlsx");
    assert_eq!(report.saved_to, Some(coded.clone()));
    assert_eq!(fs::read(&path).unwrap(), original);

    let source = FileStore::open(&path).unwrap();
    let store = FileStore::open(&coded).unwrap();
    let titles: Vec<String> = store.worksheets().into_iter().map(|w| w.title).collect();
    assert_eq!(titles, vec!["Notes", "Wave1"]);
    let wave = store.book().sheet(1).unwrap();
    assert_eq!(wave.text(3, 4), "C2");
    assert_eq!(wave.text(4, 4), "C3");
    assert_eq!(wave.text(3, 0), "1");
    assert_eq!(wave.text(3, 1), "2");
    assert_eq!(wave.text(3, 2), source.book().sheet(1).unwrap().text(3, 2));
    assert_eq!(store.book().sheet(0).unwrap().text(0, 0), "wave 1 fieldwork");

    let mut reread = calamine::open_workbook_auto(&coded).unwrap();
    let formulas = calamine::Reader::worksheet_formula(&mut reread, "Wave1").unwrap();
    let formula = formulas.get_value((3, 1)).cloned().unwrap_or_default();
    assert!(formula.contains("A4*2"), "数式が失われた: {:?}", formula);
}

/// ブックの元ファイルを保存先に指定すると拒否する
#[test]
fn test_xlsx_output_onto_source_refused() {
    let dir = tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("answers.xlsx");
    let mut workbook = rust_xlsxwriter::Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.write_string(2, 3, "answer").unwrap();
    sheet.write_string(3, 3, "slow service").unwrap();
    workbook.save(&path).unwrap();
    let original = fs::read(&path).unwrap();

    let mut job = write_inputs(dir.path());
    job.responses = locator(&path);
    job.output = Some(path.clone());

    let err = pipeline::run_job(&job, &test_config(dir.path()), &Collaborators::default(), None, quiet(false, false))
        .unwrap_err();
    assert!(matches!(err, survey_coder::error::CoderError::Config(_)));
    assert_eq!(fs::read(&path).unwrap(), original);
}

/// スペル補正: fix では補正語で照合、legacy では補正を捨てる
#[test]
fn test_spelling_modes() {
    let dir = tempdir().expect("Failed to create temp dir");
    let dictionary = dir.path().join("words.txt");
    fs::write(&dictionary, "# frequency list\nterrible 10\nslow 40\nservice 25\nfood 30\n").unwrap();

    let mut glossary = Glossary::default();
    glossary.insert("slow service", "C1");
    let opposites = OppositePairs::new(vec![OppositePair::new("C1", "C2")]);

    let run = |mode: SpellingMode| {
        let config = Config {
            dictionary: Some(dictionary.clone()),
            spelling: mode,
            ..Default::default()
        };
        let collab = Collaborators::from_config(&config).unwrap();
        let rows: Vec<Vec<String>> = vec![
            vec![],
            vec![],
            vec![],
            vec!["1".into(), "".into(), "".into(), "Terrible slow servise".into()],
        ];
        let mut store = MemoryStore::new().with_sheet(Worksheet::from_rows("Wave1", &rows));
        let coder = pipeline::coder_for(&glossary, &opposites, &config);
        pipeline::code_sheet(&mut store, 0, &coder, &collab, CodeOptions::default()).unwrap();
        store.sheet(0).unwrap().text(3, 4)
    };

    assert_eq!(run(SpellingMode::Fix), "C2");
    assert_eq!(run(SpellingMode::Legacy), "");
    assert_eq!(run(SpellingMode::Off), "");
}

/// 設定のレイアウト・ハイライト色が反映される
#[test]
fn test_custom_layout_and_highlight() {
    let mut glossary = Glossary::default();
    glossary.insert("rude", "C5");
    let opposites = OppositePairs::default();

    let mut config = Config::default();
    config.layout.response_column = 1;
    config.layout.header_rows = 1;
    config.layout.slots_per_row = 2;
    config.highlight = survey_coder_common::Highlight::from_hex("#FF0000").unwrap();

    let rows: Vec<Vec<String>> = vec![
        vec!["id".into(), "answer".into()],
        vec!["1".into(), "rude staff".into(), "".into(), "C9".into()],
    ];
    let mut store = MemoryStore::new().with_sheet(Worksheet::from_rows("S", &rows));
    let coder = pipeline::coder_for(&glossary, &opposites, &config);
    let run = pipeline::code_sheet(&mut store, 0, &coder, &Collaborators::default(), CodeOptions::default())
        .unwrap();

    assert_eq!(run.batch.formats[0].range.to_string(), "C2:C2");
    let sheet = store.sheet(0).unwrap();
    assert_eq!(sheet.text(1, 2), "C5");
    // 既存のコードは上書きしない
    assert_eq!(sheet.text(1, 3), "C9");
    let cell = survey_coder_common::CellRef::new(1, 2);
    assert_eq!(sheet.highlight_at(cell).map(|h| h.to_hex()), Some("#FF0000".to_string()));
}
