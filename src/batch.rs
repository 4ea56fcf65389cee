//! 一覧シートによる複数シートの一括コーディング
//!
//! 一覧シートの各行（1行目はヘッダー）:
//! `名前, 回答シート, 用語集, [対義語表]`
//! 相対パスは一覧ファイルのあるディレクトリを基準にする。

use crate::config::Config;
use crate::error::{CoderError, Result};
use crate::pipeline::{run_job, CodeJob, CodingReport, Collaborators, JobOptions};
use crate::source::{read_table, SourceCache};
use crate::store::SheetLocator;
use log::info;
use std::path::Path;

/// 一覧シートの1行
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub name: String,
    pub job: CodeJob,
}

fn cell(row: &[String], col: usize) -> &str {
    row.get(col).map(|c| c.trim()).unwrap_or("")
}

fn locator(value: &str, base: &Path) -> Result<SheetLocator> {
    Ok(SheetLocator::parse(value)?.resolve_against(base))
}

/// 一覧の行を解析
pub fn parse_index(rows: &[Vec<String>], base: &Path) -> Result<Vec<IndexEntry>> {
    let Some((_header, data)) = rows.split_first() else {
        return Err(CoderError::Format("一覧シートにヘッダー行がありません".into()));
    };

    let mut entries = Vec::new();
    for (i, row) in data.iter().enumerate() {
        if row.iter().all(|c| c.trim().is_empty()) {
            continue;
        }
        let line = i + 2;
        let (responses, glossary) = (cell(row, 1), cell(row, 2));
        if responses.is_empty() || glossary.is_empty() {
            return Err(CoderError::Format(format!(
                "一覧 {}行目: 回答シートと用語集の指定が必要です",
                line
            )));
        }

        let name = match cell(row, 0) {
            "" => format!("sheet{}", line - 1),
            name => name.to_string(),
        };
        let opposites = match cell(row, 3) {
            "" => None,
            value => Some(locator(value, base)?),
        };

        entries.push(IndexEntry {
            name,
            job: CodeJob {
                responses: locator(responses, base)?,
                glossary: locator(glossary, base)?,
                opposites,
                output: None,
            },
        });
    }
    Ok(entries)
}

/// 一覧シートを読み込む
pub fn read_index(index: &SheetLocator) -> Result<Vec<IndexEntry>> {
    let rows = read_table(index)?;
    let base = index.path.parent().unwrap_or_else(|| Path::new("."));
    parse_index(&rows, base)
}

/// 一覧の順に全シートを処理する。途中のエラーで中断
pub fn run_batch<F>(
    entries: &[IndexEntry],
    config: &Config,
    collab: &Collaborators,
    cache: Option<&SourceCache>,
    options: JobOptions,
    mut on_start: F,
) -> Result<Vec<CodingReport>>
where
    F: FnMut(usize, &IndexEntry),
{
    let mut reports = Vec::with_capacity(entries.len());
    for (i, entry) in entries.iter().enumerate() {
        on_start(i, entry);
        let scoped = cache.map(|c| c.scoped(&entry.name));
        let report = run_job(&entry.job, config, collab, scoped.as_ref(), options)?;
        info!(
            "{}: {}件中{}行にコード追加",
            entry.name, report.responses, report.rows_changed
        );
        reports.push(report);
    }
    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::WorksheetRef;
    use std::path::PathBuf;

    fn rows(data: &[Vec<&str>]) -> Vec<Vec<String>> {
        data.iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    #[test]
    fn test_parse_index() {
        let table = rows(&[
            vec!["name", "responses", "glossary", "opposites"],
            vec!["wave1", "answers.xlsx#Wave1", "codes.csv", "pairs.csv"],
            vec!["", "", "", ""],
            vec!["", "/data/wave2.csv", "codes.xlsx#1", ""],
        ]);
        let entries = parse_index(&table, Path::new("/surveys")).unwrap();
        assert_eq!(entries.len(), 2);

        let first = &entries[0];
        assert_eq!(first.name, "wave1");
        assert_eq!(first.job.responses.path, PathBuf::from("/surveys/answers.xlsx"));
        assert_eq!(first.job.responses.worksheet, WorksheetRef::Name("Wave1".into()));
        assert_eq!(
            first.job.opposites.as_ref().map(|l| l.path.clone()),
            Some(PathBuf::from("/surveys/pairs.csv"))
        );

        let second = &entries[1];
        assert_eq!(second.name, "sheet3");
        assert_eq!(second.job.responses.path, PathBuf::from("/data/wave2.csv"));
        assert_eq!(second.job.glossary.worksheet, WorksheetRef::Index(1));
        assert!(second.job.opposites.is_none());
    }

    #[test]
    fn test_parse_index_requires_glossary() {
        let table = rows(&[vec!["name", "responses", "glossary"], vec!["w", "a.csv"]]);
        let err = parse_index(&table, Path::new(".")).unwrap_err();
        assert!(matches!(err, CoderError::Format(_)));
        assert!(err.to_string().contains("2行目"));
    }

    #[test]
    fn test_parse_index_empty() {
        assert!(parse_index(&[], Path::new(".")).is_err());
        assert!(parse_index(&rows(&[vec!["name"]]), Path::new(".")).unwrap().is_empty());
    }
}
