//! 用語集・対義語表の読み込みとローカルキャッシュ
//!
//! 元の表を読んだら生の行を `glossary.csv` / `opposites.csv` としてキャッシュに書き出す。
//! `--use-cache` 指定時はキャッシュがあればそちらを読み、元の表は開かない。

use crate::error::Result;
use crate::store::{FileStore, SheetLocator, SpreadsheetStore};
use chrono::{DateTime, Local};
use log::{debug, info};
use std::fs;
use std::path::{Path, PathBuf};
use survey_coder_common::{Glossary, OppositePairs};

/// キャッシュ対象の表
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Glossary,
    Opposites,
}

impl SourceKind {
    pub const ALL: [SourceKind; 2] = [SourceKind::Glossary, SourceKind::Opposites];

    pub fn file_name(&self) -> &'static str {
        match self {
            SourceKind::Glossary => "glossary.csv",
            SourceKind::Opposites => "opposites.csv",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SourceKind::Glossary => "用語集",
            SourceKind::Opposites => "対義語表",
        }
    }
}

/// キャッシュ1件の情報
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub kind: SourceKind,
    pub path: PathBuf,
    pub rows: usize,
    pub modified: Option<DateTime<Local>>,
}

/// 表のローカルキャッシュ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceCache {
    dir: PathBuf,
}

impl SourceCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// バッチの各シート用のサブディレクトリ
    pub fn scoped(&self, name: &str) -> Self {
        let safe: String = name
            .trim()
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        Self::new(self.dir.join(safe))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, kind: SourceKind) -> PathBuf {
        self.dir.join(kind.file_name())
    }

    /// キャッシュを読む（なければ None）
    pub fn load(&self, kind: SourceKind) -> Result<Option<Vec<Vec<String>>>> {
        let path = self.path(kind);
        if !path.exists() {
            return Ok(None);
        }
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(&path)?;
        let mut rows = Vec::new();
        for record in reader.records() {
            rows.push(record?.iter().map(String::from).collect());
        }
        Ok(Some(rows))
    }

    pub fn save(&self, kind: SourceKind, rows: &[Vec<String>]) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path(kind);
        let mut writer = csv::WriterBuilder::new().flexible(true).from_path(&path)?;
        for row in rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        debug!("{}キャッシュ保存: {} ({}行)", kind.label(), path.display(), rows.len());
        Ok(())
    }

    /// キャッシュディレクトリごと削除。削除したら true
    pub fn clear(&self) -> Result<bool> {
        if !self.dir.exists() {
            return Ok(false);
        }
        fs::remove_dir_all(&self.dir)?;
        Ok(true)
    }

    /// 存在するキャッシュの一覧（サブディレクトリも含む）
    pub fn entries(&self) -> Result<Vec<CacheEntry>> {
        let mut entries = Vec::new();
        self.collect_entries(&mut entries)?;
        if self.dir.is_dir() {
            let mut subdirs: Vec<PathBuf> = fs::read_dir(&self.dir)?
                .filter_map(|e| e.ok().map(|e| e.path()))
                .filter(|p| p.is_dir())
                .collect();
            subdirs.sort();
            for dir in subdirs {
                SourceCache::new(dir).collect_entries(&mut entries)?;
            }
        }
        Ok(entries)
    }

    fn collect_entries(&self, entries: &mut Vec<CacheEntry>) -> Result<()> {
        for kind in SourceKind::ALL {
            if let Some(rows) = self.load(kind)? {
                let path = self.path(kind);
                let modified = fs::metadata(&path)
                    .and_then(|m| m.modified())
                    .ok()
                    .map(DateTime::<Local>::from);
                entries.push(CacheEntry {
                    kind,
                    path,
                    rows: rows.len(),
                    modified,
                });
            }
        }
        Ok(())
    }
}

/// ロケーターが指すワークシートの全セル値
pub fn read_table(locator: &SheetLocator) -> Result<Vec<Vec<String>>> {
    let store = FileStore::open(&locator.path)?;
    let sheet = store.worksheet(&locator.worksheet)?;
    store.all_values(sheet)
}

/// キャッシュ経由で表の行を取得
pub fn load_rows(
    locator: &SheetLocator,
    kind: SourceKind,
    cache: Option<&SourceCache>,
    use_cache: bool,
) -> Result<Vec<Vec<String>>> {
    if use_cache {
        if let Some(rows) = cache.map(|c| c.load(kind)).transpose()?.flatten() {
            info!("{}: キャッシュを使用 ({}行)", kind.label(), rows.len());
            return Ok(rows);
        }
        debug!("{}: キャッシュなし、{} を読み込み", kind.label(), locator);
    }

    let rows = read_table(locator)?;
    if let Some(cache) = cache {
        cache.save(kind, &rows)?;
    }
    Ok(rows)
}

pub fn load_glossary(
    locator: &SheetLocator,
    cache: Option<&SourceCache>,
    use_cache: bool,
) -> Result<Glossary> {
    let rows = load_rows(locator, SourceKind::Glossary, cache, use_cache)?;
    Ok(Glossary::from_rows(&rows)?)
}

pub fn load_opposites(
    locator: &SheetLocator,
    cache: Option<&SourceCache>,
    use_cache: bool,
) -> Result<OppositePairs> {
    let rows = load_rows(locator, SourceKind::Opposites, cache, use_cache)?;
    Ok(OppositePairs::from_rows(&rows)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoderError;
    use tempfile::tempdir;

    fn write(path: &Path, content: &str) -> SheetLocator {
        fs::write(path, content).unwrap();
        SheetLocator::parse(&path.to_string_lossy()).unwrap()
    }

    #[test]
    fn test_load_glossary_writes_cache() {
        let dir = tempdir().unwrap();
        let locator = write(
            &dir.path().join("codes.csv"),
            "code,trigger,trigger\nC1,slow service,\nC3,tasty,delicious\n",
        );
        let cache = SourceCache::new(dir.path().join("cache"));

        let glossary = load_glossary(&locator, Some(&cache), false).unwrap();
        assert_eq!(glossary.get("slow service"), Some("C1"));
        assert_eq!(glossary.get("delicious"), Some("C3"));
        assert!(cache.path(SourceKind::Glossary).exists());

        let rows = cache.load(SourceKind::Glossary).unwrap().unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1][1], "slow service");
    }

    #[test]
    fn test_use_cache_skips_source() {
        let dir = tempdir().unwrap();
        let cache = SourceCache::new(dir.path().join("cache"));
        cache
            .save(
                SourceKind::Opposites,
                &[
                    vec!["positive".into(), "negative".into()],
                    vec!["C1".into(), "C2".into()],
                ],
            )
            .unwrap();

        // 元の表は存在しない
        let missing = SheetLocator::parse(&dir.path().join("gone.csv").to_string_lossy()).unwrap();
        let pairs = load_opposites(&missing, Some(&cache), true).unwrap();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs.resolve("C1", -0.2), "C2");

        let err = load_opposites(&missing, Some(&cache), false).unwrap_err();
        assert!(matches!(err, CoderError::NotFound(_)));
    }

    #[test]
    fn test_use_cache_falls_back_to_source() {
        let dir = tempdir().unwrap();
        let locator = write(&dir.path().join("pairs.csv"), "a,b\nC1,C2\n");
        let cache = SourceCache::new(dir.path().join("cache"));

        let pairs = load_opposites(&locator, Some(&cache), true).unwrap();
        assert_eq!(pairs.len(), 1);
        assert!(cache.path(SourceKind::Opposites).exists());
    }

    #[test]
    fn test_scoped_entries_and_clear() {
        let dir = tempdir().unwrap();
        let cache = SourceCache::new(dir.path().join("cache"));
        let wave = cache.scoped("Wave 1/2");
        assert_eq!(wave.dir(), dir.path().join("cache").join("Wave_1_2"));

        let rows = vec![vec!["code".to_string()], vec!["C1".to_string()]];
        cache.save(SourceKind::Glossary, &rows).unwrap();
        wave.save(SourceKind::Glossary, &rows).unwrap();
        wave.save(SourceKind::Opposites, &rows[..1]).unwrap();

        let entries = cache.entries().unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].rows, 2);
        assert_eq!(entries[2].kind, SourceKind::Opposites);
        assert!(entries.iter().all(|e| e.modified.is_some()));

        assert!(cache.clear().unwrap());
        assert!(!cache.clear().unwrap());
        assert!(cache.entries().unwrap().is_empty());
    }

    #[test]
    fn test_empty_glossary_is_format_error() {
        let dir = tempdir().unwrap();
        let locator = write(&dir.path().join("empty.csv"), "");
        let err = load_glossary(&locator, None, false).unwrap_err();
        assert!(matches!(
            err,
            CoderError::Common(survey_coder_common::Error::Format(_))
        ));
    }
}
