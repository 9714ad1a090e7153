//! The enrichment run: read the document, resolve every archetype in order,
//! write the result back.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::{
    ArchetypeRecord, CardSource, DateRange, DateResolver, EmitMode, EnrichConfig, EnrichError,
    Outcome, extract, patch, regenerate,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct EnrichStats {
    pub(crate) enriched: usize,
    pub(crate) cached: usize,
    pub(crate) failed: usize,
    pub(crate) skipped: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RunSummary {
    pub(crate) records: usize,
    pub(crate) stats: EnrichStats,
    pub(crate) changed: bool,
    /// Set when the document was written.
    pub(crate) written: Option<PathBuf>,
}

fn progress_line(position: usize, total: usize, name: &str, range: &DateRange) -> String {
    let first = range.first.as_deref().unwrap_or("none");
    let latest = range.latest.as_deref().unwrap_or("none");
    match range.count {
        Some(count) => format!("[{position}/{total}] {name}: {first} to {latest} ({count} cards)"),
        None => format!("[{position}/{total}] {name}: {first} to {latest}"),
    }
}

/// Resolve and merge each record, strictly in order. A record without a
/// name is left as it is.
pub(crate) fn enrich_records<S: CardSource + ?Sized>(
    records: &mut [ArchetypeRecord],
    resolver: &mut DateResolver<'_, S>,
    refresh: bool,
) -> EnrichStats {
    let total = records.len();
    let mut stats = EnrichStats::default();
    for (idx, record) in records.iter_mut().enumerate() {
        let position = idx + 1;
        let Some(name) = record.name().map(str::to_string) else {
            warn!(position, "record has no name or archetype field; left unchanged");
            println!("[{position}/{total}] ⚠ record without a name, skipped");
            stats.skipped += 1;
            continue;
        };

        let resolution = resolver.resolve(&name);
        record.apply(&resolution.range, refresh);
        match resolution.outcome {
            Outcome::Failed => {
                stats.failed += 1;
                println!("[{position}/{total}] {name}: ⚠ lookup failed");
            }
            outcome => {
                if outcome == Outcome::Cached {
                    stats.cached += 1;
                }
                stats.enriched += 1;
                println!("{}", progress_line(position, total, &name, &resolution.range));
            }
        }
    }
    stats
}

pub(crate) fn read_document(path: &Path) -> Result<String, EnrichError> {
    fs::read_to_string(path).map_err(|e| EnrichError::io(path, e))
}

/// Write through a sibling temp file so readers never see partial output.
pub(crate) fn write_document(path: &Path, text: &str) -> Result<(), EnrichError> {
    let Some(file_name) = path.file_name() else {
        return Err(EnrichError::Config(format!(
            "output path {} has no file name",
            path.display()
        )));
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| EnrichError::io(parent, e))?;
    }
    let mut tmp_name = OsString::from(file_name);
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);
    fs::write(&tmp, text).map_err(|e| EnrichError::io(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| {
        if let Err(cleanup) = fs::remove_file(&tmp) {
            warn!(path = %tmp.display(), error = %cleanup, "could not remove temp file");
        }
        EnrichError::io(path, e)
    })
}

fn finish(
    config: &EnrichConfig,
    original: &str,
    output: String,
    dry_run: bool,
) -> Result<(bool, Option<PathBuf>), EnrichError> {
    let target = config.output_path();
    let same_path = target == config.input_path.as_path();
    let changed = output != original;
    if dry_run {
        info!(changed, path = %target.display(), "dry run; nothing written");
        return Ok((changed, None));
    }
    if !changed && same_path {
        info!(path = %target.display(), "document already up to date");
        return Ok((false, None));
    }
    write_document(target, &output)?;
    info!(path = %target.display(), "document written");
    Ok((changed, Some(target.to_path_buf())))
}

pub(crate) fn run_enrich<S: CardSource + ?Sized>(
    config: &EnrichConfig,
    source: &S,
    dry_run: bool,
) -> Result<RunSummary, EnrichError> {
    let text = read_document(&config.input_path)?;
    let catalog = extract(&text, &config.binding)?;
    info!(
        records = catalog.records.len(),
        path = %config.input_path.display(),
        strategy = ?config.strategy,
        emit = ?config.emit_mode(),
        "extracted archetype records"
    );

    let mut records = catalog.records.clone();
    let mut resolver = DateResolver::new(source, config.strategy, config.request_delay());
    let stats = enrich_records(&mut records, &mut resolver, config.refresh());

    let output = match config.emit_mode() {
        EmitMode::Regenerate => regenerate(&text, &catalog, &records)?,
        EmitMode::Patch => patch(&text, &catalog, &records),
    };
    let (changed, written) = finish(config, &text, output, dry_run)?;
    info!(
        requests = resolver.pauses(),
        enriched = stats.enriched,
        failed = stats.failed,
        skipped = stats.skipped,
        changed,
        "enrichment finished"
    );
    Ok(RunSummary {
        records: records.len(),
        stats,
        changed,
        written,
    })
}

/// Insert null date placeholders into records lacking them.
pub(crate) fn run_prepare(config: &EnrichConfig, dry_run: bool) -> Result<RunSummary, EnrichError> {
    let text = read_document(&config.input_path)?;
    let catalog = extract(&text, &config.binding)?;
    let mut records = catalog.records.clone();
    for record in &mut records {
        record.ensure_date_fields();
    }
    let output = patch(&text, &catalog, &records);
    let (changed, written) = finish(config, &text, output, dry_run)?;
    Ok(RunSummary {
        records: records.len(),
        stats: EnrichStats::default(),
        changed,
        written,
    })
}

pub(crate) fn run_list(config: &EnrichConfig) -> Result<Vec<ArchetypeRecord>, EnrichError> {
    let text = read_document(&config.input_path)?;
    let catalog = extract(&text, &config.binding)?;
    Ok(catalog.records)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::{Value, json};
    use tempfile::TempDir;

    use super::*;
    use crate::source::fixture::{FixtureSource, printed_card};
    use crate::{FIRST_RELEASE_DATE, LATEST_RELEASE_DATE, Strategy, TOTAL_CARDS};

    const DOC: &str = r##"// Archetype catalog
const archetypes = [
    {
        name: 'Alpha',
        icon: `<svg stroke="#f472b6"/>`,
        firstReleaseDate: null,
        latestReleaseDate: null,
    },
    {
        name: 'Beta',
        firstReleaseDate: null,
        latestReleaseDate: null,
    },
    {
        description: 'No name here',
    },
    {
        archetype: 'Gamma',
        firstReleaseDate: null,
        latestReleaseDate: null,
    },
];

document.addEventListener('DOMContentLoaded', () => render(archetypes));
"##;

    fn fixture() -> FixtureSource {
        FixtureSource::new()
            .with_dates("Alpha", &["2003-03-01", "2001-01-15", "2001-01-15"])
            .failing("Beta")
            .with_dates("Gamma", &["invalid-date", "2002-06-01"])
    }

    fn setup(strategy: Strategy) -> (TempDir, EnrichConfig) {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("archetypes-data.js");
        fs::write(&input, DOC).unwrap();
        let config = EnrichConfig {
            input_path: input,
            strategy,
            request_delay_ms: 0,
            ..EnrichConfig::default()
        };
        (dir, config)
    }

    fn names(records: &[ArchetypeRecord]) -> Vec<Option<&str>> {
        records.iter().map(ArchetypeRecord::name).collect()
    }

    #[test]
    fn driver_isolates_failures_and_skips_nameless() {
        let source = fixture();
        let catalog = extract(DOC, "archetypes").unwrap();
        let mut records = catalog.records.clone();
        let mut resolver = DateResolver::new(&source, Strategy::Direct, Duration::ZERO);
        let stats = enrich_records(&mut records, &mut resolver, true);

        assert_eq!(
            stats,
            EnrichStats {
                enriched: 2,
                cached: 0,
                failed: 1,
                skipped: 1
            }
        );
        assert_eq!(records[0].date(FIRST_RELEASE_DATE), Some("2001-01-15"));
        assert_eq!(records[0].date(LATEST_RELEASE_DATE), Some("2003-03-01"));
        assert_eq!(records[1].get(FIRST_RELEASE_DATE), Some(&Value::Null));
        assert_eq!(records[1].get(TOTAL_CARDS), Some(&json!(0)));
        assert_eq!(records[2], catalog.records[2]);
        assert_eq!(records[3].date(FIRST_RELEASE_DATE), Some("2002-06-01"));
        assert_eq!(records[3].date(LATEST_RELEASE_DATE), Some("2002-06-01"));
        assert_eq!(source.calls(), vec!["cards:Alpha", "cards:Beta", "cards:Gamma"]);
    }

    #[test]
    fn failed_rename_removes_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("occupied.js");
        fs::create_dir(&target).unwrap();
        fs::write(target.join("keep"), "x").unwrap();

        let err = write_document(&target, "const archetypes = [];").unwrap_err();
        assert!(matches!(err, EnrichError::Io { .. }));
        assert!(!dir.path().join("occupied.js.tmp").exists());
        assert!(target.join("keep").exists());
    }

    #[test]
    fn regenerate_run_is_idempotent() {
        let (_dir, config) = setup(Strategy::Direct);
        let source = fixture();

        let summary = run_enrich(&config, &source, false).unwrap();
        assert_eq!(summary.records, 4);
        assert!(summary.changed);
        assert_eq!(summary.written.as_deref(), Some(config.input_path.as_path()));
        let first = fs::read_to_string(&config.input_path).unwrap();
        assert!(first.starts_with("// Archetype catalog\nconst archetypes = [\n"));
        assert!(first.ends_with("];\n\ndocument.addEventListener('DOMContentLoaded', () => render(archetypes));\n"));

        let summary = run_enrich(&config, &source, false).unwrap();
        assert!(!summary.changed);
        let second = fs::read_to_string(&config.input_path).unwrap();
        assert_eq!(first, second);

        let records = extract(&second, "archetypes").unwrap().records;
        assert_eq!(names(&records), vec![Some("Alpha"), Some("Beta"), None, Some("Gamma")]);
        assert_eq!(records[0].get(TOTAL_CARDS), Some(&json!(3)));
        assert_eq!(records[2], extract(DOC, "archetypes").unwrap().records[2]);
    }

    #[test]
    fn patch_run_keeps_formatting_and_settles() {
        let (_dir, config) = setup(Strategy::Indexed);
        let source = FixtureSource::new()
            .with_set("LOB", "Legend of Blue Eyes White Dragon", "2002-03-08")
            .with_set("RA01", "25th Anniversary Rarity Collection", "2023-11-02")
            .with_cards("Alpha", vec![printed_card(&["LOB-EN001", "RA01-EN001"])])
            .failing("Beta");

        let summary = run_enrich(&config, &source, false).unwrap();
        assert_eq!(summary.stats.failed, 1);
        let out = fs::read_to_string(&config.input_path).unwrap();
        let expected = DOC.replacen(
            "name: 'Alpha',\n        icon: `<svg stroke=\"#f472b6\"/>`,\n        firstReleaseDate: null,\n        latestReleaseDate: null,",
            "name: 'Alpha',\n        icon: `<svg stroke=\"#f472b6\"/>`,\n        firstReleaseDate: '2002-03-08',\n        latestReleaseDate: '2023-11-02',",
            1,
        );
        assert_eq!(out, expected);

        let summary = run_enrich(&config, &source, false).unwrap();
        assert!(!summary.changed);
        assert_eq!(fs::read_to_string(&config.input_path).unwrap(), expected);
    }

    #[test]
    fn separate_output_path_leaves_input_alone() {
        let (dir, mut config) = setup(Strategy::Direct);
        let output = dir.path().join("out").join("enriched.js");
        config.output_path = Some(output.clone());
        run_enrich(&config, &fixture(), false).unwrap();
        assert_eq!(fs::read_to_string(&config.input_path).unwrap(), DOC);
        let records = extract(&fs::read_to_string(&output).unwrap(), "archetypes").unwrap().records;
        assert_eq!(records[3].date(LATEST_RELEASE_DATE), Some("2002-06-01"));
    }

    #[test]
    fn dry_run_writes_nothing() {
        let (_dir, config) = setup(Strategy::Direct);
        let summary = run_enrich(&config, &fixture(), true).unwrap();
        assert!(summary.changed);
        assert!(summary.written.is_none());
        assert_eq!(fs::read_to_string(&config.input_path).unwrap(), DOC);
    }

    #[test]
    fn missing_literal_aborts_before_lookups() {
        let (_dir, config) = setup(Strategy::Direct);
        fs::write(&config.input_path, "const other = [];").unwrap();
        let source = fixture();
        let err = run_enrich(&config, &source, false).unwrap_err();
        assert!(matches!(err, EnrichError::Extraction(_)));
        assert!(source.calls().is_empty());
    }

    #[test]
    fn missing_input_is_an_io_error() {
        let (dir, mut config) = setup(Strategy::Direct);
        config.input_path = dir.path().join("absent.js");
        let err = run_enrich(&config, &fixture(), false).unwrap_err();
        assert!(matches!(err, EnrichError::Io { .. }));
    }

    #[test]
    fn prepare_adds_placeholders_once() {
        let (_dir, config) = setup(Strategy::Direct);
        fs::write(
            &config.input_path,
            "const archetypes = [\n    {\n        name: 'A',\n        icon: `<svg/>`\n    },\n    {\n        name: 'B',\n        firstReleaseDate: '2001-01-01',\n        latestReleaseDate: null\n    }\n];\n",
        )
        .unwrap();

        let summary = run_prepare(&config, false).unwrap();
        assert!(summary.changed);
        let out = fs::read_to_string(&config.input_path).unwrap();
        assert_eq!(
            out,
            "const archetypes = [\n    {\n        name: 'A',\n        icon: `<svg/>`,\n        firstReleaseDate: null,\n        latestReleaseDate: null\n    },\n    {\n        name: 'B',\n        firstReleaseDate: '2001-01-01',\n        latestReleaseDate: null\n    }\n];\n"
        );
        assert!(!run_prepare(&config, false).unwrap().changed);
    }

    #[test]
    fn list_reads_without_network() {
        let (_dir, config) = setup(Strategy::Direct);
        let records = run_list(&config).unwrap();
        assert_eq!(names(&records), vec![Some("Alpha"), Some("Beta"), None, Some("Gamma")]);
    }

    #[test]
    fn progress_line_format() {
        let range = DateRange {
            first: Some("2001-01-15".into()),
            latest: Some("2003-03-01".into()),
            count: Some(3),
        };
        assert_eq!(
            progress_line(1, 4, "Alpha", &range),
            "[1/4] Alpha: 2001-01-15 to 2003-03-01 (3 cards)"
        );
        assert_eq!(
            progress_line(2, 4, "Beta", &DateRange::empty(None)),
            "[2/4] Beta: none to none"
        );
    }
}
