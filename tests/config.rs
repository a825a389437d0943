use std::collections::BTreeMap;
use std::fs;

use assert_matches::assert_matches;

use personpath_fetch::config::{
    AuditExpectation, Config, ConfigLoader, Endpoints, RepositoryEntry, RepositoryEntryObject,
    fill_template,
};
use personpath_fetch::domain::{Source, Uid};
use personpath_fetch::error::DatasetError;

fn empty_config() -> Config {
    Config {
        schema_version: None,
        pixabay: BTreeMap::new(),
        virat: BTreeMap::new(),
        meva: BTreeMap::new(),
        pathtrack: BTreeMap::new(),
        endpoints: Endpoints::default(),
        audit: AuditExpectation::default(),
    }
}

#[test]
fn repository_entries_accept_shorthand_and_detailed() {
    let mut config = empty_config();
    config.virat.insert(
        "VIRAT_S_000001.mp4".to_string(),
        RepositoryEntry::Shorthand(Uid::new(1)),
    );
    config.virat.insert(
        "VIRAT_S_000002.mp4".to_string(),
        RepositoryEntry::Detailed(RepositoryEntryObject {
            uid: Uid::new(2),
            item: Some("  ".to_string()),
        }),
    );
    config.virat.insert(
        "VIRAT_S_000003.mp4".to_string(),
        RepositoryEntry::Detailed(RepositoryEntryObject {
            uid: Uid::new(3),
            item: Some("5a1b2c".to_string()),
        }),
    );

    let resolved = ConfigLoader::resolve_config(config).unwrap();
    assert_eq!(resolved.schema_version, 1);
    assert_eq!(resolved.entry_count(Source::Virat), 3);
    assert_eq!(resolved.entry_count(Source::Meva), 0);
    assert_eq!(resolved.virat[0].item, None);
    assert_eq!(resolved.virat[1].item, None);
    assert_eq!(resolved.virat[2].item.as_deref(), Some("5a1b2c"));
}

#[test]
fn duplicate_uid_across_sources_is_rejected() {
    let mut config = empty_config();
    config
        .pixabay
        .insert("walk-city-1234".to_string(), Uid::new(7));
    config.pathtrack.insert("seqA".to_string(), Uid::new(7));

    assert_matches!(
        ConfigLoader::resolve_config(config),
        Err(DatasetError::MappingParse(message)) if message.contains("uid_vid_00007.mp4")
    );
}

#[test]
fn malformed_source_ids_are_rejected() {
    let mut config = empty_config();
    config
        .pixabay
        .insert("no-number-here".to_string(), Uid::new(1));
    assert_matches!(
        ConfigLoader::resolve_config(config),
        Err(DatasetError::MappingParse(_))
    );

    let mut config = empty_config();
    config.meva.insert("clip.mp4".to_string(), Uid::new(1));
    assert_matches!(
        ConfigLoader::resolve_config(config),
        Err(DatasetError::MappingParse(_))
    );
}

#[test]
fn mapping_file_overrides_builtin_tables() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("mapping.json");
    fs::write(
        &path,
        r#"{
            "pathtrack": { "seqA": "uid_vid_00001.mp4" },
            "endpoints": { "pathtrack_archive": "http://mirror/release.zip" },
            "audit": { "range_end": 2 }
        }"#,
    )
    .unwrap();

    let resolved = ConfigLoader::resolve(path.to_str()).unwrap();
    assert_eq!(resolved.entry_count(Source::Pathtrack), 1);
    assert_eq!(resolved.entry_count(Source::Pixabay), 0);
    assert_eq!(resolved.endpoints.pathtrack_archive, "http://mirror/release.zip");
    assert_eq!(resolved.endpoints.pixabay_home, "https://pixabay.com");
    assert_eq!(resolved.audit.exclude, vec![138, 139]);
    assert_eq!(resolved.audit.expected_uids().len(), 3);
}

#[test]
fn bad_uid_in_mapping_file_is_a_parse_error() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("mapping.json");
    fs::write(&path, r#"{ "pathtrack": { "seqA": "vid_1.mp4" } }"#).unwrap();

    assert_matches!(
        ConfigLoader::resolve(path.to_str()),
        Err(DatasetError::ConfigParse(_))
    );
}

#[test]
fn missing_mapping_file_is_a_read_error() {
    assert_matches!(
        ConfigLoader::resolve(Some("/nonexistent/mapping.json")),
        Err(DatasetError::ConfigRead(_))
    );
}

#[test]
fn builtin_mapping_covers_expected_uids() {
    let resolved = ConfigLoader::resolve(None).unwrap();
    let expected = resolved.audit.expected_uids();
    let mapped = resolved
        .pixabay
        .iter()
        .map(|req| req.uid)
        .chain(resolved.virat.iter().map(|req| req.uid))
        .chain(resolved.meva.iter().map(|req| req.uid))
        .chain(resolved.pathtrack.iter().map(|req| req.uid));
    for uid in mapped {
        assert!(expected.contains(&uid), "{uid} is mapped but never audited");
    }
}

#[test]
fn templates_take_the_identifier() {
    let endpoints = Endpoints::default();
    assert_eq!(
        fill_template(&endpoints.pixabay_download, "28889"),
        "https://pixabay.com/videos/download/video-28889_source.mp4?attachment"
    );
    assert_eq!(
        fill_template(&endpoints.virat_item, "56f5"),
        "https://data.kitware.com/api/v1/item/56f5/download"
    );
}
