use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::domain::{CloudClipId, ScrapedSlug, Source, Uid};
use crate::error::DatasetError;

const DEFAULT_MAPPING: &str = include_str!("../data/sources.json");

#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub pixabay: BTreeMap<String, Uid>,
    #[serde(default)]
    pub virat: BTreeMap<String, RepositoryEntry>,
    #[serde(default)]
    pub meva: BTreeMap<String, Uid>,
    #[serde(default)]
    pub pathtrack: BTreeMap<String, Uid>,
    #[serde(default)]
    pub endpoints: Endpoints,
    #[serde(default)]
    pub audit: AuditExpectation,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum RepositoryEntry {
    Shorthand(Uid),
    Detailed(RepositoryEntryObject),
}

#[derive(Debug, Deserialize, Serialize)]
pub struct RepositoryEntryObject {
    pub uid: Uid,
    #[serde(default)]
    pub item: Option<String>,
}

/// Remote locations. Templates carry an `{id}` placeholder.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Endpoints {
    pub pixabay_home: String,
    pub pixabay_download: String,
    pub virat_item: String,
    pub pathtrack_archive: String,
    pub meva_prefix: String,
    pub core_prefix: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            pixabay_home: "https://pixabay.com".to_string(),
            pixabay_download: "https://pixabay.com/videos/download/video-{id}_source.mp4?attachment"
                .to_string(),
            virat_item: "https://data.kitware.com/api/v1/item/{id}/download".to_string(),
            pathtrack_archive:
                "https://data.vision.ee.ethz.ch/daid/MOT/pathtrack_release_v1.0.zip".to_string(),
            meva_prefix: "s3://mevadata-public-01/drops-123-r13".to_string(),
            core_prefix: "s3://tracking-dataset-eccv-2022/dataset".to_string(),
        }
    }
}

pub fn fill_template(template: &str, id: &str) -> String {
    template.replace("{id}", id)
}

/// The uids a complete collection holds: `0..range_end` minus `exclude`, plus `extra`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct AuditExpectation {
    pub range_end: u32,
    pub exclude: Vec<u32>,
    pub extra: Vec<u32>,
}

impl Default for AuditExpectation {
    fn default() -> Self {
        Self {
            range_end: 237,
            exclude: vec![138, 139],
            extra: vec![99999],
        }
    }
}

impl AuditExpectation {
    pub fn expected_uids(&self) -> BTreeSet<Uid> {
        (0..self.range_end)
            .filter(|num| !self.exclude.contains(num))
            .chain(self.extra.iter().copied())
            .map(Uid::new)
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct ScrapedRequest {
    pub slug: ScrapedSlug,
    pub uid: Uid,
}

#[derive(Debug, Clone)]
pub struct RepositoryRequest {
    pub file_name: String,
    pub item: Option<String>,
    pub uid: Uid,
}

#[derive(Debug, Clone)]
pub struct CloudRequest {
    pub clip: CloudClipId,
    pub uid: Uid,
}

#[derive(Debug, Clone)]
pub struct SequenceRequest {
    pub sequence: String,
    pub uid: Uid,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub pixabay: Vec<ScrapedRequest>,
    pub virat: Vec<RepositoryRequest>,
    pub meva: Vec<CloudRequest>,
    pub pathtrack: Vec<SequenceRequest>,
    pub endpoints: Endpoints,
    pub audit: AuditExpectation,
}

impl ResolvedConfig {
    pub fn entry_count(&self, source: Source) -> usize {
        match source {
            Source::Pixabay => self.pixabay.len(),
            Source::Virat => self.virat.len(),
            Source::Meva => self.meva.len(),
            Source::Pathtrack => self.pathtrack.len(),
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads the mapping file at `path`, or the built-in mapping when `None`.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, DatasetError> {
        let content = match path {
            Some(path) => {
                let config_path = PathBuf::from(path);
                fs::read_to_string(&config_path)
                    .map_err(|_| DatasetError::ConfigRead(config_path.clone()))?
            }
            None => DEFAULT_MAPPING.to_string(),
        };
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| DatasetError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, DatasetError> {
        let schema_version = config.schema_version.unwrap_or(1);

        let pixabay = config
            .pixabay
            .into_iter()
            .map(|(slug, uid)| {
                Ok(ScrapedRequest {
                    slug: slug.parse()?,
                    uid,
                })
            })
            .collect::<Result<Vec<_>, DatasetError>>()?;

        let virat = config
            .virat
            .into_iter()
            .map(|(file_name, entry)| match entry {
                RepositoryEntry::Shorthand(uid) => RepositoryRequest {
                    file_name,
                    item: None,
                    uid,
                },
                RepositoryEntry::Detailed(obj) => RepositoryRequest {
                    file_name,
                    item: obj.item.filter(|item| !item.trim().is_empty()),
                    uid: obj.uid,
                },
            })
            .collect::<Vec<_>>();

        let meva = config
            .meva
            .into_iter()
            .map(|(clip, uid)| {
                Ok(CloudRequest {
                    clip: clip.parse()?,
                    uid,
                })
            })
            .collect::<Result<Vec<_>, DatasetError>>()?;

        let pathtrack = config
            .pathtrack
            .into_iter()
            .map(|(sequence, uid)| SequenceRequest { sequence, uid })
            .collect::<Vec<_>>();

        let resolved = ResolvedConfig {
            schema_version,
            pixabay,
            virat,
            meva,
            pathtrack,
            endpoints: config.endpoints,
            audit: config.audit,
        };
        check_unique_uids(&resolved)?;
        Ok(resolved)
    }
}

fn check_unique_uids(config: &ResolvedConfig) -> Result<(), DatasetError> {
    let all = config
        .pixabay
        .iter()
        .map(|req| (req.uid, req.slug.as_str()))
        .chain(config.virat.iter().map(|req| (req.uid, req.file_name.as_str())))
        .chain(config.meva.iter().map(|req| (req.uid, req.clip.as_str())))
        .chain(
            config
                .pathtrack
                .iter()
                .map(|req| (req.uid, req.sequence.as_str())),
        );

    let mut seen = HashMap::new();
    for (uid, source_id) in all {
        if let Some(previous) = seen.insert(uid, source_id) {
            return Err(DatasetError::MappingParse(format!(
                "{uid} is mapped from both {previous} and {source_id}"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_mapping_resolves() {
        let resolved = ConfigLoader::resolve(None).unwrap();
        assert_eq!(resolved.schema_version, 1);
        assert_eq!(resolved.pixabay.len(), 6);
        assert_eq!(resolved.virat.len(), 9);
        assert_eq!(resolved.meva.len(), 16);
        assert_eq!(resolved.pathtrack.len(), 24);
        assert!(resolved.virat.iter().all(|req| req.item.is_some()));
    }

    #[test]
    fn default_expectation_has_gaps_and_extra() {
        let expected = AuditExpectation::default().expected_uids();
        assert_eq!(expected.len(), 236);
        assert!(!expected.contains(&Uid::new(138)));
        assert!(!expected.contains(&Uid::new(139)));
        assert!(expected.contains(&Uid::new(99999)));
        assert!(!expected.contains(&Uid::new(237)));
    }
}
