use std::fmt;
use std::path::Path;
use std::str::FromStr;

use chrono::NaiveDate;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::DatasetError;

const UID_PREFIX: &str = "uid_vid_";
const UID_EXT: &str = ".mp4";

/// Canonical identifier of one video in the flat collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Uid(u32);

impl Uid {
    pub fn new(number: u32) -> Self {
        Self(number)
    }

    pub fn number(&self) -> u32 {
        self.0
    }

    pub fn file_name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{UID_PREFIX}{:05}{UID_EXT}", self.0)
    }
}

impl FromStr for Uid {
    type Err = DatasetError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let digits = value
            .trim()
            .strip_prefix(UID_PREFIX)
            .and_then(|rest| rest.strip_suffix(UID_EXT))
            .ok_or_else(|| DatasetError::InvalidUid(value.to_string()))?;
        if !digits.chars().all(|ch| ch.is_ascii_digit()) {
            return Err(DatasetError::InvalidUid(value.to_string()));
        }
        let uid = digits
            .parse()
            .map(Self)
            .map_err(|_| DatasetError::InvalidUid(value.to_string()))?;
        // Only the exact rendering is accepted, or the file would install
        // under a different name.
        if uid.to_string() != value.trim() {
            return Err(DatasetError::InvalidUid(value.to_string()));
        }
        Ok(uid)
    }
}

impl TryFrom<String> for Uid {
    type Error = DatasetError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Uid> for String {
    fn from(value: Uid) -> Self {
        value.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Pixabay,
    Virat,
    Meva,
    Pathtrack,
}

impl Source {
    pub const ALL: [Source; 4] = [
        Source::Pixabay,
        Source::Virat,
        Source::Meva,
        Source::Pathtrack,
    ];

    /// Name of the per-source staging folder under the videos root.
    pub fn staging_name(&self) -> &'static str {
        match self {
            Source::Pixabay => "pixabay",
            Source::Virat => "virat",
            Source::Meva => "meva",
            Source::Pathtrack => "pathtrack",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.staging_name())
    }
}

/// Scraped-site slug such as `lord-street-liverpool-city-28889`; the trailing
/// number addresses the download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapedSlug {
    slug: String,
    video_number: String,
}

impl ScrapedSlug {
    pub fn as_str(&self) -> &str {
        &self.slug
    }

    pub fn video_number(&self) -> &str {
        &self.video_number
    }
}

impl FromStr for ScrapedSlug {
    type Err = DatasetError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let number = value
            .rsplit('-')
            .next()
            .filter(|num| !num.is_empty() && num.chars().all(|ch| ch.is_ascii_digit()))
            .ok_or_else(|| {
                DatasetError::MappingParse(format!("{value}: no trailing video number"))
            })?;
        Ok(Self {
            slug: value.to_string(),
            video_number: number.to_string(),
        })
    }
}

/// Cloud-store clip identifier: `<base>_<start_ms>-<end_ms>.<ext>`.
///
/// The base names a five minute recording stored as `<base>.r13.avi` under
/// `<date>/<hour>/`. The hour is the one of the recording's *end* time, which
/// sits at a fixed offset in the name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudClipId {
    id: String,
    base: String,
    start_ms: u64,
    end_ms: u64,
}

const REMOTE_SUFFIX: &str = ".r13.avi";
const DATE_RANGE: std::ops::Range<usize> = 0..10;
const HOUR_RANGE: std::ops::Range<usize> = 20..22;

impl CloudClipId {
    pub fn as_str(&self) -> &str {
        &self.id
    }

    pub fn start_ms(&self) -> u64 {
        self.start_ms
    }

    pub fn end_ms(&self) -> u64 {
        self.end_ms
    }

    pub fn remote_file_name(&self) -> String {
        format!("{}{REMOTE_SUFFIX}", self.base)
    }

    pub fn date(&self) -> &str {
        &self.base[DATE_RANGE]
    }

    /// Do not take `[11..13]`: the bucket is keyed by the end-time hour.
    pub fn hour(&self) -> &str {
        &self.base[HOUR_RANGE]
    }

    pub fn object_uri(&self, prefix: &str) -> String {
        format!(
            "{}/{}/{}/{}",
            prefix.trim_end_matches('/'),
            self.date(),
            self.hour(),
            self.remote_file_name()
        )
    }
}

impl FromStr for CloudClipId {
    type Err = DatasetError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = |why: &str| DatasetError::MappingParse(format!("{value}: {why}"));

        let (base, range) = value
            .rsplit_once('_')
            .ok_or_else(|| invalid("missing `_<start>-<end>` suffix"))?;
        let range = Path::new(range)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .ok_or_else(|| invalid("missing time range"))?;
        let (start, end) = range
            .split_once('-')
            .ok_or_else(|| invalid("time range must be `<start>-<end>`"))?;
        let start_ms: u64 = start.parse().map_err(|_| invalid("bad start time"))?;
        let end_ms: u64 = end.parse().map_err(|_| invalid("bad end time"))?;
        if end_ms <= start_ms {
            return Err(invalid("end time must be after start time"));
        }

        if !base.is_ascii() || base.len() < HOUR_RANGE.end {
            return Err(invalid("file name too short to carry date and hour"));
        }
        NaiveDate::parse_from_str(&base[DATE_RANGE], "%Y-%m-%d")
            .map_err(|_| invalid("bad date prefix"))?;
        let hour: u32 = base[HOUR_RANGE]
            .parse()
            .map_err(|_| invalid("bad hour field"))?;
        if hour > 23 {
            return Err(invalid("hour out of range"));
        }

        Ok(Self {
            id: value.to_string(),
            base: base.to_string(),
            start_ms,
            end_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn uid_round_trips_file_name() {
        let uid: Uid = "uid_vid_00144.mp4".parse().unwrap();
        assert_eq!(uid.number(), 144);
        assert_eq!(uid.file_name(), "uid_vid_00144.mp4");
        assert_eq!(Uid::new(99999).to_string(), "uid_vid_99999.mp4");
    }

    #[test]
    fn uid_rejects_other_names() {
        assert_matches!(
            "vid_00144.mp4".parse::<Uid>(),
            Err(DatasetError::InvalidUid(_))
        );
        assert_matches!(
            "uid_vid_12.mp4".parse::<Uid>(),
            Err(DatasetError::InvalidUid(_))
        );
        assert_matches!(
            "uid_vid_000144.mp4".parse::<Uid>(),
            Err(DatasetError::InvalidUid(_))
        );
        assert_matches!(
            "uid_vid_+0144.mp4".parse::<Uid>(),
            Err(DatasetError::InvalidUid(_))
        );
    }

    #[test]
    fn uid_accepts_wider_numbers_without_padding() {
        let uid: Uid = "uid_vid_123456.mp4".parse().unwrap();
        assert_eq!(uid.number(), 123456);
        assert_eq!(uid.file_name(), "uid_vid_123456.mp4");
    }

    #[test]
    fn scraped_slug_number() {
        let slug: ScrapedSlug = "india-street-busy-rickshaw-people-3175".parse().unwrap();
        assert_eq!(slug.video_number(), "3175");
        assert_matches!(
            "no-number-here".parse::<ScrapedSlug>(),
            Err(DatasetError::MappingParse(_))
        );
    }

    #[test]
    fn cloud_clip_date_and_hour_use_fixed_offsets() {
        let clip: CloudClipId = "2018-03-07.16-50-00.16-55-00.bus.G331_180000-300166.mp4"
            .parse()
            .unwrap();
        assert_eq!(
            clip.remote_file_name(),
            "2018-03-07.16-50-00.16-55-00.bus.G331.r13.avi"
        );
        assert_eq!(clip.date(), "2018-03-07");
        assert_eq!(clip.hour(), "16");
        assert_eq!(clip.start_ms(), 180000);
        assert_eq!(clip.end_ms(), 300166);
    }

    #[test]
    fn cloud_clip_hour_is_end_time_hour() {
        let clip: CloudClipId = "2018-03-07.16-55-01.17-00-00.bus.G508_0-180000.mp4"
            .parse()
            .unwrap();
        assert_eq!(clip.hour(), "17");
        assert_eq!(
            clip.object_uri("s3://bucket/drops/"),
            "s3://bucket/drops/2018-03-07/17/2018-03-07.16-55-01.17-00-00.bus.G508.r13.avi"
        );
    }

    #[test]
    fn cloud_clip_rejects_malformed() {
        for bad in [
            "2018-03-07.16-50-00.16-55-00.bus.G331.mp4",
            "2018-03-07.16-50-00.16-55-00.bus.G331_10-x.mp4",
            "2018-03-07.16-50-00.16-55-00.bus.G331_500-100.mp4",
            "short_0-100.mp4",
            "2018-13-07.16-50-00.16-55-00.bus.G331_0-100.mp4",
        ] {
            assert_matches!(
                bad.parse::<CloudClipId>(),
                Err(DatasetError::MappingParse(_)),
                "{bad}"
            );
        }
    }
}
