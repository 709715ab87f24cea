use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;
use thiserror::Error;

use crate::profiles::ProfileStore;

// Which access points a row applies its profile to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApTarget {
    NoAps,
    All,
    Serials(Vec<String>),
}

impl ApTarget {
    fn parse(field: &str) -> Self {
        let trimmed = field.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
            ApTarget::NoAps
        } else if trimmed.eq_ignore_ascii_case("all") {
            ApTarget::All
        } else {
            ApTarget::Serials(split_list(trimmed))
        }
    }

    pub fn wants_aps(&self) -> bool {
        !matches!(self, ApTarget::NoAps)
    }
}

#[derive(Debug, Clone)]
pub struct AssignmentRow {
    /// 1-based CSV line number, counting the header line.
    pub line: usize,
    pub network_name: String,
    pub profile_names: Vec<String>,
    pub ap_target: ApTarget,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowErrorKind {
    #[error("unknown profile `{0}`")]
    UnknownProfile(String),
    #[error("cannot assign multiple profiles to APs")]
    MultipleProfilesWithAps,
    #[error("no profile names given")]
    EmptyProfiles,
    #[error("malformed row: {0}")]
    Malformed(String),
}

#[derive(Debug)]
pub struct RejectedRow {
    pub line: usize,
    pub network_name: String,
    pub raw_profiles: String,
    pub raw_aps: String,
    pub reason: RowErrorKind,
}

#[derive(Debug, Default)]
pub struct ParsedAssignments {
    pub rows: Vec<AssignmentRow>,
    pub rejected: Vec<RejectedRow>,
}

#[derive(Debug, Deserialize)]
struct RawRow {
    #[serde(rename = "Network Name")]
    network: String,
    #[serde(rename = "RF Profiles")]
    profiles: String,
    #[serde(rename = "APs", default)]
    aps: String,
}

/// Read the assignment CSV and validate every data row against the loaded
/// profile store. A bad row is rejected and reported; it never aborts the
/// run. Network names are carried verbatim, resolution happens at deploy
/// time.
pub fn parse_rows(path: &Path, store: &ProfileStore) -> Result<ParsedAssignments> {
    let file =
        File::open(path).with_context(|| format!("opening assignment CSV {}", path.display()))?;
    parse_reader(BufReader::new(file), store)
}

fn parse_reader<R: io::Read>(reader: R, store: &ProfileStore) -> Result<ParsedAssignments> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut parsed = ParsedAssignments::default();
    for (idx, result) in rdr.deserialize::<RawRow>().enumerate() {
        let line = idx + 2; // 1-indexed plus the header line
        let raw = match result {
            Ok(raw) => raw,
            Err(err) => {
                parsed.rejected.push(RejectedRow {
                    line,
                    network_name: String::new(),
                    raw_profiles: String::new(),
                    raw_aps: String::new(),
                    reason: RowErrorKind::Malformed(err.to_string()),
                });
                continue;
            }
        };

        let reject = |reason: RowErrorKind| RejectedRow {
            line,
            network_name: raw.network.trim().to_string(),
            raw_profiles: raw.profiles.clone(),
            raw_aps: raw.aps.clone(),
            reason,
        };

        let profile_names = split_list(&raw.profiles);
        if profile_names.is_empty() {
            parsed.rejected.push(reject(RowErrorKind::EmptyProfiles));
            continue;
        }
        if let Some(missing) = profile_names.iter().find(|name| !store.contains(name)) {
            parsed
                .rejected
                .push(reject(RowErrorKind::UnknownProfile(missing.clone())));
            continue;
        }

        let ap_target = ApTarget::parse(&raw.aps);
        // An AP carries a single RF profile, so a row that both targets APs
        // and lists several profiles is unsatisfiable.
        if ap_target.wants_aps() && profile_names.len() > 1 {
            parsed
                .rejected
                .push(reject(RowErrorKind::MultipleProfilesWithAps));
            continue;
        }

        parsed.rows.push(AssignmentRow {
            line,
            network_name: raw.network.trim().to_string(),
            profile_names,
            ap_target,
        });
    }
    Ok(parsed)
}

fn split_list(field: &str) -> Vec<String> {
    field
        .split(',')
        .map(|part| part.trim().to_string())
        .filter(|part| !part.is_empty())
        .collect()
}
