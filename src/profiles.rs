// rfctl - RF profile export and bulk deployment for dashboard-managed wireless networks
// Copyright (C) 2026 rfctl authors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Profile files on disk: one YAML document per RF profile, indexed by the
//! `name` field inside the content (not the filename). Settings are kept as
//! an opaque document so every field the controller returns survives an
//! export/edit/upload round trip.

use anyhow::{Context, Result, anyhow};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Loaded profile definitions plus non-fatal findings from the scan.
#[derive(Debug, Default)]
pub struct ProfileStore {
    profiles: BTreeMap<String, Value>,
    pub warnings: Vec<String>,
}

impl ProfileStore {
    /// Read every YAML file in `dir` and index it by its `name` field.
    /// A duplicate name across files is not fatal: the file read last wins
    /// and a warning records both paths.
    pub fn load(dir: &Path) -> Result<Self> {
        let mut paths: Vec<PathBuf> = fs::read_dir(dir)
            .with_context(|| format!("reading profile directory {}", dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                matches!(
                    path.extension().and_then(|e| e.to_str()),
                    Some("yaml") | Some("yml")
                )
            })
            .collect();
        paths.sort();

        let mut store = Self::default();
        let mut sources: BTreeMap<String, PathBuf> = BTreeMap::new();
        for path in paths {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("reading profile file {}", path.display()))?;
            let profile: Value = serde_yaml::from_str(&contents)
                .with_context(|| format!("parsing profile file {}", path.display()))?;
            let name = profile
                .get("name")
                .and_then(|n| n.as_str())
                .ok_or_else(|| {
                    anyhow!("profile file {} has no `name` field", path.display())
                })?
                .to_string();

            if let Some(previous) = sources.get(&name) {
                store.warnings.push(format!(
                    "profile `{}` defined in both {} and {}; keeping {}",
                    name,
                    previous.display(),
                    path.display(),
                    path.display()
                ));
            }
            sources.insert(name.clone(), path);
            store.profiles.insert(name, profile);
        }
        Ok(store)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.profiles.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.profiles.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    #[cfg(test)]
    pub fn insert(&mut self, name: String, profile: Value) {
        self.profiles.insert(name, profile);
    }
}

/// Write one YAML file per profile into `dir`, returning the paths written.
/// The controller-assigned `id` and `networkId` are stripped; the id is
/// re-resolved by name at upload time.
pub fn export_profiles(dir: &Path, profiles: &[Value]) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;

    let mut written = Vec::with_capacity(profiles.len());
    for profile in profiles {
        let name = profile
            .get("name")
            .and_then(|n| n.as_str())
            .ok_or_else(|| anyhow!("controller returned a profile without a name"))?;

        let mut doc = profile.clone();
        if let Some(map) = doc.as_object_mut() {
            map.shift_remove("id");
            map.shift_remove("networkId");
        }

        let path = dir.join(profile_filename(name));
        let yaml = serde_yaml::to_string(&doc)
            .with_context(|| format!("serializing profile `{name}`"))?;
        fs::write(&path, yaml).with_context(|| format!("writing {}", path.display()))?;
        written.push(path);
    }
    Ok(written)
}

pub fn profile_filename(name: &str) -> String {
    let stem = name
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_");
    format!("{stem}.yaml")
}
