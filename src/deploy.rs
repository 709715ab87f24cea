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

use indicatif::ProgressBar;
use serde_json::Value;
use std::collections::{HashMap, HashSet};

use crate::assign::{ApTarget, AssignmentRow};
use crate::client::{DashboardClient, Device, Network};
use crate::profiles::ProfileStore;

#[derive(Debug)]
pub struct DeployError {
    pub network: String,
    pub profile: String,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct DeployReport {
    pub profiles_created: usize,
    pub profiles_updated: usize,
    pub aps_bound: usize,
    pub errors: Vec<DeployError>,
}

impl DeployReport {
    fn record(&mut self, network: &str, profile: &str, message: impl ToString) {
        self.errors.push(DeployError {
            network: network.to_string(),
            profile: profile.to_string(),
            message: message.to_string(),
        });
    }
}

/// Process validated assignment rows in CSV order. Every failure is recorded
/// against its row and processing moves on; nothing here aborts the run.
pub fn run(
    client: &DashboardClient,
    networks: &[Network],
    rows: &[AssignmentRow],
    store: &ProfileStore,
    progress: &ProgressBar,
) -> DeployReport {
    let mut index: HashMap<String, Vec<&Network>> = HashMap::new();
    for network in networks {
        index
            .entry(network.name.to_lowercase())
            .or_default()
            .push(network);
    }

    let mut report = DeployReport::default();
    // (network id, profile name) pairs already synced this run; duplicate
    // rows reuse the resolved id instead of uploading again.
    let mut synced: HashMap<(String, String), String> = HashMap::new();
    for row in rows {
        let profiles_label = row.profile_names.join(", ");
        let network = match index.get(&row.network_name.to_lowercase()) {
            Some(matches) if matches.len() == 1 => matches[0],
            Some(matches) => {
                report.record(
                    &row.network_name,
                    &profiles_label,
                    format!("network name matches {} networks", matches.len()),
                );
                continue;
            }
            None => {
                report.record(
                    &row.network_name,
                    &profiles_label,
                    "no network with this name",
                );
                continue;
            }
        };
        if !network.is_wireless() {
            report.record(&network.name, &profiles_label, "network has no wireless");
            continue;
        }

        progress.println(format!("Working on network: {}", network.name));
        deploy_row(client, network, row, store, &mut synced, &mut report, progress);
        progress.println(format!("Network {} completed", network.name));
        progress.inc(1);
    }
    report
}

fn deploy_row(
    client: &DashboardClient,
    network: &Network,
    row: &AssignmentRow,
    store: &ProfileStore,
    synced: &mut HashMap<(String, String), String>,
    report: &mut DeployReport,
    progress: &ProgressBar,
) {
    let existing = match client.rf_profiles(&network.id) {
        Ok(profiles) => profiles,
        Err(err) => {
            report.record(&network.name, &row.profile_names.join(", "), format!("{err:#}"));
            return;
        }
    };
    let existing_ids: HashMap<String, String> = existing
        .iter()
        .filter_map(|profile| {
            let name = profile.get("name")?.as_str()?.to_string();
            Some((name, profile_id_of(profile)?))
        })
        .collect();

    // Device inventory is fetched at most once per row.
    let mut inventory: Option<Vec<Device>> = None;

    progress.println("Uploading RF profiles...");
    for name in &row.profile_names {
        let Some(definition) = store.get(name) else {
            report.record(&network.name, name, "profile definition missing from store");
            continue;
        };

        let pair = (network.id.clone(), name.clone());
        let profile_id = if let Some(id) = synced.get(&pair) {
            id.clone()
        } else {
            let id = match existing_ids.get(name) {
                Some(id) => match client.update_rf_profile(&network.id, id, definition) {
                    Ok(_) => {
                        report.profiles_updated += 1;
                        id.clone()
                    }
                    Err(err) => {
                        report.record(&network.name, name, format!("{err:#}"));
                        continue;
                    }
                },
                None => match client.create_rf_profile(&network.id, definition) {
                    Ok(created) => match profile_id_of(&created) {
                        Some(id) => {
                            report.profiles_created += 1;
                            id
                        }
                        None => {
                            report.record(
                                &network.name,
                                name,
                                "create response carried no profile id",
                            );
                            continue;
                        }
                    },
                    Err(err) => {
                        report.record(&network.name, name, format!("{err:#}"));
                        continue;
                    }
                },
            };
            synced.insert(pair, id.clone());
            id
        };

        apply_bindings(
            client,
            network,
            name,
            &profile_id,
            &row.ap_target,
            &mut inventory,
            report,
            progress,
        );
    }
}

#[allow(clippy::too_many_arguments)]
fn apply_bindings(
    client: &DashboardClient,
    network: &Network,
    profile_name: &str,
    profile_id: &str,
    target: &ApTarget,
    inventory: &mut Option<Vec<Device>>,
    report: &mut DeployReport,
    progress: &ProgressBar,
) {
    let serials: Vec<String> = match target {
        ApTarget::NoAps => return,
        ApTarget::All => {
            progress.println("Collecting AP serial numbers...");
            let Some(devices) = fetch_inventory(client, network, profile_name, inventory, report)
            else {
                return;
            };
            let aps: Vec<String> = devices
                .iter()
                .filter(|d| d.is_access_point())
                .map(|d| d.serial.clone())
                .collect();
            if aps.is_empty() {
                progress.println("No APs found on this network. Skipping...");
                return;
            }
            progress.println(format!("{} AP serials collected", aps.len()));
            aps
        }
        ApTarget::Serials(list) => {
            let Some(devices) = fetch_inventory(client, network, profile_name, inventory, report)
            else {
                return;
            };
            let known: HashSet<&str> = devices.iter().map(|d| d.serial.as_str()).collect();
            let mut found = Vec::with_capacity(list.len());
            for serial in list {
                if known.contains(serial.as_str()) {
                    found.push(serial.clone());
                } else {
                    report.record(
                        &network.name,
                        profile_name,
                        format!("AP {serial} not found on this network"),
                    );
                }
            }
            found
        }
    };

    progress.println("Assigning profile to APs...");
    for serial in serials {
        match client.assign_radio_profile(&serial, profile_id) {
            Ok(()) => report.aps_bound += 1,
            Err(err) => report.record(&network.name, profile_name, format!("{err:#}")),
        }
    }
}

fn fetch_inventory<'a>(
    client: &DashboardClient,
    network: &Network,
    profile_name: &str,
    inventory: &'a mut Option<Vec<Device>>,
    report: &mut DeployReport,
) -> Option<&'a Vec<Device>> {
    if inventory.is_none() {
        match client.devices(&network.id) {
            Ok(devices) => *inventory = Some(devices),
            Err(err) => {
                report.record(&network.name, profile_name, format!("{err:#}"));
                return None;
            }
        }
    }
    inventory.as_ref()
}

// Profile ids come back as strings, but tolerate numeric ids too.
fn profile_id_of(profile: &Value) -> Option<String> {
    match profile.get("id") {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn wireless_network(id: &str, name: &str) -> Network {
        serde_json::from_value(json!({
            "id": id,
            "name": name,
            "productTypes": ["wireless"],
        }))
        .unwrap()
    }

    fn store_with(names: &[&str]) -> ProfileStore {
        let mut store = ProfileStore::default();
        for name in names {
            store.insert(
                (*name).to_string(),
                json!({"name": name, "minBitrateType": "band"}),
            );
        }
        store
    }

    fn row(network: &str, profiles: &[&str], target: ApTarget) -> AssignmentRow {
        AssignmentRow {
            line: 2,
            network_name: network.into(),
            profile_names: profiles.iter().map(|p| p.to_string()).collect(),
            ap_target: target,
        }
    }

    #[test]
    fn updates_existing_profile_and_creates_missing_one() {
        let server = MockServer::start();
        let list = server.mock(|when, then| {
            when.method(GET).path("/networks/N_1/wireless/rfProfiles");
            then.status(200)
                .json_body(json!([{"id": "p1", "name": "Profile01"}]));
        });
        let update = server.mock(|when, then| {
            when.method(PUT)
                .path("/networks/N_1/wireless/rfProfiles/p1")
                .json_body(json!({"name": "Profile01", "minBitrateType": "band"}));
            then.status(200).json_body(json!({"id": "p1"}));
        });
        let create = server.mock(|when, then| {
            when.method(POST)
                .path("/networks/N_1/wireless/rfProfiles")
                .json_body(json!({"name": "Profile02", "minBitrateType": "band"}));
            then.status(201).json_body(json!({"id": "p2"}));
        });

        let client = DashboardClient::new(&server.base_url(), "k").unwrap();
        let networks = vec![wireless_network("N_1", "Network 01")];
        let store = store_with(&["Profile01", "Profile02"]);
        let rows = vec![row(
            "Network 01",
            &["Profile01", "Profile02"],
            ApTarget::NoAps,
        )];

        let report = run(&client, &networks, &rows, &store, &ProgressBar::hidden());

        list.assert();
        update.assert();
        create.assert();
        assert!(report.errors.is_empty(), "{:?}", report.errors);
        assert_eq!(report.profiles_updated, 1);
        assert_eq!(report.profiles_created, 1);
        assert_eq!(report.aps_bound, 0);
    }

    #[test]
    fn rerun_with_same_input_updates_instead_of_duplicating() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/networks/N_1/wireless/rfProfiles");
            then.status(200)
                .json_body(json!([{"id": "p1", "name": "Profile01"}]));
        });
        let update = server.mock(|when, then| {
            when.method(PUT).path("/networks/N_1/wireless/rfProfiles/p1");
            then.status(200).json_body(json!({"id": "p1"}));
        });
        let create = server.mock(|when, then| {
            when.method(POST).path("/networks/N_1/wireless/rfProfiles");
            then.status(201).json_body(json!({"id": "p9"}));
        });

        let client = DashboardClient::new(&server.base_url(), "k").unwrap();
        let networks = vec![wireless_network("N_1", "Network 01")];
        let store = store_with(&["Profile01"]);
        let rows = vec![row("Network 01", &["Profile01"], ApTarget::NoAps)];

        let bar = ProgressBar::hidden();
        run(&client, &networks, &rows, &store, &bar);
        run(&client, &networks, &rows, &store, &bar);

        update.assert_hits(2);
        create.assert_hits(0);
    }

    #[test]
    fn no_aps_target_never_touches_devices() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/networks/N_1/wireless/rfProfiles");
            then.status(200).json_body(json!([]));
        });
        server.mock(|when, then| {
            when.method(POST).path("/networks/N_1/wireless/rfProfiles");
            then.status(201).json_body(json!({"id": "p1"}));
        });
        let devices = server.mock(|when, then| {
            when.method(GET).path("/networks/N_1/devices");
            then.status(200).json_body(json!([]));
        });

        let client = DashboardClient::new(&server.base_url(), "k").unwrap();
        let networks = vec![wireless_network("N_1", "Network 04")];
        let store = store_with(&["Profile01"]);
        let rows = vec![row("Network 04", &["Profile01"], ApTarget::NoAps)];

        let report = run(&client, &networks, &rows, &store, &ProgressBar::hidden());

        devices.assert_hits(0);
        assert!(report.errors.is_empty());
        assert_eq!(report.aps_bound, 0);
    }

    #[test]
    fn all_target_binds_every_access_point_once() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/networks/N_2/wireless/rfProfiles");
            then.status(200)
                .json_body(json!([{"id": "p1", "name": "Profile01"}]));
        });
        server.mock(|when, then| {
            when.method(PUT).path("/networks/N_2/wireless/rfProfiles/p1");
            then.status(200).json_body(json!({"id": "p1"}));
        });
        let devices = server.mock(|when, then| {
            when.method(GET).path("/networks/N_2/devices");
            then.status(200).json_body(json!([
                {"serial": "S1", "model": "MR46"},
                {"serial": "S2", "model": "MR36"},
                {"serial": "S3", "model": "MR57"},
                {"serial": "SW1", "model": "MS120-8"},
            ]));
        });
        let mut bind_mocks = Vec::new();
        for serial in ["S1", "S2", "S3"] {
            bind_mocks.push(server.mock(|when, then| {
                when.method(PUT)
                    .path(format!("/devices/{serial}/wireless/radio/settings"))
                    .json_body(json!({"rfProfileId": "p1"}));
                then.status(200).json_body(json!({}));
            }));
        }
        let switch_bind = server.mock(|when, then| {
            when.method(PUT).path("/devices/SW1/wireless/radio/settings");
            then.status(200).json_body(json!({}));
        });

        let client = DashboardClient::new(&server.base_url(), "k").unwrap();
        let networks = vec![wireless_network("N_2", "Network 02")];
        let store = store_with(&["Profile01"]);
        let rows = vec![row("Network 02", &["Profile01"], ApTarget::All)];

        let report = run(&client, &networks, &rows, &store, &ProgressBar::hidden());

        devices.assert_hits(1);
        for mock in &bind_mocks {
            mock.assert();
        }
        switch_bind.assert_hits(0);
        assert!(report.errors.is_empty(), "{:?}", report.errors);
        assert_eq!(report.aps_bound, 3);
    }

    #[test]
    fn explicit_serials_bind_only_the_listed_aps() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/networks/N_1/wireless/rfProfiles");
            then.status(200)
                .json_body(json!([{"id": "p1", "name": "Profile01"}]));
        });
        server.mock(|when, then| {
            when.method(PUT).path("/networks/N_1/wireless/rfProfiles/p1");
            then.status(200).json_body(json!({"id": "p1"}));
        });
        server.mock(|when, then| {
            when.method(GET).path("/networks/N_1/devices");
            then.status(200).json_body(json!([
                {"serial": "S1", "model": "MR46"},
                {"serial": "S2", "model": "MR46"},
                {"serial": "S3", "model": "MR46"},
            ]));
        });
        let bind_s1 = server.mock(|when, then| {
            when.method(PUT).path("/devices/S1/wireless/radio/settings");
            then.status(200).json_body(json!({}));
        });
        let bind_s2 = server.mock(|when, then| {
            when.method(PUT).path("/devices/S2/wireless/radio/settings");
            then.status(200).json_body(json!({}));
        });
        let bind_s3 = server.mock(|when, then| {
            when.method(PUT).path("/devices/S3/wireless/radio/settings");
            then.status(200).json_body(json!({}));
        });

        let client = DashboardClient::new(&server.base_url(), "k").unwrap();
        let networks = vec![wireless_network("N_1", "Network 01")];
        let store = store_with(&["Profile01"]);
        let rows = vec![row(
            "Network 01",
            &["Profile01"],
            ApTarget::Serials(vec!["S1".into(), "S3".into()]),
        )];

        let report = run(&client, &networks, &rows, &store, &ProgressBar::hidden());

        bind_s1.assert_hits(1);
        bind_s2.assert_hits(0);
        bind_s3.assert_hits(1);
        assert_eq!(report.aps_bound, 2);
        assert!(report.errors.is_empty());
    }

    #[test]
    fn unknown_serial_is_reported_and_skipped() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/networks/N_1/wireless/rfProfiles");
            then.status(200)
                .json_body(json!([{"id": "p1", "name": "Profile01"}]));
        });
        server.mock(|when, then| {
            when.method(PUT).path("/networks/N_1/wireless/rfProfiles/p1");
            then.status(200).json_body(json!({"id": "p1"}));
        });
        server.mock(|when, then| {
            when.method(GET).path("/networks/N_1/devices");
            then.status(200)
                .json_body(json!([{"serial": "S1", "model": "MR46"}]));
        });
        let bind_s1 = server.mock(|when, then| {
            when.method(PUT).path("/devices/S1/wireless/radio/settings");
            then.status(200).json_body(json!({}));
        });

        let client = DashboardClient::new(&server.base_url(), "k").unwrap();
        let networks = vec![wireless_network("N_1", "Network 01")];
        let store = store_with(&["Profile01"]);
        let rows = vec![row(
            "Network 01",
            &["Profile01"],
            ApTarget::Serials(vec!["S1".into(), "GONE-GONE-GONE".into()]),
        )];

        let report = run(&client, &networks, &rows, &store, &ProgressBar::hidden());

        bind_s1.assert_hits(1);
        assert_eq!(report.aps_bound, 1);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].message.contains("GONE-GONE-GONE"));
    }

    #[test]
    fn unresolvable_network_fails_that_row_only() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/networks/N_2/wireless/rfProfiles");
            then.status(200).json_body(json!([]));
        });
        let create = server.mock(|when, then| {
            when.method(POST).path("/networks/N_2/wireless/rfProfiles");
            then.status(201).json_body(json!({"id": "p1"}));
        });

        let client = DashboardClient::new(&server.base_url(), "k").unwrap();
        let networks = vec![wireless_network("N_2", "Network 02")];
        let store = store_with(&["Profile01"]);
        let rows = vec![
            row("No Such Network", &["Profile01"], ApTarget::NoAps),
            row("Network 02", &["Profile01"], ApTarget::NoAps),
        ];

        let report = run(&client, &networks, &rows, &store, &ProgressBar::hidden());

        create.assert_hits(1);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].network, "No Such Network");
        assert_eq!(report.profiles_created, 1);
    }

    #[test]
    fn ambiguous_network_name_is_a_row_error() {
        let server = MockServer::start();
        let client = DashboardClient::new(&server.base_url(), "k").unwrap();
        let networks = vec![
            wireless_network("N_1", "Branch"),
            wireless_network("N_2", "branch"),
        ];
        let store = store_with(&["Profile01"]);
        let rows = vec![row("Branch", &["Profile01"], ApTarget::NoAps)];

        let report = run(&client, &networks, &rows, &store, &ProgressBar::hidden());

        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].message.contains("matches 2 networks"));
    }

    #[test]
    fn non_wireless_network_is_a_row_error() {
        let server = MockServer::start();
        let client = DashboardClient::new(&server.base_url(), "k").unwrap();
        let networks = vec![
            serde_json::from_value::<Network>(json!({
                "id": "N_3",
                "name": "Switch Only",
                "productTypes": ["switch"],
            }))
            .unwrap(),
        ];
        let store = store_with(&["Profile01"]);
        let rows = vec![row("Switch Only", &["Profile01"], ApTarget::NoAps)];

        let report = run(&client, &networks, &rows, &store, &ProgressBar::hidden());

        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].message.contains("no wireless"));
    }

    #[test]
    fn duplicate_rows_sync_each_pair_once_per_run() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/networks/N_1/wireless/rfProfiles");
            then.status(200)
                .json_body(json!([{"id": "p1", "name": "Profile01"}]));
        });
        let update = server.mock(|when, then| {
            when.method(PUT).path("/networks/N_1/wireless/rfProfiles/p1");
            then.status(200).json_body(json!({"id": "p1"}));
        });
        server.mock(|when, then| {
            when.method(GET).path("/networks/N_1/devices");
            then.status(200)
                .json_body(json!([{"serial": "S1", "model": "MR46"}]));
        });
        let bind = server.mock(|when, then| {
            when.method(PUT).path("/devices/S1/wireless/radio/settings");
            then.status(200).json_body(json!({}));
        });

        let client = DashboardClient::new(&server.base_url(), "k").unwrap();
        let networks = vec![wireless_network("N_1", "Network 01")];
        let store = store_with(&["Profile01"]);
        let rows = vec![
            row("Network 01", &["Profile01"], ApTarget::NoAps),
            row("Network 01", &["Profile01"], ApTarget::All),
        ];

        let report = run(&client, &networks, &rows, &store, &ProgressBar::hidden());

        // Second row reuses the already-synced id but still binds its APs.
        update.assert_hits(1);
        bind.assert_hits(1);
        assert_eq!(report.profiles_updated, 1);
        assert_eq!(report.aps_bound, 1);
    }

    #[test]
    fn profile_failure_does_not_stop_remaining_rows() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/networks/N_1/wireless/rfProfiles");
            then.status(200)
                .json_body(json!([{"id": "p1", "name": "Profile01"}]));
        });
        server.mock(|when, then| {
            when.method(PUT).path("/networks/N_1/wireless/rfProfiles/p1");
            then.status(400)
                .json_body(json!({"errors": ["minBitrate out of range"]}));
        });
        server.mock(|when, then| {
            when.method(GET).path("/networks/N_2/wireless/rfProfiles");
            then.status(200).json_body(json!([]));
        });
        let create = server.mock(|when, then| {
            when.method(POST).path("/networks/N_2/wireless/rfProfiles");
            then.status(201).json_body(json!({"id": "p2"}));
        });

        let client = DashboardClient::new(&server.base_url(), "k").unwrap();
        let networks = vec![
            wireless_network("N_1", "Network 01"),
            wireless_network("N_2", "Network 02"),
        ];
        let store = store_with(&["Profile01"]);
        let rows = vec![
            row("Network 01", &["Profile01"], ApTarget::NoAps),
            row("Network 02", &["Profile01"], ApTarget::NoAps),
        ];

        let report = run(&client, &networks, &rows, &store, &ProgressBar::hidden());

        create.assert_hits(1);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].message.contains("minBitrate out of range"));
        assert_eq!(report.profiles_created, 1);
    }
}
