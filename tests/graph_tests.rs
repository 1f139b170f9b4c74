mod common;

use common::{CouplerConfig, FlowModel, NetworkModel, default_bui_model, parse_ini};
use hydrofile::bui::BuiModel;
use hydrofile::{FileModel, ModelError};
use serde_json::json;
use std::fs;
use tempfile::tempdir;

fn flow(name: &str, network: Option<NetworkModel>) -> FlowModel {
    FlowModel {
        filepath: None,
        name: name.to_string(),
        network,
    }
}

fn network(node_count: u32) -> NetworkModel {
    NetworkModel {
        filepath: None,
        node_count,
    }
}

fn file_names(dir: &std::path::Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[test]
fn test_two_nested_models_write_three_files() {
    let dir = tempdir().unwrap();
    let mut root = CouplerConfig {
        filepath: None,
        flow: Some(flow("testproject", None)),
        rainfall: Some(default_bui_model()),
    };

    let saved = root.save(dir.path()).unwrap();

    assert_eq!(
        file_names(dir.path()),
        vec!["bui_file.bui", "dimrconfig.xml", "fm.mdu"]
    );
    let mapping = parse_ini(&saved).unwrap();
    let flow_path = dir.path().join("fm.mdu");
    let rainfall_path = dir.path().join("bui_file.bui");
    assert_eq!(mapping["flow"], json!(flow_path.to_string_lossy()));
    assert_eq!(mapping["rainfall"], json!(rainfall_path.to_string_lossy()));
    assert_eq!(mapping.len(), 2);

    let flow_mapping = parse_ini(&flow_path).unwrap();
    assert_eq!(flow_mapping["name"], json!("testproject"));
    assert!(!flow_mapping.contains_key("network"));
}

#[test]
fn test_nested_models_are_bound_on_save() {
    let dir = tempdir().unwrap();
    let mut root = CouplerConfig {
        filepath: None,
        flow: Some(flow("bound", Some(network(12)))),
        rainfall: None,
    };

    root.save(dir.path()).unwrap();

    let flow = root.flow.as_ref().unwrap();
    assert_eq!(flow.filepath, Some(dir.path().join("fm.mdu")));
    assert_eq!(
        flow.network.as_ref().unwrap().filepath,
        Some(dir.path().join("network.net"))
    );
    assert_eq!(
        file_names(dir.path()),
        vec!["dimrconfig.xml", "fm.mdu", "network.net"]
    );
}

#[test]
fn test_graph_reloads_from_root_file() {
    let dir = tempdir().unwrap();
    let mut root = CouplerConfig {
        filepath: None,
        flow: Some(flow("coupled", Some(network(42)))),
        rainfall: Some(default_bui_model()),
    };
    let saved = root.save(dir.path()).unwrap();

    let loaded = CouplerConfig::load(&saved).unwrap();

    assert_eq!(loaded, root);
    let rainfall: &BuiModel = loaded.rainfall.as_ref().unwrap();
    assert_eq!(rainfall.events, default_bui_model().events);
    assert_eq!(loaded.flow.unwrap().network.unwrap().node_count, 42);
}

#[test]
fn test_resave_keeps_child_locations() {
    let dir = tempdir().unwrap();
    let mut root = CouplerConfig {
        filepath: None,
        flow: Some(flow("again", Some(network(3)))),
        rainfall: None,
    };

    let first = root.save(dir.path()).unwrap();
    let first_mapping = parse_ini(&first).unwrap();
    let second = root.save(dir.path()).unwrap();
    let second_mapping = parse_ini(&second).unwrap();

    assert_eq!(first, second);
    assert_eq!(first_mapping, second_mapping);
    assert_eq!(file_names(dir.path()).len(), 3);
}

#[test]
fn test_nested_record_in_mapping_stays_unbound() {
    let dir = tempdir().unwrap();
    let fields = json!({ "flow": { "name": "inline", "network": { "node_count": "7" } } });
    let serde_json::Value::Object(fields) = fields else {
        unreachable!()
    };

    let mut root = CouplerConfig::from_mapping(fields).unwrap();
    let flow = root.flow.as_ref().unwrap();
    assert_eq!(flow.filepath, None);
    assert_eq!(flow.network.as_ref().unwrap().node_count, 7);

    root.save(dir.path()).unwrap();
    assert_eq!(
        file_names(dir.path()),
        vec!["dimrconfig.xml", "fm.mdu", "network.net"]
    );
}

#[test]
fn test_save_cycle_detected_before_any_write() {
    let dir = tempdir().unwrap();
    let shared = dir.path().join("shared.xml");
    let mut root = CouplerConfig {
        filepath: Some(shared.clone()),
        flow: Some(FlowModel {
            filepath: Some(shared.clone()),
            name: "loop".to_string(),
            network: Some(network(1)),
        }),
        rainfall: Some(default_bui_model()),
    };

    let err = root.save(dir.path()).unwrap_err();

    assert!(matches!(err, ModelError::Cycle { ref path } if *path == shared));
    assert!(file_names(dir.path()).is_empty());
    assert_eq!(root.rainfall.as_ref().unwrap().filepath, None);
}

#[test]
fn test_siblings_may_share_a_folder() {
    let dir = tempdir().unwrap();
    let mut root = CouplerConfig {
        filepath: Some(dir.path().join("root.xml")),
        flow: Some(FlowModel {
            filepath: Some(dir.path().join("flow").join("fm.mdu")),
            name: "sub".to_string(),
            network: None,
        }),
        rainfall: Some(default_bui_model()),
    };
    fs::create_dir(dir.path().join("flow")).unwrap();

    let saved = root.save(dir.path()).unwrap();

    assert_eq!(saved, dir.path().join("root.xml"));
    assert!(dir.path().join("flow").join("fm.mdu").is_file());
    assert!(dir.path().join("bui_file.bui").is_file());
}

#[test]
fn test_load_cycle_detected() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("root.xml");
    fs::write(&root, format!("flow = {}\n", root.display())).unwrap();

    let err = CouplerConfig::load(&root).unwrap_err();

    assert!(matches!(err, ModelError::Cycle { ref path } if *path == root));
}

#[test]
fn test_missing_child_file_fails_load() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("root.xml");
    fs::write(&root, "rainfall = nowhere/rain.bui\n").unwrap();

    let err = CouplerConfig::load(&root).unwrap_err();

    assert!(matches!(err, ModelError::Load { .. }));
}

#[test]
fn test_child_validation_error_passes_through() {
    let dir = tempdir().unwrap();
    let child = dir.path().join("network.net");
    fs::write(&child, "node_count = many\n").unwrap();
    let root = dir.path().join("fm.mdu");
    fs::write(&root, format!("name = x\nnetwork = {}\n", child.display())).unwrap();

    let err = FlowModel::load(&root).unwrap_err();

    match err {
        ModelError::Validation(e) => assert_eq!(e.field, "node_count"),
        other => panic!("expected a validation error, got {other:?}"),
    }
}

#[test]
fn test_failed_child_write_leaves_parent_unbound() {
    let dir = tempdir().unwrap();
    let mut rainfall = default_bui_model();
    let mut events = rainfall.events.clone().into_inner();
    events[0].duration = chrono::TimeDelta::seconds(-60);
    rainfall.events = hydrofile::bui::EventList::new(events).unwrap();
    let mut root = CouplerConfig {
        filepath: None,
        flow: Some(flow("written", None)),
        rainfall: Some(rainfall),
    };

    let err = root.save(dir.path()).unwrap_err();

    assert!(matches!(err, ModelError::Render { ref field, .. } if field == "events[0].duration"));
    assert_eq!(root.filepath, None);
    assert_eq!(root.rainfall.as_ref().unwrap().filepath, None);
    assert_eq!(
        root.flow.as_ref().unwrap().filepath,
        Some(dir.path().join("fm.mdu"))
    );
    assert_eq!(file_names(dir.path()), vec!["fm.mdu"]);
}
