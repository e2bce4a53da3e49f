//! Checks on the workspace manifests: every member inherits the shared
//! package version, internal crates are referenced through the workspace
//! table, and the transport and store layers stay below evalai-core.

use std::path::{Path, PathBuf};

const INTERNAL: [&str; 3] = ["evalai-core", "eval-store", "llm-transport"];

fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .ancestors()
        .nth(2)
        .unwrap()
        .to_path_buf()
}

fn manifest(dir: &Path) -> toml::Value {
    std::fs::read_to_string(dir.join("Cargo.toml"))
        .unwrap()
        .parse()
        .unwrap()
}

fn members() -> Vec<(String, toml::Value)> {
    let root = workspace_root();
    manifest(&root)["workspace"]["members"]
        .as_array()
        .unwrap()
        .iter()
        .map(|member| {
            let member = member.as_str().unwrap().to_string();
            let doc = manifest(&root.join(&member));
            (member, doc)
        })
        .collect()
}

fn internal_deps(doc: &toml::Value) -> Vec<(&str, &toml::Value)> {
    ["dependencies", "dev-dependencies"]
        .iter()
        .filter_map(|table| doc.get(table).and_then(|t| t.as_table()))
        .flat_map(|table| table.iter())
        .filter(|(name, _)| INTERNAL.contains(&name.as_str()))
        .map(|(name, spec)| (name.as_str(), spec))
        .collect()
}

#[test]
fn every_member_inherits_the_workspace_version() {
    let members = members();
    assert_eq!(members.len(), 4);
    for (member, doc) in &members {
        let inherited = doc["package"]["version"]
            .get("workspace")
            .and_then(|v| v.as_bool());
        assert_eq!(inherited, Some(true), "{member} pins its own version");
    }
}

#[test]
fn internal_crates_come_from_the_workspace_table() {
    for (member, doc) in members() {
        for (name, spec) in internal_deps(&doc) {
            let inherited = spec.get("workspace").and_then(|v| v.as_bool());
            assert_eq!(
                inherited,
                Some(true),
                "{member} depends on {name} without `workspace = true`"
            );
        }
    }
}

#[test]
fn workspace_pins_internal_crates_at_the_package_version() {
    let root = manifest(&workspace_root());
    let version = root["workspace"]["package"]["version"].as_str().unwrap();
    assert_eq!(version, evalai_core::VERSION);

    let deps = root["workspace"]["dependencies"].as_table().unwrap();
    for name in INTERNAL {
        assert_eq!(deps[name]["version"].as_str(), Some(version), "{name}");
        assert_eq!(
            deps[name]["path"].as_str(),
            Some(format!("crates/{name}").as_str()),
            "{name}"
        );
    }
}

#[test]
fn lower_layers_do_not_depend_on_evalai_core() {
    for (member, doc) in members() {
        if member.ends_with("llm-transport") || member.ends_with("eval-store") {
            let deps: Vec<_> = internal_deps(&doc).into_iter().map(|(name, _)| name).collect();
            assert!(
                !deps.contains(&"evalai-core"),
                "{member} must not depend on evalai-core"
            );
        }
    }
    let (_, transport) = members()
        .into_iter()
        .find(|(member, _)| member.ends_with("llm-transport"))
        .unwrap();
    assert!(internal_deps(&transport).is_empty());
}
