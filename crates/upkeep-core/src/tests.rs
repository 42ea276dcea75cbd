use super::*;

fn maps_ref() -> PackageRef {
    PackageRef::new("flathub", RefKind::App, "org.gnome.Maps", "x86_64", "stable")
        .expect("valid ref")
}

#[test]
fn format_ref_includes_origin_and_all_components() {
    assert_eq!(
        maps_ref().format_ref(),
        "flathub:app/org.gnome.Maps/x86_64/stable"
    );
    assert_eq!(maps_ref().to_string(), maps_ref().format_ref());
}

#[test]
fn parse_ref_accepts_formatted_output() {
    let parsed = PackageRef::parse("flathub:runtime/org.gnome.Platform/aarch64/46")
        .expect("ref should parse");
    assert_eq!(parsed.origin, "flathub");
    assert_eq!(parsed.kind, RefKind::Runtime);
    assert_eq!(parsed.name, "org.gnome.Platform");
    assert_eq!(parsed.arch, "aarch64");
    assert_eq!(parsed.branch, "46");
    assert_eq!(PackageRef::parse(&maps_ref().format_ref()).ok(), Some(maps_ref()));
}

#[test]
fn parse_ref_rejects_missing_origin() {
    let err = PackageRef::parse("app/org.gnome.Maps/x86_64/stable").expect_err("must fail");
    assert!(err.to_string().contains("missing an origin prefix"));
}

#[test]
fn parse_ref_rejects_wrong_component_count() {
    let err = PackageRef::parse("flathub:app/org.gnome.Maps/x86_64").expect_err("must fail");
    assert!(format!("{err:#}").contains("exactly 4 components"));
}

#[test]
fn parse_ref_rejects_unknown_kind() {
    let err = PackageRef::parse("flathub:extension/org.x/x86_64/stable").expect_err("must fail");
    assert!(format!("{err:#}").contains("unsupported ref kind 'extension'"));
}

#[test]
fn ref_components_reject_whitespace_and_newlines() {
    assert!(PackageRef::new("flat hub", RefKind::App, "a", "x86_64", "stable").is_err());
    assert!(PackageRef::new("flathub", RefKind::App, "a\nstart", "x86_64", "stable").is_err());
    assert!(PackageRef::new("flathub", RefKind::App, "a", "", "stable").is_err());
}

#[test]
fn parse_update_list_preserves_order_and_count() {
    let raw = r#"[
        {"ref": "app/org.gnome.Maps/x86_64/stable", "origin": "flathub", "name": "Maps",
         "old_version": "46.1", "new_version": "46.2", "download_size": 1200, "installed_size": 4000},
        {"ref": "runtime/org.gnome.Platform/x86_64/46", "origin": "flathub",
         "operation": "install", "download_size": 300},
        {"ref": "app/org.videolan.VLC/x86_64/stable", "origin": "flathub", "summary": "media player",
         "vendor_metadata": {"anything": true}}
    ]"#;

    let updates = parse_update_list(raw).expect("list should parse");
    let refs = updates
        .iter()
        .map(UpdateDescriptor::format_ref)
        .collect::<Vec<_>>();
    assert_eq!(
        refs,
        vec![
            "flathub:app/org.gnome.Maps/x86_64/stable",
            "flathub:runtime/org.gnome.Platform/x86_64/46",
            "flathub:app/org.videolan.VLC/x86_64/stable",
        ]
    );
    assert_eq!(updates[0].display_name, "Maps");
    assert_eq!(updates[0].new_version.as_deref(), Some("46.2"));
    assert_eq!(updates[1].display_name, "org.gnome.Platform");
    assert_eq!(updates[1].operation, UpdateOperation::Install);
    assert_eq!(updates[2].operation, UpdateOperation::Update);
    assert_eq!(updates[2].summary.as_deref(), Some("media player"));
    assert_eq!(total_download_size(&updates), 1500);
}

#[test]
fn parse_update_list_treats_blank_output_as_empty() {
    assert!(parse_update_list("").expect("empty parses").is_empty());
    assert!(parse_update_list(" \n").expect("blank parses").is_empty());
    assert!(parse_update_list("[]").expect("empty array parses").is_empty());
}

#[test]
fn parse_update_list_rejects_malformed_json() {
    let err = parse_update_list("[{\"ref\": ").expect_err("must fail");
    assert!(err.to_string().contains("failed to parse update list JSON"));
}

#[test]
fn parse_update_list_rejects_non_array() {
    let err = parse_update_list("{\"ref\": \"app/a/b/c\"}").expect_err("must fail");
    assert!(err.to_string().contains("must be a JSON array"));
}

#[test]
fn parse_update_list_rejects_record_with_bad_ref() {
    let raw = r#"[
        {"ref": "app/org.gnome.Maps/x86_64/stable", "origin": "flathub"},
        {"ref": "app/broken", "origin": "flathub"}
    ]"#;
    let err = parse_update_list(raw).expect_err("must fail");
    assert!(format!("{err:#}").contains("update record #1"));
}

#[test]
fn descriptor_json_uses_helper_field_names() {
    let updates = parse_update_list(
        r#"[{"ref": "app/org.gnome.Maps/x86_64/stable", "origin": "flathub", "new_version": "46.2"}]"#,
    )
    .expect("list should parse");
    let value = updates[0].to_json();
    assert_eq!(value["ref"], "app/org.gnome.Maps/x86_64/stable");
    assert_eq!(value["origin"], "flathub");
    assert_eq!(value["new_version"], "46.2");
    assert_eq!(value["operation"], "update");

    let reparsed = UpdateDescriptor::from_json(value).expect("descriptor json should parse");
    assert_eq!(reparsed, updates[0]);
}
