//! Scenario: persisted ban store read → plan → write
//!
//! # Invariants under test
//!
//! 1. Starting from a store without a `<blacklist>` section, one match yields
//!    exactly one container holding exactly one GlobalBan entry.
//! 2. Running the same merge twice against the same file leaves each matched
//!    identity present exactly once and never adds a second container.
//! 3. Content outside the container (users, comments) survives the rewrite.
//! 4. A missing or malformed store is reported and never recreated blank.
//! 5. A failed write leaves the original file intact.
//! 6. Saving through a symlink updates the file it points at and keeps the
//!    link; the store's permission bits survive the rewrite.

use std::fs;
use std::path::Path;

use gbs_reconcile::plan_additions;
use gbs_schemas::Identity;
use gbs_store::{BanStore, StoreError};

const ADMIN_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<adminTools>
  <!-- server owners -->
  <users>
    <user platform="Steam" userid="76561198000000001" name="owner" permission_level="0"/>
  </users>
  <whitelist/>
</adminTools>
"#;

fn merge(path: &Path, matches: &[Identity]) -> usize {
    let store = BanStore::open(path).unwrap();
    let plan = plan_additions(store.entries(), matches);
    store.save(&plan.additions).unwrap();
    plan.additions.len()
}

#[test]
fn scenario_first_match_creates_single_container() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("serveradmin.xml");
    fs::write(&path, ADMIN_XML).unwrap();

    assert_eq!(merge(&path, &[Identity::steam("111")]), 1);

    let text = fs::read_to_string(&path).unwrap();
    assert!(text.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
    assert_eq!(text.matches("<blacklist>").count(), 1);
    assert!(text.contains(
        r#"<blacklisted platform="Steam" userid="111" name="GlobalBan" reason="Global banlist match"/>"#
    ));

    let store = BanStore::open(&path).unwrap();
    assert!(store.has_container());
    assert_eq!(store.entries().len(), 1);
    let e = &store.entries()[0];
    assert_eq!(
        (e.platform.as_str(), e.userid.as_str(), e.name.as_str(), e.reason.as_str()),
        ("Steam", "111", "GlobalBan", "Global banlist match")
    );
}

#[test]
fn scenario_repeat_merge_is_duplicate_free() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("serveradmin.xml");
    fs::write(&path, ADMIN_XML).unwrap();

    let matches = vec![Identity::steam("111"), Identity::eos("222")];
    assert_eq!(merge(&path, &matches), 2);
    let after_first = fs::read(&path).unwrap();

    assert_eq!(merge(&path, &matches), 0);
    // second pass wrote nothing
    assert_eq!(fs::read(&path).unwrap(), after_first);

    let text = String::from_utf8(after_first).unwrap();
    assert_eq!(text.matches("<blacklist>").count(), 1);
    assert_eq!(text.matches("userid=\"111\"").count(), 1);
    assert_eq!(text.matches("userid=\"222\"").count(), 1);
}

#[test]
fn scenario_rest_of_document_is_preserved() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("serveradmin.xml");
    fs::write(&path, ADMIN_XML).unwrap();

    merge(&path, &[Identity::eos("0002abcd")]);

    let text = fs::read_to_string(&path).unwrap();
    assert!(text.contains("<!-- server owners -->"));
    assert!(text.contains(
        r#"<user platform="Steam" userid="76561198000000001" name="owner" permission_level="0"/>"#
    ));
    assert!(text.contains("<whitelist/>"));
    assert!(text.trim_end().ends_with("</adminTools>"));
}

#[test]
fn scenario_existing_admin_entries_are_kept_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("serveradmin.xml");
    fs::write(
        &path,
        r#"<adminTools>
  <blacklist>
    <blacklisted platform="Steam" userid="42" name="spammer" reason="spam"/>
  </blacklist>
</adminTools>"#,
    )
    .unwrap();

    merge(&path, &[Identity::steam("42"), Identity::steam("43")]);

    let store = BanStore::open(&path).unwrap();
    let ids: Vec<(&str, &str)> = store
        .entries()
        .iter()
        .map(|e| (e.userid.as_str(), e.name.as_str()))
        .collect();
    assert_eq!(ids, vec![("42", "spammer"), ("43", "GlobalBan")]);
}

#[test]
fn scenario_missing_store_is_not_created() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("serveradmin.xml");

    let err = BanStore::open(&path).unwrap_err();
    assert!(matches!(err, StoreError::Read { .. }), "got: {err}");
    assert!(!path.exists());
}

#[test]
fn scenario_malformed_store_is_not_overwritten() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("serveradmin.xml");
    let broken = "<adminTools><blacklist><blacklisted platform=\"Steam\" userid=\"1\"/></adminTools>";
    fs::write(&path, broken).unwrap();

    let err = BanStore::open(&path).unwrap_err();
    assert!(matches!(err, StoreError::Parse { .. }), "got: {err}");
    assert_eq!(fs::read_to_string(&path).unwrap(), broken);
}

#[test]
fn scenario_failed_write_reports_and_keeps_nothing_partial() {
    let dir = tempfile::tempdir().unwrap();
    let sub = dir.path().join("game");
    fs::create_dir(&sub).unwrap();
    let path = sub.join("serveradmin.xml");
    fs::write(&path, ADMIN_XML).unwrap();

    let store = BanStore::open(&path).unwrap();
    let plan = plan_additions(store.entries(), &[Identity::steam("111")]);

    // The directory vanishes between read and write.
    fs::remove_dir_all(&sub).unwrap();

    let err = store.save(&plan.additions).unwrap_err();
    assert!(matches!(err, StoreError::Write { .. }), "got: {err}");
    assert!(!path.exists());
}

#[test]
fn scenario_empty_additions_do_not_touch_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("serveradmin.xml");
    // no declaration, odd spacing: any rewrite would change the bytes
    let raw = "<adminTools >\n<users/></adminTools>";
    fs::write(&path, raw).unwrap();

    let store = BanStore::open(&path).unwrap();
    store.save(&[]).unwrap();
    assert_eq!(fs::read_to_string(&path).unwrap(), raw);
}

#[cfg(unix)]
#[test]
fn scenario_symlinked_store_updates_link_target() {
    use std::os::unix::fs::symlink;

    let dir = tempfile::tempdir().unwrap();
    let saves = dir.path().join("saves");
    fs::create_dir(&saves).unwrap();
    let real = saves.join("serveradmin.xml");
    fs::write(&real, ADMIN_XML).unwrap();
    let link = dir.path().join("serveradmin.xml");
    symlink(&real, &link).unwrap();

    assert_eq!(merge(&link, &[Identity::steam("111")]), 1);

    assert!(fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
    let text = fs::read_to_string(&real).unwrap();
    assert!(text.contains(r#"userid="111""#), "{text}");
    assert_eq!(BanStore::open(&link).unwrap().entries().len(), 1);
    // no temp file left next to either path
    assert!(!saves.join("serveradmin.xml.tmp").exists());
    assert!(!dir.path().join("serveradmin.xml.tmp").exists());
}

#[cfg(unix)]
#[test]
fn scenario_save_keeps_store_permissions() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("serveradmin.xml");
    fs::write(&path, ADMIN_XML).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o600)).unwrap();

    assert_eq!(merge(&path, &[Identity::eos("0002abcd")]), 1);

    let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
    assert_eq!(mode, 0o600, "mode after save: {mode:o}");
    assert_eq!(BanStore::open(&path).unwrap().entries().len(), 1);
}

#[test]
fn scenario_blocked_temp_path_reports_write_failure() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("serveradmin.xml");
    fs::write(&path, ADMIN_XML).unwrap();
    // a directory where the temp file would go makes the write fail
    fs::create_dir(dir.path().join("serveradmin.xml.tmp")).unwrap();

    let store = BanStore::open(&path).unwrap();
    let plan = plan_additions(store.entries(), &[Identity::steam("111")]);
    let err = store.save(&plan.additions).unwrap_err();

    assert!(matches!(err, StoreError::Write { .. }), "got: {err}");
    assert_eq!(fs::read_to_string(&path).unwrap(), ADMIN_XML);
}
