//! Directory reaper against real trees: symlinks, permissions, CLI exit codes.

mod common;

use common::*;
use nix::unistd::geteuid;
use proclife::safety::safe_cleanup::remove_tree;
use std::ffi::CString;
use std::fs;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::{symlink, PermissionsExt};
use std::path::Path;

/// Nest `levels` directories named `d` under `root` with mkdirat/openat;
/// the full path is longer than PATH_MAX.
fn build_chain(root: &Path, levels: usize) {
    let root_c = CString::new(root.as_os_str().as_bytes()).unwrap();
    let name = CString::new("d").unwrap();
    let mut fd = unsafe { libc::open(root_c.as_ptr(), libc::O_RDONLY | libc::O_DIRECTORY | libc::O_CLOEXEC) };
    assert!(fd >= 0);
    for _ in 0..levels {
        unsafe {
            assert_eq!(libc::mkdirat(fd, name.as_ptr(), 0o755), 0);
            let next = libc::openat(fd, name.as_ptr(), libc::O_RDONLY | libc::O_DIRECTORY | libc::O_CLOEXEC);
            assert!(next >= 0);
            libc::close(fd);
            fd = next;
        }
    }
    unsafe {
        libc::close(fd);
    }
}

#[test]
fn test_cleanup_command_removes_tree_and_spares_link_targets() {
    let root = scratch_root("cleanup_cli");
    let cfg = write_config(&quick_config(&root));

    let outside = root.join("keep.txt");
    fs::write(&outside, b"precious").unwrap();

    let tree = root.join("tree");
    fs::create_dir_all(tree.join("a/b/c")).unwrap();
    fs::write(tree.join("a/one.txt"), b"1").unwrap();
    fs::write(tree.join("a/b/c/two.txt"), b"2").unwrap();
    symlink(&outside, tree.join("a/b/link_to_file")).unwrap();
    symlink(&root, tree.join("link_to_root")).unwrap();

    assert!(proclife(&cfg).arg("cleanup").arg(&tree).status().unwrap().success());
    assert!(!tree.exists());
    assert_eq!(fs::read(&outside).unwrap(), b"precious");
    assert!(root.join("proclife.json").exists());

    // Gone already: still success.
    assert!(proclife(&cfg).arg("cleanup").arg(&tree).status().unwrap().success());

    let _ = remove_tree(&root);
}

#[test]
fn test_permission_denied_leaf_is_reported_and_siblings_removed() {
    if geteuid().is_root() {
        eprintln!("skipping: root bypasses directory permissions");
        return;
    }

    let root = scratch_root("cleanup_perm");
    let cfg = write_config(&quick_config(&root));
    let tree = root.join("tree");
    let locked = tree.join("locked");
    fs::create_dir_all(&locked).unwrap();
    fs::create_dir_all(tree.join("open")).unwrap();
    fs::write(locked.join("stuck.txt"), b"x").unwrap();
    fs::write(tree.join("open/free.txt"), b"y").unwrap();
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o500)).unwrap();

    let report = remove_tree(&tree);
    assert!(!report.is_clean());
    assert!(report.failures[0].path.ends_with("locked/stuck.txt"));
    assert!(report.failures.iter().any(|f| f.path == tree));
    assert!(!tree.join("open").exists());
    assert!(locked.join("stuck.txt").exists());

    let status = proclife(&cfg).arg("cleanup").arg(&tree).status().unwrap();
    assert_eq!(status.code(), Some(1));

    fs::set_permissions(&locked, fs::Permissions::from_mode(0o700)).unwrap();
    assert!(remove_tree(&tree).is_clean());
    assert!(!tree.exists());

    let _ = remove_tree(&root);
}

#[test]
fn test_cleanup_command_survives_ten_thousand_levels() {
    let root = scratch_root("cleanup_deep");
    let cfg = write_config(&quick_config(&root));
    let tree = root.join("tree");
    fs::create_dir_all(&tree).unwrap();
    build_chain(&tree, 10_000);

    let status = proclife(&cfg).arg("cleanup").arg(&tree).status().unwrap();
    assert_eq!(status.code(), Some(0));
    assert!(!tree.exists());

    let _ = remove_tree(&root);
}
