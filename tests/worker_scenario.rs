//! File worker end to end: artifacts, ciphered copies, per-category logs.

mod common;

use common::*;
use proclife::utils::obfuscate::xor_in_place;
use std::fs;

#[test]
fn test_bounded_worker_creates_ciphered_copies() {
    let root = scratch_root("worker");
    let config = quick_config(&root);
    let cfg = write_config(&config);

    let status = proclife(&cfg)
        .args(["worker", "--iterations", "3"])
        .status()
        .unwrap();
    assert!(status.success());

    // Iterations inside the same second share a name and overwrite the original.
    let originals: Vec<_> = fs::read_dir(config.original_dir())
        .unwrap()
        .flatten()
        .map(|e| e.path())
        .collect();
    assert!((1..=3).contains(&originals.len()));
    assert!(count_files(&config.obfuscated_dir()) >= 1);

    for bucket in fs::read_dir(config.obfuscated_dir()).unwrap().flatten() {
        let index: u32 = bucket.file_name().to_str().unwrap().parse().unwrap();
        assert!(index < 1000);

        for copy in fs::read_dir(bucket.path()).unwrap().flatten() {
            let name = copy.file_name().into_string().unwrap();
            assert!(name.contains("_process_") && name.ends_with(".txt"), "{}", name);

            let mut bytes = fs::read(copy.path()).unwrap();
            xor_in_place(&mut bytes);
            let text = String::from_utf8(bytes).unwrap();
            assert!(text.contains("- Created by "), "{:?}", text);
        }
    }

    let making = read_log(&root, "file_making.log");
    assert_eq!(making.matches("Created file:").count(), 3);
    assert_eq!(making.matches("Copied file from").count(), 3);
    assert_eq!(read_log(&root, "obfuscation.log").matches("Obfuscated file:").count(), 3);

    for line in making.lines() {
        assert!(line.starts_with('['), "{}", line);
        assert!(line.contains("][PID:") && line.contains("][PPID:") && line.contains("][PGID:"));
        assert!(line.contains("[WORKER] "), "{}", line);
    }
    assert!(read_log(&root, "process.log").contains("stopping after 3 iterations"));

    let _ = proclife::safety::safe_cleanup::remove_tree(&root);
}

#[test]
fn test_cipher_command_round_trips() {
    let root = scratch_root("cipher");
    let cfg = write_config(&quick_config(&root));
    let file = root.join("payload.bin");
    let original: Vec<u8> = (0u8..=255).collect();
    fs::write(&file, &original).unwrap();

    assert!(proclife(&cfg).arg("cipher").arg(&file).status().unwrap().success());
    let once = fs::read(&file).unwrap();
    assert_eq!(once.len(), original.len());
    assert_ne!(once, original);

    assert!(proclife(&cfg).arg("cipher").arg(&file).status().unwrap().success());
    assert_eq!(fs::read(&file).unwrap(), original);

    let missing = proclife(&cfg).arg("cipher").arg(root.join("nope")).status().unwrap();
    assert_eq!(missing.code(), Some(1));

    let _ = proclife::safety::safe_cleanup::remove_tree(&root);
}
