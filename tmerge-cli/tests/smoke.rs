use assert_cmd::prelude::*;
use assert_fs::prelude::*;
use predicates::prelude::*;
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::io::Cursor;
use std::path::Path;
use std::process::Command;
use tmerge_core::bencode::{self, Value};
use tmerge_core::scan;

const PIECE: usize = 16 * 1024;

fn random(bytes: usize, seed: u64) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..bytes).map(|_| rng.gen()).collect()
}

fn b(s: &str) -> Vec<u8> {
    s.as_bytes().to_vec()
}

fn write_torrent(path: &Path, name: &str, data: &[u8]) {
    let pieces = scan::scan(&mut Cursor::new(data), PIECE as u64, 0).unwrap();
    let info = Value::Dict(vec![
        (b("length"), Value::Int(data.len() as i64)),
        (b("name"), Value::Bytes(b(name))),
        (b("piece length"), Value::Int(PIECE as i64)),
        (b("pieces"), Value::Bytes(pieces.as_bytes().to_vec())),
    ]);
    let doc = Value::Dict(vec![(b("announce"), Value::Bytes(b("udp://t.example:80"))), (b("info"), info)]);
    std::fs::write(path, bencode::encode(&doc)).unwrap();
}

fn corrupt(data: &[u8], offsets: &[usize]) -> Vec<u8> {
    let mut v = data.to_vec();
    for &o in offsets {
        v[o] ^= 0x5A;
    }
    v
}

fn tmerge() -> Command {
    let mut cmd = Command::cargo_bin("tmerge").unwrap();
    cmd.env_remove("RUST_LOG").args(["--log-level", "warn"]);
    cmd
}

#[test]
fn info_lists_metadata() {
    let td = assert_fs::TempDir::new().unwrap();
    let data = random(3 * PIECE + 7, 1);
    write_torrent(td.child("a.torrent").path(), "a.bin", &data);

    tmerge()
        .current_dir(td.path())
        .args(["info", "a.torrent"])
        .assert()
        .success()
        .stdout(predicate::str::contains("name: a.bin"))
        .stdout(predicate::str::contains("pieces: 4"))
        .stdout(predicate::str::contains("0: a.bin"));

    let out = tmerge().current_dir(td.path()).args(["info", "a.torrent", "--json"]).output().unwrap();
    assert!(out.status.success());
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(v["total_size"], (3 * PIECE + 7) as u64);
    assert_eq!(v["info_hash"].as_str().unwrap().len(), 40);
    assert_eq!(v["single_file"], true);
}

#[test]
fn verify_reports_ok_then_bad() {
    let td = assert_fs::TempDir::new().unwrap();
    let data = random(4 * PIECE, 2);
    write_torrent(td.child("t.torrent").path(), "t.bin", &data);
    td.child("t.bin").write_binary(&data).unwrap();

    tmerge()
        .current_dir(td.path())
        .args(["verify", "t.torrent", "t.bin"])
        .assert()
        .success()
        .stdout(predicate::str::contains("OK"));

    td.child("t.bin").write_binary(&corrupt(&data, &[PIECE * 2 + 5])).unwrap();
    tmerge()
        .current_dir(td.path())
        .args(["verify", "t.torrent", "t.bin"])
        .assert()
        .code(2)
        .stdout(predicate::str::contains("BAD"))
        .stderr(predicate::str::contains("Bad pieces: 2"));
}

#[test]
fn merge_repairs_from_explicit_sources() {
    let td = assert_fs::TempDir::new().unwrap();
    let data = random(3 * PIECE + 100, 3);
    write_torrent(td.child("t.torrent").path(), "t.bin", &data);
    td.child("origin.bin").write_binary(&corrupt(&data, &[10, 3 * PIECE + 1])).unwrap();
    td.child("s1.bin").write_binary(&corrupt(&data, &[PIECE])).unwrap();
    td.child("s2.bin").write_binary(&data[..PIECE]).unwrap();

    tmerge()
        .current_dir(td.path())
        .args([
            "merge", "t.torrent",
            "--origin", "origin.bin",
            "--source", "s2.bin",
            "--source", "s1.bin",
            "--output", "fixed.bin",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("OK"));
    td.child("fixed.bin").assert(predicate::path::eq_file(write_tmp(&td, "want.bin", &data)));
}

fn write_tmp(td: &assert_fs::TempDir, name: &str, data: &[u8]) -> std::path::PathBuf {
    let c = td.child(name);
    c.write_binary(data).unwrap();
    c.path().to_path_buf()
}

#[test]
fn incomplete_merge_discards_output_unless_asked() {
    let td = assert_fs::TempDir::new().unwrap();
    let data = random(2 * PIECE, 4);
    write_torrent(td.child("t.torrent").path(), "t.bin", &data);
    td.child("origin.bin").write_binary(&corrupt(&data, &[PIECE + 3])).unwrap();

    tmerge()
        .current_dir(td.path())
        .args(["merge", "t.torrent", "--origin", "origin.bin", "--output", "out.bin"])
        .assert()
        .code(2)
        .stdout(predicate::str::contains("INCOMPLETE"))
        .stderr(predicate::str::contains("Unmatched pieces: 1"));
    td.child("out.bin").assert(predicate::path::missing());

    let out = tmerge()
        .current_dir(td.path())
        .args(["merge", "t.torrent", "--origin", "origin.bin", "--output", "out.bin"])
        .args(["--keep-incomplete", "--json"])
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(2));
    let r: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(r["matched_pieces"], 1);
    assert_eq!(r["unmatched_indices"], serde_json::json!([1]));
    td.child("out.bin").assert(predicate::path::exists());
}

#[test]
fn merge_picks_up_sources_from_directory() {
    let td = assert_fs::TempDir::new().unwrap();
    let data = random(4 * PIECE, 5);
    write_torrent(td.child("t.torrent").path(), "t.bin", &data);
    td.child("origin.bin").write_binary(&corrupt(&data, &[0, 2 * PIECE])).unwrap();
    let mirrors = td.child("mirrors");
    mirrors.create_dir_all().unwrap();
    mirrors.child("a.part").write_binary(&corrupt(&data, &[2 * PIECE])).unwrap();
    mirrors.child("b.part").write_binary(&corrupt(&data, &[0])).unwrap();
    // Excluded by the glob even though it would repair everything.
    mirrors.child("notes.txt").write_binary(&data).unwrap();

    let out = tmerge()
        .current_dir(td.path())
        .args([
            "merge", "t.torrent",
            "--origin", "origin.bin",
            "--source-dir", "mirrors",
            "--include", "*.part",
            "--parallel",
            "--output", "fixed.bin",
            "--json",
        ])
        .output()
        .unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let r: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(r["planned"]["candidates"], serde_json::json!([1, 1]));
    assert_eq!(std::fs::read(td.child("fixed.bin").path()).unwrap(), data);
}

#[test]
fn malformed_manifest_is_fatal() {
    let td = assert_fs::TempDir::new().unwrap();
    td.child("bad.torrent").write_str("d4:infoi3ee").unwrap();
    td.child("x.bin").write_binary(b"abc").unwrap();
    tmerge()
        .current_dir(td.path())
        .args(["verify", "bad.torrent", "x.bin"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("decode error"));
}
