#![allow(dead_code)]

use sha1::{Digest, Sha1};
use std::path::Path;
use tmerge_core::bencode::{self, Value};

pub const PIECE: usize = 262_144;

pub fn bytes(s: &str) -> Vec<u8> {
    s.as_bytes().to_vec()
}

/// Deterministic pseudo-random content.
pub fn random_bytes(len: usize, seed: u64) -> Vec<u8> {
    let mut rng = fastrand::Rng::with_seed(seed);
    (0..len).map(|_| rng.u8(..)).collect()
}

pub fn sha1_pieces(data: &[u8], piece: usize) -> Vec<u8> {
    data.chunks(piece).flat_map(|c| Sha1::digest(c).to_vec()).collect()
}

pub fn single_file_info(name: &str, piece: usize, data: &[u8]) -> Value {
    Value::Dict(vec![
        (bytes("length"), Value::Int(data.len() as i64)),
        (bytes("name"), Value::Bytes(bytes(name))),
        (bytes("piece length"), Value::Int(piece as i64)),
        (bytes("pieces"), Value::Bytes(sha1_pieces(data, piece))),
    ])
}

pub fn torrent_bytes(info: Value) -> Vec<u8> {
    bencode::encode(&Value::Dict(vec![
        (bytes("announce"), Value::Bytes(bytes("http://tracker.example/announce"))),
        (bytes("info"), info),
    ]))
}

pub fn write_torrent(path: &Path, name: &str, piece: usize, data: &[u8]) {
    std::fs::write(path, torrent_bytes(single_file_info(name, piece, data))).unwrap();
}

/// Copy of `data` with one byte flipped at each offset.
pub fn corrupt(data: &[u8], offsets: &[usize]) -> Vec<u8> {
    let mut v = data.to_vec();
    for &o in offsets {
        v[o] ^= 0xFF;
    }
    v
}
