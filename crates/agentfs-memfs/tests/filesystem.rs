// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Behavioural tests of the in-memory filesystem through the `Filesystem` contract

use std::io::SeekFrom;
use std::thread;

use agentfs_memfs::MemoryFs;
use agentfs_vfs::{read_file, write_file, File, FileMode, Filesystem, FsError, OpenFlags};
use proptest::collection::vec;
use proptest::prelude::*;

fn read_all(file: &mut Box<dyn File>) -> Vec<u8> {
    let mut out = Vec::new();
    file.read_to_end(&mut out).unwrap();
    out
}

#[test]
fn mkdir_create_list_rename() {
    let fs = MemoryFs::new();
    fs.mkdir_all("/a/b", FileMode::new(0o755)).unwrap();

    let mut file = fs.create("/a/b/f.txt").unwrap();
    file.write_all(b"hi").unwrap();
    file.close().unwrap();

    let entries = fs.read_dir("/a/b").unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].name, "f.txt");
    assert_eq!(entries[0].size, 2);

    fs.rename("/a/b", "/a/c").unwrap();
    assert_eq!(fs.stat("/a/c/f.txt").unwrap().size, 2);
    assert!(matches!(fs.stat("/a/b/f.txt"), Err(FsError::NotFound)));
    assert!(matches!(fs.stat("/a/b"), Err(FsError::NotFound)));
}

#[test]
fn rename_missing_source_is_not_found() {
    let fs = MemoryFs::new();
    assert!(matches!(fs.rename("/ghost", "/other"), Err(FsError::NotFound)));
    assert!(matches!(fs.stat("/other"), Err(FsError::NotFound)));
}

#[test]
fn failed_rename_leaves_source_in_place() {
    let fs = MemoryFs::new();
    write_file(&fs, "/src/file", b"payload", FileMode::new(0o644)).unwrap();
    write_file(&fs, "/dst/occupied", b"", FileMode::new(0o644)).unwrap();

    assert!(matches!(fs.rename("/src", "/dst"), Err(FsError::NotEmpty)));
    assert_eq!(read_file(&fs, "/src/file").unwrap(), b"payload");
    assert!(matches!(fs.stat("/dst/file"), Err(FsError::NotFound)));
}

#[test]
fn remove_non_empty_directory_fails() {
    let fs = MemoryFs::new();
    write_file(&fs, "/d/f", b"x", FileMode::new(0o644)).unwrap();

    assert!(matches!(fs.remove("/d"), Err(FsError::NotEmpty)));
    assert_eq!(fs.read_dir("/d").unwrap().len(), 1);

    fs.remove("/d/f").unwrap();
    fs.remove("/d").unwrap();
    assert!(matches!(fs.stat("/d"), Err(FsError::NotFound)));
    assert!(matches!(fs.remove("/d"), Err(FsError::NotFound)));
}

#[test]
fn truncate_on_reopen_is_seen_by_open_handles() {
    let fs = MemoryFs::new();
    write_file(&fs, "/f", b"previous content", FileMode::new(0o644)).unwrap();
    let mut reader = fs.open("/f").unwrap();

    let mut writer = fs
        .open_file(
            "/f",
            OpenFlags::READ_WRITE | OpenFlags::CREATE | OpenFlags::TRUNCATE,
            FileMode::new(0o644),
        )
        .unwrap();
    assert_eq!(fs.stat("/f").unwrap().size, 0);
    assert!(read_all(&mut reader).is_empty());

    writer.write_all(b"new").unwrap();
    assert_eq!(read_all(&mut reader), b"new");
}

#[test]
fn append_keeps_existing_bytes() {
    let fs = MemoryFs::new();
    write_file(&fs, "/log", b"abc", FileMode::new(0o644)).unwrap();

    let mut appender = fs
        .open_file("/log", OpenFlags::WRITE_ONLY | OpenFlags::APPEND, FileMode::default())
        .unwrap();
    let mut other = fs
        .open_file("/log", OpenFlags::WRITE_ONLY | OpenFlags::APPEND, FileMode::default())
        .unwrap();
    other.write_all(b"def").unwrap();
    appender.write_all(b"XYZW").unwrap();

    let content = read_file(&fs, "/log").unwrap();
    assert_eq!(&content[..3], b"abc");
    assert_eq!(content, b"abcXYZW");
}

#[test]
fn handles_survive_removal_and_rename() {
    let fs = MemoryFs::new();
    let mut removed = fs.create("/doomed").unwrap();
    fs.remove("/doomed").unwrap();
    removed.write_all(b"orphan").unwrap();
    removed.seek(SeekFrom::Start(0)).unwrap();
    assert_eq!(read_all(&mut removed), b"orphan");
    assert!(matches!(fs.stat("/doomed"), Err(FsError::NotFound)));

    let mut moved = fs.create("/old/name").unwrap();
    fs.rename("/old", "/new").unwrap();
    moved.write_all(b"still attached").unwrap();
    assert_eq!(read_file(&fs, "/new/name").unwrap(), b"still attached");
}

#[test]
fn read_at_does_not_move_the_cursor() {
    let fs = MemoryFs::new();
    write_file(&fs, "/f", b"0123456789", FileMode::new(0o644)).unwrap();
    let mut file = fs.open("/f").unwrap();

    let mut buf = [0u8; 3];
    assert_eq!(file.read_at(&mut buf, 7).unwrap(), 3);
    assert_eq!(&buf, b"789");
    assert_eq!(file.read_at(&mut buf, 10).unwrap(), 0);

    assert_eq!(file.read(&mut buf).unwrap(), 3);
    assert_eq!(&buf, b"012");
}

#[test]
fn io_after_close_fails() {
    let fs = MemoryFs::new();
    let mut file = fs.create("/f").unwrap();
    file.close().unwrap();
    assert!(matches!(file.write(b"x"), Err(FsError::Closed)));
    assert!(matches!(file.close(), Err(FsError::Closed)));
}

#[test]
fn metadata_reports_mode_and_mtime() {
    let fs = MemoryFs::new();
    write_file(&fs, "/f", b"", FileMode::new(0o640)).unwrap();
    let created = fs.stat("/f").unwrap();
    assert_eq!(created.mode, FileMode::regular(0o640));

    let mut file = fs
        .open_file("/f", OpenFlags::WRITE_ONLY, FileMode::default())
        .unwrap();
    file.write_all(b"later").unwrap();
    let written = fs.stat("/f").unwrap();
    assert!(written.modified >= created.modified);
    assert_eq!(written.size, 5);
}

#[test]
fn concurrent_writers_share_one_buffer() {
    const THREADS: usize = 8;
    const CHUNK: usize = 512;
    let fs = MemoryFs::new();

    thread::scope(|s| {
        for i in 0..THREADS {
            let fs = &fs;
            s.spawn(move || {
                let mut file = fs
                    .open_file("/shared", OpenFlags::READ_WRITE | OpenFlags::CREATE, FileMode::new(0o644))
                    .unwrap();
                file.seek(SeekFrom::Start((i * CHUNK) as u64)).unwrap();
                file.write_all(&[i as u8; CHUNK]).unwrap();
                file.close().unwrap();
            });
        }
    });

    let content = read_file(&fs, "/shared").unwrap();
    assert_eq!(content.len(), THREADS * CHUNK);
    for (i, chunk) in content.chunks(CHUNK).enumerate() {
        assert!(chunk.iter().all(|b| *b == i as u8), "chunk {} torn", i);
    }
}

#[test]
fn concurrent_structural_changes_keep_the_tree_consistent() {
    const THREADS: usize = 8;
    const FILES: usize = 16;
    let fs = MemoryFs::new();
    fs.mkdir_all("/done", FileMode::new(0o755)).unwrap();

    thread::scope(|s| {
        for i in 0..THREADS {
            let fs = fs.clone();
            s.spawn(move || {
                let dir = format!("/work/t{}", i);
                for j in 0..FILES {
                    write_file(&fs, &format!("{}/f{}", dir, j), b"x", FileMode::new(0o644)).unwrap();
                }
                fs.remove(&format!("{}/f0", dir)).unwrap();
                fs.rename(&dir, &format!("/done/t{}", i)).unwrap();
            });
        }
    });

    assert!(fs.read_dir("/work").unwrap().is_empty());
    let done = fs.read_dir("/done").unwrap();
    assert_eq!(done.len(), THREADS);
    for entry in done {
        let files = fs.read_dir(&format!("/done/{}", entry.name)).unwrap();
        assert_eq!(files.len(), FILES - 1);
    }
}

fn file_path() -> impl Strategy<Value = String> {
    vec("[a-z]{1,6}", 1..4).prop_map(|parts| format!("/{}", parts.join("/")))
}

proptest! {
    #[test]
    fn write_then_read_round_trips(path in file_path(), data in vec(any::<u8>(), 0..4096)) {
        let fs = MemoryFs::new();
        let mut file = fs.create(&path).unwrap();
        file.write_all(&data).unwrap();
        file.close().unwrap();

        prop_assert_eq!(read_file(&fs, &path).unwrap(), data);
    }

    #[test]
    fn truncating_open_always_starts_empty(
        before in vec(any::<u8>(), 0..1024),
        after in vec(any::<u8>(), 0..1024),
    ) {
        let fs = MemoryFs::new();
        write_file(&fs, "/f", &before, FileMode::new(0o644)).unwrap();

        let mut file = fs.create("/f").unwrap();
        prop_assert_eq!(fs.stat("/f").unwrap().size, 0);
        file.write_all(&after).unwrap();
        prop_assert_eq!(read_file(&fs, "/f").unwrap(), after);
    }

    #[test]
    fn append_never_overwrites_earlier_bytes(
        initial in vec(any::<u8>(), 0..512),
        interleaved in vec(any::<u8>(), 0..512),
        appended in vec(any::<u8>(), 1..512),
    ) {
        let fs = MemoryFs::new();
        write_file(&fs, "/f", &initial, FileMode::new(0o644)).unwrap();

        let mut appender = fs
            .open_file("/f", OpenFlags::WRITE_ONLY | OpenFlags::APPEND, FileMode::default())
            .unwrap();
        let mut other = fs
            .open_file("/f", OpenFlags::READ_WRITE, FileMode::default())
            .unwrap();
        other.seek(SeekFrom::End(0)).unwrap();
        other.write_all(&interleaved).unwrap();
        appender.write_all(&appended).unwrap();

        let content = read_file(&fs, "/f").unwrap();
        prop_assert_eq!(&content[..initial.len()], &initial[..]);
        prop_assert_eq!(&content[initial.len()..initial.len() + appended.len()], &appended[..]);
    }
}
