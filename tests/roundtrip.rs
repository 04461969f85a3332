use archvolio::config::ArchiveOptions;
use archvolio::dico::Dictionary;
use archvolio::error::{FatalError, MinorError, ReadOutcome};
use archvolio::frame::{FormatProfile, MAGIC_FILESYSTEM_HEADER, MAGIC_DATA_BLOCK};
use archvolio::writer::BlockInfo;
use archvolio::{Reader, Writer};

fn basepath(dir: &tempfile::TempDir, name: &str) -> String {
    dir.path().join(name).to_str().unwrap().to_string()
}

/// S1: single-volume round-trip — three header records with fsids 1,1,2,
/// two block records, reader returns exactly that sequence and both
/// payloads verify.
#[test]
fn single_volume_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let base = basepath(&dir, "s1");

    let mut w = Writer::create(&base, ArchiveOptions::default(), 1, FormatProfile::V2).unwrap();
    let dico = Dictionary::new();
    w.write_header(MAGIC_FILESYSTEM_HEADER, 1, &dico).unwrap();
    w.write_header(MAGIC_FILESYSTEM_HEADER, 1, &dico).unwrap();
    w.write_header(MAGIC_FILESYSTEM_HEADER, 2, &dico).unwrap();
    w.write_block(
        MAGIC_DATA_BLOCK,
        1,
        &BlockInfo {
            payload: b"hello".to_vec(),
            logical_offset: 0,
            comp_algo: 0,
            enc_algo: 0,
        },
    )
    .unwrap();
    w.write_block(
        MAGIC_DATA_BLOCK,
        2,
        &BlockInfo {
            payload: b"world".to_vec(),
            logical_offset: 5,
            comp_algo: 0,
            enc_algo: 0,
        },
    )
    .unwrap();
    w.close().unwrap();

    let mut r = Reader::open(&base, 64, 1).unwrap();
    let mut fsids = Vec::new();
    let mut payloads = Vec::new();
    loop {
        match r.read_header().unwrap() {
            ReadOutcome::EndOfArchive => break,
            ReadOutcome::Minor(e) => panic!("unexpected minor error: {e}"),
            ReadOutcome::Success(rec) => {
                fsids.push(rec.fsid);
                if rec.magic == MAGIC_DATA_BLOCK {
                    let block = r.read_block(&rec.dico, false).unwrap().unwrap();
                    assert!(block.sumok);
                    payloads.push(block.payload);
                }
            }
        }
    }
    assert_eq!(fsids, vec![1, 1, 2, 1, 2]);
    assert_eq!(payloads, vec![b"hello".to_vec(), b"world".to_vec()]);
}

/// S2: a three-volume split archive reassembles into one logical stream.
#[test]
fn three_volume_split() {
    let dir = tempfile::tempdir().unwrap();
    let base = basepath(&dir, "s2");

    let options = ArchiveOptions {
        datablocksize: 4096,
        splitsize: 64,
        overwrite: false,
    };
    let mut w = Writer::create(&base, options, 1, FormatProfile::V2).unwrap();
    for i in 0..6u8 {
        w.write_block(
            MAGIC_DATA_BLOCK,
            0,
            &BlockInfo {
                payload: vec![i; 40],
                logical_offset: i as u64 * 40,
                comp_algo: 0,
                enc_algo: 0,
            },
        )
        .unwrap();
    }
    w.close().unwrap();
    assert!(w.curvol() >= 2, "expected archive to span multiple volumes, got curvol={}", w.curvol());

    let mut r = Reader::open(&base, 64, 1).unwrap();
    let mut seen = Vec::new();
    loop {
        match r.read_header().unwrap() {
            ReadOutcome::EndOfArchive => break,
            ReadOutcome::Minor(e) => panic!("unexpected minor error: {e}"),
            ReadOutcome::Success(rec) => {
                let block = r.read_block(&rec.dico, false).unwrap().unwrap();
                assert!(block.sumok);
                seen.push(block.payload[0]);
            }
        }
    }
    assert_eq!(seen, vec![0, 1, 2, 3, 4, 5]);
}

/// S3-equivalent: corrupting a block's payload is caught and the zeroed,
/// flagged payload is returned rather than silently passed through.
#[test]
fn corrupted_block_payload_detected() {
    let dir = tempfile::tempdir().unwrap();
    let base = basepath(&dir, "s3");

    let mut w = Writer::create(&base, ArchiveOptions::default(), 1, FormatProfile::V2).unwrap();
    w.write_block(
        MAGIC_DATA_BLOCK,
        0,
        &BlockInfo {
            payload: b"uncorrupted payload".to_vec(),
            logical_offset: 0,
            comp_algo: 0,
            enc_algo: 0,
        },
    )
    .unwrap();
    w.close().unwrap();

    let path = format!("{base}.fvol");
    let mut bytes = std::fs::read(&path).unwrap();
    let needle = b"uncorrupted payload";
    let at = bytes
        .windows(needle.len())
        .position(|w| w == needle)
        .expect("payload bytes not found on disk");
    bytes[at] ^= 0xFF;
    std::fs::write(&path, &bytes).unwrap();

    let mut r = Reader::open(&base, 64, 1).unwrap();
    match r.read_header().unwrap() {
        ReadOutcome::Success(rec) => {
            let block = r.read_block(&rec.dico, false).unwrap().unwrap();
            assert!(!block.sumok);
            assert!(block.payload.iter().all(|&b| b == 0));
        }
        other => panic!("expected a successful header decode, got a different outcome: {other:?}"),
    }
}

/// S4-equivalent: a wrong archive-id mid-stream is a Minor error, not fatal.
#[test]
fn archive_id_mismatch_is_minor() {
    let dir = tempfile::tempdir().unwrap();
    let base = basepath(&dir, "s4");

    let mut w = Writer::create(&base, ArchiveOptions::default(), 1, FormatProfile::V2).unwrap();
    let dico = Dictionary::new();
    w.write_header(MAGIC_FILESYSTEM_HEADER, 1, &dico).unwrap();
    w.write_header(MAGIC_FILESYSTEM_HEADER, 2, &dico).unwrap();
    w.close().unwrap();

    let r = Reader::open(&base, 64, 1).unwrap();
    let real_id = r.archive_id().unwrap();
    assert_ne!(real_id, 0);

    // Corrupt the second header record's archive-id field in place so the
    // reader sees a different id mid-stream after successfully validating
    // the volume header against the first value.
    let path = format!("{base}.fvol");
    let mut bytes = std::fs::read(&path).unwrap();
    let bogus_id = real_id ^ 0xFFFF_FFFF;
    let needle = real_id.to_le_bytes();
    let first = bytes
        .windows(4)
        .position(|w| w == needle)
        .expect("archive id not found on disk");
    let second = bytes[first + 1..]
        .windows(4)
        .position(|w| w == needle)
        .map(|p| p + first + 1)
        .expect("second archive id occurrence not found on disk");
    bytes[second..second + 4].copy_from_slice(&bogus_id.to_le_bytes());
    std::fs::write(&path, &bytes).unwrap();

    let mut r = Reader::open(&base, 64, 1).unwrap();
    let mut saw_mismatch = false;
    loop {
        match r.read_header().unwrap() {
            ReadOutcome::EndOfArchive => break,
            ReadOutcome::Minor(MinorError::ArchiveIdMismatch { .. }) => {
                saw_mismatch = true;
                break;
            }
            ReadOutcome::Minor(e) => panic!("unexpected minor error: {e}"),
            ReadOutcome::Success(_) => continue,
        }
    }
    assert!(saw_mismatch, "expected an archive-id mismatch to be reported as a minor error");
}

/// A split archive whose second volume's header carries a different format
/// profile than the one adopted from volume 0 is a fatal error, not a
/// silent continuation under the original profile.
#[test]
fn cross_volume_format_version_mismatch_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let base = basepath(&dir, "s8");

    let options = ArchiveOptions {
        datablocksize: 4096,
        splitsize: 16,
        overwrite: false,
    };
    let mut w = Writer::create(&base, options, 1, FormatProfile::V2).unwrap();
    w.write_block(
        MAGIC_DATA_BLOCK,
        0,
        &BlockInfo {
            payload: vec![1; 40],
            logical_offset: 0,
            comp_algo: 0,
            enc_algo: 0,
        },
    )
    .unwrap();
    w.close().unwrap();
    assert!(w.curvol() >= 1, "expected at least one split, got curvol={}", w.curvol());

    // The format-version probe checks a fixed offset from the record's
    // magic for each candidate profile — offset 40 for v1 — regardless of
    // which profile actually framed the record. Planting a v1 tag there
    // makes the reader detect v1 for this volume, which must then conflict
    // with the v2 profile adopted from volume 0.
    let vol1_path = format!("{base}.001.fvol");
    let mut bytes = std::fs::read(&vol1_path).unwrap();
    bytes[40..50].copy_from_slice(b"AVIOFMT_01");
    std::fs::write(&vol1_path, &bytes).unwrap();

    let mut r = Reader::open(&base, 64, 1).unwrap();
    let err = loop {
        match r.read_header() {
            Ok(ReadOutcome::Success(_)) => continue,
            Ok(other) => panic!("expected a fatal error before {other:?}"),
            Err(e) => break e,
        }
    };
    assert!(
        matches!(err, FatalError::FormatVersionMismatch { .. }),
        "expected FormatVersionMismatch, got {err:?}"
    );
}

/// S6: a magic straddling the scanner's growth-threshold boundary is still found.
#[test]
fn magic_at_growth_boundary_is_found() {
    let dir = tempfile::tempdir().unwrap();
    let base = basepath(&dir, "s6");

    let mut w = Writer::create(&base, ArchiveOptions::default(), 1, FormatProfile::V2).unwrap();
    let mut dico = Dictionary::new();
    dico.add_string(0, 0, &"x".repeat(80)).unwrap();
    w.write_header(MAGIC_FILESYSTEM_HEADER, 9, &dico).unwrap();
    w.close().unwrap();

    let mut r = Reader::open(&base, 8, 1).unwrap();
    match r.read_header().unwrap() {
        ReadOutcome::Success(rec) => assert_eq!(rec.fsid, 9),
        other => panic!("expected a successful header decode, got a different outcome: {other:?}"),
    }
}

/// Refusing to clobber an existing regular-file archive without `overwrite`.
#[test]
fn refuses_to_overwrite_existing_archive() {
    let dir = tempfile::tempdir().unwrap();
    let base = basepath(&dir, "s7");
    std::fs::write(format!("{base}.fvol"), b"pre-existing").unwrap();

    let result = Writer::create(&base, ArchiveOptions::default(), 1, FormatProfile::V2);
    assert!(matches!(result, Err(FatalError::AlreadyExists { .. })));
}
