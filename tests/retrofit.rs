//! End-to-end retrofit tests over real files.

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression as GzLevel;

use cidretro::cli::{process_group, Discovery, RunSummary};
use cidretro::config::{OutputMode, RetrofitOptions};
use cidretro::flow::{CommunityId, FlowTuple};
use cidretro::index::{IndexOutcome, UidIndexBuilder};
use cidretro::io::Compression;
use cidretro::retrofit::{RetrofitOutcome, RetrofitWriter, SkipReason};

const REFERENCE_ID: &str = "1:LQU9qZlK+B5F3KDmev6m5PMibrg=";

fn conn_line(uid: &str, orig: &str, orig_p: u16, resp: &str, resp_p: u16, proto: &str) -> String {
    format!(
        "{{\"ts\":1625000000.123456,\"uid\":\"{uid}\",\"id.orig_h\":\"{orig}\",\"id.orig_p\":{orig_p},\"id.resp_h\":\"{resp}\",\"id.resp_p\":{resp_p},\"proto\":\"{proto}\",\"duration\":2.288818359375e-05}}\n"
    )
}

fn reference_conn() -> String {
    conn_line("CRef", "128.232.110.120", 34855, "66.35.250.204", 80, "tcp")
}

fn write_gz(path: &Path, content: &str) {
    let mut encoder = GzEncoder::new(fs::File::create(path).unwrap(), GzLevel::default());
    encoder.write_all(content.as_bytes()).unwrap();
    encoder.finish().unwrap();
}

fn read_gz(path: &Path) -> String {
    let mut out = String::new();
    MultiGzDecoder::new(fs::File::open(path).unwrap())
        .read_to_string(&mut out)
        .unwrap();
    out
}

fn dir_listing(dir: &Path) -> Vec<PathBuf> {
    let mut entries: Vec<PathBuf> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    entries.sort();
    entries
}

fn run(dir: &Path, options: &RetrofitOptions) -> RunSummary {
    let groups = Discovery::new().unwrap().discover(dir).unwrap();
    let mut summary = RunSummary::new(options.dry_run);
    for group in &groups {
        summary.push(process_group(group, options, CommunityId::default()));
    }
    summary
}

#[test]
fn test_plain_sibling_output() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("conn.log"), reference_conn()).unwrap();
    fs::write(
        dir.path().join("dns.log"),
        "{\"ts\":1.0,\"uid\":\"CRef\",\"query\":\"sourceforge.net\"}\n",
    )
    .unwrap();

    let summary = run(dir.path(), &RetrofitOptions::new(OutputMode::Sibling));
    assert!(!summary.has_failures());
    assert_eq!(summary.totals.enriched, 2);

    assert_eq!(
        fs::read_to_string(dir.path().join("dns.new.log")).unwrap(),
        format!("{{\"ts\":1.0,\"uid\":\"CRef\",\"community_id\":\"{REFERENCE_ID}\",\"query\":\"sourceforge.net\"}}\n")
    );
    assert!(fs::read_to_string(dir.path().join("conn.new.log"))
        .unwrap()
        .contains(REFERENCE_ID));
}

#[test]
fn test_gzip_in_gzip_out() {
    let dir = tempfile::tempdir().unwrap();
    write_gz(&dir.path().join("conn.log.gz"), &reference_conn());
    write_gz(
        &dir.path().join("http.log.gz"),
        "{\"uid\":\"CRef\",\"method\":\"GET\"}\n",
    );

    let summary = run(dir.path(), &RetrofitOptions::new(OutputMode::Sibling));
    assert_eq!(summary.totals.enriched, 2);

    let out = dir.path().join("http.new.log.gz");
    let head = fs::read(&out).unwrap();
    assert_eq!(Compression::detect(&head), Compression::Gzip);
    assert_eq!(
        read_gz(&out),
        format!("{{\"uid\":\"CRef\",\"community_id\":\"{REFERENCE_ID}\",\"method\":\"GET\"}}\n")
    );
}

#[test]
fn test_overwrite_replaces_atomically() {
    let dir = tempfile::tempdir().unwrap();
    let conn = dir.path().join("conn.log");
    let ssl = dir.path().join("ssl.log");
    fs::write(&conn, reference_conn()).unwrap();
    fs::write(&ssl, "{\"uid\":\"CRef\",\"version\":\"TLSv12\"}\n").unwrap();

    let summary = run(dir.path(), &RetrofitOptions::new(OutputMode::InPlace));
    assert!(!summary.has_failures());

    // Same two files, no temporaries or siblings left behind
    assert_eq!(dir_listing(dir.path()), vec![conn.clone(), ssl.clone()]);
    assert!(fs::read_to_string(&ssl).unwrap().contains(REFERENCE_ID));
}

#[test]
fn test_dry_run_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let conn = dir.path().join("conn.log");
    let dns = dir.path().join("dns.log");
    fs::write(&conn, reference_conn()).unwrap();
    fs::write(&dns, "{\"uid\":\"CRef\"}\n").unwrap();

    for mode in [OutputMode::Sibling, OutputMode::InPlace] {
        let options = RetrofitOptions::new(mode).with_dry_run(true);
        let summary = run(dir.path(), &options);
        assert_eq!(summary.totals.enriched, 2);
        assert!(summary.dry_run);
    }

    assert_eq!(dir_listing(dir.path()), vec![conn.clone(), dns.clone()]);
    assert_eq!(fs::read_to_string(&dns).unwrap(), "{\"uid\":\"CRef\"}\n");
    assert_eq!(fs::read_to_string(&conn).unwrap(), reference_conn());
}

#[test]
fn test_no_matching_uids_leaves_no_trace() {
    let dir = tempfile::tempdir().unwrap();
    let conn = dir.path().join("conn.log");
    let dns = dir.path().join("dns.log");
    fs::write(&conn, reference_conn()).unwrap();
    fs::write(&dns, "{\"uid\":\"Cother\"}\n").unwrap();

    let options = RetrofitOptions::new(OutputMode::Sibling);
    let builder = UidIndexBuilder::new(&options.fields, CommunityId::default());
    let IndexOutcome::Built(index) = builder.build(&conn).unwrap() else {
        panic!("conn log should index");
    };
    let report = RetrofitWriter::new(&options).retrofit(&index, &dns).unwrap();

    assert_eq!(report.outcome, RetrofitOutcome::Skipped(SkipReason::NoMatchingUids));
    assert_eq!(dir_listing(dir.path()), vec![conn, dns]);
}

#[test]
fn test_malformed_line_among_ten() {
    let dir = tempfile::tempdir().unwrap();
    let mut conn = String::new();
    let mut dns = String::new();
    for i in 0..10u16 {
        let uid = format!("C{i}");
        conn.push_str(&conn_line(&uid, "10.0.0.1", 40000 + i, "10.0.0.53", 53, "udp"));
        if i == 4 {
            dns.push_str("{\"uid\":\"C4\",\"query\":\n");
        } else {
            dns.push_str(&format!("{{\"uid\":\"{uid}\",\"query\":\"q{i}\"}}\n"));
        }
    }
    fs::write(dir.path().join("conn.log"), &conn).unwrap();
    fs::write(dir.path().join("dns.log"), &dns).unwrap();

    let summary = run(dir.path(), &RetrofitOptions::new(OutputMode::Sibling));
    let dns_report = summary.groups[0]
        .files
        .iter()
        .find(|f| f.path.ends_with("dns.log"))
        .and_then(|f| f.report.clone())
        .unwrap();
    assert_eq!(dns_report.outcome, RetrofitOutcome::Enriched(9));
    assert_eq!(dns_report.skipped_lines, 1);

    let out = fs::read_to_string(dir.path().join("dns.new.log")).unwrap();
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines.len(), 10);
    assert_eq!(lines[4], "{\"uid\":\"C4\",\"query\":");
    assert_eq!(lines.iter().filter(|l| l.contains("community_id")).count(), 9);
}

#[test]
fn test_second_run_is_noop() {
    let dir = tempfile::tempdir().unwrap();
    let conn = dir.path().join("conn.log");
    let files = dir.path().join("files.log");
    fs::write(&conn, reference_conn()).unwrap();
    fs::write(&files, "{\"uid\":\"CRef\",\"fuid\":\"F1\"}\n").unwrap();

    let options = RetrofitOptions::new(OutputMode::InPlace);
    let first = run(dir.path(), &options);
    assert_eq!(first.totals.enriched, 2);
    let after_first = fs::read(&files).unwrap();

    let second = run(dir.path(), &options);
    assert_eq!(second.totals.enriched, 0);
    assert_eq!(second.totals.skipped_already_present, 2);
    assert_eq!(fs::read(&files).unwrap(), after_first);
}

#[test]
fn test_bytes_outside_insertion_preserved() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("conn.log"), reference_conn()).unwrap();
    // CRLF, odd spacing, unicode escapes and no trailing newline
    let original = "{\"uid\":\"CRef\" , \"msg\":\"caf\\u00e9\",\"n\":1.0E+2}\r\n{\"uid\":\"CRef\",\"x\":[1, 2]}";
    fs::write(dir.path().join("notice.log"), original).unwrap();

    run(dir.path(), &RetrofitOptions::new(OutputMode::Sibling));

    let out = fs::read_to_string(dir.path().join("notice.new.log")).unwrap();
    let insertion = format!(",\"community_id\":\"{REFERENCE_ID}\"");
    assert_eq!(out.matches(&insertion).count(), 2);
    assert_eq!(out.replace(&insertion, ""), original);
}

#[test]
fn test_reversed_connection_gets_same_id() {
    let dir = tempfile::tempdir().unwrap();
    let conn = dir.path().join("conn.log");
    let mut content = reference_conn();
    content.push_str(&conn_line("CRev", "66.35.250.204", 80, "128.232.110.120", 34855, "tcp"));
    fs::write(&conn, content).unwrap();

    let options = RetrofitOptions::default();
    let builder = UidIndexBuilder::new(&options.fields, CommunityId::default());
    let IndexOutcome::Built(index) = builder.build(&conn).unwrap() else {
        panic!("conn log should index");
    };
    assert_eq!(index.get("CRef").map(|id| id.as_str()), Some(REFERENCE_ID));
    assert_eq!(index.get("CRev"), index.get("CRef"));

    let tuple = FlowTuple::from_strs("tcp", "128.232.110.120", "66.35.250.204", Some(34855), Some(80))
        .unwrap();
    let hasher = CommunityId::default();
    assert_eq!(
        hasher.compute(&tuple).unwrap(),
        hasher.compute(&tuple.reverse()).unwrap()
    );
}

#[test]
fn test_rotated_logs_pair_by_range() {
    let dir = tempfile::tempdir().unwrap();
    let early = "00:00:00-01:00:00";
    let late = "01:00:00-02:00:00";
    fs::write(dir.path().join(format!("conn.{early}.log")), reference_conn()).unwrap();
    fs::write(
        dir.path().join(format!("conn.{late}.log")),
        conn_line("CLate", "10.1.1.1", 5353, "10.1.1.2", 53, "udp"),
    )
    .unwrap();
    fs::write(dir.path().join(format!("dns.{early}.log")), "{\"uid\":\"CLate\"}\n").unwrap();
    fs::write(dir.path().join(format!("dns.{late}.log")), "{\"uid\":\"CLate\"}\n").unwrap();

    let summary = run(dir.path(), &RetrofitOptions::new(OutputMode::Sibling));
    assert_eq!(summary.totals.groups, 2);

    // The early dns log only sees the early conn log's uids
    assert!(!dir.path().join(format!("dns.{early}.new.log")).exists());
    assert!(dir.path().join(format!("dns.{late}.new.log")).exists());
}

#[cfg(unix)]
#[test]
fn test_overwrite_keeps_permissions() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let conn = dir.path().join("conn.log");
    fs::write(&conn, reference_conn()).unwrap();
    fs::set_permissions(&conn, fs::Permissions::from_mode(0o640)).unwrap();

    run(dir.path(), &RetrofitOptions::new(OutputMode::InPlace));

    let mode = fs::metadata(&conn).unwrap().permissions().mode() & 0o777;
    assert_eq!(mode, 0o640);
    assert!(fs::read_to_string(&conn).unwrap().contains(REFERENCE_ID));
}
