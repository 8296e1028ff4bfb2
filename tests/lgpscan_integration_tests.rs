// SPDX-License-Identifier: Apache-2.0

//! End-to-end runs against real files: dated log files in a temp directory,
//! a JSON checkpoint and an append-only result file.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tempfile::TempDir;

use lgpscan::exporters::file::{ResultFormat, ResultSink, TextFileSink, build_sink};
use lgpscan::receivers::lgp::{
    CheckpointStore, Error, JsonFileCheckpointStore, RunCoordinator, RunReport, RunState,
    START_OFFSET, ScannerConfig,
};

const FILE_HEADER: &str = "1CV8LOG(ver 2.0)\n6b2d64d0-8a4e-4a39-9a51-1d3b7f5d2c11\n";

fn record(ts: &str, detail: &str) -> String {
    format!("}},\n{{{},N,\n{}\n{{\"U\"}},\"\",1,1,0,1,0,\n{{0}}\n", ts, detail)
}

fn error_record(ts: &str, msg: &str) -> String {
    record(ts, &format!("{{2a4f,0}},1,1,1,1,17,E,{},0", msg))
}

fn info_record(ts: &str) -> String {
    record(ts, "{2a4f,0},1,1,1,1,1,I,,0")
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
}

struct Env {
    _dir: TempDir,
    config: ScannerConfig,
}

impl Env {
    fn new(name: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join(name);
        let log_directory = root.join("logs");
        fs::create_dir_all(&log_directory).unwrap();
        let config = ScannerConfig {
            log_directory,
            result_file: root.join("out").join("errors.txt"),
            checkpoint_file: root.join("state").join("workdata.json"),
            ..ScannerConfig::default()
        };
        Self { _dir: dir, config }
    }

    fn log_path(&self, date: NaiveDate) -> PathBuf {
        self.config.log_path_for(date)
    }

    fn write_log(&self, date: NaiveDate, contents: &str) -> PathBuf {
        let path = self.log_path(date);
        fs::write(&path, contents).unwrap();
        path
    }

    fn append_log(&self, date: NaiveDate, contents: &str) {
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.log_path(date))
            .unwrap();
        f.write_all(contents.as_bytes()).unwrap();
    }

    fn store(&self) -> JsonFileCheckpointStore {
        JsonFileCheckpointStore::new(&self.config.checkpoint_file)
    }

    fn run(&self, date: NaiveDate) -> Result<RunReport, Error> {
        let sink = TextFileSink::new(&self.config.result_file);
        RunCoordinator::new(self.config.clone(), self.store(), sink).run(date)
    }

    fn backfill(&self, date: NaiveDate) -> Result<RunReport, Error> {
        let sink = TextFileSink::new(&self.config.result_file);
        RunCoordinator::new(self.config.clone(), self.store(), sink).backfill(date)
    }

    fn results(&self) -> String {
        fs::read_to_string(&self.config.result_file).unwrap_or_default()
    }
}

fn sample_log() -> String {
    let mut contents = String::from(FILE_HEADER);
    contents.push_str(&info_record("20240315080000"));
    contents.push_str(&error_record("20240315081500", "Connection refused"));
    contents.push_str(&info_record("20240315082000"));
    contents.push_str(&error_record("20240315090000", "Lock conflict"));
    contents.push_str(&error_record("20240315093000", "Deadlock detected"));
    contents.push_str(&info_record("20240315100000"));
    contents
}

#[test]
fn test_single_run_reads_whole_file() {
    let env = Env::new("single");
    let path = env.write_log(day(15), &sample_log());

    let report = env.run(day(15)).unwrap();

    assert_eq!(report.start_offset, START_OFFSET);
    assert_eq!(report.records, 6);
    assert_eq!(report.errors, 3);
    assert_eq!(report.checkpoint.offset, START_OFFSET + 6 * 5);
    assert_eq!(report.checkpoint.source_id, path.to_string_lossy());
    assert_eq!(
        env.results(),
        "2024-03-15 08:15:00 Connection refused\n\
         2024-03-15 09:00:00 Lock conflict\n\
         2024-03-15 09:30:00 Deadlock detected\n"
    );
}

#[test]
fn test_chunked_appends_match_single_run() {
    let full = sample_log();

    let single = Env::new("single");
    single.write_log(day(15), &full);
    single.run(day(15)).unwrap();

    // Grow the file in odd-sized chunks that split lines and records,
    // running a scan after every append
    let chunked = Env::new("chunked");
    let (header, body) = full.split_at(FILE_HEADER.len());
    chunked.write_log(day(15), header);
    let bytes = body.as_bytes();
    let mut pos = 0;
    let mut runs = 0;
    while pos < bytes.len() {
        let end = (pos + 37).min(bytes.len());
        chunked.append_log(day(15), std::str::from_utf8(&bytes[pos..end]).unwrap());
        chunked.run(day(15)).unwrap();
        pos = end;
        runs += 1;
    }

    assert!(runs > 6);
    assert_eq!(chunked.results(), single.results());
    assert_eq!(
        chunked.store().get().unwrap(),
        single.store().get().unwrap()
    );
}

#[test]
fn test_rerun_without_new_data_is_noop() {
    let env = Env::new("noop");
    env.write_log(day(15), &sample_log());

    let first = env.run(day(15)).unwrap();
    let results = env.results();

    let second = env.run(day(15)).unwrap();
    assert_eq!(second.start_offset, first.checkpoint.offset);
    assert_eq!(second.checkpoint, first.checkpoint);
    assert_eq!(second.records, 0);
    assert_eq!(second.errors, 0);
    assert_eq!(env.results(), results);
}

#[test]
fn test_incomplete_record_is_left_for_next_run() {
    let env = Env::new("partial");
    let mut contents = String::from(FILE_HEADER);
    contents.push_str(&error_record("20240315081500", "Connection refused"));
    let tail = error_record("20240315090000", "Lock conflict");
    // Three full lines and half of the fourth
    let cut = tail.match_indices('\n').nth(2).unwrap().0 + 6;
    contents.push_str(&tail[..cut]);
    env.write_log(day(15), &contents);

    let report = env.run(day(15)).unwrap();
    assert_eq!(report.records, 1);
    assert_eq!(report.checkpoint.offset, START_OFFSET + 5);
    assert_eq!(env.results(), "2024-03-15 08:15:00 Connection refused\n");

    env.append_log(day(15), &tail[cut..]);
    let report = env.run(day(15)).unwrap();
    assert_eq!(report.start_offset, START_OFFSET + 5);
    assert_eq!(report.records, 1);
    assert_eq!(report.checkpoint.offset, START_OFFSET + 10);
    assert_eq!(
        env.results(),
        "2024-03-15 08:15:00 Connection refused\n\
         2024-03-15 09:00:00 Lock conflict\n"
    );
}

#[test]
fn test_new_day_starts_at_first_record() {
    let env = Env::new("rollover");
    env.write_log(day(15), &sample_log());
    env.run(day(15)).unwrap();

    let mut next = String::from(FILE_HEADER);
    next.push_str(&error_record("20240316000500", "Session terminated"));
    let path = env.write_log(day(16), &next);

    let report = env.run(day(16)).unwrap();
    assert_eq!(report.start_offset, START_OFFSET);
    assert_eq!(report.previous_errors, 0);
    assert_eq!(report.checkpoint.source_id, path.to_string_lossy());
    assert_eq!(report.checkpoint.offset, START_OFFSET + 5);
    assert!(env.results().ends_with("2024-03-16 00:05:00 Session terminated\n"));
}

#[test]
fn test_backfill_does_not_repeat_todays_errors() {
    let env = Env::new("backfill");
    let mut today = String::from(FILE_HEADER);
    today.push_str(&error_record("20240315100000", "today"));
    env.write_log(day(15), &today);
    let mut earlier = String::from(FILE_HEADER);
    earlier.push_str(&error_record("20240314100000", "earlier"));
    env.write_log(day(14), &earlier);

    let first = env.run(day(15)).unwrap();
    let backfill = env.backfill(day(14)).unwrap();
    assert!(!backfill.persisted);
    assert_eq!(env.store().get().unwrap(), Some(first.checkpoint.clone()));

    let again = env.run(day(15)).unwrap();
    assert_eq!(again.start_offset, first.checkpoint.offset);
    assert_eq!(env.results().matches("today").count(), 1);
    assert_eq!(
        env.results(),
        "2024-03-15 10:00:00 today\n\
         2024-03-14 10:00:00 earlier\n"
    );
}

#[test]
fn test_catch_up_reads_previous_tail_first() {
    let mut env = Env::new("catch-up");
    env.config.catch_up_previous = true;

    let mut first = String::from(FILE_HEADER);
    first.push_str(&error_record("20240315235000", "Connection refused"));
    env.write_log(day(15), &first);
    env.run(day(15)).unwrap();

    // Written after the last run of the day
    env.append_log(day(15), &error_record("20240315235900", "Late failure"));

    let mut next = String::from(FILE_HEADER);
    next.push_str(&error_record("20240316000500", "Session terminated"));
    env.write_log(day(16), &next);

    let report = env.run(day(16)).unwrap();
    assert_eq!(report.previous_errors, 1);
    assert_eq!(report.errors, 2);
    assert_eq!(report.checkpoint.offset, START_OFFSET + 5);
    assert_eq!(
        env.results(),
        "2024-03-15 23:50:00 Connection refused\n\
         2024-03-15 23:59:00 Late failure\n\
         2024-03-16 00:05:00 Session terminated\n"
    );
}

#[test]
fn test_missing_log_file_changes_nothing() {
    let env = Env::new("missing");

    let err = env.run(day(15)).unwrap_err();
    assert!(matches!(err, Error::FileNotFound(_)));
    assert_eq!(err.exit_code(), 3);
    assert!(!env.config.checkpoint_file.exists());
    assert!(!env.config.result_file.exists());
}

#[test]
fn test_decode_failure_keeps_previous_state() {
    let env = Env::new("decode");
    let mut contents = String::from(FILE_HEADER);
    contents.push_str(&error_record("20240315081500", "Connection refused"));
    env.write_log(day(15), &contents);
    let first = env.run(day(15)).unwrap();
    let results = env.results();

    env.append_log(day(15), &error_record("2024031509XX00", "Garbled"));
    let err = env.run(day(15)).unwrap_err();
    assert!(matches!(err, Error::Decode { .. }));
    assert_eq!(err.exit_code(), 1);

    assert_eq!(env.store().get().unwrap(), Some(first.checkpoint));
    assert_eq!(env.results(), results);
}

#[test]
fn test_shrunk_file_is_truncated_stream() {
    let env = Env::new("shrunk");
    env.write_log(day(15), &sample_log());
    let first = env.run(day(15)).unwrap();

    // Replaced by a shorter file under the same name
    let mut contents = String::from(FILE_HEADER);
    contents.push_str(&info_record("20240315080000"));
    env.write_log(day(15), &contents);

    let err = env.run(day(15)).unwrap_err();
    assert!(matches!(err, Error::TruncatedStream { .. }));
    assert_eq!(env.store().get().unwrap(), Some(first.checkpoint));
}

#[test]
fn test_jsonl_results() {
    let mut env = Env::new("jsonl");
    env.config.result_format = ResultFormat::Jsonl;
    env.write_log(day(15), &sample_log());

    let sink = build_sink(env.config.result_format, &env.config.result_file);
    let mut coordinator = RunCoordinator::new(env.config.clone(), env.store(), sink);
    let report = coordinator.run(day(15)).unwrap();
    assert_eq!(coordinator.state(), RunState::Done);
    assert_eq!(report.errors, 3);

    let messages: Vec<String> = env
        .results()
        .lines()
        .map(|line| {
            let value: serde_json::Value = serde_json::from_str(line).unwrap();
            value["message"].as_str().unwrap().to_string()
        })
        .collect();
    assert_eq!(
        messages,
        vec!["Connection refused", "Lock conflict", "Deadlock detected"]
    );
}

#[test]
fn test_result_sink_skips_empty_batches() {
    let env = Env::new("empty");
    let mut sink = TextFileSink::new(&env.config.result_file);
    sink.append(&[]).unwrap();
    assert!(!Path::new(&env.config.result_file).exists());
}
