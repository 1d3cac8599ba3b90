use std::fs;

use pretty_assertions::assert_eq;
use tempfile::tempdir;

use crv_core::config::PipelineConfig;
use crv_core::domain::{RevisionRecord, RevisionResult, SelectedEvidence};
use crv_core::records::{
    load_finished_results, read_records, run_args_path, write_run_args, RecordWriter,
};

fn finished(claim: &str, revised: &str) -> RevisionResult {
    RevisionResult {
        text: claim.to_string(),
        questions: vec!["q?".to_string()],
        evidences_for_questions: vec![vec![]],
        revisions: vec![RevisionRecord {
            original_text: claim.to_string(),
            revised_text: revised.to_string(),
            evidences: vec![],
            agreement_gates: vec![],
            revision_steps: vec![],
        }],
        selected_evidences: vec![SelectedEvidence {
            text: "e".to_string(),
        }],
    }
}

#[test]
fn records_round_trip_and_keep_extra_fields() {
    let tmp = tempdir().unwrap();
    let input = tmp.path().join("in.jsonl");
    fs::write(
        &input,
        "{\"input_info\":{\"claim\":\"a\"},\"split\":\"dev\"}\n\n{\"input_info\":{\"claim\":\"b\"}}\n",
    )
    .unwrap();

    let mut recs = read_records(&input).expect("read");
    assert_eq!(recs.len(), 2);
    assert_eq!(recs[0].claim("claim").expect("claim"), "a");
    assert_eq!(recs[0].extra.get("split"), Some(&serde_json::json!("dev")));

    recs[0].result = Some(finished("a", "a2"));
    let output = tmp.path().join("out.jsonl");
    let mut writer = RecordWriter::create(&output).expect("create");
    for rec in recs.iter() {
        writer.write(rec).expect("write");
    }
    drop(writer);

    let back = read_records(&output).expect("read back");
    assert_eq!(back, recs);
    assert!(fs::read_to_string(&output).unwrap().contains("\"split\":\"dev\""));
}

#[test]
fn finished_results_are_keyed_by_claim_and_skip_unfinished_lines() {
    let tmp = tempdir().unwrap();
    let output = tmp.path().join("out.jsonl");
    assert!(load_finished_results(&output, "claim").expect("missing ok").is_empty());

    fs::write(
        &output,
        format!(
            "{}\n{}\n",
            serde_json::json!({"input_info": {"claim": "a"}, "result": finished("a", "a2")}),
            serde_json::json!({"input_info": {"claim": "b"}}),
        ),
    )
    .unwrap();

    let done = load_finished_results(&output, "claim").expect("load");
    assert_eq!(done.len(), 1);
    assert_eq!(done["a"].revised_text(), "a2");
}

#[test]
fn missing_claim_field_is_an_error() {
    let tmp = tempdir().unwrap();
    let input = tmp.path().join("in.jsonl");
    fs::write(&input, "{\"input_info\":{\"other\":1}}\n").unwrap();
    let recs = read_records(&input).expect("read");
    assert_eq!(recs[0].claim("claim").unwrap_err().code, "RECORDS_CLAIM_MISSING");
    assert_eq!(recs[0].claim("other").unwrap_err().code, "RECORDS_CLAIM_INVALID");
}

#[test]
fn malformed_line_reports_line_number() {
    let tmp = tempdir().unwrap();
    let input = tmp.path().join("in.jsonl");
    fs::write(&input, "{\"input_info\":{}}\nnot json\n").unwrap();
    let err = read_records(&input).expect_err("malformed");
    assert_eq!(err.code, "RECORDS_DECODE_FAILED");
    assert!(err.details.unwrap_or_default().contains("line=2"));
}

#[test]
fn run_args_are_written_next_to_output() {
    let tmp = tempdir().unwrap();
    let output = tmp.path().join("out.jsonl");
    let path = write_run_args(&output, &PipelineConfig::default()).expect("write args");
    assert_eq!(path, run_args_path(&output));
    assert!(path.to_string_lossy().ends_with("out.jsonl_args"));

    let v: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(v["model"], "text-davinci-003");
    assert!(v["written_at"].is_string());
}
