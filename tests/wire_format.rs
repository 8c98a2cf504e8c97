//! Wire-shape checks for the documented service contract.

use exam_proctor::recorder::encode_wav_pcm16;
use exam_proctor::{
    AnswerEntry, ExamDefinition, ExamType, ProctoringReport, SubmissionOutcome, SubmissionRequest,
    ViolationKind, ViolationLog,
};

#[test]
fn submission_request_uses_camel_case_and_wire_type_strings() {
    let log = ViolationLog::new();
    let sink = log.sink();
    sink.record(ViolationKind::NoFace, 4_000, None);
    sink.record(
        ViolationKind::SpeechDetected,
        9_000,
        Some(serde_json::json!({ "energy": 0.241 })),
    );

    let request = SubmissionRequest {
        answers: vec![
            AnswerEntry {
                question_index: 0,
                answer: "4".to_string(),
            },
            AnswerEntry {
                question_index: 1,
                answer: "6".to_string(),
            },
        ],
        audio_url: Some("https://cdn.example.test/audio/a.wav".to_string()),
        proctoring: ProctoringReport {
            started_at: 1_000,
            ended_at: 20_000,
            violations: log.snapshot(),
            totals: log.totals(),
            blocked_submission: false,
        },
    };

    let value = serde_json::to_value(&request).expect("serialize");
    assert_eq!(value["answers"][0]["questionIndex"], 0);
    assert_eq!(value["answers"][1]["answer"], "6");
    assert_eq!(value["audioUrl"], "https://cdn.example.test/audio/a.wav");
    assert_eq!(value["proctoring"]["startedAt"], 1_000);
    assert_eq!(value["proctoring"]["endedAt"], 20_000);
    assert_eq!(value["proctoring"]["blockedSubmission"], false);
    assert_eq!(value["proctoring"]["violations"][0]["type"], "no_face");
    assert_eq!(
        value["proctoring"]["violations"][1]["type"],
        "speech_detected"
    );
    assert_eq!(
        value["proctoring"]["violations"][1]["detail"]["energy"],
        0.241
    );
    assert_eq!(value["proctoring"]["totals"]["noFace"], 1);
    assert_eq!(value["proctoring"]["totals"]["multiFace"], 0);
    assert_eq!(value["proctoring"]["totals"]["speech"], 1);
    assert_eq!(value["proctoring"]["totals"]["tab"], 0);
}

#[test]
fn absent_audio_url_is_omitted_from_the_payload() {
    let request = SubmissionRequest {
        answers: vec![],
        audio_url: None,
        proctoring: ProctoringReport {
            started_at: 0,
            ended_at: 1,
            violations: vec![],
            totals: Default::default(),
            blocked_submission: false,
        },
    };
    let value = serde_json::to_value(&request).expect("serialize");
    assert!(value.get("audioUrl").is_none());
}

#[test]
fn exam_definition_round_trips_every_exam_type() {
    for (tag, expected) in [
        ("quiz", ExamType::Quiz),
        ("written", ExamType::Written),
        ("listening", ExamType::Listening),
    ] {
        let json = format!(
            r#"{{"examId": "exam:t", "type": "{}", "questions": []}}"#,
            tag
        );
        let exam: ExamDefinition = serde_json::from_str(&json).expect("parse");
        assert_eq!(exam.exam_type, expected);
        assert!(exam.passing_score.is_none());
    }
}

#[test]
fn submission_outcome_tolerates_acknowledgement_only_responses() {
    // Written/listening grading happens out-of-band; the response is a bare
    // acknowledgement.
    let outcome: SubmissionOutcome = serde_json::from_str(r#"{"success": true}"#).expect("parse");
    assert!(outcome.success);
    assert!(outcome.score.is_none());
    assert!(outcome.passed.is_none());

    let graded: SubmissionOutcome =
        serde_json::from_str(r#"{"success": true, "score": 85.0, "passed": true}"#).expect("parse");
    assert_eq!(graded.score, Some(85.0));
    assert_eq!(graded.passed, Some(true));
}

#[test]
fn wav_clips_carry_a_valid_riff_header() {
    let samples = vec![0.25f32; 1_600];
    let wav = encode_wav_pcm16(&samples, 16_000);
    assert_eq!(&wav[0..4], b"RIFF");
    assert_eq!(&wav[8..12], b"WAVE");
    let riff_len = u32::from_le_bytes(wav[4..8].try_into().unwrap());
    assert_eq!(riff_len as usize, wav.len() - 8);
    let data_len = u32::from_le_bytes(wav[40..44].try_into().unwrap());
    assert_eq!(data_len as usize, samples.len() * 2);
}
