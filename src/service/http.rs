//! HTTP exam service.
//!
//! Blocking ureq client against the documented endpoints:
//!
//! - `GET  {base}/api/exams/{examId}` -> exam definition
//! - `POST {base}/api/exams/{examId}/submit` -> submission outcome
//! - `POST {base}/api/exams/{examId}/audio` -> `{success, audioUrl}`
//!
//! The audio upload is multipart/form-data with a hand-framed boundary.
//! Transport and non-2xx failures surface as `ProctorError::Network` or
//! `::Upload` so the session controller can preserve state for retry.

use anyhow::{anyhow, Context, Result};
use rand::RngCore;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

use super::{ExamDefinition, ExamService, SubmissionOutcome, SubmissionRequest};
use crate::ProctorError;

pub struct HttpExamService {
    agent: ureq::Agent,
    base_url: String,
}

impl HttpExamService {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let parsed = Url::parse(base_url).context("parse exam service url")?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(anyhow!(
                "unsupported exam service scheme '{}'; expected http(s)",
                parsed.scheme()
            ));
        }
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(timeout)
            .timeout(timeout)
            .build();
        Ok(Self {
            agent,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn exam_url(&self, exam_id: &str, suffix: &str) -> String {
        format!("{}/api/exams/{}{}", self.base_url, exam_id, suffix)
    }
}

impl ExamService for HttpExamService {
    fn fetch_exam(&self, exam_id: &str) -> Result<ExamDefinition> {
        let url = self.exam_url(exam_id, "");
        let response = self.agent.get(&url).call().map_err(|e| ProctorError::Network {
            operation: "exam fetch",
            reason: e.to_string(),
        })?;
        let body = response.into_string().map_err(|e| ProctorError::Network {
            operation: "exam fetch",
            reason: e.to_string(),
        })?;
        serde_json::from_str(&body).context("parse exam definition")
    }

    fn submit_exam(&self, exam_id: &str, request: &SubmissionRequest) -> Result<SubmissionOutcome> {
        let url = self.exam_url(exam_id, "/submit");
        let payload = serde_json::to_string(request)?;
        let response = self
            .agent
            .post(&url)
            .set("Content-Type", "application/json")
            .send_string(&payload)
            .map_err(|e| ProctorError::Network {
                operation: "submission",
                reason: e.to_string(),
            })?;
        let body = response.into_string().map_err(|e| ProctorError::Network {
            operation: "submission",
            reason: e.to_string(),
        })?;
        serde_json::from_str(&body).context("parse submission outcome")
    }

    fn upload_audio(&self, exam_id: &str, wav_bytes: &[u8]) -> Result<String> {
        let url = self.exam_url(exam_id, "/audio");
        let boundary = random_boundary();
        let body = encode_multipart(&boundary, "audio", "answer.wav", "audio/wav", wav_bytes);
        let response = self
            .agent
            .post(&url)
            .set(
                "Content-Type",
                &format!("multipart/form-data; boundary={}", boundary),
            )
            .send_bytes(&body)
            .map_err(|e| ProctorError::Upload {
                reason: e.to_string(),
            })?;
        let body = response.into_string().map_err(|e| ProctorError::Upload {
            reason: e.to_string(),
        })?;
        let parsed: UploadResponse = serde_json::from_str(&body).context("parse upload response")?;
        if !parsed.success {
            return Err(ProctorError::Upload {
                reason: "service reported failure".to_string(),
            }
            .into());
        }
        parsed
            .audio_url
            .ok_or_else(|| anyhow!("upload response missing audioUrl"))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadResponse {
    success: bool,
    #[serde(default)]
    audio_url: Option<String>,
}

fn random_boundary() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    let mut boundary = String::from("----proctor-");
    for b in bytes {
        boundary.push_str(&format!("{:02x}", b));
    }
    boundary
}

/// Frame one file part as a multipart/form-data body.
fn encode_multipart(
    boundary: &str,
    field_name: &str,
    filename: &str,
    content_type: &str,
    bytes: &[u8],
) -> Vec<u8> {
    let mut body = Vec::with_capacity(bytes.len() + 256);
    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            field_name, filename
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_http_base_url() {
        assert!(HttpExamService::new("ftp://example.test", Duration::from_secs(5)).is_err());
        assert!(HttpExamService::new("http://example.test/", Duration::from_secs(5)).is_ok());
    }

    #[test]
    fn exam_urls_drop_trailing_slash() -> Result<()> {
        let service = HttpExamService::new("http://example.test/", Duration::from_secs(5))?;
        assert_eq!(
            service.exam_url("exam:a", "/submit"),
            "http://example.test/api/exams/exam:a/submit"
        );
        Ok(())
    }

    #[test]
    fn multipart_body_frames_one_file_part() {
        let body = encode_multipart("----b", "audio", "answer.wav", "audio/wav", b"RIFFdata");
        let text = String::from_utf8_lossy(&body);
        assert!(text.starts_with("------b\r\n"));
        assert!(text.contains("Content-Disposition: form-data; name=\"audio\"; filename=\"answer.wav\"\r\n"));
        assert!(text.contains("Content-Type: audio/wav\r\n\r\nRIFFdata\r\n"));
        assert!(text.ends_with("\r\n------b--\r\n"));
    }

    #[test]
    fn boundaries_are_unique() {
        assert_ne!(random_boundary(), random_boundary());
    }
}
