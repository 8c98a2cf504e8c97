//! proctord - proctored-exam session demo daemon
//!
//! Runs one synthetic exam attempt end-to-end:
//! 1. Loads configuration (file + env overrides)
//! 2. Fetches the exam from the configured service, or seeds an in-memory one
//! 3. Acquires camera and microphone grants and starts the three monitors
//! 4. Answers every question, then holds the session open for the run window
//! 5. Submits, unless interrupted: Ctrl-C exercises the cancel path

use anyhow::Result;
use clap::Parser;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use exam_proctor::{
    detect, ExamDefinition, ExamService, ExamSession, ExamType, HttpExamService, MockExamService,
    ProctorConfig, ProctorError, Question, SystemClock,
};

#[derive(Parser, Debug)]
#[command(name = "proctord", about = "Run one proctored exam attempt")]
struct Args {
    /// Exam identifier to open.
    #[arg(long, default_value = "exam:demo")]
    exam_id: String,

    /// Seconds to hold the session open before submitting.
    #[arg(long, default_value_t = 15)]
    run_secs: u64,

    /// Simulate the tab going hidden partway through the run.
    #[arg(long)]
    simulate_blur: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let cfg = ProctorConfig::load()?;

    let service: Arc<dyn ExamService> = match &cfg.service_url {
        Some(url) => {
            log::info!("using exam service at {}", url);
            Arc::new(HttpExamService::new(url, cfg.request_timeout)?)
        }
        None => {
            log::info!("no service configured; seeding in-memory exam {}", args.exam_id);
            let mock = MockExamService::new();
            mock.insert_exam(demo_exam(&args.exam_id));
            Arc::new(mock)
        }
    };

    let detector = detect::detector_from_spec(&cfg.detector)?;
    let mut session = ExamSession::new(
        args.exam_id.clone(),
        cfg.devices(),
        service,
        detector,
        Arc::new(SystemClock),
    );

    let interrupted = Arc::new(AtomicBool::new(false));
    let interrupted_handler = interrupted.clone();
    ctrlc::set_handler(move || {
        interrupted_handler.store(true, Ordering::SeqCst);
    })?;

    session.open_exam()?;
    let exam_questions = session
        .exam()
        .map(|exam| exam.questions.clone())
        .unwrap_or_default();
    log::info!(
        "exam {} open: {} questions, camera={} microphone={} detector={}",
        args.exam_id,
        exam_questions.len(),
        cfg.camera,
        cfg.microphone,
        cfg.detector
    );

    for (index, question) in exam_questions.iter().enumerate() {
        let answer = question
            .options
            .as_ref()
            .and_then(|options| options.first().cloned())
            .unwrap_or_else(|| "synthetic answer".to_string());
        session.record_answer(index as u32, answer)?;
    }

    let visibility = session.visibility_signal();
    let started = Instant::now();
    let mut last_health_log = Instant::now();
    let mut blurred = false;

    while started.elapsed() < Duration::from_secs(args.run_secs) {
        if interrupted.load(Ordering::SeqCst) {
            log::warn!("interrupted; cancelling session");
            session.cancel();
            return Ok(());
        }

        if args.simulate_blur && !blurred && started.elapsed() >= Duration::from_secs(2) {
            if let Some(signal) = &visibility {
                log::info!("simulating tab blur");
                signal.hidden();
                blurred = true;
            }
        }

        if last_health_log.elapsed() >= Duration::from_secs(5) {
            if let Some(context) = session.proctoring() {
                let media = context.media();
                let frames = media
                    .video()
                    .lock()
                    .map(|v| v.frames_captured())
                    .unwrap_or(0);
                let chunks = media
                    .audio()
                    .lock()
                    .map(|a| a.chunks_captured())
                    .unwrap_or(0);
                log::info!(
                    "health: violations={} frames={} chunks={}",
                    context.log().count(),
                    frames,
                    chunks
                );
            }
            last_health_log = Instant::now();
        }

        std::thread::sleep(Duration::from_millis(100));
    }

    match session.submit() {
        Ok(outcome) => {
            log::info!(
                "submitted: success={} score={:?} passed={:?}",
                outcome.success,
                outcome.score,
                outcome.passed
            );
        }
        Err(e) => {
            if let Some(ProctorError::SubmissionBlocked { violations }) =
                e.downcast_ref::<ProctorError>()
            {
                log::error!("submission blocked: {} violations", violations);
                session.cancel();
            } else {
                log::error!("submission failed: {}", e);
                session.cancel();
            }
        }
    }

    Ok(())
}

fn demo_exam(exam_id: &str) -> ExamDefinition {
    ExamDefinition {
        exam_id: exam_id.to_string(),
        exam_type: ExamType::Quiz,
        passing_score: Some(70),
        questions: vec![
            Question {
                question: "Which keyword declares an immutable binding?".to_string(),
                options: Some(vec!["let".to_string(), "mut".to_string()]),
                answer: Some("let".to_string()),
            },
            Question {
                question: "Which trait powers the ? operator?".to_string(),
                options: Some(vec!["From".to_string(), "Into".to_string()]),
                answer: Some("From".to_string()),
            },
        ],
    }
}
