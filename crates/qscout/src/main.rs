use std::path::Path;
use std::sync::Arc;

use anyhow::Context;

use qscout_core::{config::Config, session::SolverSession};
use qscout_quizit::QuizitClient;
use qscout_replay::ReplayDocument;

mod display;

use display::ConsoleDisplay;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    qscout_core::logging::init("qscout")?;

    let mut args = std::env::args().skip(1);
    let Some(capture_path) = args.next() else {
        eprintln!("usage: qscout <capture.json> [room-code]");
        std::process::exit(2);
    };
    let manual_code = args.next();

    let cfg = Arc::new(Config::load()?);
    let settle = cfg.settle_delay;

    let doc = Arc::new(
        ReplayDocument::from_file(Path::new(&capture_path))
            .await
            .with_context(|| format!("loading capture {capture_path}"))?,
    );
    let display = Arc::new(ConsoleDisplay::new());
    let fetcher = Arc::new(QuizitClient::from_config(&cfg));

    let session = Arc::new(SolverSession::new(
        cfg,
        doc.clone(),
        display,
        fetcher,
    ));

    match manual_code {
        // Manual entry path: same fetch-then-watch sequence, no scanning.
        Some(code) => {
            if !session.load_answers(&code).await? {
                std::process::exit(1);
            }
        }
        None => session.start().await?,
    }

    doc.start();
    doc.finished().await;

    // Let the final settle tick read the last question before shutdown.
    tokio::time::sleep(settle * 2).await;
    session.stop().await;

    Ok(())
}
