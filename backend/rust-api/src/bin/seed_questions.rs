//! Loads the bundled sample question bank. Questions whose (topic, title)
//! already exist are skipped, so the binary can be re-run safely.

use anyhow::Context;
use std::collections::HashSet;
use tracing_subscriber::fmt::init;
use validator::Validate;

use adaptive_quiz_api::{
    config::Config,
    models::question::CreateQuestionRequest,
    services::{question_service::QuestionService, AppState},
    storage::QuestionFilter,
};

const SEED_QUESTIONS: &str = include_str!("../../seed/questions.json");

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init();

    let config = Config::load().context("Failed to load configuration")?;
    let state = AppState::new(config)
        .await
        .context("Failed to initialize app state")?;

    let requests: Vec<CreateQuestionRequest> =
        serde_json::from_str(SEED_QUESTIONS).context("Invalid seed/questions.json")?;

    let total = state
        .store
        .count_questions(&QuestionFilter::default())
        .await?;
    let existing: HashSet<(String, String)> = state
        .store
        .list_questions(&QuestionFilter::default(), 0, total.max(1) as i64)
        .await?
        .into_iter()
        .map(|q| (q.topic, q.title))
        .collect();

    let service = QuestionService::new(state.store.clone());
    let (mut created, mut skipped) = (0, 0);
    for req in requests {
        if existing.contains(&(req.topic.clone(), req.title.clone())) {
            skipped += 1;
            continue;
        }
        req.validate()
            .with_context(|| format!("Seed question '{}' is invalid", req.title))?;
        service.create(req).await?;
        created += 1;
    }

    tracing::info!(created, skipped, "Question bank seeded");
    println!("Seeded {} questions ({} already present)", created, skipped);
    Ok(())
}
