//! Generate and stream text with Workers AI
//!
//! Reads `CLOUDFLARE_ACCOUNT_ID` and `CLOUDFLARE_API_KEY` from the environment.
//!
//! Run with: cargo run --example generate_text -- "Tell me a joke about Rust"

use futures::StreamExt;
use std::io::Write;
use workers_ai_core::{CallOptions, LanguageModel, Message, StreamPart, WorkersAi};

const MODEL: &str = "@cf/meta/llama-3.1-8b-instruct";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let question = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "Write a haiku about the borrow checker".to_string());

    let provider = WorkersAi::from_env()?;
    let model = provider.model(MODEL, None)?;

    println!("Generating with {}...\n", model.model_id());
    let result = model
        .generate(question.as_str().into(), CallOptions::new().with_max_tokens(256))
        .await?;
    println!("{}\n", result.text);
    println!(
        "finish: {:?}, tokens: {} in / {} out\n",
        result.finish_reason, result.usage.prompt_tokens, result.usage.completion_tokens
    );

    println!("Streaming...\n");
    let prompt = vec![
        Message::system("You answer in one short paragraph."),
        Message::user(question),
    ];
    let mut stream = model.stream(prompt.into(), CallOptions::default()).await?;
    while let Some(part) = stream.next().await {
        match part? {
            StreamPart::TextDelta(text) => {
                print!("{}", text);
                std::io::stdout().flush()?;
            }
            StreamPart::Finish(result) => {
                println!("\n\nfinish: {:?}", result.finish_reason);
            }
            _ => {}
        }
    }

    Ok(())
}
