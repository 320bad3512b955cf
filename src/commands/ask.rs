use colored::Colorize;

use qna::error::Result;
use qna::service::NO_ANSWER;
use qna::Config;

use super::{current_thread_runtime, open_service};

pub fn cmd_ask(config: &Config, question: &str, top: usize) -> Result<()> {
    let service = open_service(config, false)?;
    let rt = current_thread_runtime()?;

    if top <= 1 {
        let response = rt.block_on(service.ask(question))?;
        println!("{}", response.answer);
        return Ok(());
    }

    let ranked = rt.block_on(service.ask_ranked(question, top))?;
    if ranked.is_empty() {
        println!("{}", NO_ANSWER);
        return Ok(());
    }

    println!("{} Closest matches for '{}':\n", "Ask".green().bold(), question);
    for answer in ranked {
        println!("  {} ({:.1}%)", ">".green(), answer.score * 100.0);
        println!("    {}\n", truncate_text(&answer.text, 150));
    }
    Ok(())
}

fn truncate_text(text: &str, max_len: usize) -> String {
    let cleaned = text.replace('\n', " ").trim().to_string();
    if cleaned.chars().count() <= max_len {
        cleaned
    } else {
        let head: String = cleaned.chars().take(max_len - 3).collect();
        format!("{}...", head)
    }
}
