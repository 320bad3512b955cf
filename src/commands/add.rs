use colored::Colorize;

use qna::error::Result;
use qna::Config;

use super::{current_thread_runtime, open_service};

pub fn cmd_add(config: &Config, text: &str) -> Result<()> {
    let service = open_service(config, false)?;
    let rt = current_thread_runtime()?;

    let response = rt.block_on(service.add_text(text))?;
    println!("{} {}", "Added".green().bold(), response.message);
    Ok(())
}
