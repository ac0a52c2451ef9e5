//! Small helper commands — `ralph questions`, `ralph parse` and `ralph notify`.

use anyhow::{Result, bail};
use console::style;

use ralph::bridge::{CommunicationBridge, parse_command};
use ralph::config::Config;
use ralph::interview::{MAX_QUESTIONS, analyze_idea, generate_questions};
use ralph::ui::icons::{CHAT, CHECK};

pub fn cmd_questions(idea: &str, max: Option<usize>) -> Result<()> {
    let analysis = analyze_idea(idea);
    let questions = generate_questions(idea, max.unwrap_or(MAX_QUESTIONS));

    println!();
    println!("Domain:      {}", style(analysis.domain.label()).bold());
    println!("Complexity:  {}", analysis.complexity);
    if !analysis.keywords.is_empty() {
        println!("Keywords:    {}", analysis.keywords.join(", "));
    }
    println!("Intent:      {}", analysis.inferred_intent);
    println!();
    for (i, question) in questions.iter().enumerate() {
        println!("  {}. {}", i + 1, question);
    }
    println!();
    Ok(())
}

pub fn cmd_parse(text: &str, json: bool) -> Result<()> {
    let command = parse_command(text);
    if json {
        println!("{}", serde_json::to_string(&command)?);
    } else {
        println!("{}", command);
    }
    Ok(())
}

pub async fn cmd_notify(config: &Config, text: &str) -> Result<()> {
    let bridge = CommunicationBridge::from_config(config)?;
    if !bridge.send_message(text).await {
        bail!("Failed to deliver message to chat {}", bridge.chat_id());
    }
    println!("{}{}Message sent", CHECK, CHAT);
    Ok(())
}
