//! Requirements interview.
//!
//! The interview is template driven: the free-text idea is classified into a
//! domain by keyword, the domain's canned questions are asked one at a time, and
//! the answers are folded into a structured `Requirements` record by matching
//! each question against a handful of requirement categories.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Upper bound on questions per interview regardless of configuration.
pub const MAX_QUESTIONS: usize = 5;

/// Answers that leave a question unresolved.
const NON_COMMITTAL: &[&str] = &["?", "idk", "not sure", "tbd", "unknown", "skip"];

/// Words pulled out of the idea text for the analysis summary.
const TRACKED_KEYWORDS: &[&str] = &["scrape", "automate", "api", "dashboard", "bot"];

/// Problem domain detected from the idea text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    WebScraping,
    Automation,
    DataAnalysis,
    ApiIntegration,
    General,
}

impl Domain {
    /// Detection order; the first domain with a matching keyword wins.
    const DETECTION_ORDER: [Domain; 4] = [
        Domain::WebScraping,
        Domain::Automation,
        Domain::DataAnalysis,
        Domain::ApiIntegration,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Domain::WebScraping => "web_scraping",
            Domain::Automation => "automation",
            Domain::DataAnalysis => "data_analysis",
            Domain::ApiIntegration => "api_integration",
            Domain::General => "general",
        }
    }

    /// Human-readable name ("web scraping").
    pub fn label(self) -> String {
        self.as_str().replace('_', " ")
    }

    fn keywords(self) -> &'static [&'static str] {
        match self {
            Domain::WebScraping => &["scrape", "crawl", "extract", "spider"],
            Domain::Automation => &["automate", "bot", "cron", "schedule"],
            Domain::DataAnalysis => &["analyze", "dashboard", "visualize", "metrics"],
            Domain::ApiIntegration => &["api", "integrate", "webhook", "connect"],
            Domain::General => &[],
        }
    }

    pub fn questions(self) -> &'static [&'static str] {
        match self {
            Domain::WebScraping => &[
                "What specific data fields do you need extracted?",
                "Which websites or data sources should we target?",
                "How often should this scraper run? (once, daily, real-time)",
                "What format for output? (CSV, JSON, database, etc.)",
                "Any login/authentication required for the target sites?",
            ],
            Domain::Automation => &[
                "What triggers this automation? (schedule, event, manual)",
                "What are the input sources or data inputs?",
                "What actions should happen on success?",
                "What should happen on failure? (retry, alert, stop)",
                "Who or what receives the output or notification?",
            ],
            Domain::DataAnalysis => &[
                "What are the data sources?",
                "What metrics or calculations are needed?",
                "Any visualization requirements? (charts, dashboards)",
                "How often should analysis update?",
                "What export formats are needed? (PDF, Excel, etc.)",
            ],
            Domain::ApiIntegration => &[
                "Which external APIs or services to integrate?",
                "What authentication method? (API key, OAuth, etc.)",
                "What data to send/receive?",
                "Rate limits or quotas to respect?",
                "Error handling requirements?",
            ],
            Domain::General => &[
                "What problem does this solve?",
                "Who is the primary user?",
                "What are the 3 most important features?",
                "Any hard constraints? (time, budget, tech stack)",
                "How will you know this is successful?",
            ],
        }
    }

    pub fn detect(idea: &str) -> Domain {
        let lower = idea.to_lowercase();
        Self::DETECTION_ORDER
            .into_iter()
            .find(|d| d.keywords().iter().any(|k| lower.contains(k)))
            .unwrap_or(Domain::General)
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rough size of the idea, judged by description length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Simple,
    Medium,
    Complex,
}

impl Complexity {
    pub fn from_word_count(words: usize) -> Self {
        match words {
            0..20 => Complexity::Simple,
            20..50 => Complexity::Medium,
            _ => Complexity::Complex,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Complexity::Simple => "simple",
            Complexity::Medium => "medium",
            Complexity::Complex => "complex",
        }
    }
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdeaAnalysis {
    pub domain: Domain,
    pub complexity: Complexity,
    pub keywords: Vec<String>,
    pub inferred_intent: String,
}

/// One answered interview question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaPair {
    pub question: String,
    pub answer: String,
    pub timestamp: DateTime<Utc>,
}

impl QaPair {
    pub fn new(question: &str, answer: &str) -> Self {
        Self {
            question: question.to_string(),
            answer: answer.to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// Requirement categories filled from the answers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementFields {
    pub data_fields: Vec<String>,
    pub sources: Vec<String>,
    pub output_format: String,
    pub frequency: String,
    pub constraints: Vec<String>,
}

/// Structured outcome of an interview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirements {
    pub original_idea: String,
    pub domain: Domain,
    pub complexity: Complexity,
    pub requirements: RequirementFields,
    /// Questions whose answers did not settle anything.
    pub open_questions: Vec<String>,
}

enum Category {
    DataFields,
    Sources,
    OutputFormat,
    Frequency,
    Constraints,
}

fn categorize(question: &str) -> Option<Category> {
    let q = question.to_lowercase();
    if q.contains("fields") {
        Some(Category::DataFields)
    } else if q.contains("websites") || q.contains("sources") {
        Some(Category::Sources)
    } else if q.contains("format") {
        Some(Category::OutputFormat)
    } else if q.contains("often") || q.contains("frequency") {
        Some(Category::Frequency)
    } else if q.contains("constraint") {
        Some(Category::Constraints)
    } else {
        None
    }
}

fn split_list(answer: &str) -> Vec<String> {
    answer
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn is_non_committal(answer: &str) -> bool {
    let a = answer.trim().to_lowercase();
    a.is_empty() || NON_COMMITTAL.contains(&a.as_str())
}

pub fn analyze_idea(idea: &str) -> IdeaAnalysis {
    let lower = idea.to_lowercase();
    let domain = Domain::detect(idea);
    IdeaAnalysis {
        domain,
        complexity: Complexity::from_word_count(lower.split_whitespace().count()),
        keywords: TRACKED_KEYWORDS
            .iter()
            .filter(|k| lower.contains(*k))
            .map(|k| k.to_string())
            .collect(),
        inferred_intent: format!("Build a {} tool", domain.label()),
    }
}

/// Questions for the idea's domain, at most `min(max, MAX_QUESTIONS)`.
pub fn generate_questions(idea: &str, max: usize) -> Vec<String> {
    Domain::detect(idea)
        .questions()
        .iter()
        .take(max.min(MAX_QUESTIONS))
        .map(|q| q.to_string())
        .collect()
}

/// Fold answered questions into a `Requirements` record.
pub fn summarize_requirements(idea: &str, qa_pairs: &[QaPair]) -> Requirements {
    let analysis = analyze_idea(idea);
    let mut fields = RequirementFields::default();
    let mut open_questions = Vec::new();

    for pair in qa_pairs {
        if is_non_committal(&pair.answer) {
            open_questions.push(pair.question.clone());
            continue;
        }
        let answer = pair.answer.trim();
        match categorize(&pair.question) {
            Some(Category::DataFields) => fields.data_fields = split_list(answer),
            Some(Category::Sources) => fields.sources = split_list(answer),
            Some(Category::OutputFormat) => fields.output_format = answer.to_string(),
            Some(Category::Frequency) => fields.frequency = answer.to_string(),
            Some(Category::Constraints) => fields.constraints.push(answer.to_string()),
            None => {}
        }
    }

    Requirements {
        original_idea: idea.to_string(),
        domain: analysis.domain,
        complexity: analysis.complexity,
        requirements: fields,
        open_questions,
    }
}
