//! Implementation plan generation.
//!
//! Plans are markdown documents rendered from a per-domain template and the
//! interview's `Requirements`. Revisions append the operator's feedback rather
//! than regenerating the document.

use crate::interview::{Complexity, Domain, Requirements};
use crate::money::Usd;

/// Flat per-iteration rate used for plan cost estimates.
pub const COST_PER_ITERATION: Usd = Usd::cents(50);

/// Estimates attached to a rendered plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanEstimate {
    pub iterations: u32,
    pub risk: &'static str,
    pub cost: Usd,
}

/// A rendered plan and its estimates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub markdown: String,
    pub estimate: PlanEstimate,
}

pub fn estimate_iterations(complexity: Complexity) -> u32 {
    match complexity {
        Complexity::Simple => 5,
        Complexity::Medium => 7,
        Complexity::Complex => 10,
    }
}

/// More than two unresolved questions make a plan "medium" risk.
pub fn assess_risk(requirements: &Requirements) -> &'static str {
    if requirements.open_questions.len() > 2 {
        "medium"
    } else {
        "low"
    }
}

pub fn estimate_cost(iterations: u32) -> Usd {
    COST_PER_ITERATION.times(iterations)
}

struct PlanContext<'a> {
    project_name: &'a str,
    data_fields: String,
    sources: String,
    output_format: &'a str,
    frequency: &'a str,
    constraints: String,
    description: String,
    complexity: Complexity,
    estimate: &'a PlanEstimate,
}

fn or_tbd(items: &[String]) -> String {
    if items.is_empty() {
        "TBD".to_string()
    } else {
        items.join(", ")
    }
}

fn or_default<'a>(value: &'a str, default: &'a str) -> &'a str {
    if value.trim().is_empty() { default } else { value }
}

fn body(domain: Domain, ctx: &PlanContext<'_>) -> String {
    match domain {
        Domain::WebScraping => format!(
            r#"## Overview
Build a web scraper that extracts {fields} from {sources}.

## Architecture
- **Language**: Python 3.12
- **Libraries**: requests, BeautifulSoup4, pandas
- **Pattern**: Modular scraper with retry logic
- **Schedule**: {frequency}

## Files to Create
1. `src/scraper.py` - Main scraping logic with error handling
2. `src/parser.py` - HTML parsing and data extraction
3. `src/exporter.py` - Output formatting ({format})
4. `src/config.py` - Settings and configuration
5. `tests/test_scraper.py` - Unit tests
6. `README.md` - Usage instructions

## Implementation Order (Iterations)
1. **Scaffold** - Project structure, config
2. **HTTP Client** - Requests with retries, headers
3. **HTML Parsing** - Extract {fields}
4. **Data Export** - Save to {format}
5. **Error Handling** - Robust failure recovery
6. **Testing** - Unit tests, validation
"#,
            fields = ctx.data_fields,
            sources = ctx.sources,
            format = ctx.output_format,
            frequency = ctx.frequency,
        ),
        Domain::Automation => format!(
            r#"## Overview
Build an automation: {description}.

## Architecture
- **Trigger**: manual
- **Inputs**: {sources}
- **Schedule**: {frequency}

## Files to Create
1. `src/main.py` - Entry point and orchestration
2. `src/trigger.py` - Event detection/scheduler
3. `src/actions.py` - Action handlers
4. `src/notifier.py` - Notifications/alerts
5. `tests/test_automation.py` - Integration tests
6. `README.md` - Setup and usage

## Implementation Order (Iterations)
1. **Scaffold** - Structure, logging
2. **Trigger** - Event detection
3. **Actions** - Core automation logic
4. **Notifier** - Alerts and status
5. **Error Handling** - Failures and retries
6. **Testing** - Validation
"#,
            description = ctx.description,
            sources = ctx.sources,
            frequency = ctx.frequency,
        ),
        Domain::DataAnalysis => format!(
            r#"## Overview
Build an analysis pipeline over {sources}.

## Architecture
- **Language**: Python 3.12
- **Libraries**: pandas, matplotlib
- **Refresh**: {frequency}
- **Export**: {format}

## Files to Create
1. `src/loader.py` - Data source loading
2. `src/metrics.py` - Calculations
3. `src/report.py` - Charts and export ({format})
4. `tests/test_metrics.py` - Unit tests
5. `README.md` - Usage instructions

## Implementation Order (Iterations)
1. **Scaffold** - Project structure
2. **Loading** - Read {sources}
3. **Metrics** - Core calculations
4. **Reporting** - Charts and {format} export
5. **Testing** - Validation
"#,
            sources = ctx.sources,
            frequency = ctx.frequency,
            format = ctx.output_format,
        ),
        Domain::ApiIntegration => format!(
            r#"## Overview
Build an integration with {sources}.

## Architecture
- **Language**: Python 3.12
- **Libraries**: httpx, pydantic
- **Payloads**: {fields}
- **Sync**: {frequency}

## Files to Create
1. `src/client.py` - API client with auth and retries
2. `src/models.py` - Request/response models
3. `src/sync.py` - Data exchange logic
4. `tests/test_client.py` - Unit tests with recorded responses
5. `README.md` - Setup and credentials

## Implementation Order (Iterations)
1. **Scaffold** - Project structure, config
2. **Client** - Authentication and requests
3. **Models** - Payload validation
4. **Sync** - Send/receive logic
5. **Error Handling** - Rate limits and failures
6. **Testing** - Validation
"#,
            sources = ctx.sources,
            fields = ctx.data_fields,
            frequency = ctx.frequency,
        ),
        Domain::General => format!(
            r#"## Overview
Build a tool that solves: {description}

## Architecture
- **Type**: Python CLI application
- **Pattern**: Modular design with clear separation

## Files to Create
1. `src/main.py` - Entry point
2. `src/core.py` - Core logic
3. `src/utils.py` - Helper functions
4. `tests/test_core.py` - Unit tests
5. `README.md` - Documentation

## Implementation Order (Iterations)
1. **Scaffold** - Project structure
2. **Core Logic** - Main functionality
3. **Utilities** - Helper functions
4. **Error Handling** - Robustness
5. **Testing** - Validation
6. **Documentation** - README
"#,
            description = ctx.description,
        ),
    }
}

fn success_criteria(domain: Domain, ctx: &PlanContext<'_>) -> String {
    match domain {
        Domain::WebScraping => format!(
            "\n## Success Criteria\n- [ ] Successfully scrapes all {}\n- [ ] Outputs valid {}\n- [ ] Handles errors gracefully\n- [ ] Tests pass\n",
            ctx.sources, ctx.output_format
        ),
        _ => "\n## Success Criteria\n- [ ] Core workflow runs end to end\n- [ ] Handles errors gracefully\n- [ ] Tests pass\n".to_string(),
    }
}

/// Render the plan for `requirements` under `project_name`.
pub fn create_plan(requirements: &Requirements, project_name: &str) -> Plan {
    let iterations = estimate_iterations(requirements.complexity);
    let estimate = PlanEstimate {
        iterations,
        risk: assess_risk(requirements),
        cost: estimate_cost(iterations),
    };
    let fields = &requirements.requirements;
    let constraints = if fields.constraints.is_empty() {
        "- None".to_string()
    } else {
        fields
            .constraints
            .iter()
            .map(|c| format!("- {}", c))
            .collect::<Vec<_>>()
            .join("\n")
    };
    let description = if requirements.original_idea.trim().is_empty() {
        format!("Build a {} tool", requirements.domain.label())
    } else {
        requirements.original_idea.trim().to_string()
    };
    let ctx = PlanContext {
        project_name,
        data_fields: or_tbd(&fields.data_fields),
        sources: or_tbd(&fields.sources),
        output_format: or_default(&fields.output_format, "JSON"),
        frequency: or_default(&fields.frequency, "on-demand"),
        constraints,
        description,
        complexity: requirements.complexity,
        estimate: &estimate,
    };

    let markdown = format!(
        "# Implementation Plan: {name}\n\n{body}\n## Estimated Metrics\n\
         - **Iterations**: {iterations}\n\
         - **Complexity**: {complexity}\n\
         - **Risk Level**: {risk}\n\
         - **Estimated Cost**: {cost}\n\n\
         ## Constraints\n{constraints}\n{criteria}",
        name = ctx.project_name,
        body = body(requirements.domain, &ctx),
        iterations = ctx.estimate.iterations,
        complexity = ctx.complexity,
        risk = ctx.estimate.risk,
        cost = ctx.estimate.cost,
        constraints = ctx.constraints,
        criteria = success_criteria(requirements.domain, &ctx),
    );

    Plan { markdown, estimate }
}

/// Append the operator's feedback as a revision section.
pub fn revise_plan(plan: &str, feedback: &str) -> String {
    let feedback = if feedback.trim().is_empty() {
        "(no details given)"
    } else {
        feedback.trim()
    };
    format!(
        "{}\n\n## Revision Notes\nUser feedback: {}\n\nChanges applied: Added to constraints section.\n",
        plan.trim_end(),
        feedback
    )
}
