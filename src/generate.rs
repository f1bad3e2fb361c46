//! Generation-step orchestration.
//!
//! Renders the fixed instruction template around a serialized evidence
//! package and submits it to the text-generation backend. Endpoint, model,
//! and sampling parameters are fixed configuration, not per-request. The
//! evidence is submitted as-is: no input-side truncation for the backend's
//! context window is attempted.

use anyhow::{Context, Result};
use std::time::Duration;

use crate::config::GenerationConfig;
use crate::models::EvidencePackage;

/// Returned in place of a document when the backend cannot be reached.
/// The caller treats this as a successful (if unhelpful) document, so the
/// job still completes as DONE.
pub const BACKEND_UNAVAILABLE_FALLBACK: &str =
    "Error: could not reach the text-generation backend. Make sure it is running.";

const SYSTEM_PROMPT: &str = "\
You are an expert Senior Software Architect and Technical Writer.
Your task is to analyze the provided \"Evidence Package\" of a software repository and generate comprehensive Technical Documentation.
You MUST output the result in strict Markdown format.
Do NOT invent features that are not present. If you are unsure, state that it is \"inferred\" or \"not found\".
Use a professional, technical tone.";

const PROMPT_TEMPLATE: &str = r#"Here is the Evidence Package for the repository:
{evidence_json}

Please generate the following documentation:

# 1. Functional Requirements
List the main features and functionalities based on the README and code structure.

# 2. Non-Functional Requirements
Infer security, performance, scalability, and observability requirements based on the libraries and configurations found.

# 3. Architecture (C4 & Principles)
- Describe the likely Architecture (MVC, Layered, Microservices).
- Provide a Mermaid.js C4 Context diagram in a code block marked with `mermaid`.
  Example:
  ```mermaid
  C4Context
    title System Context diagram for System
    ...
  ```
- Provide a Mermaid.js C4 Container diagram in a code block marked with `mermaid`.

# 4. Stack & Technologies
List languages, frameworks, databases, and build tools detected.

# 5. Project Summary
A brief executive summary of what the project does.
"#;

/// Render the full instruction text for one evidence package.
pub fn render_prompt(evidence: &EvidencePackage) -> Result<String> {
    let evidence_json =
        serde_json::to_string_pretty(evidence).context("Failed to serialize evidence package")?;
    Ok(PROMPT_TEMPLATE.replace("{evidence_json}", &evidence_json))
}

/// Submit the evidence to the generation backend and return the document
/// markdown.
///
/// Failure handling is split: a transport failure (backend unreachable)
/// degrades to [`BACKEND_UNAVAILABLE_FALLBACK`], while a non-success HTTP
/// status propagates as an error and fails the job.
pub async fn generate_document(
    generation: &GenerationConfig,
    evidence: &EvidencePackage,
) -> Result<String> {
    let prompt = render_prompt(evidence)?;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(generation.timeout_secs))
        .build()?;

    let body = serde_json::json!({
        "model": generation.model,
        "prompt": prompt,
        "system": SYSTEM_PROMPT,
        "stream": false,
        "options": {
            "temperature": generation.temperature,
            "top_p": generation.top_p,
            "num_predict": generation.max_output_tokens,
        }
    });

    let response = match client.post(&generation.endpoint).json(&body).send().await {
        Ok(r) => r,
        Err(e) => {
            eprintln!("generation backend unreachable: {}", e);
            return Ok(BACKEND_UNAVAILABLE_FALLBACK.to_string());
        }
    };

    let response = response
        .error_for_status()
        .context("Generation backend returned an error status")?;

    let json: serde_json::Value = response
        .json()
        .await
        .context("Invalid generation backend response")?;

    Ok(json
        .get("response")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RepoStats;
    use std::collections::BTreeMap;

    fn sample_evidence() -> EvidencePackage {
        let mut files_content = BTreeMap::new();
        files_content.insert("README.md".to_string(), "# Sample".to_string());
        EvidencePackage {
            structure: vec!["README.md".to_string(), "src/main.rs".to_string()],
            stats: RepoStats {
                files: 2,
                extensions: BTreeMap::from([(".rs".to_string(), 1), (".md".to_string(), 1)]),
            },
            files_content,
        }
    }

    #[test]
    fn test_prompt_contains_all_sections() {
        let prompt = render_prompt(&sample_evidence()).unwrap();

        assert!(prompt.contains("# 1. Functional Requirements"));
        assert!(prompt.contains("# 2. Non-Functional Requirements"));
        assert!(prompt.contains("# 3. Architecture (C4 & Principles)"));
        assert!(prompt.contains("# 4. Stack & Technologies"));
        assert!(prompt.contains("# 5. Project Summary"));
        assert!(prompt.contains("```mermaid"));
    }

    #[test]
    fn test_prompt_embeds_evidence_json() {
        let prompt = render_prompt(&sample_evidence()).unwrap();

        assert!(prompt.contains("\"src/main.rs\""));
        assert!(prompt.contains("\"files\": 2"));
        assert!(!prompt.contains("{evidence_json}"));
    }

    #[test]
    fn test_system_prompt_forbids_invention() {
        assert!(SYSTEM_PROMPT.contains("Do NOT invent features"));
        assert!(SYSTEM_PROMPT.contains("inferred"));
    }

    #[tokio::test]
    async fn test_unreachable_backend_falls_back() {
        let generation = GenerationConfig {
            // Nothing listens here; the connection is refused immediately.
            endpoint: "http://127.0.0.1:9/api/generate".to_string(),
            timeout_secs: 5,
            ..GenerationConfig::default()
        };

        let doc = generate_document(&generation, &sample_evidence())
            .await
            .unwrap();

        assert_eq!(doc, BACKEND_UNAVAILABLE_FALLBACK);
    }
}
