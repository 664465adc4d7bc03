//! Trial Data Analysis Agent
//!
//! Analyzes an uploaded clinical trial CSV with a code-interpreter agent.
//! The file is profiled locally first; the profile and a preview of the rows
//! go into the prompt, and the profile fills whatever the agent leaves out.

use super::{source_of, structured_reply, AgentContext, ResultSource};
use crate::analysis::trial_data::profile_csv;
use crate::analysis::TrialDataProfile;
use crate::llm::{AgentSpec, ToolSet};
use crate::types::AppResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, info_span, Instrument};

pub const TAG: &str = "data-analysis";

/// Data rows included verbatim in the prompt.
const PREVIEW_ROWS: usize = 50;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataFindings {
    #[serde(default)]
    pub correlations: BTreeMap<String, f64>,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialDataAnalysis {
    pub filename: String,
    pub analysis: DataFindings,
    pub profile: TrialDataProfile,
    pub agent_id: String,
    pub source: ResultSource,
}

#[derive(Debug, Deserialize)]
struct DataAnalysisReply {
    analysis: DataFindings,
}

pub struct TrialDataAgent;

impl TrialDataAgent {
    fn spec(ctx: &AgentContext) -> AgentSpec {
        AgentSpec::new(
            TAG,
            &ctx.model,
            "You are a clinical trial data analysis agent. Analyze trial datasets for \
             efficacy, safety profiles and patient outcomes. Use the code interpreter to \
             compute statistics and describe any visualizations you would produce. Always \
             answer with the JSON object the user asks for.",
        )
        .with_tools(ToolSet::default().with_code_interpreter())
    }

    fn create_prompt(filename: &str, csv: &str, profile: &TrialDataProfile) -> String {
        let preview: Vec<&str> = csv.lines().take(PREVIEW_ROWS + 1).collect();
        let stats = serde_json::to_string(&profile.descriptive_stats).unwrap_or_default();
        format!(
            r#"Analyze the clinical trial data in {filename}.

Rows: {rows}
Columns: {columns}
Descriptive statistics: {stats}

Data (first {shown} of {rows} rows):
```csv
{preview}
```

Provide summary statistics, identify trends and patterns, and give recommendations.

OUTPUT FORMAT (respond with ONLY valid JSON):
{{
  "filename": "{filename}",
  "analysis": {{
    "correlations": {{"<column>_<column>": 0.0}},
    "summary": "Key findings",
    "recommendations": ["..."]
  }}
}}"#,
            filename = filename,
            rows = profile.row_count,
            columns = profile.columns.join(", "),
            stats = stats,
            shown = preview.len().saturating_sub(1),
            preview = preview.join("\n"),
        )
    }

    /// Fails with `InvalidRequest` before contacting the agent when `csv`
    /// cannot be profiled.
    pub async fn analyze(ctx: &AgentContext, filename: &str, csv: &str) -> AppResult<TrialDataAnalysis> {
        let span = info_span!("trial_data_analysis", filename = %filename);
        async {
            let profile = profile_csv(csv.as_bytes())?;
            info!(rows = profile.row_count, columns = profile.columns.len(), "Profiled trial data");

            let message = ctx
                .ask(TAG, || Self::spec(ctx), &Self::create_prompt(filename, csv, &profile))
                .await?;
            let parsed: Option<DataAnalysisReply> = structured_reply(TAG, &message.text);
            let source = source_of(&parsed);

            let analysis = match parsed {
                Some(DataAnalysisReply { analysis }) => DataFindings {
                    correlations: if analysis.correlations.is_empty() {
                        profile.correlations.clone()
                    } else {
                        analysis.correlations
                    },
                    summary: if analysis.summary.is_empty() {
                        profile.summary()
                    } else {
                        analysis.summary
                    },
                    recommendations: if analysis.recommendations.is_empty() {
                        profile.recommendations()
                    } else {
                        analysis.recommendations
                    },
                },
                None => DataFindings {
                    correlations: profile.correlations.clone(),
                    summary: profile.summary(),
                    recommendations: profile.recommendations(),
                },
            };

            info!(source = ?source, correlations = analysis.correlations.len(), "Trial data analysis complete");
            Ok(TrialDataAnalysis {
                filename: filename.to_string(),
                analysis,
                profile,
                agent_id: message.agent_id,
                source,
            })
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fixed_scoring_suite, ScriptedAgentService};
    use crate::types::AppError;
    use std::sync::Arc;

    const CSV: &str = "age,dose_mg,response\n34,0,0.10\n45,10,0.35\n52,20,0.55\n61,30,0.80\n";

    fn context(service: Arc<ScriptedAgentService>) -> AgentContext {
        AgentContext::new(service, "gpt-4o").with_scoring(fixed_scoring_suite())
    }

    #[tokio::test]
    async fn test_agent_findings_win_and_gaps_are_filled() {
        let service = Arc::new(ScriptedAgentService::new(|_, _| {
            Ok(r#"{"filename": "trial.csv", "analysis": {"correlations": {"dose_mg_response": 0.97},
                "summary": "Clear dose response"}}"#
                .to_string())
        }));
        let ctx = context(service.clone());
        let result = TrialDataAgent::analyze(&ctx, "trial.csv", CSV).await.unwrap();

        assert_eq!(result.source, ResultSource::Agent);
        assert_eq!(result.analysis.correlations.len(), 1);
        assert_eq!(result.analysis.summary, "Clear dose response");
        assert!(result.analysis.recommendations.contains(&"Monitor treatment response".to_string()));
        assert_eq!(result.profile.row_count, 4);

        let prompt = &service.sent_to(TAG)[0];
        assert!(prompt.contains("Data (first 4 of 4 rows)"));
        assert!(prompt.contains("61,30,0.80"));
    }

    #[tokio::test]
    async fn test_prose_reply_falls_back_to_profile() {
        let ctx = context(Arc::new(ScriptedAgentService::new(|_, _| {
            Ok("The data looks promising.".to_string())
        })));
        let result = TrialDataAgent::analyze(&ctx, "trial.csv", CSV).await.unwrap();

        assert_eq!(result.source, ResultSource::LocalModel);
        assert_eq!(result.analysis.correlations, result.profile.correlations);
        assert!(result.analysis.summary.starts_with("4 rows across 3 columns"));
    }

    #[tokio::test]
    async fn test_unreadable_csv_never_reaches_agent() {
        let service = Arc::new(ScriptedAgentService::echo());
        let ctx = context(service.clone());
        let err = TrialDataAgent::analyze(&ctx, "empty.csv", "").await.unwrap_err();

        assert!(matches!(err, AppError::InvalidRequest(_)));
        assert_eq!(service.created_count(), 0);
    }
}
