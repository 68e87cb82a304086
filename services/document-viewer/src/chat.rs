//! Chat plumbing between review sessions and the analysis backend.

use async_trait::async_trait;
use financeguard_models::{BackendResponse, ChatRequest};
use financeguard_utils::{BackendClient, FinanceGuardResult};

/// Anything that can answer a chat query about the loaded document.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn chat(&self, request: &ChatRequest) -> FinanceGuardResult<BackendResponse>;
}

#[async_trait]
impl ChatBackend for BackendClient {
    async fn chat(&self, request: &ChatRequest) -> FinanceGuardResult<BackendResponse> {
        BackendClient::chat(self, request).await
    }
}

/// Plain-text transcript entry for a backend reply.
pub fn render_response(response: &BackendResponse) -> String {
    match response {
        BackendResponse::SimpleDialogue(dialogue) => dialogue.message.clone(),
        BackendResponse::Simulation(simulation) => {
            let mut sections = Vec::with_capacity(simulation.simulations.len() + 1);
            if !simulation.message.trim().is_empty() {
                sections.push(simulation.message.clone());
            }
            sections.extend(simulation.simulations.iter().map(|turn| {
                format!(
                    "{}. {}\nCustomer: {}\nAgent: {}",
                    turn.id, turn.situation, turn.user, turn.agent
                )
            }));
            sections.join("\n\n")
        }
        BackendResponse::Cases(cases) => {
            let mut sections = vec![cases.message.clone()];
            sections.extend(cases.disputes.iter().map(|case| {
                format!(
                    "{}\n{}\nKey points: {}\nJudgement: {}",
                    case.title, case.summary, case.key_points, case.judge_result
                )
            }));
            sections.join("\n\n")
        }
        BackendResponse::HighlightedClause(clause) => clause.message.clone(),
        BackendResponse::Highlights(rationale) => rationale.rationale.clone(),
    }
}
