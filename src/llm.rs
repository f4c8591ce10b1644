//! OpenAI-compatible decision client.
//!
//! Speaks the chat-completions shape: the transcript becomes the message
//! list and the action vocabulary is offered as callable functions. A native
//! function call is the primary channel; a fenced JSON block embedded in the
//! prose is accepted as fallback, and plain prose becomes narrative.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use agent_loop::{
    extract_action_block, ActionRequest, CompletionSignal, Decision, DecisionOutcome,
    DecisionProvider, EntryRole, LoopError, TranscriptEntry,
};

const SYSTEM_PROMPT: &str = r#"You are an assistant operating a real web browser for the user.

You are shown a compact rendering of the current page. Interactable elements carry an id in
parentheses, e.g. button(42). Address elements by that id.

Available functions:
- click_element: { "node": <id> }
- enter_text: { "node": <id>, "text": "..." }
- select_option: { "node": <id>, "value": "..." }
- goto_url: { "url": "https://..." }
- complete_task: { "success": true|false, "result": "..." }

Rules:
- Work in the announced step (Plan, Execute, Reflect or Verify) and follow its instructions.
- To act, end your response with exactly one JSON block:
```json
{ "name": "<function>", "args": { ... } }
```
- Request at most one action per response. Never invent element ids.
- Avoid repeating an action on the same element unless the page state changed.
- Dropdowns and popups may need a follow-up action; watch the reported page changes.
- When the task is accomplished, call complete_task instead of acting further."#;

/// Decision service client against an OpenAI-style chat-completions endpoint.
pub struct OpenAiDecisionProvider {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl OpenAiDecisionProvider {
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }
}

#[async_trait]
impl DecisionProvider for OpenAiDecisionProvider {
    async fn decide(
        &self,
        transcript: &[TranscriptEntry],
        actions_allowed: bool,
    ) -> Result<DecisionOutcome, LoopError> {
        let mut messages = vec![json!({ "role": "system", "content": SYSTEM_PROMPT })];
        for entry in transcript {
            messages.push(json!({
                "role": chat_role(entry.role),
                "content": entry.content,
            }));
        }
        if !actions_allowed {
            messages.push(json!({
                "role": "system",
                "content": "Actions are disabled for this step. Do not emit an action block; \
                            respond in plain text only.",
            }));
        }

        debug!(messages = messages.len(), actions_allowed, "requesting decision");
        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&json!({
                "model": self.model,
                "messages": messages,
                "functions": function_definitions(),
                "function_call": if actions_allowed { "auto" } else { "none" },
                "temperature": 0.2,
            }))
            .send()
            .await
            .map_err(|err| LoopError::decision(format!("request failed: {err}")))?;

        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|err| LoopError::decision(format!("response body unreadable: {err}")))?;

        if !status.is_success() {
            let detail = body["error"]["message"].as_str().unwrap_or("unknown error");
            return Err(LoopError::decision(format!(
                "endpoint returned {status}: {detail}"
            )));
        }

        let message = &body["choices"][0]["message"];
        if let Some(call) = message.get("function_call").filter(|value| !value.is_null()) {
            let narrative = message["content"].as_str().unwrap_or("").trim().to_string();
            return Ok(interpret_function_call(narrative, call));
        }

        match message["content"].as_str() {
            Some(content) => Ok(interpret(content)),
            None => {
                warn!("decision response carried no content");
                Ok(DecisionOutcome::Unparseable {
                    detail: "no content in response".to_string(),
                })
            }
        }
    }
}

/// Function vocabulary offered to the decision service.
fn function_definitions() -> Value {
    json!([
        {
            "name": "click_element",
            "description": "Click on an element by its id",
            "parameters": {
                "type": "object",
                "properties": {
                    "node": { "type": "integer", "description": "Id of the element to click" }
                },
                "required": ["node"]
            }
        },
        {
            "name": "enter_text",
            "description": "Replace the value of an input element by its id",
            "parameters": {
                "type": "object",
                "properties": {
                    "node": { "type": "integer", "description": "Id of the input element" },
                    "text": { "type": "string", "description": "The text to enter" }
                },
                "required": ["node", "text"]
            }
        },
        {
            "name": "select_option",
            "description": "Select an option of a dropdown by option value",
            "parameters": {
                "type": "object",
                "properties": {
                    "node": { "type": "integer", "description": "Id of the select element" },
                    "value": { "type": "string", "description": "Value of the option to pick" }
                },
                "required": ["node", "value"]
            }
        },
        {
            "name": "goto_url",
            "description": "Navigate to a website by URL",
            "parameters": {
                "type": "object",
                "properties": {
                    "url": { "type": "string", "description": "The URL to navigate to" }
                },
                "required": ["url"]
            }
        },
        {
            "name": "complete_task",
            "description": "Signal that the task is complete",
            "parameters": {
                "type": "object",
                "properties": {
                    "success": { "type": "boolean" },
                    "result": { "type": "string", "description": "Human-readable result" }
                },
                "required": ["result"]
            }
        }
    ])
}

fn chat_role(role: EntryRole) -> &'static str {
    match role {
        EntryRole::Instruction => "user",
        EntryRole::Guidance => "system",
        EntryRole::Narrative => "assistant",
        EntryRole::Observation => "user",
        EntryRole::Corrective => "system",
    }
}

#[derive(Deserialize)]
#[serde(default)]
struct CompleteArgs {
    success: bool,
    #[serde(alias = "result")]
    message: String,
}

impl Default for CompleteArgs {
    fn default() -> Self {
        Self {
            success: true,
            message: "Task completed".to_string(),
        }
    }
}

/// Interpret a native function call from the response.
///
/// Arguments that are not valid JSON are passed through as a raw string so
/// the loop's argument parsing rejects them; that is malformed input, not a
/// missing decision.
fn interpret_function_call(narrative: String, call: &Value) -> DecisionOutcome {
    let name = call["name"].as_str().unwrap_or("").to_string();
    if name.is_empty() {
        return DecisionOutcome::Unparseable {
            detail: "function call without a name".to_string(),
        };
    }
    let raw_args = call["arguments"].as_str().unwrap_or("{}");
    let args = serde_json::from_str::<Value>(raw_args)
        .unwrap_or_else(|_| Value::String(raw_args.to_string()));
    DecisionOutcome::Decision(with_request(narrative, ActionRequest { name, args }))
}

/// Convert raw response text into a decision.
fn interpret(content: &str) -> DecisionOutcome {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return DecisionOutcome::Unparseable {
            detail: "empty response".to_string(),
        };
    }

    match extract_action_block(trimmed) {
        Some(request) => DecisionOutcome::Decision(with_request(trimmed.to_string(), request)),
        None => DecisionOutcome::Decision(Decision {
            narrative: trimmed.to_string(),
            action: None,
            completion: None,
        }),
    }
}

fn with_request(narrative: String, request: ActionRequest) -> Decision {
    let mut decision = Decision {
        narrative,
        action: None,
        completion: None,
    };
    if request.name == "complete_task" {
        let args: CompleteArgs = serde_json::from_value(request.args.clone()).unwrap_or_default();
        decision.completion = Some(CompletionSignal {
            success: args.success,
            message: args.message,
        });
    } else {
        decision.action = Some(request);
    }
    decision
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_block_becomes_an_action_request() {
        let content = "I will search now.\n```json\n{ \"name\": \"enter_text\", \"args\": { \"node\": 5, \"text\": \"ddr3 ram\" } }\n```";
        match interpret(content) {
            DecisionOutcome::Decision(decision) => {
                let action = decision.action.expect("action extracted");
                assert_eq!(action.name, "enter_text");
                assert!(decision.completion.is_none());
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn complete_task_becomes_a_completion_signal() {
        let content = "Done.\n```json\n{ \"name\": \"complete_task\", \"args\": { \"success\": true, \"result\": \"order placed\" } }\n```";
        match interpret(content) {
            DecisionOutcome::Decision(decision) => {
                let completion = decision.completion.expect("completion extracted");
                assert!(completion.success);
                assert_eq!(completion.message, "order placed");
                assert!(decision.action.is_none());
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn prose_is_narrative_only() {
        match interpret("The page shows the order history already.") {
            DecisionOutcome::Decision(decision) => {
                assert!(decision.action.is_none());
                assert!(decision.completion.is_none());
                assert!(!decision.narrative.is_empty());
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn empty_content_is_unparseable() {
        assert!(matches!(
            interpret("   "),
            DecisionOutcome::Unparseable { .. }
        ));
    }

    #[test]
    fn native_function_call_becomes_an_action() {
        let call = json!({ "name": "click_element", "arguments": "{\"node\": 7}" });
        match interpret_function_call("clicking the link".to_string(), &call) {
            DecisionOutcome::Decision(decision) => {
                let action = decision.action.expect("action from function call");
                assert_eq!(action.name, "click_element");
                assert_eq!(action.args["node"], 7);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn unreadable_function_arguments_survive_as_raw_string() {
        let call = json!({ "name": "click_element", "arguments": "node seven" });
        match interpret_function_call(String::new(), &call) {
            DecisionOutcome::Decision(decision) => {
                let action = decision.action.expect("action kept");
                assert!(action.args.is_string());
                assert!(agent_loop::parse_action(&action).is_err());
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn nameless_function_call_is_unparseable() {
        let call = json!({ "arguments": "{}" });
        assert!(matches!(
            interpret_function_call(String::new(), &call),
            DecisionOutcome::Unparseable { .. }
        ));
    }
}
