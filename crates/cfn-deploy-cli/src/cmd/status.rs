use crate::aws::{self, CloudFormationEngine};
use crate::output::{print_fields, print_json};
use cfn_deploy_core::{locate, StackName, StackState, StatusClass};
use serde::Serialize;

#[derive(Serialize)]
struct StatusOutput<'a> {
    stack: &'a str,
    status: &'a str,
    class: Option<&'static str>,
    stack_id: Option<&'a str>,
    reason: Option<&'a str>,
}

fn class_label(class: StatusClass) -> &'static str {
    match class {
        StatusClass::Succeeded => "succeeded",
        StatusClass::Failed => "failed",
        StatusClass::InProgress => "in_progress",
    }
}

/// Describe one stack and print how a deployment would treat it.
pub fn run(stack: &str, region: &str, json: bool) -> anyhow::Result<()> {
    let stack = StackName::new(stack)?;
    let runtime = aws::runtime()?;
    let engine = CloudFormationEngine::new(runtime, region);
    let state = locate(&engine, &stack)?;

    let (stack_id, reason) = match &state {
        StackState::Present {
            stack_id, reason, ..
        } => (stack_id.as_deref(), reason.as_deref()),
        StackState::Absent => (None, None),
    };
    let output = StatusOutput {
        stack: stack.as_str(),
        status: state.label(),
        class: state.status().map(|s| class_label(s.class())),
        stack_id,
        reason,
    };

    if json {
        return print_json(&output);
    }

    let mut fields = vec![
        ("stack", output.stack.to_string()),
        ("status", output.status.to_string()),
        ("class", output.class.unwrap_or("-").to_string()),
        ("stack id", output.stack_id.unwrap_or("-").to_string()),
    ];
    if let Some(reason) = output.reason {
        fields.push(("reason", reason.to_string()));
    }
    print_fields(&fields);
    Ok(())
}
