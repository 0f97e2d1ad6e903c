//! Prompt construction for the model that proposes a plan.
//!
//! Pure string assembly. The response to this prompt is what
//! [`super::build_plan`] consumes.

use super::types::Action;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Everything the prompt needs to know about one planning request.
#[derive(Debug, Clone)]
pub struct PromptContext {
    /// The user's request, inserted verbatim.
    pub request: String,
    /// Directory the relative paths are resolved against, if known.
    pub workspace: Option<String>,
    /// Upper bound on the number of steps the model may propose.
    pub max_steps: usize,
    /// Whether the response must carry a `reasoning` field.
    pub require_reasoning: bool,
}

impl PromptContext {
    pub fn new(request: impl Into<String>) -> Self {
        Self {
            request: request.into(),
            workspace: None,
            max_steps: super::DEFAULT_MAX_STEPS,
            require_reasoning: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Prompt text
// ---------------------------------------------------------------------------

/// JSON response schema included in every prompt.
const SCHEMA_REFERENCE: &str = r#"## Response Schema

Respond with a single JSON object and nothing else:

```json
{
  "reasoning": "string",
  "steps": [
    {
      "step": 1,
      "action": "read",
      "description": "string",
      "path": "string",
      "dependsOn": [1]
    }
  ]
}
```

- `step`: positive integer, numbered from 1 in the order you list the steps.
- `action`: exactly one of the allowed actions, lowercase.
- `description`: one sentence saying what the step does.
- `path`: the file or directory the step acts on.
- `dependsOn`: optional. Step numbers that must finish before this step starts.
"#;

/// Decomposition guidelines included in every prompt.
const GUIDELINES: &str = r#"## Planning Guidelines

1. **Relative paths only.** Never start a path with `/`, `\` or a drive letter, and never climb above the workspace with `..`.
2. **Portable names.** Paths must not contain `<`, `>`, `:`, `"`, `|`, `?` or `*`.
3. **Read before you write.** If a step needs the contents of a file, add a `read` step and depend on it.
4. **Only real dependencies.** List a step in `dependsOn` only when this step needs its result. Independent steps should not depend on each other.
5. **No cycles.** A step may never depend on itself, directly or through other steps.
6. **Small steps.** Each step acts on one path.
"#;

/// Build the prompt sent to the model for one request.
pub fn build_prompt(ctx: &PromptContext) -> String {
    let mut prompt = String::with_capacity(2048);

    prompt.push_str("# Step Planner\n\n");
    prompt.push_str(
        "You are a planning assistant. Break the user's request into a short, \
         ordered list of file-system steps. You do not carry the steps out; \
         you only describe them.\n\n",
    );

    prompt.push_str("## Allowed Actions\n\n");
    for action in Action::ALL {
        let meaning = match action {
            Action::Read => "inspect an existing file or directory",
            Action::Write => "create or modify a file",
            Action::Run => "execute a command or script at the path",
            Action::Delete => "remove a file or directory",
        };
        prompt.push_str(&format!("- `{action}`: {meaning}\n"));
    }
    prompt.push('\n');

    prompt.push_str(SCHEMA_REFERENCE);
    prompt.push('\n');
    prompt.push_str(GUIDELINES);
    prompt.push('\n');

    prompt.push_str("## Constraints\n\n");
    prompt.push_str(&format!("- Use at most {} steps.\n", ctx.max_steps));
    if ctx.require_reasoning {
        prompt.push_str("- The `reasoning` field is required. Explain the order you chose.\n");
    } else {
        prompt.push_str("- Use `reasoning` to briefly explain the order you chose.\n");
    }
    if let Some(workspace) = &ctx.workspace {
        prompt.push_str(&format!("- Paths are relative to `{workspace}`.\n"));
    }
    prompt.push('\n');

    prompt.push_str("## Request\n\n");
    prompt.push_str(&ctx.request);
    prompt.push('\n');

    prompt
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_context() -> PromptContext {
        PromptContext {
            request: "Add a CHANGELOG entry for the 0.2 release".to_string(),
            workspace: Some("/home/dev/project".to_string()),
            max_steps: 12,
            require_reasoning: false,
        }
    }

    #[test]
    fn prompt_lists_every_action() {
        let prompt = build_prompt(&sample_context());
        for action in Action::ALL {
            assert!(prompt.contains(&format!("`{action}`")), "missing {action}");
        }
    }

    #[test]
    fn prompt_contains_schema_and_guidelines() {
        let prompt = build_prompt(&sample_context());
        assert!(prompt.contains("Response Schema"));
        assert!(prompt.contains("\"dependsOn\""));
        assert!(prompt.contains("Planning Guidelines"));
        assert!(prompt.contains("Relative paths only"));
    }

    #[test]
    fn prompt_ends_with_request_verbatim() {
        let ctx = PromptContext {
            request: "  rename\tfoo  ".to_string(),
            ..sample_context()
        };
        let prompt = build_prompt(&ctx);
        assert!(prompt.ends_with("## Request\n\n  rename\tfoo  \n"));
    }

    #[test]
    fn prompt_includes_limits_and_workspace() {
        let prompt = build_prompt(&sample_context());
        assert!(prompt.contains("at most 12 steps"));
        assert!(prompt.contains("relative to `/home/dev/project`"));
    }

    #[test]
    fn prompt_marks_reasoning_required() {
        let ctx = PromptContext {
            require_reasoning: true,
            ..sample_context()
        };
        assert!(build_prompt(&ctx).contains("`reasoning` field is required"));
        assert!(!build_prompt(&sample_context()).contains("is required"));
    }

    #[test]
    fn new_uses_defaults() {
        let ctx = PromptContext::new("x");
        assert_eq!(ctx.max_steps, 200);
        assert!(ctx.workspace.is_none());
        assert!(!build_prompt(&ctx).contains("Paths are relative to"));
    }
}
