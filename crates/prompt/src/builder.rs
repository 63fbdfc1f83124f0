//! Prompt builder for rendering templates.

use crate::types::{BuiltPrompt, BuiltPromptMetadata, PromptDefinition};
use handlebars::Handlebars;
use pdfchat_core::{AppError, AppResult};
use serde::Serialize;

/// Build a prompt from a definition and template variables.
///
/// Both the system instruction and the user template are rendered with the
/// same variables. Any serializable value works as the variable set; its
/// top-level keys are recorded in the metadata.
///
/// # Example
/// ```no_run
/// use pdfchat_prompt::{build_prompt, PromptDefinition};
/// use serde_json::json;
///
/// # fn example(def: PromptDefinition) -> Result<(), Box<dyn std::error::Error>> {
/// let built = build_prompt(&def, &json!({ "question": "When was the roof replaced?" }))?;
/// println!("User prompt: {}", built.user);
/// # Ok(())
/// # }
/// ```
pub fn build_prompt<T: Serialize>(
    definition: &PromptDefinition,
    variables: &T,
) -> AppResult<BuiltPrompt> {
    tracing::debug!("Building prompt: {}", definition.id);

    let data = serde_json::to_value(variables)?;

    let user = render_template(&definition.template, &data)?;
    let system = definition
        .system
        .as_deref()
        .map(|template| render_template(template, &data))
        .transpose()?
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    let resolved_variables = data
        .as_object()
        .map(|map| map.keys().cloned().collect())
        .unwrap_or_default();

    Ok(BuiltPrompt {
        system,
        user,
        metadata: BuiltPromptMetadata {
            source_prompt_id: definition.id.clone(),
            resolved_variables,
        },
    })
}

/// Render a Handlebars template with variables.
fn render_template(template: &str, data: &serde_json::Value) -> AppResult<String> {
    let mut handlebars = Handlebars::new();

    // Plain text output, never HTML
    handlebars.register_escape_fn(handlebars::no_escape);

    handlebars
        .register_template_string("prompt", template)
        .map_err(|e| AppError::Prompt(format!("Failed to register template: {}", e)))?;

    handlebars
        .render("prompt", data)
        .map_err(|e| AppError::Prompt(format!("Failed to render template: {}", e)))
}
