use crate::context::FieldContext;
use crate::hierarchy::ComponentSummary;

const QUESTION: &str = "Question: What is the most appropriate hint text for this input field?";

/// `com.example.shop:id/email_input` -> `email input`.
pub fn purpose_from_id(resource_id: &str) -> String {
    resource_id
        .rsplit('/')
        .next()
        .unwrap_or(resource_id)
        .replace('_', " ")
}

/// `com.example.shop` -> `shop`.
pub fn app_from_package(package: Option<&str>) -> &str {
    let package = package.unwrap_or_default();
    package.rsplit('.').next().unwrap_or(package)
}

pub fn describe_neighbor(component: &ComponentSummary) -> Option<String> {
    let mut parts = Vec::new();
    if let Some(id) = component.id.as_deref() {
        parts.push(format!("its purpose might be '{}'", purpose_from_id(id)));
    }
    if let Some(text) = component.text.as_deref() {
        parts.push(format!("it displays the text '{text}'"));
    }
    if let Some(label) = component.label.as_deref() {
        parts.push(format!("its label is '{label}'"));
    }
    if parts.is_empty() {
        return None;
    }
    Some(format!(
        "There is a nearby component, and {}.",
        parts.join(", and ")
    ))
}

pub fn compile_prompt(context: &FieldContext) -> String {
    let target = &context.target;
    let mut out = format!(
        "In the '{}' app, there is an input field. ",
        app_from_package(target.app_name.as_deref())
    );
    if let Some(id) = target.id.as_deref() {
        out.push_str(&format!("Its purpose seems to be '{}'. ", purpose_from_id(id)));
    }
    if let Some(text) = target.text.as_deref() {
        out.push_str(&format!("It currently contains the text '{text}'. "));
    }

    let neighbors: Vec<String> = context.nearby.iter().filter_map(describe_neighbor).collect();
    if !neighbors.is_empty() {
        out.push_str("\nContext from nearby elements: ");
        out.push_str(&neighbors.join(" "));
    }

    out.push('\n');
    out.push_str(QUESTION);
    out
}
