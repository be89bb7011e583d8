//! System prompt and the messages that feed tool results back to the model

use crate::config::ToolCallMode;
use crate::types::{ToolCall, ToolDescriptor, ToolResult};

/// Built-in assistant persona, used unless the configuration overrides it
pub const DEFAULT_SYSTEM_PROMPT: &str = "\
Eres un asistente especializado en información sobre disponibilidad de medicamentos \
en centros de salud del noroeste peruano.

Cuando te pregunten sobre medicamentos o inventario médico, utiliza las herramientas \
disponibles para proporcionar información precisa. NO pidas permiso para utilizar \
herramientas, úsalas directamente cuando sea necesario.

Al responder consultas sobre medicamentos:
1. Identifica qué información necesita el usuario.
2. Selecciona la herramienta más adecuada para obtenerla.
3. Interpreta los resultados y extrae los datos más relevantes.
4. Presenta la disponibilidad, las ubicaciones y el stock de forma clara.

Si la pregunta no está relacionada con medicamentos o inventario médico, responde \
amablemente que solo puedes ayudar con información sobre medicamentos.";

/// Compose the system prompt for one turn
///
/// Lists the known tools. In text mode the model is also told the exact
/// sentence shape the extractor recognizes, and not to guess at results.
pub fn build_system_prompt(base: &str, tools: &[ToolDescriptor], mode: ToolCallMode) -> String {
    let mut prompt = base.trim_end().to_string();

    if tools.is_empty() {
        return prompt;
    }

    prompt.push_str("\n\nHerramientas disponibles:\n");
    for tool in tools {
        if tool.description.is_empty() {
            prompt.push_str(&format!("- {}\n", tool.name));
        } else {
            prompt.push_str(&format!("- {}: {}\n", tool.name, tool.description));
        }
    }

    if mode == ToolCallMode::Text {
        prompt.push_str(
            "\nPara usar una herramienta escribe exactamente: \
             Uso la herramienta <nombre> con argumentos: {<argumentos JSON>}\n\
             No describas el resultado antes de recibirlo.",
        );
    }

    prompt
}

/// The synthetic user message carrying one tool result back to the model
pub fn tool_result_message(call: &ToolCall, result: &ToolResult) -> String {
    format!(
        "Resultado de la herramienta {} con argumentos {}: {}",
        call.name,
        call.arguments_value(),
        result.render()
    )
}

/// The block appended to the final answer for one tool result
pub fn tool_result_block(call: &ToolCall, result: &ToolResult) -> String {
    format!("[{}] {}", call.name, result.render())
}

/// Join the non-empty parts of the final answer
pub fn compose_answer<'a>(parts: impl IntoIterator<Item = &'a str>) -> String {
    parts
        .into_iter()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_prompt_lists_tools() {
        let tools = vec![
            ToolDescriptor::new("search_medicines", "Buscar medicamentos por nombre"),
            ToolDescriptor::new("get_medicine_status", ""),
        ];
        let prompt = build_system_prompt(DEFAULT_SYSTEM_PROMPT, &tools, ToolCallMode::Structured);

        assert!(prompt.starts_with("Eres un asistente"));
        assert!(prompt.contains("- search_medicines: Buscar medicamentos por nombre\n"));
        assert!(prompt.contains("- get_medicine_status\n"));
        assert!(!prompt.contains("Uso la herramienta"));
    }

    #[test]
    fn test_text_mode_prompt_teaches_call_shape() {
        let tools = vec![ToolDescriptor::new("search_medicines", "")];
        let prompt = build_system_prompt("Base", &tools, ToolCallMode::Text);
        assert!(prompt.contains("Uso la herramienta <nombre> con argumentos"));

        assert_eq!(build_system_prompt("Base\n", &[], ToolCallMode::Text), "Base");
    }

    #[test]
    fn test_tool_result_message() {
        let call = ToolCall::from_value("get_medicine_stock", json!({"medicine": "paracetamol"}));

        let ok = tool_result_message(&call, &ToolResult::success(json!({"Piura": 120})));
        assert_eq!(
            ok,
            r#"Resultado de la herramienta get_medicine_stock con argumentos {"medicine":"paracetamol"}: {"Piura":120}"#
        );

        let failed = tool_result_message(&call, &ToolResult::timeout());
        assert!(failed.ends_with(": Error: timeout"));
    }

    #[test]
    fn test_compose_answer_skips_empty_parts() {
        assert_eq!(
            compose_answer(["Consultando.", "", "  [search_medicines] 3 resultados ", "Listo."]),
            "Consultando.\n\n[search_medicines] 3 resultados\n\nListo."
        );
    }
}
