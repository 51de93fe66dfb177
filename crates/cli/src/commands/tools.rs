//! `toolloop tools`: list the registered tools.

use std::path::Path;

use toolloop_core::tool::ToolDescription;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    let registry = toolloop_tools::default_registry(&config.tools)?;

    println!("Available tools ({}):\n", registry.len());
    for description in registry.describe_all() {
        print!("{}", render(&description));
    }

    Ok(())
}

/// Name, description and one line per parameter.
pub fn render(tool: &ToolDescription) -> String {
    let mut out = format!("  {}\n      {}\n", tool.name, tool.description);
    for param in tool.parameters.iter() {
        let mut line = format!(
            "      - {} ({}{})",
            param.name,
            param.kind.as_str(),
            if param.required { ", required" } else { "" }
        );
        if let Some(default) = &param.default {
            line.push_str(&format!(" [default: {default}]"));
        }
        line.push_str(": ");
        line.push_str(&param.description);
        out.push_str(&line);
        out.push('\n');
    }
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use toolloop_core::tool::{Parameter, ParameterKind, ParameterSchema};

    #[test]
    fn renders_parameters_with_defaults() {
        let tool = ToolDescription {
            name: "get_weather".into(),
            description: "Current weather for a city.".into(),
            parameters: ParameterSchema::new(vec![
                Parameter::required("city", ParameterKind::String, "City name"),
                Parameter::optional("units", ParameterKind::String, "Unit system")
                    .with_default("metric"),
            ]),
        };
        let text = render(&tool);
        assert!(text.starts_with("  get_weather\n      Current weather for a city.\n"));
        assert!(text.contains("      - city (string, required): City name\n"));
        assert!(text.contains("      - units (string) [default: \"metric\"]: Unit system\n"));
    }
}
