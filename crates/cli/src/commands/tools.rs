//! `deckr tools`: List the built-in tools the model can call.

use deckr_core::provider::ToolDefinition;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let registry = deckr_tools::default_registry()?;

    println!("Built-in tools ({})", registry.len());
    println!();
    for def in registry.list() {
        println!("  {:<18} {}", def.name, def.description);
        let args = argument_names(&def);
        if !args.is_empty() {
            println!("  {:<18} args: {}", "", args.join(", "));
        }
    }

    Ok(())
}

/// Argument names from the schema, required ones marked with `*`.
fn argument_names(def: &ToolDefinition) -> Vec<String> {
    let required: Vec<&str> = def.parameters["required"]
        .as_array()
        .map(|r| r.iter().filter_map(|v| v.as_str()).collect())
        .unwrap_or_default();

    def.parameters["properties"]
        .as_object()
        .map(|props| {
            props
                .keys()
                .map(|k| {
                    if required.contains(&k.as_str()) {
                        format!("{k}*")
                    } else {
                        k.clone()
                    }
                })
                .collect()
        })
        .unwrap_or_default()
}
