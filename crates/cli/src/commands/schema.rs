use serde_json::json;

use crate::{emit, Context, SchemaCommands};

pub(crate) fn cmd_schema(ctx: &Context, command: SchemaCommands) {
    let registry = drover_core::registry();
    match command {
        SchemaCommands::List => {
            let identities: Vec<&str> = registry.identities().collect();
            emit(ctx, &identities.join("\n"), json!(identities));
        }
        SchemaCommands::Versions { identity } => {
            if !registry.contains(&identity) {
                ctx.fail(&format!("unregistered versioned schema: {}", identity));
            }
            let versions = registry.versions(&identity);
            emit(
                ctx,
                &versions.join("\n"),
                json!({"identity": identity, "versions": versions}),
            );
        }
    }
}
