use schemars::schema_for;

use token_migrator::MigratorConfig;

/// Generate and print the JSON Schema for `MigratorConfig`.
pub fn run() -> anyhow::Result<()> {
    let schema = schema_for!(MigratorConfig);
    let json = serde_json::to_string_pretty(&schema)?;
    println!("{json}");
    Ok(())
}
