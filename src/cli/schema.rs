use clap::Args;

use super::CliContext;
use junction::schema::write_schema;

#[derive(Args, Debug)]
pub struct SchemaArgs {}

pub async fn execute(_args: SchemaArgs, context: &CliContext) -> anyhow::Result<()> {
    let out_dir = context.root.join("schemas");
    for file in write_schema(&out_dir)? {
        println!("wrote {}", out_dir.join(file).display());
    }
    Ok(())
}
