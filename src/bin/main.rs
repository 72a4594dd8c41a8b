use anyhow::Result;
use hdf5_recipe::command;

#[tokio::main]
async fn main() -> Result<()> {
    command::run().await
}
