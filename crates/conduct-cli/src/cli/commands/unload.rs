use crate::cli::args::{BundleArgs, GlobalArgs};
use crate::exit_codes::SUCCESS;

pub async fn run(global: &GlobalArgs, args: BundleArgs) -> anyhow::Result<i32> {
    let client = global.control_client("unload")?;
    client.unload_bundle(&args.bundle).await?;
    global.say("Bundle unload request sent.");
    Ok(SUCCESS)
}
