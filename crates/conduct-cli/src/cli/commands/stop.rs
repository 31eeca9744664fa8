use conduct_core::StatusPoller;
use tracing::info_span;

use crate::cli::args::{BundleArgs, GlobalArgs};
use crate::exit_codes::SUCCESS;

pub async fn run(global: &GlobalArgs, args: BundleArgs) -> anyhow::Result<i32> {
    let client = global.control_client("stop")?;
    let ack = client.stop_bundle(&args.bundle).await?;
    global.say("Bundle stop request sent.");

    if !global.no_wait {
        StatusPoller::new(client, info_span!("wait"))
            .await_scale(&ack.bundle_id, 0, global.poll_options())
            .await?;
    }

    global.say(format!(
        "Unload bundle with: conduct unload{} {}",
        global.hint_flags(),
        global.display_id(&ack.bundle_id)
    ));
    Ok(SUCCESS)
}
