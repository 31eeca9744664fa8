use conduct_core::StatusPoller;
use tracing::info_span;

use crate::cli::args::{GlobalArgs, RunArgs};
use crate::exit_codes::SUCCESS;

pub async fn run(global: &GlobalArgs, args: RunArgs) -> anyhow::Result<i32> {
    let client = global.control_client("run")?;
    let ack = client
        .run_bundle(&args.bundle, args.scale, args.affinity.as_deref())
        .await?;
    global.say("Bundle run request sent.");

    if !global.no_wait {
        StatusPoller::new(client, info_span!("wait"))
            .await_scale(&ack.bundle_id, args.scale as usize, global.poll_options())
            .await?;
    }

    global.say(format!(
        "Stop bundle with: conduct stop{} {}",
        global.hint_flags(),
        global.display_id(&ack.bundle_id)
    ));
    Ok(SUCCESS)
}
