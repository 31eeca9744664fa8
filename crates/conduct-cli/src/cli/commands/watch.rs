use conduct_core::Event;
use futures::StreamExt;
use tracing::{debug, warn};

use crate::cli::args::GlobalArgs;
use crate::exit_codes::SUCCESS;

pub async fn run(global: &GlobalArgs) -> anyhow::Result<i32> {
    let client = global.control_client("watch")?;
    let stream = client.subscribe_bundle_events().await?;
    global.say(format!("Watching {}", client.bundle_events_url()));

    let mut events = Box::pin(stream.into_stream());
    while let Some(event) = events.next().await {
        match event {
            Ok(event) => {
                if let Some(line) = describe(&event) {
                    println!("{}", line);
                } else {
                    debug!("heartbeat");
                }
            }
            Err(e) if e.is_transport() => return Err(e.into()),
            Err(e) => warn!(error = %e, "skipping malformed event"),
        }
    }

    global.say("Event stream closed.");
    Ok(SUCCESS)
}

fn describe(event: &Event) -> Option<String> {
    let kind = event.event.as_deref()?;
    Some(format!("{}: {}", kind, event.data.as_deref().unwrap_or("")))
}
