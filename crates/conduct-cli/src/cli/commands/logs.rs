use chrono::{DateTime, Local, Utc};
use conduct_core::LogEntry;

use crate::cli::args::{GlobalArgs, LogsArgs};
use crate::exit_codes::SUCCESS;

const PADDING: usize = 2;

pub async fn run(global: &GlobalArgs, args: LogsArgs) -> anyhow::Result<i32> {
    let client = global.control_client("logs")?;
    let entries = client.logs(&args.bundle, args.lines).await?;

    for line in render(&entries, &args) {
        println!("{}", line);
    }
    Ok(SUCCESS)
}

fn format_timestamp(timestamp: &str, args: &LogsArgs) -> String {
    let Ok(parsed) = DateTime::parse_from_rfc3339(timestamp) else {
        return timestamp.to_string();
    };
    let pattern = if args.date {
        "%Y-%m-%dT%H:%M:%S"
    } else {
        "%H:%M:%S"
    };
    if args.utc {
        format!("{}Z", parsed.with_timezone(&Utc).format(pattern))
    } else {
        parsed.with_timezone(&Local).format(pattern).to_string()
    }
}

/// `TIME HOST LOG` table, columns left-aligned to their widest cell.
fn render(entries: &[LogEntry], args: &LogsArgs) -> Vec<String> {
    let mut rows = vec![["TIME".to_string(), "HOST".to_string(), "LOG".to_string()]];
    rows.extend(entries.iter().map(|entry| {
        [
            format_timestamp(&entry.timestamp, args),
            entry.host.clone(),
            entry.message.clone(),
        ]
    }));

    let time_width = rows.iter().map(|r| r[0].chars().count()).max().unwrap_or(0);
    let host_width = rows.iter().map(|r| r[1].chars().count()).max().unwrap_or(0);

    rows.iter()
        .map(|[time, host, log]| {
            format!(
                "{:<tw$}{pad}{:<hw$}{pad}{}",
                time,
                host,
                log,
                tw = time_width,
                hw = host_width,
                pad = " ".repeat(PADDING)
            )
            .trim_end()
            .to_string()
        })
        .collect()
}
