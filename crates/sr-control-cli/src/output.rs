//! Text and JSON rendering of tracker state.

use anyhow::Result;
use serde_json::{json, Value};
use sr_control_core::{LibraryEvent, LibrarySnapshot, TargetResolution};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Text,
    Json,
}

impl Format {
    pub fn from_json_flag(json: bool) -> Self {
        if json {
            Format::Json
        } else {
            Format::Text
        }
    }
}

pub fn print_snapshots(snapshots: &[LibrarySnapshot], format: Format) -> Result<()> {
    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(snapshots)?),
        Format::Text => {
            if snapshots.is_empty() {
                println!("No libraries registered");
            }
            for snapshot in snapshots {
                println!("{}", snapshot_line(snapshot));
            }
        }
    }
    Ok(())
}

pub fn print_snapshot(snapshot: &LibrarySnapshot, format: Format) -> Result<()> {
    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(snapshot)?),
        Format::Text => println!("{}", snapshot_line(snapshot)),
    }
    Ok(())
}

pub fn print_resolution(
    snapshot: &LibrarySnapshot,
    resolution: &TargetResolution,
    format: Format,
) -> Result<()> {
    match format {
        Format::Json => {
            let value = json!({
                "library": snapshot,
                "resolution": resolution_json(resolution),
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        Format::Text => {
            let line = match resolution {
                TargetResolution::Local { hostname } => {
                    format!("{} runs locally on {}", snapshot.name, hostname)
                }
                TargetResolution::Remote { hostname } => format!(
                    "{} runs remotely on {} as {}",
                    snapshot.name,
                    hostname,
                    snapshot.login.as_deref().unwrap_or("-")
                ),
                TargetResolution::Unresolved { reason } => format!(
                    "{}: address did not resolve ({}), still runs {}",
                    snapshot.name,
                    reason,
                    if snapshot.local { "locally" } else { "remotely" }
                ),
            };
            println!("{}", line);
        }
    }
    Ok(())
}

pub fn print_login_check(ip: &str, login: &str, accepted: bool, format: Format) -> Result<()> {
    match format {
        Format::Json => {
            let value = json!({ "ip": ip, "login": login, "accepted": accepted });
            println!("{}", serde_json::to_string(&value)?);
        }
        Format::Text if accepted => println!("{}@{}: login accepted", login, ip),
        Format::Text => println!("{}@{}: login rejected", login, ip),
    }
    Ok(())
}

pub fn print_event(event: &LibraryEvent, format: Format) -> Result<()> {
    match format {
        Format::Json => println!("{}", serde_json::to_string(&event_json(event))?),
        Format::Text => match event {
            LibraryEvent::StatusChanged { library, from, to } => {
                println!("{}: {} -> {}", library, from, to)
            }
            LibraryEvent::CommandFailed { library, failure } => {
                println!("{}: {} failed: {}", library, failure.action, failure.message)
            }
        },
    }
    Ok(())
}

fn snapshot_line(snapshot: &LibrarySnapshot) -> String {
    let host = match (&snapshot.hostname, snapshot.ip) {
        (Some(hostname), Some(ip)) => format!("{} ({})", hostname, ip),
        (None, Some(ip)) => ip.to_string(),
        (Some(hostname), None) => hostname.clone(),
        (None, None) => "-".to_string(),
    };
    let place = if snapshot.local { "local" } else { "remote" };
    let mut line = format!(
        "{:<24} {:<9} {:<7} {}",
        snapshot.name,
        snapshot.status.as_str(),
        place,
        host
    );
    if let Some(ref failure) = snapshot.last_error {
        line.push_str(&format!("  [{} failed: {}]", failure.action, failure.message));
    }
    line
}

fn resolution_json(resolution: &TargetResolution) -> Value {
    match resolution {
        TargetResolution::Local { hostname } => json!({ "local": true, "hostname": hostname }),
        TargetResolution::Remote { hostname } => json!({ "local": false, "hostname": hostname }),
        TargetResolution::Unresolved { reason } => json!({ "unresolved": reason }),
    }
}

fn event_json(event: &LibraryEvent) -> Value {
    match event {
        LibraryEvent::StatusChanged { library, from, to } => json!({
            "event": "statusChanged",
            "library": library,
            "from": from,
            "to": to,
        }),
        LibraryEvent::CommandFailed { library, failure } => json!({
            "event": "commandFailed",
            "library": library,
            "failure": failure,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sr_control_core::LibraryStatus;

    fn snapshot() -> LibrarySnapshot {
        LibrarySnapshot {
            name: "hand".into(),
            status: LibraryStatus::Started,
            nodes: vec!["/sr_hand".into()],
            ip: Some("10.0.0.2".parse().unwrap()),
            hostname: Some("hand-pc".into()),
            local: false,
            login: Some("hand".into()),
            start_cmd: "roslaunch sr_hand srh_motor.launch".into(),
            stop_cmd: String::new(),
            status_cmd: "rosnode list".into(),
            base_path: None,
            last_error: None,
        }
    }

    #[test]
    fn test_snapshot_line() {
        let line = snapshot_line(&snapshot());
        assert!(line.starts_with("hand"));
        assert!(line.contains("started"));
        assert!(line.contains("remote"));
        assert!(line.contains("hand-pc (10.0.0.2)"));
    }

    #[test]
    fn test_event_json() {
        let value = event_json(&LibraryEvent::StatusChanged {
            library: "hand".into(),
            from: LibraryStatus::Starting,
            to: LibraryStatus::Started,
        });
        assert_eq!(value["event"], "statusChanged");
        assert_eq!(value["to"], "started");
    }

    #[test]
    fn test_resolution_json() {
        let value = resolution_json(&TargetResolution::Unresolved {
            reason: "unknown host".into(),
        });
        assert_eq!(value["unresolved"], "unknown host");
    }
}
