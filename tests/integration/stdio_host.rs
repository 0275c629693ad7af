//! The JSON host end to end over in-memory pipes.

use crate::helpers::at;
use circadian::host::HostBridge;
use circadian::{CircadianConfig, ManualClock};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};

fn bridge_at(start: chrono::DateTime<chrono::Local>) -> HostBridge {
    HostBridge::new(CircadianConfig::default()).with_clock(Arc::new(ManualClock::new(start)))
}

fn of_type<'a>(lines: &'a [Value], kind: &str) -> Vec<&'a Value> {
    lines.iter().filter(|l| l["type"] == kind).collect()
}

#[tokio::test]
async fn test_scripted_notice_is_delivered_on_demand() {
    let script = concat!(
        r#"{"command":"notice","app":"chat","title":"Dinner?","text":"at 7"}"#,
        "\n",
        r#"{"command":"pending"}"#,
        "\n",
        r#"{"command":"deliver_now"}"#,
        "\n",
        r#"{"command":"state"}"#,
        "\n",
    );
    let (mut client, server) = tokio::io::duplex(64 * 1024);
    let bridge = tokio::spawn(bridge_at(at(13, 0)).run(BufReader::new(script.as_bytes()), server));

    let mut raw = String::new();
    client.read_to_string(&mut raw).await.unwrap();
    bridge.await.unwrap().unwrap();
    let lines: Vec<Value> = raw.lines().map(|l| serde_json::from_str(l).unwrap()).collect();

    let responses = of_type(&lines, "response");
    let names: Vec<&str> = responses
        .iter()
        .map(|r| r["command"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["notice", "pending", "deliver_now", "state"]);
    assert!(responses.iter().all(|r| r["ok"] == true));
    assert_eq!(responses[1]["result"][0]["message"], "chat: Dinner?");
    assert_eq!(responses[2]["result"]["mode"], "nudge");
    assert_eq!(responses[2]["result"]["synthesis"], "chat: Dinner?");
    assert_eq!(responses[3]["result"]["pending_count"], 0);

    let events = of_type(&lines, "event");
    assert_eq!(events[0]["event"]["type"], "phase_change");
    assert_eq!(events[0]["event"]["phase"], "afternoon_flow");
    assert!(events.iter().any(|e| e["event"]["type"] == "delivery"));

    let outputs = of_type(&lines, "output");
    assert!(outputs.iter().any(|o| o["output"]["channel"] == "nudge"
        && o["output"]["nudge"]["message"] == "chat: Dinner?"));
}

#[tokio::test]
async fn test_reported_battery_breaks_through_sleep() {
    let (mut input, host_in) = tokio::io::duplex(4096);
    let (host_out, output) = tokio::io::duplex(64 * 1024);
    let bridge = tokio::spawn(bridge_at(at(2, 0)).run(BufReader::new(host_in), host_out));
    let mut lines = BufReader::new(output).lines();

    input
        .write_all(b"{\"command\":\"set_config\",\"heartbeat_secs\":1}\n{\"command\":\"battery\",\"level\":4}\n")
        .await
        .unwrap();

    let spoken = tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(line) = lines.next_line().await.unwrap() {
            let message: Value = serde_json::from_str(&line).unwrap();
            if message["type"] == "output" && message["output"]["channel"] == "speech" {
                return message["output"]["text"].as_str().map(str::to_owned);
            }
        }
        None
    })
    .await
    .expect("speech within a few heartbeats");
    assert_eq!(spoken.as_deref(), Some("Battery at 4%. Charge soon."));

    input.write_all(b"{\"command\":\"stop\"}\n").await.unwrap();
    let mut saw_stop = false;
    while let Some(line) = lines.next_line().await.unwrap() {
        let message: Value = serde_json::from_str(&line).unwrap();
        if message["type"] == "response" && message["command"] == "stop" {
            saw_stop = true;
        }
    }
    assert!(saw_stop);
    bridge.await.unwrap().unwrap();
}
