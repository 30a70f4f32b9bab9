mod common;

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use common::{ip, orchestrator, ScriptedProbe};
use lan_watch_rs::render::{effective_scroll, ports_column_width, Renderer, Tone, Viewport};
use lan_watch_rs::types::{Snapshot, Target};
use time::{OffsetDateTime, UtcOffset};

/// Header (6) + footer without warning (5).
const FIXED_LINES: usize = 11;

fn target(addr: [u8; 4], ports: &[u16]) -> Target {
    Target::new(Ipv4Addr::from(addr), ports)
}

fn snapshot(targets: Vec<Target>) -> Snapshot {
    Snapshot {
        taken_at: OffsetDateTime::UNIX_EPOCH,
        interval: Duration::from_millis(5000),
        version: 0,
        targets,
    }
}

fn body(lines: &[String]) -> Vec<String> {
    lines[6..lines.len() - 5].to_vec()
}

#[test]
fn frame_has_fixed_height_and_header() {
    let snap = snapshot(vec![target([10, 0, 0, 1], &[])]);
    let frame = Renderer::default().render(&snap, 0, None, Viewport::new(20, 100));
    let lines = frame.text_lines();

    assert_eq!(lines.len(), 20);
    assert_eq!(lines[0], "LAN Watch - Last Update 00:00:00 - 01.01.1970");
    assert_eq!(lines[1], "Current Ping Delay: 5000 ms (+/- to inc/dec by 500ms)");
    assert_eq!(lines[2], "═".repeat(100));
    assert_eq!(lines[3], "");
    assert_eq!(
        lines[4],
        "IP Address      | Reachable | Response Time | Http Ports | Last Response        "
    );
    assert_eq!(
        lines[5],
        "----------------+-----------+---------------+------------+----------------------"
    );
    assert_eq!(lines[15], "═".repeat(100));
    assert_eq!(lines[19], "Press 'Q' to quit");
    assert_eq!(frame.body_rows, 20 - FIXED_LINES);
    // One target row, the rest blank.
    let body = body(&lines);
    assert!(body[0].starts_with("       10.0.0.1 | "));
    assert!(body[1..].iter().all(String::is_empty));
}

#[test]
fn unreachable_row_uses_placeholders() {
    let snap = snapshot(vec![target([10, 0, 0, 1], &[])]);
    let frame = Renderer::default().render(&snap, 0, None, Viewport::new(20, 120));
    let row = &frame.lines[6];
    assert_eq!(
        row.text(),
        "       10.0.0.1 |     x     |          - ms | 80 8080    |                     -"
    );
    let toned: Vec<_> = row
        .cells
        .iter()
        .filter_map(|c| c.tone.map(|t| (c.text.trim().to_string(), t)))
        .collect();
    assert_eq!(
        toned,
        vec![
            ("x".to_string(), Tone::Failure),
            ("80".to_string(), Tone::Failure),
            ("8080".to_string(), Tone::Failure),
        ]
    );
}

#[test]
fn reachable_row_shows_latency_ports_and_local_time() {
    let mut t = target([192, 168, 1, 20], &[443, 22]);
    t.record_success(12, OffsetDateTime::UNIX_EPOCH + Duration::from_secs(3600));
    t.apply_port_results(&[(22, true), (443, false)]);
    let snap = snapshot(vec![t]);

    let offset = UtcOffset::from_hms(2, 0, 0).unwrap();
    let frame = Renderer::new(offset).render(&snap, 0, None, Viewport::new(20, 120));
    let row = &frame.lines[6];
    assert_eq!(
        row.text(),
        "   192.168.1.20 |     ✓     |         12 ms | 22 443     | 03:00:00 - 01.01.1970"
    );
    let tones: Vec<_> = row.cells.iter().filter_map(|c| c.tone).collect();
    assert_eq!(tones, vec![Tone::Success, Tone::Success, Tone::Failure]);
}

#[test]
fn targets_sort_by_numeric_octets() {
    let snap = snapshot(vec![
        target([10, 0, 0, 10], &[]),
        target([10, 0, 0, 9], &[]),
        target([9, 255, 0, 1], &[]),
        target([10, 0, 0, 100], &[]),
    ]);
    let frame = Renderer::default().render(&snap, 0, None, Viewport::new(30, 100));
    let order: Vec<String> = body(&frame.text_lines())
        .iter()
        .filter(|l| !l.is_empty())
        .map(|l| l.split('|').next().unwrap().trim().to_string())
        .collect();
    assert_eq!(order, vec!["9.255.0.1", "10.0.0.9", "10.0.0.10", "10.0.0.100"]);
}

#[test]
fn ports_column_grows_with_longest_list() {
    let targets = vec![target([10, 0, 0, 1], &[80, 443, 8080, 8443]), target([10, 0, 0, 2], &[])];
    assert_eq!(ports_column_width(&targets), "80 443 8080 8443".len());
    assert_eq!(ports_column_width(&[]), "Http Ports".len());
    assert_eq!(ports_column_width(&targets[1..]), "Http Ports".len());

    let frame = Renderer::default().render(&snapshot(targets), 0, None, Viewport::new(20, 120));
    let header = frame.lines[4].text();
    assert!(header.contains("| Http Ports       | "));
    // Both rows line up on the last separator.
    let a = frame.lines[6].text();
    let b = frame.lines[7].text();
    assert_eq!(a.rfind(" | "), b.rfind(" | "));
}

#[tokio::test(start_paused = true)]
async fn ports_column_follows_port_changes() {
    let probe = Arc::new(ScriptedProbe::gated());
    let orch = orchestrator(probe.clone());
    orch.register(ip(1), &[]).await.unwrap();
    orch.register(ip(2), &[]).await.unwrap();

    let renderer = Renderer::default();
    let viewport = Viewport::new(20, 120);
    let ports_header = |snap: &Snapshot| renderer.render(snap, 0, None, viewport).lines[4].text();

    assert!(ports_header(&orch.snapshot().await).contains("| Http Ports | "));

    orch.add_checked_port(443).await;
    orch.add_checked_port(8443).await;
    let snap = orch.snapshot().await;
    assert_eq!(ports_column_width(&snap.targets), "80 443 8080 8443".len());
    assert!(ports_header(&snap).contains("| Http Ports       | "));

    orch.remove_checked_port(8443).await;
    let snap = orch.snapshot().await;
    assert_eq!(ports_column_width(&snap.targets), "80 443 8080".len());
    assert!(ports_header(&snap).contains("| Http Ports  | "));

    orch.remove_checked_port(443).await;
    let snap = orch.snapshot().await;
    assert!(ports_header(&snap).contains("| Http Ports | "));

    probe.release(16);
    orch.shutdown().await;
}

#[test]
fn empty_registry_renders_blank_body() {
    let frame = Renderer::default().render(&snapshot(vec![]), 3, None, Viewport::new(15, 80));
    assert_eq!(frame.lines.len(), 15);
    assert_eq!(frame.scroll_offset, 0);
    assert_eq!(frame.overflow, 0);
    assert!(body(&frame.text_lines()).iter().all(String::is_empty));
}

#[test]
fn scrolling_clamps_to_overflow() {
    let targets: Vec<Target> = (1..=10).map(|i| target([10, 0, 0, i], &[])).collect();
    let snap = snapshot(targets);
    // 11 fixed lines + 10 targets in 16 rows: 5 rows of body, overflow 5.
    let vp = Viewport::new(16, 100);

    let frame = Renderer::default().render(&snap, 2, None, vp);
    assert_eq!(frame.overflow, 5);
    assert_eq!(frame.scroll_offset, 2);
    let first = &frame.text_lines()[6];
    assert!(first.trim_start().starts_with("10.0.0.3 "));

    let frame = Renderer::default().render(&snap, 50, None, vp);
    assert_eq!(frame.scroll_offset, 5);
    let body = body(&frame.text_lines());
    assert_eq!(body.len(), 5);
    assert!(body[4].trim_start().starts_with("10.0.0.10 "));

    assert_eq!(effective_scroll(50, frame.overflow), 5);
}

#[test]
fn warning_is_appended_to_footer() {
    let snap = snapshot(vec![]);
    let frame = Renderer::default().render(
        &snap,
        0,
        Some("Invalid port number: 99999"),
        Viewport::new(20, 80),
    );
    let lines = frame.text_lines();
    assert_eq!(lines.len(), 20);
    assert_eq!(lines[18], "");
    assert_eq!(lines[19], "!!! Invalid port number: 99999 !!!");
    assert_eq!(frame.lines[19].cells[0].tone, Some(Tone::Attention));
    assert_eq!(frame.body_rows, 20 - FIXED_LINES - 2);
}

#[test]
fn narrow_and_short_terminals_are_clipped() {
    let snap = snapshot(vec![target([10, 0, 0, 1], &[])]);
    let frame = Renderer::default().render(&snap, 0, None, Viewport::new(8, 30));
    assert_eq!(frame.lines.len(), 8);
    assert_eq!(frame.body_rows, 0);
    assert!(frame.lines.iter().all(|l| l.width() <= 30));
}
