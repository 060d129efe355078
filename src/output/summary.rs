use std::fmt::Write;

use comfy_table::{Cell, Color as TableColor};

use crate::insights::{Dashboard, History, Kpis};
use crate::model::{ClusterGraph, EdgeKind, PipelineRun, PodStatus, RunStatus};
use crate::topology::ClusterEvent;

use super::styling::{bright, bright_green, bright_red, bright_yellow, cyan, dim, severity};
use super::tables::{
    color_coded_duration_cell, color_coded_utilization_cell,
    create_cyan_header, create_table, format_seconds, pod_status_cell, run_status_cell,
    stage_status_cell,
};

const TIMELINE_WIDTH: usize = 30;
const MAX_HISTORY_ROWS: usize = 15;

fn add_section_header(output: &mut String, emoji: &str, title: &str) {
    let _ = writeln!(output, "{} {}", bright(emoji), bright(title).underlined());
}

fn status_text(status: RunStatus) -> console::StyledObject<String> {
    match status {
        RunStatus::Succeeded => bright_green(status),
        RunStatus::Failed => bright_red(status),
        RunStatus::Running | RunStatus::Pending => bright_yellow(status),
    }
}

#[allow(clippy::cast_precision_loss)]
fn seconds(duration: chrono::Duration) -> f64 {
    duration.num_milliseconds() as f64 / 1000.0
}

/// Stage table for one run, optionally followed by its full log.
pub fn render_run(run: &PipelineRun, with_log: bool) -> String {
    let mut output = String::new();
    add_section_header(&mut output, "🚀", "Pipeline");

    let _ = writeln!(
        output,
        "  {} {}\n  {} {}\n  {} {}\n",
        dim("Run:"),
        cyan(format!("{} ({})", run.name, run.id)),
        dim("Status:"),
        status_text(run.status),
        dim("Duration:"),
        bright_yellow(run.duration().map_or_else(|| "-".to_string(), |d| format_seconds(seconds(d)))),
    );

    let mut table = create_table();
    table.set_header(create_cyan_header(&["Stage", "Status", "Started", "Duration", "Lines"]));
    for stage in run.stages() {
        table.add_row(vec![
            Cell::new(&stage.name),
            stage_status_cell(stage.status),
            Cell::new(
                stage
                    .started_at
                    .map_or_else(|| "-".to_string(), |t| t.format("%H:%M:%S").to_string()),
            ),
            stage
                .duration()
                .map_or_else(|| Cell::new("-"), |d| color_coded_duration_cell(seconds(d))),
            Cell::new(stage.logs().len()),
        ]);
    }
    let _ = writeln!(output, "{table}\n");

    if with_log {
        add_section_header(&mut output, "📜", "Log");
        for (stage, line) in run.log_lines() {
            let _ = writeln!(output, "  {} {}", dim(format!("{stage:>10}")), severity(line.severity, line));
        }
        output.push('\n');
    }

    output
}

fn render_kpis(output: &mut String, kpis: &Kpis) {
    let rate = if kpis.success_rate > 80.0 {
        bright_green(format!("{:.1}%", kpis.success_rate))
    } else if kpis.success_rate >= 50.0 {
        bright_yellow(format!("{:.1}%", kpis.success_rate))
    } else {
        bright_red(format!("{:.1}%", kpis.success_rate))
    };

    let _ = writeln!(
        output,
        "  {} {}\n  {} {}\n  {} {}\n  {} {}\n",
        dim("Runs:"),
        bright_yellow(kpis.total_runs),
        dim("Completed:"),
        bright_yellow(kpis.completed_runs),
        dim("Success rate:"),
        rate,
        dim("Average duration:"),
        bright_yellow(format_seconds(kpis.average_duration_secs)),
    );
}

/// Bar chart of mean seconds per stage, scaled to the slowest stage.
fn render_timeline(output: &mut String, kpis: &Kpis) {
    let longest = kpis.stage_timeline.values().copied().fold(0.0_f64, f64::max);
    let mut table = create_table();
    table.set_header(create_cyan_header(&["Stage", "Avg duration", "Failures", ""]));
    for (stage, secs) in &kpis.stage_timeline {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let width = if longest > 0.0 {
            ((secs / longest) * TIMELINE_WIDTH as f64).round() as usize
        } else {
            0
        };
        let failures = kpis.failures_by_stage.get(stage).copied().unwrap_or(0);
        let failure_cell = if failures > 0 {
            Cell::new(failures).fg(TableColor::Red)
        } else {
            Cell::new(failures).fg(TableColor::DarkGrey)
        };
        table.add_row(vec![
            Cell::new(stage),
            color_coded_duration_cell(*secs),
            failure_cell,
            Cell::new("█".repeat(width)).fg(TableColor::Blue),
        ]);
    }
    let _ = writeln!(output, "{table}\n");
}

/// KPIs, recent runs and the stage timeline.
pub fn render_history(history: &History) -> String {
    let mut output = String::new();
    add_section_header(&mut output, "📊", "Run history");
    let _ = writeln!(output, "  {} {}", dim("Source:"), cyan(history.source.describe()));
    render_kpis(&mut output, &history.kpis);

    if history.runs.is_empty() {
        let _ = writeln!(output, "{}\n", bright_yellow("No runs found."));
        return output;
    }

    let mut table = create_table();
    table.set_header(create_cyan_header(&["Run", "Name", "Status", "Started", "Duration", "Link"]));
    for run in history.runs.iter().rev().take(MAX_HISTORY_ROWS) {
        table.add_row(vec![
            Cell::new(&run.id),
            Cell::new(&run.name),
            run_status_cell(run.status),
            Cell::new(
                run.started_at
                    .map_or_else(|| "-".to_string(), |t| t.format("%Y-%m-%d %H:%M").to_string()),
            ),
            run.duration()
                .map_or_else(|| Cell::new("-"), |d| color_coded_duration_cell(seconds(d))),
            Cell::new(run.url.as_deref().unwrap_or("N/A")),
        ]);
    }
    if history.runs.len() > MAX_HISTORY_ROWS {
        table.add_row(vec![Cell::new(format!(
            "... and {} more",
            history.runs.len() - MAX_HISTORY_ROWS
        ))
        .fg(TableColor::DarkGrey)]);
    }
    let _ = writeln!(output, "{table}\n");

    add_section_header(&mut output, "⏱️", "Stage timeline");
    render_timeline(&mut output, &history.kpis);
    output
}

/// Node, pod and service tables plus any events that produced this snapshot.
pub fn render_cluster(graph: &ClusterGraph, events: &[ClusterEvent]) -> String {
    let mut output = String::new();
    add_section_header(&mut output, "☸️", "Cluster");

    let _ = writeln!(
        output,
        "  {} {}\n  {} {} running, {} pending, {} crashloop\n  {} {} / {}\n",
        dim("Generation:"),
        bright_yellow(graph.generation),
        dim("Pods:"),
        bright_green(graph.count_pods(PodStatus::Running)),
        bright_yellow(graph.count_pods(PodStatus::Pending)),
        bright_red(graph.count_pods(PodStatus::Crashloop)),
        dim("Allocated:"),
        bright_yellow(graph.total_allocated()),
        graph.total_capacity(),
    );

    let mut nodes = create_table();
    nodes.set_header(create_cyan_header(&["Node", "Role", "Allocated", "Capacity", "Used", "Pods"]));
    for node in &graph.nodes {
        let pods: Vec<&str> = graph.pods_on(node.id).map(|p| p.name.as_str()).collect();
        nodes.add_row(vec![
            Cell::new(&node.name),
            Cell::new(node.role),
            Cell::new(node.allocated),
            Cell::new(node.capacity),
            color_coded_utilization_cell(node.allocated, node.capacity),
            Cell::new(if pods.is_empty() { "-".to_string() } else { pods.join("\n") }),
        ]);
    }
    let _ = writeln!(output, "{nodes}\n");

    let mut pods = create_table();
    pods.set_header(create_cyan_header(&["Pod", "App", "Node", "Status", "Request", "Usage", "Restarts"]));
    for pod in &graph.pods {
        let node = pod
            .node
            .and_then(|id| graph.node(id))
            .map_or("-", |n| n.name.as_str());
        pods.add_row(vec![
            Cell::new(&pod.name),
            Cell::new(&pod.app),
            Cell::new(node),
            pod_status_cell(pod.status),
            Cell::new(pod.request),
            Cell::new(pod.usage),
            Cell::new(pod.restarts),
        ]);
    }
    let _ = writeln!(output, "{pods}\n");

    if !graph.services.is_empty() {
        let mut services = create_table();
        services.set_header(create_cyan_header(&["Service", "App", "Selects"]));
        for service in &graph.services {
            let selected: Vec<&str> = graph
                .edges
                .iter()
                .filter(|e| e.kind == EdgeKind::Selects && e.from == service.name)
                .map(|e| e.to.as_str())
                .collect();
            services.add_row(vec![
                Cell::new(&service.name),
                Cell::new(&service.app),
                Cell::new(selected.join(", ")),
            ]);
        }
        let _ = writeln!(output, "{services}\n");
    }

    if !events.is_empty() {
        add_section_header(&mut output, "⚡", "Events");
        for event in events {
            let _ = writeln!(output, "  {} {event}", dim("•"));
        }
        output.push('\n');
    }

    output
}

/// The whole single-page view.
pub fn render_dashboard(dashboard: &Dashboard) -> String {
    let mut output = String::new();
    let _ = writeln!(
        output,
        "{} {}\n",
        dim("Generated:"),
        dim(dashboard.generated_at.format("%Y-%m-%d %H:%M:%S UTC"))
    );
    output.push_str(&render_run(&dashboard.current_run, false));
    output.push_str(&render_history(&dashboard.history));
    output.push_str(&render_cluster(&dashboard.cluster, &dashboard.cluster_events));
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ClusterConfig, PipelineConfig};
    use crate::insights::HistorySource;
    use crate::simulator::{simulate_history, start_run};
    use crate::topology::{generate, perturb_with_events};
    use chrono::{TimeZone, Utc};

    fn origin() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn finished_run() -> PipelineRun {
        let mut handle = start_run(&PipelineConfig::default(), origin()).unwrap();
        handle.run_to_completion();
        handle.into_run()
    }

    #[test]
    fn run_lists_every_stage() {
        let rendered = render_run(&finished_run(), false);
        for stage in ["checkout", "build", "test", "deploy"] {
            assert!(rendered.contains(stage), "missing {stage}");
        }
        assert!(rendered.contains("succeeded"));
        assert!(!rendered.contains("Log"));
    }

    #[test]
    fn run_log_is_optional() {
        let rendered = render_run(&finished_run(), true);
        assert!(rendered.contains("Log"));
        assert!(rendered.contains("[INFO]"));
    }

    #[test]
    fn empty_history_says_so() {
        let rendered = render_history(&History::new(HistorySource::Simulated, Vec::new()));
        assert!(rendered.contains("No runs found."));
        assert!(rendered.contains("0.0%"));
    }

    #[test]
    fn history_shows_timeline() {
        let runs = simulate_history(&PipelineConfig::default(), 3, origin()).unwrap();
        let rendered = render_history(&History::new(HistorySource::Simulated, runs));
        assert!(rendered.contains("Stage timeline"));
        assert!(rendered.contains("CI #3"));
        assert!(rendered.contains('█'));
    }

    #[test]
    fn cluster_shows_pending_pods_without_node() {
        let config = ClusterConfig {
            control_plane_nodes: 0,
            worker_nodes: 1,
            node_cpu: crate::config::Range::fixed(1),
            pods: 2,
            pod_cpu: crate::config::Range::fixed(1),
            ..ClusterConfig::default()
        };
        let graph = generate(&config).unwrap();
        let rendered = render_cluster(&graph, &[]);
        assert!(rendered.contains("node-1"));
        assert!(rendered.contains("pending"));
        assert!(rendered.contains("svc-frontend"));
    }

    #[test]
    fn cluster_lists_events() {
        let graph = generate(&ClusterConfig::default()).unwrap();
        let (next, events) = perturb_with_events(&graph);
        let rendered = render_cluster(&next, &events);
        assert!(rendered.contains("Events"));
        assert!(rendered.contains(&events[0].to_string()));
    }
}
