use serde::Serialize;
use std::io::Write;

use crate::config::OutputFormat;
use crate::error::{Result, VisualizerError};
use crate::insights::{Dashboard, History, Kpis};
use crate::model::{ClusterGraph, PipelineRun};

/// Values that can be flattened into CSV sections.
pub trait CsvExport {
    fn write_csv(&self, output: &mut dyn Write) -> Result<()>;
}

/// Exports a report as JSON or CSV.
///
/// Summary output is rendered by the terminal renderers instead.
pub fn export<T>(value: &T, format: OutputFormat, pretty: bool, output: &mut dyn Write) -> Result<()>
where
    T: Serialize + CsvExport,
{
    match format {
        OutputFormat::Summary => Err(VisualizerError::invalid_config(
            "summary format is rendered to the terminal, not exported",
        )),
        OutputFormat::Json => export_json(value, pretty, output),
        OutputFormat::Csv => value.write_csv(output),
    }
}

fn export_json<T: Serialize>(value: &T, pretty: bool, output: &mut dyn Write) -> Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    writeln!(output, "{json}")?;
    Ok(())
}

fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

fn timestamp(at: Option<chrono::DateTime<chrono::Utc>>) -> String {
    at.map(|t| t.to_rfc3339()).unwrap_or_default()
}

#[allow(clippy::cast_precision_loss)]
fn secs(duration: Option<chrono::Duration>) -> String {
    duration
        .map(|d| format!("{:.1}", d.num_milliseconds() as f64 / 1000.0))
        .unwrap_or_default()
}

impl CsvExport for PipelineRun {
    fn write_csv(&self, output: &mut dyn Write) -> Result<()> {
        writeln!(output, "Run,Stage,Status,Started,Ended,Duration (s),Lines")?;
        for stage in self.stages() {
            writeln!(
                output,
                "{},{},{},{},{},{},{}",
                quote(&self.id),
                quote(&stage.name),
                stage.status,
                timestamp(stage.started_at),
                timestamp(stage.ended_at),
                secs(stage.duration()),
                stage.logs().len()
            )?;
        }
        Ok(())
    }
}

fn write_kpis(kpis: &Kpis, output: &mut dyn Write) -> Result<()> {
    writeln!(output, "Total Runs,Completed Runs,Succeeded,Failed,Success Rate,Average Duration (s)")?;
    writeln!(
        output,
        "{},{},{},{},{:.1},{:.1}",
        kpis.total_runs,
        kpis.completed_runs,
        kpis.succeeded_runs,
        kpis.failed_runs,
        kpis.success_rate,
        kpis.average_duration_secs
    )?;

    writeln!(output)?;
    writeln!(output, "Stage,Average Duration (s),Failures")?;
    for (stage, avg) in &kpis.stage_timeline {
        writeln!(
            output,
            "{},{avg:.1},{}",
            quote(stage),
            kpis.failures_by_stage.get(stage).copied().unwrap_or(0)
        )?;
    }
    Ok(())
}

impl CsvExport for History {
    fn write_csv(&self, output: &mut dyn Write) -> Result<()> {
        write_kpis(&self.kpis, output)?;

        writeln!(output)?;
        writeln!(output, "Run,Name,Source,Status,Started,Ended,Duration (s),URL")?;
        for run in &self.runs {
            writeln!(
                output,
                "{},{},{},{},{},{},{},{}",
                quote(&run.id),
                quote(&run.name),
                match run.source {
                    crate::model::RunSource::Simulated => "simulated",
                    crate::model::RunSource::Live => "live",
                },
                run.status,
                timestamp(run.started_at),
                timestamp(run.ended_at),
                secs(run.duration()),
                quote(run.url.as_deref().unwrap_or_default())
            )?;
        }
        Ok(())
    }
}

impl CsvExport for ClusterGraph {
    fn write_csv(&self, output: &mut dyn Write) -> Result<()> {
        writeln!(output, "Node,Role,CPU Capacity,Memory Capacity,CPU Allocated,Memory Allocated")?;
        for node in &self.nodes {
            writeln!(
                output,
                "{},{},{},{},{},{}",
                quote(&node.name),
                node.role,
                node.capacity.cpu,
                node.capacity.memory,
                node.allocated.cpu,
                node.allocated.memory
            )?;
        }

        writeln!(output)?;
        writeln!(output, "Pod,App,Node,Status,CPU Request,Memory Request,CPU Usage,Memory Usage,Restarts")?;
        for pod in &self.pods {
            let node = pod
                .node
                .and_then(|id| self.node(id))
                .map_or("", |n| n.name.as_str());
            writeln!(
                output,
                "{},{},{},{},{},{},{},{},{}",
                quote(&pod.name),
                quote(&pod.app),
                quote(node),
                pod.status,
                pod.request.cpu,
                pod.request.memory,
                pod.usage.cpu,
                pod.usage.memory,
                pod.restarts
            )?;
        }
        Ok(())
    }
}

impl CsvExport for Dashboard {
    fn write_csv(&self, output: &mut dyn Write) -> Result<()> {
        self.current_run.write_csv(output)?;
        writeln!(output)?;
        self.history.write_csv(output)?;
        writeln!(output)?;
        self.cluster.write_csv(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ClusterConfig, PipelineConfig};
    use crate::insights::HistorySource;
    use crate::simulator::{simulate_history, start_run};
    use crate::topology::generate;
    use chrono::{TimeZone, Utc};

    fn origin() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn render<T: Serialize + CsvExport>(value: &T, format: OutputFormat) -> String {
        let mut buffer = Vec::new();
        export(value, format, false, &mut buffer).unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn quotes_embedded_quotes() {
        assert_eq!(quote(r#"say "hi""#), r#""say ""hi""""#);
    }

    #[test]
    fn run_csv_has_one_row_per_stage() {
        let mut handle = start_run(&PipelineConfig::default(), origin()).unwrap();
        handle.run_to_completion();
        let csv = render(handle.run(), OutputFormat::Csv);

        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[1].starts_with("\"sim-replay\",\"checkout\",succeeded,"));
    }

    #[test]
    fn history_json_keeps_runs_and_source() {
        let runs = simulate_history(&PipelineConfig::default(), 2, origin()).unwrap();
        let history = History::new(HistorySource::Simulated, runs);
        let json = render(&history, OutputFormat::Json);

        let parsed: History = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.runs, history.runs);
        assert_eq!(parsed.source, HistorySource::Simulated);
        assert_eq!(parsed.kpis.total_runs, 2);
    }

    #[test]
    fn cluster_csv_lists_nodes_then_pods() {
        let graph = generate(&ClusterConfig::default()).unwrap();
        let csv = render(&graph, OutputFormat::Csv);

        assert!(csv.starts_with("Node,Role"));
        assert!(csv.contains("\"control-plane-1\",control-plane,"));
        assert!(csv.contains("\nPod,App,Node,Status"));
        assert_eq!(csv.matches("\"pod-").count(), graph.pods.len());
    }

    #[test]
    fn summary_is_not_an_export_format() {
        let graph = generate(&ClusterConfig::default()).unwrap();
        let mut buffer = Vec::new();
        let error = export(&graph, OutputFormat::Summary, false, &mut buffer).unwrap_err();
        assert!(error.is_config_error());
    }
}
