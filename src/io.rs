use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use crate::Pid;
use crate::error::{Result, SimError};
use crate::process::{ProcessSpec, ProcessState};
use crate::simulator::Simulator;

/// Processes to admit at start-up, one per line:
///
/// ```text
/// # memory_size can_block [remaining_ms] [priority]
/// 16384 yes
/// 8192  0   3000 7
/// ```
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Workload {
    pub processes: Vec<ProcessSpec>,
}

impl Workload {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let mut processes = Vec::new();
        for (index, line) in content.lines().enumerate() {
            if let Some(spec) = Self::parse_line(index + 1, line)? {
                processes.push(spec);
            }
        }
        Ok(Workload { processes })
    }

    fn parse_line(line_no: usize, line: &str) -> Result<Option<ProcessSpec>> {
        let line = line.split('#').next().unwrap_or_default();
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.is_empty() {
            return Ok(None);
        }
        if tokens.len() < 2 || tokens.len() > 4 {
            return Err(parse_error(
                line_no,
                format!("expected 2 to 4 fields, got {}", tokens.len()),
            ));
        }

        let memory_size: usize = tokens[0]
            .parse()
            .map_err(|_| parse_error(line_no, format!("invalid memory size: {}", tokens[0])))?;
        if memory_size == 0 {
            return Err(parse_error(line_no, "memory size must be positive".to_string()));
        }
        let can_be_blocked = parse_flag(tokens[1])
            .ok_or_else(|| parse_error(line_no, format!("invalid can_block flag: {}", tokens[1])))?;
        let remaining_time = match tokens.get(2) {
            Some(t) => Some(
                t.parse::<u64>()
                    .map_err(|_| parse_error(line_no, format!("invalid remaining time: {}", t)))?,
            ),
            None => None,
        };
        let priority = match tokens.get(3) {
            Some(t) => Some(
                t.parse::<u8>()
                    .map_err(|_| parse_error(line_no, format!("invalid priority: {}", t)))?,
            ),
            None => None,
        };

        Ok(Some(ProcessSpec {
            can_be_blocked,
            memory_size: Some(memory_size),
            remaining_time,
            priority,
        }))
    }

    /// Admit every entry, in file order.
    pub fn admit_all(&self, sim: &mut Simulator) -> Result<Vec<Pid>> {
        self.processes.iter().map(|spec| sim.spawn(spec)).collect()
    }
}

fn parse_error(line: usize, message: String) -> SimError {
    SimError::Parse { line, message }
}

fn parse_flag(token: &str) -> Option<bool> {
    match token.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" => Some(true),
        "0" | "false" | "no" | "n" => Some(false),
        _ => None,
    }
}

/// Plain-text summary of a run: metrics, then one line per process.
pub fn render_report(sim: &Simulator) -> Result<String> {
    let processor = sim.processor().ok_or(SimError::NotInitialized)?;
    let metrics = sim.metrics().ok_or(SimError::NotInitialized)?;
    let mut out = String::new();

    // writing into a String cannot fail
    let _ = writeln!(out, "ticks:            {}", sim.ticks());
    let _ = writeln!(out, "simulated time:   {}ms", processor.now());
    let _ = writeln!(
        out,
        "processes:        {} total, {} active, {} terminated",
        metrics.total_processes, metrics.active_processes, metrics.terminated_processes
    );
    let _ = writeln!(out, "page faults:      {}", metrics.page_faults);
    let _ = writeln!(out, "page hits:        {}", metrics.page_hits);
    let _ = writeln!(out, "swaps:            {}", metrics.swap_count);
    let _ = writeln!(out, "hit ratio:        {:.1}%", metrics.hit_ratio * 100.0);
    let _ = writeln!(out, "RAM usage:        {:.1}%", metrics.ram_usage * 100.0);
    let _ = writeln!(out, "pages on disk:    {}", metrics.pages_on_disk);
    let _ = writeln!(out, "throughput:       {:.3} per tick", metrics.throughput);
    let _ = writeln!(out);

    for process in processor.processes() {
        let stats = process.stats();
        let _ = write!(
            out,
            "P{:<3} {:<10} prio {:>2} pages {:>2} remaining {:>5}ms",
            process.pid(),
            process.state(),
            process.priority(),
            process.pages().len(),
            process.remaining_time()
        );
        for state in [ProcessState::Running, ProcessState::Ready, ProcessState::Blocked] {
            let s = stats[&state];
            let _ = write!(out, " | {} x{} {}ms", state, s.count, s.total_time);
        }
        let _ = writeln!(out);
    }
    Ok(out)
}

/// Write [`render_report`] output to `path`.
pub fn write_report<P: AsRef<Path>>(path: P, sim: &Simulator) -> Result<()> {
    let content = render_report(sim)?;
    fs::write(path.as_ref(), content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulator::SimulatorConfig;

    #[test]
    fn test_parse_workload() {
        let content = "# header\n16384 yes\n\n8192 0 3000 7  # trailing comment\n";
        let workload = Workload::parse(content).unwrap();

        assert_eq!(workload.processes.len(), 2);
        assert_eq!(
            workload.processes[0],
            ProcessSpec {
                can_be_blocked: true,
                memory_size: Some(16384),
                remaining_time: None,
                priority: None,
            }
        );
        assert_eq!(workload.processes[1].remaining_time, Some(3000));
        assert_eq!(workload.processes[1].priority, Some(7));
        assert!(!workload.processes[1].can_be_blocked);
    }

    #[test]
    fn test_parse_errors_carry_line_number() {
        let err = Workload::parse("4096 yes\n4096 maybe\n").unwrap_err();
        assert!(matches!(err, SimError::Parse { line: 2, .. }));

        let err = Workload::parse("4096\n").unwrap_err();
        assert!(matches!(err, SimError::Parse { line: 1, .. }));

        let err = Workload::parse("abc no\n").unwrap_err();
        assert!(err.to_string().contains("invalid memory size"));

        let err = Workload::parse("0 no\n").unwrap_err();
        assert!(err.to_string().contains("positive"));
    }

    #[test]
    fn test_empty_workload() {
        let workload = Workload::parse("\n# nothing here\n").unwrap();
        assert!(workload.processes.is_empty());
    }

    #[test]
    fn test_admit_all_and_report() {
        let mut sim = Simulator::new();
        sim.initialize(SimulatorConfig {
            seed: Some(9),
            ..SimulatorConfig::default()
        })
        .unwrap();
        let workload = Workload::parse("8192 no 500 3\n4096 yes\n").unwrap();
        let pids = workload.admit_all(&mut sim).unwrap();
        assert_eq!(pids, vec![1, 2]);
        assert_eq!(sim.processor().unwrap().process(1).unwrap().priority(), 3);

        sim.step().unwrap();
        let report = render_report(&sim).unwrap();
        assert!(report.contains("ticks:            1"));
        assert!(report.contains("P1"));
        assert!(report.contains("TERMINATED"));
    }

    #[test]
    fn test_report_requires_initialization() {
        let sim = Simulator::new();
        assert!(matches!(render_report(&sim), Err(SimError::NotInitialized)));
    }
}
