//! Human-readable reports for CLI workloads.

use crate::workload::{ScenarioOutcome, TransferOutcome};

impl TransferOutcome {
    /// Render the outcome as a boxed summary.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let cfg = &self.config;
        let throughput = if self.elapsed.is_zero() {
            0.0
        } else {
            self.transfers as f64 / self.elapsed.as_secs_f64()
        };

        out.push('\n');
        out.push_str("╔══════════════════════════════════════════════════════════════╗\n");
        out.push_str("║                  CUSTODY TRANSFER REPORT                    ║\n");
        out.push_str("╠══════════════════════════════════════════════════════════════╣\n");
        out.push_str(&format!("║  Accounts:           {:>38} ║\n", cfg.accounts));
        out.push_str(&format!("║  Threads:            {:>38} ║\n", cfg.threads));
        out.push_str(&format!("║  Transfers:          {:>38} ║\n", self.transfers));
        out.push_str(&format!("║  Hold per op:        {:>35?} ║\n", cfg.hold));
        out.push_str(&format!("║  Elapsed:            {:>35?} ║\n", self.elapsed));
        out.push_str(&format!("║  Throughput (ops/s): {:>38.0} ║\n", throughput));
        out.push_str("╠══════════════════════════════════════════════════════════════╣\n");
        out.push_str(&format!(
            "║  Total balance:      {:>38} ║\n",
            format!("{} / {}", self.final_total, cfg.expected_total())
        ));
        out.push_str(&format!(
            "║  Conserved:          {:>38} ║\n",
            if self.conserved() { "yes" } else { "NO" }
        ));
        out.push_str("╠══════════════════════════════════════════════════════════════╣\n");
        out.push_str(&format!("║  Admitted:           {:>38} ║\n", self.stats.admitted));
        out.push_str(&format!("║  Conflict waits:     {:>38} ║\n", self.stats.conflict_waits));
        out.push_str(&format!("║  Commit retries:     {:>38} ║\n", self.stats.commit_retries));
        out.push_str(&format!("║  Removal retries:    {:>38} ║\n", self.stats.removal_retries));
        out.push_str(&format!(
            "║  Contention:         {:>38} ║\n",
            format!(
                "{} ({:.2} waits/op)",
                self.stats.severity_label(),
                self.stats.wait_ratio()
            )
        ));
        out.push_str("╚══════════════════════════════════════════════════════════════╝\n");
        out
    }
}

impl ScenarioOutcome {
    pub fn render(&self) -> String {
        let mut out = String::new();

        out.push('\n');
        out.push_str("╔══════════════════════════════════════════════════════════════╗\n");
        out.push_str("║                 BALANCE / TRAFFIC SCENARIO                  ║\n");
        out.push_str("╠══════════════════════════════════════════════════════════════╣\n");
        out.push_str("║  A: borrow(balance)   B: borrow(traffic)                    ║\n");
        out.push_str("║  C: borrow(balance, traffic), started while A is inside     ║\n");
        out.push_str("╠══════════════════════════════════════════════════════════════╣\n");

        for ev in &self.timeline {
            out.push_str(&format!(
                "║  {:>10.3} ms  {} {:<43} ║\n",
                ev.at_us as f64 / 1000.0,
                ev.actor,
                ev.event
            ));
        }

        out.push_str("╠══════════════════════════════════════════════════════════════╣\n");
        out.push_str(&format!("║  Final balance:      {:>38} ║\n", self.balance));
        out.push_str(&format!("║  Final traffic:      {:>38} ║\n", self.traffic));
        out.push_str(&format!("║  A and B overlapped: {:>38} ║\n", self.a_b_overlapped));
        out.push_str(&format!("║  C waited for A:     {:>38} ║\n", self.c_waited_for_a));
        out.push_str("╚══════════════════════════════════════════════════════════════╝\n");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workload::{TimelineEvent, TransferConfig};
    use custody_sync::ManagerStats;
    use std::time::Duration;

    #[test]
    fn transfer_report_flags_conservation() {
        let outcome = TransferOutcome {
            config: TransferConfig {
                accounts: 2,
                threads: 1,
                ops_per_thread: 10,
                hold: Duration::ZERO,
                seed: 1,
                initial_balance: 5,
            },
            transfers: 10,
            elapsed: Duration::from_millis(3),
            final_total: 9,
            stats: ManagerStats {
                admitted: 11,
                ..Default::default()
            },
        };

        let rendered = outcome.render();
        assert!(rendered.contains("CUSTODY TRANSFER REPORT"));
        assert!(rendered.contains("9 / 10"));
        assert!(rendered.contains("NO"));
        assert!(rendered.contains("LOW"));
    }

    #[test]
    fn scenario_report_lists_timeline() {
        let outcome = ScenarioOutcome {
            balance: 70,
            traffic: 40,
            a_b_overlapped: true,
            c_waited_for_a: true,
            timeline: vec![TimelineEvent {
                at_us: 1_500,
                actor: "A",
                event: "enter",
            }],
            stats: ManagerStats::default(),
        };

        let rendered = outcome.render();
        assert!(rendered.contains("1.500 ms  A enter"));
        assert!(rendered.contains("70"));
    }
}
